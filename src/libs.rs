pub mod config;
pub mod core;
pub mod directory;
pub mod ffi;
pub mod identity;
pub mod optimistic;
pub mod relationships;
pub mod storage;
pub mod telemetry;
