pub mod database;
pub mod memory;
pub mod records;
pub mod subscriptions;
