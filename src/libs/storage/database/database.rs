use crate::libs::storage::database::storage_sqllite::{SqliteStore, SqliteTransaction};
use crate::libs::storage::database::storage_traits::{StoreError, Transactional};
use crate::libs::config::ClientConfig;

const MIGRATIONS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        display_name TEXT NOT NULL,
        email TEXT NOT NULL,
        photo_url TEXT,
        is_online BOOLEAN NOT NULL DEFAULT false,
        last_seen INTEGER,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_users_display_name ON users(display_name);

    -- one row per owner, entries are a bincode encoded list
    CREATE TABLE IF NOT EXISTS relationships (
        owner_id TEXT PRIMARY KEY,
        entries BLOB NOT NULL,
        updated_at INTEGER NOT NULL
    );
"#;

/// Opens the pool described by `config` and brings the schema up to date.
pub fn initialize_database(config: &ClientConfig) -> Result<SqliteStore, StoreError> {
    let store = SqliteStore::new(&config.database_path, config.pool_size)?;
    db_migration(&store)?;
    tracing::info!(path = %config.database_path.display(), "database initialized");
    Ok(store)
}

pub fn db_migration(store: &SqliteStore) -> Result<(), StoreError> {
    let mut connection = store.new_connection()?;
    let sqlite_transaction = SqliteTransaction::new(&mut connection)?;

    sqlite_transaction.inner().execute_batch(MIGRATIONS)?;

    sqlite_transaction.commit()
}
