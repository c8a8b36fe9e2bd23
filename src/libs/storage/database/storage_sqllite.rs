use crate::libs::core::models::UserId;
use crate::libs::storage::database::storage_traits::{
    ProtocolStore, RelationshipStore, Storage, StoreError, Transactional, UserStore,
};
use crate::libs::storage::records::{RelationshipEntry, RelationshipRecord, UserRecord};
use crate::libs::storage::subscriptions::Subscribers;
use bincode::config::standard;
use chrono::{DateTime, Utc};
use flume::Receiver;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;

const BUSY_TIMEOUT_PRAGMA: &str = "PRAGMA busy_timeout = 5000;";

pub struct SqliteTransaction<'conn> {
    tx: Transaction<'conn>,
    written: Vec<RelationshipRecord>,
}

impl<'conn> SqliteTransaction<'conn> {
    /// Starts an IMMEDIATE transaction so the read-modify-write cycles of two
    /// clients on the same record are serialised by the write lock.
    pub fn new(
        conn: &'conn mut PooledConnection<SqliteConnectionManager>,
    ) -> Result<Self, StoreError> {
        let trans = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self {
            tx: trans,
            written: Vec::new(),
        })
    }

    pub fn inner(&self) -> &Transaction<'conn> {
        &self.tx
    }

    fn take_written(&mut self) -> Vec<RelationshipRecord> {
        std::mem::take(&mut self.written)
    }
}

impl<'conn> Transactional for SqliteTransaction<'conn> {
    fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().map_err(StoreError::from)
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().map_err(StoreError::from)
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn_pool: Pool<SqliteConnectionManager>,
    subscribers: Arc<Subscribers>,
}

impl SqliteStore {
    pub fn new(db_path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch(BUSY_TIMEOUT_PRAGMA));
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
        Ok(Self {
            conn_pool: pool,
            subscribers: Subscribers::shared(db_path),
        })
    }

    pub fn new_connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.conn_pool.get()?)
    }
}

impl Storage for SqliteStore {
    fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn ProtocolStore) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut connection = self.new_connection()?;
        let mut sqlite_transaction = SqliteTransaction::new(&mut connection)?;

        match f(&mut sqlite_transaction) {
            Ok(value) => {
                let written = sqlite_transaction.take_written();
                sqlite_transaction.commit()?;
                self.subscribers.publish(written);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = sqlite_transaction.rollback() {
                    tracing::error!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn subscribe(&self, owner_id: &UserId) -> Result<Receiver<RelationshipRecord>, StoreError> {
        self.subscribers.subscribe(owner_id)
    }
}

impl<'conn> ProtocolStore for SqliteTransaction<'conn> {}

impl<'conn> UserStore for SqliteTransaction<'conn> {
    fn create_user(&mut self, record: &UserRecord) -> Result<(), StoreError> {
        let exists = self
            .tx
            .query_row(
                "SELECT 1 FROM users WHERE user_id = ?1",
                params![record.user_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(StoreError::UserAlreadyExists(record.user_id.clone()));
        }

        self.tx.execute(
            "INSERT INTO users (user_id, display_name, email, photo_url, is_online, last_seen, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.user_id,
                record.display_name,
                record.email,
                record.photo_url,
                record.is_online,
                record.last_seen.map(|at| at.timestamp_millis()),
                record.created_at.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn load_user(&mut self, user_id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let user = self
            .tx
            .query_row(
                "SELECT user_id, display_name, email, photo_url, is_online, last_seen, created_at
                 FROM users WHERE user_id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn load_users(&mut self) -> Result<Vec<UserRecord>, StoreError> {
        let mut stmt = self.tx.prepare(
            "SELECT user_id, display_name, email, photo_url, is_online, last_seen, created_at
             FROM users ORDER BY display_name, user_id",
        )?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn search_users_by_display_name(&mut self, prefix: &str) -> Result<Vec<UserRecord>, StoreError> {
        // instr keeps the match case sensitive, LIKE would not
        let mut stmt = self.tx.prepare(
            "SELECT user_id, display_name, email, photo_url, is_online, last_seen, created_at
             FROM users WHERE instr(display_name, ?1) = 1 ORDER BY display_name, user_id",
        )?;
        let users = stmt
            .query_map(params![prefix], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn update_presence(
        &mut self,
        user_id: &UserId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = self.tx.execute(
            "UPDATE users SET is_online = ?2, last_seen = ?3 WHERE user_id = ?1",
            params![user_id, is_online, at.timestamp_millis()],
        )?;
        if updated == 0 {
            return Err(StoreError::UserNotFound(user_id.clone()));
        }
        Ok(())
    }
}

impl<'conn> RelationshipStore for SqliteTransaction<'conn> {
    fn load_relationships(&mut self, owner_id: &UserId) -> Result<RelationshipRecord, StoreError> {
        let blob = self
            .tx
            .query_row(
                "SELECT entries FROM relationships WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get::<usize, Vec<u8>>(0),
            )
            .optional()?;

        let Some(blob) = blob else {
            return Ok(RelationshipRecord::empty(owner_id.clone()));
        };
        let (entries, _len): (Vec<RelationshipEntry>, usize) =
            bincode::serde::decode_from_slice(&blob, standard())?;

        Ok(RelationshipRecord {
            owner_id: owner_id.clone(),
            entries,
        })
    }

    fn store_relationships(&mut self, record: &RelationshipRecord) -> Result<(), StoreError> {
        let entries = bincode::serde::encode_to_vec(&record.entries, standard())?;
        self.tx.execute(
            "INSERT INTO relationships (owner_id, entries, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_id) DO UPDATE SET entries = excluded.entries, updated_at = excluded.updated_at",
            params![record.owner_id, entries, Utc::now().timestamp_millis()],
        )?;
        self.written.push(record.clone());
        Ok(())
    }

    fn relationship_owners(&mut self) -> Result<Vec<UserId>, StoreError> {
        let mut stmt = self
            .tx
            .prepare("SELECT owner_id FROM relationships ORDER BY owner_id")?;
        let owners = stmt
            .query_map([], |row| row.get::<usize, UserId>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owners)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let last_seen = row
        .get::<usize, Option<i64>>(5)?
        .map(|millis| millis_to_datetime(5, millis))
        .transpose()?;

    Ok(UserRecord {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        is_online: row.get(4)?,
        last_seen,
        created_at: millis_to_datetime(6, row.get(6)?)?,
    })
}

fn millis_to_datetime(column: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, millis))
}
