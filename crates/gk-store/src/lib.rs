//! gk-store: the per-user, per-kind record store.
//!
//! SQLite via sqlx: one `users` table plus one table per record kind. Every
//! record query filters by `uid`, so a row belonging to another user is
//! invisible. Get/Update/Delete are single statements of the shape
//! `... WHERE id = ? AND uid = ?` and report zero affected rows as
//! [`StoreError::NotFound`]. A separate existence check would race with
//! Delete and leak presence across users, so none is made.

mod error;

pub use error::StoreError;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use sqlx::{Executor, Sqlite, Transaction};
use std::path::Path;

use gk_core::record::{
    BankRecord, BinRecord, Encrypted, ListEntry, Listings, PasswordRecord, RecordPayload,
    TextRecord,
};
use gk_core::{RecordId, RecordKind, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub cn: String,
}

/// Store handle. Cheap to clone (pool is Arc internally).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the SQLite database at `db_path`.
    pub async fn open(db_path: &Path) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// Create all tables if missing.
    pub async fn init(&self) -> StoreResult<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS users(
                id INTEGER PRIMARY KEY,
                cn TEXT UNIQUE NOT NULL)",
            "CREATE TABLE IF NOT EXISTS passwords(
                id INTEGER PRIMARY KEY,
                uid INTEGER NOT NULL,
                login BLOB NOT NULL,
                password BLOB NOT NULL,
                meta BLOB NOT NULL)",
            "CREATE TABLE IF NOT EXISTS texts(
                id INTEGER PRIMARY KEY,
                uid INTEGER NOT NULL,
                text BLOB NOT NULL,
                meta BLOB NOT NULL)",
            "CREATE TABLE IF NOT EXISTS bins(
                id INTEGER PRIMARY KEY,
                uid INTEGER NOT NULL,
                data BLOB NOT NULL,
                meta BLOB NOT NULL)",
            "CREATE TABLE IF NOT EXISTS banks(
                id INTEGER PRIMARY KEY,
                uid INTEGER NOT NULL,
                number BLOB NOT NULL,
                name BLOB NOT NULL,
                date BLOB NOT NULL,
                cvv BLOB NOT NULL,
                meta BLOB NOT NULL)",
        ];
        for statement in statements {
            self.pool.execute(statement).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Begin a transaction, for writes that must commit together (user
    /// creation is only durable once certificate issuance succeeded).
    pub async fn begin(&self) -> StoreResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub async fn create_user(&self, cn: &str) -> StoreResult<UserId> {
        Self::create_user_with(&self.pool, cn).await
    }

    /// Transaction-friendly variant of [`Store::create_user`].
    pub async fn create_user_with<'e, E>(executor: E, cn: &str) -> StoreResult<UserId>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>("INSERT INTO users(cn) VALUES (?) RETURNING id")
            .bind(cn)
            .fetch_one(executor)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UserExists,
                _ => StoreError::Database(e),
            })
    }

    pub async fn lookup_user_id(&self, cn: &str) -> StoreResult<UserId> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE cn = ?")
            .bind(cn)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn is_user(&self, uid: UserId) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(uid)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, cn FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, cn)| User { id, cn }).collect())
    }

    // ── Records ──────────────────────────────────────────────────────────

    /// Insert a record for `uid`; the id is assigned by the store.
    pub async fn add(&self, uid: UserId, record: &RecordPayload) -> StoreResult<RecordId> {
        if !self.is_user(uid).await? {
            return Err(StoreError::UserMissing);
        }
        let id = match record {
            RecordPayload::Password(r) => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO passwords(uid, login, password, meta)
                     VALUES (?, ?, ?, ?) RETURNING id",
                )
                .bind(uid)
                .bind(r.login.as_bytes())
                .bind(r.password.as_bytes())
                .bind(r.meta.as_bytes())
                .fetch_one(&self.pool)
                .await?
            }
            RecordPayload::Text(r) => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO texts(uid, text, meta) VALUES (?, ?, ?) RETURNING id",
                )
                .bind(uid)
                .bind(r.text.as_bytes())
                .bind(r.meta.as_bytes())
                .fetch_one(&self.pool)
                .await?
            }
            RecordPayload::Bin(r) => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO bins(uid, data, meta) VALUES (?, ?, ?) RETURNING id",
                )
                .bind(uid)
                .bind(r.data.as_bytes())
                .bind(r.meta.as_bytes())
                .fetch_one(&self.pool)
                .await?
            }
            RecordPayload::Bank(r) => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO banks(uid, number, name, date, cvv, meta)
                     VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
                )
                .bind(uid)
                .bind(r.number.as_bytes())
                .bind(r.holder.as_bytes())
                .bind(r.date.as_bytes())
                .bind(r.cvv.as_bytes())
                .bind(r.meta.as_bytes())
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(id)
    }

    /// Fetch one record. Rows owned by other users are invisible.
    pub async fn get(
        &self,
        uid: UserId,
        kind: RecordKind,
        id: RecordId,
    ) -> StoreResult<RecordPayload> {
        match kind {
            RecordKind::Password => {
                let row = sqlx::query_as::<_, (i64, Vec<u8>, Vec<u8>, Vec<u8>)>(
                    "SELECT id, login, password, meta FROM passwords WHERE id = ? AND uid = ?",
                )
                .bind(id)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)?;
                Ok(RecordPayload::Password(PasswordRecord {
                    id: row.0,
                    login: Encrypted(row.1),
                    password: Encrypted(row.2),
                    meta: Encrypted(row.3),
                }))
            }
            RecordKind::Text => {
                let row = sqlx::query_as::<_, (i64, Vec<u8>, Vec<u8>)>(
                    "SELECT id, text, meta FROM texts WHERE id = ? AND uid = ?",
                )
                .bind(id)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)?;
                Ok(RecordPayload::Text(TextRecord {
                    id: row.0,
                    text: Encrypted(row.1),
                    meta: Encrypted(row.2),
                }))
            }
            RecordKind::Bin => {
                let row = sqlx::query_as::<_, (i64, Vec<u8>, Vec<u8>)>(
                    "SELECT id, data, meta FROM bins WHERE id = ? AND uid = ?",
                )
                .bind(id)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)?;
                Ok(RecordPayload::Bin(BinRecord {
                    id: row.0,
                    data: Encrypted(row.1),
                    meta: Encrypted(row.2),
                }))
            }
            RecordKind::Bank => {
                let row = sqlx::query_as::<_, (i64, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>, Vec<u8>)>(
                    "SELECT id, number, name, date, cvv, meta FROM banks
                     WHERE id = ? AND uid = ?",
                )
                .bind(id)
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)?;
                Ok(RecordPayload::Bank(BankRecord {
                    id: row.0,
                    number: Encrypted(row.1),
                    holder: Encrypted(row.2),
                    date: Encrypted(row.3),
                    cvv: Encrypted(row.4),
                    meta: Encrypted(row.5),
                }))
            }
            RecordKind::Unknown => Err(StoreError::InvalidKind),
        }
    }

    /// Replace every field of a record. Same ownership semantics as `get`.
    pub async fn update(
        &self,
        uid: UserId,
        id: RecordId,
        record: &RecordPayload,
    ) -> StoreResult<()> {
        let result = match record {
            RecordPayload::Password(r) => {
                sqlx::query(
                    "UPDATE passwords SET login = ?, password = ?, meta = ?
                     WHERE id = ? AND uid = ?",
                )
                .bind(r.login.as_bytes())
                .bind(r.password.as_bytes())
                .bind(r.meta.as_bytes())
                .bind(id)
                .bind(uid)
                .execute(&self.pool)
                .await?
            }
            RecordPayload::Text(r) => {
                sqlx::query("UPDATE texts SET text = ?, meta = ? WHERE id = ? AND uid = ?")
                    .bind(r.text.as_bytes())
                    .bind(r.meta.as_bytes())
                    .bind(id)
                    .bind(uid)
                    .execute(&self.pool)
                    .await?
            }
            RecordPayload::Bin(r) => {
                sqlx::query("UPDATE bins SET data = ?, meta = ? WHERE id = ? AND uid = ?")
                    .bind(r.data.as_bytes())
                    .bind(r.meta.as_bytes())
                    .bind(id)
                    .bind(uid)
                    .execute(&self.pool)
                    .await?
            }
            RecordPayload::Bank(r) => {
                sqlx::query(
                    "UPDATE banks SET number = ?, name = ?, date = ?, cvv = ?, meta = ?
                     WHERE id = ? AND uid = ?",
                )
                .bind(r.number.as_bytes())
                .bind(r.holder.as_bytes())
                .bind(r.date.as_bytes())
                .bind(r.cvv.as_bytes())
                .bind(r.meta.as_bytes())
                .bind(id)
                .bind(uid)
                .execute(&self.pool)
                .await?
            }
        };
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a record. Same ownership semantics as `get`.
    pub async fn delete(&self, uid: UserId, kind: RecordKind, id: RecordId) -> StoreResult<()> {
        let table = record_table(kind)?;
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ? AND uid = ?"))
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// (id, meta) projections of one kind, oldest first.
    pub async fn list(&self, uid: UserId, kind: RecordKind) -> StoreResult<Vec<ListEntry>> {
        let table = record_table(kind)?;
        let rows = sqlx::query_as::<_, (i64, Vec<u8>)>(&format!(
            "SELECT id, meta FROM {table} WHERE uid = ? ORDER BY id"
        ))
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, meta)| ListEntry {
                id,
                meta: Encrypted(meta),
            })
            .collect())
    }

    /// (id, meta) projections of every kind.
    pub async fn list_all(&self, uid: UserId) -> StoreResult<Listings> {
        Ok(Listings {
            password: self.list(uid, RecordKind::Password).await?,
            text: self.list(uid, RecordKind::Text).await?,
            bin: self.list(uid, RecordKind::Bin).await?,
            bank: self.list(uid, RecordKind::Bank).await?,
        })
    }
}

fn record_table(kind: RecordKind) -> StoreResult<&'static str> {
    match kind {
        RecordKind::Password => Ok("passwords"),
        RecordKind::Text => Ok("texts"),
        RecordKind::Bin => Ok("bins"),
        RecordKind::Bank => Ok("banks"),
        RecordKind::Unknown => Err(StoreError::InvalidKind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).await.unwrap();
        store.init().await.unwrap();
        (store, dir)
    }

    fn blob(byte: u8) -> Encrypted {
        Encrypted(vec![byte; 300])
    }

    fn password(meta: u8) -> RecordPayload {
        RecordPayload::Password(PasswordRecord {
            id: 0,
            login: blob(1),
            password: blob(2),
            meta: blob(meta),
        })
    }

    fn bank() -> RecordPayload {
        RecordPayload::Bank(BankRecord {
            id: 0,
            number: blob(1),
            holder: blob(2),
            date: blob(3),
            cvv: blob(4),
            meta: blob(5),
        })
    }

    #[tokio::test]
    async fn create_user_assigns_monotonic_ids() {
        let (store, _dir) = test_store().await;
        assert_eq!(store.create_user("alice").await.unwrap(), 1);
        assert_eq!(store.create_user("bob").await.unwrap(), 2);
        assert_eq!(store.lookup_user_id("bob").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn duplicate_cn_is_rejected() {
        let (store, _dir) = test_store().await;
        store.create_user("alice").await.unwrap();
        assert!(matches!(
            store.create_user("alice").await,
            Err(StoreError::UserExists)
        ));
    }

    #[tokio::test]
    async fn lookup_unknown_cn_is_not_found() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.lookup_user_id("nobody").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn rolled_back_user_is_not_durable() {
        let (store, _dir) = test_store().await;
        {
            let mut tx = store.begin().await.unwrap();
            Store::create_user_with(&mut *tx, "ghost").await.unwrap();
            // dropped without commit
        }
        assert!(matches!(
            store.lookup_user_id("ghost").await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(store.create_user("ghost").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn add_get_roundtrip() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();

        let mut record = bank();
        let id = store.add(uid, &record).await.unwrap();
        assert_eq!(id, 1);

        record.set_id(id);
        let fetched = store.get(uid, RecordKind::Bank, id).await.unwrap();
        assert_eq!(fetched, record);
    }

    #[tokio::test]
    async fn add_for_missing_user_fails() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.add(42, &password(1)).await,
            Err(StoreError::UserMissing)
        ));
    }

    #[tokio::test]
    async fn record_ids_are_per_kind() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();
        assert_eq!(store.add(uid, &password(1)).await.unwrap(), 1);
        assert_eq!(store.add(uid, &bank()).await.unwrap(), 1);
        assert_eq!(store.add(uid, &password(2)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn other_users_records_are_invisible() {
        let (store, _dir) = test_store().await;
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();

        let id = store.add(alice, &password(1)).await.unwrap();

        assert!(matches!(
            store.get(bob, RecordKind::Password, id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.update(bob, id, &password(9)).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete(bob, RecordKind::Password, id).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.list(bob, RecordKind::Password).await.unwrap().is_empty());

        // and the record survived the failed attempts
        store.get(alice, RecordKind::Password, id).await.unwrap();
    }

    #[tokio::test]
    async fn update_replaces_every_field() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();
        let id = store.add(uid, &password(1)).await.unwrap();

        let mut replacement = password(7);
        replacement.set_id(id);
        store.update(uid, id, &replacement).await.unwrap();

        let fetched = store.get(uid, RecordKind::Password, id).await.unwrap();
        assert_eq!(fetched, replacement);
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();

        assert!(matches!(
            store.delete(uid, RecordKind::Password, 42).await,
            Err(StoreError::NotFound)
        ));

        let id = store.add(uid, &password(1)).await.unwrap();
        store.delete(uid, RecordKind::Password, id).await.unwrap();
        assert!(matches!(
            store.delete(uid, RecordKind::Password, id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_projects_id_and_meta_only() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();
        store.add(uid, &password(1)).await.unwrap();
        store.add(uid, &password(2)).await.unwrap();

        let entries = store.list(uid, RecordKind::Password).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].meta, blob(1));
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].meta, blob(2));
    }

    #[tokio::test]
    async fn list_all_covers_every_kind() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();
        store.add(uid, &password(1)).await.unwrap();
        store.add(uid, &bank()).await.unwrap();

        let listings = store.list_all(uid).await.unwrap();
        assert_eq!(listings.password.len(), 1);
        assert_eq!(listings.bank.len(), 1);
        assert!(listings.text.is_empty());
        assert!(listings.bin.is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_invalid() {
        let (store, _dir) = test_store().await;
        let uid = store.create_user("alice").await.unwrap();
        assert!(matches!(
            store.get(uid, RecordKind::Unknown, 1).await,
            Err(StoreError::InvalidKind)
        ));
        assert!(matches!(
            store.list(uid, RecordKind::Unknown).await,
            Err(StoreError::InvalidKind)
        ));
        assert!(matches!(
            store.delete(uid, RecordKind::Unknown, 1).await,
            Err(StoreError::InvalidKind)
        ));
    }
}
