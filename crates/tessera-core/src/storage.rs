use crate::error::LedgerError;
use crate::ledger::IssuanceLedger;
use crate::types::{CollectionConfig, LedgerRecord, LedgerRecordKind, MintReceipt};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

/// Ledger persistence backend configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Keep all mint/withdrawal records in process memory only.
    Memory,
    /// Persist all records in PostgreSQL and replay them on startup.
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(database_url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone)]
enum StorageBackend {
    Memory,
    Postgres(PostgresRecordStore),
}

/// Durable wrapper that keeps the in-memory ledger authoritative while
/// mirroring each record to PostgreSQL.
///
/// Invariant handling:
/// - Records are staged and built against the in-memory snapshot first.
/// - A record is persisted before it is committed in-memory.
/// - On startup, persisted records are replayed through the same commit
///   path, which re-verifies index continuity and supply invariants.
#[derive(Debug, Clone)]
pub struct PersistentLedger {
    ledger: IssuanceLedger,
    backend: StorageBackend,
}

impl PersistentLedger {
    /// Build an in-memory persistent ledger from already persisted records.
    pub fn from_records(
        config: CollectionConfig,
        records: Vec<LedgerRecord>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            ledger: IssuanceLedger::from_records(config, records)?,
            backend: StorageBackend::Memory,
        })
    }

    pub async fn bootstrap(
        config: CollectionConfig,
        storage: StorageConfig,
    ) -> Result<Self, LedgerError> {
        match storage {
            StorageConfig::Memory => Ok(Self {
                ledger: IssuanceLedger::new(config)?,
                backend: StorageBackend::Memory,
            }),
            StorageConfig::Postgres {
                database_url,
                max_connections,
            } => {
                let store = PostgresRecordStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                let records = store.load_records().await?;
                let ledger = IssuanceLedger::from_records(config, records)?;
                Ok(Self {
                    ledger,
                    backend: StorageBackend::Postgres(store),
                })
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres(_) => "postgres",
        }
    }

    pub fn ledger(&self) -> &IssuanceLedger {
        &self.ledger
    }

    /// Stage, persist, then commit one mint call.
    pub async fn mint(
        &mut self,
        holder: &str,
        quantity: u64,
        payment_minor: u64,
        requested_at: u64,
    ) -> Result<MintReceipt, LedgerError> {
        let staged = self
            .ledger
            .stage_mint(holder, quantity, payment_minor, requested_at)?;
        let record = staged.into_record();

        if let StorageBackend::Postgres(store) = &self.backend {
            store.insert_record(&record).await?;
        }

        self.ledger
            .commit_record(record)?
            .ok_or_else(|| LedgerError::Ledger("mint commit produced no receipt".to_string()))
    }

    /// Stage, persist, then commit a treasury withdrawal.
    pub async fn withdraw(&mut self, caller: &str) -> Result<u64, LedgerError> {
        let staged = self.ledger.stage_withdrawal(caller)?;
        let amount = staged.amount_minor;
        let record = staged.into_record();

        if let StorageBackend::Postgres(store) = &self.backend {
            store.insert_record(&record).await?;
        }

        self.ledger.commit_record(record)?;
        Ok(amount)
    }
}

#[derive(Debug, Clone)]
struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Storage(format!("postgres connect failed: {e}")))?;

        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), LedgerError> {
        // Single append-only table for mint and withdrawal records. The
        // application controls index assignment and replay verification.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tessera_ledger_records (
                record_index BIGINT PRIMARY KEY,
                record_id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                holder TEXT NOT NULL,
                quantity BIGINT NOT NULL,
                first_token_id BIGINT NULL,
                last_token_id BIGINT NULL,
                amount_minor BIGINT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres schema create failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tessera_records_holder ON tessera_ledger_records (holder)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres index create failed: {e}")))?;

        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                record_index,
                record_id,
                kind,
                holder,
                quantity,
                first_token_id,
                last_token_id,
                amount_minor,
                recorded_at
            FROM tessera_ledger_records
            ORDER BY record_index ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres load failed: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_str: String = row
                .try_get("kind")
                .map_err(|e| LedgerError::Storage(format!("postgres decode kind failed: {e}")))?;
            let kind = parse_kind(&kind_str)?;

            let index: i64 = row.try_get("record_index").map_err(|e| {
                LedgerError::Storage(format!("postgres decode record_index failed: {e}"))
            })?;
            let quantity: i64 = row.try_get("quantity").map_err(|e| {
                LedgerError::Storage(format!("postgres decode quantity failed: {e}"))
            })?;
            let first_token_id: Option<i64> = row.try_get("first_token_id").map_err(|e| {
                LedgerError::Storage(format!("postgres decode first_token_id failed: {e}"))
            })?;
            let last_token_id: Option<i64> = row.try_get("last_token_id").map_err(|e| {
                LedgerError::Storage(format!("postgres decode last_token_id failed: {e}"))
            })?;
            let amount_minor: i64 = row.try_get("amount_minor").map_err(|e| {
                LedgerError::Storage(format!("postgres decode amount_minor failed: {e}"))
            })?;

            records.push(LedgerRecord {
                record_id: row.try_get("record_id").map_err(|e| {
                    LedgerError::Storage(format!("postgres decode record_id failed: {e}"))
                })?,
                index: to_u64(index, "record_index")?,
                kind,
                holder: row.try_get("holder").map_err(|e| {
                    LedgerError::Storage(format!("postgres decode holder failed: {e}"))
                })?,
                quantity: to_u64(quantity, "quantity")?,
                first_token_id: first_token_id
                    .map(|id| to_u64(id, "first_token_id"))
                    .transpose()?,
                last_token_id: last_token_id
                    .map(|id| to_u64(id, "last_token_id"))
                    .transpose()?,
                amount_minor: to_u64(amount_minor, "amount_minor")?,
                recorded_at: row.try_get("recorded_at").map_err(|e| {
                    LedgerError::Storage(format!("postgres decode recorded_at failed: {e}"))
                })?,
            });
        }

        Ok(records)
    }

    async fn insert_record(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO tessera_ledger_records (
                record_index,
                record_id,
                kind,
                holder,
                quantity,
                first_token_id,
                last_token_id,
                amount_minor,
                recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(to_i64(record.index, "record_index")?)
        .bind(&record.record_id)
        .bind(kind_to_str(record.kind))
        .bind(&record.holder)
        .bind(to_i64(record.quantity, "quantity")?)
        .bind(
            record
                .first_token_id
                .map(|id| to_i64(id, "first_token_id"))
                .transpose()?,
        )
        .bind(
            record
                .last_token_id
                .map(|id| to_i64(id, "last_token_id"))
                .transpose()?,
        )
        .bind(to_i64(record.amount_minor, "amount_minor")?)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres insert failed: {e}")))?;

        Ok(())
    }
}

fn to_i64(value: u64, column: &str) -> Result<i64, LedgerError> {
    value
        .try_into()
        .map_err(|_| LedgerError::Storage(format!("{column} exceeds postgres BIGINT range")))
}

fn to_u64(value: i64, column: &str) -> Result<u64, LedgerError> {
    value
        .try_into()
        .map_err(|_| LedgerError::Storage(format!("negative {column} in storage")))
}

fn kind_to_str(kind: LedgerRecordKind) -> &'static str {
    match kind {
        LedgerRecordKind::Mint => "mint",
        LedgerRecordKind::Withdrawal => "withdrawal",
    }
}

fn parse_kind(value: &str) -> Result<LedgerRecordKind, LedgerError> {
    match value {
        "mint" => Ok(LedgerRecordKind::Mint),
        "withdrawal" => Ok(LedgerRecordKind::Withdrawal),
        other => Err(LedgerError::Storage(format!(
            "unknown record kind '{other}' in postgres"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery_config() -> CollectionConfig {
        CollectionConfig::new("Tessera", "TSR", 10, 25, 0, "ipfs://tessera/", "curator")
    }

    #[tokio::test]
    async fn memory_backend_mints_and_withdraws() {
        let mut ledger = PersistentLedger::bootstrap(gallery_config(), StorageConfig::memory())
            .await
            .unwrap();

        ledger.mint("alice", 3, 30, 5).await.unwrap();
        assert_eq!(ledger.ledger().total_supply(), 3);
        assert_eq!(ledger.withdraw("curator").await.unwrap(), 30);
        assert_eq!(ledger.ledger().treasury_minor(), 0);
        assert_eq!(ledger.backend_label(), "memory");
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in [LedgerRecordKind::Mint, LedgerRecordKind::Withdrawal] {
            assert_eq!(parse_kind(kind_to_str(kind)).unwrap(), kind);
        }
    }

    #[test]
    fn from_records_rehydrates_full_state() {
        let mut base = IssuanceLedger::new(gallery_config()).unwrap();
        base.mint("alice", 2, 20, 5).unwrap();
        base.mint("bob", 1, 10, 6).unwrap();

        let rehydrated =
            PersistentLedger::from_records(gallery_config(), base.records().to_vec()).unwrap();
        assert_eq!(rehydrated.ledger().total_supply(), 2 + 1);
        assert_eq!(rehydrated.ledger().tokens_of("alice"), &[1, 2]);
        assert_eq!(rehydrated.ledger().treasury_minor(), 30);
    }
}
