//! SQLite-backed store behind an r2d2 connection pool.
//!
//! The pool is opened once at start-up and shared by every request. Both
//! tables are keyed by a single column and written with
//! `INSERT .. ON CONFLICT DO UPDATE`, so concurrent upserts of the same key
//! converge on the last writer.

use crate::domain::types::{
    AgentRecord, TransactionFilter, TransactionPage, TransactionRecord, TransactionStatus,
};
use crate::domain::AgentId;
use crate::storage::{agent_key, tx_key, AgentStore, StoreError};
use alloy_primitives::{Address, B256};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;
use tracing::info;

type DbConn = PooledConnection<SqliteConnectionManager>;

const POOL_MAX_SIZE: u32 = 8;

pub struct SqliteAgentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAgentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|error| {
                    StoreError::Backend(format!(
                        "failed to create database directory {}: {error}",
                        parent.display()
                    ))
                })?;
            }
        }
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
        });
        let pool = Pool::builder()
            .max_size(POOL_MAX_SIZE)
            .build(manager)
            .map_err(|error| StoreError::Backend(format!("failed to open pool: {error}")))?;
        let store = Self { pool };
        store.init()?;
        info!("sqlite store opened path={}", path.display());
        Ok(store)
    }

    fn conn(&self) -> Result<DbConn, StoreError> {
        self.pool
            .get()
            .map_err(|error| StoreError::Backend(format!("no pooled connection: {error}")))
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS agents (
                    agent_id TEXT PRIMARY KEY,
                    owner TEXT NOT NULL,
                    target_contract TEXT NOT NULL,
                    name TEXT NOT NULL,
                    config_ref TEXT NOT NULL,
                    active INTEGER NOT NULL,
                    created_at INTEGER
                );
                CREATE INDEX IF NOT EXISTS idx_agents_active ON agents(active, agent_id);
                CREATE TABLE IF NOT EXISTS transactions (
                    tx_hash TEXT PRIMARY KEY,
                    agent_id TEXT,
                    user_address TEXT NOT NULL,
                    function_name TEXT,
                    status TEXT NOT NULL,
                    block_number INTEGER,
                    gas_used INTEGER,
                    created_at_ns INTEGER NOT NULL,
                    updated_at_ns INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_address);
                CREATE INDEX IF NOT EXISTS idx_transactions_agent ON transactions(agent_id);",
            )
            .map_err(backend)
    }
}

fn backend(error: rusqlite::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_error| StoreError::Serialization(format!("{field} does not fit in i64")))
}

fn to_u64(value: i64, field: &str) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            format!("{field}: {error}").into(),
        )
    })
}

fn parse_column<T>(raw: String, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            error.to_string().into(),
        )
    })
}

fn address_text(address: &Address) -> String {
    format!("{address:#x}")
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        id: parse_column::<AgentId>(row.get(0)?, 0)?,
        owner: parse_column::<Address>(row.get(1)?, 1)?,
        target_contract: parse_column::<Address>(row.get(2)?, 2)?,
        name: row.get(3)?,
        config_ref: row.get(4)?,
        active: row.get(5)?,
        created_at: row
            .get::<_, Option<i64>>(6)?
            .map(|value| to_u64(value, "created_at"))
            .transpose()?,
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let status: String = row.get(4)?;
    let status = TransactionStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown status {status}").into(),
        )
    })?;
    Ok(TransactionRecord {
        tx_hash: parse_column::<B256>(row.get(0)?, 0)?,
        agent_id: row
            .get::<_, Option<String>>(1)?
            .map(|raw| parse_column::<AgentId>(raw, 1))
            .transpose()?,
        user_address: parse_column::<Address>(row.get(2)?, 2)?,
        function_name: row.get(3)?,
        status,
        block_number: row
            .get::<_, Option<i64>>(5)?
            .map(|value| to_u64(value, "block_number"))
            .transpose()?,
        gas_used: row
            .get::<_, Option<i64>>(6)?
            .map(|value| to_u64(value, "gas_used"))
            .transpose()?,
        created_at_ns: to_u64(row.get(7)?, "created_at_ns")?,
        updated_at_ns: to_u64(row.get(8)?, "updated_at_ns")?,
    })
}

const AGENT_COLUMNS: &str =
    "agent_id, owner, target_contract, name, config_ref, active, created_at";
const TRANSACTION_COLUMNS: &str = "tx_hash, agent_id, user_address, function_name, status, \
     block_number, gas_used, created_at_ns, updated_at_ns";

impl AgentStore for SqliteAgentStore {
    fn upsert_agent(&self, record: &AgentRecord) -> Result<(), StoreError> {
        let created_at = record
            .created_at
            .map(|value| to_i64(value, "created_at"))
            .transpose()?;
        self.conn()?
            .execute(
                "INSERT INTO agents (agent_id, owner, target_contract, name, config_ref, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(agent_id) DO UPDATE SET
                    owner = excluded.owner,
                    target_contract = excluded.target_contract,
                    name = excluded.name,
                    config_ref = excluded.config_ref,
                    active = excluded.active,
                    created_at = excluded.created_at",
                params![
                    agent_key(&record.id),
                    address_text(&record.owner),
                    address_text(&record.target_contract),
                    record.name,
                    record.config_ref,
                    record.active,
                    created_at,
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn get_agent(&self, id: &AgentId) -> Result<Option<AgentRecord>, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE agent_id = ?1"),
                params![agent_key(id)],
                agent_from_row,
            )
            .optional()
            .map_err(backend)
    }

    fn list_active(&self, offset: usize, limit: usize) -> Result<Vec<AgentRecord>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(&format!(
                "SELECT {AGENT_COLUMNS} FROM agents WHERE active = 1
                 ORDER BY agent_id ASC LIMIT ?1 OFFSET ?2"
            ))
            .map_err(backend)?;
        let rows = statement
            .query_map(
                params![to_i64(limit as u64, "limit")?, to_i64(offset as u64, "offset")?],
                agent_from_row,
            )
            .map_err(backend)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(backend)
    }

    fn count_active(&self) -> Result<usize, StoreError> {
        let total: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM agents WHERE active = 1", [], |row| {
                row.get(0)
            })
            .map_err(backend)?;
        usize::try_from(total)
            .map_err(|_error| StoreError::Serialization("agent count out of range".to_string()))
    }

    fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let block_number = record
            .block_number
            .map(|value| to_i64(value, "block_number"))
            .transpose()?;
        let gas_used = record
            .gas_used
            .map(|value| to_i64(value, "gas_used"))
            .transpose()?;
        self.conn()?
            .execute(
                "INSERT INTO transactions (tx_hash, agent_id, user_address, function_name, status,
                    block_number, gas_used, created_at_ns, updated_at_ns)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(tx_hash) DO UPDATE SET
                    agent_id = COALESCE(excluded.agent_id, transactions.agent_id),
                    user_address = excluded.user_address,
                    function_name = COALESCE(excluded.function_name, transactions.function_name),
                    status = excluded.status,
                    block_number = excluded.block_number,
                    gas_used = excluded.gas_used,
                    updated_at_ns = excluded.updated_at_ns",
                params![
                    tx_key(&record.tx_hash),
                    record.agent_id.as_ref().map(agent_key),
                    address_text(&record.user_address),
                    record.function_name,
                    record.status.as_str(),
                    block_number,
                    gas_used,
                    to_i64(record.created_at_ns, "created_at_ns")?,
                    to_i64(record.updated_at_ns, "updated_at_ns")?,
                ],
            )
            .map_err(backend)?;
        Ok(())
    }

    fn get_transaction(&self, tx_hash: &B256) -> Result<Option<TransactionRecord>, StoreError> {
        self.conn()?
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE tx_hash = ?1"),
                params![tx_key(tx_hash)],
                transaction_from_row,
            )
            .optional()
            .map_err(backend)
    }

    fn list_transactions(&self, filter: &TransactionFilter) -> Result<TransactionPage, StoreError> {
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(agent_id) = &filter.agent_id {
            values.push(Box::new(agent_key(agent_id)));
            clauses.push(format!("agent_id = ?{}", values.len()));
        }
        if let Some(user) = &filter.user_address {
            values.push(Box::new(address_text(user)));
            clauses.push(format!("user_address = ?{}", values.len()));
        }
        if let Some(status) = filter.status {
            values.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let limit = to_i64(filter.limit as u64, "limit")?;
        let offset = to_i64(filter.offset as u64, "offset")?;
        let conn = self.conn()?;
        let bound = values.iter().map(|value| value.as_ref()).collect::<Vec<&dyn ToSql>>();
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM transactions {where_clause}"),
                bound.as_slice(),
                |row| row.get(0),
            )
            .map_err(backend)?;

        let limit_index = values.len() + 1;
        let offset_index = values.len() + 2;
        let mut paged = bound;
        paged.push(&limit);
        paged.push(&offset);
        let mut statement = conn
            .prepare(&format!(
                "SELECT {TRANSACTION_COLUMNS} FROM transactions {where_clause}
                 ORDER BY created_at_ns DESC, tx_hash ASC LIMIT ?{limit_index} OFFSET ?{offset_index}"
            ))
            .map_err(backend)?;
        let transactions = statement
            .query_map(paged.as_slice(), transaction_from_row)
            .map_err(backend)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(backend)?;

        Ok(TransactionPage {
            transactions,
            total: usize::try_from(total).unwrap_or_default(),
            limit: filter.limit,
            offset: filter.offset,
        })
    }
}
