//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over canonical `records` storage.
//! - Surface unique-index violations on `records.code` as a distinct error.
//!
//! # Invariants
//! - The unique index on `records.code` is the only authority on conflicts;
//!   callers never hold locks across reads and writes.
//! - Code listing order is creation order (`created_at ASC, rowid ASC`).
//! - Read paths accept legacy code values as stored so they can be repaired.

use crate::code::grammar::SequenceCode;
use crate::db::DbError;
use crate::model::record::{CodeAssignment, NewRecord, Record, RecordId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    code,
    title,
    body,
    created_at,
    updated_at
FROM records";

const CODE_UNIQUE_MARKER: &str = "records.code";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Unique index on `records.code` rejected the write.
    DuplicateCode(SequenceCode),
    /// Unique index cannot be built while duplicate codes remain.
    DuplicateCodesPresent,
    NotFound(RecordId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateCode(code) => write!(f, "sequence code already stored: {code}"),
            Self::DuplicateCodesPresent => {
                write!(f, "duplicate sequence codes present; run reconcile first")
            }
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing records.
#[derive(Debug, Clone, Default)]
pub struct RecordListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for records and their codes.
pub trait RecordRepository {
    /// Inserts one record; fails with `DuplicateCode` when the code is held.
    fn insert_record(&self, record: &NewRecord) -> RepoResult<RecordId>;
    fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>>;
    /// Exact-match lookup on the stored code.
    fn find_by_code(&self, code: &SequenceCode) -> RepoResult<Option<Record>>;
    /// Uncached point read used by manual-code validation.
    fn code_exists(&self, code: &SequenceCode) -> RepoResult<bool>;
    /// Loads id + code for every record, in creation order.
    fn list_codes(&self) -> RepoResult<Vec<CodeAssignment>>;
    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>>;
    /// Replaces business fields; never touches the code.
    fn update_fields(&self, id: RecordId, title: &str, body: Option<&str>) -> RepoResult<()>;
    /// Rewrites the code of one record.
    fn update_code(&self, id: RecordId, code: &SequenceCode) -> RepoResult<()>;
    fn delete_record(&self, id: RecordId) -> RepoResult<()>;
}

impl<R: RecordRepository + ?Sized> RecordRepository for &R {
    fn insert_record(&self, record: &NewRecord) -> RepoResult<RecordId> {
        (**self).insert_record(record)
    }

    fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        (**self).get_record(id)
    }

    fn find_by_code(&self, code: &SequenceCode) -> RepoResult<Option<Record>> {
        (**self).find_by_code(code)
    }

    fn code_exists(&self, code: &SequenceCode) -> RepoResult<bool> {
        (**self).code_exists(code)
    }

    fn list_codes(&self) -> RepoResult<Vec<CodeAssignment>> {
        (**self).list_codes()
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        (**self).list_records(query)
    }

    fn update_fields(&self, id: RecordId, title: &str, body: Option<&str>) -> RepoResult<()> {
        (**self).update_fields(id, title, body)
    }

    fn update_code(&self, id: RecordId, code: &SequenceCode) -> RepoResult<()> {
        (**self).update_code(id, code)
    }

    fn delete_record(&self, id: RecordId) -> RepoResult<()> {
        (**self).delete_record(id)
    }
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn insert_record(&self, record: &NewRecord) -> RepoResult<RecordId> {
        self.conn
            .execute(
                "INSERT INTO records (id, code, title, body) VALUES (?1, ?2, ?3, ?4);",
                params![
                    record.id.to_string(),
                    record.code.as_str(),
                    record.title.as_str(),
                    record.body.as_deref(),
                ],
            )
            .map_err(|err| map_code_conflict(err, &record.code))?;

        Ok(record.id)
    }

    fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{RECORD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }

        Ok(None)
    }

    fn find_by_code(&self, code: &SequenceCode) -> RepoResult<Option<Record>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE code = ?1 ORDER BY created_at ASC, rowid ASC LIMIT 1;"
        ))?;
        let mut rows = stmt.query([code.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }

        Ok(None)
    }

    fn code_exists(&self, code: &SequenceCode) -> RepoResult<bool> {
        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE code = ?1 LIMIT 1;",
                [code.as_str()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(exists)
    }

    fn list_codes(&self) -> RepoResult<Vec<CodeAssignment>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code FROM records ORDER BY created_at ASC, rowid ASC;")?;
        let mut rows = stmt.query([])?;
        let mut assignments = Vec::new();

        while let Some(row) = rows.next()? {
            assignments.push(CodeAssignment {
                record_id: parse_record_id(row)?,
                code: SequenceCode::from_persisted(row.get("code")?),
            });
        }

        Ok(assignments)
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        let mut sql = format!("{RECORD_SELECT_SQL} ORDER BY created_at ASC, rowid ASC");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn update_fields(&self, id: RecordId, title: &str, body: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                title = ?1,
                body = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![title, body, id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn update_code(&self, id: RecordId, code: &SequenceCode) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE records
                 SET
                    code = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                params![code.as_str(), id.to_string()],
            )
            .map_err(|err| map_code_conflict(err, code))?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn delete_record(&self, id: RecordId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM records WHERE id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

/// Returns whether the unique index on `records.code` is present.
pub fn has_code_index(conn: &Connection) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type = 'index' AND name = 'idx_records_code'
        );",
        [],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

/// (Re)creates the unique index on `records.code`.
///
/// Stores imported from legacy data may lack the index; run the
/// reconciliation sweep first, since building it fails while duplicates exist.
pub fn ensure_code_index(conn: &Connection) -> RepoResult<()> {
    conn.execute_batch("CREATE UNIQUE INDEX IF NOT EXISTS idx_records_code ON records (code);")
        .map_err(|err| {
            if is_code_unique_violation(&err) {
                RepoError::DuplicateCodesPresent
            } else {
                err.into()
            }
        })
}

fn map_code_conflict(err: rusqlite::Error, code: &SequenceCode) -> RepoError {
    if is_code_unique_violation(&err) {
        return RepoError::DuplicateCode(code.clone());
    }
    err.into()
}

fn is_code_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, Some(message)) => {
            failure.code == ErrorCode::ConstraintViolation && message.contains(CODE_UNIQUE_MARKER)
        }
        _ => false,
    }
}

fn parse_record_id(row: &Row<'_>) -> RepoResult<RecordId> {
    let id_text: String = row.get("id")?;
    Uuid::parse_str(&id_text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{id_text}` in records.id")))
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<Record> {
    Ok(Record {
        id: parse_record_id(row)?,
        code: SequenceCode::from_persisted(row.get("code")?),
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
