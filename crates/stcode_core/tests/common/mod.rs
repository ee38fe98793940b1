//! In-memory record store with fault injection for service tests.

#![allow(dead_code)]

use stcode_core::{
    CodeAssignment, NewRecord, Record, RecordDraft, RecordId, RecordListQuery, RecordRepository,
    RepoError, RepoResult, SequenceCode,
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use uuid::Uuid;

/// Vector-backed store. Enforces code uniqueness unless built with
/// [`InMemoryRecordRepository::without_unique_index`].
pub struct InMemoryRecordRepository {
    rows: RefCell<Vec<Record>>,
    enforce_unique: bool,
    racing_codes: RefCell<Vec<SequenceCode>>,
    failing_updates: RefCell<HashSet<RecordId>>,
    inserts_attempted: Cell<u32>,
    clock: Cell<i64>,
}

impl InMemoryRecordRepository {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            enforce_unique: true,
            racing_codes: RefCell::new(Vec::new()),
            failing_updates: RefCell::new(HashSet::new()),
            inserts_attempted: Cell::new(0),
            clock: Cell::new(1_000),
        }
    }

    pub fn without_unique_index() -> Self {
        Self {
            enforce_unique: false,
            ..Self::new()
        }
    }

    /// Stores a row directly, bypassing uniqueness (legacy data).
    pub fn seed(&self, code: &str) -> RecordId {
        let code = SequenceCode::parse(code).expect("seed code should be well-formed");
        self.push(NewRecord::new(code, &RecordDraft::new("seeded")))
    }

    /// Makes a competing writer commit `code` right before each of the next
    /// inserts, one code per insert.
    pub fn race_next_inserts_with(&self, codes: &[&str]) {
        let mut racing = self.racing_codes.borrow_mut();
        for code in codes.iter().rev() {
            racing.push(SequenceCode::parse(code).expect("racing code should be well-formed"));
        }
    }

    pub fn fail_updates_for(&self, id: RecordId) {
        self.failing_updates.borrow_mut().insert(id);
    }

    pub fn inserts_attempted(&self) -> u32 {
        self.inserts_attempted.get()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn code_of(&self, id: RecordId) -> String {
        self.rows
            .borrow()
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.code.to_string())
            .expect("record should exist")
    }

    fn push(&self, record: NewRecord) -> RecordId {
        let now = self.clock.get();
        self.clock.set(now + 1);
        let id = record.id;
        self.rows.borrow_mut().push(Record {
            id,
            code: record.code,
            title: record.title,
            body: record.body,
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn holds(&self, code: &SequenceCode, except: Option<RecordId>) -> bool {
        self.rows
            .borrow()
            .iter()
            .any(|row| &row.code == code && Some(row.id) != except)
    }
}

impl RecordRepository for InMemoryRecordRepository {
    fn insert_record(&self, record: &NewRecord) -> RepoResult<RecordId> {
        self.inserts_attempted.set(self.inserts_attempted.get() + 1);

        let racing = self.racing_codes.borrow_mut().pop();
        if let Some(code) = racing {
            self.push(NewRecord::new(code, &RecordDraft::new("competitor")));
        }

        if self.enforce_unique && self.holds(&record.code, None) {
            return Err(RepoError::DuplicateCode(record.code.clone()));
        }
        Ok(self.push(record.clone()))
    }

    fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        Ok(self.rows.borrow().iter().find(|row| row.id == id).cloned())
    }

    fn find_by_code(&self, code: &SequenceCode) -> RepoResult<Option<Record>> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .find(|row| &row.code == code)
            .cloned())
    }

    fn code_exists(&self, code: &SequenceCode) -> RepoResult<bool> {
        Ok(self.holds(code, None))
    }

    fn list_codes(&self) -> RepoResult<Vec<CodeAssignment>> {
        Ok(self
            .rows
            .borrow()
            .iter()
            .map(|row| CodeAssignment {
                record_id: row.id,
                code: row.code.clone(),
            })
            .collect())
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        let rows = self.rows.borrow();
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        Ok(rows
            .iter()
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }

    fn update_fields(&self, id: RecordId, title: &str, body: Option<&str>) -> RepoResult<()> {
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(RepoError::NotFound(id))?;
        row.title = title.to_string();
        row.body = body.map(str::to_string);
        Ok(())
    }

    fn update_code(&self, id: RecordId, code: &SequenceCode) -> RepoResult<()> {
        if self.failing_updates.borrow().contains(&id) {
            return Err(RepoError::InvalidData(format!("injected write failure for {id}")));
        }
        if self.enforce_unique && self.holds(code, Some(id)) {
            return Err(RepoError::DuplicateCode(code.clone()));
        }
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(RepoError::NotFound(id))?;
        row.code = code.clone();
        Ok(())
    }

    fn delete_record(&self, id: RecordId) -> RepoResult<()> {
        let mut rows = self.rows.borrow_mut();
        let before = rows.len();
        rows.retain(|row| row.id != id);
        if rows.len() == before {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

pub fn unknown_id() -> RecordId {
    Uuid::new_v4()
}
