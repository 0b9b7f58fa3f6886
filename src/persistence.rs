//! Record storage that outlives the process.
//!
//! The [`DurableStore`](crate::DurableStore) keeps its sessions in a [`Persistence`] collaborator.
//! Two tables are provided: [`MemoryTable`] for tests and single-process setups,
//! and [`FileTable`], which keeps all records in one JSON file that several processes can share.

use crate::session::SessionRecord;
use crate::{Error, Result};
use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// The fields of a serialised [`SessionRecord`] that a [`RecordFilter`] may name.
pub const SESSION_RECORD_FIELDS: [&str; 3] = ["session_id", "user_id", "created_at"];

/// A store of session records that can be searched by field values.
#[async_trait]
pub trait Persistence: Debug + Send + Sync {
    /// All records matching `filter`.
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>>;

    /// Insert `record` unless a record with the same session id exists.
    ///
    /// Returns false, and leaves the table untouched, if the session id is taken.
    /// The check and the insertion must not be interleaved with other writes.
    async fn insert(&self, record: &SessionRecord) -> Result<bool>;

    /// Insert `record`, replacing a record with the same session id.
    async fn save(&self, record: &SessionRecord) -> Result;

    /// Remove the record with the session id of `record`, if any.
    async fn remove(&self, record: &SessionRecord) -> Result;
}

#[async_trait]
impl<P: Persistence + ?Sized> Persistence for Arc<P> {
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>> {
        (**self).search(filter).await
    }

    async fn insert(&self, record: &SessionRecord) -> Result<bool> {
        (**self).insert(record).await
    }

    async fn save(&self, record: &SessionRecord) -> Result {
        (**self).save(record).await
    }

    async fn remove(&self, record: &SessionRecord) -> Result {
        (**self).remove(record).await
    }
}

/// Equality conditions on record fields, all of which must hold.
///
/// Fields are named as in the serialised record, e.g. `session_id` or `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    conditions: Vec<(String, String)>,
}

impl RecordFilter {
    /// A filter matching every record.
    pub fn any() -> Self {
        Self::default()
    }

    /// Additionally require `field` to equal `value`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Check that every condition names a field of [`SessionRecord`], one of
    /// [`SESSION_RECORD_FIELDS`]. Otherwise fails with [`Error::InvalidFilterField`].
    pub fn validate(&self) -> Result {
        match self
            .conditions
            .iter()
            .find(|(field, _)| !SESSION_RECORD_FIELDS.contains(&field.as_str()))
        {
            Some((field, _)) => Err(Error::InvalidFilterField {
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Returns true if `record` satisfies all conditions.
    ///
    /// Fails with [`Error::InvalidFilterField`] if a condition names a field records do not have.
    pub fn matches(&self, record: &SessionRecord) -> Result<bool> {
        self.validate()?;
        if self.conditions.is_empty() {
            return Ok(true);
        }

        let value = serde_json::to_value(record).map_err(Error::store_fault)?;
        let Value::Object(fields) = value else {
            return Err(Error::store_fault(anyhow::anyhow!(
                "session records must serialise to objects"
            )));
        };

        for (field, expected) in &self.conditions {
            let matched = match fields.get(field) {
                None => {
                    return Err(Error::InvalidFilterField {
                        field: field.clone(),
                    })
                }
                Some(Value::Null) => false,
                Some(Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
            };
            if !matched {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn select<'a>(
        &self,
        records: impl IntoIterator<Item = &'a SessionRecord>,
    ) -> Result<Vec<SessionRecord>> {
        self.validate()?;
        let mut selected = Vec::new();
        for record in records {
            if self.matches(record)? {
                selected.push(record.clone());
            }
        }
        Ok(selected)
    }
}

fn insert_new(records: &mut Vec<SessionRecord>, record: &SessionRecord) -> bool {
    if records
        .iter()
        .any(|existing| existing.session_id == record.session_id)
    {
        return false;
    }
    records.push(record.clone());
    true
}

fn upsert(records: &mut Vec<SessionRecord>, record: &SessionRecord) {
    match records
        .iter_mut()
        .find(|existing| existing.session_id == record.session_id)
    {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
}

/// An in-process table of session records.
#[derive(Debug, Default)]
pub struct MemoryTable {
    records: RwLock<Vec<SessionRecord>>,
}

impl MemoryTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Default::default()
    }

    /// The number of records in the table.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if the table holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl Persistence for MemoryTable {
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>> {
        filter.select(self.records.read().await.iter())
    }

    async fn insert(&self, record: &SessionRecord) -> Result<bool> {
        Ok(insert_new(&mut *self.records.write().await, record))
    }

    async fn save(&self, record: &SessionRecord) -> Result {
        upsert(&mut *self.records.write().await, record);
        Ok(())
    }

    async fn remove(&self, record: &SessionRecord) -> Result {
        self.records
            .write()
            .await
            .retain(|existing| existing.session_id != record.session_id);
        Ok(())
    }
}

/// A table of session records kept in a JSON file.
///
/// Every operation reads the file, and every write rewrites it, so processes sharing the file
/// see each other's sessions. Writes within one process are serialised; writes from different
/// processes are not coordinated. The file is replaced by renaming a complete temporary file
/// from the same directory over it, so readers never see a partial file.
#[derive(Debug)]
pub struct FileTable {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTable {
    /// Use the file at `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<SessionRecord>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(Error::store_fault(error)),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(Error::store_fault)
    }

    fn store(&self, records: &[SessionRecord]) -> Result {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(Error::store_fault)?;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            serde_json::to_writer(&mut writer, records).map_err(Error::store_fault)?;
            writer.flush().map_err(Error::store_fault)?;
        }
        file.persist(&self.path).map_err(|error| Error::store_fault(error.error))?;
        Ok(())
    }
}

#[async_trait]
impl Persistence for FileTable {
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>> {
        let _guard = self.lock.lock().await;
        filter.select(self.load()?.iter())
    }

    async fn insert(&self, record: &SessionRecord) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load()?;
        if !insert_new(&mut records, record) {
            return Ok(false);
        }
        self.store(&records)?;
        Ok(true)
    }

    async fn save(&self, record: &SessionRecord) -> Result {
        let _guard = self.lock.lock().await;
        let mut records = self.load()?;
        upsert(&mut records, record);
        self.store(&records)
    }

    async fn remove(&self, record: &SessionRecord) -> Result {
        let _guard = self.lock.lock().await;
        let mut records = self.load()?;
        records.retain(|existing| existing.session_id != record.session_id);
        self.store(&records)
    }
}
