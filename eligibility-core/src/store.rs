//! Kho bản ghi billing được truyền vào bộ phân loại thay cho dữ liệu toàn cục.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{classify, BillingRecord, EligibilityConfig, EligibilityError, EligibilityRecord};

/// Định danh bản ghi trong kho.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Không tìm thấy bản ghi {0}")]
    NotFound(RecordId),
}

/// Nguồn dữ liệu billing với vòng đời tường minh (tạo, đọc, xóa).
pub trait BillingRecordStore: Send + Sync {
    fn create(&self, record: BillingRecord) -> Result<RecordId, StoreError>;

    fn get(&self, id: RecordId) -> Result<Option<BillingRecord>, StoreError>;

    /// Xóa và trả về bản ghi đã xóa.
    fn delete(&self, id: RecordId) -> Result<BillingRecord, StoreError>;

    /// Ảnh chụp toàn bộ bản ghi theo thứ tự thêm vào.
    fn list(&self) -> Result<Vec<BillingRecord>, StoreError>;
}

#[derive(Default)]
struct StoreInner {
    next_seq: u64,
    records: HashMap<RecordId, (u64, BillingRecord)>,
}

/// Kho trong bộ nhớ, an toàn khi chia sẻ giữa các luồng.
#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.write().records.clear();
    }

    fn insert(&self, record: BillingRecord) -> RecordId {
        let id = RecordId::new();
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(id, (seq, record));
        id
    }
}

impl FromIterator<BillingRecord> for InMemoryRecordStore {
    fn from_iter<I: IntoIterator<Item = BillingRecord>>(iter: I) -> Self {
        let store = Self::new();
        for record in iter {
            store.insert(record);
        }
        store
    }
}

impl BillingRecordStore for InMemoryRecordStore {
    fn create(&self, record: BillingRecord) -> Result<RecordId, StoreError> {
        Ok(self.insert(record))
    }

    fn get(&self, id: RecordId) -> Result<Option<BillingRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .records
            .get(&id)
            .map(|(_, record)| record.clone()))
    }

    fn delete(&self, id: RecordId) -> Result<BillingRecord, StoreError> {
        self.inner
            .write()
            .records
            .remove(&id)
            .map(|(_, record)| record)
            .ok_or(StoreError::NotFound(id))
    }

    fn list(&self) -> Result<Vec<BillingRecord>, StoreError> {
        let inner = self.inner.read();
        let mut entries: Vec<&(u64, BillingRecord)> = inner.records.values().collect();
        entries.sort_by_key(|(seq, _)| *seq);
        Ok(entries.into_iter().map(|(_, record)| record.clone()).collect())
    }
}

/// Phân loại ảnh chụp hiện tại của kho.
pub fn classify_store<S>(
    store: &S,
    now: DateTime<Utc>,
    config: &EligibilityConfig,
) -> Result<Vec<EligibilityRecord>, EligibilityError>
where
    S: BillingRecordStore + ?Sized,
{
    let records = store.list()?;
    classify(&records, now, config)
}
