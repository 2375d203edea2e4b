//! Logic lõi phân loại điều kiện thực hiện lại dịch vụ cận lâm sàng.

mod store;

pub use store::{classify_store, BillingRecordStore, InMemoryRecordStore, RecordId, StoreError};

use std::cmp::Ordering;
use std::collections::{hash_map::Entry, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Thời gian chờ (ngày) giữa hai lần thực hiện cùng dịch vụ, theo nhóm bảo hiểm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CooldownTable {
    pub ppo_days: u32,
    pub medicare_days: u32,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self {
            ppo_days: 180,
            medicare_days: 365,
        }
    }
}

impl CooldownTable {
    /// Thời gian chờ áp dụng cho một nhóm bảo hiểm.
    pub fn days_for(&self, category: PayorCategory) -> u32 {
        match category {
            PayorCategory::Ppo => self.ppo_days,
            PayorCategory::Medicare => self.medicare_days,
        }
    }

    fn shortest(&self) -> u32 {
        self.ppo_days.min(self.medicare_days)
    }
}

/// Cấu hình các ngưỡng phân loại.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EligibilityConfig {
    pub cooldowns: CooldownTable,
    /// Số ngày trước khi hết thời gian chờ được coi là "sắp đến hạn".
    pub grace_window_days: u32,
    /// Số ngày sau khi hết thời gian chờ mà bệnh nhân chuyển sang "quá hạn".
    pub overdue_window_days: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            cooldowns: CooldownTable::default(),
            grace_window_days: 30,
            overdue_window_days: 90,
        }
    }
}

impl EligibilityConfig {
    /// Kiểm tra cấu hình trước khi phân loại.
    pub fn validate(&self) -> Result<(), EligibilityError> {
        if self.cooldowns.ppo_days == 0 || self.cooldowns.medicare_days == 0 {
            return Err(EligibilityError::InvalidConfig(
                "thời gian chờ phải lớn hơn 0 ngày".to_string(),
            ));
        }

        if self.cooldowns.ppo_days > self.cooldowns.medicare_days {
            return Err(EligibilityError::InvalidConfig(format!(
                "ppo_days ({}) phải không lớn hơn medicare_days ({})",
                self.cooldowns.ppo_days, self.cooldowns.medicare_days
            )));
        }

        let shortest = self.cooldowns.shortest();
        if self.grace_window_days > shortest {
            return Err(EligibilityError::InvalidConfig(format!(
                "grace_window_days ({}) vượt quá thời gian chờ ngắn nhất ({shortest})",
                self.grace_window_days
            )));
        }

        Ok(())
    }
}

/// Danh mục dịch vụ cận lâm sàng được theo dõi.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    BrainWave,
    VitalWave,
    Ultrasound,
}

impl ServiceType {
    /// Toàn bộ danh mục, theo thứ tự ưu tiên khi so khớp.
    pub const ALL: [ServiceType; 3] = [
        ServiceType::BrainWave,
        ServiceType::VitalWave,
        ServiceType::Ultrasound,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ServiceType::BrainWave => "BrainWave",
            ServiceType::VitalWave => "VitalWave",
            ServiceType::Ultrasound => "Ultrasound",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            ServiceType::BrainWave => &["brainwave", "brain wave"],
            ServiceType::VitalWave => &["vitalwave", "vital wave"],
            ServiceType::Ultrasound => &["ultrasound"],
        }
    }

    /// Suy ra loại dịch vụ từ nhãn tự do; `None` nếu không thuộc danh mục.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let lower = tag.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|service| service.keywords().iter().any(|kw| lower.contains(kw)))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for ServiceType {
    type Err = EligibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        match compact.as_str() {
            "brainwave" => Ok(ServiceType::BrainWave),
            "vitalwave" => Ok(ServiceType::VitalWave),
            "ultrasound" => Ok(ServiceType::Ultrasound),
            _ => Err(EligibilityError::Parse(format!(
                "loại dịch vụ không hợp lệ: {s}"
            ))),
        }
    }
}

/// Nhóm bảo hiểm, chỉ dùng để chọn thời gian chờ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PayorCategory {
    Ppo,
    Medicare,
}

impl PayorCategory {
    /// Mặc định là PPO khi không có thông tin hoặc không khớp "medicare".
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some(text) if text.to_lowercase().contains("medicare") => PayorCategory::Medicare,
            _ => PayorCategory::Ppo,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PayorCategory::Ppo => "PPO",
            PayorCategory::Medicare => "Medicare",
        }
    }
}

impl fmt::Display for PayorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Trạng thái điều kiện của một cặp bệnh nhân × dịch vụ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    DueSoon,
    Overdue,
}

impl EligibilityStatus {
    pub fn label(self) -> &'static str {
        match self {
            EligibilityStatus::Eligible => "Eligible",
            EligibilityStatus::DueSoon => "Due soon",
            EligibilityStatus::Overdue => "Overdue",
        }
    }
}

impl fmt::Display for EligibilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for EligibilityStatus {
    type Err = EligibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "eligible" => Ok(EligibilityStatus::Eligible),
            "due_soon" | "duesoon" => Ok(EligibilityStatus::DueSoon),
            "overdue" => Ok(EligibilityStatus::Overdue),
            _ => Err(EligibilityError::Parse(format!(
                "trạng thái không hợp lệ: {s}"
            ))),
        }
    }
}

/// Bản ghi billing đã chuẩn hóa tên trường.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BillingRecord {
    /// Định danh ổn định (UUID) nếu nguồn dữ liệu có.
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub service_tag: String,
    #[serde(default)]
    pub payor_hint: Option<String>,
}

impl BillingRecord {
    /// Khóa gom nhóm bệnh nhân: ưu tiên định danh ổn định, sau đó tới tên đã chuẩn hóa.
    pub fn patient_key(&self) -> Option<String> {
        if let Some(id) = non_blank(self.patient_id.as_deref()) {
            return Some(format!("id:{id}"));
        }

        non_blank(self.patient_name.as_deref())
            .map(|name| format!("name:{}", normalize_name(name)))
    }

    /// Tên hiển thị; dùng định danh khi không có tên.
    pub fn display_name(&self) -> Option<String> {
        non_blank(self.patient_name.as_deref())
            .or_else(|| non_blank(self.patient_id.as_deref()))
            .map(str::to_string)
    }

    pub fn service_type(&self) -> Option<ServiceType> {
        ServiceType::from_tag(&self.service_tag)
    }

    pub fn payor_category(&self) -> PayorCategory {
        PayorCategory::from_hint(self.payor_hint.as_deref())
    }
}

/// Kết quả phân loại cho một cặp bệnh nhân × dịch vụ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EligibilityRecord {
    /// Khóa bệnh nhân, dùng để điều hướng tới hồ sơ.
    pub patient_key: String,
    pub patient_name: String,
    pub service_type: ServiceType,
    pub last_service_date: NaiveDate,
    pub days_since_service: i64,
    pub payor_category: PayorCategory,
    pub cooldown_days: u32,
    pub status: EligibilityStatus,
}

/// Điều kiện lọc; các tiêu chí kết hợp theo AND.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EligibilityFilter {
    #[serde(default)]
    pub text_query: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub status: Option<EligibilityStatus>,
}

impl EligibilityFilter {
    pub fn matches(&self, record: &EligibilityRecord) -> bool {
        if let Some(service) = self.service_type {
            if record.service_type != service {
                return false;
            }
        }

        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }

        match non_blank(self.text_query.as_deref()) {
            Some(query) => record
                .patient_name
                .to_lowercase()
                .contains(&query.to_lowercase()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceCount {
    pub service_type: ServiceType,
    pub count: usize,
}

/// Số liệu tổng hợp hiển thị trên đầu bảng điều khiển.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EligibilitySummary {
    pub total: usize,
    pub eligible: usize,
    pub due_soon: usize,
    pub overdue: usize,
    pub by_service: Vec<ServiceCount>,
}

/// Kết quả tổng hợp cuối cùng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EligibilityReport {
    pub generated_at: DateTime<Utc>,
    pub summary: EligibilitySummary,
    pub records: Vec<EligibilityRecord>,
}

impl EligibilityReport {
    /// Phân loại và đóng gói báo cáo tại thời điểm `now`.
    pub fn new(
        records: &[BillingRecord],
        now: DateTime<Utc>,
        config: &EligibilityConfig,
    ) -> Result<Self, EligibilityError> {
        let records = classify(records, now, config)?;
        Ok(Self::from_classified(records, now))
    }

    /// Đóng gói các bản ghi đã phân loại sẵn (ví dụ từ `classify_store`).
    pub fn from_classified(records: Vec<EligibilityRecord>, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            summary: summarize(&records),
            records,
        }
    }

    /// Báo cáo chỉ chứa các bản ghi khớp bộ lọc; số liệu được tính lại.
    pub fn filtered(&self, predicate: &EligibilityFilter) -> Self {
        let records = filter(&self.records, predicate);
        Self {
            generated_at: self.generated_at,
            summary: summarize(&records),
            records,
        }
    }
}

/// Lỗi chung khi phân loại.
#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    #[error("Dữ liệu đầu vào không hợp lệ: {0}")]
    InvalidInput(String),
    #[error("Cấu hình không hợp lệ: {0}")]
    InvalidConfig(String),
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Phân loại danh sách bản ghi billing tại thời điểm `now`.
///
/// Bản ghi thiếu ngày, không xác định được bệnh nhân hoặc không thuộc danh mục
/// dịch vụ bị bỏ qua. Mỗi cặp bệnh nhân × dịch vụ chỉ giữ bản ghi mới nhất;
/// khi trùng ngày, bản ghi đứng sau thắng.
pub fn classify(
    records: &[BillingRecord],
    now: DateTime<Utc>,
    config: &EligibilityConfig,
) -> Result<Vec<EligibilityRecord>, EligibilityError> {
    if let Err(err) = config.validate() {
        warn!(error = %err, "Từ chối phân loại do cấu hình sai");
        return Err(err);
    }

    let mut latest: HashMap<(String, ServiceType), Candidate> = HashMap::new();
    let mut skipped = 0usize;

    for (index, record) in records.iter().enumerate() {
        let candidate = match Candidate::from_record(record) {
            Ok(candidate) => candidate,
            Err(reason) => {
                skipped += 1;
                trace!(index, reason, "Bỏ qua bản ghi");
                continue;
            }
        };

        match latest.entry((candidate.patient_key.clone(), candidate.service_type)) {
            Entry::Occupied(mut slot) => {
                if candidate.service_date >= slot.get().service_date {
                    slot.insert(candidate);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
        }
    }

    let today = now.date_naive();
    let mut results: Vec<EligibilityRecord> = latest
        .into_values()
        .filter_map(|candidate| candidate.evaluate(today, config))
        .collect();
    results.sort_by(compare_records);

    debug!(
        input = records.len(),
        skipped,
        classified = results.len(),
        "Đã phân loại điều kiện dịch vụ"
    );

    Ok(results)
}

/// Xếp trạng thái theo số ngày đã trôi qua; `None` nghĩa là chưa đến hạn.
///
/// Đúng bằng thời gian chờ là đủ điều kiện; quá hạn khi vượt
/// `cooldown + overdue_window_days` (không bao gồm biên).
pub fn status_for(
    days_since_service: i64,
    cooldown_days: u32,
    config: &EligibilityConfig,
) -> Option<EligibilityStatus> {
    let cooldown = i64::from(cooldown_days);
    let grace = i64::from(config.grace_window_days);
    let overdue = i64::from(config.overdue_window_days);

    if days_since_service > cooldown + overdue {
        Some(EligibilityStatus::Overdue)
    } else if days_since_service >= cooldown {
        Some(EligibilityStatus::Eligible)
    } else if days_since_service >= cooldown - grace {
        Some(EligibilityStatus::DueSoon)
    } else {
        None
    }
}

pub fn filter(
    records: &[EligibilityRecord],
    predicate: &EligibilityFilter,
) -> Vec<EligibilityRecord> {
    records
        .iter()
        .filter(|record| predicate.matches(record))
        .cloned()
        .collect()
}

pub fn summarize(records: &[EligibilityRecord]) -> EligibilitySummary {
    let mut summary = EligibilitySummary {
        total: records.len(),
        by_service: ServiceType::ALL
            .into_iter()
            .map(|service_type| ServiceCount {
                service_type,
                count: 0,
            })
            .collect(),
        ..EligibilitySummary::default()
    };

    for record in records {
        match record.status {
            EligibilityStatus::Eligible => summary.eligible += 1,
            EligibilityStatus::DueSoon => summary.due_soon += 1,
            EligibilityStatus::Overdue => summary.overdue += 1,
        }

        if let Some(entry) = summary
            .by_service
            .iter_mut()
            .find(|entry| entry.service_type == record.service_type)
        {
            entry.count += 1;
        }
    }

    summary
}

struct Candidate {
    patient_key: String,
    patient_name: String,
    service_type: ServiceType,
    service_date: NaiveDate,
    payor: PayorCategory,
}

impl Candidate {
    fn from_record(record: &BillingRecord) -> Result<Self, &'static str> {
        let service_date = record.service_date.ok_or("thiếu ngày dịch vụ")?;
        let patient_key = record.patient_key().ok_or("thiếu thông tin bệnh nhân")?;
        let patient_name = record.display_name().ok_or("thiếu thông tin bệnh nhân")?;
        let service_type = record
            .service_type()
            .ok_or("dịch vụ không thuộc danh mục")?;

        Ok(Self {
            patient_key,
            patient_name,
            service_type,
            service_date,
            payor: record.payor_category(),
        })
    }

    fn evaluate(self, today: NaiveDate, config: &EligibilityConfig) -> Option<EligibilityRecord> {
        // Ngày dịch vụ sau `now` (lệch đồng hồ) được tính là 0 ngày.
        let days_since_service = today
            .signed_duration_since(self.service_date)
            .num_days()
            .max(0);
        let cooldown_days = config.cooldowns.days_for(self.payor);
        let status = status_for(days_since_service, cooldown_days, config)?;

        Some(EligibilityRecord {
            patient_key: self.patient_key,
            patient_name: self.patient_name,
            service_type: self.service_type,
            last_service_date: self.service_date,
            days_since_service,
            payor_category: self.payor,
            cooldown_days,
            status,
        })
    }
}

fn compare_records(a: &EligibilityRecord, b: &EligibilityRecord) -> Ordering {
    let not_overdue = |record: &EligibilityRecord| record.status != EligibilityStatus::Overdue;

    not_overdue(a)
        .cmp(&not_overdue(b))
        .then_with(|| b.days_since_service.cmp(&a.days_since_service))
        .then_with(|| a.patient_key.cmp(&b.patient_key))
        .then_with(|| a.service_type.cmp(&b.service_type))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
