//! Bridge WASM <-> JavaScript cho lớp hiển thị bảng điều kiện dịch vụ.

use chrono::{DateTime, Utc};
use eligibility_core::{
    filter, EligibilityConfig, EligibilityError, EligibilityFilter, EligibilityRecord,
};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsEligibilityConfig {
    #[serde(default)]
    ppo_days: Option<u32>,
    #[serde(default)]
    medicare_days: Option<u32>,
    #[serde(default)]
    grace_window_days: Option<u32>,
    #[serde(default)]
    overdue_window_days: Option<u32>,
}

impl From<JsEligibilityConfig> for EligibilityConfig {
    fn from(cfg: JsEligibilityConfig) -> Self {
        let mut base = EligibilityConfig::default();
        if let Some(days) = cfg.ppo_days {
            base.cooldowns.ppo_days = days;
        }
        if let Some(days) = cfg.medicare_days {
            base.cooldowns.medicare_days = days;
        }
        if let Some(days) = cfg.grace_window_days {
            base.grace_window_days = days;
        }
        if let Some(days) = cfg.overdue_window_days {
            base.overdue_window_days = days;
        }
        base
    }
}

/// Phân loại danh sách bản ghi billing; `now_iso` là mốc thời gian RFC 3339 do JS truyền vào.
#[wasm_bindgen]
pub fn classify_records(
    records: JsValue,
    now_iso: String,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records_value = from_value::<serde_json::Value>(records)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được danh sách bản ghi: {err}")))?;

    let now = parse_now(&now_iso).map_err(|err| JsValue::from_str(&err))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsEligibilityConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            EligibilityConfig::from(cfg)
        }
        None => EligibilityConfig::default(),
    };

    let report = eligibility_ingest::build_report_value(&records_value, now, &cfg)
        .map_err(|err| JsValue::from_str(&format_eligibility_error(err)))?;

    to_value(&report).map_err(|err| JsValue::from_str(&format!("Không serialize báo cáo: {err}")))
}

/// Lọc kết quả đã phân loại theo từ khóa, loại dịch vụ và trạng thái.
#[wasm_bindgen]
pub fn filter_records(records: JsValue, predicate: JsValue) -> Result<JsValue, JsValue> {
    let records: Vec<EligibilityRecord> = from_value(records)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được kết quả phân loại: {err}")))?;
    let predicate: EligibilityFilter = from_value(predicate)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được bộ lọc: {err}")))?;

    to_value(&filter(&records, &predicate))
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("Mốc thời gian không hợp lệ ({value}): {err}"))
}

fn format_eligibility_error(err: EligibilityError) -> String {
    format!("Eligibility error: {err}")
}
