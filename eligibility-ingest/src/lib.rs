//! Billing export JSON to canonical `BillingRecord`s, with one-call report helpers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use eligibility_core::{BillingRecord, EligibilityConfig, EligibilityError, EligibilityReport};
use serde_json::{Map, Value};
use tracing::{debug, trace};

const ROW_CONTAINERS: [&str; 3] = ["records", "data", "rows"];

const PATIENT_ID_FIELDS: [&str; 5] = [
    "patient_uuid",
    "patientUuid",
    "patient_id",
    "patientId",
    "patientIdentifier",
];

const PATIENT_NAME_FIELDS: [&str; 4] = ["patient_name", "patientName", "patient", "name"];

const SERVICE_DATE_FIELDS: [&str; 6] = [
    "date_of_service",
    "dateOfService",
    "service_date",
    "serviceDate",
    "dos",
    "date",
];

const SERVICE_TAG_FIELDS: [&str; 7] = [
    "service_tag",
    "serviceTag",
    "service_type",
    "serviceType",
    "service",
    "notes",
    "description",
];

const PAYOR_FIELDS: [&str; 6] = [
    "payor_hint",
    "payorHint",
    "insurance",
    "insurance_type",
    "payor",
    "payer",
];

/// Parse billing rows from a JSON string.
pub fn parse_records_str(json: &str) -> Result<Vec<BillingRecord>, EligibilityError> {
    let value: Value =
        serde_json::from_str(json).map_err(|err| EligibilityError::Parse(err.to_string()))?;
    parse_records_value(&value)
}

/// Parse billing rows from a `serde_json::Value`.
///
/// Accepts a bare array or an object carrying the array under `records`,
/// `data` or `rows`. Array elements that are not objects are skipped.
pub fn parse_records_value(value: &Value) -> Result<Vec<BillingRecord>, EligibilityError> {
    let rows = locate_rows(value)?;

    let records: Vec<BillingRecord> = rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| match row.as_object() {
            Some(fields) => Some(normalize_row(fields)),
            None => {
                trace!(index, "Skipping non-object billing row");
                None
            }
        })
        .collect();

    debug!(
        rows = rows.len(),
        normalized = records.len(),
        "Normalized billing rows"
    );

    Ok(records)
}

/// Parse and classify a JSON export in one step.
pub fn build_report_str(
    json: &str,
    now: DateTime<Utc>,
    config: &EligibilityConfig,
) -> Result<EligibilityReport, EligibilityError> {
    let records = parse_records_str(json)?;
    EligibilityReport::new(&records, now, config)
}

pub fn build_report_value(
    value: &Value,
    now: DateTime<Utc>,
    config: &EligibilityConfig,
) -> Result<EligibilityReport, EligibilityError> {
    let records = parse_records_value(value)?;
    EligibilityReport::new(&records, now, config)
}

/// Map every known alias of a row onto the canonical record fields.
pub fn normalize_row(fields: &Map<String, Value>) -> BillingRecord {
    BillingRecord {
        patient_id: first_text(fields, &PATIENT_ID_FIELDS),
        patient_name: first_text(fields, &PATIENT_NAME_FIELDS),
        service_date: first_date(fields, &SERVICE_DATE_FIELDS),
        service_tag: first_text(fields, &SERVICE_TAG_FIELDS).unwrap_or_default(),
        payor_hint: first_text(fields, &PAYOR_FIELDS),
    }
}

/// Parse the date forms seen in billing exports.
pub fn parse_service_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }

    parse_us_date(value)
}

fn parse_us_date(value: &str) -> Option<NaiveDate> {
    let year = value.rsplit('/').next()?;
    let format = match year.len() {
        2 => "%m/%d/%y",
        4 => "%m/%d/%Y",
        _ => return None,
    };
    NaiveDate::parse_from_str(value, format).ok()
}

fn locate_rows(value: &Value) -> Result<&Vec<Value>, EligibilityError> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(obj) => ROW_CONTAINERS
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array))
            .ok_or_else(|| {
                EligibilityError::InvalidInput(
                    "expected an object carrying `records`, `data` or `rows` as an array"
                        .to_string(),
                )
            }),
        other => Err(EligibilityError::InvalidInput(format!(
            "expected an array of billing records, received {}",
            json_kind(other)
        ))),
    }
}

fn first_text(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .find_map(value_text)
}

fn first_date(fields: &Map<String, Value>, aliases: &[&str]) -> Option<NaiveDate> {
    aliases
        .iter()
        .filter_map(|alias| fields.get(*alias))
        .filter_map(Value::as_str)
        .find_map(parse_service_date)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
