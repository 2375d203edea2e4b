use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use eligibility_core::{
    classify, filter, status_for, summarize, BillingRecord, EligibilityConfig, EligibilityError,
    EligibilityFilter, EligibilityReport, EligibilityStatus, PayorCategory, ServiceType,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 15, 30, 0).unwrap()
}

fn days_ago(days: i64) -> NaiveDate {
    now().date_naive() - Duration::days(days)
}

fn record(name: &str, days: i64, tag: &str, payor: Option<&str>) -> BillingRecord {
    BillingRecord {
        patient_id: None,
        patient_name: Some(name.to_string()),
        service_date: Some(days_ago(days)),
        service_tag: tag.to_string(),
        payor_hint: payor.map(str::to_string),
    }
}

#[test]
fn single_ultrasound_past_cooldown_is_eligible() {
    let records = vec![record("Jane Doe", 200, "ULTRASOUND", None)];

    let result = classify(&records, now(), &EligibilityConfig::default())
        .expect("Không phân loại được");

    assert_eq!(result.len(), 1);
    let entry = &result[0];
    assert_eq!(entry.status, EligibilityStatus::Eligible);
    assert_eq!(entry.days_since_service, 200);
    assert_eq!(entry.payor_category, PayorCategory::Ppo);
    assert_eq!(entry.cooldown_days, 180);
    assert_eq!(entry.service_type, ServiceType::Ultrasound);
    assert_eq!(entry.patient_name, "Jane Doe");
}

#[test]
fn classification_is_repeatable() {
    let records = vec![
        record("Jane Doe", 200, "Ultrasound carotid", None),
        record("John Roe", 500, "BrainWave", Some("Medicare Part B")),
        record("Ann Poe", 170, "vital wave", Some("Aetna PPO")),
    ];
    let config = EligibilityConfig::default();

    let first = classify(&records, now(), &config).expect("Không phân loại được");
    let second = classify(&records, now(), &config).expect("Không phân loại được");

    assert_eq!(first, second);
}

#[test]
fn keeps_only_latest_service_per_patient_and_type() {
    let records = vec![
        record("Jane Doe", 200, "ULTRASOUND", None),
        record("jane  doe", 190, "Ultrasound follow-up", None),
        record("Jane Doe", 400, "ultrasound", None),
        record("Jane Doe", 300, "BrainWave", None),
    ];

    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert_eq!(result.len(), 2);
    let ultrasound = result
        .iter()
        .find(|entry| entry.service_type == ServiceType::Ultrasound)
        .expect("Thiếu kết quả ultrasound");
    assert_eq!(ultrasound.last_service_date, days_ago(190));
    assert_eq!(ultrasound.days_since_service, 190);

    let mut keys: Vec<_> = result
        .iter()
        .map(|entry| (entry.patient_key.clone(), entry.service_type))
        .collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), result.len());
}

#[test]
fn stable_identifier_takes_precedence_over_name() {
    let mut first = record("Jane Doe", 200, "ultrasound", None);
    first.patient_id = Some("7c9e6679-7425-40de-944b-e07fc1f90ae7".to_string());
    let mut second = record("Jane Doe", 250, "ultrasound", None);
    second.patient_id = Some("a5f0f4a2-2b1e-4a39-9f61-1c43d2b9a0d1".to_string());

    let result = classify(&[first, second], now(), &EligibilityConfig::default())
        .expect("Không phân loại được");

    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|entry| entry.patient_key.starts_with("id:")));
}

#[test]
fn cooldown_boundary_is_inclusive() {
    let config = EligibilityConfig::default();

    assert_eq!(status_for(180, 180, &config), Some(EligibilityStatus::Eligible));
    assert_eq!(status_for(179, 180, &config), Some(EligibilityStatus::DueSoon));
    assert_eq!(status_for(150, 180, &config), Some(EligibilityStatus::DueSoon));
    assert_eq!(status_for(149, 180, &config), None);
    assert_eq!(status_for(270, 180, &config), Some(EligibilityStatus::Eligible));
    assert_eq!(status_for(271, 180, &config), Some(EligibilityStatus::Overdue));
}

#[test]
fn not_yet_due_records_are_excluded() {
    let records = vec![
        record("Jane Doe", 179, "ultrasound", None),
        record("John Roe", 100, "ultrasound", None),
    ];

    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].patient_name, "Jane Doe");
    assert_eq!(result[0].status, EligibilityStatus::DueSoon);
}

#[test]
fn unknown_services_and_incomplete_records_are_dropped() {
    let mut undated = record("Jane Doe", 200, "ultrasound", None);
    undated.service_date = None;
    let mut anonymous = record("   ", 200, "ultrasound", None);
    anonymous.patient_id = Some(String::new());

    let records = vec![
        record("Jane Doe", 200, "Echocardiogram", None),
        undated,
        anonymous,
    ];

    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert!(result.is_empty());
}

#[test]
fn medicare_hint_selects_longer_cooldown() {
    let records = vec![
        record("Jane Doe", 200, "ultrasound", Some("MEDICARE")),
        record("John Roe", 200, "ultrasound", Some("Blue Cross")),
    ];

    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].patient_name, "John Roe");
    assert_eq!(result[0].payor_category, PayorCategory::Ppo);

    let later = vec![record("Jane Doe", 340, "ultrasound", Some("medicare advantage"))];
    let result =
        classify(&later, now(), &EligibilityConfig::default()).expect("Không phân loại được");
    assert_eq!(result[0].payor_category, PayorCategory::Medicare);
    assert_eq!(result[0].cooldown_days, 365);
    assert_eq!(result[0].status, EligibilityStatus::DueSoon);
}

#[test]
fn overdue_entries_sort_first_by_elapsed_days() {
    let records = vec![
        record("Eligible Patient", 200, "ultrasound", None),
        record("Overdue Recent", 300, "brainwave", None),
        record("Overdue Oldest", 600, "vitalwave", None),
    ];

    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    let names: Vec<_> = result.iter().map(|entry| entry.patient_name.as_str()).collect();
    assert_eq!(names, ["Overdue Oldest", "Overdue Recent", "Eligible Patient"]);
    assert_eq!(result[0].status, EligibilityStatus::Overdue);
    assert_eq!(result[1].status, EligibilityStatus::Overdue);
}

#[test]
fn future_service_dates_clamp_to_zero_days() {
    let mut config = EligibilityConfig::default();
    config.cooldowns.ppo_days = 10;
    config.grace_window_days = 10;

    let records = vec![record("Jane Doe", -5, "ultrasound", None)];
    let result = classify(&records, now(), &config).expect("Không phân loại được");

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].days_since_service, 0);
    assert_eq!(result[0].status, EligibilityStatus::DueSoon);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = EligibilityConfig::default();
    config.grace_window_days = 400;

    let err = classify(&[], now(), &config).unwrap_err();
    assert!(matches!(err, EligibilityError::InvalidConfig(_)));

    let mut config = EligibilityConfig::default();
    config.cooldowns.medicare_days = 0;
    assert!(config.validate().is_err());

    let mut config = EligibilityConfig::default();
    config.cooldowns.ppo_days = 400;
    config.cooldowns.medicare_days = 100;
    let records = vec![record("Jane Doe", 200, "ultrasound", None)];
    assert!(matches!(
        classify(&records, now(), &config),
        Err(EligibilityError::InvalidConfig(_))
    ));

    let mut config = EligibilityConfig::default();
    config.cooldowns.ppo_days = 365;
    assert!(config.validate().is_ok());
}

#[test]
fn same_date_records_keep_the_later_one() {
    let records = vec![
        record("Jane Doe", 200, "ultrasound", Some("Medicare")),
        record("Jane Doe", 200, "ultrasound", Some("Cigna PPO")),
    ];
    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].payor_category, PayorCategory::Ppo);
    assert_eq!(result[0].status, EligibilityStatus::Eligible);

    let reversed: Vec<_> = records.into_iter().rev().collect();
    let result =
        classify(&reversed, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    assert!(result.is_empty());
}

#[test]
fn equal_days_order_by_patient_then_catalog() {
    let records = vec![
        record("Zed", 200, "ultrasound", None),
        record("Amy", 200, "vitalwave", None),
        record("Amy", 200, "brainwave", None),
    ];
    let result =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    let order: Vec<_> = result
        .iter()
        .map(|entry| (entry.patient_name.as_str(), entry.service_type))
        .collect();
    assert_eq!(
        order,
        [
            ("Amy", ServiceType::BrainWave),
            ("Amy", ServiceType::VitalWave),
            ("Zed", ServiceType::Ultrasound),
        ]
    );
}

#[test]
fn filter_combines_criteria() {
    let records = vec![
        record("Jane Doe", 200, "ultrasound", None),
        record("Janet Smith", 200, "brainwave", None),
        record("John Roe", 600, "ultrasound", None),
    ];
    let classified =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");

    let by_text = filter(
        &classified,
        &EligibilityFilter {
            text_query: Some("JANE".to_string()),
            ..EligibilityFilter::default()
        },
    );
    assert_eq!(by_text.len(), 2);

    let combined = filter(
        &classified,
        &EligibilityFilter {
            text_query: Some("jane".to_string()),
            service_type: Some(ServiceType::Ultrasound),
            status: Some(EligibilityStatus::Eligible),
        },
    );
    assert_eq!(combined.len(), 1);
    assert_eq!(combined[0].patient_name, "Jane Doe");

    let blank = filter(
        &classified,
        &EligibilityFilter {
            text_query: Some("  ".to_string()),
            ..EligibilityFilter::default()
        },
    );
    assert_eq!(blank, classified);
}

#[test]
fn summary_counts_statuses_and_services() {
    let records = vec![
        record("Jane Doe", 200, "ultrasound", None),
        record("John Roe", 600, "ultrasound", None),
        record("Ann Poe", 160, "vitalwave", None),
    ];

    let report = EligibilityReport::new(&records, now(), &EligibilityConfig::default())
        .expect("Không tạo được báo cáo");

    assert_eq!(report.generated_at, now());
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.eligible, 1);
    assert_eq!(report.summary.overdue, 1);
    assert_eq!(report.summary.due_soon, 1);

    let ultrasound = report
        .summary
        .by_service
        .iter()
        .find(|entry| entry.service_type == ServiceType::Ultrasound)
        .expect("Thiếu số liệu ultrasound");
    assert_eq!(ultrasound.count, 2);

    let overdue_only = report.filtered(&EligibilityFilter {
        status: Some(EligibilityStatus::Overdue),
        ..EligibilityFilter::default()
    });
    assert_eq!(overdue_only.summary, summarize(&overdue_only.records));
    assert_eq!(overdue_only.summary.total, 1);

    let classified =
        classify(&records, now(), &EligibilityConfig::default()).expect("Không phân loại được");
    assert_eq!(EligibilityReport::from_classified(classified, now()), report);
}

#[test]
fn enums_parse_from_user_input() {
    assert_eq!("Brain Wave".parse::<ServiceType>().ok(), Some(ServiceType::BrainWave));
    assert_eq!("ULTRASOUND".parse::<ServiceType>().ok(), Some(ServiceType::Ultrasound));
    assert!("mri".parse::<ServiceType>().is_err());
    assert_eq!("due-soon".parse::<EligibilityStatus>().ok(), Some(EligibilityStatus::DueSoon));
    assert_eq!("Overdue".parse::<EligibilityStatus>().ok(), Some(EligibilityStatus::Overdue));

    let json = serde_json::to_string(&EligibilityStatus::DueSoon).expect("Không serialize");
    assert_eq!(json, "\"due_soon\"");
}
