use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use eligibility_core::{
    classify_store, EligibilityConfig, EligibilityFilter,
    EligibilityReport, EligibilityStatus, InMemoryRecordStore, ServiceType,
};
use eligibility_ingest::parse_records_str;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "eligibility-cli",
    about = "Phân loại điều kiện thực hiện lại dịch vụ từ file export billing JSON."
)]
struct Args {
    /// Đường dẫn tới file JSON export billing.
    #[arg(short, long)]
    input: PathBuf,

    /// File JSON ghi đè cấu hình ngưỡng.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mốc thời gian tính toán (YYYY-MM-DD hoặc RFC 3339); mặc định là hiện tại.
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    /// Lọc theo tên bệnh nhân.
    #[arg(short, long)]
    query: Option<String>,

    #[arg(long)]
    service: Option<ServiceType>,

    #[arg(long)]
    status: Option<EligibilityStatus>,

    /// In báo cáo dạng JSON.
    #[arg(long)]
    json: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Không đọc được file {:?}", args.input))?;
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EligibilityConfig::default(),
    };
    let now = args.now.unwrap_or_else(Utc::now);

    let store: InMemoryRecordStore = parse_records_str(&data)?.into_iter().collect();
    info!(records = store.len(), %now, "Đã nạp dữ liệu billing");

    let classified = classify_store(&store, now, &config)?;
    let predicate = EligibilityFilter {
        text_query: args.query,
        service_type: args.service,
        status: args.status,
    };
    let report = EligibilityReport::from_classified(classified, now).filtered(&predicate);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    Ok(())
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("eligibility_cli={level},eligibility_core={level},eligibility_ingest={level}")
            .into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<EligibilityConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
    let config: EligibilityConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Cấu hình không hợp lệ trong {path:?}"))?;
    config.validate()?;
    Ok(config)
}

fn parse_now(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("Mốc thời gian không hợp lệ: {value}"))
}

fn print_table(report: &EligibilityReport) {
    let summary = &report.summary;
    println!(
        "Generated at: {}\nTotal: {} | Overdue: {} | Eligible: {} | Due soon: {}",
        report.generated_at, summary.total, summary.overdue, summary.eligible, summary.due_soon
    );
    for entry in &summary.by_service {
        println!("  {:<12} {}", entry.service_type, entry.count);
    }

    if report.records.is_empty() {
        println!("\nKhông có bệnh nhân nào khớp bộ lọc.");
        return;
    }

    println!(
        "\n{:<28} {:<12} {:<12} {:>6} {:<9} {:<9}",
        "Patient", "Service", "Last", "Days", "Payor", "Status"
    );
    for record in &report.records {
        println!(
            "{:<28} {:<12} {:<12} {:>6} {:<9} {:<9}",
            truncate(&record.patient_name, 28),
            record.service_type,
            record.last_service_date.to_string(),
            record.days_since_service,
            record.payor_category,
            record.status
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
