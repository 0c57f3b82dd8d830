use chrono::NaiveDate;
use finance_analytics_engine::*;

const INVOICES: &str = r#"[
    {"id": "INV-101", "line_total": "$2,400.00", "date_issued": "2024-03-04", "invoice_status": "paid",
     "date_paid": "2024-03-25", "client_name": "Harbour Cafe", "job_type": "Install", "company_name": "North"},
    {"id": "INV-102", "line_total": "1,150.50", "date_issued": "2024-03-18", "invoice_status": "paid",
     "date_paid": "2024-04-30", "client_name": "Greenfield School", "job_type": "Service", "company_name": "North"},
    {"id": "INV-103", "line_total": 640, "date_issued": "2024-04-09", "invoice_status": "overdue",
     "client_name": "Greenfield School", "job_type": "Repair", "company_name": "South"},
    {"id": "INV-104", "line_total": 980, "date_issued": "2024-04-22", "invoice_status": "paid",
     "date_paid": "2024-05-02", "client_name": "Harbour Cafe", "job_type": "Service", "company_name": "North"},
    {"id": "INV-105", "line_total": "3,200", "date_issued": "2024-05-06", "invoice_status": "sent",
     "client_name": "Riverside Dental", "job_type": "Install", "company_name": "South"},
    {"id": "INV-106", "line_total": 410, "date_issued": "2024-05-27", "invoice_status": "paid",
     "date_paid": "2024-06-03", "client_name": "Harbour Cafe", "job_type": "Repair", "company_name": "North"},
    {"id": "INV-107", "line_total": 1875, "date_issued": "2024-06-03", "invoice_status": "pending",
     "client_name": "Greenfield School", "job_type": "Install", "company_name": "North"},
    {"id": "INV-108", "line_total": "(120.00)", "date_issued": "2024-06-11", "invoice_status": "cancelled",
     "client_name": "Riverside Dental", "job_type": "Service", "company_name": "South"},
    {"id": "INV-109", "line_total": 760, "date_issued": "2024-06-19", "invoice_status": "paid",
     "date_paid": "2024-06-28", "client_name": "Riverside Dental", "job_type": null, "company_name": "South"},
    {"id": "INV-110", "line_total": 95, "date_issued": "TBC", "invoice_status": "draft",
     "client_name": "Harbour Cafe", "job_type": "Repair", "company_name": "North"}
]"#;

fn main() -> anyhow::Result<()> {
    println!("📊 Dashboard Report Demo\n");

    let outcome = ingest_json(INVOICES)?;
    println!("Ingested {} invoice rows", outcome.records.len());
    for skipped in &outcome.skipped {
        println!("  skipped {}: {}", skipped.id, skipped.reason);
    }
    let records = outcome.records;

    let anchor = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let june = YearMonth::from_date(anchor);
    let (current, older): (Vec<_>, Vec<_>) =
        records.iter().cloned().partition(|r| june.contains(r.occurred_on));
    let previous: Vec<_> = older
        .into_iter()
        .filter(|r| june.prev() == Some(r.month()))
        .collect();

    let config = AnalyticsConfig {
        trend_window_months: 6,
        min_sample_size: 2,
        ..Default::default()
    };

    // Trend and ranking look at the whole ledger. KPIs and receivables stay on June.
    let query = AnalyticsQuery::new(current, previous, anchor).with_history(records);
    let report = process_with_verification(&config, &query, 1e-6)?;

    println!("\n💰 June vs May");
    println!(
        "  Invoiced: {:.2} ({:+.1}%)",
        report.metrics.current.total_amount, report.metrics.changes.total_amount_change_pct
    );
    println!(
        "  Collected: {:.2} ({:+.1}%)",
        report.metrics.current.collected_amount,
        report.metrics.changes.collected_amount_change_pct
    );

    println!("\n📈 Monthly trend");
    for point in &report.trend {
        println!(
            "  {}  total {:>9.2}  paid {:>9.2}  rate {:>5.1}%",
            point.period,
            point.total_amount,
            point.paid_amount,
            point.payment_rate() * 100.0
        );
    }
    println!(
        "  Direction: {:?} ({:+.1}%)",
        report.trend_summary.direction, report.trend_summary.change_pct
    );

    println!("\n🗓  Weekly (most recent first)");
    for week in &report.weekly_trend {
        println!(
            "  {} .. {}  {:>9.2}  ({} invoices)",
            week.start, week.end, week.total_amount, week.record_count
        );
    }

    println!("\n↗  Group trends by {}", config.group_trend_dimension);
    for group in &report.group_trends {
        println!(
            "  {:<20} {:>9.2}  slope {:>+8.2}/month",
            group.label, group.total, group.slope
        );
    }

    for breakdown in &report.breakdowns {
        println!("\n🗂  By {}", breakdown.dimension);
        for entry in &breakdown.entries {
            println!(
                "  {:<20} {:>9.2}  {:>5.1}%",
                entry.label, entry.total, entry.share_pct
            );
        }
    }

    println!("\n🏆 Best payers");
    for ranked in &report.ranking.top_performers {
        println!(
            "  #{} {:<20} {:>5.1}%",
            ranked.rank,
            ranked.entity.label,
            ranked.entity.payment_rate * 100.0
        );
    }

    println!("\n⏳ Receivables aging (as of {})", report.aging.as_of);
    for bucket in &report.aging.buckets {
        println!(
            "  {:<6} {:>2} invoices  {:>9.2}",
            bucket.label, bucket.count, bucket.amount
        );
    }

    println!("\n🧾 Full report JSON:\n{}", report.to_json_pretty()?);

    Ok(())
}
