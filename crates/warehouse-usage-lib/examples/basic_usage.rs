use std::env;
use warehouse_usage_monitor::prelude::*;
use warehouse_usage_monitor::{QueryWindow, SnapshotSource, UsageSource, Utc};

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

fn demo_facts() -> (Vec<DatasetUsageFact>, Vec<QueryJobFact>) {
    let storage = vec![
        DatasetUsageFact::new("sales", 12_884_901_888),
        DatasetUsageFact::new("events", 1_099_511_627_776),
        DatasetUsageFact::new("scratch", 0),
    ];
    let queries = vec![
        QueryJobFact::new("analyst@example.com", 549_755_813_888),
        QueryJobFact::new("etl@example.com", 2_199_023_255_552),
        QueryJobFact::new("analyst@example.com", 109_951_162_777),
        QueryJobFact::new("intern@example.com", 0),
    ];
    (storage, queries)
}

fn main() -> Result<()> {
    let monitor = UsageMonitor::new(CostRateModel::default());
    let args: Vec<String> = env::args().collect();

    let (storage, queries) = if args.len() >= 4 {
        // tables.jsonl jobs.jsonl dataset [dataset ...]
        println!("Loading snapshots from: {} and {}", args[1], args[2]);
        let source = SnapshotSource::new(&args[1], &args[2]);
        let window = QueryWindow::last_day(Utc::now());
        (
            source.dataset_usage(&args[3..])?,
            source.query_jobs(&window)?,
        )
    } else {
        println!("No snapshots given, using demo facts.");
        println!(
            "Usage: {} <tables.jsonl> <jobs.jsonl> <dataset>...",
            args[0]
        );
        demo_facts()
    };

    let report = monitor.generate_report(&storage, &queries)?;

    println!();
    println!("=== Storage ===");
    for entry in report.storage().datasets() {
        println!(
            "{:<20} {:>20} bytes {:>12} GB  ${:>10}  {:>12} local",
            entry.dataset_id(),
            format_number(entry.size_bytes()),
            entry.size_gb(),
            entry.cost_usd(),
            entry.cost_local()
        );
    }
    println!(
        "Total: {} bytes, ${} ({} local)",
        format_number(report.storage().total_size_bytes()),
        report.storage().total_cost_usd(),
        report.storage().total_cost_local()
    );

    println!();
    println!("=== Queries (last 24h) ===");
    for entry in report.query().users() {
        println!(
            "{:<30} {:>20} bytes {:>10} TB  ${:>10}  {:>12} local",
            entry.user_email(),
            format_number(entry.bytes_processed()),
            entry.tb_processed(),
            entry.cost_usd(),
            entry.cost_local()
        );
    }
    println!(
        "Total: {} bytes, ${} ({} local)",
        format_number(report.query().total_bytes_processed()),
        report.query().total_cost_usd(),
        report.query().total_cost_local()
    );

    println!();
    println!("{}", report.to_json_pretty()?);

    Ok(())
}
