//! Human-readable console summary

use crate::orchestrator::AggregatedReport;
use crate::util::time::format_wall_time;

/// Print the run summary to stdout
pub fn print_summary(method: &str, report: &AggregatedReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("                    BENCHMARK RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("Method: {}", method);
    println!("Ranks:  {}", report.len());
    println!();

    println!("  {:>5}  {:<19}  {:<19}  {:>10}", "Rank", "Start", "End", "Time (s)");
    for record in &report.records {
        println!(
            "  {:>5}  {:<19}  {:<19}  {:>10.3}",
            record.rank,
            format_wall_time(&record.start_time),
            format_wall_time(&record.end_time),
            record.elapsed_secs
        );
    }
    println!();

    if report.len() > 1 {
        println!(
            "Per-rank time: min {:.3}s, mean {:.3}s, max {:.3}s",
            report.min_secs(),
            report.mean_secs(),
            report.max_secs()
        );
    }
    println!(
        "Final total execution time for all processes: {:.4} sec",
        report.total_secs
    );
    println!("═══════════════════════════════════════════════════════════");
}
