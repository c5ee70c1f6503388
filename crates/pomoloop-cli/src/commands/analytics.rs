use std::path::Path;

use chrono::Local;
use pomoloop_core::duration::format_human;
use pomoloop_core::storage::PeriodTotals;
use pomoloop_core::{AnalyticsLog, AnalyticsSummary, Config, Result};
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    log: &'a Path,
    entries: usize,
    #[serde(flatten)]
    summary: AnalyticsSummary,
}

fn totals_line(label: &str, totals: &PeriodTotals) -> String {
    format!(
        "{label:<10} work {:>7} ({})   break {:>7} ({})",
        format_human(totals.work_secs),
        totals.work_sessions,
        format_human(totals.break_secs),
        totals.break_sessions,
    )
}

pub fn run(json: bool) -> Result<()> {
    let mut config = Config::load()?;
    config.apply_env();

    let log = AnalyticsLog::new(config.analytics.log);
    let entries = log.entries()?;
    let summary = AnalyticsSummary::compute(&entries, Local::now().date_naive());

    if json {
        let report = Report {
            log: log.path(),
            entries: entries.len(),
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sessions recorded yet ({})", log.path().display());
        return Ok(());
    }
    println!("{}", totals_line("Today", &summary.today));
    println!("{}", totals_line("This week", &summary.this_week));
    println!("{}", totals_line("Total", &summary.total));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_line_shows_time_and_counts() {
        let totals = PeriodTotals {
            work_secs: 3900,
            break_secs: 600,
            work_sessions: 3,
            break_sessions: 2,
        };
        let line = totals_line("Today", &totals);
        assert!(line.starts_with("Today "));
        assert!(line.contains("1h 05m (3)"));
        assert!(line.contains("10m (2)"));
    }
}
