//! Export helpers for the audit trail of a run.
//!
//! - `save_outcome_log` writes one rendered line per outcome.
//! - `save_outcomes_csv` writes the same outcomes as
//!   `Timestamp,Level,Message,Context` rows.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use csv::Writer;

use crate::outcome::OutcomeLog;

pub fn save_outcome_log<P: AsRef<Path>>(log: &OutcomeLog, path: P) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for o in log.outcomes() {
        writeln!(w, "{}", o.render_line())?;
    }
    let c = log.counters();
    writeln!(
        w,
        "# created={} skipped={} errored={} simulated={}",
        c.created, c.skipped, c.errored, c.simulated
    )?;
    w.flush()?;
    Ok(())
}

pub fn save_outcomes_csv<P: AsRef<Path>>(log: &OutcomeLog, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(["Timestamp", "Level", "Message", "Context"])?;
    for o in log.outcomes() {
        let ts = o.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false);
        wtr.write_record([
            ts.as_str(),
            o.level.as_str(),
            o.message.as_str(),
            o.context_blob().as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Level, Outcome, Tally};
    use tempfile::tempdir;

    fn sample() -> OutcomeLog {
        let mut log = OutcomeLog::new();
        log.record(
            Outcome::new(Level::Info, "created").with("samAccountName", "anowak"),
            Tally::Created,
        );
        log.record(
            Outcome::new(Level::MissingOU, "no OU, configured").with("department", "HR1"),
            Tally::Skipped,
        );
        log
    }

    #[test]
    fn writes_log_and_csv() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("run.log");
        let csv_path = dir.path().join("run.csv");
        save_outcome_log(&sample(), &log_path).unwrap();
        save_outcomes_csv(&sample(), &csv_path).unwrap();

        let text = std::fs::read_to_string(log_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[Info] created | samAccountName=anowak"));
        assert!(lines[1].contains("[MissingOU]"));
        assert_eq!(lines[2], "# created=1 skipped=1 errored=0 simulated=0");

        let csv_content = std::fs::read_to_string(csv_path).unwrap();
        assert!(csv_content.starts_with("Timestamp,Level,Message,Context"));
        assert!(csv_content.contains(",MissingOU,\"no OU, configured\",department=HR1"));
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(save_outcome_log(&sample(), dir.path()).is_err());
        assert!(save_outcomes_csv(&sample(), dir.path()).is_err());
    }
}
