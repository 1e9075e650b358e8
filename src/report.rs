//! Human-readable run summary for terminal output.
//!
//! Shows the run counters, a tally per outcome tag and every record that
//! needs attention before a re-run.
use colored::*;

use crate::outcome::{Level, Outcome, OutcomeLog};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

fn needs_attention(o: &Outcome) -> bool {
    matches!(
        o.level,
        Level::Error
            | Level::DuplicateUserInAD
            | Level::MissingOU
            | Level::InvalidInput
            | Level::ADCreate
    ) || (o.level == Level::ADQuery && o.context.contains_key("row"))
}

fn attention_line(o: &Outcome) -> String {
    let row = o.context.get("row").map(String::as_str).unwrap_or("?");
    let who = o
        .context
        .get("displayName")
        .or_else(|| o.context.get("lastName"))
        .map(String::as_str)
        .unwrap_or("");
    let mut line = format!("  row {}: [{}] {}", row, o.level.to_string().red(), o.message);
    if !who.is_empty() {
        line.push_str(&format!(" ({who})"));
    }
    if let Some(reason) = o.context.get("reason") {
        line.push_str(&format!(" - {}", reason.dimmed()));
    }
    line
}

pub fn render_summary(log: &OutcomeLog) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        "Provisioner: Directory Account Run Results".bold().cyan()
    ));

    let c = log.counters();
    out.push_str(&section_header(&"Run Counters".bold().yellow().to_string()));
    out.push_str(&format!("Created: {}\n", c.created));
    out.push_str(&format!("Simulated: {}\n", c.simulated));
    out.push_str(&format!("Skipped: {}\n", c.skipped));
    out.push_str(&format!("Errored: {}\n", c.errored));

    out.push_str(&section_header(&"Outcomes by Tag".bold().cyan().to_string()));
    let mut any = false;
    for level in Level::ALL {
        let n = log.count_level(level);
        if n > 0 {
            any = true;
            out.push_str(&format!("  {}: {}\n", level, n));
        }
    }
    if !any {
        out.push_str("(No outcomes)\n");
    }

    out.push_str(&section_header(
        &"Records Needing Attention".bold().magenta().to_string(),
    ));
    let lines: Vec<String> = log
        .outcomes()
        .iter()
        .filter(|o| needs_attention(o))
        .map(attention_line)
        .collect();
    if lines.is_empty() {
        out.push_str("(None)\n");
    } else {
        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }

    out
}
