//! Outcome records and run-level counters.
//!
//! An [`OutcomeLog`] is append-only for the duration of a run. Every pushed
//! outcome is mirrored to the `log` facade so console output and the audit
//! file tell the same story.
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, SecondsFormat};

/// Longest message or reason string carried by an outcome.
pub const MAX_MESSAGE_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
    DuplicateUserInAD,
    MissingOU,
    InvalidInput,
    UsernameTruncated,
    UsernameDedup,
    ADQuery,
    ADCreate,
}

impl Level {
    pub const ALL: [Level; 10] = [
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::DuplicateUserInAD,
        Level::MissingOU,
        Level::InvalidInput,
        Level::UsernameTruncated,
        Level::UsernameDedup,
        Level::ADQuery,
        Level::ADCreate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "Info",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::DuplicateUserInAD => "DuplicateUserInAD",
            Level::MissingOU => "MissingOU",
            Level::InvalidInput => "InvalidInput",
            Level::UsernameTruncated => "UsernameTruncated",
            Level::UsernameDedup => "UsernameDedup",
            Level::ADQuery => "ADQuery",
            Level::ADCreate => "ADCreate",
        }
    }

    /// Console severity used when mirroring to the `log` facade.
    fn log_level(self) -> log::Level {
        match self {
            Level::Info => log::Level::Info,
            Level::UsernameTruncated | Level::UsernameDedup => log::Level::Debug,
            Level::Warning
            | Level::DuplicateUserInAD
            | Level::MissingOU
            | Level::InvalidInput => log::Level::Warn,
            Level::Error | Level::ADQuery | Level::ADCreate => log::Level::Error,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cut `s` down to [`MAX_MESSAGE_LEN`] characters.
pub fn truncate_reason(s: &str) -> String {
    match s.char_indices().nth(MAX_MESSAGE_LEN) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl Outcome {
    pub fn new(level: Level, message: impl AsRef<str>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: truncate_reason(message.as_ref()),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context value. Values are bounded like messages.
    pub fn with(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.context
            .insert(key.to_string(), truncate_reason(value.as_ref()));
        self
    }

    /// Attach every pair from an existing context map, bounded like `with`.
    pub fn with_context(mut self, context: &BTreeMap<String, String>) -> Self {
        for (k, v) in context {
            self.context.insert(k.clone(), truncate_reason(v));
        }
        self
    }

    /// Flat `key=value; key=value` rendering of the context.
    pub fn context_blob(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// One audit line: `<timestamp> [<Level>] <message> | <context>`.
    pub fn render_line(&self) -> String {
        let ts = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false);
        if self.context.is_empty() {
            format!("{} [{}] {}", ts, self.level, self.message)
        } else {
            format!(
                "{} [{}] {} | {}",
                ts,
                self.level,
                self.message,
                self.context_blob()
            )
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    pub created: usize,
    pub skipped: usize,
    pub errored: usize,
    pub simulated: usize,
}

/// What a terminal per-record outcome does to the run counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Created,
    Skipped,
    Errored,
    Simulated,
    /// Diagnostics and run-level notices.
    None,
}

#[derive(Debug, Default, Clone)]
pub struct OutcomeLog {
    outcomes: Vec<Outcome>,
    counters: RunCounters,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic or notice that does not move the counters.
    pub fn push(&mut self, outcome: Outcome) {
        self.record(outcome, Tally::None);
    }

    /// Append an outcome and bump the matching counter.
    pub fn record(&mut self, outcome: Outcome, tally: Tally) {
        log::log!(
            target: "provisioner::outcome",
            outcome.level.log_level(),
            "[{}] {} {}",
            outcome.level,
            outcome.message,
            outcome.context_blob()
        );
        match tally {
            Tally::Created => self.counters.created += 1,
            Tally::Skipped => self.counters.skipped += 1,
            Tally::Errored => self.counters.errored += 1,
            Tally::Simulated => self.counters.simulated += 1,
            Tally::None => {}
        }
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.outcomes.iter().filter(|o| o.level == level).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_and_context_are_bounded() {
        let long = "x".repeat(500);
        let o = Outcome::new(Level::ADCreate, &long).with("reason", &long);
        assert_eq!(o.message.chars().count(), MAX_MESSAGE_LEN);
        assert_eq!(o.context["reason"].chars().count(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn copied_context_is_bounded() {
        let mut ctx = BTreeMap::new();
        ctx.insert("lastName".to_string(), "N".repeat(1000));
        ctx.insert("row".to_string(), "7".to_string());
        let o = Outcome::new(Level::InvalidInput, "bad row").with_context(&ctx);
        assert_eq!(o.context["lastName"].chars().count(), MAX_MESSAGE_LEN);
        assert_eq!(o.context["row"], "7");
    }

    #[test]
    fn truncate_reason_is_char_safe() {
        let s = "é".repeat(300);
        assert_eq!(truncate_reason(&s).chars().count(), MAX_MESSAGE_LEN);
        assert_eq!(truncate_reason("short"), "short");
    }

    #[test]
    fn render_line_carries_level_and_context() {
        let o = Outcome::new(Level::MissingOU, "no placement")
            .with("department", "FIN101")
            .with("row", "3");
        let line = o.render_line();
        assert!(line.contains("[MissingOU] no placement | department=FIN101; row=3"));
        let bare = Outcome::new(Level::Warning, "truncated").render_line();
        assert!(bare.ends_with("[Warning] truncated"));
    }

    #[test]
    fn counters_follow_tally() {
        let mut log = OutcomeLog::new();
        log.record(Outcome::new(Level::Info, "created"), Tally::Created);
        log.record(Outcome::new(Level::InvalidInput, "blank"), Tally::Skipped);
        log.record(Outcome::new(Level::ADCreate, "denied"), Tally::Errored);
        log.push(Outcome::new(Level::UsernameDedup, "suffixed"));
        let c = log.counters();
        assert_eq!(
            c,
            RunCounters {
                created: 1,
                skipped: 1,
                errored: 1,
                simulated: 0
            }
        );
        assert_eq!(log.len(), 4);
        assert_eq!(log.count_level(Level::UsernameDedup), 1);
    }

    #[test]
    fn level_tags_are_stable() {
        let tags: Vec<&str> = Level::ALL.iter().map(|l| l.as_str()).collect();
        assert_eq!(
            tags,
            [
                "Info",
                "Warning",
                "Error",
                "DuplicateUserInAD",
                "MissingOU",
                "InvalidInput",
                "UsernameTruncated",
                "UsernameDedup",
                "ADQuery",
                "ADCreate"
            ]
        );
    }
}
