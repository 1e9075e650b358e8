//! Collision-free identifier selection against the directory.
//!
//! Attempt 0 is the base identifier capped at [`MAX_IDENTIFIER_LEN`].
//! Attempts 1..=99 use the first [`SUFFIX_CORE_LEN`] characters followed by
//! `-NN`. A candidate is free only when neither its identifier nor its
//! derived principal name matches an existing entry.
//!
//! A lookup that errors proves nothing either way, so that attempt is
//! skipped and the search moves on to the next suffix.
use crate::directory::DirectoryLookup;
use crate::identifier::{MAX_IDENTIFIER_LEN, SUFFIX_CORE_LEN, truncate_identifier};
use crate::outcome::{Level, Outcome, OutcomeLog};

/// Highest numeric suffix tried before giving up.
pub const MAX_SUFFIX: u32 = 99;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub sam_account_name: String,
    pub user_principal_name: String,
    /// 0 for the unsuffixed candidate, otherwise the numeric suffix used.
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no free identifier for '{base}' after 100 attempts")]
pub struct ExhaustedError {
    pub base: String,
}

/// Ensure the principal suffix starts with exactly one `@`.
pub fn normalize_principal_suffix(suffix: &str) -> String {
    format!("@{}", suffix.trim().trim_start_matches('@'))
}

/// Candidate identifier for a given attempt number.
pub fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        truncate_identifier(base, MAX_IDENTIFIER_LEN).to_string()
    } else {
        format!("{}-{:02}", truncate_identifier(base, SUFFIX_CORE_LEN), attempt)
    }
}

pub fn resolve<L: DirectoryLookup + ?Sized>(
    base: &str,
    principal_suffix: &str,
    lookup: &mut L,
    outcomes: &mut OutcomeLog,
) -> Result<ResolvedIdentity, ExhaustedError> {
    let suffix = normalize_principal_suffix(principal_suffix);
    for attempt in 0..=MAX_SUFFIX {
        let sam = candidate(base, attempt);
        let upn = format!("{sam}{suffix}");
        match lookup.find_by_identifier_or_principal(&sam, &upn) {
            Ok(None) => {
                report_adjustments(base, &sam, attempt, outcomes);
                return Ok(ResolvedIdentity {
                    sam_account_name: sam,
                    user_principal_name: upn,
                    attempt,
                });
            }
            Ok(Some(existing)) => {
                log::debug!(
                    "candidate {} taken by {}",
                    sam,
                    existing.distinguished_name
                );
            }
            Err(e) => {
                outcomes.push(
                    Outcome::new(Level::ADQuery, "lookup failed; trying next suffix")
                        .with("samAccountName", &sam)
                        .with("userPrincipalName", &upn)
                        .with("reason", e.reason()),
                );
            }
        }
    }
    Err(ExhaustedError {
        base: base.to_string(),
    })
}

fn report_adjustments(base: &str, sam: &str, attempt: u32, outcomes: &mut OutcomeLog) {
    if base.chars().count() > MAX_IDENTIFIER_LEN {
        outcomes.push(
            Outcome::new(
                Level::UsernameTruncated,
                format!("identifier shortened to {MAX_IDENTIFIER_LEN} characters"),
            )
            .with("base", base)
            .with("samAccountName", candidate(base, 0)),
        );
    }
    if attempt > 0 {
        outcomes.push(
            Outcome::new(Level::UsernameDedup, "identifier taken; suffix applied")
                .with("base", base)
                .with("samAccountName", sam)
                .with("attempt", attempt.to_string()),
        );
    }
}
