//! Engine: drives one provisioning run, record by record, in input order.
//!
//! Each record goes through validation, identifier resolution, OU checks,
//! password selection, a last-moment collision re-check and finally account
//! creation. The first step that fails ends the record with one outcome;
//! nothing a single record does can abort the run.
//!
//! Typical usage:
//!
//! ```no_run
//! use provisioner::config::RunConfig;
//! use provisioner::directory::memory::MemoryDirectory;
//! use provisioner::engine::Provisioner;
//! use provisioner::record::{DepartmentMap, PersonRecord};
//!
//! let mut directory = MemoryDirectory::new().with_ou("OU=Finance,DC=example,DC=local");
//! let config = RunConfig {
//!     principal_suffix: "example.local".into(),
//!     mail_domain: "example.com".into(),
//!     ..RunConfig::default()
//! };
//! let departments: DepartmentMap = [("FIN101", "OU=Finance,DC=example,DC=local")]
//!     .into_iter()
//!     .collect();
//! let people = vec![PersonRecord::new("Alice", "Nowak", "FIN101")];
//! let log = Provisioner::new(&config, &mut directory, None).run(&people, &departments);
//! println!("created {}", log.counters().created);
//! ```
use std::collections::BTreeMap;

use crate::config::{PasswordMode, RunConfig};
use crate::directory::{Directory, NewAccount};
use crate::identifier::{build_base_identifier, display_name};
use crate::outcome::{Level, Outcome, OutcomeLog, Tally};
use crate::record::{DepartmentMap, PersonRecord};
use crate::resolver::resolve;
use crate::secret::generate_password;
use crate::secret_log::SecretSink;

/// Why a record stopped before (or at) account creation.
struct Stop {
    level: Level,
    message: String,
    tally: Tally,
    reason: Option<String>,
}

impl Stop {
    fn skipped(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            tally: Tally::Skipped,
            reason: None,
        }
    }

    fn errored(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            tally: Tally::Errored,
            reason: None,
        }
    }

    fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

pub struct Provisioner<'a> {
    config: &'a RunConfig,
    directory: &'a mut dyn Directory,
    secrets: Option<&'a mut dyn SecretSink>,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a RunConfig,
        directory: &'a mut dyn Directory,
        secrets: Option<&'a mut dyn SecretSink>,
    ) -> Self {
        Self {
            config,
            directory,
            secrets,
        }
    }

    /// Process up to `max_records` people and return every outcome produced.
    pub fn run(&mut self, people: &[PersonRecord], departments: &DepartmentMap) -> OutcomeLog {
        let mut log = OutcomeLog::new();
        let cap = self.config.max_records;
        let batch = if people.len() > cap {
            log.push(
                Outcome::new(
                    Level::Warning,
                    format!("input truncated to the first {cap} records"),
                )
                .with("total", people.len().to_string())
                .with("cap", cap.to_string())
                .with("ignored", (people.len() - cap).to_string()),
            );
            &people[..cap]
        } else {
            people
        };

        for (idx, person) in batch.iter().enumerate() {
            self.provision_one(idx + 1, person, departments, &mut log);
        }
        log
    }

    fn provision_one(
        &mut self,
        row: usize,
        person: &PersonRecord,
        departments: &DepartmentMap,
        log: &mut OutcomeLog,
    ) {
        let mut ctx = BTreeMap::new();
        ctx.insert("row".to_string(), row.to_string());
        match self.try_provision(person, departments, &mut ctx, log) {
            Ok(tally) => {
                let message = match tally {
                    Tally::Simulated => "simulated; account not created",
                    _ => "created",
                };
                log.record(Outcome::new(Level::Info, message).with_context(&ctx), tally);
            }
            Err(stop) => {
                let mut outcome = Outcome::new(stop.level, &stop.message).with_context(&ctx);
                if let Some(reason) = &stop.reason {
                    outcome = outcome.with("reason", reason);
                }
                log.record(outcome, stop.tally);
            }
        }
    }

    fn try_provision(
        &mut self,
        person: &PersonRecord,
        departments: &DepartmentMap,
        ctx: &mut BTreeMap<String, String>,
        log: &mut OutcomeLog,
    ) -> Result<Tally, Stop> {
        let first = person.first_name.trim();
        let last = person.last_name.trim();
        let department = person.department_id.trim();
        ctx.insert("firstName".into(), first.to_string());
        ctx.insert("lastName".into(), last.to_string());
        ctx.insert("department".into(), department.to_string());

        if first.is_empty() || last.is_empty() {
            return Err(Stop::skipped(
                Level::InvalidInput,
                "first and last name are required",
            ));
        }
        if department.is_empty() {
            return Err(Stop::skipped(
                Level::InvalidInput,
                "department code is required",
            ));
        }
        let display = display_name(first, last);
        ctx.insert("displayName".into(), display.clone());

        let base = build_base_identifier(first, last);
        if base.is_empty() {
            return Err(Stop::skipped(
                Level::InvalidInput,
                "names contain no characters usable in an identifier",
            ));
        }

        let identity = resolve(&base, &self.config.principal_suffix, &mut *self.directory, log)
            .map_err(|e| {
                Stop::errored(Level::ADQuery, "could not resolve a free identifier")
                    .because(e.to_string())
            })?;
        ctx.insert("samAccountName".into(), identity.sam_account_name.clone());
        ctx.insert(
            "userPrincipalName".into(),
            identity.user_principal_name.clone(),
        );

        let ou = departments.placement(department).ok_or_else(|| {
            Stop::skipped(Level::MissingOU, "no OU configured for department")
        })?;
        ctx.insert("ou".into(), ou.to_string());
        match self.directory.organizational_unit_exists(ou) {
            Ok(true) => {}
            Ok(false) => {
                return Err(Stop::skipped(
                    Level::MissingOU,
                    "OU does not exist in the directory",
                ));
            }
            Err(e) => {
                return Err(
                    Stop::skipped(Level::MissingOU, "OU could not be verified").because(e.reason()),
                );
            }
        }

        let password = match self.config.password_mode {
            PasswordMode::Random => {
                let pw = generate_password();
                if !self.config.dry_run {
                    self.record_secret(&identity.sam_account_name, &pw, ctx, log);
                }
                pw
            }
            PasswordMode::Fixed => match self.config.fixed_secret() {
                Some(pw) => pw.to_string(),
                None => {
                    return Err(Stop::errored(
                        Level::Error,
                        "fixed password mode selected but no password is configured",
                    ));
                }
            },
        };

        match self
            .directory
            .find_by_identifier_or_principal(&identity.sam_account_name, &identity.user_principal_name)
        {
            Ok(None) => {}
            Ok(Some(existing)) => {
                return Err(Stop::skipped(
                    Level::DuplicateUserInAD,
                    "identifier or principal already present in the directory",
                )
                .because(existing.distinguished_name));
            }
            Err(e) => {
                return Err(
                    Stop::errored(Level::ADQuery, "duplicate re-check failed").because(e.reason()),
                );
            }
        }

        if self.config.dry_run {
            return Ok(Tally::Simulated);
        }

        let account = NewAccount {
            mail: self.config.mail_for(&identity.sam_account_name),
            sam_account_name: identity.sam_account_name,
            user_principal_name: identity.user_principal_name,
            display_name: display,
            given_name: first.to_string(),
            surname: last.to_string(),
            ou_path: ou.to_string(),
            password,
            change_password_at_logon: true,
        };
        ctx.insert("mail".into(), account.mail.clone());
        self.directory.create_account(&account).map_err(|e| {
            Stop::errored(Level::ADCreate, "account creation failed").because(e.reason())
        })?;
        Ok(Tally::Created)
    }

    fn record_secret(
        &mut self,
        identifier: &str,
        secret: &str,
        ctx: &BTreeMap<String, String>,
        log: &mut OutcomeLog,
    ) {
        let Some(sink) = self.secrets.as_deref_mut() else {
            return;
        };
        if let Err(e) = sink.record(identifier, secret) {
            log.push(
                Outcome::new(Level::Warning, "generated password could not be logged")
                    .with_context(ctx)
                    .with("reason", e.to_string()),
            );
        }
    }
}
