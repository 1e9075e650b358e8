//! Run-level settings shared by the provisioning loop.
use regex::Regex;

pub const DEFAULT_MAX_RECORDS: usize = 100;

/// One or more DNS labels, optionally led by `@`.
const DOMAIN_PATTERN: &str =
    r"^@?[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordMode {
    #[default]
    Random,
    Fixed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("maximum records per run must be at least 1")]
    ZeroRecordCap,
    #[error("invalid principal suffix '{0}'")]
    PrincipalSuffix(String),
    #[error("invalid mail domain '{0}'")]
    MailDomain(String),
    #[error("domain pattern failed to compile: {0}")]
    Pattern(String),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub max_records: usize,
    /// Appended to identifiers to form principal names; `@` optional.
    pub principal_suffix: String,
    /// Mail addresses are `identifier@mail_domain`; `@` optional.
    pub mail_domain: String,
    pub password_mode: PasswordMode,
    pub fixed_password: Option<String>,
    /// Resolve and check everything, create nothing.
    pub dry_run: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            principal_suffix: String::new(),
            mail_domain: String::new(),
            password_mode: PasswordMode::Random,
            fixed_password: None,
            dry_run: false,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_records == 0 {
            return Err(ConfigError::ZeroRecordCap);
        }
        let re = Regex::new(DOMAIN_PATTERN).map_err(|e| ConfigError::Pattern(e.to_string()))?;
        if !re.is_match(self.principal_suffix.trim()) {
            return Err(ConfigError::PrincipalSuffix(self.principal_suffix.clone()));
        }
        if !re.is_match(self.mail_domain.trim()) {
            return Err(ConfigError::MailDomain(self.mail_domain.clone()));
        }
        Ok(())
    }

    /// Configured fixed secret, if it is non-blank.
    pub fn fixed_secret(&self) -> Option<&str> {
        self.fixed_password
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn mail_for(&self, identifier: &str) -> String {
        format!(
            "{}@{}",
            identifier,
            self.mail_domain.trim().trim_start_matches('@')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        RunConfig {
            principal_suffix: "@example.local".into(),
            mail_domain: "example.com".into(),
            ..RunConfig::default()
        }
    }

    #[test]
    fn accepts_plain_and_at_prefixed_domains() {
        assert_eq!(config().validate(), Ok(()));
        let mut c = config();
        c.principal_suffix = "corp.example-1.local".into();
        c.mail_domain = "@mail.example.com".into();
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn rejects_bad_values() {
        let mut c = config();
        c.max_records = 0;
        assert_eq!(c.validate(), Err(ConfigError::ZeroRecordCap));

        let mut c = config();
        c.principal_suffix = "".into();
        assert!(matches!(c.validate(), Err(ConfigError::PrincipalSuffix(_))));

        let mut c = config();
        c.mail_domain = "bad domain.com".into();
        assert!(matches!(c.validate(), Err(ConfigError::MailDomain(_))));

        let mut c = config();
        c.mail_domain = "-lead.com".into();
        assert!(matches!(c.validate(), Err(ConfigError::MailDomain(_))));
    }

    #[test]
    fn blank_fixed_secret_counts_as_missing() {
        let mut c = config();
        assert_eq!(c.fixed_secret(), None);
        c.fixed_password = Some("   ".into());
        assert_eq!(c.fixed_secret(), None);
        c.fixed_password = Some("Password!1".into());
        assert_eq!(c.fixed_secret(), Some("Password!1"));
    }

    #[test]
    fn mail_uses_domain_without_at() {
        let mut c = config();
        assert_eq!(c.mail_for("anowak"), "anowak@example.com");
        c.mail_domain = "@example.org".into();
        assert_eq!(c.mail_for("anowak"), "anowak@example.org");
    }
}
