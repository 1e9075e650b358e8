//! In-memory directory with call accounting and fault injection.
//!
//! Identifier, principal and OU comparisons are case-insensitive, matching
//! how the real directory treats these attributes.
use std::collections::{HashMap, HashSet};

use super::{DirectoryEntry, DirectoryError, DirectoryLookup, DirectoryWriter, NewAccount};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub lookups: usize,
    pub ou_checks: usize,
    pub creates: usize,
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: Vec<DirectoryEntry>,
    ous: HashSet<String>,
    created: Vec<NewAccount>,
    calls: CallCounts,
    failing_lookups: HashMap<String, String>,
    /// Every lookup fails once this many lookups have been answered.
    failing_lookups_after: Option<(usize, String)>,
    failing_ou_checks: Option<String>,
    failing_creates: Option<String>,
    /// Entries that become visible once `lookups` reaches the threshold.
    delayed: Vec<(usize, DirectoryEntry)>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ou(mut self, path: &str) -> Self {
        self.add_ou(path);
        self
    }

    pub fn with_account(mut self, sam_account_name: &str, user_principal_name: &str) -> Self {
        self.add_account(sam_account_name, user_principal_name);
        self
    }

    pub fn add_ou(&mut self, path: &str) {
        self.ous.insert(path.trim().to_lowercase());
    }

    pub fn add_account(&mut self, sam_account_name: &str, user_principal_name: &str) {
        self.entries.push(DirectoryEntry {
            distinguished_name: format!("CN={sam_account_name}"),
            sam_account_name: sam_account_name.to_string(),
            user_principal_name: user_principal_name.to_string(),
        });
    }

    /// Make every lookup for `sam_account_name` fail with `reason`.
    pub fn fail_lookups_for(&mut self, sam_account_name: &str, reason: &str) {
        self.failing_lookups
            .insert(sam_account_name.to_lowercase(), reason.to_string());
    }

    /// Answer the first `lookups` lookups normally, then fail every later one.
    pub fn fail_lookups_after(&mut self, lookups: usize, reason: &str) {
        self.failing_lookups_after = Some((lookups, reason.to_string()));
    }

    pub fn fail_ou_checks(&mut self, reason: &str) {
        self.failing_ou_checks = Some(reason.to_string());
    }

    pub fn fail_creates(&mut self, reason: &str) {
        self.failing_creates = Some(reason.to_string());
    }

    /// Register an account that another actor creates after `lookups`
    /// lookups have been answered.
    pub fn add_account_after_lookups(
        &mut self,
        lookups: usize,
        sam_account_name: &str,
        user_principal_name: &str,
    ) {
        self.delayed.push((
            lookups,
            DirectoryEntry {
                distinguished_name: format!("CN={sam_account_name}"),
                sam_account_name: sam_account_name.to_string(),
                user_principal_name: user_principal_name.to_string(),
            },
        ));
    }

    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Accounts created through [`DirectoryWriter::create_account`].
    pub fn created(&self) -> &[NewAccount] {
        &self.created
    }

    fn release_delayed(&mut self) {
        let seen = self.calls.lookups;
        let (ready, waiting): (Vec<_>, Vec<_>) =
            self.delayed.drain(..).partition(|(at, _)| *at <= seen);
        self.delayed = waiting;
        self.entries.extend(ready.into_iter().map(|(_, e)| e));
    }
}

impl DirectoryLookup for MemoryDirectory {
    fn find_by_identifier_or_principal(
        &mut self,
        sam_account_name: &str,
        user_principal_name: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        self.release_delayed();
        let answered = self.calls.lookups;
        self.calls.lookups += 1;
        if let Some((after, reason)) = &self.failing_lookups_after {
            if answered >= *after {
                return Err(DirectoryError::Transient(reason.clone()));
            }
        }
        if let Some(reason) = self.failing_lookups.get(&sam_account_name.to_lowercase()) {
            return Err(DirectoryError::Transient(reason.clone()));
        }
        let hit = self.entries.iter().find(|e| {
            e.sam_account_name.eq_ignore_ascii_case(sam_account_name)
                || e.user_principal_name
                    .eq_ignore_ascii_case(user_principal_name)
        });
        Ok(hit.cloned())
    }

    fn organizational_unit_exists(&mut self, path: &str) -> Result<bool, DirectoryError> {
        self.calls.ou_checks += 1;
        if let Some(reason) = &self.failing_ou_checks {
            return Err(DirectoryError::Transient(reason.clone()));
        }
        Ok(self.ous.contains(&path.trim().to_lowercase()))
    }
}

impl DirectoryWriter for MemoryDirectory {
    fn create_account(&mut self, account: &NewAccount) -> Result<(), DirectoryError> {
        self.calls.creates += 1;
        if let Some(reason) = &self.failing_creates {
            return Err(DirectoryError::Rejected(reason.clone()));
        }
        let dn = format!("CN={},{}", account.sam_account_name, account.ou_path.trim());
        if self
            .entries
            .iter()
            .any(|e| e.distinguished_name.eq_ignore_ascii_case(&dn))
        {
            return Err(DirectoryError::Rejected(format!("{dn} already exists")));
        }
        self.entries.push(DirectoryEntry {
            distinguished_name: dn,
            sam_account_name: account.sam_account_name.clone(),
            user_principal_name: account.user_principal_name.clone(),
        });
        self.created.push(account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_either_key_case_insensitively() {
        let mut d = MemoryDirectory::new().with_account("anowak", "anowak@example.local");
        assert!(
            d.find_by_identifier_or_principal("ANOWAK", "x@y")
                .unwrap()
                .is_some()
        );
        assert!(
            d.find_by_identifier_or_principal("other", "AnOwak@Example.local")
                .unwrap()
                .is_some()
        );
        assert!(
            d.find_by_identifier_or_principal("other", "other@example.local")
                .unwrap()
                .is_none()
        );
        assert_eq!(d.calls().lookups, 3);
    }

    #[test]
    fn delayed_accounts_appear_after_threshold() {
        let mut d = MemoryDirectory::new();
        d.add_account_after_lookups(1, "bob", "bob@x");
        assert!(d.find_by_identifier_or_principal("bob", "bob@x").unwrap().is_none());
        assert!(d.find_by_identifier_or_principal("bob", "bob@x").unwrap().is_some());
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut d = MemoryDirectory::new().with_ou("OU=A,DC=x");
        d.fail_lookups_for("carol", "timeout");
        assert_eq!(
            d.find_by_identifier_or_principal("carol", "carol@x"),
            Err(DirectoryError::Transient("timeout".into()))
        );
        assert!(d.organizational_unit_exists("ou=a,dc=x").unwrap());
        d.fail_ou_checks("down");
        assert!(d.organizational_unit_exists("OU=A,DC=x").is_err());
    }

    fn account(sam: &str) -> NewAccount {
        NewAccount {
            sam_account_name: sam.into(),
            user_principal_name: format!("{sam}@x"),
            mail: format!("{sam}@x"),
            display_name: "Dave D".into(),
            given_name: "Dave".into(),
            surname: "D".into(),
            ou_path: "OU=A,DC=x".into(),
            password: "pw".into(),
            change_password_at_logon: true,
        }
    }

    #[test]
    fn lookups_fail_after_threshold() {
        let mut d = MemoryDirectory::new();
        d.fail_lookups_after(2, "busy");
        assert!(d.find_by_identifier_or_principal("a", "a@x").is_ok());
        assert!(d.find_by_identifier_or_principal("b", "b@x").is_ok());
        assert_eq!(
            d.find_by_identifier_or_principal("a", "a@x"),
            Err(DirectoryError::Transient("busy".into()))
        );
    }

    #[test]
    fn duplicate_dn_is_rejected() {
        let mut d = MemoryDirectory::new();
        d.create_account(&account("dave")).unwrap();
        assert_eq!(
            d.create_account(&account("DAVE")),
            Err(DirectoryError::Rejected("CN=DAVE,OU=A,DC=x already exists".into()))
        );
        d.create_account(&account("dave-01")).unwrap();
        assert_eq!(d.entries()[1].distinguished_name, "CN=dave-01,OU=A,DC=x");
        assert_eq!(d.calls().creates, 3);
    }

    #[test]
    fn created_accounts_become_visible() {
        let mut d = MemoryDirectory::new();
        let account = NewAccount {
            sam_account_name: "dave".into(),
            user_principal_name: "dave@x".into(),
            mail: "dave@x".into(),
            display_name: "Dave D".into(),
            given_name: "Dave".into(),
            surname: "D".into(),
            ou_path: "OU=A,DC=x".into(),
            password: "pw".into(),
            change_password_at_logon: true,
        };
        d.create_account(&account).unwrap();
        assert_eq!(d.created().len(), 1);
        assert!(d.find_by_identifier_or_principal("dave", "-").unwrap().is_some());
    }
}
