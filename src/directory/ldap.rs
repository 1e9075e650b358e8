//! Live directory client over LDAP (Active Directory flavoured).
//!
//! Uses the blocking `ldap3::LdapConn` so every call is one synchronous
//! round-trip. Account passwords travel in `unicodePwd`, which the server
//! only accepts over LDAPS or StartTLS.
use std::collections::HashSet;
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry, dn_escape, ldap_escape};
use log::{debug, info, warn};

use super::{DirectoryEntry, DirectoryError, DirectoryLookup, DirectoryWriter, NewAccount};

const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_ALREADY_EXISTS: u32 = 68;

/// NORMAL_ACCOUNT, enabled.
const UAC_NORMAL_ACCOUNT: &str = "512";

const LOOKUP_ATTRS: [&str; 3] = ["distinguishedName", "sAMAccountName", "userPrincipalName"];

#[derive(Debug, Clone)]
pub struct LdapSettings {
    pub url: String,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    /// Search base for identifier and principal lookups.
    pub base_dn: String,
    pub starttls: bool,
    pub no_tls_verify: bool,
    pub timeout: Duration,
}

impl LdapSettings {
    fn is_encrypted(&self) -> bool {
        self.starttls || self.url.to_ascii_lowercase().starts_with("ldaps://")
    }
}

pub struct LdapDirectory {
    conn: LdapConn,
    base_dn: String,
}

impl LdapDirectory {
    /// Connect and bind. Failure here means the run cannot start.
    pub fn connect(settings: &LdapSettings) -> Result<Self, DirectoryError> {
        if !settings.is_encrypted() {
            warn!(
                "{} is not encrypted; the directory will reject initial passwords",
                settings.url
            );
        }
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(settings.timeout)
            .set_starttls(settings.starttls)
            .set_no_tls_verify(settings.no_tls_verify);
        debug!("connecting to {}", settings.url);
        let mut conn = LdapConn::with_settings(conn_settings, &settings.url).map_err(|e| {
            DirectoryError::Unavailable(format!("connect {}: {}", settings.url, e))
        })?;

        if let Some(bind_dn) = &settings.bind_dn {
            let password = settings.bind_password.as_deref().unwrap_or("");
            let result = conn
                .simple_bind(bind_dn, password)
                .map_err(|e| DirectoryError::Unavailable(format!("bind {bind_dn}: {e}")))?;
            if result.rc != RC_SUCCESS {
                return Err(DirectoryError::Unavailable(format!(
                    "bind {} failed with code {}: {}",
                    bind_dn, result.rc, result.text
                )));
            }
        }
        info!("connected to {}", settings.url);
        Ok(Self {
            conn,
            base_dn: settings.base_dn.clone(),
        })
    }

    pub fn close(mut self) {
        if let Err(e) = self.conn.unbind() {
            debug!("unbind failed: {}", e);
        }
    }
}

fn identity_filter(sam_account_name: &str, user_principal_name: &str) -> String {
    format!(
        "(|(sAMAccountName={})(userPrincipalName={}))",
        ldap_escape(sam_account_name),
        ldap_escape(user_principal_name)
    )
}

/// Entries are named after the login identifier. `displayName` carries the
/// human name.
fn user_dn(sam_account_name: &str, ou_path: &str) -> String {
    format!("CN={},{}", dn_escape(sam_account_name), ou_path.trim())
}

/// Quoted, UTF-16LE encoded password as `unicodePwd` expects.
fn encode_unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{password}\"")
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

fn first_value(entry: &SearchEntry, attr: &str) -> String {
    entry
        .attrs
        .get(attr)
        .and_then(|v| v.first())
        .cloned()
        .unwrap_or_default()
}

type Attrs = Vec<(Vec<u8>, HashSet<Vec<u8>>)>;

fn attr(name: &str, values: &[&str]) -> (Vec<u8>, HashSet<Vec<u8>>) {
    (
        name.as_bytes().to_vec(),
        values.iter().map(|v| v.as_bytes().to_vec()).collect(),
    )
}

fn account_attributes(account: &NewAccount) -> Attrs {
    let mut attrs = vec![
        attr(
            "objectClass",
            &["top", "person", "organizationalPerson", "user"],
        ),
        attr("sAMAccountName", &[account.sam_account_name.as_str()]),
        attr("userPrincipalName", &[account.user_principal_name.as_str()]),
        attr("mail", &[account.mail.as_str()]),
        attr("displayName", &[account.display_name.as_str()]),
        attr("userAccountControl", &[UAC_NORMAL_ACCOUNT]),
    ];
    if !account.given_name.is_empty() {
        attrs.push(attr("givenName", &[account.given_name.as_str()]));
    }
    if !account.surname.is_empty() {
        attrs.push(attr("sn", &[account.surname.as_str()]));
    }
    if account.change_password_at_logon {
        attrs.push(attr("pwdLastSet", &["0"]));
    }
    attrs.push((
        b"unicodePwd".to_vec(),
        HashSet::from([encode_unicode_pwd(&account.password)]),
    ));
    attrs
}

impl DirectoryLookup for LdapDirectory {
    fn find_by_identifier_or_principal(
        &mut self,
        sam_account_name: &str,
        user_principal_name: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let filter = identity_filter(sam_account_name, user_principal_name);
        let search = self
            .conn
            .search(&self.base_dn, Scope::Subtree, &filter, LOOKUP_ATTRS.to_vec())
            .map_err(|e| DirectoryError::Transient(e.to_string()))?;
        let (entries, result) = (search.0, search.1);
        if result.rc != RC_SUCCESS {
            return Err(DirectoryError::Transient(format!(
                "search failed with code {}: {}",
                result.rc, result.text
            )));
        }
        let hit = entries
            .into_iter()
            .filter(|e| !e.is_ref())
            .map(SearchEntry::construct)
            .next()
            .map(|e| DirectoryEntry {
                sam_account_name: first_value(&e, "sAMAccountName"),
                user_principal_name: first_value(&e, "userPrincipalName"),
                distinguished_name: e.dn,
            });
        Ok(hit)
    }

    fn organizational_unit_exists(&mut self, path: &str) -> Result<bool, DirectoryError> {
        let result = self
            .conn
            .search(path.trim(), Scope::Base, "(objectClass=*)", vec!["1.1"])
            .map_err(|e| DirectoryError::Transient(e.to_string()))?
            .1;
        match result.rc {
            RC_SUCCESS => Ok(true),
            RC_NO_SUCH_OBJECT => Ok(false),
            rc => Err(DirectoryError::Transient(format!(
                "OU probe failed with code {}: {}",
                rc, result.text
            ))),
        }
    }
}

impl DirectoryWriter for LdapDirectory {
    fn create_account(&mut self, account: &NewAccount) -> Result<(), DirectoryError> {
        let dn = user_dn(&account.sam_account_name, &account.ou_path);
        debug!("adding {}", dn);
        let result = self
            .conn
            .add(&dn, account_attributes(account))
            .map_err(|e| DirectoryError::Transient(e.to_string()))?;
        match result.rc {
            RC_SUCCESS => Ok(()),
            RC_ALREADY_EXISTS => Err(DirectoryError::Rejected(format!("{dn} already exists"))),
            rc => Err(DirectoryError::Rejected(format!(
                "add failed with code {}: {}",
                rc, result.text
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> NewAccount {
        NewAccount {
            sam_account_name: "anowak".into(),
            user_principal_name: "anowak@example.local".into(),
            mail: "anowak@example.com".into(),
            display_name: "Alice Nowak".into(),
            given_name: "Alice".into(),
            surname: "Nowak".into(),
            ou_path: "OU=Finance,DC=example,DC=local".into(),
            password: "Password!1".into(),
            change_password_at_logon: true,
        }
    }

    #[test]
    fn filter_escapes_values() {
        assert_eq!(
            identity_filter("a*b", "x(1)@y"),
            "(|(sAMAccountName=a\\2ab)(userPrincipalName=x\\281\\29@y))"
        );
    }

    #[test]
    fn dn_is_named_after_identifier() {
        let first = user_dn("jsmith", " OU=Finance,DC=example,DC=local ");
        let second = user_dn("jsmith-01", "OU=Finance,DC=example,DC=local");
        assert_eq!(first, "CN=jsmith,OU=Finance,DC=example,DC=local");
        assert_eq!(second, "CN=jsmith-01,OU=Finance,DC=example,DC=local");
    }

    #[test]
    fn dn_escapes_special_characters() {
        let dn = user_dn("a,b", "OU=Finance,DC=example,DC=local");
        assert!(dn.starts_with("CN=a\\"));
        assert!(dn.ends_with("b,OU=Finance,DC=example,DC=local"));
        assert!(!dn.contains("a,b"));
    }

    #[test]
    fn unicode_pwd_is_quoted_utf16le() {
        assert_eq!(encode_unicode_pwd("ab"), vec![b'"', 0, b'a', 0, b'b', 0, b'"', 0]);
    }

    #[test]
    fn attributes_force_password_change() {
        let attrs = account_attributes(&account());
        let names: Vec<&[u8]> = attrs.iter().map(|(k, _)| k.as_slice()).collect();
        assert!(names.contains(&b"pwdLastSet".as_slice()));
        assert!(names.contains(&b"unicodePwd".as_slice()));
        let (_, uac) = attrs
            .iter()
            .find(|(k, _)| k.as_slice() == b"userAccountControl")
            .unwrap();
        assert!(uac.contains(b"512".as_slice()));

        let mut keep = account();
        keep.change_password_at_logon = false;
        let attrs = account_attributes(&keep);
        assert!(!attrs.iter().any(|(k, _)| k.as_slice() == b"pwdLastSet"));
    }

    #[test]
    fn ldaps_or_starttls_counts_as_encrypted() {
        let mut s = LdapSettings {
            url: "LDAPS://dc1.example.local".into(),
            bind_dn: None,
            bind_password: None,
            base_dn: "DC=example,DC=local".into(),
            starttls: false,
            no_tls_verify: false,
            timeout: Duration::from_secs(5),
        };
        assert!(s.is_encrypted());
        s.url = "ldap://dc1.example.local".into();
        assert!(!s.is_encrypted());
        s.starttls = true;
        assert!(s.is_encrypted());
    }
}
