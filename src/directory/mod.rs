//! Directory collaborator interfaces.
//!
//! The provisioning core only ever talks to the directory through
//! [`DirectoryLookup`] and [`DirectoryWriter`]. [`ldap::LdapDirectory`] backs
//! them with a live server; [`memory::MemoryDirectory`] is a deterministic
//! stand-in for tests and rehearsals.
pub mod ldap;
pub mod memory;

/// An existing account that blocks a candidate identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub distinguished_name: String,
    pub sam_account_name: String,
    pub user_principal_name: String,
}

/// Everything needed to create one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub sam_account_name: String,
    pub user_principal_name: String,
    pub mail: String,
    pub display_name: String,
    pub given_name: String,
    pub surname: String,
    pub ou_path: String,
    pub password: String,
    pub change_password_at_logon: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// A read or write that may succeed if repeated.
    #[error("directory query failed: {0}")]
    Transient(String),
    /// The server refused the operation.
    #[error("directory rejected operation: {0}")]
    Rejected(String),
    /// The service could not be reached or bound at all.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn reason(&self) -> &str {
        match self {
            DirectoryError::Transient(r)
            | DirectoryError::Rejected(r)
            | DirectoryError::Unavailable(r) => r,
        }
    }
}

pub trait DirectoryLookup {
    /// Any entry whose login identifier equals `sam_account_name` or whose
    /// principal name equals `user_principal_name`.
    fn find_by_identifier_or_principal(
        &mut self,
        sam_account_name: &str,
        user_principal_name: &str,
    ) -> Result<Option<DirectoryEntry>, DirectoryError>;

    fn organizational_unit_exists(&mut self, path: &str) -> Result<bool, DirectoryError>;
}

pub trait DirectoryWriter {
    fn create_account(&mut self, account: &NewAccount) -> Result<(), DirectoryError>;
}

/// A directory that can both answer lookups and create accounts.
pub trait Directory: DirectoryLookup + DirectoryWriter {}

impl<T: DirectoryLookup + DirectoryWriter + ?Sized> Directory for T {}
