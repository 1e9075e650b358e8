//! Encrypted audit log of generated passwords.
//!
//! Each recorded secret becomes one line: base64 of
//! `nonce (12 bytes) || AES-256-GCM ciphertext and tag` over
//! `timestamp \t identifier \t secret`.
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use rand::rngs::OsRng;

pub const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SecretLogError {
    #[error("secret log I/O on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("encryption failed")]
    Encrypt,
    #[error("line {0}: entry is not valid base64")]
    Encoding(usize),
    #[error("line {0}: entry could not be decrypted")]
    Decrypt(usize),
    #[error("line {0}: decrypted entry is malformed")]
    Malformed(usize),
}

/// Destination for generated secrets.
pub trait SecretSink {
    fn record(&mut self, identifier: &str, secret: &str) -> Result<(), SecretLogError>;
}

#[derive(Clone)]
pub struct SecretKey([u8; KEY_LEN]);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Accepts a 32-byte key as 64 hex digits or as base64. Anything else is
    /// not a key.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let bytes = if text.len() == KEY_LEN * 2 {
            hex::decode(text).ok().or_else(|| STANDARD.decode(text).ok())
        } else {
            STANDARD.decode(text).ok()
        }?;
        let key: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(&self.0.into())
    }
}

/// Plaintext line read back out of an [`EncryptedSecretLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    pub timestamp: String,
    pub identifier: String,
    pub secret: String,
}

pub struct EncryptedSecretLog {
    path: PathBuf,
    key: SecretKey,
}

impl EncryptedSecretLog {
    pub fn new<P: AsRef<Path>>(path: P, key: SecretKey) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            key,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, plaintext: &[u8]) -> Result<String, SecretLogError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .key
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| SecretLogError::Encrypt)?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn io_err(&self, source: std::io::Error) -> SecretLogError {
        SecretLogError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SecretSink for EncryptedSecretLog {
    fn record(&mut self, identifier: &str, secret: &str) -> Result<(), SecretLogError> {
        let ts = chrono::Local::now().to_rfc3339();
        let line = self.seal(format!("{ts}\t{identifier}\t{secret}").as_bytes())?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(f, "{line}").map_err(|e| self.io_err(e))
    }
}

/// Decrypt every entry of a secret log.
pub fn read_entries<P: AsRef<Path>>(
    path: P,
    key: &SecretKey,
) -> Result<Vec<SecretEntry>, SecretLogError> {
    let path = path.as_ref();
    let io_err = |source| SecretLogError::Io {
        path: path.display().to_string(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let cipher = key.cipher();
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(io_err)?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let sealed = STANDARD
            .decode(line)
            .map_err(|_| SecretLogError::Encoding(line_no))?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(SecretLogError::Decrypt(line_no));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SecretLogError::Decrypt(line_no))?;
        let text = String::from_utf8(plain).map_err(|_| SecretLogError::Malformed(line_no))?;
        let mut parts = text.splitn(3, '\t');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(ts), Some(id), Some(secret)) => entries.push(SecretEntry {
                timestamp: ts.to_string(),
                identifier: id.to_string(),
                secret: secret.to_string(),
            }),
            _ => return Err(SecretLogError::Malformed(line_no)),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key() -> SecretKey {
        SecretKey::from_bytes([7u8; KEY_LEN])
    }

    #[test]
    fn parses_hex_and_base64_keys() {
        let hex_key = "00".repeat(KEY_LEN);
        assert!(SecretKey::parse(&hex_key).is_some());
        let b64 = STANDARD.encode([1u8; KEY_LEN]);
        assert!(SecretKey::parse(&b64).is_some());
        assert!(SecretKey::parse("too-short").is_none());
        assert!(SecretKey::parse(&STANDARD.encode([1u8; 16])).is_none());
        assert!(SecretKey::parse("").is_none());
    }

    #[test]
    fn records_are_encrypted_and_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.log");
        let mut sink = EncryptedSecretLog::new(&path, key());
        sink.record("anowak", "Xy7!aaaabbbb").unwrap();
        sink.record("jsmith-01", "Qq1#ccccdddd").unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(!raw.contains("anowak"));
        assert!(!raw.contains("Xy7!aaaabbbb"));

        let entries = read_entries(&path, &key()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].identifier, "anowak");
        assert_eq!(entries[0].secret, "Xy7!aaaabbbb");
        assert_eq!(entries[1].identifier, "jsmith-01");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.log");
        let mut sink = EncryptedSecretLog::new(&path, key());
        sink.record("anowak", "pw").unwrap();
        let other = SecretKey::from_bytes([8u8; KEY_LEN]);
        assert!(matches!(
            read_entries(&path, &other),
            Err(SecretLogError::Decrypt(1))
        ));
    }

    #[test]
    fn unwritable_path_reports_io_error() {
        let dir = tempdir().unwrap();
        let mut sink = EncryptedSecretLog::new(dir.path(), key());
        assert_eq!(sink.path(), dir.path());
        match sink.record("anowak", "pw") {
            Err(SecretLogError::Io { path, .. }) => {
                assert_eq!(path, sink.path().display().to_string())
            }
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }
}
