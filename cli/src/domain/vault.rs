//! Field-level vault encryption.
//!
//! Wire format of an encrypted value: `base64(salt[16] || nonce[12] ||
//! ciphertext || tag[16])`, keyed by PBKDF2-HMAC-SHA256 (100 000 rounds)
//! over the master passphrase. Other clients of the same API produce and
//! consume this exact layout, so none of the constants here may change.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::{Map, Value};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::domain::error::ClientError;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;

/// Minimum decoded length for a value to be treated as ciphertext.
pub const MIN_ENCRYPTED_LEN: usize = 32;

/// Vault-bearing field names the API carries in requests and result rows.
pub const VAULT_FIELDS: &[&str] = &[
    "vaultContent",
    "vaultCompany",
    "companyVault",
    "teamVault",
    "machineVault",
    "bridgeVault",
    "regionVault",
    "repositoryVault",
    "storageVault",
    "scheduleVault",
    "userVault",
    "queueVault",
    "responseVaultContent",
];

fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

/// Encrypts `plaintext` (usually JSON text) under `passphrase`.
///
/// A fresh salt and nonce are drawn for every call, so encrypting the same
/// input twice yields different ciphertexts.
///
/// # Errors
///
/// Returns [`ClientError::EncryptionFailed`] if the AEAD rejects the input.
pub fn encrypt(plaintext: &str, passphrase: &str) -> Result<String, ClientError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(passphrase, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| ClientError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
}

/// Decrypts a value produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`ClientError::DecryptionFailed`] for malformed base64, truncated
/// input, a tag mismatch (which is how a wrong passphrase shows up), or
/// non-UTF-8 plaintext.
pub fn decrypt(ciphertext: &str, passphrase: &str) -> Result<String, ClientError> {
    let raw = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| ClientError::DecryptionFailed)?;
    if raw.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(ClientError::DecryptionFailed);
    }
    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| ClientError::DecryptionFailed)?;
    String::from_utf8(plain).map_err(|_| ClientError::DecryptionFailed)
}

/// Heuristic: `value` is base64 that decodes to at least
/// [`MIN_ENCRYPTED_LEN`] bytes.
///
/// Can misclassify; callers treat a wrong guess as a skipped decrypt.
#[must_use]
pub fn is_encrypted(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    STANDARD
        .decode(trimmed)
        .is_ok_and(|bytes| bytes.len() >= MIN_ENCRYPTED_LEN)
}

/// Encrypts every plaintext field of `payload` named in `fields`.
///
/// Objects and arrays are serialized to JSON text first. Empty strings, nulls
/// and values that already look encrypted are left alone. Returns the number
/// of fields encrypted.
///
/// # Errors
///
/// Propagates [`encrypt`] failures.
pub fn encrypt_fields(
    payload: &mut Map<String, Value>,
    passphrase: &str,
    fields: &[&str],
) -> Result<usize, ClientError> {
    let mut count = 0;
    for name in fields {
        let Some(value) = payload.get_mut(*name) else {
            continue;
        };
        let plain = match &*value {
            Value::String(s) if s.is_empty() || is_encrypted(s) => continue,
            Value::String(s) => s.clone(),
            Value::Null => continue,
            other => other.to_string(),
        };
        *value = Value::String(encrypt(&plain, passphrase)?);
        count += 1;
    }
    Ok(count)
}

/// Outcome of [`decrypt_fields`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldDecryption {
    /// Fields replaced with their plaintext.
    pub decrypted: Vec<String>,
    /// Fields that looked encrypted but would not decrypt; left as ciphertext.
    pub failed: Vec<String>,
}

impl FieldDecryption {
    pub fn merge(&mut self, other: FieldDecryption) {
        self.decrypted.extend(other.decrypted);
        self.failed.extend(other.failed);
    }
}

/// Decrypts every encrypted string field of `payload` named in `fields`.
///
/// Never fails: a field that does not decrypt keeps its ciphertext and is
/// listed in [`FieldDecryption::failed`].
#[must_use]
pub fn decrypt_fields(
    payload: &mut Map<String, Value>,
    passphrase: &str,
    fields: &[&str],
) -> FieldDecryption {
    let mut report = FieldDecryption::default();
    for name in fields {
        let Some(Value::String(current)) = payload.get_mut(*name) else {
            continue;
        };
        if !is_encrypted(current) {
            continue;
        }
        match decrypt(current, passphrase) {
            Ok(plain) => {
                *current = plain;
                report.decrypted.push((*name).to_string());
            }
            Err(_) => report.failed.push((*name).to_string()),
        }
    }
    report
}
