//! # Credential Store
//!
//! Each student holds at most one active credential, rendered by the
//! front office as a scannable code. The secret has the shape
//!
//! ```text
//! <student_id>.<nonce_hex>.<signature_hex>
//! ```
//!
//! where the signature is Ed25519 over `"<student_id>.<nonce_hex>"` by the
//! server's credential key. The embedded id lets check-in find the student;
//! the signature rejects forged strings without a store round-trip.
//!
//! ## Revocation
//!
//! A valid signature is not enough. Reissuing a credential overwrites the
//! stored value, and verification always compares the presented secret with
//! the *current* stored value (in constant time). A printed code from before
//! the reissue is authentically signed and still rejected.

use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use rollcall_core::StudentId;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::error::LedgerError;
use crate::store::{Credential, CredentialRepository, Roster};

/// Bytes of randomness in each issued credential.
const NONCE_LEN: usize = 32;

/// Error loading the credential signing key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key material is not valid hex.
    #[error("credential signing key is not valid hex: {0}")]
    InvalidHex(String),
    /// The key material decoded to the wrong number of bytes.
    #[error(
        "credential signing key must be exactly {} hex chars ({} bytes), got {} bytes",
        .expected * 2,
        .expected,
        .actual
    )]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Decoded byte length.
        actual: usize,
    },
}

/// Ed25519 key that signs and verifies credential secrets.
pub struct CredentialSigner {
    key: SigningKey,
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("verifying_key", &self.verifying_key_hex())
            .finish()
    }
}

impl CredentialSigner {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Load a key from 64 hex characters (32 secret bytes).
    ///
    /// # Errors
    ///
    /// [`KeyError::InvalidHex`] or [`KeyError::InvalidLength`].
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim()).map_err(|e| KeyError::InvalidHex(e.to_string()))?,
        );
        if bytes.len() != 32 {
            return Err(KeyError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes);
        let key = SigningKey::from_bytes(&secret);
        secret.zeroize();
        Ok(Self { key })
    }

    /// Hex of the public half, safe to log.
    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }

    fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    fn sign(&self, message: &str) -> String {
        hex::encode(self.key.sign(message.as_bytes()).to_bytes())
    }

    fn signature_valid(&self, message: &str, signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };
        self.verifying_key()
            .verify(message.as_bytes(), &signature)
            .is_ok()
    }
}

/// Structural parts of a presented secret.
#[derive(Debug, PartialEq, Eq)]
struct ParsedSecret<'a> {
    student_id: StudentId,
    signed: &'a str,
    signature_hex: &'a str,
}

fn parse_secret(presented: &str) -> Option<ParsedSecret<'_>> {
    let (signed, signature_hex) = presented.rsplit_once('.')?;
    let (id, nonce_hex) = signed.split_once('.')?;
    if nonce_hex.len() != NONCE_LEN * 2 || !nonce_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(ParsedSecret {
        student_id: id.parse().ok()?,
        signed,
        signature_hex,
    })
}

/// Issues, verifies and resolves student credentials.
///
/// The store is the sole writer of credentials; the check-in path only reads.
#[derive(Clone)]
pub struct CredentialStore {
    repository: Arc<dyn CredentialRepository>,
    roster: Arc<dyn Roster>,
    signer: Arc<CredentialSigner>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Assemble a store from its collaborators.
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        roster: Arc<dyn Roster>,
        signer: Arc<CredentialSigner>,
    ) -> Self {
        Self {
            repository,
            roster,
            signer,
        }
    }

    /// Issue a new credential for `student_id`, replacing (and thereby
    /// revoking) any previous one. Returns the secret value.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownStudent`] if the student is not enrolled.
    pub async fn issue(&self, student_id: StudentId) -> Result<String, LedgerError> {
        if self.roster.student(student_id).await?.is_none() {
            return Err(LedgerError::UnknownStudent(student_id));
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let signed = format!("{student_id}.{}", hex::encode(nonce));
        let secret_value = format!("{signed}.{}", self.signer.sign(&signed));

        self.repository
            .put(Credential {
                student_id,
                secret_value: secret_value.clone(),
                issued_at: Utc::now(),
            })
            .await?;

        tracing::info!(student_id = %student_id, "credential issued");
        Ok(secret_value)
    }

    /// Whether `presented` is the current credential of `student_id`.
    pub async fn verify(&self, student_id: StudentId, presented: &str) -> Result<bool, LedgerError> {
        let Some(parsed) = parse_secret(presented) else {
            return Ok(false);
        };
        if parsed.student_id != student_id
            || !self.signer.signature_valid(parsed.signed, parsed.signature_hex)
        {
            return Ok(false);
        }
        let Some(current) = self.repository.get(student_id).await? else {
            return Ok(false);
        };
        let stored = current.secret_value.as_bytes();
        let presented = presented.as_bytes();
        Ok(stored.len() == presented.len() && bool::from(stored.ct_eq(presented)))
    }

    /// Map a presented secret to the student it belongs to.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidCredential`] unless `presented` is well-formed,
    /// authentically signed and equal to the student's current credential.
    pub async fn resolve(&self, presented: &str) -> Result<StudentId, LedgerError> {
        let student_id = parse_secret(presented)
            .map(|p| p.student_id)
            .ok_or(LedgerError::InvalidCredential)?;
        if self.verify(student_id, presented).await? {
            Ok(student_id)
        } else {
            Err(LedgerError::InvalidCredential)
        }
    }
}
