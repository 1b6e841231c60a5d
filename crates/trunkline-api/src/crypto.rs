//! HMAC-SHA256 signature verification for webhook authenticity.
//!
//! The PBX platform signs the JSON string it serialized, not the bytes that
//! arrive on the wire, because intermediate transport may reformat JSON.
//! Verification therefore canonicalizes the body back to the sender's
//! compact serialization before computing the digest.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Result of signature validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the signature is valid.
    pub is_valid: bool,
    /// Error message if validation failed.
    pub error_message: Option<String>,
}

impl ValidationResult {
    /// Creates a successful validation result.
    pub fn valid() -> Self {
        Self { is_valid: true, error_message: None }
    }

    /// Creates a failed validation result with error message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self { is_valid: false, error_message: Some(message.into()) }
    }
}

/// Signature validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No secret is provisioned for the resolved sender.
    MissingSecret,
    /// No signature header was supplied.
    MissingSignature,
    /// Request body is not valid UTF-8.
    InvalidBodyEncoding,
    /// Invalid secret key.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecret => write!(f, "no secret configured for sender"),
            Self::MissingSignature => write!(f, "signature header missing"),
            Self::InvalidBodyEncoding => write!(f, "request body is not valid UTF-8"),
            Self::InvalidSecret => write!(f, "invalid secret key"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Validates a webhook signature using HMAC-SHA256.
///
/// Policy, in order:
/// 1. No secret for the sender rejects the request. There is no
///    accept-all mode for senders without a secret.
/// 2. A secret without a signature header rejects the request.
/// 3. The body is canonicalized (see [`canonical_body`]) and
///    `HMAC-SHA256(secret, canonical_body)` is computed as lower-case hex.
/// 4. The received value, with a conventional `sha256=` prefix stripped,
///    is compared case-insensitively in constant time.
///
/// Never panics; every internal failure is a verification failure.
pub fn verify_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: Option<&str>,
) -> ValidationResult {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return ValidationResult::invalid(SignatureError::MissingSecret.to_string());
    };

    let Some(signature) = signature.filter(|s| !s.is_empty()) else {
        return ValidationResult::invalid(SignatureError::MissingSignature.to_string());
    };

    let canonical = match canonical_body(body) {
        Ok(canonical) => canonical,
        Err(err) => return ValidationResult::invalid(err.to_string()),
    };

    let expected = match generate_hmac_hex(canonical.as_bytes(), secret) {
        Ok(expected) => expected,
        Err(err) => return ValidationResult::invalid(err.to_string()),
    };

    let received = signature.strip_prefix("sha256=").unwrap_or(signature).to_ascii_lowercase();

    if timing_safe_eq(&received, &expected) {
        ValidationResult::valid()
    } else {
        ValidationResult::invalid("signature mismatch")
    }
}

/// Reconstructs the string the sender signed.
///
/// JSON bodies are re-serialized in the minimal separator form with keys in
/// their original order, matching the sender's own serialization. Non-JSON
/// bodies are used as UTF-8 text unmodified.
///
/// # Errors
///
/// Returns `SignatureError::InvalidBodyEncoding` for non-JSON bodies that
/// are not valid UTF-8.
pub fn canonical_body(raw: &[u8]) -> Result<String, SignatureError> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(raw) {
        return serde_json::to_string(&value).map_err(|_| SignatureError::InvalidBodyEncoding);
    }

    match std::str::from_utf8(raw) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => Err(SignatureError::InvalidBodyEncoding),
    }
}

/// Generates an HMAC-SHA256 digest as a lower-case hex string.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret key is invalid.
pub fn generate_hmac_hex(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(payload);
    let result = mac.finalize();
    Ok(hex::encode(result.into_bytes()))
}

/// Signs a raw request body the way the sender does.
///
/// Canonicalizes the body and computes the digest; the counterpart of
/// [`verify_signature`] used by tests and the `trunkline-sign` tool.
///
/// # Errors
///
/// Returns an error for undecodable bodies or an invalid secret.
pub fn sign_body(raw: &[u8], secret: &str) -> Result<String, SignatureError> {
    let canonical = canonical_body(raw)?;
    generate_hmac_hex(canonical.as_bytes(), secret)
}

/// Timing-safe string comparison to prevent timing attacks.
///
/// Folds the XOR of every byte pair so a mismatch position does not change
/// the comparison time.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    let mut result = 0u8;
    for (a_byte, b_byte) in a_bytes.iter().zip(b_bytes.iter()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
