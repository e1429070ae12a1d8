//! OTP error types.

use thiserror::Error;

/// Errors raised while decoding secrets or deriving codes.
///
/// Messages never echo the secret itself.
#[derive(Debug, Error)]
pub enum OtpError {
    /// The secret matched none of the supported encodings.
    #[error("Unrecognised secret format: {0}")]
    SecretFormat(String),

    /// HMAC computation or truncation failed.
    #[error("Code generation failed: {0}")]
    CodeGeneration(String),

    /// Requested code length outside the supported range.
    #[error("Unsupported digit count: {0} (expected 6 to 8)")]
    InvalidDigits(u32),
}
