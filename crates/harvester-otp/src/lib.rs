//! # Harvester OTP
//!
//! Second-factor support for vendor logins:
//!
//! - [`decode_secret`] accepts the secret formats vendors hand out
//!   (Base32 from QR provisioning, hex and Base64 from exports).
//! - [`generate_code`] implements RFC 4226 HOTP.
//! - [`TotpGenerator`] derives RFC 6238 time-based codes on top of it.
//!
//! ```rust
//! use harvester_otp::{decode_secret, TotpGenerator};
//!
//! let secret = decode_secret("JBSWY3DPEHPK3PXP").unwrap();
//! let code = TotpGenerator::default().code_at(&secret, 59).unwrap();
//! assert_eq!(code.len(), 6);
//! ```

mod error;
mod hotp;
mod secret;

pub use error::OtpError;
pub use hotp::{generate_code, TotpGenerator, DEFAULT_DIGITS, DEFAULT_STEP_SECS};
pub use secret::{decode_secret, decode_with_encoding, is_valid_secret, SecretEncoding};
