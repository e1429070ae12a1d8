//! HOTP (RFC 4226) and TOTP (RFC 6238) code generation.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::OtpError;

type HmacSha1 = Hmac<Sha1>;

/// Default TOTP time step.
pub const DEFAULT_STEP_SECS: u64 = 30;

/// Default code length.
pub const DEFAULT_DIGITS: u32 = 6;

/// Compute an HOTP code for `counter`.
///
/// HMAC-SHA1 over the 8-byte big-endian counter, dynamic truncation at
/// `digest[19] & 0x0f`, reduced modulo `10^digits` and zero padded.
pub fn generate_code(secret: &[u8], counter: u64, digits: u32) -> Result<String, OtpError> {
    if !(6..=8).contains(&digits) {
        return Err(OtpError::InvalidDigits(digits));
    }
    if secret.is_empty() {
        return Err(OtpError::CodeGeneration("empty key".to_string()));
    }

    let mut mac = HmacSha1::new_from_slice(secret)
        .map_err(|e| OtpError::CodeGeneration(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let window = digest
        .get(offset..offset + 4)
        .ok_or_else(|| OtpError::CodeGeneration("truncation offset out of range".to_string()))?;

    let binary = ((window[0] as u32 & 0x7f) << 24)
        | ((window[1] as u32) << 16)
        | ((window[2] as u32) << 8)
        | (window[3] as u32);

    let code = binary % 10u32.pow(digits);
    Ok(format!("{:0width$}", code, width = digits as usize))
}

/// Time-based code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpGenerator {
    pub step_secs: u64,
    pub digits: u32,
}

impl Default for TotpGenerator {
    fn default() -> Self {
        Self {
            step_secs: DEFAULT_STEP_SECS,
            digits: DEFAULT_DIGITS,
        }
    }
}

impl TotpGenerator {
    pub fn new(step_secs: u64, digits: u32) -> Self {
        Self { step_secs, digits }
    }

    /// Counter value for a Unix timestamp. Timestamps before the epoch clamp to 0.
    pub fn counter_at(&self, unix_secs: i64) -> u64 {
        let step = self.step_secs.max(1);
        unix_secs.max(0) as u64 / step
    }

    /// Code valid at `unix_secs`.
    pub fn code_at(&self, secret: &[u8], unix_secs: i64) -> Result<String, OtpError> {
        generate_code(secret, self.counter_at(unix_secs), self.digits)
    }

    /// Code valid right now.
    pub fn now(&self, secret: &[u8]) -> Result<String, OtpError> {
        self.code_at(secret, Utc::now().timestamp())
    }

    /// Codes for `counter - window ..= counter + window` around `unix_secs`.
    ///
    /// Used to tolerate clock skew between this host and the vendor.
    pub fn window_at(
        &self,
        secret: &[u8],
        unix_secs: i64,
        window: u64,
    ) -> Result<Vec<String>, OtpError> {
        let counter = self.counter_at(unix_secs);
        let start = counter.saturating_sub(window);
        let end = counter.saturating_add(window);
        (start..=end)
            .map(|c| generate_code(secret, c, self.digits))
            .collect()
    }

    /// Codes around the current time.
    pub fn window(&self, secret: &[u8], window: u64) -> Result<Vec<String>, OtpError> {
        self.window_at(secret, Utc::now().timestamp(), window)
    }

    /// Seconds until the code valid at `unix_secs` rotates.
    pub fn seconds_remaining(&self, unix_secs: i64) -> u64 {
        let step = self.step_secs.max(1);
        step - (unix_secs.max(0) as u64 % step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn test_rfc4226_vectors() {
        let expected = [
            "755224", "287082", "359152", "969429", "338314", "254676", "287922", "162583",
            "399871", "520489",
        ];
        for (counter, code) in expected.iter().enumerate() {
            assert_eq!(generate_code(RFC_SECRET, counter as u64, 6).unwrap(), *code);
        }
    }

    #[test]
    fn test_rfc6238_sha1_vectors() {
        let totp = TotpGenerator::new(30, 8);
        assert_eq!(totp.code_at(RFC_SECRET, 59).unwrap(), "94287082");
        assert_eq!(totp.code_at(RFC_SECRET, 1_111_111_109).unwrap(), "07081804");
        assert_eq!(totp.code_at(RFC_SECRET, 1_111_111_111).unwrap(), "14050471");
        assert_eq!(totp.code_at(RFC_SECRET, 1_234_567_890).unwrap(), "89005924");
        assert_eq!(totp.code_at(RFC_SECRET, 2_000_000_000).unwrap(), "69279037");
        assert_eq!(totp.code_at(RFC_SECRET, 20_000_000_000).unwrap(), "65353130");
    }

    #[test]
    fn test_default_six_digits() {
        let totp = TotpGenerator::default();
        assert_eq!(totp.code_at(RFC_SECRET, 59).unwrap(), "287082");
    }

    #[test]
    fn test_window_spans_neighbours() {
        let totp = TotpGenerator::default();
        let codes = totp.window_at(RFC_SECRET, 59, 1).unwrap();
        assert_eq!(codes, vec!["755224", "287082", "359152"]);
    }

    #[test]
    fn test_window_size() {
        let totp = TotpGenerator::default();
        let codes = totp.window_at(RFC_SECRET, 1_700_000_000, 2).unwrap();
        assert_eq!(codes.len(), 5);
    }

    #[test]
    fn test_invalid_digits() {
        assert!(matches!(
            generate_code(RFC_SECRET, 0, 4),
            Err(OtpError::InvalidDigits(4))
        ));
        assert!(matches!(
            generate_code(RFC_SECRET, 0, 9),
            Err(OtpError::InvalidDigits(9))
        ));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            generate_code(&[], 0, 6),
            Err(OtpError::CodeGeneration(_))
        ));
    }

    #[test]
    fn test_seconds_remaining() {
        let totp = TotpGenerator::default();
        assert_eq!(totp.seconds_remaining(59), 1);
        assert_eq!(totp.seconds_remaining(60), 30);
        assert_eq!(totp.seconds_remaining(0), 30);
    }

    #[test]
    fn test_counter_before_epoch() {
        let totp = TotpGenerator::default();
        assert_eq!(totp.counter_at(-100), 0);
    }
}
