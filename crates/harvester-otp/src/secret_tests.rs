use super::*;

const HELLO_KEY: &[u8] = b"Hello!\xDE\xAD\xBE\xEF";

#[test]
fn test_decode_base32() {
    let (bytes, encoding) = decode_with_encoding("JBSWY3DPEHPK3PXP").unwrap();
    assert_eq!(bytes, HELLO_KEY);
    assert_eq!(encoding, SecretEncoding::Base32);
}

#[test]
fn test_decode_base32_lowercase_grouped() {
    let bytes = decode_secret("jbsw y3dp ehpk 3pxp").unwrap();
    assert_eq!(bytes, HELLO_KEY);
}

#[test]
fn test_decode_base32_with_padding() {
    let bytes = decode_secret("JBSWY3DPEHPK3PXP======").unwrap();
    assert_eq!(bytes, HELLO_KEY);
}

#[test]
fn test_decode_base32_ignores_trailing_bits() {
    let (bytes, encoding) = decode_with_encoding("JBSWY3DPEHPK3PXPJBSWY3DPEZ").unwrap();
    assert_eq!(encoding, SecretEncoding::Base32);
    assert_eq!(bytes.len(), 16);
    assert_eq!(&bytes[..10], HELLO_KEY);
}

#[test]
fn test_decode_base32_odd_tail_keeps_alphabet_characters() {
    // 17 symbols: the last one holds only leftover bits.
    let (bytes, encoding) = decode_with_encoding("JBSWY3DPEHPK3PXPA").unwrap();
    assert_eq!(encoding, SecretEncoding::Base32);
    assert_eq!(bytes, HELLO_KEY);
}

#[test]
fn test_decode_url_safe_base64_keeps_dashes() {
    let (bytes, encoding) = decode_with_encoding("ab-cd_efghijklmn").unwrap();
    assert_eq!(encoding, SecretEncoding::Base64);
    assert_eq!(
        bytes,
        [0x69, 0xbf, 0x9c, 0x77, 0xf7, 0x9f, 0x82, 0x18, 0xa3, 0x92, 0x59, 0xa7]
    );
}

#[test]
fn test_decode_hex() {
    let (bytes, encoding) =
        decode_with_encoding("3132333435363738393031323334353637383930").unwrap();
    assert_eq!(bytes, b"12345678901234567890");
    assert_eq!(encoding, SecretEncoding::Hex);
}

#[test]
fn test_decode_loose_base32() {
    let (bytes, encoding) = decode_with_encoding("JBSWY3DP!EHPK3PXP").unwrap();
    assert_eq!(bytes, HELLO_KEY);
    assert_eq!(encoding, SecretEncoding::LooseBase32);
}

#[test]
fn test_decode_base64() {
    let (bytes, encoding) = decode_with_encoding("SGVsbG8gV29ybGQh").unwrap();
    assert_eq!(bytes, b"Hello World!");
    assert_eq!(encoding, SecretEncoding::Base64);
}

#[test]
fn test_decode_is_deterministic() {
    for secret in ["JBSWY3DPEHPK3PXP", "3132333435363738393031323334353637383930", "SGVsbG8gV29ybGQh"] {
        let first = decode_secret(secret).unwrap();
        for _ in 0..5 {
            assert_eq!(decode_secret(secret).unwrap(), first);
        }
    }
}

#[test]
fn test_decode_rejects_garbage() {
    let err = decode_secret("!!!!").unwrap_err();
    assert!(matches!(err, OtpError::SecretFormat(_)));
}

#[test]
fn test_decode_rejects_empty() {
    assert!(matches!(decode_secret(""), Err(OtpError::SecretFormat(_))));
    assert!(matches!(decode_secret("  \t "), Err(OtpError::SecretFormat(_))));
}

#[test]
fn test_error_does_not_echo_secret() {
    let err = decode_secret("%%secret%%").unwrap_err();
    assert!(!err.to_string().contains("secret%%"));
}

#[test]
fn test_is_valid_secret_boundaries() {
    assert!(!is_valid_secret(""));
    assert!(!is_valid_secret("   "));
    assert!(is_valid_secret("JBSWY3DPEHPK3PXP"));
    assert!(!is_valid_secret("ABC"));
}

#[test]
fn test_is_valid_secret_hex() {
    assert!(is_valid_secret("0123456789abcdef0123"));
    assert!(!is_valid_secret("0123456789abcdef01234"));
}

#[test]
fn test_is_valid_secret_base64() {
    assert!(is_valid_secret("SGVsbG8gV29ybGQh"));
    assert!(!is_valid_secret("SGVsbG8="));
}
