// Time-based one-time passwords (RFC 6238)
// Decision: HMAC-SHA1, 30 second step, 6 digits, one step of clock skew either way
// Decision: Secrets are stored hex-encoded and shown to users as unpadded base32

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

pub const STEP_SECS: u64 = 30;
pub const DIGITS: u32 = 6;
pub const SKEW_STEPS: i64 = 1;
pub const SECRET_LEN: usize = 20;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Fresh random secret bytes
pub fn generate_secret() -> Vec<u8> {
    let bytes: [u8; SECRET_LEN] = rand::thread_rng().gen();
    bytes.to_vec()
}

/// RFC 4648 base32 without padding, as authenticator apps expect
pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// `otpauth://` URI for QR provisioning
pub fn provisioning_uri(issuer: &str, account: &str, secret: &[u8]) -> String {
    let issuer_enc = urlencoding::encode(issuer);
    format!(
        "otpauth://totp/{issuer_enc}:{}?secret={}&issuer={issuer_enc}&algorithm=SHA1&digits={DIGITS}&period={STEP_SECS}",
        urlencoding::encode(account),
        base32_encode(secret),
    )
}

/// HOTP value for a counter (RFC 4226 dynamic truncation)
pub fn hotp(secret: &[u8], counter: u64, digits: u32) -> Result<u32> {
    let mut mac =
        Hmac::<Sha1>::new_from_slice(secret).context("Invalid TOTP secret length")?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset] & 0x7f) << 24)
        | (u32::from(digest[offset + 1]) << 16)
        | (u32::from(digest[offset + 2]) << 8)
        | u32::from(digest[offset + 3]);

    Ok(binary % 10u32.pow(digits))
}

/// Code for the step containing `unix_secs`, zero padded
pub fn code_at(secret: &[u8], unix_secs: u64) -> Result<String> {
    let value = hotp(secret, unix_secs / STEP_SECS, DIGITS)?;
    Ok(format!("{value:0width$}", width = DIGITS as usize))
}

/// Step whose code matches, checking the current step and its neighbours.
/// Callers record the returned step so the same code cannot be replayed.
pub fn matching_step(secret: &[u8], code: &str, unix_secs: u64) -> Result<Option<u64>> {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let current = (unix_secs / STEP_SECS) as i64;
    for delta in -SKEW_STEPS..=SKEW_STEPS {
        let counter = current + delta;
        if counter < 0 {
            continue;
        }
        let expected = hotp(secret, counter as u64, DIGITS)?;
        if format!("{expected:0width$}", width = DIGITS as usize) == code {
            return Ok(Some(counter as u64));
        }
    }
    Ok(None)
}

/// Check a user-entered code against the current step and its neighbours
pub fn verify(secret: &[u8], code: &str, unix_secs: u64) -> Result<bool> {
    Ok(matching_step(secret, code, unix_secs)?.is_some())
}

/// `matching_step` against the wall clock
pub fn matching_step_now(secret: &[u8], code: &str) -> Result<Option<u64>> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    matching_step(secret, code, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn test_rfc6238_vectors() {
        // Last six digits of the SHA1 vectors in RFC 6238 appendix B
        assert_eq!(code_at(RFC_SECRET, 59).unwrap(), "287082");
        assert_eq!(code_at(RFC_SECRET, 1111111109).unwrap(), "081804");
        assert_eq!(code_at(RFC_SECRET, 1111111111).unwrap(), "050471");
        assert_eq!(code_at(RFC_SECRET, 1234567890).unwrap(), "005924");
        assert_eq!(code_at(RFC_SECRET, 2000000000).unwrap(), "279037");
    }

    #[test]
    fn test_verify_accepts_one_step_of_skew() {
        let now = 1111111111;
        let previous = code_at(RFC_SECRET, now - STEP_SECS).unwrap();
        let next = code_at(RFC_SECRET, now + STEP_SECS).unwrap();
        let far = code_at(RFC_SECRET, now + 3 * STEP_SECS).unwrap();

        assert!(verify(RFC_SECRET, &previous, now).unwrap());
        assert!(verify(RFC_SECRET, &next, now).unwrap());
        assert!(!verify(RFC_SECRET, &far, now).unwrap());
    }

    #[test]
    fn test_matching_step_reports_the_step_used() {
        let now = 1111111111;
        let step = now / STEP_SECS;
        let previous = code_at(RFC_SECRET, now - STEP_SECS).unwrap();
        let current = code_at(RFC_SECRET, now).unwrap();

        assert_eq!(matching_step(RFC_SECRET, &current, now).unwrap(), Some(step));
        assert_eq!(matching_step(RFC_SECRET, &previous, now).unwrap(), Some(step - 1));
        assert_eq!(matching_step(RFC_SECRET, "000000x", now).unwrap(), None);
    }

    #[test]
    fn test_verify_rejects_malformed_codes() {
        assert!(!verify(RFC_SECRET, "", 59).unwrap());
        assert!(!verify(RFC_SECRET, "28708", 59).unwrap());
        assert!(!verify(RFC_SECRET, "28708a", 59).unwrap());
        assert!(verify(RFC_SECRET, " 287082 ", 59).unwrap());
    }

    #[test]
    fn test_base32() {
        assert_eq!(base32_encode(b""), "");
        assert_eq!(base32_encode(b"f"), "MY");
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(
            base32_encode(RFC_SECRET),
            "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"
        );
    }

    #[test]
    fn test_provisioning_uri() {
        let uri = provisioning_uri("Atelier", "ana@example.com", RFC_SECRET);
        assert!(uri.starts_with("otpauth://totp/Atelier:ana%40example.com?"));
        assert!(uri.contains("secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ"));
        assert!(uri.contains("issuer=Atelier&"));

        let uri = provisioning_uri("Atelier Studio", "a+b@example.com", RFC_SECRET);
        assert!(uri.starts_with("otpauth://totp/Atelier%20Studio:a%2Bb%40example.com?"));
        assert!(uri.contains("issuer=Atelier%20Studio&"));
    }

    #[test]
    fn test_generated_secret_length() {
        let a = generate_secret();
        assert_eq!(a.len(), SECRET_LEN);
        assert_ne!(a, generate_secret());
    }
}
