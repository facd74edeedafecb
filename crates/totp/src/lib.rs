//! Time-based one-time passwords (RFC 6238, HMAC-SHA1).
//!
//! [`totp`] is what the account list shows: a code, or the fixed
//! [`INVALID_SECRET`] text when the stored secret is not base32.
//! [`generate`] is the typed form.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    data_encoding::BASE32_NOPAD,
    hmac::{Hmac, Mac},
    sha1::Sha1,
};

/// Shown in place of a code when the secret cannot be decoded.
pub const INVALID_SECRET: &str = "Invalid secret";

pub const DEFAULT_PERIOD: u64 = 30;
pub const DEFAULT_DIGITS: u32 = 6;

/// Errors returned while generating a TOTP value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotpError {
    #[error("secret is not valid base32")]
    InvalidSecret,
    #[error("digits must be between 6 and 8")]
    UnsupportedDigits,
    #[error("period must be greater than zero")]
    InvalidPeriod,
}

/// Code length and time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotpParams {
    pub period: u64,
    pub digits: u32,
}

impl Default for TotpParams {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            digits: DEFAULT_DIGITS,
        }
    }
}

/// A generated code and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpCode {
    pub code: String,
    pub period: u64,
    pub remaining_secs: u64,
}

/// Current 6-digit code for `secret`, or [`INVALID_SECRET`].
pub fn totp(secret: &str) -> String {
    totp_at(secret, unix_now())
}

/// 6-digit code for `secret` at `unix_secs`, or [`INVALID_SECRET`].
pub fn totp_at(secret: &str, unix_secs: u64) -> String {
    match generate(secret, TotpParams::default(), unix_secs) {
        Ok(code) => code.code,
        Err(_) => INVALID_SECRET.to_string(),
    }
}

/// Generate the code for `secret` at `unix_secs`.
pub fn generate(secret: &str, params: TotpParams, unix_secs: u64) -> Result<TotpCode, TotpError> {
    if !(6..=8).contains(&params.digits) {
        return Err(TotpError::UnsupportedDigits);
    }
    if params.period == 0 {
        return Err(TotpError::InvalidPeriod);
    }

    let key = decode_secret(secret).ok_or(TotpError::InvalidSecret)?;
    let counter = unix_secs / params.period;
    let value = hotp(&key, counter)? % 10u32.pow(params.digits);

    Ok(TotpCode {
        code: format!("{value:0width$}", width = params.digits as usize),
        period: params.period,
        remaining_secs: params.period - unix_secs % params.period,
    })
}

/// RFC 4226 HOTP value before reduction to a digit count.
fn hotp(key: &[u8], counter: u64) -> Result<u32, TotpError> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(|_| TotpError::InvalidSecret)?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = usize::from(digest[digest.len() - 1] & 0x0f);
    let truncated = u32::from_be_bytes([
        digest[offset],
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Ok(truncated & 0x7fff_ffff)
}

/// Case-insensitive base32 with whitespace and padding ignored. Leftover
/// non-zero bits are rejected.
fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    let trimmed = normalized.trim_end_matches('=');
    if trimmed.is_empty() {
        return None;
    }
    BASE32_NOPAD.decode(trimmed.as_bytes()).ok()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn rfc6238_sha1_vectors() {
        let vectors = [
            (59, "287082"),
            (1_111_111_109, "081804"),
            (1_111_111_111, "050471"),
            (1_234_567_890, "005924"),
            (2_000_000_000, "279037"),
            (20_000_000_000, "353130"),
        ];
        for (time, expected) in vectors {
            assert_eq!(totp_at(RFC_SECRET, time), expected, "t = {time}");
        }
    }

    #[test]
    fn eight_digit_vector() {
        let params = TotpParams {
            period: 30,
            digits: 8,
        };
        assert_eq!(generate(RFC_SECRET, params, 59).unwrap().code, "94287082");
    }

    #[test]
    fn secret_is_normalized() {
        let messy = "gezd gnbv gy3t qojq gezd gnbv gy3t qojq";
        assert_eq!(totp_at(messy, 59), "287082");
        assert_eq!(totp_at("JBSWY3DPEE======", 0), totp_at("jbswy3dpee", 0));
    }

    #[test]
    fn invalid_secret_yields_sentinel() {
        assert_eq!(totp_at("not base32!", 59), INVALID_SECRET);
        assert_eq!(totp_at("", 59), INVALID_SECRET);
        // Eight base32 characters carry 40 bits; one extra leaves 5 bits over.
        assert_eq!(totp_at("JBSWY3DPE", 59), INVALID_SECRET);
    }

    #[test]
    fn code_length_matches_digits() {
        for digits in 6..=8 {
            let params = TotpParams { period: 30, digits };
            for time in [0, 59, 1_234_567_890] {
                let code = generate(RFC_SECRET, params, time).unwrap();
                assert_eq!(code.code.len(), digits as usize);
            }
        }
    }

    #[test]
    fn rejects_bad_params() {
        let digits = TotpParams {
            period: 30,
            digits: 5,
        };
        assert_eq!(
            generate(RFC_SECRET, digits, 0),
            Err(TotpError::UnsupportedDigits)
        );
        let period = TotpParams {
            period: 0,
            digits: 6,
        };
        assert_eq!(
            generate(RFC_SECRET, period, 0),
            Err(TotpError::InvalidPeriod)
        );
    }

    #[test]
    fn remaining_seconds_count_down() {
        let params = TotpParams::default();
        assert_eq!(generate(RFC_SECRET, params, 60).unwrap().remaining_secs, 30);
        assert_eq!(generate(RFC_SECRET, params, 59).unwrap().remaining_secs, 1);
    }
}
