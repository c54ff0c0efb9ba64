//! IBM System/360 hexadecimal floating point and SAS missing values
//!
//! Transport numerics are 8-byte IBM floats: a sign bit, a 7-bit base-16
//! exponent biased by 64 and a 56-bit fraction in `[1/16, 1)`. Missing values
//! are a single marker byte (`.`, `_` or `A`-`Z`) followed by zeros.

/// Standard missing value (`.`)
pub const MISSING_STANDARD: [u8; 8] = [b'.', 0, 0, 0, 0, 0, 0, 0];

/// Error for values outside the IBM range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overflow(pub f64);

/// Encode an IEEE double as an IBM float
///
/// Values too small for the IBM range become zero.
pub fn ieee_to_ibm(value: f64) -> Result<[u8; 8], Overflow> {
    if value == 0.0 {
        return Ok([0; 8]);
    }
    if !value.is_finite() {
        return Err(Overflow(value));
    }

    let bits = value.abs().to_bits();
    let exponent = ((bits >> 52) & 0x7ff) as i32;
    if exponent == 0 {
        // Subnormal, far below the smallest IBM magnitude
        return Ok([0; 8]);
    }
    let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);

    // value = (mantissa / 2^53) * 2^e2 with the fraction in [0.5, 1)
    let e2 = exponent - 1022;
    let e16 = (e2 + 3).div_euclid(4);
    let shift = 4 * e16 - e2;
    let fraction = mantissa << (3 - shift);

    let biased = e16 + 64;
    if biased > 127 {
        return Err(Overflow(value));
    }
    if biased < 0 {
        return Ok([0; 8]);
    }

    let mut out = [0u8; 8];
    out[0] = (biased as u8) | if value < 0.0 { 0x80 } else { 0 };
    out[1..].copy_from_slice(&fraction.to_be_bytes()[1..]);
    Ok(out)
}

/// Decode an IBM float into an IEEE double
pub fn ibm_to_ieee(bytes: [u8; 8]) -> f64 {
    let mut raw = [0u8; 8];
    raw[1..].copy_from_slice(&bytes[1..]);
    let fraction = u64::from_be_bytes(raw);
    if fraction == 0 {
        return 0.0;
    }

    let exponent = i32::from(bytes[0] & 0x7f) - 64;
    let magnitude = fraction as f64 * 2f64.powi(4 * exponent - 56);
    if bytes[0] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Whether the bytes hold one of the 28 SAS missing values
pub fn is_missing(bytes: &[u8]) -> bool {
    match bytes.split_first() {
        Some((&first, rest)) => {
            matches!(first, b'.' | b'_' | b'A'..=b'Z') && rest.iter().all(|&b| b == 0)
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(ieee_to_ibm(1.0).unwrap(), [0x41, 0x10, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ieee_to_ibm(-1.0).unwrap(), [0xc1, 0x10, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ieee_to_ibm(86400.0).unwrap(), [0x45, 0x15, 0x18, 0, 0, 0, 0, 0]);
        assert_eq!(ieee_to_ibm(0.5).unwrap(), [0x40, 0x80, 0, 0, 0, 0, 0, 0]);
        assert_eq!(ieee_to_ibm(0.0).unwrap(), [0; 8]);
    }

    #[test]
    fn test_decode_is_exact_for_ieee_inputs() {
        for value in [1.0, -2.5, 86400.0, 0.1, 1e-30, 123456789.125, -7.0e70, f64::EPSILON] {
            let encoded = ieee_to_ibm(value).unwrap();
            assert_eq!(ibm_to_ieee(encoded), value, "{value}");
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(ieee_to_ibm(1e80).is_err());
        assert!(ieee_to_ibm(f64::NAN).is_err());
        assert_eq!(ieee_to_ibm(1e-90).unwrap(), [0; 8]);
    }

    #[test]
    fn test_missing_markers() {
        assert!(is_missing(&MISSING_STANDARD));
        assert!(is_missing(&[b'_', 0, 0, 0, 0, 0, 0, 0]));
        assert!(is_missing(&[b'Z', 0, 0, 0, 0, 0, 0, 0]));
        assert!(!is_missing(&[b'a', 0, 0, 0, 0, 0, 0, 0]));
        assert!(!is_missing(&ieee_to_ibm(1.0).unwrap()));
    }
}
