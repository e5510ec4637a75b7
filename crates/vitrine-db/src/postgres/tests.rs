//! Tests for parameter binding and wire decoding

use tokio_postgres::types::Type;
use vitrine_core::Value;

use super::{PgParam, decode_numeric};

fn numeric_payload(groups: &[u16], weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
    let mut raw = Vec::with_capacity(8 + groups.len() * 2);
    raw.extend_from_slice(&(groups.len() as u16).to_be_bytes());
    raw.extend_from_slice(&weight.to_be_bytes());
    raw.extend_from_slice(&sign.to_be_bytes());
    raw.extend_from_slice(&dscale.to_be_bytes());
    for group in groups {
        raw.extend_from_slice(&group.to_be_bytes());
    }
    raw
}

// =============================================================================
// NUMERIC decoding
// =============================================================================

#[test]
fn test_decode_numeric_simple() {
    let raw = numeric_payload(&[123, 4500], 0, 0, 2);
    assert_eq!(decode_numeric(&raw).expect("decode"), "123.45");
}

#[test]
fn test_decode_numeric_integer() {
    let raw = numeric_payload(&[42], 0, 0, 0);
    assert_eq!(decode_numeric(&raw).expect("decode"), "42");
}

#[test]
fn test_decode_numeric_negative() {
    let raw = numeric_payload(&[42], 0, 0x4000, 0);
    assert_eq!(decode_numeric(&raw).expect("decode"), "-42");
}

#[test]
fn test_decode_numeric_fraction_only() {
    let raw = numeric_payload(&[5000], -1, 0, 1);
    assert_eq!(decode_numeric(&raw).expect("decode"), "0.5");
}

#[test]
fn test_decode_numeric_small_fraction() {
    // 0.00000001: one stored group four places past the first fractional group
    let raw = numeric_payload(&[1], -2, 0, 8);
    assert_eq!(decode_numeric(&raw).expect("decode"), "0.00000001");
}

#[test]
fn test_decode_numeric_trailing_integer_zeros() {
    let raw = numeric_payload(&[1], 1, 0, 0);
    assert_eq!(decode_numeric(&raw).expect("decode"), "10000");
}

#[test]
fn test_decode_numeric_keeps_display_scale() {
    let raw = numeric_payload(&[1, 5000], 0, 0, 2);
    assert_eq!(decode_numeric(&raw).expect("decode"), "1.50");
}

#[test]
fn test_decode_numeric_nan() {
    let raw = numeric_payload(&[], 0, 0xC000, 0);
    assert_eq!(decode_numeric(&raw).expect("decode"), "NaN");
}

#[test]
fn test_decode_numeric_rejects_short_payload() {
    assert!(decode_numeric(&[0, 0, 0]).is_err());
}

#[test]
fn test_decode_numeric_rejects_truncated_digits() {
    // Header promises two groups but only one follows
    let mut raw = numeric_payload(&[123], 0, 0, 0);
    raw[1] = 2;
    assert!(decode_numeric(&raw).is_err());
}

// =============================================================================
// Parameter binding
// =============================================================================

#[test]
fn test_int_width_coerced_to_target_type() {
    assert!(matches!(
        PgParam::from_value_for_type(&Value::Int64(5), &Type::INT2),
        PgParam::Int16(5)
    ));
    assert!(matches!(
        PgParam::from_value_for_type(&Value::Int64(5), &Type::INT4),
        PgParam::Int32(5)
    ));
    assert!(matches!(
        PgParam::from_value_for_type(&Value::Int16(5), &Type::INT8),
        PgParam::Int64(5)
    ));
}

#[test]
fn test_float_width_coerced_to_target_type() {
    assert!(matches!(
        PgParam::from_value_for_type(&Value::Float32(1.5), &Type::FLOAT8),
        PgParam::Float64(_)
    ));
    assert!(matches!(
        PgParam::from_value_for_type(&Value::Float64(1.5), &Type::FLOAT4),
        PgParam::Float32(_)
    ));
}

#[test]
fn test_untyped_fallback_binding() {
    assert!(matches!(
        PgParam::from_value(&Value::String("portfolio".into())),
        PgParam::String(_)
    ));
    assert!(matches!(PgParam::from_value(&Value::Null), PgParam::Null));
    assert!(matches!(
        PgParam::from_value(&Value::Bool(true)),
        PgParam::Bool(true)
    ));
}
