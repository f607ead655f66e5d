/// Canonical JSON used as the hash input for evidence records.
///
/// Rules:
/// - object keys sorted lexicographically (by UTF-8 bytes) at every level
/// - no whitespace, `,` and `:` separators
/// - floats in shortest round-trip form, laid out like Python's `repr`
///   (`0.1`, `1.0`, `4.8e-05`, `1e+16`), non-finite floats rejected
/// - non-ASCII text written as raw UTF-8, only JSON-mandatory escapes
///
/// Keys are sorted here rather than relying on `serde_json::Map` ordering,
/// which flips to insertion order when any crate in the build enables
/// `preserve_order`.
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{AnchorError, Result};

/// Serialize `value` into canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let tree = serde_json::to_value(value)
        .map_err(|e| AnchorError::Serialization(format!("Not canonicalizable: {e}")))?;
    let mut out = Vec::new();
    write_value(&tree, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out)?;
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
        Value::Number(n) if n.is_f64() => {
            let v = n.as_f64().unwrap_or(f64::NAN);
            out.extend_from_slice(format_float(v)?.as_bytes());
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

/// Render a float the way Python's `repr` does: shortest round-trip
/// digits, positional for decimal exponents in `-4..16`, scientific with a
/// signed two-digit exponent otherwise.
///
/// Digits come from `ryu` rather than `serde_json`'s writer, whose layout
/// has changed between releases.
fn format_float(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(AnchorError::Serialization(format!(
            "non-finite float {value} has no canonical form"
        )));
    }

    let mut buf = ryu::Buffer::new();
    let (digits, point) = decimal_digits(buf.format_finite(value.abs()));

    let mut out = String::new();
    if value.is_sign_negative() {
        out.push('-');
    }
    if digits.is_empty() {
        out.push_str("0.0");
        return Ok(out);
    }

    let exponent = point - 1;
    if (-4..16).contains(&exponent) {
        let len = digits.len() as i32;
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-point) as usize));
            out.push_str(&digits);
        } else if point >= len {
            out.push_str(&digits);
            out.extend(std::iter::repeat('0').take((point - len) as usize));
            out.push_str(".0");
        } else {
            let (int_part, frac_part) = digits.split_at(point as usize);
            out.push_str(int_part);
            out.push('.');
            out.push_str(frac_part);
        }
    } else {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("e{sign}{:02}", exponent.abs()));
    }
    Ok(out)
}

/// Split a non-negative decimal (`123.45`, `0.00048`, `1e16`, `4.8e-5`)
/// into significant digits and the position of the decimal point relative
/// to the first of them. Zero yields no digits.
fn decimal_digits(text: &str) -> (String, i32) {
    let (mantissa, exp) = match text.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (text, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

    let all = format!("{int_part}{frac_part}");
    let trimmed = all.trim_start_matches('0');
    let point = int_part.len() as i32 + exp - (all.len() - trimmed.len()) as i32;
    (trimmed.trim_end_matches('0').to_string(), point)
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    serde_json::to_writer(out, value).map_err(|e| AnchorError::Serialization(e.to_string()))
}

/// `serialize_with` helper that refuses NaN and infinities.
///
/// `serde_json` would otherwise write them as `null`, silently collapsing
/// distinct records onto the same digest.
pub fn finite<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    if !value.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "non-finite float {value} has no canonical form"
        )));
    }
    serializer.serialize_f64(*value)
}

/// [`finite`] for optional floats.
pub fn finite_opt<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(v) => finite(v, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Reading {
        #[serde(serialize_with = "finite")]
        value: f64,
        #[serde(serialize_with = "finite_opt")]
        lat: Option<f64>,
    }

    #[test]
    fn test_sorted_keys_and_no_whitespace() {
        let v = json!({"b": 1, "a": {"z": true, "y": [1, 2]}, "c": null});
        let bytes = to_canonical_bytes(&v).unwrap();
        assert_eq!(bytes, br#"{"a":{"y":[1,2],"z":true},"b":1,"c":null}"#);
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut first = serde_json::Map::new();
        first.insert("scene".into(), json!("7"));
        first.insert("count".into(), json!(3));
        let mut second = serde_json::Map::new();
        second.insert("count".into(), json!(3));
        second.insert("scene".into(), json!("7"));

        assert_eq!(
            to_canonical_bytes(&Value::Object(first)).unwrap(),
            to_canonical_bytes(&Value::Object(second)).unwrap()
        );
    }

    #[test]
    fn test_non_ascii_kept_raw() {
        let bytes = to_canonical_bytes(&json!({"name": "glorieta ñ"})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"name":"glorieta ñ"}"#);
    }

    #[test]
    fn test_float_rendering() {
        let bytes = to_canonical_bytes(&json!([0.1, 1.0, 1e-7, 2.5e20])).unwrap();
        assert_eq!(bytes, b"[0.1,1.0,1e-07,2.5e+20]");
    }

    #[test]
    fn test_floats_match_python_json_dumps() {
        // json.dumps(..., sort_keys=True, separators=(",", ":"))
        let v = json!({"occupancy_ratio": 4.8e-5, "d": 1e16, "c": 0.91});
        assert_eq!(
            to_canonical_bytes(&v).unwrap(),
            br#"{"c":0.91,"d":1e+16,"occupancy_ratio":4.8e-05}"#
        );

        let cases = [
            (0.1, "0.1"),
            (1e-7, "1e-07"),
            (4.8e-5, "4.8e-05"),
            (1e16, "1e+16"),
            (1e-4, "0.0001"),
            (1e15, "1000000000000000.0"),
            (1.5e16, "1.5e+16"),
            (123.456, "123.456"),
            (0.0348, "0.0348"),
            (0.0, "0.0"),
            (-0.0, "-0.0"),
            (-2.5, "-2.5"),
            (1.7976931348623157e308, "1.7976931348623157e+308"),
            (5e-324, "5e-324"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_float(value).unwrap(), expected, "{value:?}");
        }
    }

    #[test]
    fn test_integers_untouched() {
        let bytes = to_canonical_bytes(&json!([0, -3, 10000000000000000u64])).unwrap();
        assert_eq!(bytes, b"[0,-3,10000000000000000]");
    }

    #[test]
    fn test_nan_rejected() {
        let err = to_canonical_bytes(&Reading {
            value: f64::NAN,
            lat: None,
        })
        .unwrap_err();
        assert!(matches!(err, AnchorError::Serialization(_)));
    }

    #[test]
    fn test_optional_infinity_rejected() {
        let err = to_canonical_bytes(&Reading {
            value: 1.0,
            lat: Some(f64::INFINITY),
        })
        .unwrap_err();
        assert!(matches!(err, AnchorError::Serialization(_)));

        let ok = to_canonical_bytes(&Reading {
            value: 1.5,
            lat: None,
        })
        .unwrap();
        assert_eq!(ok, br#"{"lat":null,"value":1.5}"#);
    }
}
