/// Data-carrier (OP_RETURN) script codec.
///
/// Encoded layout:
///
/// ```text
/// OP_FALSE OP_RETURN { <len:1..=75> <bytes> | OP_PUSHDATA1 <len:u8> <bytes> }*
/// ```
///
/// Decoding is deliberately permissive. Explorer responses may contain
/// data-carrier scripts written by other software, so an unknown prefix
/// yields no fields and an unknown opcode ends the walk early instead of
/// failing.
use crate::error::{AnchorError, Result};

pub const OP_FALSE: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_RETURN: u8 = 0x6a;

/// Largest field that fits a direct push.
pub const MAX_DIRECT_PUSH: usize = 75;
/// Largest field this codec encodes (OP_PUSHDATA1 range).
pub const MAX_FIELD_LEN: usize = 255;

/// Encode `fields` as an `OP_FALSE OP_RETURN` data-carrier script.
pub fn encode<F: AsRef<[u8]>>(fields: &[F]) -> Result<Vec<u8>> {
    let body_len: usize = fields.iter().map(|f| f.as_ref().len() + 2).sum();
    let mut script = Vec::with_capacity(2 + body_len);
    script.push(OP_FALSE);
    script.push(OP_RETURN);

    for (index, field) in fields.iter().enumerate() {
        let field = field.as_ref();
        let len = field.len();
        if len <= MAX_DIRECT_PUSH {
            script.push(len as u8);
        } else if len <= MAX_FIELD_LEN {
            script.push(OP_PUSHDATA1);
            script.push(len as u8);
        } else {
            return Err(AnchorError::FieldTooLarge { index, len });
        }
        script.extend_from_slice(field);
    }

    Ok(script)
}

/// [`encode`] and hex-encode the result.
pub fn encode_hex<F: AsRef<[u8]>>(fields: &[F]) -> Result<String> {
    encode(fields).map(hex::encode)
}

/// Decode a hex data-carrier script into its pushed fields.
///
/// Only malformed hex is an error; see [`decode`] for the script rules.
pub fn decode_hex(script_hex: &str) -> Result<Vec<Vec<u8>>> {
    let script = hex::decode(script_hex.trim())
        .map_err(|e| AnchorError::InvalidScript(format!("bad hex: {e}")))?;
    Ok(decode(&script))
}

/// Decode a data-carrier script into its pushed fields.
///
/// Accepts both `OP_FALSE OP_RETURN` and bare `OP_RETURN`. Any other
/// script decodes to no fields. Parsing stops at the first opcode that is
/// not a push, and a push running past the end yields what is left.
pub fn decode(script: &[u8]) -> Vec<Vec<u8>> {
    let mut pos = match script {
        [OP_FALSE, OP_RETURN, ..] => 2,
        [OP_RETURN, ..] => 1,
        _ => return Vec::new(),
    };

    let mut fields = Vec::new();
    while pos < script.len() {
        let op = script[pos];
        pos += 1;

        let len = match op {
            // OP_0 pushes the empty string; keep walking so empty fields round-trip
            OP_FALSE => 0,
            1..=75 => op as usize,
            OP_PUSHDATA1 => match script.get(pos) {
                Some(&len) => {
                    pos += 1;
                    len as usize
                }
                None => break,
            },
            _ => break,
        };

        let end = (pos + len).min(script.len());
        fields.push(script[pos..end].to_vec());
        if end < pos + len {
            break;
        }
        pos = end;
    }

    fields
}
