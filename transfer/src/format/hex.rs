use crate::format::ParseRecordError;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Writes `bytes` as an `X'..'` hex literal.
pub(super) fn write_hex_literal(bytes: &[u8], out: &mut String) {
    out.reserve(bytes.len() * 2 + 3);
    out.push_str("X'");
    for byte in bytes {
        out.push(HEX_DIGITS[usize::from(byte >> 4)] as char);
        out.push(HEX_DIGITS[usize::from(byte & 0x0f)] as char);
    }
    out.push('\'');
}

/// Decodes the digits of a hex literal (without the `X'` prefix and closing quote).
pub(super) fn parse_hex_digits(digits: &str, field: usize) -> Result<Vec<u8>, ParseRecordError> {
    if digits.len() % 2 != 0 || !digits.is_ascii() {
        return Err(ParseRecordError::InvalidHex { field });
    }

    let mut result = Vec::with_capacity(digits.len() / 2);
    for pair in digits.as_bytes().chunks(2) {
        let high = hex_value(pair[0]).ok_or(ParseRecordError::InvalidHex { field })?;
        let low = hex_value(pair[1]).ok_or(ParseRecordError::InvalidHex { field })?;
        result.push((high << 4) | low);
    }

    Ok(result)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
