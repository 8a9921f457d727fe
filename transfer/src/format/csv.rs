use crate::format::ParseRecordError;
use crate::format::hex::{parse_hex_digits, write_hex_literal};
use crate::types::Value;

const FIELD_SEPARATOR: char = ',';
const QUOTE: char = '\'';
const ESCAPE: char = '\\';
const NULL_LITERAL: &str = "NULL";
const HEX_PREFIX: &str = "X'";

/// Encodes typed fields into one CSV line.
pub fn encode_values(values: &[Value]) -> String {
    let mut out = String::new();

    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push(FIELD_SEPARATOR);
        }
        encode_value(value, &mut out);
    }

    out
}

fn encode_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str(NULL_LITERAL),
        Value::Bool(value) => out.push_str(if *value { "true" } else { "false" }),
        Value::Int(value) => out.push_str(&value.to_string()),
        // Debug keeps a fractional part (`1.0`), so floats never decode back as integers.
        Value::Float(value) => out.push_str(&format!("{value:?}")),
        Value::Text(value) => encode_text(value, out),
        Value::Bytes(value) => write_hex_literal(value, out),
    }
}

fn encode_text(text: &str, out: &mut String) {
    out.reserve(text.len() + 2);
    out.push(QUOTE);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x1a' => out.push_str("\\Z"),
            ch => out.push(ch),
        }
    }
    out.push(QUOTE);
}

/// Decodes one CSV line into typed fields.
///
/// An empty line decodes to no fields.
pub fn decode_values(text: &str) -> Result<Vec<Value>, ParseRecordError> {
    let mut values = Vec::new();
    if text.is_empty() {
        return Ok(values);
    }

    let mut rest = text;
    loop {
        let field = values.len();
        let (value, remaining) = decode_field(rest, field)?;
        values.push(value);

        if remaining.is_empty() {
            return Ok(values);
        }

        rest = remaining
            .strip_prefix(FIELD_SEPARATOR)
            .ok_or(ParseRecordError::MissingSeparator { field })?;
    }
}

/// Decodes the field at the start of `input`, returning it with the unconsumed input.
fn decode_field(input: &str, field: usize) -> Result<(Value, &str), ParseRecordError> {
    if let Some(quoted) = input.strip_prefix(QUOTE) {
        let (text, remaining) = decode_quoted(quoted, field)?;
        return Ok((Value::Text(text), remaining));
    }

    if let Some(digits) = input.strip_prefix(HEX_PREFIX) {
        let end = digits
            .find(QUOTE)
            .ok_or(ParseRecordError::UnterminatedQuote { field })?;
        let bytes = parse_hex_digits(&digits[..end], field)?;
        return Ok((Value::Bytes(bytes), &digits[end + 1..]));
    }

    let end = input.find(FIELD_SEPARATOR).unwrap_or(input.len());
    Ok((decode_token(&input[..end], field)?, &input[end..]))
}

fn decode_quoted(input: &str, field: usize) -> Result<(String, &str), ParseRecordError> {
    let mut text = String::with_capacity(input.len());
    let mut chars = input.char_indices();

    while let Some((position, ch)) = chars.next() {
        match ch {
            QUOTE => return Ok((text, &input[position + 1..])),
            ESCAPE => {
                let Some((_, escaped)) = chars.next() else {
                    return Err(ParseRecordError::UnterminatedQuote { field });
                };
                text.push(match escaped {
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    'n' => '\n',
                    'r' => '\r',
                    '0' => '\0',
                    'Z' => '\x1a',
                    other => {
                        return Err(ParseRecordError::InvalidEscape {
                            field,
                            escape: other,
                        });
                    }
                });
            }
            ch => text.push(ch),
        }
    }

    Err(ParseRecordError::UnterminatedQuote { field })
}

fn decode_token(token: &str, field: usize) -> Result<Value, ParseRecordError> {
    match token {
        "" => Err(ParseRecordError::EmptyField { field }),
        NULL_LITERAL => Ok(Value::Null),
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        token => {
            if let Ok(value) = token.parse::<i64>() {
                return Ok(Value::Int(value));
            }
            token
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ParseRecordError::InvalidToken {
                    field,
                    token: token.to_string(),
                })
        }
    }
}
