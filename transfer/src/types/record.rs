use std::borrow::Cow;
use std::mem::size_of;

use crate::error::TransferResult;
use crate::format::csv;
use crate::types::{SizeHint, Value};

/// One unit of data exchanged between an extractor, the bridge and a loader.
///
/// A record keeps whichever representation it was built from: CSV text for connectors that
/// move text, or typed [`Value`]s for connectors that move native fields. The other
/// representation is derived on demand through the CSV intermediate format, so a record written
/// as text can be read as values and the other way around.
///
/// Records are moved into the bridge by value and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    repr: RecordRepr,
}

#[derive(Debug, Clone, PartialEq)]
enum RecordRepr {
    Text(String),
    Values(Vec<Value>),
}

impl Record {
    /// Creates a record from CSV text.
    ///
    /// The text is not validated until it is read as values.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            repr: RecordRepr::Text(text.into()),
        }
    }

    /// Creates a record from typed fields.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            repr: RecordRepr::Values(values),
        }
    }

    /// Returns `true` when the record was built from text.
    pub fn is_text(&self) -> bool {
        matches!(self.repr, RecordRepr::Text(_))
    }

    /// Returns the record as CSV text, encoding typed fields if needed.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.repr {
            RecordRepr::Text(text) => Cow::Borrowed(text),
            RecordRepr::Values(values) => Cow::Owned(csv::encode_values(values)),
        }
    }

    /// Consumes the record and returns its CSV text.
    pub fn into_text(self) -> String {
        match self.repr {
            RecordRepr::Text(text) => text,
            RecordRepr::Values(values) => csv::encode_values(&values),
        }
    }

    /// Returns the typed fields, parsing CSV text if needed.
    pub fn values(&self) -> TransferResult<Cow<'_, [Value]>> {
        match &self.repr {
            RecordRepr::Text(text) => Ok(Cow::Owned(csv::decode_values(text)?)),
            RecordRepr::Values(values) => Ok(Cow::Borrowed(values)),
        }
    }

    /// Consumes the record and returns its typed fields.
    pub fn into_values(self) -> TransferResult<Vec<Value>> {
        match self.repr {
            RecordRepr::Text(text) => Ok(csv::decode_values(&text)?),
            RecordRepr::Values(values) => Ok(values),
        }
    }
}

impl From<String> for Record {
    fn from(text: String) -> Self {
        Record::from_text(text)
    }
}

impl From<&str> for Record {
    fn from(text: &str) -> Self {
        Record::from_text(text)
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Record::from_values(values)
    }
}

impl SizeHint for Record {
    fn size_hint(&self) -> usize {
        let payload = match &self.repr {
            RecordRepr::Text(text) => text.capacity(),
            RecordRepr::Values(values) => values.as_slice().size_hint(),
        };

        size_of::<Record>().saturating_add(payload)
    }
}
