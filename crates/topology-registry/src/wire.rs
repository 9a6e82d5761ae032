//! Self-describing record stream.
//!
//! A stream is a sequence of named records. Each record's name is the merge
//! key; its body is a nested JSON structure that only the receiving
//! definition knows how to interpret.
//!
//! ## JSON framing
//! ```text
//! {"east":{"host1":{"hostId":1,"connectUri":"10.0.0.1:7001"}}}
//! {"west":{"host2":{"hostId":2,"connectUri":"10.0.1.1:7001"}}}
//! ```
//! Records are concatenated JSON objects, each holding exactly one key.
//! Whitespace between records is ignored.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::iter::Peekable;

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::de::IoRead;
use serde_json::{Map, StreamDeserializer, Value};

use crate::WireError;

/// One named record read from or written to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub body: Value,
}

impl Record {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self { name: name.into(), body }
    }
}

/// Finite, non-restartable source of records.
pub trait RecordReader {
    /// `true` while at least one more record (or a structural error) remains.
    fn has_more(&mut self) -> bool;

    fn read_record(&mut self) -> Result<Record, WireError>;
}

pub trait RecordWriter {
    fn write_record(&mut self, name: &str, body: Value) -> Result<(), WireError>;
}

// ─────────────────────────────────────────────
// JSON reader
// ─────────────────────────────────────────────

/// Reads concatenated single-key JSON objects from any `io::Read`.
///
/// Objects are walked key by key rather than collected into a map, so a
/// repeated record name is reported as ambiguous and a repeated key anywhere
/// inside a body is rejected instead of silently keeping the last value.
pub struct JsonRecordReader<R: io::Read> {
    records: Peekable<StreamDeserializer<'static, IoRead<R>, RawRecord>>,
}

impl<R: io::Read> JsonRecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            records: serde_json::Deserializer::from_reader(reader)
                .into_iter::<RawRecord>()
                .peekable(),
        }
    }
}

impl<'a> JsonRecordReader<&'a [u8]> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<R: io::Read> RecordReader for JsonRecordReader<R> {
    fn has_more(&mut self) -> bool {
        self.records.peek().is_some()
    }

    fn read_record(&mut self) -> Result<Record, WireError> {
        match self.records.next() {
            Some(raw) => split_record(raw?),
            None => Err(WireError::Exhausted),
        }
    }
}

/// A top-level stream value before it is validated as a record.
enum RawRecord {
    /// Every key of the object, in stream order, repeats included.
    Entries(Vec<(String, Value)>),
    /// Anything that is not an object.
    Other(&'static str),
}

/// Split `{"name": body}` into its parts.
fn split_record(raw: RawRecord) -> Result<Record, WireError> {
    match raw {
        RawRecord::Other(found) => Err(WireError::MissingName { found }),
        RawRecord::Entries(mut entries) => match entries.len() {
            0 => Err(WireError::MissingName { found: "an empty object" }),
            1 => {
                let (name, body) = entries.remove(0);
                Ok(Record { name, body })
            }
            count => Err(WireError::AmbiguousRecord { count }),
        },
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawRecordVisitor)
    }
}

struct RawRecordVisitor;

impl<'de> Visitor<'de> for RawRecordVisitor {
    type Value = RawRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a named record")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawRecord, A::Error> {
        let mut entries = Vec::new();
        while let Some((name, body)) = map.next_entry::<String, UniqueKeys>()? {
            entries.push((name, body.0));
        }
        Ok(RawRecord::Entries(entries))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RawRecord, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(RawRecord::Other("an array"))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("a string"))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("a boolean"))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("a number"))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("a number"))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("a number"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<RawRecord, E> {
        Ok(RawRecord::Other("null"))
    }
}

/// A JSON value in which no object repeats a key, at any depth.
struct UniqueKeys(Value);

impl<'de> Deserialize<'de> for UniqueKeys {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(UniqueKeysVisitor).map(UniqueKeys)
    }
}

struct UniqueKeysVisitor;

impl<'de> Visitor<'de> for UniqueKeysVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<UniqueKeys>()? {
            items.push(item.0);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut object = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            if object.contains_key(&key) {
                return Err(de::Error::custom(format_args!("duplicate key `{key}`")));
            }
            let value = map.next_value::<UniqueKeys>()?;
            object.insert(key, value.0);
        }
        Ok(Value::Object(object))
    }
}

// ─────────────────────────────────────────────
// JSON writer
// ─────────────────────────────────────────────

/// Writes one `{"name": body}` object per line.
pub struct JsonRecordWriter<W: io::Write> {
    out: W,
    pretty: bool,
}

impl<W: io::Write> JsonRecordWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, pretty: false }
    }

    pub fn pretty(out: W) -> Self {
        Self { out, pretty: true }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> RecordWriter for JsonRecordWriter<W> {
    fn write_record(&mut self, name: &str, body: Value) -> Result<(), WireError> {
        let mut record = Map::with_capacity(1);
        record.insert(name.to_string(), body);
        let record = Value::Object(record);

        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, &record)?;
        } else {
            serde_json::to_writer(&mut self.out, &record)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

// ─────────────────────────────────────────────
// In-memory buffer
// ─────────────────────────────────────────────

/// FIFO of records; what is written is read back in the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBuffer {
    records: VecDeque<Record>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, body: Value) {
        self.records.push_back(Record::new(name, body));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

impl FromIterator<Record> for RecordBuffer {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self { records: iter.into_iter().collect() }
    }
}

impl RecordReader for RecordBuffer {
    fn has_more(&mut self) -> bool {
        !self.records.is_empty()
    }

    fn read_record(&mut self) -> Result<Record, WireError> {
        self.records.pop_front().ok_or(WireError::Exhausted)
    }
}

impl RecordWriter for RecordBuffer {
    fn write_record(&mut self, name: &str, body: Value) -> Result<(), WireError> {
        self.push(name, body);
        Ok(())
    }
}
