//! Record payload codec
//!
//! Every record carries one self-describing binary document. A document is
//! an `i32` total length, a run of elements and a trailing NUL; an element
//! is a type byte, a NUL-terminated key and a type-specific value. All
//! integers are little-endian.
//!
//! [`Document`] keeps fields in stored order and [`Value`] is a plain
//! tagged union, so decoded records can be walked without a schema.

use crate::error::{ReaderError, Result};
use serde_json::json;
use std::fmt;

/// Nesting limit for embedded documents and arrays
const MAX_DEPTH: usize = 128;

const TYPE_DOUBLE: u8 = 0x01;
const TYPE_STRING: u8 = 0x02;
const TYPE_DOCUMENT: u8 = 0x03;
const TYPE_ARRAY: u8 = 0x04;
const TYPE_BINARY: u8 = 0x05;
const TYPE_UNDEFINED: u8 = 0x06;
const TYPE_OBJECT_ID: u8 = 0x07;
const TYPE_BOOLEAN: u8 = 0x08;
const TYPE_DATETIME: u8 = 0x09;
const TYPE_NULL: u8 = 0x0A;
const TYPE_REGEX: u8 = 0x0B;
const TYPE_DB_POINTER: u8 = 0x0C;
const TYPE_JAVASCRIPT: u8 = 0x0D;
const TYPE_SYMBOL: u8 = 0x0E;
const TYPE_JAVASCRIPT_SCOPE: u8 = 0x0F;
const TYPE_INT32: u8 = 0x10;
const TYPE_TIMESTAMP: u8 = 0x11;
const TYPE_INT64: u8 = 0x12;
const TYPE_DECIMAL128: u8 = 0x13;
const TYPE_MIN_KEY: u8 = 0xFF;
const TYPE_MAX_KEY: u8 = 0x7F;

/// 12-byte object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub [u8; 12]);

impl ObjectId {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A decoded payload value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Vec<Value>),
    Binary { subtype: u8, bytes: Vec<u8> },
    Undefined,
    ObjectId(ObjectId),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    DateTime(i64),
    Null,
    Regex { pattern: String, options: String },
    DbPointer { namespace: String, id: ObjectId },
    JavaScript(String),
    Symbol(String),
    JavaScriptWithScope { code: String, scope: Document },
    Int32(i32),
    Timestamp { time: u32, increment: u32 },
    Int64(i64),
    Decimal128([u8; 16]),
    MinKey,
    MaxKey,
}

impl Value {
    fn element_type(&self) -> u8 {
        match self {
            Value::Double(_) => TYPE_DOUBLE,
            Value::String(_) => TYPE_STRING,
            Value::Document(_) => TYPE_DOCUMENT,
            Value::Array(_) => TYPE_ARRAY,
            Value::Binary { .. } => TYPE_BINARY,
            Value::Undefined => TYPE_UNDEFINED,
            Value::ObjectId(_) => TYPE_OBJECT_ID,
            Value::Boolean(_) => TYPE_BOOLEAN,
            Value::DateTime(_) => TYPE_DATETIME,
            Value::Null => TYPE_NULL,
            Value::Regex { .. } => TYPE_REGEX,
            Value::DbPointer { .. } => TYPE_DB_POINTER,
            Value::JavaScript(_) => TYPE_JAVASCRIPT,
            Value::Symbol(_) => TYPE_SYMBOL,
            Value::JavaScriptWithScope { .. } => TYPE_JAVASCRIPT_SCOPE,
            Value::Int32(_) => TYPE_INT32,
            Value::Timestamp { .. } => TYPE_TIMESTAMP,
            Value::Int64(_) => TYPE_INT64,
            Value::Decimal128(_) => TYPE_DECIMAL128,
            Value::MinKey => TYPE_MIN_KEY,
            Value::MaxKey => TYPE_MAX_KEY,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render as JSON, using `$`-prefixed wrappers for types JSON lacks
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Double(v) => json!(v),
            Value::String(s) | Value::Symbol(s) => json!(s),
            Value::Document(doc) => doc.to_json(),
            Value::Array(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
            Value::Binary { subtype, bytes } => {
                json!({ "$binary": hex::encode(bytes), "$type": subtype })
            }
            Value::Undefined => json!({ "$undefined": true }),
            Value::ObjectId(id) => json!({ "$oid": id.to_hex() }),
            Value::Boolean(v) => json!(v),
            Value::DateTime(millis) => json!({ "$date": millis }),
            Value::Null => serde_json::Value::Null,
            Value::Regex { pattern, options } => {
                json!({ "$regex": pattern, "$options": options })
            }
            Value::DbPointer { namespace, id } => {
                json!({ "$ref": namespace, "$id": { "$oid": id.to_hex() } })
            }
            Value::JavaScript(code) => json!({ "$code": code }),
            Value::JavaScriptWithScope { code, scope } => {
                json!({ "$code": code, "$scope": scope.to_json() })
            }
            Value::Int32(v) => json!(v),
            Value::Timestamp { time, increment } => {
                json!({ "$timestamp": { "t": time, "i": increment } })
            }
            Value::Int64(v) => json!(v),
            Value::Decimal128(bytes) => json!({ "$numberDecimal": hex::encode(bytes) }),
            Value::MinKey => json!({ "$minKey": 1 }),
            Value::MaxKey => json!({ "$maxKey": 1 }),
        }
    }
}

/// Strings print bare and object ids as hex; everything else prints as JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Symbol(s) => f.write_str(s),
            Value::ObjectId(id) => write!(f, "{}", id),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// An ordered set of named values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, replacing an existing value in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a document from the front of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder { bytes, pos: 0 };
        decoder.document(0)
    }

    /// Encode to the binary layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        encode_document(self, &mut out);
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn malformed(reason: impl Into<String>) -> ReaderError {
    ReaderError::MalformedPayload(reason.into())
}

impl<'a> Decoder<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                malformed(format!(
                    "needed {} bytes at offset {}, payload is {} bytes",
                    n,
                    self.pos,
                    self.bytes.len()
                ))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn cstring(&mut self) -> Result<String> {
        let rest = &self.bytes[self.pos..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| malformed("unterminated key"))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|e| malformed(format!("invalid UTF-8 in key: {}", e)))?
            .to_string();
        self.pos += nul + 1;
        Ok(s)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.i32()?;
        if len < 1 {
            return Err(malformed(format!("invalid string length {}", len)));
        }
        let raw = self.take(len as usize)?;
        let (body, terminator) = raw.split_at(raw.len() - 1);
        if terminator != [0] {
            return Err(malformed("string is not NUL-terminated"));
        }
        String::from_utf8(body.to_vec())
            .map_err(|e| malformed(format!("invalid UTF-8 in string: {}", e)))
    }

    fn document(&mut self, depth: usize) -> Result<Document> {
        if depth > MAX_DEPTH {
            return Err(malformed("documents nested too deeply"));
        }

        let start = self.pos;
        let len = self.i32()?;
        if len < 5 {
            return Err(malformed(format!("invalid document length {}", len)));
        }
        let end = start + len as usize;
        if end > self.bytes.len() {
            return Err(malformed(format!(
                "document length {} exceeds {} available bytes",
                len,
                self.bytes.len() - start
            )));
        }

        let mut doc = Document::new();
        loop {
            let tag = self.u8()?;
            if tag == 0 {
                break;
            }
            let key = self.cstring()?;
            let value = self.value(tag, depth)?;
            doc.entries.push((key, value));
        }

        if self.pos != end {
            return Err(malformed(format!(
                "document declared {} bytes but used {}",
                len,
                self.pos - start
            )));
        }

        Ok(doc)
    }

    fn value(&mut self, tag: u8, depth: usize) -> Result<Value> {
        let value = match tag {
            TYPE_DOUBLE => Value::Double(f64::from_le_bytes(self.array()?)),
            TYPE_STRING => Value::String(self.string()?),
            TYPE_DOCUMENT => Value::Document(self.document(depth + 1)?),
            TYPE_ARRAY => {
                let doc = self.document(depth + 1)?;
                Value::Array(doc.entries.into_iter().map(|(_, v)| v).collect())
            }
            TYPE_BINARY => {
                let len = self.i32()?;
                if len < 0 {
                    return Err(malformed(format!("invalid binary length {}", len)));
                }
                let subtype = self.u8()?;
                Value::Binary {
                    subtype,
                    bytes: self.take(len as usize)?.to_vec(),
                }
            }
            TYPE_UNDEFINED => Value::Undefined,
            TYPE_OBJECT_ID => Value::ObjectId(ObjectId(self.array()?)),
            TYPE_BOOLEAN => match self.u8()? {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                other => return Err(malformed(format!("invalid boolean byte {}", other))),
            },
            TYPE_DATETIME => Value::DateTime(self.i64()?),
            TYPE_NULL => Value::Null,
            TYPE_REGEX => Value::Regex {
                pattern: self.cstring()?,
                options: self.cstring()?,
            },
            TYPE_DB_POINTER => Value::DbPointer {
                namespace: self.string()?,
                id: ObjectId(self.array()?),
            },
            TYPE_JAVASCRIPT => Value::JavaScript(self.string()?),
            TYPE_SYMBOL => Value::Symbol(self.string()?),
            TYPE_JAVASCRIPT_SCOPE => {
                let start = self.pos;
                let len = self.i32()?;
                let code = self.string()?;
                let scope = self.document(depth + 1)?;
                if self.pos - start != len as usize {
                    return Err(malformed("code-with-scope length mismatch"));
                }
                Value::JavaScriptWithScope { code, scope }
            }
            TYPE_INT32 => Value::Int32(self.i32()?),
            TYPE_TIMESTAMP => Value::Timestamp {
                increment: u32::from_le_bytes(self.array()?),
                time: u32::from_le_bytes(self.array()?),
            },
            TYPE_INT64 => Value::Int64(self.i64()?),
            TYPE_DECIMAL128 => Value::Decimal128(self.array()?),
            TYPE_MIN_KEY => Value::MinKey,
            TYPE_MAX_KEY => Value::MaxKey,
            other => return Err(malformed(format!("unknown element type 0x{:02x}", other))),
        };
        Ok(value)
    }
}

fn encode_cstring(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
    encode_cstring(s, out);
}

fn encode_elements<'a>(entries: impl Iterator<Item = (String, &'a Value)>, out: &mut Vec<u8>) {
    let start = out.len();
    out.extend_from_slice(&[0u8; 4]);
    for (key, value) in entries {
        out.push(value.element_type());
        encode_cstring(&key, out);
        encode_value(value, out);
    }
    out.push(0);
    let len = (out.len() - start) as i32;
    out[start..start + 4].copy_from_slice(&len.to_le_bytes());
}

fn encode_document(doc: &Document, out: &mut Vec<u8>) {
    encode_elements(doc.entries.iter().map(|(k, v)| (k.clone(), v)), out);
}

fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) | Value::JavaScript(s) | Value::Symbol(s) => encode_string(s, out),
        Value::Document(doc) => encode_document(doc, out),
        Value::Array(values) => {
            encode_elements(values.iter().enumerate().map(|(i, v)| (i.to_string(), v)), out)
        }
        Value::Binary { subtype, bytes } => {
            out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
            out.push(*subtype);
            out.extend_from_slice(bytes);
        }
        Value::Undefined | Value::Null | Value::MinKey | Value::MaxKey => {}
        Value::ObjectId(id) => out.extend_from_slice(&id.0),
        Value::Boolean(v) => out.push(*v as u8),
        Value::DateTime(v) | Value::Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Regex { pattern, options } => {
            encode_cstring(pattern, out);
            encode_cstring(options, out);
        }
        Value::DbPointer { namespace, id } => {
            encode_string(namespace, out);
            out.extend_from_slice(&id.0);
        }
        Value::JavaScriptWithScope { code, scope } => {
            let start = out.len();
            out.extend_from_slice(&[0u8; 4]);
            encode_string(code, out);
            encode_document(scope, out);
            let len = (out.len() - start) as i32;
            out[start..start + 4].copy_from_slice(&len.to_le_bytes());
        }
        Value::Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Timestamp { time, increment } => {
            out.extend_from_slice(&increment.to_le_bytes());
            out.extend_from_slice(&time.to_le_bytes());
        }
        Value::Decimal128(bytes) => out.extend_from_slice(bytes),
    }
}
