//! Fixed-schema binary record codec.
//!
//! A record is written field by field in schema order, each field as a
//! one-byte length followed by the value bytes. A stream decodes only if it
//! holds exactly one entry per schema field and nothing after the last one.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("field `{field}` is not part of the {schema} schema")]
    UnknownField { schema: &'static str, field: String },
    #[error("field `{field}` is {actual} bytes, limit is {max}")]
    FieldTooLong { field: &'static str, max: usize, actual: usize },
    #[error("field `{field}` must be exactly {expected} bytes, got {actual}")]
    FieldTooShort { field: &'static str, expected: usize, actual: usize },
    #[error("stream ended inside field `{field}`")]
    Truncated { field: &'static str },
    #[error("{extra} unexpected bytes after the last field")]
    TrailingBytes { extra: usize },
}

/// Declared shape of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub length: usize,
    /// Shorter values are accepted and left-padded with zeros.
    pub allow_shorter: bool,
    /// An empty value is kept as-is instead of taking the default.
    pub allow_zero: bool,
    pub default: &'static [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn shorter(name: &'static str, length: usize) -> FieldSpec {
    FieldSpec { name, length, allow_shorter: true, allow_zero: false, default: &[] }
}

const fn zero_ok(name: &'static str, length: usize) -> FieldSpec {
    FieldSpec { name, length, allow_shorter: false, allow_zero: true, default: &[] }
}

const V: FieldSpec = FieldSpec { name: "v", length: 1, allow_shorter: false, allow_zero: true, default: &[0x1c] };

/// Names of the fields carrying the recoverable signature.
pub const SIGNATURE_FIELDS: [&str; 3] = ["v", "r", "s"];

pub const ORDINARY: Schema = Schema {
    name: "ordinary",
    fields: &[
        shorter("nonce", 32),
        zero_ok("account", 20),
        shorter("content", 32),
        shorter("since", 32),
        shorter("comment", 32),
        V,
        zero_ok("r", 32),
        zero_ok("s", 32),
    ],
};

pub const PENDING: Schema = Schema {
    name: "pending",
    fields: &[
        shorter("nonce", 32),
        shorter("pending", 32),
        zero_ok("validator", 20),
        shorter("cache", 32),
        shorter("since", 32),
        V,
        zero_ok("r", 32),
        zero_ok("s", 32),
    ],
};

pub const SUMMARY: Schema = Schema {
    name: "summary",
    fields: &[
        zero_ok("validator", 20),
        zero_ok("originAddress", 20),
        shorter("start", 32),
        shorter("end", 32),
        shorter("spend", 32),
        shorter("gain", 32),
        shorter("accuRewards", 32),
        V,
        zero_ok("r", 32),
        zero_ok("s", 32),
    ],
};

impl Schema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Field values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, Vec<u8>>);

impl Fields {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Removes a value, yielding an empty one when absent.
    pub fn take(&mut self, name: &str) -> Vec<u8> {
        self.0.remove(name).unwrap_or_default()
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Applies the padding and default rules of `spec` to one value.
pub fn canonical_value(spec: &FieldSpec, value: &[u8]) -> Result<Vec<u8>, CodecError> {
    if value.len() > spec.length {
        return Err(CodecError::FieldTooLong { field: spec.name, max: spec.length, actual: value.len() });
    }
    let value = if value.is_empty() {
        if spec.allow_zero {
            return Ok(Vec::new());
        }
        spec.default
    } else {
        value
    };
    if value.len() == spec.length {
        return Ok(value.to_vec());
    }
    if !spec.allow_shorter {
        return Err(CodecError::FieldTooShort { field: spec.name, expected: spec.length, actual: value.len() });
    }
    let mut padded = vec![0u8; spec.length - value.len()];
    padded.extend_from_slice(value);
    Ok(padded)
}

/// Fills absent fields with defaults and normalizes every value.
pub fn canonicalize(schema: &Schema, fields: &Fields) -> Result<Fields, CodecError> {
    if let Some(unknown) = fields.names().find(|n| schema.field(n).is_none()) {
        return Err(CodecError::UnknownField { schema: schema.name, field: unknown.to_string() });
    }
    let mut out = Fields::new();
    for spec in schema.fields {
        let raw = fields.get(spec.name).unwrap_or(spec.default);
        out.set(spec.name, canonical_value(spec, raw)?);
    }
    Ok(out)
}

pub fn encode(schema: &Schema, fields: &Fields) -> Result<Vec<u8>, CodecError> {
    let canonical = canonicalize(schema, fields)?;
    let mut out = Vec::with_capacity(schema.fields.iter().map(|f| f.length + 1).sum());
    for spec in schema.fields {
        let value = canonical.get(spec.name).unwrap_or_default();
        // Field lengths are bounded by the schema, all below 256.
        out.push(value.len() as u8);
        out.extend_from_slice(value);
    }
    Ok(out)
}

pub fn decode(schema: &Schema, bytes: &[u8]) -> Result<Fields, CodecError> {
    let mut fields = Fields::new();
    let mut rest = bytes;
    for spec in schema.fields {
        let (&len, tail) = rest.split_first().ok_or(CodecError::Truncated { field: spec.name })?;
        let len = len as usize;
        if len > spec.length {
            return Err(CodecError::FieldTooLong { field: spec.name, max: spec.length, actual: len });
        }
        if tail.len() < len {
            return Err(CodecError::Truncated { field: spec.name });
        }
        let (value, tail) = tail.split_at(len);
        fields.set(spec.name, canonical_value(spec, value)?);
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes { extra: rest.len() });
    }
    Ok(fields)
}
