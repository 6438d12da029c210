//! Order-preserving tuple encoding
//!
//! Every key in the graph namespace is a packed tuple. The byte layout keeps
//! lexicographic byte order equal to element-wise tuple order, and every
//! element is self-delimiting, so the packing of a tuple prefix is also a byte
//! prefix of the packing of every tuple that extends it.
//!
//! The converse needs one extra rule: a string or bytes element ending in the
//! terminator `0x00` is also a byte prefix of a longer payload continuing with
//! an escaped NUL (`0x00 0xFF`). No type code is `0xFF`, so the tuples that
//! extend a prefix are exactly the keys in `[prefix, prefix ++ 0xFF)`; see
//! [`range_end`] and [`covers`].
//!
//! Layout per element (type code first):
//! - `0x00` null
//! - `0x01` bytes, `0x02` string: payload with `0x00` escaped as `0x00 0xFF`, terminated by `0x00`
//! - `0x0C..=0x1C` integer: `0x14` is zero, `0x14 ± n` carries an `n`-byte big-endian magnitude
//!   (negative magnitudes are one's-complemented so they sort below positives)
//! - `0x21` float: IEEE-754 big-endian with the sign bit flipped (all bits flipped when negative)
//! - `0x26` false, `0x27` true

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

const NULL_CODE: u8 = 0x00;
const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_ZERO_CODE: u8 = 0x14;
const FLOAT_CODE: u8 = 0x21;
const FALSE_CODE: u8 = 0x26;
const TRUE_CODE: u8 = 0x27;

const ESCAPE: u8 = 0xFF;

/// Errors raised while decoding packed tuples
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Unknown type code 0x{code:02x} at offset {offset}")]
    UnknownTypeCode { code: u8, offset: usize },

    #[error("Truncated tuple element at offset {0}")]
    Truncated(usize),

    #[error("Invalid UTF-8 in string element at offset {0}")]
    InvalidUtf8(usize),

    #[error("Expected {expected} at tuple position {position}")]
    UnexpectedElement {
        position: usize,
        expected: &'static str,
    },

    #[error("Key lies outside the namespace of graph {0}")]
    ForeignKey(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// A single typed tuple element
#[derive(Debug, Clone)]
pub enum KeyPart {
    Null,
    Bytes(Vec<u8>),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl KeyPart {
    fn type_rank(&self) -> u8 {
        match self {
            KeyPart::Null => 0,
            KeyPart::Bytes(_) => 1,
            KeyPart::String(_) => 2,
            KeyPart::Int(_) => 3,
            KeyPart::Float(_) => 4,
            KeyPart::Bool(_) => 5,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyPart::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            KeyPart::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Append the encoding of this element to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            KeyPart::Null => out.push(NULL_CODE),
            KeyPart::Bytes(b) => {
                out.push(BYTES_CODE);
                encode_escaped(b, out);
            }
            KeyPart::String(s) => {
                out.push(STRING_CODE);
                encode_escaped(s.as_bytes(), out);
            }
            KeyPart::Int(i) => encode_int(*i, out),
            KeyPart::Float(f) => {
                out.push(FLOAT_CODE);
                out.extend_from_slice(&float_to_ordered(*f));
            }
            KeyPart::Bool(false) => out.push(FALSE_CODE),
            KeyPart::Bool(true) => out.push(TRUE_CODE),
        }
    }

    /// Encode this element on its own
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

// Equality and ordering follow the encoded bytes, so floats compare by their
// total order (-0.0 < 0.0, NaN is equal to itself).
impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Null, KeyPart::Null) => Ordering::Equal,
            (KeyPart::Bytes(a), KeyPart::Bytes(b)) => a.cmp(b),
            (KeyPart::String(a), KeyPart::String(b)) => a.as_bytes().cmp(b.as_bytes()),
            (KeyPart::Int(a), KeyPart::Int(b)) => a.cmp(b),
            (KeyPart::Float(a), KeyPart::Float(b)) => a.total_cmp(b),
            (KeyPart::Bool(a), KeyPart::Bool(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Null => write!(f, "null"),
            KeyPart::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
            KeyPart::String(s) => write!(f, "\"{}\"", s),
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Float(fl) => write!(f, "{}", fl),
            KeyPart::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::String(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::String(s)
    }
}

impl From<&String> for KeyPart {
    fn from(s: &String) -> Self {
        KeyPart::String(s.clone())
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        KeyPart::Int(i)
    }
}

impl From<f64> for KeyPart {
    fn from(f: f64) -> Self {
        KeyPart::Float(f)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Bool(b)
    }
}

impl From<Vec<u8>> for KeyPart {
    fn from(b: Vec<u8>) -> Self {
        KeyPart::Bytes(b)
    }
}

/// An ordered sequence of key parts
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tuple(Vec<KeyPart>);

impl Tuple {
    pub fn new() -> Self {
        Tuple(Vec::new())
    }

    /// Builder-style append
    pub fn add(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn push(&mut self, part: impl Into<KeyPart>) {
        self.0.push(part.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&KeyPart> {
        self.0.get(position)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn into_parts(self) -> Vec<KeyPart> {
        self.0
    }

    /// String element at `position`, or a codec error naming the mismatch
    pub fn get_str(&self, position: usize) -> CodecResult<&str> {
        self.0
            .get(position)
            .and_then(KeyPart::as_str)
            .ok_or(CodecError::UnexpectedElement {
                position,
                expected: "string",
            })
    }

    /// Owned element at `position`
    pub fn get_part(&self, position: usize) -> CodecResult<KeyPart> {
        self.0
            .get(position)
            .cloned()
            .ok_or(CodecError::UnexpectedElement {
                position,
                expected: "element",
            })
    }

    /// Order-preserving byte encoding
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 8);
        for part in &self.0 {
            part.encode_into(&mut out);
        }
        out
    }

    /// Byte prefix shared by every tuple that starts with this one.
    ///
    /// Range scans must stop at [`range_end`] rather than at the end of the
    /// byte prefix.
    pub fn prefix(&self) -> Vec<u8> {
        self.pack()
    }

    /// Half-open key range `[begin, end)` of the tuples that start with this one
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let begin = self.pack();
        let end = range_end(&begin);
        (begin, end)
    }

    /// Decode a packed tuple
    pub fn unpack(bytes: &[u8]) -> CodecResult<Tuple> {
        let mut parts = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let (part, next) = decode_part(bytes, offset)?;
            parts.push(part);
            offset = next;
        }
        Ok(Tuple(parts))
    }
}

impl From<Vec<KeyPart>> for Tuple {
    fn from(parts: Vec<KeyPart>) -> Self {
        Tuple(parts)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", part)?;
        }
        write!(f, ")")
    }
}

/// Pack a slice of parts without building a `Tuple`
pub fn pack(parts: &[KeyPart]) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        part.encode_into(&mut out);
    }
    out
}

/// Decode a packed tuple into its parts
pub fn unpack(bytes: &[u8]) -> CodecResult<Vec<KeyPart>> {
    Tuple::unpack(bytes).map(Tuple::into_parts)
}

fn encode_escaped(payload: &[u8], out: &mut Vec<u8>) {
    for &b in payload {
        out.push(b);
        if b == 0x00 {
            out.push(ESCAPE);
        }
    }
    out.push(0x00);
}

fn encode_int(value: i64, out: &mut Vec<u8>) {
    if value == 0 {
        out.push(INT_ZERO_CODE);
        return;
    }
    let magnitude = value.unsigned_abs();
    let len = byte_len(magnitude);
    let be = if value > 0 { magnitude } else { !magnitude }.to_be_bytes();
    if value > 0 {
        out.push(INT_ZERO_CODE + len as u8);
    } else {
        out.push(INT_ZERO_CODE - len as u8);
    }
    out.extend_from_slice(&be[8 - len..]);
}

fn byte_len(magnitude: u64) -> usize {
    ((64 - magnitude.leading_zeros() as usize) + 7) / 8
}

fn float_to_ordered(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits >> 63 == 1 { !bits } else { bits | (1 << 63) };
    ordered.to_be_bytes()
}

fn float_from_ordered(bytes: [u8; 8]) -> f64 {
    let ordered = u64::from_be_bytes(bytes);
    let bits = if ordered >> 63 == 1 {
        ordered & !(1 << 63)
    } else {
        !ordered
    };
    f64::from_bits(bits)
}

fn decode_escaped(bytes: &[u8], start: usize) -> CodecResult<(Vec<u8>, usize)> {
    let mut payload = Vec::new();
    let mut i = start;
    loop {
        match bytes.get(i) {
            None => return Err(CodecError::Truncated(start)),
            Some(0x00) => {
                if bytes.get(i + 1) == Some(&ESCAPE) {
                    payload.push(0x00);
                    i += 2;
                } else {
                    return Ok((payload, i + 1));
                }
            }
            Some(&b) => {
                payload.push(b);
                i += 1;
            }
        }
    }
}

fn decode_part(bytes: &[u8], offset: usize) -> CodecResult<(KeyPart, usize)> {
    let code = bytes[offset];
    let body = offset + 1;
    match code {
        NULL_CODE => Ok((KeyPart::Null, body)),
        BYTES_CODE => {
            let (payload, next) = decode_escaped(bytes, body)?;
            Ok((KeyPart::Bytes(payload), next))
        }
        STRING_CODE => {
            let (payload, next) = decode_escaped(bytes, body)?;
            let s = String::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8(offset))?;
            Ok((KeyPart::String(s), next))
        }
        0x0C..=0x1C => {
            if code == INT_ZERO_CODE {
                return Ok((KeyPart::Int(0), body));
            }
            let positive = code > INT_ZERO_CODE;
            let len = if positive {
                (code - INT_ZERO_CODE) as usize
            } else {
                (INT_ZERO_CODE - code) as usize
            };
            let end = body + len;
            let raw = bytes.get(body..end).ok_or(CodecError::Truncated(offset))?;
            let mut buf = if positive { [0u8; 8] } else { [0xFFu8; 8] };
            buf[8 - len..].copy_from_slice(raw);
            let word = u64::from_be_bytes(buf);
            let value = if positive {
                word as i64
            } else {
                // `word` is the one's complement of the magnitude.
                (!word).wrapping_neg() as i64
            };
            Ok((KeyPart::Int(value), end))
        }
        FLOAT_CODE => {
            let end = body + 8;
            let raw = bytes.get(body..end).ok_or(CodecError::Truncated(offset))?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            Ok((KeyPart::Float(float_from_ordered(buf)), end))
        }
        FALSE_CODE => Ok((KeyPart::Bool(false), body)),
        TRUE_CODE => Ok((KeyPart::Bool(true), body)),
        _ => Err(CodecError::UnknownTypeCode { code, offset }),
    }
}

/// Exclusive upper bound of the keys extending the packed tuple `prefix`
pub fn range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = Vec::with_capacity(prefix.len() + 1);
    end.extend_from_slice(prefix);
    end.push(ESCAPE);
    end
}

/// Whether `key` is the packed tuple `prefix` or a tuple extending it.
///
/// A key continuing the last element of `prefix` with an escaped NUL shares
/// its bytes but is not covered.
pub fn covers(prefix: &[u8], key: &[u8]) -> bool {
    key.starts_with(prefix) && key.get(prefix.len()) != Some(&ESCAPE)
}
