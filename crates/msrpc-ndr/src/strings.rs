//! NDR string types
//!
//! A `[string]` is a conformant varying array that includes its terminator:
//!
//! ```text
//! max_count: u32     # Maximum elements, terminator included
//! offset: u32        # Always 0
//! actual_count: u32  # Transmitted elements, terminator included
//! elements[actual_count]
//! ```
//!
//! Wide strings carry UTF-16 code units in the context byte order; `char`
//! strings carry UTF-8 bytes.

use crate::primitives::FixedWidth;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use bytes::Bytes;
use tracing::warn;

impl<'a> NdrWriter<'a> {
    fn write_varying_string<T: FixedWidth>(&mut self, units: &[T]) -> Result<()> {
        let count = units.len() as u64;
        let scope = self.declare_sizes(&[count])?;
        let max = self.dimension(0)?;
        let actual = if count > max {
            warn!(count, max, "truncating string to declared maximum");
            max
        } else {
            count
        };
        self.write_variance(0, actual)?;
        // actual <= units.len()
        for unit in &units[..actual as usize] {
            self.write_data(*unit)?;
        }
        self.release_sizes(scope);
        Ok(())
    }

    /// Write a null-terminated UTF-16 string
    pub fn write_utf16_string(&mut self, s: &str) -> Result<()> {
        let units: Vec<u16> = s.encode_utf16().chain(std::iter::once(0)).collect();
        self.write_varying_string(&units)
    }

    /// Write a null-terminated 8-bit `char` string
    pub fn write_char_string(&mut self, s: &str) -> Result<()> {
        let mut units = Vec::with_capacity(s.len() + 1);
        units.extend_from_slice(s.as_bytes());
        units.push(0u8);
        self.write_varying_string(&units)
    }
}

impl<'a> NdrReader<'a> {
    /// Read the string header and return the raw element bytes.
    fn read_varying_string(&mut self, width: usize) -> Result<Bytes> {
        let scope = self.declare_sizes(1)?;
        let max = self.dimension(0)?;
        let (offset, actual) = self.read_variance(max)?;
        if offset != 0 {
            return Err(NdrError::InvalidEncoding(format!("non-zero string offset {offset}")));
        }
        let len = self.checked_dimension(actual, width)?;
        self.align(width)?;
        let raw = self.read_raw(len * width)?;
        self.release_sizes(scope);
        Ok(raw)
    }

    /// Read a UTF-16 string into `out`.
    ///
    /// A trailing terminator is stripped if present; an unpaired surrogate
    /// is an error.
    pub fn read_utf16_string(&mut self, out: &mut String) -> Result<()> {
        let raw = self.read_varying_string(2)?;
        let little_endian = self.context().little_endian;
        let mut units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| {
                let pair = [pair[0], pair[1]];
                if little_endian {
                    u16::from_le_bytes(pair)
                } else {
                    u16::from_be_bytes(pair)
                }
            })
            .collect();
        if units.last() == Some(&0) {
            units.pop();
        }
        *out = char::decode_utf16(units)
            .collect::<std::result::Result<String, _>>()
            .map_err(|e| NdrError::InvalidEncoding(format!("unpaired surrogate {:#06x}", e.unpaired_surrogate())))?;
        Ok(())
    }

    /// Read an 8-bit `char` string into `out`
    pub fn read_char_string(&mut self, out: &mut String) -> Result<()> {
        let raw = self.read_varying_string(1)?;
        let bytes = match raw.last() {
            Some(0) => &raw[..raw.len() - 1],
            _ => &raw[..],
        };
        *out = std::str::from_utf8(bytes)
            .map_err(|e| NdrError::InvalidEncoding(format!("invalid UTF-8 in string: {e}")))?
            .to_owned();
        Ok(())
    }
}

/// Null-terminated ANSI string (`[string] char*`)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrString(pub String);

impl NdrString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for NdrString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NdrString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NdrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl NdrEncode for NdrString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_char_string(&self.0)
    }
}

impl NdrDecode for NdrString {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.read_char_string(&mut self.0)
    }
}

/// Unicode string type (`[string] wchar_t*`)
///
/// Encoded as UTF-16 on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrWString(pub String);

impl NdrWString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for NdrWString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NdrWString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for NdrWString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl NdrEncode for NdrWString {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_utf16_string(&self.0)
    }
}

impl NdrDecode for NdrWString {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.read_utf16_string(&mut self.0)
    }
}
