//! NDR primitive type implementations
//!
//! NDR primitive types and their encodings:
//!
//! | MIDL Type     | Rust Type | Size | Alignment |
//! |---------------|-----------|------|-----------|
//! | boolean       | bool      | 1    | 1         |
//! | byte/char     | u8        | 1    | 1         |
//! | small         | i8        | 1    | 1         |
//! | short         | i16       | 2    | 2         |
//! | long/int      | i32       | 4    | 4         |
//! | hyper         | i64       | 8    | 8         |
//! | unsigned short| u16       | 2    | 2         |
//! | unsigned long | u32       | 4    | 4         |
//! | unsigned hyper| u64       | 8    | 8         |
//! | float         | f32       | 4    | 4         |
//! | double        | f64       | 8    | 8         |
//! | wchar_t       | u16       | 2    | 2         |
//! | error_status_t| u32       | 4    | 4         |
//! | GUID          | Guid      | 16   | 4         |

use crate::{NdrContext, NdrDecode, NdrEncode, NdrReader, NdrWriter, Result};
use bytes::{Buf, BufMut};

/// A scalar with a fixed wire width that is also its alignment
pub trait FixedWidth: Copy + Default {
    /// Size and alignment in bytes
    const WIDTH: usize;

    /// Put the value in the context's byte order
    fn put_ndr<B: BufMut>(self, buf: &mut B, ctx: &NdrContext);

    /// Get a value in the context's byte order; the caller checks the length
    fn get_ndr<B: Buf>(buf: &mut B, ctx: &NdrContext) -> Self;
}

macro_rules! impl_ndr_primitive {
    ($ty:ty, $put_le:ident, $put_be:ident, $get_le:ident, $get_be:ident) => {
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            #[inline]
            fn put_ndr<B: BufMut>(self, buf: &mut B, ctx: &NdrContext) {
                if ctx.little_endian {
                    buf.$put_le(self);
                } else {
                    buf.$put_be(self);
                }
            }

            #[inline]
            fn get_ndr<B: Buf>(buf: &mut B, ctx: &NdrContext) -> Self {
                if ctx.little_endian {
                    buf.$get_le()
                } else {
                    buf.$get_be()
                }
            }
        }

        impl NdrEncode for $ty {
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.write_data(*self)
            }
        }

        impl NdrDecode for $ty {
            fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
                r.read_data(self)
            }
        }
    };
}

// Single bytes have no byte order
impl_ndr_primitive!(u8, put_u8, put_u8, get_u8, get_u8);
impl_ndr_primitive!(i8, put_i8, put_i8, get_i8, get_i8);
impl_ndr_primitive!(u16, put_u16_le, put_u16, get_u16_le, get_u16);
impl_ndr_primitive!(i16, put_i16_le, put_i16, get_i16_le, get_i16);
impl_ndr_primitive!(u32, put_u32_le, put_u32, get_u32_le, get_u32);
impl_ndr_primitive!(i32, put_i32_le, put_i32, get_i32_le, get_i32);
impl_ndr_primitive!(u64, put_u64_le, put_u64, get_u64_le, get_u64);
impl_ndr_primitive!(i64, put_i64_le, put_i64, get_i64_le, get_i64);
impl_ndr_primitive!(f32, put_f32_le, put_f32, get_f32_le, get_f32);
impl_ndr_primitive!(f64, put_f64_le, put_f64, get_f64_le, get_f64);

/// NDR boolean - encoded as a single byte (0x00 = false, anything else = true)
impl FixedWidth for bool {
    const WIDTH: usize = 1;

    fn put_ndr<B: BufMut>(self, buf: &mut B, _ctx: &NdrContext) {
        buf.put_u8(u8::from(self));
    }

    fn get_ndr<B: Buf>(buf: &mut B, _ctx: &NdrContext) -> Self {
        buf.get_u8() != 0
    }
}

impl NdrEncode for bool {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_data(*self)
    }
}

impl NdrDecode for bool {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.read_data(self)
    }
}

/// GUID in its NDR layout
///
/// The first three fields follow the context byte order; `data4` is a raw
/// byte run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Nil GUID
    pub const NIL: Self = Self {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    /// Parse from string "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
    pub fn parse(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s.trim()).ok().map(Self::from)
    }

    /// Generate a random (version 4) GUID
    pub fn new_v4() -> Self {
        Self::from(uuid::Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl From<uuid::Uuid> for Guid {
    fn from(uuid: uuid::Uuid) -> Self {
        let (data1, data2, data3, data4) = uuid.as_fields();
        Self {
            data1,
            data2,
            data3,
            data4: *data4,
        }
    }
}

impl From<Guid> for uuid::Uuid {
    fn from(guid: Guid) -> Self {
        uuid::Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

impl NdrEncode for Guid {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_data(self.data1)?;
        w.write_data(self.data2)?;
        w.write_data(self.data3)?;
        w.write_raw(&self.data4)
    }
}

impl NdrDecode for Guid {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.read_data(&mut self.data1)?;
        r.read_data(&mut self.data2)?;
        r.read_data(&mut self.data3)?;
        r.read_raw_into(&mut self.data4)
    }
}
