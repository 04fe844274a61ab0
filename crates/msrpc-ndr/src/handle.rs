//! RPC context handles
//!
//! A context handle is the 20-byte session token a server hands out and a
//! client echoes back: a 32-bit attributes word followed by a GUID. The
//! codec treats it as opaque.

use crate::{Guid, NdrDecode, NdrEncode, NdrReader, NdrWriter, Result};

/// Wire size of a context handle
pub const CONTEXT_HANDLE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContextHandle {
    pub attributes: u32,
    pub uuid: Guid,
}

impl ContextHandle {
    pub fn new(attributes: u32, uuid: Guid) -> Self {
        Self { attributes, uuid }
    }

    /// Issue a fresh handle with a random identifier
    pub fn generate() -> Self {
        Self::new(0, Guid::new_v4())
    }

    /// A null handle carries the nil GUID (closed or never opened)
    pub fn is_null(&self) -> bool {
        self.uuid.is_nil()
    }
}

impl NdrEncode for ContextHandle {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.align(4)?;
        w.write_data(self.attributes)?;
        self.uuid.ndr_encode(w)
    }
}

impl NdrDecode for ContextHandle {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.align(4)?;
        r.read_data(&mut self.attributes)?;
        self.uuid.ndr_decode(r)
    }
}
