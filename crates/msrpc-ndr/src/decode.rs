//! NDR decoding trait and reader
//!
//! [`NdrReader`] mirrors [`NdrWriter`](crate::NdrWriter): it owns the input
//! cursor, the deferred referent queue and the conformance of the outermost
//! conformant value for one decode call. Every read checks the remaining
//! length first, so a short or hostile message fails with an error instead
//! of a panic.

use crate::conformance::SizeInfo;
use crate::context::TransferSyntax;
use crate::primitives::FixedWidth;
use crate::{NdrContext, NdrError, Result};
use bytes::{Buf, Bytes};
use std::collections::VecDeque;

/// Trait for types that can be decoded from NDR format
///
/// Decoding fills `self` in place. Pointer fields hand the reader a
/// reference to their slot; the slot is filled when the reader flushes its
/// deferred queue, which is why the borrow lives as long as the reader.
pub trait NdrDecode {
    /// Decode a value at the reader's current position into `self`.
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()>;
}

/// A referent slot filled when the deferred queue is flushed
pub(crate) struct DeferredRead<'a> {
    pub(crate) referent: u64,
    pub(crate) type_name: &'static str,
    pub(crate) slot: &'a mut dyn NdrDecode,
}

/// Decode scope for one top-level value
pub struct NdrReader<'a> {
    buf: Bytes,
    ctx: NdrContext,
    position: usize,
    pub(crate) deferred: VecDeque<DeferredRead<'a>>,
    pub(crate) size_info: Option<SizeInfo>,
}

impl<'a> NdrReader<'a> {
    /// Create a reader over a complete message, positioned at offset 0
    pub fn new(input: impl Into<Bytes>, ctx: NdrContext) -> Self {
        Self {
            buf: input.into(),
            ctx,
            position: 0,
            deferred: VecDeque::new(),
            size_info: None,
        }
    }

    /// The context this reader decodes with
    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Current stream offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left in the input
    pub fn remaining_len(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(NdrError::TruncatedInput {
                needed,
                have: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Skip filler bytes up to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.position, alignment);
        if padding == 0 {
            return Ok(());
        }
        self.ensure(padding)?;
        if self.ctx.strict_padding {
            if let Some(i) = self.buf[..padding].iter().position(|b| *b != 0) {
                return Err(NdrError::NonZeroPadding {
                    position: self.position + i,
                });
            }
        }
        self.buf.advance(padding);
        self.position += padding;
        Ok(())
    }

    /// Read a scalar at its natural alignment
    pub fn read_data<T: FixedWidth>(&mut self, value: &mut T) -> Result<()> {
        self.align(T::WIDTH)?;
        self.ensure(T::WIDTH)?;
        *value = T::get_ndr(&mut self.buf, &self.ctx);
        self.position += T::WIDTH;
        Ok(())
    }

    /// Read an exact byte run with no alignment
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        self.position += len;
        Ok(self.buf.split_to(len))
    }

    /// Fill `dst` from the input with no alignment
    pub fn read_raw_into(&mut self, dst: &mut [u8]) -> Result<()> {
        self.ensure(dst.len())?;
        self.buf.copy_to_slice(dst);
        self.position += dst.len();
        Ok(())
    }

    /// Read one conformance or variance field at the syntax's width
    pub fn read_size(&mut self, size: &mut u64) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => {
                let mut value = 0u32;
                self.read_data(&mut value)?;
                *size = u64::from(value);
            }
            TransferSyntax::Ndr64 => self.read_data(size)?,
        }
        Ok(())
    }

    /// Read an NDR enumeration (`enum16` on NDR20, 32 bits on NDR64)
    pub fn read_enum(&mut self, value: &mut u16) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => self.read_data(value),
            TransferSyntax::Ndr64 => {
                let mut wide = 0u32;
                self.read_data(&mut wide)?;
                *value = u16::try_from(wide).map_err(|_| NdrError::InvalidEnumValue(wide))?;
                Ok(())
            }
        }
    }

    /// Skip a structure's tail padding (NDR64 only)
    pub fn read_trailing_gap(&mut self, alignment: usize) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => Ok(()),
            TransferSyntax::Ndr64 => self.align(alignment),
        }
    }
}
