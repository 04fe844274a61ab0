//! NDR encoding trait and writer
//!
//! [`NdrWriter`] is the per-call encode scope: it owns the output buffer, the
//! stream position used for alignment, the deferred referent queue and the
//! conformance of the outermost conformant value. Nothing in it is shared
//! between calls, so independent encodes can run on any number of threads.

use crate::conformance::SizeInfo;
use crate::context::TransferSyntax;
use crate::primitives::FixedWidth;
use crate::{NdrContext, NdrError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::VecDeque;
use std::io::Write;

/// Trait for types that can be encoded to NDR format
///
/// `'a` ties the value to the writer: pointer fields queue a reference to
/// their referent and the writer reads it back when the queue is flushed.
pub trait NdrEncode {
    /// Encode this value at the writer's current position.
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;
}

/// A referent whose body is written when the deferred queue is flushed
pub(crate) struct DeferredWrite<'a> {
    pub(crate) referent: u64,
    pub(crate) body: &'a dyn NdrEncode,
}

/// Encode scope for one top-level value
pub struct NdrWriter<'a> {
    buf: BytesMut,
    ctx: NdrContext,
    /// Stream offset of `buf[0]`; non-zero only for detached sub-writers
    base: usize,
    pub(crate) deferred: VecDeque<DeferredWrite<'a>>,
    pub(crate) size_info: Option<SizeInfo>,
    pub(crate) next_referent: u64,
}

impl<'a> NdrWriter<'a> {
    /// Create a writer positioned at offset 0 of the stub data
    pub fn new(ctx: NdrContext) -> Self {
        Self::with_capacity(ctx, 0)
    }

    /// Create a writer with a preallocated output buffer
    pub fn with_capacity(ctx: NdrContext, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ctx,
            base: 0,
            deferred: VecDeque::new(),
            size_info: None,
            next_referent: crate::pointers::FIRST_REFERENT_ID,
        }
    }

    /// The context this writer encodes with
    pub fn context(&self) -> &NdrContext {
        &self.ctx
    }

    /// Current stream offset
    pub fn position(&self) -> usize {
        self.base + self.buf.len()
    }

    /// Bytes written so far (deferred bodies not yet flushed are absent)
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Pad with zero bytes up to the next multiple of `alignment`
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.position(), alignment);
        self.buf.put_bytes(0, padding);
        Ok(())
    }

    /// Write a scalar at its natural alignment
    pub fn write_data<T: FixedWidth>(&mut self, value: T) -> Result<()> {
        self.align(T::WIDTH)?;
        value.put_ndr(&mut self.buf, &self.ctx);
        Ok(())
    }

    /// Write an exact byte run with no alignment
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write one conformance or variance field at the syntax's width
    pub fn write_size(&mut self, size: u64) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => {
                let size = u32::try_from(size).map_err(|_| NdrError::SizeOutOfRange(size))?;
                self.write_data(size)
            }
            TransferSyntax::Ndr64 => self.write_data(size),
        }
    }

    /// Write an NDR enumeration (`enum16` on NDR20, 32 bits on NDR64)
    pub fn write_enum(&mut self, value: u16) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => self.write_data(value),
            TransferSyntax::Ndr64 => self.write_data(u32::from(value)),
        }
    }

    /// Round a structure up to its alignment (NDR64 only)
    pub fn write_trailing_gap(&mut self, alignment: usize) -> Result<()> {
        match self.ctx.syntax {
            TransferSyntax::Ndr20 => Ok(()),
            TransferSyntax::Ndr64 => self.align(alignment),
        }
    }

    /// Encode `value` with its referents flushed immediately after it.
    ///
    /// For a value that owns no referents the output is identical to
    /// `value.ndr_encode(self)`; used for filler elements that only live for
    /// the duration of the call.
    pub(crate) fn encode_detached<T: NdrEncode>(&mut self, value: &T) -> Result<()> {
        let mut sub = NdrWriter {
            buf: BytesMut::new(),
            ctx: self.ctx,
            base: self.position(),
            deferred: VecDeque::new(),
            size_info: self.size_info.clone(),
            next_referent: self.next_referent,
        };
        value.ndr_encode(&mut sub)?;
        sub.flush_deferred()?;
        self.next_referent = sub.next_referent;
        self.buf.extend_from_slice(&sub.buf);
        Ok(())
    }

    /// Flush any pending referents and return the encoded message
    pub fn finish(mut self) -> Result<Bytes> {
        self.flush_deferred()?;
        Ok(self.buf.freeze())
    }

    /// Flush pending referents and write the message into `sink`.
    ///
    /// Returns the number of bytes written.
    pub fn write_to<W: Write>(self, sink: &mut W) -> Result<usize> {
        let bytes = self.finish()?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(bytes.len())
    }
}
