//! NDR (Network Data Representation) codec for MS-RPC and DCOM
//!
//! This crate implements the NDR wire format as specified in DCE RPC and
//! MS-RPCE, the engine that interface stubs marshal their parameters with.
//!
//! # NDR Wire Format
//!
//! NDR is the standard encoding for DCE RPC data. Key characteristics:
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes)
//! - Structures align to their largest member
//! - Conformant data (arrays with runtime-determined size) comes at the end,
//!   with its size hoisted to the start of the outermost structure
//! - Pointers are written as referent IDs; the pointed-to data follows
//!   after all inline data of the top-level value
//! - Strings are conformant varying arrays with null terminator
//!
//! # Usage
//!
//! Every encode or decode call owns its own [`NdrWriter`] or [`NdrReader`].
//! Nested values receive the scope by reference, so the deferred pointer
//! queue and the declared sizes never outlive the call.
//!
//! ```
//! use msrpc_ndr::{ConformantArray, NdrContext};
//!
//! let array = ConformantArray::new(vec![1u8, 2, 3]);
//! let bytes = msrpc_ndr::encode(&array, NdrContext::new()).unwrap();
//! assert_eq!(&bytes[..], &[3, 0, 0, 0, 1, 2, 3]);
//!
//! let decoded: ConformantArray<u8> = msrpc_ndr::decode(bytes, NdrContext::new()).unwrap();
//! assert_eq!(decoded.elements, vec![1u8, 2, 3]);
//! ```

mod arrays;
mod conformance;
mod context;
mod decode;
mod encode;
mod error;
mod handle;
mod pointers;
mod primitives;
mod strings;
mod unions;

pub use arrays::{ConformantArray, ConformantVaryingArray, FixedArray, OpaqueBlob, VaryingArray};
pub use conformance::{SizeInfo, SizeScope};
pub use context::{NdrContext, TransferSyntax, DEFAULT_MAX_ALLOCATION};
pub use decode::{NdrDecode, NdrReader};
pub use encode::{NdrEncode, NdrWriter};
pub use error::{NdrError, Result};
pub use handle::{ContextHandle, CONTEXT_HANDLE_SIZE};
pub use pointers::{FullPtr, NdrPtr, RefPtr, UniquePtr, FIRST_REFERENT_ID};
pub use primitives::{FixedWidth, Guid};
pub use strings::{NdrString, NdrWString};
pub use unions::{NdrUnion, SwitchType};

/// Re-export bytes for convenience
pub use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Encode one top-level value, including its deferred referents
pub fn encode<T: NdrEncode + ?Sized>(value: &T, ctx: NdrContext) -> Result<Bytes> {
    let mut w = NdrWriter::new(ctx);
    value.ndr_encode(&mut w)?;
    w.finish()
}

/// Decode one top-level value, including its deferred referents
pub fn decode<T: NdrDecode + Default>(input: impl Into<Bytes>, ctx: NdrContext) -> Result<T> {
    let mut value = T::default();
    decode_into(&mut value, input, ctx)?;
    Ok(value)
}

/// Decode one top-level value into an existing `value`
pub fn decode_into<T: NdrDecode + ?Sized>(value: &mut T, input: impl Into<Bytes>, ctx: NdrContext) -> Result<()> {
    let mut r = NdrReader::new(input, ctx);
    value.ndr_decode(&mut r)?;
    r.flush_deferred()
}
