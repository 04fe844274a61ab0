//! Array shapes
//!
//! | Shape               | Header before the elements          |
//! |---------------------|-------------------------------------|
//! | fixed `[N]`         | none                                |
//! | conformant `[size_is]` | max_count (hoisted, see `conformance`) |
//! | varying `[length_is]`  | offset, actual_count                |
//! | conformant varying  | max_count (hoisted), offset, actual_count |
//! | opaque blob         | max_count (hoisted), byte count     |
//!
//! Element runs always match the dimension in effect: the encoder truncates
//! or pads with default elements, the decoder never reads past it.

use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use bytes::Bytes;
use tracing::warn;

impl<'a> NdrWriter<'a> {
    /// Write exactly `dim` elements.
    ///
    /// Extra elements are dropped with a warning; missing ones are written
    /// as `T::default()`.
    pub fn write_array<T: NdrEncode + Default>(&mut self, elements: &'a [T], dim: u64) -> Result<()> {
        let dim = usize::try_from(dim).map_err(|_| NdrError::SizeOutOfRange(dim))?;
        if elements.len() > dim {
            warn!(len = elements.len(), dim, "truncating array to declared dimension");
        }
        for elem in elements.iter().take(dim) {
            elem.ndr_encode(self)?;
        }
        if elements.len() < dim {
            let filler = T::default();
            for _ in elements.len()..dim {
                self.encode_detached(&filler)?;
            }
        }
        Ok(())
    }
}

impl<'a> NdrReader<'a> {
    /// Read exactly `dim` elements into `elements`, replacing its contents.
    ///
    /// `dim` is checked against the remaining input and the allocation cap
    /// before anything is allocated.
    pub fn read_array<T: NdrDecode + Default + 'a>(&mut self, elements: &'a mut Vec<T>, dim: u64) -> Result<()> {
        let len = self.checked_elements::<T>(dim)?;
        elements.clear();
        elements.resize_with(len, T::default);
        for elem in elements.iter_mut() {
            elem.ndr_decode(self)?;
        }
        Ok(())
    }
}

/// Fixed-size array
///
/// Wire format: just the elements (no size prefix)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedArray<T, const N: usize> {
    pub elements: [T; N],
}

impl<T: Default, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self {
            elements: std::array::from_fn(|_| T::default()),
        }
    }
}

impl<T, const N: usize> FixedArray<T, N> {
    pub fn new(elements: [T; N]) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode, const N: usize> NdrEncode for FixedArray<T, N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        for elem in &self.elements {
            elem.ndr_encode(w)?;
        }
        Ok(())
    }
}

impl<T: NdrDecode, const N: usize> NdrDecode for FixedArray<T, N> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        for elem in self.elements.iter_mut() {
            elem.ndr_decode(r)?;
        }
        Ok(())
    }
}

/// Conformant array - size determined at runtime
///
/// Wire format:
/// ```text
/// max_count: u32    # Number of elements (u64 on NDR64)
/// elements[max_count]
/// ```
///
/// Inside a conformant structure the count is hoisted to the structure's
/// start; the array then takes its dimension from the enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantArray<T> {
    pub elements: Vec<T>,
}

impl<T> ConformantArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode + Default> NdrEncode for ConformantArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let scope = w.declare_sizes(&[self.elements.len() as u64])?;
        if w.context().opaque && scope.is_outermost() {
            w.release_sizes(scope);
            return Err(NdrError::MissingConformance(0));
        }
        let dim = w.dimension(0)?;
        w.write_array(&self.elements, dim)?;
        w.release_sizes(scope);
        Ok(())
    }
}

impl<T: NdrDecode + Default> NdrDecode for ConformantArray<T> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let scope = r.declare_sizes(1)?;
        if r.context().opaque && scope.is_outermost() {
            // no header and no enclosing count field
            r.release_sizes(scope);
            return Err(NdrError::MissingConformance(0));
        }
        let dim = r.dimension(0)?;
        r.read_array(&mut self.elements, dim)?;
        r.release_sizes(scope);
        Ok(())
    }
}

/// Varying array - subset of fixed array transmitted
///
/// Wire format:
/// ```text
/// offset: u32       # First transmitted element (always 0 in practice)
/// actual_count: u32 # Number of transmitted elements
/// elements[actual_count]
/// ```
///
/// `offset + actual_count` never exceeds `N`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaryingArray<T, const N: usize> {
    pub offset: usize,
    pub elements: Vec<T>,
}

impl<T, const N: usize> VaryingArray<T, N> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { offset: 0, elements }
    }

    pub fn with_offset(offset: usize, elements: Vec<T>) -> Self {
        Self { offset, elements }
    }
}

impl<T: NdrEncode + Default, const N: usize> NdrEncode for VaryingArray<T, N> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let capacity = N.checked_sub(self.offset).ok_or(NdrError::ConformanceMismatch {
            max_count: N as u64,
            actual_count: self.elements.len() as u64,
        })?;
        let actual = self.elements.len().min(capacity) as u64;
        w.write_variance(self.offset as u64, actual)?;
        w.write_array(&self.elements, actual)
    }
}

impl<T: NdrDecode + Default, const N: usize> NdrDecode for VaryingArray<T, N> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let (offset, actual) = r.read_variance(N as u64)?;
        // offset <= N
        self.offset = offset as usize;
        r.read_array(&mut self.elements, actual)
    }
}

/// Conformant varying array
///
/// Wire format:
/// ```text
/// max_count: u32
/// offset: u32
/// actual_count: u32
/// elements[actual_count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConformantVaryingArray<T> {
    pub max_count: usize,
    pub offset: usize,
    pub elements: Vec<T>,
}

impl<T> ConformantVaryingArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            max_count: elements.len(),
            offset: 0,
            elements,
        }
    }

    pub fn with_max(max_count: usize, elements: Vec<T>) -> Self {
        Self {
            max_count,
            offset: 0,
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T: NdrEncode + Default> NdrEncode for ConformantVaryingArray<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let scope = w.declare_sizes(&[self.max_count as u64])?;
        let max = w.dimension(0)?;
        let offset = self.offset as u64;
        let capacity = max.checked_sub(offset).ok_or(NdrError::ConformanceMismatch {
            max_count: max,
            actual_count: self.elements.len() as u64,
        })?;
        let actual = (self.elements.len() as u64).min(capacity);
        w.write_variance(offset, actual)?;
        w.write_array(&self.elements, actual)?;
        w.release_sizes(scope);
        Ok(())
    }
}

impl<T: NdrDecode + Default> NdrDecode for ConformantVaryingArray<T> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let scope = r.declare_sizes(1)?;
        let max = r.dimension(0)?;
        let (offset, actual) = r.read_variance(max)?;
        let max = max.max(offset + actual);
        self.max_count = usize::try_from(max).map_err(|_| NdrError::SizeOutOfRange(max))?;
        self.offset = usize::try_from(offset).map_err(|_| NdrError::SizeOutOfRange(offset))?;
        r.read_array(&mut self.elements, actual)?;
        r.release_sizes(scope);
        Ok(())
    }
}

/// Counted opaque byte run
///
/// The `{ unsigned long cb; [size_is(cb)] byte data[]; }` envelope used to
/// carry marshaled interface pointers and other nested protocol payloads.
///
/// Wire format:
/// ```text
/// max_count: u32    # conformance, absent in opaque mode
/// count: u32
/// data[count]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OpaqueBlob {
    pub data: Bytes,
}

impl OpaqueBlob {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl NdrEncode for OpaqueBlob {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let len = self.data.len() as u64;
        let scope = w.declare_sizes(&[len])?;
        let dim = w.dimension(0)?;
        let count = u32::try_from(dim).map_err(|_| NdrError::SizeOutOfRange(dim))?;
        // count <= u32::MAX
        let dim = count as usize;
        w.write_data(count)?;
        if self.data.len() > dim {
            warn!(len = self.data.len(), dim, "truncating blob to declared dimension");
        }
        let take = self.data.len().min(dim);
        w.write_raw(&self.data[..take])?;
        if take < dim {
            w.write_raw(&vec![0u8; dim - take])?;
        }
        w.release_sizes(scope);
        Ok(())
    }
}

impl NdrDecode for OpaqueBlob {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let scope = r.declare_sizes(1)?;
        let mut count = 0u32;
        r.read_data(&mut count)?;
        let len = r.derive_dimension(0, u64::from(count), 1)?;
        self.data = r.read_raw(len)?;
        r.release_sizes(scope);
        Ok(())
    }
}
