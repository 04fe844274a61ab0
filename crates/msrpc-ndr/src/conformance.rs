//! Conformance (size information) propagation
//!
//! A conformant structure carries the maximum counts of its embedded arrays
//! ahead of its first field. The outermost conformant value declares those
//! counts once; every nested value that needs a dimension reads it back from
//! the writer or reader instead of writing its own header.
//!
//! ```text
//! declare_sizes([n])   -> writes n (outermost only), returns a scope token
//!   ... fields ...
//!   dimension(0)       -> n, used by the nested array
//! release_sizes(scope) -> clears the sizes if this scope declared them
//! ```
//!
//! Sizes are cleared while a deferred referent is processed, so a pointed-to
//! value always declares its own conformance.

use crate::{NdrError, NdrReader, NdrWriter, Result};
use tracing::{debug, trace};

/// Dimensions declared by the outermost conformant value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeInfo {
    dims: Vec<u64>,
}

impl SizeInfo {
    pub fn new(dims: Vec<u64>) -> Self {
        Self { dims }
    }

    /// Dimension `i`, if declared
    pub fn get(&self, i: usize) -> Option<u64> {
        self.dims.get(i).copied()
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }
}

/// Token returned by `declare_sizes`; hand it back to `release_sizes`
#[must_use = "pass the scope to release_sizes once the conformant value is done"]
#[derive(Debug)]
pub struct SizeScope {
    outermost: bool,
}

impl SizeScope {
    /// Whether this scope established the sizes (and wrote/read the header)
    pub fn is_outermost(&self) -> bool {
        self.outermost
    }
}

impl<'a> NdrWriter<'a> {
    /// Declare the dimensions of a conformant value.
    ///
    /// If an enclosing value already declared sizes they are reused and
    /// nothing is written. In opaque mode nothing is written either.
    pub fn declare_sizes(&mut self, dims: &[u64]) -> Result<SizeScope> {
        if self.size_info.is_some() {
            return Ok(SizeScope { outermost: false });
        }
        if !self.context().opaque {
            for dim in dims {
                self.write_size(*dim)?;
            }
        }
        trace!(?dims, "declared conformance");
        self.size_info = Some(SizeInfo::new(dims.to_vec()));
        Ok(SizeScope { outermost: true })
    }

    pub fn release_sizes(&mut self, scope: SizeScope) {
        if scope.outermost {
            self.size_info = None;
        }
    }

    /// Sizes in effect, if any
    pub fn size_info(&self) -> Option<&SizeInfo> {
        self.size_info.as_ref()
    }

    /// Declared dimension `i`
    pub fn dimension(&self, i: usize) -> Result<u64> {
        self.size_info
            .as_ref()
            .and_then(|info| info.get(i))
            .ok_or(NdrError::MissingConformance(i))
    }

    /// Write an `offset, actual_count` variance header
    pub(crate) fn write_variance(&mut self, offset: u64, actual: u64) -> Result<()> {
        self.write_size(offset)?;
        self.write_size(actual)
    }
}

impl<'a> NdrReader<'a> {
    /// Read the dimensions of a conformant value.
    ///
    /// Mirrors [`NdrWriter::declare_sizes`]: sizes declared by an enclosing
    /// value are reused, and opaque mode reads nothing (every dimension is
    /// 0 until resolved against a count field).
    pub fn declare_sizes(&mut self, ndims: usize) -> Result<SizeScope> {
        if self.size_info.is_some() {
            return Ok(SizeScope { outermost: false });
        }
        let mut dims = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            let mut dim = 0;
            if !self.context().opaque {
                self.read_size(&mut dim)?;
            }
            dims.push(dim);
        }
        trace!(?dims, "read conformance");
        self.size_info = Some(SizeInfo::new(dims));
        Ok(SizeScope { outermost: true })
    }

    pub fn release_sizes(&mut self, scope: SizeScope) {
        if scope.outermost {
            self.size_info = None;
        }
    }

    pub fn size_info(&self) -> Option<&SizeInfo> {
        self.size_info.as_ref()
    }

    /// Declared dimension `i`, unchecked against the input
    pub fn dimension(&self, i: usize) -> Result<u64> {
        self.size_info
            .as_ref()
            .and_then(|info| info.get(i))
            .ok_or(NdrError::MissingConformance(i))
    }

    /// Declared dimension `i`, or the sibling `count` in opaque mode where
    /// the header was never transmitted
    pub fn resolve_dimension(&self, i: usize, count: u64) -> Result<u64> {
        let dim = self.dimension(i)?;
        Ok(if self.context().opaque && dim == 0 { count } else { dim })
    }

    /// Validate a dimension before anything is allocated for it.
    ///
    /// `elem_size` is the minimum wire size of one element. Fails with
    /// `BufferOverflow` if the elements cannot fit in the remaining input
    /// and with `AllocationLimitExceeded` if they exceed the context cap.
    pub fn checked_dimension(&self, dim: u64, elem_size: usize) -> Result<usize> {
        let remaining = self.remaining_len();
        let total = dim.saturating_mul(elem_size as u64);
        if total > remaining as u64 {
            debug!(dim, elem_size, remaining, "rejecting dimension larger than input");
            return Err(NdrError::BufferOverflow {
                size: dim,
                remaining,
            });
        }
        // total <= remaining, so both fit in usize
        let total = total as usize;
        let limit = self.context().max_allocation;
        if total > limit {
            debug!(dim, elem_size, limit, "rejecting dimension above allocation limit");
            return Err(NdrError::AllocationLimitExceeded {
                requested: total,
                limit,
            });
        }
        Ok(dim as usize)
    }

    /// Validate a run of `dim` decoded elements of type `T`.
    ///
    /// Each element takes at least one byte of input; the allocation cap
    /// applies to the in-memory size of the elements.
    pub fn checked_elements<T>(&self, dim: u64) -> Result<usize> {
        let len = self.checked_dimension(dim, 1)?;
        let requested = len.saturating_mul(std::mem::size_of::<T>());
        let limit = self.context().max_allocation;
        if requested > limit {
            debug!(dim, requested, limit, "rejecting element run above allocation limit");
            return Err(NdrError::AllocationLimitExceeded { requested, limit });
        }
        Ok(len)
    }

    /// [`resolve_dimension`](Self::resolve_dimension) followed by
    /// [`checked_dimension`](Self::checked_dimension)
    pub fn derive_dimension(&self, i: usize, count: u64, elem_size: usize) -> Result<usize> {
        let dim = self.resolve_dimension(i, count)?;
        self.checked_dimension(dim, elem_size)
    }

    /// Read an `offset, actual_count` variance header and check it against
    /// `max_count`.
    ///
    /// In opaque mode a zero `max_count` means the header was absent and
    /// only the variance itself bounds the elements.
    pub(crate) fn read_variance(&mut self, max_count: u64) -> Result<(u64, u64)> {
        let (mut offset, mut actual) = (0u64, 0u64);
        self.read_size(&mut offset)?;
        self.read_size(&mut actual)?;
        let end = offset
            .checked_add(actual)
            .ok_or(NdrError::ConformanceMismatch {
                max_count,
                actual_count: actual,
            })?;
        let unbounded = self.context().opaque && max_count == 0;
        if !unbounded && end > max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: actual,
            });
        }
        Ok((offset, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NdrContext;

    #[test]
    fn test_outermost_declares_once() {
        let mut w = NdrWriter::new(NdrContext::new());
        let outer = w.declare_sizes(&[3]).unwrap();
        assert!(outer.is_outermost());
        let inner = w.declare_sizes(&[99]).unwrap();
        assert!(!inner.is_outermost());
        assert_eq!(w.dimension(0).unwrap(), 3);
        w.release_sizes(inner);
        assert_eq!(w.dimension(0).unwrap(), 3);
        w.release_sizes(outer);
        assert!(w.size_info().is_none());

        assert_eq!(w.as_bytes(), &[3, 0, 0, 0]);
    }

    #[test]
    fn test_missing_conformance() {
        let w = NdrWriter::new(NdrContext::new());
        assert!(matches!(w.dimension(0), Err(NdrError::MissingConformance(0))));

        let mut r = NdrReader::new(vec![2u8, 0, 0, 0], NdrContext::new());
        let scope = r.declare_sizes(1).unwrap();
        assert!(matches!(r.dimension(1), Err(NdrError::MissingConformance(1))));
        r.release_sizes(scope);
    }

    #[test]
    fn test_opaque_mode_skips_header() {
        let mut w = NdrWriter::new(NdrContext::opaque());
        let scope = w.declare_sizes(&[5]).unwrap();
        assert_eq!(w.dimension(0).unwrap(), 5);
        w.release_sizes(scope);
        assert!(w.as_bytes().is_empty());

        let mut r = NdrReader::new(vec![0u8; 5], NdrContext::opaque());
        let scope = r.declare_sizes(1).unwrap();
        assert_eq!(r.dimension(0).unwrap(), 0);
        assert_eq!(r.resolve_dimension(0, 5).unwrap(), 5);
        assert_eq!(r.derive_dimension(0, 5, 1).unwrap(), 5);
        r.release_sizes(scope);
    }

    #[test]
    fn test_count_fallback_is_opaque_only() {
        let mut r = NdrReader::new(vec![0u8, 0, 0, 0, 1, 2, 3], NdrContext::new());
        let scope = r.declare_sizes(1).unwrap();
        assert_eq!(r.resolve_dimension(0, 3).unwrap(), 0);
        assert_eq!(r.derive_dimension(0, 3, 1).unwrap(), 0);
        r.release_sizes(scope);
    }

    #[test]
    fn test_checked_elements_counts_bytes() {
        let r = NdrReader::new(vec![0u8; 64], NdrContext::new().with_max_allocation(32));
        assert_eq!(r.checked_elements::<u64>(4).unwrap(), 4);
        assert!(matches!(
            r.checked_elements::<u64>(5),
            Err(NdrError::AllocationLimitExceeded { requested: 40, limit: 32 })
        ));
        assert!(matches!(
            r.checked_elements::<u8>(65),
            Err(NdrError::BufferOverflow { size: 65, remaining: 64 })
        ));
    }

    #[test]
    fn test_checked_dimension_rejects_hostile_sizes() {
        let r = NdrReader::new(vec![0u8; 8], NdrContext::new());
        assert_eq!(r.checked_dimension(4, 2).unwrap(), 4);
        assert!(matches!(
            r.checked_dimension(0xFFFF_FFFF, 1),
            Err(NdrError::BufferOverflow { size: 0xFFFF_FFFF, remaining: 8 })
        ));
        assert!(matches!(
            r.checked_dimension(u64::MAX, 8),
            Err(NdrError::BufferOverflow { .. })
        ));

        let r = NdrReader::new(vec![0u8; 64], NdrContext::new().with_max_allocation(16));
        assert!(matches!(
            r.checked_dimension(32, 1),
            Err(NdrError::AllocationLimitExceeded { requested: 32, limit: 16 })
        ));
    }

    #[test]
    fn test_variance_header() {
        let mut r = NdrReader::new(vec![1u8, 0, 0, 0, 2, 0, 0, 0], NdrContext::new());
        assert_eq!(r.read_variance(3).unwrap(), (1, 2));

        let mut r = NdrReader::new(vec![2u8, 0, 0, 0, 2, 0, 0, 0], NdrContext::new());
        assert!(matches!(
            r.read_variance(3),
            Err(NdrError::ConformanceMismatch { max_count: 3, actual_count: 2 })
        ));
    }
}
