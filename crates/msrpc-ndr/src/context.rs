//! NDR encoding/decoding context
//!
//! The context carries the negotiated data representation (byte order and
//! transfer syntax) and the decoder's resource limits.

/// Default cap on any single decoded array or string (16 MiB)
pub const DEFAULT_MAX_ALLOCATION: usize = 16 * 1024 * 1024;

/// Transfer syntax negotiated for the presentation context
///
/// | Item               | NDR20   | NDR64   |
/// |--------------------|---------|---------|
/// | size / count field | 4 bytes | 8 bytes |
/// | pointer marker     | 4 bytes | 8 bytes |
/// | enum               | 2 bytes | 4 bytes |
/// | union arm realign  | no      | yes     |
/// | struct tail gap    | no      | yes     |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferSyntax {
    #[default]
    Ndr20,
    Ndr64,
}

impl TransferSyntax {
    /// Width (and alignment) of conformance/variance fields
    pub fn size_width(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 4,
            TransferSyntax::Ndr64 => 8,
        }
    }

    /// Width (and alignment) of pointer referent markers
    pub fn pointer_width(self) -> usize {
        self.size_width()
    }

    /// Width (and alignment) of enumerations
    pub fn enum_width(self) -> usize {
        match self {
            TransferSyntax::Ndr20 => 2,
            TransferSyntax::Ndr64 => 4,
        }
    }
}

/// NDR encoding/decoding context
///
/// Immutable per call; every writer and reader copies it.
#[derive(Debug, Clone, Copy)]
pub struct NdrContext {
    /// Whether to use little-endian byte order
    pub little_endian: bool,
    /// NDR20 or NDR64 framing
    pub syntax: TransferSyntax,
    /// Skip conformance headers; dimensions come from sibling count fields
    pub opaque: bool,
    /// Reject non-zero alignment filler on decode
    pub strict_padding: bool,
    /// Upper bound on a single decoded allocation, in bytes
    pub max_allocation: usize,
}

impl NdrContext {
    /// Create a new NDR context with little-endian byte order (default)
    pub fn new() -> Self {
        Self {
            little_endian: true,
            syntax: TransferSyntax::Ndr20,
            opaque: false,
            strict_padding: false,
            max_allocation: DEFAULT_MAX_ALLOCATION,
        }
    }

    /// Create a context with big-endian byte order
    pub fn big_endian() -> Self {
        Self::new().with_byte_order(false)
    }

    /// Create an NDR64 context
    pub fn ndr64() -> Self {
        Self::new().with_syntax(TransferSyntax::Ndr64)
    }

    /// Create an opaque-mode context (no conformance headers)
    pub fn opaque() -> Self {
        Self {
            opaque: true,
            ..Self::new()
        }
    }

    /// Set the byte order
    pub fn with_byte_order(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    /// Set the transfer syntax
    pub fn with_syntax(mut self, syntax: TransferSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    /// Enable or disable padding validation
    pub fn with_strict_padding(mut self, strict: bool) -> Self {
        self.strict_padding = strict;
        self
    }

    /// Set the allocation cap
    pub fn with_max_allocation(mut self, max_allocation: usize) -> Self {
        self.max_allocation = max_allocation;
        self
    }

    /// Calculate padding needed to align to the given boundary
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment == 0 || alignment == 1 {
            return 0;
        }
        let remainder = position % alignment;
        if remainder == 0 {
            0
        } else {
            alignment - remainder
        }
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
