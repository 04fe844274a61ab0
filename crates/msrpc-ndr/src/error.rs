//! NDR error types

use thiserror::Error;

/// NDR encoding/decoding errors
///
/// Every variant aborts the whole message: a field that fails to decode
/// leaves the cursor at an unknown offset, so nothing after it can be trusted.
#[derive(Debug, Error)]
pub enum NdrError {
    /// Decode needs more bytes than remain in the input
    #[error("truncated input: needed {needed} bytes, have {have}")]
    TruncatedInput { needed: usize, have: usize },

    /// A declared or derived dimension exceeds what the input can hold
    #[error("buffer overflow: declared size {size} exceeds {remaining} remaining bytes")]
    BufferOverflow { size: u64, remaining: usize },

    /// A dimension fits the input but exceeds the configured allocation cap
    #[error("allocation limit exceeded: requested {requested} bytes, limit {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },

    /// Malformed text (unpaired surrogate, missing terminator, bad offset)
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Variance header inconsistent with the conformance header
    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u64, actual_count: u64 },

    /// A dimension was requested before any sizes were declared
    #[error("no conformance declared for dimension {0}")]
    MissingConformance(usize),

    /// Size does not fit the 32-bit NDR20 size field
    #[error("size {0} does not fit the wire size field")]
    SizeOutOfRange(u64),

    /// Alignment filler was not zero (strict padding only)
    #[error("non-zero padding at offset {position}")]
    NonZeroPadding { position: usize },

    /// Enumeration value outside the declared set
    #[error("invalid enum value: {0}")]
    InvalidEnumValue(u32),

    /// A deferred referent body or a union arm failed to decode.
    ///
    /// `path` lists the enclosing referents/arms, outermost first.
    #[error("decode failed at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: Box<NdrError>,
    },

    /// The output sink rejected the encoded message
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl NdrError {
    /// Wrap this error with one more path segment, merging nested decode
    /// errors into a single path instead of nesting them.
    pub fn within(self, segment: impl Into<String>) -> Self {
        let segment = segment.into();
        match self {
            NdrError::Decode { path, source } => NdrError::Decode {
                path: format!("{segment}/{path}"),
                source,
            },
            other => NdrError::Decode {
                path: segment,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping any `Decode` wrappers
    pub fn root_cause(&self) -> &NdrError {
        match self {
            NdrError::Decode { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_merges_paths() {
        let err = NdrError::TruncatedInput { needed: 4, have: 1 }
            .within("referent#2 (u32)")
            .within("referent#1 (Outer)");

        match &err {
            NdrError::Decode { path, .. } => assert_eq!(path, "referent#1 (Outer)/referent#2 (u32)"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root_cause(), NdrError::TruncatedInput { needed: 4, have: 1 }));
    }

    #[test]
    fn test_sink_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: NdrError = io.into();
        assert!(matches!(err, NdrError::Sink(_)));
        assert!(err.to_string().contains("closed"));
    }
}
