//! Shared fixtures for the codec integration tests

#![allow(dead_code)]

use msrpc_ndr::{
    ContextHandle, NdrDecode, NdrEncode, NdrReader, NdrUnion, NdrWString, NdrWriter, Result, UniquePtr,
};

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// ```text
/// struct RECORD {
///     unsigned char flags;
///     unsigned long id;
///     unsigned short kind;
///     unsigned hyper stamp;
///     [unique, string] wchar_t *name;
///     [unique] struct RECORD *child;
/// };
/// ```
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record {
    pub flags: u8,
    pub id: u32,
    pub kind: u16,
    pub stamp: u64,
    pub name: UniquePtr<NdrWString>,
    pub child: UniquePtr<Record>,
}

impl NdrEncode for Record {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.align(8)?;
        self.flags.ndr_encode(w)?;
        self.id.ndr_encode(w)?;
        self.kind.ndr_encode(w)?;
        self.stamp.ndr_encode(w)?;
        self.name.ndr_encode(w)?;
        self.child.ndr_encode(w)?;
        w.write_trailing_gap(8)
    }
}

impl NdrDecode for Record {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.align(8)?;
        self.flags.ndr_decode(r)?;
        self.id.ndr_decode(r)?;
        self.kind.ndr_decode(r)?;
        self.stamp.ndr_decode(r)?;
        self.name.ndr_decode(r)?;
        self.child.ndr_decode(r)?;
        r.read_trailing_gap(8)
    }
}

pub fn record(id: u32, name: Option<&str>) -> Record {
    Record {
        flags: 1,
        id,
        kind: 3,
        stamp: 4,
        name: UniquePtr::from_option(name.map(NdrWString::from)),
        child: UniquePtr::null(),
    }
}

/// Session-style union: `[switch_is(level)] union { [case(1)] handle; [case(2)] [unique, string] wchar_t* }`
#[derive(Debug, Default, Clone, PartialEq)]
pub enum SessionInfo {
    #[default]
    None,
    Handle(ContextHandle),
    Name(UniquePtr<NdrWString>),
}

impl NdrUnion for SessionInfo {
    fn discriminant(&self) -> u32 {
        match self {
            SessionInfo::None => 0,
            SessionInfo::Handle(_) => 1,
            SessionInfo::Name(_) => 2,
        }
    }

    fn encode_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        match self {
            SessionInfo::None => Ok(()),
            SessionInfo::Handle(handle) => handle.ndr_encode(w),
            SessionInfo::Name(name) => name.ndr_encode(w),
        }
    }

    fn decode_arm<'a>(&'a mut self, discriminant: u32, r: &mut NdrReader<'a>) -> Result<bool> {
        *self = match discriminant {
            1 => SessionInfo::Handle(ContextHandle::default()),
            2 => SessionInfo::Name(UniquePtr::null()),
            _ => return Ok(false),
        };
        match self {
            SessionInfo::None => {}
            SessionInfo::Handle(handle) => handle.ndr_decode(r)?,
            SessionInfo::Name(name) => name.ndr_decode(r)?,
        }
        Ok(true)
    }
}

impl NdrEncode for SessionInfo {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        w.write_union(self)
    }
}

impl NdrDecode for SessionInfo {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        r.read_union(self)?;
        Ok(())
    }
}
