//! NDR pointer types
//!
//! NDR supports three pointer semantics:
//!
//! - Reference (`[ref]`): Non-null; a top-level reference is just its data
//! - Unique (`[unique]`): Nullable, referent ID marker, no aliasing
//! - Full (`[ptr]`): Nullable, referent ID marker, aliasing allowed
//!
//! A non-null embedded pointer writes its referent ID inline and queues the
//! body. Queued bodies are written when the writer flushes, after all the
//! inline data of the enclosing top-level value. Referents queued while a
//! body is being written are flushed right after that body and before its
//! later siblings (depth first), which is the order MS-RPC peers expect.

use crate::context::TransferSyntax;
use crate::decode::DeferredRead;
use crate::encode::DeferredWrite;
use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use tracing::trace;

/// First referent ID handed out by a writer
pub const FIRST_REFERENT_ID: u64 = 0x0002_0000;

const REFERENT_ID_STEP: u64 = 4;

impl<'a> NdrWriter<'a> {
    fn write_marker(&mut self, marker: u64) -> Result<()> {
        match self.context().syntax {
            TransferSyntax::Ndr20 => {
                let marker = u32::try_from(marker).map_err(|_| NdrError::SizeOutOfRange(marker))?;
                self.write_data(marker)
            }
            TransferSyntax::Ndr64 => self.write_data(marker),
        }
    }

    fn enqueue(&mut self, body: &'a dyn NdrEncode) -> Result<()> {
        let referent = self.next_referent;
        self.next_referent = referent
            .checked_add(REFERENT_ID_STEP)
            .ok_or(NdrError::SizeOutOfRange(referent))?;
        self.write_marker(referent)?;
        trace!("queued referent {referent:#x}");
        self.deferred.push_back(DeferredWrite { referent, body });
        Ok(())
    }

    /// Write a nullable embedded pointer.
    ///
    /// `None` writes a zero marker and nothing else.
    pub fn write_pointer<T: NdrEncode>(&mut self, referent: Option<&'a T>) -> Result<()> {
        match referent {
            None => self.write_marker(0),
            Some(body) => self.enqueue(body),
        }
    }

    /// Write an embedded `[ref]` pointer: always a non-zero marker
    pub fn write_ref_pointer<T: NdrEncode>(&mut self, referent: &'a T) -> Result<()> {
        self.enqueue(referent)
    }

    /// Write every queued referent body, depth first.
    ///
    /// Declared sizes are cleared while each body is written and restored
    /// afterwards.
    pub fn flush_deferred(&mut self) -> Result<()> {
        let saved = self.size_info.take();
        let result = self.flush_frames();
        self.size_info = saved;
        result
    }

    fn flush_frames(&mut self) -> Result<()> {
        let mut stack: Vec<VecDeque<DeferredWrite<'a>>> = vec![std::mem::take(&mut self.deferred)];
        while let Some(frame) = stack.last_mut() {
            let Some(item) = frame.pop_front() else {
                stack.pop();
                continue;
            };
            trace!("writing referent {:#x}", item.referent);
            self.size_info = None;
            item.body.ndr_encode(self)?;
            let children = std::mem::take(&mut self.deferred);
            if !children.is_empty() {
                stack.push(children);
            }
        }
        Ok(())
    }
}

/// Path segment naming one referent in decode errors
fn referent_label(referent: u64, type_name: &str) -> String {
    format!("referent#{referent:#x} ({type_name})")
}

struct ReadFrame<'a> {
    items: VecDeque<DeferredRead<'a>>,
    label: Option<String>,
}

impl<'a> NdrReader<'a> {
    fn read_marker(&mut self) -> Result<u64> {
        let mut marker = 0u64;
        match self.context().syntax {
            TransferSyntax::Ndr20 => {
                let mut narrow = 0u32;
                self.read_data(&mut narrow)?;
                marker = u64::from(narrow);
            }
            TransferSyntax::Ndr64 => self.read_data(&mut marker)?,
        }
        Ok(marker)
    }

    /// Read a nullable embedded pointer into `slot`.
    ///
    /// A zero marker sets `None` and consumes nothing else. Otherwise the
    /// slot is set to `Some(T::default())` and filled when the reader
    /// flushes its queue.
    pub fn read_pointer<T: NdrDecode + Default + 'a>(&mut self, slot: &'a mut Option<T>) -> Result<()> {
        let referent = self.read_marker()?;
        if referent == 0 {
            *slot = None;
            return Ok(());
        }
        let body: &'a mut T = slot.insert(T::default());
        self.enqueue(referent, body);
        Ok(())
    }

    /// Read an embedded `[ref]` pointer; a zero marker is malformed
    pub fn read_ref_pointer<T: NdrDecode + 'a>(&mut self, slot: &'a mut T) -> Result<()> {
        let referent = self.read_marker()?;
        if referent == 0 {
            return Err(NdrError::InvalidEncoding(format!(
                "null reference pointer to {}",
                std::any::type_name::<T>()
            )));
        }
        self.enqueue(referent, slot);
        Ok(())
    }

    fn enqueue<T: NdrDecode + 'a>(&mut self, referent: u64, slot: &'a mut T) {
        trace!("queued referent slot {referent:#x}");
        self.deferred.push_back(DeferredRead {
            referent,
            type_name: std::any::type_name::<T>(),
            slot,
        });
    }

    /// Fill every queued referent slot, depth first.
    ///
    /// Uses an explicit stack so hostile nesting cannot exhaust the call
    /// stack. A failing body is reported with the chain of referents that
    /// led to it.
    pub fn flush_deferred(&mut self) -> Result<()> {
        let saved = self.size_info.take();
        let result = self.flush_frames();
        self.size_info = saved;
        result
    }

    fn flush_frames(&mut self) -> Result<()> {
        let mut stack = vec![ReadFrame {
            items: std::mem::take(&mut self.deferred),
            label: None,
        }];
        while let Some(frame) = stack.last_mut() {
            let Some(DeferredRead {
                referent,
                type_name,
                slot,
            }) = frame.items.pop_front()
            else {
                stack.pop();
                continue;
            };
            trace!(type_name, "reading referent {referent:#x}");
            self.size_info = None;
            if let Err(err) = NdrDecode::ndr_decode(slot, self) {
                let err = err.within(referent_label(referent, type_name));
                return Err(stack
                    .iter()
                    .rev()
                    .filter_map(|frame| frame.label.as_deref())
                    .fold(err, |err, label| err.within(label)));
            }
            let children = std::mem::take(&mut self.deferred);
            if !children.is_empty() {
                stack.push(ReadFrame {
                    items: children,
                    label: Some(referent_label(referent, type_name)),
                });
            }
        }
        Ok(())
    }
}

impl<T: NdrEncode> NdrEncode for Box<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        (**self).ndr_encode(w)
    }
}

impl<T: NdrDecode> NdrDecode for Box<T> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        (**self).ndr_decode(r)
    }
}

/// Trait for NDR pointer types
pub trait NdrPtr {
    type Target;

    /// Check if the pointer is null
    fn is_null(&self) -> bool;

    /// Get the inner value, if any
    fn get(&self) -> Option<&Self::Target>;

    /// Get a mutable reference to the inner value, if any
    fn get_mut(&mut self) -> Option<&mut Self::Target>;
}

/// Reference pointer - non-null, data follows inline
///
/// The top-level `[ref]` attribute in MIDL: the pointer itself is not
/// transmitted. Embedded `[ref]` pointers go through
/// [`NdrWriter::write_ref_pointer`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefPtr<T>(pub T);

impl<T> RefPtr<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for RefPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for RefPtr<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> NdrPtr for RefPtr<T> {
    type Target = T;

    fn is_null(&self) -> bool {
        false
    }

    fn get(&self) -> Option<&T> {
        Some(&self.0)
    }

    fn get_mut(&mut self) -> Option<&mut T> {
        Some(&mut self.0)
    }
}

impl<T: NdrEncode> NdrEncode for RefPtr<T> {
    fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        self.0.ndr_encode(w)
    }
}

impl<T: NdrDecode> NdrDecode for RefPtr<T> {
    fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        self.0.ndr_decode(r)
    }
}

macro_rules! nullable_pointer {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name<T>(pub Option<Box<T>>);

        impl<T> $name<T> {
            pub fn new(value: T) -> Self {
                Self(Some(Box::new(value)))
            }

            pub fn null() -> Self {
                Self(None)
            }

            pub fn from_option(opt: Option<T>) -> Self {
                Self(opt.map(Box::new))
            }

            pub fn into_option(self) -> Option<T> {
                self.0.map(|b| *b)
            }

            pub fn as_ref(&self) -> Option<&T> {
                self.0.as_deref()
            }

            pub fn as_mut(&mut self) -> Option<&mut T> {
                self.0.as_deref_mut()
            }
        }

        impl<T> Default for $name<T> {
            fn default() -> Self {
                Self(None)
            }
        }

        impl<T> From<Option<T>> for $name<T> {
            fn from(opt: Option<T>) -> Self {
                Self::from_option(opt)
            }
        }

        impl<T> NdrPtr for $name<T> {
            type Target = T;

            fn is_null(&self) -> bool {
                self.0.is_none()
            }

            fn get(&self) -> Option<&T> {
                self.0.as_deref()
            }

            fn get_mut(&mut self) -> Option<&mut T> {
                self.0.as_deref_mut()
            }
        }

        impl<T: NdrEncode> NdrEncode for $name<T> {
            fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
                w.write_pointer(self.0.as_deref())
            }
        }

        impl<T: NdrDecode + Default> NdrDecode for $name<T> {
            fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
                r.read_pointer(&mut self.0)
            }
        }
    };
}

nullable_pointer!(
    /// Unique pointer - nullable, no aliasing
    ///
    /// The `[unique]` attribute in MIDL: a referent ID (0 = null) inline and
    /// the pointee deferred.
    UniquePtr
);

nullable_pointer!(
    /// Full pointer - nullable, may alias
    ///
    /// The `[ptr]` attribute in MIDL. Same wire format as [`UniquePtr`];
    /// every non-null pointer gets a fresh referent ID, so two full pointers
    /// to the same value are encoded as two copies.
    FullPtr
);
