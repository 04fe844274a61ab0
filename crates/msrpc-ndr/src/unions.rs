//! NDR discriminated unions
//!
//! An encapsulated union is its discriminant followed by the selected arm.
//! Under NDR64 the discriminant and the arm are both aligned to the union's
//! alignment; under NDR20 each aligns to its own natural width.
//!
//! A discriminant that selects no known arm decodes to "no active arm"
//! (the union's `Default`) rather than an error, so newer peers can add
//! arms. `read_union` hands the discriminant back either way.

use crate::context::TransferSyntax;
use crate::{NdrError, NdrReader, NdrWriter, Result};
use tracing::debug;

/// Wire type of a union discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwitchType {
    /// `small` (1 byte)
    Small,
    /// `short` (2 bytes)
    Short,
    /// `long` (4 bytes)
    #[default]
    Long,
}

/// A tagged variant that can be marshaled as an NDR union
pub trait NdrUnion {
    /// Wire type of the discriminant
    const SWITCH: SwitchType = SwitchType::Long;

    /// Alignment of the union (its widest arm or discriminant)
    const ALIGN: usize = 4;

    /// Discriminant of the active arm
    fn discriminant(&self) -> u32;

    /// Encode the active arm (without the discriminant)
    fn encode_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()>;

    /// Select the arm for `discriminant` and decode it into `self`.
    ///
    /// Returns `Ok(false)` if the discriminant selects no known arm.
    fn decode_arm<'a>(&'a mut self, discriminant: u32, r: &mut NdrReader<'a>) -> Result<bool>;
}

impl<'a> NdrWriter<'a> {
    /// Align to the union's alignment (NDR64 only)
    pub fn union_align(&mut self, alignment: usize) -> Result<()> {
        match self.context().syntax {
            TransferSyntax::Ndr20 => Ok(()),
            TransferSyntax::Ndr64 => self.align(alignment),
        }
    }

    pub fn write_switch(&mut self, switch: SwitchType, discriminant: u32) -> Result<()> {
        let out_of_range = || NdrError::SizeOutOfRange(u64::from(discriminant));
        match switch {
            SwitchType::Small => self.write_data(u8::try_from(discriminant).map_err(|_| out_of_range())?),
            SwitchType::Short => self.write_data(u16::try_from(discriminant).map_err(|_| out_of_range())?),
            SwitchType::Long => self.write_data(discriminant),
        }
    }

    /// Write a union: discriminant, then the active arm
    pub fn write_union<U: NdrUnion>(&mut self, value: &'a U) -> Result<()> {
        self.union_align(U::ALIGN)?;
        self.write_switch(U::SWITCH, value.discriminant())?;
        self.union_align(U::ALIGN)?;
        value.encode_arm(self)
    }
}

impl<'a> NdrReader<'a> {
    /// Skip to the union's alignment (NDR64 only)
    pub fn union_align(&mut self, alignment: usize) -> Result<()> {
        match self.context().syntax {
            TransferSyntax::Ndr20 => Ok(()),
            TransferSyntax::Ndr64 => self.align(alignment),
        }
    }

    pub fn read_switch(&mut self, switch: SwitchType) -> Result<u32> {
        Ok(match switch {
            SwitchType::Small => {
                let mut d = 0u8;
                self.read_data(&mut d)?;
                u32::from(d)
            }
            SwitchType::Short => {
                let mut d = 0u16;
                self.read_data(&mut d)?;
                u32::from(d)
            }
            SwitchType::Long => {
                let mut d = 0u32;
                self.read_data(&mut d)?;
                d
            }
        })
    }

    /// Read a union into `value` and return its discriminant.
    ///
    /// `value` is reset to its default (no active arm) before the arm is
    /// decoded, so an unknown discriminant consumes only the discriminant
    /// and leaves no stale arm behind.
    pub fn read_union<U: NdrUnion + Default>(&mut self, value: &'a mut U) -> Result<u32> {
        self.union_align(U::ALIGN)?;
        let discriminant = self.read_switch(U::SWITCH)?;
        self.union_align(U::ALIGN)?;
        *value = U::default();
        let known = value
            .decode_arm(discriminant, self)
            .map_err(|err| err.within(format!("union arm {discriminant} ({})", std::any::type_name::<U>())))?;
        if !known {
            debug!(
                discriminant,
                type_name = std::any::type_name::<U>(),
                "unknown union discriminant, no active arm"
            );
        }
        Ok(discriminant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, decode_into, encode, NdrContext, NdrDecode, NdrEncode, UniquePtr};

    #[derive(Debug, Default, PartialEq)]
    enum Info {
        #[default]
        Unset,
        Level1(u16),
        Level2(UniquePtr<u32>),
    }

    impl NdrUnion for Info {
        const ALIGN: usize = 8;

        fn discriminant(&self) -> u32 {
            match self {
                Info::Unset => 0,
                Info::Level1(_) => 1,
                Info::Level2(_) => 2,
            }
        }

        fn encode_arm<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
            match self {
                Info::Unset => Ok(()),
                Info::Level1(v) => v.ndr_encode(w),
                Info::Level2(p) => p.ndr_encode(w),
            }
        }

        fn decode_arm<'a>(&'a mut self, discriminant: u32, r: &mut NdrReader<'a>) -> Result<bool> {
            *self = match discriminant {
                1 => Info::Level1(0),
                2 => Info::Level2(UniquePtr::null()),
                _ => return Ok(false),
            };
            match self {
                Info::Unset => {}
                Info::Level1(v) => v.ndr_decode(r)?,
                Info::Level2(p) => p.ndr_decode(r)?,
            }
            Ok(true)
        }
    }

    impl NdrEncode for Info {
        fn ndr_encode<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
            w.write_union(self)
        }
    }

    impl NdrDecode for Info {
        fn ndr_decode<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
            r.read_union(self)?;
            Ok(())
        }
    }

    #[test]
    fn test_union_arms_roundtrip() {
        let level1 = Info::Level1(5);
        let bytes = encode(&level1, NdrContext::new()).unwrap();
        assert_eq!(&bytes[..], &[1, 0, 0, 0, 5, 0]);
        assert_eq!(decode::<Info>(bytes, NdrContext::new()).unwrap(), level1);

        let level2 = Info::Level2(UniquePtr::new(0xCAFE));
        let bytes = encode(&level2, NdrContext::new()).unwrap();
        assert_eq!(&bytes[..], &[2, 0, 0, 0, 0x00, 0x00, 0x02, 0x00, 0xFE, 0xCA, 0, 0]);
        assert_eq!(decode::<Info>(bytes, NdrContext::new()).unwrap(), level2);
    }

    #[test]
    fn test_ndr64_union_alignment() {
        let level1 = Info::Level1(5);
        let bytes = encode(&level1, NdrContext::ndr64()).unwrap();
        assert_eq!(&bytes[..], &[1, 0, 0, 0, 0, 0, 0, 0, 5, 0]);
        assert_eq!(decode::<Info>(bytes, NdrContext::ndr64()).unwrap(), level1);
    }

    #[test]
    fn test_unknown_discriminant_is_not_fatal() {
        let decoded: Info = decode(vec![7u8, 0, 0, 0], NdrContext::new()).unwrap();
        assert_eq!(decoded, Info::Unset);
    }

    #[test]
    fn test_unknown_discriminant_clears_previous_arm() {
        let mut value = Info::Level1(9);
        decode_into(&mut value, vec![7u8, 0, 0, 0], NdrContext::new()).unwrap();
        assert_eq!(value, Info::Unset);

        let mut value = Info::Level2(UniquePtr::new(1));
        let mut r = NdrReader::new(vec![7u8, 0, 0, 0], NdrContext::new());
        assert_eq!(r.read_union(&mut value).unwrap(), 7);
        drop(r);
        assert_eq!(value, Info::Unset);
    }

    #[test]
    fn test_arm_error_names_the_arm() {
        let err = decode::<Info>(vec![1u8, 0, 0, 0, 5], NdrContext::new()).unwrap_err();
        match &err {
            NdrError::Decode { path, .. } => assert!(path.starts_with("union arm 1"), "{path}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root_cause(), NdrError::TruncatedInput { .. }));
    }

    #[test]
    fn test_switch_widths() {
        let mut w = NdrWriter::new(NdrContext::new());
        w.write_switch(SwitchType::Small, 3).unwrap();
        w.write_switch(SwitchType::Short, 4).unwrap();
        assert_eq!(w.as_bytes(), &[3, 0, 4, 0]);
        assert!(matches!(
            w.write_switch(SwitchType::Small, 300),
            Err(NdrError::SizeOutOfRange(300))
        ));

        let mut r = NdrReader::new(vec![3u8, 0, 4, 0], NdrContext::new());
        assert_eq!(r.read_switch(SwitchType::Small).unwrap(), 3);
        assert_eq!(r.read_switch(SwitchType::Short).unwrap(), 4);
    }
}
