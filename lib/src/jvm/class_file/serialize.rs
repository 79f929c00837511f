use crate::util::{OffsetVec, Width};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::Result;

/// Big-endian encoding of the pieces of a class file
///
/// Two conventions show up everywhere in the format, so they are baked in here:
///
///   - tags are always `u8`
///   - sequences are prefixed by their length as a `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;

    /// Serialize into a fresh buffer
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// The count written up front is the offset just past the last element, which is how the
/// constant pool counts its (possibly two slot wide) entries.
impl<A: Serialize + Width> Serialize for OffsetVec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.offset_len().0 as u16).serialize(writer)?;
        for elem in self.values() {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::Offset;

    #[test]
    fn big_endian() {
        assert_eq!(0xCAFEu16.to_bytes().unwrap(), vec![0xCA, 0xFE]);
        assert_eq!((-2i32).to_bytes().unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(1.0f32.to_bytes().unwrap(), vec![0x3F, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn length_prefixed() {
        assert_eq!(vec![1u8, 2, 3].to_bytes().unwrap(), vec![0, 3, 1, 2, 3]);
    }

    #[derive(Debug)]
    struct Slot(u8, usize);

    impl Width for Slot {
        fn width(&self) -> usize {
            self.1
        }
    }

    impl Serialize for Slot {
        fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
            self.0.serialize(writer)
        }
    }

    #[test]
    fn offset_prefixed() {
        let mut slots = OffsetVec::new_starting_at(Offset(1));
        slots.push(Slot(7, 1));
        slots.push(Slot(8, 2));
        slots.push(Slot(9, 1));
        assert_eq!(slots.to_bytes().unwrap(), vec![0, 5, 7, 8, 9]);
    }
}
