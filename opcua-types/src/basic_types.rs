// OPC UA binary codec core — SPDX-License-Identifier: MPL-2.0

//! Codec implementations for the built-in scalar types (spec §3): `Boolean`,
//! the signed/unsigned integers and the IEEE-754 floats. All travel
//! little-endian on the wire.

use std::io::{Read, Write};

use crate::encoding::*;

impl BinaryEncodable for bool {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, if *self { 1 } else { 0 })
    }
}

impl BinaryDecodable for bool {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? != 0)
    }
}

impl BinaryEncodable for i8 {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, *self as u8)
    }
}

impl BinaryDecodable for i8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? as i8)
    }
}

impl BinaryEncodable for u8 {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, *self)
    }
}

impl BinaryDecodable for u8 {
    fn decode<S: Read + ?Sized>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_u8(stream)
    }
}

macro_rules! numeric_impl {
    ($ty:ty, $read:ident, $write:ident) => {
        impl BinaryEncodable for $ty {
            fn byte_len(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn encode<S: Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<usize> {
                $write(stream, *self)
            }
        }

        impl BinaryDecodable for $ty {
            fn decode<S: Read + ?Sized>(
                stream: &mut S,
                _: &DecodingOptions,
            ) -> EncodingResult<Self> {
                $read(stream)
            }
        }
    };
}

numeric_impl!(i16, read_i16, write_i16);
numeric_impl!(u16, read_u16, write_u16);
numeric_impl!(i32, read_i32, write_i32);
numeric_impl!(u32, read_u32, write_u32);
numeric_impl!(i64, read_i64, write_i64);
numeric_impl!(u64, read_u64, write_u64);
numeric_impl!(f32, read_f32, write_f32);
numeric_impl!(f64, read_f64, write_f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: BinaryEncodable + BinaryDecodable + PartialEq + std::fmt::Debug>(v: T) {
        let mut buf = Vec::new();
        let written = v.encode(&mut buf).unwrap();
        assert_eq!(written, v.byte_len());
        assert_eq!(buf.len(), v.byte_len());
        let decoded = T::decode(&mut buf.as_slice(), &DecodingOptions::test()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(true);
        round_trip(false);
        round_trip(-5i8);
        round_trip(200u8);
        round_trip(-1234i16);
        round_trip(54321u16);
        round_trip(-123_456_789i32);
        round_trip(3_000_000_000u32);
        round_trip(-1i64);
        round_trip(u64::MAX);
        round_trip(3.25f32);
        round_trip(-2.5f64);
    }

    #[test]
    fn little_endian_on_wire() {
        let mut buf = Vec::new();
        0x0102_0304u32.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![0x04, 0x03, 0x02, 0x01]);
    }
}
