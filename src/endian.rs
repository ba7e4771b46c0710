// readstata - a reader and writer for Stata .dta files.
// Copyright (C) 2026 the readstata authors.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Converting big- and little-endian `[u8]` arrays to and from primitive
//! types.
//!
//! A `.dta` file declares its own byte order in the header (`LSF` or `MSF`
//! for release 117 and later, a single code byte before that).  Everything
//! after that declaration is read through an [Endian] picked once, so missing
//! value comparisons and sentinel arithmetic always happen on parsed values,
//! never on raw bytes.

pub use binrw::Endian;

/// Converts a primitive type into a big- or little-endian `[u8]` array.
pub trait ToBytes<T, const N: usize> {
    fn to_bytes(self, value: T) -> [u8; N];
}
impl ToBytes<u64, 8> for Endian {
    fn to_bytes(self, value: u64) -> [u8; 8] {
        match self {
            Endian::Big => u64::to_be_bytes(value),
            Endian::Little => u64::to_le_bytes(value),
        }
    }
}
impl ToBytes<i64, 8> for Endian {
    fn to_bytes(self, value: i64) -> [u8; 8] {
        match self {
            Endian::Big => i64::to_be_bytes(value),
            Endian::Little => i64::to_le_bytes(value),
        }
    }
}
impl ToBytes<u32, 4> for Endian {
    fn to_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Big => u32::to_be_bytes(value),
            Endian::Little => u32::to_le_bytes(value),
        }
    }
}
impl ToBytes<i32, 4> for Endian {
    fn to_bytes(self, value: i32) -> [u8; 4] {
        match self {
            Endian::Big => i32::to_be_bytes(value),
            Endian::Little => i32::to_le_bytes(value),
        }
    }
}
impl ToBytes<u16, 2> for Endian {
    fn to_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Endian::Big => u16::to_be_bytes(value),
            Endian::Little => u16::to_le_bytes(value),
        }
    }
}
impl ToBytes<i16, 2> for Endian {
    fn to_bytes(self, value: i16) -> [u8; 2] {
        match self {
            Endian::Big => i16::to_be_bytes(value),
            Endian::Little => i16::to_le_bytes(value),
        }
    }
}
impl ToBytes<u8, 1> for Endian {
    fn to_bytes(self, value: u8) -> [u8; 1] {
        [value]
    }
}
impl ToBytes<i8, 1> for Endian {
    fn to_bytes(self, value: i8) -> [u8; 1] {
        [value as u8]
    }
}
impl ToBytes<f64, 8> for Endian {
    fn to_bytes(self, value: f64) -> [u8; 8] {
        match self {
            Endian::Big => f64::to_be_bytes(value),
            Endian::Little => f64::to_le_bytes(value),
        }
    }
}
impl ToBytes<f32, 4> for Endian {
    fn to_bytes(self, value: f32) -> [u8; 4] {
        match self {
            Endian::Big => f32::to_be_bytes(value),
            Endian::Little => f32::to_le_bytes(value),
        }
    }
}

/// Parses a `[u8]` array as a big- or little-endian primitive type.
pub trait Parse<T, const N: usize> {
    /// Given `bytes`, returns `T`.
    fn parse(self, bytes: [u8; N]) -> T;
}
impl Parse<u64, 8> for Endian {
    fn parse(self, bytes: [u8; 8]) -> u64 {
        match self {
            Endian::Big => u64::from_be_bytes(bytes),
            Endian::Little => u64::from_le_bytes(bytes),
        }
    }
}
impl Parse<i64, 8> for Endian {
    fn parse(self, bytes: [u8; 8]) -> i64 {
        match self {
            Endian::Big => i64::from_be_bytes(bytes),
            Endian::Little => i64::from_le_bytes(bytes),
        }
    }
}
impl Parse<u32, 4> for Endian {
    fn parse(self, bytes: [u8; 4]) -> u32 {
        match self {
            Endian::Big => u32::from_be_bytes(bytes),
            Endian::Little => u32::from_le_bytes(bytes),
        }
    }
}
impl Parse<i32, 4> for Endian {
    fn parse(self, bytes: [u8; 4]) -> i32 {
        match self {
            Endian::Big => i32::from_be_bytes(bytes),
            Endian::Little => i32::from_le_bytes(bytes),
        }
    }
}
impl Parse<u16, 2> for Endian {
    fn parse(self, bytes: [u8; 2]) -> u16 {
        match self {
            Endian::Big => u16::from_be_bytes(bytes),
            Endian::Little => u16::from_le_bytes(bytes),
        }
    }
}
impl Parse<i16, 2> for Endian {
    fn parse(self, bytes: [u8; 2]) -> i16 {
        match self {
            Endian::Big => i16::from_be_bytes(bytes),
            Endian::Little => i16::from_le_bytes(bytes),
        }
    }
}
impl Parse<u8, 1> for Endian {
    fn parse(self, bytes: [u8; 1]) -> u8 {
        bytes[0]
    }
}
impl Parse<i8, 1> for Endian {
    fn parse(self, bytes: [u8; 1]) -> i8 {
        bytes[0] as i8
    }
}
impl Parse<f64, 8> for Endian {
    fn parse(self, bytes: [u8; 8]) -> f64 {
        match self {
            Endian::Big => f64::from_be_bytes(bytes),
            Endian::Little => f64::from_le_bytes(bytes),
        }
    }
}
impl Parse<f32, 4> for Endian {
    fn parse(self, bytes: [u8; 4]) -> f32 {
        match self {
            Endian::Big => f32::from_be_bytes(bytes),
            Endian::Little => f32::from_le_bytes(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Endian, Parse, ToBytes};

    #[test]
    fn round_trip_both_orders() {
        for endian in [Endian::Big, Endian::Little] {
            let bytes: [u8; 2] = endian.to_bytes(0x1234u16);
            let parsed: u16 = endian.parse(bytes);
            assert_eq!(parsed, 0x1234);

            let bytes: [u8; 8] = endian.to_bytes(1.5f64);
            let parsed: f64 = endian.parse(bytes);
            assert_eq!(parsed, 1.5);

            let bytes: [u8; 4] = endian.to_bytes(-2147483647i32);
            let parsed: i32 = endian.parse(bytes);
            assert_eq!(parsed, -2147483647);
        }
    }

    #[test]
    fn orders_differ() {
        let big: [u8; 4] = Endian::Big.to_bytes(1u32);
        let little: [u8; 4] = Endian::Little.to_bytes(1u32);
        assert_eq!(big, [0, 0, 0, 1]);
        assert_eq!(little, [1, 0, 0, 0]);
    }
}
