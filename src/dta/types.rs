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

//! Translating on-disk variable type codes to and from [VarType].
//!
//! Three codings exist across the release family; which one a file uses is a
//! field of its [Profile](super::version::Profile).  Decoding is total over
//! the codes Stata can emit, and encoding picks the single canonical code,
//! so a decoded type re-encodes to the byte it came from.

use crate::dataset::VarType;

use super::{version::TypeCoding, Error};

/// Decodes an on-disk type code.  For the one-byte codings the caller
/// passes the byte widened to `u16`.
pub fn decode(coding: TypeCoding, code: u16) -> Result<VarType, Error> {
    let decoded = match coding {
        TypeCoding::Ascii => match code {
            b @ 0x80..=0xff => Some(VarType::FixedStr(b - 127)),
            b => match b as u8 {
                b'b' => Some(VarType::Byte),
                b'i' => Some(VarType::ShortInt),
                b'l' => Some(VarType::Int),
                b'f' => Some(VarType::Float),
                b'd' => Some(VarType::Double),
                _ => None,
            },
        },
        TypeCoding::U8 => match code {
            251 => Some(VarType::Byte),
            252 => Some(VarType::ShortInt),
            253 => Some(VarType::Int),
            254 => Some(VarType::Float),
            255 => Some(VarType::Double),
            len @ 1..=244 => Some(VarType::FixedStr(len)),
            _ => None,
        },
        TypeCoding::U16 => match code {
            65530 => Some(VarType::Byte),
            65529 => Some(VarType::ShortInt),
            65528 => Some(VarType::Int),
            65527 => Some(VarType::Float),
            65526 => Some(VarType::Double),
            32768 => Some(VarType::StrL),
            len @ 1..=2045 => Some(VarType::FixedStr(len)),
            _ => None,
        },
    };
    decoded.ok_or_else(|| Error::InconsistentCounts {
        which: format!("variable type code {code}"),
    })
}

/// Encodes `ty` in `coding`, or `None` if the coding cannot represent it.
/// `max_str` is the longest fixed string the target release allows.
pub fn encode(coding: TypeCoding, max_str: u16, ty: VarType) -> Option<u16> {
    match coding {
        TypeCoding::Ascii => match ty {
            VarType::Byte => Some(b'b' as u16),
            VarType::ShortInt => Some(b'i' as u16),
            VarType::Int => Some(b'l' as u16),
            VarType::Float => Some(b'f' as u16),
            VarType::Double => Some(b'd' as u16),
            VarType::FixedStr(len) if (1..=max_str.min(128)).contains(&len) => Some(len + 127),
            VarType::FixedStr(_) | VarType::StrL => None,
        },
        TypeCoding::U8 => match ty {
            VarType::Byte => Some(251),
            VarType::ShortInt => Some(252),
            VarType::Int => Some(253),
            VarType::Float => Some(254),
            VarType::Double => Some(255),
            VarType::FixedStr(len) if (1..=max_str.min(244)).contains(&len) => Some(len),
            VarType::FixedStr(_) | VarType::StrL => None,
        },
        TypeCoding::U16 => match ty {
            VarType::Byte => Some(65530),
            VarType::ShortInt => Some(65529),
            VarType::Int => Some(65528),
            VarType::Float => Some(65527),
            VarType::Double => Some(65526),
            VarType::FixedStr(len) if (1..=max_str).contains(&len) => Some(len),
            VarType::FixedStr(_) => None,
            VarType::StrL => Some(32768),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERICS: [VarType; 5] = [
        VarType::Byte,
        VarType::ShortInt,
        VarType::Int,
        VarType::Float,
        VarType::Double,
    ];

    #[test]
    fn numeric_codes() {
        assert_eq!(decode(TypeCoding::Ascii, b'd' as u16).unwrap(), VarType::Double);
        assert_eq!(decode(TypeCoding::U8, 251).unwrap(), VarType::Byte);
        assert_eq!(decode(TypeCoding::U16, 65528).unwrap(), VarType::Int);
        assert_eq!(decode(TypeCoding::U16, 32768).unwrap(), VarType::StrL);
    }

    #[test]
    fn string_codes() {
        assert_eq!(
            decode(TypeCoding::Ascii, 128).unwrap(),
            VarType::FixedStr(1)
        );
        assert_eq!(
            decode(TypeCoding::Ascii, 255).unwrap(),
            VarType::FixedStr(128)
        );
        assert_eq!(decode(TypeCoding::U8, 244).unwrap(), VarType::FixedStr(244));
        assert_eq!(
            decode(TypeCoding::U16, 2045).unwrap(),
            VarType::FixedStr(2045)
        );
    }

    #[test]
    fn invalid_codes_rejected() {
        assert!(decode(TypeCoding::Ascii, b'x' as u16).is_err());
        assert!(decode(TypeCoding::U8, 0).is_err());
        assert!(decode(TypeCoding::U8, 250).is_err());
        assert!(decode(TypeCoding::U16, 0).is_err());
        assert!(decode(TypeCoding::U16, 2046).is_err());
        assert!(decode(TypeCoding::U16, 65531).is_err());
    }

    #[test]
    fn round_trips() {
        for coding in [TypeCoding::Ascii, TypeCoding::U8, TypeCoding::U16] {
            let max_str = match coding {
                TypeCoding::Ascii => 128,
                TypeCoding::U8 => 244,
                TypeCoding::U16 => 2045,
            };
            for ty in NUMERICS {
                let code = encode(coding, max_str, ty).unwrap();
                assert_eq!(decode(coding, code).unwrap(), ty);
            }
            for len in [1, 2, max_str] {
                let ty = VarType::FixedStr(len);
                let code = encode(coding, max_str, ty).unwrap();
                assert_eq!(decode(coding, code).unwrap(), ty);
            }
        }
    }

    #[test]
    fn unrepresentable_types() {
        assert_eq!(encode(TypeCoding::Ascii, 128, VarType::StrL), None);
        assert_eq!(encode(TypeCoding::U8, 244, VarType::StrL), None);
        assert_eq!(encode(TypeCoding::Ascii, 128, VarType::FixedStr(129)), None);
        assert_eq!(encode(TypeCoding::U8, 244, VarType::FixedStr(245)), None);
        assert_eq!(encode(TypeCoding::U16, 2045, VarType::FixedStr(2046)), None);
        assert_eq!(
            encode(TypeCoding::U16, 2045, VarType::StrL),
            Some(32768)
        );
    }
}
