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

//! The family of `.dta` releases and their layout constants.
//!
//! Every release-specific size and framing decision is a field of [Profile];
//! the reader and writer never branch on the release directly except to
//! choose between the positional (≤115) and tagged (≥117) header forms.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use super::Error;

/// A supported `.dta` format release.
///
/// Stata never shipped releases 109 or 116; those and anything else outside
/// this set fail with [Error::UnsupportedRelease].
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Release {
    /// Stata 2.
    V102,
    /// Stata 3.
    V103,
    /// Stata 4.
    V104,
    /// Stata 5.
    V105,
    /// Stata 6 (intermediate).
    V106,
    /// Stata 6 (intermediate).
    V107,
    /// Stata 6.
    V108,
    /// Stata 7.
    V110,
    /// Stata 7 SE.
    V111,
    /// Stata 8 (intermediate).
    V112,
    /// Stata 8.
    V113,
    /// Stata 9 and 10.
    V114,
    /// Stata 12.
    V115,
    /// Stata 13.
    V117,
    /// Stata 14 and 15.
    V118,
}

impl Release {
    /// All supported releases, in ascending order.
    pub const ALL: [Release; 15] = [
        Release::V102,
        Release::V103,
        Release::V104,
        Release::V105,
        Release::V106,
        Release::V107,
        Release::V108,
        Release::V110,
        Release::V111,
        Release::V112,
        Release::V113,
        Release::V114,
        Release::V115,
        Release::V117,
        Release::V118,
    ];

    /// The release number as written to the file.
    pub const fn as_u8(self) -> u8 {
        match self {
            Release::V102 => 102,
            Release::V103 => 103,
            Release::V104 => 104,
            Release::V105 => 105,
            Release::V106 => 106,
            Release::V107 => 107,
            Release::V108 => 108,
            Release::V110 => 110,
            Release::V111 => 111,
            Release::V112 => 112,
            Release::V113 => 113,
            Release::V114 => 114,
            Release::V115 => 115,
            Release::V117 => 117,
            Release::V118 => 118,
        }
    }

    /// Whether files of this release are framed in ASCII tags.
    pub fn tagged(self) -> bool {
        self >= Release::V117
    }

    /// This release's layout constants.
    pub fn profile(self) -> Profile {
        match self {
            Release::V102 => Profile {
                datalabel: DataLabel::Fixed(30),
                has_timestamp: false,
                varname_len: 9,
                format_len: 7,
                vallabel_name_len: 9,
                varlabel_len: 32,
                labelset_name_len: None,
                wide_n: false,
                type_coding: TypeCoding::Ascii,
                char_len_width: None,
                max_str: 128,
            },
            Release::V103 | Release::V104 => Profile {
                datalabel: DataLabel::Fixed(32),
                ..Release::V102.profile()
            },
            Release::V105 => Profile {
                datalabel: DataLabel::Fixed(32),
                has_timestamp: true,
                varname_len: 9,
                format_len: 12,
                vallabel_name_len: 9,
                varlabel_len: 32,
                labelset_name_len: None,
                wide_n: false,
                type_coding: TypeCoding::Ascii,
                char_len_width: Some(CharLenWidth::U16),
                max_str: 128,
            },
            Release::V106 => Profile {
                labelset_name_len: Some(9),
                ..Release::V105.profile()
            },
            Release::V107 | Release::V108 => Profile {
                datalabel: DataLabel::Fixed(81),
                varlabel_len: 81,
                labelset_name_len: Some(9),
                ..Release::V105.profile()
            },
            Release::V110 | Release::V112 => Profile {
                datalabel: DataLabel::Fixed(81),
                has_timestamp: true,
                varname_len: 33,
                format_len: 12,
                vallabel_name_len: 33,
                varlabel_len: 81,
                labelset_name_len: Some(33),
                wide_n: false,
                type_coding: TypeCoding::Ascii,
                char_len_width: Some(CharLenWidth::U32),
                max_str: 128,
            },
            Release::V111 | Release::V113 => Profile {
                type_coding: TypeCoding::U8,
                max_str: 244,
                ..Release::V110.profile()
            },
            Release::V114 | Release::V115 => Profile {
                format_len: 49,
                type_coding: TypeCoding::U8,
                max_str: 244,
                ..Release::V110.profile()
            },
            Release::V117 => Profile {
                datalabel: DataLabel::PrefixU8,
                has_timestamp: true,
                varname_len: 33,
                format_len: 49,
                vallabel_name_len: 33,
                varlabel_len: 81,
                labelset_name_len: Some(33),
                wide_n: false,
                type_coding: TypeCoding::U16,
                char_len_width: Some(CharLenWidth::U32),
                max_str: 2045,
            },
            Release::V118 => Profile {
                datalabel: DataLabel::PrefixU16,
                varname_len: 129,
                format_len: 57,
                vallabel_name_len: 129,
                varlabel_len: 321,
                labelset_name_len: Some(129),
                wide_n: true,
                ..Release::V117.profile()
            },
        }
    }
}

impl TryFrom<u8> for Release {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Release::ALL
            .into_iter()
            .find(|release| release.as_u8() == value)
            .ok_or(Error::UnsupportedRelease(value as u16))
    }
}

impl From<Release> for u8 {
    fn from(release: Release) -> Self {
        release.as_u8()
    }
}

impl Display for Release {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.as_u8())
    }
}

/// How the dataset label is stored in the header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataLabel {
    /// Fixed-width NUL-padded field of the given size.
    Fixed(usize),

    /// `u8` length prefix followed by that many bytes (release 117).
    PrefixU8,

    /// `u16` length prefix followed by that many bytes (release 118).
    PrefixU16,
}

impl DataLabel {
    /// The longest label this form can store.
    pub fn max_len(self) -> usize {
        match self {
            Self::Fixed(len) => len,
            Self::PrefixU8 => 80,
            Self::PrefixU16 => 320,
        }
    }
}

/// How variable types are coded on disk.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeCoding {
    /// One ASCII byte: `b`/`i`/`l`/`f`/`d`, or `128 + len` for fixed
    /// strings (releases 102-110 and 112).
    Ascii,

    /// One byte: 251-255 for the numeric types, or the string length
    /// (releases 111 and 113-115).
    U8,

    /// Two bytes: 65526-65530 for the numeric types, 32768 for strL, or
    /// the string length (releases 117 and 118).
    U16,
}

/// Width of the length field in a characteristics record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CharLenWidth {
    /// Releases 105-108.
    U16,

    /// Release 110 and later.
    U32,
}

/// Width of the varname and charname fields inside a characteristics
/// record.  The same for every release that has the block, even the ones
/// whose schema varnames are 9 bytes.
pub const CHAR_NAME_LEN: usize = 33;

/// Layout constants for one release.
///
/// All string lengths are on-disk byte widths; the in-memory string is the
/// field's prefix up to the first NUL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// How the dataset label is stored.
    pub datalabel: DataLabel,

    /// Whether the positional header carries an 18-byte timestamp field.
    /// (Tagged headers always carry a length-prefixed one.)
    pub has_timestamp: bool,

    /// Width of a variable name field.
    pub varname_len: usize,

    /// Width of a display format field.
    pub format_len: usize,

    /// Width of a per-variable value-label name field.
    pub vallabel_name_len: usize,

    /// Width of a variable label field.
    pub varlabel_len: usize,

    /// Width of a label-set name in a value-label record, or `None` for
    /// releases without a value-label block (before 106).
    pub labelset_name_len: Option<usize>,

    /// Whether the observation count is a `u64` (release 118) rather than a
    /// `u32`.
    pub wide_n: bool,

    /// How variable types are coded.
    pub type_coding: TypeCoding,

    /// Width of the record-length field in the characteristics block, or
    /// `None` for releases without one (before 105).
    pub char_len_width: Option<CharLenWidth>,

    /// Longest representable fixed-width string.
    pub max_str: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_releases_rejected() {
        for value in [0, 100, 101, 109, 116, 119, 255] {
            assert!(matches!(
                Release::try_from(value),
                Err(Error::UnsupportedRelease(found)) if found == value as u16
            ));
        }
    }

    #[test]
    fn all_releases_round_trip_through_u8() {
        for release in Release::ALL {
            assert_eq!(Release::try_from(release.as_u8()).unwrap(), release);
        }
    }

    #[test]
    fn tagged_split() {
        assert!(!Release::V115.tagged());
        assert!(Release::V117.tagged());
        assert!(Release::V118.tagged());
    }

    #[test]
    fn profile_spot_checks() {
        let p = Release::V102.profile();
        assert_eq!(p.datalabel, DataLabel::Fixed(30));
        assert!(!p.has_timestamp);
        assert_eq!(p.char_len_width, None);
        assert_eq!(p.labelset_name_len, None);

        let p = Release::V108.profile();
        assert_eq!(p.datalabel, DataLabel::Fixed(81));
        assert_eq!(p.varname_len, 9);
        assert_eq!(p.char_len_width, Some(CharLenWidth::U16));
        assert_eq!(p.labelset_name_len, Some(9));

        let p = Release::V115.profile();
        assert_eq!(p.varname_len, 33);
        assert_eq!(p.format_len, 49);
        assert_eq!(p.type_coding, TypeCoding::U8);
        assert_eq!(p.max_str, 244);

        let p = Release::V118.profile();
        assert_eq!(p.datalabel, DataLabel::PrefixU16);
        assert_eq!(p.varname_len, 129);
        assert_eq!(p.format_len, 57);
        assert_eq!(p.varlabel_len, 321);
        assert!(p.wide_n);
        assert_eq!(p.type_coding, TypeCoding::U16);
    }

    #[test]
    fn ascii_coded_releases() {
        for release in [Release::V110, Release::V112] {
            assert_eq!(release.profile().type_coding, TypeCoding::Ascii);
        }
        for release in [Release::V111, Release::V113] {
            assert_eq!(release.profile().type_coding, TypeCoding::U8);
        }
    }
}
