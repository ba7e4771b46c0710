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

//! Stata's encoding of missing numeric values.
//!
//! Stata reserves the top of each numeric type's range for missing values:
//! the system missing value `.` and the 26 extended missing values `.a`
//! through `.z`.  Everything strictly outside the per-type in-range window
//! below is some flavor of missing.  This crate folds the whole reserved
//! range to one host-side marker, `None`, and writes `None` back as the
//! canonical `.` sentinel; the reader can be asked to preserve raw sentinel
//! values instead (see [crate::dta::ReadOptions]).
//!
//! Negative infinity in a `float` or `double` cell is treated as an ordinary
//! in-range value and passed through.

/// Smallest in-range `byte` value.
pub const BYTE_MIN: i8 = -127;
/// Largest in-range `byte` value.
pub const BYTE_MAX: i8 = 100;
/// Sentinel written for a missing `byte` cell.
pub const BYTE_NA: i8 = 101;

/// Smallest in-range `int` value.
pub const SHORT_MIN: i16 = -32767;
/// Largest in-range `int` value.
pub const SHORT_MAX: i16 = 32740;
/// Sentinel written for a missing `int` cell.
pub const SHORT_NA: i16 = 32741;

/// Smallest in-range `long` value.
pub const INT_MIN: i32 = -2147483647;
/// Largest in-range `long` value.
pub const INT_MAX: i32 = 2147483620;
/// Sentinel written for a missing `long` cell, release 111 and later.
pub const INT_NA: i32 = 2147483621;
/// Sentinel written for a missing `long` cell before release 111.
pub const INT_NA_OLD: i32 = i32::MAX;

/// Largest in-range `float` value, `(2 - 2⁻²³)·2¹²⁶`.
pub const FLOAT_MAX: f32 = f32::from_bits(0x7eff_ffff);
/// Smallest in-range `float` value.
pub const FLOAT_MIN: f32 = -FLOAT_MAX;
/// Sentinel written for a missing `float` cell, `2¹²⁷`.
pub const FLOAT_NA: f32 = f32::from_bits(0x7f00_0000);

/// Largest in-range `double` value, `(2 - 2⁻⁵²)·2¹⁰²²`.
pub const DOUBLE_MAX: f64 = f64::from_bits(0x7fdf_ffff_ffff_ffff);
/// Smallest in-range `double` value.
pub const DOUBLE_MIN: f64 = -DOUBLE_MAX;
/// Sentinel written for a missing `double` cell, `2¹⁰²³`.
pub const DOUBLE_NA: f64 = f64::from_bits(0x7fe0_0000_0000_0000);

/// Interprets an on-disk `byte` value.  Returns `None` for values in the
/// reserved missing range unless `preserve` is set.
pub fn decode_byte(value: i8, preserve: bool) -> Option<i8> {
    if !preserve && !(BYTE_MIN..=BYTE_MAX).contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Interprets an on-disk `int` value.
pub fn decode_short(value: i16, preserve: bool) -> Option<i16> {
    if !preserve && !(SHORT_MIN..=SHORT_MAX).contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Interprets an on-disk `long` value.
pub fn decode_int(value: i32, preserve: bool) -> Option<i32> {
    if !preserve && !(INT_MIN..=INT_MAX).contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Interprets an on-disk `float` value.
pub fn decode_float(value: f32, preserve: bool) -> Option<f32> {
    if !preserve && value != f32::NEG_INFINITY && !(FLOAT_MIN..=FLOAT_MAX).contains(&value) {
        None
    } else {
        Some(value)
    }
}

/// Interprets an on-disk `double` value.
pub fn decode_double(value: f64, preserve: bool) -> Option<f64> {
    if !preserve && value != f64::NEG_INFINITY && !(DOUBLE_MIN..=DOUBLE_MAX).contains(&value) {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows() {
        assert_eq!(decode_byte(100, false), Some(100));
        assert_eq!(decode_byte(101, false), None);
        assert_eq!(decode_byte(-127, false), Some(-127));
        assert_eq!(decode_byte(-128, false), None);

        assert_eq!(decode_short(32740, false), Some(32740));
        assert_eq!(decode_short(32741, false), None);

        assert_eq!(decode_int(2147483620, false), Some(2147483620));
        assert_eq!(decode_int(2147483621, false), None);
        assert_eq!(decode_int(i32::MIN, false), None);
    }

    #[test]
    fn preserved_sentinels() {
        assert_eq!(decode_byte(101, true), Some(101));
        assert_eq!(decode_int(INT_NA, true), Some(INT_NA));
        assert_eq!(decode_double(DOUBLE_NA, true), Some(DOUBLE_NA));
    }

    #[test]
    fn float_window() {
        assert_eq!(decode_float(1.5, false), Some(1.5));
        assert_eq!(decode_float(FLOAT_MAX, false), Some(FLOAT_MAX));
        assert_eq!(decode_float(FLOAT_NA, false), None);
        assert_eq!(decode_double(DOUBLE_MAX, false), Some(DOUBLE_MAX));
        assert_eq!(decode_double(DOUBLE_NA, false), None);

        // Both `.` sentinels sit above their windows, so a written missing
        // cell reads back as missing.
        assert!(FLOAT_NA > FLOAT_MAX);
        assert!(DOUBLE_NA > DOUBLE_MAX);
    }

    #[test]
    fn negative_infinity_is_in_range() {
        assert_eq!(
            decode_float(f32::NEG_INFINITY, false),
            Some(f32::NEG_INFINITY)
        );
        assert_eq!(
            decode_double(f64::NEG_INFINITY, false),
            Some(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn nan_is_missing() {
        assert_eq!(decode_double(f64::NAN, false), None);
    }

    #[test]
    fn sentinel_bit_patterns() {
        // `.` for doubles is 2¹⁰²³: bytes 00 00 00 00 00 00 e0 7f in LSF.
        assert_eq!(DOUBLE_NA.to_le_bytes(), [0, 0, 0, 0, 0, 0, 0xe0, 0x7f]);
        assert_eq!(FLOAT_NA.to_le_bytes(), [0, 0, 0, 0x7f]);
    }
}
