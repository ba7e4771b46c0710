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

//! Reading and writing `.dta` files.
//!
//! One reader and one writer cover every supported release; the differences
//! between releases live in [version::Profile], a table of per-release
//! layout constants.  Release 117 and later files additionally frame each
//! section in literal ASCII tags, which the reader verifies and the writer
//! emits around the same section code the positional releases use.
//!
//! To read a file in the simplest way, use [ReadOptions].

// Warn about missing docs, but not for items declared with `#[cfg(test)]`.
#![cfg_attr(not(test), warn(missing_docs))]

mod read;
pub use read::*;
mod write;
pub use write::*;
pub mod types;
pub mod version;

#[cfg(test)]
mod test;

use std::io::Error as IoError;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::endian::Endian;

/// Everything that can go wrong reading or writing a `.dta` file.
///
/// No error is recoverable: the reader abandons the partially built dataset
/// and the writer leaves a partial file behind (the input file is never
/// touched on the write path).
#[derive(ThisError, Debug)]
pub enum Error {
    /// The file declares a release this crate does not support.  Releases
    /// 109 and 116 were never shipped by Stata and always land here.
    #[error("Unsupported release {0}")]
    UnsupportedRelease(u16),

    /// The byte-order field is neither `LSF`/`MSF` nor the code 1 or 2.
    #[error("Unsupported byte order {0:?}")]
    UnsupportedByteOrder(String),

    /// A framing tag in a release ≥117 file is missing or different.
    #[error("At offset {position:#x}, expected tag `{expected}` but found {found:?}")]
    MalformedTag {
        /// The tag that should appear at `position`.
        expected: &'static str,
        /// The bytes actually found.
        found: Vec<u8>,
        /// File offset of the first mismatched byte run.
        position: u64,
    },

    /// The file ended in the middle of a section.
    #[error("Unexpected end of file at offset {position:#x} in {section}")]
    TruncatedInput {
        /// The section being read when input ran out.
        section: &'static str,
        /// File offset at which the short read happened.
        position: u64,
    },

    /// A count or size field contradicts the rest of the file.
    #[error("Inconsistent counts: {which}")]
    InconsistentCounts {
        /// Description of the contradiction.
        which: String,
    },

    /// On write, a column's type has no encoding in the target release.
    #[error("Release {release} cannot represent column {name:?} of type {ty}")]
    UnrepresentableType {
        /// The release being written.
        release: u8,
        /// The offending column.
        name: String,
        /// The column's type, e.g. `strL` or `str2045`.
        ty: String,
    },

    /// The dataset violates an invariant of the in-memory model.
    #[error("Dataset fails invariant: {detail}")]
    SchemaViolation {
        /// Description of the violated invariant.
        detail: String,
    },

    /// An underlying read or write failed.
    #[error("I/O error ({0})")]
    Io(#[from] IoError),
}

/// File byte order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least significant first (little-endian); `LSF` on disk.
    Lsf,

    /// Most significant first (big-endian); `MSF` on disk.
    Msf,
}

impl ByteOrder {
    /// The host's byte order.
    pub fn host() -> Self {
        if cfg!(target_endian = "big") {
            Self::Msf
        } else {
            Self::Lsf
        }
    }

    /// The [Endian] used to parse and emit all multi-byte fields.
    pub fn endian(self) -> Endian {
        match self {
            Self::Lsf => Endian::Little,
            Self::Msf => Endian::Big,
        }
    }

    /// The 3-byte token used in release ≥117 headers.
    pub fn token(self) -> &'static [u8; 3] {
        match self {
            Self::Lsf => b"LSF",
            Self::Msf => b"MSF",
        }
    }

    /// The code byte used in release ≤115 headers (1 = MSF, 2 = LSF).
    pub fn code(self) -> u8 {
        match self {
            Self::Lsf => 2,
            Self::Msf => 1,
        }
    }
}
