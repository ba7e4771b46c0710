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

//! # readstata
//!
//! A reader and writer for Stata `.dta` data files.
//!
//! The `.dta` format is Stata's native binary dataset format.  It has gone
//! through many revisions since Stata 1; each revision is identified by an
//! integer "release" written at the start of the file.  This crate reads and
//! writes releases 102 through 118, which covers Stata 2 through Stata 15:
//!
//! - Releases 102 through 115 are positional: a fixed binary header followed
//!   by fixed-width metadata tables, the data matrix, and value-label
//!   records.
//!
//! - Releases 117 and 118 frame every section in literal ASCII tags
//!   (`<stata_dta>`, `<header>`, `<data>`, ...) and add long out-of-band
//!   strings ("strLs").
//!
//! Releases 109 and 116 were never shipped by Stata and are rejected.
//!
//! To read a file, start with [dta::ReadOptions]; to write one, with
//! [dta::WriteOptions].  Both exchange a [dataset::Dataset], an in-memory
//! value holding the dataset label, typed columns, value-label sets,
//! characteristics, and the strL pool.

pub mod dataset;
pub mod dta;
pub mod endian;
pub mod missing;
