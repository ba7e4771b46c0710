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

//! The in-memory form of a Stata dataset.
//!
//! [Dataset] is the value exchanged with host bindings: the reader produces
//! one, the writer consumes one.  It is a plain tree of owned data with
//! `serde` derives throughout, so bindings can marshal it without knowing
//! anything about the on-disk layout.

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt::{Display, Formatter, Result as FmtResult},
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::dta::{version::Release, ByteOrder, Error};

/// The type of one column, uniform across all supported releases.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarType {
    /// 1-byte signed integer.
    Byte,

    /// 2-byte signed integer (Stata `int`).
    ShortInt,

    /// 4-byte signed integer (Stata `long`).
    Int,

    /// 4-byte IEEE float.
    Float,

    /// 8-byte IEEE double.
    Double,

    /// Fixed-width string of the given byte length, NUL-padded on disk.
    ///
    /// The length must be between 1 and 2045; how much of that range a given
    /// release can encode depends on its type coding.
    FixedStr(u16),

    /// Long string stored out-of-band in the strL pool, release 117 and
    /// later.
    StrL,
}

impl VarType {
    /// Number of bytes one cell of this type occupies in the data section.
    pub fn width(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::ShortInt => 2,
            Self::Int => 4,
            Self::Float => 4,
            Self::Double => 8,
            Self::FixedStr(len) => len as usize,
            Self::StrL => 8,
        }
    }
}

impl Display for VarType {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Byte => write!(f, "byte"),
            Self::ShortInt => write!(f, "int"),
            Self::Int => write!(f, "long"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::FixedStr(len) => write!(f, "str{len}"),
            Self::StrL => write!(f, "strL"),
        }
    }
}

/// Reference from a data cell to an entry in the strL pool.
///
/// `v` and `o` are the 1-based column and observation indexes Stata assigned
/// when it created the entry.  `(0, 0)` is the canonical reference for an
/// empty string and resolves without a pool entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrLRef {
    pub v: i32,
    pub o: i32,
}

impl StrLRef {
    /// The reference for the empty string.
    pub const EMPTY: StrLRef = StrLRef { v: 0, o: 0 };

    /// Whether this is the empty-string reference.
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }
}

impl Display for StrLRef {
    /// Formats the reference as the 20-digit decimal identifier Stata uses
    /// to name strLs.
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{:010}{:010}", self.v, self.o)
    }
}

/// How a strL payload is stored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrLFormat {
    /// Raw binary, exactly the payload bytes (on-disk `t` = 129).
    Binary,

    /// Text including one trailing NUL (on-disk `t` = 130).
    Text,
}

impl StrLFormat {
    /// The on-disk `t` flag.
    pub fn code(self) -> u8 {
        match self {
            Self::Binary => 129,
            Self::Text => 130,
        }
    }
}

/// One entry in the strL pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrLEntry {
    /// The `(v, o)` key data cells refer to this entry by.
    pub r#ref: StrLRef,

    /// Whether the payload is text or raw binary.
    pub format: StrLFormat,

    /// Payload bytes; for [StrLFormat::Text] this includes the trailing NUL.
    pub payload: Vec<u8>,
}

impl StrLEntry {
    /// The payload as text, with the trailing NUL stripped for text entries.
    pub fn text(&self) -> Cow<str> {
        let bytes = match self.format {
            StrLFormat::Text => self.payload.strip_suffix(&[0]).unwrap_or(&self.payload),
            StrLFormat::Binary => &self.payload,
        };
        String::from_utf8_lossy(bytes)
    }
}

/// Column cells, physically typed to match the column's [VarType].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Cells {
    /// Cells of a [VarType::Byte] column; `None` is missing.
    Byte(Vec<Option<i8>>),

    /// Cells of a [VarType::ShortInt] column.
    ShortInt(Vec<Option<i16>>),

    /// Cells of a [VarType::Int] column.
    Int(Vec<Option<i32>>),

    /// Cells of a [VarType::Float] column.
    Float(Vec<Option<f32>>),

    /// Cells of a [VarType::Double] column.
    Double(Vec<Option<f64>>),

    /// Cells of a [VarType::FixedStr] column, trimmed at the first NUL.
    FixedStr(Vec<String>),

    /// Cells of a [VarType::StrL] column.
    StrL(Vec<StrLRef>),
}

impl Cells {
    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::ShortInt(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::FixedStr(v) => v.len(),
            Self::StrL(v) => v.len(),
        }
    }

    /// Whether there are no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty cell vector matching `ty`, with room for `n` cells.
    pub fn for_type(ty: VarType, n: usize) -> Self {
        match ty {
            VarType::Byte => Self::Byte(Vec::with_capacity(n)),
            VarType::ShortInt => Self::ShortInt(Vec::with_capacity(n)),
            VarType::Int => Self::Int(Vec::with_capacity(n)),
            VarType::Float => Self::Float(Vec::with_capacity(n)),
            VarType::Double => Self::Double(Vec::with_capacity(n)),
            VarType::FixedStr(_) => Self::FixedStr(Vec::with_capacity(n)),
            VarType::StrL => Self::StrL(Vec::with_capacity(n)),
        }
    }

    fn matches(&self, ty: VarType) -> bool {
        matches!(
            (self, ty),
            (Self::Byte(_), VarType::Byte)
                | (Self::ShortInt(_), VarType::ShortInt)
                | (Self::Int(_), VarType::Int)
                | (Self::Float(_), VarType::Float)
                | (Self::Double(_), VarType::Double)
                | (Self::FixedStr(_), VarType::FixedStr(_))
                | (Self::StrL(_), VarType::StrL)
        )
    }
}

/// One column: its schema entries and its cells.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Variable name.  Must be non-empty and unique within the dataset.
    pub name: String,

    /// Display format, e.g. `%9.0g`.  Not interpreted by this crate.
    pub format: String,

    /// Name of the value-label set attached to this column, or empty.
    pub value_label_name: String,

    /// Variable label, or empty.
    pub label: String,

    /// The column type.
    pub ty: VarType,

    /// The cells, one per observation.
    pub cells: Cells,
}

impl Column {
    /// A column named `name` of type `ty` with no cells and empty metadata.
    pub fn new(name: impl Into<String>, ty: VarType) -> Self {
        Self {
            name: name.into(),
            format: String::new(),
            value_label_name: String::new(),
            label: String::new(),
            ty,
            cells: Cells::for_type(ty, 0),
        }
    }
}

/// A named mapping from integer codes to label text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    /// The set's name, referred to by [Column::value_label_name].
    pub name: String,

    /// Code-to-label entries.  Kept in code order; the on-disk text buffer
    /// may store labels in any order and is canonicalized on write.
    pub entries: BTreeMap<i32, String>,
}

impl LabelSet {
    /// An empty label set named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }
}

/// A free-form `(variable, name, contents)` annotation.
///
/// Stata calls these characteristics (release 117 and later) or expansion
/// fields.  Contents are kept as raw bytes, trailing NUL included, so a
/// file's characteristics block round-trips byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    /// The variable this characteristic annotates (or `_dta` for the
    /// dataset itself).
    pub var: String,

    /// The characteristic's name.
    pub name: String,

    /// Raw contents, NUL-terminated.
    pub contents: Vec<u8>,
}

impl Characteristic {
    /// A characteristic with text contents; appends the on-disk NUL.
    pub fn new(var: impl Into<String>, name: impl Into<String>, text: &str) -> Self {
        let mut contents = text.as_bytes().to_vec();
        contents.push(0);
        Self {
            var: var.into(),
            name: name.into(),
            contents,
        }
    }

    /// The contents as text, trailing NUL stripped.
    pub fn text(&self) -> Cow<str> {
        let bytes = self.contents.strip_suffix(&[0]).unwrap_or(&self.contents);
        String::from_utf8_lossy(bytes)
    }
}

/// An in-memory Stata dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// The release the dataset was read from, and the default release it
    /// will be written as.
    pub release: Release,

    /// The byte order the dataset was read from, and the default byte order
    /// it will be written in.
    pub byte_order: ByteOrder,

    /// Dataset label, or empty.
    pub label: String,

    /// Timestamp in Stata's 17-byte `dd Mon yyyy hh:mm` form, or empty.
    pub timestamp: String,

    /// The columns, in dictionary order.
    pub columns: Vec<Column>,

    /// Value-label sets.
    pub label_sets: Vec<LabelSet>,

    /// Characteristics, in on-disk order.
    pub characteristics: Vec<Characteristic>,

    /// The strL pool (release 117 and later).
    pub strls: Vec<StrLEntry>,
}

impl Dataset {
    /// An empty dataset for `release` in the host byte order.
    pub fn new(release: Release) -> Self {
        Self {
            release,
            byte_order: ByteOrder::host(),
            label: String::new(),
            timestamp: String::new(),
            columns: Vec::new(),
            label_sets: Vec::new(),
            characteristics: Vec::new(),
            strls: Vec::new(),
        }
    }

    /// Number of observations.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Looks up the strL pool entry for `r#ref`, if any.
    pub fn strl(&self, r#ref: StrLRef) -> Option<&StrLEntry> {
        self.strls.iter().find(|entry| entry.r#ref == r#ref)
    }

    /// Resolves a strL reference to its text, with `(0, 0)` resolving to the
    /// empty string.
    pub fn strl_text(&self, r#ref: StrLRef) -> Option<Cow<str>> {
        if r#ref.is_empty() {
            Some(Cow::from(""))
        } else {
            self.strl(r#ref).map(StrLEntry::text)
        }
    }

    /// Checks the invariants every dataset must satisfy before it can be
    /// written: equal column lengths, well-formed types, unique non-empty
    /// variable names, unique label-set names, and a strL pool in which
    /// every referenced `(v, o)` key appears exactly once.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.columns.iter().map(|c| c.cells.len()).all_equal() {
            return Err(Error::SchemaViolation {
                detail: "columns have differing cell counts".into(),
            });
        }

        for column in &self.columns {
            if column.name.is_empty() {
                return Err(Error::SchemaViolation {
                    detail: "empty variable name".into(),
                });
            }
            if !column.cells.matches(column.ty) {
                return Err(Error::SchemaViolation {
                    detail: format!(
                        "column {:?} has type {} but cells of another type",
                        column.name, column.ty
                    ),
                });
            }
            if let VarType::FixedStr(len) = column.ty {
                if !(1..=2045).contains(&len) {
                    return Err(Error::SchemaViolation {
                        detail: format!("column {:?} has invalid type str{len}", column.name),
                    });
                }
            }
        }

        if let Some(name) = self.columns.iter().map(|c| &c.name).duplicates().next() {
            return Err(Error::SchemaViolation {
                detail: format!("duplicate variable name {name:?}"),
            });
        }
        if let Some(name) = self.label_sets.iter().map(|s| &s.name).duplicates().next() {
            return Err(Error::SchemaViolation {
                detail: format!("duplicate label-set name {name:?}"),
            });
        }

        let mut pool = HashMap::new();
        for entry in &self.strls {
            if pool.insert(entry.r#ref, entry).is_some() {
                return Err(Error::SchemaViolation {
                    detail: format!("duplicate strL pool entry {}", entry.r#ref),
                });
            }
        }
        for column in &self.columns {
            if let Cells::StrL(refs) = &column.cells {
                for r#ref in refs {
                    if !r#ref.is_empty() && !pool.contains_key(r#ref) {
                        return Err(Error::SchemaViolation {
                            detail: format!(
                                "column {:?} refers to strL {} which is not in the pool",
                                column.name, r#ref
                            ),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_column_dataset() -> Dataset {
        let mut dataset = Dataset::new(Release::V115);
        let mut a = Column::new("a", VarType::Byte);
        a.cells = Cells::Byte(vec![Some(1), None]);
        let mut b = Column::new("b", VarType::FixedStr(3));
        b.cells = Cells::FixedStr(vec!["x".into(), "yz".into()]);
        dataset.columns = vec![a, b];
        dataset
    }

    #[test]
    fn valid_dataset_passes() {
        two_column_dataset().validate().unwrap();
    }

    #[test]
    fn ragged_columns_fail() {
        let mut dataset = two_column_dataset();
        if let Cells::Byte(cells) = &mut dataset.columns[0].cells {
            cells.pop();
        }
        assert!(matches!(
            dataset.validate(),
            Err(Error::SchemaViolation { .. })
        ));
    }

    #[test]
    fn duplicate_names_fail() {
        let mut dataset = two_column_dataset();
        dataset.columns[1].name = "a".into();
        assert!(matches!(
            dataset.validate(),
            Err(Error::SchemaViolation { .. })
        ));
    }

    #[test]
    fn dangling_strl_reference_fails() {
        let mut dataset = Dataset::new(Release::V117);
        let mut column = Column::new("s", VarType::StrL);
        column.cells = Cells::StrL(vec![StrLRef { v: 1, o: 1 }]);
        dataset.columns = vec![column];
        assert!(matches!(
            dataset.validate(),
            Err(Error::SchemaViolation { .. })
        ));

        dataset.strls.push(StrLEntry {
            r#ref: StrLRef { v: 1, o: 1 },
            format: StrLFormat::Text,
            payload: b"hello\0".to_vec(),
        });
        dataset.validate().unwrap();
    }

    #[test]
    fn strl_ref_formats_as_decimal_id() {
        assert_eq!(
            StrLRef { v: 1, o: 1 }.to_string(),
            "00000000010000000001"
        );
        assert_eq!(
            StrLRef { v: 12, o: 3456 }.to_string(),
            "00000000120000003456"
        );
    }

    #[test]
    fn empty_strl_ref_resolves_without_pool() {
        let dataset = Dataset::new(Release::V117);
        assert_eq!(dataset.strl_text(StrLRef::EMPTY).unwrap(), "");
        assert_eq!(dataset.strl_text(StrLRef { v: 1, o: 1 }), None);
    }

    #[test]
    fn characteristic_text_round_trip() {
        let ch = Characteristic::new("a", "note1", "hello");
        assert_eq!(ch.contents, b"hello\0");
        assert_eq!(ch.text(), "hello");
    }
}
