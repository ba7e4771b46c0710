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

use std::{
    collections::HashSet,
    fs::File,
    io::{BufWriter, Seek, SeekFrom, Write},
    path::Path,
};

use chrono::NaiveDateTime;
use encoding_rs::WINDOWS_1252;

use crate::{
    dataset::{Cells, Dataset, StrLRef},
    endian::{Endian, ToBytes},
    missing,
};

use super::{
    types,
    version::{CharLenWidth, DataLabel, Profile, Release, TypeCoding, CHAR_NAME_LEN},
    ByteOrder, Error,
};

/// Options for writing a `.dta` file.
#[derive(Clone, Debug, Default)]
pub struct WriteOptions {
    /// Release to write; defaults to the dataset's own.
    pub release: Option<Release>,

    /// Byte order to write; defaults to the dataset's own.
    pub byte_order: Option<ByteOrder>,

    /// Timestamp to stamp the header with, overriding the dataset's.
    pub timestamp: Option<NaiveDateTime>,
}

impl WriteOptions {
    /// Constructs a new set of default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `self` with the target release set to `release`.
    pub fn with_release(self, release: Release) -> Self {
        Self {
            release: Some(release),
            ..self
        }
    }

    /// Returns `self` with the byte order set to `byte_order`.
    pub fn with_byte_order(self, byte_order: ByteOrder) -> Self {
        Self {
            byte_order: Some(byte_order),
            ..self
        }
    }

    /// Returns `self` with the header timestamp set to `timestamp`.
    pub fn with_timestamp(self, timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Writes `dataset` to `path`.
    pub fn write_file(self, dataset: &Dataset, path: impl AsRef<Path>) -> Result<(), Error> {
        self.write_writer(dataset, BufWriter::new(File::create(path)?))
    }

    /// Writes `dataset` to `writer`.
    ///
    /// The dataset is validated first and nothing is written if validation
    /// fails; a failure later on leaves a partial file behind.
    pub fn write_writer<W>(self, dataset: &Dataset, writer: W) -> Result<(), Error>
    where
        W: Write + Seek,
    {
        let release = self.release.unwrap_or(dataset.release);
        let byte_order = self.byte_order.unwrap_or(dataset.byte_order);
        let timestamp = match &self.timestamp {
            Some(timestamp) => timestamp.format("%d %b %Y %H:%M").to_string(),
            None => dataset.timestamp.clone(),
        };
        Writer {
            w: writer,
            endian: byte_order.endian(),
            byte_order,
            release,
            profile: release.profile(),
            dataset,
            timestamp,
            map: [0; 14],
        }
        .write()
    }

    /// Returns a [WriteOptions] with the timestamp pinned so that tests
    /// produce identical bytes run to run.
    #[cfg(test)]
    pub(super) fn reproducible() -> Self {
        use chrono::NaiveDate;
        WriteOptions::new().with_timestamp(
            NaiveDate::from_ymd_opt(2025, 7, 30)
                .unwrap()
                .and_hms_opt(15, 7, 0)
                .unwrap(),
        )
    }
}

struct Writer<'a, W> {
    w: W,
    endian: Endian,
    byte_order: ByteOrder,
    release: Release,
    profile: Profile,
    dataset: &'a Dataset,
    timestamp: String,

    /// Section offsets for the release ≥117 seek-hint table, patched into
    /// place once the end of file is known.
    map: [u64; 14],
}

impl<W> Writer<'_, W>
where
    W: Write + Seek,
{
    fn write(mut self) -> Result<(), Error> {
        self.dataset.validate()?;
        self.check()?;

        self.header()?;
        self.schema()?;
        self.characteristics()?;
        self.data()?;
        if self.release.tagged() {
            self.strls()?;
            self.value_labels()?;
            self.map[12] = self.position()?;
            self.put_tag("</stata_dta>")?;
            self.map[13] = self.position()?;
            self.patch_map()?;
        } else {
            self.value_labels()?;
        }
        self.w.flush()?;
        Ok(())
    }

    /// Checks everything that makes the dataset unwritable in the target
    /// release, before the first byte goes out.
    fn check(&self) -> Result<(), Error> {
        let dataset = self.dataset;
        if dataset.n_columns() > u16::MAX as usize {
            return Err(Error::SchemaViolation {
                detail: format!("{} variables exceed the format's limit", dataset.n_columns()),
            });
        }
        if !self.profile.wide_n && dataset.n_rows() > u32::MAX as usize {
            return Err(Error::SchemaViolation {
                detail: format!(
                    "{} observations exceed release {}'s limit",
                    dataset.n_rows(),
                    self.release
                ),
            });
        }

        for column in &dataset.columns {
            if types::encode(self.profile.type_coding, self.profile.max_str, column.ty).is_none() {
                return Err(Error::UnrepresentableType {
                    release: self.release.as_u8(),
                    name: column.name.clone(),
                    ty: column.ty.to_string(),
                });
            }
            if self.encode_text(&column.name).len() > self.profile.varname_len - 1 {
                return Err(Error::SchemaViolation {
                    detail: format!(
                        "variable name {:?} is too long for release {}",
                        column.name, self.release
                    ),
                });
            }
        }

        if self.profile.char_len_width == Some(CharLenWidth::U16) {
            for ch in &dataset.characteristics {
                let len = 2 * CHAR_NAME_LEN + ch.contents.len();
                if len > u16::MAX as usize {
                    return Err(Error::SchemaViolation {
                        detail: format!(
                            "characteristic {:?} of {:?} is too large for release {}",
                            ch.name, ch.var, self.release
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn header(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        let k = dataset.n_columns() as u16;
        let n = dataset.n_rows();

        if self.release.tagged() {
            self.put_tag("<stata_dta>")?;
            self.put_tag("<header>")?;

            self.put_tag("<release>")?;
            let digits = self.release.to_string();
            self.put(digits.as_bytes())?;
            self.put_tag("</release>")?;

            self.put_tag("<byteorder>")?;
            self.put(self.byte_order.token())?;
            self.put_tag("</byteorder>")?;

            self.put_tag("<K>")?;
            self.put_u16(k)?;
            self.put_tag("</K>")?;

            self.put_tag("<N>")?;
            if self.profile.wide_n {
                self.put_u64(n as u64)?;
            } else {
                self.put_u32(n as u32)?;
            }
            self.put_tag("</N>")?;

            self.put_tag("<label>")?;
            let label = self.encode_text(&dataset.label);
            let end = truncation_boundary(&label, self.profile.datalabel.max_len(), self.utf8());
            match self.profile.datalabel {
                DataLabel::PrefixU8 => self.put_u8(end as u8)?,
                DataLabel::PrefixU16 => self.put_u16(end as u16)?,
                DataLabel::Fixed(_) => unreachable!(),
            }
            self.put(&label[..end])?;
            self.put_tag("</label>")?;

            self.put_tag("<timestamp>")?;
            if self.timestamp.is_empty() {
                self.put_u8(0)?;
            } else {
                self.put_u8(17)?;
                let timestamp = self.timestamp.clone();
                self.put_str(&timestamp, 17)?;
            }
            self.put_tag("</timestamp>")?;
            self.put_tag("</header>")?;

            // Zeros for now; patched once every section offset is known.
            self.map[1] = self.position()?;
            self.put_tag("<map>")?;
            for _ in 0..14 {
                self.put_u64(0)?;
            }
            self.put_tag("</map>")?;
        } else {
            self.put_u8(self.release.as_u8())?;
            self.put_u8(self.byte_order.code())?;
            self.put_u8(1)?; // filetype
            self.put_u8(0)?; // unused
            self.put_u16(k)?;
            self.put_u32(n as u32)?;

            let DataLabel::Fixed(width) = self.profile.datalabel else {
                unreachable!()
            };
            self.put_str(&dataset.label, width)?;

            if self.profile.has_timestamp {
                let timestamp = self.timestamp.clone();
                self.put_str(&timestamp, 18)?;
            }
        }
        Ok(())
    }

    fn schema(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        let tagged = self.release.tagged();
        let k = dataset.n_columns();

        if tagged {
            self.map[2] = self.position()?;
            self.put_tag("<variable_types>")?;
        }
        for column in &dataset.columns {
            let code = types::encode(self.profile.type_coding, self.profile.max_str, column.ty)
                .ok_or_else(|| Error::UnrepresentableType {
                    release: self.release.as_u8(),
                    name: column.name.clone(),
                    ty: column.ty.to_string(),
                })?;
            match self.profile.type_coding {
                TypeCoding::U16 => self.put_u16(code)?,
                TypeCoding::Ascii | TypeCoding::U8 => self.put_u8(code as u8)?,
            }
        }
        if tagged {
            self.put_tag("</variable_types>")?;
            self.map[3] = self.position()?;
            self.put_tag("<varnames>")?;
        }
        for column in &dataset.columns {
            self.put_str(&column.name, self.profile.varname_len)?;
        }
        if tagged {
            self.put_tag("</varnames>")?;
            self.map[4] = self.position()?;
            self.put_tag("<sortlist>")?;
        }
        for _ in 0..k + 1 {
            self.put_u16(0)?;
        }
        if tagged {
            self.put_tag("</sortlist>")?;
            self.map[5] = self.position()?;
            self.put_tag("<formats>")?;
        }
        for column in &dataset.columns {
            self.put_str(&column.format, self.profile.format_len)?;
        }
        if tagged {
            self.put_tag("</formats>")?;
            self.map[6] = self.position()?;
            self.put_tag("<value_label_names>")?;
        }
        for column in &dataset.columns {
            self.put_str(&column.value_label_name, self.profile.vallabel_name_len)?;
        }
        if tagged {
            self.put_tag("</value_label_names>")?;
            self.map[7] = self.position()?;
            self.put_tag("<variable_labels>")?;
        }
        for column in &dataset.columns {
            self.put_str(&column.label, self.profile.varlabel_len)?;
        }
        if tagged {
            self.put_tag("</variable_labels>")?;
        }
        Ok(())
    }

    fn characteristics(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        let Some(len_width) = self.profile.char_len_width else {
            return Ok(());
        };

        if self.release.tagged() {
            self.map[8] = self.position()?;
            self.put_tag("<characteristics>")?;
            for ch in &dataset.characteristics {
                self.put_tag("<ch>")?;
                self.put_u32((2 * CHAR_NAME_LEN + ch.contents.len()) as u32)?;
                self.put_str(&ch.var, CHAR_NAME_LEN)?;
                self.put_str(&ch.name, CHAR_NAME_LEN)?;
                self.put(&ch.contents)?;
                self.put_tag("</ch>")?;
            }
            self.put_tag("</characteristics>")?;
        } else {
            for ch in &dataset.characteristics {
                let len = 2 * CHAR_NAME_LEN + ch.contents.len();
                self.put_u8(1)?;
                match len_width {
                    CharLenWidth::U16 => self.put_u16(len as u16)?,
                    CharLenWidth::U32 => self.put_u32(len as u32)?,
                }
                self.put_str(&ch.var, CHAR_NAME_LEN)?;
                self.put_str(&ch.name, CHAR_NAME_LEN)?;
                self.put(&ch.contents)?;
            }
            // The all-zero terminator record.
            self.put_u8(0)?;
            match len_width {
                CharLenWidth::U16 => self.put_u16(0)?,
                CharLenWidth::U32 => self.put_u32(0)?,
            }
        }
        Ok(())
    }

    fn data(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        if self.release.tagged() {
            self.map[9] = self.position()?;
            self.put_tag("<data>")?;
        }

        let int_na = if self.release >= Release::V111 {
            missing::INT_NA
        } else {
            missing::INT_NA_OLD
        };
        for row in 0..dataset.n_rows() {
            for column in &dataset.columns {
                match &column.cells {
                    Cells::Byte(cells) => self.put_i8(cells[row].unwrap_or(missing::BYTE_NA))?,
                    Cells::ShortInt(cells) => {
                        self.put_i16(cells[row].unwrap_or(missing::SHORT_NA))?
                    }
                    Cells::Int(cells) => self.put_i32(cells[row].unwrap_or(int_na))?,
                    Cells::Float(cells) => self.put_f32(cells[row].unwrap_or(missing::FLOAT_NA))?,
                    Cells::Double(cells) => {
                        self.put_f64(cells[row].unwrap_or(missing::DOUBLE_NA))?
                    }
                    Cells::FixedStr(cells) => self.put_str(&cells[row], column.ty.width())?,
                    Cells::StrL(cells) => {
                        let r#ref = cells[row];
                        self.put_i32(r#ref.v)?;
                        self.put_i32(r#ref.o)?;
                    }
                }
            }
        }

        if self.release.tagged() {
            self.put_tag("</data>")?;
        }
        Ok(())
    }

    /// Writes the pool entries the data section references, in pool order.
    fn strls(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        self.map[10] = self.position()?;
        self.put_tag("<strls>")?;

        let referenced: HashSet<StrLRef> = dataset
            .columns
            .iter()
            .filter_map(|column| match &column.cells {
                Cells::StrL(refs) => Some(refs),
                _ => None,
            })
            .flatten()
            .copied()
            .collect();
        for entry in &dataset.strls {
            if !referenced.contains(&entry.r#ref) {
                continue;
            }
            self.put(b"GSO")?;
            self.put_i32(entry.r#ref.v)?;
            self.put_i32(entry.r#ref.o)?;
            self.put_u8(entry.format.code())?;
            self.put_u32(entry.payload.len() as u32)?;
            self.put(&entry.payload)?;
        }

        self.put_tag("</strls>")?;
        Ok(())
    }

    /// Writes the value-label records.  The text buffer is rebuilt in code
    /// order, which canonicalizes any ordering the labels had on disk.
    fn value_labels(&mut self) -> Result<(), Error> {
        let dataset = self.dataset;
        let tagged = self.release.tagged();
        if tagged {
            self.map[11] = self.position()?;
            self.put_tag("<value_labels>")?;
        }
        if let Some(name_len) = self.profile.labelset_name_len {
            for set in &dataset.label_sets {
                let mut text = Vec::new();
                let mut offsets = Vec::with_capacity(set.entries.len());
                for label in set.entries.values() {
                    offsets.push(text.len() as i32);
                    text.extend_from_slice(&self.encode_text(label));
                    text.push(0);
                }
                let n = set.entries.len() as i32;
                let txtlen = text.len() as i32;

                if tagged {
                    self.put_tag("<lbl>")?;
                }
                self.put_i32(8 + 8 * n + txtlen)?;
                self.put_str(&set.name, name_len)?;
                self.put(&[0; 3])?;
                self.put_i32(n)?;
                self.put_i32(txtlen)?;
                for &offset in &offsets {
                    self.put_i32(offset)?;
                }
                for &code in set.entries.keys() {
                    self.put_i32(code)?;
                }
                self.put(&text)?;
                if tagged {
                    self.put_tag("</lbl>")?;
                }
            }
        }
        if tagged {
            self.put_tag("</value_labels>")?;
        }
        Ok(())
    }

    fn patch_map(&mut self) -> Result<(), Error> {
        let end = self.position()?;
        self.w
            .seek(SeekFrom::Start(self.map[1] + "<map>".len() as u64))?;
        let map = self.map;
        for value in map {
            self.put_u64(value)?;
        }
        self.w.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    fn utf8(&self) -> bool {
        self.release >= Release::V118
    }

    fn encode_text(&self, s: &str) -> Vec<u8> {
        if self.utf8() {
            s.as_bytes().to_vec()
        } else {
            WINDOWS_1252.encode(s).0.into_owned()
        }
    }

    /// Writes `s` into a `width`-byte field, truncated if oversize and
    /// padded with NULs otherwise.
    fn put_str(&mut self, s: &str, width: usize) -> Result<(), Error> {
        let encoded = self.encode_text(s);
        let end = truncation_boundary(&encoded, width, self.utf8());
        self.put(&encoded[..end])?;
        self.put(&vec![0; width - end])?;
        Ok(())
    }

    fn put_tag(&mut self, tag: &str) -> Result<(), Error> {
        self.put(tag.as_bytes())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.w.write_all(bytes)?;
        Ok(())
    }

    fn position(&mut self) -> Result<u64, Error> {
        Ok(self.w.stream_position()?)
    }

    fn put_u8(&mut self, value: u8) -> Result<(), Error> {
        let bytes: [u8; 1] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_i8(&mut self, value: i8) -> Result<(), Error> {
        let bytes: [u8; 1] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_u16(&mut self, value: u16) -> Result<(), Error> {
        let bytes: [u8; 2] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_i16(&mut self, value: i16) -> Result<(), Error> {
        let bytes: [u8; 2] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_u32(&mut self, value: u32) -> Result<(), Error> {
        let bytes: [u8; 4] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_i32(&mut self, value: i32) -> Result<(), Error> {
        let bytes: [u8; 4] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_u64(&mut self, value: u64) -> Result<(), Error> {
        let bytes: [u8; 8] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_f32(&mut self, value: f32) -> Result<(), Error> {
        let bytes: [u8; 4] = self.endian.to_bytes(value);
        self.put(&bytes)
    }

    fn put_f64(&mut self, value: f64) -> Result<(), Error> {
        let bytes: [u8; 8] = self.endian.to_bytes(value);
        self.put(&bytes)
    }
}

/// Largest prefix of `encoded` that fits in `width` bytes, backed off to a
/// character boundary when the bytes are UTF-8.
fn truncation_boundary(encoded: &[u8], width: usize, utf8: bool) -> usize {
    if encoded.len() <= width {
        return encoded.len();
    }
    let mut end = width;
    while utf8 && end > 0 && (encoded[end] & 0xc0) == 0x80 {
        end -= 1;
    }
    end
}
