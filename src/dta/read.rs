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
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Error as IoError, ErrorKind, Read, Seek},
    path::Path,
    str::from_utf8,
};

use encoding_rs::mem::decode_latin1;
use itertools::izip;

use crate::{
    dataset::{
        Cells, Characteristic, Column, Dataset, LabelSet, StrLEntry, StrLFormat, StrLRef,
    },
    endian::{Endian, Parse},
    missing,
};

use super::{
    types,
    version::{CharLenWidth, DataLabel, Profile, Release, TypeCoding, CHAR_NAME_LEN},
    ByteOrder, Error,
};

/// Options for reading a `.dta` file.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReadOptions {
    /// Keep numeric values in the reserved missing ranges as their raw
    /// values instead of folding them to `None`.
    pub preserve_sentinel: bool,
}

impl ReadOptions {
    /// Constructs a new set of default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `self` with `preserve_sentinel` set to `preserve_sentinel`.
    pub fn with_preserve_sentinel(self, preserve_sentinel: bool) -> Self {
        Self { preserve_sentinel }
    }

    /// Reads the `.dta` file at `path`.
    pub fn read_file(self, path: impl AsRef<Path>) -> Result<Dataset, Error> {
        self.read_reader(BufReader::new(File::open(path)?))
    }

    /// Reads a `.dta` file from `reader`, which must be positioned at the
    /// start of the file.
    pub fn read_reader<R>(self, reader: R) -> Result<Dataset, Error>
    where
        R: Read + Seek,
    {
        Reader::new(self, reader).read()
    }
}

struct Header {
    byte_order: ByteOrder,
    k: usize,
    n: usize,
    label: String,
    timestamp: String,
}

struct Reader<R> {
    r: R,
    endian: Endian,
    release: Release,
    profile: Profile,
    preserve: bool,
    section: &'static str,
}

impl<R> Reader<R>
where
    R: Read + Seek,
{
    fn new(options: ReadOptions, r: R) -> Self {
        // The release and byte order here are placeholders until the header
        // is parsed.
        Self {
            r,
            endian: Endian::Little,
            release: Release::V117,
            profile: Release::V117.profile(),
            preserve: options.preserve_sentinel,
            section: "header",
        }
    }

    fn set_release(&mut self, release: Release) {
        self.release = release;
        self.profile = release.profile();
    }

    fn read(mut self) -> Result<Dataset, Error> {
        let first: [u8; 1] = self.bytes()?;
        let header = if first[0] == b'<' {
            self.tagged_header()?
        } else {
            self.positional_header(first[0])?
        };
        if header.k == 0 && header.n > 0 {
            return Err(Error::InconsistentCounts {
                which: format!("{} observations but no variables", header.n),
            });
        }
        let tagged = self.release.tagged();

        let mut columns = self.schema(header.k, header.n)?;
        let characteristics = self.characteristics()?;

        self.section = "data";
        if tagged {
            self.expect("<data>")?;
        }
        self.data(&mut columns, header.n)?;

        let strls = if tagged {
            self.expect("</data>")?;
            self.expect("<strls>")?;
            let pool = self.strls()?;
            self.expect("<value_labels>")?;
            pool
        } else {
            Vec::new()
        };

        let label_sets = self.value_labels()?;
        if tagged {
            self.expect("</stata_dta>")?;
        }

        Ok(Dataset {
            release: self.release,
            byte_order: header.byte_order,
            label: header.label,
            timestamp: header.timestamp,
            columns,
            label_sets,
            characteristics,
            strls,
        })
    }

    /// Reads a tagged (release ≥117) header.  The caller has consumed the
    /// leading `<`.
    fn tagged_header(&mut self) -> Result<Header, Error> {
        let position = self.position().saturating_sub(1);
        let found = self.vec(10)?;
        if found != b"stata_dta>" {
            return Err(Error::MalformedTag {
                expected: "<stata_dta>",
                found,
                position,
            });
        }
        self.expect("<header>")?;

        self.expect("<release>")?;
        let position = self.position();
        let digits = self.vec(3)?;
        let number: u16 = from_utf8(&digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::MalformedTag {
                expected: "<release>",
                found: digits.clone(),
                position,
            })?;
        match number {
            117 => self.set_release(Release::V117),
            118 => self.set_release(Release::V118),
            _ => return Err(Error::UnsupportedRelease(number)),
        }
        self.expect("</release>")?;

        self.expect("<byteorder>")?;
        let token: [u8; 3] = self.bytes()?;
        let byte_order = match &token {
            b"LSF" => ByteOrder::Lsf,
            b"MSF" => ByteOrder::Msf,
            _ => {
                return Err(Error::UnsupportedByteOrder(
                    String::from_utf8_lossy(&token).into_owned(),
                ))
            }
        };
        self.endian = byte_order.endian();
        self.expect("</byteorder>")?;

        self.expect("<K>")?;
        let k = self.get_u16()? as usize;
        self.expect("</K>")?;

        self.expect("<N>")?;
        let n = if self.profile.wide_n {
            let n = self.get_u64()?;
            usize::try_from(n).map_err(|_| Error::InconsistentCounts {
                which: format!("observation count {n}"),
            })?
        } else {
            self.get_u32()? as usize
        };
        self.expect("</N>")?;

        self.expect("<label>")?;
        let len = match self.profile.datalabel {
            DataLabel::PrefixU8 => self.get_u8()? as usize,
            DataLabel::PrefixU16 => self.get_u16()? as usize,
            DataLabel::Fixed(_) => unreachable!(),
        };
        let label = trim_decode(&self.vec(len)?);
        self.expect("</label>")?;

        self.expect("<timestamp>")?;
        let len = self.get_u8()? as usize;
        let timestamp = trim_decode(&self.vec(len)?);
        self.expect("</timestamp>")?;
        self.expect("</header>")?;

        // The seek-hint table.  Nothing below relies on it; the file is read
        // strictly sequentially.
        self.expect("<map>")?;
        for _ in 0..14 {
            self.get_u64()?;
        }
        self.expect("</map>")?;

        Ok(Header {
            byte_order,
            k,
            n,
            label,
            timestamp,
        })
    }

    /// Reads a positional (release ≤115) header.  `first` is the already
    /// consumed release byte.
    fn positional_header(&mut self, first: u8) -> Result<Header, Error> {
        self.set_release(Release::try_from(first)?);
        let code = self.get_u8()?;
        let byte_order = match code {
            1 => ByteOrder::Msf,
            2 => ByteOrder::Lsf,
            _ => return Err(Error::UnsupportedByteOrder(code.to_string())),
        };
        self.endian = byte_order.endian();
        let _filetype = self.get_u8()?;
        let _unused = self.get_u8()?;

        let k = self.get_u16()? as usize;
        let n = self.get_u32()? as usize;
        let label = match self.profile.datalabel {
            DataLabel::Fixed(len) => self.get_str(len)?,
            _ => unreachable!(),
        };
        let timestamp = if self.profile.has_timestamp {
            self.get_str(18)?
        } else {
            String::new()
        };

        Ok(Header {
            byte_order,
            k,
            n,
            label,
            timestamp,
        })
    }

    /// Reads the five parallel schema vectors and the sortlist, returning
    /// columns with empty cell vectors sized for `n` observations.
    fn schema(&mut self, k: usize, n: usize) -> Result<Vec<Column>, Error> {
        let tagged = self.release.tagged();

        self.section = "variable types";
        if tagged {
            self.expect("<variable_types>")?;
        }
        let mut types = Vec::with_capacity(k);
        for _ in 0..k {
            let code = match self.profile.type_coding {
                TypeCoding::U16 => self.get_u16()?,
                TypeCoding::Ascii | TypeCoding::U8 => self.get_u8()? as u16,
            };
            types.push(types::decode(self.profile.type_coding, code)?);
        }
        if tagged {
            self.expect("</variable_types>")?;
        }

        self.section = "variable names";
        if tagged {
            self.expect("<varnames>")?;
        }
        let mut names = Vec::with_capacity(k);
        for _ in 0..k {
            names.push(self.get_str(self.profile.varname_len)?);
        }
        if tagged {
            self.expect("</varnames>")?;
        }

        // The sortlist records which variables the data was sorted by.  It
        // is not part of the dataset value and is written back as zeros.
        self.section = "sortlist";
        if tagged {
            self.expect("<sortlist>")?;
        }
        for _ in 0..k + 1 {
            self.get_u16()?;
        }
        if tagged {
            self.expect("</sortlist>")?;
        }

        self.section = "formats";
        if tagged {
            self.expect("<formats>")?;
        }
        let mut formats = Vec::with_capacity(k);
        for _ in 0..k {
            formats.push(self.get_str(self.profile.format_len)?);
        }
        if tagged {
            self.expect("</formats>")?;
        }

        self.section = "value-label names";
        if tagged {
            self.expect("<value_label_names>")?;
        }
        let mut value_label_names = Vec::with_capacity(k);
        for _ in 0..k {
            value_label_names.push(self.get_str(self.profile.vallabel_name_len)?);
        }
        if tagged {
            self.expect("</value_label_names>")?;
        }

        self.section = "variable labels";
        if tagged {
            self.expect("<variable_labels>")?;
        }
        let mut labels = Vec::with_capacity(k);
        for _ in 0..k {
            labels.push(self.get_str(self.profile.varlabel_len)?);
        }
        if tagged {
            self.expect("</variable_labels>")?;
        }

        Ok(
            izip!(types, names, formats, value_label_names, labels)
                .map(|(ty, name, format, value_label_name, label)| Column {
                    name,
                    format,
                    value_label_name,
                    label,
                    ty,
                    cells: Cells::for_type(ty, n),
                })
                .collect(),
        )
    }

    fn characteristics(&mut self) -> Result<Vec<Characteristic>, Error> {
        self.section = "characteristics";
        let mut list = Vec::new();
        let Some(len_width) = self.profile.char_len_width else {
            return Ok(list);
        };

        if self.release.tagged() {
            self.expect("<characteristics>")?;
            loop {
                let position = self.position();
                let tag: [u8; 4] = self.bytes()?;
                match &tag {
                    b"<ch>" => {
                        let len = self.get_u32()? as usize;
                        list.push(self.characteristic(len)?);
                        self.expect("</ch>")?;
                    }
                    b"</ch" => {
                        self.expect("aracteristics>")?;
                        break;
                    }
                    _ => {
                        return Err(Error::MalformedTag {
                            expected: "<ch>",
                            found: tag.to_vec(),
                            position,
                        })
                    }
                }
            }
        } else {
            loop {
                let datatype = self.get_u8()?;
                let len = match len_width {
                    CharLenWidth::U16 => self.get_u16()? as usize,
                    CharLenWidth::U32 => self.get_u32()? as usize,
                };
                if datatype == 0 && len == 0 {
                    break;
                }
                list.push(self.characteristic(len)?);
            }
        }
        Ok(list)
    }

    fn characteristic(&mut self, len: usize) -> Result<Characteristic, Error> {
        let contents_len =
            len.checked_sub(2 * CHAR_NAME_LEN)
                .ok_or_else(|| Error::InconsistentCounts {
                    which: format!("characteristic record length {len}"),
                })?;
        let var = self.get_str(CHAR_NAME_LEN)?;
        let name = self.get_str(CHAR_NAME_LEN)?;
        let contents = self.vec(contents_len)?;
        Ok(Characteristic {
            var,
            name,
            contents,
        })
    }

    /// Reads the data matrix: `n` rows of one cell per column, with no
    /// padding or row delimiters anywhere.
    fn data(&mut self, columns: &mut [Column], n: usize) -> Result<(), Error> {
        for _ in 0..n {
            for column in columns.iter_mut() {
                let width = column.ty.width();
                match &mut column.cells {
                    Cells::Byte(cells) => {
                        let value = self.get_i8()?;
                        cells.push(missing::decode_byte(value, self.preserve));
                    }
                    Cells::ShortInt(cells) => {
                        let value = self.get_i16()?;
                        cells.push(missing::decode_short(value, self.preserve));
                    }
                    Cells::Int(cells) => {
                        let value = self.get_i32()?;
                        cells.push(missing::decode_int(value, self.preserve));
                    }
                    Cells::Float(cells) => {
                        let value = self.get_f32()?;
                        cells.push(missing::decode_float(value, self.preserve));
                    }
                    Cells::Double(cells) => {
                        let value = self.get_f64()?;
                        cells.push(missing::decode_double(value, self.preserve));
                    }
                    Cells::FixedStr(cells) => {
                        let raw = self.vec(width)?;
                        cells.push(trim_decode(&raw));
                    }
                    Cells::StrL(cells) => {
                        let v = self.get_i32()?;
                        let o = self.get_i32()?;
                        cells.push(StrLRef { v, o });
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads the strL pool between `<strls>` and `</strls>`.
    fn strls(&mut self) -> Result<Vec<StrLEntry>, Error> {
        self.section = "strL pool";
        let mut pool = Vec::new();
        loop {
            let position = self.position();
            let tag: [u8; 3] = self.bytes()?;
            match &tag {
                b"GSO" => {
                    let v = self.get_i32()?;
                    let o = self.get_i32()?;
                    let t = self.get_u8()?;
                    let format = match t {
                        129 => StrLFormat::Binary,
                        130 => StrLFormat::Text,
                        _ => {
                            return Err(Error::InconsistentCounts {
                                which: format!("strL storage flag {t}"),
                            })
                        }
                    };
                    let len = self.get_u32()? as usize;
                    let payload = self.vec(len)?;
                    pool.push(StrLEntry {
                        r#ref: StrLRef { v, o },
                        format,
                        payload,
                    });
                }
                b"</s" => {
                    self.expect("trls>")?;
                    break;
                }
                _ => {
                    return Err(Error::MalformedTag {
                        expected: "GSO",
                        found: tag.to_vec(),
                        position,
                    })
                }
            }
        }
        Ok(pool)
    }

    fn value_labels(&mut self) -> Result<Vec<LabelSet>, Error> {
        self.section = "value labels";
        let mut sets = Vec::new();
        let Some(name_len) = self.profile.labelset_name_len else {
            return Ok(sets);
        };

        if self.release.tagged() {
            loop {
                let position = self.position();
                let tag: [u8; 5] = self.bytes()?;
                match &tag {
                    b"<lbl>" => {
                        let _nlen = self.get_i32()?;
                        sets.push(self.label_set(name_len)?);
                        self.expect("</lbl>")?;
                    }
                    b"</val" => {
                        self.expect("ue_labels>")?;
                        break;
                    }
                    _ => {
                        return Err(Error::MalformedTag {
                            expected: "<lbl>",
                            found: tag.to_vec(),
                            position,
                        })
                    }
                }
            }
        } else {
            // Records run to the end of the file; this is the one place a
            // short read is normal termination rather than an error.
            loop {
                let Some(bytes) = self.try_bytes::<4>()? else {
                    break;
                };
                let nlen: i32 = self.endian.parse(bytes);
                if nlen == 0 {
                    break;
                }
                sets.push(self.label_set(name_len)?);
            }
        }
        Ok(sets)
    }

    /// Reads one value-label record past its length field.
    fn label_set(&mut self, name_len: usize) -> Result<LabelSet, Error> {
        let name = self.get_str(name_len)?;
        let _padding: [u8; 3] = self.bytes()?;
        let n = self.get_i32()?;
        let txtlen = self.get_i32()?;
        let (Ok(n), Ok(txtlen)) = (usize::try_from(n), usize::try_from(txtlen)) else {
            return Err(Error::InconsistentCounts {
                which: format!("label set {name:?} has {n} labels in {txtlen} text bytes"),
            });
        };
        let mut offsets = Vec::with_capacity(n);
        for _ in 0..n {
            offsets.push(self.get_i32()?);
        }
        let mut codes = Vec::with_capacity(n);
        for _ in 0..n {
            codes.push(self.get_i32()?);
        }
        let text = self.vec(txtlen)?;
        decode_label_set(name, &offsets, &codes, &text)
    }

    fn expect(&mut self, tag: &'static str) -> Result<(), Error> {
        let position = self.position();
        let found = self.vec(tag.len())?;
        if found != tag.as_bytes() {
            return Err(Error::MalformedTag {
                expected: tag,
                found,
                position,
            });
        }
        Ok(())
    }

    fn position(&mut self) -> u64 {
        self.r.stream_position().unwrap_or(0)
    }

    fn bytes<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut buf = [0; N];
        let result = self.r.read_exact(&mut buf);
        result.map_err(|error| self.eof_error(error))?;
        Ok(buf)
    }

    /// Reads `N` bytes, or returns `None` at a clean end of file.
    fn try_bytes<const N: usize>(&mut self) -> Result<Option<[u8; N]>, Error> {
        let mut buf = [0; N];
        let n = self.r.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        if n < N {
            let result = self.r.read_exact(&mut buf[n..]);
            result.map_err(|error| self.eof_error(error))?;
        }
        Ok(Some(buf))
    }

    fn vec(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        let mut vec = vec![0; n];
        let result = self.r.read_exact(&mut vec);
        result.map_err(|error| self.eof_error(error))?;
        Ok(vec)
    }

    fn get_str(&mut self, width: usize) -> Result<String, Error> {
        let raw = self.vec(width)?;
        Ok(trim_decode(&raw))
    }

    fn get_u8(&mut self) -> Result<u8, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_i8(&mut self) -> Result<i8, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_u16(&mut self) -> Result<u16, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_i16(&mut self) -> Result<i16, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_u32(&mut self) -> Result<u32, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_i32(&mut self) -> Result<i32, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_u64(&mut self) -> Result<u64, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_f32(&mut self) -> Result<f32, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn get_f64(&mut self) -> Result<f64, Error> {
        let bytes = self.bytes()?;
        Ok(self.endian.parse(bytes))
    }

    fn eof_error(&mut self, error: IoError) -> Error {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::TruncatedInput {
                section: self.section,
                position: self.position(),
            }
        } else {
            error.into()
        }
    }
}

/// Pairs each code with the text slice its offset points at.  Labels may be
/// stored in any order, so the offsets are sorted to find each label's end
/// (the next greater offset, or the end of the buffer) and the result is
/// projected back to code order.
fn decode_label_set(
    name: String,
    offsets: &[i32],
    codes: &[i32],
    text: &[u8],
) -> Result<LabelSet, Error> {
    let mut starts = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        let start = usize::try_from(offset)
            .ok()
            .filter(|&start| start < text.len())
            .ok_or_else(|| Error::InconsistentCounts {
                which: format!(
                    "label set {name:?} has offset {offset} outside its {} text bytes",
                    text.len()
                ),
            })?;
        starts.push(start);
    }

    let mut sorted = starts.clone();
    sorted.sort_unstable();

    let mut entries = BTreeMap::new();
    for (&code, &start) in codes.iter().zip(&starts) {
        let next = sorted.partition_point(|&other| other <= start);
        let end = sorted.get(next).copied().unwrap_or(text.len());
        entries.insert(code, trim_decode(&text[start..end]));
    }
    Ok(LabelSet { name, entries })
}

/// Returns the prefix of `raw` up to the first NUL, decoded as UTF-8 when
/// valid and as Latin-1 otherwise.
fn trim_decode(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let raw = &raw[..end];
    from_utf8(raw).map_or_else(|_| decode_latin1(raw).into_owned(), str::to_owned)
}
