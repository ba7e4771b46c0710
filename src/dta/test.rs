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

use std::{collections::BTreeMap, io::Cursor};

use crate::{
    dataset::{
        Cells, Characteristic, Column, Dataset, LabelSet, StrLEntry, StrLFormat, StrLRef, VarType,
    },
    dta::{version::Release, ByteOrder, Error, ReadOptions, WriteOptions},
    missing,
};

fn write_bytes(dataset: &Dataset) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    WriteOptions::new()
        .write_writer(dataset, &mut cursor)
        .unwrap();
    cursor.into_inner()
}

fn read_back(bytes: &[u8]) -> Dataset {
    ReadOptions::new().read_reader(Cursor::new(bytes)).unwrap()
}

fn read_error(bytes: &[u8]) -> Error {
    ReadOptions::new()
        .read_reader(Cursor::new(bytes))
        .unwrap_err()
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
        .unwrap()
}

#[test]
fn release_115_layout() {
    let mut dataset = Dataset::new(Release::V115);
    dataset.byte_order = ByteOrder::Lsf;
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(5)]);
    let mut b = Column::new("b", VarType::FixedStr(3));
    b.cells = Cells::FixedStr(vec!["foo".into()]);
    dataset.columns = vec![a, b];

    let bytes = write_bytes(&dataset);
    // Header: release, byte order, filetype, unused, then K and N.
    assert_eq!(&bytes[..10], &[115, 2, 1, 0, 2, 0, 1, 0, 0, 0]);
    // 109-byte header, schema, the 5-byte characteristics terminator, and
    // one 4-byte row.
    assert_eq!(bytes.len(), 518);
    assert_eq!(&bytes[514..], &[5, b'f', b'o', b'o']);

    assert_eq!(read_back(&bytes), dataset);
}

#[test]
fn release_117_double_missing() {
    let mut dataset = Dataset::new(Release::V117);
    dataset.byte_order = ByteOrder::Lsf;
    let mut x = Column::new("x", VarType::Double);
    x.cells = Cells::Double(vec![Some(1.5), None]);
    dataset.columns = vec![x];

    let bytes = write_bytes(&dataset);
    let data = find(&bytes, b"<data>") + "<data>".len();
    assert_eq!(
        &bytes[data..data + 16],
        &[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf8, 0x3f, // 1.5
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xe0, 0x7f, // 2^1023
        ]
    );

    assert_eq!(read_back(&bytes), dataset);
}

#[test]
fn strl_round_trip() {
    let r#ref = StrLRef { v: 1, o: 1 };
    let mut dataset = Dataset::new(Release::V117);
    dataset.byte_order = ByteOrder::Lsf;
    let mut s = Column::new("s", VarType::StrL);
    s.cells = Cells::StrL(vec![r#ref]);
    dataset.columns = vec![s];
    dataset.strls = vec![StrLEntry {
        r#ref,
        format: StrLFormat::Text,
        payload: b"hello\0".to_vec(),
    }];

    let bytes = write_bytes(&dataset);
    let gso = find(&bytes, b"GSO");
    assert_eq!(
        &bytes[gso..gso + 16],
        &[
            b'G', b'S', b'O', 1, 0, 0, 0, 1, 0, 0, 0, // v = 1, o = 1
            130, 6, 0, 0, 0, // text, 6 payload bytes
        ]
    );

    let got = read_back(&bytes);
    assert_eq!(got, dataset);
    assert_eq!(r#ref.to_string(), "00000000010000000001");
    assert_eq!(got.strl_text(r#ref).unwrap(), "hello");
}

/// Appends a hand-built value-label record holding `{1: "male", 2: "female",
/// 9: "missing"}` with the given physical layout, and checks that decoding
/// reconstructs the mapping regardless of that layout.
fn check_label_record(offsets: [i32; 3], codes: [i32; 3]) -> BTreeMap<i32, String> {
    let mut dataset = Dataset::new(Release::V115);
    dataset.byte_order = ByteOrder::Lsf;
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a];

    let mut bytes = write_bytes(&dataset);
    bytes.extend_from_slice(&52i32.to_le_bytes());
    let mut name = b"sexlbl".to_vec();
    name.resize(33, 0);
    bytes.extend_from_slice(&name);
    bytes.extend_from_slice(&[0; 3]);
    bytes.extend_from_slice(&3i32.to_le_bytes());
    bytes.extend_from_slice(&20i32.to_le_bytes());
    for offset in offsets {
        bytes.extend_from_slice(&offset.to_le_bytes());
    }
    for code in codes {
        bytes.extend_from_slice(&code.to_le_bytes());
    }
    bytes.extend_from_slice(b"female\0male\0missing\0");

    let got = read_back(&bytes);
    assert_eq!(got.label_sets.len(), 1);
    assert_eq!(got.label_sets[0].name, "sexlbl");
    got.label_sets[0].entries.clone()
}

#[test]
fn label_text_order_is_irrelevant() {
    let expected = BTreeMap::from([
        (1, "male".to_string()),
        (2, "female".to_string()),
        (9, "missing".to_string()),
    ]);
    // Labels stored out of code order...
    assert_eq!(check_label_record([7, 0, 12], [1, 2, 9]), expected);
    // ...decode the same as sequentially stored labels.
    assert_eq!(check_label_record([0, 7, 12], [2, 1, 9]), expected);
}

#[test]
fn label_offset_out_of_bounds() {
    let mut dataset = Dataset::new(Release::V115);
    dataset.byte_order = ByteOrder::Lsf;
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a];

    let mut bytes = write_bytes(&dataset);
    bytes.extend_from_slice(&20i32.to_le_bytes());
    bytes.extend_from_slice(&[0; 36]); // name + padding
    bytes.extend_from_slice(&1i32.to_le_bytes()); // one label
    bytes.extend_from_slice(&4i32.to_le_bytes()); // 4 text bytes
    bytes.extend_from_slice(&4i32.to_le_bytes()); // offset == txtlen
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.extend_from_slice(b"one\0");
    assert!(matches!(
        read_error(&bytes),
        Error::InconsistentCounts { .. }
    ));
}

#[test]
fn characteristics_round_trip_byte_identical() {
    let mut dataset = Dataset::new(Release::V108);
    dataset.byte_order = ByteOrder::Lsf;
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    let mut b = Column::new("b", VarType::Byte);
    b.cells = Cells::Byte(vec![Some(2)]);
    dataset.columns = vec![a, b];
    dataset.characteristics = vec![
        Characteristic::new("a", "note", "hello"),
        Characteristic::new("b", "note", "world"),
    ];

    let first = write_bytes(&dataset);
    let reread = read_back(&first);
    assert_eq!(reread.characteristics, dataset.characteristics);
    let second = write_bytes(&reread);
    assert_eq!(first, second);
}

#[test]
fn release_116_rejected() {
    let bytes = b"<stata_dta><header><release>116</release>";
    assert!(matches!(
        read_error(bytes),
        Error::UnsupportedRelease(116)
    ));
}

#[test]
fn release_109_rejected() {
    let mut bytes = vec![109u8, 2, 1, 0];
    bytes.resize(128, 0);
    assert!(matches!(
        read_error(&bytes),
        Error::UnsupportedRelease(109)
    ));
}

#[test]
fn bad_byte_orders_rejected() {
    let mut bytes = vec![115u8, 3, 1, 0];
    bytes.resize(128, 0);
    assert!(matches!(
        read_error(&bytes),
        Error::UnsupportedByteOrder(_)
    ));

    let bytes = b"<stata_dta><header><release>117</release><byteorder>XSF";
    assert!(matches!(
        read_error(bytes),
        Error::UnsupportedByteOrder(_)
    ));
}

#[test]
fn malformed_opening_tag() {
    let bytes = b"<stata_dtb><header>";
    assert!(matches!(
        read_error(bytes),
        Error::MalformedTag {
            expected: "<stata_dta>",
            ..
        }
    ));
}

#[test]
fn truncated_file() {
    let mut dataset = Dataset::new(Release::V115);
    let mut a = Column::new("a", VarType::Double);
    a.cells = Cells::Double(vec![Some(1.0)]);
    dataset.columns = vec![a];
    let bytes = write_bytes(&dataset);

    assert!(matches!(
        read_error(&bytes[..50]),
        Error::TruncatedInput {
            section: "header",
            ..
        }
    ));
    assert!(matches!(
        read_error(&bytes[..bytes.len() - 2]),
        Error::TruncatedInput { section: "data", .. }
    ));
}

#[test]
fn zero_columns_with_rows_rejected() {
    let mut bytes = vec![115u8, 2, 1, 0, 0, 0, 1, 0, 0, 0];
    bytes.resize(10 + 81 + 18, 0);
    assert!(matches!(
        read_error(&bytes),
        Error::InconsistentCounts { .. }
    ));
}

#[test]
fn cross_endian_reads_agree() {
    for release in [Release::V115, Release::V117] {
        let mut dataset = Dataset::new(release);
        let mut a = Column::new("a", VarType::Int);
        a.cells = Cells::Int(vec![Some(123456), None]);
        let mut b = Column::new("b", VarType::Double);
        b.cells = Cells::Double(vec![Some(-2.25), Some(1e300)]);
        dataset.columns = vec![a, b];

        dataset.byte_order = ByteOrder::Lsf;
        let lsf = read_back(&write_bytes(&dataset));
        dataset.byte_order = ByteOrder::Msf;
        let msf = read_back(&write_bytes(&dataset));

        assert_eq!(lsf.byte_order, ByteOrder::Lsf);
        assert_eq!(msf.byte_order, ByteOrder::Msf);
        assert_eq!(lsf.columns, msf.columns);
        assert_eq!(lsf.label_sets, msf.label_sets);
    }
}

#[test]
fn preserve_sentinel_keeps_raw_values() {
    let mut dataset = Dataset::new(Release::V115);
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![None, Some(7)]);
    dataset.columns = vec![a];
    let bytes = write_bytes(&dataset);

    let plain = read_back(&bytes);
    assert_eq!(plain.columns[0].cells, Cells::Byte(vec![None, Some(7)]));

    let preserved = ReadOptions::new()
        .with_preserve_sentinel(true)
        .read_reader(Cursor::new(&bytes))
        .unwrap();
    assert_eq!(
        preserved.columns[0].cells,
        Cells::Byte(vec![Some(missing::BYTE_NA), Some(7)])
    );
}

#[test]
fn int_sentinel_depends_on_release() {
    for (release, sentinel) in [
        (Release::V110, missing::INT_NA_OLD),
        (Release::V115, missing::INT_NA),
    ] {
        let mut dataset = Dataset::new(release);
        let mut a = Column::new("a", VarType::Int);
        a.cells = Cells::Int(vec![None]);
        dataset.columns = vec![a];
        let bytes = write_bytes(&dataset);

        let preserved = ReadOptions::new()
            .with_preserve_sentinel(true)
            .read_reader(Cursor::new(&bytes))
            .unwrap();
        assert_eq!(preserved.columns[0].cells, Cells::Int(vec![Some(sentinel)]));
    }
}

#[test]
fn empty_strl_reference() {
    let mut dataset = Dataset::new(Release::V117);
    let mut s = Column::new("s", VarType::StrL);
    s.cells = Cells::StrL(vec![StrLRef::EMPTY]);
    dataset.columns = vec![s];

    let got = read_back(&write_bytes(&dataset));
    assert_eq!(got, dataset);
    assert_eq!(got.strl_text(StrLRef::EMPTY).unwrap(), "");
}

#[test]
fn strl_unrepresentable_below_117() {
    let mut dataset = Dataset::new(Release::V115);
    let mut s = Column::new("s", VarType::StrL);
    s.cells = Cells::StrL(vec![]);
    dataset.columns = vec![s];

    let result = WriteOptions::new().write_writer(&dataset, Cursor::new(Vec::new()));
    assert!(matches!(
        result,
        Err(Error::UnrepresentableType { release: 115, .. })
    ));
}

#[test]
fn wide_strings_unrepresentable_in_old_releases() {
    let mut dataset = Dataset::new(Release::V115);
    let mut s = Column::new("s", VarType::FixedStr(300));
    s.cells = Cells::FixedStr(vec![]);
    dataset.columns = vec![s];

    let result = WriteOptions::new().write_writer(&dataset, Cursor::new(Vec::new()));
    assert!(matches!(result, Err(Error::UnrepresentableType { .. })));

    // The same column is fine at release 117.
    dataset.release = Release::V117;
    WriteOptions::new()
        .write_writer(&dataset, Cursor::new(Vec::new()))
        .unwrap();
}

#[test]
fn label_sets_only_written_from_106() {
    let mut set = LabelSet::new("yn");
    set.entries.insert(0, "no".into());
    set.entries.insert(1, "yes".into());

    for (release, expected) in [(Release::V105, 0), (Release::V106, 1)] {
        let mut dataset = Dataset::new(release);
        let mut a = Column::new("a", VarType::Byte);
        a.cells = Cells::Byte(vec![Some(1)]);
        a.value_label_name = "yn".into();
        dataset.columns = vec![a];
        dataset.label_sets = vec![set.clone()];

        let got = read_back(&write_bytes(&dataset));
        assert_eq!(got.label_sets.len(), expected);
    }
}

#[test]
fn pinned_timestamp_written() {
    let mut dataset = Dataset::new(Release::V115);
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a];

    let mut cursor = Cursor::new(Vec::new());
    WriteOptions::reproducible()
        .write_writer(&dataset, &mut cursor)
        .unwrap();
    let bytes = cursor.into_inner();
    find(&bytes, b"30 Jul 2025 15:07");

    let got = read_back(&bytes);
    assert_eq!(got.timestamp, "30 Jul 2025 15:07");
}

#[test]
fn empty_timestamp_round_trips() {
    for release in [Release::V115, Release::V117] {
        let mut dataset = Dataset::new(release);
        let mut a = Column::new("a", VarType::Byte);
        a.cells = Cells::Byte(vec![Some(1)]);
        dataset.columns = vec![a];

        assert_eq!(read_back(&write_bytes(&dataset)).timestamp, "");
    }
}

#[test]
fn map_offsets_are_patched() {
    let mut dataset = Dataset::new(Release::V117);
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a];
    dataset.label = "patched".into();

    let bytes = write_bytes(&dataset);
    let map = find(&bytes, b"<map>");
    let entry = |index: usize| {
        let at = map + "<map>".len() + index * 8;
        u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap()) as usize
    };

    assert_eq!(entry(0), 0);
    assert_eq!(entry(1), map);
    assert_eq!(entry(2), find(&bytes, b"<variable_types>"));
    assert_eq!(entry(9), find(&bytes, b"<data>"));
    assert_eq!(entry(10), find(&bytes, b"<strls>"));
    assert_eq!(entry(11), find(&bytes, b"<value_labels>"));
    assert_eq!(entry(12), find(&bytes, b"</stata_dta>"));
    assert_eq!(entry(13), bytes.len());
}

#[test]
fn release_118_wide_counts_and_utf8() {
    let mut dataset = Dataset::new(Release::V118);
    dataset.byte_order = ByteOrder::Lsf;
    dataset.label = "café".into();
    let mut a = Column::new("a", VarType::FixedStr(8));
    a.cells = Cells::FixedStr(vec!["déjà".into()]);
    a.label = "accented".into();
    dataset.columns = vec![a];

    let bytes = write_bytes(&dataset);
    // N is a u64 in release 118.
    let n = find(&bytes, b"<N>") + 3;
    assert_eq!(&bytes[n..n + 8], &[1, 0, 0, 0, 0, 0, 0, 0]);

    assert_eq!(read_back(&bytes), dataset);
}

#[test]
fn schema_violations_refused() {
    // Ragged columns.
    let mut dataset = Dataset::new(Release::V115);
    let mut a = Column::new("a", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1), Some(2)]);
    let mut b = Column::new("b", VarType::Byte);
    b.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a, b];
    assert!(matches!(
        WriteOptions::new().write_writer(&dataset, Cursor::new(Vec::new())),
        Err(Error::SchemaViolation { .. })
    ));

    // Overlong variable name.
    let mut dataset = Dataset::new(Release::V108);
    let mut a = Column::new("a_name_longer_than_eight_bytes", VarType::Byte);
    a.cells = Cells::Byte(vec![Some(1)]);
    dataset.columns = vec![a];
    assert!(matches!(
        WriteOptions::new().write_writer(&dataset, Cursor::new(Vec::new())),
        Err(Error::SchemaViolation { .. })
    ));
}
