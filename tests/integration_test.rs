use std::fs;
use std::io::Cursor;
use std::path::Path;

use proptest::prelude::*;
use tempfile::tempdir;
use zar::checksum::crc32;
use zar::info::info;
use zar::{create, extract, list, Archive, CreateOptions, FileMap, VolumeRecord, ZarError};

fn opts_in(dir: &Path) -> CreateOptions {
    CreateOptions { base_dir: Some(dir.to_owned()), ..Default::default() }
}

#[test]
fn test_two_file_scenario() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.txt"), b"hi").unwrap();
    fs::write(src.path().join("b.txt"), b"bye").unwrap();
    let work = tempdir().unwrap();
    let archive = work.path().join("two.zar");

    let volume = create(&archive, ["a.txt", "b.txt"], &opts_in(src.path())).unwrap();
    assert_eq!(volume.nrecords(), 2);

    // File map: "utf-8\0" + two (offset, "x.txt\0") entries.
    let bytes = fs::read(&archive).unwrap();
    assert_eq!(&bytes[..4], b"ZAR\0");
    assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 6 + 2 * (8 + 6));

    let records = list(&archive).unwrap();
    let paths: Vec<_> = records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["a.txt", "b.txt"]);
    assert_eq!(records[0].offset, 8 + 6 + 2 + 8 + 2 + 4);
    assert_eq!(records[1].offset, 8 + 6 + 2 + 8 + 3 + 4);
    assert_eq!(records[0].checksum, crc32(b"hi"));
    assert_eq!(records[1].checksum, crc32(b"bye"));

    let out = work.path().join("out");
    let extracted = extract(&archive, &out).unwrap();
    assert_eq!(extracted.len(), 2);
    assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"hi");
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"bye");
}

#[test]
fn test_nested_roundtrip_is_byte_identical() {
    let src = tempdir().unwrap();
    let files: Vec<(&str, Vec<u8>)> = vec![
        ("top.bin", (0..=255u8).cycle().take(70_000).collect()),
        ("nested/deeper/empty", Vec::new()),
        ("nested/notes.txt", b"line one\nline two\n".to_vec()),
    ];
    for (name, data) in &files {
        let p = src.path().join(name);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, data).unwrap();
    }

    let work = tempdir().unwrap();
    let archive = work.path().join("nested.zar");
    create(&archive, files.iter().map(|(n, _)| *n), &opts_in(src.path())).unwrap();

    let out = work.path().join("restored");
    extract(&archive, &out).unwrap();
    for (name, data) in &files {
        let back = fs::read(out.join(name)).unwrap();
        assert_eq!(&back, data, "{name} differs");
        assert_eq!(crc32(&back), crc32(data));
    }
}

#[test]
fn test_records_tile_the_file_exactly() {
    let src = tempdir().unwrap();
    for (name, len) in [("x", 1usize), ("y", 0), ("z", 513)] {
        fs::write(src.path().join(name), vec![b'q'; len]).unwrap();
    }
    let work = tempdir().unwrap();
    let archive = work.path().join("tile.zar");
    create(&archive, ["x", "y", "z"], &opts_in(src.path())).unwrap();

    let report = info(&archive).unwrap();
    assert!(report.is_conformant());
    let mut pos = report.header_len;
    for r in &report.records {
        assert_eq!(r.position, pos);
        pos += r.record.offset;
    }
    assert_eq!(pos, fs::metadata(&archive).unwrap().len());
    assert_eq!(report.creator_name, zar::volume::CREATOR_NAME);
}

#[test]
fn test_tampered_payload_fails_extraction() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("keep.txt"), b"first member").unwrap();
    fs::write(src.path().join("victim.txt"), b"payload that will be flipped").unwrap();
    let work = tempdir().unwrap();
    let archive = work.path().join("tamper.zar");
    create(&archive, ["keep.txt", "victim.txt"], &opts_in(src.path())).unwrap();

    let report = info(&archive).unwrap();
    let victim = &report.records[1];
    let payload_at = victim.position + 8 + victim.record.path.len() as u64 + 1 + 2 + 8;

    let mut bytes = fs::read(&archive).unwrap();
    bytes[payload_at as usize + 3] ^= 0x20;
    fs::write(&archive, bytes).unwrap();

    match extract(&archive, work.path().join("out")) {
        Err(ZarError::ChecksumMismatch { path, expected, actual }) => {
            assert_eq!(path, "victim.txt");
            assert_ne!(expected, actual);
        }
        other => panic!("expected checksum mismatch, got {other:?}"),
    }
}

#[test]
fn test_foreign_file_rejected_by_marker() {
    let work = tempdir().unwrap();
    let archive = work.path().join("not.zar");
    fs::write(&archive, b"#!/bin/sh\necho hello\n").unwrap();

    for result in [list(&archive).map(|_| ()), extract(&archive, work.path().join("o")).map(|_| ())] {
        match result {
            Err(e @ ZarError::InvalidMagic { .. }) => assert_eq!(e.exit_code(), zar::error::EX_DATAERR),
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }
}

#[test]
fn test_empty_file_is_not_an_archive() {
    let work = tempdir().unwrap();
    let archive = work.path().join("empty.zar");
    fs::write(&archive, b"").unwrap();
    let err = list(&archive).unwrap_err();
    assert!(matches!(err, ZarError::Io(_)));
    assert_eq!(err.exit_code(), zar::error::EX_DATAERR);
}

#[test]
fn test_missing_input_is_skipped() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("present.txt"), b"here").unwrap();
    fs::write(src.path().join("also.txt"), b"here too").unwrap();
    let work = tempdir().unwrap();
    let archive = work.path().join("partial.zar");

    let volume = create(
        &archive,
        ["present.txt", "ghost.txt", "also.txt"],
        &opts_in(src.path()),
    )
    .unwrap();
    let paths: Vec<_> = volume.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["present.txt", "also.txt"]);

    // The map never names the skipped member, so extraction is clean.
    let out = work.path().join("out");
    extract(&archive, &out).unwrap();
    assert!(!out.join("ghost.txt").exists());
    assert_eq!(fs::read(out.join("also.txt")).unwrap(), b"here too");
}

#[test]
fn test_all_inputs_missing_writes_nothing() {
    let work = tempdir().unwrap();
    let archive = work.path().join("none.zar");
    let err = create(&archive, [work.path().join("nope")], &CreateOptions::default()).unwrap_err();
    assert!(matches!(err, ZarError::EmptyVolume));
    assert_eq!(fs::metadata(&archive).unwrap().len(), 0);
}

#[test]
fn test_absolute_inputs_are_stored_relative() {
    let src = tempdir().unwrap();
    let file = src.path().join("abs.txt");
    fs::write(&file, b"absolute").unwrap();
    let work = tempdir().unwrap();
    let archive = work.path().join("abs.zar");

    create(&archive, [&file], &CreateOptions::default()).unwrap();
    let record = &list(&archive).unwrap()[0];
    assert!(!record.path.starts_with('/'));
    assert!(record.path.ends_with("abs.txt"));

    let out = work.path().join("out");
    extract(&archive, &out).unwrap();
    assert_eq!(fs::read(out.join(&record.path)).unwrap(), b"absolute");
}

#[test]
fn test_parent_relative_inputs_round_trip() {
    let root = tempdir().unwrap();
    let work = root.path().join("work");
    let shared = root.path().join("shared");
    fs::create_dir_all(&work).unwrap();
    fs::create_dir_all(&shared).unwrap();
    fs::write(shared.join("a.txt"), b"from a sibling directory").unwrap();
    fs::write(work.join("b.txt"), b"local").unwrap();
    let archive = root.path().join("up.zar");

    let volume = create(&archive, ["../shared/a.txt", "sub/../b.txt"], &opts_in(&work)).unwrap();
    let paths: Vec<_> = volume.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, ["shared/a.txt", "b.txt"]);

    let out = root.path().join("out");
    extract(&archive, &out).unwrap();
    assert_eq!(fs::read(out.join("shared").join("a.txt")).unwrap(), b"from a sibling directory");
    assert_eq!(fs::read(out.join("b.txt")).unwrap(), b"local");
}

#[test]
fn test_archive_lifecycle_by_hand() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("m"), b"manual").unwrap();
    let work = tempdir().unwrap();
    let path = work.path().join("manual.zar");

    let mut zar = Archive::open(&path).unwrap();
    assert_eq!(zar.path(), path.as_path());
    zar.write_volume(["m"], &opts_in(src.path())).unwrap();
    let header = zar.read_volume().unwrap();
    assert_eq!(header.nrecords(), 1);
    assert_eq!(header.records[0].path, "m");
    assert_eq!(header.records[0].length, 0, "header read yields stubs");
    let full = zar.list().unwrap();
    assert_eq!(full[0].length, 6);
    zar.close().unwrap();
}

#[test]
fn test_in_memory_volume_matches_on_disk() {
    // A volume can be written to any sink, not just a seekable file.
    let mut volume = VolumeRecord {
        records: vec![zar::FileRecord::new("mem.txt")],
        ..Default::default()
    };
    let mut sink = Vec::new();
    volume.write(&mut sink).unwrap();
    volume.records[0].write(&mut sink, &b"in memory"[..]).unwrap();

    let src = tempdir().unwrap();
    fs::write(src.path().join("mem.txt"), b"in memory").unwrap();
    let work = tempdir().unwrap();
    let archive = work.path().join("disk.zar");
    create(&archive, ["mem.txt"], &opts_in(src.path())).unwrap();

    assert_eq!(sink, fs::read(&archive).unwrap());
}

proptest! {
    #[test]
    fn prop_file_map_length_matches_contents(
        paths in prop::collection::vec("[a-z]{1,12}(/[a-z0-9._]{1,12}){0,3}", 1..20)
    ) {
        let map = FileMap::from_paths(paths.iter().cloned());
        let mut bytes = Vec::new();
        map.write(&mut bytes).unwrap();

        let expected: u64 = 6 + paths.iter().map(|p| 8 + p.len() as u64 + 1).sum::<u64>();
        prop_assert_eq!(u64::from_le_bytes(bytes[..8].try_into().unwrap()), expected);
        prop_assert_eq!(bytes.len() as u64, 8 + expected);

        let mut c = Cursor::new(bytes);
        let back = FileMap::read(&mut c).unwrap();
        prop_assert_eq!(c.position(), 8 + expected);
        prop_assert_eq!(back.entries.len(), paths.len());
    }
}
