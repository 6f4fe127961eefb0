use rwv::block::RECORD_HEADER_LEN;
use rwv::codec::BranchId;
use rwv::config::{BranchSet, Capabilities, RaceConfig};
use rwv::container::ContainerView;
use rwv::error::{ConfigError, FormatError, IntegrityError, RwvError};
use rwv::header::HEADER_LEN;
use rwv::info::ContainerInfo;
use rwv::{compress, compress_file, compress_with_plan, decompress, decompress_file};
use std::fs;
use tempfile::{tempdir, NamedTempFile};

fn source_text() -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..400 {
        out.extend_from_slice(
            format!("export function handler{i}(request, response) {{ return response.send(request.body); }}\n")
                .as_bytes(),
        );
    }
    out
}

/// Byte offsets of each record's payload inside a container.
fn payload_ranges(bytes: &[u8]) -> Vec<std::ops::Range<usize>> {
    let view = ContainerView::parse(bytes).unwrap();
    let mut pos = view.header.encoded_len();
    view.blocks
        .iter()
        .map(|rec| {
            let start = pos + RECORD_HEADER_LEN;
            pos = start + rec.payload.len();
            start..pos
        })
        .collect()
}

#[test]
fn test_roundtrip_sizes() {
    let cfg = RaceConfig::default().with_block_size(4096);
    for len in [0usize, 1, 2, 4095, 4096, 4097, 3 * 4096, 3 * 4096 + 17] {
        let data: Vec<u8> = (0..len).map(|i| (i * 7 % 61) as u8).collect();
        let packed = compress(&data, &cfg).unwrap();
        assert_eq!(decompress(&packed).unwrap(), data, "len {len}");
        let info = ContainerInfo::inspect(&packed).unwrap();
        assert_eq!(info.block_count as usize, len.div_ceil(4096));
    }
}

#[test]
fn test_all_branches_roundtrip() {
    let mut cfg = RaceConfig::default().with_block_size(2048).with_digest(true);
    for b in [BranchId::Bz2, BranchId::Lzma] {
        if b.is_compiled_in() {
            cfg = cfg.allow(b);
        }
    }
    let mut data = source_text();
    data.extend((0..5000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8));
    let packed = compress(&data, &cfg).unwrap();
    assert_eq!(decompress(&packed).unwrap(), data);
}

#[test]
fn test_output_is_deterministic() {
    let data = source_text();
    let cfg = RaceConfig::default().with_block_size(1000).with_digest(true).with_probe(true);
    let first = compress(&data, &cfg).unwrap();
    for _ in 0..4 {
        assert_eq!(compress(&data, &cfg).unwrap(), first);
    }
}

#[test]
fn test_header_exactness() {
    let data = b"Hello, World! ".repeat(100);
    let packed = compress(&data, &RaceConfig::default().with_digest(true)).unwrap();
    assert_eq!(&packed[..4], b"RWV1");
    assert_eq!(packed[4], 1);
    assert_eq!(packed[5], 0x01);
    assert_eq!(&packed[6..10], &[0x00, 0x10, 0x00, 0x00]);
    assert_eq!(&packed[10..14], &[0, 0, 0, 1]);
    assert_eq!(hex::encode(&packed[14..46]), hex::encode(rwv::integrity::digest(&data)));

    let plain = compress(b"", &RaceConfig::default()).unwrap();
    assert_eq!(plain.len(), HEADER_LEN);
}

#[test]
fn test_run_of_ten_as_single_zlib_block() {
    let packed = compress(b"AAAAAAAAAA", &RaceConfig::default()).unwrap();
    let info = ContainerInfo::inspect(&packed).unwrap();
    assert_eq!(info.block_count, 1);
    assert_eq!(info.blocks[0].branch, BranchId::Zlib);
    assert_eq!(info.blocks[0].raw_len, 10);
    assert_eq!(decompress(&packed).unwrap(), b"AAAAAAAAAA");
}

#[test]
fn test_payload_bit_flips_are_integrity_errors() {
    let data = source_text();
    let packed = compress(&data, &RaceConfig::default().with_block_size(8192).with_digest(true)).unwrap();
    for range in payload_ranges(&packed) {
        for pos in [range.start, range.end - 1] {
            let mut bad = packed.clone();
            bad[pos] ^= 0x01;
            match decompress(&bad) {
                Err(RwvError::Integrity(_)) => {}
                other => panic!("flip at {pos}: {other:?}"),
            }
        }
    }
}

#[test]
fn test_every_payload_byte_is_checked_per_branch() {
    let text = source_text();
    let data = &text[..3000];
    for branch in BranchId::ALL.into_iter().filter(|b| b.is_compiled_in()) {
        let cfg = RaceConfig::default()
            .with_branches(&[branch])
            .with_block_size(1024)
            .with_digest(true);
        let packed = compress(data, &cfg).unwrap();
        let info = ContainerInfo::inspect(&packed).unwrap();
        assert!(info.blocks.iter().all(|b| b.branch == branch));

        for range in payload_ranges(&packed) {
            for pos in range {
                let mut bad = packed.clone();
                bad[pos] ^= 0xff;
                match decompress(&bad) {
                    Err(RwvError::Integrity(_)) => {}
                    other => panic!("{branch}: flip at {pos}: {other:?}"),
                }
            }
        }
    }
}

#[test]
fn test_swapped_blocks_fail_digest() {
    // Two full blocks of equal length but different content.
    let mut data = b"a".repeat(1024);
    data.extend(b"b".repeat(1024));
    let packed = compress(&data, &RaceConfig::default().with_block_size(1024).with_digest(true)).unwrap();
    let ranges = payload_ranges(&packed);
    let first = (ranges[0].start - RECORD_HEADER_LEN)..ranges[0].end;
    let second = (ranges[1].start - RECORD_HEADER_LEN)..ranges[1].end;

    let mut swapped = packed[..first.start].to_vec();
    swapped.extend_from_slice(&packed[second.clone()]);
    swapped.extend_from_slice(&packed[first]);
    assert_eq!(swapped.len(), packed.len());
    assert!(matches!(
        decompress(&swapped),
        Err(RwvError::Integrity(IntegrityError::DigestMismatch { .. }))
    ));
}

#[test]
fn test_unknown_branch_is_format_error() {
    let mut packed = compress(b"abcdefgh", &RaceConfig::default()).unwrap();
    packed[HEADER_LEN] = 9;
    assert!(matches!(
        decompress(&packed),
        Err(RwvError::Format(FormatError::UnknownBranch { index: 0, id: 9 }))
    ));
    assert!(matches!(
        ContainerInfo::inspect(&packed),
        Err(RwvError::Format(FormatError::UnknownBranch { .. }))
    ));
}

#[test]
fn test_bad_magic_and_flags() {
    let packed = compress(b"abcdefgh", &RaceConfig::default()).unwrap();

    let mut bad = packed.clone();
    bad[0] = b'Z';
    assert!(matches!(decompress(&bad), Err(RwvError::Format(FormatError::InvalidMagic { .. }))));

    let mut bad = packed.clone();
    bad[5] = 0x80;
    assert!(matches!(decompress(&bad), Err(RwvError::Format(FormatError::ReservedFlags(0x80)))));

    let mut bad = packed;
    bad[6..10].copy_from_slice(&[0; 4]);
    assert!(matches!(decompress(&bad), Err(RwvError::Format(FormatError::ZeroBlockSize))));
}

#[test]
fn test_unavailable_branch_resolution() {
    let caps = Capabilities::only(BranchSet::of(&[BranchId::Zlib, BranchId::MoZlib]));
    let plan = RaceConfig::default()
        .allow(BranchId::Lzma)
        .resolve(caps)
        .unwrap();
    assert!(plan.excluded().contains(BranchId::Lzma));
    let packed = compress_with_plan(b"still works", &plan).unwrap();
    assert_eq!(decompress(&packed).unwrap(), b"still works");

    let only_bz2 = RaceConfig::default().with_branches(&[BranchId::Bz2]);
    assert!(matches!(
        only_bz2.resolve(caps),
        Err(ConfigError::NoAvailableBranches { .. })
    ));
}

#[test]
fn test_file_roundtrip_and_info() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.js");
    let packed = dir.path().join("input.rwv");
    let output = dir.path().join("output.js");
    let data = source_text();
    fs::write(&input, &data).unwrap();

    let info = compress_file(&input, &packed, &RaceConfig::default().with_digest(true)).unwrap();
    assert_eq!(info.total_raw, data.len() as u64);
    assert_eq!(info.container_len as u64, fs::metadata(&packed).unwrap().len());

    let written = decompress_file(&packed, &output).unwrap();
    assert_eq!(written, data.len() as u64);
    assert_eq!(fs::read(&output).unwrap(), data);
}

#[test]
fn test_failed_compress_writes_nothing() {
    let input = NamedTempFile::new().unwrap();
    fs::write(input.path(), b"data").unwrap();
    let dir = tempdir().unwrap();
    let out = dir.path().join("never.rwv");
    let err = compress_file(input.path(), &out, &RaceConfig::default().with_block_size(0)).unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(!out.exists());
}

#[test]
fn test_config_file() {
    let cfg_file = NamedTempFile::new().unwrap();
    fs::write(cfg_file.path(), r#"{ "block_size": 512, "include_digest": true }"#).unwrap();
    let cfg = RaceConfig::from_json_file(cfg_file.path()).unwrap();
    let packed = compress(&source_text(), &cfg).unwrap();
    let info = ContainerInfo::inspect(&packed).unwrap();
    assert_eq!(info.block_size, 512);
    assert!(info.digest.is_some());

    fs::write(cfg_file.path(), "{ not json").unwrap();
    assert!(matches!(
        RaceConfig::from_json_file(cfg_file.path()),
        Err(RwvError::Config(ConfigError::Parse(_)))
    ));
}

#[test]
fn test_selftest_passes() {
    assert!(rwv::selftest().passed());
}
