// Log reader: reassembly, truncated tails, and corruption detection.

use lsm_commit::crc;
use lsm_commit::env::{AppendFile, MemFile};
use lsm_commit::wal::{BLOCK_SIZE, HEADER_SIZE, LogReader, LogWriter, RecordHeader, RecordType};
use tempfile::TempDir;

fn write_log(records: &[Vec<u8>]) -> Vec<u8> {
    let file = MemFile::new();
    let mut writer = LogWriter::new(file.clone());
    for record in records {
        writer.add_record(record).unwrap();
    }
    file.contents()
}

fn read_all(data: Vec<u8>) -> Vec<Vec<u8>> {
    let reader = LogReader::from_bytes(data);
    reader.iter().map(|r| r.unwrap()).collect()
}

// =============================================================================
// Test 1: Records of mixed sizes come back intact and in order
// =============================================================================
#[test]
fn mixed_sizes_roundtrip() {
    let records = vec![
        b"small".to_vec(),
        vec![],
        vec![b'x'; BLOCK_SIZE - HEADER_SIZE - 1],
        vec![b'y'; 3 * BLOCK_SIZE + 17],
        b"tail".to_vec(),
    ];
    assert_eq!(read_all(write_log(&records)), records);
}

// =============================================================================
// Test 2: Trailing partial record is dropped quietly
// =============================================================================
#[test]
fn truncated_tail_stops_iteration() {
    let mut data = write_log(&[b"first".to_vec(), vec![b'z'; 2 * BLOCK_SIZE]]);
    // Cut into the last fragment.
    data.truncate(data.len() - 10);

    let reader = LogReader::from_bytes(data);
    let mut records = reader.iter();
    assert_eq!(records.next().unwrap().unwrap(), b"first");
    assert!(records.next().is_none());
    assert!(records.hit_truncated_tail());
}

// =============================================================================
// Test 3: A header cut short is also a truncated tail
// =============================================================================
#[test]
fn truncated_header_is_tail() {
    let mut data = write_log(&[b"one".to_vec(), b"two".to_vec()]);
    data.truncate(HEADER_SIZE + 3 + 4);

    let reader = LogReader::from_bytes(data);
    let mut records = reader.iter();
    assert_eq!(records.next().unwrap().unwrap(), b"one");
    assert!(records.next().is_none());
    assert!(records.hit_truncated_tail());
    assert_eq!(records.offset(), HEADER_SIZE + 3 + 4);
}

// =============================================================================
// Test 4: Flipped payload byte fails the checksum
// =============================================================================
#[test]
fn checksum_mismatch_is_corruption() {
    let mut data = write_log(&[b"good".to_vec(), b"damaged".to_vec()]);
    let last = data.len() - 1;
    data[last] ^= 0xff;

    let reader = LogReader::from_bytes(data);
    let mut records = reader.iter();
    assert_eq!(records.next().unwrap().unwrap(), b"good");
    let err = records.next().unwrap().unwrap_err();
    assert!(err.is_corruption());
    // The damaged record was the last one.
    assert!(records.next().is_none());
    assert!(!records.hit_truncated_tail());
}

// =============================================================================
// Test 5: Fragment sequence without a start is corruption
// =============================================================================
#[test]
fn orphan_fragment_is_corruption() {
    let data = write_log(&[vec![b'q'; BLOCK_SIZE + 100], b"next".to_vec()]);
    // Drop the first block: the log now starts with a Last fragment.
    let orphan = data[BLOCK_SIZE..].to_vec();

    let reader = LogReader::from_bytes(orphan);
    let mut records = reader.iter();
    assert!(records.next().unwrap().unwrap_err().is_corruption());
    // The orphan is dropped; the record after it is intact.
    assert_eq!(records.next().unwrap().unwrap(), b"next");
    assert!(records.next().is_none());
}

// =============================================================================
// Test 6: Records written across reopen are all readable
// =============================================================================
#[test]
fn resume_on_file_keeps_framing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test.log");

    {
        let (file, len) = AppendFile::open(&path).unwrap();
        assert_eq!(len, 0);
        let mut writer = LogWriter::with_offset(file, len);
        writer.add_record(&vec![b'a'; BLOCK_SIZE - HEADER_SIZE - 3]).unwrap();
        writer.close().unwrap();
    }
    {
        let (file, len) = AppendFile::open(&path).unwrap();
        assert_eq!(len as usize, BLOCK_SIZE - 3);
        let mut writer = LogWriter::with_offset(file, len);
        writer.add_record(b"after reopen").unwrap();
        writer.sync().unwrap();
    }

    let reader = LogReader::open(&path).unwrap();
    let records: Vec<Vec<u8>> = reader.iter().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1], b"after reopen");
}

// =============================================================================
// Test 7: Damage in one block does not hide later blocks
// =============================================================================
#[test]
fn corrupt_block_is_skipped() {
    // Three records, each filling one block exactly.
    let records: Vec<Vec<u8>> = (0..3u8)
        .map(|i| vec![b'0' + i; BLOCK_SIZE - HEADER_SIZE])
        .collect();
    let mut data = write_log(&records);
    data[HEADER_SIZE + 10] ^= 0x01;

    let reader = LogReader::from_bytes(data);
    let mut records_read = reader.iter();
    assert!(records_read.next().unwrap().unwrap_err().is_corruption());
    assert_eq!(records_read.next().unwrap().unwrap(), records[1]);
    assert_eq!(records_read.next().unwrap().unwrap(), records[2]);
    assert!(records_read.next().is_none());
}

/// One physical record with a valid checksum.
fn physical(record_type: RecordType, payload: &[u8]) -> Vec<u8> {
    let checksum = crc::extend(crc::value(&[record_type as u8]), payload);
    let header = RecordHeader {
        checksum: crc::mask(checksum),
        length: payload.len() as u16,
        record_type: record_type as u8,
    };
    let mut out = header.encode().to_vec();
    out.extend_from_slice(payload);
    out
}

// =============================================================================
// Test 8: A record that never ended does not swallow the next one
// =============================================================================
#[test]
fn unfinished_record_is_reported_then_skipped() {
    let mut data = physical(RecordType::First, b"par");
    data.extend(physical(RecordType::Full, b"whole"));

    let reader = LogReader::from_bytes(data);
    let mut records = reader.iter();
    assert!(records.next().unwrap().unwrap_err().is_corruption());
    assert_eq!(records.next().unwrap().unwrap(), b"whole");
    assert!(records.next().is_none());
    assert!(!records.hit_truncated_tail());
}
