// WriteBatch: encoding and decoding of the operation stream.

use lsm_commit::batch::{BATCH_HEADER_SIZE, BatchOp};
use lsm_commit::WriteBatch;

// =============================================================================
// Test 1: Put + Delete round trip
// =============================================================================
#[test]
fn put_delete_roundtrip() {
    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.delete(b"b");

    let decoded = WriteBatch::from_contents(batch.contents().to_vec()).unwrap();
    assert_eq!(decoded.len(), 2);

    let ops: Vec<BatchOp<'_>> = decoded.iter().map(|op| op.unwrap()).collect();
    assert_eq!(
        ops,
        vec![
            BatchOp::Put { key: b"a", value: b"1" },
            BatchOp::Delete { key: b"b" },
        ]
    );
}

// =============================================================================
// Test 2: Wire bytes
// =============================================================================
#[test]
fn wire_format_is_stable() {
    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.delete(b"b");

    let mut expected = vec![0u8; 8]; // sequence, unset
    expected.extend_from_slice(&2u32.to_le_bytes());
    expected.extend_from_slice(&[0x01, 1, b'a', 1, b'1']);
    expected.extend_from_slice(&[0x00, 1, b'b']);
    assert_eq!(batch.contents(), expected.as_slice());
}

// =============================================================================
// Test 3: Long keys use multi-byte length prefixes
// =============================================================================
#[test]
fn long_key_varint_prefix() {
    let key = vec![b'k'; 300];
    let mut batch = WriteBatch::new();
    batch.delete(&key);

    let rep = batch.contents();
    assert_eq!(&rep[BATCH_HEADER_SIZE..BATCH_HEADER_SIZE + 3], &[0x00, 0xAC, 0x02]);
    let op = batch.iter().next().unwrap().unwrap();
    assert_eq!(op.key(), key.as_slice());
}

// =============================================================================
// Test 4: Clear resets to an empty batch
// =============================================================================
#[test]
fn clear_resets() {
    let mut batch = WriteBatch::new();
    batch.put(b"x", b"y");
    batch.clear();
    assert!(batch.is_empty());
    assert_eq!(batch.approximate_size(), BATCH_HEADER_SIZE);
    assert_eq!(batch.iter().count(), 0);
}

// =============================================================================
// Test 5: Malformed input is rejected
// =============================================================================
#[test]
fn malformed_contents_are_corruption() {
    // Too short for a header.
    assert!(WriteBatch::from_contents(vec![0; 5]).unwrap_err().is_corruption());

    // Unknown tag.
    let mut rep = vec![0u8; BATCH_HEADER_SIZE];
    rep[8] = 1;
    rep.extend_from_slice(&[0x07, 1, b'k']);
    assert!(WriteBatch::from_contents(rep).unwrap_err().is_corruption());

    // Header claims more operations than present.
    let mut rep = vec![0u8; BATCH_HEADER_SIZE];
    rep[8] = 3;
    rep.extend_from_slice(&[0x00, 1, b'k']);
    assert!(WriteBatch::from_contents(rep).unwrap_err().is_corruption());
}
