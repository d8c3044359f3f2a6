use std::sync::Arc;
use std::thread;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lsm_commit::env::MemFile;
use lsm_commit::memtable::MemTable;
use lsm_commit::types::ValueType;
use lsm_commit::wal::LogWriter;
use lsm_commit::{DB, Options, WriteBatch, WriteOptions};
use tempfile::tempdir;

const N: usize = 5_000;
const VAL_SIZE: usize = 100;

fn batch_encode(c: &mut Criterion) {
    let value = vec![b'x'; VAL_SIZE];
    c.bench_function("batch_encode_100_puts", |b| {
        b.iter(|| {
            let mut batch = WriteBatch::new();
            for i in 0..100u32 {
                batch.put(&i.to_be_bytes(), &value);
            }
            black_box(batch.approximate_size())
        });
    });
}

fn log_add_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_add_record");
    for size in [100usize, 4096, 100_000] {
        let record = vec![b'r'; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}b"), |b| {
            b.iter_batched(
                || LogWriter::new(MemFile::new()),
                |mut w| w.add_record(&record).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn memtable_insert(c: &mut Criterion) {
    c.bench_function("memtable_insert_5k", |b| {
        b.iter_batched(
            MemTable::new,
            |mem| {
                for i in 0..N as u64 {
                    mem.add(i + 1, ValueType::Value, format!("k{i:08}").as_bytes(), b"v");
                }
                mem
            },
            BatchSize::SmallInput,
        );
    });
}

fn db_put_file(c: &mut Criterion) {
    c.bench_function("db_put_nosync_5k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let db = DB::open(dir.path(), Options::default()).unwrap();
                (dir, db)
            },
            |(_dir, db)| {
                let value = vec![b'x'; VAL_SIZE];
                for i in 0..N {
                    db.put(&WriteOptions::default(), format!("k{i}").as_bytes(), &value)
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn db_concurrent_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("db_concurrent_put");
    for threads in [1usize, 4, 8] {
        group.bench_function(format!("{threads}_threads"), |b| {
            b.iter_batched(
                || Arc::new(DB::with_writer(MemFile::new(), Options::default())),
                |db| {
                    let handles: Vec<_> = (0..threads)
                        .map(|t| {
                            let db = Arc::clone(&db);
                            thread::spawn(move || {
                                for i in 0..N / threads {
                                    let key = format!("t{t}-k{i}");
                                    db.put(&WriteOptions::default(), key.as_bytes(), b"value")
                                        .unwrap();
                                }
                            })
                        })
                        .collect();
                    for h in handles {
                        h.join().unwrap();
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    batch_encode,
    log_add_record,
    memtable_insert,
    db_put_file,
    db_concurrent_put
);
criterion_main!(benches);
