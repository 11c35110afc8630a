use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use persistence::journal::{FsyncPolicy, JournalConfig, JournalEntry, JournalWriter};
use persistence::reader::JournalReader;
use tempfile::TempDir;

fn sample_entry(seq: u64) -> JournalEntry {
    JournalEntry::new(
        seq,
        1_708_123_456_789_000_000 + seq as i64,
        "SubmitOrder".to_string(),
        vec![0xAB; 64],
    )
}

fn bench_entry_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("entry_encoding");

    let entry = sample_entry(42);
    group.bench_function("to_bytes", |b| b.iter(|| black_box(entry.to_bytes())));

    let bytes = entry.to_bytes();
    group.bench_function("from_bytes", |b| {
        b.iter(|| black_box(JournalEntry::from_bytes(&bytes).unwrap()))
    });

    group.bench_function("checksum", |b| {
        b.iter(|| black_box(entry.verify_checksum()))
    });

    group.finish();
}

fn bench_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_throughput");

    for &count in [100u64, 1_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("fsync_on_rotation", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || {
                        let tmp = TempDir::new().unwrap();
                        let config = JournalConfig {
                            fsync_policy: FsyncPolicy::OnRotation,
                            ..JournalConfig::new(tmp.path())
                        };
                        (tmp, JournalWriter::open(config).unwrap())
                    },
                    |(_tmp, mut writer)| {
                        for seq in 1..=count {
                            writer.append(&sample_entry(seq)).unwrap();
                        }
                        writer.sync().unwrap();
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );

        group.bench_with_input(
            BenchmarkId::new("fsync_every_100", count),
            &count,
            |b, &count| {
                b.iter_batched(
                    || {
                        let tmp = TempDir::new().unwrap();
                        let config = JournalConfig {
                            fsync_policy: FsyncPolicy::EveryN(100),
                            ..JournalConfig::new(tmp.path())
                        };
                        (tmp, JournalWriter::open(config).unwrap())
                    },
                    |(_tmp, mut writer)| {
                        for seq in 1..=count {
                            writer.append(&sample_entry(seq)).unwrap();
                        }
                        writer.sync().unwrap();
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_replay_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay_throughput");

    for &count in [1_000u64, 10_000].iter() {
        // Build the journal once, read it repeatedly
        let tmp = TempDir::new().unwrap();
        let config = JournalConfig {
            fsync_policy: FsyncPolicy::OnRotation,
            ..JournalConfig::new(tmp.path())
        };
        let mut writer = JournalWriter::open(config).unwrap();
        for seq in 1..=count {
            writer.append(&sample_entry(seq)).unwrap();
        }
        writer.sync().unwrap();

        group.bench_with_input(BenchmarkId::new("read_all", count), &count, |b, _| {
            b.iter(|| {
                let mut reader = JournalReader::open(tmp.path()).unwrap();
                black_box(reader.read_all().unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_entry_encoding,
    bench_append_throughput,
    bench_replay_throughput
);

criterion_main!(benches);
