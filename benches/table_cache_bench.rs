//! Benchmarks for table cache lookups.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::path::Path;
use tablecache::util::filename::table_file_path;
use tablecache::{CompressionType, OptionsBuilder, ReadOptions, SSTableWriter, TableCache};
use tempfile::TempDir;

const KEYS_PER_TABLE: usize = 1000;

fn write_tables(dir: &Path, count: u64) -> Vec<u64> {
    (0..count)
        .map(|n| {
            let path = table_file_path(dir, n);
            let mut writer = SSTableWriter::new(&path, CompressionType::None, 10).unwrap();
            for i in 0..KEYS_PER_TABLE {
                let key = format!("key{:08}", i);
                let value = format!("value{:08}", i);
                writer.add(key.as_bytes(), value.as_bytes()).unwrap();
            }
            writer.finish().unwrap().file_size
        })
        .collect()
}

/// Point lookups against tables that are already open.
fn bench_cached_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let sizes = write_tables(dir.path(), 8);
    let cache = TableCache::new(dir.path(), OptionsBuilder::new().build().unwrap(), 64);

    let mut group = c.benchmark_group("cached_get");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("1000_lookups", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                let n = i % 8;
                let key = format!("key{:08}", (i * 7919) % KEYS_PER_TABLE as u64);
                let mut len = 0;
                cache
                    .get(&ReadOptions::default(), n, sizes[n as usize], key.as_bytes(), |_, v| {
                        len = v.len()
                    })
                    .unwrap();
                black_box(len);
            }
        });
    });
    group.finish();
}

/// Lookups that miss the cache and probe several directories first.
fn bench_multi_disk_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_disk_open");

    for num_dirs in [1usize, 4, 8].iter() {
        let root = TempDir::new().unwrap();
        let primary = root.path().join("db");
        let data_dirs: Vec<_> = (0..*num_dirs)
            .map(|i| root.path().join(format!("disk{}", i)))
            .collect();
        let options = OptionsBuilder::new().data_dirs(data_dirs).build().unwrap();
        options.create_data_dirs().unwrap();
        std::fs::create_dir_all(&primary).unwrap();
        // Tables only in the primary directory: every open probes all disks.
        let sizes = write_tables(&primary, 4);
        let cache = TableCache::new(&primary, options, 64);

        group.bench_with_input(BenchmarkId::from_parameter(num_dirs), num_dirs, |b, _| {
            b.iter(|| {
                for n in 0..4u64 {
                    cache.evict(n);
                    let handle = cache.find_table(n, sizes[n as usize]).unwrap();
                    black_box(handle.table().file_size());
                }
            });
        });
    }

    group.finish();
}

/// Full scans through cache iterators.
fn bench_iterator_scan(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let sizes = write_tables(dir.path(), 1);
    let cache = TableCache::new(dir.path(), OptionsBuilder::new().build().unwrap(), 8);

    let mut group = c.benchmark_group("iterator_scan");
    group.throughput(Throughput::Elements(KEYS_PER_TABLE as u64));
    group.bench_function("full_table", |b| {
        b.iter(|| {
            let mut iter = cache.new_iterator(&ReadOptions::default(), 0, sizes[0]);
            iter.seek_to_first().unwrap();
            let mut count = 0;
            while iter.valid() {
                count += 1;
                iter.next().unwrap();
            }
            black_box(count)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_cached_get, bench_multi_disk_open, bench_iterator_scan);
criterion_main!(benches);
