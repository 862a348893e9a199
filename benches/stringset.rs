use criterion::Criterion;
use criterion::Throughput;
use criterion::{criterion_group, criterion_main};
use hopset::FnvHasher;
use rand::{thread_rng, Rng};
use std::hash::BuildHasherDefault;

const NUM_KEYS: usize = 1 << 14;
const OPS_PER_ITER: u64 = NUM_KEYS as u64 * 2;

fn generate_keys() -> Vec<[u8; 16]> {
    let mut rng = thread_rng();
    (0..NUM_KEYS)
        .map(|_| {
            let mut key = [0u8; 16];
            rng.fill(&mut key);
            key
        })
        .collect()
}

fn bench_hopset_stringset(c: &mut Criterion) {
    let keys = generate_keys();

    let mut group = c.benchmark_group("hopset_stringset");
    group.throughput(Throughput::Elements(OPS_PER_ITER));
    group.sample_size(10);
    group.bench_function("insert_and_remove", |b| {
        let mut set = hopset::StringSet::with_capacity_and_hasher(
            NUM_KEYS,
            BuildHasherDefault::<FnvHasher>::default(),
        );

        b.iter(|| {
            for key in keys.iter() {
                set.insert(key);
            }
            for key in keys.iter() {
                set.remove(key);
            }
        })
    });
    group.bench_function("contains", |b| {
        let mut set = hopset::StringSet::with_capacity_and_hasher(
            NUM_KEYS,
            BuildHasherDefault::<FnvHasher>::default(),
        );
        for key in keys.iter().step_by(2) {
            set.insert(key);
        }

        b.iter(|| {
            let mut found = 0usize;
            for key in keys.iter() {
                if set.contains(key) {
                    found += 1;
                }
            }
            found
        })
    });
    group.finish();
}

fn bench_std_hashset(c: &mut Criterion) {
    let keys = generate_keys();

    let mut group = c.benchmark_group("std_hashset");
    group.throughput(Throughput::Elements(OPS_PER_ITER));
    group.sample_size(10);
    group.bench_function("insert_and_remove", |b| {
        let mut set = std::collections::HashSet::with_capacity_and_hasher(
            NUM_KEYS,
            BuildHasherDefault::<FnvHasher>::default(),
        );

        b.iter(|| {
            for key in keys.iter() {
                set.insert(*key);
            }
            for key in keys.iter() {
                set.remove(key);
            }
        })
    });
    group.bench_function("contains", |b| {
        let mut set = std::collections::HashSet::with_capacity_and_hasher(
            NUM_KEYS,
            BuildHasherDefault::<FnvHasher>::default(),
        );
        for key in keys.iter().step_by(2) {
            set.insert(*key);
        }

        b.iter(|| {
            let mut found = 0usize;
            for key in keys.iter() {
                if set.contains(key) {
                    found += 1;
                }
            }
            found
        })
    });
    group.finish();
}

criterion_group!(benches, bench_hopset_stringset, bench_std_hashset);
criterion_main!(benches);
