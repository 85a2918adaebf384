use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nativex::{MappedTrie, PatriciaTrie};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

// Deterministic pseudo-words with plenty of shared prefixes
fn generate_words(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let stems = ["new", "san", "saint", "port", "north", "lake", "fort", "mount"];
    (0..count)
        .map(|_| {
            let stem = stems[rng.random_range(0..stems.len())];
            let tail: String = (0..rng.random_range(2..10))
                .map(|_| (b'a' + rng.random_range(0..26u8)) as char)
                .collect();
            format!("{} {}", stem, tail)
        })
        .collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("patricia_insert");

    for size in [1_000, 10_000, 100_000] {
        let words = generate_words(size, 42);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &words, |b, words| {
            b.iter(|| {
                let trie: PatriciaTrie = words.iter().collect();
                black_box(trie.len());
            });
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("patricia_search");

    let words = generate_words(50_000, 42);
    let probes = generate_words(1_000, 7);
    let trie: PatriciaTrie = words.iter().collect();
    let mapped = MappedTrie::from_bytes(trie.to_bytes().unwrap()).unwrap();

    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("mutable", |b| {
        b.iter(|| {
            let mut matched = 0;
            for probe in &probes {
                matched += trie.search(black_box(probe));
            }
            black_box(matched);
        });
    });
    group.bench_function("mapped", |b| {
        b.iter(|| {
            let mut matched = 0;
            for probe in &probes {
                matched += mapped.search(black_box(probe));
            }
            black_box(matched);
        });
    });
    group.bench_function("mapped_longest_match", |b| {
        b.iter(|| {
            let mut found = 0;
            for probe in &probes {
                found += mapped.longest_match(black_box(probe.as_bytes())).is_some() as usize;
            }
            black_box(found);
        });
    });

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let words = generate_words(50_000, 42);
    let trie: PatriciaTrie = words.iter().collect();
    let bytes = trie.to_bytes().unwrap();

    c.bench_function("patricia_to_bytes_50k", |b| {
        b.iter(|| black_box(trie.to_bytes().unwrap().len()));
    });
    c.bench_function("patricia_load_verified_50k", |b| {
        b.iter(|| {
            let mapped = MappedTrie::from_bytes(black_box(bytes.clone())).unwrap();
            black_box(mapped.checksum_ok());
        });
    });
}

criterion_group!(benches, bench_insert, bench_search, bench_serialize);
criterion_main!(benches);
