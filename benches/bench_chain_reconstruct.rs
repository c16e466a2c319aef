use std::{hint::black_box, time::Duration};

use criterion::{Criterion, criterion_group, criterion_main};
use rand::prelude::*;

use revision_diff::object::{
    ContentKey, RevisionChain, RevisionId, RevisionRecord, Snapshot, Timestamp,
};

fn build_chain(revisions: usize) -> RevisionChain {
    let mut rng = StdRng::seed_from_u64(1919810);
    let key = ContentKey::new(6, 5);
    let ts = Timestamp::parse("2018-09-04 12:19:34Z").unwrap();
    let mut words: Vec<String> = (0..2_000).map(|i| format!("w{}", i % 97)).collect();
    let snapshot = |words: &[String]| Snapshot::new("A test post", "", words.join(" "));

    let mut chain = RevisionChain::new(key);
    let mut head = RevisionRecord::build_root(RevisionId(1), key, snapshot(&words), ts).unwrap();
    chain.append(head.clone()).unwrap();
    for _ in 1..revisions {
        for _ in 0..20 {
            let i = rng.random_range(0..words.len());
            words[i] = format!("e{}", rng.random_range(0..1_000));
        }
        let next = RevisionRecord::build_next(&head, key, snapshot(&words), ts).unwrap();
        chain.append(next.clone()).unwrap();
        head = next;
    }
    chain
}

fn criterion_benchmark(c: &mut Criterion) {
    let chain = build_chain(50);
    let head = chain.head().unwrap().id();
    c.bench_function("chain_reconstruct_head", |b| {
        b.iter(|| black_box(chain.reconstruct(black_box(head)).unwrap()))
    });
    c.bench_function("chain_validate", |b| b.iter(|| chain.validate().unwrap()));
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(30)
        .warm_up_time(Duration::from_secs(3))
        .noise_threshold(0.1);
    targets = criterion_benchmark
}
criterion_main!(benches);
