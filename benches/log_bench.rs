use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oatc::item::{self, ItemFeatures};
use oatc::query::{scan_all_metadata, tail};
use oatc::store::{self, LogStore};
use std::io::Cursor;

fn fresh_bytes_with(n: u64) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    store::write_header(&mut buf).unwrap();
    let mut store = LogStore::from_stream(buf).unwrap();
    for id in 0..n {
        let bytes = item::encode(
            id,
            &ItemFeatures { timestamp: Some(id as i64), ..Default::default() },
            b"benchmark payload bytes",
        );
        store.push_item(&bytes).unwrap();
        store.write_stack_ptr().unwrap();
    }
    store.into_inner().into_inner()
}

fn bench_push(c: &mut Criterion) {
    c.bench_function("push_1000_items", |b| {
        b.iter(|| {
            let mut buf = Cursor::new(Vec::new());
            store::write_header(&mut buf).unwrap();
            let mut store = LogStore::from_stream(buf).unwrap();
            for id in 0..1000u64 {
                let bytes = item::encode(id, &ItemFeatures::default(), b"hello world");
                store.push_item(black_box(&bytes)).unwrap();
                store.write_stack_ptr().unwrap();
            }
        })
    });
}

fn bench_scan(c: &mut Criterion) {
    let bytes = fresh_bytes_with(10_000);
    c.bench_function("scan_all_metadata_10k", |b| {
        b.iter_batched(
            || LogStore::from_stream(Cursor::new(bytes.clone())).unwrap(),
            |mut store| {
                let count = scan_all_metadata(&mut store).filter(|m| m.is_ok()).count();
                black_box(count)
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_tail(c: &mut Criterion) {
    let bytes = fresh_bytes_with(10_000);
    c.bench_function("tail_50_of_10k", |b| {
        b.iter_batched(
            || LogStore::from_stream(Cursor::new(bytes.clone())).unwrap(),
            |mut store| black_box(tail(&mut store, 50).unwrap()),
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_push, bench_scan, bench_tail);
criterion_main!(benches);
