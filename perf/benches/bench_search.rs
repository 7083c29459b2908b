use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tagring_perf::filled_standard_buffer;

const CAPACITY: u64 = 1 << 20;

fn bench_lower_bound(c: &mut Criterion) {
    let buffer = filled_standard_buffer("search", CAPACITY, 2);
    let newest = buffer.newest_arrival().unwrap_or(0);

    let mut group = c.benchmark_group("search");
    group.bench_function("lower_bound newest", |b| {
        b.iter(|| buffer.lower_bound(black_box(newest)));
    });
    group.bench_function("lower_bound midpoint", |b| {
        b.iter(|| buffer.lower_bound(black_box(newest / 2)));
    });
    group.bench_function("lower_bound past end", |b| {
        b.iter(|| buffer.lower_bound(black_box(newest + 1)));
    });
    group.finish();
}

criterion_group!(benches, bench_lower_bound);
criterion_main!(benches);
