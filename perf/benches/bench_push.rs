use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tagring_perf::{alternating_stream, bench_root, temp_region_name};
use tagring_store::{BufferSpec, ClockedBuffer, ClockedTag, StandardBuffer};

const CAPACITY: u64 = 1 << 16;

fn bench_standard_push(c: &mut Criterion) {
    let mut buffer = StandardBuffer::create_in(
        bench_root(),
        &temp_region_name("push_std"),
        BufferSpec::standard(CAPACITY, 1e-12, 4),
    )
    .expect("failed to create buffer");

    let mut group = c.benchmark_group("push");
    for batch in [1u64, 64, 4096] {
        let (channels, stamps) = alternating_stream(batch, 4, 10, 0);
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::new("standard", batch), &batch, |b, _| {
            b.iter(|| buffer.push(black_box(&channels), black_box(&stamps)));
        });
    }
    group.finish();
}

fn bench_clocked_push(c: &mut Criterion) {
    let mut buffer = ClockedBuffer::create_in(
        bench_root(),
        &temp_region_name("push_clk"),
        BufferSpec::clocked(CAPACITY, 1e-12, 1e-9, 4),
    )
    .expect("failed to create buffer");

    let batch = 4096u64;
    let channels: Vec<u8> = (0..batch).map(|i| (i % 4) as u8).collect();
    let stamps: Vec<ClockedTag> = (0..batch)
        .map(|i| ClockedTag::new(i / 100, (i % 100) * 10))
        .collect();

    let mut group = c.benchmark_group("push");
    group.throughput(Throughput::Elements(batch));
    group.bench_function(BenchmarkId::new("clocked", batch), |b| {
        b.iter(|| buffer.push(black_box(&channels), black_box(&stamps)));
    });
    group.finish();
}

fn bench_slice(c: &mut Criterion) {
    let mut buffer = StandardBuffer::create_in(
        bench_root(),
        &temp_region_name("slice"),
        BufferSpec::standard(CAPACITY, 1e-12, 4),
    )
    .expect("failed to create buffer");
    // one and a half laps so the copied window straddles the wrap point
    let (channels, stamps) = alternating_stream(CAPACITY + CAPACITY / 2, 4, 10, 0);
    buffer
        .push(&channels[..CAPACITY as usize], &stamps[..CAPACITY as usize])
        .expect("push failed");
    buffer
        .push(&channels[CAPACITY as usize..], &stamps[CAPACITY as usize..])
        .expect("push failed");

    let window = 8192u64;
    let stop = buffer.count();
    let start = stop - window;

    let mut group = c.benchmark_group("slice");
    group.throughput(Throughput::Elements(window));
    group.bench_function("to_vec across wrap", |b| {
        b.iter(|| black_box(buffer.slice_to_vec(black_box(start), black_box(stop))));
    });
    group.finish();
}

criterion_group!(benches, bench_standard_push, bench_clocked_push, bench_slice);
criterion_main!(benches);
