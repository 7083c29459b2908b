use std::path::PathBuf;
use tagring_store::{BufferSpec, StandardBuffer, StandardTag};

/// Directory benchmark regions are created in.
pub fn bench_root() -> PathBuf {
    std::env::temp_dir()
}

/// Region name unique to this process.
pub fn temp_region_name(label: &str) -> String {
    let pid = std::process::id();
    format!("tagring_bench_{label}_{pid}")
}

/// `n` records cycling over `channels`, `spacing` arrival bins apart,
/// starting at `first`.
pub fn alternating_stream(
    n: u64,
    channels: u8,
    spacing: u64,
    first: u64,
) -> (Vec<u8>, Vec<StandardTag>) {
    let channels = channels.max(1);
    let ch = (0..n).map(|i| (i % u64::from(channels)) as u8).collect();
    let ts = (0..n).map(|i| StandardTag(first + i * spacing)).collect();
    (ch, ts)
}

/// A standard buffer of `capacity` slots at 1 ps resolution, filled to
/// capacity with an alternating stream. The region is removed when the
/// returned handle is dropped.
pub fn filled_standard_buffer(label: &str, capacity: u64, channels: u8) -> StandardBuffer {
    let spec = BufferSpec::standard(capacity, 1e-12, channels);
    let mut buffer = StandardBuffer::create_in(bench_root(), &temp_region_name(label), spec)
        .expect("failed to create bench buffer");
    let (ch, ts) = alternating_stream(capacity, channels, 10, 0);
    buffer.push(&ch, &ts).expect("failed to fill bench buffer");
    buffer
}
