//! Analyses running against a writer thread that keeps lapping the ring.
//!
//! Every result must either describe one consistent window or come back as
//! `Overrun`; nothing in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tagring_analysis::{Measurement, coincidence, singles, timetrace};
use tagring_store::{BufferSpec, StandardBuffer, StandardTag, StoreError};

const CAPACITY: u64 = 4096;
const SPACING: u64 = 10;
const BATCH: u64 = 512;
const LAPS: u64 = 2_000;

fn alternating(first: u64, n: u64) -> (Vec<u8>, Vec<StandardTag>) {
    let channels = (first..first + n).map(|i| (i % 2) as u8).collect();
    let stamps = (first..first + n).map(|i| StandardTag(i * SPACING)).collect();
    (channels, stamps)
}

/// Fills the ring once, then pushes from a second thread until `done` is set
/// or `LAPS` laps have been written.
fn start_writer(
    mut writer: StandardBuffer,
    done: Arc<AtomicBool>,
) -> thread::JoinHandle<StandardBuffer> {
    let (ch, ts) = alternating(0, CAPACITY);
    writer.push(&ch, &ts).unwrap();
    thread::spawn(move || {
        let mut next = CAPACITY;
        while !done.load(Ordering::Relaxed) && next < LAPS * CAPACITY {
            let (ch, ts) = alternating(next, BATCH);
            next += writer.push(&ch, &ts).unwrap();
        }
        writer
    })
}

#[test]
fn timetrace_is_consistent_or_overrun() {
    let dir = tempfile::tempdir().unwrap();
    let writer =
        StandardBuffer::create_in(dir.path(), "trace", BufferSpec::standard(CAPACITY, 1e-12, 2))
            .unwrap();
    let reader = StandardBuffer::attach_in(dir.path(), "trace").unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let handle = start_writer(writer, done.clone());

    let mut consistent = 0;
    let mut overruns = 0;
    for _ in 0..2_000 {
        match timetrace(&reader, &[0, 1], 1e9, SPACING) {
            Ok(trace) => {
                assert!(trace.len() < CAPACITY as usize, "trace of {}", trace.len());
                assert!(trace.iter().all(|&n| n == 1), "bins other than 1");
                consistent += 1;
            }
            Err(StoreError::Overrun { .. }) => overruns += 1,
            Err(e) => panic!("timetrace failed: {e}"),
        }
    }
    done.store(true, Ordering::Relaxed);
    let writer = handle.join().unwrap();

    // once the writer is idle every read is consistent
    let trace = timetrace(&reader, &[0, 1], 1e9, SPACING).unwrap();
    assert_eq!(trace.len(), CAPACITY as usize - 1);
    assert_eq!(consistent + overruns, 2_000);
    drop(writer);
}

#[test]
fn coincidence_and_singles_are_consistent_or_overrun() {
    let dir = tempfile::tempdir().unwrap();
    let writer =
        StandardBuffer::create_in(dir.path(), "pairs", BufferSpec::standard(CAPACITY, 1e-12, 2))
            .unwrap();
    let reader = StandardBuffer::attach_in(dir.path(), "pairs").unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let handle = start_writer(writer, done.clone());

    let m = Measurement::builder()
        .channels([0u8, 1])
        .radius(SPACING as f64 * 1e-12)
        .read_time(1e9)
        .build()
        .unwrap();

    for _ in 0..1_000 {
        // the whole ring is one window of CAPACITY records
        match coincidence::count(&reader, &m) {
            Ok(found) => assert_eq!(found, CAPACITY - 1),
            Err(StoreError::Overrun { .. }) => {}
            Err(e) => panic!("count failed: {e}"),
        }

        let count = reader.count();
        match singles(&reader, count - CAPACITY / 2, count) {
            Ok(s) => assert_eq!(s.counts, vec![CAPACITY / 4, CAPACITY / 4]),
            Err(StoreError::Overrun { .. }) => {}
            Err(e) => panic!("singles failed: {e}"),
        }
    }
    done.store(true, Ordering::Relaxed);
    let writer = handle.join().unwrap();

    assert_eq!(coincidence::count(&reader, &m).unwrap(), CAPACITY - 1);
    drop(writer);
}
