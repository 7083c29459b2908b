//! End-to-end checks of the store and measurements through the public API,
//! with a writer handle and a separately attached reader handle.

use tagring_analysis::{Measurement, coincidence, singles};
use tagring_store::{
    BufferSpec, ClockedBuffer, ClockedTag, StandardBuffer, StandardTag, StoreError,
};

fn alternating(n: u64) -> (Vec<u8>, Vec<StandardTag>) {
    let channels = (0..n).map(|t| (t % 2) as u8).collect();
    let stamps = (0..n).map(StandardTag).collect();
    (channels, stamps)
}

#[test]
fn alternating_close_events_give_seven_coincidences() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer =
        StandardBuffer::create_in(dir.path(), "pairs", BufferSpec::standard(8, 1e-12, 2)).unwrap();
    let (channels, stamps) = alternating(8);
    writer.push(&channels, &stamps).unwrap();

    let reader = StandardBuffer::attach_in(dir.path(), "pairs").unwrap();
    let m = Measurement::builder()
        .channels([0u8, 1])
        .delays([0.0, 0.0])
        .radius(1e-12)
        .read_time(1.0)
        .build()
        .unwrap();
    assert_eq!(coincidence::count(&reader, &m).unwrap(), 7);

    let mut out = Vec::new();
    assert_eq!(coincidence::collect(&reader, &m, &mut out).unwrap(), 7);
    assert_eq!(out.len(), 14);
    assert_eq!(&out[..2], &[StandardTag(0), StandardTag(1)]);
}

#[test]
fn clocked_arrival_combines_coarse_and_fine() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = ClockedBuffer::create_in(
        dir.path(),
        "clocked",
        BufferSpec::clocked(16, 1e-12, 1e-9, 1),
    )
    .unwrap();
    assert_eq!(writer.conversion_factor(), 1000);
    writer.push_record(0, ClockedTag::new(1, 500)).unwrap();

    let reader = ClockedBuffer::attach_in(dir.path(), "clocked").unwrap();
    assert_eq!(reader.arrival_time_at(0), 1500);
    assert_eq!(reader.lower_bound(1500), 0);
    assert_eq!(reader.lower_bound(1501), 1);
}

#[test]
fn mismatched_push_leaves_count_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer =
        StandardBuffer::create_in(dir.path(), "bad_push", BufferSpec::standard(16, 1e-12, 1))
            .unwrap();
    let (channels, stamps) = alternating(10);
    let result = writer.push_range(0, 10, &channels, &stamps[..9]);
    assert!(matches!(result, Err(StoreError::CapacityMismatch { .. })));
    assert_eq!(writer.count(), 0);
}

#[test]
fn singles_across_the_wrap_point() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer =
        StandardBuffer::create_in(dir.path(), "wrap", BufferSpec::standard(8, 1e-12, 2)).unwrap();
    let (channels, stamps) = alternating(10);
    writer.push(&channels[..8], &stamps[..8]).unwrap();
    writer.push(&channels[8..], &stamps[8..]).unwrap();

    let reader = StandardBuffer::attach_in(dir.path(), "wrap").unwrap();
    let s = singles(&reader, 6, 10).unwrap();
    assert_eq!(s.total, 4);
    assert_eq!(s.counts, vec![2, 2]);
}

#[test]
fn region_outlives_its_creator_while_attached() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer =
        StandardBuffer::create_in(dir.path(), "handoff", BufferSpec::standard(8, 1e-12, 2))
            .unwrap();
    let (channels, stamps) = alternating(4);
    writer.push(&channels, &stamps).unwrap();

    let reader = StandardBuffer::attach_in(dir.path(), "handoff").unwrap();
    drop(writer);
    assert_eq!(reader.count(), 4);
    assert_eq!(reader.reference_count(), 1);
    assert!(reader.detach().unwrap());
    assert!(matches!(
        StandardBuffer::attach_in(dir.path(), "handoff"),
        Err(StoreError::NotFound(_))
    ));
}
