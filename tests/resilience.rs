//! Recovery from overflow, stalled datagrams and corrupted lines.

mod common;

use std::time::{Duration, Instant};

use common::{list_entry, seal, LIST_PREFIX};
use smlbridge::config::PipelineConfig;
use smlbridge::errors::PipelineError;
use smlbridge::pipeline::{Pipeline, TickOutcome};
use smlbridge::sink::{JsonFileSink, RegisterBank};
use smlbridge::sml::{FramerState, DEFAULT_BUFFER_CAPACITY, METRICS, START_SEQUENCE};
use smlbridge::source::ReplaySource;

fn drain(pipeline: &mut Pipeline<RegisterBank>, source: &mut ReplaySource) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    while !source.is_exhausted() {
        match pipeline.tick(source, Instant::now()).unwrap() {
            TickOutcome::Idle => {}
            other => outcomes.push(other),
        }
    }
    outcomes
}

#[test]
fn overflow_boundary_at_default_capacity() {
    let mut p = Pipeline::new(&PipelineConfig::default(), RegisterBank::new(4));

    // Start marker plus body filling the buffer up to capacity minus the tail.
    let mut bytes = START_SEQUENCE.to_vec();
    bytes.extend(std::iter::repeat(0u8).take(DEFAULT_BUFFER_CAPACITY - 3 - START_SEQUENCE.len()));
    let mut src = ReplaySource::new(bytes);
    assert!(matches!(
        p.tick(&mut src, Instant::now()).unwrap(),
        TickOutcome::Idle
    ));
    assert_eq!(p.state(), FramerState::Accumulate);

    let mut one_more = ReplaySource::new(vec![0u8]);
    assert!(matches!(
        p.tick(&mut one_more, Instant::now()).unwrap(),
        TickOutcome::Rejected(PipelineError::BufferOverflow { capacity: 3840 })
    ));
    assert_eq!(p.state(), FramerState::WaitStart { matched: 0 });
}

#[test]
fn largest_datagram_fits() {
    // Body (start marker, payload, end marker) of capacity - 3 plus the tail.
    let payload_len = DEFAULT_BUFFER_CAPACITY - 3 - START_SEQUENCE.len() - 5;
    let mut payload = LIST_PREFIX.to_vec();
    payload.extend(list_entry(METRICS[2].pattern, 250, 0x1B, 0));
    payload.resize(payload_len, 0x00);
    let datagram = seal(&payload);
    assert_eq!(datagram.len(), DEFAULT_BUFFER_CAPACITY);

    let mut p = Pipeline::new(&PipelineConfig::default(), RegisterBank::new(4));
    let mut src = ReplaySource::new(datagram);
    let outcomes = drain(&mut p, &mut src);
    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        TickOutcome::Published(report) => {
            assert_eq!(report.length, DEFAULT_BUFFER_CAPACITY);
            assert_eq!(report.published.len(), 1);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(p.sink().get(2), Some(250_000));
}

#[test]
fn recovers_after_overflow() {
    let config = PipelineConfig {
        buffer_capacity: 128,
        ..PipelineConfig::default()
    };
    let mut p = Pipeline::new(&config, RegisterBank::new(4));

    // A start marker whose end never arrives, then a good datagram.
    let mut stream = START_SEQUENCE.to_vec();
    stream.extend(std::iter::repeat(0x42u8).take(200));
    let mut payload = vec![0x76, 0x01];
    payload.extend(list_entry(METRICS[0].pattern, 5, 0x1E, 0));
    stream.extend(seal(&payload));

    let mut src = ReplaySource::new(stream);
    let outcomes = drain(&mut p, &mut src);
    assert_eq!(outcomes.len(), 2, "{:?}", outcomes);
    assert!(matches!(
        outcomes[0],
        TickOutcome::Rejected(PipelineError::BufferOverflow { capacity: 128 })
    ));
    assert!(matches!(outcomes[1], TickOutcome::Published(_)));
    assert_eq!(p.sink().get(0), Some(5_000));
    assert_eq!(p.stats().snapshot().buffer_overflows, 1);
}

#[test]
fn stalled_datagram_times_out_then_next_one_succeeds() {
    let mut payload = LIST_PREFIX.to_vec();
    payload.extend(list_entry(METRICS[1].pattern, 3, 0x1E, 0));
    let datagram = seal(&payload);

    let mut p = Pipeline::new(&PipelineConfig::default(), RegisterBank::new(4));
    let t0 = Instant::now();

    // Half a datagram, then the line goes quiet.
    let mut first_half = ReplaySource::new(datagram[..datagram.len() / 2].to_vec());
    assert!(matches!(
        p.tick(&mut first_half, t0).unwrap(),
        TickOutcome::Idle
    ));

    let mut quiet = ReplaySource::new(Vec::new());
    for secs in [1, 10, 30] {
        assert!(matches!(
            p.tick(&mut quiet, t0 + Duration::from_secs(secs)).unwrap(),
            TickOutcome::Idle
        ));
    }
    assert!(matches!(
        p.tick(&mut quiet, t0 + Duration::from_millis(30_001)).unwrap(),
        TickOutcome::TimedOut
    ));
    assert_eq!(p.state(), FramerState::WaitStart { matched: 0 });

    let t1 = t0 + Duration::from_secs(40);
    let mut full = ReplaySource::new(datagram);
    assert!(matches!(
        p.tick(&mut full, t1).unwrap(),
        TickOutcome::Published(_)
    ));
    assert_eq!(p.sink().get(1), Some(3_000));
    assert_eq!(p.stats().snapshot().timeouts, 1);
}

#[test]
fn tail_mismatch_drops_only_that_datagram() {
    let mut payload = LIST_PREFIX.to_vec();
    payload.extend(list_entry(METRICS[0].pattern, 9, 0x1E, 0));
    let good = seal(&payload);
    let mut bad = good.clone();
    let last = bad.len() - 1;
    bad[last] ^= 0x80;

    let mut stream = bad;
    stream.extend_from_slice(&good);
    let mut p = Pipeline::new(&PipelineConfig::default(), RegisterBank::new(4));
    let mut src = ReplaySource::new(stream);
    let outcomes = drain(&mut p, &mut src);

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        outcomes[0],
        TickOutcome::Rejected(PipelineError::ChecksumMismatch { .. })
    ));
    assert!(matches!(outcomes[1], TickOutcome::Published(_)));
    assert_eq!(p.sink().writes(), 1);
    let stats = p.stats().snapshot();
    assert_eq!(stats.datagrams_framed, 2);
    assert_eq!(stats.datagrams_valid, 1);
    assert_eq!(stats.checksum_mismatches, 1);
}

#[test]
fn file_sink_mirrors_published_registers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registers.json");

    let mut payload = LIST_PREFIX.to_vec();
    payload.extend(list_entry(METRICS[0].pattern, 916, 0x1E, -1));
    payload.extend(list_entry(METRICS[2].pattern, -42, 0x1B, 0));

    let mut p = Pipeline::new(&PipelineConfig::default(), JsonFileSink::new(&path, 4));
    let mut src = ReplaySource::new(seal(&payload));
    let mut published = false;
    while !src.is_exhausted() {
        if let TickOutcome::Published(report) = p.tick(&mut src, Instant::now()).unwrap() {
            assert_eq!(report.published.len(), 2);
            published = true;
        }
    }
    assert!(published);

    let snapshot = JsonFileSink::load_snapshot(&path).unwrap();
    assert_eq!(
        snapshot.registers,
        vec![Some(91_600), None, Some(-42_000), None]
    );
    assert_eq!(p.into_sink().bank().writes(), 2);
}
