//! E2E tests for the engine lifecycle
//!
//! Verifies ordering rules, idempotent operations, resource release and the
//! terminal destroyed state.

mod common;

use audioscope::{
    AudioEngine, AudioStream, ConfigUpdate, EngineConfig, EngineError, EngineState, FrameQueue,
    RingStream,
};
use common::{Harness, SpyPlatform};
use std::rc::Rc;

fn stream() -> Rc<dyn AudioStream> {
    Rc::new(RingStream::new(44100, 4096))
}

/// Test that a destroyed instance stays destroyed while a fresh one works
#[test]
fn test_initialize_destroy_new_instance() {
    let mut first = Harness::new(SpyPlatform::fft());
    first.engine.initialize(EngineConfig::default()).unwrap();
    first.engine.destroy().unwrap();

    let mut second = Harness::new(SpyPlatform::fft());
    second
        .engine
        .initialize(EngineConfig::default())
        .expect("fresh engine should initialize");
    assert_eq!(second.engine.state(), EngineState::Initialized);

    assert_eq!(
        first.engine.initialize(EngineConfig::default()),
        Err(EngineError::Destroyed)
    );
}

/// Test that a stopped engine can be initialized and run again
#[test]
fn test_initialize_stop_initialize() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), stream());
    h.engine.stop().unwrap();

    h.start(EngineConfig::default(), stream());
    assert_eq!(h.engine.state(), EngineState::Processing);
    assert_eq!(h.counters.contexts.get(), 2, "each initialize allocates a context");
    assert_eq!(h.counters.closes.get(), 1);
}

/// Test that a closed stream is rejected and the engine can connect again
#[test]
fn test_connect_closed_stream_fails() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.engine.initialize(EngineConfig::default()).unwrap();

    let closed = RingStream::new(44100, 4096);
    closed.close();
    let result = h.engine.connect(Rc::new(closed));
    assert!(
        matches!(result, Err(EngineError::ConnectionError(_))),
        "closed stream should fail to connect, got {:?}",
        result
    );
    assert_eq!(h.engine.state(), EngineState::Initialized);

    h.engine
        .connect(stream())
        .expect("live stream should connect after a failed attempt");
    assert_eq!(h.engine.state(), EngineState::Connected);
}

/// Test that a failing context close does not fail stop
#[test]
fn test_stop_swallows_close_failure() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.counters.fail_close.set(true);
    h.start(EngineConfig::default(), stream());
    h.run_frames(2);

    h.engine
        .stop()
        .expect("close failure should be logged, not returned");
    assert_eq!(h.engine.state(), EngineState::Stopped);
    assert_eq!(h.counters.closes.get(), 1);

    h.engine.stop().unwrap();
    assert_eq!(h.counters.closes.get(), 1, "context is closed only once");
}

/// Test that repeated stop releases resources exactly once
#[test]
fn test_repeated_stop_closes_once() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), stream());

    for _ in 0..5 {
        h.engine.stop().expect("stop should be idempotent");
    }
    assert_eq!(h.counters.closes.get(), 1);

    h.engine.destroy().unwrap();
    h.engine.destroy().unwrap();
    assert_eq!(h.counters.closes.get(), 1, "destroy after stop must not close again");
}

/// Test that destroy releases an un-stopped engine
#[test]
fn test_destroy_releases_resources() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), stream());

    h.engine.destroy().unwrap();
    assert_eq!(h.counters.closes.get(), 1);
    assert_eq!(h.frames.pending(), 0);
}

/// Test that every operation except destroy fails after destroy
#[test]
fn test_operations_fail_after_destroy() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), stream());
    h.engine.destroy().unwrap();

    let e = &mut h.engine;
    assert_eq!(e.initialize(EngineConfig::default()), Err(EngineError::Destroyed));
    assert_eq!(e.connect(stream()), Err(EngineError::Destroyed));
    assert_eq!(e.start(), Err(EngineError::Destroyed));
    assert_eq!(e.pause(), Err(EngineError::Destroyed));
    assert_eq!(e.resume(), Err(EngineError::Destroyed));
    assert_eq!(e.stop(), Err(EngineError::Destroyed));
    assert_eq!(
        e.reconfigure(ConfigUpdate::default()),
        Err(EngineError::Destroyed)
    );
    assert_eq!(e.frequency_data(), Err(EngineError::Destroyed));
    assert_eq!(e.time_domain_data(), Err(EngineError::Destroyed));
    assert_eq!(e.audio_level(), Err(EngineError::Destroyed));
    assert_eq!(e.is_audio_active(), Err(EngineError::Destroyed));
    assert_eq!(e.dominant_frequency(), Err(EngineError::Destroyed));
    assert_eq!(e.frequency_bands(4), Err(EngineError::Destroyed));
    assert!(e.audio_stats().is_err());
    assert!(e.metrics().is_err());
    assert_eq!(e.on_audio_level_change(|_| {}), Err(EngineError::Destroyed));
    assert_eq!(e.clear_callbacks(), Err(EngineError::Destroyed));

    assert_eq!(e.destroy(), Ok(()), "destroy stays idempotent");
    assert_eq!(e.state(), EngineState::Destroyed);
}

/// Test that misordered operations report the matching error
#[test]
fn test_ordering_errors() {
    let mut h = Harness::new(SpyPlatform::fft());
    assert_eq!(h.engine.connect(stream()), Err(EngineError::NotInitialized));
    assert_eq!(h.engine.start(), Err(EngineError::NotInitialized));
    assert_eq!(
        h.engine.reconfigure(ConfigUpdate::default()),
        Err(EngineError::NotInitialized)
    );

    h.engine.initialize(EngineConfig::default()).unwrap();
    assert_eq!(
        h.engine.initialize(EngineConfig::default()),
        Err(EngineError::AlreadyInitialized)
    );
    assert_eq!(h.engine.start(), Err(EngineError::NotConnected));

    h.engine.connect(stream()).unwrap();
    assert_eq!(h.engine.connect(stream()), Err(EngineError::AlreadyConnected));
    assert!(matches!(
        h.engine.resume(),
        Err(EngineError::InvalidTransition { state: EngineState::Connected, .. })
    ));
}

/// Test that pause outside processing is a no-op
#[test]
fn test_pause_is_idempotent() {
    let mut h = Harness::new(SpyPlatform::fft());
    h.engine.pause().expect("pause before initialize is a no-op");
    assert_eq!(h.engine.state(), EngineState::Uninitialized);

    h.start(EngineConfig::default(), stream());
    h.engine.pause().unwrap();
    h.engine.pause().unwrap();
    assert_eq!(h.engine.state(), EngineState::Paused);
    assert_eq!(h.counters.suspends.get(), 1, "context suspended once");

    h.engine.start().expect("start resumes a paused engine");
    assert_eq!(h.engine.state(), EngineState::Processing);
}

/// Test that the engine never closes or retains the caller's stream
#[test]
fn test_engine_never_closes_stream() {
    let ring = RingStream::new(44100, 4096);
    let shared: Rc<dyn AudioStream> = Rc::new(ring.clone());

    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), Rc::clone(&shared));
    h.run_frames(2);
    h.engine.stop().unwrap();
    h.engine.destroy().unwrap();

    assert!(shared.is_live(), "stream should stay open after destroy");
    assert_eq!(Rc::strong_count(&shared), 1, "engine released its reference");

    ring.push(&[0.25; 64]);
    assert_eq!(ring.len(), 64);
}

/// Test that stop clears buffers and metrics
#[test]
fn test_stop_resets_telemetry() {
    let ring = RingStream::new(44100, 4096);
    let mut h = Harness::new(SpyPlatform::fft());
    h.start(EngineConfig::default(), Rc::new(ring.clone()));
    ring.push(&[0.9; 2048]);
    h.run_frames(1);
    assert!(h.engine.audio_level().unwrap() > 0.0);

    h.engine.stop().unwrap();
    assert!(h.engine.frequency_data().unwrap().is_empty());
    assert_eq!(h.engine.audio_level().unwrap(), 0.0);
    assert!(!h.engine.is_audio_active().unwrap());
}

/// Test that dropping the engine cancels its pending tick
#[test]
fn test_drop_cancels_ticks() {
    let frames = FrameQueue::new();
    {
        let mut engine = AudioEngine::new(Rc::new(frames.clone())).unwrap();
        engine.initialize(EngineConfig::default()).unwrap();
        engine.connect(stream()).unwrap();
        engine.start().unwrap();
        assert_eq!(frames.pending(), 1);
    }
    assert_eq!(frames.pending(), 0);
    assert_eq!(frames.run_frame(), 0);
}
