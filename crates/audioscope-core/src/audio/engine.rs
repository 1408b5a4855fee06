//! Audio analysis engine
//!
//! Provides high-level interface for:
//! - Lifecycle management (initialize, connect, start/pause/resume/stop, destroy)
//! - Cooperative frame-driven processing on a host [`FrameScheduler`]
//! - Callback delivery of snapshots, levels and activity transitions
//!
//! ## Processing
//!
//! Each tick samples the analyzer, derives metrics and invokes callbacks in
//! a fixed order: `on_audio_data`, `on_audio_level_change`,
//! `on_activity_change`. The engine state is re-checked before each of those
//! steps, so a callback that stops the engine prevents every later callback
//! in the same tick. No engine borrow is held while callbacks run; callbacks
//! may control the engine through an [`EngineHandle`].
//!
//! The engine is single-threaded (`Rc`/`RefCell`) and never blocks.

use super::analyzer::SpectralAnalyzer;
use super::metrics::{self, level_changed, ActivityTracker, AudioStats};
use super::platform::{default_platform, AudioPlatform, ProcessingContext};
use super::processing::ProcessingLoop;
use super::scheduler::{FrameHandle, FrameScheduler};
use super::state::{EngineState, Operation, Transition};
use super::stream::AudioStream;
use super::types::{AudioSnapshot, DerivedMetrics};
use crate::config::{ConfigUpdate, EngineConfig};
use crate::error::{ContextError, EngineError, Result};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

type AudioDataHandler = Rc<RefCell<dyn FnMut(&AudioSnapshot, &DerivedMetrics)>>;
type LevelHandler = Rc<RefCell<dyn FnMut(f32)>>;
type ActivityHandler = Rc<RefCell<dyn FnMut(bool)>>;

/// Registered callbacks
///
/// Dispatch works on clones of these handles, so clearing a slot while a
/// callback runs is safe.
#[derive(Clone, Default)]
struct Callbacks {
    on_audio_data: Option<AudioDataHandler>,
    on_level_change: Option<LevelHandler>,
    on_activity_change: Option<ActivityHandler>,
}

struct EngineInner {
    state: EngineState,
    config: EngineConfig,
    platform: Box<dyn AudioPlatform>,
    context: Option<Box<dyn ProcessingContext>>,
    analyzer: Option<Box<dyn SpectralAnalyzer>>,
    processing: ProcessingLoop,
    /// Current frequency and waveform buffers
    snapshot: AudioSnapshot,
    metrics: DerivedMetrics,
    activity: ActivityTracker,
    last_notified_level: f32,
    callbacks: Callbacks,
}

/// Everything a tick hands to callbacks once the engine borrow is released
struct TickDispatch {
    snapshot: AudioSnapshot,
    metrics: DerivedMetrics,
    level: Option<f32>,
    activity: Option<bool>,
    callbacks: Callbacks,
}

impl EngineInner {
    fn reset_buffers(&mut self) {
        self.snapshot = AudioSnapshot::silent(self.config.fft_size);
        self.metrics = DerivedMetrics::zeroed(self.config.band_count);
        self.activity.reset();
        self.last_notified_level = 0.0;
    }

    /// Release the analyzer and context; safe to call repeatedly
    fn teardown(&mut self) {
        self.processing.cancel();

        if let Some(mut analyzer) = self.analyzer.take() {
            analyzer.disconnect();
        }
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.close() {
                tracing::warn!("Ignoring processing context close failure: {}", e);
            }
        }

        self.snapshot = AudioSnapshot::default();
        self.metrics = DerivedMetrics::zeroed(self.config.band_count);
        self.activity.reset();
        self.last_notified_level = 0.0;
    }

    fn process_tick(&mut self) -> TickDispatch {
        let (snapshot, sample_rate, fft_size) = match self.analyzer.as_mut() {
            Some(analyzer) => {
                let snapshot = analyzer.sample();
                (snapshot, analyzer.sample_rate(), analyzer.fft_size())
            }
            None => (AudioSnapshot::default(), 0, self.config.fft_size),
        };

        let metrics = DerivedMetrics::derive(
            &snapshot,
            sample_rate,
            fft_size,
            self.config.activity_threshold,
            self.config.band_count,
        );

        let level = if level_changed(self.last_notified_level, metrics.level, self.config.level_epsilon)
        {
            self.last_notified_level = metrics.level;
            Some(metrics.level)
        } else {
            None
        };
        let activity = self.activity.update(metrics.is_active);

        self.snapshot = snapshot.clone();
        self.metrics = metrics.clone();

        tracing::trace!(
            level = metrics.level,
            active = metrics.is_active,
            "Processed tick {}",
            self.processing.ticks()
        );

        TickDispatch {
            snapshot,
            metrics,
            level,
            activity,
            callbacks: self.callbacks.clone(),
        }
    }
}

/// Run `callback`, logging instead of propagating a panic
fn invoke_guarded(name: &str, callback: impl FnOnce()) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("{} callback panicked: {}", name, message);
    }
}

fn is_processing(inner: &Rc<RefCell<EngineInner>>) -> bool {
    inner.borrow().state == EngineState::Processing
}

impl TickDispatch {
    fn deliver(self, inner: &Rc<RefCell<EngineInner>>) {
        let TickDispatch {
            snapshot,
            metrics,
            level,
            activity,
            callbacks,
        } = self;

        if let Some(handler) = &callbacks.on_audio_data {
            if !is_processing(inner) {
                return;
            }
            invoke_guarded("on_audio_data", || {
                let mut callback = handler.borrow_mut();
                (&mut *callback)(&snapshot, &metrics);
            });
        }

        if let (Some(level), Some(handler)) = (level, &callbacks.on_level_change) {
            if !is_processing(inner) {
                return;
            }
            invoke_guarded("on_audio_level_change", || {
                let mut callback = handler.borrow_mut();
                (&mut *callback)(level);
            });
        }

        if let (Some(active), Some(handler)) = (activity, &callbacks.on_activity_change) {
            if !is_processing(inner) {
                return;
            }
            invoke_guarded("on_activity_change", || {
                let mut callback = handler.borrow_mut();
                (&mut *callback)(active);
            });
        }
    }
}

/// Schedule the next tick if none is pending
fn schedule_tick(inner: &Rc<RefCell<EngineInner>>, engine: &mut EngineInner) {
    let weak = Rc::downgrade(inner);
    engine
        .processing
        .schedule_with(move || Box::new(move |handle| run_tick(&weak, handle)));
}

/// Tick body executed by the host scheduler
fn run_tick(weak: &Weak<RefCell<EngineInner>>, handle: FrameHandle) {
    let Some(inner) = weak.upgrade() else {
        return;
    };

    let dispatch = {
        let mut engine = inner.borrow_mut();
        if !engine.processing.begin_tick(handle) {
            return;
        }
        if engine.state != EngineState::Processing {
            engine.processing.end_tick();
            return;
        }
        engine.process_tick()
    };

    dispatch.deliver(&inner);

    let mut engine = inner.borrow_mut();
    engine.processing.end_tick();
    if engine.state == EngineState::Processing {
        schedule_tick(&inner, &mut engine);
    }
}

fn log_context_error(action: &str, error: ContextError) {
    match error {
        ContextError::SuspendUnsupported => {
            tracing::debug!("Processing context cannot {}", action)
        }
        other => tracing::warn!("Failed to {} processing context: {}", action, other),
    }
}

fn start_engine(inner: &Rc<RefCell<EngineInner>>) -> Result<()> {
    let mut engine = inner.borrow_mut();
    let from = engine.state;
    match from.transition(Operation::Start)? {
        Transition::Stay => {
            tracing::debug!("start ignored: already processing");
            Ok(())
        }
        Transition::To(next) => {
            if from == EngineState::Paused {
                if let Some(context) = engine.context.as_mut() {
                    if let Err(e) = context.resume() {
                        log_context_error("resume", e);
                    }
                }
            }
            engine.state = next;
            schedule_tick(inner, &mut engine);
            tracing::info!("Audio engine processing");
            Ok(())
        }
    }
}

fn pause_engine(inner: &Rc<RefCell<EngineInner>>) -> Result<()> {
    let mut engine = inner.borrow_mut();
    match engine.state.transition(Operation::Pause)? {
        Transition::Stay => {
            tracing::debug!("pause ignored while {:?}", engine.state);
            Ok(())
        }
        Transition::To(next) => {
            engine.processing.cancel();
            if let Some(context) = engine.context.as_mut() {
                if let Err(e) = context.suspend() {
                    log_context_error("suspend", e);
                }
            }
            engine.state = next;
            tracing::info!("Audio engine paused");
            Ok(())
        }
    }
}

fn resume_engine(inner: &Rc<RefCell<EngineInner>>) -> Result<()> {
    let mut engine = inner.borrow_mut();
    match engine.state.transition(Operation::Resume)? {
        Transition::Stay => {
            tracing::debug!("resume ignored: already processing");
            Ok(())
        }
        Transition::To(next) => {
            if let Some(context) = engine.context.as_mut() {
                if let Err(e) = context.resume() {
                    log_context_error("resume", e);
                }
            }
            engine.state = next;
            schedule_tick(inner, &mut engine);
            tracing::info!("Audio engine resumed");
            Ok(())
        }
    }
}

fn stop_engine(inner: &Rc<RefCell<EngineInner>>) -> Result<()> {
    let mut engine = inner.borrow_mut();
    match engine.state.transition(Operation::Stop)? {
        Transition::Stay => {
            tracing::debug!("stop ignored while {:?}", engine.state);
            Ok(())
        }
        Transition::To(next) => {
            engine.teardown();
            engine.state = next;
            tracing::info!("Audio engine stopped");
            Ok(())
        }
    }
}

fn destroy_engine(inner: &Rc<RefCell<EngineInner>>) -> Result<()> {
    let mut engine = inner.borrow_mut();
    match engine.state.transition(Operation::Destroy)? {
        Transition::Stay => Ok(()),
        Transition::To(next) => {
            engine.teardown();
            engine.callbacks = Callbacks::default();
            engine.state = next;
            tracing::info!("Audio engine destroyed");
            Ok(())
        }
    }
}

/// Real-time audio analysis engine
///
/// Owns its analyzer, processing context and buffers; holds the connected
/// stream by shared reference and never closes it. Dropping the engine
/// destroys it.
///
/// # Example
/// ```
/// use audioscope_core::{AudioEngine, EngineConfig, FrameQueue, RingStream};
/// use std::rc::Rc;
///
/// let frames = FrameQueue::new();
/// let mut engine = AudioEngine::new(Rc::new(frames.clone())).unwrap();
/// let stream = RingStream::new(44100, 8192);
///
/// engine.initialize(EngineConfig::default()).unwrap();
/// engine.connect(Rc::new(stream.clone())).unwrap();
/// engine.start().unwrap();
///
/// stream.push(&[0.5; 2048]);
/// frames.run_frame();
/// assert!(engine.audio_level().unwrap() > 0.0);
///
/// engine.destroy().unwrap();
/// ```
pub struct AudioEngine {
    inner: Rc<RefCell<EngineInner>>,
}

impl AudioEngine {
    /// Create an engine on the default platform for this build
    pub fn new(scheduler: Rc<dyn FrameScheduler>) -> Result<Self> {
        Ok(Self::with_platform(default_platform()?, scheduler))
    }

    /// Create an engine on an explicitly selected platform
    pub fn with_platform(platform: Box<dyn AudioPlatform>, scheduler: Rc<dyn FrameScheduler>) -> Self {
        let config = EngineConfig::default();
        let metrics = DerivedMetrics::zeroed(config.band_count);
        Self {
            inner: Rc::new(RefCell::new(EngineInner {
                state: EngineState::Uninitialized,
                config,
                platform,
                context: None,
                analyzer: None,
                processing: ProcessingLoop::new(scheduler),
                snapshot: AudioSnapshot::default(),
                metrics,
                activity: ActivityTracker::new(),
                last_notified_level: 0.0,
                callbacks: Callbacks::default(),
            })),
        }
    }

    /// Weak handle for controlling the engine from callbacks
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Get current engine state
    pub fn state(&self) -> EngineState {
        self.inner.borrow().state
    }

    /// Get the active configuration
    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config.clone()
    }

    /// Ticks executed since creation
    pub fn ticks(&self) -> u64 {
        self.inner.borrow().processing.ticks()
    }

    /// Allocate the processing context and buffers
    pub fn initialize(&mut self, config: EngineConfig) -> Result<()> {
        let mut engine = self.inner.borrow_mut();
        let next = match engine.state.transition(Operation::Initialize)? {
            Transition::To(next) => next,
            Transition::Stay => return Ok(()),
        };
        config.validate()?;

        let context = engine.platform.create_context(&config)?;
        engine.context = Some(context);
        engine.config = config;
        engine.reset_buffers();
        engine.state = next;

        tracing::info!(
            "Audio engine initialized on {} platform: fft size {}, threshold {}",
            engine.platform.name(),
            engine.config.fft_size,
            engine.config.activity_threshold
        );
        Ok(())
    }

    /// Bind a new analyzer to `stream`
    ///
    /// The stream stays owned by the caller; the engine only reads from it.
    pub fn connect(&mut self, stream: Rc<dyn AudioStream>) -> Result<()> {
        let mut engine = self.inner.borrow_mut();
        let next = match engine.state.transition(Operation::Connect)? {
            Transition::To(next) => next,
            Transition::Stay => return Ok(()),
        };

        let mut analyzer = engine.platform.create_analyzer(&engine.config);
        if let Err(e) = analyzer.connect(stream) {
            tracing::warn!("Stream connection failed: {}", e);
            return Err(e);
        }
        let sample_rate = analyzer.sample_rate();
        engine.analyzer = Some(analyzer);
        engine.state = next;

        tracing::info!("Stream connected @ {}Hz", sample_rate);
        Ok(())
    }

    /// Begin the processing loop; a no-op when already processing
    pub fn start(&mut self) -> Result<()> {
        start_engine(&self.inner)
    }

    /// Halt the loop and suspend the context; idempotent
    pub fn pause(&mut self) -> Result<()> {
        pause_engine(&self.inner)
    }

    /// Re-enter the loop after a pause
    pub fn resume(&mut self) -> Result<()> {
        resume_engine(&self.inner)
    }

    /// Cancel pending work and release the analyzer and context; idempotent
    pub fn stop(&mut self) -> Result<()> {
        stop_engine(&self.inner)
    }

    /// Stop, release callbacks and make the engine permanently unusable
    pub fn destroy(&mut self) -> Result<()> {
        destroy_engine(&self.inner)
    }

    /// Apply a partial configuration update
    ///
    /// Rejected while a tick is in flight. Changing `fft_size` resizes the
    /// analyzer and snapshot buffers.
    pub fn reconfigure(&mut self, update: ConfigUpdate) -> Result<()> {
        let mut engine = self.inner.borrow_mut();
        engine.state.transition(Operation::Reconfigure)?;
        if engine.processing.in_tick() {
            return Err(EngineError::ReconfigureWhileProcessing);
        }

        let next = engine.config.merged(&update);
        next.validate()?;

        let resized = update.resizes(&engine.config);
        let rebanded = next.band_count != engine.config.band_count;
        if let Some(analyzer) = engine.analyzer.as_mut() {
            analyzer.reconfigure(&next);
        }
        engine.config = next;

        if resized {
            engine.snapshot = AudioSnapshot::silent(engine.config.fft_size);
        }
        if rebanded {
            let band_count = engine.config.band_count;
            engine.metrics.bands = metrics::bands(&engine.snapshot, band_count);
        }

        tracing::info!(
            "Audio engine reconfigured: fft size {}, smoothing {}, threshold {}",
            engine.config.fft_size,
            engine.config.smoothing,
            engine.config.activity_threshold
        );
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&EngineInner) -> T) -> Result<T> {
        let engine = self.inner.borrow();
        if engine.state == EngineState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        Ok(f(&engine))
    }

    /// Copy of the current frequency bins
    pub fn frequency_data(&self) -> Result<Vec<u8>> {
        self.read(|e| e.snapshot.frequency_bins.clone())
    }

    /// Copy of the current waveform bytes
    pub fn time_domain_data(&self) -> Result<Vec<u8>> {
        self.read(|e| e.snapshot.time_domain.clone())
    }

    /// Latest metrics
    pub fn metrics(&self) -> Result<DerivedMetrics> {
        self.read(|e| e.metrics.clone())
    }

    /// Latest RMS level (0.0 to 1.0)
    pub fn audio_level(&self) -> Result<f32> {
        self.read(|e| e.metrics.level)
    }

    /// Whether the latest level is above the activity threshold
    pub fn is_audio_active(&self) -> Result<bool> {
        self.read(|e| e.metrics.is_active)
    }

    /// Frequency of the strongest bin in Hz
    pub fn dominant_frequency(&self) -> Result<f32> {
        self.read(|e| e.metrics.dominant_frequency_hz)
    }

    /// Current bins grouped into `n` bands
    pub fn frequency_bands(&self, n: usize) -> Result<Vec<f32>> {
        self.read(|e| metrics::bands(&e.snapshot, n))
    }

    /// Average, peak and variance of the current bins
    pub fn audio_stats(&self) -> Result<AudioStats> {
        self.read(|e| metrics::stats(&e.snapshot))
    }

    /// Sample rate of the connected stream (0 when not connected)
    pub fn sample_rate(&self) -> Result<u32> {
        self.read(|e| e.analyzer.as_ref().map(|a| a.sample_rate()).unwrap_or(0))
    }

    fn register(&mut self, f: impl FnOnce(&mut Callbacks)) -> Result<()> {
        let mut engine = self.inner.borrow_mut();
        if engine.state == EngineState::Destroyed {
            return Err(EngineError::Destroyed);
        }
        f(&mut engine.callbacks);
        Ok(())
    }

    /// Called every tick with the snapshot and its metrics
    pub fn on_audio_data<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(&AudioSnapshot, &DerivedMetrics) + 'static,
    {
        let handler: AudioDataHandler = Rc::new(RefCell::new(callback));
        self.register(|c| c.on_audio_data = Some(handler))
    }

    /// Called when the level moves by more than `level_epsilon`
    pub fn on_audio_level_change<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(f32) + 'static,
    {
        let handler: LevelHandler = Rc::new(RefCell::new(callback));
        self.register(|c| c.on_level_change = Some(handler))
    }

    /// Called when audio crosses the activity threshold in either direction
    pub fn on_activity_change<F>(&mut self, callback: F) -> Result<()>
    where
        F: FnMut(bool) + 'static,
    {
        let handler: ActivityHandler = Rc::new(RefCell::new(callback));
        self.register(|c| c.on_activity_change = Some(handler))
    }

    /// Drop every registered callback
    pub fn clear_callbacks(&mut self) -> Result<()> {
        self.register(|c| *c = Callbacks::default())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.inner.try_borrow_mut().is_ok() {
            let _ = destroy_engine(&self.inner);
        }
    }
}

/// Weak engine handle for use inside callbacks
///
/// Operations fail with [`EngineError::Destroyed`] once the engine is gone.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Weak<RefCell<EngineInner>>,
}

impl EngineHandle {
    fn with<T>(&self, f: impl FnOnce(&Rc<RefCell<EngineInner>>) -> Result<T>) -> Result<T> {
        match self.inner.upgrade() {
            Some(inner) => f(&inner),
            None => Err(EngineError::Destroyed),
        }
    }

    /// Current state, `Destroyed` once the engine is dropped
    pub fn state(&self) -> EngineState {
        self.inner
            .upgrade()
            .map(|inner| inner.borrow().state)
            .unwrap_or(EngineState::Destroyed)
    }

    /// See [`AudioEngine::start`]
    pub fn start(&self) -> Result<()> {
        self.with(start_engine)
    }

    /// See [`AudioEngine::pause`]
    pub fn pause(&self) -> Result<()> {
        self.with(pause_engine)
    }

    /// See [`AudioEngine::resume`]
    pub fn resume(&self) -> Result<()> {
        self.with(resume_engine)
    }

    /// See [`AudioEngine::stop`]
    pub fn stop(&self) -> Result<()> {
        self.with(stop_engine)
    }
}
