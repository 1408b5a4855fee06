//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use audioscope::audio::platform::{
    AudioPlatform, ContextState, ProcessingContext, SoftwareContext,
};
use audioscope::error::{ContextError, Result};
use audioscope::{
    AudioEngine, AudioSnapshot, AudioStream, EngineConfig, FftAnalyzer, FrameQueue,
    SpectralAnalyzer,
};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Snapshot with every frequency bin set to `byte`
pub fn uniform(byte: u8, bins: usize) -> AudioSnapshot {
    AudioSnapshot::new(vec![byte; bins], vec![128; bins * 2])
}

/// Analyzer replaying a fixed list of snapshots, repeating the last one
pub struct ScriptedAnalyzer {
    script: Rc<RefCell<VecDeque<AudioSnapshot>>>,
    last: AudioSnapshot,
    stream: Option<Rc<dyn AudioStream>>,
    fft_size: usize,
}

impl SpectralAnalyzer for ScriptedAnalyzer {
    fn connect(&mut self, stream: Rc<dyn AudioStream>) -> Result<()> {
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn sample(&mut self) -> AudioSnapshot {
        if let Some(next) = self.script.borrow_mut().pop_front() {
            self.last = next;
        }
        self.last.clone()
    }

    fn reconfigure(&mut self, config: &EngineConfig) {
        self.fft_size = config.fft_size;
    }

    fn sample_rate(&self) -> u32 {
        self.stream.as_ref().map(|s| s.sample_rate()).unwrap_or(0)
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }
}

struct SpyContext {
    inner: SoftwareContext,
    counters: Rc<PlatformCounters>,
}

impl ProcessingContext for SpyContext {
    fn state(&self) -> ContextState {
        self.inner.state()
    }

    fn suspend(&mut self) -> std::result::Result<(), ContextError> {
        self.counters.suspends.set(self.counters.suspends.get() + 1);
        self.inner.suspend()
    }

    fn resume(&mut self) -> std::result::Result<(), ContextError> {
        self.inner.resume()
    }

    fn close(&mut self) -> std::result::Result<(), ContextError> {
        self.counters.closes.set(self.counters.closes.get() + 1);
        if self.counters.fail_close.get() {
            return Err(ContextError::Backend("device lost".to_string()));
        }
        self.inner.close()
    }
}

/// Counters observed through a [`SpyPlatform`]
#[derive(Default)]
pub struct PlatformCounters {
    pub contexts: Cell<u32>,
    pub closes: Cell<u32>,
    pub suspends: Cell<u32>,
    /// Make every context close report a backend failure
    pub fail_close: Cell<bool>,
}

/// Platform counting context usage; scripted or FFT-backed analyzers
pub struct SpyPlatform {
    pub counters: Rc<PlatformCounters>,
    script: Option<Rc<RefCell<VecDeque<AudioSnapshot>>>>,
}

impl SpyPlatform {
    /// Platform with real FFT analyzers
    pub fn fft() -> Self {
        Self {
            counters: Rc::new(PlatformCounters::default()),
            script: None,
        }
    }

    /// Platform whose analyzers replay `snapshots`
    pub fn scripted(snapshots: Vec<AudioSnapshot>) -> Self {
        Self {
            counters: Rc::new(PlatformCounters::default()),
            script: Some(Rc::new(RefCell::new(snapshots.into()))),
        }
    }
}

impl AudioPlatform for SpyPlatform {
    fn name(&self) -> &'static str {
        "spy"
    }

    fn create_context(&self, _config: &EngineConfig) -> Result<Box<dyn ProcessingContext>> {
        self.counters.contexts.set(self.counters.contexts.get() + 1);
        Ok(Box::new(SpyContext {
            inner: SoftwareContext::new(),
            counters: Rc::clone(&self.counters),
        }))
    }

    fn create_analyzer(&self, config: &EngineConfig) -> Box<dyn SpectralAnalyzer> {
        match &self.script {
            Some(script) => Box::new(ScriptedAnalyzer {
                script: Rc::clone(script),
                last: AudioSnapshot::default(),
                stream: None,
                fft_size: config.fft_size,
            }),
            None => Box::new(FftAnalyzer::new(config)),
        }
    }
}

/// Engine wired to a frame queue and spy platform
pub struct Harness {
    pub engine: AudioEngine,
    pub frames: FrameQueue,
    pub counters: Rc<PlatformCounters>,
}

impl Harness {
    pub fn new(platform: SpyPlatform) -> Self {
        let frames = FrameQueue::new();
        let counters = Rc::clone(&platform.counters);
        let engine = AudioEngine::with_platform(Box::new(platform), Rc::new(frames.clone()));
        Self {
            engine,
            frames,
            counters,
        }
    }

    /// Initialize, connect `stream` and start processing
    pub fn start(&mut self, config: EngineConfig, stream: Rc<dyn AudioStream>) {
        self.engine.initialize(config).unwrap();
        self.engine.connect(stream).unwrap();
        self.engine.start().unwrap();
    }

    /// Run `n` frames of the host clock
    pub fn run_frames(&self, n: usize) {
        for _ in 0..n {
            self.frames.run_frame();
        }
    }
}
