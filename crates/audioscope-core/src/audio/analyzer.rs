//! FFT-based spectral analysis
//!
//! [`FftAnalyzer`] reads the latest window of samples from a connected
//! stream and produces byte-scaled frequency and waveform data:
//!
//! 1. Blackman window over the last `fft_size` samples
//! 2. Forward FFT, magnitude scaled by `1 / fft_size`
//! 3. Exponential smoothing across snapshots (`smoothing` constant)
//! 4. Conversion to decibels, mapped linearly from
//!    `[min_decibels, max_decibels]` onto `0..=255`
//!
//! Waveform bytes map `-1.0..=1.0` onto `0..=255` with 128 at zero.

use super::stream::AudioStream;
use super::types::AudioSnapshot;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::rc::Rc;
use std::sync::Arc;

/// Produces one snapshot per call from a connected stream
pub trait SpectralAnalyzer {
    /// Bind to a stream, sizing the transform from the current config
    fn connect(&mut self, stream: Rc<dyn AudioStream>) -> Result<()>;

    /// Detach from the stream without closing it
    fn disconnect(&mut self);

    /// Whether a stream is bound
    fn is_connected(&self) -> bool;

    /// Read current frequency and time-domain data as an owned copy
    fn sample(&mut self) -> AudioSnapshot;

    /// Apply new settings, resizing buffers when the transform size changes
    fn reconfigure(&mut self, config: &EngineConfig);

    /// Sample rate of the bound stream (0 when disconnected)
    fn sample_rate(&self) -> u32;

    /// Transform size in samples
    fn fft_size(&self) -> usize;

    /// Number of frequency bins per snapshot
    fn frequency_bin_count(&self) -> usize {
        self.fft_size() / 2
    }
}

/// Blackman window coefficients
fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
        })
        .collect()
}

/// Software spectral analyzer built on rustfft
pub struct FftAnalyzer {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    planner: FftPlanner<f32>,
    fft: Arc<dyn Fft<f32>>,
    /// Pre-computed window
    window: Vec<f32>,
    /// Latest samples read from the stream
    input: Vec<f32>,
    /// In-place FFT buffer
    fft_buffer: Vec<Complex<f32>>,
    /// Smoothed magnitudes carried across snapshots
    smoothed: Vec<f32>,
    stream: Option<Rc<dyn AudioStream>>,
    sample_rate: u32,
}

impl FftAnalyzer {
    /// Create an analyzer sized from `config`
    pub fn new(config: &EngineConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        Self {
            fft_size: config.fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            planner,
            fft,
            window: blackman_window(config.fft_size),
            input: vec![0.0; config.fft_size],
            fft_buffer: vec![Complex::new(0.0, 0.0); config.fft_size],
            smoothed: vec![0.0; config.fft_size / 2],
            stream: None,
            sample_rate: 0,
        }
    }

    fn resize(&mut self, fft_size: usize) {
        self.fft_size = fft_size;
        self.fft = self.planner.plan_fft_forward(fft_size);
        self.window = blackman_window(fft_size);
        self.input = vec![0.0; fft_size];
        self.fft_buffer = vec![Complex::new(0.0, 0.0); fft_size];
        self.smoothed = vec![0.0; fft_size / 2];
    }

    fn magnitude_to_byte(&self, magnitude: f32) -> u8 {
        let db = 20.0 * magnitude.log10();
        let scale = 255.0 / (self.max_decibels - self.min_decibels);
        // -inf (silent bin) clamps to 0, NaN casts to 0
        (scale * (db - self.min_decibels)).floor().clamp(0.0, 255.0) as u8
    }

    fn sample_to_byte(sample: f32) -> u8 {
        (128.0 * (1.0 + sample)).floor().clamp(0.0, 255.0) as u8
    }
}

impl SpectralAnalyzer for FftAnalyzer {
    fn connect(&mut self, stream: Rc<dyn AudioStream>) -> Result<()> {
        if !stream.is_live() {
            return Err(EngineError::ConnectionError(
                "stream is closed".to_string(),
            ));
        }
        let sample_rate = stream.sample_rate();
        if sample_rate == 0 {
            return Err(EngineError::ConnectionError(
                "stream reports a zero sample rate".to_string(),
            ));
        }

        self.smoothed.fill(0.0);
        self.sample_rate = sample_rate;
        self.stream = Some(stream);

        tracing::debug!(
            "Analyzer connected: {} Hz, fft size {}",
            sample_rate,
            self.fft_size
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stream = None;
        self.sample_rate = 0;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn sample(&mut self) -> AudioSnapshot {
        let live = self.stream.as_ref().is_some_and(|s| s.is_live());
        if !live {
            return AudioSnapshot::silent(self.fft_size);
        }
        if let Some(stream) = &self.stream {
            stream.read_latest(&mut self.input);
        }

        let time_domain = self.input.iter().map(|&s| Self::sample_to_byte(s)).collect();

        for ((slot, &sample), &w) in self
            .fft_buffer
            .iter_mut()
            .zip(&self.input)
            .zip(&self.window)
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        let norm = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.fft_buffer) {
            let magnitude = bin.norm() * norm;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }

        let frequency_bins = self
            .smoothed
            .iter()
            .map(|&m| self.magnitude_to_byte(m))
            .collect();

        AudioSnapshot::new(frequency_bins, time_domain)
    }

    fn reconfigure(&mut self, config: &EngineConfig) {
        if config.fft_size != self.fft_size {
            tracing::debug!(
                "Analyzer resized: fft size {} -> {}",
                self.fft_size,
                config.fft_size
            );
            self.resize(config.fft_size);
        }
        self.smoothing = config.smoothing;
        self.min_decibels = config.min_decibels;
        self.max_decibels = config.max_decibels;
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::metrics;
    use crate::audio::stream::RingStream;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn config(fft_size: usize) -> EngineConfig {
        EngineConfig {
            fft_size,
            smoothing: 0.0,
            min_decibels: -100.0,
            max_decibels: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_shape() {
        let window = blackman_window(64);
        assert!(window[0].abs() < 1e-6);
        assert!((window[32] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_sizes() {
        let stream = RingStream::new(44100, 4096);
        let mut analyzer = FftAnalyzer::new(&config(512));
        analyzer.connect(Rc::new(stream)).unwrap();

        let snapshot = analyzer.sample();
        assert_eq!(snapshot.frequency_bins.len(), 256);
        assert_eq!(snapshot.time_domain.len(), 512);
        assert_eq!(analyzer.frequency_bin_count(), 256);
    }

    #[test]
    fn test_silence() {
        let stream = RingStream::new(44100, 4096);
        stream.push(&vec![0.0; 1024]);
        let mut analyzer = FftAnalyzer::new(&config(1024));
        analyzer.connect(Rc::new(stream)).unwrap();

        let snapshot = analyzer.sample();
        assert!(snapshot.frequency_bins.iter().all(|&b| b == 0));
        assert!(snapshot.time_domain.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let sample_rate = 44100;
        let fft_size = 1024;
        let bin = 64;
        let freq = bin as f32 * sample_rate as f32 / fft_size as f32;

        let stream = RingStream::new(sample_rate, 4096);
        stream.push(&sine(freq, sample_rate, fft_size));
        let mut analyzer = FftAnalyzer::new(&config(fft_size));
        analyzer.connect(Rc::new(stream)).unwrap();

        let snapshot = analyzer.sample();
        let hz = metrics::dominant_frequency_hz(&snapshot, sample_rate, fft_size);
        assert!((hz - freq).abs() < 1.0, "expected {} Hz, got {} Hz", freq, hz);
        assert!(metrics::level(&snapshot) > 0.0);
    }

    #[test]
    fn test_sample_returns_independent_copy() {
        let stream = RingStream::new(44100, 4096);
        stream.push(&sine(1000.0, 44100, 256));
        let writer = stream.clone();
        let mut analyzer = FftAnalyzer::new(&config(256));
        analyzer.connect(Rc::new(stream)).unwrap();

        let first = analyzer.sample();
        let kept = first.clone();
        writer.push(&vec![0.0; 256]);
        let second = analyzer.sample();

        assert_eq!(first, kept);
        assert_ne!(first.time_domain, second.time_domain);
    }

    #[test]
    fn test_smoothing_carries_over() {
        let stream = RingStream::new(44100, 4096);
        let writer = stream.clone();
        writer.push(&sine(2000.0, 44100, 512));

        let mut analyzer = FftAnalyzer::new(&EngineConfig {
            smoothing: 0.9,
            ..config(512)
        });
        analyzer.connect(Rc::new(stream)).unwrap();
        let loud = analyzer.sample();

        writer.push(&vec![0.0; 512]);
        let decayed = analyzer.sample();

        // Smoothed history keeps the peak partly alive after silence
        assert!(metrics::level(&decayed) > 0.0);
        assert!(metrics::level(&decayed) <= metrics::level(&loud));
    }

    #[test]
    fn test_connect_rejects_closed_stream() {
        let stream = RingStream::new(44100, 64);
        stream.close();
        let mut analyzer = FftAnalyzer::new(&config(256));
        let result = analyzer.connect(Rc::new(stream));
        assert!(matches!(result, Err(EngineError::ConnectionError(_))));
        assert!(!analyzer.is_connected());
    }

    #[test]
    fn test_connect_rejects_zero_rate() {
        let mut analyzer = FftAnalyzer::new(&config(256));
        let result = analyzer.connect(Rc::new(RingStream::new(0, 64)));
        assert!(matches!(result, Err(EngineError::ConnectionError(_))));
    }

    #[test]
    fn test_closed_stream_samples_silence() {
        let stream = RingStream::new(44100, 4096);
        stream.push(&sine(1000.0, 44100, 256));
        let owner = stream.clone();
        let mut analyzer = FftAnalyzer::new(&config(256));
        analyzer.connect(Rc::new(stream)).unwrap();

        owner.close();
        assert_eq!(analyzer.sample(), AudioSnapshot::silent(256));
    }

    #[test]
    fn test_reconfigure_resizes() {
        let stream = RingStream::new(44100, 4096);
        let mut analyzer = FftAnalyzer::new(&config(256));
        analyzer.connect(Rc::new(stream)).unwrap();

        analyzer.reconfigure(&config(1024));
        assert_eq!(analyzer.fft_size(), 1024);

        let snapshot = analyzer.sample();
        assert_eq!(snapshot.frequency_bins.len(), 512);
        assert_eq!(snapshot.time_domain.len(), 1024);
        assert!(analyzer.is_connected());
    }

    #[test]
    fn test_disconnect_keeps_stream_open() {
        let stream = RingStream::new(44100, 64);
        let owner = stream.clone();
        let mut analyzer = FftAnalyzer::new(&config(256));
        analyzer.connect(Rc::new(stream)).unwrap();

        analyzer.disconnect();
        assert!(!analyzer.is_connected());
        assert_eq!(analyzer.sample_rate(), 0);
        assert!(owner.is_live());
    }
}
