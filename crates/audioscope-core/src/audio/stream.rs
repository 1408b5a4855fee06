//! Stream sources the analyzer reads from
//!
//! The engine only reads from a stream; it never starts, stops or closes it.
//! [`RingStream`] keeps the most recent samples in a fixed-capacity ring that
//! any producer (a file reader, a synthetic source, a test) can feed.
//!
//! Real-time producers use [`sample_pipe`] instead: the audio thread owns the
//! producer half of a split ring and never takes a lock, while the reader
//! drains the consumer half into a private history window on each read.

use ringbuf::traits::{Consumer, Observer, Producer, RingBuffer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Samples moved from the consumer half per `pop_slice` call
const DRAIN_CHUNK: usize = 1024;

/// A live audio stream owned by an external collaborator
pub trait AudioStream {
    /// Sample rate of the stream in Hz
    fn sample_rate(&self) -> u32;

    /// Whether the stream can still be read
    fn is_live(&self) -> bool;

    /// Copy the most recent samples into `out`, oldest first
    ///
    /// When fewer samples are buffered than `out` holds, the front of `out`
    /// is zero-filled. Returns the number of real samples written.
    fn read_latest(&self, out: &mut [f32]) -> usize;
}

/// Copy the newest samples of `ring` into `out`, zero-filling the front
fn copy_latest(ring: &HeapRb<f32>, out: &mut [f32]) -> usize {
    let available = ring.occupied_len();
    let count = available.min(out.len());
    let pad = out.len() - count;

    out[..pad].fill(0.0);
    for (dst, src) in out[pad..].iter_mut().zip(ring.iter().skip(available - count)) {
        *dst = *src;
    }
    count
}

/// Average interleaved frames down to mono and push them without blocking
///
/// Samples that do not fit are dropped. Returns the number of dropped frames.
pub fn push_downmixed<P>(producer: &mut P, data: &[f32], channels: usize) -> usize
where
    P: Producer<Item = f32>,
{
    let channels = channels.max(1);
    let mut dropped = 0;
    for frame in data.chunks(channels) {
        let mono = frame.iter().sum::<f32>() / frame.len() as f32;
        if producer.try_push(mono).is_err() {
            dropped += 1;
        }
    }
    dropped
}

/// Create a lock-free pipe: the producer half for an audio thread and a
/// reader keeping the latest `capacity` samples
pub fn sample_pipe(capacity: usize) -> (HeapProd<f32>, WindowReader) {
    let capacity = capacity.max(1);
    let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
    let reader = WindowReader {
        consumer: RefCell::new(consumer),
        history: RefCell::new(HeapRb::new(capacity)),
    };
    (producer, reader)
}

/// Reader half of a [`sample_pipe`]
///
/// Owned by the analysis thread. Each read drains whatever the producer
/// pushed since the last read into a history window that keeps the newest
/// samples.
pub struct WindowReader {
    consumer: RefCell<HeapCons<f32>>,
    history: RefCell<HeapRb<f32>>,
}

impl WindowReader {
    /// Move pending samples from the pipe into the history window
    pub fn drain(&self) -> usize {
        let mut consumer = self.consumer.borrow_mut();
        let mut history = self.history.borrow_mut();
        let mut chunk = [0.0f32; DRAIN_CHUNK];
        let mut total = 0;
        loop {
            let count = consumer.pop_slice(&mut chunk);
            if count == 0 {
                break;
            }
            for &sample in &chunk[..count] {
                history.push_overwrite(sample);
            }
            total += count;
        }
        total
    }

    /// Drain, then copy the newest samples into `out`
    pub fn read_latest(&self, out: &mut [f32]) -> usize {
        self.drain();
        copy_latest(&self.history.borrow(), out)
    }

    /// Number of samples in the history window
    pub fn len(&self) -> usize {
        self.history.borrow().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct RingShared {
    ring: HeapRb<f32>,
    closed: bool,
}

/// Shared ring-buffered mono stream
///
/// Clones share the same ring, so one clone can be handed to a producer
/// while another is connected to an engine.
#[derive(Clone)]
pub struct RingStream {
    shared: Arc<Mutex<RingShared>>,
    sample_rate: u32,
}

impl RingStream {
    /// Create a stream keeping at most `capacity` samples
    pub fn new(sample_rate: u32, capacity: usize) -> Self {
        Self {
            shared: Arc::new(Mutex::new(RingShared {
                ring: HeapRb::new(capacity.max(1)),
                closed: false,
            })),
            sample_rate,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RingShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append mono samples, overwriting the oldest when full
    ///
    /// Pushing into a closed stream is ignored.
    pub fn push(&self, samples: &[f32]) {
        let mut shared = self.lock();
        if shared.closed {
            return;
        }
        for &sample in samples {
            shared.ring.push_overwrite(sample);
        }
    }

    /// Append interleaved frames, averaging channels down to mono
    pub fn push_interleaved(&self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.push(data);
            return;
        }
        let mut shared = self.lock();
        if shared.closed {
            return;
        }
        for frame in data.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            shared.ring.push_overwrite(mono);
        }
    }

    /// Close the stream; readers see it as no longer live
    pub fn close(&self) {
        let mut shared = self.lock();
        shared.closed = true;
        Consumer::clear(&mut shared.ring);
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.lock().ring.occupied_len()
    }

    /// Whether no samples are buffered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of buffered samples
    pub fn capacity(&self) -> usize {
        self.lock().ring.capacity().get()
    }
}

impl AudioStream for RingStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_live(&self) -> bool {
        !self.lock().closed
    }

    fn read_latest(&self, out: &mut [f32]) -> usize {
        copy_latest(&self.lock().ring, out)
    }
}

#[cfg(feature = "capture")]
pub use capture::CaptureStream;

#[cfg(feature = "capture")]
mod capture {
    use super::{push_downmixed, sample_pipe, AudioStream, WindowReader};
    use anyhow::{anyhow, bail, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    /// Microphone stream fed by the default cpal input device
    ///
    /// The cpal callback owns the producer half of a [`sample_pipe`] and
    /// pushes downmixed samples without locking. Dropping this value stops
    /// capture.
    pub struct CaptureStream {
        reader: WindowReader,
        sample_rate: u32,
        device_name: String,
        live: Arc<AtomicBool>,
        dropped: Arc<AtomicU64>,
        _stream: cpal::Stream,
    }

    impl CaptureStream {
        /// Open the default input device, buffering `capacity` samples
        pub fn open_default(capacity: usize) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?;
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let supported = device.default_input_config()?;
            if supported.sample_format() != cpal::SampleFormat::F32 {
                bail!(
                    "Unsupported sample format {:?} on {}",
                    supported.sample_format(),
                    device_name
                );
            }
            let sample_rate = supported.sample_rate().0;
            let channels = supported.channels() as usize;
            let config: cpal::StreamConfig = supported.into();

            tracing::info!(
                "Opening input device {} @ {}Hz, {} channels",
                device_name,
                sample_rate,
                channels
            );

            let (mut producer, reader) = sample_pipe(capacity);
            let live = Arc::new(AtomicBool::new(true));
            let dropped = Arc::new(AtomicU64::new(0));

            let dropped_in_callback = Arc::clone(&dropped);
            let live_on_error = Arc::clone(&live);
            let stream = device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Producer owned by the callback, no Mutex on the hot path
                    let lost = push_downmixed(&mut producer, data, channels);
                    if lost > 0 {
                        dropped_in_callback.fetch_add(lost as u64, Ordering::Relaxed);
                    }
                },
                move |err| {
                    tracing::error!("Input stream error: {}", err);
                    live_on_error.store(false, Ordering::Release);
                },
                None,
            )?;
            stream.play()?;

            Ok(Self {
                reader,
                sample_rate,
                device_name,
                live,
                dropped,
                _stream: stream,
            })
        }

        /// Name of the capture device
        pub fn device_name(&self) -> &str {
            &self.device_name
        }

        /// Samples dropped because the reader fell behind
        pub fn dropped_samples(&self) -> u64 {
            self.dropped.load(Ordering::Relaxed)
        }
    }

    impl AudioStream for CaptureStream {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::Acquire)
        }

        fn read_latest(&self, out: &mut [f32]) -> usize {
            self.reader.read_latest(out)
        }
    }
}
