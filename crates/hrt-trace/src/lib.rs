//! Binary tracing for the timer service with pluggable backends.
//!
//! Records are small `(type, payload)` pairs stamped with a sequence number
//! and an optional microsecond timestamp, then framed with HDLC (see
//! [`frame`]) so a byte stream can be resynchronised after loss.

use std::io::{self, Write};
use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

pub mod frame;
pub mod records;

pub use frame::{DecodeError, Frame, FrameDecoder};

/// Maximum payload length for a single record (excluding header/checksum).
const DEFAULT_MAX_RECORD_LEN: usize = 64;

/// Configuration for the tracer.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub max_record_len: usize,
    pub include_timestamp: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            include_timestamp: true,
        }
    }
}

/// A single emitted record.
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub seq: u8,
    pub record_type: u8,
    pub timestamp: Option<Duration>,
    pub payload: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("backend error: {0}")]
    Backend(#[from] io::Error),
}

/// Consumer of framed bytes.
pub trait TraceBackend: Send + Sync {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TraceError>;
}

/// Writes frames to any `Write` implementation (files, stdout, pipes).
pub struct WriterBackend<W: Write + Send + 'static> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterBackend<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send + 'static> TraceBackend for WriterBackend<W> {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TraceError> {
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        guard.write_all(frame).map_err(TraceError::from)
    }
}

/// Keeps every frame in memory. Cloning shares the same buffer.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Decodes the captured stream back into frames. `timestamps` must
    /// match the tracer's [`TraceConfig::include_timestamp`].
    pub fn frames(&self, timestamps: bool) -> Result<Vec<Frame>, DecodeError> {
        FrameDecoder::new(timestamps)
            .push_bytes(&self.contents())
            .into_iter()
            .collect()
    }
}

impl TraceBackend for MemoryBackend {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TraceError> {
        self.bytes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(frame);
        Ok(())
    }
}

/// Streams frames over a connected UDP socket.
pub struct UdpBackend {
    socket: UdpSocket,
}

impl UdpBackend {
    /// Binds an ephemeral local socket and connects it to `addr`.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(addr)?;
        Ok(Self { socket })
    }
}

impl TraceBackend for UdpBackend {
    fn write_frame(&self, frame: &[u8]) -> Result<(), TraceError> {
        self.socket.send(frame).map(|_| ()).map_err(TraceError::from)
    }
}

/// Record encoder bound to one backend.
#[derive(Debug)]
pub struct Tracer<B: TraceBackend> {
    backend: B,
    cfg: TraceConfig,
    seq: u8,
    epoch: Instant,
}

/// Shareable handle around a [`Tracer`].
pub struct TracerHandle<B: TraceBackend> {
    inner: Arc<Mutex<Tracer<B>>>,
}

impl<B: TraceBackend> Clone for TracerHandle<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: TraceBackend> Tracer<B> {
    pub fn new(cfg: TraceConfig, backend: B) -> Self {
        Self {
            backend,
            cfg,
            seq: 0,
            epoch: Instant::now(),
        }
    }

    pub fn into_handle(self) -> TracerHandle<B> {
        TracerHandle {
            inner: Arc::new(Mutex::new(self)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Frames one record. Every record of a stream carries a timestamp or
    /// none does, per [`TraceConfig::include_timestamp`].
    pub fn record(&mut self, record_type: u8, payload: &[u8]) -> Result<TraceRecord, TraceError> {
        if payload.len() > self.cfg.max_record_len {
            return Err(TraceError::PayloadTooLarge(payload.len()));
        }

        let timestamp = self.cfg.include_timestamp.then(|| self.epoch.elapsed());

        self.seq = self.seq.wrapping_add(1);
        let record = TraceRecord {
            seq: self.seq,
            record_type,
            timestamp,
            payload: payload.to_vec(),
        };

        let mut bytes = Vec::with_capacity(payload.len() + 8);
        frame::encode_into(
            &mut bytes,
            record.seq,
            record.record_type,
            record.timestamp.map(|ts| ts.as_micros() as u32),
            &record.payload,
        );
        self.backend.write_frame(&bytes)?;
        Ok(record)
    }
}

impl<B: TraceBackend + 'static> TracerHandle<B> {
    pub fn emit(&self, record_type: u8, payload: &[u8]) -> Result<TraceRecord, TraceError> {
        self.lock().record(record_type, payload)
    }

    /// Builds a [`TraceHook`] closure that forwards into this tracer.
    pub fn hook(&self) -> TraceHook {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |record_type, payload| {
            let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
            guard.record(record_type, payload).map(|_| ())
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracer<B>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Callback the timer service invokes with `(record_type, payload)`.
pub type TraceHook = Arc<dyn Fn(u8, &[u8]) -> Result<(), TraceError> + Send + Sync>;
