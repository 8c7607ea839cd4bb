//! Toy stage payloads exercising `pipeflow_core::stage::StagePayload`.
//!
//! These stand in for the "external collaborator" stage bodies (audio
//! capture, SDR front end, codec, network transport) that a real
//! deployment would plug in; here they move and transform plain bytes so
//! the core crate is runnable and testable end to end without any such
//! dependency, the same role `span_collector`'s demo binaries play for
//! `ringmpsc-rs`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pipeflow_core::{ElementTag, StageError, StageHandle, StagePayload, StageTags};

/// Emits a fixed sequence of bytes, one chunk at a time, then ends its
/// output.
pub struct ByteSource {
    items: Vec<u8>,
}

impl ByteSource {
    /// Creates a source that emits `items` in order.
    #[must_use]
    pub fn new(items: Vec<u8>) -> Self {
        Self { items }
    }
}

impl StagePayload for ByteSource {
    type Data = usize;

    fn init(&mut self, handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
        let _ = handle;
        Ok((
            StageTags {
                input: ElementTag::Invalid,
                output: ElementTag::U8,
            },
            0,
        ))
    }

    fn run(&mut self, cursor: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError> {
        let chunk = handle.chunk_size().max(1);

        while *cursor < self.items.len() {
            if handle.shutdown().is_stop_requested() {
                break;
            }

            let end = (*cursor + chunk).min(self.items.len());
            let n = handle.write_output(&self.items[*cursor..end], end - *cursor);
            if n == 0 {
                break;
            }

            *cursor += n;
            handle.record_processed(n as u64);
        }

        Ok(())
    }

    fn free(&mut self, _data: Self::Data) {}
}

/// Multiplies every byte it reads by a fixed factor (wrapping) and writes
/// the result downstream.
pub struct MultiplyStage {
    factor: u8,
}

impl MultiplyStage {
    /// Creates a transform stage multiplying each sample by `factor`,
    /// wrapping on overflow.
    #[must_use]
    pub fn new(factor: u8) -> Self {
        Self { factor }
    }
}

impl StagePayload for MultiplyStage {
    type Data = ();

    fn init(&mut self, handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
        let _ = handle;
        Ok((
            StageTags {
                input: ElementTag::U8,
                output: ElementTag::U8,
            },
            (),
        ))
    }

    fn run(&mut self, _data: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError> {
        let chunk = handle.chunk_size().max(1);
        let mut buf = vec![0u8; chunk];

        loop {
            if handle.shutdown().is_stop_requested() {
                break;
            }

            let n = handle.read_input(&mut buf, chunk);
            if n == 0 {
                break;
            }

            for byte in &mut buf[..n] {
                *byte = byte.wrapping_mul(self.factor);
            }

            let mut written = 0;
            while written < n {
                let w = handle.write_output(&buf[written..n], n - written);
                if w == 0 {
                    break;
                }
                written += w;
            }

            handle.record_processed(n as u64);
        }

        Ok(())
    }

    fn free(&mut self, _data: Self::Data) {}
}

/// Reads every byte it is offered and accumulates a running sum, exposed
/// through a shared counter the caller keeps a handle to.
pub struct SumSink {
    total: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl SumSink {
    /// Creates a sink that accumulates the sum and count of bytes it
    /// consumes into the returned counters.
    #[must_use]
    pub fn new() -> (Self, Arc<AtomicU64>, Arc<AtomicU64>) {
        let total = Arc::new(AtomicU64::new(0));
        let count = Arc::new(AtomicU64::new(0));
        (
            Self {
                total: Arc::clone(&total),
                count: Arc::clone(&count),
            },
            total,
            count,
        )
    }
}

impl StagePayload for SumSink {
    type Data = ();

    fn init(&mut self, handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
        let _ = handle;
        Ok((
            StageTags {
                input: ElementTag::U8,
                output: ElementTag::Invalid,
            },
            (),
        ))
    }

    fn run(&mut self, _data: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError> {
        let chunk = handle.chunk_size().max(1);
        let mut buf = vec![0u8; chunk];

        loop {
            let n = handle.read_input(&mut buf, chunk);
            if n == 0 {
                break;
            }

            let batch_sum: u64 = buf[..n].iter().map(|&b| u64::from(b)).sum();
            self.total.fetch_add(batch_sum, Ordering::Relaxed);
            self.count.fetch_add(n as u64, Ordering::Relaxed);
            handle.record_processed(n as u64);
        }

        Ok(())
    }

    fn free(&mut self, _data: Self::Data) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeflow_core::{Config, Logger, ShutdownFlag, Stage};

    #[test]
    fn source_multiply_sink_chain() {
        let logger = Arc::new(Logger::create(&format!("/tmp/pipeflow_demo_test_{}", std::process::id())).unwrap());
        let shutdown = ShutdownFlag::new();

        let items: Vec<u8> = (0..=50).collect();
        let mut source = Stage::setup(
            "source",
            Arc::clone(&logger),
            shutdown,
            Config::new(64, 8),
            ByteSource::new(items.clone()),
        )
        .unwrap();
        let mut transform = Stage::setup(
            "double",
            Arc::clone(&logger),
            shutdown,
            Config::new(64, 8),
            MultiplyStage::new(2),
        )
        .unwrap();
        let (sink_payload, total, count) = SumSink::new();
        let mut sink = Stage::setup("sum", Arc::clone(&logger), shutdown, Config::new(64, 8), sink_payload).unwrap();

        transform.bind_input(&source);
        sink.bind_input(&transform);

        source.start().unwrap();
        transform.start().unwrap();
        sink.start().unwrap();

        source.join().unwrap();
        transform.join().unwrap();
        sink.join().unwrap();

        let expected_total: u64 = items.iter().map(|&b| u64::from(b.wrapping_mul(2))).sum();
        assert_eq!(total.load(Ordering::Relaxed), expected_total);
        assert_eq!(count.load(Ordering::Relaxed), items.len() as u64);

        sink.cleanup();
        transform.cleanup();
        source.cleanup();
        logger.cleanup();
        let _ = std::fs::remove_file(format!("/tmp/pipeflow_demo_test_{}.log", std::process::id()));
    }
}
