//! Stage (node) runtime (C3).
//!
//! Grounded in `examples/original_source/src/dsp_node/dsp_node.c` and
//! `dsp_node_types.h`: the three function-pointer callbacks
//! (`init_callback`, `pthread_function`, `free_callback`) plus an opaque
//! `void *p_data` become a single [`StagePayload`] trait with an
//! associated `Data` type, per `spec.md` section 9 ("Callbacks ->
//! trait/interface"). Each stage owns at most one output ring buffer and
//! holds a shared reference to at most one input ring buffer (some other
//! stage's output), matching `dsp_node_types.h`'s
//! `p_input_ring_buffer`/`p_output_ring_buffer` split.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::Config;
use crate::error::StageError;
use crate::invariants::{debug_assert_active_gating, debug_assert_monotonic_counter};
use crate::logger::Logger;
use crate::ring::Ring;
use crate::shutdown::ShutdownFlag;
use crate::tag::ElementTag;

static NEXT_STAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Input/output element tags a payload declares during `init`.
#[derive(Debug, Clone, Copy)]
pub struct StageTags {
    /// The format this stage expects on its input, or
    /// [`ElementTag::Invalid`] if it takes no input.
    pub input: ElementTag,
    /// The format this stage produces on its output, or
    /// [`ElementTag::Invalid`] if it produces no output.
    pub output: ElementTag,
}

/// The payload a [`Stage`] wraps: domain-specific init/run/free logic.
///
/// A payload struct carries whatever it needs to initialize itself (the
/// former `void *init_args`) as its own fields, constructed before
/// `Stage::setup` is called.
pub trait StagePayload: Send + 'static {
    /// Per-stage state allocated by `init` and threaded through `run`.
    type Data: Send + 'static;

    /// Declares this stage's input/output element tags and allocates its
    /// per-stage state. Called synchronously during `Stage::setup`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InitRefused`] if this stage cannot be set up.
    /// On failure the stage is left in a teardown-safe state: no worker
    /// has been spawned and no output ring buffer has been created.
    fn init(&mut self, handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError>;

    /// Executes on the stage's worker. Reads from `handle`'s input ring
    /// (if any), produces to `handle`'s output ring (if any), and calls
    /// `handle.record_processed` as it goes. Returns when upstream signals
    /// end-of-stream, the shutdown flag is set, or an unrecoverable error
    /// occurs.
    ///
    /// # Errors
    ///
    /// Returns an error to report an unrecoverable runtime failure; the
    /// stage shell logs it, requests shutdown, and ends the stage's output
    /// buffer regardless of whether this returns `Ok` or `Err`.
    fn run(&mut self, data: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError>;

    /// Releases what `init` acquired. Called only after the worker has
    /// joined. Must not touch ring buffers the stage did not own.
    fn free(&mut self, data: Self::Data);
}

/// Shared, thread-safe state backing a [`Stage`]: everything a worker
/// needs while running, and everything an observer (the dashboard
/// adaptor, graph assembly) needs to read concurrently.
pub struct StageHandle {
    id: u64,
    name: String,
    logger: Arc<Logger>,
    shutdown: ShutdownFlag,
    chunk_size: usize,
    capacity_elements: usize,
    input_tag: Mutex<ElementTag>,
    output_tag: Mutex<ElementTag>,
    output_ring: Mutex<Option<Arc<Ring>>>,
    input_ring: Mutex<Option<Arc<Ring>>>,
    active: AtomicBool,
    total_elements_processed: AtomicU64,
}

impl StageHandle {
    fn new(name: String, logger: Arc<Logger>, shutdown: ShutdownFlag, config: Config) -> Self {
        Self {
            id: NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            logger,
            shutdown,
            chunk_size: config.chunk_size,
            capacity_elements: config.capacity_elements,
            input_tag: Mutex::new(ElementTag::Invalid),
            output_tag: Mutex::new(ElementTag::Invalid),
            output_ring: Mutex::new(None),
            input_ring: Mutex::new(None),
            active: AtomicBool::new(false),
            total_elements_processed: AtomicU64::new(0),
        }
    }

    /// Stable, monotonically assigned stage identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stable display name, for the observability adaptor.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The chunk size this stage prefers per read/write attempt.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// A handle to the process-wide shutdown flag.
    #[must_use]
    pub fn shutdown(&self) -> ShutdownFlag {
        self.shutdown
    }

    /// The shared logger.
    #[must_use]
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// This stage's input element tag (set during init).
    #[must_use]
    pub fn input_tag(&self) -> ElementTag {
        *self.input_tag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// This stage's output element tag (set during init).
    #[must_use]
    pub fn output_tag(&self) -> ElementTag {
        *self.output_tag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Input element size in bytes, for the observability adaptor.
    #[must_use]
    pub fn input_element_size(&self) -> usize {
        self.input_tag().byte_size()
    }

    /// Output element size in bytes, for the observability adaptor.
    #[must_use]
    pub fn output_element_size(&self) -> usize {
        self.output_tag().byte_size()
    }

    /// Total elements processed so far. A word-atomic, possibly stale but
    /// never torn, read.
    #[must_use]
    pub fn total_elements_processed(&self) -> u64 {
        self.total_elements_processed.load(Ordering::Relaxed)
    }

    /// `true` while this stage's worker is executing its run loop.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Adds `n` to the total-elements-processed counter. Called by a
    /// payload's `run` as it makes progress.
    pub fn record_processed(&self, n: u64) {
        let old = self.total_elements_processed.fetch_add(n, Ordering::Relaxed);
        debug_assert_monotonic_counter!(old, old + n);
    }

    /// Blocking read from this stage's bound input ring, if any. Returns 0
    /// immediately if no input is bound.
    pub fn read_input(&self, dst: &mut [u8], n_elements: usize) -> usize {
        let input = self.input_ring.lock().unwrap_or_else(|e| e.into_inner());
        match input.as_ref() {
            Some(ring) => ring.blocking_read(dst, n_elements, &self.shutdown),
            None => 0,
        }
    }

    /// Blocking write to this stage's owned output ring, if any. Returns 0
    /// immediately if this stage has no output.
    pub fn write_output(&self, src: &[u8], n_elements: usize) -> usize {
        let output = self.output_ring.lock().unwrap_or_else(|e| e.into_inner());
        match output.as_ref() {
            Some(ring) => ring.blocking_write(src, n_elements, &self.shutdown),
            None => 0,
        }
    }

    /// Ends this stage's owned output ring, if any. Idempotent (ring `end`
    /// is idempotent).
    pub fn end_output(&self) {
        let output = self.output_ring.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ring) = output.as_ref() {
            ring.end();
        }
    }

    fn output_ring_handle(&self) -> Option<Arc<Ring>> {
        self.output_ring.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn bind_input_from(&self, producer: &StageHandle) {
        let producer_output_tag = producer.output_tag();
        let self_input_tag = self.input_tag();

        if producer_output_tag == ElementTag::Invalid {
            let _ = self.logger.warn(&format!(
                "stage '{}' bound to stage '{}' whose output is invalid; binding is inert",
                self.name, producer.name
            ));
        }

        if self_input_tag == ElementTag::Invalid {
            let _ = self
                .logger
                .warn(&format!("stage '{}' has no input channel; binding is inert", self.name));
        }

        if self_input_tag != ElementTag::Invalid
            && producer_output_tag != ElementTag::Invalid
            && self_input_tag != producer_output_tag
        {
            let _ = self.logger.warn(&format!(
                "stage '{}' input tag {:?} does not match stage '{}' output tag {:?}",
                self.name, self_input_tag, producer.name, producer_output_tag
            ));
        }

        *self.input_ring.lock().unwrap_or_else(|e| e.into_inner()) = producer.output_ring_handle();

        let _ = self
            .logger
            .info(&format!("stage '{}' bound input from stage '{}'", self.name, producer.name));
    }
}

/// One processing unit in the graph: owns its output ring buffer (if any),
/// holds a shared reference to an input ring buffer (if any), and runs one
/// worker.
pub struct Stage<P: StagePayload> {
    handle: Arc<StageHandle>,
    payload: Option<P>,
    data: Option<P::Data>,
    worker: Option<JoinHandle<(P, P::Data, Result<(), StageError>)>>,
    joined_payload: Option<P>,
    joined_data: Option<P::Data>,
}

impl<P: StagePayload> Stage<P> {
    /// Allocates, initializes, and (if the payload declares a concrete
    /// output tag) creates the output ring buffer for a new stage.
    ///
    /// `config.capacity_elements` sizes the output ring buffer (ignored if
    /// this stage has no output); `config.chunk_size` is the advisory
    /// batch size the payload should aim for per read/write attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InitRefused`] if the payload's `init`
    /// returns an error, or [`StageError::OutputRing`] if allocating the
    /// declared output ring buffer fails. In either case the returned
    /// error is the only observable effect: no worker is spawned and no
    /// output ring buffer is leaked.
    pub fn setup(
        name: impl Into<String>,
        logger: Arc<Logger>,
        shutdown: ShutdownFlag,
        config: Config,
        mut payload: P,
    ) -> Result<Self, StageError> {
        let handle = StageHandle::new(name.into(), Arc::clone(&logger), shutdown, config);

        let (tags, data) = payload.init(&handle).map_err(|e| {
            let _ = logger.error(&format!("stage '{}' init refused: {e}", handle.name));
            e
        })?;

        *handle.input_tag.lock().unwrap_or_else(|e| e.into_inner()) = tags.input;
        *handle.output_tag.lock().unwrap_or_else(|e| e.into_inner()) = tags.output;

        if tags.output != ElementTag::Invalid {
            let ring =
                Ring::create(config.capacity_elements, tags.output.byte_size()).map_err(StageError::OutputRing)?;
            *handle.output_ring.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(ring));
        }

        let _ = logger.info(&format!("stage '{}' created (id {})", handle.name, handle.id));

        Ok(Self {
            handle: Arc::new(handle),
            payload: Some(payload),
            data: Some(data),
            worker: None,
            joined_payload: None,
            joined_data: None,
        })
    }

    /// Read-only handle for observability, logging, and graph-assembly
    /// wiring.
    #[must_use]
    pub fn handle(&self) -> &Arc<StageHandle> {
        &self.handle
    }

    /// Binds this stage's input to `producer`'s output. `producer` must
    /// have been created (and set up) before this call; no ownership
    /// transfer occurs, the producer keeps owning its output ring.
    ///
    /// Mismatched or invalid tags never fail this call; they emit a
    /// warning record and the binding still takes effect (type coercion,
    /// if any, is the payload's responsibility).
    pub fn bind_input<Q: StagePayload>(&self, producer: &Stage<Q>) {
        self.handle.bind_input_from(&producer.handle);
    }

    /// Spawns the worker running this stage's `run` loop.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::SpawnFailed`] if the OS thread could not be
    /// created. On success the caller must eventually call [`Stage::join`]
    /// and then [`Stage::cleanup`].
    pub fn start(&mut self) -> Result<(), StageError> {
        let mut payload = self
            .payload
            .take()
            .expect("start called more than once, or before setup completed");
        let mut data = self
            .data
            .take()
            .expect("start called more than once, or before setup completed");
        let handle = Arc::clone(&self.handle);

        let builder = std::thread::Builder::new().name(handle.name.clone());
        let join = builder
            .spawn(move || {
                handle.active.store(true, Ordering::Release);
                debug_assert_active_gating!(handle.active.load(Ordering::Acquire), true);

                let result = payload.run(&mut data, &handle);

                if let Err(e) = &result {
                    let _ = handle.logger.error(&format!("stage '{}' runtime error: {e}", handle.name));
                    handle.shutdown.request_stop();
                }

                handle.end_output();
                handle.active.store(false, Ordering::Release);
                debug_assert_active_gating!(handle.active.load(Ordering::Acquire), false);

                (payload, data, result)
            })
            .map_err(|e| StageError::SpawnFailed(e.to_string()))?;

        self.worker = Some(join);
        let _ = self.handle.logger.info(&format!("stage '{}' started", self.handle.name));

        Ok(())
    }

    /// Blocks until the worker returns. Safe to call more than once: the
    /// second and later calls are no-ops returning `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the error the payload's `run` returned, if any, or
    /// [`StageError::Runtime`] if the worker thread panicked.
    pub fn join(&mut self) -> Result<(), StageError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        match worker.join() {
            Ok((payload, data, result)) => {
                self.joined_payload = Some(payload);
                self.joined_data = Some(data);
                let _ = self.handle.logger.info(&format!("stage '{}' joined", self.handle.name));
                result
            }
            Err(_) => Err(StageError::Runtime(format!(
                "stage '{}' worker thread panicked",
                self.handle.name
            ))),
        }
    }

    /// Best-effort nudge for a stuck worker. Correct shutdown never
    /// depends on this: it degrades to requesting process-wide shutdown,
    /// since Rust has no safe, portable "interrupt this specific thread"
    /// primitive to mirror the original's `pthread_kill(SIGUSR1)`.
    pub fn end_request(&self) {
        self.handle.shutdown.request_stop();
    }

    /// Releases what `init` acquired and drops this stage's reference to
    /// its output ring buffer. If the worker has not yet been joined, this
    /// joins it first (the precondition is enforced rather than merely
    /// documented). If the worker was never started, `init`'s payload and
    /// data are still owned by `self` directly and are freed from there,
    /// matching the original's `dsp_cleanup`, which calls `free_call`
    /// unconditionally regardless of whether the node was ever started.
    ///
    /// Consumes `self`: cleanup is idempotent by construction, since a
    /// moved-from `Stage` cannot be cleaned up again.
    pub fn cleanup(mut self) {
        if self.worker.is_some() {
            let _ = self.join();
        }

        if let (Some(mut payload), Some(data)) = (self.joined_payload.take(), self.joined_data.take()) {
            payload.free(data);
        } else if let (Some(mut payload), Some(data)) = (self.payload.take(), self.data.take()) {
            payload.free(data);
        }

        *self.handle.output_ring.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.handle.input_ring.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let _ = self.handle.logger.info(&format!("stage '{}' cleaned up", self.handle.name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSource {
        items: Vec<u8>,
    }

    impl StagePayload for CountingSource {
        type Data = usize;

        fn init(&mut self, _handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
            Ok((
                StageTags {
                    input: ElementTag::Invalid,
                    output: ElementTag::U8,
                },
                0,
            ))
        }

        fn run(&mut self, cursor: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError> {
            while *cursor < self.items.len() {
                if handle.shutdown().is_stop_requested() {
                    break;
                }
                let n = handle.write_output(&self.items[*cursor..*cursor + 1], 1);
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

    struct CollectingSink {
        collected: Arc<Mutex<Vec<u8>>>,
    }

    impl StagePayload for CollectingSink {
        type Data = ();

        fn init(&mut self, _handle: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
            Ok((
                StageTags {
                    input: ElementTag::U8,
                    output: ElementTag::Invalid,
                },
                (),
            ))
        }

        fn run(&mut self, _data: &mut Self::Data, handle: &StageHandle) -> Result<(), StageError> {
            loop {
                let mut buf = [0u8; 1];
                let n = handle.read_input(&mut buf, 1);
                if n == 0 {
                    break;
                }
                self.collected.lock().unwrap().push(buf[0]);
                handle.record_processed(n as u64);
            }
            Ok(())
        }

        fn free(&mut self, _data: Self::Data) {}
    }

    #[test]
    fn identity_copy_end_to_end() {
        let logger = Arc::new(Logger::create(&format!("/tmp/pipeflow_stage_test_{}", std::process::id())).unwrap());
        let shutdown = ShutdownFlag::new();
        let items: Vec<u8> = (0..=255).collect();

        let mut source = Stage::setup(
            "source",
            Arc::clone(&logger),
            shutdown,
            Config::new(64, 8),
            CountingSource { items: items.clone() },
        )
        .unwrap();

        let collected = Arc::new(Mutex::new(Vec::new()));
        let mut sink = Stage::setup(
            "sink",
            Arc::clone(&logger),
            shutdown,
            Config::new(64, 8),
            CollectingSink {
                collected: Arc::clone(&collected),
            },
        )
        .unwrap();

        sink.bind_input(&source);

        source.start().unwrap();
        sink.start().unwrap();

        source.join().unwrap();
        sink.join().unwrap();

        assert_eq!(*collected.lock().unwrap(), items);
        assert!(!source.handle().is_active());
        assert!(!sink.handle().is_active());

        source.cleanup();
        sink.cleanup();
        logger.cleanup();
        let _ = std::fs::remove_file(format!("/tmp/pipeflow_stage_test_{}.log", std::process::id()));
    }

    #[test]
    fn join_is_idempotent() {
        let logger = Arc::new(Logger::create(&format!("/tmp/pipeflow_stage_test2_{}", std::process::id())).unwrap());
        let shutdown = ShutdownFlag::new();
        let mut source = Stage::setup(
            "solo-source",
            Arc::clone(&logger),
            shutdown,
            Config::new(64, 8),
            CountingSource { items: vec![1, 2, 3] },
        )
        .unwrap();

        source.start().unwrap();
        assert!(source.join().is_ok());
        assert!(source.join().is_ok());
        source.cleanup();
        logger.cleanup();
        let _ = std::fs::remove_file(format!("/tmp/pipeflow_stage_test2_{}.log", std::process::id()));
    }

    #[test]
    fn type_mismatch_binding_still_proceeds() {
        let logger = Arc::new(Logger::create(&format!("/tmp/pipeflow_stage_test3_{}", std::process::id())).unwrap());
        let shutdown = ShutdownFlag::new();

        struct Float32Source;
        impl StagePayload for Float32Source {
            type Data = ();
            fn init(&mut self, _h: &StageHandle) -> Result<(StageTags, Self::Data), StageError> {
                Ok((
                    StageTags {
                        input: ElementTag::Invalid,
                        output: ElementTag::S16,
                    },
                    (),
                ))
            }
            fn run(&mut self, _d: &mut Self::Data, _h: &StageHandle) -> Result<(), StageError> {
                Ok(())
            }
            fn free(&mut self, _d: Self::Data) {}
        }

        let source = Stage::setup(
            "mismatch-source",
            Arc::clone(&logger),
            shutdown,
            Config::new(16, 4),
            Float32Source,
        )
        .unwrap();
        let sink = Stage::setup(
            "mismatch-sink",
            Arc::clone(&logger),
            shutdown,
            Config::new(16, 4),
            CollectingSink {
                collected: Arc::new(Mutex::new(Vec::new())),
            },
        )
        .unwrap();

        // sink declares U8 input, source declares S16 output: mismatched
        // but must not fail.
        sink.bind_input(&source);

        source.cleanup();
        sink.cleanup();
        logger.cleanup();
        let _ = std::fs::remove_file(format!("/tmp/pipeflow_stage_test3_{}.log", std::process::id()));
    }
}
