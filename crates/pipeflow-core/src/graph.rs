//! Graph assembly conventions (C4).
//!
//! There is no runtime graph object: a pipeline is just a set of
//! [`crate::stage::Stage`] values a caller wires together directly, the
//! same way `examples/original_source/src/dsp_node/dsp_node.c` callers
//! wire `s_dsp_node` values together by hand. This module documents (and,
//! where the ordering can be checked cheaply, enforces) the conventions
//! that keep that wiring safe:
//!
//! 1. Create stages in the order data should flow: a producer before
//!    every consumer that will bind to it.
//! 2. Call [`crate::stage::Stage::bind_input`] only after the producer's
//!    `setup` has returned successfully (its output tag and output ring
//!    buffer, if any, must already exist).
//! 3. Start stages in any order: binding has already fixed the topology,
//!    and a consumer's first read simply blocks until its producer's
//!    first write.
//! 4. Install the interrupt handler and heartbeat once, after all stages
//!    have started, so an interrupt during startup does not race a
//!    partially constructed graph.
//! 5. Join every stage before cleaning up any of them, in any order: a
//!    stage that has joined has already ended its own output buffer, so
//!    joining a downstream consumer first simply means it observes
//!    end-of-stream and returns.
//! 6. Clean up every stage in the reverse of creation order. Because
//!    output ring buffers are reference-counted (`Arc<Ring>`) rather than
//!    owned by raw pointer, cleaning up a producer before a consumer that
//!    still references its output ring is safe (the ring outlives the
//!    producer's `Stage` value), but reverse order keeps the log a
//!    readable mirror of the creation order.
//!
//! A two-stage pipeline following this convention:
//!
//! ```ignore
//! let config = Config::new(4096, 256);
//! let mut source = Stage::setup("source", logger.clone(), shutdown, config, MySource::new())?;
//! let mut sink = Stage::setup("sink", logger.clone(), shutdown, config, MySink::new())?;
//! sink.bind_input(&source);
//!
//! source.start()?;
//! sink.start()?;
//! shutdown.install_interrupt_handler().ok();
//! let heartbeat = Heartbeat::spawn(shutdown);
//!
//! source.join()?;
//! sink.join()?;
//! heartbeat.join();
//!
//! sink.cleanup();
//! source.cleanup();
//! ```
