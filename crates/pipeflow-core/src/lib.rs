//! Bounded blocking ring buffers, stage lifecycle, and cooperative
//! shutdown for streaming signal-processing pipelines.
//!
//! Grounded in `examples/original_source/`, a C pipeline runtime built
//! around ring buffers, worker-thread stages, a process-wide shutdown
//! flag, and a non-blocking logger. The modules below carry those
//! responsibilities over to Rust, trading function pointers and raw
//! pointers for traits and reference-counted ownership:
//!
//! - [`tag`]: element type tags ([`tag::ElementTag`]) and their byte sizes.
//! - [`config`]: ring buffer sizing presets ([`config::Config`]).
//! - [`ring`]: the bounded, blocking ring buffer ([`ring::Ring`]).
//! - [`shutdown`]: the process-wide cooperative shutdown flag.
//! - [`heartbeat`]: the cosmetic terminal spinner.
//! - [`logger`]: the non-blocking, ordered diagnostic logger.
//! - [`stage`]: the stage/node runtime ([`stage::Stage`],
//!   [`stage::StagePayload`]).
//! - [`graph`]: documentation of the conventions for wiring stages
//!   together into a pipeline.
//! - [`error`]: error types shared across the above.

mod invariants;

pub mod config;
pub mod error;
pub mod graph;
pub mod heartbeat;
pub mod logger;
pub mod ring;
pub mod shutdown;
pub mod stage;
pub mod tag;

pub use config::Config;
pub use error::{LoggerError, RingError, StageError};
pub use heartbeat::Heartbeat;
pub use logger::Logger;
pub use ring::{CancelToken, NoCancel, Ring};
pub use shutdown::ShutdownFlag;
pub use stage::{Stage, StageHandle, StagePayload, StageTags};
pub use tag::ElementTag;
