//! Minimal CLI driver: generates a byte sequence, runs it through a chain
//! of multiply stages, and sums the result.
//!
//! Exit code `0` on clean termination (including an early `Ctrl+C`), any
//! non-zero code on setup failure, matching the original's convention.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;

use pipeflow_core::{Config, Heartbeat, Logger, ShutdownFlag, Stage};
use pipeflow_demo::{ByteSource, MultiplyStage, SumSink};

/// Runs a toy byte pipeline: source -> N multiply stages -> sum sink.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of bytes the source emits (wraps at 256).
    #[arg(short = 'n', long, default_value_t = 4096)]
    length: usize,

    /// Number of multiply stages to chain.
    #[arg(short, long, default_value_t = 1)]
    stages: usize,

    /// Factor each multiply stage applies (wrapping multiplication).
    #[arg(short, long, default_value_t = 3)]
    factor: u8,

    /// Ring buffer capacity in elements for every stage.
    #[arg(long, default_value_t = 4096)]
    capacity: usize,

    /// Preferred read/write chunk size in elements.
    #[arg(long, default_value_t = 256)]
    chunk: usize,

    /// Log file prefix; writes to `{prefix}.log`.
    #[arg(long, default_value = "pipeflow-demo")]
    log_prefix: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let logger = match Logger::create(&args.log_prefix) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            eprintln!("failed to open log file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownFlag::new();
    let config = Config::new(args.capacity, args.chunk);

    let items: Vec<u8> = (0..args.length).map(|i| (i % 256) as u8).collect();

    let mut source = match Stage::setup("source", Arc::clone(&logger), shutdown, config, ByteSource::new(items)) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("failed to set up source stage: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut transforms = Vec::with_capacity(args.stages);
    for i in 0..args.stages {
        let mut stage = match Stage::setup(
            format!("multiply-{i}"),
            Arc::clone(&logger),
            shutdown,
            config,
            MultiplyStage::new(args.factor),
        ) {
            Ok(stage) => stage,
            Err(e) => {
                eprintln!("failed to set up transform stage {i}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let upstream_output = transforms.last();
        match upstream_output {
            Some(previous) => stage.bind_input(previous),
            None => stage.bind_input(&source),
        }
        transforms.push(stage);
    }

    let (sink_payload, total, count) = SumSink::new();
    let mut sink = match Stage::setup("sink", Arc::clone(&logger), shutdown, config, sink_payload) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("failed to set up sink stage: {e}");
            return ExitCode::FAILURE;
        }
    };
    match transforms.last() {
        Some(last_transform) => sink.bind_input(last_transform),
        None => sink.bind_input(&source),
    }

    if let Err(e) = source.start() {
        eprintln!("failed to start source stage: {e}");
        return ExitCode::FAILURE;
    }
    for stage in &mut transforms {
        if let Err(e) = stage.start() {
            eprintln!("failed to start transform stage: {e}");
            return ExitCode::FAILURE;
        }
    }
    if let Err(e) = sink.start() {
        eprintln!("failed to start sink stage: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = shutdown.install_interrupt_handler() {
        eprintln!("failed to install interrupt handler: {e}");
        return ExitCode::FAILURE;
    }

    let heartbeat = Heartbeat::spawn(shutdown);

    let _ = source.join();
    for stage in &mut transforms {
        let _ = stage.join();
    }
    let _ = sink.join();

    shutdown.request_stop();
    heartbeat.join();

    println!(
        "processed {} bytes, sum {}",
        count.load(Ordering::Relaxed),
        total.load(Ordering::Relaxed)
    );

    sink.cleanup();
    while let Some(stage) = transforms.pop() {
        stage.cleanup();
    }
    source.cleanup();
    logger.cleanup();

    ExitCode::SUCCESS
}
