//! End-to-end scenario chaining the demo crate's toy stages.

use std::sync::{Arc, Mutex};

use pipeflow_core::{Config, ElementTag, Logger, ShutdownFlag, Stage, StageError, StageHandle, StagePayload, StageTags};
use pipeflow_demo::{ByteSource, MultiplyStage};

/// Reads every byte it is offered and appends it to a shared vector,
/// preserving arrival order. Used where a test needs to check the literal
/// output sequence rather than a derived sum.
struct OrderedSink {
    collected: Arc<Mutex<Vec<u8>>>,
}

impl StagePayload for OrderedSink {
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
        let chunk = handle.chunk_size().max(1);
        let mut buf = vec![0u8; chunk];

        loop {
            let n = handle.read_input(&mut buf, chunk);
            if n == 0 {
                break;
            }
            self.collected.lock().unwrap().extend_from_slice(&buf[..n]);
            handle.record_processed(n as u64);
        }

        Ok(())
    }

    fn free(&mut self, _data: Self::Data) {}
}

#[test]
fn three_stage_multiply_pipeline() {
    let path = format!("/tmp/pipeflow_demo_it_{}", std::process::id());
    let logger = Arc::new(Logger::create(&path).unwrap());
    let shutdown = ShutdownFlag::new();

    let items: Vec<u8> = (0..200).collect();
    let mut source = Stage::setup(
        "source",
        Arc::clone(&logger),
        shutdown,
        Config::new(64, 8),
        ByteSource::new(items.clone()),
    )
    .unwrap();
    let mut double = Stage::setup(
        "double",
        Arc::clone(&logger),
        shutdown,
        Config::new(64, 8),
        MultiplyStage::new(2),
    )
    .unwrap();
    let mut triple = Stage::setup(
        "triple",
        Arc::clone(&logger),
        shutdown,
        Config::new(64, 8),
        MultiplyStage::new(3),
    )
    .unwrap();
    let collected = Arc::new(Mutex::new(Vec::new()));
    let mut sink = Stage::setup(
        "sink",
        Arc::clone(&logger),
        shutdown,
        Config::new(64, 8),
        OrderedSink {
            collected: Arc::clone(&collected),
        },
    )
    .unwrap();

    double.bind_input(&source);
    triple.bind_input(&double);
    sink.bind_input(&triple);

    let source_handle = Arc::clone(source.handle());
    let double_handle = Arc::clone(double.handle());
    let triple_handle = Arc::clone(triple.handle());
    let sink_handle = Arc::clone(sink.handle());

    source.start().unwrap();
    double.start().unwrap();
    triple.start().unwrap();
    sink.start().unwrap();

    source.join().unwrap();
    double.join().unwrap();
    triple.join().unwrap();
    sink.join().unwrap();

    let expected: Vec<u8> = items.iter().map(|&b| b.wrapping_mul(2).wrapping_mul(3)).collect();
    assert_eq!(*collected.lock().unwrap(), expected);

    let expected_count = items.len() as u64;
    assert_eq!(source_handle.total_elements_processed(), expected_count);
    assert_eq!(double_handle.total_elements_processed(), expected_count);
    assert_eq!(triple_handle.total_elements_processed(), expected_count);
    assert_eq!(sink_handle.total_elements_processed(), expected_count);

    sink.cleanup();
    triple.cleanup();
    double.cleanup();
    source.cleanup();
    logger.cleanup();
    let _ = std::fs::remove_file(format!("{path}.log"));
}
