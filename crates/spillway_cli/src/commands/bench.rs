//! Bench command implementation.

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use spillway_codec::serializers;
use spillway_core::flow::{IterPublisher, Publisher, Subscriber, Subscription, UNBOUNDED};
use spillway_core::{
    buffer_to_file, DrainMode, Options, SingleThreadExecutor, SpillError, SpillResult,
};
use spillway_storage::{FileFactory, SegmentFactory, StorageBackend, StorageResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Segment rollover requested on the command line.
#[derive(Debug, Clone, Copy)]
pub enum Rollover {
    /// The library default.
    Default,
    /// One segment for the whole run.
    Disabled,
    /// A new segment every N records.
    Records(u64),
    /// A new segment once a segment holds N bytes.
    Bytes(u64),
}

/// Bench parameters.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Messages to emit.
    pub count: u64,
    /// Bytes per message.
    pub message_size: usize,
    /// Rollover setting.
    pub rollover: Rollover,
    /// Segment directory.
    pub dir: Option<PathBuf>,
    /// Drain on a dedicated thread.
    pub asynchronous: bool,
}

/// Bench results.
#[derive(Debug, Serialize)]
pub struct BenchReport {
    /// Messages delivered.
    pub messages: u64,
    /// Payload bytes delivered.
    pub payload_bytes: u64,
    /// Segments created during the run.
    pub segments_created: u64,
    /// Wall time in milliseconds.
    pub elapsed_ms: u128,
    /// Delivered messages per second.
    pub messages_per_sec: f64,
    /// Delivered payload MiB per second.
    pub mib_per_sec: f64,
    /// Drain mode used.
    pub mode: &'static str,
}

/// Runs the bench command.
pub fn run(settings: &Settings, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = measure(settings)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(settings, &report);
        }
    }

    Ok(())
}

fn measure(settings: &Settings) -> SpillResult<BenchReport> {
    let inner = match &settings.dir {
        Some(dir) => FileFactory::in_dir(dir),
        None => FileFactory::temp(),
    };
    let factory = CountingFactory {
        inner,
        created: Arc::new(AtomicU64::new(0)),
    };
    let created = Arc::clone(&factory.created);

    let options = match settings.rollover {
        Rollover::Default => Options::new(),
        Rollover::Disabled => Options::new().disable_rollover(),
        Rollover::Records(records) => Options::new().rollover_every(records),
        Rollover::Bytes(bytes) => Options::new().rollover_size_bytes(bytes),
    }
    .file_factory(factory);

    let executor = if settings.asynchronous {
        Some(SingleThreadExecutor::shared("spillway-drain")?)
    } else {
        None
    };
    let mode = match &executor {
        Some(executor) => DrainMode::on(executor.clone()),
        None => DrainMode::Synchronous,
    };

    let count = settings.count;
    let size = settings.message_size;
    let source = IterPublisher::new(move || (0..count).map(move |_| Ok("x".repeat(size))));
    let buffered = buffer_to_file(source, serializers::string(), mode.clone(), options)?;

    info!(count, size, ?mode, rollover = ?settings.rollover, "starting bench");
    let sink = Arc::new(Sink::default());
    let started = Instant::now();
    buffered.subscribe(sink.clone());
    sink.wait()?;
    let elapsed = started.elapsed();

    if let Some(executor) = executor {
        executor.shutdown();
    }

    let messages = sink.messages.load(Ordering::Acquire);
    let payload_bytes = sink.bytes.load(Ordering::Acquire);
    let seconds = elapsed.as_secs_f64().max(f64::EPSILON);
    Ok(BenchReport {
        messages,
        payload_bytes,
        segments_created: created.load(Ordering::Acquire),
        elapsed_ms: elapsed.as_millis(),
        messages_per_sec: messages as f64 / seconds,
        mib_per_sec: payload_bytes as f64 / (1024.0 * 1024.0) / seconds,
        mode: if settings.asynchronous {
            "asynchronous"
        } else {
            "synchronous"
        },
    })
}

fn print_text_output(settings: &Settings, report: &BenchReport) {
    println!("Spillway Bench");
    println!("==============");
    println!();
    println!("Messages:         {}", report.messages);
    println!("Message size:     {} bytes", settings.message_size);
    println!("Rollover:         {:?}", settings.rollover);
    println!("Drain mode:       {}", report.mode);
    println!("Segments created: {}", report.segments_created);
    println!();
    println!("Elapsed:          {} ms", report.elapsed_ms);
    println!("Throughput:       {:.0} msg/s", report.messages_per_sec);
    println!("                  {:.2} MiB/s", report.mib_per_sec);
}

/// Counts the segments it creates.
#[derive(Debug)]
struct CountingFactory {
    inner: FileFactory,
    created: Arc<AtomicU64>,
}

impl SegmentFactory for CountingFactory {
    fn create(&self, sequence: u64) -> StorageResult<Box<dyn StorageBackend>> {
        let backend = self.inner.create(sequence)?;
        self.created.fetch_add(1, Ordering::AcqRel);
        Ok(backend)
    }
}

/// Requests everything and counts what arrives.
#[derive(Default)]
struct Sink {
    messages: AtomicU64,
    bytes: AtomicU64,
    outcome: Mutex<Option<SpillResult<()>>>,
    finished: Condvar,
}

impl Sink {
    fn finish(&self, outcome: SpillResult<()>) {
        *self.outcome.lock() = Some(outcome);
        self.finished.notify_all();
    }

    fn wait(&self) -> SpillResult<()> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(result) = outcome.take() {
                return result;
            }
            self.finished.wait(&mut outcome);
        }
    }
}

impl Subscriber<String> for Sink {
    fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
        if let Err(e) = subscription.request(UNBOUNDED) {
            subscription.cancel();
            self.finish(Err(e));
        }
    }

    fn on_next(&self, item: String) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(item.len() as u64, Ordering::Relaxed);
    }

    fn on_error(&self, error: SpillError) {
        self.finish(Err(error));
    }

    fn on_complete(&self) {
        self.finish(Ok(()));
    }
}
