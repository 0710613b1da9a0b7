//! Basic loopbridge example
//!
//! Drives a queue-based embedded loop from the main thread through a bridge:
//! a zero-delay callback chain, work posted from a producer thread, and
//! next-tick sends, then a clean shutdown.
//!
//! # Environment Variables
//!
//! - `LB_LOG_LEVEL=trace` - Show poller state transitions and per-batch sizes
//! - `LB_FLUSH_EPRINT=1` - Flush log output immediately
//! - `LB_BATCH_SIZE`, `LB_BATCH_TIMEOUT_MS` - Batch limits

use loopbridge::testing::{EngineEvent, ManualLoop, RecordingEngine};
use loopbridge::{kinfo, kwarn, start, BridgeConfig, HostLoop, TaskQueueHost};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const CHAIN_LENGTH: usize = 200;
const PRODUCED: usize = 50;

// LB_LOG_LEVEL=debug cargo run -p loopbridge-basic
fn main() {
    println!("=== loopbridge Basic Example ===\n");

    BridgeConfig::from_env().print();

    // The main thread is the host thread: the engine context and the
    // loop's callbacks both live here.
    let embedded = Arc::new(ManualLoop::new());
    let host = Arc::new(TaskQueueHost::new());
    let engine = Arc::new(RecordingEngine::new());

    let mut bridge = match start(embedded.clone(), embedded.clone(), host.clone(), engine.clone()) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("failed to start bridge: {}", e);
            std::process::exit(1);
        }
    };

    // Zero-delay chain: keeps the loop permanently busy
    let chained = Arc::new(AtomicUsize::new(0));
    fn link(l: &ManualLoop, count: Arc<AtomicUsize>) {
        if count.fetch_add(1, Ordering::SeqCst) + 1 < CHAIN_LENGTH {
            l.post(move |l| link(l, count));
        }
    }
    let c = Arc::clone(&chained);
    embedded.post(move |l| link(l, c));

    // Work and next ticks from another thread
    let produced = Arc::new(AtomicUsize::new(0));
    let producer = {
        let embedded = Arc::clone(&embedded);
        let produced = Arc::clone(&produced);
        let next_tick = bridge.next_tick_sender();
        thread::spawn(move || {
            for i in 0..PRODUCED {
                let p = Arc::clone(&produced);
                embedded.post(move |_| {
                    p.fetch_add(1, Ordering::SeqCst);
                });
                if i % 10 == 0 {
                    next_tick.send();
                }
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    // Host work interleaves with batches
    let host_tasks = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let h = Arc::clone(&host_tasks);
        host.post_task(Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }));
    }

    let start_time = Instant::now();
    let done = host.run_until(Duration::from_secs(10), || {
        chained.load(Ordering::SeqCst) >= CHAIN_LENGTH && produced.load(Ordering::SeqCst) >= PRODUCED
    });
    if let Err(e) = producer.join() {
        kwarn!("producer panicked: {:?}", e);
    }
    if !done {
        kwarn!("timed out waiting for loop work");
    }

    let stats = bridge.stats();
    kinfo!(
        "{} chained + {} produced callbacks in {:?}",
        chained.load(Ordering::SeqCst),
        produced.load(Ordering::SeqCst),
        start_time.elapsed()
    );
    kinfo!(
        "{} batches, {} iterations (max {} per batch), {} next ticks, {} host tasks",
        stats.batches,
        stats.iterations,
        stats.max_batch_iterations,
        engine.count(EngineEvent::NextTick),
        host_tasks.load(Ordering::SeqCst)
    );

    match bridge.shutdown() {
        Some(poller) => kinfo!(
            "poller: {} polls, {} dispatches, exit: {}",
            poller.polls,
            poller.dispatches,
            poller.exit
        ),
        None => kwarn!("poller did not report stats"),
    }

    println!("\n=== Example Complete ===");
}
