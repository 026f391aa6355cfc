//! Demonstration of ringpipe features.
//!
//! Run with: `RUST_LOG=ringpipe=debug cargo run -p ringpipe --features demo --bin pipe_demo`

use ringpipe::{
    Access, CancelToken, Event, Interest, PipeError, PipeTable, Wait, SMALL_PIPE_CONFIG,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let table = PipeTable::new(2, SMALL_PIPE_CONFIG.with_metrics(true))?;
    println!("=== ringpipe Demo ({} pipes) ===\n", table.len());

    demo_streaming(&table)?;
    demo_nonblocking(&table)?;
    demo_cancellation(&table)?;

    for (index, status) in table.statuses().iter().enumerate() {
        println!("pipe {}: {:?}", index, status);
    }
    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: one writer streams more than the capacity to one reader.
fn demo_streaming(table: &PipeTable) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 1: Streaming through a small pipe ---");

    let reader = table.open(0, Access::READ)?;
    let writer = table.open(0, Access::WRITE)?;

    let (tx, rx) = crossbeam_channel::unbounded::<Event>();
    reader.subscribe(Arc::new(tx))?;

    let payload: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
    let expected = payload.len();
    let producer = thread::spawn(move || writer.write_all(&payload, Wait::blocking()));

    let mut buf = [0u8; 100];
    let mut received = 0;
    while received < expected {
        received += reader.read(&mut buf, Wait::blocking())?;
    }

    let sent = producer.join().expect("writer thread panicked")?;
    let events = rx.try_iter().count();
    info!(sent, received, events, "stream finished");
    println!(
        "  sent {} bytes, received {}, {} readable events",
        sent, received, events
    );

    let metrics = table.get(0).map(|ch| ch.metrics()).unwrap_or_default();
    println!(
        "  writer slept {} times, reader slept {} times\n",
        metrics.write_waits, metrics.read_waits
    );
    Ok(())
}

/// Demo 2: non-blocking calls report WouldBlock instead of sleeping.
fn demo_nonblocking(table: &PipeTable) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 2: Non-blocking access ---");

    let rw = table.open(1, Access::READ_WRITE)?;
    let mut buf = [0u8; 8];
    match rw.read(&mut buf, Wait::nonblocking()) {
        Err(PipeError::WouldBlock) => println!("  empty pipe: read would block"),
        other => println!("  unexpected: {:?}", other),
    }

    let usable = rw.channel().config().usable_capacity();
    let fill = vec![b'#'; usable];
    let n = rw.write_all(&fill, Wait::nonblocking())?;
    println!("  filled {} of {} usable bytes", n, usable);

    match rw.write(b"!", Wait::nonblocking()) {
        Err(PipeError::WouldBlock) => println!("  full pipe: write would block"),
        other => println!("  unexpected: {:?}", other),
    }
    println!("  readiness: {:?}\n", rw.poll()?);
    Ok(())
}

/// Demo 3: a reader parked on an empty pipe is released by a cancel token.
fn demo_cancellation(table: &PipeTable) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- Demo 3: Cancelling a blocked reader ---");

    let reader = table.open(0, Access::READ)?;
    let token = CancelToken::new();
    let canceller = token.clone();

    let waiter = thread::spawn(move || {
        let mut buf = [0u8; 16];
        reader.read(&mut buf, Wait::cancellable(&token))
    });

    thread::sleep(Duration::from_millis(50));
    canceller.cancel();
    let outcome = waiter.join().expect("reader thread panicked");
    println!("  blocked read returned {:?}", outcome);

    let watcher = table.open(0, Access::READ)?;
    let timed = watcher.poll_wait(
        Interest::READABLE,
        Wait::blocking().with_timeout(Duration::from_millis(20)),
    );
    println!("  poll_wait with timeout returned {:?}\n", timed);
    Ok(())
}
