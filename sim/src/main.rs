use std::{
    error::Error,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use fugit::NanosDurationU64;
use pingpong_core::{
    consumer::Consumer, ring_buffer::SampleBuffer, sim::SimBench, transport::LineWriter,
    AcquisitionContext,
};

use crate::{
    config::SimConfig,
    signal::Signal,
    stdout::{StdDelay, StdoutPort},
};

mod config;
mod signal;
mod stdout;

/// Samples in the ring buffer
const CAPACITY: usize = 64;

/// Wall clock time between two steps of the simulated hardware
const HARDWARE_TICK: Duration = Duration::from_millis(1);

/// Wall clock time the consumer sleeps when nothing is pending
const CONSUMER_IDLE: Duration = Duration::from_micros(200);

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();

    let config = load_config()?;
    if !(config.speed > 0.0) {
        return Err("speed must be positive".into());
    }

    let acquisition = config.acquisition;
    log::info!(
        "Sample period {} us, {} samples per buffer, x{} speed",
        acquisition.sample_period().to_micros(),
        CAPACITY,
        config.speed
    );

    let ctx: &'static AcquisitionContext<CAPACITY> =
        Box::leak(Box::new(AcquisitionContext::new()));
    let signal = Signal::new(
        config.signal.clone(),
        SampleBuffer::<CAPACITY>::HALF,
        config.seed,
    );
    let mut bench = SimBench::start(ctx, signal, &acquisition)?;

    let running = Arc::new(AtomicBool::new(true));

    // The hardware: trigger, sampling engine, transfer stream and its
    // interrupt, following the wall clock
    let hardware = {
        let running = running.clone();
        let speed = config.speed;

        std::thread::spawn(move || {
            let start = Instant::now();
            let mut simulated = Duration::ZERO;

            while running.load(Ordering::Relaxed) {
                std::thread::sleep(HARDWARE_TICK);

                let target = start.elapsed().mul_f64(speed);
                let step = target.saturating_sub(simulated);
                bench.run_for(NanosDurationU64::from_ticks(step.as_nanos() as u64));
                simulated = target;
            }

            bench.stop()
        })
    };

    let mut out = LineWriter::new(
        StdoutPort::new(),
        StdDelay,
        acquisition.transport.timeout(),
    );
    if let Err(e) = out.write_line("ADC DMA circular") {
        log::error!("Failed to write banner: {}", e);
    }

    let mut consumer = Consumer::new();
    let mut reported = 0;

    while config.reports.map_or(true, |limit| reported < limit) {
        match consumer.service(ctx, &mut out) {
            Ok(0) => std::thread::sleep(CONSUMER_IDLE),
            Ok(n) => reported += n as u64,
            Err(e) => log::error!("Failed to send report: {}", e),
        }

        if hardware.is_finished() {
            break;
        }
    }

    running.store(false, Ordering::Relaxed);
    let (trigger, _, stream) = hardware
        .join()
        .map_err(|_| "simulated hardware panicked")?;

    log::info!(
        "{} trigger edges, {} samples transferred, {} notifications ({} dropped, {} faults), {} reports",
        trigger.edges(),
        stream.transferred(),
        ctx.flags.raised(),
        ctx.flags.dropped(),
        ctx.flags.faults(),
        reported
    );

    Ok(())
}

fn load_config() -> Result<SimConfig, Box<dyn Error>> {
    let config = match std::env::var_os("PINGPONG_CONFIG").map(PathBuf::from) {
        Some(path) => pingpong_core::config::load(Some(&path), "pingpong.toml")?,
        None => pingpong_core::config::load(None, "pingpong.toml").unwrap_or_else(|e| {
            log::info!("No configuration loaded ({}), using defaults", e);
            SimConfig::default()
        }),
    };

    config.acquisition.validate()?;

    Ok(config)
}
