//! Interrupt per sample acquisition, without a ring buffer.
//!
//! The sampling engine raises an end-of-conversion interrupt, the handler
//! publishes the result here and the main loop reports it.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::{
    config::AcquisitionConfig,
    pipeline::start_sampling,
    sampling::{Delivery, SamplingEngine},
    trigger::Trigger,
    Error, Sample,
};

/// Latest conversion and its ready latch.
pub struct SampleLatch {
    value: AtomicU16,
    ready: AtomicBool,
    dropped: AtomicU32,
}

impl SampleLatch {
    pub const fn new() -> Self {
        Self {
            value: AtomicU16::new(0),
            ready: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Store a conversion. Interrupt context only.
    pub fn publish(&self, sample: Sample) {
        self.value.store(sample, Ordering::Relaxed);
        if self.ready.swap(true, Ordering::Release) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Take the latest conversion, if one arrived since the last call.
    pub fn take(&self) -> Option<Sample> {
        self.ready
            .swap(false, Ordering::Acquire)
            .then(|| self.value.load(Ordering::Relaxed))
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Conversions overwritten before they were taken.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for SampleLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// A running single sample acquisition. The end-of-conversion interrupt
/// handler publishes into a [`SampleLatch`].
pub struct SingleSample<T, A> {
    pub(crate) trigger: T,
    pub(crate) sampler: A,
}

impl<T: Trigger, A: SamplingEngine> SingleSample<T, A> {
    /// Delivery is always [`Delivery::Interrupt`], whatever `config` says.
    pub fn start(
        mut trigger: T,
        mut sampler: A,
        config: &AcquisitionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        start_sampling(&mut trigger, &mut sampler, config, Delivery::Interrupt);

        log::info!(
            "Single sample acquisition started, one conversion every {} ms",
            config.sample_period().to_millis()
        );

        Ok(Self { trigger, sampler })
    }

    pub fn stop(mut self) -> (T, A) {
        self.trigger.stop();
        self.sampler.disable();

        (self.trigger, self.sampler)
    }
}
