//! Simulated trigger, sampling engine and transfer stream.
//!
//! The simulated engines keep the timing of the real ones exactly: the
//! trigger emits an edge every `(prescaler + 1) * (reload + 1)` clock cycles,
//! every edge converts one sample and the stream latches its completion
//! conditions at the same slots as the hardware does. Time only advances when
//! the owner says so, which makes every run deterministic.

use fugit::{HertzU32, NanosDurationU64};

use crate::{
    config::AcquisitionConfig,
    notification::{Conditions, TransferStatus},
    pipeline::Pipeline,
    ring_buffer::SampleBuffer,
    sampling::{SamplingConfig, SamplingEngine},
    transfer::{self, TransferConfig, TransferStream},
    trigger::{Trigger, TriggerPeriod},
    AcquisitionContext, Error, Sample,
};

/// Largest value a 12 bit conversion produces.
pub const FULL_SCALE: Sample = 0x0FFF;

/// The analog input. Gets the index of the conversion.
pub trait SignalSource {
    fn sample(&mut self, index: u64) -> Sample;
}

impl<F: FnMut(u64) -> Sample> SignalSource for F {
    fn sample(&mut self, index: u64) -> Sample {
        self(index)
    }
}

pub struct SimTrigger {
    clock: HertzU32,
    period: Option<TriggerPeriod>,
    running: bool,
    /// Time since the last edge, in nanoseconds times the clock in hertz
    phase: u128,
    edges: u64,
}

impl SimTrigger {
    pub fn new(clock: HertzU32) -> Self {
        Self {
            clock,
            period: None,
            running: false,
            phase: 0,
            edges: 0,
        }
    }

    /// Let `elapsed` pass and return the number of edges emitted meanwhile.
    pub fn advance(&mut self, elapsed: NanosDurationU64) -> u64 {
        let Some(period) = self.period.filter(|_| self.running) else {
            return 0;
        };

        let edge = u128::from(period.ticks()) * 1_000_000_000;
        self.phase += u128::from(elapsed.ticks()) * u128::from(self.clock.to_Hz());

        let edges = (self.phase / edge) as u64;
        self.phase %= edge;
        self.edges += edges;

        edges
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Edges emitted since power-on.
    pub fn edges(&self) -> u64 {
        self.edges
    }
}

impl Trigger for SimTrigger {
    fn configure(&mut self, period: TriggerPeriod) {
        self.period = Some(period);
    }

    fn start(&mut self) {
        // The counter restarts from zero
        self.phase = 0;
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

pub struct SimAdc<S> {
    source: S,
    config: Option<SamplingConfig>,
    enabled: bool,
    conversions: u64,
}

impl<S: SignalSource> SimAdc<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: None,
            enabled: false,
            conversions: 0,
        }
    }

    /// Convert once, as if a trigger edge arrived. Returns nothing while
    /// disabled.
    pub fn convert(&mut self) -> Option<Sample> {
        if !self.enabled || self.config.is_none() {
            return None;
        }

        let sample = self.source.sample(self.conversions).min(FULL_SCALE);
        self.conversions += 1;

        Some(sample)
    }

    pub fn config(&self) -> Option<&SamplingConfig> {
        self.config.as_ref()
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }
}

impl<S> SamplingEngine for SimAdc<S> {
    fn configure(&mut self, config: &SamplingConfig) {
        self.config = Some(*config);
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

/// A transfer stream writing into one fixed buffer.
pub struct SimStream<const N: usize> {
    buffer: &'static SampleBuffer<N>,
    config: Option<TransferConfig>,
    enabled: bool,
    len: usize,
    cursor: usize,
    latched: Conditions,
    transferred: u64,
}

impl<const N: usize> SimStream<N> {
    pub fn new(buffer: &'static SampleBuffer<N>) -> Self {
        Self {
            buffer,
            config: None,
            enabled: false,
            len: 0,
            cursor: 0,
            latched: Conditions::empty(),
            transferred: 0,
        }
    }

    fn interrupts(&self) -> Conditions {
        self.config
            .map(|config| config.interrupts)
            .unwrap_or(Conditions::empty())
    }

    /// Serve one transfer request. Returns whether the stream interrupt fired.
    pub fn request(&mut self, sample: Sample) -> bool {
        let Some(config) = self.config.filter(|_| self.enabled) else {
            return false;
        };

        self.buffer.store(self.cursor, sample);
        self.transferred += 1;

        let mut raised = Conditions::empty();
        if config.memory_increment {
            self.cursor += 1;
        }
        if self.cursor == self.len / 2 {
            raised |= Conditions::HALF_TRANSFER;
        }
        if self.cursor == self.len {
            raised |= Conditions::TRANSFER_COMPLETE;
            self.cursor = 0;
            if !config.circular {
                self.enabled = false;
            }
        }

        self.latch(raised)
    }

    /// Latch `conditions` as the hardware would. A transfer error stops the
    /// stream. Returns whether the stream interrupt fired.
    pub fn inject(&mut self, conditions: Conditions) -> bool {
        if conditions.contains(Conditions::TRANSFER_ERROR) {
            self.enabled = false;
        }

        self.latch(conditions)
    }

    fn latch(&mut self, conditions: Conditions) -> bool {
        // A line held by an unacknowledged condition does not fire again
        let line_was_high = self.latched.intersects(self.interrupts());
        self.latched |= conditions;

        !line_was_high && conditions.intersects(self.interrupts())
    }

    /// Samples written since power-on.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    pub fn config(&self) -> Option<&TransferConfig> {
        self.config.as_ref()
    }
}

impl<const N: usize> TransferStatus for SimStream<N> {
    fn pending(&self) -> Conditions {
        self.latched
    }

    fn clear(&mut self, conditions: Conditions) {
        self.latched.remove(conditions);
    }
}

impl<const N: usize> TransferStream for SimStream<N> {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn configure(
        &mut self,
        config: &TransferConfig,
        destination: *mut Sample,
        len: u16,
    ) -> Result<(), Error> {
        if self.enabled {
            return Err(Error::StreamEnabled);
        }
        debug_assert_eq!(destination, self.buffer.as_dma_ptr());

        self.config = Some(*config);
        self.len = usize::from(len).min(N);
        self.cursor = 0;

        Ok(())
    }

    fn enable(&mut self) {
        self.enabled = true;
    }
}

pub type SimPipeline<S, const N: usize> = Pipeline<SimTrigger, SimAdc<S>, SimStream<N>>;

/// A simulated acquisition running on a shared [`AcquisitionContext`].
///
/// Plays the part of the hardware and of the transfer interrupt, the owner of
/// the context plays the consumer.
pub struct SimBench<S, const N: usize> {
    pipeline: SimPipeline<S, N>,
    ctx: &'static AcquisitionContext<N>,
}

impl<S: SignalSource, const N: usize> SimBench<S, N> {
    pub fn start(
        ctx: &'static AcquisitionContext<N>,
        source: S,
        config: &AcquisitionConfig,
    ) -> Result<Self, Error> {
        let pipeline = Pipeline::start(
            SimTrigger::new(config.clock()),
            SimAdc::new(source),
            SimStream::new(&ctx.buffer),
            &ctx.buffer,
            config,
        )?;

        Ok(Self { pipeline, ctx })
    }

    /// Let `elapsed` pass. Returns the number of trigger edges.
    pub fn run_for(&mut self, elapsed: NanosDurationU64) -> u64 {
        let edges = self.pipeline.trigger.advance(elapsed);
        self.convert(edges);
        edges
    }

    /// Let `edges` trigger edges pass, if the trigger runs.
    pub fn run_edges(&mut self, edges: u64) {
        if self.pipeline.trigger.is_running() {
            self.convert(edges);
        }
    }

    fn convert(&mut self, edges: u64) {
        for _ in 0..edges {
            let Some(sample) = self.pipeline.sampler.convert() else {
                return;
            };
            if self.pipeline.stream.request(sample) {
                self.pipeline.on_interrupt(&self.ctx.flags);
            }
        }
    }

    /// Latch error conditions on the stream and run its interrupt.
    pub fn inject(&mut self, conditions: Conditions) {
        if self.pipeline.stream.inject(conditions) {
            self.pipeline.on_interrupt(&self.ctx.flags);
        }
    }

    /// Re-arm the stream after it stopped, e.g. on a transfer error.
    pub fn rearm(&mut self) -> Result<(), Error> {
        transfer::arm(
            &mut self.pipeline.stream,
            &self.ctx.buffer,
            &TransferConfig::ping_pong(),
        )
    }

    pub fn context(&self) -> &'static AcquisitionContext<N> {
        self.ctx
    }

    pub fn stream(&self) -> &SimStream<N> {
        &self.pipeline.stream
    }

    pub fn trigger(&self) -> &SimTrigger {
        &self.pipeline.trigger
    }

    pub fn stop(self) -> (SimTrigger, SimAdc<S>, SimStream<N>) {
        self.pipeline.stop()
    }
}
