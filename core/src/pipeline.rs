//! Bring-up and teardown of the trigger, sampling engine and transfer stream.
//!
//! Every engine is programmed before the one feeding it is started: the
//! stream is armed before the sampling engine can request a transfer, and
//! the sampling engine is armed before the first trigger edge. Teardown runs
//! the other way around, stopping the trigger first.

use crate::{
    config::AcquisitionConfig,
    flags::CompletionFlags,
    notification::on_transfer_interrupt,
    ring_buffer::SampleBuffer,
    sampling::{Delivery, SamplingEngine},
    transfer::{self, TransferConfig, TransferStream},
    trigger::Trigger,
    Error,
};

/// A running double buffered acquisition.
///
/// Owns the three engines for as long as it runs. The interrupt handler of the
/// transfer stream calls [`Pipeline::on_interrupt`].
pub struct Pipeline<T, A, S> {
    pub(crate) trigger: T,
    pub(crate) sampler: A,
    pub(crate) stream: S,
}

impl<T, A, S> Pipeline<T, A, S>
where
    T: Trigger,
    A: SamplingEngine,
    S: TransferStream,
{
    /// Arm `stream` to fill `buffer` and start converting.
    ///
    /// Delivery is always [`Delivery::Transfer`], whatever `config` says.
    pub fn start<const N: usize>(
        trigger: T,
        sampler: A,
        mut stream: S,
        buffer: &'static SampleBuffer<N>,
        config: &AcquisitionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        transfer::arm(&mut stream, buffer, &TransferConfig::ping_pong())?;

        let mut pipeline = Self {
            trigger,
            sampler,
            stream,
        };
        start_sampling(
            &mut pipeline.trigger,
            &mut pipeline.sampler,
            config,
            Delivery::Transfer,
        );

        log::info!(
            "Acquisition started: {} samples per buffer, {} ms per half",
            N,
            config.half_fill_time(N).to_millis()
        );

        Ok(pipeline)
    }

    /// The notification handler. Interrupt context only.
    pub fn on_interrupt(&mut self, flags: &CompletionFlags) {
        on_transfer_interrupt(&mut self.stream, flags);
    }

    /// Stop converting and hand back the engines.
    pub fn stop(mut self) -> (T, A, S) {
        self.trigger.stop();
        self.stream.disable();
        self.sampler.disable();

        log::info!("Acquisition stopped");

        (self.trigger, self.sampler, self.stream)
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }
}

/// Configure and enable the sampling engine, then start the trigger.
pub(crate) fn start_sampling<T: Trigger, A: SamplingEngine>(
    trigger: &mut T,
    sampler: &mut A,
    config: &AcquisitionConfig,
    delivery: Delivery,
) {
    let mut sampling = config.sampling;
    sampling.delivery = delivery;

    sampler.configure(&sampling);
    sampler.enable();

    trigger.configure(config.trigger);
    trigger.start();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        notification::{Conditions, TransferStatus},
        sampling::SamplingConfig,
        trigger::TriggerPeriod,
        Half, Sample,
    };
    use std::{cell::RefCell, rc::Rc};

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Timer(Log);
    struct Adc(Log, Option<SamplingConfig>);
    struct Stream(Log, bool, Conditions);

    impl Trigger for Timer {
        fn configure(&mut self, _: TriggerPeriod) {
            self.0.borrow_mut().push("trigger configure");
        }

        fn start(&mut self) {
            self.0.borrow_mut().push("trigger start");
        }

        fn stop(&mut self) {
            self.0.borrow_mut().push("trigger stop");
        }
    }

    impl SamplingEngine for Adc {
        fn configure(&mut self, config: &SamplingConfig) {
            self.1 = Some(*config);
            self.0.borrow_mut().push("adc configure");
        }

        fn enable(&mut self) {
            self.0.borrow_mut().push("adc enable");
        }

        fn disable(&mut self) {
            self.0.borrow_mut().push("adc disable");
        }
    }

    impl TransferStatus for Stream {
        fn pending(&self) -> Conditions {
            self.2
        }

        fn clear(&mut self, conditions: Conditions) {
            self.2.remove(conditions);
        }
    }

    impl TransferStream for Stream {
        fn is_enabled(&self) -> bool {
            self.1
        }

        fn disable(&mut self) {
            self.1 = false;
            self.0.borrow_mut().push("stream disable");
        }

        fn configure(&mut self, _: &TransferConfig, _: *mut Sample, _: u16) -> Result<(), Error> {
            self.0.borrow_mut().push("stream configure");
            Ok(())
        }

        fn enable(&mut self) {
            self.1 = true;
            self.0.borrow_mut().push("stream enable");
        }
    }

    fn parts() -> (Log, Timer, Adc, Stream) {
        let log = Log::default();
        (
            log.clone(),
            Timer(log.clone()),
            Adc(log.clone(), None),
            Stream(log, false, Conditions::empty()),
        )
    }

    #[test]
    fn start_order() {
        static BUFFER: SampleBuffer<8> = SampleBuffer::new();
        let (log, timer, adc, stream) = parts();

        let pipeline =
            Pipeline::start(timer, adc, stream, &BUFFER, &AcquisitionConfig::default()).unwrap();

        assert_eq!(
            *log.borrow(),
            [
                "stream disable",
                "stream configure",
                "stream enable",
                "adc configure",
                "adc enable",
                "trigger configure",
                "trigger start",
            ]
        );
        assert_eq!(pipeline.sampler.1.unwrap().delivery, Delivery::Transfer);
    }

    #[test]
    fn stop_order() {
        static BUFFER: SampleBuffer<8> = SampleBuffer::new();
        let (log, timer, adc, stream) = parts();
        let pipeline =
            Pipeline::start(timer, adc, stream, &BUFFER, &AcquisitionConfig::default()).unwrap();
        log.borrow_mut().clear();

        let (_, _, stream) = pipeline.stop();

        assert!(!stream.1);
        assert_eq!(
            *log.borrow(),
            ["trigger stop", "stream disable", "adc disable"]
        );
    }

    #[test]
    fn invalid_config_touches_nothing() {
        static BUFFER: SampleBuffer<8> = SampleBuffer::new();
        let (log, timer, adc, stream) = parts();
        let config = AcquisitionConfig {
            clock_hz: 0,
            ..Default::default()
        };

        let started = Pipeline::start(timer, adc, stream, &BUFFER, &config);

        assert!(matches!(started, Err(Error::InvalidPeriod)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn interrupt_raises_flags() {
        static BUFFER: SampleBuffer<8> = SampleBuffer::new();
        let flags = CompletionFlags::new();
        let (_, timer, adc, stream) = parts();
        let mut pipeline =
            Pipeline::start(timer, adc, stream, &BUFFER, &AcquisitionConfig::default()).unwrap();

        pipeline.stream.2 = Conditions::HALF_TRANSFER;
        pipeline.on_interrupt(&flags);

        assert!(flags.is_set(Half::First));
        assert!(pipeline.stream().pending().is_empty());
    }
}
