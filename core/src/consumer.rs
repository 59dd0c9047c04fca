use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal_nb::serial;

use crate::{flags::CompletionFlags, transport::LineWriter, AcquisitionContext, Error, Half, Sample};

/// What a [`Report`] summarizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// Mean of one half of the ring buffer.
    Half(Half),
    /// One conversion of the single sample variant.
    Single,
}

/// One statistic, handed to the transport as soon as it is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    pub source: Source,
    pub value: u32,
}

impl Report {
    pub const fn half(half: Half, mean: u32) -> Self {
        Self {
            source: Source::Half(half),
            value: mean,
        }
    }

    pub const fn single(sample: Sample) -> Self {
        Self {
            source: Source::Single,
            value: sample as u32,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self.source {
            Source::Half(Half::First) => "AVG0",
            Source::Half(Half::Second) => "AVG1",
            Source::Single => "ADC",
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.label(), self.value)
    }
}

/// The consumer side of the double buffer.
///
/// Each call to [`Consumer::service`] handles every half whose latch is set.
/// A latch is taken before its half is read, so a notification arriving
/// while the report is being sent is kept for the next call.
pub struct Consumer<const N: usize> {
    seen_dropped: u32,
    seen_faults: u32,
}

impl<const N: usize> Consumer<N> {
    pub const fn new() -> Self {
        Self {
            seen_dropped: 0,
            seen_faults: 0,
        }
    }

    /// Take the latch for `half` and compute its mean, if it was set.
    pub fn next_report(&mut self, ctx: &AcquisitionContext<N>, half: Half) -> Option<Report> {
        ctx.flags
            .take(half)
            .then(|| Report::half(half, ctx.buffer.mean(half)))
    }

    /// Report every completed half. Returns how many were reported; zero
    /// means the caller may idle.
    pub fn service<W, D>(
        &mut self,
        ctx: &AcquisitionContext<N>,
        out: &mut LineWriter<W, D>,
    ) -> Result<usize, Error>
    where
        W: serial::Write<u8>,
        D: DelayNs,
    {
        self.check_health(&ctx.flags);

        let mut reported = 0;
        for half in [Half::First, Half::Second] {
            if let Some(report) = self.next_report(ctx, half) {
                log::debug!("{}", report);
                out.write_report(&report)?;
                reported += 1;
            }
        }

        Ok(reported)
    }

    /// Log when notifications were dropped or faults acknowledged since the
    /// last check.
    fn check_health(&mut self, flags: &CompletionFlags) {
        let dropped = flags.dropped();
        if dropped != self.seen_dropped {
            log::warn!(
                "Consumer fell behind, {} notifications dropped ({} total)",
                dropped.wrapping_sub(self.seen_dropped),
                dropped
            );
            self.seen_dropped = dropped;
        }

        let faults = flags.faults();
        if faults != self.seen_faults {
            log::warn!(
                "Transfer engine reported {} error conditions ({} total)",
                faults.wrapping_sub(self.seen_faults),
                faults
            );
            self.seen_faults = faults;
        }
    }

    /// Dropped notifications seen by the last [`Consumer::service`] call.
    pub fn dropped(&self) -> u32 {
        self.seen_dropped
    }

    pub fn faults(&self) -> u32 {
        self.seen_faults
    }
}

impl<const N: usize> Default for Consumer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::tests::{writer, Port};

    fn fill(ctx: &AcquisitionContext<64>, half: Half, value: Sample) {
        for i in crate::ring_buffer::SampleBuffer::<64>::range(half) {
            ctx.buffer.store(i, value);
        }
    }

    #[test]
    fn idle_without_notifications() {
        let ctx = AcquisitionContext::<64>::new();
        let mut consumer = Consumer::new();
        let mut out = writer(Port::default());

        assert_eq!(consumer.service(&ctx, &mut out), Ok(0));
        assert!(out.release().0.sent.is_empty());
    }

    #[test]
    fn first_full_cycle() {
        let ctx = AcquisitionContext::<64>::new();
        let mut consumer = Consumer::new();
        let mut out = writer(Port::default());

        fill(&ctx, Half::First, 100);
        ctx.flags.raise(Half::First);
        assert_eq!(consumer.service(&ctx, &mut out), Ok(1));

        fill(&ctx, Half::Second, 200);
        ctx.flags.raise(Half::Second);
        assert_eq!(consumer.service(&ctx, &mut out), Ok(1));

        assert!(!ctx.flags.any_pending());
        assert_eq!(out.release().0.sent, b"AVG0 = 100\r\nAVG1 = 200\r\n");
    }

    #[test]
    fn both_halves_in_one_pass() {
        let ctx = AcquisitionContext::<64>::new();
        let mut consumer = Consumer::new();
        let mut out = writer(Port::default());

        fill(&ctx, Half::First, 1);
        fill(&ctx, Half::Second, 2);
        ctx.flags.raise(Half::Second);
        ctx.flags.raise(Half::First);

        assert_eq!(consumer.service(&ctx, &mut out), Ok(2));
        assert_eq!(out.release().0.sent, b"AVG0 = 1\r\nAVG1 = 2\r\n");
    }

    #[test]
    fn next_report_takes_the_latch() {
        let ctx = AcquisitionContext::<2>::new();
        let mut consumer = Consumer::new();
        ctx.buffer.store(1, 77);
        ctx.flags.raise(Half::Second);

        assert_eq!(
            consumer.next_report(&ctx, Half::Second),
            Some(Report::half(Half::Second, 77))
        );
        assert_eq!(consumer.next_report(&ctx, Half::Second), None);
    }

    #[test]
    fn failed_report_keeps_other_half_pending() {
        let ctx = AcquisitionContext::<64>::new();
        let mut consumer = Consumer::new();
        let mut out = writer(Port {
            stuck: true,
            ..Default::default()
        });

        ctx.flags.raise(Half::First);
        ctx.flags.raise(Half::Second);

        assert_eq!(consumer.service(&ctx, &mut out), Err(Error::Timeout));
        assert!(!ctx.flags.is_set(Half::First));
        assert!(ctx.flags.is_set(Half::Second));
    }

    #[test]
    fn dropped_notifications_are_noticed() {
        let ctx = AcquisitionContext::<64>::new();
        let mut consumer = Consumer::new();
        let mut out = writer(Port::default());

        ctx.flags.raise(Half::First);
        ctx.flags.raise(Half::First);
        ctx.flags.record_faults(2);

        assert_eq!(consumer.service(&ctx, &mut out), Ok(1));
        assert_eq!(consumer.dropped(), 1);
        assert_eq!(consumer.faults(), 2);
    }

    #[test]
    fn report_display() {
        assert_eq!(Report::half(Half::First, 0).to_string(), "AVG0 = 0");
        assert_eq!(Report::half(Half::Second, 1024).to_string(), "AVG1 = 1024");
        assert_eq!(Report::single(7).to_string(), "ADC = 7");
    }
}
