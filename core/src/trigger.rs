use fugit::{HertzU32, NanosDurationU64};

/// Period of the trigger timer as a prescaler and reload pair.
///
/// `period = (prescaler + 1) * (reload + 1) / clock`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TriggerPeriod {
    pub prescaler: u16,
    pub reload: u32,
}

impl TriggerPeriod {
    pub const fn new(prescaler: u16, reload: u32) -> Self {
        Self { prescaler, reload }
    }

    /// Timer clock cycles between two trigger edges.
    pub const fn ticks(&self) -> u64 {
        (self.prescaler as u64 + 1) * (self.reload as u64 + 1)
    }

    /// Time between two edges at `clock`, or `None` when the clock is zero
    /// or the period does not fit in nanoseconds.
    pub fn checked_period(&self, clock: HertzU32) -> Option<NanosDurationU64> {
        let nanos =
            (u128::from(self.ticks()) * 1_000_000_000).checked_div(u128::from(clock.to_Hz()))?;
        u64::try_from(nanos).ok().map(NanosDurationU64::from_ticks)
    }

    /// Saturates where [`TriggerPeriod::checked_period`] fails.
    pub fn period(&self, clock: HertzU32) -> NanosDurationU64 {
        self.checked_period(clock)
            .unwrap_or(NanosDurationU64::from_ticks(u64::MAX))
    }

    /// Time the transfer engine takes to fill one half of an `n` sample
    /// buffer. The consumer must finish a half well within this.
    pub fn half_fill_time(&self, clock: HertzU32, n: usize) -> NanosDurationU64 {
        let half = n as u64 / 2;
        NanosDurationU64::from_ticks(self.period(clock).ticks().saturating_mul(half))
    }
}

/// A free running timer that emits a trigger edge every period.
pub trait Trigger {
    /// Program the period. Only called while stopped.
    fn configure(&mut self, period: TriggerPeriod);

    fn start(&mut self);

    fn stop(&mut self);
}
