use embedded_hal::delay::DelayNs;
use fugit::HertzU32;

/// Busy waits by counting core clock cycles.
///
/// SysTick is taken by the monotonic, so short waits in the report path spin
/// instead.
pub struct CycleDelay {
    sysclk: HertzU32,
}

impl CycleDelay {
    pub fn new(sysclk: HertzU32) -> Self {
        Self { sysclk }
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = u64::from(ns) * u64::from(self.sysclk.to_Hz()) / 1_000_000_000;
        cortex_m::asm::delay(cycles.clamp(1, u64::from(u32::MAX)) as u32);
    }
}
