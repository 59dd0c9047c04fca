use crate::{flags::CompletionFlags, Half};

bitflags::bitflags! {
    /// Conditions latched by the transfer engine.
    ///
    /// Bit positions follow the stream 0 layout of the STM32F4 DMA low
    /// interrupt status register, so the firmware can move them in and out of
    /// `LISR`/`LIFCR` without translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Conditions: u8 {
        const FIFO_ERROR = 1 << 0;
        const DIRECT_MODE_ERROR = 1 << 2;
        const TRANSFER_ERROR = 1 << 3;
        const HALF_TRANSFER = 1 << 4;
        const TRANSFER_COMPLETE = 1 << 5;

        const ERRORS = Self::FIFO_ERROR.bits()
            | Self::DIRECT_MODE_ERROR.bits()
            | Self::TRANSFER_ERROR.bits();
        const COMPLETIONS = Self::HALF_TRANSFER.bits() | Self::TRANSFER_COMPLETE.bits();
    }
}

impl Conditions {
    /// The completion condition that reports `half` as filled.
    pub const fn completion(half: Half) -> Self {
        match half {
            Half::First => Self::HALF_TRANSFER,
            Half::Second => Self::TRANSFER_COMPLETE,
        }
    }
}

/// Interrupt status of one transfer stream.
pub trait TransferStatus {
    /// Conditions currently latched.
    fn pending(&self) -> Conditions;

    /// Acknowledge `conditions`. Clearing a condition that is not latched has
    /// no effect.
    fn clear(&mut self, conditions: Conditions);
}

/// The transfer interrupt handler.
///
/// Acknowledges every latched condition, including the error conditions no
/// one acts on (a latched error blocks all further notifications), raises the
/// completion latch for each filled half and counts every error condition as
/// a fault. Runs in constant time.
pub fn on_transfer_interrupt<S: TransferStatus>(status: &mut S, flags: &CompletionFlags) {
    let pending = status.pending();
    if pending.is_empty() {
        return;
    }

    status.clear(pending);

    if pending.contains(Conditions::HALF_TRANSFER) {
        flags.raise(Half::First);
    }

    if pending.contains(Conditions::TRANSFER_COMPLETE) {
        flags.raise(Half::Second);
    }

    let errors = pending & Conditions::ERRORS;
    if !errors.is_empty() {
        flags.record_faults(errors.bits().count_ones());
    }
}
