#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod config;
pub mod consumer;
pub mod flags;
pub mod notification;
pub mod pipeline;
pub mod ring_buffer;
pub mod sampling;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod single;
pub mod transfer;
pub mod transport;
pub mod trigger;

use flags::CompletionFlags;
use ring_buffer::SampleBuffer;

/// A raw, right-aligned conversion result.
pub type Sample = u16;

/// One of the two halves of a [`SampleBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// Indices `[0, N/2)`, completed by the half transfer condition.
    First,
    /// Indices `[N/2, N)`, completed by the transfer complete condition.
    Second,
}

impl Half {
    pub const fn index(self) -> usize {
        match self {
            Half::First => 0,
            Half::Second => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("operation did not complete within its timeout")]
    Timeout,
    #[error("transport reported a hardware fault")]
    Transport,
    #[error("transfer stream must be disabled before it is configured")]
    StreamEnabled,
    #[error("trigger period cannot be represented by the timer")]
    InvalidPeriod,
    #[error("report does not fit in its line buffer")]
    Format,
}

/// All state shared between the interrupt context and the consumer loop.
///
/// The transfer engine writes into `buffer` and the notification handler
/// raises `flags`. The consumer only reads the half a flag reported complete.
pub struct AcquisitionContext<const N: usize> {
    pub buffer: SampleBuffer<N>,
    pub flags: CompletionFlags,
}

impl<const N: usize> AcquisitionContext<N> {
    pub const fn new() -> Self {
        Self {
            buffer: SampleBuffer::new(),
            flags: CompletionFlags::new(),
        }
    }
}

impl<const N: usize> Default for AcquisitionContext<N> {
    fn default() -> Self {
        Self::new()
    }
}
