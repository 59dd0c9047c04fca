use crate::{
    notification::{Conditions, TransferStatus},
    ring_buffer::SampleBuffer,
    Error, Sample,
};

/// How many times [`arm`] polls for the stream to report disabled.
pub const DISABLE_POLLS: u32 = 10_000;

/// Stream settings for a peripheral to memory transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Restart at the first slot after the last one instead of stopping.
    pub circular: bool,
    /// Advance the destination after every sample.
    pub memory_increment: bool,
    /// Advance the source after every sample. Always off for a result
    /// register.
    pub peripheral_increment: bool,
    /// Conditions that interrupt when they latch.
    pub interrupts: Conditions,
}

impl TransferConfig {
    /// Circular double buffering into a sample buffer, interrupting on both
    /// halves and on every error.
    pub const fn ping_pong() -> Self {
        Self {
            circular: true,
            memory_increment: true,
            peripheral_increment: false,
            interrupts: Conditions::all(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::ping_pong()
    }
}

/// One stream of the transfer engine, reading the sampling engine's result
/// register.
pub trait TransferStream: TransferStatus {
    fn is_enabled(&self) -> bool;

    /// Request the stream to stop. It may take a while to actually stop.
    fn disable(&mut self);

    /// Program the stream. Fails with [`Error::StreamEnabled`] while the
    /// stream is still running.
    fn configure(
        &mut self,
        config: &TransferConfig,
        destination: *mut Sample,
        len: u16,
    ) -> Result<(), Error>;

    fn enable(&mut self);
}

/// (Re)arm `stream` to fill `buffer`.
///
/// Disables the stream and waits for it to stop, acknowledges anything still
/// latched, programs it and enables it as the very last step.
pub fn arm<S: TransferStream, const N: usize>(
    stream: &mut S,
    buffer: &'static SampleBuffer<N>,
    config: &TransferConfig,
) -> Result<(), Error> {
    stream.disable();

    let mut polls = 0;
    while stream.is_enabled() {
        polls += 1;
        if polls >= DISABLE_POLLS {
            return Err(Error::Timeout);
        }
        core::hint::spin_loop();
    }

    stream.clear(Conditions::all());

    // Capacity is checked to fit the counter when the buffer is built
    stream.configure(config, buffer.as_dma_ptr(), N as u16)?;
    stream.enable();

    log::debug!(
        "Transfer stream armed for {} samples (circular: {})",
        N,
        config.circular
    );

    Ok(())
}
