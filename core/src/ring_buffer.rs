use core::ops::Range;
use core::sync::atomic::{AtomicU16, Ordering};

use crate::{Half, Sample};

/// Fixed capacity circular sample storage, split into two halves.
///
/// Every slot is an [`AtomicU16`], which has the same in-memory
/// representation as a `u16`, so the DMA can write straight into it while the
/// consumer reads through ordinary atomic loads. The buffer itself does not
/// guard the consumer against reading the half that is being written; that is
/// what [`CompletionFlags`](crate::flags::CompletionFlags) are for.
pub struct SampleBuffer<const N: usize> {
    slots: [AtomicU16; N],
}

impl<const N: usize> SampleBuffer<N> {
    /// Number of samples in one half.
    pub const HALF: usize = N / 2;

    // NDTR on the stream is 16 bits wide
    const VALID_CAPACITY: () = assert!(
        N >= 2 && N % 2 == 0 && N <= u16::MAX as usize,
        "Capacity must be even, at least 2 and fit the transfer counter"
    );

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_CAPACITY;

        Self {
            slots: [const { AtomicU16::new(0) }; N],
        }
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn range(half: Half) -> Range<usize> {
        match half {
            Half::First => 0..Self::HALF,
            Half::Second => Self::HALF..N,
        }
    }

    /// Address handed to the transfer engine as its destination.
    pub fn as_dma_ptr(&self) -> *mut Sample {
        self.slots.as_ptr().cast::<Sample>().cast_mut()
    }

    /// Store one sample, the way the transfer engine does.
    pub fn store(&self, index: usize, sample: Sample) {
        self.slots[index % N].store(sample, Ordering::Relaxed);
    }

    pub fn load(&self, index: usize) -> Sample {
        self.slots[index % N].load(Ordering::Relaxed)
    }

    /// Iterate over the samples of one half.
    pub fn half(&self, half: Half) -> impl ExactSizeIterator<Item = Sample> + '_ {
        self.slots[Self::range(half)]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
    }

    /// Arithmetic mean of one half, truncated.
    ///
    /// Sums into a `u64`, so it can not overflow for any capacity the buffer
    /// accepts.
    pub fn mean(&self, half: Half) -> u32 {
        let sum: u64 = self.half(half).map(u64::from).sum();

        // A mean of u16 samples always fits a u32
        (sum / Self::HALF as u64) as u32
    }
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn halves_partition_the_buffer() {
        assert_eq!(SampleBuffer::<64>::range(Half::First), 0..32);
        assert_eq!(SampleBuffer::<64>::range(Half::Second), 32..64);
        assert_eq!(SampleBuffer::<2>::range(Half::First), 0..1);
        assert_eq!(SampleBuffer::<2>::range(Half::Second), 1..2);
    }

    #[test]
    fn constant_half_has_constant_mean() {
        let buffer = SampleBuffer::<64>::new();
        for i in 0..32 {
            buffer.store(i, 1234);
        }

        assert_eq!(buffer.mean(Half::First), 1234);
        assert_eq!(buffer.mean(Half::Second), 0);
    }

    #[test]
    fn mean_of_one_sample_is_the_sample() {
        let buffer = SampleBuffer::<2>::new();
        buffer.store(0, 7);
        buffer.store(1, 4095);

        assert_eq!(buffer.mean(Half::First), 7);
        assert_eq!(buffer.mean(Half::Second), 4095);
    }

    #[test]
    fn mean_truncates() {
        let buffer = SampleBuffer::<4>::new();
        buffer.store(0, 1);
        buffer.store(1, 2);

        assert_eq!(buffer.mean(Half::First), 1);
    }

    #[test]
    fn mean_is_exact_for_random_samples() {
        let mut rng = rand::thread_rng();
        let buffer = SampleBuffer::<512>::new();

        for _ in 0..100 {
            let mut sum = 0u64;
            for i in SampleBuffer::<512>::range(Half::Second) {
                let sample: Sample = rng.gen();
                sum += u64::from(sample);
                buffer.store(i, sample);
            }

            assert_eq!(u64::from(buffer.mean(Half::Second)), sum / 256);
        }
    }

    #[test]
    fn full_scale_samples_do_not_overflow() {
        let buffer = SampleBuffer::<{ u16::MAX as usize - 1 }>::new();
        for i in 0..buffer.len() {
            buffer.store(i, u16::MAX);
        }

        assert_eq!(buffer.mean(Half::First), u32::from(u16::MAX));
        assert_eq!(buffer.mean(Half::Second), u32::from(u16::MAX));
    }

    #[test]
    fn store_wraps_at_capacity() {
        let buffer = SampleBuffer::<8>::new();
        buffer.store(9, 42);

        assert_eq!(buffer.load(1), 42);
        assert!(buffer.half(Half::First).eq([0, 42, 0, 0]));
    }

    #[test]
    fn dma_pointer_covers_the_slots() {
        let buffer = SampleBuffer::<8>::new();
        buffer.store(3, 99);

        let ptr = buffer.as_dma_ptr();
        assert_eq!(ptr as usize % core::mem::align_of::<Sample>(), 0);
        assert_eq!(unsafe { ptr.add(3).read_volatile() }, 99);
    }

    #[test]
    fn read_one_half_while_the_other_is_written() {
        static BUFFER: SampleBuffer<64> = SampleBuffer::new();

        for i in SampleBuffer::<64>::range(Half::First) {
            BUFFER.store(i, 100);
        }

        let writer = std::thread::spawn(|| {
            for round in 0..1000u16 {
                for i in SampleBuffer::<64>::range(Half::Second) {
                    BUFFER.store(i, round);
                }
            }
        });

        for _ in 0..1000 {
            assert_eq!(BUFFER.mean(Half::First), 100);
        }

        writer.join().unwrap();
        assert_eq!(BUFFER.mean(Half::Second), 999);
    }
}
