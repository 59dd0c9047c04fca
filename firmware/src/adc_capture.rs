use hal::{
    pac,
    rcc::{Enable, Reset},
};
use stm32f4xx_hal as hal;

use pingpong_core::{
    notification::{Conditions, TransferStatus},
    sampling::{Delivery, SamplingConfig, SamplingEngine},
    transfer::{TransferConfig, TransferStream},
    trigger::{Trigger, TriggerPeriod},
    Error, Sample,
};

/// ADC1 `EXTSEL` for the TIM2 TRGO event
const EXTSEL_TIM2_TRGO: u8 = 0b0110;

/// Stream 0 flags in `LISR`/`LIFCR`
const STREAM0_FLAGS: u32 = 0b11_1101;

fn rcc() -> &'static pac::rcc::RegisterBlock {
    // Note(unsafe): only the enable and reset bits of the peripheral at hand
    // are touched, and the HAL's clock setup is done by then
    unsafe { &*pac::RCC::ptr() }
}

/// TIM2 emitting TRGO on every update event.
pub struct Tim2 {
    tim2: pac::TIM2,
}

impl Tim2 {
    pub fn new(tim2: pac::TIM2) -> Self {
        pac::TIM2::enable(rcc());
        pac::TIM2::reset(rcc());

        Self { tim2 }
    }
}

impl Trigger for Tim2 {
    fn configure(&mut self, period: TriggerPeriod) {
        let tim2 = &self.tim2;

        // TRGO follows the stopped counter while the registers are loaded, so
        // the forced update below does not start a conversion
        tim2.cr2.modify(|_, w| w.mms().enable());

        tim2.psc
            .write(|w| unsafe { w.bits(u32::from(period.prescaler)) });
        tim2.arr.write(|w| unsafe { w.bits(period.reload) });

        // Load the prescaler now instead of at the first overflow
        tim2.egr.write(|w| w.ug().set_bit());
        tim2.sr.modify(|_, w| w.uif().clear_bit());

        // Trigger the ADC on every update event
        tim2.cr2.modify(|_, w| w.mms().update());
    }

    fn start(&mut self) {
        self.tim2.cr1.modify(|_, w| w.cen().set_bit());
    }

    fn stop(&mut self) {
        self.tim2.cr1.modify(|_, w| w.cen().clear_bit());
    }
}

/// ADC1 converting one regular channel per TIM2 TRGO edge.
pub struct Adc1 {
    adc1: pac::ADC1,
}

impl Adc1 {
    pub fn new(adc1: pac::ADC1, common: pac::ADC_COMMON) -> Self {
        pac::ADC1::enable(rcc());
        pac::ADC1::reset(rcc());

        // ADCCLK = PCLK2 / 4
        common.ccr.modify(|_, w| w.adcpre().div4());

        Self { adc1 }
    }

    /// Read the result of a finished conversion. For the end-of-conversion
    /// interrupt handler.
    pub fn take_conversion() -> Option<Sample> {
        // Note(unsafe): only the status and data registers are accessed, which
        // the owner of the ADC does not touch while it is enabled
        let adc1 = unsafe { &*pac::ADC1::ptr() };

        let sr = adc1.sr.read();
        if sr.ovr().bit_is_set() {
            adc1.sr.modify(|_, w| w.ovr().clear_bit());
        }

        // Reading DR clears EOC
        sr.eoc()
            .bit_is_set()
            .then(|| adc1.dr.read().data().bits())
    }
}

impl SamplingEngine for Adc1 {
    fn configure(&mut self, config: &SamplingConfig) {
        let adc1 = &self.adc1;
        let channel = config.channel.0;
        let interrupt = config.delivery == Delivery::Interrupt;
        let dma = config.delivery == Delivery::Transfer;

        adc1.cr2.modify(|_, w| w.adon().clear_bit());

        // 12 bit, a single channel, no scan
        adc1.cr1.modify(|_, w| unsafe {
            w.res()
                .bits(0b00)
                .scan()
                .clear_bit()
                .discen()
                .clear_bit()
                .eocie()
                .bit(interrupt)
        });
        adc1.sqr1.modify(|_, w| unsafe { w.l().bits(0) });
        adc1.sqr3.modify(|_, w| unsafe { w.sq1().bits(channel) });

        // Channels 0 to 9 in SMPR2, 10 to 18 in SMPR1, three bits each
        let smp = u32::from(config.sample_time.bits());
        if channel < 10 {
            let shift = 3 * u32::from(channel);
            adc1.smpr2.modify(|r, w| unsafe {
                w.bits(r.bits() & !(0b111 << shift) | smp << shift)
            });
        } else {
            let shift = 3 * u32::from(channel - 10);
            adc1.smpr1.modify(|r, w| unsafe {
                w.bits(r.bits() & !(0b111 << shift) | smp << shift)
            });
        }

        // One conversion per external trigger edge, every result requests a
        // transfer when delivered by DMA
        adc1.cr2.modify(|_, w| unsafe {
            w.cont()
                .clear_bit()
                .align()
                .clear_bit()
                .extsel()
                .bits(EXTSEL_TIM2_TRGO)
                .exten()
                .bits(config.edge.bits())
                .eocs()
                .clear_bit()
                .dma()
                .bit(dma)
                .dds()
                .bit(dma)
        });
    }

    fn enable(&mut self) {
        self.adc1.cr2.modify(|_, w| w.adon().set_bit());
    }

    fn disable(&mut self) {
        self.adc1
            .cr2
            .modify(|_, w| w.adon().clear_bit().dma().clear_bit());
    }
}

/// DMA2 stream 0, channel 0: the ADC1 request line.
pub struct Dma2Stream0 {
    dma2: pac::DMA2,
}

impl Dma2Stream0 {
    pub fn new(dma2: pac::DMA2) -> Self {
        pac::DMA2::enable(rcc());

        Self { dma2 }
    }
}

impl TransferStatus for Dma2Stream0 {
    fn pending(&self) -> Conditions {
        Conditions::from_bits_truncate((self.dma2.lisr.read().bits() & STREAM0_FLAGS) as u8)
    }

    fn clear(&mut self, conditions: Conditions) {
        // LIFCR clear bits sit at the same positions as their LISR flags
        self.dma2
            .lifcr
            .write(|w| unsafe { w.bits(u32::from(conditions.bits()) & STREAM0_FLAGS) });
    }
}

impl TransferStream for Dma2Stream0 {
    fn is_enabled(&self) -> bool {
        self.dma2.st[0].cr.read().en().bit_is_set()
    }

    fn disable(&mut self) {
        self.dma2.st[0].cr.modify(|_, w| w.en().clear_bit());
    }

    fn configure(
        &mut self,
        config: &TransferConfig,
        destination: *mut Sample,
        len: u16,
    ) -> Result<(), Error> {
        if self.is_enabled() {
            return Err(Error::StreamEnabled);
        }

        let stream = &self.dma2.st[0];
        let interrupts = config.interrupts;

        // Note(unsafe): ADC1 is only used to look up the address of its data
        // register
        let source = unsafe { (*pac::ADC1::ptr()).dr.as_ptr() } as u32;

        stream.par.write(|w| unsafe { w.pa().bits(source) });
        stream
            .m0ar
            .write(|w| unsafe { w.m0a().bits(destination as u32) });
        stream.ndtr.write(|w| unsafe { w.ndt().bits(len) });

        // Direct mode, every request moves a single half word
        stream.fcr.modify(|_, w| {
            w.dmdis()
                .clear_bit()
                .feie()
                .bit(interrupts.contains(Conditions::FIFO_ERROR))
        });

        stream.cr.write(|w| unsafe {
            w.chsel()
                .bits(0)
                .dir()
                .peripheral_to_memory()
                .pfctrl()
                .clear_bit()
                .dbm()
                .clear_bit()
                .circ()
                .bit(config.circular)
                .minc()
                .bit(config.memory_increment)
                .pinc()
                .bit(config.peripheral_increment)
                .psize()
                .bits16()
                .msize()
                .bits16()
                .htie()
                .bit(interrupts.contains(Conditions::HALF_TRANSFER))
                .tcie()
                .bit(interrupts.contains(Conditions::TRANSFER_COMPLETE))
                .teie()
                .bit(interrupts.contains(Conditions::TRANSFER_ERROR))
                .dmeie()
                .bit(interrupts.contains(Conditions::DIRECT_MODE_ERROR))
        });

        Ok(())
    }

    fn enable(&mut self) {
        self.dma2.st[0].cr.modify(|_, w| w.en().set_bit());
    }
}
