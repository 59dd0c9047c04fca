#![no_main]
#![no_std]
#![feature(type_alias_impl_trait)]

use defmt::unwrap;
use defmt_rtt as _;
use panic_probe as _;
use rtic_monotonics::{
    systick::{ExtU64, Systick},
    Monotonic,
};
use stm32f4xx_hal::{
    gpio::{Output, Pin},
    pac,
    prelude::*,
    serial::Tx,
};

use pingpong_core::{
    config::AcquisitionConfig, consumer::Consumer, pipeline::Pipeline, transport::LineWriter,
    AcquisitionContext,
};
use pingpong_firmware::{
    adc_capture::{Adc1, Dma2Stream0, Tim2},
    delay::CycleDelay,
};

/// Samples in the ring buffer, each half is reported as one mean
const CAPACITY: usize = 64;

static ACQUISITION: AcquisitionContext<CAPACITY> = AcquisitionContext::new();

defmt::timestamp!("{=u64:ms}", Systick::now().duration_since_epoch().to_millis());

/// Sleep until the next interrupt, unless a half is already waiting.
fn wait_for_notification() {
    // A notification raised between the check and WFI still wakes the core,
    // the pending interrupt is taken once the critical section ends
    critical_section::with(|_| {
        if !ACQUISITION.flags.any_pending() {
            cortex_m::asm::wfi();
        }
    });
}

#[rtic::app(device = stm32f4xx_hal::pac, dispatchers = [SPI1])]
mod app {
    use super::*;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        pipeline: Pipeline<Tim2, Adc1, Dma2Stream0>,
        out: LineWriter<Tx<pac::USART2>, CycleDelay>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        log_to_defmt::setup();

        let config = AcquisitionConfig::default();

        // The trigger period is given in cycles of the internal oscillator,
        // so no PLL and no APB prescaling
        let rcc = p.RCC.constrain();
        let clocks = rcc
            .cfgr
            .sysclk(config.clock())
            .pclk1(config.clock())
            .pclk2(config.clock())
            .freeze();
        defmt::info!("Clocks: sysclk {} Hz", clocks.sysclk().to_Hz());

        let systick_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.sysclk().to_Hz(), systick_token);

        let gpioa = p.GPIOA.split();
        let _adc1_in0 = gpioa.pa0.into_analog();
        let led = gpioa.pa5.into_push_pull_output();

        let tx = unwrap!(p
            .USART2
            .tx(
                gpioa.pa2.into_alternate(),
                config.transport.baud.bps(),
                &clocks
            )
            .ok());
        let mut out = LineWriter::new(
            tx,
            CycleDelay::new(clocks.sysclk()),
            config.transport.timeout(),
        );

        if let Err(e) = out.write_line("ADC DMA circular") {
            defmt::error!("Failed to write banner: {}", e);
        }

        let pipeline = unwrap!(Pipeline::start(
            Tim2::new(p.TIM2),
            Adc1::new(p.ADC1, p.ADC_COMMON),
            Dma2Stream0::new(p.DMA2),
            &ACQUISITION.buffer,
            &config,
        ));

        heartbeat::spawn(led).unwrap_or_else(|_| defmt::panic!("Failed to start heartbeat"));

        (Shared {}, Local { pipeline, out })
    }

    /// The consumer loop
    ///
    /// Reports every half the transfer interrupt marked complete and sleeps
    /// when there is nothing to do.
    #[idle(local = [out])]
    fn idle(cx: idle::Context) -> ! {
        let mut consumer = Consumer::new();

        loop {
            match consumer.service(&ACQUISITION, cx.local.out) {
                Ok(0) => wait_for_notification(),
                Ok(_) => {}
                Err(e) => defmt::error!("Failed to send report: {}", e),
            }
        }
    }

    #[task(binds = DMA2_STREAM0, local = [pipeline], priority = 2)]
    fn on_transfer(cx: on_transfer::Context) {
        cx.local.pipeline.on_interrupt(&ACQUISITION.flags);
    }

    /// Blinks the green LED on the Nucleo board to show the program runs
    #[task(priority = 1)]
    async fn heartbeat(_cx: heartbeat::Context, mut led: Pin<'A', 5, Output>) {
        loop {
            Systick::delay(500u64.millis()).await;
            led.toggle();
        }
    }
}
