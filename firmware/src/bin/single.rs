#![no_main]
#![no_std]

use defmt::unwrap;
use defmt_rtt as _;
use panic_probe as _;
use stm32f4xx_hal::{
    gpio::{Output, Pin},
    pac,
    prelude::*,
    serial::Tx,
};

use pingpong_core::{
    config::AcquisitionConfig,
    consumer::Report,
    single::{SampleLatch, SingleSample},
    transport::LineWriter,
    trigger::TriggerPeriod,
};
use pingpong_firmware::{
    adc_capture::{Adc1, Tim2},
    delay::CycleDelay,
};

static LATCH: SampleLatch = SampleLatch::new();

#[rtic::app(device = stm32f4xx_hal::pac)]
mod app {
    use super::*;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        acquisition: SingleSample<Tim2, Adc1>,
        led: Pin<'A', 5, Output>,
        out: LineWriter<Tx<pac::USART2>, CycleDelay>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let p = cx.device;

        log_to_defmt::setup();

        // One conversion every 500 ms
        let config = AcquisitionConfig {
            trigger: TriggerPeriod::new(16_000 - 1, 500 - 1),
            ..Default::default()
        };

        let rcc = p.RCC.constrain();
        let clocks = rcc
            .cfgr
            .sysclk(config.clock())
            .pclk1(config.clock())
            .pclk2(config.clock())
            .freeze();

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

        if let Err(e) = out.write_line("TIM2 TRGO ADC IRQ") {
            defmt::error!("Failed to write banner: {}", e);
        }

        let acquisition = unwrap!(SingleSample::start(
            Tim2::new(p.TIM2),
            Adc1::new(p.ADC1, p.ADC_COMMON),
            &config,
        ));

        (
            Shared {},
            Local {
                acquisition,
                led,
                out,
            },
        )
    }

    #[idle(local = [acquisition, out])]
    fn idle(cx: idle::Context) -> ! {
        let _running = cx.local.acquisition;
        let out = cx.local.out;
        let mut seen_dropped = 0;

        loop {
            let Some(sample) = LATCH.take() else {
                critical_section::with(|_| {
                    if !LATCH.is_ready() {
                        cortex_m::asm::wfi();
                    }
                });
                continue;
            };

            if let Err(e) = out.write_report(&Report::single(sample)) {
                defmt::error!("Failed to send report: {}", e);
            }

            let dropped = LATCH.dropped();
            if dropped != seen_dropped {
                defmt::warn!("{} conversions overwritten before they were reported", dropped);
                seen_dropped = dropped;
            }
        }
    }

    #[task(binds = ADC, local = [led], priority = 2)]
    fn on_conversion(cx: on_conversion::Context) {
        if let Some(sample) = Adc1::take_conversion() {
            LATCH.publish(sample);
            cx.local.led.toggle();
        }
    }
}
