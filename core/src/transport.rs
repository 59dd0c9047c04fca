//! Report output over a byte oriented serial port.
//!
//! Every byte is sent blocking, the way a polled UART transmitter works, but
//! the wait for the transmitter to accept a byte is bounded by a timeout
//! instead of spinning forever.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use embedded_hal_nb::serial;
use fugit::MicrosDurationU32;

use crate::{consumer::Report, Error};

/// Pause between two attempts to hand a byte to a busy port.
pub const POLL_INTERVAL_US: u32 = 1;

/// Longest line [`LineWriter::write_report`] formats, without line ending.
pub const LINE_CAPACITY: usize = 24;

pub struct LineWriter<W, D> {
    port: W,
    delay: D,
    timeout: MicrosDurationU32,
}

impl<W, D> LineWriter<W, D>
where
    W: serial::Write<u8>,
    D: DelayNs,
{
    /// `timeout` bounds the wait for every single byte.
    pub fn new(port: W, delay: D, timeout: MicrosDurationU32) -> Self {
        Self {
            port,
            delay,
            timeout,
        }
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error> {
        let mut waited = 0;

        loop {
            match self.port.write(byte) {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) if waited < self.timeout.ticks() => {
                    self.delay.delay_us(POLL_INTERVAL_US);
                    waited += POLL_INTERVAL_US;
                }
                Err(nb::Error::WouldBlock) => return Err(Error::Timeout),
                Err(nb::Error::Other(_)) => return Err(Error::Transport),
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        bytes.iter().try_for_each(|&byte| self.write_byte(byte))
    }

    /// Send `line` followed by `"\r\n"`.
    pub fn write_line(&mut self, line: &str) -> Result<(), Error> {
        self.write_bytes(line.as_bytes())?;
        self.write_bytes(b"\r\n")
    }

    pub fn write_report(&mut self, report: &Report) -> Result<(), Error> {
        let mut line = heapless::String::<LINE_CAPACITY>::new();
        write!(line, "{report}").map_err(|_| Error::Format)?;

        self.write_line(&line)
    }

    pub fn release(self) -> (W, D) {
        (self.port, self.delay)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Half;
    use embedded_hal_nb::serial::ErrorKind;
    use fugit::ExtU32;

    /// A port that is busy for `busy` polls before accepting each byte
    #[derive(Default)]
    pub(crate) struct Port {
        pub(crate) sent: Vec<u8>,
        pub(crate) busy: u32,
        pub(crate) stuck: bool,
        pub(crate) broken: bool,
        pub(crate) countdown: u32,
    }

    impl serial::ErrorType for Port {
        type Error = ErrorKind;
    }

    impl serial::Write<u8> for Port {
        fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
            if self.broken {
                return Err(nb::Error::Other(ErrorKind::Overrun));
            }
            if self.stuck || self.countdown < self.busy {
                self.countdown += 1;
                return Err(nb::Error::WouldBlock);
            }
            self.countdown = 0;
            self.sent.push(word);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Ok(())
        }
    }

    /// Accumulates requested delays instead of sleeping
    #[derive(Default)]
    pub(crate) struct Clock {
        pub(crate) nanos: u64,
    }

    impl DelayNs for Clock {
        fn delay_ns(&mut self, ns: u32) {
            self.nanos += u64::from(ns);
        }
    }

    pub(crate) fn writer(port: Port) -> LineWriter<Port, Clock> {
        LineWriter::new(port, Clock::default(), 100.micros())
    }

    #[test]
    fn report_lines() {
        let mut out = writer(Port::default());

        out.write_report(&Report::half(Half::First, 100)).unwrap();
        out.write_report(&Report::half(Half::Second, 0)).unwrap();
        out.write_report(&Report::single(4095)).unwrap();

        let (port, clock) = out.release();
        assert_eq!(port.sent, b"AVG0 = 100\r\nAVG1 = 0\r\nADC = 4095\r\n");
        assert_eq!(clock.nanos, 0);
    }

    #[test]
    fn largest_report_fits() {
        let mut out = writer(Port::default());

        out.write_report(&Report::half(Half::Second, u32::MAX))
            .unwrap();

        let (port, _) = out.release();
        assert_eq!(port.sent, b"AVG1 = 4294967295\r\n");
    }

    #[test]
    fn waits_for_a_busy_port() {
        let mut out = writer(Port {
            busy: 3,
            ..Default::default()
        });

        out.write_line("ok").unwrap();

        let (port, clock) = out.release();
        assert_eq!(port.sent, b"ok\r\n");
        // 3 polls per byte, 4 bytes
        assert_eq!(clock.nanos, 4 * 3 * 1_000);
    }

    #[test]
    fn times_out_on_a_stuck_port() {
        let mut out = writer(Port {
            stuck: true,
            ..Default::default()
        });

        assert_eq!(out.write_line("lost"), Err(Error::Timeout));

        let (port, clock) = out.release();
        assert!(port.sent.is_empty());
        assert_eq!(clock.nanos, 100_000);
    }

    #[test]
    fn port_faults_are_reported() {
        let mut out = writer(Port {
            broken: true,
            ..Default::default()
        });

        assert_eq!(out.write_byte(b'x'), Err(Error::Transport));
    }
}
