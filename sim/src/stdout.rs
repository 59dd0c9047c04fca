use std::io::{self, Write as _};

use embedded_hal::delay::DelayNs;
use embedded_hal_nb::serial::{self, ErrorKind};

/// Stands in for the UART transmitter. Flushes on every line ending.
pub struct StdoutPort {
    stdout: io::Stdout,
}

impl StdoutPort {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl serial::ErrorType for StdoutPort {
    type Error = ErrorKind;
}

impl serial::Write<u8> for StdoutPort {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let mut stdout = self.stdout.lock();
        stdout
            .write_all(&[word])
            .map_err(|_| nb::Error::Other(ErrorKind::Other))?;

        if word == b'\n' {
            stdout
                .flush()
                .map_err(|_| nb::Error::Other(ErrorKind::Other))?;
        }

        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        self.stdout
            .flush()
            .map_err(|_| nb::Error::Other(ErrorKind::Other))
    }
}

pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}
