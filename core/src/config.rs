use fugit::{HertzU32, MicrosDurationU32, NanosDurationU64, RateExtU32};

use crate::{sampling::SamplingConfig, trigger::TriggerPeriod, Error};

/// Everything the pipeline is brought up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AcquisitionConfig {
    /// Input clock of the trigger timer.
    pub clock_hz: u32,
    pub trigger: TriggerPeriod,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl AcquisitionConfig {
    pub fn clock(&self) -> HertzU32 {
        self.clock_hz.Hz()
    }

    /// Time between two conversions.
    pub fn sample_period(&self) -> NanosDurationU64 {
        self.trigger.period(self.clock())
    }

    /// Reject a configuration the timer cannot run: a zero clock, or a period
    /// too long to express in nanoseconds.
    pub fn validate(&self) -> Result<(), Error> {
        match self.trigger.checked_period(self.clock()) {
            Some(_) => Ok(()),
            None => Err(Error::InvalidPeriod),
        }
    }

    /// Deadline the consumer has for one half of an `n` sample buffer.
    pub fn half_fill_time(&self, n: usize) -> NanosDurationU64 {
        self.trigger.half_fill_time(self.clock(), n)
    }
}

impl Default for AcquisitionConfig {
    /// A 10 ms trigger off the 16 MHz internal oscillator.
    fn default() -> Self {
        Self {
            clock_hz: 16_000_000,
            trigger: TriggerPeriod::new(16_000 - 1, 10 - 1),
            sampling: SamplingConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransportConfig {
    pub baud: u32,
    /// Longest wait for the port to accept a single byte.
    pub timeout_us: u32,
}

impl TransportConfig {
    pub fn timeout(&self) -> MicrosDurationU32 {
        MicrosDurationU32::from_ticks(self.timeout_us)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud: 9600,
            // Ten frames at 9600 baud
            timeout_us: 10_420,
        }
    }
}

/// Read a TOML configuration from `path`, or from the first `file_name` found
/// in the current directory or one of its ancestors.
#[cfg(feature = "config")]
pub fn load<T: serde::de::DeserializeOwned>(
    path: Option<&std::path::Path>,
    file_name: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    match path {
        Some(p) => load_first(core::iter::once(p.to_path_buf()), file_name),
        None => load_nearest(&std::env::current_dir()?, file_name),
    }
}

/// Read the first `file_name` found in `dir` or one of its ancestors.
#[cfg(feature = "config")]
pub fn load_nearest<T: serde::de::DeserializeOwned>(
    dir: &std::path::Path,
    file_name: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    load_first(
        dir.ancestors().map(|path| path.join(file_name)),
        file_name,
    )
}

#[cfg(feature = "config")]
fn load_first<T: serde::de::DeserializeOwned>(
    paths: impl Iterator<Item = std::path::PathBuf>,
    file_name: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    let mut last_error = None;

    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(config_string) => {
                log::debug!("Loading configuration from {}", path.display());
                return Ok(toml::from_str(&config_string)?);
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(match last_error {
        Some(e) => e.into(),
        None => format!("no {file_name} found").into(),
    })
}
