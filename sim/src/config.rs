use pingpong_core::config::AcquisitionConfig;

use crate::signal::Waveform;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub signal: Waveform,
    /// Simulated time per wall clock time
    #[serde(default = "real_time")]
    pub speed: f64,
    /// Stop after this many reports
    pub reports: Option<u64>,
    /// Seed for the noise generator, random when left out
    pub seed: Option<u64>,
}

fn real_time() -> f64 {
    1.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            signal: Waveform::default(),
            speed: real_time(),
            reports: None,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_config_parses() {
        let config: SimConfig = toml::from_str(include_str!("../../pingpong.toml")).unwrap();

        assert_eq!(config.acquisition, AcquisitionConfig::default());
        assert_eq!(config.signal, Waveform::default());
        assert_eq!(config.reports, Some(20));
    }

    #[test]
    fn everything_is_optional() {
        let config: SimConfig = toml::from_str("").unwrap();

        assert_eq!(config.acquisition, AcquisitionConfig::default());
        assert_eq!(config.speed, 1.0);
        assert_eq!(config.reports, None);
    }
}
