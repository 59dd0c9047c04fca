use rand::{rngs::StdRng, Rng, SeedableRng};

use pingpong_core::{
    sim::{SignalSource, FULL_SCALE},
    Sample,
};

/// Shape of the simulated analog input.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Waveform {
    Constant {
        value: Sample,
    },
    /// `low` for the first half of every buffer, `high` for the second.
    Step {
        low: Sample,
        high: Sample,
    },
    /// Rises by `step` every conversion and wraps at full scale.
    Ramp {
        #[serde(default = "one")]
        step: Sample,
    },
    Sine {
        offset: f64,
        amplitude: f64,
        /// In conversions
        period: u64,
        /// Peak amplitude of uniform noise on top
        #[serde(default)]
        noise: f64,
    },
}

fn one() -> Sample {
    1
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Step {
            low: 100,
            high: 200,
        }
    }
}

pub struct Signal {
    waveform: Waveform,
    /// Samples per buffer half
    half: u64,
    rng: StdRng,
}

impl Signal {
    pub fn new(waveform: Waveform, half: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            waveform,
            half: half.max(1) as u64,
            rng,
        }
    }
}

impl SignalSource for Signal {
    fn sample(&mut self, index: u64) -> Sample {
        match self.waveform {
            Waveform::Constant { value } => value,
            Waveform::Step { low, high } => {
                if (index / self.half) % 2 == 0 {
                    low
                } else {
                    high
                }
            }
            Waveform::Ramp { step } => {
                let range = u64::from(FULL_SCALE) + 1;
                (index.wrapping_mul(u64::from(step)) % range) as Sample
            }
            Waveform::Sine {
                offset,
                amplitude,
                period,
                noise,
            } => {
                let phase = (index % period.max(1)) as f64 / period.max(1) as f64;
                let mut value = offset + amplitude * (phase * std::f64::consts::TAU).sin();
                if noise > 0.0 {
                    value += self.rng.gen_range(-noise..=noise);
                }

                value.round().clamp(0.0, f64::from(FULL_SCALE)) as Sample
            }
        }
    }
}
