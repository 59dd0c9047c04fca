/// Analog input selected for conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Channel(pub u8);

/// ADC sampling time, in ADC clock cycles.
///
/// A design constant: long enough for the input to settle given the source
/// impedance. The discriminants are the `SMPx` register encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum SampleTime {
    Cycles3 = 0b000,
    Cycles15 = 0b001,
    Cycles28 = 0b010,
    #[default]
    Cycles56 = 0b011,
    Cycles84 = 0b100,
    Cycles112 = 0b101,
    Cycles144 = 0b110,
    Cycles480 = 0b111,
}

impl SampleTime {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn cycles(self) -> u32 {
        match self {
            SampleTime::Cycles3 => 3,
            SampleTime::Cycles15 => 15,
            SampleTime::Cycles28 => 28,
            SampleTime::Cycles56 => 56,
            SampleTime::Cycles84 => 84,
            SampleTime::Cycles112 => 112,
            SampleTime::Cycles144 => 144,
            SampleTime::Cycles480 => 480,
        }
    }
}

/// Which edge of the trigger signal starts a conversion. The discriminants
/// are the `EXTEN` encodings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum TriggerEdge {
    #[default]
    Rising = 0b01,
    Falling = 0b10,
    Both = 0b11,
}

impl TriggerEdge {
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// Who gets told about a finished conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Delivery {
    /// Every conversion raises a transfer request, the transfer engine
    /// interrupts per half.
    #[default]
    Transfer,
    /// Every conversion raises an end-of-conversion interrupt. This is the
    /// single sample variant.
    Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SamplingConfig {
    pub channel: Channel,
    #[serde(default)]
    pub sample_time: SampleTime,
    #[serde(default)]
    pub edge: TriggerEdge,
    #[serde(default)]
    pub delivery: Delivery,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            channel: Channel(0),
            sample_time: SampleTime::default(),
            edge: TriggerEdge::default(),
            delivery: Delivery::default(),
        }
    }
}

/// Converts the configured input once per trigger edge.
pub trait SamplingEngine {
    /// Apply channel, timing, edge and delivery settings. Only called while
    /// disabled.
    fn configure(&mut self, config: &SamplingConfig);

    /// Power up and arm: from here on every trigger edge converts.
    fn enable(&mut self);

    fn disable(&mut self);
}
