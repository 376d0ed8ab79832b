/*!
Meter modes, measurement units and their static lookup tables.

Mode codes come straight from byte 1 of a frame. The unit and scale tables are plain
`match` arms over [`Mode`], so they live in read-only program memory and can be shared
by any number of threads.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// Measurement unit of a decoded reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    None,
    Volt,
    Ampere,
    Percent,
    Ohm,
    Hertz,
    Farad,
}

impl Unit {
    /// Unit symbol as printed next to a value
    pub fn symbol(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Volt => "V",
            Self::Ampere => "A",
            Self::Percent => "%",
            Self::Ohm => "Ω",
            Self::Hertz => "Hz",
            Self::Farad => "F",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operating mode reported by the meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    VoltsAc,
    MillivoltsAc,
    VoltsDc,
    MillivoltsDc,
    Frequency,
    Percent,
    Resistance,
    Continuity,
    Diode,
    Capacitance,
    MicroampsDc,
    MicroampsAc,
    MilliampsDc,
    MilliampsAc,
    AmpsDc,
    AmpsAc,
    TransistorGain,
    Ncv,
    LowPassFilter,
    /// AC or DC voltage, resolved by a status bit while decoding
    VoltsAcDc,
    /// Code the device table lists without a known meaning
    Reserved(u8),
    /// Code outside the device table
    Unrecognized(u8),
}

impl Mode {
    /// Map a raw mode code to a mode. Never fails.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::VoltsAc,
            0x01 => Self::MillivoltsAc,
            0x02 => Self::VoltsDc,
            0x03 => Self::MillivoltsDc,
            0x04 => Self::Frequency,
            0x05 => Self::Percent,
            0x06 => Self::Resistance,
            0x07 => Self::Continuity,
            0x08 => Self::Diode,
            0x09 => Self::Capacitance,
            0x0A | 0x0B | 0x13 | 0x15 | 0x16 | 0x17 => Self::Reserved(code),
            0x0C => Self::MicroampsDc,
            0x0D => Self::MicroampsAc,
            0x0E => Self::MilliampsDc,
            0x0F => Self::MilliampsAc,
            0x10 => Self::AmpsDc,
            0x11 => Self::AmpsAc,
            0x12 => Self::TransistorGain,
            0x14 => Self::Ncv,
            0x18 => Self::LowPassFilter,
            0x19 => Self::VoltsAcDc,
            other => Self::Unrecognized(other),
        }
    }

    /// Raw code of this mode
    pub fn code(self) -> u8 {
        match self {
            Self::VoltsAc => 0x00,
            Self::MillivoltsAc => 0x01,
            Self::VoltsDc => 0x02,
            Self::MillivoltsDc => 0x03,
            Self::Frequency => 0x04,
            Self::Percent => 0x05,
            Self::Resistance => 0x06,
            Self::Continuity => 0x07,
            Self::Diode => 0x08,
            Self::Capacitance => 0x09,
            Self::MicroampsDc => 0x0C,
            Self::MicroampsAc => 0x0D,
            Self::MilliampsDc => 0x0E,
            Self::MilliampsAc => 0x0F,
            Self::AmpsDc => 0x10,
            Self::AmpsAc => 0x11,
            Self::TransistorGain => 0x12,
            Self::Ncv => 0x14,
            Self::LowPassFilter => 0x18,
            Self::VoltsAcDc => 0x19,
            Self::Reserved(code) | Self::Unrecognized(code) => code,
        }
    }

    /// Check if this is the composite AC/DC voltage mode
    pub fn is_composite(self) -> bool {
        matches!(self, Self::VoltsAcDc)
    }

    /// Resolve the composite mode using the AC status flag. Other modes pass through.
    pub fn resolve(self, ac: bool) -> Self {
        match self {
            Self::VoltsAcDc if ac => Self::VoltsAc,
            Self::VoltsAcDc => Self::VoltsDc,
            other => other,
        }
    }

    /// Unit table
    pub fn unit(self) -> Unit {
        match self {
            Self::VoltsAcDc
            | Self::VoltsAc
            | Self::MillivoltsAc
            | Self::VoltsDc
            | Self::MillivoltsDc
            | Self::LowPassFilter
            | Self::Diode => Unit::Volt,
            Self::Frequency => Unit::Hertz,
            Self::Percent => Unit::Percent,
            Self::Resistance | Self::Continuity => Unit::Ohm,
            Self::Capacitance => Unit::Farad,
            Self::MicroampsDc
            | Self::MicroampsAc
            | Self::MilliampsDc
            | Self::MilliampsAc
            | Self::AmpsDc
            | Self::AmpsAc => Unit::Ampere,
            _ => Unit::None,
        }
    }

    /// Scale table: per-range multipliers, `None` for modes read as-is
    pub fn scale_factors(self) -> Option<&'static [f64]> {
        const MILLI: &[f64] = &[1e-3];
        const MICRO: &[f64] = &[1e-6];
        const OHMS: &[f64] = &[1.0, 1e3, 1e3, 1e3, 1e6];

        match self {
            Self::MillivoltsAc | Self::MillivoltsDc => Some(MILLI),
            Self::Resistance => Some(OHMS),
            Self::MicroampsDc | Self::MicroampsAc => Some(MICRO),
            Self::MilliampsDc | Self::MilliampsAc => Some(MILLI),
            _ => None,
        }
    }

    /// Multiplier for a range index.
    ///
    /// Ranges past the end of a mode's table reuse its last factor; the device does not
    /// give every range nibble its own entry.
    pub fn scale_factor(self, range: u8) -> f64 {
        self.scale_factors()
            .and_then(|factors| clamped_factor(factors, range))
            .unwrap_or(1.0)
    }

    /// Label as shown on the meter, `None` for codes without one
    pub fn label(self) -> Option<&'static str> {
        let label = match self {
            Self::VoltsAc => "V AC",
            Self::MillivoltsAc => "mV AC",
            Self::VoltsDc => "V DC",
            Self::MillivoltsDc => "mV DC",
            Self::Frequency => "Hz",
            Self::Percent => "Percent",
            Self::Resistance => "Ohm",
            Self::Continuity => "Continuity",
            Self::Diode => "Diode",
            Self::Capacitance => "F",
            Self::MicroampsDc => "uA DC",
            Self::MicroampsAc => "uA AC",
            Self::MilliampsDc => "mA DC",
            Self::MilliampsAc => "mA AC",
            Self::AmpsDc => "A DC",
            Self::AmpsAc => "A AC",
            Self::TransistorGain => "hFE",
            Self::Ncv => "NCV",
            Self::LowPassFilter => "LPF",
            Self::VoltsAcDc => "VAC_VDC",
            Self::Reserved(_) | Self::Unrecognized(_) => return None,
        };
        Some(label)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => write!(f, "0x{:02x}", self.code()),
        }
    }
}

/// Pick the factor for `range`, reusing the last entry when the table is shorter
pub fn clamped_factor(factors: &[f64], range: u8) -> Option<f64> {
    let index = usize::from(range).min(factors.len().saturating_sub(1));
    factors.get(index).copied()
}

impl From<u8> for Mode {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}
