//! Conversion of raw register contents into physical units.
//!
//! Nothing in here touches the bus. The functions take the raw contents of
//! the configuration registers (NEG_PWR_FSR_LAT, ACCUM_CONFIG, CTRL_LAT) and
//! of a measurement register, and work out the scale factor and signedness
//! the chip used for that measurement.
//!
//! Per-channel decoders give `None` for channels beyond [`MAX_CHANNELS`].
//! Checking a channel against the part's actual channel count is up to the
//! caller.

use crate::{Unit, MAX_CHANNELS};

/// Full scale of the 16-bit voltage registers.
const FULL_SCALE_16: f64 = 65536.0;

/// Full scale of the power register, which holds a 30-bit value.
const FULL_SCALE_30: f64 = 1_073_741_824.0;

/// Sense voltage full scale, in mV.
const SENSE_VOLTAGE_SCALE: f64 = 100.0;

/// Conversions per second in fast and burst modes, shared between the
/// active channels.
const FAST_MODE_RATE: f64 = 1024.0 * 5.0;

const MICROWATT_HOURS_PER_WATT_SECOND: f64 = 1_000_000.0 / 3600.0;

/// The two chip families, which differ in bus voltage range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Generation {
    /// PAC194x: 9 V full scale bus voltage
    Pac194x,
    /// PAC195x: 32 V full scale bus voltage
    Pac195x,
}

impl Generation {
    /// Bus voltage full scale, in volts.
    pub fn bus_voltage_scale(self) -> f64 {
        match self {
            Generation::Pac194x => 9.0,
            Generation::Pac195x => 32.0,
        }
    }
}

/// How one quantity (voltage or current) of one channel is configured.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Range {
    /// The reading may be negative, and is two's complement.
    pub bipolar: bool,
    /// The full range is in use. When false the range, and so the LSB, is
    /// halved.
    pub full_scale: bool,
}

impl Range {
    /// Decode a 2-bit NEG_PWR_FSR field.
    ///
    /// | code | bipolar | full scale |
    /// |------|---------|------------|
    /// | 0    | no      | yes        |
    /// | 1    | yes     | yes        |
    /// | 2    | yes     | no         |
    /// | 3    | no      | yes        |
    pub fn from_code(code: u16) -> Range {
        Range {
            bipolar: code == 1 || code == 2,
            full_scale: code != 2,
        }
    }

    fn apply(self, scale: f64) -> f64 {
        let mut scale = scale;
        if self.bipolar {
            scale *= 2.0;
        }
        if !self.full_scale {
            scale /= 2.0;
        }
        scale
    }
}

/// What a channel's accumulator sums.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccumMode {
    /// Power samples
    Power = 0,
    /// Sense voltage samples
    SenseVoltage = 1,
    /// Bus voltage samples
    BusVoltage = 2,
    /// Reserved encoding
    Reserved = 3,
}

impl AccumMode {
    /// Decode the accumulator mode for `channel` from ACCUM_CONFIG.
    pub fn from_config(accum_config: u8, channel: usize) -> Option<AccumMode> {
        let position = field_position(6, channel)?;
        let mode = match extract_bits(accum_config.into(), 2, position) {
            0 => AccumMode::Power,
            1 => AccumMode::SenseVoltage,
            2 => AccumMode::BusVoltage,
            _ => AccumMode::Reserved,
        };
        Some(mode)
    }
}

/// The sampling modes in the top four bits of CTRL.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleMode {
    /// 1024 samples/s, adaptive accumulation
    Adaptive1024 = 0,
    /// 256 samples/s, adaptive accumulation
    Adaptive256 = 1,
    /// 64 samples/s, adaptive accumulation
    Adaptive64 = 2,
    /// 8 samples/s, adaptive accumulation
    Adaptive8 = 3,
    /// 1024 samples/s
    Sps1024 = 4,
    /// 256 samples/s
    Sps256 = 5,
    /// 64 samples/s
    Sps64 = 6,
    /// 8 samples/s
    Sps8 = 7,
    /// One conversion per refresh
    SingleShot = 8,
    /// Eight conversions per refresh
    SingleShot8x = 9,
    /// Fast mode
    Fast = 10,
    /// Burst mode
    Burst = 11,
    /// Sleep
    Sleep = 15,
}

impl SampleMode {
    /// Decode the sample mode field (bits 12..=15) of a CTRL value.
    ///
    /// Returns `None` for the undefined codes 12 to 14.
    pub fn from_ctrl(ctrl: u16) -> Option<SampleMode> {
        match extract_bits(ctrl, 4, 12) {
            0 => Some(SampleMode::Adaptive1024),
            1 => Some(SampleMode::Adaptive256),
            2 => Some(SampleMode::Adaptive64),
            3 => Some(SampleMode::Adaptive8),
            4 => Some(SampleMode::Sps1024),
            5 => Some(SampleMode::Sps256),
            6 => Some(SampleMode::Sps64),
            7 => Some(SampleMode::Sps8),
            8 => Some(SampleMode::SingleShot),
            9 => Some(SampleMode::SingleShot8x),
            10 => Some(SampleMode::Fast),
            11 => Some(SampleMode::Burst),
            15 => Some(SampleMode::Sleep),
            _ => None,
        }
    }

    /// True for the two single-shot modes, where the accumulators do not
    /// run at a fixed rate.
    pub fn is_single_shot(self) -> bool {
        matches!(self, SampleMode::SingleShot | SampleMode::SingleShot8x)
    }
}

/// Accumulator scaling for one channel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AccumScale {
    /// Value of one count
    pub lsb: f64,
    /// The accumulator holds a signed value.
    pub bidirectional: bool,
    /// Unit of `lsb`
    pub unit: Unit,
}

/// `(value >> position) & ((1 << width) - 1)`
///
/// Bits shifted in from beyond the top of `value` are zero, so a `position`
/// of 16 or more gives 0 and a `width` of 16 or more keeps every bit.
pub fn extract_bits(value: u16, width: u32, position: u32) -> u16 {
    let mask = 1u16
        .checked_shl(width)
        .map_or(u16::MAX, |bit| bit.wrapping_sub(1));
    value.checked_shr(position).unwrap_or(0) & mask
}

/// Channel 1 sits in the top two bits of a field starting at `base`.
fn field_position(base: u32, channel: usize) -> Option<u32> {
    if channel < MAX_CHANNELS {
        Some(base - 2 * channel as u32)
    } else {
        None
    }
}

/// The voltage configuration of `channel`, from NEG_PWR_FSR.
pub fn voltage_range(neg_pwr_fsr: u16, channel: usize) -> Option<Range> {
    let position = field_position(6, channel)?;
    Some(Range::from_code(extract_bits(neg_pwr_fsr, 2, position)))
}

/// The current configuration of `channel`, from NEG_PWR_FSR.
pub fn current_range(neg_pwr_fsr: u16, channel: usize) -> Option<Range> {
    let position = field_position(14, channel)?;
    Some(Range::from_code(extract_bits(neg_pwr_fsr, 2, position)))
}

/// Volts per count of VBUS and VBUS_AVG, before the voltage divider.
pub fn bus_voltage_lsb(generation: Generation, voltage: Range) -> f64 {
    voltage.apply(generation.bus_voltage_scale()) / FULL_SCALE_16
}

/// Millivolts per count of VSENSE and VSENSE_AVG.
pub fn sense_voltage_lsb(current: Range) -> f64 {
    current.apply(SENSE_VOLTAGE_SCALE) / FULL_SCALE_16
}

/// Watts per count of the 30-bit power value, before the voltage divider.
///
/// `r_sense` is the sense resistor in ohms.
pub fn power_lsb(generation: Generation, r_sense: f64, voltage: Range, current: Range) -> f64 {
    let mut scale =
        (SENSE_VOLTAGE_SCALE * generation.bus_voltage_scale()) / (r_sense * 1000.0);
    if voltage.bipolar || current.bipolar {
        scale *= 2.0;
    }
    if !voltage.full_scale || !current.full_scale {
        scale /= 2.0;
    }
    scale / FULL_SCALE_30
}

/// Work out the units and signedness of a channel's accumulator.
///
/// The reserved mode has an LSB of zero, so it always reads as zero.
pub fn accumulator_scale(
    mode: AccumMode,
    generation: Generation,
    r_sense: f64,
    voltage: Range,
    current: Range,
) -> AccumScale {
    match mode {
        AccumMode::Power => AccumScale {
            lsb: power_lsb(generation, r_sense, voltage, current),
            bidirectional: voltage.bipolar || current.bipolar,
            unit: Unit::Watts,
        },
        AccumMode::SenseVoltage => AccumScale {
            lsb: sense_voltage_lsb(current),
            bidirectional: current.bipolar,
            unit: Unit::Millivolts,
        },
        AccumMode::BusVoltage => AccumScale {
            lsb: bus_voltage_lsb(generation, voltage),
            bidirectional: voltage.bipolar,
            unit: Unit::Volts,
        },
        AccumMode::Reserved => AccumScale {
            lsb: 0.0,
            bidirectional: false,
            unit: Unit::Unknown,
        },
    }
}

/// Sign-extend the low `width` bits of `raw` to an `i64`.
///
/// A `width` of 0 gives 0; 64 or more reinterprets `raw` unchanged.
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    match width {
        0 => 0,
        1..=63 => {
            let shift = 64 - width;
            ((raw << shift) as i64) >> shift
        }
        _ => raw as i64,
    }
}

/// The count held in a `width`-bit register, as a float.
///
/// Bidirectional readings are two's complement; otherwise the register is
/// an unsigned magnitude.
pub fn counts(raw: u64, width: u32, bidirectional: bool) -> f64 {
    if bidirectional {
        sign_extend(raw, width) as f64
    } else {
        raw as f64
    }
}

/// Count the channels enabled in the CTRL channel-off field (bits 4..=7),
/// where a clear bit means the channel is on, capped at `channel_count`.
pub fn active_channels(ctrl: u16, channel_count: usize) -> usize {
    let off_bits = extract_bits(ctrl, 4, 4);
    let active = 4 - off_bits.count_ones() as usize;
    active.min(channel_count)
}

/// Accumulator sample rate in Hz for a CTRL value.
///
/// NaN when the rate is not defined: single-shot, sleep, undefined modes,
/// and fast or burst mode with every channel off.
pub fn sample_frequency(ctrl: u16, channel_count: usize) -> f64 {
    let mode = match SampleMode::from_ctrl(ctrl) {
        Some(mode) => mode,
        None => return f64::NAN,
    };
    match mode {
        SampleMode::Adaptive1024
        | SampleMode::Adaptive256
        | SampleMode::Adaptive64
        | SampleMode::Adaptive8
        | SampleMode::Sps1024 => 1024.0,
        SampleMode::Sps256 => 256.0,
        SampleMode::Sps64 => 64.0,
        SampleMode::Sps8 => 8.0,
        SampleMode::SingleShot | SampleMode::SingleShot8x | SampleMode::Sleep => f64::NAN,
        SampleMode::Fast | SampleMode::Burst => match active_channels(ctrl, channel_count) {
            0 => f64::NAN,
            n => FAST_MODE_RATE / n as f64,
        },
    }
}

/// Energy in µWh from an accumulated power sum (in watt-samples) and the
/// rate it was sampled at.
pub fn energy_uwh(accumulated_power: f64, sample_frequency: f64) -> f64 {
    (accumulated_power / sample_frequency) * MICROWATT_HOURS_PER_WATT_SECOND
}
