//! The device handle.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::cache::{CacheRegister, Cached};
use crate::codec::{Codec, ProductIdCodec, Void, U16, U32, U56, U8};
use crate::register::{self, Register, RegisterInfo};
use crate::telemetry::{self, AccumMode, Range, SampleMode};
use crate::{Error, Generation, I2cInterface, ProductId, RegisterInterface, Unit};

//
// Public Types
//

/// The most channels any part in the family has.
pub const MAX_CHANNELS: usize = 4;

/// How long to wait after a refresh command, in milliseconds, unless
/// configured otherwise.
pub const DEFAULT_REFRESH_DELAY_MS: u32 = 128;

/// Board-specific settings for a [`Pac194x5x`].
///
/// Entries for channels the part does not have are ignored.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// The ratio of any voltage divider in front of each channel's bus
    /// voltage input. Bus voltage, power and accumulator readings are
    /// divided by this.
    pub voltage_ratio: [f64; MAX_CHANNELS],
    /// The sense resistor on each channel, in ohms.
    pub r_sense: [f64; MAX_CHANNELS],
    /// How long to block after sending a refresh command, so the chip can
    /// latch new values.
    pub refresh_delay_ms: u32,
}

/// A PAC194x or PAC195x power monitor.
///
/// Owns the bus interface and a cache of the chip's registers. Cached values
/// are served until the next refresh command; see [`Pac194x5x::refresh`].
pub struct Pac194x5x<IFACE> {
    iface: IFACE,
    config: Config,
    product_id: ProductId,
    registers: CacheRegisters,
}

//
// Private Types
//

/// One cache entry per register the driver reads.
///
/// Every entry except SMBUS_SETTINGS is cacheable and is thrown away by
/// [`CacheRegisters::invalidate_all`].
struct CacheRegisters {
    ctrl: CacheRegister<U16>,
    acc_count: CacheRegister<U32>,
    vacc: [CacheRegister<U56>; MAX_CHANNELS],
    vbus: [CacheRegister<U16>; MAX_CHANNELS],
    vsense: [CacheRegister<U16>; MAX_CHANNELS],
    vbus_avg: [CacheRegister<U16>; MAX_CHANNELS],
    vsense_avg: [CacheRegister<U16>; MAX_CHANNELS],
    vpower: [CacheRegister<U32>; MAX_CHANNELS],
    smbus_settings: CacheRegister<U8>,
    neg_pwr_fsr: CacheRegister<U16>,
    ctrl_act: CacheRegister<U16>,
    neg_pwr_fsr_act: CacheRegister<U16>,
    ctrl_lat: CacheRegister<U16>,
    neg_pwr_fsr_lat: CacheRegister<U16>,
    accum_config: CacheRegister<U8>,
    accum_config_act: CacheRegister<U8>,
    accum_config_lat: CacheRegister<U8>,
    product_id: CacheRegister<ProductIdCodec>,
    manufacturer_id: CacheRegister<U8>,
    revision_id: CacheRegister<U8>,
}

//
// impls on Public Types
//

impl Default for Config {
    fn default() -> Config {
        Config {
            voltage_ratio: [1.0; MAX_CHANNELS],
            r_sense: [0.004; MAX_CHANNELS],
            refresh_delay_ms: DEFAULT_REFRESH_DELAY_MS,
        }
    }
}

impl<I, E> Pac194x5x<I2cInterface<I>>
where
    I: Write<Error = E> + WriteRead<Error = E>,
{
    /// Find a PAC194x/PAC195x at `bus_address` on an I²C bus.
    ///
    /// See [`Pac194x5x::new`].
    pub fn new_i2c(i2c: I, bus_address: u8, config: Config) -> Result<Self, Error<E>> {
        Self::new(I2cInterface::new(i2c, bus_address), config)
    }
}

impl<IFACE> Pac194x5x<IFACE>
where
    IFACE: RegisterInterface,
{
    /// Create a new driver.
    ///
    /// Reads PRODUCT_ID to work out which part this is, and fails with
    /// [`Error::UnknownProductId`] if it isn't one we know.
    pub fn new(mut iface: IFACE, config: Config) -> Result<Self, Error<IFACE::Error>> {
        let mut registers = CacheRegisters::new();
        let product_id = match registers.product_id.read(&mut iface) {
            Ok(product_id) => product_id,
            Err(Error::UnknownProductId(raw)) => {
                warn!("Unknown product ID 0x{:02x}", raw);
                return Err(Error::UnknownProductId(raw));
            }
            Err(e) => return Err(e),
        };
        debug!(
            "Found product ID {}, {} channels",
            u8::from(product_id),
            product_id.channel_count()
        );
        Ok(Pac194x5x {
            iface,
            config,
            product_id,
            registers,
        })
    }

    /// Give back the bus interface.
    pub fn release(self) -> IFACE {
        self.iface
    }

    /// The part found at construction.
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// How many channels this part has. Valid channel indices are
    /// `0..channels()`.
    pub fn channels(&self) -> usize {
        self.product_id.channel_count()
    }

    /// Which family this part belongs to.
    pub fn generation(&self) -> Generation {
        self.product_id.generation()
    }

    /// The settings this driver was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the live CTRL register.
    pub fn get_ctrl(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.ctrl.read(&mut self.iface)
    }

    /// Set the CTRL register.
    ///
    /// The chip only acts on this at the next refresh.
    pub fn set_ctrl(&mut self, value: u16) -> Result<(), Error<IFACE::Error>> {
        self.registers.ctrl.write(&mut self.iface, value)
    }

    /// Get CTRL_ACT, the control settings currently in use.
    pub fn get_ctrl_act(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.ctrl_act.read(&mut self.iface)
    }

    /// Get CTRL_LAT, the control settings that applied to the latched
    /// measurements.
    pub fn get_ctrl_lat(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.ctrl_lat.read(&mut self.iface)
    }

    /// Get the live NEG_PWR_FSR register.
    pub fn get_neg_pwr_fsr(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.neg_pwr_fsr.read(&mut self.iface)
    }

    /// Set the NEG_PWR_FSR register, which selects bipolar and half range
    /// operation for each channel's voltage and current.
    ///
    /// The chip only acts on this at the next refresh.
    pub fn set_neg_pwr_fsr(&mut self, value: u16) -> Result<(), Error<IFACE::Error>> {
        self.registers.neg_pwr_fsr.write(&mut self.iface, value)
    }

    /// Get NEG_PWR_FSR_ACT.
    pub fn get_neg_pwr_fsr_act(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.neg_pwr_fsr_act.read(&mut self.iface)
    }

    /// Get NEG_PWR_FSR_LAT. All measurement scaling is based on this.
    pub fn get_neg_pwr_fsr_lat(&mut self) -> Result<u16, Error<IFACE::Error>> {
        self.registers.neg_pwr_fsr_lat.read(&mut self.iface)
    }

    /// Get the ACCUM_CONFIG register.
    pub fn get_accum_config(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.accum_config.read(&mut self.iface)
    }

    /// Set the ACCUM_CONFIG register, which picks what each channel's
    /// accumulator sums. See [`AccumMode`].
    pub fn set_accum_config(&mut self, value: u8) -> Result<(), Error<IFACE::Error>> {
        self.registers.accum_config.write(&mut self.iface, value)
    }

    /// Get ACCUM_CONFIG_ACT.
    pub fn get_accum_config_act(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.accum_config_act.read(&mut self.iface)
    }

    /// Get ACCUM_CONFIG_LAT.
    pub fn get_accum_config_lat(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.accum_config_lat.read(&mut self.iface)
    }

    /// Get ACC_COUNT, the number of samples in the accumulators.
    pub fn get_acc_count(&mut self) -> Result<u32, Error<IFACE::Error>> {
        self.registers.acc_count.read(&mut self.iface)
    }

    /// Get SMBUS_SETTINGS. This is never cached, as reading it has side
    /// effects on the chip.
    pub fn get_smbus_settings(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.smbus_settings.read(&mut self.iface)
    }

    /// Set SMBUS_SETTINGS.
    pub fn set_smbus_settings(&mut self, value: u8) -> Result<(), Error<IFACE::Error>> {
        self.registers.smbus_settings.write(&mut self.iface, value)
    }

    /// Read the PRODUCT_ID register.
    ///
    /// Unlike [`Pac194x5x::product_id`], this goes to the chip after a
    /// refresh.
    pub fn get_product_id(&mut self) -> Result<ProductId, Error<IFACE::Error>> {
        self.registers.product_id.read(&mut self.iface)
    }

    /// Get MANUFACTURER_ID.
    pub fn get_manufacturer_id(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.manufacturer_id.read(&mut self.iface)
    }

    /// Get REVISION_ID.
    pub fn get_revision_id(&mut self) -> Result<u8, Error<IFACE::Error>> {
        self.registers.revision_id.read(&mut self.iface)
    }

    /// Read any register straight off the chip, bypassing the cache.
    ///
    /// `info` usually comes from [`register::REGISTER_MAP`]. `buffer` must
    /// hold at least `info.len` bytes; the number of bytes read is returned.
    ///
    /// The zero-length command registers (REFRESH, REFRESH_G, REFRESH_V) give
    /// [`Error::NotReadable`] without touching the bus. Use
    /// [`Pac194x5x::refresh`] and friends to send those.
    pub fn read_raw(
        &mut self,
        info: &RegisterInfo,
        buffer: &mut [u8],
    ) -> Result<usize, Error<IFACE::Error>> {
        if info.len == 0 {
            return Err(Error::NotReadable(info.address));
        }
        let available = buffer.len();
        let buffer = match buffer.get_mut(..info.len) {
            Some(buffer) => buffer,
            None => {
                return Err(Error::LengthMismatch {
                    expected: info.len,
                    actual: available,
                })
            }
        };
        let received = self
            .iface
            .read_register(info.address, buffer)
            .map_err(Error::Bus)?;
        trace!("Raw read {} (0x{:02x})", info.name, info.address);
        if received != info.len {
            return Err(Error::LengthMismatch {
                expected: info.len,
                actual: received,
            });
        }
        Ok(received)
    }

    /// Send REFRESH.
    ///
    /// Updates the accumulators and measurement registers, resets the
    /// accumulators, and makes pending configuration changes take effect.
    /// Throws away the whole cache, then blocks for the configured refresh
    /// delay.
    pub fn refresh<D>(&mut self, delay: &mut D) -> Result<(), Error<IFACE::Error>>
    where
        D: DelayMs<u32>,
    {
        self.send_refresh(register::REFRESH, delay)
    }

    /// Send REFRESH_G, the general call version of [`Pac194x5x::refresh`].
    pub fn refresh_g<D>(&mut self, delay: &mut D) -> Result<(), Error<IFACE::Error>>
    where
        D: DelayMs<u32>,
    {
        self.send_refresh(register::REFRESH_G, delay)
    }

    /// Send REFRESH_V, which updates the measurement registers without
    /// resetting the accumulators.
    pub fn refresh_v<D>(&mut self, delay: &mut D) -> Result<(), Error<IFACE::Error>>
    where
        D: DelayMs<u32>,
    {
        self.send_refresh(register::REFRESH_V, delay)
    }

    /// Instantaneous bus voltage on `channel`, in volts.
    pub fn vbus(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let range = self.voltage_range(channel)?;
        let raw = self.registers.vbus[channel].read(&mut self.iface)?;
        Ok(self.bus_voltage(channel, raw, range))
    }

    /// Rolling average bus voltage on `channel`, in volts.
    pub fn vbus_avg(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let range = self.voltage_range(channel)?;
        let raw = self.registers.vbus_avg[channel].read(&mut self.iface)?;
        Ok(self.bus_voltage(channel, raw, range))
    }

    /// Instantaneous voltage across the sense resistor on `channel`, in
    /// millivolts.
    pub fn vsense(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let range = self.current_range(channel)?;
        let raw = self.registers.vsense[channel].read(&mut self.iface)?;
        Ok(sense_voltage(raw, range))
    }

    /// Rolling average voltage across the sense resistor on `channel`, in
    /// millivolts.
    pub fn vsense_avg(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let range = self.current_range(channel)?;
        let raw = self.registers.vsense_avg[channel].read(&mut self.iface)?;
        Ok(sense_voltage(raw, range))
    }

    /// Instantaneous current on `channel`, in milliamps.
    pub fn current(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        let millivolts = self.vsense(channel)?;
        Ok(millivolts / self.config.r_sense[channel])
    }

    /// Rolling average current on `channel`, in milliamps.
    pub fn current_avg(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        let millivolts = self.vsense_avg(channel)?;
        Ok(millivolts / self.config.r_sense[channel])
    }

    /// Power on `channel`, in watts.
    pub fn power(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let voltage = self.voltage_range(channel)?;
        let current = self.current_range(channel)?;
        let raw = self.registers.vpower[channel].read(&mut self.iface)?;
        let lsb = telemetry::power_lsb(
            self.generation(),
            self.config.r_sense[channel],
            voltage,
            current,
        );
        // 30 bit result, left-aligned
        let counts = telemetry::counts(raw.into(), 32, voltage.bipolar || current.bipolar) / 4.0;
        Ok(counts * lsb / self.config.voltage_ratio[channel])
    }

    /// The accumulator for `channel`, scaled according to what it is
    /// accumulating.
    ///
    /// A reserved accumulator mode gives `(0.0, Unit::Unknown)`.
    pub fn vacc(&mut self, channel: usize) -> Result<(f64, Unit), Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let mode = self.accum_mode(channel)?;
        let voltage = self.voltage_range(channel)?;
        let current = self.current_range(channel)?;
        let scale = telemetry::accumulator_scale(
            mode,
            self.generation(),
            self.config.r_sense[channel],
            voltage,
            current,
        );
        let raw = self.registers.vacc[channel].read(&mut self.iface)?;
        let counts = telemetry::counts(raw, 56, scale.bidirectional);
        Ok((
            counts * scale.lsb / self.config.voltage_ratio[channel],
            scale.unit,
        ))
    }

    /// Energy accumulated on `channel` since the last reset of the
    /// accumulators, in microwatt-hours.
    ///
    /// Gives NaN unless the channel is accumulating power and the chip is
    /// sampling at a known rate.
    pub fn energy(&mut self, channel: usize) -> Result<f64, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        if self.accum_mode(channel)? != AccumMode::Power {
            return Ok(f64::NAN);
        }
        if let Some(true) = self.sample_mode()?.map(SampleMode::is_single_shot) {
            return Ok(f64::NAN);
        }
        let (accumulated, _unit) = self.vacc(channel)?;
        let frequency = self.sample_frequency()?;
        Ok(telemetry::energy_uwh(accumulated, frequency))
    }

    /// The sample mode the latched measurements were taken in.
    ///
    /// `None` if CTRL_LAT holds an undefined mode.
    pub fn sample_mode(&mut self) -> Result<Option<SampleMode>, Error<IFACE::Error>> {
        let ctrl = self.registers.ctrl_lat.read(&mut self.iface)?;
        Ok(SampleMode::from_ctrl(ctrl))
    }

    /// The accumulator sample rate in Hz, or NaN in modes without a fixed
    /// rate.
    pub fn sample_frequency(&mut self) -> Result<f64, Error<IFACE::Error>> {
        let ctrl = self.registers.ctrl_lat.read(&mut self.iface)?;
        Ok(telemetry::sample_frequency(ctrl, self.channels()))
    }

    /// What the accumulator for `channel` is summing.
    pub fn accum_mode(&mut self, channel: usize) -> Result<AccumMode, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let config = self.registers.accum_config.read(&mut self.iface)?;
        AccumMode::from_config(config, channel).ok_or(Error::InvalidChannel(channel))
    }

    /// The latched voltage range of `channel`.
    pub fn voltage_range(&mut self, channel: usize) -> Result<Range, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let fsr = self.registers.neg_pwr_fsr_lat.read(&mut self.iface)?;
        telemetry::voltage_range(fsr, channel).ok_or(Error::InvalidChannel(channel))
    }

    /// The latched current range of `channel`.
    pub fn current_range(&mut self, channel: usize) -> Result<Range, Error<IFACE::Error>> {
        self.check_channel(channel)?;
        let fsr = self.registers.neg_pwr_fsr_lat.read(&mut self.iface)?;
        telemetry::current_range(fsr, channel).ok_or(Error::InvalidChannel(channel))
    }

    fn check_channel(&self, channel: usize) -> Result<(), Error<IFACE::Error>> {
        if channel < self.channels() {
            Ok(())
        } else {
            Err(Error::InvalidChannel(channel))
        }
    }

    fn bus_voltage(&self, channel: usize, raw: u16, range: Range) -> f64 {
        let lsb = telemetry::bus_voltage_lsb(self.generation(), range);
        telemetry::counts(raw.into(), 16, range.bipolar) * lsb / self.config.voltage_ratio[channel]
    }

    fn send_refresh<D>(
        &mut self,
        command: Register<Void>,
        delay: &mut D,
    ) -> Result<(), Error<IFACE::Error>>
    where
        D: DelayMs<u32>,
    {
        self.registers.invalidate_all();
        debug!("Sending {}", command.name());
        self.iface
            .write_register(command.address(), &Void::encode(()))
            .map_err(Error::Bus)?;
        delay.delay_ms(self.config.refresh_delay_ms);
        Ok(())
    }
}

//
// impls on Private Types
//

impl CacheRegisters {
    fn new() -> CacheRegisters {
        CacheRegisters {
            ctrl: CacheRegister::new(register::CTRL, true),
            acc_count: CacheRegister::new(register::ACC_COUNT, true),
            vacc: per_channel(register::VACC),
            vbus: per_channel(register::VBUS),
            vsense: per_channel(register::VSENSE),
            vbus_avg: per_channel(register::VBUS_AVG),
            vsense_avg: per_channel(register::VSENSE_AVG),
            vpower: per_channel(register::VPOWER),
            smbus_settings: CacheRegister::new(register::SMBUS_SETTINGS, false),
            neg_pwr_fsr: CacheRegister::new(register::NEG_PWR_FSR, true),
            ctrl_act: CacheRegister::new(register::CTRL_ACT, true),
            neg_pwr_fsr_act: CacheRegister::new(register::NEG_PWR_FSR_ACT, true),
            ctrl_lat: CacheRegister::new(register::CTRL_LAT, true),
            neg_pwr_fsr_lat: CacheRegister::new(register::NEG_PWR_FSR_LAT, true),
            accum_config: CacheRegister::new(register::ACCUM_CONFIG, true),
            accum_config_act: CacheRegister::new(register::ACCUM_CONFIG_ACT, true),
            accum_config_lat: CacheRegister::new(register::ACCUM_CONFIG_LAT, true),
            product_id: CacheRegister::new(register::PRODUCT_ID, true),
            manufacturer_id: CacheRegister::new(register::MANUFACTURER_ID, true),
            revision_id: CacheRegister::new(register::REVISION_ID, true),
        }
    }

    /// Every cacheable entry, in register order.
    fn cached_mut(&mut self) -> impl Iterator<Item = &mut dyn Cached> {
        let CacheRegisters {
            ctrl,
            acc_count,
            vacc,
            vbus,
            vsense,
            vbus_avg,
            vsense_avg,
            vpower,
            smbus_settings: _,
            neg_pwr_fsr,
            ctrl_act,
            neg_pwr_fsr_act,
            ctrl_lat,
            neg_pwr_fsr_lat,
            accum_config,
            accum_config_act,
            accum_config_lat,
            product_id,
            manufacturer_id,
            revision_id,
        } = self;
        let head: [&mut dyn Cached; 2] = [ctrl, acc_count];
        let tail: [&mut dyn Cached; 11] = [
            neg_pwr_fsr,
            ctrl_act,
            neg_pwr_fsr_act,
            ctrl_lat,
            neg_pwr_fsr_lat,
            accum_config,
            accum_config_act,
            accum_config_lat,
            product_id,
            manufacturer_id,
            revision_id,
        ];
        head.into_iter()
            .chain(vacc.iter_mut().map(as_cached))
            .chain(vbus.iter_mut().map(as_cached))
            .chain(vsense.iter_mut().map(as_cached))
            .chain(vbus_avg.iter_mut().map(as_cached))
            .chain(vsense_avg.iter_mut().map(as_cached))
            .chain(vpower.iter_mut().map(as_cached))
            .chain(tail)
    }

    fn invalidate_all(&mut self) {
        debug!("Invalidating register cache");
        for register in self.cached_mut() {
            register.invalidate();
        }
    }
}

//
// Private Functions
//

fn per_channel<C: Codec>(registers: [Register<C>; MAX_CHANNELS]) -> [CacheRegister<C>; MAX_CHANNELS] {
    registers.map(|register| CacheRegister::new(register, true))
}

fn as_cached<C: Codec>(register: &mut CacheRegister<C>) -> &mut dyn Cached {
    register
}

fn sense_voltage(raw: u16, range: Range) -> f64 {
    telemetry::counts(raw.into(), 16, range.bipolar) * telemetry::sense_voltage_lsb(range)
}


//
// End of file
//
