//! Drives the driver against a simulated chip.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use pac194x5x::register;
use pac194x5x::{
    AccumMode, Config, Error, Generation, Pac194x5x, ProductId, RegisterInterface, SampleMode,
    Unit,
};

#[derive(Debug, Copy, Clone, PartialEq)]
struct SimError;

#[derive(Default)]
struct State {
    registers: HashMap<u8, Vec<u8>>,
    reads: Vec<u8>,
    writes: Vec<(u8, Vec<u8>)>,
    fail: bool,
}

impl State {
    fn set(&mut self, address: u8, bytes: &[u8]) {
        self.registers.insert(address, bytes.to_vec());
    }

    fn reads_of(&self, address: u8) -> usize {
        self.reads.iter().filter(|&&a| a == address).count()
    }
}

/// A register file. Unset registers read as zero.
#[derive(Clone)]
struct SimChip(Rc<RefCell<State>>);

impl SimChip {
    fn new(product_id: u8) -> SimChip {
        let chip = SimChip(Rc::default());
        chip.state().set(0xfd, &[product_id]);
        chip
    }

    fn state(&self) -> std::cell::RefMut<'_, State> {
        self.0.borrow_mut()
    }
}

impl RegisterInterface for SimChip {
    type Error = SimError;

    fn read_register(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, SimError> {
        let mut state = self.state();
        if state.fail {
            return Err(SimError);
        }
        state.reads.push(address);
        buffer.fill(0);
        if let Some(bytes) = state.registers.get(&address) {
            let n = bytes.len().min(buffer.len());
            buffer[..n].copy_from_slice(&bytes[..n]);
        }
        Ok(buffer.len())
    }

    fn write_register(&mut self, address: u8, data: &[u8]) -> Result<(), SimError> {
        let mut state = self.state();
        if state.fail {
            return Err(SimError);
        }
        state.writes.push((address, data.to_vec()));
        if !data.is_empty() {
            state.registers.insert(address, data.to_vec());
        }
        Ok(())
    }
}

#[derive(Default)]
struct Delay(Vec<u32>);

impl DelayMs<u32> for Delay {
    fn delay_ms(&mut self, ms: u32) {
        self.0.push(ms);
    }
}

fn monitor(chip: &SimChip) -> Pac194x5x<SimChip> {
    match Pac194x5x::new(chip.clone(), Config::default()) {
        Ok(monitor) => monitor,
        Err(e) => panic!("construction failed: {:?}", e),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

const POWER_LSB: f64 = (100.0 * 9.0) / (0.004 * 1000.0) / 1_073_741_824.0;

#[test]
fn unknown_product_id_is_rejected() {
    let chip = SimChip::new(0x42);
    let result = Pac194x5x::new(chip.clone(), Config::default());
    assert!(matches!(result, Err(Error::UnknownProductId(0x42))));
    assert_eq!(chip.state().reads, vec![0xfd]);
}

#[test]
fn construction_propagates_bus_errors() {
    let chip = SimChip::new(107);
    chip.state().fail = true;
    let result = Pac194x5x::new(chip, Config::default());
    assert!(matches!(result, Err(Error::Bus(SimError))));
}

#[test]
fn identifies_the_part() {
    let mut m = monitor(&SimChip::new(107));
    assert_eq!(m.product_id(), ProductId::Pac1944);
    assert_eq!(m.channels(), 4);
    assert_eq!(m.generation(), Generation::Pac194x);
    assert_eq!(m.get_product_id(), Ok(ProductId::Pac1944));

    let m = monitor(&SimChip::new(121));
    assert_eq!(m.product_id(), ProductId::Pac1952_1);
    assert_eq!(m.channels(), 2);
    assert_eq!(m.generation(), Generation::Pac195x);
    assert_eq!(m.config().refresh_delay_ms, 128);
}

#[test]
fn channel_index_is_checked() {
    let chip = SimChip::new(121);
    let mut m = monitor(&chip);
    assert_eq!(m.vbus(2), Err(Error::InvalidChannel(2)));
    assert_eq!(m.current(5), Err(Error::InvalidChannel(5)));
    assert_eq!(m.vacc(2), Err(Error::InvalidChannel(2)));
    assert_eq!(m.energy(3), Err(Error::InvalidChannel(3)));
    assert!(m.vbus(1).is_ok());
    // Nothing but the product ID and the channel 1 reads hit the bus.
    assert_eq!(chip.state().reads, vec![0xfd, 0x24, 0x08]);

    let mut m = monitor(&SimChip::new(107));
    assert_eq!(m.power(4), Err(Error::InvalidChannel(4)));
    assert!(m.power(3).is_ok());
}

#[test]
fn sense_voltage_and_current() {
    let chip = SimChip::new(107);
    // Channel 1 current bipolar, full scale.
    chip.state().set(0x24, &[0x40, 0x00]);
    chip.state().set(0x0b, &[0x10, 0x00]);
    chip.state().set(0x13, &[0xF0, 0x00]);
    let mut m = monitor(&chip);
    assert_eq!(m.vsense(0), Ok(12.5));
    assert!(close(m.current(0).unwrap(), 3125.0));
    // 0xF000 is -4096 counts.
    assert_eq!(m.vsense_avg(0), Ok(-12.5));
    assert!(close(m.current_avg(0).unwrap(), -3125.0));
}

#[test]
fn sense_resistor_per_channel() {
    let chip = SimChip::new(107);
    chip.state().set(0x0d, &[0x10, 0x00]);
    let config = Config {
        r_sense: [0.004, 0.004, 0.01, 0.004],
        ..Default::default()
    };
    let mut m = Pac194x5x::new(chip, config).unwrap();
    // Unipolar: 100 mV full scale.
    let millivolts = 4096.0 * 100.0 / 65536.0;
    assert_eq!(m.vsense(2), Ok(millivolts));
    assert!(close(m.current(2).unwrap(), millivolts / 0.01));
}

#[test]
fn bus_voltage() {
    let chip = SimChip::new(107);
    // Channel 1 voltage bipolar, channel 2 voltage half range.
    chip.state().set(0x24, &[0x00, 0x60]);
    chip.state().set(0x07, &[0x80, 0x00]);
    chip.state().set(0x08, &[0x80, 0x00]);
    chip.state().set(0x0f, &[0x7F, 0xFF]);
    let mut m = monitor(&chip);
    assert_eq!(m.vbus(0), Ok(-9.0));
    assert_eq!(m.vbus_avg(0), Ok(32767.0 * 18.0 / 65536.0));
    // Half range is still bipolar.
    assert_eq!(m.vbus(1), Ok(-4.5));
}

#[test]
fn bus_voltage_through_divider() {
    let chip = SimChip::new(123);
    chip.state().set(0x08, &[0xFF, 0xFF]);
    let config = Config {
        voltage_ratio: [1.0, 0.5, 1.0, 1.0],
        ..Default::default()
    };
    let mut m = Pac194x5x::new(chip, config).unwrap();
    assert_eq!(m.vbus(1), Ok(65535.0 * 32.0 / 65536.0 / 0.5));
}

#[test]
fn power() {
    let chip = SimChip::new(107);
    chip.state().set(0x17, &[0x40, 0x00, 0x00, 0x00]);
    // Channel 2 current bipolar.
    chip.state().set(0x24, &[0x10, 0x00]);
    chip.state().set(0x18, &[0xFF, 0xFF, 0xFF, 0xFC]);
    let mut m = monitor(&chip);
    assert!(close(m.power(0).unwrap(), 56.25));
    assert!(close(m.power(1).unwrap(), -2.0 * POWER_LSB));
}

#[test]
fn accumulator_modes() {
    let chip = SimChip::new(107);
    // Channel 1 power, 2 sense voltage, 3 bus voltage, 4 reserved.
    chip.state().set(0x25, &[0b00_01_10_11]);
    // Channel 1 current bipolar.
    chip.state().set(0x24, &[0x40, 0x00]);
    chip.state().set(0x03, &[0xFF; 7]);
    chip.state().set(0x04, &[0, 0, 0, 0, 0, 0x10, 0x00]);
    chip.state().set(0x05, &[0, 0, 0, 0, 0, 0x00, 0x02]);
    chip.state().set(0x06, &[0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde]);
    let mut m = monitor(&chip);

    assert_eq!(m.accum_mode(0), Ok(AccumMode::Power));
    let (watts, unit) = m.vacc(0).unwrap();
    assert_eq!(unit, Unit::Watts);
    assert!(close(watts, -2.0 * POWER_LSB));

    let (millivolts, unit) = m.vacc(1).unwrap();
    assert_eq!(unit, Unit::Millivolts);
    assert_eq!(millivolts, 4096.0 * 100.0 / 65536.0);

    let (volts, unit) = m.vacc(2).unwrap();
    assert_eq!(unit, Unit::Volts);
    assert_eq!(volts, 2.0 * 9.0 / 65536.0);

    assert_eq!(m.vacc(3), Ok((0.0, Unit::Unknown)));
}

#[test]
fn sample_frequency() {
    let chip = SimChip::new(107);
    // Fast mode, channels 1 and 2 off.
    chip.state().set(0x23, &[0xA0, 0x30]);
    let mut m = monitor(&chip);
    assert_eq!(m.sample_mode(), Ok(Some(SampleMode::Fast)));
    assert_eq!(m.sample_frequency(), Ok(2560.0));
}

#[test]
fn energy() {
    let chip = SimChip::new(107);
    chip.state().set(0x03, &[0, 0, 0, 0x40, 0, 0, 0]);
    chip.state().set(0x23, &[0x50, 0x00]);
    let mut m = monitor(&chip);
    let (accumulated, _) = m.vacc(0).unwrap();
    assert!(close(accumulated, 225.0));
    let expected = (225.0 / 256.0) * (1_000_000.0 / 3600.0);
    assert!(close(m.energy(0).unwrap(), expected));
}

#[test]
fn energy_is_nan_without_a_sample_rate() {
    let chip = SimChip::new(107);
    chip.state().set(0x03, &[0, 0, 0, 0x40, 0, 0, 0]);
    chip.state().set(0x23, &[0x80, 0x00]);
    let mut m = monitor(&chip);
    assert_eq!(m.sample_mode(), Ok(Some(SampleMode::SingleShot)));
    assert!(m.sample_frequency().unwrap().is_nan());
    assert!(m.energy(0).unwrap().is_nan());
}

#[test]
fn energy_is_nan_unless_accumulating_power() {
    let chip = SimChip::new(107);
    // Channel 1 accumulating bus voltage.
    chip.state().set(0x25, &[0b10_00_00_00]);
    let mut m = monitor(&chip);
    assert!(m.energy(0).unwrap().is_nan());
    assert!(!m.energy(1).unwrap().is_nan());
}

#[test]
fn refresh_throws_away_the_cache() {
    let chip = SimChip::new(107);
    chip.state().set(0x07, &[0x10, 0x00]);
    let mut m = monitor(&chip);
    let mut delay = Delay::default();

    let first = m.vbus(0).unwrap();
    assert_eq!(m.vbus(0), Ok(first));
    assert_eq!(chip.state().reads_of(0x07), 1);
    assert_eq!(chip.state().reads_of(0x24), 1);

    chip.state().set(0x07, &[0x20, 0x00]);
    m.refresh(&mut delay).unwrap();
    assert_eq!(chip.state().writes, vec![(0x00, vec![])]);
    assert_eq!(delay.0, vec![128]);

    assert_eq!(m.vbus(0), Ok(first * 2.0));
    assert_eq!(chip.state().reads_of(0x07), 2);
    assert_eq!(chip.state().reads_of(0x24), 2);

    // The product ID is read again after a refresh too.
    assert_eq!(m.get_product_id(), Ok(ProductId::Pac1944));
    assert_eq!(chip.state().reads_of(0xfd), 2);
}

#[test]
fn refresh_commands() {
    let chip = SimChip::new(107);
    let config = Config {
        refresh_delay_ms: 5,
        ..Default::default()
    };
    let mut m = Pac194x5x::new(chip.clone(), config).unwrap();
    let mut delay = Delay::default();
    m.refresh_g(&mut delay).unwrap();
    m.refresh_v(&mut delay).unwrap();
    m.refresh(&mut delay).unwrap();
    assert_eq!(
        chip.state().writes,
        vec![(0x1e, vec![]), (0x1f, vec![]), (0x00, vec![])]
    );
    assert_eq!(delay.0, vec![5, 5, 5]);
}

#[test]
fn failed_refresh_does_not_delay() {
    let chip = SimChip::new(107);
    let mut m = monitor(&chip);
    let mut delay = Delay::default();
    chip.state().fail = true;
    assert_eq!(m.refresh(&mut delay), Err(Error::Bus(SimError)));
    assert!(delay.0.is_empty());
}

#[test]
fn written_values_need_no_read_back() {
    let chip = SimChip::new(107);
    let mut m = monitor(&chip);
    m.set_ctrl(0x1234).unwrap();
    m.set_neg_pwr_fsr(0x5500).unwrap();
    m.set_accum_config(0x40).unwrap();
    assert_eq!(m.get_ctrl(), Ok(0x1234));
    assert_eq!(m.get_neg_pwr_fsr(), Ok(0x5500));
    assert_eq!(m.get_accum_config(), Ok(0x40));
    assert_eq!(chip.state().reads, vec![0xfd]);
    assert_eq!(
        chip.state().writes,
        vec![
            (0x01, vec![0x12, 0x34]),
            (0x1d, vec![0x55, 0x00]),
            (0x25, vec![0x40]),
        ]
    );

    // The live accumulator config drives the scaling straight away.
    assert_eq!(m.accum_mode(0), Ok(AccumMode::SenseVoltage));
}

#[test]
fn latched_and_active_registers() {
    let chip = SimChip::new(107);
    chip.state().set(0x21, &[0x01, 0x02]);
    chip.state().set(0x22, &[0x03, 0x04]);
    chip.state().set(0x23, &[0x05, 0x06]);
    chip.state().set(0x24, &[0x07, 0x08]);
    chip.state().set(0x4a, &[0x09]);
    chip.state().set(0x4b, &[0x0a]);
    chip.state().set(0x02, &[0, 0, 0x01, 0x00]);
    chip.state().set(0xfe, &[0x54]);
    chip.state().set(0xff, &[0x02]);
    let mut m = monitor(&chip);
    assert_eq!(m.get_ctrl_act(), Ok(0x0102));
    assert_eq!(m.get_neg_pwr_fsr_act(), Ok(0x0304));
    assert_eq!(m.get_ctrl_lat(), Ok(0x0506));
    assert_eq!(m.get_neg_pwr_fsr_lat(), Ok(0x0708));
    assert_eq!(m.get_accum_config_act(), Ok(0x09));
    assert_eq!(m.get_accum_config_lat(), Ok(0x0a));
    assert_eq!(m.get_acc_count(), Ok(256));
    assert_eq!(m.get_manufacturer_id(), Ok(0x54));
    assert_eq!(m.get_revision_id(), Ok(0x02));
}

#[test]
fn smbus_settings_are_never_cached() {
    let chip = SimChip::new(107);
    chip.state().set(0x1c, &[0x81]);
    let mut m = monitor(&chip);
    assert_eq!(m.get_smbus_settings(), Ok(0x81));
    assert_eq!(m.get_smbus_settings(), Ok(0x81));
    m.set_smbus_settings(0x01).unwrap();
    assert_eq!(m.get_smbus_settings(), Ok(0x01));
    assert_eq!(chip.state().reads_of(0x1c), 3);
}

#[test]
fn handles_do_not_share_a_cache() {
    let chip = SimChip::new(107);
    chip.state().set(0x01, &[0x00, 0x01]);
    let mut a = monitor(&chip);
    let mut b = monitor(&chip);
    let mut delay = Delay::default();

    assert_eq!(a.get_ctrl(), Ok(1));
    chip.state().set(0x01, &[0x00, 0x02]);
    assert_eq!(b.get_ctrl(), Ok(2));

    b.refresh(&mut delay).unwrap();
    assert_eq!(a.get_ctrl(), Ok(1));
    assert_eq!(chip.state().reads_of(0x01), 2);
}

#[test]
fn bus_errors_pass_through() {
    let chip = SimChip::new(107);
    let mut m = monitor(&chip);
    chip.state().fail = true;
    assert_eq!(m.get_ctrl(), Err(Error::Bus(SimError)));
    assert_eq!(m.vbus(0), Err(Error::Bus(SimError)));
    assert_eq!(m.set_ctrl(1), Err(Error::Bus(SimError)));

    chip.state().fail = false;
    chip.state().set(0x01, &[0x00, 0x07]);
    assert_eq!(m.get_ctrl(), Ok(7));
}

#[test]
fn raw_reads_bypass_the_cache() {
    let chip = SimChip::new(107);
    chip.state().set(0x24, &[0xAB, 0xCD]);
    let mut m = monitor(&chip);
    assert_eq!(m.get_neg_pwr_fsr_lat(), Ok(0xABCD));

    let info = match register::find(0x24) {
        Some(info) => *info,
        None => panic!("NEG_PWR_FSR_LAT missing from the map"),
    };
    let mut buffer = [0u8; 4];
    assert_eq!(m.read_raw(&info, &mut buffer), Ok(2));
    assert_eq!(&buffer[..2], &[0xAB, 0xCD]);
    assert_eq!(chip.state().reads_of(0x24), 2);

    assert_eq!(
        m.read_raw(&info, &mut [0u8; 1]),
        Err(Error::LengthMismatch {
            expected: 2,
            actual: 1
        })
    );

    for info in register::REGISTER_MAP.iter() {
        let mut buffer = [0u8; 7];
        let expected = if info.len == 0 {
            Err(Error::NotReadable(info.address))
        } else {
            Ok(info.len)
        };
        assert_eq!(m.read_raw(info, &mut buffer), expected);
    }
}

#[test]
fn raw_reads_refuse_command_registers() {
    let chip = SimChip::new(107);
    chip.state().set(0x07, &[0x10, 0x00]);
    let mut m = monitor(&chip);
    let before = m.vbus(0).unwrap();

    for address in [0x00, 0x1e, 0x1f] {
        let info = match register::find(address) {
            Some(info) => *info,
            None => panic!("command register 0x{:02x} missing from the map", address),
        };
        assert_eq!(
            m.read_raw(&info, &mut [0u8; 7]),
            Err(Error::NotReadable(address))
        );
    }

    // Nothing was sent, so the cached reading is still the chip's latest.
    assert_eq!(chip.state().reads_of(0x00), 0);
    assert_eq!(chip.state().reads_of(0x1e), 0);
    assert_eq!(chip.state().reads_of(0x1f), 0);
    assert!(chip.state().writes.is_empty());
    assert_eq!(m.vbus(0), Ok(before));
    assert_eq!(chip.state().reads_of(0x07), 1);
}

#[test]
fn release_gives_back_the_interface() {
    let chip = SimChip::new(107);
    let m = monitor(&chip);
    let released = m.release();
    assert!(Rc::ptr_eq(&released.0, &chip.0));
}

struct I2c {
    registers: HashMap<u8, Vec<u8>>,
    writes: Vec<(u8, Vec<u8>)>,
}

impl i2c::Write for I2c {
    type Error = ();

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
        self.writes.push((address, bytes.to_vec()));
        Ok(())
    }
}

impl i2c::WriteRead for I2c {
    type Error = ();

    fn write_read(&mut self, _address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
        buffer.fill(0);
        if let Some(value) = self.registers.get(&bytes[0]) {
            buffer.copy_from_slice(value);
        }
        Ok(())
    }
}

#[test]
fn over_i2c() {
    let mut registers = HashMap::new();
    registers.insert(0xfd, vec![122]);
    registers.insert(0x09, vec![0x80, 0x00]);
    let i2c = I2c {
        registers,
        writes: Vec::new(),
    };
    let mut m = match Pac194x5x::new_i2c(i2c, 0x10, Config::default()) {
        Ok(m) => m,
        Err(e) => panic!("construction failed: {:?}", e),
    };
    assert_eq!(m.channels(), 3);
    assert_eq!(m.vbus(2), Ok(16.0));
    m.refresh_v(&mut Delay::default()).unwrap();
    let iface = m.release();
    assert_eq!(iface.bus_address(), 0x10);
    assert_eq!(iface.release().writes, vec![(0x10, vec![0x1f])]);
}
