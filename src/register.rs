//! The PAC194x/PAC195x register map.
//!
//! Each register is described by its address and the [`Codec`] used for its
//! contents. The wire length always comes from the codec, so a descriptor
//! cannot disagree with the bytes its codec produces.

use core::marker::PhantomData;

use crate::codec::{Bytes, Codec, ProductIdCodec, Void, U16, U32, U56, U8};

/// Describes one register: where it lives and how its bytes are encoded.
#[derive(Debug)]
pub struct Register<C> {
    name: &'static str,
    address: u8,
    _codec: PhantomData<C>,
}

/// A type-erased view of a [`Register`], for diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterInfo {
    /// Datasheet name of the register
    pub name: &'static str,
    /// Register address
    pub address: u8,
    /// Number of bytes on the wire
    pub len: usize,
}

impl<C> Clone for Register<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Register<C> {}

impl<C: Codec> Register<C> {
    /// Describe a register at `address`.
    pub const fn new(name: &'static str, address: u8) -> Register<C> {
        Register {
            name,
            address,
            _codec: PhantomData,
        }
    }

    /// The register's datasheet name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The register's address.
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Number of bytes on the wire.
    pub const fn len(&self) -> usize {
        C::LEN
    }

    /// True for the zero-length command registers.
    pub const fn is_empty(&self) -> bool {
        C::LEN == 0
    }

    /// A type-erased copy of this descriptor.
    pub const fn info(&self) -> RegisterInfo {
        RegisterInfo {
            name: self.name,
            address: self.address,
            len: C::LEN,
        }
    }
}

macro_rules! per_channel {
    ($codec:ty, [$n1:literal @ $a1:literal, $n2:literal @ $a2:literal, $n3:literal @ $a3:literal, $n4:literal @ $a4:literal]) => {
        [
            Register::<$codec>::new($n1, $a1),
            Register::<$codec>::new($n2, $a2),
            Register::<$codec>::new($n3, $a3),
            Register::<$codec>::new($n4, $a4),
        ]
    };
}

/// Refresh command: latches measurements and applies pending configuration.
pub const REFRESH: Register<Void> = Register::new("REFRESH", 0x00);
/// Control register
pub const CTRL: Register<U16> = Register::new("CTRL", 0x01);
/// Number of samples summed into the accumulators
pub const ACC_COUNT: Register<U32> = Register::new("ACC_COUNT", 0x02);
/// Accumulators
pub const VACC: [Register<U56>; 4] =
    per_channel!(U56, ["VACC1" @ 0x03, "VACC2" @ 0x04, "VACC3" @ 0x05, "VACC4" @ 0x06]);
/// Bus voltages
pub const VBUS: [Register<U16>; 4] =
    per_channel!(U16, ["VBUS1" @ 0x07, "VBUS2" @ 0x08, "VBUS3" @ 0x09, "VBUS4" @ 0x0a]);
/// Sense voltages
pub const VSENSE: [Register<U16>; 4] =
    per_channel!(U16, ["VSENSE1" @ 0x0b, "VSENSE2" @ 0x0c, "VSENSE3" @ 0x0d, "VSENSE4" @ 0x0e]);
/// Rolling average bus voltages
pub const VBUS_AVG: [Register<U16>; 4] = per_channel!(
    U16,
    ["VBUS1_AVG" @ 0x0f, "VBUS2_AVG" @ 0x10, "VBUS3_AVG" @ 0x11, "VBUS4_AVG" @ 0x12]
);
/// Rolling average sense voltages
pub const VSENSE_AVG: [Register<U16>; 4] = per_channel!(
    U16,
    ["VSENSE1_AVG" @ 0x13, "VSENSE2_AVG" @ 0x14, "VSENSE3_AVG" @ 0x15, "VSENSE4_AVG" @ 0x16]
);
/// Power
pub const VPOWER: [Register<U32>; 4] =
    per_channel!(U32, ["VPOWER1" @ 0x17, "VPOWER2" @ 0x18, "VPOWER3" @ 0x19, "VPOWER4" @ 0x1a]);
/// SMBus settings
pub const SMBUS_SETTINGS: Register<U8> = Register::new("SMBUS_SETTINGS", 0x1c);
/// Bipolar/full-scale-range configuration, 2 bits per channel for voltage and current
pub const NEG_PWR_FSR: Register<U16> = Register::new("NEG_PWR_FSR", 0x1d);
/// Refresh command that also resets the accumulators of every device on the bus
pub const REFRESH_G: Register<Void> = Register::new("REFRESH_G", 0x1e);
/// Refresh command that latches measurements without resetting the accumulators
pub const REFRESH_V: Register<Void> = Register::new("REFRESH_V", 0x1f);
/// SLOW pin status and control
pub const SLOW: Register<U8> = Register::new("SLOW", 0x20);
/// CTRL as currently in effect
pub const CTRL_ACT: Register<U16> = Register::new("CTRL_ACT", 0x21);
/// NEG_PWR_FSR as currently in effect
pub const NEG_PWR_FSR_ACT: Register<U16> = Register::new("NEG_PWR_FSR_ACT", 0x22);
/// CTRL as of the last refresh
pub const CTRL_LAT: Register<U16> = Register::new("CTRL_LAT", 0x23);
/// NEG_PWR_FSR as of the last refresh
pub const NEG_PWR_FSR_LAT: Register<U16> = Register::new("NEG_PWR_FSR_LAT", 0x24);
/// Accumulator configuration, 2 bits per channel
pub const ACCUM_CONFIG: Register<U8> = Register::new("ACCUM_CONFIG", 0x25);
/// Alert status
pub const ALERT_STATUS: Register<Bytes<3>> = Register::new("ALERT_STATUS", 0x26);
/// Alerts routed to the SLOW/ALERT1 pin
pub const SLOW_ALERT1: Register<Bytes<3>> = Register::new("SLOW_ALERT1", 0x27);
/// Alerts routed to the GPIO/ALERT2 pin
pub const GPIO_ALERT2: Register<Bytes<3>> = Register::new("GPIO_ALERT2", 0x28);
/// Accumulator and ACC_COUNT fullness alert limits
pub const ACC_FULLNESS_LIMITS: Register<U16> = Register::new("ACC_FULLNESS_LIMITS", 0x29);
/// Over-current limits
pub const OC_LIMIT: [Register<Bytes<2>>; 4] = per_channel!(
    Bytes<2>,
    ["OC_LIMIT1" @ 0x30, "OC_LIMIT2" @ 0x31, "OC_LIMIT3" @ 0x32, "OC_LIMIT4" @ 0x33]
);
/// Under-current limits
pub const UC_LIMIT: [Register<Bytes<2>>; 4] = per_channel!(
    Bytes<2>,
    ["UC_LIMIT1" @ 0x34, "UC_LIMIT2" @ 0x35, "UC_LIMIT3" @ 0x36, "UC_LIMIT4" @ 0x37]
);
/// Over-power limits
pub const OP_LIMIT: [Register<Bytes<3>>; 4] = per_channel!(
    Bytes<3>,
    ["OP_LIMIT1" @ 0x38, "OP_LIMIT2" @ 0x39, "OP_LIMIT3" @ 0x3a, "OP_LIMIT4" @ 0x3b]
);
/// Over-voltage limits
pub const OV_LIMIT: [Register<Bytes<2>>; 4] = per_channel!(
    Bytes<2>,
    ["OV_LIMIT1" @ 0x3c, "OV_LIMIT2" @ 0x3d, "OV_LIMIT3" @ 0x3e, "OV_LIMIT4" @ 0x3f]
);
/// Under-voltage limits
pub const UV_LIMIT: [Register<Bytes<2>>; 4] = per_channel!(
    Bytes<2>,
    ["UV_LIMIT1" @ 0x40, "UV_LIMIT2" @ 0x41, "UV_LIMIT3" @ 0x42, "UV_LIMIT4" @ 0x43]
);
/// Consecutive samples required to raise an over-current alert
pub const OC_LIMIT_NSAMPLES: Register<U8> = Register::new("OC_LIMIT_NSAMPLES", 0x44);
/// Consecutive samples required to raise an under-current alert
pub const UC_LIMIT_NSAMPLES: Register<U8> = Register::new("UC_LIMIT_NSAMPLES", 0x45);
/// Consecutive samples required to raise an over-power alert
pub const OP_LIMIT_NSAMPLES: Register<U8> = Register::new("OP_LIMIT_NSAMPLES", 0x46);
/// Consecutive samples required to raise an over-voltage alert
pub const OV_LIMIT_NSAMPLES: Register<U8> = Register::new("OV_LIMIT_NSAMPLES", 0x47);
/// Consecutive samples required to raise an under-voltage alert
pub const UV_LIMIT_NSAMPLES: Register<U8> = Register::new("UV_LIMIT_NSAMPLES", 0x48);
/// Alert enables
pub const ALERT_ENABLE: Register<Bytes<3>> = Register::new("ALERT_ENABLE", 0x49);
/// ACCUM_CONFIG as currently in effect
pub const ACCUM_CONFIG_ACT: Register<U8> = Register::new("ACCUM_CONFIG_ACT", 0x4a);
/// ACCUM_CONFIG as of the last refresh
pub const ACCUM_CONFIG_LAT: Register<U8> = Register::new("ACCUM_CONFIG_LAT", 0x4b);
/// Product ID
pub const PRODUCT_ID: Register<ProductIdCodec> = Register::new("PRODUCT_ID", 0xfd);
/// Manufacturer ID
pub const MANUFACTURER_ID: Register<U8> = Register::new("MANUFACTURER_ID", 0xfe);
/// Revision ID
pub const REVISION_ID: Register<U8> = Register::new("REVISION_ID", 0xff);

/// Every register on the chip, in address order.
pub static REGISTER_MAP: [RegisterInfo; 72] = [
    REFRESH.info(),
    CTRL.info(),
    ACC_COUNT.info(),
    VACC[0].info(),
    VACC[1].info(),
    VACC[2].info(),
    VACC[3].info(),
    VBUS[0].info(),
    VBUS[1].info(),
    VBUS[2].info(),
    VBUS[3].info(),
    VSENSE[0].info(),
    VSENSE[1].info(),
    VSENSE[2].info(),
    VSENSE[3].info(),
    VBUS_AVG[0].info(),
    VBUS_AVG[1].info(),
    VBUS_AVG[2].info(),
    VBUS_AVG[3].info(),
    VSENSE_AVG[0].info(),
    VSENSE_AVG[1].info(),
    VSENSE_AVG[2].info(),
    VSENSE_AVG[3].info(),
    VPOWER[0].info(),
    VPOWER[1].info(),
    VPOWER[2].info(),
    VPOWER[3].info(),
    SMBUS_SETTINGS.info(),
    NEG_PWR_FSR.info(),
    REFRESH_G.info(),
    REFRESH_V.info(),
    SLOW.info(),
    CTRL_ACT.info(),
    NEG_PWR_FSR_ACT.info(),
    CTRL_LAT.info(),
    NEG_PWR_FSR_LAT.info(),
    ACCUM_CONFIG.info(),
    ALERT_STATUS.info(),
    SLOW_ALERT1.info(),
    GPIO_ALERT2.info(),
    ACC_FULLNESS_LIMITS.info(),
    OC_LIMIT[0].info(),
    OC_LIMIT[1].info(),
    OC_LIMIT[2].info(),
    OC_LIMIT[3].info(),
    UC_LIMIT[0].info(),
    UC_LIMIT[1].info(),
    UC_LIMIT[2].info(),
    UC_LIMIT[3].info(),
    OP_LIMIT[0].info(),
    OP_LIMIT[1].info(),
    OP_LIMIT[2].info(),
    OP_LIMIT[3].info(),
    OV_LIMIT[0].info(),
    OV_LIMIT[1].info(),
    OV_LIMIT[2].info(),
    OV_LIMIT[3].info(),
    UV_LIMIT[0].info(),
    UV_LIMIT[1].info(),
    UV_LIMIT[2].info(),
    UV_LIMIT[3].info(),
    OC_LIMIT_NSAMPLES.info(),
    UC_LIMIT_NSAMPLES.info(),
    OP_LIMIT_NSAMPLES.info(),
    OV_LIMIT_NSAMPLES.info(),
    UV_LIMIT_NSAMPLES.info(),
    ALERT_ENABLE.info(),
    ACCUM_CONFIG_ACT.info(),
    ACCUM_CONFIG_LAT.info(),
    PRODUCT_ID.info(),
    MANUFACTURER_ID.info(),
    REVISION_ID.info(),
];

/// Look up a register by address.
pub fn find(address: u8) -> Option<&'static RegisterInfo> {
    REGISTER_MAP.iter().find(|info| info.address == address)
}
