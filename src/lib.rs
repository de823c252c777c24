//! # PAC194x/PAC195x Driver
//!
//! This is a driver for the Microchip PAC194x and PAC195x families of
//! multi-channel power and energy monitors.
//!
//! The driver talks to the chip's registers over I²C and converts the raw
//! register contents into volts, milliamps, watts and microwatt-hours, using
//! the bipolar/full-scale-range configuration latched inside the chip and the
//! sense resistor and voltage divider values you supply.
//!
//! Every channel has:
//!
//! * A bus voltage measurement (instantaneous and rolling average)
//! * A sense voltage measurement across the shunt resistor (instantaneous and
//!   rolling average), from which current is derived
//! * A power measurement
//! * A 56-bit accumulator, which sums power, sense voltage or bus voltage
//!   samples, from which energy is derived
//!
//! The chip only updates its readable measurement registers when it is sent
//! a refresh command. The [`Pac194x5x`] object therefore caches register
//! contents, and the cache is thrown away every time you call
//! [`Pac194x5x::refresh`], [`Pac194x5x::refresh_g`] or
//! [`Pac194x5x::refresh_v`].
//!
//! # Example
//!
//! You might read the chip like this:
//!
//! ```rust,no_run
//! # use embedded_hal::blocking::{delay::DelayMs, i2c};
//! # struct I2c;
//! # impl i2c::Write for I2c {
//! #     type Error = ();
//! #     fn write(&mut self, _address: u8, _bytes: &[u8]) -> Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! # impl i2c::WriteRead for I2c {
//! #     type Error = ();
//! #     fn write_read(&mut self, _address: u8, _bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
//! #         buffer.fill(0);
//! #         buffer[0] = 104;
//! #         Ok(())
//! #     }
//! # }
//! # struct Delay;
//! # impl DelayMs<u32> for Delay {
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//! # let i2c = I2c;
//! # let mut delay = Delay;
//! let config = pac194x5x::Config {
//!     r_sense: [0.004; 4],
//!     ..Default::default()
//! };
//! let mut monitor = match pac194x5x::Pac194x5x::new_i2c(i2c, 0x10, config) {
//!     Ok(monitor) => monitor,
//!     Err(_e) => return, // Chip didn't respond, or isn't a PAC194x/5x
//! };
//! if let Err(_e) = monitor.refresh_v(&mut delay) {
//!     // Chip didn't respond
//! }
//! for channel in 0..monitor.channels() {
//!     let volts = monitor.vbus(channel);
//!     let milliamps = monitor.current(channel);
//!     let watts = monitor.power(channel);
//!     let microwatt_hours = monitor.energy(channel);
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]

#[macro_use]
mod logging;

pub mod cache;
pub mod codec;
mod device;
mod error;
pub mod interface;
pub mod register;
pub mod telemetry;

pub use device::{Config, Pac194x5x, DEFAULT_REFRESH_DELAY_MS, MAX_CHANNELS};
pub use error::Error;
pub use interface::{I2cInterface, RegisterInterface};
pub use telemetry::{AccumMode, Generation, Range, SampleMode};

//
// Public Types
//

/// The parts this driver knows about, as reported by the PRODUCT_ID
/// register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProductId {
    /// Single channel, 9 V
    Pac1941 = 104,
    /// Dual channel, 9 V
    Pac1942_1 = 105,
    /// Triple channel, 9 V
    Pac1943 = 106,
    /// Quad channel, 9 V
    Pac1944 = 107,
    /// Single channel, 9 V, alternate pinout
    Pac1941_2 = 108,
    /// Dual channel, 9 V, alternate pinout
    Pac1942_2 = 109,
    /// Single channel, 32 V
    Pac1951 = 120,
    /// Dual channel, 32 V
    Pac1952_1 = 121,
    /// Triple channel, 32 V
    Pac1953 = 122,
    /// Quad channel, 32 V
    Pac1954 = 123,
    /// Single channel, 32 V, alternate pinout
    Pac1951_2 = 124,
    /// Dual channel, 32 V, alternate pinout
    Pac1952_2 = 125,
}

/// The unit of an accumulator reading.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    /// The accumulator is configured with the reserved mode.
    Unknown,
    /// Bus voltage samples, in volts.
    Volts,
    /// Sense voltage samples, in millivolts.
    Millivolts,
    /// Power samples, in watts.
    Watts,
}

//
// impls on Public Types
//

impl ProductId {
    /// How many measurement channels this part has.
    pub fn channel_count(self) -> usize {
        match self {
            ProductId::Pac1941 | ProductId::Pac1941_2 => 1,
            ProductId::Pac1951 | ProductId::Pac1951_2 => 1,
            ProductId::Pac1942_1 | ProductId::Pac1942_2 => 2,
            ProductId::Pac1952_1 | ProductId::Pac1952_2 => 2,
            ProductId::Pac1943 | ProductId::Pac1953 => 3,
            ProductId::Pac1944 | ProductId::Pac1954 => 4,
        }
    }

    /// Which chip generation this part belongs to.
    pub fn generation(self) -> Generation {
        if u8::from(self) >= ProductId::Pac1951 as u8 {
            Generation::Pac195x
        } else {
            Generation::Pac194x
        }
    }

    /// True for the 32 V, higher resolution PAC195x parts.
    pub fn is_high_resolution(self) -> bool {
        self.generation() == Generation::Pac195x
    }
}

impl From<ProductId> for u8 {
    fn from(id: ProductId) -> u8 {
        id as u8
    }
}

impl TryFrom<u8> for ProductId {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            104 => Ok(ProductId::Pac1941),
            105 => Ok(ProductId::Pac1942_1),
            106 => Ok(ProductId::Pac1943),
            107 => Ok(ProductId::Pac1944),
            108 => Ok(ProductId::Pac1941_2),
            109 => Ok(ProductId::Pac1942_2),
            120 => Ok(ProductId::Pac1951),
            121 => Ok(ProductId::Pac1952_1),
            122 => Ok(ProductId::Pac1953),
            123 => Ok(ProductId::Pac1954),
            124 => Ok(ProductId::Pac1951_2),
            125 => Ok(ProductId::Pac1952_2),
            _ => Err(raw),
        }
    }
}


//
// End of file
//
