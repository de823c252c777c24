//! Register caching.
//!
//! The chip only changes its measurement and latched registers when it is
//! sent a refresh command, so those registers can be read once and then
//! served from memory until the next refresh. A [`CacheRegister`] holds the
//! last value read from, or written to, one register.

use crate::codec::{Codec, MAX_WIRE_LEN};
use crate::register::Register;
use crate::{Error, RegisterInterface};

/// Anything whose cached contents can be thrown away.
pub trait Cached {
    /// True if the cached value can be returned without touching the bus.
    fn is_valid(&self) -> bool;

    /// Forget the cached value. The next read goes to the bus.
    fn invalidate(&mut self);
}

/// One register plus the last known good value of it.
///
/// A register created with `cacheable = false` never holds a value and every
/// read goes to the bus.
pub struct CacheRegister<C: Codec> {
    register: Register<C>,
    cacheable: bool,
    value: Option<C::Value>,
    valid: bool,
}

impl<C: Codec> CacheRegister<C> {
    /// Wrap `register`.
    pub const fn new(register: Register<C>, cacheable: bool) -> CacheRegister<C> {
        CacheRegister {
            register,
            cacheable,
            value: None,
            valid: false,
        }
    }

    /// The register this caches.
    pub fn register(&self) -> &Register<C> {
        &self.register
    }

    /// Whether reads and writes fill the cache.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Read the register, from the cache if possible.
    ///
    /// On any error the cache is left exactly as it was.
    pub fn read<I>(&mut self, iface: &mut I) -> Result<C::Value, Error<I::Error>>
    where
        I: RegisterInterface,
    {
        if self.valid {
            if let Some(value) = self.value {
                return Ok(value);
            }
        }

        let mut buffer = [0u8; MAX_WIRE_LEN];
        let buffer = &mut buffer[..C::LEN];
        let received = iface
            .read_register(self.register.address(), buffer)
            .map_err(Error::Bus)?;
        trace!(
            "Read {} (0x{:02x}), {} bytes",
            self.register.name(),
            self.register.address(),
            received
        );
        let value = match buffer.get(..received) {
            Some(data) => C::decode(data)?,
            None => {
                return Err(Error::LengthMismatch {
                    expected: C::LEN,
                    actual: received,
                })
            }
        };

        if self.cacheable {
            self.value = Some(value);
            self.valid = true;
        }
        Ok(value)
    }

    /// Write the register. On success a cacheable register also caches
    /// `value`, so reading it back costs no bus traffic.
    pub fn write<I>(&mut self, iface: &mut I, value: C::Value) -> Result<(), Error<I::Error>>
    where
        I: RegisterInterface,
    {
        let wire = C::encode(value);
        iface
            .write_register(self.register.address(), &wire)
            .map_err(Error::Bus)?;
        trace!(
            "Wrote {} (0x{:02x}), {} bytes",
            self.register.name(),
            self.register.address(),
            wire.len()
        );

        if self.cacheable {
            self.value = Some(value);
            self.valid = true;
        }
        Ok(())
    }
}

impl<C: Codec> Cached for CacheRegister<C> {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn invalidate(&mut self) {
        self.valid = false;
    }
}
