//! Register-level bus access.
//!
//! [`RegisterInterface`] is the only thing the driver needs from the bus: one
//! addressed read or one addressed write per call. [`I2cInterface`] provides
//! it on top of the `embedded-hal` blocking I²C traits.

use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::codec::MAX_WIRE_LEN;

/// Performs single addressed register transactions.
pub trait RegisterInterface {
    /// Error raised by the bus.
    type Error;

    /// Read `buffer.len()` bytes starting at register `address`.
    ///
    /// Returns how many bytes were actually received.
    fn read_register(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write `data` to register `address`. An empty `data` sends just the
    /// address byte, which is how command registers are triggered.
    fn write_register(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T> RegisterInterface for &mut T
where
    T: RegisterInterface + ?Sized,
{
    type Error = T::Error;

    fn read_register(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Self::Error> {
        T::read_register(self, address, buffer)
    }

    fn write_register(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        T::write_register(self, address, data)
    }
}

/// A PAC194x/PAC195x on an I²C bus.
pub struct I2cInterface<I> {
    i2c: I,
    bus_address: u8,
}

impl<I> I2cInterface<I> {
    /// Wrap an I²C bus. `bus_address` is the chip's 7-bit address, as set by
    /// the resistor on its ADDRSEL pin.
    pub fn new(i2c: I, bus_address: u8) -> I2cInterface<I> {
        I2cInterface { i2c, bus_address }
    }

    /// The chip's 7-bit bus address.
    pub fn bus_address(&self) -> u8 {
        self.bus_address
    }

    /// Give back the I²C bus.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I, E> RegisterInterface for I2cInterface<I>
where
    I: Write<Error = E> + WriteRead<Error = E>,
{
    type Error = E;

    fn read_register(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, E> {
        self.i2c.write_read(self.bus_address, &[address], buffer)?;
        Ok(buffer.len())
    }

    /// # Panics
    ///
    /// Panics if `data` is longer than the longest register on the chip.
    fn write_register(&mut self, address: u8, data: &[u8]) -> Result<(), E> {
        let mut frame = [0u8; MAX_WIRE_LEN + 1];
        frame[0] = address;
        frame[1..=data.len()].copy_from_slice(data);
        self.i2c.write(self.bus_address, &frame[..=data.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Op {
        Write(u8, Vec<u8>),
        WriteRead(u8, Vec<u8>, usize),
    }

    #[derive(Default)]
    struct MockI2c {
        ops: Vec<Op>,
        response: Vec<u8>,
        fail: bool,
    }

    impl Write for MockI2c {
        type Error = ();

        fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.ops.push(Op::Write(address, bytes.to_vec()));
            Ok(())
        }
    }

    impl WriteRead for MockI2c {
        type Error = ();

        fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.ops
                .push(Op::WriteRead(address, bytes.to_vec(), buffer.len()));
            buffer.copy_from_slice(&self.response[..buffer.len()]);
            Ok(())
        }
    }

    #[test]
    fn read_sends_register_address_then_reads() {
        let mut iface = I2cInterface::new(
            MockI2c {
                response: vec![0x12, 0x34],
                ..Default::default()
            },
            0x10,
        );
        let mut buf = [0; 2];
        assert_eq!(iface.read_register(0x07, &mut buf), Ok(2));
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(
            iface.release().ops,
            vec![Op::WriteRead(0x10, vec![0x07], 2)]
        );
    }

    #[test]
    fn write_prefixes_register_address() {
        let mut iface = I2cInterface::new(MockI2c::default(), 0x1f);
        iface.write_register(0x01, &[0xAB, 0xCD]).unwrap();
        iface.write_register(0x1e, &[]).unwrap();
        assert_eq!(iface.bus_address(), 0x1f);
        assert_eq!(
            iface.release().ops,
            vec![
                Op::Write(0x1f, vec![0x01, 0xAB, 0xCD]),
                Op::Write(0x1f, vec![0x1e]),
            ]
        );
    }

    #[test]
    fn bus_errors_pass_through() {
        let mut iface = I2cInterface::new(
            MockI2c {
                fail: true,
                ..Default::default()
            },
            0x10,
        );
        assert_eq!(iface.read_register(0x00, &mut [0; 1]), Err(()));
        assert_eq!(iface.write_register(0x00, &[]), Err(()));
    }
}
