//! Fixed-width big-endian codecs for PAC194x/PAC195x register contents.
//!
//! Every codec has a fixed wire length. [`Codec::encode`] always produces
//! exactly [`Codec::LEN`] bytes and [`Codec::decode`] rejects any input of a
//! different length.

use byteorder::{BigEndian, ByteOrder};

use crate::ProductId;

/// The longest register on the chip (the 56-bit accumulators).
pub const MAX_WIRE_LEN: usize = 7;

const U56_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Errors raised while decoding register bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The bus returned a different number of bytes than the register holds.
    LengthMismatch {
        /// Wire length of the register
        expected: usize,
        /// Number of bytes received
        actual: usize,
    },
    /// The product ID register held a value no known part reports.
    UnknownProductId(u8),
}

/// The encoded form of a register value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Wire {
    bytes: [u8; MAX_WIRE_LEN],
    len: usize,
}

impl Wire {
    fn filled(len: usize, fill: impl FnOnce(&mut [u8])) -> Wire {
        let mut bytes = [0; MAX_WIRE_LEN];
        fill(&mut bytes[..len]);
        Wire { bytes, len }
    }

    /// The encoded bytes, most significant first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl core::ops::Deref for Wire {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Converts between a register value and its bytes on the wire.
pub trait Codec {
    /// The decoded value type.
    type Value: Copy;

    /// Number of bytes on the wire.
    const LEN: usize;

    /// Encodes `value` into exactly [`Self::LEN`] bytes.
    fn encode(value: Self::Value) -> Wire;

    /// Decodes a value, failing unless `data` is exactly [`Self::LEN`] bytes.
    fn decode(data: &[u8]) -> Result<Self::Value, Error>;
}

fn check_len(data: &[u8], expected: usize) -> Result<(), Error> {
    if data.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Zero-length codec for command registers (`REFRESH` and friends).
#[derive(Debug, Copy, Clone)]
pub struct Void;

/// One byte, unsigned.
#[derive(Debug, Copy, Clone)]
pub struct U8;

/// Two bytes, big-endian unsigned.
#[derive(Debug, Copy, Clone)]
pub struct U16;

/// Four bytes, big-endian unsigned.
#[derive(Debug, Copy, Clone)]
pub struct U32;

/// Seven bytes, big-endian unsigned, held in a `u64`.
///
/// Encoding drops the most significant byte of the `u64`, so only values
/// below 2^56 survive a round trip. Decoded values always have a zero top
/// byte.
#[derive(Debug, Copy, Clone)]
pub struct U56;

/// The one-byte product identifier.
#[derive(Debug, Copy, Clone)]
pub struct ProductIdCodec;

/// Opaque bytes, for registers the driver does not interpret (alert
/// configuration and limit registers).
///
/// `N` may not exceed [`MAX_WIRE_LEN`]; a longer codec fails to compile as
/// soon as it is used:
///
/// ```compile_fail
/// use pac194x5x::codec::{Bytes, Codec};
/// let _ = <Bytes<8> as Codec>::LEN;
/// ```
#[derive(Debug, Copy, Clone)]
pub struct Bytes<const N: usize>;

impl Codec for Void {
    type Value = ();
    const LEN: usize = 0;

    fn encode(_value: ()) -> Wire {
        Wire::filled(0, |_| {})
    }

    fn decode(data: &[u8]) -> Result<(), Error> {
        check_len(data, Self::LEN)
    }
}

impl Codec for U8 {
    type Value = u8;
    const LEN: usize = 1;

    fn encode(value: u8) -> Wire {
        Wire::filled(Self::LEN, |buf| buf[0] = value)
    }

    fn decode(data: &[u8]) -> Result<u8, Error> {
        check_len(data, Self::LEN)?;
        Ok(data[0])
    }
}

impl Codec for U16 {
    type Value = u16;
    const LEN: usize = 2;

    fn encode(value: u16) -> Wire {
        Wire::filled(Self::LEN, |buf| BigEndian::write_u16(buf, value))
    }

    fn decode(data: &[u8]) -> Result<u16, Error> {
        check_len(data, Self::LEN)?;
        Ok(BigEndian::read_u16(data))
    }
}

impl Codec for U32 {
    type Value = u32;
    const LEN: usize = 4;

    fn encode(value: u32) -> Wire {
        Wire::filled(Self::LEN, |buf| BigEndian::write_u32(buf, value))
    }

    fn decode(data: &[u8]) -> Result<u32, Error> {
        check_len(data, Self::LEN)?;
        Ok(BigEndian::read_u32(data))
    }
}

impl Codec for U56 {
    type Value = u64;
    const LEN: usize = 7;

    fn encode(value: u64) -> Wire {
        Wire::filled(Self::LEN, |buf| {
            BigEndian::write_uint(buf, value & U56_MASK, Self::LEN)
        })
    }

    fn decode(data: &[u8]) -> Result<u64, Error> {
        check_len(data, Self::LEN)?;
        Ok(BigEndian::read_uint(data, Self::LEN))
    }
}

impl Codec for ProductIdCodec {
    type Value = ProductId;
    const LEN: usize = 1;

    fn encode(value: ProductId) -> Wire {
        U8::encode(value.into())
    }

    fn decode(data: &[u8]) -> Result<ProductId, Error> {
        let raw = U8::decode(data)?;
        ProductId::try_from(raw).map_err(Error::UnknownProductId)
    }
}

impl<const N: usize> Codec for Bytes<N> {
    type Value = [u8; N];
    const LEN: usize = {
        assert!(N <= MAX_WIRE_LEN, "register longer than the longest on the chip");
        N
    };

    fn encode(value: [u8; N]) -> Wire {
        Wire::filled(Self::LEN, |buf| buf.copy_from_slice(&value))
    }

    fn decode(data: &[u8]) -> Result<[u8; N], Error> {
        check_len(data, Self::LEN)?;
        let mut value = [0; N];
        value.copy_from_slice(data);
        Ok(value)
    }
}
