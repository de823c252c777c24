use crate::codec;

/// Everything that can go wrong talking to a PAC194x/PAC195x.
///
/// `E` is the error type of the underlying bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus transaction failed.
    Bus(E),
    /// A register read returned the wrong number of bytes.
    LengthMismatch {
        /// Wire length of the register
        expected: usize,
        /// Number of bytes received
        actual: usize,
    },
    /// The channel index is not below the chip's channel count.
    InvalidChannel(usize),
    /// The PRODUCT_ID register held a value no known part reports.
    UnknownProductId(u8),
    /// The register at this address is a command, not something that can be
    /// read. Addressing it would trigger the command.
    NotReadable(u8),
}

impl<E> From<codec::Error> for Error<E> {
    fn from(e: codec::Error) -> Self {
        match e {
            codec::Error::LengthMismatch { expected, actual } => {
                Error::LengthMismatch { expected, actual }
            }
            codec::Error::UnknownProductId(raw) => Error::UnknownProductId(raw),
        }
    }
}
