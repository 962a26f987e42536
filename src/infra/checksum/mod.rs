//! Checksum codec: bytes in, 16-bit checksum out.
//!
//! Validation relies on the residue property of CRC-16/CCITT-FALSE
//! (`CRC_16_IBM_3740` in the `crc` catalog: poly 0x1021, init 0xFFFF, no
//! reflection, no final XOR): running the CRC over a block followed by its own
//! big-endian CRC yields zero.
use crc::{Crc, CRC_16_IBM_3740};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum primitive consumed by the framer and the state machine.
///
/// Implementations must be pure and must have the self-verifying property:
/// `checksum(data ++ checksum(data).to_be_bytes()) == 0`.
pub trait Checksum {
    /// Compute the checksum of `data`.
    fn checksum(&self, data: &[u8]) -> u16;

    /// Check a block that ends with its own big-endian checksum.
    fn verify(&self, data_with_checksum: &[u8]) -> bool {
        self.checksum(data_with_checksum) == 0
    }
}

/// CRC-16/CCITT-FALSE, the checksum used by the reference platform.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Crc16Ccitt;

impl Checksum for Crc16Ccitt {
    fn checksum(&self, data: &[u8]) -> u16 {
        CRC16.checksum(data)
    }
}
