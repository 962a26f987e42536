//! Infrastructure shared by the protocol layer: the checksum codec.
pub mod checksum;
