//! Link-layer protocol: frame layout helpers, the transaction state machine,
//! the transport seam and the public engine built on top of them.
pub mod framing;
pub mod machine;
pub mod mpipe;
pub mod transport;
