//! Abstraction traits used by the pipe (serial/DMA adapter, low-power wait).
pub mod mcu_sleep;
pub mod transport_adapter;
