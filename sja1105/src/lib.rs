//! Configuration codec and SPI control for the NXP SJA1105 family of automotive Ethernet
//! switches
//!
//! The switch boots without any configuration. A host packs a [`StaticConfig`] into the wire
//! format, uploads it over SPI with [`Switch::upload_static_config`] and afterwards adjusts
//! individual entries through the [`dynamic_config`] interface. [`Switch::load_static_config`]
//! also brings up the port clocks the config's xMII settings call for.

pub mod builder;
pub mod clocking;
pub mod crc;
pub mod device;
pub mod dynamic_config;
pub mod ops;
pub mod packing;
pub mod spi;
pub mod static_config;
pub mod switch;
pub mod tables;

#[cfg(test)]
mod emulator;

pub use builder::default_config;
pub use clocking::ClockingError;
pub use device::{Generation, InitError, Variant};
pub use dynamic_config::{DynamicEntry, DynamicError};
pub use spi::SpiTransport;
pub use static_config::{RawStaticConfig, StaticConfig, UnpackError, Validity};
pub use switch::{GeneralStatus, PortStatus, ResetCmd, Switch};
pub use tables::{BlockIndex, TableEntry, TableError};
