//! Chip identity: device ids, part numbers and the six switch variants

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const SJA1105E_DEVICE_ID: u64 = 0x9C00_000C;
pub const SJA1105T_DEVICE_ID: u64 = 0x9E00_030E;
pub const SJA1105PR_DEVICE_ID: u64 = 0xAF00_030E;
pub const SJA1105QS_DEVICE_ID: u64 = 0xAE00_030E;
pub const SJA1105_NO_DEVICE_ID: u64 = 0;

pub const SJA1105P_PART_NR: u64 = 0x9A84;
pub const SJA1105Q_PART_NR: u64 = 0x9A85;
pub const SJA1105R_PART_NR: u64 = 0x9A86;
pub const SJA1105S_PART_NR: u64 = 0x9A87;
/// Part number to use with E/T, or when a P/R or Q/S distinction does not matter
pub const SJA1105_PART_NR_DONT_CARE: u64 = 0xFFFF;

/// Register layout family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// First generation: SJA1105E and SJA1105T
    Et,
    /// Second generation: SJA1105P, Q, R and S
    Pqrs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    E,
    T,
    P,
    Q,
    R,
    S,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unrecognized switch identity: device id {device_id:#010x}, part number {part_nr:#06x}")]
pub struct InitError {
    pub device_id: u64,
    pub part_nr: u64,
}

impl Variant {
    pub const ALL: [Variant; 6] = [
        Variant::E,
        Variant::T,
        Variant::P,
        Variant::Q,
        Variant::R,
        Variant::S,
    ];

    /// E and T are told apart by device id alone, the others also need the part number
    pub fn from_ids(device_id: u64, part_nr: u64) -> Result<Self, InitError> {
        match (device_id, part_nr) {
            (SJA1105E_DEVICE_ID, _) => Ok(Variant::E),
            (SJA1105T_DEVICE_ID, _) => Ok(Variant::T),
            (SJA1105PR_DEVICE_ID, SJA1105P_PART_NR) => Ok(Variant::P),
            (SJA1105QS_DEVICE_ID, SJA1105Q_PART_NR) => Ok(Variant::Q),
            (SJA1105PR_DEVICE_ID, SJA1105R_PART_NR) => Ok(Variant::R),
            (SJA1105QS_DEVICE_ID, SJA1105S_PART_NR) => Ok(Variant::S),
            _ => Err(InitError { device_id, part_nr }),
        }
    }

    pub fn device_id(self) -> u64 {
        match self {
            Variant::E => SJA1105E_DEVICE_ID,
            Variant::T => SJA1105T_DEVICE_ID,
            Variant::P | Variant::R => SJA1105PR_DEVICE_ID,
            Variant::Q | Variant::S => SJA1105QS_DEVICE_ID,
        }
    }

    pub fn part_nr(self) -> u64 {
        match self {
            Variant::E | Variant::T => SJA1105_PART_NR_DONT_CARE,
            Variant::P => SJA1105P_PART_NR,
            Variant::Q => SJA1105Q_PART_NR,
            Variant::R => SJA1105R_PART_NR,
            Variant::S => SJA1105S_PART_NR,
        }
    }

    pub fn generation(self) -> Generation {
        match self {
            Variant::E | Variant::T => Generation::Et,
            _ => Generation::Pqrs,
        }
    }

    pub fn supports_ttethernet(self) -> bool {
        matches!(self, Variant::T | Variant::Q | Variant::S)
    }

    pub fn has_sgmii(self) -> bool {
        matches!(self, Variant::R | Variant::S)
    }

    pub fn name(self) -> &'static str {
        match self {
            Variant::E => "SJA1105E",
            Variant::T => "SJA1105T",
            Variant::P => "SJA1105P",
            Variant::Q => "SJA1105Q",
            Variant::R => "SJA1105R",
            Variant::S => "SJA1105S",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown switch variant {0:?}, expected one of E, T, P, Q, R, S")]
pub struct ParseVariantError(String);

impl FromStr for Variant {
    type Err = ParseVariantError;

    /// Accepts the bare letter or the full part name, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let letter = upper.strip_prefix("SJA1105").unwrap_or(&upper);
        match letter {
            "E" => Ok(Variant::E),
            "T" => Ok(Variant::T),
            "P" => Ok(Variant::P),
            "Q" => Ok(Variant::Q),
            "R" => Ok(Variant::R),
            "S" => Ok(Variant::S),
            _ => Err(ParseVariantError(s.to_owned())),
        }
    }
}

/// Whether `device_id` belongs to any SJA1105 family member
pub fn device_id_valid(device_id: u64) -> bool {
    matches!(
        device_id,
        SJA1105E_DEVICE_ID | SJA1105T_DEVICE_ID | SJA1105PR_DEVICE_ID | SJA1105QS_DEVICE_ID
    )
}

/// Human readable chip name, falling back to the ambiguous pair when the part number does
/// not settle it
pub fn device_id_string(device_id: u64, part_nr: u64) -> &'static str {
    if let Ok(variant) = Variant::from_ids(device_id, part_nr) {
        return variant.name();
    }
    match device_id {
        SJA1105PR_DEVICE_ID => "SJA1105P or SJA1105R",
        SJA1105QS_DEVICE_ID => "SJA1105Q or SJA1105S",
        _ => "None",
    }
}
