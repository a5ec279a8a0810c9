use clap::{Parser, Subcommand};
use sja1105::Variant;
use std::{num::ParseIntError, path::PathBuf};

/// Accepts decimal or 0x-prefixed hex
fn parse_part_nr(s: &str) -> Result<u64, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Writes an upload-ready default static config for the given switch
    Generate {
        /// Switch variant (E, T, P, Q, R or S)
        variant: Variant,
        /// Where to write the packed config
        out: PathBuf,
        /// The port facing the host CPU
        #[clap(short, long, default_value_t = 4)]
        upstream: usize,
    },
    /// Parses a packed static config and runs the validator on it
    Check {
        path: PathBuf,
        /// Part number to tell P from R and Q from S (defaults to R/S)
        #[clap(long, value_parser = parse_part_nr)]
        part_nr: Option<u64>,
    },
    /// Prints every table of a packed static config
    Dump {
        path: PathBuf,
        /// Part number to tell P from R and Q from S (defaults to R/S)
        #[clap(long, value_parser = parse_part_nr)]
        part_nr: Option<u64>,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub(crate) struct Args {
    #[clap(subcommand)]
    pub(crate) command: Command,
    /// Print all log messages and debug information
    #[clap(short, long, global = true)]
    pub(crate) verbose: bool,
}
