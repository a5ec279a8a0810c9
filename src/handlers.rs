use std::{error::Error, path::Path};

use sja1105::device::{
    SJA1105PR_DEVICE_ID, SJA1105QS_DEVICE_ID, SJA1105R_PART_NR, SJA1105S_PART_NR,
    SJA1105_PART_NR_DONT_CARE,
};
use sja1105::static_config::seal_for_upload;
use sja1105::tables::{BlockIndex, PhyRole, XmiiMode, NUM_PORTS};
use sja1105::{default_config, StaticConfig, Variant};
use tracing::{debug, info, warn};

/// Part number to assume when the user gave none: the superset R or S for the second generation
fn default_part_nr(buf: &[u8]) -> u64 {
    let device_id = match buf.get(..4) {
        Some(&[a, b, c, d]) => u64::from(u32::from_be_bytes([a, b, c, d])),
        _ => return SJA1105_PART_NR_DONT_CARE,
    };
    match device_id {
        SJA1105PR_DEVICE_ID => SJA1105R_PART_NR,
        SJA1105QS_DEVICE_ID => SJA1105S_PART_NR,
        _ => SJA1105_PART_NR_DONT_CARE,
    }
}

async fn load(path: &Path, part_nr: Option<u64>) -> Result<StaticConfig, Box<dyn Error>> {
    let buf = tokio::fs::read(path).await?;
    let part_nr = part_nr.unwrap_or_else(|| default_part_nr(&buf));
    debug!(path = %path.display(), len = buf.len(), part_nr, "Parsing static config");
    let raw = StaticConfig::parse_raw(&buf, part_nr)?;
    Ok(raw.resolve())
}

pub(crate) async fn generate(variant: Variant, out: &Path, upstream: usize) -> Result<(), Box<dyn Error>> {
    let config = default_config(variant, upstream, [(XmiiMode::Rgmii, PhyRole::Mac); NUM_PORTS])?;
    config.check_valid()?;
    let mut blob = config.pack()?;
    seal_for_upload(&mut blob);
    tokio::fs::write(out, &blob).await?;
    info!(%variant, len = blob.len(), path = %out.display(), "Wrote static config");
    Ok(())
}

pub(crate) async fn check(path: &Path, part_nr: Option<u64>) -> Result<(), Box<dyn Error>> {
    let config = load(path, part_nr).await?;
    match config.check_valid() {
        Ok(()) => {
            println!("{}: valid static config for {}", path.display(), config.variant());
            Ok(())
        }
        Err(e) => {
            warn!(%e, "Static config failed validation");
            Err(e.into())
        }
    }
}

pub(crate) async fn dump(path: &Path, part_nr: Option<u64>) -> Result<(), Box<dyn Error>> {
    let config = load(path, part_nr).await?;
    println!("Device ID: {:#010x} ({})", config.device_id(), config.variant());
    for block in BlockIndex::ALL {
        let table = config.tables.get(block);
        let count = table.entry_count();
        if count == 0 {
            continue;
        }
        println!("{block}: {count} entries");
        let mut buf = vec![0u8; table.packed_entry_size()];
        for index in 0..count {
            buf.fill(0);
            table.pack_entry(index, &mut buf)?;
            println!("  [{index}] {}", hex::encode(&buf));
            if let Some(entry) = table.entry_debug(index) {
                println!("        {entry:?}");
            }
        }
    }
    Ok(())
}
