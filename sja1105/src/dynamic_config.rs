//! Runtime access to single table entries
//!
//! A subset of the tables can be read, rewritten or have entries deleted while the switch is
//! running. Each of them sits behind a register window holding the packed entry followed by
//! (or sharing a word with) a command word. Setting `valid` in the command triggers the
//! operation; the switch clears it once done.
//!
//! Some tables take the index of the command from a field of the entry itself. Their
//! [`CmdLayout`] says so with [`IndexField::Entry`].

use std::io;

use bitflags::bitflags;
use thiserror::Error;
use tracing::{debug, trace};

use crate::crc::crc8;
use crate::device::Generation;
use crate::packing::{field, PackingOp};
use crate::spi::{send_packed_buf, SpiOp, SpiTransport};
use crate::tables::*;

pub const SIZE_DYN_CMD: usize = 4;

/// Polls of the command word before a read is considered stuck
const READ_RETRIES: usize = 3;

bitflags! {
    /// Operations a table allows at runtime
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Access: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const DELETE = 1 << 2;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DynCmd {
    pub valid: u64,
    pub rdwrset: u64,
    pub errors: u64,
    pub valident: u64,
    pub index: u64,
}

/// Placement of the index of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexField {
    /// Single-entry table
    None,
    /// Bit range in the command word
    Command(usize, usize),
    /// Bit range in the packed entry preceding the command word
    Entry(usize, usize),
}

/// Bit positions of the command fields; `None` for fields a table does not have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdLayout {
    /// Byte offset of the command word in the register window
    pub offset: usize,
    pub valid: Option<usize>,
    pub errors: Option<usize>,
    pub rdwrset: Option<usize>,
    pub valident: Option<usize>,
    pub index: IndexField,
}

impl CmdLayout {
    pub fn packing(&self, buf: &mut [u8], cmd: &mut DynCmd, op: PackingOp) {
        let (entry, rest) = buf.split_at_mut(self.offset);
        let word = &mut rest[..SIZE_DYN_CMD];
        for (bit, value) in [
            (self.valid, &mut cmd.valid),
            (self.errors, &mut cmd.errors),
            (self.rdwrset, &mut cmd.rdwrset),
            (self.valident, &mut cmd.valident),
        ] {
            if let Some(bit) = bit {
                field(word, value, bit, bit, op);
            }
        }
        match self.index {
            IndexField::None => {}
            IndexField::Command(start, end) => field(word, &mut cmd.index, start, end, op),
            IndexField::Entry(start, end) => field(entry, &mut cmd.index, start, end, op),
        }
    }
}

/// How one table is reached at runtime on one generation
pub struct DynamicOps<E> {
    pub entry_packing: EntryPacking<E>,
    pub cmd: CmdLayout,
    pub access: Access,
    pub max_entry_count: usize,
    /// Size of the register window: entry plus command
    pub packed_size: usize,
    /// SPI word address of the window
    pub address: u64,
}

impl<E: TableEntry> DynamicOps<E> {
    fn check(&self, index: usize, access: Access) -> Result<(), DynamicError> {
        if index >= self.max_entry_count {
            return Err(DynamicError::OutOfRange {
                block: E::BLOCK,
                index,
                max: self.max_entry_count,
            });
        }
        if !self.access.contains(access) {
            return Err(DynamicError::Unsupported {
                block: E::BLOCK,
                access,
            });
        }
        Ok(())
    }
}

/// Entry types whose table can be accessed at runtime
pub trait DynamicEntry: TableEntry {
    fn dynamic_ops(generation: Generation) -> &'static DynamicOps<Self>;
}

#[derive(Error, Debug)]
pub enum DynamicError {
    #[error("{block} does not allow {access:?} at runtime")]
    Unsupported { block: BlockIndex, access: Access },
    #[error("index {index} is out of range for {block} ({max} entries)")]
    OutOfRange {
        block: BlockIndex,
        index: usize,
        max: usize,
    },
    #[error("{block} entry {index} is not valid")]
    InvalidEntry { block: BlockIndex, index: usize },
    #[error("timed out waiting for the switch to complete the {block} command on entry {index}")]
    Timeout { block: BlockIndex, index: usize },
    #[error("switch rejected the {block} command on entry {index}")]
    Hardware { block: BlockIndex, index: usize },
    #[error(transparent)]
    Transport(#[from] io::Error),
}

/// Reads entry `index` of the table of `E`
///
/// With `entry` left out, this only checks that the entry exists.
pub async fn read<E: DynamicEntry, T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    index: usize,
    entry: Option<&mut E>,
) -> Result<(), DynamicError> {
    let ops = E::dynamic_ops(generation);
    ops.check(index, Access::READ)?;

    let mut buf = vec![0u8; ops.packed_size];
    let mut cmd = DynCmd {
        valid: 1,
        rdwrset: SpiOp::Read as u64,
        index: index as u64,
        ..Default::default()
    };
    ops.cmd.packing(&mut buf, &mut cmd, PackingOp::Pack);
    send_packed_buf(spi, SpiOp::Write, ops.address, &mut buf).await?;

    for attempt in 1..=READ_RETRIES {
        buf.fill(0);
        send_packed_buf(spi, SpiOp::Read, ops.address, &mut buf).await?;
        let mut cmd = DynCmd::default();
        ops.cmd.packing(&mut buf, &mut cmd, PackingOp::Unpack);
        if ops.cmd.valident.is_some() && cmd.valident == 0 {
            return Err(DynamicError::InvalidEntry {
                block: E::BLOCK,
                index,
            });
        }
        if cmd.valid == 0 {
            if let Some(entry) = entry {
                (ops.entry_packing)(&mut buf, entry, PackingOp::Unpack);
            }
            trace!(block = %E::BLOCK, index, "Dynamic read complete");
            return Ok(());
        }
        debug!(block = %E::BLOCK, index, attempt, "Dynamic read still pending");
    }
    Err(DynamicError::Timeout {
        block: E::BLOCK,
        index,
    })
}

/// Writes `entry` at `index`, or deletes the entry at `index` when `entry` is `None`
///
/// For tables that carry the index inside the entry, `index` overrides the entry's field.
pub async fn write<E: DynamicEntry, T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    index: usize,
    entry: Option<&E>,
) -> Result<(), DynamicError> {
    let ops = E::dynamic_ops(generation);
    ops.check(index, Access::WRITE)?;
    if entry.is_none() {
        ops.check(index, Access::DELETE)?;
    }

    let mut buf = vec![0u8; ops.packed_size];
    if let Some(entry) = entry {
        let mut entry = *entry;
        (ops.entry_packing)(&mut buf, &mut entry, PackingOp::Pack);
    }
    let mut cmd = DynCmd {
        valid: 1,
        rdwrset: SpiOp::Write as u64,
        valident: u64::from(entry.is_some()),
        index: index as u64,
        ..Default::default()
    };
    ops.cmd.packing(&mut buf, &mut cmd, PackingOp::Pack);
    send_packed_buf(spi, SpiOp::Write, ops.address, &mut buf).await?;

    buf.fill(0);
    send_packed_buf(spi, SpiOp::Read, ops.address, &mut buf).await?;
    let mut cmd = DynCmd::default();
    ops.cmd.packing(&mut buf, &mut cmd, PackingOp::Unpack);
    if cmd.errors != 0 {
        return Err(DynamicError::Hardware {
            block: E::BLOCK,
            index,
        });
    }
    trace!(block = %E::BLOCK, index, keep = entry.is_some(), "Dynamic write complete");
    Ok(())
}

/// Bin of the FDB (L2 lookup table) that a MAC/VLAN pair hashes to on E/T
///
/// CRC-8, MSB first with a zero seed, over the 64-bit key `vid << 48 | mac`. `poly` is in the
/// Koopman notation stored in the L2 lookup parameters. With `shared_learn` all VLANs share
/// one set of bins.
pub fn fdb_hash(mac: u64, vid: u16, poly: u64, shared_learn: bool) -> u8 {
    let poly = (1 + (poly << 1)) as u8;
    let vlanid = if shared_learn { 0 } else { u64::from(vid) };
    let input = (vlanid << 48) | (mac & 0xFFFF_FFFF_FFFF);
    crc8(poly, &input.to_be_bytes())
}

/// E/T MAC window: the entry is split around the command in the second word
fn mac_config_entry_packing_et(buf: &mut [u8], entry: &mut MacConfigEntry, op: PackingOp) -> usize {
    let (reg2, reg1) = buf[..2 * SIZE_DYN_CMD].split_at_mut(SIZE_DYN_CMD);
    field(reg1, &mut entry.speed, 30, 29, op);
    field(reg1, &mut entry.drpdtag, 23, 23, op);
    field(reg1, &mut entry.drpuntag, 22, 22, op);
    field(reg1, &mut entry.retag, 21, 21, op);
    field(reg1, &mut entry.dyn_learn, 20, 20, op);
    field(reg1, &mut entry.egress, 19, 19, op);
    field(reg1, &mut entry.ingress, 18, 18, op);
    field(reg1, &mut entry.ing_mirr, 17, 17, op);
    field(reg1, &mut entry.egr_mirr, 16, 16, op);
    field(reg1, &mut entry.vlanprio, 14, 12, op);
    field(reg1, &mut entry.vlanid, 11, 0, op);
    field(reg2, &mut entry.tp_delin, 31, 16, op);
    field(reg2, &mut entry.tp_delout, 15, 0, op);
    2 * SIZE_DYN_CMD
}

/// E/T VL lookup window: only the mirroring bits, next to the command
fn vl_lookup_entry_packing_et(buf: &mut [u8], entry: &mut VlLookupEntry, op: PackingOp) -> usize {
    let buf = &mut buf[..SIZE_DYN_CMD];
    field(buf, &mut entry.egrmirr, 21, 17, op);
    field(buf, &mut entry.ingrmirr, 16, 16, op);
    SIZE_DYN_CMD
}

fn l2_lookup_params_entry_packing_dyn(
    buf: &mut [u8],
    entry: &mut L2LookupParamsEntry,
    op: PackingOp,
) -> usize {
    field(&mut buf[..SIZE_DYN_CMD], &mut entry.poly, 7, 0, op);
    SIZE_DYN_CMD
}

fn general_params_entry_packing_dyn(
    buf: &mut [u8],
    entry: &mut GeneralParamsEntry,
    op: PackingOp,
) -> usize {
    field(&mut buf[..SIZE_DYN_CMD], &mut entry.mirr_port, 2, 0, op);
    SIZE_DYN_CMD
}

const fn cmd_at(offset: usize) -> CmdLayout {
    CmdLayout {
        offset,
        valid: Some(31),
        errors: None,
        rdwrset: None,
        valident: None,
        index: IndexField::None,
    }
}

const VL_LOOKUP_CMD_ET: CmdLayout = CmdLayout {
    errors: Some(30),
    rdwrset: Some(29),
    index: IndexField::Command(9, 0),
    ..cmd_at(0)
};

const L2_LOOKUP_CMD_ET: CmdLayout = CmdLayout {
    rdwrset: Some(30),
    errors: Some(29),
    valident: Some(27),
    index: IndexField::Entry(29, 20),
    ..cmd_at(SIZE_L2_LOOKUP_ENTRY_ET)
};

/// The VLAN window has a one word gap between entry and command
const VLAN_LOOKUP_CMD: CmdLayout = CmdLayout {
    rdwrset: Some(30),
    valident: Some(27),
    index: IndexField::Entry(38, 27),
    ..cmd_at(SIZE_VLAN_LOOKUP_ENTRY + 4)
};

const L2_FORWARDING_CMD: CmdLayout = CmdLayout {
    errors: Some(30),
    rdwrset: Some(29),
    index: IndexField::Command(4, 0),
    ..cmd_at(SIZE_L2_FORWARDING_ENTRY)
};

const GENERAL_PARAMS_CMD: CmdLayout = CmdLayout {
    errors: Some(30),
    ..cmd_at(0)
};

const RETAGGING_CMD: CmdLayout = CmdLayout {
    errors: Some(30),
    valident: Some(29),
    rdwrset: Some(28),
    index: IndexField::Command(5, 0),
    ..cmd_at(SIZE_RETAGGING_ENTRY)
};

const VL_LOOKUP_ET: DynamicOps<VlLookupEntry> = DynamicOps {
    entry_packing: vl_lookup_entry_packing_et,
    cmd: VL_LOOKUP_CMD_ET,
    access: Access::WRITE,
    max_entry_count: MAX_VL_LOOKUP_COUNT,
    packed_size: SIZE_DYN_CMD,
    address: 0x35,
};

const VL_LOOKUP_PQRS: DynamicOps<VlLookupEntry> = DynamicOps {
    entry_packing: VlLookupEntry::packing,
    cmd: CmdLayout {
        offset: SIZE_VL_LOOKUP_ENTRY,
        ..VL_LOOKUP_CMD_ET
    },
    access: Access::READ.union(Access::WRITE),
    max_entry_count: MAX_VL_LOOKUP_COUNT,
    packed_size: SIZE_VL_LOOKUP_ENTRY + SIZE_DYN_CMD,
    address: 0x47,
};

const L2_LOOKUP_ET: DynamicOps<L2LookupEntry> = DynamicOps {
    entry_packing: L2LookupEntry::packing_et,
    cmd: L2_LOOKUP_CMD_ET,
    access: Access::all(),
    max_entry_count: MAX_L2_LOOKUP_COUNT,
    packed_size: SIZE_L2_LOOKUP_ENTRY_ET + SIZE_DYN_CMD,
    address: 0x20,
};

const L2_LOOKUP_PQRS: DynamicOps<L2LookupEntry> = DynamicOps {
    entry_packing: L2LookupEntry::packing_pqrs,
    cmd: CmdLayout {
        offset: SIZE_L2_LOOKUP_ENTRY_PQRS,
        index: IndexField::Entry(15, 6),
        ..L2_LOOKUP_CMD_ET
    },
    packed_size: SIZE_L2_LOOKUP_ENTRY_PQRS + SIZE_DYN_CMD,
    address: 0x24,
    ..L2_LOOKUP_ET
};

const VLAN_LOOKUP_ET: DynamicOps<VlanLookupEntry> = DynamicOps {
    entry_packing: VlanLookupEntry::packing,
    cmd: VLAN_LOOKUP_CMD,
    access: Access::WRITE.union(Access::DELETE),
    max_entry_count: MAX_VLAN_LOOKUP_COUNT,
    packed_size: SIZE_VLAN_LOOKUP_ENTRY + 4 + SIZE_DYN_CMD,
    address: 0x27,
};

const VLAN_LOOKUP_PQRS: DynamicOps<VlanLookupEntry> = DynamicOps {
    access: Access::all(),
    address: 0x2D,
    ..VLAN_LOOKUP_ET
};

const L2_FORWARDING_ET: DynamicOps<L2ForwardingEntry> = DynamicOps {
    entry_packing: L2ForwardingEntry::packing,
    cmd: L2_FORWARDING_CMD,
    access: Access::WRITE,
    max_entry_count: MAX_L2_FORWARDING_COUNT,
    packed_size: SIZE_L2_FORWARDING_ENTRY + SIZE_DYN_CMD,
    address: 0x24,
};

const L2_FORWARDING_PQRS: DynamicOps<L2ForwardingEntry> = DynamicOps {
    address: 0x2A,
    ..L2_FORWARDING_ET
};

const MAC_CONFIG_ET: DynamicOps<MacConfigEntry> = DynamicOps {
    entry_packing: mac_config_entry_packing_et,
    cmd: CmdLayout {
        index: IndexField::Command(26, 24),
        ..cmd_at(SIZE_DYN_CMD)
    },
    access: Access::WRITE,
    max_entry_count: MAX_MAC_CONFIG_COUNT,
    packed_size: 2 * SIZE_DYN_CMD,
    address: 0x36,
};

const MAC_CONFIG_PQRS: DynamicOps<MacConfigEntry> = DynamicOps {
    entry_packing: MacConfigEntry::packing_pqrs,
    cmd: CmdLayout {
        errors: Some(30),
        rdwrset: Some(29),
        index: IndexField::Command(2, 0),
        ..cmd_at(SIZE_MAC_CONFIG_ENTRY_PQRS)
    },
    access: Access::READ.union(Access::WRITE),
    max_entry_count: MAX_MAC_CONFIG_COUNT,
    packed_size: SIZE_MAC_CONFIG_ENTRY_PQRS + SIZE_DYN_CMD,
    address: 0x4B,
};

const L2_LOOKUP_PARAMS_ET: DynamicOps<L2LookupParamsEntry> = DynamicOps {
    entry_packing: l2_lookup_params_entry_packing_dyn,
    cmd: cmd_at(0),
    access: Access::WRITE,
    max_entry_count: MAX_L2_LOOKUP_PARAMS_COUNT,
    packed_size: SIZE_DYN_CMD,
    address: 0x38,
};

const L2_LOOKUP_PARAMS_PQRS: DynamicOps<L2LookupParamsEntry> = DynamicOps {
    access: Access::READ.union(Access::WRITE),
    ..L2_LOOKUP_PARAMS_ET
};

const GENERAL_PARAMS: DynamicOps<GeneralParamsEntry> = DynamicOps {
    entry_packing: general_params_entry_packing_dyn,
    cmd: GENERAL_PARAMS_CMD,
    access: Access::WRITE,
    max_entry_count: MAX_GENERAL_PARAMS_COUNT,
    packed_size: SIZE_DYN_CMD,
    address: 0x34,
};

const RETAGGING: DynamicOps<RetaggingEntry> = DynamicOps {
    entry_packing: RetaggingEntry::packing,
    cmd: RETAGGING_CMD,
    access: Access::WRITE.union(Access::DELETE),
    max_entry_count: MAX_RETAGGING_COUNT,
    packed_size: SIZE_RETAGGING_ENTRY + SIZE_DYN_CMD,
    address: 0x31,
};

macro_rules! dynamic_entries {
    ($($entry:ty => $et:ident, $pqrs:ident;)*) => {
        $(
            impl DynamicEntry for $entry {
                fn dynamic_ops(generation: Generation) -> &'static DynamicOps<Self> {
                    static ET: DynamicOps<$entry> = $et;
                    static PQRS: DynamicOps<$entry> = $pqrs;
                    match generation {
                        Generation::Et => &ET,
                        Generation::Pqrs => &PQRS,
                    }
                }
            }
        )*
    };
}

dynamic_entries! {
    VlLookupEntry => VL_LOOKUP_ET, VL_LOOKUP_PQRS;
    L2LookupEntry => L2_LOOKUP_ET, L2_LOOKUP_PQRS;
    VlanLookupEntry => VLAN_LOOKUP_ET, VLAN_LOOKUP_PQRS;
    L2ForwardingEntry => L2_FORWARDING_ET, L2_FORWARDING_PQRS;
    MacConfigEntry => MAC_CONFIG_ET, MAC_CONFIG_PQRS;
    L2LookupParamsEntry => L2_LOOKUP_PARAMS_ET, L2_LOOKUP_PARAMS_PQRS;
    GeneralParamsEntry => GENERAL_PARAMS, GENERAL_PARAMS;
    RetaggingEntry => RETAGGING, RETAGGING;
}
