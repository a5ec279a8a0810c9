//! Typed static configuration tables and their packed sizes
//!
//! Each table is a `Table<E>` of one entry type. Which codec, packed size and capacity a
//! table has depends on the chip variant and is looked up once through a [`StaticOps`] set.

use std::fmt::{self, Debug};

use thiserror::Error;

use crate::packing::PackingOp;

pub mod header;
pub mod l2;
pub mod mac;
pub mod params;
pub mod schedule;
pub mod vl;

pub use header::TableHeader;
pub use l2::*;
pub use mac::*;
pub use params::*;
pub use schedule::*;
pub use vl::*;

pub const SIZE_SJA1105_DEVICE_ID: usize = 4;
pub const SIZE_TABLE_HEADER: usize = 12;
pub const SIZE_TABLE_CRC: usize = 4;
pub const SIZE_SCHEDULE_ENTRY: usize = 8;
pub const SIZE_SCHEDULE_ENTRY_POINTS_ENTRY: usize = 4;
pub const SIZE_VL_LOOKUP_ENTRY: usize = 12;
pub const SIZE_VL_POLICING_ENTRY: usize = 8;
pub const SIZE_VL_FORWARDING_ENTRY: usize = 4;
pub const SIZE_L2_LOOKUP_ENTRY_ET: usize = 12;
pub const SIZE_L2_LOOKUP_ENTRY_PQRS: usize = 20;
pub const SIZE_L2_POLICING_ENTRY: usize = 8;
pub const SIZE_VLAN_LOOKUP_ENTRY: usize = 8;
pub const SIZE_L2_FORWARDING_ENTRY: usize = 8;
pub const SIZE_MAC_CONFIG_ENTRY_ET: usize = 28;
pub const SIZE_MAC_CONFIG_ENTRY_PQRS: usize = 32;
pub const SIZE_SCHEDULE_PARAMS_ENTRY: usize = 12;
pub const SIZE_SCHEDULE_ENTRY_POINTS_PARAMS_ENTRY: usize = 4;
pub const SIZE_VL_FORWARDING_PARAMS_ENTRY: usize = 12;
pub const SIZE_L2_LOOKUP_PARAMS_ENTRY_ET: usize = 4;
pub const SIZE_L2_LOOKUP_PARAMS_ENTRY_PQRS: usize = 16;
pub const SIZE_L2_FORWARDING_PARAMS_ENTRY: usize = 12;
pub const SIZE_CLK_SYNC_PARAMS_ENTRY: usize = 52;
pub const SIZE_AVB_PARAMS_ENTRY_ET: usize = 12;
pub const SIZE_AVB_PARAMS_ENTRY_PQRS: usize = 16;
pub const SIZE_GENERAL_PARAMS_ENTRY_ET: usize = 40;
pub const SIZE_GENERAL_PARAMS_ENTRY_PQRS: usize = 44;
pub const SIZE_RETAGGING_ENTRY: usize = 8;
pub const SIZE_XMII_PARAMS_ENTRY: usize = 4;
pub const SIZE_SGMII_ENTRY: usize = 144;

pub const MAX_SCHEDULE_COUNT: usize = 1024;
pub const MAX_SCHEDULE_ENTRY_POINTS_COUNT: usize = 2048;
pub const MAX_VL_LOOKUP_COUNT: usize = 1024;
pub const MAX_VL_POLICING_COUNT: usize = 1024;
pub const MAX_VL_FORWARDING_COUNT: usize = 1024;
pub const MAX_L2_LOOKUP_COUNT: usize = 1024;
pub const MAX_L2_POLICING_COUNT: usize = 45;
pub const MAX_VLAN_LOOKUP_COUNT: usize = 4096;
pub const MAX_L2_FORWARDING_COUNT: usize = 13;
pub const MAX_MAC_CONFIG_COUNT: usize = 5;
pub const MAX_SCHEDULE_PARAMS_COUNT: usize = 1;
pub const MAX_SCHEDULE_ENTRY_POINTS_PARAMS_COUNT: usize = 1;
pub const MAX_VL_FORWARDING_PARAMS_COUNT: usize = 1;
pub const MAX_L2_LOOKUP_PARAMS_COUNT: usize = 1;
pub const MAX_L2_FORWARDING_PARAMS_COUNT: usize = 1;
pub const MAX_CLK_SYNC_COUNT: usize = 1;
pub const MAX_AVB_PARAMS_COUNT: usize = 1;
pub const MAX_GENERAL_PARAMS_COUNT: usize = 1;
pub const MAX_RETAGGING_COUNT: usize = 32;
pub const MAX_XMII_PARAMS_COUNT: usize = 1;
pub const MAX_SGMII_COUNT: usize = 1;

/// Frame memory in 128-byte blocks shared by all partitions
pub const MAX_FRAME_MEMORY: u64 = 929;
/// Frame memory left when the retagging table is in use
pub const MAX_FRAME_MEMORY_RETAGGING: u64 = 910;

pub const NUM_PORTS: usize = 5;
pub const NUM_TC: usize = 8;

/// Logical table identifier, in the order tables appear in a packed configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockIndex {
    Schedule,
    ScheduleEntryPoints,
    VlLookup,
    VlPolicing,
    VlForwarding,
    L2Lookup,
    L2Policing,
    VlanLookup,
    L2Forwarding,
    MacConfig,
    ScheduleParams,
    ScheduleEntryPointsParams,
    VlForwardingParams,
    L2LookupParams,
    L2ForwardingParams,
    ClkSyncParams,
    AvbParams,
    GeneralParams,
    Retagging,
    XmiiParams,
    Sgmii,
}

impl BlockIndex {
    pub const ALL: [BlockIndex; 21] = [
        BlockIndex::Schedule,
        BlockIndex::ScheduleEntryPoints,
        BlockIndex::VlLookup,
        BlockIndex::VlPolicing,
        BlockIndex::VlForwarding,
        BlockIndex::L2Lookup,
        BlockIndex::L2Policing,
        BlockIndex::VlanLookup,
        BlockIndex::L2Forwarding,
        BlockIndex::MacConfig,
        BlockIndex::ScheduleParams,
        BlockIndex::ScheduleEntryPointsParams,
        BlockIndex::VlForwardingParams,
        BlockIndex::L2LookupParams,
        BlockIndex::L2ForwardingParams,
        BlockIndex::ClkSyncParams,
        BlockIndex::AvbParams,
        BlockIndex::GeneralParams,
        BlockIndex::Retagging,
        BlockIndex::XmiiParams,
        BlockIndex::Sgmii,
    ];

    /// The on-wire block id
    pub fn block_id(self) -> u8 {
        match self {
            BlockIndex::Schedule => 0x00,
            BlockIndex::ScheduleEntryPoints => 0x01,
            BlockIndex::VlLookup => 0x02,
            BlockIndex::VlPolicing => 0x03,
            BlockIndex::VlForwarding => 0x04,
            BlockIndex::L2Lookup => 0x05,
            BlockIndex::L2Policing => 0x06,
            BlockIndex::VlanLookup => 0x07,
            BlockIndex::L2Forwarding => 0x08,
            BlockIndex::MacConfig => 0x09,
            BlockIndex::ScheduleParams => 0x0A,
            BlockIndex::ScheduleEntryPointsParams => 0x0B,
            BlockIndex::VlForwardingParams => 0x0C,
            BlockIndex::L2LookupParams => 0x0D,
            BlockIndex::L2ForwardingParams => 0x0E,
            BlockIndex::ClkSyncParams => 0x0F,
            BlockIndex::AvbParams => 0x10,
            BlockIndex::GeneralParams => 0x11,
            BlockIndex::Retagging => 0x12,
            BlockIndex::XmiiParams => 0x4E,
            BlockIndex::Sgmii => 0xC8,
        }
    }

    /// Maps an untrusted on-wire block id back to a table
    pub fn from_block_id(block_id: u64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|blk| u64::from(blk.block_id()) == block_id)
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockIndex::Schedule => "schedule-table",
            BlockIndex::ScheduleEntryPoints => "schedule-entry-points-table",
            BlockIndex::VlLookup => "vl-lookup-table",
            BlockIndex::VlPolicing => "vl-policing-table",
            BlockIndex::VlForwarding => "vl-forwarding-table",
            BlockIndex::L2Lookup => "l2-lookup-table",
            BlockIndex::L2Policing => "l2-policing-table",
            BlockIndex::VlanLookup => "vlan-lookup-table",
            BlockIndex::L2Forwarding => "l2-forwarding-table",
            BlockIndex::MacConfig => "mac-configuration-table",
            BlockIndex::ScheduleParams => "schedule-parameters-table",
            BlockIndex::ScheduleEntryPointsParams => "schedule-entry-points-parameters-table",
            BlockIndex::VlForwardingParams => "vl-forwarding-parameters-table",
            BlockIndex::L2LookupParams => "l2-lookup-parameters-table",
            BlockIndex::L2ForwardingParams => "l2-forwarding-parameters-table",
            BlockIndex::ClkSyncParams => "clock-synchronization-parameters-table",
            BlockIndex::AvbParams => "avb-parameters-table",
            BlockIndex::GeneralParams => "general-parameters-table",
            BlockIndex::Retagging => "retagging-table",
            BlockIndex::XmiiParams => "xmii-mode-parameters-table",
            BlockIndex::Sgmii => "sgmii-table",
        }
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packs or unpacks one entry at the start of `buf`, returning the packed entry size
///
/// The size is fixed per codec; callers already know it from [`TableOps`] and may ignore it.
pub type EntryPacking<E> = fn(&mut [u8], &mut E, PackingOp) -> usize;

/// How one table is laid out on a particular chip variant
pub struct TableOps<E> {
    pub packing: Option<EntryPacking<E>>,
    pub packed_entry_size: usize,
    pub max_entry_count: usize,
}

impl<E> TableOps<E> {
    /// A table the chip variant does not have
    pub const UNSUPPORTED: Self = TableOps {
        packing: None,
        packed_entry_size: 0,
        max_entry_count: 0,
    };

    pub const fn new(packing: EntryPacking<E>, packed_entry_size: usize, max_entry_count: usize) -> Self {
        TableOps {
            packing: Some(packing),
            packed_entry_size,
            max_entry_count,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.packing.is_some()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("{block} is full ({max} entries)")]
    CapacityExceeded { block: BlockIndex, max: usize },
    #[error("index {index} is out of range for {block} with {count} entries")]
    OutOfRange {
        block: BlockIndex,
        index: usize,
        count: usize,
    },
    #[error("{block} is not present on this chip")]
    Unsupported { block: BlockIndex },
    #[error("{block} entries are {needed} bytes, only {got} available")]
    ShortBuffer {
        block: BlockIndex,
        needed: usize,
        got: usize,
    },
}

/// A row type of one of the static configuration tables
pub trait TableEntry: Copy + Default + Debug + PartialEq + 'static {
    const BLOCK: BlockIndex;
    fn table(tables: &Tables) -> &Table<Self>;
    fn table_mut(tables: &mut Tables) -> &mut Table<Self>;
}

/// The entries of one table together with the layout they are packed with
pub struct Table<E: 'static> {
    ops: &'static TableOps<E>,
    entries: Vec<E>,
}

impl<E: TableEntry> Table<E> {
    pub(crate) fn new(ops: &'static TableOps<E>) -> Self {
        Table {
            ops,
            entries: Vec::new(),
        }
    }

    pub fn ops(&self) -> &'static TableOps<E> {
        self.ops
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [E] {
        &mut self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn codec(&self) -> Result<EntryPacking<E>, TableError> {
        self.ops
            .packing
            .ok_or(TableError::Unsupported { block: E::BLOCK })
    }

    fn check_capacity(&self) -> Result<(), TableError> {
        if self.entries.len() >= self.ops.max_entry_count {
            return Err(TableError::CapacityExceeded {
                block: E::BLOCK,
                max: self.ops.max_entry_count,
            });
        }
        Ok(())
    }

    /// Appends an already unpacked entry
    pub fn push(&mut self, entry: E) -> Result<(), TableError> {
        self.codec()?;
        self.check_capacity()?;
        self.entries.push(entry);
        Ok(())
    }

    /// Unpacks one entry from `buf` and appends it, returning the bytes consumed
    ///
    /// Fields the packed layout does not carry come out zeroed.
    pub fn add_entry(&mut self, buf: &[u8]) -> Result<usize, TableError> {
        let packing = self.codec()?;
        self.check_capacity()?;
        let size = self.ops.packed_entry_size;
        if buf.len() < size {
            return Err(TableError::ShortBuffer {
                block: E::BLOCK,
                needed: size,
                got: buf.len(),
            });
        }
        let mut scratch = buf[..size].to_vec();
        let mut entry = E::default();
        packing(&mut scratch, &mut entry, PackingOp::Unpack);
        self.entries.push(entry);
        Ok(size)
    }

    /// Removes entry `index`, shifting the later ones down
    pub fn delete_entry(&mut self, index: usize) -> Result<E, TableError> {
        if index >= self.entries.len() {
            return Err(TableError::OutOfRange {
                block: E::BLOCK,
                index,
                count: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Truncates or zero-extends the table to `new_count` entries
    pub fn resize(&mut self, new_count: usize) -> Result<(), TableError> {
        if new_count > self.ops.max_entry_count {
            return Err(TableError::CapacityExceeded {
                block: E::BLOCK,
                max: self.ops.max_entry_count,
            });
        }
        self.entries.resize(new_count, E::default());
        Ok(())
    }

    /// Replaces the whole table
    pub fn set_entries(&mut self, entries: Vec<E>) -> Result<(), TableError> {
        if !entries.is_empty() {
            self.codec()?;
        }
        if entries.len() > self.ops.max_entry_count {
            return Err(TableError::CapacityExceeded {
                block: E::BLOCK,
                max: self.ops.max_entry_count,
            });
        }
        self.entries = entries;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<E: TableEntry> Clone for Table<E> {
    fn clone(&self) -> Self {
        Table {
            ops: self.ops,
            entries: self.entries.clone(),
        }
    }
}

impl<E: TableEntry> PartialEq for Table<E> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<E: TableEntry> Debug for Table<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("block", &E::BLOCK)
            .field("max_entry_count", &self.ops.max_entry_count)
            .field("entries", &self.entries)
            .finish()
    }
}

/// Type-erased view of a table, for walking all tables in block order
pub trait AnyTable {
    fn block(&self) -> BlockIndex;
    fn entry_count(&self) -> usize;
    fn max_entry_count(&self) -> usize;
    fn packed_entry_size(&self) -> usize;
    fn is_supported(&self) -> bool;
    fn add_entry(&mut self, buf: &[u8]) -> Result<usize, TableError>;
    fn delete_entry(&mut self, index: usize) -> Result<(), TableError>;
    fn resize(&mut self, new_count: usize) -> Result<(), TableError>;
    fn clear(&mut self);
    /// Packs entry `index` into the start of `buf`, zeroing the packed area first
    fn pack_entry(&self, index: usize, buf: &mut [u8]) -> Result<usize, TableError>;
    fn entry_debug(&self, index: usize) -> Option<&dyn Debug>;
}

impl<E: TableEntry> AnyTable for Table<E> {
    fn block(&self) -> BlockIndex {
        E::BLOCK
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn max_entry_count(&self) -> usize {
        self.ops.max_entry_count
    }

    fn packed_entry_size(&self) -> usize {
        self.ops.packed_entry_size
    }

    fn is_supported(&self) -> bool {
        self.ops.is_supported()
    }

    fn add_entry(&mut self, buf: &[u8]) -> Result<usize, TableError> {
        Table::add_entry(self, buf)
    }

    fn delete_entry(&mut self, index: usize) -> Result<(), TableError> {
        Table::delete_entry(self, index).map(|_| ())
    }

    fn resize(&mut self, new_count: usize) -> Result<(), TableError> {
        Table::resize(self, new_count)
    }

    fn clear(&mut self) {
        Table::clear(self)
    }

    fn pack_entry(&self, index: usize, buf: &mut [u8]) -> Result<usize, TableError> {
        let packing = self.codec()?;
        let mut entry = *self.entries.get(index).ok_or(TableError::OutOfRange {
            block: E::BLOCK,
            index,
            count: self.entries.len(),
        })?;
        let size = self.ops.packed_entry_size;
        if buf.len() < size {
            return Err(TableError::ShortBuffer {
                block: E::BLOCK,
                needed: size,
                got: buf.len(),
            });
        }
        buf[..size].fill(0);
        packing(buf, &mut entry, PackingOp::Pack);
        Ok(size)
    }

    fn entry_debug(&self, index: usize) -> Option<&dyn Debug> {
        self.entries.get(index).map(|e| e as &dyn Debug)
    }
}

/// Declares the full set of tables: one field per block, the matching operations set, and
/// the [`TableEntry`] impls tying each entry type to its slot
macro_rules! static_tables {
    ($($field:ident: $entry:ty => $block:ident),* $(,)?) => {
        /// Every table of a static configuration, one slot per block
        #[derive(Clone, Debug, PartialEq)]
        pub struct Tables {
            $(pub $field: Table<$entry>,)*
        }

        /// The per-variant layout of every table
        pub struct StaticOps {
            $(pub $field: TableOps<$entry>,)*
        }

        impl Tables {
            pub(crate) fn new(ops: &'static StaticOps) -> Self {
                Tables {
                    $($field: Table::new(&ops.$field),)*
                }
            }

            pub fn get(&self, block: BlockIndex) -> &dyn AnyTable {
                match block {
                    $(BlockIndex::$block => &self.$field,)*
                }
            }

            pub fn get_mut(&mut self, block: BlockIndex) -> &mut dyn AnyTable {
                match block {
                    $(BlockIndex::$block => &mut self.$field,)*
                }
            }
        }

        $(
            impl TableEntry for $entry {
                const BLOCK: BlockIndex = BlockIndex::$block;

                fn table(tables: &Tables) -> &Table<Self> {
                    &tables.$field
                }

                fn table_mut(tables: &mut Tables) -> &mut Table<Self> {
                    &mut tables.$field
                }
            }
        )*
    };
}

static_tables! {
    schedule: ScheduleEntry => Schedule,
    schedule_entry_points: ScheduleEntryPointsEntry => ScheduleEntryPoints,
    vl_lookup: VlLookupEntry => VlLookup,
    vl_policing: VlPolicingEntry => VlPolicing,
    vl_forwarding: VlForwardingEntry => VlForwarding,
    l2_lookup: L2LookupEntry => L2Lookup,
    l2_policing: L2PolicingEntry => L2Policing,
    vlan_lookup: VlanLookupEntry => VlanLookup,
    l2_forwarding: L2ForwardingEntry => L2Forwarding,
    mac_config: MacConfigEntry => MacConfig,
    schedule_params: ScheduleParamsEntry => ScheduleParams,
    schedule_entry_points_params: ScheduleEntryPointsParamsEntry => ScheduleEntryPointsParams,
    vl_forwarding_params: VlForwardingParamsEntry => VlForwardingParams,
    l2_lookup_params: L2LookupParamsEntry => L2LookupParams,
    l2_forwarding_params: L2ForwardingParamsEntry => L2ForwardingParams,
    clk_sync_params: ClkSyncParamsEntry => ClkSyncParams,
    avb_params: AvbParamsEntry => AvbParams,
    general_params: GeneralParamsEntry => GeneralParams,
    retagging: RetaggingEntry => Retagging,
    xmii_params: XmiiParamsEntry => XmiiParams,
    sgmii: SgmiiEntry => Sgmii,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_map_both_ways() {
        for blk in BlockIndex::ALL {
            assert_eq!(BlockIndex::from_block_id(u64::from(blk.block_id())), Some(blk));
        }
        assert_eq!(BlockIndex::from_block_id(0x13), None);
        assert_eq!(BlockIndex::from_block_id(0x1C8), None);
    }

    #[test]
    fn block_order_is_wire_order() {
        let mut sorted = BlockIndex::ALL;
        sorted.sort();
        assert_eq!(sorted, BlockIndex::ALL);
        assert_eq!(BlockIndex::ALL[19].block_id(), 0x4E);
    }
}
