//! The static configuration container and its wire format
//!
//! A packed configuration is the 32-bit device id followed by one block per non-empty table:
//!
//! ```text
//! | header (block id, length in words, header CRC) | entries ... | CRC over entries |
//! ```
//!
//! and a final header of length zero. All CRCs are [`sja1105_crc32`].

use thiserror::Error;
use tracing::{debug, trace};

use crate::crc::sja1105_crc32;
use crate::device::{device_id_valid, InitError, Variant, SJA1105QS_DEVICE_ID, SJA1105T_DEVICE_ID};
use crate::packing::{field, PackingOp};
use crate::tables::*;

/// CRC placeholder of the final header until the upload fills it in
const FINAL_HEADER_CRC_PLACEHOLDER: u64 = 0xDEAD_BEEF;

/// First violated rule found by [`StaticConfig::check_valid`]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    #[error("Device ID present in the static config is invalid")]
    DeviceIdInvalid,
    #[error("schedule-table present, but TTEthernet is only supported on T and Q/S")]
    SchedulingNotSupported,
    #[error(
        "schedule-table present, but one of schedule-entry-points-table, \
         schedule-parameters-table or schedule-entry-points-parameters table is empty"
    )]
    IncompleteSchedulingConfig,
    #[error(
        "vl-lookup-table present, but one of vl-policing-table, vl-forwarding-table or \
         vl-forwarding-parameters-table is empty"
    )]
    IncompleteVirtualLinkConfig,
    #[error("l2-policing-table needs to have at least one entry")]
    MissingL2PolicingTable,
    #[error("vlan-lookup-table needs to have at least the default untagged VLAN")]
    MissingVlanTable,
    #[error("l2-forwarding-table is either missing or incomplete")]
    MissingL2ForwardingTable,
    #[error("mac-configuration-table needs to contain an entry for each port")]
    MissingMacTable,
    #[error("l2-forwarding-parameters-table is missing")]
    MissingL2ForwardingParamsTable,
    #[error("general-parameters-table is missing")]
    MissingGeneralParamsTable,
    #[error("xmii-table is missing")]
    MissingXmiiTable,
    #[error(
        "Not allowed to overcommit frame memory. L2 memory partitions and VL memory \
         partitions share the same space. The sum of all 16 memory partitions is not allowed \
         to be larger than 929 128-byte blocks (or 910 with retagging). Please adjust \
         l2-forwarding-parameters-table.part_spc and/or vl-forwarding-parameters-table.partspc. \
         ({used} blocks requested, {max} available)"
    )]
    OvercommittedFrameMemory { used: u64, max: u64 },
}

/// What is wrong with a table header whose CRC checked out
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFault {
    #[error("unknown block id")]
    UnknownBlockId,
    #[error("block appears twice")]
    Duplicate,
    #[error("block not present on this chip")]
    Unsupported,
    #[error("more entries than the table holds")]
    TooManyEntries,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    #[error("Unexpected end of buffer: {needed} bytes needed at offset {offset}")]
    UnexpectedEndOfBuffer { offset: usize, needed: usize },
    #[error("Invalid device ID present in static config: {device_id:#010x}")]
    InvalidDeviceId { device_id: u64 },
    #[error(transparent)]
    UnknownVariant(#[from] InitError),
    #[error("One of the table headers has an incorrect CRC (header at offset {offset})")]
    InvalidTableHeaderCrc { offset: usize },
    #[error(
        "One of the table headers contains an invalid block id \
         (block id {block_id:#x} at offset {offset}: {fault})"
    )]
    InvalidTableHeader {
        offset: usize,
        block_id: u64,
        fault: HeaderFault,
    },
    #[error(
        "The data length specified in one of the table headers is longer than the actual \
         size of the entries that were parsed ({block}, {extra} trailing bytes)"
    )]
    IncorrectTableLength { block: BlockIndex, extra: usize },
    #[error("One of the tables has an incorrect CRC over the data area ({block})")]
    DataCrcInvalid { block: BlockIndex },
    #[error("Extra bytes found at the end of buffer after parsing it ({count} bytes)")]
    ExtraBytesAtEndOfBuffer { count: usize },
}

/// The full table set of one switch, bound to the table layouts of its variant
#[derive(Clone, Debug, PartialEq)]
pub struct StaticConfig {
    device_id: u64,
    variant: Variant,
    pub tables: Tables,
}

impl StaticConfig {
    /// An empty configuration for the chip identified by `device_id` and `part_nr`
    pub fn new(device_id: u64, part_nr: u64) -> Result<Self, InitError> {
        Variant::from_ids(device_id, part_nr).map(Self::for_variant)
    }

    pub fn for_variant(variant: Variant) -> Self {
        StaticConfig {
            device_id: variant.device_id(),
            variant,
            tables: Tables::new(variant.static_ops()),
        }
    }

    pub fn device_id(&self) -> u64 {
        self.device_id
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn table<E: TableEntry>(&self) -> &Table<E> {
        E::table(&self.tables)
    }

    pub fn table_mut<E: TableEntry>(&mut self) -> &mut Table<E> {
        E::table_mut(&mut self.tables)
    }

    /// Empties every table
    pub fn free(&mut self) {
        for blk in BlockIndex::ALL {
            self.tables.get_mut(blk).clear();
        }
    }

    pub fn add_entry(&mut self, block: BlockIndex, buf: &[u8]) -> Result<usize, TableError> {
        self.tables.get_mut(block).add_entry(buf)
    }

    pub fn delete_entry(&mut self, block: BlockIndex, index: usize) -> Result<(), TableError> {
        self.tables.get_mut(block).delete_entry(index)
    }

    pub fn resize(&mut self, block: BlockIndex, new_count: usize) -> Result<(), TableError> {
        self.tables.get_mut(block).resize(new_count)
    }

    fn is_full(&self, block: BlockIndex) -> bool {
        let table = self.tables.get(block);
        table.entry_count() == table.max_entry_count()
    }

    fn is_empty(&self, block: BlockIndex) -> bool {
        self.tables.get(block).entry_count() == 0
    }

    fn check_memory_size(&self) -> Result<(), Validity> {
        let l2: u64 = self
            .tables
            .l2_forwarding_params
            .entries()
            .iter()
            .flat_map(|e| e.part_spc)
            .sum();
        let vl: u64 = self
            .tables
            .vl_forwarding_params
            .entries()
            .iter()
            .flat_map(|e| e.partspc)
            .sum();
        let max = if self.is_empty(BlockIndex::Retagging) {
            MAX_FRAME_MEMORY
        } else {
            MAX_FRAME_MEMORY_RETAGGING
        };
        let used = l2 + vl;
        if used > max {
            return Err(Validity::OvercommittedFrameMemory { used, max });
        }
        Ok(())
    }

    /// Checks that the hardware would accept this configuration, stopping at the first rule
    /// it breaks
    pub fn check_valid(&self) -> Result<(), Validity> {
        use BlockIndex::*;

        if !device_id_valid(self.device_id) {
            return Err(Validity::DeviceIdInvalid);
        }
        if !self.is_empty(Schedule) {
            if !matches!(self.device_id, SJA1105T_DEVICE_ID | SJA1105QS_DEVICE_ID) {
                return Err(Validity::SchedulingNotSupported);
            }
            if ![ScheduleEntryPoints, ScheduleParams, ScheduleEntryPointsParams]
                .into_iter()
                .all(|blk| self.is_full(blk))
            {
                return Err(Validity::IncompleteSchedulingConfig);
            }
        }
        if !self.is_empty(VlLookup)
            && (self.is_empty(VlPolicing)
                || self.is_empty(VlForwarding)
                || !self.is_full(VlForwardingParams))
        {
            return Err(Validity::IncompleteVirtualLinkConfig);
        }
        if self.is_empty(L2Policing) {
            return Err(Validity::MissingL2PolicingTable);
        }
        if self.is_empty(VlanLookup) {
            return Err(Validity::MissingVlanTable);
        }
        if !self.is_full(L2Forwarding) {
            return Err(Validity::MissingL2ForwardingTable);
        }
        if !self.is_full(MacConfig) {
            return Err(Validity::MissingMacTable);
        }
        if !self.is_full(L2ForwardingParams) {
            return Err(Validity::MissingL2ForwardingParamsTable);
        }
        if !self.is_full(GeneralParams) {
            return Err(Validity::MissingGeneralParamsTable);
        }
        if !self.is_full(XmiiParams) {
            return Err(Validity::MissingXmiiTable);
        }
        self.check_memory_size()
    }

    /// Exact size of [`pack`](Self::pack)'s output
    pub fn get_length(&self) -> usize {
        // The final header has no data and no trailing CRC
        let mut header_count = 1;
        let mut sum = SIZE_SJA1105_DEVICE_ID;
        for blk in BlockIndex::ALL {
            let table = self.tables.get(blk);
            if table.entry_count() > 0 {
                header_count += 1;
            }
            sum += table.packed_entry_size() * table.entry_count();
        }
        sum + header_count * (SIZE_TABLE_HEADER + SIZE_TABLE_CRC) - SIZE_TABLE_CRC
    }

    /// Serializes every non-empty table in block order
    ///
    /// The final header carries a placeholder CRC; see [`seal_for_upload`].
    pub fn pack(&self) -> Result<Vec<u8>, TableError> {
        let mut buf = vec![0u8; self.get_length()];
        let mut device_id = self.device_id;
        field(&mut buf[..SIZE_SJA1105_DEVICE_ID], &mut device_id, 31, 0, PackingOp::Pack);
        let mut p = SIZE_SJA1105_DEVICE_ID;

        for blk in BlockIndex::ALL {
            let table = self.tables.get(blk);
            let count = table.entry_count();
            if count == 0 {
                continue;
            }
            let mut header = TableHeader {
                block_id: u64::from(blk.block_id()),
                len: (count * table.packed_entry_size() / 4) as u64,
                crc: 0,
            };
            header.pack_with_crc(&mut buf[p..]);
            p += SIZE_TABLE_HEADER;

            let table_start = p;
            for i in 0..count {
                p += table.pack_entry(i, &mut buf[p..])?;
            }
            let mut crc = u64::from(sja1105_crc32(&buf[table_start..p]));
            field(&mut buf[p..p + SIZE_TABLE_CRC], &mut crc, 31, 0, PackingOp::Pack);
            p += SIZE_TABLE_CRC;
            trace!(block = %blk, entries = count, bytes = p - table_start, "Packed table");
        }

        let mut final_header = TableHeader {
            block_id: 0,
            len: 0,
            crc: FINAL_HEADER_CRC_PLACEHOLDER,
        };
        TableHeader::packing(&mut buf[p..], &mut final_header, PackingOp::Pack);
        Ok(buf)
    }

    /// Two-phase parse: [`StaticConfig::parse_raw`] followed by [`RawStaticConfig::resolve`]
    pub fn unpack(buf: &[u8], part_nr: u64) -> Result<Self, UnpackError> {
        Ok(Self::parse_raw(buf, part_nr)?.resolve())
    }

    /// Parses and checks the framing of a packed configuration
    ///
    /// `part_nr` picks between P and R, or Q and S, which share a device id.
    pub fn parse_raw(buf: &[u8], part_nr: u64) -> Result<RawStaticConfig, UnpackError> {
        let mut reader = Reader { buf, pos: 0 };

        let device_id = be_word(reader.take_array::<SIZE_SJA1105_DEVICE_ID>()?);
        if !device_id_valid(device_id) {
            return Err(UnpackError::InvalidDeviceId { device_id });
        }
        let mut config = Self::new(device_id, part_nr)?;
        let mut vl_lookup_raw = Vec::new();

        loop {
            let offset = reader.pos;
            let header_bytes = reader.take_array::<SIZE_TABLE_HEADER>()?;
            let header = TableHeader::unpack(header_bytes);
            if header.len == 0 {
                break;
            }
            if header.crc != TableHeader::expected_crc(header_bytes) {
                return Err(UnpackError::InvalidTableHeaderCrc { offset });
            }
            let body = reader.take(header.len as usize * 4)?;

            let invalid = |fault| UnpackError::InvalidTableHeader {
                offset,
                block_id: header.block_id,
                fault,
            };
            let blk = BlockIndex::from_block_id(header.block_id)
                .ok_or_else(|| invalid(HeaderFault::UnknownBlockId))?;
            let table = config.tables.get_mut(blk);
            if table.entry_count() > 0 {
                return Err(invalid(HeaderFault::Duplicate));
            }
            if !table.is_supported() {
                return Err(invalid(HeaderFault::Unsupported));
            }

            let mut entries = body.chunks_exact(table.packed_entry_size());
            for entry in &mut entries {
                table
                    .add_entry(entry)
                    .map_err(|_| invalid(HeaderFault::TooManyEntries))?;
            }
            let extra = entries.remainder().len();
            if extra != 0 {
                return Err(UnpackError::IncorrectTableLength { block: blk, extra });
            }

            let read_crc = be_word(reader.take_array::<SIZE_TABLE_CRC>()?);
            if read_crc != u64::from(sja1105_crc32(body)) {
                return Err(UnpackError::DataCrcInvalid { block: blk });
            }
            debug!(block = %blk, entries = table.entry_count(), "Unpacked table");

            if blk == BlockIndex::VlLookup {
                vl_lookup_raw = body.to_vec();
            }
        }

        let count = buf.len() - reader.pos;
        if count != 0 {
            return Err(UnpackError::ExtraBytesAtEndOfBuffer { count });
        }
        Ok(RawStaticConfig {
            config,
            vl_lookup_raw,
        })
    }
}

/// A parsed configuration whose cross-table dependencies are not yet applied
///
/// The VL lookup entries have been decoded with format 0. Their real layout is given by
/// `vllupformat` of the general parameters, so the raw table body is retained until
/// [`resolve`](Self::resolve) can decode it properly.
#[derive(Clone, Debug)]
pub struct RawStaticConfig {
    config: StaticConfig,
    vl_lookup_raw: Vec<u8>,
}

impl RawStaticConfig {
    pub fn config(&self) -> &StaticConfig {
        &self.config
    }

    /// Re-decodes the VL lookup table with the format taken from the general parameters
    pub fn resolve(self) -> StaticConfig {
        let RawStaticConfig {
            mut config,
            vl_lookup_raw,
        } = self;
        let format = config
            .tables
            .general_params
            .entries()
            .first()
            .map_or(0, |general| general.vllupformat);

        let ops = config.tables.vl_lookup.ops();
        if let Some(packing) = ops.packing {
            let raw_entries = vl_lookup_raw.chunks_exact(ops.packed_entry_size);
            for (entry, raw) in config.tables.vl_lookup.entries_mut().iter_mut().zip(raw_entries) {
                let mut scratch = raw.to_vec();
                *entry = VlLookupEntry {
                    format,
                    ..Default::default()
                };
                packing(&mut scratch, entry, PackingOp::Unpack);
            }
        }
        config
    }
}

/// Writes the CRC of the final header, computed over everything before it
///
/// The switch rejects a configuration whose final header still carries the placeholder.
pub fn seal_for_upload(buf: &mut [u8]) {
    let Some(crc_len) = buf.len().checked_sub(SIZE_TABLE_CRC) else {
        return;
    };
    let Some(header_bytes) = buf.last_chunk::<SIZE_TABLE_HEADER>() else {
        return;
    };
    let mut header = TableHeader::unpack(header_bytes);
    let header_start = buf.len() - SIZE_TABLE_HEADER;
    header.crc = u64::from(sja1105_crc32(&buf[..crc_len]));
    TableHeader::packing(&mut buf[header_start..], &mut header, PackingOp::Pack);
}

fn be_word(bytes: &[u8; 4]) -> u64 {
    u64::from(u32::from_be_bytes(*bytes))
}

/// Bounds-checked forward cursor over the packed buffer
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, needed: usize) -> Result<&'a [u8], UnpackError> {
        let rest = &self.buf[self.pos..];
        if rest.len() < needed {
            return Err(UnpackError::UnexpectedEndOfBuffer {
                offset: self.pos,
                needed,
            });
        }
        self.pos += needed;
        Ok(&rest[..needed])
    }

    fn take_array<const N: usize>(&mut self) -> Result<&'a [u8; N], UnpackError> {
        let (head, _) = self.buf[self.pos..].split_first_chunk::<N>().ok_or(
            UnpackError::UnexpectedEndOfBuffer {
                offset: self.pos,
                needed: N,
            },
        )?;
        self.pos += N;
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::default_config;
    use crate::device::{SJA1105E_DEVICE_ID, SJA1105_PART_NR_DONT_CARE};
    use test_case::test_case;

    const XMII: [(XmiiMode, PhyRole); NUM_PORTS] = [(XmiiMode::Rgmii, PhyRole::Mac); NUM_PORTS];

    fn valid(variant: Variant) -> StaticConfig {
        default_config(variant, 4, XMII).unwrap()
    }

    /// Hand-framed blob with correct CRCs, for feeding the parser odd tables
    fn blob(device_id: u32, tables: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = device_id.to_be_bytes().to_vec();
        for (block_id, body) in tables {
            let mut header = [0u8; SIZE_TABLE_HEADER];
            TableHeader {
                block_id: u64::from(*block_id),
                len: (body.len() / 4) as u64,
                crc: 0,
            }
            .pack_with_crc(&mut header);
            buf.extend_from_slice(&header);
            buf.extend_from_slice(body);
            buf.extend_from_slice(&sja1105_crc32(body).to_be_bytes());
        }
        buf.extend_from_slice(&[0; SIZE_TABLE_HEADER]);
        buf
    }

    fn add_ttethernet(config: &mut StaticConfig) {
        let t = &mut config.tables;
        t.schedule.push(ScheduleEntry { delta: 10, ..Default::default() }).unwrap();
        t.schedule_entry_points.resize(MAX_SCHEDULE_ENTRY_POINTS_COUNT).unwrap();
        t.schedule_params.resize(1).unwrap();
        t.schedule_entry_points_params.resize(1).unwrap();
    }

    fn add_virtual_links(config: &mut StaticConfig, format: u64) {
        let t = &mut config.tables;
        t.general_params.entries_mut()[0].vllupformat = format;
        t.vl_lookup
            .push(VlLookupEntry {
                format,
                port: 1,
                destports: if format == 0 { 0x3 } else { 0 },
                macaddr: if format == 0 { 0x0200_0000_0042 } else { 0 },
                egrmirr: if format == 0 { 0 } else { 0x4 },
                vlid: if format == 0 { 0 } else { 0x1234 },
                ..Default::default()
            })
            .unwrap();
        t.vl_policing
            .push(VlPolicingEntry { maxlen: 64, bag: 3, jitter: 1, ..Default::default() })
            .unwrap();
        t.vl_forwarding
            .push(VlForwardingEntry { priority: 7, destports: 0x1, ..Default::default() })
            .unwrap();
        t.vl_forwarding_params
            .push(VlForwardingParamsEntry { partspc: [100, 0, 0, 0, 0, 0, 0, 0], debugen: 0 })
            .unwrap();
        t.l2_forwarding_params.entries_mut()[0].part_spc[0] = 829;
    }

    #[test]
    fn missing_vlan_table() {
        let mut config = valid(Variant::E);
        config.tables.vlan_lookup.clear();
        assert_eq!(config.check_valid(), Err(Validity::MissingVlanTable));
    }

    #[test]
    fn schedule_needs_ttethernet() {
        let mut config = valid(Variant::T);
        add_ttethernet(&mut config);
        assert_eq!(config.check_valid(), Ok(()));
        config.device_id = SJA1105E_DEVICE_ID;
        assert_eq!(config.check_valid(), Err(Validity::SchedulingNotSupported));
    }

    #[test]
    fn schedule_needs_companion_tables() {
        let mut config = valid(Variant::Q);
        add_ttethernet(&mut config);
        config.tables.schedule_entry_points.resize(10).unwrap();
        assert_eq!(config.check_valid(), Err(Validity::IncompleteSchedulingConfig));
    }

    #[test]
    fn virtual_links_need_policing_and_forwarding() {
        let mut config = valid(Variant::S);
        add_virtual_links(&mut config, 0);
        assert_eq!(config.check_valid(), Ok(()));
        config.tables.vl_forwarding.clear();
        assert_eq!(config.check_valid(), Err(Validity::IncompleteVirtualLinkConfig));
    }

    #[test]
    fn frame_memory_budget() {
        let mut config = valid(Variant::P);
        config.tables.l2_forwarding_params.entries_mut()[0].part_spc = [900, 30, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            config.check_valid(),
            Err(Validity::OvercommittedFrameMemory { used: 930, max: 929 })
        );

        config.tables.l2_forwarding_params.entries_mut()[0].part_spc = [900, 10, 0, 0, 0, 0, 0, 0];
        assert_eq!(config.check_valid(), Ok(()));
        // Exactly at the limit is fine, even with retagging
        config.tables.retagging.push(RetaggingEntry::default()).unwrap();
        assert_eq!(config.check_valid(), Ok(()));
    }

    #[test]
    fn retagging_lowers_the_budget() {
        let mut config = valid(Variant::R);
        config.tables.retagging.push(RetaggingEntry::default()).unwrap();
        assert_eq!(
            config.check_valid(),
            Err(Validity::OvercommittedFrameMemory { used: 929, max: 910 })
        );
        config.tables.l2_forwarding_params.entries_mut()[0].part_spc[0] = 910;
        assert_eq!(config.check_valid(), Ok(()));
    }

    #[test]
    fn rule_order() {
        let mut config = StaticConfig::for_variant(Variant::E);
        assert_eq!(config.check_valid(), Err(Validity::MissingL2PolicingTable));
        config.device_id = 0;
        assert_eq!(config.check_valid(), Err(Validity::DeviceIdInvalid));

        let mut config = valid(Variant::E);
        config.tables.mac_config.resize(4).unwrap();
        config.tables.xmii_params.clear();
        assert_eq!(config.check_valid(), Err(Validity::MissingMacTable));
        config.tables.mac_config.resize(5).unwrap();
        assert_eq!(config.check_valid(), Err(Validity::MissingXmiiTable));
        config.tables.general_params.clear();
        assert_eq!(config.check_valid(), Err(Validity::MissingGeneralParamsTable));
        config.tables.l2_forwarding.delete_entry(12).unwrap();
        assert_eq!(config.check_valid(), Err(Validity::MissingL2ForwardingTable));
    }

    #[test_case(Variant::E)]
    #[test_case(Variant::T)]
    #[test_case(Variant::P)]
    #[test_case(Variant::Q)]
    #[test_case(Variant::R)]
    #[test_case(Variant::S)]
    fn pack_unpack_roundtrip(variant: Variant) {
        let mut config = valid(variant);
        config
            .tables
            .l2_lookup
            .push(L2LookupEntry {
                macaddr: 0x0011_2233_4455,
                vlanid: 1,
                destports: 0x10,
                index: 7,
                ..Default::default()
            })
            .unwrap();
        config.tables.avb_params.push(AvbParamsEntry::default()).unwrap();
        if variant.supports_ttethernet() {
            add_ttethernet(&mut config);
            add_virtual_links(&mut config, 1);
        }
        if variant.has_sgmii() {
            config
                .tables
                .sgmii
                .push(SgmiiEntry { basic_control: 0x1140, ..Default::default() })
                .unwrap();
        }
        assert_eq!(config.check_valid(), Ok(()));

        let packed = config.pack().unwrap();
        assert_eq!(packed.len(), config.get_length());
        let unpacked = StaticConfig::unpack(&packed, variant.part_nr()).unwrap();
        assert_eq!(unpacked, config);
    }

    #[test]
    fn length_of_empty_config() {
        let config = StaticConfig::for_variant(Variant::E);
        assert_eq!(config.get_length(), 4 + 12);
        let packed = config.pack().unwrap();
        assert_eq!(&packed[..4], &[0x9C, 0x00, 0x00, 0x0C]);
        assert_eq!(&packed[4..], &[0, 0, 0, 0, 0, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn header_bit_flips_are_caught() {
        let packed = valid(Variant::E).pack().unwrap();
        for byte in 4..4 + SIZE_TABLE_HEADER {
            for bit in 0..8 {
                let mut corrupt = packed.clone();
                corrupt[byte] ^= 1 << bit;
                assert_eq!(
                    StaticConfig::unpack(&corrupt, SJA1105_PART_NR_DONT_CARE),
                    Err(UnpackError::InvalidTableHeaderCrc { offset: 4 }),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn body_bit_flips_are_caught() {
        let config = valid(Variant::E);
        let packed = config.pack().unwrap();
        // L2 policing is the first non-empty table on a default config
        let body = 4 + SIZE_TABLE_HEADER..4 + SIZE_TABLE_HEADER + 45 * SIZE_L2_POLICING_ENTRY;
        for byte in body.step_by(7) {
            for bit in [0, 3, 7] {
                let mut corrupt = packed.clone();
                corrupt[byte] ^= 1 << bit;
                assert_eq!(
                    StaticConfig::unpack(&corrupt, SJA1105_PART_NR_DONT_CARE),
                    Err(UnpackError::DataCrcInvalid { block: BlockIndex::L2Policing }),
                    "byte {byte} bit {bit}"
                );
            }
        }
    }

    #[test]
    fn framing_errors() {
        let e = SJA1105E_DEVICE_ID as u32;
        let unpack = |buf: &[u8]| StaticConfig::unpack(buf, SJA1105_PART_NR_DONT_CARE);

        assert_eq!(
            unpack(&[0x9C, 0, 0]),
            Err(UnpackError::UnexpectedEndOfBuffer { offset: 0, needed: 4 })
        );
        assert_eq!(
            unpack(&blob(0x1234_5678, &[])),
            Err(UnpackError::InvalidDeviceId { device_id: 0x1234_5678 })
        );
        assert_eq!(
            unpack(&blob(e, &[])[..10]),
            Err(UnpackError::UnexpectedEndOfBuffer { offset: 4, needed: 12 })
        );

        let mut extra = blob(e, &[]);
        extra.extend_from_slice(&[0; 5]);
        assert_eq!(unpack(&extra), Err(UnpackError::ExtraBytesAtEndOfBuffer { count: 5 }));

        assert!(matches!(
            unpack(&blob(e, &[(0x13, &[0; 8])])),
            Err(UnpackError::InvalidTableHeader { block_id: 0x13, fault: HeaderFault::UnknownBlockId, .. })
        ));
        assert!(matches!(
            unpack(&blob(e, &[(0x07, &[0; 8]), (0x07, &[0; 8])])),
            Err(UnpackError::InvalidTableHeader { offset: 28, fault: HeaderFault::Duplicate, .. })
        ));
        assert!(matches!(
            unpack(&blob(e, &[(0x00, &[0; 8])])),
            Err(UnpackError::InvalidTableHeader { fault: HeaderFault::Unsupported, .. })
        ));
        assert_eq!(
            unpack(&blob(e, &[(0x07, &[0; 12])])),
            Err(UnpackError::IncorrectTableLength { block: BlockIndex::VlanLookup, extra: 4 })
        );
        assert!(matches!(
            unpack(&blob(e, &[(0x11, &[0; 80])])),
            Err(UnpackError::InvalidTableHeader { fault: HeaderFault::TooManyEntries, .. })
        ));
    }

    #[test]
    fn truncated_table_body() {
        let packed = valid(Variant::T).pack().unwrap();
        let cut = &packed[..4 + SIZE_TABLE_HEADER + 100];
        assert_eq!(
            StaticConfig::unpack(cut, SJA1105_PART_NR_DONT_CARE),
            Err(UnpackError::UnexpectedEndOfBuffer { offset: 16, needed: 360 })
        );
    }

    #[test_case(5; "one byte of header")]
    #[test_case(11; "most of the header")]
    #[test_case(15; "all but the last header byte")]
    fn truncated_table_header(len: usize) {
        let packed = blob(SJA1105E_DEVICE_ID as u32, &[(0x07, &[0; 8])]);
        assert_eq!(
            StaticConfig::unpack(&packed[..len], SJA1105_PART_NR_DONT_CARE),
            Err(UnpackError::UnexpectedEndOfBuffer { offset: 4, needed: 12 })
        );
    }

    #[test]
    fn truncated_table_crc() {
        let packed = blob(SJA1105E_DEVICE_ID as u32, &[(0x07, &[0; 8])]);
        let cut = &packed[..4 + SIZE_TABLE_HEADER + 8 + 2];
        assert_eq!(
            StaticConfig::unpack(cut, SJA1105_PART_NR_DONT_CARE),
            Err(UnpackError::UnexpectedEndOfBuffer { offset: 24, needed: 4 })
        );
    }

    #[test]
    fn part_number_disambiguates() {
        let packed = valid(Variant::Q).pack().unwrap();
        assert!(matches!(
            StaticConfig::unpack(&packed, SJA1105_PART_NR_DONT_CARE),
            Err(UnpackError::UnknownVariant(_))
        ));
        let as_s = StaticConfig::unpack(&packed, Variant::S.part_nr()).unwrap();
        assert_eq!(as_s.variant(), Variant::S);
    }

    #[test]
    fn vl_lookup_format_is_resolved_from_general_params() {
        let mut config = valid(Variant::T);
        add_virtual_links(&mut config, 1);
        let packed = config.pack().unwrap();

        let raw = StaticConfig::parse_raw(&packed, SJA1105_PART_NR_DONT_CARE).unwrap();
        let before = raw.config().tables.vl_lookup.entries()[0];
        assert_eq!(before.format, 0);
        assert_eq!(before.vlid, 0);

        let resolved = raw.resolve();
        let after = resolved.tables.vl_lookup.entries()[0];
        assert_eq!(after.format, 1);
        assert_eq!(after.vlid, 0x1234);
        assert_eq!(after.egrmirr, 0x4);
        assert_eq!(resolved, config);
    }

    #[test]
    fn container_capacity_and_editing() {
        let mut config = valid(Variant::E);
        let mut entry = [0u8; SIZE_VLAN_LOOKUP_ENTRY];
        let mut vlan = VlanLookupEntry { vlanid: 100, vmemb_port: 0x3, ..Default::default() };
        VlanLookupEntry::packing(&mut entry, &mut vlan, PackingOp::Pack);

        assert_eq!(config.add_entry(BlockIndex::VlanLookup, &entry), Ok(SIZE_VLAN_LOOKUP_ENTRY));
        assert_eq!(config.tables.vlan_lookup.entries()[1], vlan);

        config.resize(BlockIndex::VlanLookup, MAX_VLAN_LOOKUP_COUNT).unwrap();
        assert_eq!(config.tables.vlan_lookup.entries()[1], vlan);
        assert_eq!(config.tables.vlan_lookup.entries()[2], VlanLookupEntry::default());
        assert_eq!(
            config.add_entry(BlockIndex::VlanLookup, &entry),
            Err(TableError::CapacityExceeded { block: BlockIndex::VlanLookup, max: MAX_VLAN_LOOKUP_COUNT })
        );
        assert_eq!(config.tables.vlan_lookup.entry_count(), MAX_VLAN_LOOKUP_COUNT);
        assert!(config.resize(BlockIndex::VlanLookup, MAX_VLAN_LOOKUP_COUNT + 1).is_err());

        config.delete_entry(BlockIndex::VlanLookup, 0).unwrap();
        assert_eq!(config.tables.vlan_lookup.entries()[0], vlan);
        let count = config.tables.vlan_lookup.entry_count();
        assert_eq!(
            config.delete_entry(BlockIndex::VlanLookup, count),
            Err(TableError::OutOfRange { block: BlockIndex::VlanLookup, index: count, count })
        );

        assert_eq!(
            config.add_entry(BlockIndex::Schedule, &[0; 8]),
            Err(TableError::Unsupported { block: BlockIndex::Schedule })
        );

        config.free();
        assert!(BlockIndex::ALL.iter().all(|&blk| config.tables.get(blk).entry_count() == 0));
        config.free();
    }

    #[test]
    fn sealing_fills_the_final_crc() {
        let mut packed = valid(Variant::E).pack().unwrap();
        let len = packed.len();
        assert_eq!(&packed[len - 4..], &[0xDE, 0xAD, 0xBE, 0xEF]);
        seal_for_upload(&mut packed);
        assert_eq!(&packed[len - 4..], &sja1105_crc32(&packed[..len - 4]).to_be_bytes());
        // Still a well-formed stream: the final header's CRC is never checked
        assert!(StaticConfig::unpack(&packed, SJA1105_PART_NR_DONT_CARE).is_ok());
    }

    #[test]
    fn sealing_ignores_short_buffers() {
        for len in [0, 3, SIZE_TABLE_HEADER - 1] {
            let mut buf = vec![0xA5; len];
            seal_for_upload(&mut buf);
            assert_eq!(buf, vec![0xA5; len]);
        }
    }

    #[test]
    fn typed_table_access() {
        let mut config = valid(Variant::E);
        config.table_mut::<MacConfigEntry>().entries_mut()[1].vlanid = 5;
        assert_eq!(config.table::<MacConfigEntry>().entries()[1].vlanid, 5);
        assert_eq!(config.table::<XmiiParamsEntry>().entry_count(), 1);
    }
}
