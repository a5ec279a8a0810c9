//! Virtual link (TTEthernet critical traffic) tables

use crate::packing::{field, PackingOp};

use super::{
    SIZE_VL_FORWARDING_ENTRY, SIZE_VL_FORWARDING_PARAMS_ENTRY, SIZE_VL_LOOKUP_ENTRY,
    SIZE_VL_POLICING_ENTRY,
};

/// Virtual link classification rule
///
/// The packed layout depends on `format`, which is not part of the entry bytes. It mirrors
/// `vllupformat` of the general parameters. With format 0 the rule matches on
/// `macaddr`/`vlanid`/`vlanprior` and uses `destports`/`iscritical`. Any other format matches
/// on `vlid` and uses `egrmirr`/`ingrmirr` instead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VlLookupEntry {
    pub format: u64,
    pub port: u64,
    pub destports: u64,
    pub iscritical: u64,
    pub macaddr: u64,
    pub vlanid: u64,
    pub vlanprior: u64,
    pub egrmirr: u64,
    pub ingrmirr: u64,
    pub vlid: u64,
}

impl VlLookupEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_VL_LOOKUP_ENTRY];
        if entry.format == 0 {
            field(buf, &mut entry.destports, 95, 91, op);
            field(buf, &mut entry.iscritical, 90, 90, op);
            field(buf, &mut entry.macaddr, 89, 42, op);
            field(buf, &mut entry.vlanid, 41, 30, op);
            field(buf, &mut entry.port, 29, 27, op);
            field(buf, &mut entry.vlanprior, 26, 24, op);
        } else {
            field(buf, &mut entry.egrmirr, 95, 91, op);
            field(buf, &mut entry.ingrmirr, 90, 90, op);
            field(buf, &mut entry.vlid, 57, 42, op);
            field(buf, &mut entry.port, 29, 27, op);
        }
        SIZE_VL_LOOKUP_ENTRY
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VlPolicingEntry {
    pub r#type: u64,
    pub maxlen: u64,
    pub sharindx: u64,
    pub bag: u64,
    pub jitter: u64,
}

impl VlPolicingEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_VL_POLICING_ENTRY];
        field(buf, &mut entry.r#type, 63, 63, op);
        field(buf, &mut entry.maxlen, 62, 52, op);
        field(buf, &mut entry.sharindx, 51, 42, op);
        // Rate-constrained links only
        if entry.r#type == 0 {
            field(buf, &mut entry.bag, 41, 28, op);
            field(buf, &mut entry.jitter, 27, 18, op);
        }
        SIZE_VL_POLICING_ENTRY
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VlForwardingEntry {
    pub r#type: u64,
    pub priority: u64,
    pub partition: u64,
    pub destports: u64,
}

impl VlForwardingEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_VL_FORWARDING_ENTRY];
        field(buf, &mut entry.r#type, 31, 31, op);
        field(buf, &mut entry.priority, 30, 28, op);
        field(buf, &mut entry.partition, 27, 25, op);
        field(buf, &mut entry.destports, 24, 20, op);
        SIZE_VL_FORWARDING_ENTRY
    }
}

/// Frame memory reserved for virtual link traffic, per partition
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VlForwardingParamsEntry {
    pub partspc: [u64; 8],
    pub debugen: u64,
}

impl VlForwardingParamsEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_VL_FORWARDING_PARAMS_ENTRY];
        for (i, partspc) in entry.partspc.iter_mut().enumerate() {
            let offset = 16 + 10 * i;
            field(buf, partspc, offset + 9, offset, op);
        }
        field(buf, &mut entry.debugen, 15, 15, op);
        SIZE_VL_FORWARDING_PARAMS_ENTRY
    }
}
