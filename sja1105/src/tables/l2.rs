//! Layer 2 switching tables: FDB, policing, VLANs, forwarding and retagging

use crate::packing::{field, PackingOp};

use super::{
    NUM_PORTS, NUM_TC, SIZE_L2_FORWARDING_ENTRY, SIZE_L2_FORWARDING_PARAMS_ENTRY,
    SIZE_L2_LOOKUP_ENTRY_ET, SIZE_L2_LOOKUP_ENTRY_PQRS, SIZE_L2_LOOKUP_PARAMS_ENTRY_ET,
    SIZE_L2_LOOKUP_PARAMS_ENTRY_PQRS, SIZE_L2_POLICING_ENTRY, SIZE_RETAGGING_ENTRY,
    SIZE_VLAN_LOOKUP_ENTRY,
};

/// A static FDB entry
///
/// The mirroring, retagging and mask fields exist on P/Q/R/S only and are zero on E/T.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L2LookupEntry {
    pub mirrvlan: u64,
    pub mirr: u64,
    pub retag: u64,
    pub mask_iotag: u64,
    pub mask_vlanid: u64,
    pub mask_macaddr: u64,
    pub iotag: u64,
    pub vlanid: u64,
    pub macaddr: u64,
    pub destports: u64,
    pub enfport: u64,
    pub index: u64,
}

impl L2LookupEntry {
    pub fn packing_et(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_LOOKUP_ENTRY_ET];
        field(buf, &mut entry.vlanid, 95, 84, op);
        field(buf, &mut entry.macaddr, 83, 36, op);
        field(buf, &mut entry.destports, 35, 31, op);
        field(buf, &mut entry.enfport, 30, 30, op);
        field(buf, &mut entry.index, 29, 20, op);
        SIZE_L2_LOOKUP_ENTRY_ET
    }

    /// Layout of a locked (static) entry
    pub fn packing_pqrs(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_LOOKUP_ENTRY_PQRS];
        field(buf, &mut entry.mirrvlan, 158, 147, op);
        field(buf, &mut entry.mirr, 145, 145, op);
        field(buf, &mut entry.retag, 144, 144, op);
        field(buf, &mut entry.mask_iotag, 143, 143, op);
        field(buf, &mut entry.mask_vlanid, 142, 131, op);
        field(buf, &mut entry.mask_macaddr, 130, 83, op);
        field(buf, &mut entry.iotag, 82, 82, op);
        field(buf, &mut entry.vlanid, 81, 70, op);
        field(buf, &mut entry.macaddr, 69, 22, op);
        field(buf, &mut entry.destports, 21, 17, op);
        field(buf, &mut entry.enfport, 16, 16, op);
        field(buf, &mut entry.index, 15, 6, op);
        SIZE_L2_LOOKUP_ENTRY_PQRS
    }
}

/// Ingress rate limiter, one per port and traffic class plus one per port for broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L2PolicingEntry {
    pub sharindx: u64,
    pub smax: u64,
    pub rate: u64,
    pub maxlen: u64,
    pub partition: u64,
}

impl L2PolicingEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_POLICING_ENTRY];
        field(buf, &mut entry.sharindx, 63, 58, op);
        field(buf, &mut entry.smax, 57, 42, op);
        field(buf, &mut entry.rate, 41, 26, op);
        field(buf, &mut entry.maxlen, 25, 15, op);
        field(buf, &mut entry.partition, 14, 12, op);
        SIZE_L2_POLICING_ENTRY
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VlanLookupEntry {
    pub ving_mirr: u64,
    pub vegr_mirr: u64,
    pub vmemb_port: u64,
    pub vlan_bc: u64,
    pub tag_port: u64,
    pub vlanid: u64,
}

impl VlanLookupEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_VLAN_LOOKUP_ENTRY];
        field(buf, &mut entry.ving_mirr, 63, 59, op);
        field(buf, &mut entry.vegr_mirr, 58, 54, op);
        field(buf, &mut entry.vmemb_port, 53, 49, op);
        field(buf, &mut entry.vlan_bc, 48, 44, op);
        field(buf, &mut entry.tag_port, 43, 39, op);
        field(buf, &mut entry.vlanid, 38, 27, op);
        SIZE_VLAN_LOOKUP_ENTRY
    }
}

/// Rows 0..5 hold the per-port reachability masks, rows 5..13 the per-priority egress
/// remapping
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L2ForwardingEntry {
    pub bc_domain: u64,
    pub reach_port: u64,
    pub fl_domain: u64,
    pub vlan_pmap: [u64; 8],
}

impl L2ForwardingEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_FORWARDING_ENTRY];
        field(buf, &mut entry.bc_domain, 63, 59, op);
        field(buf, &mut entry.reach_port, 58, 54, op);
        field(buf, &mut entry.fl_domain, 53, 49, op);
        for (i, pmap) in entry.vlan_pmap.iter_mut().enumerate() {
            let offset = 25 + 3 * i;
            field(buf, pmap, offset + 2, offset, op);
        }
        SIZE_L2_FORWARDING_ENTRY
    }
}

/// FDB learning and ageing policy
///
/// `dyn_tbsz` and `poly` are E/T only. The drop masks, per-port address limits and the
/// learning flags from `start_dynspc` on are P/Q/R/S only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L2LookupParamsEntry {
    pub drpbc: u64,
    pub drpmc: u64,
    pub drpuni: u64,
    pub maxaddrp: [u64; NUM_PORTS],
    pub start_dynspc: u64,
    pub drpnolearn: u64,
    pub use_static: u64,
    pub owr_dyn: u64,
    pub learn_once: u64,
    pub maxage: u64,
    pub dyn_tbsz: u64,
    pub poly: u64,
    pub shared_learn: u64,
    pub no_enf_hostprt: u64,
    pub no_mgmt_learn: u64,
}

impl L2LookupParamsEntry {
    pub fn packing_et(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_LOOKUP_PARAMS_ENTRY_ET];
        field(buf, &mut entry.maxage, 31, 17, op);
        field(buf, &mut entry.dyn_tbsz, 16, 14, op);
        field(buf, &mut entry.poly, 13, 6, op);
        field(buf, &mut entry.shared_learn, 5, 5, op);
        field(buf, &mut entry.no_enf_hostprt, 4, 4, op);
        field(buf, &mut entry.no_mgmt_learn, 3, 3, op);
        SIZE_L2_LOOKUP_PARAMS_ENTRY_ET
    }

    pub fn packing_pqrs(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_LOOKUP_PARAMS_ENTRY_PQRS];
        field(buf, &mut entry.drpbc, 127, 123, op);
        field(buf, &mut entry.drpmc, 122, 118, op);
        field(buf, &mut entry.drpuni, 117, 113, op);
        for (i, maxaddrp) in entry.maxaddrp.iter_mut().enumerate() {
            let offset = 58 + 11 * i;
            field(buf, maxaddrp, offset + 10, offset, op);
        }
        field(buf, &mut entry.maxage, 57, 43, op);
        field(buf, &mut entry.start_dynspc, 42, 33, op);
        field(buf, &mut entry.drpnolearn, 32, 28, op);
        field(buf, &mut entry.shared_learn, 27, 27, op);
        field(buf, &mut entry.no_enf_hostprt, 26, 26, op);
        field(buf, &mut entry.no_mgmt_learn, 25, 25, op);
        field(buf, &mut entry.use_static, 24, 24, op);
        field(buf, &mut entry.owr_dyn, 23, 23, op);
        field(buf, &mut entry.learn_once, 22, 22, op);
        SIZE_L2_LOOKUP_PARAMS_ENTRY_PQRS
    }
}

/// Frame memory partitioning, in 128-byte blocks
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct L2ForwardingParamsEntry {
    pub max_dynp: u64,
    pub part_spc: [u64; NUM_TC],
}

impl L2ForwardingParamsEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_L2_FORWARDING_PARAMS_ENTRY];
        field(buf, &mut entry.max_dynp, 95, 93, op);
        for (i, part_spc) in entry.part_spc.iter_mut().enumerate() {
            let offset = 13 + 10 * i;
            field(buf, part_spc, offset + 9, offset, op);
        }
        SIZE_L2_FORWARDING_PARAMS_ENTRY
    }
}

/// VLAN rewrite rule applied on egress
///
/// `use_dest_ports` has no place in the packed entry and never leaves memory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetaggingEntry {
    pub egr_port: u64,
    pub ing_port: u64,
    pub vlan_ing: u64,
    pub vlan_egr: u64,
    pub do_not_learn: u64,
    pub use_dest_ports: u64,
    pub destports: u64,
}

impl RetaggingEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_RETAGGING_ENTRY];
        field(buf, &mut entry.egr_port, 63, 59, op);
        field(buf, &mut entry.ing_port, 58, 54, op);
        field(buf, &mut entry.vlan_ing, 53, 42, op);
        field(buf, &mut entry.vlan_egr, 41, 30, op);
        field(buf, &mut entry.do_not_learn, 29, 29, op);
        field(buf, &mut entry.destports, 27, 23, op);
        SIZE_RETAGGING_ENTRY
    }
}
