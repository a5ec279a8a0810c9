//! Switch-wide parameter tables with a single entry each

use crate::packing::{field, PackingOp};

use super::{
    SIZE_AVB_PARAMS_ENTRY_ET, SIZE_AVB_PARAMS_ENTRY_PQRS, SIZE_CLK_SYNC_PARAMS_ENTRY,
    SIZE_GENERAL_PARAMS_ENTRY_ET, SIZE_GENERAL_PARAMS_ENTRY_PQRS,
};

/// Global switch behaviour: management traffic filters, host and mirror ports, TPIDs
///
/// `queue_ts` and the `egrmirr*`/`replay_port` fields are P/Q/R/S only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeneralParamsEntry {
    /// Selects the layout of the VL lookup table
    pub vllupformat: u64,
    pub mirr_ptacu: u64,
    pub switchid: u64,
    pub hostprio: u64,
    pub mac_fltres1: u64,
    pub mac_fltres0: u64,
    pub mac_flt1: u64,
    pub mac_flt0: u64,
    pub incl_srcpt1: u64,
    pub incl_srcpt0: u64,
    pub send_meta1: u64,
    pub send_meta0: u64,
    pub casc_port: u64,
    pub host_port: u64,
    pub mirr_port: u64,
    pub vlmarker: u64,
    pub vlmask: u64,
    pub tpid: u64,
    pub ignore2stf: u64,
    pub tpid2: u64,
    pub queue_ts: u64,
    pub egrmirrvid: u64,
    pub egrmirrpcp: u64,
    pub egrmirrdei: u64,
    pub replay_port: u64,
}

impl GeneralParamsEntry {
    /// Fields common to both generations; the PQRS entry has them one word higher
    fn common(buf: &mut [u8], entry: &mut Self, shift: usize, op: PackingOp) {
        let mut at = |value: &mut u64, start: usize, end: usize| {
            field(buf, value, start + shift, end + shift, op)
        };
        at(&mut entry.vllupformat, 319, 319);
        at(&mut entry.mirr_ptacu, 318, 318);
        at(&mut entry.switchid, 317, 315);
        at(&mut entry.hostprio, 314, 312);
        at(&mut entry.mac_fltres1, 311, 264);
        at(&mut entry.mac_fltres0, 263, 216);
        at(&mut entry.mac_flt1, 215, 168);
        at(&mut entry.mac_flt0, 167, 120);
        at(&mut entry.incl_srcpt1, 119, 119);
        at(&mut entry.incl_srcpt0, 118, 118);
        at(&mut entry.send_meta1, 117, 117);
        at(&mut entry.send_meta0, 116, 116);
        at(&mut entry.casc_port, 115, 113);
        at(&mut entry.host_port, 112, 110);
        at(&mut entry.mirr_port, 109, 107);
        at(&mut entry.vlmarker, 106, 75);
        at(&mut entry.vlmask, 74, 43);
        at(&mut entry.tpid, 42, 27);
        at(&mut entry.ignore2stf, 26, 26);
        at(&mut entry.tpid2, 25, 10);
    }

    pub fn packing_et(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_GENERAL_PARAMS_ENTRY_ET];
        Self::common(buf, entry, 0, op);
        SIZE_GENERAL_PARAMS_ENTRY_ET
    }

    pub fn packing_pqrs(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_GENERAL_PARAMS_ENTRY_PQRS];
        Self::common(buf, entry, 32, op);
        field(buf, &mut entry.queue_ts, 41, 41, op);
        field(buf, &mut entry.egrmirrvid, 40, 29, op);
        field(buf, &mut entry.egrmirrpcp, 28, 26, op);
        field(buf, &mut entry.egrmirrdei, 25, 25, op);
        field(buf, &mut entry.replay_port, 24, 22, op);
        SIZE_GENERAL_PARAMS_ENTRY_PQRS
    }
}

/// Destination and source MACs of the meta frames that carry PTP timestamps
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AvbParamsEntry {
    pub l2cbs: u64,
    pub cas_master: u64,
    pub destmeta: u64,
    pub srcmeta: u64,
}

impl AvbParamsEntry {
    pub fn packing_et(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_AVB_PARAMS_ENTRY_ET];
        field(buf, &mut entry.destmeta, 95, 48, op);
        field(buf, &mut entry.srcmeta, 47, 0, op);
        SIZE_AVB_PARAMS_ENTRY_ET
    }

    pub fn packing_pqrs(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_AVB_PARAMS_ENTRY_PQRS];
        field(buf, &mut entry.l2cbs, 127, 127, op);
        field(buf, &mut entry.cas_master, 126, 126, op);
        field(buf, &mut entry.destmeta, 125, 78, op);
        field(buf, &mut entry.srcmeta, 77, 33, op);
        SIZE_AVB_PARAMS_ENTRY_PQRS
    }
}

/// TTEthernet clock synchronization parameters
///
/// The record is kept in memory only. Its packed form is all zeroes and unpacking leaves
/// the entry untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClkSyncParamsEntry {
    pub etssrcpcf: u64,
    pub waitthsync: u64,
    pub wfintmout: u64,
    pub unsytotsyth: u64,
    pub unsytosyth: u64,
    pub tsytosyth: u64,
    pub tsyth: u64,
    pub tsytousyth: u64,
    pub syth: u64,
    pub sytousyth: u64,
    pub sypriority: u64,
    pub sydomain: u64,
    pub stth: u64,
    pub sttointth: u64,
    pub pcfsze: u64,
    pub pcfpriority: u64,
    pub obvwinsz: u64,
    pub numunstbcy: u64,
    pub numstbcy: u64,
    pub maxtranspclk: u64,
    pub maxintegcy: u64,
    pub listentmout: u64,
    pub intcydur: u64,
    pub inttotentth: u64,
    pub vlidout: u64,
    pub vlidimnmin: u64,
    pub vlidinmax: u64,
    pub caentmout: u64,
    pub accdevwin: u64,
    pub vlidselect: u64,
    pub tentsyrelen: u64,
    pub asytensyen: u64,
    pub sytostben: u64,
    pub syrelen: u64,
    pub sysyen: u64,
    pub syasyen: u64,
    pub ipcframesy: u64,
    pub stabasyen: u64,
    pub swmaster: u64,
    pub fullcbg: u64,
    pub srcport: [u64; 8],
}

impl ClkSyncParamsEntry {
    pub fn packing(_buf: &mut [u8], _entry: &mut Self, _op: PackingOp) -> usize {
        SIZE_CLK_SYNC_PARAMS_ENTRY
    }
}
