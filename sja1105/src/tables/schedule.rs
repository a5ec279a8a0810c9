//! Time-triggered scheduling tables (SJA1105T and SJA1105Q/S only)

use crate::packing::{field, PackingOp};

use super::{
    SIZE_SCHEDULE_ENTRY, SIZE_SCHEDULE_ENTRY_POINTS_ENTRY, SIZE_SCHEDULE_ENTRY_POINTS_PARAMS_ENTRY,
    SIZE_SCHEDULE_PARAMS_ENTRY,
};

/// One timeslot of the time-aware scheduler
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub winstindex: u64,
    pub winend: u64,
    pub winst: u64,
    pub destports: u64,
    pub setvalid: u64,
    pub txen: u64,
    pub resmedia_en: u64,
    pub resmedia: u64,
    pub vlindex: u64,
    pub delta: u64,
}

impl ScheduleEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_SCHEDULE_ENTRY];
        field(buf, &mut entry.winstindex, 63, 54, op);
        field(buf, &mut entry.winend, 53, 53, op);
        field(buf, &mut entry.winst, 52, 52, op);
        field(buf, &mut entry.destports, 51, 47, op);
        field(buf, &mut entry.setvalid, 46, 46, op);
        field(buf, &mut entry.txen, 45, 45, op);
        field(buf, &mut entry.resmedia_en, 44, 44, op);
        field(buf, &mut entry.resmedia, 43, 36, op);
        field(buf, &mut entry.vlindex, 35, 26, op);
        field(buf, &mut entry.delta, 25, 8, op);
        SIZE_SCHEDULE_ENTRY
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntryPointsEntry {
    pub subschindx: u64,
    pub delta: u64,
    pub address: u64,
}

impl ScheduleEntryPointsEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_SCHEDULE_ENTRY_POINTS_ENTRY];
        field(buf, &mut entry.subschindx, 31, 29, op);
        field(buf, &mut entry.delta, 28, 11, op);
        field(buf, &mut entry.address, 10, 1, op);
        SIZE_SCHEDULE_ENTRY_POINTS_ENTRY
    }
}

/// Index of the last timeslot of each of the 8 subschedules
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleParamsEntry {
    pub subscheind: [u64; 8],
}

impl ScheduleParamsEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_SCHEDULE_PARAMS_ENTRY];
        for (i, subscheind) in entry.subscheind.iter_mut().enumerate() {
            let offset = 16 + 10 * i;
            field(buf, subscheind, offset + 9, offset, op);
        }
        SIZE_SCHEDULE_PARAMS_ENTRY
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntryPointsParamsEntry {
    pub clksrc: u64,
    pub actsubsch: u64,
}

impl ScheduleEntryPointsParamsEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_SCHEDULE_ENTRY_POINTS_PARAMS_ENTRY];
        field(buf, &mut entry.clksrc, 31, 30, op);
        field(buf, &mut entry.actsubsch, 29, 27, op);
        SIZE_SCHEDULE_ENTRY_POINTS_PARAMS_ENTRY
    }
}
