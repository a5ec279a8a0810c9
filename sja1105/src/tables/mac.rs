//! Per-port MAC, xMII and SGMII PCS configuration

use packed_struct::prelude::*;

use crate::packing::{field, PackingOp};

use super::{
    NUM_PORTS, NUM_TC, SIZE_MAC_CONFIG_ENTRY_ET, SIZE_MAC_CONFIG_ENTRY_PQRS, SIZE_SGMII_ENTRY,
    SIZE_XMII_PARAMS_ENTRY,
};

/// Link speed as encoded in the MAC configuration `speed` field
#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    /// Taken from the PHY/CGU at runtime
    Auto = 0,
    Gbps1 = 1,
    Mbps100 = 2,
    Mbps10 = 3,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum XmiiMode {
    Mii = 0,
    Rmii = 1,
    Rgmii = 2,
    /// SGMII on port 4 of the R/S, tri-stated on the other ports
    Sgmii = 3,
}

/// Which side of the xMII link the port plays
#[derive(PrimitiveEnum_u8, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhyRole {
    Mac = 0,
    Phy = 1,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MacConfigEntry {
    /// Last frame memory block of each egress queue
    pub top: [u64; NUM_TC],
    /// First frame memory block of each egress queue
    pub base: [u64; NUM_TC],
    pub enabled: [u64; NUM_TC],
    pub ifg: u64,
    pub speed: u64,
    pub tp_delin: u64,
    pub tp_delout: u64,
    pub maxage: u64,
    pub vlanprio: u64,
    pub vlanid: u64,
    pub ing_mirr: u64,
    pub egr_mirr: u64,
    pub drpnona664: u64,
    pub drpdtag: u64,
    pub drpsotag: u64,
    pub drpsitag: u64,
    pub drpuntag: u64,
    pub retag: u64,
    pub dyn_learn: u64,
    pub egress: u64,
    pub ingress: u64,
    pub mirrcie: u64,
    pub mirrcetag: u64,
    pub ingmirrvid: u64,
    pub ingmirrpcp: u64,
    pub ingmirrdei: u64,
}

impl MacConfigEntry {
    pub fn speed(&self) -> Option<Speed> {
        u8::try_from(self.speed).ok().and_then(Speed::from_primitive)
    }

    pub fn set_speed(&mut self, speed: Speed) {
        self.speed = u64::from(speed.to_primitive());
    }

    fn queues(buf: &mut [u8], entry: &mut Self, first: usize, op: PackingOp) {
        for i in 0..NUM_TC {
            let offset = first + 19 * i;
            field(buf, &mut entry.enabled[i], offset, offset, op);
            field(buf, &mut entry.base[i], offset + 9, offset + 1, op);
            field(buf, &mut entry.top[i], offset + 18, offset + 10, op);
        }
    }

    pub fn packing_et(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_MAC_CONFIG_ENTRY_ET];
        Self::queues(buf, entry, 72, op);
        field(buf, &mut entry.ifg, 71, 67, op);
        field(buf, &mut entry.speed, 66, 65, op);
        field(buf, &mut entry.tp_delin, 64, 49, op);
        field(buf, &mut entry.tp_delout, 48, 33, op);
        field(buf, &mut entry.maxage, 32, 25, op);
        field(buf, &mut entry.vlanprio, 24, 22, op);
        field(buf, &mut entry.vlanid, 21, 10, op);
        field(buf, &mut entry.ing_mirr, 9, 9, op);
        field(buf, &mut entry.egr_mirr, 8, 8, op);
        field(buf, &mut entry.drpnona664, 7, 7, op);
        field(buf, &mut entry.drpdtag, 6, 6, op);
        field(buf, &mut entry.drpuntag, 5, 5, op);
        field(buf, &mut entry.retag, 4, 4, op);
        field(buf, &mut entry.dyn_learn, 3, 3, op);
        field(buf, &mut entry.egress, 2, 2, op);
        field(buf, &mut entry.ingress, 1, 1, op);
        SIZE_MAC_CONFIG_ENTRY_ET
    }

    pub fn packing_pqrs(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_MAC_CONFIG_ENTRY_PQRS];
        Self::queues(buf, entry, 104, op);
        field(buf, &mut entry.ifg, 103, 99, op);
        field(buf, &mut entry.speed, 98, 97, op);
        field(buf, &mut entry.tp_delin, 96, 81, op);
        field(buf, &mut entry.tp_delout, 80, 65, op);
        field(buf, &mut entry.maxage, 64, 57, op);
        field(buf, &mut entry.vlanprio, 56, 54, op);
        field(buf, &mut entry.vlanid, 53, 42, op);
        field(buf, &mut entry.ing_mirr, 41, 41, op);
        field(buf, &mut entry.egr_mirr, 40, 40, op);
        field(buf, &mut entry.drpnona664, 39, 39, op);
        field(buf, &mut entry.drpdtag, 38, 38, op);
        field(buf, &mut entry.drpsotag, 37, 37, op);
        field(buf, &mut entry.drpsitag, 36, 36, op);
        field(buf, &mut entry.drpuntag, 35, 35, op);
        field(buf, &mut entry.retag, 34, 34, op);
        field(buf, &mut entry.dyn_learn, 33, 33, op);
        field(buf, &mut entry.egress, 32, 32, op);
        field(buf, &mut entry.ingress, 31, 31, op);
        field(buf, &mut entry.mirrcie, 30, 30, op);
        field(buf, &mut entry.mirrcetag, 29, 29, op);
        field(buf, &mut entry.ingmirrvid, 28, 17, op);
        field(buf, &mut entry.ingmirrpcp, 16, 14, op);
        field(buf, &mut entry.ingmirrdei, 13, 13, op);
        SIZE_MAC_CONFIG_ENTRY_PQRS
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct XmiiParamsEntry {
    pub phy_mac: [u64; NUM_PORTS],
    pub xmii_mode: [u64; NUM_PORTS],
}

impl XmiiParamsEntry {
    pub fn new(ports: [(XmiiMode, PhyRole); NUM_PORTS]) -> Self {
        let mut entry = Self::default();
        for (i, (mode, role)) in ports.into_iter().enumerate() {
            entry.xmii_mode[i] = u64::from(mode.to_primitive());
            entry.phy_mac[i] = u64::from(role.to_primitive());
        }
        entry
    }

    pub fn mode(&self, port: usize) -> Option<XmiiMode> {
        let raw = *self.xmii_mode.get(port)?;
        u8::try_from(raw).ok().and_then(XmiiMode::from_primitive)
    }

    pub fn role(&self, port: usize) -> Option<PhyRole> {
        let raw = *self.phy_mac.get(port)?;
        u8::try_from(raw).ok().and_then(PhyRole::from_primitive)
    }

    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_XMII_PARAMS_ENTRY];
        for i in 0..NUM_PORTS {
            let offset = 17 + 3 * i;
            field(buf, &mut entry.xmii_mode[i], offset + 1, offset, op);
            field(buf, &mut entry.phy_mac[i], offset + 2, offset + 2, op);
        }
        SIZE_XMII_PARAMS_ENTRY
    }
}

/// PCS register image of the SGMII port (SJA1105R/S)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SgmiiEntry {
    pub digital_error_cnt: u64,
    pub digital_control_2: u64,
    pub debug_control: u64,
    pub test_control: u64,
    pub autoneg_control: u64,
    pub digital_control_1: u64,
    pub autoneg_adv: u64,
    pub basic_control: u64,
}

/// Start bit and required content of each reserved 32-bit word of the SGMII entry
const SGMII_RESERVED_WORDS: [(usize, u64); 28] = [
    (1087, 0x0000),
    (1055, 0x0000),
    (1023, 0x0000),
    (991, 0x0100),
    (959, 0x023F),
    (927, 0x000A),
    (895, 0x1C22),
    (863, 0x0001),
    (831, 0x0003),
    (799, 0x0000),
    (767, 0x0001),
    (735, 0x0005),
    (703, 0x0101),
    (671, 0x0000),
    (639, 0x0001),
    (607, 0x0000),
    (575, 0x000A),
    (543, 0x0000),
    (511, 0x0000),
    (479, 0x0000),
    (447, 0x0000),
    (415, 0x899C),
    (319, 0x000A),
    (159, 0x0004),
    (127, 0x0000),
    (95, 0x0000),
    (63, 0x0000),
    (31, 0x0000),
];

impl SgmiiEntry {
    pub fn packing(buf: &mut [u8], entry: &mut Self, op: PackingOp) -> usize {
        let buf = &mut buf[..SIZE_SGMII_ENTRY];
        field(buf, &mut entry.digital_error_cnt, 1151, 1120, op);
        field(buf, &mut entry.digital_control_2, 1119, 1088, op);
        field(buf, &mut entry.debug_control, 383, 352, op);
        field(buf, &mut entry.test_control, 351, 320, op);
        field(buf, &mut entry.autoneg_control, 287, 256, op);
        field(buf, &mut entry.digital_control_1, 255, 224, op);
        field(buf, &mut entry.autoneg_adv, 223, 192, op);
        field(buf, &mut entry.basic_control, 191, 160, op);
        if op == PackingOp::Pack {
            for (start, value) in SGMII_RESERVED_WORDS {
                let mut value = value;
                field(buf, &mut value, start, start - 31, op);
            }
        }
        SIZE_SGMII_ENTRY
    }
}
