//! Per-variant table layouts
//!
//! The first generation (E/T) and second generation (P/Q/R/S) share most codecs. They differ
//! in the FDB, MAC, general, AVB and L2 lookup parameter layouts. TTEthernet variants add the
//! schedule and virtual link tables, and R/S add the SGMII table.

use crate::device::Variant;
use crate::tables::*;

const L2_LOOKUP_ET: TableOps<L2LookupEntry> = TableOps::new(
    L2LookupEntry::packing_et,
    SIZE_L2_LOOKUP_ENTRY_ET,
    MAX_L2_LOOKUP_COUNT,
);
const L2_LOOKUP_PQRS: TableOps<L2LookupEntry> = TableOps::new(
    L2LookupEntry::packing_pqrs,
    SIZE_L2_LOOKUP_ENTRY_PQRS,
    MAX_L2_LOOKUP_COUNT,
);
const MAC_CONFIG_ET: TableOps<MacConfigEntry> = TableOps::new(
    MacConfigEntry::packing_et,
    SIZE_MAC_CONFIG_ENTRY_ET,
    MAX_MAC_CONFIG_COUNT,
);
const MAC_CONFIG_PQRS: TableOps<MacConfigEntry> = TableOps::new(
    MacConfigEntry::packing_pqrs,
    SIZE_MAC_CONFIG_ENTRY_PQRS,
    MAX_MAC_CONFIG_COUNT,
);
const L2_LOOKUP_PARAMS_ET: TableOps<L2LookupParamsEntry> = TableOps::new(
    L2LookupParamsEntry::packing_et,
    SIZE_L2_LOOKUP_PARAMS_ENTRY_ET,
    MAX_L2_LOOKUP_PARAMS_COUNT,
);
const L2_LOOKUP_PARAMS_PQRS: TableOps<L2LookupParamsEntry> = TableOps::new(
    L2LookupParamsEntry::packing_pqrs,
    SIZE_L2_LOOKUP_PARAMS_ENTRY_PQRS,
    MAX_L2_LOOKUP_PARAMS_COUNT,
);
const AVB_PARAMS_ET: TableOps<AvbParamsEntry> = TableOps::new(
    AvbParamsEntry::packing_et,
    SIZE_AVB_PARAMS_ENTRY_ET,
    MAX_AVB_PARAMS_COUNT,
);
const AVB_PARAMS_PQRS: TableOps<AvbParamsEntry> = TableOps::new(
    AvbParamsEntry::packing_pqrs,
    SIZE_AVB_PARAMS_ENTRY_PQRS,
    MAX_AVB_PARAMS_COUNT,
);
const GENERAL_PARAMS_ET: TableOps<GeneralParamsEntry> = TableOps::new(
    GeneralParamsEntry::packing_et,
    SIZE_GENERAL_PARAMS_ENTRY_ET,
    MAX_GENERAL_PARAMS_COUNT,
);
const GENERAL_PARAMS_PQRS: TableOps<GeneralParamsEntry> = TableOps::new(
    GeneralParamsEntry::packing_pqrs,
    SIZE_GENERAL_PARAMS_ENTRY_PQRS,
    MAX_GENERAL_PARAMS_COUNT,
);

/// SJA1105E: the baseline every other variant is derived from
const E_OPS: StaticOps = StaticOps {
    schedule: TableOps::UNSUPPORTED,
    schedule_entry_points: TableOps::UNSUPPORTED,
    vl_lookup: TableOps::UNSUPPORTED,
    vl_policing: TableOps::UNSUPPORTED,
    vl_forwarding: TableOps::UNSUPPORTED,
    l2_lookup: L2_LOOKUP_ET,
    l2_policing: TableOps::new(
        L2PolicingEntry::packing,
        SIZE_L2_POLICING_ENTRY,
        MAX_L2_POLICING_COUNT,
    ),
    vlan_lookup: TableOps::new(
        VlanLookupEntry::packing,
        SIZE_VLAN_LOOKUP_ENTRY,
        MAX_VLAN_LOOKUP_COUNT,
    ),
    l2_forwarding: TableOps::new(
        L2ForwardingEntry::packing,
        SIZE_L2_FORWARDING_ENTRY,
        MAX_L2_FORWARDING_COUNT,
    ),
    mac_config: MAC_CONFIG_ET,
    schedule_params: TableOps::UNSUPPORTED,
    schedule_entry_points_params: TableOps::UNSUPPORTED,
    vl_forwarding_params: TableOps::UNSUPPORTED,
    l2_lookup_params: L2_LOOKUP_PARAMS_ET,
    l2_forwarding_params: TableOps::new(
        L2ForwardingParamsEntry::packing,
        SIZE_L2_FORWARDING_PARAMS_ENTRY,
        MAX_L2_FORWARDING_PARAMS_COUNT,
    ),
    clk_sync_params: TableOps::UNSUPPORTED,
    avb_params: AVB_PARAMS_ET,
    general_params: GENERAL_PARAMS_ET,
    retagging: TableOps::new(
        RetaggingEntry::packing,
        SIZE_RETAGGING_ENTRY,
        MAX_RETAGGING_COUNT,
    ),
    xmii_params: TableOps::new(
        XmiiParamsEntry::packing,
        SIZE_XMII_PARAMS_ENTRY,
        MAX_XMII_PARAMS_COUNT,
    ),
    sgmii: TableOps::UNSUPPORTED,
};

/// SJA1105T: E plus TTEthernet
const T_OPS: StaticOps = StaticOps {
    schedule: TableOps::new(
        ScheduleEntry::packing,
        SIZE_SCHEDULE_ENTRY,
        MAX_SCHEDULE_COUNT,
    ),
    schedule_entry_points: TableOps::new(
        ScheduleEntryPointsEntry::packing,
        SIZE_SCHEDULE_ENTRY_POINTS_ENTRY,
        MAX_SCHEDULE_ENTRY_POINTS_COUNT,
    ),
    vl_lookup: TableOps::new(
        VlLookupEntry::packing,
        SIZE_VL_LOOKUP_ENTRY,
        MAX_VL_LOOKUP_COUNT,
    ),
    vl_policing: TableOps::new(
        VlPolicingEntry::packing,
        SIZE_VL_POLICING_ENTRY,
        MAX_VL_POLICING_COUNT,
    ),
    vl_forwarding: TableOps::new(
        VlForwardingEntry::packing,
        SIZE_VL_FORWARDING_ENTRY,
        MAX_VL_FORWARDING_COUNT,
    ),
    schedule_params: TableOps::new(
        ScheduleParamsEntry::packing,
        SIZE_SCHEDULE_PARAMS_ENTRY,
        MAX_SCHEDULE_PARAMS_COUNT,
    ),
    schedule_entry_points_params: TableOps::new(
        ScheduleEntryPointsParamsEntry::packing,
        SIZE_SCHEDULE_ENTRY_POINTS_PARAMS_ENTRY,
        MAX_SCHEDULE_ENTRY_POINTS_PARAMS_COUNT,
    ),
    vl_forwarding_params: TableOps::new(
        VlForwardingParamsEntry::packing,
        SIZE_VL_FORWARDING_PARAMS_ENTRY,
        MAX_VL_FORWARDING_PARAMS_COUNT,
    ),
    clk_sync_params: TableOps::new(
        ClkSyncParamsEntry::packing,
        SIZE_CLK_SYNC_PARAMS_ENTRY,
        MAX_CLK_SYNC_COUNT,
    ),
    ..E_OPS
};

/// SJA1105P: E with the second generation layouts
const P_OPS: StaticOps = StaticOps {
    l2_lookup: L2_LOOKUP_PQRS,
    mac_config: MAC_CONFIG_PQRS,
    l2_lookup_params: L2_LOOKUP_PARAMS_PQRS,
    avb_params: AVB_PARAMS_PQRS,
    general_params: GENERAL_PARAMS_PQRS,
    ..E_OPS
};

/// SJA1105Q: T with the second generation layouts
const Q_OPS: StaticOps = StaticOps {
    l2_lookup: L2_LOOKUP_PQRS,
    mac_config: MAC_CONFIG_PQRS,
    l2_lookup_params: L2_LOOKUP_PARAMS_PQRS,
    avb_params: AVB_PARAMS_PQRS,
    general_params: GENERAL_PARAMS_PQRS,
    ..T_OPS
};

const SGMII: TableOps<SgmiiEntry> =
    TableOps::new(SgmiiEntry::packing, SIZE_SGMII_ENTRY, MAX_SGMII_COUNT);

pub static SJA1105E_TABLE_OPS: StaticOps = E_OPS;
pub static SJA1105T_TABLE_OPS: StaticOps = T_OPS;
pub static SJA1105P_TABLE_OPS: StaticOps = P_OPS;
pub static SJA1105Q_TABLE_OPS: StaticOps = Q_OPS;
pub static SJA1105R_TABLE_OPS: StaticOps = StaticOps { sgmii: SGMII, ..P_OPS };
pub static SJA1105S_TABLE_OPS: StaticOps = StaticOps { sgmii: SGMII, ..Q_OPS };

impl Variant {
    /// The table layouts this chip uses
    pub fn static_ops(self) -> &'static StaticOps {
        match self {
            Variant::E => &SJA1105E_TABLE_OPS,
            Variant::T => &SJA1105T_TABLE_OPS,
            Variant::P => &SJA1105P_TABLE_OPS,
            Variant::Q => &SJA1105Q_TABLE_OPS,
            Variant::R => &SJA1105R_TABLE_OPS,
            Variant::S => &SJA1105S_TABLE_OPS,
        }
    }
}
