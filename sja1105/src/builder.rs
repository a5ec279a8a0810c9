//! A minimal working configuration: every port talks only to the upstream (CPU) port

use tracing::debug;

use crate::device::Variant;
use crate::static_config::StaticConfig;
use crate::tables::*;

/// Egress queue partitioning: 64 blocks for each of the 8 queues, 511 in total
const MAC_TOP: [u64; NUM_TC] = [0x3F, 0x7F, 0xBF, 0xFF, 0x13F, 0x17F, 0x1BF, 0x1FF];
const MAC_BASE: [u64; NUM_TC] = [0x0, 0x40, 0x80, 0xC0, 0x100, 0x140, 0x180, 0x1C0];

/// IEEE 802.3 Annex 57A slow protocols and link-local frames
const LINK_LOCAL_DMAC: u64 = 0x0180_C200_0000;
/// IEEE 1588 Annex F, PTP over Ethernet
const PTP_DMAC: u64 = 0x011B_1900_0000;
const DMAC_MASK: u64 = 0xFFFF_FF00_0000;

const ETH_P_8021Q: u64 = 0x8100;
/// Standard frame plus VLAN tag and FCS
const MAX_FRAME_LEN: u64 = 1514 + 4 + 4;
/// 1 Gbps in policer units
const POLICER_RATE: u64 = 64000;

fn allow_traffic(l2_fwd: &mut [L2ForwardingEntry], from: usize, to: usize) {
    l2_fwd[from].bc_domain |= 1 << to;
    l2_fwd[from].reach_port |= 1 << to;
    l2_fwd[from].fl_domain |= 1 << to;
}

fn mac_config(upstream: bool) -> MacConfigEntry {
    let mut mac = MacConfigEntry {
        top: MAC_TOP,
        base: MAC_BASE,
        enabled: [1; NUM_TC],
        maxage: 0xFF,
        dyn_learn: 1,
        ..Default::default()
    };
    mac.set_speed(Speed::Auto);
    // Nothing runs STP on the CPU port, so open it up front
    if upstream {
        mac.ingress = 1;
        mac.egress = 1;
    }
    mac
}

fn l2_forwarding(upstream: usize) -> Vec<L2ForwardingEntry> {
    let mut l2_fwd = vec![L2ForwardingEntry::default(); MAX_L2_FORWARDING_COUNT];
    for port in 0..NUM_PORTS {
        for (tc, pmap) in l2_fwd[port].vlan_pmap.iter_mut().enumerate() {
            *pmap = tc as u64;
        }
        if port != upstream {
            allow_traffic(&mut l2_fwd, port, upstream);
            allow_traffic(&mut l2_fwd, upstream, port);
        }
    }
    // Egress priority remapping rows, one per traffic class
    for tc in 0..NUM_TC {
        for port in 0..NUM_PORTS {
            l2_fwd[NUM_PORTS + tc].vlan_pmap[port] = tc as u64;
        }
    }
    l2_fwd
}

fn l2_policing() -> Vec<L2PolicingEntry> {
    (0..MAX_L2_POLICING_COUNT as u64)
        .map(|index| L2PolicingEntry {
            sharindx: index,
            smax: 65535,
            rate: POLICER_RATE,
            maxlen: MAX_FRAME_LEN,
            partition: 0,
        })
        .collect()
}

fn general_params(upstream: u64) -> GeneralParamsEntry {
    GeneralParamsEntry {
        mac_fltres1: LINK_LOCAL_DMAC,
        mac_flt1: DMAC_MASK,
        incl_srcpt1: 1,
        mac_fltres0: PTP_DMAC,
        mac_flt0: DMAC_MASK,
        incl_srcpt0: 1,
        host_port: upstream,
        mirr_port: upstream,
        // No cascaded switch, point it past the last port
        casc_port: NUM_PORTS as u64,
        tpid: ETH_P_8021Q,
        tpid2: ETH_P_8021Q,
        ..Default::default()
    }
}

/// Builds a configuration that passes [`StaticConfig::check_valid`]
///
/// `upstream` is the port facing the host CPU, `xmii` the per-port interface mode and role.
pub fn default_config(
    variant: Variant,
    upstream: usize,
    xmii: [(XmiiMode, PhyRole); NUM_PORTS],
) -> Result<StaticConfig, TableError> {
    if upstream >= NUM_PORTS {
        return Err(TableError::OutOfRange {
            block: BlockIndex::L2Forwarding,
            index: upstream,
            count: NUM_PORTS,
        });
    }
    let mut config = StaticConfig::for_variant(variant);
    let tables = &mut config.tables;

    tables.mac_config.set_entries(
        (0..NUM_PORTS)
            .map(|port| mac_config(port == upstream))
            .collect(),
    )?;
    tables.vlan_lookup.set_entries(vec![VlanLookupEntry {
        vmemb_port: (1 << NUM_PORTS) - 1,
        vlan_bc: (1 << NUM_PORTS) - 1,
        tag_port: 0,
        vlanid: 0,
        ..Default::default()
    }])?;
    tables.l2_lookup_params.set_entries(vec![L2LookupParamsEntry {
        maxage: 0,
        dyn_tbsz: 4,
        poly: 0x97,
        shared_learn: 0,
        no_enf_hostprt: 0,
        no_mgmt_learn: 1,
        ..Default::default()
    }])?;
    tables.l2_forwarding.set_entries(l2_forwarding(upstream))?;
    tables
        .l2_forwarding_params
        .set_entries(vec![L2ForwardingParamsEntry {
            max_dynp: 0,
            part_spc: [MAX_FRAME_MEMORY, 0, 0, 0, 0, 0, 0, 0],
        }])?;
    tables
        .general_params
        .set_entries(vec![general_params(upstream as u64)])?;
    tables.l2_policing.set_entries(l2_policing())?;
    tables
        .xmii_params
        .set_entries(vec![XmiiParamsEntry::new(xmii)])?;

    debug!(%variant, upstream, "Built default static config");
    Ok(config)
}
