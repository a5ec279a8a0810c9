//! xMII clock setup for the switch ports
//!
//! The clock generation unit (CGU) feeds each port's transmit and receive clocks from a port
//! clock pin, one of the PLLs, or a per-port integer divider (IDIV) of the 25 MHz oscillator.
//! Which source a port needs follows from its xMII mode and role in the static config, and for
//! RGMII from the link speed in its MAC configuration. RGMII ports also get their TX pads set
//! up through the auxiliary control unit (ACU).

use std::io;

use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::device::{Generation, Variant};
use crate::packing::{field, PackingOp};
use crate::spi::{send_packed_buf, SpiOp, SpiTransport};
use crate::static_config::StaticConfig;
use crate::tables::{BlockIndex, PhyRole, Speed, XmiiMode, NUM_PORTS};

pub const CGU_ADDR: u64 = 0x10_0000;
pub const ACU_ADDR: u64 = 0x10_0800;

pub const SIZE_CGU_CMD: usize = 4;

const CGU_PLL1_OFFSET: u64 = 0x0A;
const CGU_IDIV_OFFSET: u64 = 0x0B;
const CGU_PORT_CLOCKS_OFFSET: u64 = 0x13;

/// Port that can run SGMII on the R/S
pub const SGMII_PORT: usize = 4;

/// Clock sources selectable in a CGU `clksrc` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClkSrc {
    /// TX_CLK pin of a port
    MiiTx(usize),
    /// RX_CLK pin of a port
    MiiRx(usize),
    Osc25MHz,
    Pll0,
    Pll1,
    Idiv(usize),
}

impl ClkSrc {
    pub fn raw(self) -> u64 {
        match self {
            ClkSrc::MiiTx(port) => 2 * port as u64,
            ClkSrc::MiiRx(port) => 2 * port as u64 + 1,
            ClkSrc::Osc25MHz => 0x0A,
            ClkSrc::Pll0 => 0x0B,
            ClkSrc::Pll1 => 0x0E,
            ClkSrc::Idiv(port) => 0x11 + port as u64,
        }
    }
}

/// The clock sinks the CGU has for every port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortClock {
    MiiTx,
    MiiRx,
    RmiiRef,
    RgmiiTx,
    ExtTx,
    ExtRx,
}

impl PortClock {
    /// CGU register offset of this clock on `port`
    ///
    /// The E/T have an unused register between the RGMII and external clocks of each port.
    pub fn offset(self, generation: Generation, port: usize) -> u64 {
        let slot = match self {
            PortClock::MiiTx => 0,
            PortClock::MiiRx => 1,
            PortClock::RmiiRef => 2,
            PortClock::RgmiiTx => 3,
            PortClock::ExtTx => 4,
            PortClock::ExtRx => 5,
        };
        let (stride, gap) = match generation {
            Generation::Et => (7, u64::from(slot >= 4)),
            Generation::Pqrs => (6, 0),
        };
        CGU_PORT_CLOCKS_OFFSET + stride * port as u64 + slot + gap
    }
}

/// Divider of the 25 MHz oscillator, one per port
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CguIdiv {
    pub clksrc: u64,
    pub autoblock: u64,
    /// Divide-by value minus one
    pub idiv: u64,
    /// Power down
    pub pd: u64,
}

impl CguIdiv {
    pub fn packing(buf: &mut [u8], reg: &mut Self, op: PackingOp) {
        let buf = &mut buf[..SIZE_CGU_CMD];
        field(buf, &mut reg.clksrc, 28, 24, op);
        field(buf, &mut reg.autoblock, 11, 11, op);
        field(buf, &mut reg.idiv, 5, 2, op);
        field(buf, &mut reg.pd, 0, 0, op);
    }
}

/// Source selection of one [`PortClock`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CguMiiControl {
    pub clksrc: u64,
    pub autoblock: u64,
    pub pd: u64,
}

impl CguMiiControl {
    pub fn packing(buf: &mut [u8], reg: &mut Self, op: PackingOp) {
        let buf = &mut buf[..SIZE_CGU_CMD];
        field(buf, &mut reg.clksrc, 28, 24, op);
        field(buf, &mut reg.autoblock, 11, 11, op);
        field(buf, &mut reg.pd, 0, 0, op);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CguPllControl {
    pub pllclksrc: u64,
    pub msel: u64,
    /// P/Q/R/S only
    pub nsel: u64,
    pub autoblock: u64,
    pub psel: u64,
    pub direct: u64,
    pub fbsel: u64,
    /// P/Q/R/S only
    pub p23en: u64,
    pub bypass: u64,
    pub pd: u64,
}

impl CguPllControl {
    pub fn packing_et(buf: &mut [u8], reg: &mut Self, op: PackingOp) {
        let buf = &mut buf[..SIZE_CGU_CMD];
        field(buf, &mut reg.pllclksrc, 28, 24, op);
        field(buf, &mut reg.msel, 23, 16, op);
        field(buf, &mut reg.autoblock, 11, 11, op);
        field(buf, &mut reg.psel, 9, 8, op);
        field(buf, &mut reg.direct, 7, 7, op);
        field(buf, &mut reg.fbsel, 6, 6, op);
        field(buf, &mut reg.bypass, 1, 1, op);
        field(buf, &mut reg.pd, 0, 0, op);
    }

    pub fn packing_pqrs(buf: &mut [u8], reg: &mut Self, op: PackingOp) {
        Self::packing_et(buf, reg, op);
        let buf = &mut buf[..SIZE_CGU_CMD];
        field(buf, &mut reg.nsel, 13, 12, op);
        field(buf, &mut reg.p23en, 2, 2, op);
    }
}

/// TX pad configuration of an RGMII port, in the ACU
///
/// `*_os` select the output stage, `*_ipud` the input stage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CfgPadMiiTx {
    pub d32_os: u64,
    pub d32_ipud: u64,
    pub d10_os: u64,
    pub d10_ipud: u64,
    pub ctrl_os: u64,
    pub ctrl_ipud: u64,
    pub clk_os: u64,
    /// Input hysteresis of TX_CLK
    pub clk_ih: u64,
    pub clk_ipud: u64,
}

impl CfgPadMiiTx {
    /// High speed outputs, plain inputs
    pub fn rgmii() -> Self {
        CfgPadMiiTx {
            d32_os: 3,
            d32_ipud: 2,
            d10_os: 3,
            d10_ipud: 2,
            ctrl_os: 3,
            ctrl_ipud: 2,
            clk_os: 3,
            clk_ih: 0,
            clk_ipud: 2,
        }
    }

    pub fn packing(buf: &mut [u8], reg: &mut Self, op: PackingOp) {
        let buf = &mut buf[..SIZE_CGU_CMD];
        field(buf, &mut reg.d32_os, 28, 27, op);
        field(buf, &mut reg.d32_ipud, 25, 24, op);
        field(buf, &mut reg.d10_os, 20, 19, op);
        field(buf, &mut reg.d10_ipud, 17, 16, op);
        field(buf, &mut reg.ctrl_os, 12, 11, op);
        field(buf, &mut reg.ctrl_ipud, 9, 8, op);
        field(buf, &mut reg.clk_os, 4, 3, op);
        field(buf, &mut reg.clk_ih, 2, 2, op);
        field(buf, &mut reg.clk_ipud, 1, 0, op);
    }
}

#[derive(Error, Debug)]
pub enum ClockingError {
    #[error("port {port} does not exist")]
    NoSuchPort { port: usize },
    #[error("static config has no {0} table")]
    MissingTable(BlockIndex),
    #[error("port {port}: invalid xMII mode {mode}")]
    InvalidMode { port: usize, mode: u64 },
    #[error("port {port}: xMII role must be MAC or PHY, got {role}")]
    InvalidRole { port: usize, role: u64 },
    #[error("port {port}: invalid RGMII speed {speed}")]
    InvalidSpeed { port: usize, speed: u64 },
    #[error("SGMII is not supported on the {0}")]
    SgmiiUnsupported(Variant),
    #[error(transparent)]
    Transport(#[from] io::Error),
}

async fn write_reg<T: SpiTransport, R>(
    spi: &mut T,
    address: u64,
    reg: &mut R,
    packing: fn(&mut [u8], &mut R, PackingOp),
) -> io::Result<()> {
    let mut buf = [0u8; SIZE_CGU_CMD];
    packing(&mut buf, reg, PackingOp::Pack);
    trace!(address, value = u32::from_be_bytes(buf), "Clock register write");
    send_packed_buf(spi, SpiOp::Write, address, &mut buf).await
}

/// Powers the divider of `port` up or down; `factor` is 1 or 10
async fn idiv_config<T: SpiTransport>(
    spi: &mut T,
    port: usize,
    enabled: bool,
    factor: u64,
) -> io::Result<()> {
    let mut reg = CguIdiv {
        clksrc: ClkSrc::Osc25MHz.raw(),
        autoblock: 1,
        idiv: factor - 1,
        pd: u64::from(!enabled),
    };
    write_reg(spi, CGU_ADDR + CGU_IDIV_OFFSET + port as u64, &mut reg, CguIdiv::packing).await
}

async fn route<T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    port: usize,
    sink: PortClock,
    source: ClkSrc,
) -> io::Result<()> {
    let mut reg = CguMiiControl {
        clksrc: source.raw(),
        autoblock: 1,
        pd: 0,
    };
    let address = CGU_ADDR + sink.offset(generation, port);
    write_reg(spi, address, &mut reg, CguMiiControl::packing).await
}

async fn mii_clocking<T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    port: usize,
    role: PhyRole,
) -> io::Result<()> {
    debug!(port, ?role, "Configuring MII clocking");
    // A PHY-mode port sources both its clocks
    idiv_config(spi, port, role == PhyRole::Phy, 1).await?;
    let tx = match role {
        PhyRole::Mac => ClkSrc::MiiTx(port),
        PhyRole::Phy => ClkSrc::Idiv(port),
    };
    route(spi, generation, port, PortClock::MiiTx, tx).await?;
    route(spi, generation, port, PortClock::MiiRx, ClkSrc::MiiRx(port)).await?;
    if role == PhyRole::Phy {
        route(spi, generation, port, PortClock::ExtTx, ClkSrc::Idiv(port)).await?;
        route(spi, generation, port, PortClock::ExtRx, ClkSrc::Idiv(port)).await?;
    }
    Ok(())
}

/// Sets PLL1 to 50 MHz for the RMII reference clock
async fn rmii_pll_config<T: SpiTransport>(spi: &mut T, generation: Generation) -> io::Result<()> {
    let mut pll = CguPllControl {
        pllclksrc: ClkSrc::Osc25MHz.raw(),
        msel: 1,
        autoblock: 1,
        psel: 1,
        direct: 0,
        fbsel: 1,
        bypass: 0,
        pd: 1,
        nsel: 0,
        p23en: 0,
    };
    let packing = match generation {
        Generation::Et => CguPllControl::packing_et,
        Generation::Pqrs => CguPllControl::packing_pqrs,
    };
    let address = CGU_ADDR + CGU_PLL1_OFFSET;
    // Program while powered down, then power up
    write_reg(spi, address, &mut pll, packing).await?;
    pll.pd = 0;
    write_reg(spi, address, &mut pll, packing).await
}

async fn rmii_clocking<T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    port: usize,
    role: PhyRole,
) -> io::Result<()> {
    debug!(port, ?role, "Configuring RMII clocking");
    if role == PhyRole::Mac {
        rmii_pll_config(spi, generation).await?;
    }
    idiv_config(spi, port, false, 1).await?;
    route(spi, generation, port, PortClock::RmiiRef, ClkSrc::MiiTx(port)).await?;
    if role == PhyRole::Mac {
        route(spi, generation, port, PortClock::ExtTx, ClkSrc::Pll1).await?;
    }
    Ok(())
}

async fn rgmii_clocking<T: SpiTransport>(
    spi: &mut T,
    generation: Generation,
    port: usize,
    speed: Speed,
) -> io::Result<()> {
    debug!(port, ?speed, "Configuring RGMII clocking");
    let (enabled, factor) = match speed {
        Speed::Gbps1 => (false, 1),
        Speed::Mbps100 => (true, 1),
        Speed::Mbps10 => (true, 10),
        Speed::Auto => {
            debug!(port, "Speed not available, skipping CGU config");
            return Ok(());
        }
    };
    idiv_config(spi, port, enabled, factor).await?;
    let tx = match speed {
        Speed::Gbps1 => ClkSrc::Pll0,
        _ => ClkSrc::Idiv(port),
    };
    route(spi, generation, port, PortClock::RgmiiTx, tx).await?;
    let mut pad = CfgPadMiiTx::rgmii();
    write_reg(spi, ACU_ADDR + 2 * port as u64, &mut pad, CfgPadMiiTx::packing).await
}

async fn setup_port_inner<T: SpiTransport>(
    spi: &mut T,
    variant: Variant,
    config: &StaticConfig,
    port: usize,
) -> Result<(), ClockingError> {
    if port >= NUM_PORTS {
        return Err(ClockingError::NoSuchPort { port });
    }
    let xmii = config
        .tables
        .xmii_params
        .entries()
        .first()
        .ok_or(ClockingError::MissingTable(BlockIndex::XmiiParams))?;
    let generation = variant.generation();
    let mode = xmii.xmii_mode[port];
    let role = || {
        xmii.role(port).ok_or(ClockingError::InvalidRole {
            port,
            role: xmii.phy_mac[port],
        })
    };

    match xmii.mode(port) {
        Some(XmiiMode::Mii) => mii_clocking(spi, generation, port, role()?).await?,
        Some(XmiiMode::Rmii) => rmii_clocking(spi, generation, port, role()?).await?,
        Some(XmiiMode::Rgmii) => {
            let mac = config
                .tables
                .mac_config
                .entries()
                .get(port)
                .ok_or(ClockingError::MissingTable(BlockIndex::MacConfig))?;
            let speed = mac.speed().ok_or(ClockingError::InvalidSpeed {
                port,
                speed: mac.speed,
            })?;
            rgmii_clocking(spi, generation, port, speed).await?
        }
        Some(XmiiMode::Sgmii) => {
            if generation == Generation::Et {
                return Err(ClockingError::SgmiiUnsupported(variant));
            }
            if variant.has_sgmii() && port == SGMII_PORT {
                debug!(port, "No CGU setup for the SGMII port");
            } else {
                info!(port, "Port is tri-stated");
            }
        }
        None => return Err(ClockingError::InvalidMode { port, mode }),
    }
    Ok(())
}

/// Programs the clocks of one port as its xMII mode and role in `config` require
pub async fn setup_port<T: SpiTransport>(
    spi: &mut T,
    variant: Variant,
    config: &StaticConfig,
    port: usize,
) -> Result<(), ClockingError> {
    setup_port_inner(spi, variant, config, port).await.map_err(|e| {
        error!(port, %e, "Clocking setup failed");
        e
    })
}

/// [`setup_port`] for every port, stopping at the first failure
pub async fn setup<T: SpiTransport>(
    spi: &mut T,
    variant: Variant,
    config: &StaticConfig,
) -> Result<(), ClockingError> {
    for port in 0..NUM_PORTS {
        setup_port(spi, variant, config, port).await?;
    }
    Ok(())
}
