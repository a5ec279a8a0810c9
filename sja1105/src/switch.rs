//! Talking to a live switch: identification, resets, status and configuration upload

use std::io;

use packed_struct::prelude::*;
use packed_struct::PackingError;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, trace, warn};

use crate::clocking::{self, ClockingError};
use crate::device::{Generation, InitError, Variant, SJA1105_PART_NR_DONT_CARE};
use crate::dynamic_config::{self, DynamicEntry, DynamicError};
use crate::packing::{field, PackingOp};
use crate::register_address;
use crate::spi::{send_int, send_long_packed_buf, send_packed_buf, RegisterAddress, SpiOp, SpiTransport};
use crate::static_config::{seal_for_upload, StaticConfig, Validity};
use crate::tables::{TableError, NUM_PORTS, SIZE_SJA1105_DEVICE_ID};

/// Times a static config is pushed before giving up
pub const UPLOAD_RETRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SwitchAddress {
    DeviceId = 0x0,
    GeneralStatus = 0x1,
    Config = 0x02_0000,
    /// Port 0 of each per-port status area
    PortStatusMac = 0x200,
    PortStatusHl1 = 0x400,
    PortStatusHl2 = 0x600,
    PortStatusQlevel = 0x604,
    ResetCtrl = 0x10_0440,
    ProdId = 0x10_0BC3,
}

impl SwitchAddress {
    /// Address of `port`'s copy of a per-port status area
    pub fn for_port(self, port: usize) -> u64 {
        let stride = match self {
            SwitchAddress::PortStatusMac => 0x2,
            _ => 0x10,
        };
        self as u64 + stride * port as u64
    }
}

/// Reset control register of the E/T
#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "4")]
pub struct EtResetCtrl {
    #[packed_field(bits = "3")]
    cold_rst: bool,
    #[packed_field(bits = "2")]
    warm_rst: bool,
}

register_address! {SwitchAddress, EtResetCtrl, ResetCtrl}

/// Reset control register of the P/Q/R/S
#[derive(PackedStruct, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[packed_struct(bit_numbering = "lsb0", size_bytes = "4")]
pub struct PqrsResetCtrl {
    #[packed_field(bits = "8")]
    switch_rst: bool,
    #[packed_field(bits = "7")]
    cfg_rst: bool,
    #[packed_field(bits = "5")]
    car_rst: bool,
    #[packed_field(bits = "4")]
    otp_rst: bool,
    #[packed_field(bits = "3")]
    warm_rst: bool,
    #[packed_field(bits = "2")]
    cold_rst: bool,
    #[packed_field(bits = "1")]
    por_rst: bool,
}

register_address! {SwitchAddress, PqrsResetCtrl, ResetCtrl}

/// Which parts of the switch to reset
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetCmd {
    pub switch_rst: bool,
    pub cfg_rst: bool,
    pub car_rst: bool,
    pub otp_rst: bool,
    pub warm_rst: bool,
    pub cold_rst: bool,
    pub por_rst: bool,
}

impl ResetCmd {
    /// Cold reset, which also drops the static config
    pub fn cold() -> Self {
        ResetCmd {
            cold_rst: true,
            ..Default::default()
        }
    }

    fn log(&self) {
        for (requested, what) in [
            (self.switch_rst, "Main reset for all functional modules requested"),
            (self.cfg_rst, "Chip configuration reset requested"),
            (self.car_rst, "Clock and reset control logic reset requested"),
            (self.otp_rst, "OTP read cycle for reading product config settings requested"),
            (self.warm_rst, "Warm reset requested"),
            (self.cold_rst, "Cold reset requested"),
            (self.por_rst, "Power-on reset requested"),
        ] {
            if requested {
                debug!("{what}");
            }
        }
    }
}

impl From<ResetCmd> for PqrsResetCtrl {
    fn from(cmd: ResetCmd) -> Self {
        PqrsResetCtrl {
            switch_rst: cmd.switch_rst,
            cfg_rst: cmd.cfg_rst,
            car_rst: cmd.car_rst,
            otp_rst: cmd.otp_rst,
            warm_rst: cmd.warm_rst,
            cold_rst: cmd.cold_rst,
            por_rst: cmd.por_rst,
        }
    }
}

/// The general status registers, starting at [`SwitchAddress::GeneralStatus`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GeneralStatus {
    /// Static config accepted
    pub configs: u64,
    /// Local (table) CRC error in the last upload
    pub crcchkl: u64,
    /// Device id mismatch in the last upload
    pub ids: u64,
    /// Global CRC error in the last upload
    pub crcchkg: u64,
    pub nslot: u64,
    pub vlind: u64,
    pub vlparind: u64,
    pub vlroutes: u64,
    pub vlparts: u64,
    pub macaddl: u64,
    pub portenf: u64,
    pub fwds_03h: u64,
    pub macfds: u64,
    pub enffds: u64,
    pub l2busyfds: u64,
    pub l2busys: u64,
    pub macaddu: u64,
    pub macaddhcl: u64,
    pub vlanidhc: u64,
    pub hashconfs: u64,
    pub macaddhcu: u64,
    pub wpvlanid: u64,
    pub port_07h: u64,
    pub vlanbusys: u64,
    pub wrongports: u64,
    pub vnotfounds: u64,
    pub vlid: u64,
    pub portvl: u64,
    pub vlnotfound: u64,
    pub emptys: u64,
    pub buffers: u64,
    /// P/Q/R/S only
    pub buflwmark: u64,
    pub port_0ah: u64,
    pub fwds_0ah: u64,
    pub parts: u64,
    pub ramparerrl: u64,
    pub ramparerru: u64,
}

impl GeneralStatus {
    pub fn size(generation: Generation) -> usize {
        match generation {
            Generation::Et => 12 * 4,
            Generation::Pqrs => 13 * 4,
        }
    }

    /// Decodes the registers in `buf`; missing trailing registers read as zero
    pub fn unpack(buf: &[u8], generation: Generation) -> Self {
        let mut scratch = vec![0u8; Self::size(Generation::Pqrs)];
        let n = buf.len().min(scratch.len());
        scratch[..n].copy_from_slice(&buf[..n]);

        let mut s = GeneralStatus::default();
        let mut reg = |word: usize, value: &mut u64, start: usize, end: usize| {
            field(&mut scratch[word * 4..word * 4 + 4], value, start, end, PackingOp::Unpack);
        };
        reg(0, &mut s.configs, 31, 31);
        reg(0, &mut s.crcchkl, 30, 30);
        reg(0, &mut s.ids, 29, 29);
        reg(0, &mut s.crcchkg, 28, 28);
        reg(0, &mut s.nslot, 3, 0);
        reg(1, &mut s.vlind, 31, 16);
        reg(1, &mut s.vlparind, 15, 8);
        reg(1, &mut s.vlroutes, 1, 1);
        reg(1, &mut s.vlparts, 0, 0);
        reg(2, &mut s.macaddl, 31, 16);
        reg(2, &mut s.portenf, 15, 8);
        reg(2, &mut s.fwds_03h, 4, 4);
        reg(2, &mut s.macfds, 3, 3);
        reg(2, &mut s.enffds, 2, 2);
        reg(2, &mut s.l2busyfds, 1, 1);
        reg(2, &mut s.l2busys, 0, 0);
        reg(3, &mut s.macaddu, 31, 0);
        reg(4, &mut s.macaddhcl, 31, 16);
        reg(4, &mut s.vlanidhc, 15, 4);
        reg(4, &mut s.hashconfs, 0, 0);
        reg(5, &mut s.macaddhcu, 31, 0);
        reg(6, &mut s.wpvlanid, 31, 16);
        reg(6, &mut s.port_07h, 15, 8);
        reg(6, &mut s.vlanbusys, 4, 4);
        reg(6, &mut s.wrongports, 3, 3);
        reg(6, &mut s.vnotfounds, 2, 2);
        reg(7, &mut s.vlid, 31, 16);
        reg(7, &mut s.portvl, 15, 8);
        reg(7, &mut s.vlnotfound, 0, 0);
        reg(8, &mut s.emptys, 31, 31);
        reg(8, &mut s.buffers, 30, 0);
        match generation {
            Generation::Et => {
                reg(9, &mut s.port_0ah, 15, 8);
                reg(9, &mut s.fwds_0ah, 1, 1);
                reg(9, &mut s.parts, 0, 0);
                reg(10, &mut s.ramparerrl, 20, 0);
                reg(11, &mut s.ramparerru, 4, 0);
            }
            Generation::Pqrs => {
                reg(9, &mut s.buflwmark, 30, 0);
                reg(10, &mut s.port_0ah, 15, 8);
                reg(10, &mut s.fwds_0ah, 1, 1);
                reg(10, &mut s.parts, 0, 0);
                reg(11, &mut s.ramparerrl, 22, 0);
                reg(12, &mut s.ramparerru, 4, 0);
            }
        }
        s
    }
}

pub const SIZE_PORT_STATUS_MAC: usize = 2 * 4;
pub const SIZE_PORT_STATUS_HL1: usize = 16 * 4;
pub const SIZE_PORT_STATUS_HL2: usize = 4 * 4;
pub const SIZE_PORT_STATUS_QLEVEL: usize = 8 * 4;

/// Unpacks fields out of consecutive 32-bit registers
fn word_reader<const N: usize>(buf: &[u8; N]) -> impl FnMut(usize, &mut u64, usize, usize) {
    let mut scratch = *buf;
    move |word: usize, value: &mut u64, start: usize, end: usize| {
        field(&mut scratch[word * 4..word * 4 + 4], value, start, end, PackingOp::Unpack);
    }
}

/// MAC-level diagnostic counters and sticky drop flags of one port
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortStatusMac {
    pub n_runt: u64,
    pub n_soferr: u64,
    pub n_alignerr: u64,
    pub n_miierr: u64,
    pub typeerr: u64,
    pub sizeerr: u64,
    pub tctimeout: u64,
    pub priorerr: u64,
    pub nomaster: u64,
    pub memov: u64,
    pub memerr: u64,
    pub invtyp: u64,
    pub intcyov: u64,
    pub domerr: u64,
    pub pcfbagdrop: u64,
    pub spcprior: u64,
    pub ageprior: u64,
    pub portdrop: u64,
    pub lendrop: u64,
    pub bagdrop: u64,
    pub policeerr: u64,
    pub drpnona664err: u64,
    pub spcerr: u64,
    pub agedrp: u64,
}

impl PortStatusMac {
    pub fn unpack(buf: &[u8; SIZE_PORT_STATUS_MAC]) -> Self {
        let mut reg = word_reader(buf);
        let mut s = Self::default();
        reg(0, &mut s.n_runt, 31, 24);
        reg(0, &mut s.n_soferr, 23, 16);
        reg(0, &mut s.n_alignerr, 15, 8);
        reg(0, &mut s.n_miierr, 7, 0);
        reg(1, &mut s.typeerr, 27, 27);
        reg(1, &mut s.sizeerr, 26, 26);
        reg(1, &mut s.tctimeout, 25, 25);
        reg(1, &mut s.priorerr, 24, 24);
        reg(1, &mut s.nomaster, 23, 23);
        reg(1, &mut s.memov, 22, 22);
        reg(1, &mut s.memerr, 21, 21);
        reg(1, &mut s.invtyp, 19, 19);
        reg(1, &mut s.intcyov, 18, 18);
        reg(1, &mut s.domerr, 17, 17);
        reg(1, &mut s.pcfbagdrop, 16, 16);
        reg(1, &mut s.spcprior, 15, 12);
        reg(1, &mut s.ageprior, 11, 8);
        reg(1, &mut s.portdrop, 6, 6);
        reg(1, &mut s.lendrop, 5, 5);
        reg(1, &mut s.bagdrop, 4, 4);
        reg(1, &mut s.policeerr, 3, 3);
        reg(1, &mut s.drpnona664err, 2, 2);
        reg(1, &mut s.spcerr, 1, 1);
        reg(1, &mut s.agedrp, 0, 0);
        s
    }
}

/// High-level frame and byte counters of one port
///
/// The byte and frame totals are kept by the switch as two 32-bit halves and are joined here.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortStatusHl1 {
    pub n_txbyte: u64,
    pub n_txfrm: u64,
    pub n_rxbyte: u64,
    pub n_rxfrm: u64,
    pub n_polerr: u64,
    pub n_ctpolerr: u64,
    pub n_vlnotfound: u64,
    pub n_crcerr: u64,
    pub n_sizeerr: u64,
    pub n_unreleased: u64,
    pub n_vlanerr: u64,
    pub n_n664err: u64,
}

impl PortStatusHl1 {
    pub fn unpack(buf: &[u8; SIZE_PORT_STATUS_HL1]) -> Self {
        let mut reg = word_reader(buf);
        let mut s = Self::default();
        let mut high = [0u64; 4];
        reg(0x0, &mut s.n_txbyte, 31, 0);
        reg(0x1, &mut high[0], 31, 0);
        reg(0x2, &mut s.n_txfrm, 31, 0);
        reg(0x3, &mut high[1], 31, 0);
        reg(0x4, &mut s.n_rxbyte, 31, 0);
        reg(0x5, &mut high[2], 31, 0);
        reg(0x6, &mut s.n_rxfrm, 31, 0);
        reg(0x7, &mut high[3], 31, 0);
        reg(0x8, &mut s.n_polerr, 31, 0);
        reg(0x9, &mut s.n_ctpolerr, 31, 0);
        reg(0xA, &mut s.n_vlnotfound, 31, 0);
        reg(0xB, &mut s.n_crcerr, 31, 0);
        reg(0xC, &mut s.n_sizeerr, 31, 0);
        reg(0xD, &mut s.n_unreleased, 31, 0);
        reg(0xE, &mut s.n_vlanerr, 31, 0);
        reg(0xF, &mut s.n_n664err, 31, 0);
        s.n_txbyte |= high[0] << 32;
        s.n_txfrm |= high[1] << 32;
        s.n_rxbyte |= high[2] << 32;
        s.n_rxfrm |= high[3] << 32;
        s
    }
}

/// Drop counters of one port, and on the P/Q/R/S its egress queue levels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortStatusHl2 {
    pub n_not_reach: u64,
    pub n_egr_disabled: u64,
    pub n_part_drop: u64,
    pub n_qfull: u64,
    /// Highest fill level seen per egress queue
    pub qlevel_hwm: [u64; 8],
    pub qlevel: [u64; 8],
}

impl PortStatusHl2 {
    pub fn unpack(buf: &[u8; SIZE_PORT_STATUS_HL2]) -> Self {
        let mut reg = word_reader(buf);
        let mut s = Self::default();
        reg(0, &mut s.n_not_reach, 31, 0);
        reg(1, &mut s.n_egr_disabled, 31, 0);
        reg(2, &mut s.n_part_drop, 31, 0);
        reg(3, &mut s.n_qfull, 31, 0);
        s
    }

    pub fn unpack_qlevel(&mut self, buf: &[u8; SIZE_PORT_STATUS_QLEVEL]) {
        let mut reg = word_reader(buf);
        for queue in 0..8 {
            reg(queue, &mut self.qlevel_hwm[queue], 24, 16);
            reg(queue, &mut self.qlevel[queue], 8, 0);
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus {
    pub mac: PortStatusMac,
    pub hl1: PortStatusHl1,
    pub hl2: PortStatusHl2,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Transport(#[from] io::Error),
    #[error(transparent)]
    Unrecognized(#[from] InitError),
}

#[derive(Error, Debug)]
pub enum ResetError {
    #[error("the E/T only supports warm and cold resets")]
    Unsupported,
    #[error(transparent)]
    Transport(#[from] io::Error),
    #[error("could not pack the reset register: {0}")]
    Pack(#[from] PackingError),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("invalid static config: {0}")]
    Invalid(#[from] Validity),
    #[error("static config is for device id {config:#010x} but the switch is {switch:#010x}")]
    DeviceIdMismatch { config: u64, switch: u64 },
    #[error(transparent)]
    Pack(#[from] TableError),
    #[error("switch did not accept the static config after {attempts} attempts")]
    Failed { attempts: usize },
}

#[derive(Error, Debug)]
pub enum PortStatusError {
    #[error("port {port} does not exist")]
    NoSuchPort { port: usize },
    #[error(transparent)]
    Transport(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Clocking(#[from] ClockingError),
}

/// A switch reached over SPI
pub struct Switch<T> {
    spi: T,
    variant: Variant,
}

impl<T: SpiTransport> Switch<T> {
    pub fn new(spi: T, variant: Variant) -> Self {
        Switch { spi, variant }
    }

    /// Identifies the switch from its device id and, on P/Q/R/S, its product id register
    pub async fn probe(mut spi: T) -> Result<Self, ProbeError> {
        let mut device_id = 0;
        send_int(
            &mut spi,
            SpiOp::Read,
            SwitchAddress::DeviceId as u64,
            &mut device_id,
            SIZE_SJA1105_DEVICE_ID,
        )
        .await?;
        let part_nr = match Variant::from_ids(device_id, SJA1105_PART_NR_DONT_CARE) {
            Ok(v) if v.generation() == Generation::Et => SJA1105_PART_NR_DONT_CARE,
            _ => {
                let mut prod_id = 0;
                send_int(&mut spi, SpiOp::Read, SwitchAddress::ProdId as u64, &mut prod_id, 4).await?;
                (prod_id >> 4) & 0xFFFF
            }
        };
        let variant = Variant::from_ids(device_id, part_nr)?;
        info!(%variant, device_id, part_nr, "Found switch");
        Ok(Switch { spi, variant })
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn into_inner(self) -> T {
        self.spi
    }

    async fn write_packed<R, const N: usize>(&mut self, packed: R) -> Result<(), ResetError>
    where
        R: PackedStruct<ByteArray = [u8; N]> + RegisterAddress,
    {
        let mut bytes = packed.pack()?;
        send_packed_buf(&mut self.spi, SpiOp::Write, R::address(), &mut bytes).await?;
        Ok(())
    }

    pub async fn reset(&mut self, cmd: ResetCmd) -> Result<(), ResetError> {
        cmd.log();
        match self.variant.generation() {
            Generation::Et => {
                if cmd.switch_rst || cmd.cfg_rst || cmd.car_rst || cmd.otp_rst || cmd.por_rst {
                    return Err(ResetError::Unsupported);
                }
                self.write_packed(EtResetCtrl {
                    cold_rst: cmd.cold_rst,
                    warm_rst: cmd.warm_rst,
                })
                .await
            }
            Generation::Pqrs => self.write_packed(PqrsResetCtrl::from(cmd)).await,
        }
    }

    pub async fn cold_reset(&mut self) -> Result<(), ResetError> {
        self.reset(ResetCmd::cold()).await
    }

    pub async fn general_status(&mut self) -> io::Result<GeneralStatus> {
        let generation = self.variant.generation();
        let mut buf = vec![0u8; GeneralStatus::size(generation)];
        send_packed_buf(
            &mut self.spi,
            SpiOp::Read,
            SwitchAddress::GeneralStatus as u64,
            &mut buf,
        )
        .await?;
        Ok(GeneralStatus::unpack(&buf, generation))
    }

    /// Validates and packs `config`, then resets the switch and programs it, retrying until
    /// the switch reports the config as accepted
    pub async fn upload_static_config(&mut self, config: &StaticConfig) -> Result<(), UploadError> {
        config.check_valid()?;
        if config.device_id() != self.variant.device_id() {
            return Err(UploadError::DeviceIdMismatch {
                config: config.device_id(),
                switch: self.variant.device_id(),
            });
        }
        let mut buf = config.pack()?;
        seal_for_upload(&mut buf);
        trace!(len = buf.len(), "Packed static config");

        for attempt in 1..=UPLOAD_RETRIES {
            if let Err(e) = self.cold_reset().await {
                warn!(%e, attempt, "Failed to reset switch, retrying");
                continue;
            }
            // The switch needs a moment after a reset before it takes SPI writes
            sleep(Duration::from_millis(1)).await;
            if let Err(e) = send_long_packed_buf(
                &mut self.spi,
                SpiOp::Write,
                SwitchAddress::Config as u64,
                &mut buf,
            )
            .await
            {
                warn!(%e, attempt, "Failed to upload config, retrying");
                continue;
            }
            let status = match self.general_status().await {
                Ok(status) => status,
                Err(e) => {
                    warn!(%e, attempt, "Failed to read general status, retrying");
                    continue;
                }
            };
            if status.ids == 1 {
                warn!(attempt, "Mismatch between hardware and static config device id, retrying");
            } else if status.crcchkl == 1 {
                warn!(attempt, "Switch reported invalid local CRC on the uploaded config, retrying");
            } else if status.crcchkg == 1 {
                warn!(attempt, "Switch reported invalid global CRC on the uploaded config, retrying");
            } else if status.configs == 0 {
                warn!(attempt, "Switch reported that configuration is invalid, retrying");
            } else {
                if attempt > 1 {
                    info!("Succeeded after {attempt} tries");
                }
                info!("Reset switch and programmed static config");
                return Ok(());
            }
        }
        error!("Failed to upload config to device, giving up");
        Err(UploadError::Failed {
            attempts: UPLOAD_RETRIES,
        })
    }

    /// Uploads `config`, then sets up the xMII clocks of every port to match it
    pub async fn load_static_config(&mut self, config: &StaticConfig) -> Result<(), LoadError> {
        self.upload_static_config(config).await?;
        self.setup_clocking(config).await?;
        Ok(())
    }

    pub async fn setup_clocking(&mut self, config: &StaticConfig) -> Result<(), ClockingError> {
        clocking::setup(&mut self.spi, self.variant, config).await
    }

    pub async fn setup_port_clocking(
        &mut self,
        config: &StaticConfig,
        port: usize,
    ) -> Result<(), ClockingError> {
        clocking::setup_port(&mut self.spi, self.variant, config, port).await
    }

    async fn read_area<const N: usize>(
        &mut self,
        area: SwitchAddress,
        port: usize,
    ) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        send_packed_buf(&mut self.spi, SpiOp::Read, area.for_port(port), &mut buf).await?;
        Ok(buf)
    }

    /// Reads the MAC, high-level 1 and high-level 2 counters of `port`
    pub async fn port_status(&mut self, port: usize) -> Result<PortStatus, PortStatusError> {
        if port >= NUM_PORTS {
            return Err(PortStatusError::NoSuchPort { port });
        }
        let mac: [u8; SIZE_PORT_STATUS_MAC] =
            self.read_area(SwitchAddress::PortStatusMac, port).await?;
        let hl1: [u8; SIZE_PORT_STATUS_HL1] =
            self.read_area(SwitchAddress::PortStatusHl1, port).await?;
        let hl2: [u8; SIZE_PORT_STATUS_HL2] =
            self.read_area(SwitchAddress::PortStatusHl2, port).await?;
        let mut status = PortStatus {
            mac: PortStatusMac::unpack(&mac),
            hl1: PortStatusHl1::unpack(&hl1),
            hl2: PortStatusHl2::unpack(&hl2),
        };
        if self.variant.generation() == Generation::Pqrs {
            let qlevel: [u8; SIZE_PORT_STATUS_QLEVEL] =
                self.read_area(SwitchAddress::PortStatusQlevel, port).await?;
            status.hl2.unpack_qlevel(&qlevel);
        }
        trace!(port, ?status, "Read port status");
        Ok(status)
    }

    pub async fn dynamic_read<E: DynamicEntry>(
        &mut self,
        index: usize,
        entry: Option<&mut E>,
    ) -> Result<(), DynamicError> {
        dynamic_config::read(&mut self.spi, self.variant.generation(), index, entry).await
    }

    /// Writes `entry` at `index`, or deletes the entry there when `entry` is `None`
    pub async fn dynamic_write<E: DynamicEntry>(
        &mut self,
        index: usize,
        entry: Option<&E>,
    ) -> Result<(), DynamicError> {
        dynamic_config::write(&mut self.spi, self.variant.generation(), index, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::default_config;
    use crate::emulator::EmulatedSwitch;
    use crate::tables::*;
    use test_case::test_case;

    const RGMII_MACS: [(XmiiMode, PhyRole); NUM_PORTS] = [(XmiiMode::Rgmii, PhyRole::Mac); NUM_PORTS];

    #[test]
    fn reset_register_layouts() {
        let et = EtResetCtrl {
            cold_rst: true,
            warm_rst: false,
        };
        assert_eq!(u32::from_be_bytes(et.pack().unwrap()), 1 << 3);
        let pqrs = PqrsResetCtrl::from(ResetCmd::cold());
        assert_eq!(u32::from_be_bytes(pqrs.pack().unwrap()), 1 << 2);
        let all = PqrsResetCtrl::from(ResetCmd {
            switch_rst: true,
            cfg_rst: true,
            car_rst: true,
            otp_rst: true,
            warm_rst: true,
            cold_rst: true,
            por_rst: true,
        });
        assert_eq!(u32::from_be_bytes(all.pack().unwrap()), 0b1_1011_1110);
        assert_eq!(EtResetCtrl::address(), 0x100440);
        assert_eq!(PqrsResetCtrl::address(), 0x100440);
    }

    #[test]
    fn status_word_zero() {
        let mut buf = vec![0u8; 48];
        buf[..4].copy_from_slice(&0xA000_0005u32.to_be_bytes());
        let status = GeneralStatus::unpack(&buf, Generation::Et);
        assert_eq!(status.configs, 1);
        assert_eq!(status.crcchkl, 0);
        assert_eq!(status.ids, 1);
        assert_eq!(status.crcchkg, 0);
        assert_eq!(status.nslot, 5);
    }

    #[test]
    fn status_tail_differs_per_generation() {
        let mut buf = vec![0u8; 52];
        buf[36..40].copy_from_slice(&0x0000_1203u32.to_be_bytes());
        buf[40..44].copy_from_slice(&0x0000_0A01u32.to_be_bytes());
        buf[48..52].copy_from_slice(&0x0000_001Fu32.to_be_bytes());

        let et = GeneralStatus::unpack(&buf[..48], Generation::Et);
        assert_eq!((et.port_0ah, et.fwds_0ah, et.parts), (0x12, 1, 1));
        assert_eq!(et.ramparerrl, 0xA01);
        assert_eq!(et.ramparerru, 0);

        let pqrs = GeneralStatus::unpack(&buf, Generation::Pqrs);
        assert_eq!(pqrs.buflwmark, 0x1203);
        assert_eq!((pqrs.port_0ah, pqrs.fwds_0ah, pqrs.parts), (0x0A, 0, 1));
        assert_eq!(pqrs.ramparerru, 0x1F);
    }

    #[test]
    fn status_middle_words() {
        let mut buf = vec![0u8; 52];
        buf[4..8].copy_from_slice(&0x1234_5603u32.to_be_bytes());
        buf[16..20].copy_from_slice(&0xBEEF_0641u32.to_be_bytes());
        buf[32..36].copy_from_slice(&0x8000_0100u32.to_be_bytes());
        let status = GeneralStatus::unpack(&buf, Generation::Pqrs);
        assert_eq!((status.vlind, status.vlparind), (0x1234, 0x56));
        assert_eq!((status.vlroutes, status.vlparts), (1, 1));
        assert_eq!((status.macaddhcl, status.vlanidhc, status.hashconfs), (0xBEEF, 0x064, 1));
        assert_eq!((status.emptys, status.buffers), (1, 0x100));
    }

    #[test_case(Variant::E)]
    #[test_case(Variant::T)]
    #[test_case(Variant::P)]
    #[test_case(Variant::Q)]
    #[test_case(Variant::R)]
    #[test_case(Variant::S)]
    #[tokio::test]
    async fn probe_identifies_variant(variant: Variant) {
        let switch = Switch::probe(EmulatedSwitch::new(variant)).await.unwrap();
        assert_eq!(switch.variant(), variant);
    }

    #[tokio::test]
    async fn probe_reports_transport_errors() {
        let mut emu = EmulatedSwitch::new(Variant::E);
        emu.failing_transfers = 1;
        assert!(matches!(
            Switch::probe(emu).await,
            Err(ProbeError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn et_refuses_fancy_resets() {
        let mut switch = Switch::new(EmulatedSwitch::new(Variant::T), Variant::T);
        let cmd = ResetCmd {
            otp_rst: true,
            ..Default::default()
        };
        assert!(matches!(switch.reset(cmd).await, Err(ResetError::Unsupported)));
        assert_eq!(switch.into_inner().transfers, 0);
    }

    #[test_case(Variant::E)]
    #[test_case(Variant::S)]
    #[tokio::test]
    async fn upload_programs_switch(variant: Variant) {
        let config = default_config(variant, 4, RGMII_MACS).unwrap();
        let mut switch = Switch::new(EmulatedSwitch::new(variant), variant);
        switch.upload_static_config(&config).await.unwrap();
        let status = switch.general_status().await.unwrap();
        assert_eq!(status.configs, 1);

        let emu = switch.into_inner();
        assert_eq!(emu.cold_resets, 1);
        let running = emu.running_config().unwrap();
        assert_eq!(running.tables.mac_config.entries(), config.tables.mac_config.entries());
        assert_eq!(running.tables.l2_policing.entry_count(), 45);
    }

    #[tokio::test]
    async fn upload_retries_rejected_configs() {
        let config = default_config(Variant::Q, 0, RGMII_MACS).unwrap();
        let mut emu = EmulatedSwitch::new(Variant::Q);
        emu.corrupt_uploads = 2;
        emu.failing_transfers = 1;
        let mut switch = Switch::new(emu, Variant::Q);
        switch.upload_static_config(&config).await.unwrap();
        // One attempt lost to the bus, two to corruption
        assert_eq!(switch.into_inner().cold_resets, 3);
    }

    #[tokio::test]
    async fn upload_gives_up() {
        let config = default_config(Variant::E, 0, RGMII_MACS).unwrap();
        let mut emu = EmulatedSwitch::new(Variant::E);
        emu.corrupt_uploads = UPLOAD_RETRIES;
        let mut switch = Switch::new(emu, Variant::E);
        assert!(matches!(
            switch.upload_static_config(&config).await,
            Err(UploadError::Failed { attempts: UPLOAD_RETRIES })
        ));
        assert_eq!(switch.into_inner().cold_resets, UPLOAD_RETRIES);
    }

    #[tokio::test]
    async fn upload_checks_config_first() {
        let mut switch = Switch::new(EmulatedSwitch::new(Variant::E), Variant::E);
        let empty = StaticConfig::for_variant(Variant::E);
        assert!(matches!(
            switch.upload_static_config(&empty).await,
            Err(UploadError::Invalid(Validity::MissingL2PolicingTable))
        ));

        let other = default_config(Variant::T, 0, RGMII_MACS).unwrap();
        assert!(matches!(
            switch.upload_static_config(&other).await,
            Err(UploadError::DeviceIdMismatch { .. })
        ));
        assert_eq!(switch.into_inner().transfers, 0);
    }

    #[tokio::test]
    async fn dynamic_access_through_switch() {
        let mut switch = Switch::new(EmulatedSwitch::new(Variant::R), Variant::R);
        let entry = L2ForwardingEntry {
            bc_domain: 0x1F,
            reach_port: 0x0F,
            fl_domain: 0x01,
            vlan_pmap: [7, 6, 5, 4, 3, 2, 1, 0],
        };
        switch.dynamic_write(3, Some(&entry)).await.unwrap();
        let mut params = GeneralParamsEntry::default();
        assert!(matches!(
            switch.dynamic_read(0, Some(&mut params)).await,
            Err(DynamicError::Unsupported { .. })
        ));
    }

    #[test]
    fn port_status_areas() {
        assert_eq!(SwitchAddress::PortStatusMac.for_port(0), 0x200);
        assert_eq!(SwitchAddress::PortStatusMac.for_port(4), 0x208);
        assert_eq!(SwitchAddress::PortStatusHl1.for_port(3), 0x430);
        assert_eq!(SwitchAddress::PortStatusHl2.for_port(1), 0x610);
        assert_eq!(SwitchAddress::PortStatusQlevel.for_port(4), 0x644);
    }

    #[test]
    fn mac_counters_and_flags() {
        let mut buf = [0u8; SIZE_PORT_STATUS_MAC];
        buf[..4].copy_from_slice(&0x0102_0304u32.to_be_bytes());
        buf[4..].copy_from_slice(&0x0880_A541u32.to_be_bytes());
        let mac = PortStatusMac::unpack(&buf);
        assert_eq!((mac.n_runt, mac.n_soferr, mac.n_alignerr, mac.n_miierr), (1, 2, 3, 4));
        assert_eq!((mac.typeerr, mac.nomaster, mac.memov), (1, 1, 0));
        assert_eq!((mac.spcprior, mac.ageprior), (0xA, 0x5));
        assert_eq!((mac.portdrop, mac.agedrp, mac.lendrop), (1, 1, 0));
    }

    #[test_case(Variant::T)]
    #[test_case(Variant::Q)]
    #[tokio::test]
    async fn port_counters(variant: Variant) {
        let mut emu = EmulatedSwitch::new(variant);
        emu.poke(0x204, &[0x0102_0304, (1 << 27) | (0xA << 12) | (1 << 6) | 1]);
        let mut hl1 = [0u32; 16];
        hl1[0x0] = 0x10;
        hl1[0x1] = 0x2;
        hl1[0x6] = 0xFFFF_FFFF;
        hl1[0x7] = 0x1;
        hl1[0xB] = 7;
        hl1[0xF] = 9;
        emu.poke(0x420, &hl1);
        emu.poke(0x620, &[11, 12, 13, 14]);
        emu.poke(0x624, &[(0x1AB << 16) | 0xFF, 0, 0, 0, 0, 0, 0, (5 << 16) | 3]);
        let mut switch = Switch::new(emu, variant);

        let status = switch.port_status(2).await.unwrap();
        assert_eq!(status.mac.n_runt, 1);
        assert_eq!(status.mac.n_miierr, 4);
        assert_eq!((status.mac.typeerr, status.mac.spcprior), (1, 0xA));
        assert_eq!((status.mac.portdrop, status.mac.agedrp), (1, 1));
        assert_eq!(status.hl1.n_txbyte, 0x2_0000_0010);
        assert_eq!(status.hl1.n_rxfrm, 0x1_FFFF_FFFF);
        assert_eq!(status.hl1.n_txfrm, 0);
        assert_eq!((status.hl1.n_crcerr, status.hl1.n_n664err), (7, 9));
        let hl2 = status.hl2;
        assert_eq!(
            (hl2.n_not_reach, hl2.n_egr_disabled, hl2.n_part_drop, hl2.n_qfull),
            (11, 12, 13, 14)
        );
        match variant.generation() {
            Generation::Et => {
                assert_eq!(hl2.qlevel_hwm, [0; 8]);
                assert_eq!(hl2.qlevel, [0; 8]);
            }
            Generation::Pqrs => {
                assert_eq!(hl2.qlevel_hwm, [0x1AB, 0, 0, 0, 0, 0, 0, 5]);
                assert_eq!(hl2.qlevel, [0xFF, 0, 0, 0, 0, 0, 0, 3]);
            }
        }

        // Other ports have their own areas
        assert_eq!(switch.port_status(1).await.unwrap(), PortStatus::default());
    }

    #[tokio::test]
    async fn port_status_range_and_transport() {
        let mut emu = EmulatedSwitch::new(Variant::R);
        emu.failing_transfers = 1;
        let mut switch = Switch::new(emu, Variant::R);
        assert!(matches!(
            switch.port_status(NUM_PORTS).await,
            Err(PortStatusError::NoSuchPort { port: NUM_PORTS })
        ));
        assert!(matches!(
            switch.port_status(0).await,
            Err(PortStatusError::Transport(_))
        ));
        assert_eq!(switch.into_inner().transfers, 1);
    }

    #[tokio::test]
    async fn load_sets_up_clocks_after_upload() {
        let mut config = default_config(Variant::S, 4, RGMII_MACS).unwrap();
        config.tables.mac_config.entries_mut()[0].set_speed(Speed::Mbps100);
        let mut switch = Switch::new(EmulatedSwitch::new(Variant::S), Variant::S);
        switch.load_static_config(&config).await.unwrap();
        let emu = switch.into_inner();
        assert!(emu.running_config().is_some());
        assert_eq!(emu.peek(clocking::CGU_ADDR + 0x0B), Some(0x0A00_0800));
        assert_eq!(emu.peek(clocking::CGU_ADDR + 0x16), Some(0x1100_0800));
        assert_eq!(emu.peek(clocking::ACU_ADDR), Some(0x1A1A_1A1A));
        // Ports without a fixed speed are left to the PHY
        assert_eq!(emu.peek(clocking::CGU_ADDR + 0x0C), None);
    }

    #[tokio::test]
    async fn load_stops_when_upload_fails() {
        let mii_phys = [(XmiiMode::Mii, PhyRole::Phy); NUM_PORTS];
        let mut config = default_config(Variant::E, 0, mii_phys).unwrap();
        config.tables.l2_policing.clear();
        let mut switch = Switch::new(EmulatedSwitch::new(Variant::E), Variant::E);
        assert!(matches!(
            switch.load_static_config(&config).await,
            Err(LoadError::Upload(UploadError::Invalid(Validity::MissingL2PolicingTable)))
        ));
        assert_eq!(switch.into_inner().transfers, 0);
    }
}
