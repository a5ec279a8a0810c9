//! In-memory switch on the far side of the SPI bus, for exercising the register protocol

use std::collections::HashMap;
use std::io;

use crate::crc::sja1105_crc32;
use crate::device::{Generation, Variant};
use crate::dynamic_config::{CmdLayout, DynCmd, DynamicEntry, DynamicOps};
use crate::packing::PackingOp;
use crate::spi::{SpiMessage, SpiOp, SpiTransport, SIZE_SPI_MSG_HEADER};
use crate::static_config::{StaticConfig, UnpackError};
use crate::switch::SwitchAddress;
use crate::tables::*;

/// A dynamic configuration register window and the entries written through it
struct Window {
    address: u64,
    cmd: CmdLayout,
    entries: HashMap<u64, Vec<u8>>,
    response: Vec<u8>,
    response_cmd: DynCmd,
    busy: usize,
}

impl Window {
    fn new<E: DynamicEntry>(generation: Generation) -> Self {
        let ops: &DynamicOps<E> = E::dynamic_ops(generation);
        Window {
            address: ops.address,
            cmd: ops.cmd,
            entries: HashMap::new(),
            response: vec![0; ops.packed_size],
            response_cmd: DynCmd::default(),
            busy: 0,
        }
    }
}

pub(crate) struct EmulatedSwitch {
    variant: Variant,
    memory: HashMap<u64, [u8; 4]>,
    windows: Vec<Window>,
    /// Static config received since the last cold reset
    staged: Vec<u8>,
    pub cold_resets: usize,
    /// Flip a bit in this many of the next uploads
    pub corrupt_uploads: usize,
    /// Reads that still see a dynamic command as pending
    pub busy_polls: usize,
    pub reject_writes: bool,
    pub failing_transfers: usize,
    pub transfers: usize,
}

impl EmulatedSwitch {
    pub fn new(variant: Variant) -> Self {
        let generation = variant.generation();
        EmulatedSwitch {
            variant,
            memory: HashMap::new(),
            windows: vec![
                Window::new::<VlLookupEntry>(generation),
                Window::new::<L2LookupEntry>(generation),
                Window::new::<VlanLookupEntry>(generation),
                Window::new::<L2ForwardingEntry>(generation),
                Window::new::<MacConfigEntry>(generation),
                Window::new::<L2LookupParamsEntry>(generation),
                Window::new::<GeneralParamsEntry>(generation),
                Window::new::<RetaggingEntry>(generation),
            ],
            staged: Vec::new(),
            cold_resets: 0,
            corrupt_uploads: 0,
            busy_polls: 0,
            reject_writes: false,
            failing_transfers: 0,
            transfers: 0,
        }
    }

    /// The static config last written, if it was accepted
    pub fn running_config(&self) -> Option<StaticConfig> {
        let (configs, ..) = self.verdict();
        configs
            .then(|| StaticConfig::unpack(&self.staged, self.variant.part_nr()).ok())
            .flatten()
    }

    /// Presets consecutive register words starting at `address`
    pub fn poke(&mut self, address: u64, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            self.memory.insert(address + i as u64, word.to_be_bytes());
        }
    }

    /// The register word last written at `address`
    pub fn peek(&self, address: u64) -> Option<u32> {
        self.memory.get(&address).map(|word| u32::from_be_bytes(*word))
    }

    /// (configs, crcchkl, ids, crcchkg) for the staged config
    fn verdict(&self) -> (bool, bool, bool, bool) {
        let len = self.staged.len();
        if len < SIZE_SJA1105_DEVICE_ID + SIZE_TABLE_HEADER {
            return (false, false, false, false);
        }
        let device_id = u32::from_be_bytes([
            self.staged[0],
            self.staged[1],
            self.staged[2],
            self.staged[3],
        ]);
        let ids = u64::from(device_id) != self.variant.device_id();
        let parsed = StaticConfig::unpack(&self.staged, self.variant.part_nr());
        let crcchkl = matches!(
            parsed,
            Err(UnpackError::InvalidTableHeaderCrc { .. } | UnpackError::DataCrcInvalid { .. })
        );
        let final_crc = &self.staged[len - 4..];
        let crcchkg = final_crc != sja1105_crc32(&self.staged[..len - 4]).to_be_bytes();
        let configs = !ids && !crcchkl && !crcchkg && parsed.is_ok();
        (configs, crcchkl, ids, crcchkg)
    }

    fn general_status(&self) -> Vec<u8> {
        let (configs, crcchkl, ids, crcchkg) = self.verdict();
        let word0 = (u32::from(configs) << 31)
            | (u32::from(crcchkl) << 30)
            | (u32::from(ids) << 29)
            | (u32::from(crcchkg) << 28);
        let mut status = vec![0u8; 13 * 4];
        status[..4].copy_from_slice(&word0.to_be_bytes());
        status
    }

    fn write(&mut self, address: u64, payload: &[u8]) {
        let config = SwitchAddress::Config as u64;
        if address == SwitchAddress::ResetCtrl as u64 {
            let word = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let cold = match self.variant.generation() {
                Generation::Et => 1 << 3,
                Generation::Pqrs => 1 << 2,
            };
            if word & cold != 0 {
                self.cold_resets += 1;
                self.staged.clear();
            }
        } else if (config..config + 0x10000).contains(&address) {
            let offset = (address - config) as usize * 4;
            if self.staged.len() < offset + payload.len() {
                self.staged.resize(offset + payload.len(), 0);
            }
            self.staged[offset..offset + payload.len()].copy_from_slice(payload);
            if offset == 0 && self.corrupt_uploads > 0 {
                self.corrupt_uploads -= 1;
                self.staged[SIZE_SJA1105_DEVICE_ID + SIZE_TABLE_HEADER] ^= 0x01;
            }
        } else if let Some(window) = self.windows.iter_mut().find(|w| w.address == address) {
            let mut buf = payload.to_vec();
            let mut cmd = DynCmd::default();
            window.cmd.packing(&mut buf, &mut cmd, PackingOp::Unpack);
            let is_write = window.cmd.rdwrset.is_none() || cmd.rdwrset == SpiOp::Write as u64;
            if is_write {
                if window.cmd.valident.is_none() || cmd.valident != 0 {
                    window.entries.insert(cmd.index, buf.clone());
                } else {
                    window.entries.remove(&cmd.index);
                }
                cmd.errors = u64::from(self.reject_writes);
                window.response = buf;
            } else {
                match window.entries.get(&cmd.index) {
                    Some(stored) => {
                        window.response = stored.clone();
                        cmd.valident = 1;
                    }
                    None => {
                        window.response.fill(0);
                        cmd.valident = 0;
                    }
                }
            }
            window.response_cmd = cmd;
            window.busy = self.busy_polls;
        } else {
            for (i, word) in payload.chunks_exact(4).enumerate() {
                self.memory
                    .insert(address + i as u64, [word[0], word[1], word[2], word[3]]);
            }
        }
    }

    fn read(&mut self, address: u64, len: usize) -> Vec<u8> {
        if address == SwitchAddress::DeviceId as u64 {
            return (self.variant.device_id() as u32).to_be_bytes()[..len].to_vec();
        }
        if address == SwitchAddress::ProdId as u64 {
            return ((self.variant.part_nr() as u32) << 4).to_be_bytes()[..len].to_vec();
        }
        if address == SwitchAddress::GeneralStatus as u64 {
            return self.general_status()[..len].to_vec();
        }
        if let Some(window) = self.windows.iter_mut().find(|w| w.address == address) {
            let mut buf = window.response.clone();
            let mut cmd = window.response_cmd;
            cmd.valid = u64::from(window.busy > 0);
            window.busy = window.busy.saturating_sub(1);
            window.cmd.packing(&mut buf, &mut cmd, PackingOp::Pack);
            buf.resize(len, 0);
            return buf;
        }
        (0..len / 4)
            .flat_map(|i| self.memory.get(&(address + i as u64)).copied().unwrap_or_default())
            .collect()
    }
}

impl SpiTransport for EmulatedSwitch {
    async fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> io::Result<()> {
        self.transfers += 1;
        if self.failing_transfers > 0 {
            self.failing_transfers -= 1;
            return Err(io::Error::other("bus error"));
        }
        let mut header = tx[..SIZE_SPI_MSG_HEADER].to_vec();
        let mut msg = SpiMessage::default();
        SpiMessage::packing(&mut header, &mut msg, PackingOp::Unpack);
        let payload = &tx[SIZE_SPI_MSG_HEADER..];
        if msg.access == SpiOp::Write as u64 {
            self.write(msg.address, payload);
        } else {
            assert_eq!(msg.read_count as usize * 4, payload.len());
            let data = self.read(msg.address, payload.len());
            rx[SIZE_SPI_MSG_HEADER..].copy_from_slice(&data);
        }
        Ok(())
    }
}
