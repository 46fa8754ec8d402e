use crate::engine::{self, EngineOp, MonoTransfer};

const XR_INDEX: u16 = 0x3D6;
const XR_DATA: u16 = 0x3D7;
const CRT_INDEX: u16 = 0x3D4;
const CRT_DATA: u16 = 0x3D5;
const GFX_INDEX: u16 = 0x3CE;
const GFX_DATA: u16 = 0x3CF;
const SEQ_INDEX: u16 = 0x3C4;
const SEQ_DATA: u16 = 0x3C5;
const ATT_WRITE: u16 = 0x3C0;
const ATT_READ: u16 = 0x3C1;
const INPUT_STATUS_1: u16 = 0x3DA;
const DAC_WRITE_INDEX: u16 = 0x3C8;
const DAC_DATA: u16 = 0x3C9;

/// First drawing register; the rest follow every `0x400` ports.
const DR_BASE: u16 = 0x83D0;
const DR_STRIDE: u16 = 0x400;
const DR_COUNT: usize = 13;

pub(crate) const DR_PITCH: usize = 0;
pub(crate) const DR_BG: usize = 2;
pub(crate) const DR_FG: usize = 3;
pub(crate) const DR_CONTROL: usize = 4;
pub(crate) const DR_SRC: usize = 5;
pub(crate) const DR_DST: usize = 6;
pub(crate) const DR_GO: usize = 7;

/// DR04 bit reported while an operation is in flight.
pub const BUSY: u32 = 0x0010_0000;

/// Register file selector for inspection helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegSpace {
    Xr,
    Cr,
    Gr,
    Sr,
    Ar,
}

/// A data-phase write to an indexed register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    pub space: RegSpace,
    pub index: u8,
    pub value: u8,
}

/// Power-on strapping and timing of the modelled part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipConfig {
    /// Chip signature.
    pub xr00: u8,
    /// Bus configuration (bits 0..2).
    pub xr01: u8,
    /// Secondary signature used by the 65550 family.
    pub xr02: u8,
    /// Strapped linear aperture base, in MiB.
    pub xr08: u8,
    /// Memory configuration (bits 0..1).
    pub xr0f: u8,
    /// Bit 7 set means the drawing engine is unavailable.
    pub xr72: u8,
    pub vram_size: usize,
    /// BAR0 reported for `102C:00DC` when the function is enabled.
    pub pci_bar0: Option<u64>,
    /// How many DR04 reads report busy after each operation starts.
    pub busy_polls: u32,
}

impl ChipConfig {
    /// 65548 on the VL bus, 1 MiB, aperture strapped at 14 MiB.
    pub fn ct65548_vl() -> Self {
        Self {
            xr00: 0xDC,
            xr01: 0x07,
            xr02: 0x00,
            xr08: 0x0E,
            xr0f: 0x02,
            xr72: 0x00,
            vram_size: 1024 * 1024,
            pci_bar0: None,
            busy_polls: 0,
        }
    }

    pub fn ct65548_pci() -> Self {
        Self {
            xr01: 0x06,
            pci_bar0: Some(0xF800_0000),
            ..Self::ct65548_vl()
        }
    }

    pub fn ct65545() -> Self {
        Self {
            xr00: 0xDD,
            ..Self::ct65548_vl()
        }
    }

    pub fn ct65540() -> Self {
        Self {
            xr00: 0xD0,
            ..Self::ct65548_vl()
        }
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self::ct65548_vl()
    }
}

/// Register-level state of the modelled chip.
#[derive(Debug)]
pub struct Ct48Chip {
    config: ChipConfig,

    xr: [u8; 256],
    cr: [u8; 256],
    gr: [u8; 256],
    sr: [u8; 256],
    ar: [u8; 32],
    xr_index: u8,
    cr_index: u8,
    gr_index: u8,
    sr_index: u8,
    ar_index: u8,
    attribute_flip_flop_data: bool,

    dac: [[u8; 3]; 256],
    dac_write_index: u8,
    dac_write_subindex: usize,

    dr: [u32; DR_COUNT],
    busy_remaining: u32,
    busy_reads: usize,
    mono: Option<MonoTransfer>,

    pub(crate) vram: Vec<u8>,

    port_writes: Vec<(u16, u8, u32)>,
    port_reads: Vec<(u16, u8)>,
    reg_writes: Vec<RegWrite>,
}

impl Ct48Chip {
    pub fn new(config: ChipConfig) -> Self {
        let mut xr = [0u8; 256];
        xr[0x00] = config.xr00;
        xr[0x01] = config.xr01;
        xr[0x02] = config.xr02;
        xr[0x08] = config.xr08;
        xr[0x0F] = config.xr0f;
        xr[0x40] = 0x01;
        xr[0x72] = config.xr72;
        let mut cr = [0u8; 256];
        // CRTC 0-7 come up write protected.
        cr[0x11] = 0x80;
        let mut sr = [0u8; 256];
        sr[0x00] = 0x03;

        Self {
            vram: vec![0; config.vram_size],
            config,
            xr,
            cr,
            gr: [0; 256],
            sr,
            ar: [0; 32],
            xr_index: 0,
            cr_index: 0,
            gr_index: 0,
            sr_index: 0,
            ar_index: 0,
            attribute_flip_flop_data: false,
            dac: [[0; 3]; 256],
            dac_write_index: 0,
            dac_write_subindex: 0,
            dr: [0; DR_COUNT],
            busy_remaining: 0,
            busy_reads: 0,
            mono: None,
            port_writes: Vec::new(),
            port_reads: Vec::new(),
            reg_writes: Vec::new(),
        }
    }

    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    /// Forgets all logged port and register traffic.
    pub fn clear_log(&mut self) {
        self.port_writes.clear();
        self.port_reads.clear();
        self.reg_writes.clear();
    }

    /// Every port write as `(port, size, value)`, oldest first.
    pub fn port_writes(&self) -> Vec<(u16, u8, u32)> {
        self.port_writes.clone()
    }

    /// Every port read as `(port, size)`, oldest first.
    pub fn port_reads(&self) -> Vec<(u16, u8)> {
        self.port_reads.clone()
    }

    /// Data-phase writes to indexed registers, oldest first. Index selection is not included.
    pub fn reg_writes(&self) -> &[RegWrite] {
        &self.reg_writes
    }

    /// Current value of an indexed register, without side effects.
    pub fn reg(&self, space: RegSpace, index: u8) -> u8 {
        let i = usize::from(index);
        match space {
            RegSpace::Xr => self.xr[i],
            RegSpace::Cr => self.cr[i],
            RegSpace::Gr => self.gr[i],
            RegSpace::Sr => self.sr[i],
            RegSpace::Ar => self.ar[i & 0x1F],
        }
    }

    /// Current value of the drawing register at `port`, as a read would return it, without
    /// consuming a busy poll.
    pub fn dr(&self, port: u16) -> u32 {
        match dr_slot(port) {
            Some(DR_CONTROL) if self.busy_remaining > 0 => self.dr[DR_CONTROL] | BUSY,
            Some(slot) => self.dr[slot],
            None => 0,
        }
    }

    /// DR04 reads that came back busy.
    pub fn busy_reads(&self) -> usize {
        self.busy_reads
    }

    /// RAMDAC entry as 6-bit components.
    pub fn dac_entry(&self, index: u8) -> [u8; 3] {
        self.dac[usize::from(index)]
    }

    /// Whether the engine is still waiting for system-memory source data.
    pub fn awaiting_source(&self) -> bool {
        self.mono.is_some()
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    fn crtc_protected(&self, index: u8) -> bool {
        index <= 0x07 && self.cr[0x11] & 0x80 != 0
    }

    fn log_reg(&mut self, space: RegSpace, index: u8, value: u8) {
        self.reg_writes.push(RegWrite {
            space,
            index,
            value,
        });
    }

    fn read_u8(&mut self, port: u16) -> u8 {
        match port {
            XR_INDEX => self.xr_index,
            XR_DATA => self.xr[usize::from(self.xr_index)],
            CRT_INDEX => self.cr_index,
            CRT_DATA => self.cr[usize::from(self.cr_index)],
            GFX_INDEX => self.gr_index,
            GFX_DATA => self.gr[usize::from(self.gr_index)],
            SEQ_INDEX => self.sr_index,
            SEQ_DATA => self.sr[usize::from(self.sr_index)],
            ATT_WRITE => self.ar_index,
            ATT_READ => self.ar[usize::from(self.ar_index)],
            INPUT_STATUS_1 => {
                self.attribute_flip_flop_data = false;
                0
            }
            DAC_WRITE_INDEX => self.dac_write_index,
            _ => 0xFF,
        }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        match port {
            XR_INDEX => self.xr_index = value,
            XR_DATA => {
                let index = self.xr_index;
                self.xr[usize::from(index)] = value;
                self.log_reg(RegSpace::Xr, index, value);
            }
            CRT_INDEX => self.cr_index = value,
            CRT_DATA => {
                let index = self.cr_index;
                self.log_reg(RegSpace::Cr, index, value);
                if !self.crtc_protected(index) {
                    self.cr[usize::from(index)] = value;
                }
            }
            GFX_INDEX => self.gr_index = value,
            GFX_DATA => {
                let index = self.gr_index;
                self.gr[usize::from(index)] = value;
                self.log_reg(RegSpace::Gr, index, value);
            }
            SEQ_INDEX => self.sr_index = value,
            SEQ_DATA => {
                let index = self.sr_index;
                self.sr[usize::from(index)] = value;
                self.log_reg(RegSpace::Sr, index, value);
            }
            ATT_WRITE => {
                if !self.attribute_flip_flop_data {
                    self.ar_index = value & 0x1F;
                    self.attribute_flip_flop_data = true;
                } else {
                    let index = self.ar_index;
                    self.ar[usize::from(index)] = value;
                    self.log_reg(RegSpace::Ar, index, value);
                    self.attribute_flip_flop_data = false;
                }
            }
            DAC_WRITE_INDEX => {
                self.dac_write_index = value;
                self.dac_write_subindex = 0;
            }
            DAC_DATA => {
                let entry = usize::from(self.dac_write_index);
                self.dac[entry][self.dac_write_subindex] = value & 0x3F;
                self.dac_write_subindex += 1;
                if self.dac_write_subindex == 3 {
                    self.dac_write_subindex = 0;
                    self.dac_write_index = self.dac_write_index.wrapping_add(1);
                }
            }
            _ => {}
        }
    }

    fn read_dr(&mut self, slot: usize) -> u32 {
        if slot == DR_CONTROL && self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            self.busy_reads += 1;
            return self.dr[DR_CONTROL] | BUSY;
        }
        self.dr[slot]
    }

    fn write_dr(&mut self, slot: usize, value: u32) {
        self.dr[slot] = value;
        if slot != DR_GO {
            return;
        }
        self.busy_remaining = self.config.busy_polls;
        let op = EngineOp::latch(&self.dr, self.engine_bytes_per_pixel());
        match op.source_transfer() {
            Some(transfer) => self.mono = Some(transfer),
            None => engine::execute(&op, None, &mut self.vram),
        }
    }

    fn engine_bytes_per_pixel(&self) -> usize {
        if self.xr[0x40] & 0x03 == 0x02 {
            2
        } else {
            1
        }
    }

    pub(crate) fn io_read(&mut self, port: u16, size: u8) -> u32 {
        self.port_reads.push((port, size));
        if let Some(slot) = dr_slot(port) {
            return self.read_dr(slot);
        }
        match size {
            1 => u32::from(self.read_u8(port)),
            2 => {
                let lo = self.read_u8(port);
                let hi = self.read_u8(port.wrapping_add(1));
                u32::from(u16::from_le_bytes([lo, hi]))
            }
            _ => {
                let b = [0u16, 1, 2, 3].map(|i| self.read_u8(port.wrapping_add(i)));
                u32::from_le_bytes(b)
            }
        }
    }

    pub(crate) fn io_write(&mut self, port: u16, size: u8, value: u32) {
        self.port_writes.push((port, size, value));
        if let Some(slot) = dr_slot(port) {
            self.write_dr(slot, value);
            return;
        }
        let bytes = value.to_le_bytes();
        for (i, b) in bytes.iter().take(usize::from(size)).enumerate() {
            self.write_u8(port.wrapping_add(i as u16), *b);
        }
    }

    pub(crate) fn vram_read(&self, offset: usize, size: usize) -> u64 {
        let mut out = [0u8; 8];
        for (i, b) in out.iter_mut().take(size).enumerate() {
            *b = self.vram.get(offset + i).copied().unwrap_or(0xFF);
        }
        u64::from_le_bytes(out)
    }

    /// Aperture write. While the engine waits for system-memory source data the bytes feed the
    /// engine instead of landing in memory.
    pub(crate) fn vram_write(&mut self, offset: usize, size: usize, value: u64) {
        let bytes = value.to_le_bytes();
        for (i, b) in bytes.iter().take(size).enumerate() {
            if let Some(transfer) = self.mono.as_mut() {
                if transfer.push(*b) {
                    if let Some(done) = self.mono.take() {
                        engine::execute(&done.op, Some(&done.data), &mut self.vram);
                    }
                }
                continue;
            }
            if let Some(slot) = self.vram.get_mut(offset + i) {
                *slot = *b;
            }
        }
    }
}

fn dr_slot(port: u16) -> Option<usize> {
    if port < DR_BASE || port & 0x3FF != DR_BASE & 0x3FF {
        return None;
    }
    let slot = usize::from((port - DR_BASE) / DR_STRIDE);
    (slot < DR_COUNT).then_some(slot)
}
