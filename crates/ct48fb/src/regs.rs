//! Register access layer.
//!
//! The 6554x exposes five indexed register files through index/data port pairs, plus the
//! 32-bit drawing-engine registers ("DR") at fixed ports once XR07 has placed them at
//! `0x83D0`. Everything above this module talks to the chip through [`RegisterFile`], which is
//! blanket-implemented for any [`PortIo`].

use ct48_io::PortIo;

/// Extension register index port.
pub const XR_INDEX: u16 = 0x3D6;
/// Extension register data port.
pub const XR_DATA: u16 = 0x3D7;
pub const CRT_INDEX: u16 = 0x3D4;
pub const CRT_DATA: u16 = 0x3D5;
pub const GFX_INDEX: u16 = 0x3CE;
pub const GFX_DATA: u16 = 0x3CF;
pub const SEQ_INDEX: u16 = 0x3C4;
pub const SEQ_DATA: u16 = 0x3C5;
/// Attribute controller: index and data are both written here (flip-flop selected).
pub const ATT_WRITE: u16 = 0x3C0;
pub const ATT_READ: u16 = 0x3C1;
/// Input status 1. Reading it resets the attribute flip-flop to "index".
pub const INPUT_STATUS_1: u16 = 0x3DA;
pub const DAC_WRITE_INDEX: u16 = 0x3C8;
pub const DAC_DATA: u16 = 0x3C9;

/// Legacy VGA port window claimed for the lifetime of the driver.
pub const VGA_IO_START: u16 = 0x3C0;
pub const VGA_IO_LEN: u16 = 32;

/// Indexed register files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Space {
    /// Chips & Technologies extension registers (XR).
    Extension,
    /// CRT controller (CR).
    Crtc,
    /// Graphics controller (GR).
    Graphics,
    /// Sequencer (SR).
    Sequencer,
    /// Attribute controller (AR).
    Attribute,
}

impl Space {
    /// Returns the `(index, data)` port pair used for writes.
    pub const fn ports(self) -> (u16, u16) {
        match self {
            Space::Extension => (XR_INDEX, XR_DATA),
            Space::Crtc => (CRT_INDEX, CRT_DATA),
            Space::Graphics => (GFX_INDEX, GFX_DATA),
            Space::Sequencer => (SEQ_INDEX, SEQ_DATA),
            Space::Attribute => (ATT_WRITE, ATT_WRITE),
        }
    }
}

/// Drawing-engine registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Dr {
    /// Destination pitch (bits 16..28) and source pitch (bits 0..12), in bytes.
    Pitch = 0x83D0,
    BgColor = 0x8BD0,
    FgColor = 0x8FD0,
    /// Raster op, direction and source/pattern flags; bit 20 reads back as "busy".
    Control = 0x93D0,
    SrcAddr = 0x97D0,
    DstAddr = 0x9BD0,
    /// Height (bits 16..28) and width in bytes (bits 0..12). Writing it starts the operation.
    HeightWidth = 0x9FD0,
    CursorControl = 0xA3D0,
    CursorColor0 = 0xA7D0,
    CursorColor1 = 0xABD0,
    CursorPosition = 0xAFD0,
    CursorBase = 0xB3D0,
}

impl Dr {
    pub const ALL: [Dr; 12] = [
        Dr::Pitch,
        Dr::BgColor,
        Dr::FgColor,
        Dr::Control,
        Dr::SrcAddr,
        Dr::DstAddr,
        Dr::HeightWidth,
        Dr::CursorControl,
        Dr::CursorColor0,
        Dr::CursorColor1,
        Dr::CursorPosition,
        Dr::CursorBase,
    ];

    /// Each DR register decodes a 4-port window.
    pub const WINDOW: u16 = 4;

    pub const fn port(self) -> u16 {
        self as u16
    }
}

/// One `(index, value)` entry of a fixed register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegInit {
    pub index: u8,
    pub value: u8,
}

impl RegInit {
    pub const fn new(index: u8, value: u8) -> Self {
        Self { index, value }
    }
}

/// Typed access to the chip's register files.
pub trait RegisterFile: PortIo {
    fn read_reg(&mut self, space: Space, index: u8) -> u8 {
        match space {
            Space::Attribute => {
                self.read_u8(INPUT_STATUS_1);
                self.write_u8(ATT_WRITE, index);
                self.read_u8(ATT_READ)
            }
            _ => {
                let (index_port, data_port) = space.ports();
                self.write_u8(index_port, index);
                self.read_u8(data_port)
            }
        }
    }

    fn write_reg(&mut self, space: Space, index: u8, value: u8) {
        if space == Space::Attribute {
            self.read_u8(INPUT_STATUS_1);
        }
        let (index_port, data_port) = space.ports();
        self.write_u8(index_port, index);
        self.write_u8(data_port, value);
    }

    /// Read-modify-write. Returns the value read before the update.
    fn update_reg(&mut self, space: Space, index: u8, f: impl FnOnce(u8) -> u8) -> u8 {
        let old = self.read_reg(space, index);
        self.write_reg(space, index, f(old));
        old
    }

    fn write_table(&mut self, space: Space, table: &[RegInit]) {
        for entry in table {
            self.write_reg(space, entry.index, entry.value);
        }
    }

    fn xr(&mut self, index: u8) -> u8 {
        self.read_reg(Space::Extension, index)
    }

    fn set_xr(&mut self, index: u8, value: u8) {
        self.write_reg(Space::Extension, index, value);
    }

    fn cr(&mut self, index: u8) -> u8 {
        self.read_reg(Space::Crtc, index)
    }

    fn set_cr(&mut self, index: u8, value: u8) {
        self.write_reg(Space::Crtc, index, value);
    }

    fn sr(&mut self, index: u8) -> u8 {
        self.read_reg(Space::Sequencer, index)
    }

    fn set_sr(&mut self, index: u8, value: u8) {
        self.write_reg(Space::Sequencer, index, value);
    }

    fn read_dr(&mut self, reg: Dr) -> u32 {
        self.read_u32(reg.port())
    }

    fn write_dr(&mut self, reg: Dr, value: u32) {
        self.write_u32(reg.port(), value);
    }
}

impl<P: PortIo + ?Sized> RegisterFile for P {}
