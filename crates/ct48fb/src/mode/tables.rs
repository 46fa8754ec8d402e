//! Fixed timing tables for the four supported modes.
//!
//! Each mode is two passes: extension registers first, then CRT controller registers.
//! XR40 selects the drawing engine's pixel size (1 = 8 bpp, 2 = 16 bpp).

use crate::regs::RegInit;

use super::Depth;

const fn r(index: u8, value: u8) -> RegInit {
    RegInit::new(index, value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTable {
    pub name: &'static str,
    pub depth: Depth,
    pub width: u32,
    pub xr: &'static [RegInit],
    pub cr: &'static [RegInit],
}

static XR_640X480X8: [RegInit; 13] = [
    r(0x40, 0x01),
    r(0x03, 0x02),
    r(0x06, 0xC2),
    r(0x0F, 0x82),
    r(0x17, 0x00),
    r(0x19, 0x6A),
    r(0x1A, 0x1A),
    r(0x1B, 0x81),
    r(0x1C, 0x63),
    r(0x1E, 0x4A),
    r(0x2B, 0x79),
    r(0x55, 0x03),
    r(0x57, 0x03),
];

static CR_640X480X8: [RegInit; 9] = [
    r(0x00, 0x61),
    r(0x01, 0x4F),
    r(0x02, 0x50),
    r(0x04, 0x53),
    r(0x05, 0x9F),
    r(0x07, 0x3E),
    r(0x11, 0x0C),
    r(0x12, 0xDF),
    r(0x13, 0x50),
];

static XR_640X480X16: [RegInit; 13] = [
    r(0x40, 0x02),
    r(0x03, 0x2A),
    r(0x06, 0xCE),
    r(0x0F, 0x92),
    r(0x17, 0x09),
    r(0x19, 0xD5),
    r(0x1A, 0x15),
    r(0x1B, 0x07),
    r(0x1C, 0xC7),
    r(0x1E, 0xA0),
    r(0x2B, 0x41),
    r(0x55, 0x03),
    r(0x57, 0x03),
];

static CR_640X480X16: [RegInit; 9] = [
    r(0x00, 0xC7),
    r(0x01, 0x9F),
    r(0x02, 0x9F),
    r(0x04, 0xA8),
    r(0x05, 0x96),
    r(0x07, 0x3E),
    r(0x11, 0x25),
    r(0x12, 0xDF),
    r(0x13, 0xA0),
];

static XR_800X600X8: [RegInit; 12] = [
    r(0x40, 0x01),
    r(0x03, 0x02),
    r(0x06, 0xC2),
    r(0x0F, 0x82),
    r(0x17, 0x00),
    r(0x19, 0x6A),
    r(0x1A, 0x1A),
    r(0x1B, 0x81),
    r(0x1C, 0x63),
    r(0x1E, 0x4A),
    r(0x2B, 0x32),
    r(0x55, 0xF1),
];

static CR_800X600X8: [RegInit; 9] = [
    r(0x00, 0x81),
    r(0x01, 0x63),
    r(0x02, 0x64),
    r(0x04, 0x6A),
    r(0x05, 0x1A),
    r(0x07, 0xF0),
    r(0x11, 0x0C),
    r(0x12, 0x57),
    r(0x13, 0x64),
];

static XR_800X592X16: [RegInit; 12] = [
    r(0x40, 0x02),
    r(0x03, 0x02),
    r(0x06, 0xCE),
    r(0x0F, 0x92),
    r(0x17, 0x08),
    r(0x19, 0xD7),
    r(0x1A, 0x17),
    r(0x1B, 0xF0),
    r(0x1C, 0xC7),
    r(0x1E, 0xC8),
    r(0x2B, 0x43),
    r(0x55, 0xF1),
];

static CR_800X592X16: [RegInit; 9] = [
    r(0x00, 0xFB),
    r(0x01, 0xC7),
    r(0x02, 0xC7),
    r(0x04, 0xD2),
    r(0x05, 0x1C),
    r(0x07, 0xF0),
    r(0x11, 0x0C),
    r(0x12, 0x4F),
    r(0x13, 0xC8),
];

pub static MODE_TABLES: [ModeTable; 4] = [
    ModeTable {
        name: "640x480x8",
        depth: Depth::Bpp8,
        width: 640,
        xr: &XR_640X480X8,
        cr: &CR_640X480X8,
    },
    ModeTable {
        name: "640x480x16",
        depth: Depth::Bpp16,
        width: 640,
        xr: &XR_640X480X16,
        cr: &CR_640X480X16,
    },
    ModeTable {
        name: "800x600x8",
        depth: Depth::Bpp8,
        width: 800,
        xr: &XR_800X600X8,
        cr: &CR_800X600X8,
    },
    ModeTable {
        name: "800x592x16",
        depth: Depth::Bpp16,
        width: 800,
        xr: &XR_800X592X16,
        cr: &CR_800X592X16,
    },
];

pub fn table_for(depth: Depth, width: u32) -> Option<&'static ModeTable> {
    MODE_TABLES
        .iter()
        .find(|t| t.depth == depth && t.width == width)
}
