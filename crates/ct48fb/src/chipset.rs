//! Chip identification, bus/memory probing and one-time engine setup.

use std::fmt;

use bitflags::bitflags;
use ct48_io::PortIo;

use crate::regs::{RegisterFile, Space};

/// PCI vendor ID for Chips & Technologies.
pub const PCI_VENDOR_ID_CT: u16 = 0x102C;
/// PCI device ID of the 65548.
pub const PCI_DEVICE_ID_CT_65548: u16 = 0x00DC;

/// XR00 value of the later (655xx/68554/69000) parts, which carry their ID in XR02 instead.
const XR00_NEW_FAMILY: u8 = 0xA5;

/// Known Chips & Technologies display controllers sharing the 6554x register model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChipVariant {
    Ct65520,
    Ct65525,
    Ct65530,
    Ct65535,
    Ct65540,
    Ct65545,
    Ct65546,
    Ct65548,
    Ct65550,
    Ct65554,
    Ct65555,
    Ct68554,
    Ct69000,
    Ct64300,
}

impl ChipVariant {
    pub const fn part_number(self) -> u32 {
        match self {
            ChipVariant::Ct65520 => 65520,
            ChipVariant::Ct65525 => 65525,
            ChipVariant::Ct65530 => 65530,
            ChipVariant::Ct65535 => 65535,
            ChipVariant::Ct65540 => 65540,
            ChipVariant::Ct65545 => 65545,
            ChipVariant::Ct65546 => 65546,
            ChipVariant::Ct65548 => 65548,
            ChipVariant::Ct65550 => 65550,
            ChipVariant::Ct65554 => 65554,
            ChipVariant::Ct65555 => 65555,
            ChipVariant::Ct68554 => 68554,
            ChipVariant::Ct69000 => 69000,
            ChipVariant::Ct64300 => 64300,
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C&T{}", self.part_number())
    }
}

bitflags! {
    /// What the driver may use on a given part.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChipCaps: u8 {
        /// Register-addressed drawing engine.
        const BLITTER = 1 << 0;
        const HW_CURSOR = 1 << 1;
        /// Hardware cursor blink works (broken on the 65545).
        const CURSOR_BLINK = 1 << 2;
        /// Writing 0 to the cursor control register switches the cursor off cleanly.
        const CURSOR_OFF_WRITE = 1 << 3;
    }
}

/// Result of a successful probe. Immutable after bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipIdentity {
    pub variant: ChipVariant,
    pub caps: ChipCaps,
}

impl ChipIdentity {
    /// Capabilities of the parts this driver knows how to run; `None` for everything else.
    pub fn supported(variant: ChipVariant) -> Option<Self> {
        let caps = match variant {
            ChipVariant::Ct65548 => ChipCaps::all(),
            ChipVariant::Ct65545 => {
                ChipCaps::BLITTER | ChipCaps::HW_CURSOR | ChipCaps::CURSOR_OFF_WRITE
            }
            ChipVariant::Ct65540 => ChipCaps::empty(),
            _ => return None,
        };
        Some(Self { variant, caps })
    }
}

/// How the controller is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusTopology {
    /// CPU-direct or VESA local bus: the driver programs timing, clocks and addressing itself.
    DirectOrVl,
    /// PCI: mode timing is left to the video BIOS; the framebuffer base comes from BAR0.
    Pci,
}

#[derive(Debug, Clone, Copy)]
enum Match {
    Is(ChipVariant),
    /// 6554x revision family; the low three bits select the part.
    Revision,
}

/// XR00 classification, first match wins.
const PRIMARY_IDS: [(u8, u8, Match); 5] = [
    (0xF0, 0x70, Match::Is(ChipVariant::Ct65520)),
    // A 65525 reports the same signature.
    (0xF0, 0x80, Match::Is(ChipVariant::Ct65530)),
    (0xF8, 0xC0, Match::Is(ChipVariant::Ct65535)),
    (0xF8, 0xD0, Match::Is(ChipVariant::Ct65540)),
    (0xF8, 0xD8, Match::Revision),
];

fn classify_primary(xr00: u8) -> Option<ChipVariant> {
    PRIMARY_IDS
        .iter()
        .find(|(mask, value, _)| xr00 & mask == *value)
        .map(|(_, _, m)| match m {
            Match::Is(variant) => *variant,
            Match::Revision => match xr00 & 0x07 {
                3 => ChipVariant::Ct65546,
                4 => ChipVariant::Ct65548,
                _ => ChipVariant::Ct65545,
            },
        })
}

fn classify_secondary(xr02: u8) -> Option<ChipVariant> {
    match xr02 {
        0x30 | 0xC0 => Some(ChipVariant::Ct69000),
        0xE0 => Some(ChipVariant::Ct65550),
        0xE4 => Some(ChipVariant::Ct65554),
        0xE5 => Some(ChipVariant::Ct65555),
        0xF4 => Some(ChipVariant::Ct68554),
        _ => None,
    }
}

/// Raw signature bytes, kept for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub xr00: u8,
    pub xr02: u8,
}

/// Identifies the installed chip from its extension registers.
///
/// Returns the raw signature alongside so callers can report unknown parts.
pub fn identify_chip<P: PortIo + ?Sized>(io: &mut P) -> (Option<ChipVariant>, Signature) {
    let xr00 = io.xr(0x00);
    let mut signature = Signature { xr00, xr02: 0 };

    let primary = if xr00 != XR00_NEW_FAMILY {
        classify_primary(xr00)
    } else {
        None
    };
    if primary.is_some() || xr00 == 0 {
        return (primary, signature);
    }

    signature.xr02 = io.xr(0x02);
    (classify_secondary(signature.xr02), signature)
}

/// Reads the bus configuration from XR01.
pub fn detect_bus<P: PortIo + ?Sized>(io: &mut P) -> BusTopology {
    match io.xr(0x01) & 0x07 {
        3 => {
            tracing::info!("bus type: CPU direct");
            BusTopology::DirectOrVl
        }
        6 => {
            tracing::info!("bus type: PCI");
            BusTopology::Pci
        }
        7 => {
            tracing::info!("bus type: VL bus");
            BusTopology::DirectOrVl
        }
        other => {
            tracing::warn!(xr01_bus = other, "unknown bus type, assuming VL bus");
            BusTopology::DirectOrVl
        }
    }
}

/// Installed video memory in bytes, from XR0F bits 0..2.
pub fn memory_size<P: PortIo + ?Sized>(io: &mut P) -> usize {
    let kib = match io.xr(0x0F) & 0x03 {
        0 => 256,
        1 => 512,
        _ => 1024,
    };
    kib * 1024
}

/// Linear aperture base as strapped in XR08 (direct/VL attachment only).
pub fn strapped_linear_base<P: PortIo + ?Sized>(io: &mut P) -> u64 {
    u64::from(io.xr(0x08)) << 20
}

/// Clears the CRTC 0-7 write protect bit in CR11.
pub fn unprotect_crtc<P: PortIo + ?Sized>(io: &mut P) {
    io.update_reg(Space::Crtc, 0x11, |v| v & 0x7F);
}

/// Sets the CRTC 0-7 write protect bit in CR11.
pub fn protect_crtc<P: PortIo + ?Sized>(io: &mut P) {
    io.update_reg(Space::Crtc, 0x11, |v| v | 0x80);
}

/// One-time engine setup after identification.
///
/// Places the drawing registers at `0x83D0`, switches on linear addressing and programs screen
/// inversion. Returns whether the drawing engine reports itself usable (XR72 bit 7 clear).
pub fn init_engine<P: PortIo + ?Sized>(io: &mut P, bus: BusTopology, inverse: bool) -> bool {
    io.set_xr(0x07, 0xF4);
    io.set_xr(0x03, 0x02);
    // On PCI the BIOS mode set already programmed XR04; bit 0 must stay set either way.
    if bus == BusTopology::DirectOrVl {
        io.set_xr(0x04, 0x24);
    }
    io.update_reg(Space::Extension, 0x0B, |v| v | 0x10);
    io.set_xr(0x15, 0x00);
    io.set_xr(0x55, 0xF1);
    let blitter_ok = io.xr(0x72) & 0x80 == 0;
    io.set_xr(0x70, 0x00);
    let xr63 = io.xr(0x63);
    io.set_xr(0x63, if inverse { xr63 | 0x80 } else { xr63 & 0x7F });
    blitter_ok
}
