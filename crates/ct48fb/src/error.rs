use thiserror::Error;

use crate::chipset::ChipVariant;

/// Failures that abort bring-up. Nothing claimed before the failure stays claimed.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("I/O ports {start:#x} (+{len}) are already claimed")]
    IoRegionBusy { start: u16, len: u16 },

    #[error("PCI bus reported but no 65548 PCI function could be enabled")]
    PciDeviceMissing,

    #[error("no supported Chips & Technologies chip found (XR00={xr00:#04x}, XR02={xr02:#04x})")]
    UnsupportedChip { xr00: u8, xr02: u8 },

    #[error("detected {0}, but only the 65548/65545/65540 are supported")]
    UnsupportedVariant(ChipVariant),

    #[error("cannot map {len:#x} bytes of video memory at {base:#x}")]
    MapFailed { base: u64, len: usize },

    #[error("initial mode rejected: {0}")]
    InitialMode(#[from] ModeError),

    #[error("cannot install the console palette: {0}")]
    Palette(#[from] ColorError),
}

/// Reasons a requested mode is refused. The current mode is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("{0} bits per pixel is deeper than the 16 bpp the chip supports")]
    DepthTooLarge(u32),

    #[error("virtual width must be non-zero")]
    ZeroVirtualWidth,

    #[error("unsupported visible width {0} (expected 640 or 800)")]
    UnsupportedWidth(u32),

    #[error("mode needs {required} bytes of video memory but only {available} are usable")]
    InsufficientMemory { required: u64, available: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("colour index {index} out of range (palette has {entries} entries)")]
    IndexOutOfRange { index: usize, entries: usize },
}
