//! Software model of a Chips & Technologies 6554x adapter.
//!
//! This crate gives `ct48fb` something to drive without real hardware. It provides:
//! - The VGA-style register files (extension, CRTC, graphics, sequencer and attribute) behind
//!   their index/data port pairs, including CRTC 0-7 write protection and the attribute
//!   controller flip-flop.
//! - The RAMDAC write port.
//! - The drawing engine registers at `0x83D0..0xB3D0`, executing raster-op copies, solid fills
//!   and monochrome expansion from system memory into the model's video memory.
//! - A host ([`EmuPlatform`]) implementing [`ct48_io::Platform`] with I/O and memory region
//!   ownership, PCI BAR lookup and mapping, plus knobs to make each of those fail.
//!
//! Every port access is logged so tests can assert on exact register traffic.

mod chip;
mod engine;
mod platform;

pub use chip::{ChipConfig, Ct48Chip, RegSpace, RegWrite};
pub use platform::{EmuPlatform, EmuVram};
