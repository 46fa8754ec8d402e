//! `ct48fb` drives Chips & Technologies 6554x notebook display controllers (65548, 65545,
//! 65540) as a linear framebuffer with an accelerated text console.
//!
//! The crate provides:
//! - Chip identification, bus and memory probing (see [`chipset`]).
//! - Mode validation and programming for 640x480 and 800x600 at 8 and 16 bpp (see [`mode`]),
//!   with dot clock synthesis (see [`clock`]).
//! - Drawing engine copies, fills and glyph expansion (see [`accel`]), with CPU fallbacks in
//!   [`soft`].
//! - The hardware text cursor, palette, blanking and power states.
//! - [`Ct48Fb`], which ties these together behind [`FramebufferOps`] and [`ConsoleOps`].
//!
//! All hardware access goes through [`ct48_io::Platform`].

mod device;
mod error;

pub mod accel;
pub mod blank;
pub mod chipset;
pub mod clock;
pub mod config;
pub mod console;
pub mod cursor;
pub mod framebuffer;
pub mod mode;
pub mod palette;
pub mod regs;
pub mod soft;

pub use blank::BlankLevel;
pub use chipset::{BusTopology, ChipCaps, ChipIdentity, ChipVariant};
pub use config::{DriverConfig, Features};
pub use console::{ConsoleOps, Font};
pub use cursor::CursorMode;
pub use device::Ct48Fb;
pub use error::{ColorError, InitError, ModeError};
pub use framebuffer::{AccelId, FixedInfo, FramebufferOps, Visual};
pub use mode::{Depth, HardwareParams, ModeDescriptor};
pub use palette::Rgba;
