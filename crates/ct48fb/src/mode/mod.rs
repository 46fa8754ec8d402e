//! Mode negotiation and programming.
//!
//! [`decode`] turns a caller's [`ModeDescriptor`] into validated [`HardwareParams`] without
//! touching the chip, [`encode`] reports the effective mode back, and [`program_timing`] /
//! [`set_display_start`] put a parameter block on the wire.

mod tables;

use bitflags::bitflags;
use ct48_io::PortIo;

use crate::error::ModeError;
use crate::regs::{RegisterFile, Space};

pub use tables::{table_for, ModeTable, MODE_TABLES};

/// Bytes at the top of video memory that are never handed to a mode (cursor image and slack).
pub const RESERVED_OVERHEAD: usize = 96_000 + 1024;

pub const PIXCLOCK_MIN_KHZ: u32 = 5_000;
pub const PIXCLOCK_MAX_KHZ: u32 = 220_000;
pub const PIXCLOCK_DEFAULT_KHZ: u32 = 40_000;

const PS_PER_KHZ: u32 = 1_000_000_000;

/// Fixed timing margins reported for every mode.
pub const LEFT_MARGIN: u32 = 64;
pub const RIGHT_MARGIN: u32 = 64;
pub const UPPER_MARGIN: u32 = 32;
pub const LOWER_MARGIN: u32 = 32;
pub const HSYNC_LEN: u32 = 64;
pub const VSYNC_LEN: u32 = 2;

bitflags! {
    /// Acceleration flags carried through a mode change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccelFlags: u32 {
        /// The console may use the drawing engine and hardware cursor.
        const TEXT = 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Depth {
    Bpp8,
    Bpp16,
}

impl Depth {
    pub const fn bits(self) -> u32 {
        match self {
            Depth::Bpp8 => 8,
            Depth::Bpp16 => 16,
        }
    }

    pub const fn bytes(self) -> u32 {
        self.bits() / 8
    }

    /// Rounds a requested depth up to a supported one.
    pub fn from_bits(bits: u32) -> Result<Self, ModeError> {
        match bits {
            0..=8 => Ok(Depth::Bpp8),
            9..=16 => Ok(Depth::Bpp16),
            _ => Err(ModeError::DepthTooLarge(bits)),
        }
    }

    /// Palette size exposed at this depth.
    pub const fn color_entries(self) -> usize {
        match self {
            Depth::Bpp8 => 256,
            Depth::Bpp16 => 16,
        }
    }
}

/// Position and width of one colour channel within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitfield {
    pub offset: u32,
    pub length: u32,
}

impl Bitfield {
    pub const fn new(offset: u32, length: u32) -> Self {
        Self { offset, length }
    }
}

/// A mode as requested by, or reported to, the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeDescriptor {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub red: Bitfield,
    pub green: Bitfield,
    pub blue: Bitfield,
    pub transp: Bitfield,
    pub accel: AccelFlags,
    /// Pixel clock period in picoseconds.
    pub pixclock_ps: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
}

/// Validated, hardware-ready form of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareParams {
    pub depth: Depth,
    pub width: u32,
    pub height: u32,
    pub virtual_height: u32,
    /// Scanline length in bytes.
    pub pitch: u32,
    /// Display start in bytes.
    pub base: u32,
    /// Cursor image location, directly after the virtual screen.
    pub cursor_base: u32,
    pub pixclock_khz: u32,
    pub accel: AccelFlags,
}

impl HardwareParams {
    pub fn accel_text(&self) -> bool {
        self.accel.contains(AccelFlags::TEXT)
    }

    pub fn table(&self) -> Option<&'static ModeTable> {
        table_for(self.depth, self.width)
    }
}

/// Video memory a mode may occupy.
pub fn usable_memory(memory_size: usize) -> u64 {
    memory_size.saturating_sub(RESERVED_OVERHEAD) as u64
}

/// Largest multiple-of-8 row count of `pitch` bytes that fits in usable memory.
pub fn fit_virtual_height(memory_size: usize, pitch: u32) -> u32 {
    if pitch == 0 {
        return 0;
    }
    let rows = usable_memory(memory_size) / u64::from(pitch);
    (rows / 8 * 8) as u32
}

/// Visible height implied by the visible width. 800 wide at 16 bpp gives up 8 rows.
pub fn visible_height(width: u32, depth: Depth) -> Result<u32, ModeError> {
    match (width, depth) {
        (640, _) => Ok(480),
        (800, Depth::Bpp8) => Ok(600),
        (800, Depth::Bpp16) => Ok(592),
        _ => Err(ModeError::UnsupportedWidth(width)),
    }
}

/// Converts a pixel period to a clock, falling back to the default when out of range.
pub fn pixclock_khz(period_ps: u32) -> u32 {
    if period_ps == 0 {
        return PIXCLOCK_DEFAULT_KHZ;
    }
    let khz = PS_PER_KHZ / period_ps;
    if (PIXCLOCK_MIN_KHZ..=PIXCLOCK_MAX_KHZ).contains(&khz) {
        khz
    } else {
        PIXCLOCK_DEFAULT_KHZ
    }
}

pub fn pixclock_ps(khz: u32) -> u32 {
    PS_PER_KHZ / khz.max(1)
}

/// Validates `var` against the installed memory and derives the hardware parameters.
///
/// On success the requested visible and virtual heights in `var` are replaced by the effective
/// ones. On failure `var` is left as it was. No register is touched either way.
pub fn decode(var: &mut ModeDescriptor, memory_size: usize) -> Result<HardwareParams, ModeError> {
    let depth = Depth::from_bits(var.bits_per_pixel)?;
    if var.xres_virtual == 0 {
        return Err(ModeError::ZeroVirtualWidth);
    }
    let pitch = var
        .xres_virtual
        .checked_mul(depth.bytes())
        .ok_or(ModeError::InsufficientMemory {
            required: u64::from(var.xres_virtual) * u64::from(depth.bytes()),
            available: usable_memory(memory_size),
        })?;
    let virtual_height = fit_virtual_height(memory_size, pitch);
    let height = visible_height(var.xres, depth)?;

    let available = usable_memory(memory_size);
    let required = u64::from(pitch) * u64::from(virtual_height.max(height));
    if required > available {
        return Err(ModeError::InsufficientMemory {
            required,
            available,
        });
    }

    let params = HardwareParams {
        depth,
        width: var.xres,
        height,
        virtual_height,
        pitch,
        base: pitch.saturating_mul(var.yoffset),
        cursor_base: pitch * virtual_height,
        pixclock_khz: pixclock_khz(var.pixclock_ps),
        accel: var.accel,
    };

    var.yres = height;
    var.yres_virtual = virtual_height;
    tracing::debug!(?params, "decoded mode");
    Ok(params)
}

/// Reports the effective mode for a parameter block.
pub fn encode(params: &HardwareParams, memory_size: usize) -> ModeDescriptor {
    let (red, green, blue) = match params.depth {
        Depth::Bpp8 => (Bitfield::new(0, 6), Bitfield::new(0, 6), Bitfield::new(0, 6)),
        Depth::Bpp16 => (
            Bitfield::new(11, 5),
            Bitfield::new(5, 6),
            Bitfield::new(0, 5),
        ),
    };
    let height = if params.depth == Depth::Bpp16 && params.height == 600 {
        592
    } else {
        params.height
    };

    ModeDescriptor {
        xres: params.width,
        yres: height,
        xres_virtual: params.width,
        yres_virtual: fit_virtual_height(memory_size, params.width * params.depth.bytes()),
        xoffset: 0,
        yoffset: if params.pitch == 0 {
            0
        } else {
            params.base / params.pitch
        },
        bits_per_pixel: params.depth.bits(),
        red,
        green,
        blue,
        transp: Bitfield::default(),
        accel: params.accel,
        pixclock_ps: pixclock_ps(params.pixclock_khz),
        left_margin: LEFT_MARGIN,
        right_margin: RIGHT_MARGIN,
        upper_margin: UPPER_MARGIN,
        lower_margin: LOWER_MARGIN,
        hsync_len: HSYNC_LEN,
        vsync_len: VSYNC_LEN,
    }
}

/// Byte offset of a pan position.
pub fn pan_offset(xoffset: u32, yoffset: u32, xres: u32, bits_per_pixel: u32) -> u32 {
    (xoffset + yoffset * xres) * bits_per_pixel / 8
}

/// Writes the depth/resolution timing table: all extension registers, then all CRT registers.
pub fn program_timing<P: PortIo + ?Sized>(io: &mut P, table: &ModeTable) {
    tracing::debug!(mode = table.name, "programming mode timing");
    io.write_table(Space::Extension, table.xr);
    io.write_table(Space::Crtc, table.cr);
}

/// Programs the display start address (a byte offset into video memory).
pub fn set_display_start<P: PortIo + ?Sized>(io: &mut P, base: u32) {
    let addr = base >> 2;
    io.set_cr(0x0D, addr as u8);
    io.set_cr(0x0C, (addr >> 8) as u8);
    io.set_xr(0x0C, (addr >> 16) as u8);
}

/// A mode selectable by name at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedMode {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub depth: Depth,
    pub pixclock_ps: u32,
}

impl NamedMode {
    pub fn descriptor(&self) -> ModeDescriptor {
        let (red, green, blue) = match self.depth {
            Depth::Bpp8 => (Bitfield::new(0, 6), Bitfield::new(0, 6), Bitfield::new(0, 6)),
            Depth::Bpp16 => (
                Bitfield::new(0, 5),
                Bitfield::new(5, 6),
                Bitfield::new(11, 5),
            ),
        };
        ModeDescriptor {
            xres: self.width,
            yres: self.height,
            xres_virtual: self.width,
            yres_virtual: self.height,
            bits_per_pixel: self.depth.bits(),
            red,
            green,
            blue,
            pixclock_ps: self.pixclock_ps,
            left_margin: LEFT_MARGIN,
            right_margin: RIGHT_MARGIN,
            upper_margin: UPPER_MARGIN,
            lower_margin: LOWER_MARGIN,
            hsync_len: HSYNC_LEN,
            vsync_len: VSYNC_LEN,
            ..ModeDescriptor::default()
        }
    }
}

pub const PREDEFINED_MODES: [NamedMode; 4] = [
    NamedMode {
        name: "640x480x8",
        width: 640,
        height: 480,
        depth: Depth::Bpp8,
        pixclock_ps: 25_000,
    },
    NamedMode {
        name: "640x480x16",
        width: 640,
        height: 480,
        depth: Depth::Bpp16,
        pixclock_ps: 20_000,
    },
    NamedMode {
        name: "800x600x8",
        width: 800,
        height: 600,
        depth: Depth::Bpp8,
        pixclock_ps: 25_000,
    },
    NamedMode {
        name: "800x592x16",
        width: 800,
        height: 592,
        depth: Depth::Bpp16,
        pixclock_ps: 20_000,
    },
];

pub fn find_mode(name: &str) -> Option<usize> {
    PREDEFINED_MODES.iter().position(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MB: usize = 1024 * 1024;

    fn request(xres: u32, bpp: u32) -> ModeDescriptor {
        ModeDescriptor {
            xres,
            yres: 1,
            xres_virtual: xres,
            yres_virtual: 4096,
            bits_per_pixel: bpp,
            pixclock_ps: 25_000,
            ..ModeDescriptor::default()
        }
    }

    #[test]
    fn depth_rounds_up() {
        assert_eq!(Depth::from_bits(1), Ok(Depth::Bpp8));
        assert_eq!(Depth::from_bits(8), Ok(Depth::Bpp8));
        assert_eq!(Depth::from_bits(15), Ok(Depth::Bpp16));
        assert_eq!(Depth::from_bits(24), Err(ModeError::DepthTooLarge(24)));
    }

    #[test]
    fn virtual_height_is_rounded_down_to_eight_rows() {
        // (1 MiB - 97024) / 640 = 1486.9 -> 1480
        assert_eq!(fit_virtual_height(MB, 640), 1480);
        // (1 MiB - 97024) / 1600 = 594.7 -> 592
        assert_eq!(fit_virtual_height(MB, 1600), 592);
    }

    #[test]
    fn decode_overwrites_requested_heights() {
        let mut var = request(800, 16);
        let params = decode(&mut var, MB).unwrap();

        assert_eq!(params.depth, Depth::Bpp16);
        assert_eq!(params.pitch, 1600);
        assert_eq!(params.height, 592);
        assert_eq!(params.virtual_height, 592);
        assert_eq!(params.cursor_base, 1600 * 592);
        assert_eq!(params.pixclock_khz, 40_000);
        assert_eq!((var.yres, var.yres_virtual), (592, 592));
    }

    #[test]
    fn rejection_leaves_the_request_untouched() {
        let mut var = request(1024, 8);
        let before = var;
        assert_eq!(
            decode(&mut var, MB),
            Err(ModeError::UnsupportedWidth(1024))
        );
        assert_eq!(var, before);
    }

    #[test]
    fn too_little_memory_is_rejected() {
        let mut var = request(800, 16);
        assert_eq!(
            decode(&mut var, 512 * 1024),
            Err(ModeError::InsufficientMemory {
                required: 1600 * 592,
                available: (512 * 1024 - RESERVED_OVERHEAD) as u64,
            })
        );
    }

    #[test]
    fn zero_virtual_width_is_rejected() {
        let mut var = request(640, 8);
        var.xres_virtual = 0;
        assert_eq!(decode(&mut var, MB), Err(ModeError::ZeroVirtualWidth));
    }

    #[test]
    fn pixclock_clamps_to_default() {
        assert_eq!(pixclock_khz(25_000), 40_000);
        assert_eq!(pixclock_khz(20_000), 50_000);
        assert_eq!(pixclock_khz(1_000), 40_000);
        assert_eq!(pixclock_khz(1_000_000), 40_000);
        assert_eq!(pixclock_khz(0), 40_000);
        assert_eq!(pixclock_khz(4_545), PIXCLOCK_DEFAULT_KHZ);
        assert_eq!(pixclock_khz(4_546), 219_973);
    }

    #[test]
    fn pan_offset_uses_visible_width() {
        assert_eq!(pan_offset(0, 10, 640, 8), 6400);
        assert_eq!(pan_offset(4, 10, 800, 16), 16_008);
    }

    #[test]
    fn encode_reports_channel_layout_and_margins() {
        let mut var = request(640, 16);
        var.yoffset = 3;
        let params = decode(&mut var, MB).unwrap();
        let out = encode(&params, MB);

        assert_eq!(out.red, Bitfield::new(11, 5));
        assert_eq!(out.green, Bitfield::new(5, 6));
        assert_eq!(out.blue, Bitfield::new(0, 5));
        assert_eq!(out.yoffset, 3);
        assert_eq!(out.pixclock_ps, 25_000);
        assert_eq!(
            (out.left_margin, out.hsync_len, out.vsync_len),
            (64, 64, 2)
        );
    }

    #[test]
    fn named_modes_match_tables() {
        for mode in PREDEFINED_MODES {
            let table = table_for(mode.depth, mode.width).unwrap();
            assert_eq!(table.name, mode.name);
        }
        assert_eq!(find_mode("800x592x16"), Some(3));
        assert_eq!(find_mode("1024x768x8"), None);
    }

    #[test]
    fn timing_tables_start_with_engine_depth() {
        for table in &MODE_TABLES {
            let expected = match table.depth {
                Depth::Bpp8 => 0x01,
                Depth::Bpp16 => 0x02,
            };
            assert_eq!(table.xr[0].index, 0x40);
            assert_eq!(table.xr[0].value, expected);
        }
    }
}
