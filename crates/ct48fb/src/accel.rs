//! Drawing engine ("BitBLT") programming.
//!
//! Every operation follows the same discipline: wait for the engine to go idle, load the
//! operand registers, start the operation by writing DR07, then wait for idle again before
//! returning. Callers never observe a busy engine.

use bitflags::bitflags;
use ct48_io::{PortIo, VideoMemory};

use crate::mode::Depth;
use crate::regs::{Dr, RegisterFile};

/// DR04 read-back bit set while an operation is in flight.
pub const BLT_BUSY: u32 = 0x0010_0000;

const ADDR_MASK: u32 = 0x1F_FFFF;
const FIELD_MASK: u32 = 0xFFF;

bitflags! {
    /// DR04 control bits above the raster-op byte.
    ///
    /// Bottom-to-top and right-to-left are the cleared states of the two direction bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Rop: u32 {
        const TOP_TO_BOTTOM = 0x0100;
        const LEFT_TO_RIGHT = 0x0200;
        const SRC_MONO = 0x0800;
        const PAT_MONO = 0x1000;
        const SRC_SYSTEM = 0x4000;
        const PAT_SOLID = 0x8_0000;
    }
}

/// ROP3 code: destination = source.
pub const ROP_SRC_COPY: u32 = 0xCC;
/// ROP3 code: destination = pattern.
pub const ROP_PAT_COPY: u32 = 0xF0;

/// Geometry of the surface being drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub depth: Depth,
    /// Scanline length in bytes.
    pub pitch: u32,
}

impl Surface {
    pub fn byte_address(&self, x: u32, y: u32) -> u32 {
        y * self.pitch + x * self.depth.bytes()
    }

    pub fn row_bytes(&self, width: u32) -> u32 {
        width * self.depth.bytes()
    }
}

/// Pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Scan direction for a move from `(src_x, src_y)` to `(dst_x, dst_y)`.
///
/// Scanning starts at the edge nearest the direction of travel so overlapping source pixels
/// are read before they are overwritten.
pub fn move_direction(src_x: u32, src_y: u32, dst_x: u32, dst_y: u32) -> Rop {
    let mut dir = Rop::empty();
    if dst_x < src_x {
        dir |= Rop::LEFT_TO_RIGHT;
    }
    if dst_y < src_y {
        dir |= Rop::TOP_TO_BOTTOM;
    }
    dir
}

/// Colour register value: 8 bpp indices are replicated into both bytes.
pub fn engine_color(depth: Depth, color: u32) -> u32 {
    match depth {
        Depth::Bpp8 => {
            let c = color & 0xFF;
            (c << 8) | c
        }
        Depth::Bpp16 => color & 0xFFFF,
    }
}

/// Register-level drawing primitives.
#[derive(Debug, Default)]
pub struct Blitter {
    last_was_move: bool,
}

impl Blitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spins until the engine reports idle. There is no timeout.
    pub fn wait_idle<P: PortIo + ?Sized>(&self, io: &mut P) {
        while io.read_dr(Dr::Control) & BLT_BUSY != 0 {
            core::hint::spin_loop();
        }
    }

    /// Whether the last operation was a move. Clears the flag.
    pub fn take_move_hazard(&mut self) -> bool {
        core::mem::take(&mut self.last_was_move)
    }

    pub fn last_was_move(&self) -> bool {
        self.last_was_move
    }

    fn set_pitch<P: PortIo + ?Sized>(io: &mut P, src: u32, dst: u32) {
        io.write_dr(Dr::Pitch, ((dst & FIELD_MASK) << 16) | (src & FIELD_MASK));
    }

    fn go<P: PortIo + ?Sized>(io: &mut P, lines: u32, bytes: u32) {
        io.write_dr(
            Dr::HeightWidth,
            ((lines & FIELD_MASK) << 16) | (bytes & FIELD_MASK),
        );
    }

    fn set_colors<P: PortIo + ?Sized>(io: &mut P, depth: Depth, fg: u32, bg: u32) {
        io.write_dr(Dr::FgColor, engine_color(depth, fg));
        io.write_dr(Dr::BgColor, engine_color(depth, bg));
    }

    /// Copies a `width` x `height` pixel block from `(src_x, src_y)` to `(dst_x, dst_y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn move_rect<P: PortIo + ?Sized>(
        &mut self,
        io: &mut P,
        surface: &Surface,
        src_x: u32,
        src_y: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
    ) {
        let dir = move_direction(src_x, src_y, dst_x, dst_y);
        let row_bytes = surface.row_bytes(width);
        let mut src = surface.byte_address(src_x, src_y);
        let mut dst = surface.byte_address(dst_x, dst_y);

        if !dir.contains(Rop::LEFT_TO_RIGHT) {
            src += row_bytes.saturating_sub(1);
            dst += row_bytes.saturating_sub(1);
        }
        if !dir.contains(Rop::TOP_TO_BOTTOM) {
            let last_row = height.saturating_sub(1) * surface.pitch;
            src += last_row;
            dst += last_row;
        }

        tracing::trace!(src, dst, width, height, ?dir, "blit move");
        self.wait_idle(io);
        io.write_dr(Dr::Control, ROP_SRC_COPY | dir.bits());
        io.write_dr(Dr::SrcAddr, src & ADDR_MASK);
        io.write_dr(Dr::DstAddr, dst & ADDR_MASK);
        Self::set_pitch(io, surface.pitch, surface.pitch);
        Self::go(io, height, row_bytes);
        self.wait_idle(io);
        self.last_was_move = true;
    }

    /// Fills a rectangle with a solid colour.
    pub fn fill_rect<P: PortIo + ?Sized>(
        &mut self,
        io: &mut P,
        surface: &Surface,
        rect: Rect,
        color: u32,
    ) {
        let dst = surface.byte_address(rect.x, rect.y);
        tracing::trace!(dst, ?rect, color, "blit fill");
        self.wait_idle(io);
        io.write_dr(Dr::DstAddr, dst & ADDR_MASK);
        Self::set_colors(io, surface.depth, color, color);
        let rop = Rop::TOP_TO_BOTTOM | Rop::LEFT_TO_RIGHT | Rop::PAT_SOLID | Rop::PAT_MONO;
        io.write_dr(Dr::Control, ROP_PAT_COPY | rop.bits());
        Self::set_pitch(io, 0, surface.pitch);
        Self::go(io, rect.height, surface.row_bytes(rect.width));
        self.wait_idle(io);
    }

    /// Expands a monochrome glyph from system memory into a `cell_width` x `rows.len() / row_step`
    /// cell at `(x, y)`.
    ///
    /// `rows` holds `row_step` bytes per scanline, most significant bit leftmost. The bitmap is
    /// streamed through the start of the aperture after the operation has been started.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_glyph<P: PortIo + ?Sized, M: VideoMemory + ?Sized>(
        &mut self,
        io: &mut P,
        vram: &mut M,
        surface: &Surface,
        x: u32,
        y: u32,
        cell_width: u32,
        rows: &[u8],
        row_step: usize,
        fg: u32,
        bg: u32,
    ) {
        let height = (rows.len() / row_step.max(1)) as u32;
        let dst = surface.byte_address(x, y);
        tracing::trace!(dst, cell_width, height, fg, bg, "blit glyph");
        self.wait_idle(io);
        io.write_dr(Dr::SrcAddr, 0);
        io.write_dr(Dr::DstAddr, dst & ADDR_MASK);
        Self::set_colors(io, surface.depth, fg, bg);
        Self::set_pitch(io, 0, surface.pitch);
        let rop = Rop::SRC_MONO | Rop::SRC_SYSTEM | Rop::TOP_TO_BOTTOM | Rop::LEFT_TO_RIGHT;
        io.write_dr(Dr::Control, ROP_SRC_COPY | rop.bits());
        Self::go(io, height, surface.row_bytes(cell_width));
        vram.write_bytes(0, rows);
        self.wait_idle(io);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct48_emu::{ChipConfig, EmuPlatform};
    use pretty_assertions::assert_eq;

    const SURFACE8: Surface = Surface {
        depth: Depth::Bpp8,
        pitch: 640,
    };

    fn dr_writes(hw: &EmuPlatform) -> Vec<(u16, u32)> {
        hw.chip()
            .port_writes()
            .into_iter()
            .filter(|(_, size, _)| *size == 4)
            .map(|(port, _, value)| (port, value))
            .collect()
    }

    #[test]
    fn direction_follows_travel() {
        assert_eq!(
            move_direction(10, 10, 5, 5),
            Rop::LEFT_TO_RIGHT | Rop::TOP_TO_BOTTOM
        );
        assert_eq!(move_direction(5, 5, 10, 10), Rop::empty());
        assert_eq!(move_direction(5, 10, 10, 5), Rop::TOP_TO_BOTTOM);
        assert_eq!(move_direction(7, 7, 7, 7), Rop::empty());
    }

    #[test]
    fn colors_replicate_at_8bpp() {
        assert_eq!(engine_color(Depth::Bpp8, 0x1A3), 0xA3A3);
        assert_eq!(engine_color(Depth::Bpp16, 0x1_F81F), 0xF81F);
    }

    #[test]
    fn backward_move_starts_at_far_corner() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        hw.chip().clear_log();
        let mut blitter = Blitter::new();

        blitter.move_rect(&mut hw, &SURFACE8, 0, 0, 8, 16, 8, 16);

        let src = 15 * 640 + 7;
        let dst = 31 * 640 + 15;
        assert_eq!(
            dr_writes(&hw),
            vec![
                (Dr::Control.port(), 0xCC),
                (Dr::SrcAddr.port(), src),
                (Dr::DstAddr.port(), dst),
                (Dr::Pitch.port(), (640 << 16) | 640),
                (Dr::HeightWidth.port(), (16 << 16) | 8),
            ]
        );
        assert!(blitter.take_move_hazard());
        assert!(!blitter.take_move_hazard());
    }

    #[test]
    fn fill_programs_solid_pattern() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        hw.chip().clear_log();
        let surface = Surface {
            depth: Depth::Bpp16,
            pitch: 1280,
        };

        Blitter::new().fill_rect(&mut hw, &surface, Rect::new(2, 3, 4, 5), 0xF800);

        assert_eq!(
            dr_writes(&hw),
            vec![
                (Dr::DstAddr.port(), 3 * 1280 + 4),
                (Dr::FgColor.port(), 0xF800),
                (Dr::BgColor.port(), 0xF800),
                (Dr::Control.port(), 0xF0 | 0x100 | 0x200 | 0x8_0000 | 0x1000),
                (Dr::Pitch.port(), 1280 << 16),
                (Dr::HeightWidth.port(), (5 << 16) | 8),
            ]
        );
    }

    #[test]
    fn operations_wait_for_idle_on_both_sides() {
        let mut hw = EmuPlatform::new(ChipConfig {
            busy_polls: 3,
            ..ChipConfig::ct65548_vl()
        });
        let mut blitter = Blitter::new();
        blitter.fill_rect(&mut hw, &SURFACE8, Rect::new(0, 0, 8, 8), 1);
        assert_eq!(hw.chip().dr(Dr::Control.port()) & BLT_BUSY, 0);
        assert!(hw.chip().busy_reads() >= 3);
    }
}
