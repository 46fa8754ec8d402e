//! CPU rendering straight into video memory.
//!
//! Used whenever the drawing engine is off, and for the console operations the engine has no
//! accelerated form for.

use ct48_io::VideoMemory;

use crate::accel::{Rect, Surface};
use crate::mode::Depth;

fn put_pixel<M: VideoMemory + ?Sized>(vram: &mut M, depth: Depth, offset: usize, color: u32) {
    match depth {
        Depth::Bpp8 => vram.write_u8(offset, color as u8),
        Depth::Bpp16 => vram.write_u16(offset, color as u16),
    }
}

/// Copies a block of pixels; overlapping source and destination are handled.
#[allow(clippy::too_many_arguments)]
pub fn copy_rect<M: VideoMemory + ?Sized>(
    vram: &mut M,
    surface: &Surface,
    src_x: u32,
    src_y: u32,
    dst_x: u32,
    dst_y: u32,
    width: u32,
    height: u32,
) {
    let row_bytes = surface.row_bytes(width) as usize;
    let mut row = vec![0u8; row_bytes];
    let copy_row = |vram: &mut M, row: &mut [u8], line: u32| {
        let src = surface.byte_address(src_x, src_y + line) as usize;
        let dst = surface.byte_address(dst_x, dst_y + line) as usize;
        for (i, b) in row.iter_mut().enumerate() {
            *b = vram.read_u8(src + i);
        }
        vram.write_bytes(dst, row);
    };

    if dst_y > src_y {
        for line in (0..height).rev() {
            copy_row(vram, &mut row, line);
        }
    } else {
        for line in 0..height {
            copy_row(vram, &mut row, line);
        }
    }
}

pub fn fill_rect<M: VideoMemory + ?Sized>(vram: &mut M, surface: &Surface, rect: Rect, color: u32) {
    let bpp = surface.depth.bytes() as usize;
    for y in rect.y..rect.y + rect.height {
        let start = surface.byte_address(rect.x, y) as usize;
        for i in 0..rect.width as usize {
            put_pixel(vram, surface.depth, start + i * bpp, color);
        }
    }
}

/// Expands a glyph bitmap (`row_step` bytes per row, MSB leftmost) into a `cell_width` wide cell.
#[allow(clippy::too_many_arguments)]
pub fn put_glyph<M: VideoMemory + ?Sized>(
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
    let bpp = surface.depth.bytes() as usize;
    for (line, bits) in rows.chunks(row_step.max(1)).enumerate() {
        let start = surface.byte_address(x, y + line as u32) as usize;
        for col in 0..cell_width as usize {
            let set = bits
                .get(col / 8)
                .is_some_and(|b| b & (0x80 >> (col % 8)) != 0);
            put_pixel(
                vram,
                surface.depth,
                start + col * bpp,
                if set { fg } else { bg },
            );
        }
    }
}

/// Inverts the low colour bits of every pixel in `rect`.
pub fn invert_rect<M: VideoMemory + ?Sized>(vram: &mut M, surface: &Surface, rect: Rect) {
    let bpp = surface.depth.bytes() as usize;
    for y in rect.y..rect.y + rect.height {
        let start = surface.byte_address(rect.x, y) as usize;
        for i in 0..rect.width as usize {
            let offset = start + i * bpp;
            match surface.depth {
                Depth::Bpp8 => {
                    let v = vram.read_u8(offset);
                    vram.write_u8(offset, v ^ 0x0F);
                }
                Depth::Bpp16 => {
                    let v = vram.read_u16(offset);
                    vram.write_u16(offset, v ^ 0xFFFF);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct48_emu::{ChipConfig, EmuPlatform};
    use ct48_io::Platform;
    use pretty_assertions::assert_eq;

    const SURFACE: Surface = Surface {
        depth: Depth::Bpp8,
        pitch: 64,
    };

    fn pixel(vram: &mut impl VideoMemory, x: u32, y: u32) -> u8 {
        vram.read_u8(SURFACE.byte_address(x, y) as usize)
    }

    #[test]
    fn glyph_bits_are_msb_first() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut vram = hw.map_video_memory(0xE0_0000, 64 * 1024).unwrap();

        put_glyph(&mut vram, &SURFACE, 4, 2, 12, &[0x80, 0x10, 0x01, 0x00], 2, 7, 1);

        assert_eq!(pixel(&mut vram, 4, 2), 7);
        assert_eq!(pixel(&mut vram, 5, 2), 1);
        assert_eq!(pixel(&mut vram, 15, 2), 7);
        assert_eq!(pixel(&mut vram, 14, 2), 1);
        assert_eq!(pixel(&mut vram, 11, 3), 7);
        assert_eq!(pixel(&mut vram, 4, 3), 1);
    }

    #[test]
    fn overlapping_copy_down_is_intact() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut vram = hw.map_video_memory(0xE0_0000, 64 * 1024).unwrap();
        for y in 0..8 {
            fill_rect(&mut vram, &SURFACE, Rect::new(0, y, 8, 1), y + 1);
        }

        copy_rect(&mut vram, &SURFACE, 0, 0, 2, 2, 8, 8);

        for y in 0..8 {
            assert_eq!(pixel(&mut vram, 2, y + 2), y as u8 + 1);
            assert_eq!(pixel(&mut vram, 9, y + 2), y as u8 + 1);
        }
    }

    #[test]
    fn invert_flips_low_nibble_at_8bpp() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut vram = hw.map_video_memory(0xE0_0000, 64 * 1024).unwrap();
        fill_rect(&mut vram, &SURFACE, Rect::new(0, 0, 2, 2), 0x31);

        invert_rect(&mut vram, &SURFACE, Rect::new(0, 0, 1, 1));

        assert_eq!(pixel(&mut vram, 0, 0), 0x3E);
        assert_eq!(pixel(&mut vram, 1, 0), 0x31);
    }
}
