//! Text console surface: the operations a character console issues against the framebuffer.
//!
//! Coordinates are in character cells unless stated otherwise. Cell values are 16-bit with the
//! glyph index in the low bits, foreground colour in bits 8..12 and background in bits 12..16.

use crate::cursor::CursorMode;

/// A bitmap console font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    pub width: u32,
    pub height: u32,
    /// `glyph_step(width) * height` bytes per glyph, glyphs stored back to back.
    pub data: Vec<u8>,
    /// Mask applied to a cell value to get the glyph index (0xFF or 0x1FF).
    pub charmask: u16,
}

impl Font {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            charmask: 0xFF,
        }
    }

    pub fn step(&self) -> usize {
        glyph_step(self.width)
    }

    /// Bitmap of the glyph for cell value `c`. Empty if the font has no such glyph.
    pub fn glyph(&self, c: u16) -> &[u8] {
        let len = self.step() * self.height as usize;
        let start = usize::from(c & self.charmask) * len;
        self.data.get(start..start + len).unwrap_or(&[])
    }
}

/// Bytes per glyph row.
pub const fn glyph_step(width: u32) -> usize {
    if width <= 8 {
        1
    } else if width <= 16 {
        2
    } else {
        4
    }
}

pub const fn attr_fg(c: u16) -> u8 {
    ((c >> 8) & 0x0F) as u8
}

pub const fn attr_bg(c: u16) -> u8 {
    ((c >> 12) & 0x0F) as u8
}

/// Console repaint entry points.
pub trait ConsoleOps {
    /// Bitmask of usable font widths; bit `w - 1` set means width `w` is supported.
    fn font_width_mask(&self) -> u32;

    /// Moves a `width` x `height` block of cells from `(sx, sy)` to `(dx, dy)`.
    #[allow(clippy::too_many_arguments)]
    fn move_cells(&mut self, sy: u32, sx: u32, dy: u32, dx: u32, height: u32, width: u32);

    /// Clears a block of cells to background colour `bg`.
    fn clear_cells(&mut self, sy: u32, sx: u32, height: u32, width: u32, bg: u8);

    fn put_char(&mut self, c: u16, yy: u32, xx: u32);

    fn put_chars(&mut self, s: &[u16], yy: u32, xx: u32);

    /// Inverts one cell (software cursor).
    fn reverse_cell(&mut self, xx: u32, yy: u32);

    /// Clears the strip right of and below the text area.
    fn clear_margins(&mut self, bg: u8, bottom_only: bool);

    fn cursor(&mut self, mode: CursorMode, xx: u32, yy: u32);

    /// Installs a font. Returns whether the driver accepted it.
    fn set_font(&mut self, font: Font) -> bool;
}
