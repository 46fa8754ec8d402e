//! Hardware text cursor.
//!
//! The cursor image is a 32x32 two-plane (AND/XOR) bitmap stored right after the virtual screen;
//! position and visibility live in the drawing-engine register block.

use ct48_io::{PortIo, VideoMemory};

use crate::accel::Blitter;
use crate::regs::{Dr, RegisterFile};

/// Hidden, 32x32, hot spot at the image origin.
pub const CONTROL_OFF: u32 = 0x0000_0020;
pub const CONTROL_ON: u32 = 0x0000_0021;
pub const CONTROL_ON_BLINK: u32 = 0x0000_8021;
/// Cursor engine fully disabled.
pub const CONTROL_DISABLED: u32 = 0;

pub const MAX_ROWS: u32 = 32;
/// Row with every pixel transparent.
pub const TRANSPARENT_ROW: u32 = 0x00FF_00FF;

const Y_NEGATIVE: u32 = 0x8000;

/// What the console wants done with the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMode {
    Erase,
    Draw,
    Move,
}

/// First bitmap word of a visible row, by cell width.
pub fn row_pattern(width: u32) -> u32 {
    match width {
        8 => 0x00FF_FFFF,
        12 => 0xF0FF_FFFF,
        14 => 0xFCFF_FFFF,
        16 => 0xFFFF_FFFF,
        _ => 0x00FF_01FF,
    }
}

/// Encodes a cursor position; negative rows (above the pan origin) carry bit 15.
pub fn encode_position(x: u32, y: i32) -> (u32, u32) {
    let x = x & 0xFFFF;
    let y = if y < 0 {
        (y as u32 & 0x7FFF) | Y_NEGATIVE
    } else {
        y as u32 & 0x7FFF
    };
    (x, y)
}

/// Writes the cursor image for a `width` x `height` cell at `base`.
///
/// A zero dimension selects the 8x8 default; heights past 32 rows are clipped.
pub fn write_shape<M: VideoMemory + ?Sized>(vram: &mut M, base: usize, width: u32, height: u32) {
    let (width, height) = if width == 0 || height == 0 {
        (8, 8)
    } else {
        (width, height.min(MAX_ROWS))
    };
    let visible = row_pattern(width);
    let mut offset = base;
    for row in 0..MAX_ROWS {
        let first = if row < height { visible } else { TRANSPARENT_ROW };
        vram.write_u32(offset, first);
        vram.write_u32(offset + 4, TRANSPARENT_ROW);
        offset += 8;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HwCursor {
    /// Cleared for good once the hardware cursor is given up.
    active: bool,
    /// The off pattern has been written; later disables are no-ops.
    given_up: bool,
    visible: bool,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    blink: bool,
}

impl HwCursor {
    pub fn new(active: bool, blink: bool) -> Self {
        Self {
            active,
            blink,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw encoded position as last written.
    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Points the cursor engine at the image and hides it.
    pub fn init<P: PortIo + ?Sized>(&self, io: &mut P, cursor_base: u32) {
        if !self.active {
            return;
        }
        io.write_dr(Dr::CursorBase, cursor_base);
        io.write_dr(Dr::CursorControl, CONTROL_OFF);
    }

    /// Records a new cell size and regenerates the image. No-op if the cursor is inactive.
    pub fn set_shape<P: PortIo + ?Sized, M: VideoMemory + ?Sized>(
        &mut self,
        io: &mut P,
        vram: &mut M,
        blitter: &Blitter,
        cursor_base: u32,
        width: u32,
        height: u32,
    ) {
        if !self.active {
            return;
        }
        self.width = width;
        self.height = height;
        self.redraw(io, vram, blitter, cursor_base);
    }

    /// Rewrites the image for the current shape.
    pub fn redraw<P: PortIo + ?Sized, M: VideoMemory + ?Sized>(
        &self,
        io: &mut P,
        vram: &mut M,
        blitter: &Blitter,
        cursor_base: u32,
    ) {
        if !self.active {
            return;
        }
        blitter.wait_idle(io);
        write_shape(vram, cursor_base as usize, self.width, self.height);
    }

    /// Moves, shows or hides the cursor. `x` is in pixels, `y` in pixels relative to the pan
    /// origin.
    ///
    /// Returns whether any register was written: a request that changes neither position nor
    /// visibility is dropped.
    pub fn update<P: PortIo + ?Sized>(
        &mut self,
        io: &mut P,
        blitter: &Blitter,
        mode: CursorMode,
        x: u32,
        y: i32,
    ) -> bool {
        if !self.active {
            return false;
        }
        let (x, y) = encode_position(x, y);
        let erase = mode == CursorMode::Erase;
        if self.x == x && self.y == y && erase == !self.visible {
            return false;
        }

        self.x = x;
        self.y = y;
        self.visible = !erase;

        blitter.wait_idle(io);
        io.write_dr(Dr::CursorPosition, (y << 16) + x);
        let control = match (erase, self.blink) {
            (true, _) => CONTROL_OFF,
            (false, false) => CONTROL_ON,
            (false, true) => CONTROL_ON_BLINK,
        };
        io.write_dr(Dr::CursorControl, control);
        tracing::trace!(x, y, ?mode, "cursor update");
        true
    }

    /// Gives up the hardware cursor. `write_off` also switches the cursor engine off.
    ///
    /// Only the first call has any effect; returns whether this call was it.
    pub fn disable<P: PortIo + ?Sized>(&mut self, io: &mut P, write_off: bool) -> bool {
        if self.given_up {
            return false;
        }
        if write_off {
            io.write_dr(Dr::CursorControl, CONTROL_DISABLED);
        }
        tracing::debug!(was_active = self.active, "hardware cursor disabled");
        self.given_up = true;
        self.active = false;
        self.visible = false;
        true
    }
}
