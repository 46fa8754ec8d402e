//! Drawing engine execution.
//!
//! Operations run to completion when DR07 is written, except system-memory sourced ones, which
//! run once the source bytes have been streamed through the aperture. Bytes are processed in the
//! order the direction bits ask for, so a copy programmed in the wrong direction corrupts
//! overlapping areas the way the real engine does.

use crate::chip::{DR_BG, DR_CONTROL, DR_DST, DR_FG, DR_GO, DR_PITCH, DR_SRC};

const TOP_TO_BOTTOM: u32 = 0x0100;
const LEFT_TO_RIGHT: u32 = 0x0200;
const SRC_MONO: u32 = 0x0800;
const PAT_SOLID: u32 = 0x8_0000;
const SRC_SYSTEM: u32 = 0x4000;

const ADDR_MASK: u32 = 0x1F_FFFF;
const FIELD_MASK: u32 = 0xFFF;

/// Operand registers latched when an operation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EngineOp {
    control: u32,
    src: u32,
    dst: u32,
    src_pitch: u32,
    dst_pitch: u32,
    fg: u32,
    bg: u32,
    lines: u32,
    row_bytes: u32,
    bytes_per_pixel: usize,
}

impl EngineOp {
    pub(crate) fn latch(dr: &[u32], bytes_per_pixel: usize) -> Self {
        let pitch = dr[DR_PITCH];
        let go = dr[DR_GO];
        Self {
            control: dr[DR_CONTROL],
            src: dr[DR_SRC] & ADDR_MASK,
            dst: dr[DR_DST] & ADDR_MASK,
            src_pitch: pitch & FIELD_MASK,
            dst_pitch: (pitch >> 16) & FIELD_MASK,
            fg: dr[DR_FG],
            bg: dr[DR_BG],
            lines: (go >> 16) & FIELD_MASK,
            row_bytes: go & FIELD_MASK,
            bytes_per_pixel,
        }
    }

    fn rop(&self) -> u8 {
        self.control as u8
    }

    fn has(&self, bit: u32) -> bool {
        self.control & bit != 0
    }

    fn pixels_per_row(&self) -> usize {
        self.row_bytes as usize / self.bytes_per_pixel
    }

    /// Bytes of monochrome source per scanline: rows are padded to 1, 2 or 4 bytes.
    fn mono_row_step(&self) -> usize {
        match self.pixels_per_row() {
            0..=8 => 1,
            9..=16 => 2,
            _ => 4,
        }
    }

    /// The pending transfer if this operation takes its source from system memory.
    pub(crate) fn source_transfer(&self) -> Option<MonoTransfer> {
        if !self.has(SRC_SYSTEM) {
            return None;
        }
        let need = if self.has(SRC_MONO) {
            self.mono_row_step() * self.lines as usize
        } else {
            self.row_bytes as usize * self.lines as usize
        };
        if need == 0 {
            return None;
        }
        Some(MonoTransfer {
            op: *self,
            data: Vec::with_capacity(need),
            need,
        })
    }

    /// Address of byte `i` of scanline `line` for a surface starting at `start`.
    fn address(&self, start: u32, pitch: u32, line: u32, i: u32) -> usize {
        let start = i64::from(start);
        let row = i64::from(line) * i64::from(pitch);
        let col = i64::from(i);
        let row = if self.has(TOP_TO_BOTTOM) { row } else { -row };
        let col = if self.has(LEFT_TO_RIGHT) { col } else { -col };
        (start + row + col).rem_euclid(i64::from(ADDR_MASK) + 1) as usize
    }
}

/// Source bytes collected for a system-memory operation.
#[derive(Debug)]
pub(crate) struct MonoTransfer {
    pub(crate) op: EngineOp,
    pub(crate) data: Vec<u8>,
    need: usize,
}

impl MonoTransfer {
    /// Adds a byte. Returns `true` once the operation has all its source data.
    pub(crate) fn push(&mut self, b: u8) -> bool {
        self.data.push(b);
        self.data.len() >= self.need
    }
}

/// Applies a raster op to one byte. Bit `(p << 2) | (s << 1) | d` of `rop` is the result.
fn rop3(rop: u8, p: u8, s: u8, d: u8) -> u8 {
    (0..8).fold(0u8, |out, bit| {
        let idx = ((p >> bit) & 1) << 2 | ((s >> bit) & 1) << 1 | ((d >> bit) & 1);
        out | (((rop >> idx) & 1) << bit)
    })
}

fn color_byte(color: u32, i: u32) -> u8 {
    (color >> (8 * (i & 1))) as u8
}

/// Source byte `i` of scanline `line` for a monochrome expansion.
fn expanded_byte(op: &EngineOp, data: &[u8], line: u32, i: u32) -> u8 {
    let bpp = op.bytes_per_pixel as u32;
    let col = (i / bpp) as usize;
    let step = op.mono_row_step();
    let bits = data
        .get(line as usize * step + col / 8)
        .copied()
        .unwrap_or(0);
    let set = bits & (0x80 >> (col % 8)) != 0;
    let color = if set { op.fg } else { op.bg };
    (color >> (8 * (i % bpp))) as u8
}

pub(crate) fn execute(op: &EngineOp, source: Option<&[u8]>, vram: &mut [u8]) {
    if vram.is_empty() {
        return;
    }
    let len = vram.len();
    let rop = op.rop();
    for line in 0..op.lines {
        for i in 0..op.row_bytes {
            let d_addr = op.address(op.dst, op.dst_pitch, line, i) % len;
            let p = if op.has(PAT_SOLID) {
                color_byte(op.fg, i)
            } else {
                0
            };
            let s = match source {
                Some(data) if op.has(SRC_MONO) => expanded_byte(op, data, line, i),
                Some(data) => data
                    .get((line * op.row_bytes + i) as usize)
                    .copied()
                    .unwrap_or(0),
                None => vram[op.address(op.src, op.src_pitch, line, i) % len],
            };
            vram[d_addr] = rop3(rop, p, s, vram[d_addr]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rop3_identities() {
        assert_eq!(rop3(0xCC, 0x00, 0x5A, 0xFF), 0x5A);
        assert_eq!(rop3(0xF0, 0x3C, 0x5A, 0xFF), 0x3C);
        assert_eq!(rop3(0xAA, 0x3C, 0x5A, 0x81), 0x81);
        assert_eq!(rop3(0x66, 0x00, 0x0F, 0xFF), 0xF0);
    }

    #[test]
    fn backward_copy_walks_from_the_far_corner() {
        let mut dr = [0u32; 13];
        dr[DR_CONTROL] = 0xCC;
        dr[DR_SRC] = 3;
        dr[DR_DST] = 4;
        dr[DR_PITCH] = (8 << 16) | 8;
        dr[DR_GO] = (1 << 16) | 4;
        let op = EngineOp::latch(&dr, 1);
        let mut vram = vec![0, 1, 2, 3, 0, 0, 0, 0];

        execute(&op, None, &mut vram);

        assert_eq!(vram, vec![0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn mono_rows_pad_to_power_of_two_bytes() {
        let mut dr = [0u32; 13];
        dr[DR_CONTROL] = 0xCC | SRC_SYSTEM | SRC_MONO | TOP_TO_BOTTOM | LEFT_TO_RIGHT;
        dr[DR_GO] = (2 << 16) | 24;
        let op = EngineOp::latch(&dr, 2);
        let transfer = op.source_transfer().unwrap();
        assert_eq!(transfer.need, 4);
    }
}
