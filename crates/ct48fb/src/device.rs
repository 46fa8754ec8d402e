//! Device bring-up, steady state and teardown.

use std::ops::{Deref, DerefMut};

use ct48_io::Platform;

use crate::accel::{Blitter, Rect, Surface};
use crate::blank::{self, BlankLevel};
use crate::chipset::{
    self, BusTopology, ChipCaps, ChipIdentity, PCI_DEVICE_ID_CT_65548, PCI_VENDOR_ID_CT,
};
use crate::clock::ClockSynth;
use crate::config::{DriverConfig, Features};
use crate::console::{attr_bg, attr_fg, ConsoleOps, Font};
use crate::cursor::{CursorMode, HwCursor, CONTROL_OFF};
use crate::error::{ColorError, InitError, ModeError};
use crate::framebuffer::{AccelId, FixedInfo, FramebufferOps, Visual, DRIVER_ID};
use crate::mode::{
    self, table_for, AccelFlags, Depth, HardwareParams, ModeDescriptor,
};
use crate::palette::{Palette, Rgba, CONSOLE_COLORS};
use crate::regs::{Dr, RegisterFile, VGA_IO_LEN, VGA_IO_START};
use crate::soft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    Io { start: u16, len: u16 },
    Mem { base: u64, len: usize },
    /// CRTC 0-7 write protect lifted.
    CrtcUnlocked,
}

/// Owns the platform and every resource taken from it; releases them in reverse on drop.
struct Claims<P: Platform> {
    platform: P,
    held: Vec<Claim>,
}

impl<P: Platform> Claims<P> {
    fn new(platform: P) -> Self {
        Self {
            platform,
            held: Vec::new(),
        }
    }

    fn io(&mut self, start: u16, len: u16) -> Result<(), InitError> {
        if !self.platform.request_io_region(start, len, DRIVER_ID) {
            return Err(InitError::IoRegionBusy { start, len });
        }
        self.held.push(Claim::Io { start, len });
        Ok(())
    }

    fn mem(&mut self, base: u64, len: usize) -> bool {
        if !self.platform.request_mem_region(base, len, DRIVER_ID) {
            return false;
        }
        self.held.push(Claim::Mem { base, len });
        true
    }

    fn unlock_crtc(&mut self) {
        chipset::unprotect_crtc(&mut self.platform);
        self.held.push(Claim::CrtcUnlocked);
    }

    /// Re-protects the CRTC now instead of during unwinding.
    fn lock_crtc(&mut self) {
        if let Some(pos) = self.held.iter().rposition(|c| *c == Claim::CrtcUnlocked) {
            self.held.remove(pos);
            chipset::protect_crtc(&mut self.platform);
        }
    }
}

impl<P: Platform> Deref for Claims<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.platform
    }
}

impl<P: Platform> DerefMut for Claims<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}

impl<P: Platform> Drop for Claims<P> {
    fn drop(&mut self) {
        while let Some(claim) = self.held.pop() {
            match claim {
                Claim::Io { start, len } => self.platform.release_io_region(start, len),
                Claim::Mem { base, len } => self.platform.release_mem_region(base, len),
                Claim::CrtcUnlocked => chipset::protect_crtc(&mut self.platform),
            }
        }
    }
}

/// A probed and running 6554x adapter.
pub struct Ct48Fb<P: Platform> {
    // Dropped before `vram`: claims are released before the aperture is unmapped.
    claims: Claims<P>,
    vram: P::Memory,
    chip: ChipIdentity,
    bus: BusTopology,
    memory_size: usize,
    linear_base: u64,
    features: Features,
    font_name: String,
    current: HardwareParams,
    clock: ClockSynth,
    blitter: Blitter,
    cursor: HwCursor,
    palette: Palette,
    font: Option<Font>,
}

impl<P: Platform> Ct48Fb<P> {
    /// Finds the chip, claims its resources and programs the configured mode.
    ///
    /// On error everything claimed so far has been released again.
    pub fn probe(platform: P, config: &DriverConfig) -> Result<Self, InitError> {
        let mut claims = Claims::new(platform);
        claims.io(VGA_IO_START, VGA_IO_LEN)?;

        let bus = chipset::detect_bus(&mut *claims);
        let pci_base = match bus {
            BusTopology::Pci => Some(
                claims
                    .pci_enable_bar0(PCI_VENDOR_ID_CT, PCI_DEVICE_ID_CT_65548)
                    .ok_or(InitError::PciDeviceMissing)?,
            ),
            BusTopology::DirectOrVl => None,
        };

        claims.unlock_crtc();

        let (variant, signature) = chipset::identify_chip(&mut *claims);
        let variant = variant.ok_or(InitError::UnsupportedChip {
            xr00: signature.xr00,
            xr02: signature.xr02,
        })?;
        let chip =
            ChipIdentity::supported(variant).ok_or(InitError::UnsupportedVariant(variant))?;
        tracing::info!(chip = %variant, ?bus, "detected chipset");

        let memory_size = chipset::memory_size(&mut *claims);
        let linear_base = match pci_base {
            Some(base) => base,
            None => chipset::strapped_linear_base(&mut *claims),
        };
        if !claims.mem(linear_base, memory_size) {
            tracing::warn!(
                base = format_args!("{linear_base:#x}"),
                "cannot claim video memory range"
            );
        }
        let vram = claims
            .map_video_memory(linear_base, memory_size)
            .ok_or(InitError::MapFailed {
                base: linear_base,
                len: memory_size,
            })?;

        let blitter_ok = chipset::init_engine(&mut *claims, bus, config.inverse);
        let features = Features::resolve(config, &chip, blitter_ok);

        if features.accel {
            for reg in Dr::ALL {
                claims.io(reg.port(), Dr::WINDOW)?;
            }
        }

        let mut fb = Self {
            claims,
            vram,
            chip,
            bus,
            memory_size,
            linear_base,
            features,
            font_name: config.font_name.clone(),
            current: placeholder_params(),
            clock: ClockSynth::new(),
            blitter: Blitter::new(),
            cursor: HwCursor::new(features.hw_cursor, features.blink),
            palette: Palette::new(),
            font: None,
        };

        let mut var = config.initial_mode().descriptor();
        if features.accel {
            var.accel |= AccelFlags::TEXT;
        }
        fb.set_var(&mut var)?;

        for (index, color) in CONSOLE_COLORS.iter().enumerate() {
            fb.set_color(index, *color)?;
        }

        // A mode without text acceleration has already given the cursor up.
        if !features.hw_cursor {
            fb.cursor_off();
        }

        tracing::info!(
            memory_kib = memory_size / 1024,
            base = format_args!("{linear_base:#x}"),
            mode = config.initial_mode().name,
            accel = features.accel,
            accel_putc = features.accel_putc,
            hw_cursor = features.hw_cursor,
            "frame buffer device ready"
        );
        Ok(fb)
    }

    pub fn chip(&self) -> ChipIdentity {
        self.chip
    }

    pub fn bus(&self) -> BusTopology {
        self.bus
    }

    pub fn memory_size(&self) -> usize {
        self.memory_size
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    pub fn cursor_state(&self) -> &HwCursor {
        &self.cursor
    }

    pub fn platform(&self) -> &P {
        &self.claims
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.claims
    }

    pub fn video_memory(&mut self) -> &mut P::Memory {
        &mut self.vram
    }

    /// Whether console operations go through the drawing engine for the current mode.
    pub fn console_accelerated(&self) -> bool {
        self.features.accel && self.current.accel_text()
    }

    fn surface(&self) -> Surface {
        Surface {
            depth: self.current.depth,
            pitch: self.current.pitch,
        }
    }

    fn cell_size(&self) -> Option<(u32, u32)> {
        self.font.as_ref().map(|f| (f.width, f.height))
    }

    fn apply_display_start(&mut self, base: u32) {
        if self.bus == BusTopology::Pci {
            return;
        }
        mode::set_display_start(&mut *self.claims, base);
    }

    fn program_timing(&mut self, depth: Depth, width: u32) {
        if self.bus == BusTopology::Pci {
            return;
        }
        if let Some(table) = table_for(depth, width) {
            mode::program_timing(&mut *self.claims, table);
        }
    }

    fn program_clock(&mut self, khz: u32) {
        if self.bus == BusTopology::Pci {
            return;
        }
        self.clock.apply(&mut *self.claims, khz);
    }

    fn cursor_off(&mut self) {
        let write_off = self.chip.caps.contains(ChipCaps::CURSOR_OFF_WRITE);
        self.cursor.disable(&mut *self.claims, write_off);
    }

    fn reinit_cursor(&mut self) {
        if !self.cursor.is_active() {
            return;
        }
        let base = self.current.cursor_base;
        self.cursor.init(&mut *self.claims, base);
        self.cursor
            .redraw(&mut *self.claims, &mut self.vram, &self.blitter, base);
    }

    fn draw_text(&mut self, c: u16, x: u32, y: u32, accelerated: bool) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        let depth = self.current.depth;
        let surface = self.surface();
        let fg = self.palette.pixel(depth, attr_fg(c));
        let bg = self.palette.pixel(depth, attr_bg(c));
        let rows = font.glyph(c);
        if rows.is_empty() {
            return;
        }
        if accelerated {
            self.blitter.draw_glyph(
                &mut *self.claims,
                &mut self.vram,
                &surface,
                x,
                y,
                font.width,
                rows,
                font.step(),
                fg,
                bg,
            );
        } else {
            soft::put_glyph(
                &mut self.vram,
                &surface,
                x,
                y,
                font.width,
                rows,
                font.step(),
                fg,
                bg,
            );
        }
    }

    fn wait_engine(&mut self) {
        if self.console_accelerated() {
            self.blitter.wait_idle(&mut *self.claims);
        }
    }
}

fn placeholder_params() -> HardwareParams {
    HardwareParams {
        depth: Depth::Bpp8,
        width: 0,
        height: 0,
        virtual_height: 0,
        pitch: 0,
        base: 0,
        cursor_base: 0,
        pixclock_khz: 0,
        accel: AccelFlags::empty(),
    }
}

impl<P: Platform> FramebufferOps for Ct48Fb<P> {
    fn fix_info(&self) -> FixedInfo {
        FixedInfo {
            id: DRIVER_ID,
            smem_start: self.linear_base,
            smem_len: mode::usable_memory(self.memory_size),
            visual: match self.current.depth {
                Depth::Bpp8 => Visual::PseudoColor,
                Depth::Bpp16 => Visual::TrueColor,
            },
            xpanstep: 0,
            ypanstep: 1,
            ywrapstep: 0,
            line_length: self.current.pitch,
            accel: self.features.accel.then_some(AccelId::Ct6555x),
        }
    }

    fn decode_var(&mut self, var: &mut ModeDescriptor) -> Result<HardwareParams, ModeError> {
        let params = mode::decode(var, self.memory_size)?;
        // The display layer pans by re-decoding with a new yoffset and relies on it taking effect.
        self.apply_display_start(params.base);
        Ok(params)
    }

    fn encode_var(&self, params: &HardwareParams) -> ModeDescriptor {
        mode::encode(params, self.memory_size)
    }

    fn current_params(&self) -> HardwareParams {
        self.current
    }

    fn set_params(&mut self, params: &HardwareParams) {
        tracing::debug!(
            depth = params.depth.bits(),
            width = params.width,
            pixclock_khz = params.pixclock_khz,
            "setting mode"
        );
        self.program_timing(params.depth, params.width);
        self.program_clock(params.pixclock_khz);
        self.apply_display_start(params.base);

        if !params.accel_text() {
            // Once given up the hardware cursor stays off until the next probe.
            self.cursor_off();
        }

        self.current = *params;
        self.reinit_cursor();
    }

    fn get_color(&self, index: usize) -> Result<Rgba, ColorError> {
        self.palette.get(self.current.depth, index)
    }

    fn set_color(&mut self, index: usize, color: Rgba) -> Result<(), ColorError> {
        let depth = self.current.depth;
        self.palette.set(&mut *self.claims, depth, index, color)
    }

    fn pan_display(&mut self, var: &ModeDescriptor) {
        let offset = mode::pan_offset(var.xoffset, var.yoffset, var.xres, var.bits_per_pixel);
        self.current.base = offset;
        self.apply_display_start(offset);
    }

    fn blank(&mut self, level: BlankLevel) {
        tracing::debug!(?level, "blank");
        blank::set_sync_state(&mut *self.claims, level);

        if level == BlankLevel::Unblank {
            self.claims.delay_us(1000);
            let HardwareParams {
                depth,
                width,
                pixclock_khz,
                ..
            } = self.current;
            if width == 800 || (width == 640 && depth == Depth::Bpp16) {
                self.program_timing(Depth::Bpp8, width);
                if depth == Depth::Bpp16 {
                    self.claims.delay_us(500);
                    self.program_timing(Depth::Bpp16, width);
                    self.reinit_cursor();
                }
                self.program_clock(pixclock_khz + 1);
            }
        }

        blank::set_screen_enabled(&mut *self.claims, level == BlankLevel::Unblank);
    }
}

impl<P: Platform> ConsoleOps for Ct48Fb<P> {
    fn font_width_mask(&self) -> u32 {
        self.features.font_width_mask()
    }

    fn move_cells(&mut self, sy: u32, sx: u32, dy: u32, dx: u32, height: u32, width: u32) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        let surface = self.surface();
        let (sx, sy, dx, dy) = (sx * fw, sy * fh, dx * fw, dy * fh);
        let (w, h) = (width * fw, height * fh);
        if self.console_accelerated() {
            self.blitter
                .move_rect(&mut *self.claims, &surface, sx, sy, dx, dy, w, h);
        } else {
            soft::copy_rect(&mut self.vram, &surface, sx, sy, dx, dy, w, h);
        }
    }

    fn clear_cells(&mut self, sy: u32, sx: u32, height: u32, width: u32, bg: u8) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        let surface = self.surface();
        let rect = Rect::new(sx * fw, sy * fh, width * fw, height * fh);
        let color = self.palette.pixel(surface.depth, bg);
        if self.console_accelerated() {
            self.blitter
                .fill_rect(&mut *self.claims, &surface, rect, color);
        } else {
            soft::fill_rect(&mut self.vram, &surface, rect, color);
        }
    }

    fn put_char(&mut self, c: u16, yy: u32, xx: u32) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        // A glyph expansion straight after a move can come out corrupted.
        let accelerated = self.console_accelerated()
            && self.features.accel_putc
            && !self.blitter.take_move_hazard();
        self.draw_text(c, xx * fw, yy * fh, accelerated);
    }

    fn put_chars(&mut self, s: &[u16], yy: u32, xx: u32) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        self.wait_engine();
        for (i, &c) in s.iter().enumerate() {
            self.draw_text(c, (xx + i as u32) * fw, yy * fh, false);
        }
    }

    fn reverse_cell(&mut self, xx: u32, yy: u32) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        self.wait_engine();
        let surface = self.surface();
        soft::invert_rect(
            &mut self.vram,
            &surface,
            Rect::new(xx * fw, yy * fh, fw, fh),
        );
    }

    fn clear_margins(&mut self, bg: u8, bottom_only: bool) {
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        self.wait_engine();
        let surface = self.surface();
        let color = self.palette.pixel(surface.depth, bg);
        let (xres, yres) = (self.current.width, self.current.height);
        let (text_w, text_h) = (xres / fw * fw, yres / fh * fh);
        if !bottom_only && text_w < xres {
            let rect = Rect::new(text_w, 0, xres - text_w, yres);
            soft::fill_rect(&mut self.vram, &surface, rect, color);
        }
        if text_h < yres {
            let rect = Rect::new(0, text_h, text_w, yres - text_h);
            soft::fill_rect(&mut self.vram, &surface, rect, color);
        }
    }

    fn cursor(&mut self, mode: CursorMode, xx: u32, yy: u32) {
        if !self.cursor.is_active() {
            return;
        }
        let Some((fw, fh)) = self.cell_size() else {
            return;
        };
        if self.cursor.shape() != (fw, fh) {
            let base = self.current.cursor_base;
            self.cursor
                .set_shape(&mut *self.claims, &mut self.vram, &self.blitter, base, fw, fh);
        }
        let yoffset = self.current.base.checked_div(self.current.pitch).unwrap_or(0);
        let y = i64::from(yy * fh) - i64::from(yoffset);
        self.cursor.update(
            &mut *self.claims,
            &self.blitter,
            mode,
            xx * fw,
            y as i32,
        );
    }

    fn set_font(&mut self, font: Font) -> bool {
        let supported = font.width >= 1
            && font.width <= 32
            && self.font_width_mask() & (1 << (font.width - 1)) != 0;
        if !supported {
            tracing::warn!(width = font.width, "font width not supported");
            return false;
        }
        if self.cursor.is_active() {
            let base = self.current.cursor_base;
            self.cursor.set_shape(
                &mut *self.claims,
                &mut self.vram,
                &self.blitter,
                base,
                font.width,
                font.height,
            );
        }
        self.font = Some(font);
        true
    }
}

impl<P: Platform> Drop for Ct48Fb<P> {
    fn drop(&mut self) {
        self.claims.lock_crtc();
        if self.cursor.is_active() {
            self.claims.write_dr(Dr::CursorControl, CONTROL_OFF);
        }
        tracing::debug!("frame buffer device released");
    }
}
