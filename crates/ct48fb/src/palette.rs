//! Colour map handling.
//!
//! At 8 bpp the 256-entry table mirrors the RAMDAC. At 16 bpp pixels are direct RGB565 and only
//! the 16 console colours are kept, together with their packed form for the text renderer.

use ct48_io::Platform;

use crate::error::ColorError;
use crate::mode::Depth;
use crate::regs::{DAC_DATA, DAC_WRITE_INDEX};

/// A colour with 16-bit components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub transp: u16,
}

impl Rgba {
    pub const fn rgb(red: u16, green: u16, blue: u16) -> Self {
        Self {
            red,
            green,
            blue,
            transp: 0,
        }
    }

    /// Packs to RGB565 by truncation.
    pub const fn to_rgb565(self) -> u16 {
        (self.red & 0xF800) | ((self.green & 0xFC00) >> 5) | ((self.blue & 0xF800) >> 11)
    }
}

/// Standard 16-colour text console palette.
pub const CONSOLE_COLORS: [Rgba; 16] = [
    Rgba::rgb(0x0000, 0x0000, 0x0000),
    Rgba::rgb(0x0000, 0x0000, 0xAAAA),
    Rgba::rgb(0x0000, 0xAAAA, 0x0000),
    Rgba::rgb(0x0000, 0xAAAA, 0xAAAA),
    Rgba::rgb(0xAAAA, 0x0000, 0x0000),
    Rgba::rgb(0xAAAA, 0x0000, 0xAAAA),
    Rgba::rgb(0xAAAA, 0x5555, 0x0000),
    Rgba::rgb(0xAAAA, 0xAAAA, 0xAAAA),
    Rgba::rgb(0x5555, 0x5555, 0x5555),
    Rgba::rgb(0x5555, 0x5555, 0xFFFF),
    Rgba::rgb(0x5555, 0xFFFF, 0x5555),
    Rgba::rgb(0x5555, 0xFFFF, 0xFFFF),
    Rgba::rgb(0xFFFF, 0x5555, 0x5555),
    Rgba::rgb(0xFFFF, 0x5555, 0xFFFF),
    Rgba::rgb(0xFFFF, 0xFFFF, 0x5555),
    Rgba::rgb(0xFFFF, 0xFFFF, 0xFFFF),
];

/// Loads one RAMDAC entry (6 bits per channel).
pub fn write_dac<P: Platform + ?Sized>(platform: &mut P, index: u8, color: Rgba) {
    platform.write_u8(DAC_WRITE_INDEX, index);
    platform.delay_us(1);
    platform.write_u8(DAC_DATA, (color.red >> 10) as u8);
    platform.write_u8(DAC_DATA, (color.green >> 10) as u8);
    platform.write_u8(DAC_DATA, (color.blue >> 10) as u8);
}

#[derive(Debug, Clone)]
pub struct Palette {
    indexed: [Rgba; 256],
    direct: [Rgba; 16],
    packed: [u16; 16],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            indexed: [Rgba::default(); 256],
            direct: [Rgba::default(); 16],
            packed: [0; 16],
        }
    }
}

impl Palette {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(depth: Depth, index: usize) -> Result<(), ColorError> {
        let entries = depth.color_entries();
        if index >= entries {
            return Err(ColorError::IndexOutOfRange { index, entries });
        }
        Ok(())
    }

    pub fn get(&self, depth: Depth, index: usize) -> Result<Rgba, ColorError> {
        Self::check(depth, index)?;
        Ok(match depth {
            Depth::Bpp8 => self.indexed[index],
            Depth::Bpp16 => self.direct[index],
        })
    }

    /// Stores an entry and, at 8 bpp, loads it into the RAMDAC.
    pub fn set<P: Platform + ?Sized>(
        &mut self,
        platform: &mut P,
        depth: Depth,
        index: usize,
        color: Rgba,
    ) -> Result<(), ColorError> {
        Self::check(depth, index)?;
        match depth {
            Depth::Bpp8 => {
                self.indexed[index] = color;
                write_dac(platform, index as u8, color);
            }
            Depth::Bpp16 => {
                self.direct[index] = color;
                self.packed[index] = color.to_rgb565();
            }
        }
        Ok(())
    }

    /// Value to draw for console colour `index` at `depth`.
    pub fn pixel(&self, depth: Depth, index: u8) -> u32 {
        match depth {
            Depth::Bpp8 => u32::from(index),
            Depth::Bpp16 => u32::from(self.packed[usize::from(index & 0x0F)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct48_emu::{ChipConfig, EmuPlatform};
    use pretty_assertions::assert_eq;

    #[test]
    fn rgb565_packing() {
        assert_eq!(Rgba::rgb(0xFFFF, 0, 0).to_rgb565(), 0xF800);
        assert_eq!(Rgba::rgb(0, 0xFFFF, 0).to_rgb565(), 0x07E0);
        assert_eq!(Rgba::rgb(0, 0, 0xFFFF).to_rgb565(), 0x001F);
        assert_eq!(CONSOLE_COLORS[6].to_rgb565(), 0xAAA0);
    }

    #[test]
    fn entry_count_depends_on_depth() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut palette = Palette::new();

        assert!(palette.set(&mut hw, Depth::Bpp8, 255, Rgba::rgb(1, 2, 3)).is_ok());
        assert_eq!(
            palette.set(&mut hw, Depth::Bpp16, 16, Rgba::default()),
            Err(ColorError::IndexOutOfRange {
                index: 16,
                entries: 16
            })
        );
        assert_eq!(
            palette.get(Depth::Bpp8, 256),
            Err(ColorError::IndexOutOfRange {
                index: 256,
                entries: 256
            })
        );
    }

    #[test]
    fn indexed_entries_reach_the_dac() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut palette = Palette::new();
        let color = Rgba::rgb(0xFFFF, 0x8000, 0x0400);

        palette.set(&mut hw, Depth::Bpp8, 7, color).unwrap();

        assert_eq!(hw.chip().dac_entry(7), [0x3F, 0x20, 0x01]);
        assert_eq!(hw.delays(), vec![1]);
        assert_eq!(palette.get(Depth::Bpp8, 7), Ok(color));
    }

    #[test]
    fn direct_entries_stay_in_software() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        let mut palette = Palette::new();
        hw.chip().clear_log();

        palette
            .set(&mut hw, Depth::Bpp16, 4, CONSOLE_COLORS[4])
            .unwrap();

        assert!(hw.chip().port_writes().is_empty());
        assert_eq!(palette.pixel(Depth::Bpp16, 4), 0xA800);
        assert_eq!(palette.get(Depth::Bpp8, 4), Ok(Rgba::default()));
    }
}
