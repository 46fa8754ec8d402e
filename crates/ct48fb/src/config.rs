//! Load-time driver options.

use std::convert::Infallible;
use std::str::FromStr;

use crate::chipset::{ChipCaps, ChipIdentity};
use crate::mode::{find_mode, NamedMode, PREDEFINED_MODES};

/// Options chosen when the driver is loaded. Immutable once the device is probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Use the drawing engine for console operations.
    pub accel: bool,
    /// Draw text through the engine's monochrome expansion.
    ///
    /// Off by default: glyphs drawn right after a move can come out garbled on real parts.
    pub accel_putc: bool,
    pub hw_cursor: bool,
    /// Blink the hardware cursor.
    pub blink: bool,
    /// Set the screen-inverse bit (XR63 bit 7).
    pub inverse: bool,
    /// Index into [`PREDEFINED_MODES`] of the mode programmed at probe time.
    pub mode: usize,
    /// Console font requested by the user. Opaque to the driver.
    pub font_name: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            accel: true,
            accel_putc: false,
            hw_cursor: true,
            blink: false,
            inverse: false,
            mode: 0,
            font_name: String::new(),
        }
    }
}

impl DriverConfig {
    /// Parses a comma separated option string such as `"noaccel,mode:800x600x8"`.
    ///
    /// Options are matched by prefix and applied left to right; unknown options and unknown mode
    /// names are skipped.
    pub fn from_options(options: &str) -> Self {
        let mut config = Self::default();
        for opt in options.split(',').filter(|o| !o.is_empty()) {
            config.apply_option(opt);
        }
        config
    }

    fn apply_option(&mut self, opt: &str) {
        if let Some(font) = opt.strip_prefix("font:") {
            self.font_name = font.to_owned();
        } else if let Some(name) = opt.strip_prefix("mode:") {
            match find_mode(name) {
                Some(index) => self.mode = index,
                None => tracing::warn!(mode = name, "unknown mode name, keeping current"),
            }
        } else if opt.starts_with("noaccputc") {
            self.accel_putc = false;
        } else if opt.starts_with("accputc") {
            self.accel_putc = true;
        } else if opt.starts_with("noaccel") {
            self.accel = false;
        } else if opt.starts_with("accel") {
            self.accel = true;
        } else if opt.starts_with("nohwcursor") {
            self.hw_cursor = false;
        } else if opt.starts_with("hwcursor") {
            self.hw_cursor = true;
        } else if opt.starts_with("noblink") {
            self.blink = false;
        } else if opt.starts_with("blink") {
            self.blink = true;
        } else if opt.starts_with("noinverse") {
            self.inverse = false;
        } else if opt.starts_with("inverse") {
            self.inverse = true;
        } else {
            tracing::warn!(option = opt, "ignoring unknown option");
        }
    }

    pub fn initial_mode(&self) -> &'static NamedMode {
        PREDEFINED_MODES
            .get(self.mode)
            .unwrap_or(&PREDEFINED_MODES[0])
    }
}

impl FromStr for DriverConfig {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_options(s))
    }
}

/// Options after chip quirks and engine availability have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub accel: bool,
    pub accel_putc: bool,
    pub hw_cursor: bool,
    pub blink: bool,
}

impl Features {
    pub fn resolve(config: &DriverConfig, chip: &ChipIdentity, blitter_ok: bool) -> Self {
        let mut accel = config.accel && chip.caps.contains(ChipCaps::BLITTER);
        if config.accel && !blitter_ok {
            tracing::warn!("couldn't enable the drawing engine, acceleration disabled");
            accel = false;
        }
        let hw_cursor = accel && config.hw_cursor && chip.caps.contains(ChipCaps::HW_CURSOR);
        Self {
            accel,
            accel_putc: accel && config.accel_putc,
            hw_cursor,
            blink: hw_cursor && config.blink && chip.caps.contains(ChipCaps::CURSOR_BLINK),
        }
    }

    /// Bitmask of supported font widths; bit `w - 1` set means width `w` is usable.
    pub fn font_width_mask(&self) -> u32 {
        let widths: &[u32] = if self.accel_putc {
            &[8, 16]
        } else {
            &[4, 8, 12, 16]
        };
        widths.iter().fold(0, |mask, w| mask | 1 << (w - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chipset::ChipVariant;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert!(config.accel && config.hw_cursor);
        assert!(!config.accel_putc && !config.blink && !config.inverse);
        assert_eq!(config.initial_mode().name, "640x480x8");
    }

    #[test]
    fn later_options_win() {
        let config: DriverConfig = "noaccel,accel,blink,noblink,inverse".parse().unwrap();
        assert!(config.accel);
        assert!(!config.blink);
        assert!(config.inverse);
    }

    #[test]
    fn mode_and_font_are_taken_verbatim() {
        let config = DriverConfig::from_options("mode:800x592x16,font:SUN12x22,mode:bogus");
        assert_eq!(config.mode, 3);
        assert_eq!(config.font_name, "SUN12x22");
    }

    #[test]
    fn options_match_by_prefix() {
        let config = DriverConfig::from_options("accputcplease,nohwcursorx,whatever");
        assert!(config.accel_putc);
        assert!(!config.hw_cursor);
    }

    #[test]
    fn chip_quirks_override_options() {
        let config = DriverConfig::from_options("blink,accputc");
        let c545 = ChipIdentity::supported(ChipVariant::Ct65545).unwrap();
        let c540 = ChipIdentity::supported(ChipVariant::Ct65540).unwrap();

        let f = Features::resolve(&config, &c545, true);
        assert!(f.accel && f.hw_cursor && f.accel_putc);
        assert!(!f.blink);

        let f = Features::resolve(&config, &c540, true);
        assert_eq!(
            f,
            Features {
                accel: false,
                accel_putc: false,
                hw_cursor: false,
                blink: false
            }
        );
    }

    #[test]
    fn missing_blitter_turns_off_everything_it_feeds() {
        let c548 = ChipIdentity::supported(ChipVariant::Ct65548).unwrap();
        let f = Features::resolve(&DriverConfig::default(), &c548, false);
        assert!(!f.accel && !f.hw_cursor && !f.accel_putc);
    }

    #[test]
    fn font_widths() {
        let mut f = Features {
            accel: true,
            accel_putc: false,
            hw_cursor: true,
            blink: false,
        };
        assert_eq!(f.font_width_mask(), 0b1000_1000_1000_1000);
        f.accel_putc = true;
        assert_eq!(f.font_width_mask(), 0b1000_0000_1000_0000);
    }
}
