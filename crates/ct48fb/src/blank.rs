//! Display power states.

use ct48_io::PortIo;

use crate::regs::{RegisterFile, Space};

/// Power-management sync control.
const XR_SYNC_CONTROL: u8 = 0x73;
/// Panel control; bit 3 puts the flat panel into its off state.
const XR_PANEL_CONTROL: u8 = 0x52;
const PANEL_OFF: u8 = 0x08;
/// SR01 bit 5 blanks the screen.
const SCREEN_OFF: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlankLevel {
    /// Screen on, both syncs running.
    Unblank,
    /// Screen off, both syncs running.
    Normal,
    /// Screen off, vertical sync stopped.
    VsyncSuspend,
    /// Screen off, horizontal sync stopped.
    HsyncSuspend,
    /// Both syncs stopped, panel off.
    Powerdown,
}

impl BlankLevel {
    /// XR73 value for this level.
    pub const fn sync_control(self) -> u8 {
        match self {
            BlankLevel::Unblank | BlankLevel::Normal => 0x00,
            BlankLevel::VsyncSuspend => 0x08,
            BlankLevel::HsyncSuspend => 0x02,
            BlankLevel::Powerdown => 0x0A,
        }
    }
}

impl TryFrom<u32> for BlankLevel {
    type Error = u32;

    fn try_from(level: u32) -> Result<Self, Self::Error> {
        Ok(match level {
            0 => BlankLevel::Unblank,
            1 => BlankLevel::Normal,
            2 => BlankLevel::VsyncSuspend,
            3 => BlankLevel::HsyncSuspend,
            4 => BlankLevel::Powerdown,
            other => return Err(other),
        })
    }
}

/// Programs sync and panel state for `level`. The screen enable bit is left alone.
pub fn set_sync_state<P: PortIo + ?Sized>(io: &mut P, level: BlankLevel) {
    io.set_xr(XR_SYNC_CONTROL, level.sync_control());
    match level {
        BlankLevel::Unblank => {
            io.update_reg(Space::Extension, XR_PANEL_CONTROL, |v| v & !PANEL_OFF);
        }
        BlankLevel::Powerdown => {
            io.update_reg(Space::Extension, XR_PANEL_CONTROL, |v| v | PANEL_OFF);
        }
        _ => {}
    }
}

/// Switches video output on or off, holding the sequencer in synchronous reset meanwhile.
pub fn set_screen_enabled<P: PortIo + ?Sized>(io: &mut P, enabled: bool) {
    let sr01 = io.sr(0x01);
    io.set_sr(0x00, 0x01);
    let sr01 = if enabled {
        sr01 & !SCREEN_OFF
    } else {
        sr01 | SCREEN_OFF
    };
    io.set_sr(0x01, sr01);
    io.set_sr(0x00, 0x03);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct48_emu::{ChipConfig, EmuPlatform, RegSpace};
    use pretty_assertions::assert_eq;

    #[test]
    fn levels_map_from_integers() {
        assert_eq!(BlankLevel::try_from(0), Ok(BlankLevel::Unblank));
        assert_eq!(BlankLevel::try_from(4), Ok(BlankLevel::Powerdown));
        assert_eq!(BlankLevel::try_from(5), Err(5));
    }

    #[test]
    fn powerdown_turns_the_panel_off() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        hw.set_xr(XR_PANEL_CONTROL, 0x41);

        set_sync_state(&mut hw, BlankLevel::Powerdown);
        assert_eq!(hw.chip().reg(RegSpace::Xr, 0x73), 0x0A);
        assert_eq!(hw.chip().reg(RegSpace::Xr, 0x52), 0x49);

        set_sync_state(&mut hw, BlankLevel::Unblank);
        assert_eq!(hw.chip().reg(RegSpace::Xr, 0x73), 0x00);
        assert_eq!(hw.chip().reg(RegSpace::Xr, 0x52), 0x41);
    }

    #[test]
    fn screen_toggle_is_bracketed_by_sequencer_reset() {
        let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
        hw.set_sr(0x01, 0x01);
        hw.chip().clear_log();

        set_screen_enabled(&mut hw, false);

        let writes: Vec<(RegSpace, u8, u8)> = hw
            .chip()
            .reg_writes()
            .iter()
            .map(|w| (w.space, w.index, w.value))
            .collect();
        assert_eq!(
            writes,
            vec![
                (RegSpace::Sr, 0x00, 0x01),
                (RegSpace::Sr, 0x01, 0x21),
                (RegSpace::Sr, 0x00, 0x03),
            ]
        );

        set_screen_enabled(&mut hw, true);
        assert_eq!(hw.chip().reg(RegSpace::Sr, 0x01), 0x01);
    }
}
