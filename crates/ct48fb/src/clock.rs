//! Pixel clock synthesizer.
//!
//! The dot clock comes from a PLL fed by the 14.318 MHz crystal:
//!
//! ```text
//! f_in  = ref * 4 / (n * post_scale)      600 ..= 8000 kHz
//! f_vco = f_in * m                      48000 ..= 220000 kHz
//! f_out = f_vco >> p
//! ```
//!
//! XR30 holds `p << 1 | (post_scale == 1)`, XR31 holds `m - 2`, XR32 holds `n - 2`.

use ct48_io::PortIo;

use crate::regs::RegisterFile;

pub const REFERENCE_CLOCK_KHZ: u32 = 14318;

pub const M_RANGE: core::ops::RangeInclusive<u32> = 3..=127;
pub const N_RANGE: core::ops::RangeInclusive<u32> = 3..=127;
pub const P_RANGE: core::ops::RangeInclusive<u32> = 0..=5;
pub const POST_SCALES: [u32; 2] = [1, 4];

pub const INPUT_RANGE_KHZ: core::ops::RangeInclusive<u32> = 600..=8000;
pub const VCO_RANGE_KHZ: core::ops::RangeInclusive<u32> = 48000..=220000;

/// Candidates further than this from the target are never accepted.
const MAX_DELTA_KHZ: u32 = 100_000;

/// Synthesizer control register; bit 5 gates the VCO while the dividers change.
const XR_CLOCK_CONTROL: u8 = 0x33;
const CLOCK_CONTROL_VCO_ENABLE: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDividers {
    pub m: u8,
    pub n: u8,
    pub p: u8,
    pub post_scale: u8,
}

impl ClockDividers {
    /// Input frequency into the phase comparator, in kHz.
    pub fn input_khz(&self) -> u32 {
        REFERENCE_CLOCK_KHZ * 4 / (u32::from(self.n) * u32::from(self.post_scale))
    }

    pub fn vco_khz(&self) -> u32 {
        self.input_khz() * u32::from(self.m)
    }

    pub fn output_khz(&self) -> u32 {
        self.vco_khz() >> self.p
    }

    /// Whether both the input and VCO frequencies sit inside the PLL's lock range.
    pub fn is_legal(&self) -> bool {
        M_RANGE.contains(&u32::from(self.m))
            && N_RANGE.contains(&u32::from(self.n))
            && P_RANGE.contains(&u32::from(self.p))
            && POST_SCALES.contains(&u32::from(self.post_scale))
            && INPUT_RANGE_KHZ.contains(&self.input_khz())
            && VCO_RANGE_KHZ.contains(&self.vco_khz())
    }

    /// Encoded XR30 value.
    pub fn xr30(&self) -> u8 {
        (self.p << 1) | u8::from(self.post_scale == 1)
    }
}

/// Finds the legal divider set whose output is closest to `target_khz`.
///
/// The search order is m, n, p, post-scale (outermost first) and only a strictly smaller error
/// replaces the current best, so among equally good candidates the first one found wins.
/// Returns `None` when no legal candidate lands within 100 MHz of the target.
pub fn solve_dividers(target_khz: u32) -> Option<ClockDividers> {
    let mut best = None;
    let mut best_delta = MAX_DELTA_KHZ;

    for m in M_RANGE {
        for n in N_RANGE {
            for p in P_RANGE {
                for post_scale in POST_SCALES {
                    let input = REFERENCE_CLOCK_KHZ * 4 / (n * post_scale);
                    if !INPUT_RANGE_KHZ.contains(&input) {
                        continue;
                    }
                    let vco = input * m;
                    if !VCO_RANGE_KHZ.contains(&vco) {
                        continue;
                    }
                    let delta = target_khz.abs_diff(vco >> p);
                    if delta < best_delta {
                        best_delta = delta;
                        best = Some(ClockDividers {
                            m: m as u8,
                            n: n as u8,
                            p: p as u8,
                            post_scale: post_scale as u8,
                        });
                    }
                }
            }
        }
    }

    best
}

/// Programs the synthesizer, remembering the last requested frequency.
#[derive(Debug, Default)]
pub struct ClockSynth {
    last_khz: Option<u32>,
}

impl ClockSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_khz(&self) -> Option<u32> {
        self.last_khz
    }

    /// Programs the dividers for `target_khz` unless that frequency was the last one requested.
    ///
    /// Returns whether any register was written.
    pub fn apply<P: PortIo + ?Sized>(&mut self, io: &mut P, target_khz: u32) -> bool {
        if self.last_khz == Some(target_khz) {
            return false;
        }
        self.last_khz = Some(target_khz);

        let Some(div) = solve_dividers(target_khz) else {
            tracing::warn!(target_khz, "no legal clock dividers, synthesizer left unchanged");
            return false;
        };
        tracing::debug!(
            target_khz,
            achieved_khz = div.output_khz(),
            m = div.m,
            n = div.n,
            p = div.p,
            post_scale = div.post_scale,
            "programming dot clock"
        );
        program_dividers(io, &div);
        true
    }
}

/// Writes a divider set with the VCO gated off, restoring the control register afterwards.
pub fn program_dividers<P: PortIo + ?Sized>(io: &mut P, div: &ClockDividers) {
    let control = io.xr(XR_CLOCK_CONTROL);
    io.set_xr(XR_CLOCK_CONTROL, control & !CLOCK_CONTROL_VCO_ENABLE);
    io.set_xr(0x30, div.xr30());
    io.set_xr(0x31, div.m - 2);
    io.set_xr(0x32, div.n - 2);
    io.set_xr(XR_CLOCK_CONTROL, control);
}
