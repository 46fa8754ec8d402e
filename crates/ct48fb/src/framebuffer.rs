//! The contract the display layer drives a framebuffer through.

use crate::blank::BlankLevel;
use crate::error::{ColorError, ModeError};
use crate::mode::{HardwareParams, ModeDescriptor};
use crate::palette::Rgba;

pub const DRIVER_ID: &str = "ct48fb";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual {
    /// Pixels index the RAMDAC.
    PseudoColor,
    /// Pixels carry RGB directly.
    TrueColor,
}

/// Drawing engine family advertised to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelId {
    Ct6555x,
}

/// Mode-independent facts about the framebuffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedInfo {
    pub id: &'static str,
    /// Physical address of the linear aperture.
    pub smem_start: u64,
    /// Bytes usable for pixels.
    pub smem_len: u64,
    pub visual: Visual,
    pub xpanstep: u32,
    pub ypanstep: u32,
    pub ywrapstep: u32,
    pub line_length: u32,
    pub accel: Option<AccelId>,
}

pub trait FramebufferOps {
    fn fix_info(&self) -> FixedInfo;

    /// Validates a requested mode. The caller's descriptor is normalized on success.
    fn decode_var(&mut self, var: &mut ModeDescriptor) -> Result<HardwareParams, ModeError>;

    fn encode_var(&self, params: &HardwareParams) -> ModeDescriptor;

    fn current_params(&self) -> HardwareParams;

    /// Programs the hardware for `params`, which must come from [`FramebufferOps::decode_var`].
    fn set_params(&mut self, params: &HardwareParams);

    /// Decodes and applies a mode in one step.
    fn set_var(&mut self, var: &mut ModeDescriptor) -> Result<HardwareParams, ModeError> {
        let params = self.decode_var(var)?;
        self.set_params(&params);
        Ok(params)
    }

    fn get_color(&self, index: usize) -> Result<Rgba, ColorError>;

    fn set_color(&mut self, index: usize, color: Rgba) -> Result<(), ColorError>;

    /// Moves the display origin to the offsets in `var`.
    fn pan_display(&mut self, var: &ModeDescriptor);

    fn blank(&mut self, level: BlankLevel);
}
