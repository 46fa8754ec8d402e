use ct48_emu::{ChipConfig, EmuPlatform, RegSpace};
use ct48_io::{Platform, PortIo, VideoMemory};
use pretty_assertions::assert_eq;

const DR_PITCH: u16 = 0x83D0;
const DR_BG: u16 = 0x8BD0;
const DR_FG: u16 = 0x8FD0;
const DR_CONTROL: u16 = 0x93D0;
const DR_SRC: u16 = 0x97D0;
const DR_DST: u16 = 0x9BD0;
const DR_GO: u16 = 0x9FD0;

#[test]
fn mono_expansion_waits_for_source_bytes() {
    let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    // 16 bpp engine.
    hw.write_u8(0x3D6, 0x40);
    hw.write_u8(0x3D7, 0x02);
    assert_eq!(hw.chip().reg(RegSpace::Xr, 0x40), 0x02);
    let mut vram = hw.map_video_memory(0xE0_0000, 64 * 1024).unwrap();

    hw.write_u32(DR_SRC, 0);
    hw.write_u32(DR_DST, 0x100);
    hw.write_u32(DR_FG, 0xF800);
    hw.write_u32(DR_BG, 0x001F);
    hw.write_u32(DR_PITCH, 64 << 16);
    hw.write_u32(DR_CONTROL, 0xCC | 0x4000 | 0x0800 | 0x0100 | 0x0200);
    // 2 lines of 10 pixels.
    hw.write_u32(DR_GO, (2 << 16) | 20);
    assert!(hw.chip().awaiting_source());

    vram.write_bytes(0, &[0x80, 0x40, 0xFF]);
    assert!(hw.chip().awaiting_source());
    vram.write_u8(0, 0xC0);
    assert!(!hw.chip().awaiting_source());

    // Source bytes never land in memory.
    assert_eq!(vram.read(0, 4), 0);
    // Row 0: pixel 0 set, pixel 1 clear, pixel 9 set (second byte, bit 6).
    assert_eq!(vram.read(0x100, 2), 0xF800);
    assert_eq!(vram.read(0x102, 2), 0x001F);
    assert_eq!(vram.read(0x100 + 9 * 2, 2), 0xF800);
    // Row 1: 0xFF then 0xC0.
    assert_eq!(vram.read(0x140 + 7 * 2, 2), 0xF800);
    assert_eq!(vram.read(0x140 + 8 * 2, 2), 0xF800);
    assert_eq!(vram.read(0x140 + 9 * 2, 2), 0xF800);
}

#[test]
fn solid_fill_replicates_the_colour_pattern() {
    let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    hw.write_u32(DR_DST, 0x20);
    hw.write_u32(DR_FG, 0xA3A3);
    hw.write_u32(DR_PITCH, 16 << 16);
    hw.write_u32(DR_CONTROL, 0xF0 | 0x8_0000 | 0x1000 | 0x0100 | 0x0200);
    hw.write_u32(DR_GO, (3 << 16) | 5);

    let chip = hw.chip();
    let vram = chip.vram();
    assert_eq!(vram[0x20..0x25], [0xA3; 5]);
    assert_eq!(vram[0x25], 0);
    assert_eq!(vram[0x40..0x45], [0xA3; 5]);
    assert_eq!(vram[0x50], 0);
}
