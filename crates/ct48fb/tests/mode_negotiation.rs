#![cfg(not(target_arch = "wasm32"))]

use ct48_emu::{ChipConfig, EmuPlatform};
use ct48fb::mode::{self, usable_memory, Depth, ModeDescriptor, RESERVED_OVERHEAD};
use ct48fb::{Ct48Fb, DriverConfig, FramebufferOps, ModeError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const MEMORY_SIZES: [usize; 3] = [256 * 1024, 512 * 1024, 1024 * 1024];

fn expected_height(xres: u32, depth: Depth) -> Option<u32> {
    match (xres, depth) {
        (640, _) => Some(480),
        (800, Depth::Bpp8) => Some(600),
        (800, Depth::Bpp16) => Some(592),
        _ => None,
    }
}

fn request() -> impl Strategy<Value = ModeDescriptor> {
    (
        prop_oneof![Just(640u32), Just(800u32), 1u32..2048],
        prop_oneof![Just(0u32), 1u32..2048],
        1u32..=32,
        0u32..4096,
        0u32..64,
        5_000u32..=200_000,
    )
        .prop_map(
            |(xres, xres_virtual, bits_per_pixel, yres_virtual, yoffset, pixclock_ps)| {
                ModeDescriptor {
                    xres,
                    yres: 1,
                    xres_virtual,
                    yres_virtual,
                    yoffset,
                    bits_per_pixel,
                    pixclock_ps,
                    ..ModeDescriptor::default()
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn decode_fits_memory_or_leaves_the_request_alone(
        var in request(),
        memory in prop::sample::select(MEMORY_SIZES.to_vec()),
    ) {
        let mut decoded = var;
        match mode::decode(&mut decoded, memory) {
            Ok(params) => {
                let depth = Depth::from_bits(var.bits_per_pixel).unwrap();
                prop_assert_eq!(params.depth, depth);
                prop_assert_eq!(Some(params.height), expected_height(var.xres, depth));
                prop_assert_eq!(params.pitch, var.xres_virtual * depth.bytes());
                prop_assert_eq!(params.virtual_height % 8, 0);

                let available = usable_memory(memory);
                let pitch = u64::from(params.pitch);
                prop_assert!(pitch * u64::from(params.virtual_height) <= available);
                prop_assert!(pitch * u64::from(params.height) <= available);
                prop_assert!(pitch * (u64::from(params.virtual_height) + 8) > available);
                prop_assert_eq!(params.cursor_base, params.pitch * params.virtual_height);
                prop_assert_eq!(params.base, params.pitch * var.yoffset);

                prop_assert_eq!(decoded.yres, params.height);
                prop_assert_eq!(decoded.yres_virtual, params.virtual_height);
            }
            Err(err) => {
                prop_assert_eq!(decoded, var);
                if var.bits_per_pixel <= 16 && var.xres_virtual != 0 {
                    let depth = Depth::from_bits(var.bits_per_pixel).unwrap();
                    if expected_height(var.xres, depth).is_some() {
                        let is_memory_error = matches!(err, ModeError::InsufficientMemory { .. });
                        prop_assert!(is_memory_error, "{:?}", err);
                    }
                }
            }
        }
    }

    #[test]
    fn encode_reports_what_decode_accepted(
        var in request(),
        memory in prop::sample::select(MEMORY_SIZES.to_vec()),
    ) {
        let mut var = var;
        var.xres_virtual = var.xres;
        let Ok(params) = mode::decode(&mut var, memory) else {
            return Ok(());
        };

        let mut reported = mode::encode(&params, memory);
        prop_assert_eq!(reported.bits_per_pixel, params.depth.bits());
        prop_assert_eq!(reported.xres, params.width);
        prop_assert_eq!(reported.yres, params.height);
        prop_assert_eq!(reported.yres_virtual, params.virtual_height);
        prop_assert_eq!(reported.yoffset, var.yoffset);

        let again = mode::decode(&mut reported, memory).unwrap();
        prop_assert_eq!(again.depth, params.depth);
        prop_assert_eq!((again.width, again.height), (params.width, params.height));
        prop_assert_eq!(again.base, params.base);

        let drift = again.pixclock_khz.abs_diff(params.pixclock_khz);
        let k = u64::from(params.pixclock_khz);
        prop_assert!(u64::from(drift) * 1_000_000_000 <= 2 * k * k + 1_000_000_000);
    }
}

#[test]
fn every_rejection_happens_before_a_register_write() {
    let hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    let mut fb = Ct48Fb::probe(hw.clone(), &DriverConfig::default()).unwrap();
    let current = fb.current_params();
    let base = mode::PREDEFINED_MODES[0].descriptor();

    let rejected = [
        (
            ModeDescriptor {
                bits_per_pixel: 24,
                ..base
            },
            ModeError::DepthTooLarge(24),
        ),
        (
            ModeDescriptor {
                xres_virtual: 0,
                ..base
            },
            ModeError::ZeroVirtualWidth,
        ),
        (
            ModeDescriptor { xres: 720, ..base },
            ModeError::UnsupportedWidth(720),
        ),
        (
            ModeDescriptor {
                xres_virtual: 2048,
                bits_per_pixel: 16,
                ..base
            },
            ModeError::InsufficientMemory {
                required: 4096 * 480,
                available: (1024 * 1024 - RESERVED_OVERHEAD) as u64,
            },
        ),
    ];

    for (request, expected) in rejected {
        hw.chip().clear_log();
        let mut var = request;
        assert_eq!(fb.set_var(&mut var), Err(expected));
        assert!(hw.chip().port_writes().is_empty(), "{expected:?}");
        assert_eq!(var, request);
        assert_eq!(fb.current_params(), current);
    }
}

#[test]
fn small_memory_rejects_800x592x16_at_probe() {
    let hw = EmuPlatform::new(ChipConfig {
        xr0f: 0x01,
        ..ChipConfig::ct65548_vl()
    });
    let err = Ct48Fb::probe(hw.clone(), &DriverConfig::from_options("mode:800x592x16"))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ct48fb::InitError::InitialMode(ModeError::InsufficientMemory { .. })
    ));
    assert!(hw.io_claims("ct48fb").is_empty());
    assert_eq!(hw.live_mappings(), 0);
}

#[test]
fn accepted_mode_is_reported_back() {
    let hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    let mut fb = Ct48Fb::probe(hw, &DriverConfig::default()).unwrap();
    let mut var = mode::PREDEFINED_MODES[2].descriptor();
    var.yres_virtual = 9999;

    let params = fb.set_var(&mut var).unwrap();
    let reported = fb.encode_var(&params);

    assert_eq!(reported.xres, 800);
    assert_eq!(reported.yres, 600);
    assert_eq!(reported.yres_virtual, 1184);
    assert_eq!(var.yres_virtual, 1184);
    assert_eq!(fb.fix_info().line_length, 800);
}
