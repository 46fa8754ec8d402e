use ct48_emu::{ChipConfig, EmuPlatform, RegSpace};
use ct48fb::clock::{solve_dividers, ClockDividers, ClockSynth, REFERENCE_CLOCK_KHZ};
use pretty_assertions::assert_eq;

/// Straight enumeration of every divider set, written independently of the solver.
fn oracle_best_delta(target_khz: u32) -> Option<u32> {
    let mut best: Option<u32> = None;
    for m in 3u32..=127 {
        for n in 3u32..=127 {
            for p in 0u32..=5 {
                for post_scale in [1u32, 4] {
                    let input = REFERENCE_CLOCK_KHZ * 4 / (n * post_scale);
                    if !(600..=8000).contains(&input) {
                        continue;
                    }
                    let vco = input * m;
                    if !(48_000..=220_000).contains(&vco) {
                        continue;
                    }
                    let delta = target_khz.abs_diff(vco / (1 << p));
                    if delta < 100_000 && best.map_or(true, |b| delta < b) {
                        best = Some(delta);
                    }
                }
            }
        }
    }
    best
}

#[test]
fn solver_matches_brute_force_oracle() {
    for target in [
        12_000, 25_175, 28_322, 31_500, 36_000, 40_000, 44_900, 50_000, 65_000, 75_000, 108_000,
        135_000, 180_000, 220_000,
    ] {
        let div = solve_dividers(target).unwrap();
        assert!(div.is_legal(), "{target}: {div:?}");
        assert_eq!(
            Some(div.output_khz().abs_diff(target)),
            oracle_best_delta(target),
            "target {target} kHz"
        );
    }
}

#[test]
fn first_candidate_wins_ties() {
    let div = solve_dividers(40_000).unwrap();
    let delta = div.output_khz().abs_diff(40_000);

    // Nothing earlier in m, n, p, post-scale order reaches the same error.
    for m in 3u8..div.m {
        for n in 3u8..=127 {
            for p in 0u8..=5 {
                for post_scale in [1u8, 4] {
                    let other = ClockDividers {
                        m,
                        n,
                        p,
                        post_scale,
                    };
                    if other.is_legal() {
                        assert!(other.output_khz().abs_diff(40_000) > delta, "{other:?}");
                    }
                }
            }
        }
    }
}

#[test]
fn reapplying_the_same_clock_writes_nothing() {
    let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    let mut synth = ClockSynth::new();

    assert!(synth.apply(&mut hw, 65_000));
    let div = solve_dividers(65_000).unwrap();
    assert_eq!(hw.chip().reg(RegSpace::Xr, 0x30), div.xr30());
    assert_eq!(hw.chip().reg(RegSpace::Xr, 0x32), div.n - 2);

    for _ in 0..3 {
        hw.chip().clear_log();
        assert!(!synth.apply(&mut hw, 65_000));
        assert!(hw.chip().port_writes().is_empty());
        assert!(hw.chip().port_reads().is_empty());
    }
}

#[test]
fn unsolvable_target_is_cached_but_not_programmed() {
    let mut hw = EmuPlatform::new(ChipConfig::ct65548_vl());
    let mut synth = ClockSynth::new();
    hw.chip().clear_log();

    assert!(!synth.apply(&mut hw, 500_000));

    assert_eq!(synth.last_khz(), Some(500_000));
    assert!(hw.chip().reg_writes().is_empty());
}
