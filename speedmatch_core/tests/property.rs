use std::collections::BTreeMap;

use proptest::prelude::*;
use speedmatch_core::{
    CalibrationTarget, MeasuredSegment, RawSampleSet, SegmentCurve, SynthCfg, aggregate,
    compute_targets, synthesize,
};
use speedmatch_traits::{Direction, SegmentId};

const SWEEP: [u8; 8] = [16, 48, 80, 112, 144, 176, 208, 240];

prop_compose! {
    // Strictly decreasing positive travel times over the fixed sweep:
    // each command value is faster than the previous by a bounded ratio.
    fn decreasing_times()(
        start in 4.0f64..30.0,
        ratios in prop::collection::vec(0.4f64..0.9, SWEEP.len() - 1),
    ) -> Vec<f64> {
        let mut times = Vec::with_capacity(SWEEP.len());
        let mut t = start;
        times.push(t);
        for r in ratios {
            t *= r;
            times.push(t);
        }
        times
    }
}

proptest! {
    #[test]
    fn targets_are_positive_and_proportional_to_length(
        len_a in 1.0f64..200.0,
        len_b in 1.0f64..200.0,
        top_smph in 1.0f64..100.0,
        scale in 1.0f64..200.0,
    ) {
        let segments = vec![
            MeasuredSegment { id: SegmentId::from("A"), length_in: len_a },
            MeasuredSegment { id: SegmentId::from("B"), length_in: len_b },
        ];
        let targets = compute_targets(&segments, top_smph, scale).unwrap();

        let ta = targets[&SegmentId::from("A")];
        let tb = targets[&SegmentId::from("B")];
        prop_assert!(ta > 0.0 && ta.is_finite());
        prop_assert!(tb > 0.0 && tb.is_finite());
        // same speed, so time scales linearly with length
        prop_assert!((ta / len_a - tb / len_b).abs() < 1e-9 * (ta / len_a));
    }

    #[test]
    fn faster_calibration_speed_shortens_the_target(
        length in 1.0f64..200.0,
        top_smph in 1.0f64..50.0,
        bump in 1.01f64..4.0,
        scale in 1.0f64..200.0,
    ) {
        let segments = vec![MeasuredSegment { id: SegmentId::from("A"), length_in: length }];
        let slow = compute_targets(&segments, top_smph, scale).unwrap();
        let fast = compute_targets(&segments, top_smph * bump, scale).unwrap();
        prop_assert!(fast[&SegmentId::from("A")] < slow[&SegmentId::from("A")]);
    }

    #[test]
    fn interpolated_times_never_increase_with_command_value(times in decreasing_times()) {
        let table: BTreeMap<u8, f64> = SWEEP.iter().copied().zip(times).collect();
        let curve = SegmentCurve::from_table("LS1", &table).unwrap();

        let mut prev = curve.time_at(17);
        for command in 18..=255u8 {
            let t = curve.time_at(command);
            prop_assert!(t <= prev, "time rose from {prev} to {t} at command {command}");
            prop_assert!(t > 0.0);
            prev = t;
        }
    }

    #[test]
    fn aggregated_median_lies_within_the_sample_range(
        samples in prop::collection::vec(0.1f64..100.0, 1..9),
    ) {
        let seg = SegmentId::from("LS1");
        let mut set = RawSampleSet::new();
        for &secs in &samples {
            set.record(Direction::Forward, 16, seg.clone(), secs);
        }
        set.record(Direction::Reverse, 16, seg.clone(), 1.0);

        let table = aggregate(&set).unwrap();
        let med = table.direction(Direction::Forward)[&seg][&16];
        let lo = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(med >= lo && med <= hi, "median {med} outside [{lo}, {hi}]");
    }

    #[test]
    fn synthesized_curves_are_complete_bounded_and_non_decreasing(
        fwd_times in decreasing_times(),
        rev_times in decreasing_times(),
        target in 0.01f64..20.0,
    ) {
        let seg = SegmentId::from("LS1");
        let mut set = RawSampleSet::new();
        for (&command, (&f, &r)) in SWEEP.iter().zip(fwd_times.iter().zip(rev_times.iter())) {
            set.record(Direction::Forward, command, seg.clone(), f);
            set.record(Direction::Reverse, command, seg.clone(), r);
        }
        let table = aggregate(&set).unwrap();

        let mut targets = CalibrationTarget::new();
        targets.insert(seg, target);
        let cfg = SynthCfg::default();
        let curve = synthesize(&table, &targets, &cfg).unwrap();

        prop_assert_eq!(curve.len(), cfg.steps);
        for &value in curve.steps() {
            prop_assert!((1..=cfg.max_command).contains(&value));
        }
        for pair in curve.steps().windows(2) {
            prop_assert!(pair[0] <= pair[1], "not monotone: {:?}", curve.steps());
        }
    }
}
