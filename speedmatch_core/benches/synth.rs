use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use speedmatch_core::{CalibrationTarget, RawSampleSet, SynthCfg, aggregate, synthesize};
use speedmatch_traits::{Direction, SegmentId};

// Synthetic sample set: `segments` measured segments over the default sweep,
// log-linear times with deterministic xorshift jitter.
fn synth_samples(segments: usize, per_cell: usize, seed: u32) -> RawSampleSet {
    let mut state = seed.max(1);
    let mut next_f64 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };

    let sweep = [16u8, 32, 56, 80, 112, 144, 176, 208, 240, 255];
    let mut set = RawSampleSet::new();
    for s in 0..segments {
        let seg = SegmentId::new(format!("LS{s}"));
        for &command in &sweep {
            let base = 8.0 * 2f64.powf(-(f64::from(command) - 16.0) / 32.0);
            for direction in [Direction::Forward, Direction::Reverse] {
                for _ in 0..per_cell {
                    let jitter = 1.0 + (next_f64() * 2.0 - 1.0) * 0.02;
                    set.record(direction, command, seg.clone(), base * jitter);
                }
            }
        }
    }
    set
}

pub fn bench_aggregate_and_synthesize(c: &mut Criterion) {
    let mut g = c.benchmark_group("synth");
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    for &segments in &[1usize, 4, 16] {
        let samples = synth_samples(segments, 2, 0xC0FFEE);
        let mut targets = CalibrationTarget::new();
        for s in 0..segments {
            targets.insert(SegmentId::new(format!("LS{s}")), 1.0);
        }
        let cfg = SynthCfg::default();

        g.bench_function(format!("aggregate_synthesize_{segments}_segments"), |b| {
            b.iter_batched(
                || samples.clone(),
                |set| {
                    let table = aggregate(black_box(&set)).unwrap();
                    let curve = synthesize(&table, black_box(&targets), &cfg).unwrap();
                    black_box(curve);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(synth, bench_aggregate_and_synthesize);
criterion_main!(synth);
