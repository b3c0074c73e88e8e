use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::Vec3;

use motive::animation::{
    ConstraintSolver, EmptyWorld, KeyframeCursor, KeyframeMotion, MotionController,
};
use motive::assets::{DecodeLimits, KeyframeCache, deserialize_from_slice, serialize_to_vec};
use motive::AssetId;
use motive_dev_utils::{FlatGround, humanoid, samples};

fn curve_sampling_benchmark(c: &mut Criterion) {
    let asset = samples::walk_cycle();
    let hip = &asset.joints()[1].rotation;
    let duration = asset.duration();

    c.bench_function("spline_rotation_value_at", |b| {
        b.iter(|| black_box(hip.value_at(black_box(0.8), duration)));
    });

    c.bench_function("spline_rotation_cursor_sweep", |b| {
        let mut cursor = KeyframeCursor::default();
        b.iter(|| {
            for step in 0..60 {
                let t = step as f32 / 30.0;
                black_box(hip.value_with_cursor(t, duration, &mut cursor));
            }
        });
    });
}

fn codec_benchmark(c: &mut Criterion) {
    let bytes = serialize_to_vec(&samples::walk_cycle()).unwrap();
    let limits = DecodeLimits::default();
    c.bench_function("decode_walk_cycle", |b| {
        b.iter(|| black_box(deserialize_from_slice(black_box(&bytes), &limits)));
    });
}

fn controller_tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("controller_tick");

    let cache = KeyframeCache::new();
    let walk = AssetId::from_name("walk");
    let stance = AssetId::from_name("stance");
    cache.add_asset(walk, samples::walk_cycle());
    cache.add_asset(stance, samples::grounded_stance());

    for (name, ids) in [("walk", vec![walk]), ("walk_and_grounded_stance", vec![walk, stance])] {
        let (mut skeleton, _) = humanoid();
        let mut controller = MotionController::new();
        for id in ids {
            let key = controller.add_motion(KeyframeMotion::new(id));
            controller.start_motion(key, 0.0, &cache, &skeleton);
        }
        let ground = FlatGround::new(0.02);
        let mut now = 0.0;

        group.bench_function(name, |b| {
            b.iter(|| {
                now += 1.0 / 60.0;
                controller.update(now, &mut skeleton, &cache, &ground);
            });
        });
    }
    group.finish();

    let (mut skeleton, _) = humanoid();
    let mut controller = MotionController::new();
    let key = controller.add_motion(KeyframeMotion::new(walk));
    controller.start_motion(key, 0.0, &cache, &skeleton);
    c.bench_function("controller_tick_empty_world", |b| {
        b.iter(|| controller.update(black_box(0.5), &mut skeleton, &cache, &EmptyWorld));
    });
}

fn solver_benchmark(c: &mut Criterion) {
    let solver = ConstraintSolver::default();
    let points = [
        Vec3::new(0.1, 0.0, 0.0),
        Vec3::new(0.1, 0.1, 0.0),
        Vec3::new(0.1, 0.55, 0.03),
        Vec3::new(0.1, 1.0, 0.0),
    ];
    let lengths = [0.1, points[1].distance(points[2]), points[2].distance(points[3])];
    c.bench_function("relax_leg_chain", |b| {
        b.iter(|| {
            black_box(solver.relax_chain(&points, black_box(Vec3::new(0.1, 0.05, 0.0)), &lengths))
        });
    });
}

criterion_group!(
    benches,
    curve_sampling_benchmark,
    codec_benchmark,
    controller_tick_benchmark,
    solver_benchmark
);
criterion_main!(benches);
