//! Benchmarks for signal settlement and full engine ticks.
//!
//! Run with: cargo bench -p luanim-core --bench tick

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::Vec2;
use luanim_core::reactive::SignalGraph;
use luanim_core::{Engine, EngineConfig, Init, NodeBuilder};
use std::hint::black_box;

/// One source feeding a chain of `len` derived signals.
fn bench_settle_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("settle/chain");

    for len in [16usize, 256, 1024] {
        let mut graph = SignalGraph::new();
        let source = graph.create(0.0f32);
        let mut last = graph.derive(move |cx| Ok(cx.read(source)? + 1.0)).unwrap();
        for _ in 1..len {
            let prev = last;
            last = graph.derive(move |cx| Ok(cx.read(prev)? + 1.0)).unwrap();
        }

        group.throughput(Throughput::Elements(len as u64));
        let mut value = 0.0f32;
        group.bench_with_input(BenchmarkId::new("set", len), &(), |b, _| {
            b.iter(|| {
                value += 1.0;
                graph.set(source, value).unwrap();
                black_box(graph.get(last).unwrap())
            })
        });
    }

    group.finish();
}

/// A scene of `count` circles orbiting on one tweened phase signal.
fn bench_engine_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/tick");

    for count in [10usize, 100, 1000] {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        let script = engine.script();
        let phase = script.signal(0.0f32);
        for i in 0..count {
            let offset = i as f32 * 0.1;
            let position = Init::derive(move |cx| {
                let angle = cx.read(phase)? + offset;
                Ok(Vec2::new(angle.cos(), angle.sin()) * 200.0)
            });
            script
                .add(NodeBuilder::circle(4.0).position(position))
                .unwrap();
        }
        engine.start(move |script| async move {
            while script.advance(phase, std::f32::consts::TAU, 1.0).await.is_ok() {}
            Ok(())
        });

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("step", count), &(), |b, _| {
            b.iter(|| black_box(engine.step().unwrap().len()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_settle_chain, bench_engine_tick);
criterion_main!(benches);
