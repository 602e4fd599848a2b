//! Transform and aggregation benchmarks
//!
//! The transform must finish well inside one block period
//! (32 ms for 512 samples at 16 kHz).
//!
//! Run with: cargo bench -p meshbeat_dsp

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use meshbeat_dsp::{BandAggregator, HysteresisTuning, Spectrum, TransformEngine, MUSIC};

fn tone(block_size: usize) -> Vec<i16> {
    (0..block_size)
        .map(|i| ((i as f32 * 0.19).sin() * 8000.0) as i16)
        .collect()
}

fn benchmark_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");

    for block_size in [64, 128, 256, 512, 1024, 2048] {
        let mut engine = TransformEngine::configure(block_size).unwrap();
        let block = tone(block_size);
        let mut spectrum = Spectrum::zeroed(block_size / 2);

        group.throughput(Throughput::Elements(block_size as u64));
        group.bench_function(format!("transform_{}_samples", block_size), |b| {
            b.iter(|| {
                engine.transform_into(black_box(&block), &mut spectrum);
            })
        });
    }

    group.finish();
}

fn benchmark_aggregate(c: &mut Criterion) {
    let mut engine = TransformEngine::configure(MUSIC.block_size).unwrap();
    let spectrum = engine.transform(&tone(MUSIC.block_size));
    let mut aggregator =
        BandAggregator::configure(MUSIC.bands, spectrum.len(), HysteresisTuning::default())
            .unwrap();
    let mut events = Vec::with_capacity(MUSIC.bands.len());

    c.bench_function("aggregate_music_bands", |b| {
        b.iter(|| {
            events.clear();
            aggregator.tick_into(black_box(&spectrum), &mut events);
        })
    });
}

criterion_group!(benches, benchmark_transform, benchmark_aggregate);
criterion_main!(benches);
