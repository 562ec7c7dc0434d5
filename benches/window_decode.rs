use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use eegview::config::FilterState;
use eegview::filter::{apply_filters, NoProgress};
use eegview::predict::PredictionStore;
use eegview::{Recording, Session, ViewerConfig};
use ndarray::{Array, Array2, IxDyn};

const FS: usize = 256;
const N_CH: usize = 19;
const HOURS: usize = 1;

fn recording() -> Recording {
    let n = HOURS * 3600 * FS;
    let data = Array2::from_shape_fn((N_CH, n), |(c, t)| ((c + 1) as f32 * t as f32 * 0.01).sin() * 30.0);
    let labels = (0..N_CH).map(|i| format!("CH{i}")).collect();
    Recording::new(data, FS, labels).unwrap()
}

/// One bin per second, per channel, pseudo-random probabilities.
fn per_channel_preds() -> Array<f32, IxDyn> {
    let bins = HOURS * 3600;
    Array::from_shape_fn(IxDyn(&[bins, N_CH]), |ix| ((ix[0] * 31 + ix[1] * 17) % 100) as f32 / 100.0)
}

fn bench_decode_window(c: &mut Criterion) {
    let mut store = PredictionStore::new();
    store.set_predictions(per_channel_preds(), HOURS * 3600, FS, N_CH, true).unwrap();
    c.bench_function("compute_starts_ends_chns 30 s window", |b| {
        b.iter(|| {
            let w = store.compute_starts_ends_chns(black_box(0.5), black_box(1800), 30, FS, N_CH);
            black_box(w.len())
        })
    });
}

fn bench_render(c: &mut Criterion) {
    let mut s = Session::new(recording(), &ViewerConfig::default()).unwrap();
    s.load_predictions(per_channel_preds(), true).unwrap();
    c.bench_function("render 10 s window [19 ch]", |b| {
        b.iter(|| black_box(s.jump_to(black_box(1800)).unwrap().overlays.len()))
    });
}

fn bench_filter_window(c: &mut Criterion) {
    let data = Array2::from_shape_fn((N_CH, 10 * FS), |(c, t)| ((c + 1) as f32 * t as f32 * 0.01).sin());
    let state = FilterState { enabled: true, do_notch: true, ..FilterState::default() };
    c.bench_function("filter bank 10 s [19 ch]", |b| {
        b.iter(|| black_box(apply_filters(black_box(&data), FS, &state, &mut NoProgress).unwrap().is_canceled()))
    });
}

criterion_group!(benches, bench_decode_window, bench_render, bench_filter_window);
criterion_main!(benches);
