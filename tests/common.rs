/// Shared fixtures: synthetic recordings, prediction tensors and a raw
/// safetensors reader for checking written files.
use eegview::{Recording, Session, ViewerConfig};
use ndarray::{Array, Array2, IxDyn};
use std::collections::HashMap;
use std::path::Path;

#[allow(unused)]
pub const FS: usize = 256;
#[allow(unused)]
pub const N_CH: usize = 18;

#[allow(unused)]
/// `n_ch` sine channels of `secs` seconds at `fs` Hz, labelled `CH0..`.
pub fn sine_recording(n_ch: usize, fs: usize, secs: usize) -> Recording {
    let data = Array2::from_shape_fn((n_ch, fs * secs), |(c, t)| {
        let f = 3.0 + c as f32;
        20.0 * (2.0 * std::f32::consts::PI * f * t as f32 / fs as f32).sin()
    });
    let labels = (0..n_ch).map(|i| format!("CH{i}")).collect();
    Recording::new(data, fs, labels).unwrap()
}

#[allow(unused)]
/// Binary per-channel predictions over 20 s at 256 Hz: ten bins of 512
/// samples. Stored channel 2 fires in bin 1, stored channel 3 in bin 2.
pub fn per_channel_preds() -> Array<f32, IxDyn> {
    let mut p = Array::zeros(IxDyn(&[10, N_CH]));
    p[[1, 2]] = 0.9;
    p[[2, 3]] = 0.8;
    p
}

#[allow(unused)]
/// Multi-class scores over 10 s at 256 Hz: five bins whose argmax runs
/// `0, 2, 2, 4, 0`.
pub fn multi_class_preds() -> Array<f32, IxDyn> {
    let winners = [0usize, 2, 2, 4, 0];
    let mut p = Array::from_elem(IxDyn(&[5, 5]), 0.05f32);
    for (bin, &k) in winners.iter().enumerate() {
        p[[bin, k]] = 0.8;
    }
    p
}

#[allow(unused)]
pub fn session(rec: Recording) -> Session {
    Session::new(rec, &ViewerConfig::default()).unwrap()
}

#[allow(unused)]
/// Stored-order winning class per bin and channel for
/// [`multi_class_per_channel_preds`].
pub const PER_CHANNEL_CLASSES: [[usize; 3]; 4] = [[1, 2, 0], [2, 2, 2], [0, 1, 1], [1, 0, 2]];

#[allow(unused)]
/// Multi-class per-channel scores `[4, 3, 3]` for a 3-channel, 20 s
/// recording at 256 Hz: four bins of 1280 samples.
pub fn multi_class_per_channel_preds() -> Array<f32, IxDyn> {
    let mut p = Array::from_elem(IxDyn(&[4, 3, 3]), 0.1f32);
    for (bin, row) in PER_CHANNEL_CLASSES.iter().enumerate() {
        for (ch, &k) in row.iter().enumerate() {
            p[[bin, ch, k]] = 0.8;
        }
    }
    p
}

#[allow(unused)]
/// Load every F32 tensor of a safetensors file plus its metadata map.
pub fn load_tensors(path: &Path) -> (HashMap<String, Array<f32, IxDyn>>, serde_json::Value) {
    let bytes = std::fs::read(path)
        .unwrap_or_else(|_| panic!("file not found: {}", path.display()));

    let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    let header: serde_json::Value = serde_json::from_slice(&bytes[8..8 + n]).unwrap();
    let data_start = 8 + n;

    let mut out = HashMap::new();
    for (key, val) in header.as_object().unwrap() {
        if key == "__metadata__" { continue; }
        if val["dtype"].as_str().unwrap() != "F32" { continue; }
        let offsets = val["data_offsets"].as_array().unwrap();
        let s = offsets[0].as_u64().unwrap() as usize;
        let e = offsets[1].as_u64().unwrap() as usize;
        let raw = &bytes[data_start + s..data_start + e];
        let floats: Vec<f32> = raw.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let shape: Vec<usize> = val["shape"].as_array().unwrap()
            .iter().map(|v| v.as_u64().unwrap() as usize).collect();
        out.insert(key.clone(), Array::from_shape_vec(IxDyn(&shape), floats).unwrap());
    }
    let meta = header.get("__metadata__").cloned().unwrap_or(serde_json::Value::Null);
    (out, meta)
}
