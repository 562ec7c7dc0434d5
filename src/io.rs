//! File I/O: safetensors recordings and predictions, JSON annotation
//! sidecars, channel lists, EDF headers and export bundles.
//!
//! Recording file keys:
//!
//! | key        | dtype | shape   | notes                                        |
//! |------------|-------|---------|----------------------------------------------|
//! | `data`     | F32   | [C, T]  | required                                     |
//! | `sfreq`    | F32   | [1]     | one rate for every channel                   |
//! | `sfreqs`   | F32   | [C]     | per-channel rates (instead of `sfreq`)       |
//! | `lengths`  | I32   | [C]     | valid samples per row when rates differ      |
//! | `ch_names` | U8    | [n]     | newline-joined labels, optional              |
//!
//! Prediction files hold one F32 tensor of any rank under `preds`.
use anyhow::{bail, Context, Result};
use ndarray::{Array2, ArrayD, IxDyn};
use std::collections::HashMap;
use std::path::Path;

use crate::annotation::Annotations;
use crate::edf::{ExportPlan, EdfHeader, HEADER_LEN};
use crate::recording::Recording;

// ── Low-level safetensors parser (raw bytes → ndarray) ──────────────────────

struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if bytes.len() < 8 {
            bail!("{}: safetensors file too small", path.display());
        }
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let n = u64::from_le_bytes(len);
        let data_start = usize::try_from(n)
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
            .with_context(|| format!("{}: header length {n} runs past end of file", path.display()))?;
        let header: HashMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..data_start])
            .with_context(|| format!("{}: failed to parse safetensors header", path.display()))?;
        Ok(Self { bytes, header, data_start })
    }

    fn entry(&self, key: &str) -> Option<&serde_json::Value> {
        self.header.get(key)
    }

    fn raw(&self, key: &str) -> Result<&[u8]> {
        let entry = self.entry(key).with_context(|| format!("missing '{key}' key"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("'{key}': missing data_offsets"))?;
        let off = |i: usize| -> Result<usize> {
            offsets
                .get(i)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .with_context(|| format!("'{key}': bad data_offsets"))
        };
        let (s, e) = (off(0)?, off(1)?);
        let (s, e) = match (self.data_start.checked_add(s), self.data_start.checked_add(e)) {
            (Some(s), Some(e)) if s <= e && e <= self.bytes.len() => (s, e),
            _ => bail!("'{key}': data_offsets {s}..{e} out of range"),
        };
        Ok(&self.bytes[s..e])
    }

    fn shape(&self, key: &str) -> Result<Vec<usize>> {
        let entry = self.entry(key).with_context(|| format!("missing '{key}' key"))?;
        entry["shape"]
            .as_array()
            .with_context(|| format!("'{key}': missing shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize).with_context(|| format!("'{key}': bad shape")))
            .collect()
    }

    fn dtype(&self, key: &str) -> Option<&str> {
        self.entry(key).and_then(|e| e["dtype"].as_str())
    }

    fn f32s(&self, key: &str) -> Result<Vec<f32>> {
        match self.dtype(key) {
            Some("F32") => {}
            other => bail!("'{key}': expected F32, found {other:?}"),
        }
        Ok(self
            .raw(key)?
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn i32s(&self, key: &str) -> Result<Vec<i32>> {
        match self.dtype(key) {
            Some("I32") => {}
            other => bail!("'{key}': expected I32, found {other:?}"),
        }
        Ok(self
            .raw(key)?
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn tensor(&self, key: &str) -> Result<ArrayD<f32>> {
        let shape = self.shape(key)?;
        let values = self.f32s(key)?;
        ArrayD::from_shape_vec(IxDyn(&shape), values)
            .with_context(|| format!("'{key}': data does not match shape {shape:?}"))
    }
}

// ── Readers ──────────────────────────────────────────────────────────────────

/// Load a recording written in the layout described at the top of this
/// module.
pub fn load_recording(path: &Path) -> Result<Recording> {
    let st = StFile::open(path)?;
    let shape = st.shape("data")?;
    if shape.len() != 2 {
        bail!("'data' must be [C, T], got shape {shape:?}");
    }
    let data = Array2::from_shape_vec((shape[0], shape[1]), st.f32s("data")?)
        .context("'data' does not match its shape")?;
    let n_ch = data.nrows();

    let labels: Vec<String> = if st.entry("ch_names").is_some() {
        let text = std::str::from_utf8(st.raw("ch_names")?).context("'ch_names' is not UTF-8")?;
        text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect()
    } else {
        (0..n_ch).map(|i| format!("CH{i}")).collect()
    };

    let rec = if st.entry("sfreqs").is_some() {
        let rates: Vec<f64> = st.f32s("sfreqs")?.into_iter().map(f64::from).collect();
        let lengths: Vec<usize> = if st.entry("lengths").is_some() {
            st.i32s("lengths")?.into_iter().map(|l| l.max(0) as usize).collect()
        } else {
            vec![data.ncols(); n_ch]
        };
        if lengths.len() != n_ch {
            bail!("'lengths' has {} entries for {n_ch} channels", lengths.len());
        }
        let channels = data
            .rows()
            .into_iter()
            .zip(&lengths)
            .map(|(row, &len)| row.iter().take(len).copied().collect())
            .collect();
        Recording::from_channels(channels, &rates, labels)?
    } else {
        let sfreq = *st.f32s("sfreq")?.first().context("'sfreq' is empty")?;
        if sfreq <= 0.0 || sfreq.fract() != 0.0 {
            bail!("sample rate must be a positive integer (got {sfreq})");
        }
        Recording::new(data, sfreq as usize, labels)?
    };
    log::info!(
        "loaded {}: {} channels, {} Hz, {} s",
        path.display(),
        rec.n_channels(),
        rec.fs(),
        rec.max_time()
    );
    Ok(rec)
}

/// Load a prediction tensor stored under `preds` (or the file's only
/// tensor).
pub fn load_predictions(path: &Path) -> Result<ArrayD<f32>> {
    let st = StFile::open(path).context("the predictions file could not be loaded")?;
    let key = if st.entry("preds").is_some() {
        "preds".to_string()
    } else {
        let keys: Vec<&String> = st.header.keys().filter(|k| k.as_str() != "__metadata__").collect();
        match keys.as_slice() {
            [only] => only.to_string(),
            _ => bail!("{}: no 'preds' tensor", path.display()),
        }
    };
    let t = st.tensor(&key)?;
    log::debug!("loaded predictions {:?} from {}", t.shape(), path.display());
    Ok(t)
}

/// One channel label per line; blank lines skipped, whitespace trimmed.
pub fn load_channel_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    if labels.is_empty() {
        bail!("{}: channel list is empty", path.display());
    }
    Ok(labels)
}

/// JSON array of `{onset, duration, text}`.
pub fn load_annotations(path: &Path) -> Result<Annotations> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{}: bad annotation JSON", path.display()))
}

pub fn save_annotations(annotations: &Annotations, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(annotations)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

/// Read the identification fields from the first 256 bytes of an EDF file.
pub fn read_edf_header(path: &Path) -> Result<EdfHeader> {
    use std::io::Read;
    let mut buf = [0u8; HEADER_LEN];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut buf))
        .with_context(|| format!("reading EDF header from {}", path.display()))?;
    EdfHeader::from_bytes(&buf)
}

// ── Generic safetensors builder ─────────────────────────────────────────────

/// Safetensors writer for F32 and I32 tensors plus string metadata.
///
/// ```rust,no_run
/// use eegview::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("preds", &[0.1f32, 0.9, 0.2], &[3]);
/// w.write(Path::new("/tmp/preds.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Newline-joined UTF-8 strings as a U8 tensor.
    pub fn add_strings(&mut self, name: &str, items: &[String]) {
        let bytes = items.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert("__metadata__".into(), serde_json::Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();
        let mut f = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Export bundle ───────────────────────────────────────────────────────────

/// Write an export plan as a safetensors bundle: one `signal_<i>` tensor
/// per signal, plus the plan (header, signal specs, annotations) as JSON in
/// the `plan` metadata entry.
pub fn write_export(plan: &ExportPlan, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    for (i, s) in plan.signals.iter().enumerate() {
        w.add_f32(&format!("signal_{i}"), &s.samples, &[s.samples.len()]);
    }
    w.add_metadata("plan", &serde_json::to_string(plan)?);
    w.write(path)?;
    log::info!("wrote {} signals to {}", plan.signals.len(), path.display());
    Ok(())
}

/// Write a recording in the layout [`load_recording`] reads.
pub fn save_recording(rec: &Recording, path: &Path) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_arr2("data", rec.data());
    w.add_f32("sfreq", &[rec.fs() as f32], &[1]);
    w.add_strings("ch_names", rec.labels());
    w.write(path)
}
