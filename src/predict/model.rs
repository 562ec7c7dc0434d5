//! Classifiers that turn windowed features into prediction tensors.
//!
//! Inputs are `[T, C, F]` feature tensors: `T` time windows, `C` channels,
//! `F` features per channel. Whole-window models flatten each window to
//! `C·F` features; channel models score every channel separately with one
//! shared set of weights and aggregate by taking the max over channels.
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};

use super::store::argmax;

/// Labelled training windows.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// `[T, C, F]`
    pub data: Array3<f32>,
    /// `[T]`, one class per window.
    pub labels: Array1<usize>,
}

impl Dataset {
    pub fn new(data: Array3<f32>, labels: Array1<usize>) -> Result<Self> {
        if data.shape()[0] != labels.len() {
            bail!("{} labels for {} windows", labels.len(), data.shape()[0]);
        }
        if data.is_empty() {
            bail!("dataset has no samples (shape {:?})", data.shape());
        }
        Ok(Self { data, labels })
    }

    pub fn n_windows(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn n_channels(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn n_features(&self) -> usize {
        self.data.shape()[2]
    }
}

/// A trained model.
pub trait Model {
    /// Class probabilities, `[T, n_classes]`.
    fn predict_proba(&self, data: &Array3<f32>) -> Result<Array2<f32>>;

    /// Most likely class per window.
    fn predict(&self, data: &Array3<f32>) -> Result<Array1<usize>> {
        let proba = self.predict_proba(data)?;
        Ok(proba.rows().into_iter().map(|r| argmax(r.iter().copied())).collect())
    }
}

/// A model that can also score each channel on its own.
pub trait ChannelModel: Model {
    /// Per-channel class probabilities, `[T, C, 2]`.
    fn predict_channel_proba(&self, data: &Array3<f32>) -> Result<Array3<f32>>;
}

/// A training algorithm.
pub trait Classifier {
    type Model: Model;

    fn fit(&self, dataset: &Dataset) -> Result<Self::Model>;
}

// ── Logistic regression ──────────────────────────────────────────────────────

/// Binary logistic regression on standardised features, trained by batch
/// gradient descent with an L2 penalty.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self { learning_rate: 0.5, epochs: 500, l2: 1e-3 }
    }
}

/// Same training as [`LogisticRegression`], one row per (window, channel).
#[derive(Debug, Clone, Default)]
pub struct LogisticRegressionChannel {
    pub inner: LogisticRegression,
}

/// Fitted weights shared by both logistic models.
#[derive(Debug, Clone)]
pub struct Linear {
    mean: Array1<f64>,
    scale: Array1<f64>,
    weights: Array1<f64>,
    bias: f64,
}

impl Linear {
    fn n_features(&self) -> usize {
        self.weights.len()
    }

    /// P(class 1) for each row of `x`.
    fn proba(&self, x: ArrayView2<f32>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                let z = row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .zip(&self.weights)
                    .map(|((&v, (&m, &s)), &w)| (v as f64 - m) / s * w)
                    .sum::<f64>()
                    + self.bias;
                sigmoid(z)
            })
            .collect()
    }
}

#[inline]
fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticRegression {
    fn fit_rows(&self, x: ArrayView2<f32>, y: &[usize]) -> Result<Linear> {
        if let Some(&bad) = y.iter().find(|&&l| l > 1) {
            bail!("logistic regression is binary; got label {bad}");
        }
        let (n, f) = x.dim();
        let xf = x.mapv(f64::from);
        let mean = xf.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(f));
        let scale = xf
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 { s } else { 1.0 });
        let xs = (&xf - &mean) / &scale;
        let target: Array1<f64> = y.iter().map(|&l| l as f64).collect();

        let mut weights = Array1::<f64>::zeros(f);
        let mut bias = 0.0;
        let inv_n = 1.0 / n as f64;
        for _ in 0..self.epochs {
            let z = xs.dot(&weights) + bias;
            let err = z.mapv(sigmoid) - &target;
            let grad_w = xs.t().dot(&err) * inv_n + &weights * self.l2;
            let grad_b = err.sum() * inv_n;
            weights = weights - grad_w * self.learning_rate;
            bias -= grad_b * self.learning_rate;
        }
        log::debug!("logistic regression fitted on {n} rows × {f} features");
        Ok(Linear { mean, scale, weights, bias })
    }
}

/// Fitted [`LogisticRegression`].
#[derive(Debug, Clone)]
pub struct LogisticModel {
    linear: Linear,
}

impl Classifier for LogisticRegression {
    type Model = LogisticModel;

    fn fit(&self, dataset: &Dataset) -> Result<LogisticModel> {
        let x = flatten_windows(&dataset.data)?;
        let labels = dataset.labels.to_vec();
        Ok(LogisticModel { linear: self.fit_rows(x.view(), &labels)? })
    }
}

impl Model for LogisticModel {
    fn predict_proba(&self, data: &Array3<f32>) -> Result<Array2<f32>> {
        let x = flatten_windows(data)?;
        if x.ncols() != self.linear.n_features() {
            bail!(
                "model expects {} features per window, got {}",
                self.linear.n_features(),
                x.ncols()
            );
        }
        Ok(two_class(self.linear.proba(x.view()).iter().copied()))
    }
}

/// Fitted [`LogisticRegressionChannel`].
#[derive(Debug, Clone)]
pub struct ChannelLogisticModel {
    linear: Linear,
}

impl Classifier for LogisticRegressionChannel {
    type Model = ChannelLogisticModel;

    fn fit(&self, dataset: &Dataset) -> Result<ChannelLogisticModel> {
        let x = flatten_channels(&dataset.data)?;
        let c = dataset.n_channels();
        let labels: Vec<usize> = dataset
            .labels
            .iter()
            .flat_map(|&l| std::iter::repeat(l).take(c))
            .collect();
        Ok(ChannelLogisticModel { linear: self.inner.fit_rows(x.view(), &labels)? })
    }
}

impl ChannelModel for ChannelLogisticModel {
    fn predict_channel_proba(&self, data: &Array3<f32>) -> Result<Array3<f32>> {
        let (t, c, f) = data.dim();
        if f != self.linear.n_features() {
            bail!("model expects {} features per channel, got {f}", self.linear.n_features());
        }
        let p = self.linear.proba(flatten_channels(data)?.view());
        let mut out = Array3::<f32>::zeros((t, c, 2));
        for ((ti, ci), &pv) in (0..t).flat_map(|ti| (0..c).map(move |ci| (ti, ci))).zip(&p) {
            out[[ti, ci, 0]] = (1.0 - pv) as f32;
            out[[ti, ci, 1]] = pv as f32;
        }
        Ok(out)
    }
}

impl Model for ChannelLogisticModel {
    /// Positive class: max over channels. Negative class: min over channels.
    fn predict_proba(&self, data: &Array3<f32>) -> Result<Array2<f32>> {
        let per_chn = self.predict_channel_proba(data)?;
        let t = per_chn.shape()[0];
        let mut out = Array2::<f32>::zeros((t, 2));
        for (i, window) in per_chn.outer_iter().enumerate() {
            out[[i, 0]] = window.column(0).iter().copied().fold(f32::INFINITY, f32::min);
            out[[i, 1]] = window.column(1).iter().copied().fold(f32::NEG_INFINITY, f32::max);
        }
        Ok(out)
    }
}

fn two_class(p: impl Iterator<Item = f64>) -> Array2<f32> {
    let p: Vec<f64> = p.collect();
    Array2::from_shape_fn((p.len(), 2), |(i, k)| if k == 1 { p[i] as f32 } else { (1.0 - p[i]) as f32 })
}

/// `[T, C, F]` → `[T, C·F]`.
fn flatten_windows(data: &Array3<f32>) -> Result<Array2<f32>> {
    let (t, c, f) = data.dim();
    Ok(data.as_standard_layout().to_owned().into_shape_with_order((t, c * f))?)
}

/// `[T, C, F]` → `[T·C, F]`.
fn flatten_channels(data: &Array3<f32>) -> Result<Array2<f32>> {
    let (t, c, f) = data.dim();
    Ok(data.as_standard_layout().to_owned().into_shape_with_order((t * c, f))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feature 0 of channel 2 carries the label; everything else is noise-free
    /// zero.
    fn toy() -> Dataset {
        let labels = Array1::from_vec((0..40).map(|i| i % 2).collect());
        let data = Array3::from_shape_fn((40, 3, 2), |(t, c, f)| {
            if c == 2 && f == 0 {
                labels[t] as f32 * 2.0 - 1.0
            } else {
                0.0
            }
        });
        Dataset::new(data, labels).unwrap()
    }

    #[test]
    fn window_model_separates_toy_data() {
        let ds = toy();
        let model = LogisticRegression::default().fit(&ds).unwrap();
        let pred = model.predict(&ds.data).unwrap();
        assert_eq!(pred, ds.labels);
        let proba = model.predict_proba(&ds.data).unwrap();
        assert_eq!(proba.dim(), (40, 2));
        approx::assert_abs_diff_eq!(proba[[0, 0]] + proba[[0, 1]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn channel_model_aggregates_by_max() {
        let ds = toy();
        let model = LogisticRegressionChannel::default().fit(&ds).unwrap();
        let per_chn = model.predict_channel_proba(&ds.data).unwrap();
        assert_eq!(per_chn.dim(), (40, 3, 2));
        let agg = model.predict_proba(&ds.data).unwrap();
        for t in 0..40 {
            let max = (0..3).map(|c| per_chn[[t, c, 1]]).fold(f32::MIN, f32::max);
            approx::assert_abs_diff_eq!(agg[[t, 1]], max, epsilon = 1e-7);
        }
    }

    #[test]
    fn rejects_non_binary_labels_and_bad_width() {
        let mut ds = toy();
        ds.labels[0] = 3;
        assert!(LogisticRegression::default().fit(&ds).is_err());

        let model = LogisticRegression::default().fit(&toy()).unwrap();
        assert!(model.predict_proba(&Array3::zeros((2, 3, 5))).is_err());
    }
}
