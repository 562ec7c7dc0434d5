/// Why a prediction tensor was rejected.
///
/// [`code`](PredictionError::code) keeps the two-way split front ends rely
/// on: `-1` for anything wrong with the tensor itself, `-2` when the model
/// could not produce one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictionError {
    /// Zero bins, or a bin count that does not divide `fs * max_time`.
    #[error("{bins} prediction bins do not evenly divide {total_samples} samples")]
    Length { bins: usize, total_samples: usize },
    /// A rank or trailing dimension the store cannot interpret.
    #[error("prediction tensor of shape {shape:?} is not a supported layout")]
    Shape { shape: Vec<usize> },
    /// Multi-class per-channel tensor whose channel axis is not `n_channels`.
    #[error("per-channel predictions have {found} channels, recording has {expected}")]
    ChannelMismatch { expected: usize, found: usize },
    /// The model failed while predicting.
    #[error("model prediction failed: {0}")]
    ModelInvocation(String),
}

impl PredictionError {
    pub fn code(&self) -> i32 {
        match self {
            PredictionError::ModelInvocation(_) => -2,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_codes() {
        let e = PredictionError::Length { bins: 7, total_samples: 5120 };
        assert_eq!(e.to_string(), "7 prediction bins do not evenly divide 5120 samples");
        assert_eq!(e.code(), -1);

        let e = PredictionError::ModelInvocation("nan input".into());
        assert_eq!(e.to_string(), "model prediction failed: nan input");
        assert_eq!(e.code(), -2);

        // Converts into the crate-wide anyhow error.
        let any: anyhow::Error = PredictionError::Shape { shape: vec![4, 2, 2, 2] }.into();
        assert!(any.to_string().contains("[4, 2, 2, 2]"));
    }
}
