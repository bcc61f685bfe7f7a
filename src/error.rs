use std::path::PathBuf;

use burn::record::RecorderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("layer count must be at least 1, got {0}")]
    InvalidLayerCount(usize),

    #[error("hidden size {hidden_size} is not divisible by {heads_num} attention heads")]
    InvalidHeadCount { hidden_size: usize, heads_num: usize },

    #[error("baseline mode requires `{0}` to be set")]
    MissingBaselineOption(&'static str),

    #[error("failed to read baseline config at {}", .path.display())]
    BaselineConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse baseline config at {}", .path.display())]
    BaselineConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load baseline weights from {}: {reason}", .path.display())]
    BaselineWeights { path: PathBuf, reason: String },

    #[error("baseline at {} has {found} labels, expected {expected}", .path.display())]
    BaselineLabelMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("neither a segment tensor nor a visibility matrix was supplied")]
    MissingMask,

    #[error("{input} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        input: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

impl EncoderError {
    pub(crate) fn baseline_weights(path: PathBuf, err: RecorderError) -> Self {
        EncoderError::BaselineWeights {
            path,
            reason: format!("{err:?}"),
        }
    }
}
