use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Int, Tensor};
use burn::tensor::Bool;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::error::EncoderError;
use crate::mask;
use crate::model::baseline::BaselineBert;
use crate::model::layer::transformer::{TransformerLayer, TransformerLayerConfig};
use crate::model::layer::LayerUnit;

#[derive(Config, Debug)]
pub struct BertEncoderConfig {
    pub layers_num: usize,
    pub hidden_size: usize,
    pub heads_num: usize,
    pub feedforward_size: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 1e-6)]
    pub layer_norm_eps: f64,
    #[config(default = false)]
    pub use_baseline_bert: bool,
    pub baseline_bert_path: Option<String>,
    pub labels_num: Option<usize>,
}

impl BertEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<BertEncoder<B>, EncoderError> {
        if self.layers_num == 0 {
            return Err(EncoderError::InvalidLayerCount(self.layers_num));
        }

        let backend = if self.use_baseline_bert {
            let path = self
                .baseline_bert_path
                .as_ref()
                .ok_or(EncoderError::MissingBaselineOption("baseline_bert_path"))?;
            let labels_num = self
                .labels_num
                .ok_or(EncoderError::MissingBaselineOption("labels_num"))?;

            EncoderBackend::Baseline(BaselineBert::load_pretrained(path, labels_num, device)?)
        } else {
            EncoderBackend::Native(self.init_stack(device)?)
        };

        info!(
            baseline = self.use_baseline_bert,
            layers = self.layers_num,
            hidden_size = self.hidden_size,
            "initialized encoder"
        );

        Ok(BertEncoder { backend })
    }

    fn init_stack<B: Backend>(&self, device: &B::Device) -> Result<NativeStack<B>, EncoderError> {
        if self.heads_num == 0 || self.hidden_size % self.heads_num != 0 {
            return Err(EncoderError::InvalidHeadCount {
                hidden_size: self.hidden_size,
                heads_num: self.heads_num,
            });
        }

        let layer_config = TransformerLayerConfig::new(self.hidden_size, self.heads_num, self.feedforward_size)
            .with_dropout(self.dropout)
            .with_layer_norm_eps(self.layer_norm_eps);

        Ok(NativeStack {
            layers: (0..self.layers_num).map(|_| layer_config.init(device)).collect_vec(),
            hidden_size: self.hidden_size,
        })
    }
}

#[derive(Module, Debug)]
pub struct NativeStack<B: Backend> {
    layers: Vec<TransformerLayer<B>>,
    hidden_size: usize,
}

impl<B: Backend> NativeStack<B> {
    pub fn layers(&self) -> &[TransformerLayer<B>] {
        &self.layers
    }

    /// Every layer sees the same mask; each consumes the previous output.
    pub fn forward(&self, embedding: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3> {
        apply_layers(&self.layers, embedding, mask)
    }
}

pub fn apply_layers<B: Backend, L: LayerUnit<B>>(layers: &[L], mut hidden: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3> {
    for layer in layers {
        hidden = layer.apply(hidden, mask.clone());
    }
    hidden
}

#[derive(Module, Debug)]
pub enum EncoderBackend<B: Backend> {
    Native(NativeStack<B>),
    Baseline(BaselineBert<B>),
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    backend: EncoderBackend<B>,
}

impl<B: Backend> From<NativeStack<B>> for BertEncoder<B> {
    fn from(stack: NativeStack<B>) -> Self {
        BertEncoder {
            backend: EncoderBackend::Native(stack),
        }
    }
}

impl<B: Backend> From<BaselineBert<B>> for BertEncoder<B> {
    fn from(baseline: BaselineBert<B>) -> Self {
        BertEncoder {
            backend: EncoderBackend::Baseline(baseline),
        }
    }
}

pub struct EncoderInput<B: Backend> {
    pub embedding: Tensor<B, 3>,
    pub segment: Option<Tensor<B, 2, Int>>,
    pub visibility: Option<Tensor<B, 3, Bool>>,
    pub labels: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> EncoderInput<B> {
    pub fn new(embedding: Tensor<B, 3>) -> Self {
        Self {
            embedding,
            segment: None,
            visibility: None,
            labels: None,
        }
    }

    pub fn with_segment(mut self, segment: Tensor<B, 2, Int>) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn with_visibility(mut self, visibility: Tensor<B, 3, Bool>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_labels(mut self, labels: Tensor<B, 1, Int>) -> Self {
        self.labels = Some(labels);
        self
    }
}

pub enum EncoderOutput<B: Backend> {
    /// B x S x H
    Hidden(Tensor<B, 3>),
    Classification {
        loss: Option<Tensor<B, 1>>,
        /// B x labels_num
        logits: Tensor<B, 2>,
    },
}

impl<B: Backend> EncoderOutput<B> {
    pub fn hidden(&self) -> Option<&Tensor<B, 3>> {
        match self {
            EncoderOutput::Hidden(hidden) => Some(hidden),
            EncoderOutput::Classification { .. } => None,
        }
    }

    pub fn into_hidden(self) -> Option<Tensor<B, 3>> {
        match self {
            EncoderOutput::Hidden(hidden) => Some(hidden),
            EncoderOutput::Classification { .. } => None,
        }
    }

    pub fn into_classification(self) -> Option<(Option<Tensor<B, 1>>, Tensor<B, 2>)> {
        match self {
            EncoderOutput::Hidden(_) => None,
            EncoderOutput::Classification { loss, logits } => Some((loss, logits)),
        }
    }
}

fn check_shape<const D: usize>(input: &'static str, expected: [usize; D], actual: [usize; D]) -> Result<(), EncoderError> {
    if expected != actual {
        return Err(EncoderError::ShapeMismatch {
            input,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

impl<B: Backend> BertEncoder<B> {
    pub fn backend(&self) -> &EncoderBackend<B> {
        &self.backend
    }

    pub fn into_backend(self) -> EncoderBackend<B> {
        self.backend
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self.backend, EncoderBackend::Baseline(_))
    }

    /// Number of native layers; zero for a baseline encoder.
    pub fn num_layers(&self) -> usize {
        match &self.backend {
            EncoderBackend::Native(stack) => stack.layers.len(),
            EncoderBackend::Baseline(_) => 0,
        }
    }

    /// Native encoders return `EncoderOutput::Hidden` shaped like the
    /// embedding; baseline encoders return `EncoderOutput::Classification`.
    pub fn forward(&self, input: EncoderInput<B>) -> Result<EncoderOutput<B>, EncoderError> {
        let EncoderInput {
            embedding,
            segment,
            visibility,
            labels,
        } = input;

        let stack = match &self.backend {
            EncoderBackend::Baseline(baseline) => {
                let output = baseline.forward(embedding, labels)?;
                return Ok(EncoderOutput::Classification {
                    loss: output.loss,
                    logits: output.logits,
                });
            }
            EncoderBackend::Native(stack) => stack,
        };

        if labels.is_some() {
            warn!("labels are ignored by the native encoder");
        }

        let [batch, seq_len, emb_size] = embedding.dims();
        debug!(batch, seq_len, emb_size, "encoder forward");

        check_shape("embedding", [batch, seq_len, stack.hidden_size], [batch, seq_len, emb_size])?;
        if let Some(segment) = &segment {
            check_shape("segment", [batch, seq_len], segment.dims())?;
        }
        if let Some(visibility) = &visibility {
            check_shape("visibility", [batch, seq_len, seq_len], visibility.dims())?;
        }

        let mask = mask::attention_mask(segment, visibility)?;

        Ok(EncoderOutput::Hidden(stack.forward(embedding, mask)))
    }
}
