use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction};
use burn::nn::transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput};
use burn::nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::{Backend, Int, Tensor};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::activation::tanh;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::EncoderError;

pub const CONFIG_FILE: &str = "config.json";
/// The recorder appends `.mpk`, so the file on disk is `model.mpk`.
pub const WEIGHTS_STEM: &str = "model";

fn default_dropout() -> f64 {
    0.1
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

/// The subset of a HuggingFace `BertConfig` the reference classifier reads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BaselineBertConfig {
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default = "default_dropout")]
    pub hidden_dropout_prob: f64,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub classifier_dropout: Option<f64>,
    #[serde(default)]
    pub num_labels: Option<usize>,
}

impl BaselineBertConfig {
    pub fn read(dir: &Path) -> Result<Self, EncoderError> {
        let path = dir.join(CONFIG_FILE);

        let text = fs::read_to_string(&path).map_err(|source| EncoderError::BaselineConfigIo {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&text).map_err(|source| EncoderError::BaselineConfigParse { path, source })
    }

    pub fn init<B: Backend>(&self, labels_num: usize, device: &B::Device) -> BaselineBert<B> {
        let classifier_dropout = self.classifier_dropout.unwrap_or(self.hidden_dropout_prob);

        BaselineBert {
            embedding_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            embedding_dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
            encoder: TransformerEncoderConfig::new(
                self.hidden_size,
                self.intermediate_size,
                self.num_attention_heads,
                self.num_hidden_layers,
            )
            .with_dropout(self.hidden_dropout_prob)
            .with_norm_first(false)
            .init(device),
            pooler: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            dropout: DropoutConfig::new(classifier_dropout).init(),
            classifier: LinearConfig::new(self.hidden_size, labels_num).init(device),
            hidden_size: self.hidden_size,
            labels_num,
        }
    }
}

/// Reference sequence classifier used as an alternate encoder backend.
#[derive(Module, Debug)]
pub struct BaselineBert<B: Backend> {
    embedding_norm: LayerNorm<B>,
    embedding_dropout: Dropout,
    encoder: TransformerEncoder<B>,
    pooler: Linear<B>,
    dropout: Dropout,
    classifier: Linear<B>,
    hidden_size: usize,
    labels_num: usize,
}

pub struct BaselineOutput<B: Backend> {
    pub loss: Option<Tensor<B, 1>>,
    pub logits: Tensor<B, 2>,
}

fn recorder() -> NamedMpkFileRecorder<FullPrecisionSettings> {
    NamedMpkFileRecorder::<FullPrecisionSettings>::new()
}

impl<B: Backend> BaselineBert<B> {
    /// Loads `config.json` and `model.mpk` from `dir`.
    pub fn load_pretrained(dir: impl AsRef<Path>, labels_num: usize, device: &B::Device) -> Result<Self, EncoderError> {
        let dir = dir.as_ref();
        let config = BaselineBertConfig::read(dir)?;

        if let Some(stored) = config.num_labels.filter(|&stored| stored != labels_num) {
            return Err(EncoderError::BaselineLabelMismatch {
                path: dir.join(CONFIG_FILE),
                expected: labels_num,
                found: stored,
            });
        }

        let weights: PathBuf = dir.join(WEIGHTS_STEM);
        let model = config
            .init::<B>(labels_num, device)
            .load_file(weights.clone(), &recorder(), device)
            .map_err(|err| EncoderError::baseline_weights(weights.clone(), err))?;

        // record loading swaps tensors in without checking their shapes
        let [rows, cols] = model.classifier.weight.val().dims();
        if rows != config.hidden_size || cols != labels_num {
            return Err(EncoderError::BaselineLabelMismatch {
                path: weights,
                expected: labels_num,
                found: cols,
            });
        }

        info!(
            path = %dir.display(),
            layers = config.num_hidden_layers,
            labels_num,
            "loaded baseline model"
        );

        Ok(model)
    }

    /// Writes a directory `load_pretrained` accepts.
    pub fn save_pretrained(self, dir: impl AsRef<Path>, config: &BaselineBertConfig) -> Result<(), EncoderError> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE);

        let config = BaselineBertConfig {
            num_labels: Some(self.labels_num),
            ..config.clone()
        };

        fs::create_dir_all(dir)
            .and_then(|_| {
                let text = serde_json::to_string_pretty(&config).map_err(std::io::Error::from)?;
                fs::write(&path, text)
            })
            .map_err(|source| EncoderError::BaselineConfigIo { path, source })?;

        let weights = dir.join(WEIGHTS_STEM);
        self.save_file(weights.clone(), &recorder())
            .map_err(|err| EncoderError::baseline_weights(weights, err))
    }

    pub fn labels_num(&self) -> usize {
        self.labels_num
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// embedding: B x S x H, labels: B. One label means regression.
    pub fn forward(
        &self,
        embedding: Tensor<B, 3>,
        labels: Option<Tensor<B, 1, Int>>,
    ) -> Result<BaselineOutput<B>, EncoderError> {
        let [batch, seq_len, hidden_size] = embedding.dims();

        if hidden_size != self.hidden_size {
            return Err(EncoderError::ShapeMismatch {
                input: "embedding",
                expected: vec![batch, seq_len, self.hidden_size],
                actual: vec![batch, seq_len, hidden_size],
            });
        }
        if let Some(labels) = &labels {
            let [label_count] = labels.dims();
            if label_count != batch {
                return Err(EncoderError::ShapeMismatch {
                    input: "labels",
                    expected: vec![batch],
                    actual: vec![label_count],
                });
            }
        }

        let hidden = self.embedding_norm.forward(embedding);
        let hidden = self.embedding_dropout.forward(hidden);
        let hidden = self.encoder.forward(TransformerEncoderInput::new(hidden));

        // pool the first token
        let first = hidden.slice([0..batch, 0..1]).reshape([batch, hidden_size]);
        let pooled = tanh(self.pooler.forward(first));
        let pooled = self.dropout.forward(pooled);

        let logits = self.classifier.forward(pooled);

        let loss = labels.map(|labels| match self.labels_num {
            1 => {
                let targets = labels.float().unsqueeze_dim::<2>(1);
                MseLoss::new().forward(logits.clone(), targets, Reduction::Mean)
            }
            _ => CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits.clone(), labels),
        });

        Ok(BaselineOutput { loss, logits })
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    use super::*;

    type B = NdArray;

    fn tiny_config() -> BaselineBertConfig {
        BaselineBertConfig {
            hidden_size: 8,
            num_hidden_layers: 1,
            num_attention_heads: 2,
            intermediate_size: 16,
            hidden_dropout_prob: 0.1,
            layer_norm_eps: 1e-12,
            classifier_dropout: None,
            num_labels: None,
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        env::temp_dir().join(format!("bertencoder-{name}-{}", std::process::id()))
    }

    #[test]
    fn reads_hf_style_config() {
        let json = r#"{
            "architectures": ["BertForMaskedLM"],
            "hidden_size": 768,
            "num_hidden_layers": 12,
            "num_attention_heads": 12,
            "intermediate_size": 3072,
            "vocab_size": 30522
        }"#;
        let config: BaselineBertConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.num_hidden_layers, 12);
        assert_eq!(config.hidden_dropout_prob, 0.1);
        assert_eq!(config.classifier_dropout, None);
    }

    #[test]
    fn classification_forward_with_labels() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config().init::<B>(3, &device);

        let embedding = Tensor::<B, 3>::random([2, 4, 8], Distribution::Default, &device);
        let labels = Tensor::<B, 1, Int>::from_ints([0, 2], &device);

        let output = model.forward(embedding, Some(labels)).unwrap();

        assert_eq!(output.logits.dims(), [2, 3]);
        assert_eq!(output.loss.map(|loss| loss.dims()), Some([1]));
    }

    #[test]
    fn regression_uses_single_logit() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config().init::<B>(1, &device);

        let embedding = Tensor::<B, 3>::random([2, 4, 8], Distribution::Default, &device);
        let output = model
            .forward(embedding, Some(Tensor::from_ints([1, 0], &device)))
            .unwrap();

        assert_eq!(output.logits.dims(), [2, 1]);
        assert!(output.loss.is_some());
    }

    #[test]
    fn save_then_load_keeps_predictions() {
        let device = NdArrayDevice::Cpu;
        let dir = scratch_dir("roundtrip");
        let config = tiny_config();

        let model = config.init::<B>(2, &device);
        let embedding = Tensor::<B, 3>::random([1, 3, 8], Distribution::Default, &device);
        let expected = model.forward(embedding.clone(), None).unwrap().logits;

        model.save_pretrained(&dir, &config).unwrap();
        let loaded = BaselineBert::<B>::load_pretrained(&dir, 2, &device).unwrap();
        let actual = loaded.forward(embedding, None).unwrap().logits;

        expected.into_data().assert_approx_eq(&actual.into_data(), 5);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_is_a_config_error() {
        let device = NdArrayDevice::Cpu;
        let result = BaselineBert::<B>::load_pretrained(scratch_dir("missing"), 2, &device);

        assert!(matches!(result, Err(EncoderError::BaselineConfigIo { .. })));
    }

    #[test]
    fn missing_weights_are_reported() {
        let device = NdArrayDevice::Cpu;
        let dir = scratch_dir("noweights");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&tiny_config()).unwrap()).unwrap();

        let result = BaselineBert::<B>::load_pretrained(&dir, 2, &device);

        assert!(matches!(result, Err(EncoderError::BaselineWeights { .. })));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn stored_label_count_must_match() {
        let device = NdArrayDevice::Cpu;
        let dir = scratch_dir("labelcount");
        let config = tiny_config();

        config.init::<B>(3, &device).save_pretrained(&dir, &config).unwrap();
        let result = BaselineBert::<B>::load_pretrained(&dir, 2, &device);

        assert!(matches!(
            result,
            Err(EncoderError::BaselineLabelMismatch { expected: 2, found: 3, .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn classifier_width_is_checked_without_num_labels() {
        let device = NdArrayDevice::Cpu;
        let dir = scratch_dir("classifierwidth");
        let config = tiny_config();

        config.init::<B>(3, &device).save_pretrained(&dir, &config).unwrap();
        // drop num_labels so only the stored weights disagree
        fs::write(dir.join(CONFIG_FILE), serde_json::to_string(&config).unwrap()).unwrap();

        let result = BaselineBert::<B>::load_pretrained(&dir, 2, &device);

        assert!(matches!(
            result,
            Err(EncoderError::BaselineLabelMismatch { expected: 2, found: 3, .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn wrong_embedding_width_is_an_error() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config().init::<B>(2, &device);

        let embedding = Tensor::<B, 3>::random([1, 4, 6], Distribution::Default, &device);
        let result = model.forward(embedding, None);

        assert!(matches!(result, Err(EncoderError::ShapeMismatch { input: "embedding", .. })));
    }

    #[test]
    fn label_count_must_match_batch() {
        let device = NdArrayDevice::Cpu;
        let model = tiny_config().init::<B>(2, &device);

        let embedding = Tensor::<B, 3>::random([2, 4, 8], Distribution::Default, &device);
        let labels = Tensor::<B, 1, Int>::from_ints([1, 0, 1], &device);

        let result = model.forward(embedding, Some(labels));

        assert!(matches!(result, Err(EncoderError::ShapeMismatch { input: "labels", .. })));
    }
}
