use burn::config::Config;
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Gelu, LayerNorm, LayerNormConfig, Linear, LinearConfig};
use burn::prelude::Backend;
use burn::tensor::activation::softmax;
use burn::tensor::Tensor;

use crate::model::layer::LayerUnit;

#[derive(Config, Debug)]
pub struct SelfAttentionConfig {
    hidden_size: usize,
    heads_num: usize,
    dropout: f64,
}

impl SelfAttentionConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SelfAttention<B> {
        let per_head_size = self.hidden_size / self.heads_num;

        SelfAttention {
            hidden_size: self.hidden_size,
            heads_num: self.heads_num,
            per_head_size,
            scaling: (per_head_size as f32).powf(-0.5),
            query: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            key: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            value: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            output: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct SelfAttention<B: Backend> {
    hidden_size: usize,
    heads_num: usize,
    per_head_size: usize,
    scaling: f32,
    query: Linear<B>,
    key: Linear<B>,
    value: Linear<B>,
    output: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> SelfAttention<B> {
    // B x S x H  ->  B x N x S x H/N
    fn split_heads(&self, tensor: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, seq_len, _] = tensor.dims();

        tensor
            .reshape([batch, seq_len, self.heads_num, self.per_head_size])
            .swap_dims(1, 2)
    }

    pub fn forward(&self, hidden: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = hidden.dims();

        let query = self.split_heads(self.query.forward(hidden.clone()));
        let key = self.split_heads(self.key.forward(hidden.clone()));
        let value = self.split_heads(self.value.forward(hidden));

        // scores : B x N x S x S, mask broadcasts over N
        let scores = query.matmul(key.transpose()).mul_scalar(self.scaling);
        let scores = scores + mask;

        let probs = softmax(scores, 3);
        let probs = self.dropout.forward(probs);

        let context = probs.matmul(value);
        let context = context
            .swap_dims(1, 2)
            .reshape([batch, seq_len, self.hidden_size]);

        self.output.forward(context)
    }
}

#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    hidden_size: usize,
    feedforward_size: usize,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            dense: LinearConfig::new(self.hidden_size, self.feedforward_size).init(device),
            activation: Gelu::new(),
            output_dense: LinearConfig::new(self.feedforward_size, self.hidden_size).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    dense: Linear<B>,
    activation: Gelu,
    output_dense: Linear<B>,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.dense.forward(hidden);
        let hidden = self.activation.forward(hidden);
        self.output_dense.forward(hidden)
    }
}

#[derive(Config, Debug)]
pub struct TransformerLayerConfig {
    pub hidden_size: usize,
    pub heads_num: usize,
    pub feedforward_size: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
    #[config(default = 1e-6)]
    pub layer_norm_eps: f64,
}

impl TransformerLayerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerLayer<B> {
        TransformerLayer {
            self_attention: SelfAttentionConfig::new(self.hidden_size, self.heads_num, self.dropout)
                .init(device),
            attention_dropout: DropoutConfig::new(self.dropout).init(),
            layer_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            feed_forward: FeedForwardConfig::new(self.hidden_size, self.feedforward_size).init(device),
            output_dropout: DropoutConfig::new(self.dropout).init(),
            final_layer_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
        }
    }
}

/// Post-norm BERT block: attention and feed-forward, each followed by a
/// residual add and layer norm.
#[derive(Module, Debug)]
pub struct TransformerLayer<B: Backend> {
    self_attention: SelfAttention<B>,
    attention_dropout: Dropout,
    layer_norm: LayerNorm<B>,
    feed_forward: FeedForward<B>,
    output_dropout: Dropout,
    final_layer_norm: LayerNorm<B>,
}

impl<B: Backend> TransformerLayer<B> {
    pub fn forward(&self, hidden: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3> {
        let attended = self.self_attention.forward(hidden.clone(), mask);
        let attended = self.attention_dropout.forward(attended);
        let inter = self.layer_norm.forward(attended + hidden);

        let output = self.feed_forward.forward(inter.clone());
        let output = self.output_dropout.forward(output);

        self.final_layer_norm.forward(output + inter)
    }
}

impl<B: Backend> LayerUnit<B> for TransformerLayer<B> {
    fn apply(&self, hidden: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3> {
        self.forward(hidden, mask)
    }
}
