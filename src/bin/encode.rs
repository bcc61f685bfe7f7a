use burn::backend::ndarray::NdArrayDevice;
use burn::backend::NdArray;
use burn::config::Config;
use color_eyre::eyre::{eyre, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bertencoder::config::bert_tiny::bert_tiny_config;
use bertencoder::util::{sample_embeddings, sample_segments};
use bertencoder::{BertEncoderConfig, EncoderInput, EncoderOutput};

type B = NdArray;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // optional path to a BertEncoderConfig json
    let config = match std::env::args().nth(1) {
        Some(path) => BertEncoderConfig::load(&path).map_err(|err| eyre!("{path}: {err}"))?,
        None => bert_tiny_config(),
    };

    let device = NdArrayDevice::Cpu;
    let encoder = config.init::<B>(&device)?;

    let (batch, seq_len) = (4, 32);
    let embedding = sample_embeddings::<B>(batch, seq_len, config.hidden_size, &device);
    let segment = sample_segments::<B>(batch, seq_len, &device);

    match encoder.forward(EncoderInput::new(embedding).with_segment(segment))? {
        EncoderOutput::Hidden(hidden) => info!(dims = ?hidden.dims(), "encoded batch"),
        EncoderOutput::Classification { logits, .. } => info!(dims = ?logits.dims(), "classified batch"),
    }

    Ok(())
}
