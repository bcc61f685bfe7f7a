use crate::model::encoder::BertEncoderConfig;

/// 12 layers, 768 hidden, 12 heads.
pub fn bert_base_config() -> BertEncoderConfig {
    let hidden_size = 768;

    BertEncoderConfig::new(12, hidden_size, 12, 4 * hidden_size)
        .with_dropout(0.1)
        .with_layer_norm_eps(1e-6)
}

/// Delegates to a pretrained reference classifier stored at `path`.
pub fn bert_base_baseline_config(path: impl Into<String>, labels_num: usize) -> BertEncoderConfig {
    bert_base_config()
        .with_use_baseline_bert(true)
        .with_baseline_bert_path(Some(path.into()))
        .with_labels_num(Some(labels_num))
}
