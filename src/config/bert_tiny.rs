use crate::model::encoder::BertEncoderConfig;

pub fn bert_tiny_config() -> BertEncoderConfig {
    let hidden_size = 128;

    // hidden size must stay divisible by the head count
    BertEncoderConfig::new(2, hidden_size, 2, 4 * hidden_size).with_dropout(0.1)
}
