pub mod bert_base;
pub mod bert_tiny;
