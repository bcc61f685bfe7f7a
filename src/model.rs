pub mod baseline;
pub mod encoder;
pub mod layer;

pub use encoder::{BertEncoder, BertEncoderConfig, EncoderBackend, EncoderInput, EncoderOutput};
