pub mod config;
pub mod error;
pub mod mask;
pub mod model;
pub mod util;

pub use error::EncoderError;
pub use model::{BertEncoder, BertEncoderConfig, EncoderInput, EncoderOutput};
