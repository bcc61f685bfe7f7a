use burn::module::Module;
use burn::prelude::{Backend, Tensor};

pub mod transformer;

/// One shape-preserving block of the encoder stack.
pub trait LayerUnit<B: Backend>: Module<B> {
    /// hidden: B x S x H, mask: B x 1 x S x S additive bias.
    fn apply(&self, hidden: Tensor<B, 3>, mask: Tensor<B, 4>) -> Tensor<B, 3>;
}
