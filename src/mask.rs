use burn::prelude::{Backend, Int};
use burn::tensor::{Bool, Shape, Tensor};
use tracing::debug;

use crate::error::EncoderError;

/// Additive bias for forbidden attention paths. Finite so a fully masked row
/// softmaxes to a uniform distribution instead of NaN.
pub const MASK_VALUE: f32 = -10000.0;

/// Builds the additive attention bias, `[batch, 1, seq, seq]`.
///
/// The visibility matrix wins when both inputs are given. Without one, a key
/// position is attendable iff its segment id is positive, for every query.
pub fn attention_mask<B: Backend>(
    segment: Option<Tensor<B, 2, Int>>,
    visibility: Option<Tensor<B, 3, Bool>>,
) -> Result<Tensor<B, 4>, EncoderError> {
    let attendable = match (visibility, segment) {
        (Some(visibility), _) => {
            debug!(dims = ?visibility.dims(), "deriving mask from visibility matrix");
            visibility
        }
        (None, Some(segment)) => {
            debug!(dims = ?segment.dims(), "deriving mask from segment ids");
            segment_visibility(segment)
        }
        (None, None) => return Err(EncoderError::MissingMask),
    };

    Ok(additive_mask(attendable))
}

/// segment: B x S  ->  B x S x S, every row a copy of `segment > 0`.
pub fn segment_visibility<B: Backend>(segment: Tensor<B, 2, Int>) -> Tensor<B, 3, Bool> {
    let [batch, seq_len] = segment.dims();

    segment
        .greater_elem(0)
        .unsqueeze_dim::<3>(1)
        .expand(Shape::new([batch, seq_len, seq_len]))
}

/// visibility: B x S x S  ->  B x 1 x S x S with (1 - v) * MASK_VALUE.
pub fn additive_mask<B: Backend>(visibility: Tensor<B, 3, Bool>) -> Tensor<B, 4> {
    let visibility = visibility.unsqueeze_dim::<4>(1).float();

    visibility.neg().add_scalar(1.0).mul_scalar(MASK_VALUE)
}
