use burn::prelude::{Backend, Int};
use burn::tensor::{Distribution, Tensor};
use itertools::Itertools;
use rand::{thread_rng, Rng};

/// One segment id per real token, zero for the padded tail. Empty for an
/// empty sequence.
pub(crate) fn sample_segment_ids(seq_len: usize) -> Vec<i32> {
    if seq_len == 0 {
        return Vec::new();
    }

    let mut rng = thread_rng();
    let len = rng.gen_range(1..=seq_len);
    let split = rng.gen_range(0..=len);

    (0..seq_len)
        .map(|idx| match idx {
            idx if idx >= len => 0,
            idx if idx < split => 1,
            _ => 2,
        })
        .collect_vec()
}

/// B x S segment ids with a random valid length per row.
pub fn sample_segments<B: Backend>(batch_size: usize, seq_len: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    let rows = (0..batch_size)
        .map(|_| Tensor::<B, 1, Int>::from_ints(sample_segment_ids(seq_len).as_slice(), device))
        .collect_vec();

    Tensor::stack(rows, 0)
}

pub fn sample_embeddings<B: Backend>(batch_size: usize, seq_len: usize, emb_size: usize, device: &B::Device) -> Tensor<B, 3> {
    Tensor::random([batch_size, seq_len, emb_size], Distribution::Normal(0.0, 1.0), device)
}
