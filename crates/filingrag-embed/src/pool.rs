use anyhow::{bail, Result};
use candle_core::{DType, Tensor};

/// How token states collapse into one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// First (`<s>`/CLS) token; what BGE-M3 dense retrieval is trained with.
    Cls,
    /// Mean over unmasked tokens.
    Mean,
}

/// Pool `[B,T,H]` hidden states with a `[B,T]` mask into L2-normalized `[B,H]`.
pub fn pool_l2(hidden: &Tensor, attention_mask: &Tensor, pooling: Pooling) -> Result<Tensor> {
    match pooling {
        Pooling::Cls => {
            let dims = hidden.dims();
            if dims.len() != 3 { bail!("hidden shape must be [B,T,H], got {:?}", dims); }
            let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
            l2_normalize(&cls)
        }
        Pooling::Mean => masked_mean_l2(hidden, attention_mask),
    }
}

pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    if dims.len() != 3 { bail!("hidden shape must be [B,T,H], got {:?}", dims); }
    let hidden_dim = dims[2];

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = mask_3d.broadcast_as(hidden.shape()).or_else(|_| mask_3d.repeat((1, 1, hidden_dim)))?;
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    l2_normalize(&mean)
}

fn l2_normalize(t: &Tensor) -> Result<Tensor> {
    let eps_val = match t.dtype() { DType::F16 | DType::BF16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], t.device())?.to_dtype(t.dtype())?.unsqueeze(0)?;
    let norm = t.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    Ok(t.broadcast_div(&norm)?)
}
