use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::{Encoding, Tokenizer};

/// XLM-RoBERTa `<pad>` id.
pub const PAD_ID: u32 = 1;

/// Encode one text, padded or truncated to exactly `max_len`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    fixed_length(&enc, max_len, device)
}

/// Encode a `(query, passage)` pair for a cross-encoder. When the pair is too
/// long the tail is cut but the closing special token is kept.
pub fn tokenize_pair_on_device(tokenizer: &Tokenizer, query: &str, passage: &str, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode((query, passage), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    fixed_length(&enc, max_len, device)
}

/// Stack per-text `(1, L)` tensors into `(B, L)`.
pub fn stack_rows(rows: Vec<(Tensor, Tensor)>) -> Result<(Tensor, Tensor)> {
    let (ids, masks): (Vec<Tensor>, Vec<Tensor>) = rows.into_iter().unzip();
    Ok((Tensor::cat(&ids, 0)?, Tensor::cat(&masks, 0)?))
}

fn fixed_length(enc: &Encoding, max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    if ids.len() > max_len {
        let closing = ids.last().copied();
        ids.truncate(max_len); mask.truncate(max_len);
        if let (Some(last), Some(slot)) = (closing, ids.last_mut()) { *slot = last; }
    }
    if ids.len() < max_len { let pad = max_len - ids.len(); ids.extend(std::iter::repeat(PAD_ID).take(pad)); mask.extend(std::iter::repeat(0).take(pad)); }
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, max_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, max_len))?;
    Ok((input_ids, attention_mask))
}
