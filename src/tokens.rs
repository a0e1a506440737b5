/// Encoding used for payload size estimates.
pub const DEFAULT_ENCODING: &str = "cl100k_base";

/// Counts tokens of `text` with the named tiktoken encoding (`cl100k_base` or
/// `o200k_base`). Unknown encodings, or an encoding that fails to load, fall
/// back to roughly four bytes per token.
pub fn count_tokens(text: &str, encoding: &str) -> usize {
    match encoding {
        "o200k_base" | "cl100k_base" => match tiktoken_rs::get_bpe_from_model(encoding) {
            Ok(bpe) => bpe.encode_ordinary(text).len(),
            Err(_) => fallback_tokens(text),
        },
        _ => fallback_tokens(text),
    }
}

pub fn payload_tokens(payload: &str) -> usize {
    count_tokens(payload, DEFAULT_ENCODING)
}

#[inline]
fn fallback_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}
