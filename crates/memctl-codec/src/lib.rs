//! Reversible and lossy text codecs: dictionary substitution, run-length
//! folding and tokenizer-oriented rewrites

mod dictionary;
mod optimizer;
mod rle;

pub use dictionary::{
    build_codebook, compress_text, compression_stats, decompress_text, load_codebook,
    recompress_text, save_codebook, Codebook, CodebookStats,
};
pub use optimizer::{
    compact_bullets, compress_table_to_kv, estimate_savings, minimize_whitespace,
    normalize_punctuation, optimize_tokens, strip_bold_italic, strip_trivial_backticks,
    SavingsEstimate,
};
pub use rle::{
    coalesce_headers, compress_enumerations, compress_ip_families, compress_paths,
    decompress_ip_families, decompress_paths, rle_compress, rle_decompress, IpFamilies,
    IpFamilyStore, RleContext, WS_TOKEN,
};
