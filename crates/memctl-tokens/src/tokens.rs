//! Token estimation utilities

/// Estimate BPE token count from text
///
/// Uses the `cl100k_base` encoding when the `tiktoken` feature is enabled and
/// the model loads. Otherwise falls back to an additive per-character
/// heuristic, counted in quarter tokens:
/// - ASCII: 1 (≈4 chars/token)
/// - CJK ideographs, kana, hangul, fullwidth forms: 4 (≈1 char/token)
/// - Other non-ASCII: 3
///
/// A trailing run of newlines is never counted on its own.
pub fn estimate_tokens(text: &str) -> usize {
    let text = text.trim_end_matches(['\n', '\r']);
    if text.is_empty() {
        return 0;
    }

    #[cfg(feature = "tiktoken")]
    {
        if let Some(bpe) = bpe::cl100k() {
            return bpe.encode_with_special_tokens(text).len();
        }
    }

    heuristic_tokens(text)
}

/// True when counts come from a real BPE tokenizer rather than the heuristic
pub fn using_tiktoken() -> bool {
    #[cfg(feature = "tiktoken")]
    {
        bpe::cl100k().is_some()
    }
    #[cfg(not(feature = "tiktoken"))]
    {
        false
    }
}

/// Name of the active estimator, for reports
pub fn engine_name() -> &'static str {
    if using_tiktoken() {
        "tiktoken"
    } else {
        "heuristic"
    }
}

fn heuristic_tokens(text: &str) -> usize {
    let quarters: usize = text.chars().map(char_weight).sum();
    quarters.div_ceil(4)
}

fn char_weight(c: char) -> usize {
    if c.is_ascii() {
        1
    } else if is_dense(c) {
        4
    } else {
        3
    }
}

/// Scripts that BPE vocabularies tokenize at roughly one token per character
fn is_dense(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF       // hangul jamo
        | 0x3000..=0x303F     // CJK symbols and punctuation
        | 0x3040..=0x30FF     // hiragana, katakana
        | 0x3400..=0x4DBF     // CJK extension A
        | 0x4E00..=0x9FFF     // CJK unified ideographs
        | 0xAC00..=0xD7AF     // hangul syllables
        | 0xF900..=0xFAFF     // CJK compatibility ideographs
        | 0xFF00..=0xFFEF     // halfwidth and fullwidth forms
        | 0x20000..=0x2FFFF   // CJK extensions B+
    )
}

#[cfg(feature = "tiktoken")]
mod bpe {
    use std::sync::OnceLock;
    use tiktoken_rs::CoreBPE;

    pub fn cl100k() -> Option<&'static CoreBPE> {
        static TOKENIZER: OnceLock<Option<CoreBPE>> = OnceLock::new();
        TOKENIZER
            .get_or_init(|| tiktoken_rs::cl100k_base().ok())
            .as_ref()
    }
}

#[cfg(all(test, not(feature = "tiktoken")))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("\n\n"), 0);
    }

    #[test]
    fn test_estimate_tokens_prose() {
        let prose = "The quick brown fox jumps over the lazy dog.";
        // 44 ASCII chars at 4 chars/token
        assert_eq!(estimate_tokens(prose), 11);
    }

    #[test]
    fn test_estimate_tokens_cjk_is_denser() {
        let cjk = "这是一个测试句子";
        assert_eq!(estimate_tokens(cjk), 8);
        assert!(estimate_tokens(cjk) > estimate_tokens("abcdefgh"));
    }

    #[test]
    fn test_trailing_newline_is_free() {
        assert_eq!(estimate_tokens("abcd"), estimate_tokens("abcd\n"));
        assert_eq!(estimate_tokens("abcd"), estimate_tokens("abcd\n\n\n"));
    }

    #[test]
    fn test_whitespace_counts() {
        assert!(estimate_tokens("   \n\n\t  ") >= 1);
    }

    #[test]
    fn test_fullwidth_punctuation_costs_more_than_ascii() {
        assert!(estimate_tokens("a，b") > estimate_tokens("a,b"));
    }

    #[test]
    fn test_engine_name() {
        assert!(!using_tiktoken());
        assert_eq!(engine_name(), "heuristic");
    }

    proptest! {
        #[test]
        fn deleting_a_char_never_adds_tokens(text in "\\PC{0,60}", at in 0usize..60) {
            let chars: Vec<char> = text.chars().collect();
            prop_assume!(!chars.is_empty());
            let mut shorter = chars.clone();
            shorter.remove(at % chars.len());
            let shorter: String = shorter.into_iter().collect();
            prop_assert!(estimate_tokens(&shorter) <= estimate_tokens(&text));
        }
    }
}
