//! Double Metaphone encoding and tolerant phonetic code comparison (C2).

use crate::search::levenshtein::levenshtein_distance;
use rphonetic::{DoubleMetaphone, Encoder};
use std::collections::HashSet;

/// Default maximum Levenshtein distance between phonetic codes still considered
/// a tolerant (approximate) match.
pub const PHONETIC_CODE_MAX_EDITS: usize = 1;

/// Primary and alternate Double Metaphone codes for a single token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhoneticCodes {
    pub primary: String,
    pub alternate: String,
}

impl PhoneticCodes {
    /// Non-empty codes among primary/alternate, as a small iterator.
    pub fn non_empty(&self) -> impl Iterator<Item = &str> {
        [self.primary.as_str(), self.alternate.as_str()]
            .into_iter()
            .filter(|c| !c.is_empty())
    }
}

/// Encodes whitespace-separated tokens into Double Metaphone code pairs.
pub struct PhoneticEncoder {
    encoder: DoubleMetaphone,
}

impl Default for PhoneticEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhoneticEncoder {
    pub fn new() -> Self {
        Self {
            encoder: DoubleMetaphone::default(),
        }
    }

    /// Encode a single token. Returns empty codes for an empty token.
    pub fn encode_token(&self, token: &str) -> PhoneticCodes {
        if token.is_empty() {
            return PhoneticCodes::default();
        }
        let result = self.encoder.double_metaphone(token);
        PhoneticCodes {
            primary: result.primary().to_uppercase(),
            alternate: result.alternate().to_uppercase(),
        }
    }

    /// Encode an entire field (brand name or product name) as a single unit,
    /// the way the per-record `brand_phonetic`/`product_phonetic` columns are
    /// derived: the whole normalized field is passed to Double Metaphone
    /// directly, not split into per-token codes like `query_codes`.
    pub fn encode_field(&self, text: &str) -> PhoneticCodes {
        self.encode_token(text.trim())
    }

    /// The set union of all non-empty primary/alternate codes across all
    /// whitespace-separated tokens of `text`.
    pub fn query_codes(&self, text: &str) -> HashSet<String> {
        let mut codes = HashSet::new();
        for token in text.split_whitespace() {
            let encoded = self.encode_token(token);
            for code in encoded.non_empty() {
                codes.insert(code.to_string());
            }
        }
        codes
    }
}

/// True if `code` is present verbatim in `query_codes`. Empty codes never match.
pub fn exact_match(code: &str, query_codes: &HashSet<String>) -> bool {
    !code.is_empty() && query_codes.contains(code)
}

/// True if `code` is within `PHONETIC_CODE_MAX_EDITS` Levenshtein edits of any
/// code in `query_codes`. Empty codes never match.
pub fn tolerant_match(code: &str, query_codes: &HashSet<String>, max_edits: usize) -> bool {
    if code.is_empty() {
        return false;
    }
    query_codes
        .iter()
        .any(|q| !q.is_empty() && levenshtein_distance(code, q) <= max_edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_token_empty_is_default() {
        let enc = PhoneticEncoder::new();
        assert_eq!(enc.encode_token(""), PhoneticCodes::default());
    }

    #[test]
    fn encode_token_uppercases_codes() {
        let enc = PhoneticEncoder::new();
        let codes = enc.encode_token("colgate");
        assert_eq!(codes.primary, codes.primary.to_uppercase());
    }

    #[test]
    fn query_codes_is_set_union_across_tokens() {
        let enc = PhoneticEncoder::new();
        let codes = enc.query_codes("colgate total");
        let brand = enc.encode_token("colgate");
        assert!(codes.contains(&brand.primary));
    }

    #[test]
    fn empty_code_never_matches() {
        let mut query_codes = HashSet::new();
        query_codes.insert("KLKT".to_string());
        assert!(!exact_match("", &query_codes));
        assert!(!tolerant_match("", &query_codes, 5));
    }

    #[test]
    fn tolerant_match_within_edit_distance() {
        let mut query_codes = HashSet::new();
        query_codes.insert("KLKT".to_string());
        assert!(tolerant_match("KLKD", &query_codes, 1));
        assert!(!tolerant_match("XXXX", &query_codes, 1));
    }

    #[test]
    fn phonetic_determinism() {
        let enc = PhoneticEncoder::new();
        let a = enc.encode_token("kolgate");
        let b = enc.encode_token("kolgate");
        assert_eq!(a, b);
    }

    #[test]
    fn tolerant_phonetic_match_colgate_kolgate() {
        let enc = PhoneticEncoder::new();
        let colgate = enc.encode_token("colgate");
        let query_codes = enc.query_codes("kolgate");
        let matched = exact_match(&colgate.primary, &query_codes)
            || tolerant_match(&colgate.primary, &query_codes, PHONETIC_CODE_MAX_EDITS);
        assert!(matched, "kolgate should tolerantly match colgate's code");
    }
}
