use std::sync::Arc;

/// Strategy that turns a document or query into an ordered sequence of terms.
///
/// The same tokenizer must be used for the corpus and for queries; the index
/// records [`Tokenizer::id`] when persisted so a mismatch is caught on load.
pub trait Tokenizer: Send + Sync {
    /// Stable identifier written into persisted indexes.
    fn id(&self) -> &str;

    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default tokenizer: whitespace split, no case folding, no stemming.
///
/// Deliberately naive. Code corpora should use [`CodeTokenizer`] or a custom
/// strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn id(&self) -> &str {
        "whitespace"
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Identifier-aware tokenizer for source code.
///
/// Every identifier is emitted lower-cased as a whole, followed by its
/// snake_case / camelCase parts, so `resetPasswordText` matches queries for
/// `password` as well as for the full name. Terms shorter than two characters
/// are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct CodeTokenizer;

impl Tokenizer for CodeTokenizer {
    fn id(&self) -> &str {
        "code"
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
            let word = word.trim_matches('_');
            if word.chars().count() < 2 {
                continue;
            }
            let whole = word.to_lowercase();

            let parts: Vec<&str> = word
                .split('_')
                .filter(|segment| !segment.is_empty())
                .flat_map(split_camel)
                .collect();

            tokens.push(whole.clone());
            if parts.len() > 1 {
                for part in parts {
                    if part.chars().count() < 2 {
                        continue;
                    }
                    tokens.push(part.to_lowercase());
                }
            }
        }
        tokens
    }
}

/// Resolve a built-in tokenizer by its id.
#[must_use]
pub fn tokenizer_by_id(id: &str) -> Option<Arc<dyn Tokenizer>> {
    match id {
        "whitespace" => Some(Arc::new(WhitespaceTokenizer)),
        "code" => Some(Arc::new(CodeTokenizer)),
        _ => None,
    }
}

fn split_camel(word: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    for i in 1..chars.len() {
        let (pos, cur) = chars[i];
        let prev = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_lowercase());

        // fooBar | HTTPServer -> HTTP + Server
        let boundary = (prev.is_lowercase() && cur.is_uppercase())
            || (prev.is_uppercase() && cur.is_uppercase() && next_is_lower);
        if boundary {
            parts.push(&word[start..pos]);
            start = pos;
        }
    }
    parts.push(&word[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn whitespace_tokenizer_keeps_case_and_punctuation() {
        let tokens = WhitespaceTokenizer.tokenize("How is  the Weather\ttoday?");
        assert_eq!(tokens, vec!["How", "is", "the", "Weather", "today?"]);
    }

    #[test]
    fn code_tokenizer_splits_identifiers() {
        let tokens = CodeTokenizer.tokenize("resetPasswordText(false);");
        assert_eq!(
            tokens,
            vec!["resetpasswordtext", "reset", "password", "text", "false"]
        );
    }

    #[test]
    fn code_tokenizer_handles_acronyms_and_snake_case() {
        let tokens = CodeTokenizer.tokenize("HTTPServer max_retry_count");
        assert_eq!(
            tokens,
            vec![
                "httpserver",
                "http",
                "server",
                "max_retry_count",
                "max",
                "retry",
                "count"
            ]
        );
    }

    #[test]
    fn code_tokenizer_drops_short_terms() {
        let tokens = CodeTokenizer.tokenize("a = b + xs;");
        assert_eq!(tokens, vec!["xs"]);
    }

    #[test]
    fn resolves_builtin_tokenizers() {
        assert_eq!(tokenizer_by_id("code").map(|t| t.id().to_string()), Some("code".into()));
        assert!(tokenizer_by_id("stemmed").is_none());
    }
}
