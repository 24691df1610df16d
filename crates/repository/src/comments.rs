use regex::Regex;
use std::sync::OnceLock;

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?sm)//.*?$|/\*.*?\*/").expect("comment pattern is a valid regex")
    })
}

/// Remove `//` line comments and `/* */` block comments (Javadoc included).
///
/// Purely lexical: comment markers inside string literals are stripped too.
/// Repository keys and indexed documents must go through the same function.
#[must_use]
pub fn strip_java_comments(source: &str) -> String {
    comment_pattern().replace_all(source, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_line_and_block_comments() {
        let source = "public void reset() {\n    // start fresh\n    resetPasswordText(false /* animate */);\n}";
        assert_eq!(
            strip_java_comments(source),
            "public void reset() {\n    \n    resetPasswordText(false );\n}"
        );
    }

    #[test]
    fn strips_multiline_javadoc() {
        let source = "/**\n * Docs.\n */\nint x = 1;";
        assert_eq!(strip_java_comments(source), "\nint x = 1;");
    }

    #[test]
    fn leaves_plain_code_untouched() {
        let source = "int a = b / c;";
        assert_eq!(strip_java_comments(source), source);
    }
}
