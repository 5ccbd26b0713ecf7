//! Shared string-literal unquoter, used by the tokenizer's own tests and by
//! `cedar-schema-parser` when it lowers a `String` token's text into the
//! attribute/action-id value it denotes.

/// Unquote and unescape a `"..."`-delimited token's raw text (quotes
/// included). Returns `None` if the text isn't a well-formed quoted string.
///
/// Supported escapes: `\\`, `\"`, `\n`, `\r`, `\t`, `\0`. An embedded,
/// unescaped newline is passed through literally (the caller's line/column
/// tracker has already accounted for it during lexing).
pub fn unescape_quoted(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            other => {
                // Unknown escape: keep both characters verbatim rather than
                // silently dropping the backslash.
                out.push('\\');
                out.push(other);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string() {
        assert_eq!(unescape_quoted(r#""hello""#).unwrap(), "hello");
    }

    #[test]
    fn escaped_quote_and_backslash() {
        assert_eq!(
            unescape_quoted(r#""a\"b\\c""#).unwrap(),
            "a\"b\\c"
        );
    }

    #[test]
    fn escaped_newline() {
        assert_eq!(unescape_quoted(r#""a\nb""#).unwrap(), "a\nb");
    }

    #[test]
    fn rejects_unquoted() {
        assert!(unescape_quoted("abc").is_none());
    }
}
