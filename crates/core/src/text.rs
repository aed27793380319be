//! Comment stripping and string/paren-aware value splitting.
//!
//! Grounded on the jsonc-comment-stripping technique in
//! `metafw_jsonc_strip::strip_jsonc`: track whether the scanner is inside a
//! string literal, and only treat comment markers as such outside one. This
//! module generalizes that one pass to line comments (`#`), block comments
//! (`/* */` spanning lines via caller-owned state), and the four quoting
//! forms this grammar uses (`"..."`, `L"..."`, `'...'`, `L'...'`).

/// Caller-owned state tracking whether the scanner is currently inside a
/// `/* ... */` block comment that began on an earlier line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCommentState {
    in_block: bool,
}

impl BlockCommentState {
    /// A fresh state, not inside a block comment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scanner is currently inside a block comment.
    #[must_use]
    pub fn in_block(self) -> bool {
        self.in_block
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Double,
    Single,
}

/// Strip comments from one line of source, returning `(data, comment)`.
///
/// `data` is the line with any trailing line comment and any portion inside
/// an active block comment removed; `comment` is the stripped text, if any.
/// `state` is threaded across calls for a single file so a `/* ... */` block
/// spanning multiple lines is handled correctly.
#[must_use]
pub fn strip_comment<'a>(
    line: &'a str,
    state: &mut BlockCommentState,
) -> (std::borrow::Cow<'a, str>, Option<String>) {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut data = String::new();
    let mut comment = String::new();
    let mut quote = Quote::None;
    let mut i = 0usize;

    while i < len {
        if state.in_block {
            if chars[i] == '*' && i + 1 < len && chars[i + 1] == '/' {
                state.in_block = false;
                i += 2;
                continue;
            }
            comment.push(chars[i]);
            i += 1;
            continue;
        }

        let c = chars[i];

        if quote != Quote::None {
            data.push(c);
            if c == '\\' && i + 1 < len {
                i += 1;
                data.push(chars[i]);
                i += 1;
                continue;
            }
            match (quote, c) {
                (Quote::Double, '"') | (Quote::Single, '\'') => quote = Quote::None,
                _ => {}
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                quote = Quote::Double;
                data.push(c);
                i += 1;
            }
            '\'' => {
                quote = Quote::Single;
                data.push(c);
                i += 1;
            }
            '#' => {
                comment.push_str(&line.chars().skip(i).collect::<String>());
                i = len;
            }
            '/' if i + 1 < len && chars[i + 1] == '*' => {
                state.in_block = true;
                i += 2;
            }
            _ => {
                data.push(c);
                i += 1;
            }
        }
    }

    let data = data.trim_end().to_string();
    let comment = if comment.is_empty() {
        None
    } else {
        Some(comment)
    };
    (std::borrow::Cow::Owned(data), comment)
}

/// Split `line` on `delimiter`, respecting the four string-literal forms
/// and `(...)` nesting: a delimiter inside either is not a split point.
///
/// `max_splits`, if given, bounds the number of splits performed (the
/// remainder after the last permitted split is returned as one field, as
/// with `str::splitn`).
#[must_use]
pub fn split_value_list(line: &str, delimiter: char, max_splits: Option<usize>) -> Vec<String> {
    let protected = protect_backslash_pairs(line);
    let chars: Vec<char> = protected.chars().collect();
    let len = chars.len();

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote = Quote::None;
    let mut paren_depth: i32 = 0;
    let mut i = 0usize;

    while i < len {
        let c = chars[i];

        if quote != Quote::None {
            current.push(c);
            if c == '\\' && i + 1 < len {
                i += 1;
                current.push(chars[i]);
                i += 1;
                continue;
            }
            match (quote, c) {
                (Quote::Double, '"') | (Quote::Single, '\'') => quote = Quote::None,
                _ => {}
            }
            i += 1;
            continue;
        }

        let at_split_limit = max_splits.is_some_and(|m| fields.len() >= m);

        match c {
            '"' => {
                quote = Quote::Double;
                current.push(c);
            }
            '\'' => {
                quote = Quote::Single;
                current.push(c);
            }
            '(' => {
                paren_depth += 1;
                current.push(c);
            }
            ')' => {
                paren_depth -= 1;
                current.push(c);
            }
            c2 if c2 == delimiter && paren_depth == 0 && !at_split_limit => {
                fields.push(restore_backslash_pairs(&current));
                current.clear();
            }
            _ => current.push(c),
        }
        i += 1;
    }
    fields.push(restore_backslash_pairs(&current));
    fields
}

/// Sentinel placeholder unlikely to appear in real source, used to protect
/// literal `\\` pairs from being misread during the split scan.
const BACKSLASH_SENTINEL: &str = "\u{0}\u{0}BSLASH\u{0}\u{0}";

fn protect_backslash_pairs(input: &str) -> String {
    input.replace("\\\\", BACKSLASH_SENTINEL)
}

fn restore_backslash_pairs(input: &str) -> String {
    input.replace(BACKSLASH_SENTINEL, "\\\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_line_comment_outside_string() {
        let mut state = BlockCommentState::new();
        let (data, comment) = strip_comment("FOO = 1 # trailing", &mut state);
        assert_eq!(data.trim(), "FOO = 1");
        assert_eq!(comment.unwrap().trim(), "# trailing");
    }

    #[test]
    fn hash_inside_double_quote_is_not_a_comment() {
        let mut state = BlockCommentState::new();
        let (data, comment) = strip_comment(r#"FOO = "a#b""#, &mut state);
        assert_eq!(data, r#"FOO = "a#b""#);
        assert!(comment.is_none());
    }

    #[test]
    fn hash_inside_unicode_string_is_not_a_comment() {
        let mut state = BlockCommentState::new();
        let (data, comment) = strip_comment(r#"FOO = L"a#b""#, &mut state);
        assert_eq!(data, r#"FOO = L"a#b""#);
        assert!(comment.is_none());
    }

    #[test]
    fn escaped_quote_does_not_close_string() {
        let mut state = BlockCommentState::new();
        let (data, _) = strip_comment(r#"FOO = "a\"#b""#, &mut state);
        // the escaped quote keeps us inside the string, so the # is protected
        assert!(data.contains('#'));
    }

    #[test]
    fn block_comment_spans_lines() {
        let mut state = BlockCommentState::new();
        let (data1, _) = strip_comment("FOO = 1 /* start", &mut state);
        assert!(state.in_block());
        assert_eq!(data1.trim(), "FOO = 1");

        let (data2, _) = strip_comment("still inside */ BAR = 2", &mut state);
        assert!(!state.in_block());
        assert_eq!(data2.trim(), "BAR = 2");
    }

    #[test]
    fn split_respects_double_quotes() {
        let fields = split_value_list(r#"PcdStr|L"a|b"|VOID*|8"#, '|', None);
        assert_eq!(fields, vec!["PcdStr", r#"L"a|b""#, "VOID*", "8"]);
    }

    #[test]
    fn split_respects_parens() {
        let fields = split_value_list("A|(1|2)|B", '|', None);
        assert_eq!(fields, vec!["A", "(1|2)", "B"]);
    }

    #[test]
    fn split_honors_max_splits() {
        let fields = split_value_list("a|b|c|d", '|', Some(1));
        assert_eq!(fields, vec!["a", "b|c|d"]);
    }

    #[test]
    fn split_preserves_literal_backslash_pairs() {
        let fields = split_value_list(r"a\\|b", '|', None);
        assert_eq!(fields, vec![r"a\\", "b"]);
    }
}
