//! Parameter list parsing for `[TOOL_CALL: name(...)]`.
//!
//! The list is `key: value` pairs separated by commas. Values are either
//! double-quoted or bare. Quoted values accept `\"`, `\\`, `\n` and `\t`
//! escapes. Models often embed raw JSON in a quoted value without escaping
//! its quotes, so an unescaped `"` only closes the value when it is followed
//! by the end of the list or by `, next_key:`. Any other `"` is kept as text.
//!
//! Malformed pairs are skipped. A repeated key keeps its last value.

use std::collections::HashMap;

/// Parse the text between the parentheses of a tool call.
pub fn parse_parameters(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = raw;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        if rest.is_empty() {
            break;
        }

        let key_len = ident_len(rest);
        if key_len == 0 {
            tracing::debug!("Skipping malformed tool parameter near {:?}", rest);
            rest = skip_past_comma(rest);
            continue;
        }
        let key = &rest[..key_len];
        let after_key = rest[key_len..].trim_start();

        let Some(after_sep) = after_key
            .strip_prefix(':')
            .or_else(|| after_key.strip_prefix('='))
        else {
            tracing::debug!("Tool parameter '{}' has no value", key);
            rest = skip_past_comma(after_key);
            continue;
        };
        let value_start = after_sep.trim_start();

        let (value, remaining) = match value_start.strip_prefix('"') {
            Some(quoted) => parse_quoted(quoted),
            None => parse_bare(value_start),
        };
        params.insert(key.to_string(), value);
        rest = remaining;
    }

    params
}

fn ident_len(text: &str) -> usize {
    text.char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

fn skip_past_comma(text: &str) -> &str {
    match text.find(',') {
        Some(i) => &text[i + 1..],
        None => "",
    }
}

/// Whether a closing quote may sit right before `rest`.
fn closes_value(rest: &str) -> bool {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return true;
    }
    let Some(after_comma) = rest.strip_prefix(',') else {
        return false;
    };
    let next = after_comma.trim_start();
    let key_len = ident_len(next);
    if key_len == 0 {
        return false;
    }
    let after_key = next[key_len..].trim_start();
    after_key.starts_with(':') || after_key.starts_with('=')
}

fn parse_quoted(text: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = text.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => value.push('\\'),
            },
            '"' => {
                let rest = &text[i + 1..];
                if closes_value(rest) {
                    return (value, rest);
                }
                value.push('"');
            }
            other => value.push(other),
        }
    }

    // Unterminated: keep what we have.
    (value, "")
}

fn parse_bare(text: &str) -> (String, &str) {
    match text.find(',') {
        Some(i) => (text[..i].trim().to_string(), &text[i + 1..]),
        None => (text.trim().to_string(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_and_bare_values() {
        let params = parse_parameters(r#"date: "2024-05-01", distance: 10"#);
        assert_eq!(params["date"], "2024-05-01");
        assert_eq!(params["distance"], "10");
    }

    #[test]
    fn test_escapes() {
        let params = parse_parameters(r#"note: "line one\nline \"two\"\t\\end""#);
        assert_eq!(params["note"], "line one\nline \"two\"\t\\end");
    }

    #[test]
    fn test_unescaped_json_in_quoted_value() {
        let params = parse_parameters(
            r#"date: "today", workout_json: "{"type": "run", "miles": 5}""#,
        );
        assert_eq!(params["date"], "today");
        assert_eq!(params["workout_json"], r#"{"type": "run", "miles": 5}"#);
        let parsed: serde_json::Value = serde_json::from_str(&params["workout_json"]).unwrap();
        assert_eq!(parsed["miles"], 5);
    }

    #[test]
    fn test_quote_comma_key_closes_value() {
        let params = parse_parameters(r#"a: "x", b: "y""#);
        assert_eq!(params["a"], "x");
        assert_eq!(params["b"], "y");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let params = parse_parameters(r#"date: "monday", date: "tuesday""#);
        assert_eq!(params.len(), 1);
        assert_eq!(params["date"], "tuesday");
    }

    #[test]
    fn test_malformed_pairs_are_skipped() {
        let params = parse_parameters(r#""orphan", lonely, date: "today""#);
        assert_eq!(params.len(), 1);
        assert_eq!(params["date"], "today");
    }

    #[test]
    fn test_unterminated_quote_is_lenient() {
        let params = parse_parameters(r#"date: "tomorr"#);
        assert_eq!(params["date"], "tomorr");
    }

    #[test]
    fn test_empty_list() {
        assert!(parse_parameters("").is_empty());
        assert!(parse_parameters("  ,  ").is_empty());
    }
}
