//! Tool call detection for model output.
//!
//! Tool calls are embedded in the text the model writes:
//!
//! ```text
//! [TOOL_CALL: toolName]
//! [TOOL_CALL: toolName(param1: "value", param2: "value")]
//! ```
//!
//! Only whole matches count. `[TOOL_CALL: plan_workout(` without the closing
//! `)]` is never reported.

use std::collections::HashMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use pacer_core::ToolInvocation;

use super::params::parse_parameters;

/// Opening marker of a tool call.
pub const TOOL_CALL_MARKER: &str = "[TOOL_CALL:";

static TOOL_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[TOOL_CALL:\s*(\w+)(?:\((.*?)\))?\]").expect("tool call pattern is valid")
});

// Text that may still grow into a full match.
static TOOL_CALL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[TOOL_CALL:\s*(?:\w+(?:\(.*)?)?$").expect("tool call prefix pattern is valid")
});

static EXTRA_BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank line pattern is valid"));

/// A tool call found in model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: HashMap<String, String>,
    /// Byte range of the whole match in the scanned text.
    pub span: Range<usize>,
}

impl ToolCall {
    /// Executor input for this call.
    pub fn invocation(&self) -> ToolInvocation {
        ToolInvocation {
            name: self.name.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Find every tool call in `text`, left to right.
pub fn detect(text: &str) -> Vec<ToolCall> {
    TOOL_CALL_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?.as_str().to_string();
            let parameters = caps
                .get(2)
                .map(|raw| parse_parameters(raw.as_str()))
                .unwrap_or_default();
            Some(ToolCall {
                name,
                parameters,
                span: whole.range(),
            })
        })
        .collect()
}

/// First tool call in `text`, if any.
pub fn first_tool_call(text: &str) -> Option<ToolCall> {
    detect(text).into_iter().next()
}

/// Whether `text` contains at least one complete tool call.
pub fn contains_tool_call(text: &str) -> bool {
    TOOL_CALL_RE.is_match(text)
}

/// Whether `text`, which starts at a `[`, could still become a tool call
/// once more tokens arrive.
pub fn could_become_tool_call(text: &str) -> bool {
    if text.len() < TOOL_CALL_MARKER.len() {
        return TOOL_CALL_MARKER.starts_with(text);
    }
    TOOL_CALL_PREFIX_RE.is_match(text)
}

/// Remove every tool call from `text` and normalize the whitespace left behind.
///
/// Removal repeats until nothing matches: dropping a nested call can close
/// the call around it.
pub fn strip_tool_calls(text: &str) -> String {
    let mut stripped = remove_matches(text);
    while TOOL_CALL_RE.is_match(&stripped) {
        stripped = remove_matches(&stripped);
    }
    normalize_whitespace(&stripped)
}

fn remove_matches(text: &str) -> String {
    let mut stripped = String::with_capacity(text.len());
    let mut last = 0;
    for m in TOOL_CALL_RE.find_iter(text) {
        stripped.push_str(&text[last..m.start()]);
        // "a [TOOL_CALL: x] b" becomes "a b", not "a  b"
        if stripped.ends_with(' ') && text[m.end()..].starts_with(' ') {
            stripped.pop();
        }
        last = m.end();
    }
    stripped.push_str(&text[last..]);
    stripped
}

/// Trim trailing spaces per line, collapse runs of blank lines, trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXTRA_BLANK_LINES_RE
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_bare_tool_call() {
        let calls = detect("Checking. [TOOL_CALL: get_schedule]");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "get_schedule");
        assert!(calls[0].parameters.is_empty());
        assert_eq!(calls[0].span, 10..35);
    }

    #[test]
    fn test_detect_with_parameters() {
        let calls = detect(r#"[TOOL_CALL: plan_workout(date: "2024-05-01", workout_json: "{}")]"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parameters["date"], "2024-05-01");
        assert_eq!(calls[0].parameters["workout_json"], "{}");
    }

    #[test]
    fn test_detect_multiple_in_order() {
        let text = "[TOOL_CALL: get_schedule] then [TOOL_CALL: delete_workout(date: \"today\")]";
        let names: Vec<_> = detect(text).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["get_schedule", "delete_workout"]);
    }

    #[test]
    fn test_partial_prefix_is_not_a_match() {
        assert!(detect("[TOOL_CALL:").is_empty());
        assert!(detect("[TOOL_CALL: plan_workout(date: \"today\"").is_empty());
        assert!(!contains_tool_call("[TOOL_CALL: plan_workout(date: \"today\")"));
    }

    #[test]
    fn test_could_become_tool_call() {
        assert!(could_become_tool_call("["));
        assert!(could_become_tool_call("[TOOL"));
        assert!(could_become_tool_call("[TOOL_CALL: plan"));
        assert!(could_become_tool_call("[TOOL_CALL: plan_workout(date: \"to"));
        assert!(!could_become_tool_call("[link]"));
        assert!(!could_become_tool_call("[TOOL_CALL: plan workout"));
    }

    #[test]
    fn test_strip_removes_every_call() {
        let text = "Sure.\n\n[TOOL_CALL: get_schedule]\n\n\n\nDone [TOOL_CALL: delete_workout(date: \"today\")]";
        let cleaned = strip_tool_calls(text);
        assert!(!contains_tool_call(&cleaned));
        assert_eq!(cleaned, "Sure.\n\nDone");
    }

    #[test]
    fn test_strip_collapses_seam_spaces() {
        assert_eq!(
            strip_tool_calls("Planned it [TOOL_CALL: get_schedule] for you."),
            "Planned it for you."
        );
    }

    #[test]
    fn test_strip_nested_calls() {
        assert_eq!(strip_tool_calls("[TOOL_CALL: a[TOOL_CALL: get_schedule]]"), "");
        assert_eq!(
            strip_tool_calls("Done. [TOOL_CALL: [TOOL_CALL: get_schedule] get_schedule] Bye."),
            "Done. Bye."
        );
    }

    #[test]
    fn test_strip_without_calls_only_normalizes() {
        assert_eq!(strip_tool_calls("  Easy run today.  \n"), "Easy run today.");
    }

    #[test]
    fn test_invocation_copies_parameters() {
        let call = first_tool_call("[TOOL_CALL: get_schedule(date: \"today\")]").unwrap();
        let invocation = call.invocation();
        assert_eq!(invocation.name, "get_schedule");
        assert_eq!(invocation.param("date"), Some("today"));
    }
}
