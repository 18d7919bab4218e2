//! JSON extraction from completion text.
//!
//! Models asked for "JSON only" still wrap their answer in markdown fences or
//! prepend a sentence of prose. Extraction tries, in order:
//! 1. A ```json fenced block
//! 2. Any other fenced block containing an object
//! 3. The whole text, when it starts with '{' or '['
//! 4. The largest balanced object anywhere in the text (later wins on ties)
//!
//! Truncated JSON is reported as such and never repaired.
//!
//! ```
//! use compliance_ai::utils::json_extraction::try_extract_json;
//!
//! let result = try_extract_json("Sure: {\"key_requirements\": []}");
//! assert_eq!(result.json(), Some("{\"key_requirements\": []}"));
//! ```

use std::sync::OnceLock;

use regex::Regex;

/// Outcome of an extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// A syntactically valid JSON document.
    Success(String),
    /// JSON started but never closed.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
        unclosed_brackets: usize,
    },
    /// Nothing JSON-like in the text.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }
}

/// Open/close depth after scanning a string, ignoring delimiters in literals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Depths {
    braces: isize,
    brackets: isize,
    in_string: bool,
    first_open: Option<usize>,
}

fn scan(s: &str) -> Depths {
    let mut depths = Depths::default();
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if depths.in_string => escape_next = true,
            '"' => depths.in_string = !depths.in_string,
            '{' | '[' if !depths.in_string => {
                depths.first_open.get_or_insert(i);
                if c == '{' {
                    depths.braces += 1;
                } else {
                    depths.brackets += 1;
                }
            }
            '}' if !depths.in_string => depths.braces -= 1,
            ']' if !depths.in_string => depths.brackets -= 1,
            _ => {}
        }
    }

    depths
}

/// Byte index of the delimiter closing the one `s` starts with.
///
/// `s` must start with `open`. String literals and escapes are respected.
pub fn find_closing(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

fn fenced_block_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"```([A-Za-z0-9_-]*)[ \t]*\r?\n?([\s\S]*?)```").ok())
        .as_ref()
}

/// Content of fenced code blocks, `json`-tagged blocks first.
fn fenced_blocks(content: &str) -> Vec<&str> {
    let mut tagged = Vec::new();
    let mut other = Vec::new();

    let Some(fence) = fenced_block_regex() else {
        return tagged;
    };

    for caps in fence.captures_iter(content) {
        let Some(body) = caps.get(2) else { continue };
        let lang = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if lang.eq_ignore_ascii_case("json") {
            tagged.push(body.as_str().trim());
        } else {
            other.push(body.as_str().trim());
        }
    }

    tagged.extend(other);
    tagged
}

/// Largest valid object in `content`; the later one wins on equal size.
fn largest_object(content: &str) -> Option<&str> {
    let mut best: Option<&str> = None;

    for (start, _) in content.char_indices().filter(|(_, c)| *c == '{') {
        let tail = &content[start..];
        let Some(end) = find_closing(tail, '{', '}') else {
            continue;
        };
        let candidate = &tail[..=end];
        if !is_valid_json(candidate) {
            continue;
        }
        if best.map_or(true, |b| candidate.len() >= b.len()) {
            best = Some(candidate);
        }
    }

    best
}

fn whole_document(trimmed: &str) -> Option<&str> {
    let (open, close) = match trimmed.chars().next()? {
        '{' => ('{', '}'),
        '[' => ('[', ']'),
        _ => return None,
    };
    let end = find_closing(trimmed, open, close)?;
    let candidate = &trimmed[..=end];
    is_valid_json(candidate).then_some(candidate)
}

/// Extracts a JSON document from completion text.
pub fn try_extract_json(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    for block in fenced_blocks(trimmed) {
        if let Some(json) = whole_document(block).or_else(|| largest_object(block)) {
            return JsonExtractionResult::Success(json.to_string());
        }
    }

    if let Some(json) = whole_document(trimmed).or_else(|| largest_object(trimmed)) {
        return JsonExtractionResult::Success(json.to_string());
    }

    let depths = scan(trimmed);
    if let Some(start) = depths.first_open {
        if depths.braces > 0 || depths.brackets > 0 || depths.in_string {
            return JsonExtractionResult::Truncated {
                partial_json: trimmed[start..].to_string(),
                unclosed_braces: depths.braces.max(0) as usize,
                unclosed_brackets: depths.brackets.max(0) as usize,
            };
        }
    }

    JsonExtractionResult::NotFound
}
