//! Deterministic JSON extraction from free-form LLM responses.
//!
//! Resolution order:
//! 1. the first fenced block tagged `json`, when its body is valid JSON
//! 2. the first fenced block of any tag whose body is valid JSON
//! 3. the longest `{...}` substring that parses as JSON
//! 4. the longest `[...]` substring that parses as JSON

/// Extract the JSON payload from `response`, or `None` when no candidate
/// parses.
pub fn extract_json(response: &str) -> Option<String> {
    let blocks = fenced_blocks(response);

    if let Some((_, body)) = blocks
        .iter()
        .find(|(tag, _)| tag.eq_ignore_ascii_case("json"))
    {
        if is_valid_json(body) {
            return Some((*body).to_string());
        }
    }

    if let Some((_, body)) = blocks.iter().find(|(_, body)| is_valid_json(body)) {
        return Some((*body).to_string());
    }

    longest_delimited(response, '{', '}').or_else(|| longest_delimited(response, '[', ']'))
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(candidate).is_ok()
}

/// Collect `(tag, body)` pairs for every complete ``` fence in order.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut cursor = 0usize;
    while let Some(open) = text[cursor..].find("```") {
        let tag_start = cursor + open + 3;
        let Some(tag_end) = text[tag_start..].find('\n') else {
            break;
        };
        let tag = text[tag_start..tag_start + tag_end].trim();
        let body_start = tag_start + tag_end + 1;
        let Some(close) = text[body_start..].find("```") else {
            break;
        };
        let body = text[body_start..body_start + close].trim();
        blocks.push((tag, body));
        cursor = body_start + close + 3;
    }
    blocks
}

/// Longest substring starting at `open` and ending at `close` that parses as
/// JSON. Candidates are tried longest-first.
fn longest_delimited(text: &str, open: char, close: char) -> Option<String> {
    let starts: Vec<usize> = text
        .char_indices()
        .filter(|&(_, c)| c == open)
        .map(|(i, _)| i)
        .collect();
    let mut ends: Vec<usize> = text
        .char_indices()
        .filter(|&(_, c)| c == close)
        .map(|(i, _)| i)
        .collect();
    ends.reverse();

    for &start in &starts {
        for &end in &ends {
            if end <= start {
                break;
            }
            let candidate = &text[start..=end];
            if is_valid_json(candidate) {
                return Some(candidate.to_string());
            }
        }
    }
    None
}
