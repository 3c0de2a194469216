//! The three LLM-backed pipeline stages.
//!
//! Each stage owns its prompt construction and output post-processing; the
//! orchestrator in [`crate::pipeline`] sequences them and validates their
//! structural output.

mod clarification;
mod execution;
mod verdict;

pub use clarification::ClarificationStage;
pub use execution::ExecutionStage;
pub use verdict::VerdictStage;

/// Prompt language selected from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Zh,
}

/// Chinese when more than 20% of the input's characters fall in the CJK
/// Unified Ideographs range, English otherwise.
pub fn detect_language(input: &str) -> Lang {
    let total = input.chars().count();
    if total == 0 {
        return Lang::En;
    }
    let cjk = input
        .chars()
        .filter(|c| ('\u{4E00}'..='\u{9FFF}').contains(c))
        .count();
    if cjk as f64 / total as f64 > 0.2 {
        Lang::Zh
    } else {
        Lang::En
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_input() {
        assert_eq!(detect_language("Should I use Go or Python?"), Lang::En);
    }

    #[test]
    fn test_chinese_input() {
        assert_eq!(detect_language("我应该用哪个框架？"), Lang::Zh);
    }

    #[test]
    fn test_mostly_english_with_a_few_ideographs() {
        // 2 CJK chars out of ~40 stays under the 20% threshold.
        assert_eq!(
            detect_language("Please compare 框架 options for my web service"),
            Lang::En
        );
    }

    #[test]
    fn test_empty_input_defaults_to_english() {
        assert_eq!(detect_language(""), Lang::En);
    }
}
