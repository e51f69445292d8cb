//! Heuristic source analysis.
//!
//! The analyzer works on raw text with a handful of regular expressions.
//! It estimates cyclomatic complexity, pulls out function names for test
//! matching, and flags spans that look like pasted AI output. None of it
//! is a parser; the results are good enough for dashboards, not for
//! correctness decisions.

use crate::error::{CoreError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Tool name recorded when nothing better is known.
pub const DEFAULT_AI_TOOL: &str = "Copilot";

/// Minimum number of lines for an insertion to count as AI output.
pub const MIN_AI_BLOCK_LINES: u32 = 3;

/// Confidence is accumulated in hundredths to keep the threshold exact.
const BASE_CONFIDENCE: u32 = 50;
const MAX_CONFIDENCE: u32 = 95;
const CONFIDENCE_THRESHOLD: u32 = 60;

/// Identifiers that the method pattern picks up but are not functions.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "else", "do", "try",
];

/// A span detected as likely AI-generated by [`Analyzer::detect_ai_blocks`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBlock {
    /// 0-based, inclusive.
    pub start_line: u32,
    /// 0-based, inclusive.
    pub end_line: u32,
    pub content: String,
    /// In `0.0..=0.95`.
    pub confidence: f64,
}

/// Regex-based code analyzer.
///
/// Patterns are compiled once in [`Analyzer::new`]; keep one analyzer
/// around rather than building one per file.
#[derive(Debug, Clone)]
pub struct Analyzer {
    decision_points: Regex,
    function_decl: Regex,
    method_decl: Regex,
    arrow_decl: Regex,
    definition: Regex,
    arrow_assignment: Regex,
    inline_return: Regex,
}

impl Analyzer {
    /// Compiles the analyzer's patterns.
    pub fn new() -> Result<Self> {
        Ok(Self {
            decision_points: Regex::new(
                r"\belse\s+if\b|\bif\b|\bwhile\b|\bfor\b|\bcase\b|\bcatch\b|\bfinally\b|\bswitch\b",
            )?,
            function_decl: Regex::new(
                r"\b(?:function|fn|def)\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*\(",
            )?,
            method_decl: Regex::new(r"([A-Za-z_$][A-Za-z0-9_$]*)\s*\([^)]*\)\s*\{")?,
            arrow_decl: Regex::new(
                r"\bconst\s+([A-Za-z_$][A-Za-z0-9_$]*)\s*=\s*(?:async\s*)?(?:\([^)]*\)|\w+)\s*=>",
            )?,
            definition: Regex::new(
                r"\b(?:function|fn|def)\s+\w+\s*\(|\bclass\s+\w+|\b(?:const|let)\s+\w+\s*=\s*(?:async\s*)?\(",
            )?,
            arrow_assignment: Regex::new(r"const \w+ = \(")?,
            inline_return: Regex::new(r"\{\s*return ")?,
        })
    }

    /// Estimates cyclomatic complexity: one plus the number of decision
    /// points. Always at least 1.
    pub fn calculate_complexity(&self, code: &str) -> u32 {
        let keywords = self.decision_points.find_iter(code).count();
        let logical = code.matches("&&").count() + code.matches("||").count();
        let ternaries = count_ternaries(code);

        1 + (keywords + logical + ternaries) as u32
    }

    /// Extracts function names declared in `code`, in order of pattern
    /// (declarations, methods, arrow functions), without duplicates.
    pub fn extract_function_names(&self, code: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        let captures = self
            .function_decl
            .captures_iter(code)
            .chain(self.method_decl.captures_iter(code))
            .chain(self.arrow_decl.captures_iter(code));

        for caps in captures {
            if let Some(name) = caps.get(1).map(|m| m.as_str()) {
                if CONTROL_KEYWORDS.contains(&name) {
                    continue;
                }
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        names
    }

    /// Returns true if an inserted span looks like AI output: at least
    /// [`MIN_AI_BLOCK_LINES`] lines and at least one definition.
    pub fn is_likely_ai_generated(&self, start_line: u32, end_line: u32, content: &str) -> bool {
        let line_count = end_line.saturating_sub(start_line) + 1;
        line_count >= MIN_AI_BLOCK_LINES && self.definition.is_match(content)
    }

    /// Scans a whole file for blocks that look AI-generated.
    ///
    /// A block opens on a line that starts a function or class and closes
    /// on a line that is just `}` or `end`. Blank lines are skipped. Only
    /// blocks scoring above 0.6 are returned.
    pub fn detect_ai_blocks(&self, content: &str) -> Vec<DetectedBlock> {
        let mut blocks = Vec::new();
        let mut open: Option<(u32, String)> = None;

        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let line_no = i as u32;

            if open.is_none() {
                if self.opens_block(line) {
                    open = Some((line_no, line.to_string()));
                }
                continue;
            }

            let Some((_, text)) = open.as_mut() else {
                continue;
            };

            text.push('\n');
            text.push_str(line);

            if trimmed != "}" && trimmed != "end" {
                continue;
            }

            if let Some((start, text)) = open.take() {
                let score = self.confidence_score(&text);
                if score <= CONFIDENCE_THRESHOLD {
                    debug!("Skipping block at lines {}-{} (score {})", start, line_no, score);
                } else {
                    blocks.push(DetectedBlock {
                        start_line: start,
                        end_line: line_no,
                        content: text,
                        confidence: f64::from(score) / 100.0,
                    });
                }
            }
        }

        blocks
    }

    /// Best guess at which assistant produced `content`.
    pub fn guess_ai_tool(&self, _content: &str) -> &'static str {
        DEFAULT_AI_TOOL
    }

    /// Returns true if `function_name` appears as a whole word in a test.
    pub fn test_covers_function(&self, test_content: &str, function_name: &str) -> Result<bool> {
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(function_name)))?;
        Ok(pattern.is_match(test_content))
    }

    /// Reads a source file as UTF-8.
    pub fn read_source(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| CoreError::io(path, e))
    }

    fn opens_block(&self, line: &str) -> bool {
        line.contains("function ")
            || line.contains("class ")
            || line.contains(" = function")
            || line.contains(" = (")
            || self.arrow_assignment.is_match(line)
    }

    fn confidence_score(&self, content: &str) -> u32 {
        let mut score = BASE_CONFIDENCE;

        if content.len() > 500 {
            score += 10;
        }
        if content.len() > 1000 {
            score += 10;
        }
        if content.contains("try") && content.contains("catch") {
            score += 5;
        }
        if content.matches("// ").count() > 2 {
            score += 5;
        }
        if content.contains("async") && content.contains("await") {
            score += 5;
        }
        if content.contains("forEach") || content.contains("map") || content.contains("reduce") {
            score += 5;
        }
        if self.inline_return.is_match(content) {
            score += 5;
        }
        if self.arrow_assignment.is_match(content) {
            score += 5;
        }

        score.min(MAX_CONFIDENCE)
    }
}

/// Returns lines `start..=end` of `source` joined with `\n`, or `None` if
/// the span runs past the end of the text.
pub fn extract_span(source: &str, start_line: u32, end_line: u32) -> Option<String> {
    if end_line < start_line {
        return None;
    }
    let lines: Vec<&str> = source.lines().collect();
    let span = lines.get(start_line as usize..=end_line as usize)?;
    Some(span.join("\n"))
}

/// Counts `?` used as a ternary, ignoring `?.` and `??`.
fn count_ternaries(code: &str) -> usize {
    let bytes = code.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|&(i, &b)| {
            if b != b'?' {
                return false;
            }
            let prev = if i > 0 { bytes[i - 1] } else { 0 };
            let next = bytes.get(i + 1).copied().unwrap_or(0);
            prev != b'?' && next != b'?' && next != b'.'
        })
        .count()
}
