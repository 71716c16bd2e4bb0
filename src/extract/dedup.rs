//! Whole-text deduplication passes run after the walk

use super::context::{fingerprint, normalize};
use std::collections::HashSet;

/// Drops every paragraph whose normalized form occurred earlier
///
/// Paragraphs are separated by blank lines outside fenced code.
pub fn dedup_paragraphs(text: &str) -> String {
    let mut seen = HashSet::new();
    split_paragraphs(text)
        .into_iter()
        .filter(|paragraph| seen.insert(fingerprint(paragraph)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drops every line whose normalized form equals an already-kept line
///
/// Lines whose normalized form is shorter than `min_len` are formatting and
/// always kept, as are code fences and table separator rows. Runs of blank
/// lines left behind are collapsed to one, except inside fenced code.
pub fn dedup_lines(text: &str, min_len: usize) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        let normalized = normalize(line);

        if normalized.is_empty() {
            if !in_fence && out.last().is_some_and(|last| last.trim().is_empty()) {
                continue;
            }
            out.push(if in_fence { line } else { "" });
            continue;
        }
        if is_fence(line) {
            in_fence = !in_fence;
        }

        if is_formatting_line(&normalized, min_len) || seen.insert(normalized) {
            out.push(line);
        } else {
            tracing::trace!("Dropped duplicate line: {}", line.trim());
        }
    }

    out.join("\n").trim_matches('\n').to_string()
}

/// Splits text into blocks on blank lines, keeping fenced code whole
pub fn split_blocks(text: &str) -> Vec<String> {
    split_paragraphs(text)
        .into_iter()
        .map(|block| block.trim_matches('\n').to_string())
        .collect()
}

/// Non-empty paragraphs; a blank line inside a ``` fence does not end one
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
        }
        if line.trim().is_empty() && !in_fence {
            push_paragraph(&mut paragraphs, &mut current);
        } else {
            current.push(line);
        }
    }
    push_paragraph(&mut paragraphs, &mut current);

    paragraphs
}

fn push_paragraph(paragraphs: &mut Vec<String>, current: &mut Vec<&str>) {
    let paragraph = current.join("\n");
    current.clear();
    if !paragraph.trim().is_empty() {
        paragraphs.push(paragraph);
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_formatting_line(normalized: &str, min_len: usize) -> bool {
    normalized.chars().count() < min_len
        || normalized.starts_with("```")
        || normalized.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}
