//!
//! Model-independent cleanup of reasoning ("think") annotations.
//!
//! Runs after a family converter has removed its own markup. Empty think spans
//! and unbalanced think tags are always removed; think spans with content are
//! removed only when configured to.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::LazyLock;

use regex::Regex;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Think-tag sanitizer shared by all converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentSanitizer {
    /** whether think spans with content are removed */
    remove_think_tags: bool,
}

/* --- constants ------------------------------------------------------------------------------ */

const THINK_OPEN: &str = "<think>";

static EMPTY_THINK_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<think>\s*</think>").expect("valid regex"));

static THINK_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static THINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?think>").expect("valid regex"));

/* --- start of code -------------------------------------------------------------------------- */

impl ContentSanitizer {
    ///
    /// Create a sanitizer.
    ///
    /// # Arguments
    ///  * `remove_think_tags` - also drop think spans that carry reasoning text
    pub fn new(remove_think_tags: bool) -> Self {
        Self { remove_think_tags }
    }

    pub fn removes_think_tags(&self) -> bool {
        self.remove_think_tags
    }

    ///
    /// Apply think-tag cleanup to already de-marked content.
    ///
    /// Idempotent: `sanitize(sanitize(s)) == sanitize(s)`.
    pub fn sanitize(&self, content: &str) -> String {
        if !content.contains("think>") {
            return content.to_string();
        }

        // every pass only deletes text, so this terminates
        let mut text = content.to_string();
        loop {
            let next = self.single_pass(&text);
            if next == text {
                return text;
            }
            text = next;
        }
    }

    fn single_pass(&self, content: &str) -> String {
        let mut text = remove_empty_think_spans(content);
        if self.remove_think_tags {
            text = THINK_SPAN.replace_all(&text, "").into_owned();
        }
        remove_orphaned_think_tags(&text)
    }
}

impl Default for ContentSanitizer {
    fn default() -> Self {
        Self::new(true)
    }
}

///
/// Remove `<think></think>` spans with whitespace-only interior.
fn remove_empty_think_spans(content: &str) -> String {
    EMPTY_THINK_SPAN.replace_all(content, "").into_owned()
}

///
/// Remove think tags that have no partner.
///
/// Closers pair with the nearest unmatched opener before them. Unpaired
/// closers and unpaired openers are deleted; the text around them is kept.
fn remove_orphaned_think_tags(content: &str) -> String {
    let tags: Vec<(usize, usize, bool)> = THINK_TAG
        .find_iter(content)
        .map(|m| (m.start(), m.end(), m.as_str() == THINK_OPEN))
        .collect();

    let mut open_stack: Vec<usize> = Vec::new();
    let mut orphaned: Vec<usize> = Vec::new();
    for (index, &(_, _, is_open)) in tags.iter().enumerate() {
        if is_open {
            open_stack.push(index);
        } else if open_stack.pop().is_none() {
            orphaned.push(index);
        }
    }
    orphaned.extend(open_stack);

    if orphaned.is_empty() {
        return content.to_string();
    }
    orphaned.sort_unstable();

    let mut result = String::with_capacity(content.len());
    let mut cursor = 0;
    for index in orphaned {
        let (start, end, _) = tags[index];
        result.push_str(&content[cursor..start]);
        cursor = end;
    }
    result.push_str(&content[cursor..]);
    result
}

/* --- tests ----------------------------------------------------------------------------------- */
