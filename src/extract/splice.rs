//! Byte-range text edits applied in one pass.
//!
//! Both strategies rewrite the original text instead of regenerating it, so
//! formatting and comments outside the touched call sites survive untouched.

use std::ops::Range;

#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Collects edits against a source string and applies them in order.
///
/// Edits are ordered by `(start, end)`, so an insertion at an offset lands
/// before a replacement starting at that same offset. An edit overlapping an
/// earlier one is dropped.
#[derive(Debug)]
pub struct Splice<'s> {
    source: &'s str,
    edits: Vec<Edit>,
}

impl<'s> Splice<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            edits: Vec::new(),
        }
    }

    pub fn replace(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.edits.push(Edit {
            start: range.start,
            end: range.end,
            text: text.into(),
        });
    }

    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.replace(at..at, text);
    }

    pub fn remove(&mut self, range: Range<usize>) {
        self.replace(range, String::new());
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn apply(mut self) -> String {
        // stable: insertions at one offset keep registration order
        self.edits.sort_by_key(|e| (e.start, e.end));

        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        for edit in self.edits {
            if edit.start < cursor || edit.end > self.source.len() {
                crate::debug!("extract"; "dropping overlapping edit at {}..{}", edit.start, edit.end);
                continue;
            }
            out.push_str(&self.source[cursor..edit.start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&self.source[cursor..]);
        out
    }
}
