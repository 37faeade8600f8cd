//! Sentence splitting
//!
//! Splits extracted document text into an ordered sequence of sentences. Every
//! sentence is a verbatim slice of the input and keeps its own trailing
//! punctuation and whitespace, so concatenating the sentences in order gives
//! back the input unchanged.

use crate::config::SplitterKind;
use crate::error::{PipelineError, Result};
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Deterministic sentence splitter
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    kind: SplitterKind,
    terminator_regex: Regex,
}

impl SentenceSplitter {
    /// Create a splitter using the given boundary rule
    pub fn new(kind: SplitterKind) -> Result<Self> {
        let terminator_regex = Regex::new(r"[.!?]+\s+").map_err(|e| {
            PipelineError::TextProcessing(format!("Failed to compile sentence regex: {}", e))
        })?;

        Ok(Self {
            kind,
            terminator_regex,
        })
    }

    pub fn kind(&self) -> SplitterKind {
        self.kind
    }

    /// Split text into sentences, in source order.
    ///
    /// Empty or whitespace-only text yields no sentences.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let ends: Vec<usize> = match self.kind {
            SplitterKind::Unicode => text
                .split_sentence_bound_indices()
                .map(|(start, sentence)| start + sentence.len())
                .collect(),
            SplitterKind::Punctuation => self
                .terminator_regex
                .find_iter(text)
                .map(|m| m.end())
                .chain(std::iter::once(text.len()))
                .collect(),
        };

        collect_segments(text, &ends)
    }

    /// Split raw bytes, rejecting anything that is not UTF-8 text
    pub fn split_bytes<'a>(&self, bytes: &'a [u8]) -> Result<Vec<&'a str>> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            PipelineError::InvalidArgument(format!("input is not valid UTF-8 text: {}", e))
        })?;
        Ok(self.split(text))
    }
}

/// Turn segment end offsets into slices. Empty segments are skipped and
/// whitespace-only segments are folded into their neighbour so no text is lost
/// and no sentence is blank.
fn collect_segments<'a>(text: &'a str, ends: &[usize]) -> Vec<&'a str> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut pending_start: Option<usize> = None;

    for &end in ends {
        if end <= start {
            continue;
        }

        if text[start..end].trim().is_empty() {
            match ranges.last_mut() {
                Some(last) => last.1 = end,
                None => {
                    pending_start.get_or_insert(start);
                }
            }
        } else {
            ranges.push((pending_start.take().unwrap_or(start), end));
        }

        start = end;
    }

    ranges.into_iter().map(|(from, to)| &text[from..to]).collect()
}
