//! Splits narration text into units the remote synthesis service accepts.
//!
//! Paragraphs (blank-line separated) are the preferred boundary. A paragraph
//! longer than the per-unit ceiling is broken into sentences, and a sentence
//! that is still too long is broken on whitespace. The resulting segments are
//! then packed, in order, into as few units as `max_units` asks for, using the
//! smallest per-unit capacity that achieves it, so the units come out balanced
//! instead of front-loaded.

use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on parallel synthesis calls per job
pub const DEFAULT_MAX_UNITS: usize = 4;

/// Remote synthesis rejects requests above 3000 characters; keep a margin
pub const DEFAULT_MAX_UNIT_CHARS: usize = 2900;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub max_units: usize,
    pub max_unit_chars: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            max_units: DEFAULT_MAX_UNITS,
            max_unit_chars: DEFAULT_MAX_UNIT_CHARS,
        }
    }
}

/// How a segment attaches to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joint {
    Paragraph,
    Sentence,
    /// Continues a word cut by characters
    WordPiece,
}

#[derive(Debug, Clone)]
struct Segment {
    text: String,
    chars: usize,
    joint: Joint,
}

impl Segment {
    fn new(text: String, joint: Joint) -> Self {
        let chars = char_len(&text);
        Self { text, chars, joint }
    }

    fn separator(&self) -> &'static str {
        match self.joint {
            Joint::Paragraph => PARAGRAPH_SEPARATOR,
            Joint::Sentence => SENTENCE_SEPARATOR,
            Joint::WordPiece => "",
        }
    }
}

/// Split narration text into ordered units.
///
/// Empty or whitespace-only text yields no units. No unit ever exceeds
/// `limits.max_unit_chars` characters; the unit count exceeds
/// `limits.max_units` only when the text cannot fit otherwise.
pub fn chunk_text(text: &str, limits: ChunkLimits) -> Vec<String> {
    let max_unit_chars = limits.max_unit_chars.max(1);
    let max_units = limits.max_units.max(1);

    let segments = segment(text, max_unit_chars);
    if segments.is_empty() {
        return Vec::new();
    }

    let capacity = balanced_capacity(&segments, max_units, max_unit_chars);
    let units = pack(&segments, capacity);

    tracing::debug!(
        text_length = text.len(),
        segment_count = segments.len(),
        unit_count = units.len(),
        unit_capacity = capacity,
        "Narration text chunked"
    );

    units
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn paragraph_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").expect("paragraph pattern is valid"))
}

fn sentence_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("sentence pattern is valid"))
}

fn segment(text: &str, max_unit_chars: usize) -> Vec<Segment> {
    let mut segments = Vec::new();

    for paragraph in paragraph_pattern().split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if char_len(paragraph) <= max_unit_chars {
            segments.push(Segment::new(paragraph.to_string(), Joint::Paragraph));
            continue;
        }

        let mut first = true;
        for sentence in split_into_sentences(paragraph) {
            let pieces = if char_len(&sentence) <= max_unit_chars {
                vec![(sentence, Joint::Sentence)]
            } else {
                split_long_sentence(&sentence, max_unit_chars)
            };
            for (piece, joint) in pieces {
                let joint = if first { Joint::Paragraph } else { joint };
                segments.push(Segment::new(piece, joint));
                first = false;
            }
        }
    }

    segments
}

/// Split on sentence-ending punctuation, keeping the punctuation
fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for mat in sentence_pattern().find_iter(text) {
        let sentence = text[last_end..mat.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        last_end = mat.end();
    }

    if last_end < text.len() {
        let remaining = text[last_end..].trim();
        if !remaining.is_empty() {
            sentences.push(remaining.to_string());
        }
    }

    sentences
}

/// Break a sentence with no usable punctuation on whitespace; words longer
/// than the limit are cut by characters
fn split_long_sentence(sentence: &str, max_unit_chars: usize) -> Vec<(String, Joint)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in sentence.split_whitespace() {
        let word_len = char_len(word);

        if word_len > max_unit_chars {
            if !current.is_empty() {
                pieces.push((std::mem::take(&mut current), Joint::Sentence));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for (i, chunk) in chars.chunks(max_unit_chars).enumerate() {
                let joint = if i == 0 { Joint::Sentence } else { Joint::WordPiece };
                pieces.push((chunk.iter().collect(), joint));
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_unit_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            pieces.push((
                std::mem::replace(&mut current, word.to_string()),
                Joint::Sentence,
            ));
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        pieces.push((current, Joint::Sentence));
    }

    pieces
}

/// Number of units greedy packing produces at the given capacity
fn count_units(segments: &[Segment], capacity: usize) -> usize {
    let mut units = 0;
    let mut current_len: Option<usize> = None;

    for seg in segments {
        current_len = match current_len {
            None => Some(seg.chars),
            Some(len) if len + seg.separator().len() + seg.chars <= capacity => {
                Some(len + seg.separator().len() + seg.chars)
            }
            Some(_) => {
                units += 1;
                Some(seg.chars)
            }
        };
    }

    if current_len.is_some() {
        units += 1;
    }
    units
}

/// Smallest capacity (never above the ceiling) whose greedy packing stays
/// within `max_units`; the ceiling itself when the text needs more units
fn balanced_capacity(segments: &[Segment], max_units: usize, max_unit_chars: usize) -> usize {
    if count_units(segments, max_unit_chars) > max_units {
        return max_unit_chars;
    }

    let mut low = segments
        .iter()
        .map(|seg| seg.chars)
        .max()
        .unwrap_or(1)
        .min(max_unit_chars);
    let mut high = max_unit_chars;

    while low < high {
        let mid = low + (high - low) / 2;
        if count_units(segments, mid) <= max_units {
            high = mid;
        } else {
            low = mid + 1;
        }
    }

    high
}

fn pack(segments: &[Segment], capacity: usize) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for seg in segments {
        if current.is_empty() {
            current.push_str(&seg.text);
            current_len = seg.chars;
            continue;
        }

        let separator = seg.separator();
        if current_len + separator.len() + seg.chars <= capacity {
            current.push_str(separator);
            current.push_str(&seg.text);
            current_len += separator.len() + seg.chars;
        } else {
            units.push(std::mem::replace(&mut current, seg.text.clone()));
            current_len = seg.chars;
        }
    }

    if !current.is_empty() {
        units.push(current);
    }

    units
}
