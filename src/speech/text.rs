//! Text normalization and sentence-aligned chunking.
//!
//! Lesson text arrives decorated for the screen (emoji, stars, bullets);
//! none of that should reach the synthesis endpoints. Chunking keeps each
//! network request and playback unit small while never splitting inside a
//! sentence, so intonation stays natural.

/// Decorative symbols stripped before synthesis, on top of the
/// pictographic ranges below.
const DECORATIVE: &[char] = &[
    '★', '☆', '✦', '✧', '♥', '♡', '♦', '♣', '♠', '•', '·', '▪', '◦', '✓', '✔', '✗', '✘', '❀',
    '❁', '❖', '※',
];

fn is_pictographic(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF   // emoji, emoticons, transport, supplemental symbols
        | 0x2600..=0x27BF   // misc symbols and dingbats
        | 0x2B00..=0x2BFF   // misc symbols and arrows
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero width joiner
        | 0x20E3 // combining enclosing keycap
    )
}

/// Strip emoji and decorative symbols, collapse whitespace runs to single
/// spaces, trim. Side-effect free.
pub fn normalize(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !is_pictographic(*c) && !DECORATIVE.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into sentence-aligned chunks of at most `max_chars`
/// characters (counted in chars, not bytes; the app's lesson text is
/// Vietnamese).
///
/// Sentences are split on `.` `!` `?` and greedily packed in order. A
/// sentence is never split: one that alone exceeds `max_chars` is emitted
/// verbatim as its own chunk. Text without any terminator comes back as a
/// single chunk.
pub fn chunk(text: &str, max_chars: usize) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let sentences: Vec<&str> = trimmed
        .split_inclusive(&['.', '!', '?'][..])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if sentences.is_empty() {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sentence_len = sentence.chars().count();
        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
            continue;
        }
        // +1 for the joining space
        if current_len + 1 + sentence_len <= max_chars {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
