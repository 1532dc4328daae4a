//! Text splitting for services with length limits.

use std::sync::LazyLock;

use regex::Regex;

/// A clause: text up to and including its run of trailing punctuation.
static CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?;:,…\n]+[.!?;:,…\n]*|[.!?;:,…\n]+").expect("valid clause regex"));

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Prefers clause boundaries, then word boundaries, and only cuts inside a
/// word that is itself longer than `max_chars`. Chunks are trimmed and
/// never empty.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for clause in CLAUSE.find_iter(text).map(|m| m.as_str()) {
        if char_len(&current) + char_len(clause) <= max_chars {
            current.push_str(clause);
            continue;
        }
        flush(&mut current, &mut chunks);

        if char_len(clause) <= max_chars {
            current.push_str(clause);
            continue;
        }

        for word in clause.split_inclusive(char::is_whitespace) {
            if char_len(&current) + char_len(word) > max_chars {
                flush(&mut current, &mut chunks);
            }
            if char_len(word) > max_chars {
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_chars) {
                    current.extend(piece);
                    flush(&mut current, &mut chunks);
                }
                continue;
            }
            current.push_str(word);
        }
    }
    flush(&mut current, &mut chunks);

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

/// Truncate to `max` characters with an ellipsis, for log previews.
pub fn preview(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

fn flush(current: &mut String, chunks: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
