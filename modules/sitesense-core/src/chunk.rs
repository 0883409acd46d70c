//! Deterministic text chunking for embedding.
//!
//! Splits page text into segments bounded by a token budget, preferring
//! sentence boundaries over hard cuts so each segment stays semantically
//! coherent. The token count is approximated at four characters per token,
//! which tracks the tokenizers used by the embedding models closely enough
//! for a size bound. Same input always yields the same segmentation.

/// Approximate characters per token.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into chunks of at most `max_tokens` (approximated) tokens.
///
/// Sentences are packed greedily into each chunk; a sentence that alone
/// exceeds the budget is split at word boundaries, and a single overlong
/// word is hard-cut as a last resort. Whitespace at segment boundaries is
/// normalized; no other content is dropped.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut buf = String::new();

    for sentence in split_sentences(text) {
        if sentence.len() > max_chars {
            if !buf.is_empty() {
                chunks.push(std::mem::take(&mut buf));
            }
            chunks.extend(split_words(sentence, max_chars));
            continue;
        }

        if !buf.is_empty() && buf.len() + 1 + sentence.len() > max_chars {
            chunks.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(sentence);
    }

    if !buf.is_empty() {
        chunks.push(buf);
    }
    chunks
}

/// Split text into sentences. A sentence ends at a run of `.`/`!`/`?`
/// followed by a space or end of line; newlines always terminate.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let bytes = line.as_bytes();
        let mut start = 0;
        let mut i = 0;
        while i < bytes.len() {
            if matches!(bytes[i], b'.' | b'!' | b'?') {
                let mut end = i + 1;
                while end < bytes.len() && matches!(bytes[end], b'.' | b'!' | b'?') {
                    end += 1;
                }
                if end >= bytes.len() || bytes[end] == b' ' {
                    out.push(line[start..end].trim());
                    i = end;
                    while i < bytes.len() && bytes[i] == b' ' {
                        i += 1;
                    }
                    start = i;
                    continue;
                }
                i = end;
            } else {
                i += 1;
            }
        }
        if start < line.len() {
            out.push(line[start..].trim());
        }
    }
    out.retain(|s| !s.is_empty());
    out
}

/// Word-boundary split for a sentence that exceeds the chunk budget.
fn split_words(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();

    for word in sentence.split_whitespace() {
        if word.len() > max_chars {
            if !buf.is_empty() {
                out.push(std::mem::take(&mut buf));
            }
            let mut rest = word;
            while rest.len() > max_chars {
                let mut cut = max_chars;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                out.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            buf.push_str(rest);
            continue;
        }

        if !buf.is_empty() && buf.len() + 1 + word.len() > max_chars {
            out.push(std::mem::take(&mut buf));
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(word);
    }

    if !buf.is_empty() {
        out.push(buf);
    }
    out
}
