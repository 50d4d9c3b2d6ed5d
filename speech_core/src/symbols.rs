//! Phonetic symbol vocabulary and chunking.
//!
//! Turns already-transcribed phonetic text into index sequences the step
//! model understands, split into chunks of at most [`MAX_N`](crate::model::MAX_N)
//! symbols.

use crate::error::{Result, SynthesisError};

/// Padding symbol, index 0. Phoneme buffers are right-padded with it.
pub const PAD: char = 'P';
/// End-of-utterance marker, index 1.
pub const END: char = 'E';

/// Every symbol the model was trained on, in index order.
pub const VOCABULARY: [char; 43] = [
    'P', 'E', ' ', 'ա', 'բ', 'գ', 'դ', 'զ', 'է', 'ը', 'թ', 'ժ', 'ի', 'լ', 'խ', 'ծ', 'կ', 'հ',
    'ձ', 'ղ', 'ճ', 'մ', 'յ', 'ն', 'շ', 'չ', 'պ', 'ջ', 'ռ', 'ս', 'վ', 'տ', 'ր', 'ց', 'ւ', 'փ',
    'ք', 'օ', 'ֆ', ',', '՞', '՜', '՝',
];

/// Index of `c` in [`VOCABULARY`].
pub fn symbol_index(c: char) -> Result<u32> {
    VOCABULARY
        .iter()
        .position(|&v| v == c)
        .map(|i| i as u32)
        .ok_or_else(|| {
            SynthesisError::validation(format!(
                "character {c:?} (U+{:04X}) is not in the vocabulary",
                c as u32
            ))
        })
}

/// Map every character of `text` to its vocabulary index.
pub fn encode(text: &str) -> Result<Vec<u32>> {
    text.chars().map(symbol_index).collect()
}

/// Append the end marker, split into chunks of at most `max_n` symbols and
/// encode each chunk.
pub fn encode_utterance(text: &str, max_n: usize) -> Result<Vec<Vec<u32>>> {
    let mut marked = String::with_capacity(text.len() + 1);
    marked.push_str(text);
    marked.push(END);
    split_into_chunks(&marked, max_n)
        .iter()
        .map(|chunk| encode(chunk))
        .collect()
}

/// Split `text` into chunks of at most `max_n` characters.
///
/// Cuts go at the last space inside each `max_n`-character window, or
/// straight at `max_n` when the window has no space. The space at a cut is
/// dropped, and so is one leading or trailing space on every chunk.
pub fn split_into_chunks(text: &str, max_n: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_n || max_n == 0 {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while chars.len() - start > max_n {
        let window = &chars[start..start + max_n];
        // A space at offset 0 would give an empty chunk
        let cut = window
            .iter()
            .rposition(|&c| c == ' ')
            .filter(|&offset| offset > 0);

        let (chunk, next) = match cut {
            Some(offset) => (&window[..offset], start + offset + 1),
            None => (window, start + max_n),
        };
        push_trimmed(&mut chunks, chunk);
        start = next;
    }
    // Add the remaining part
    push_trimmed(&mut chunks, &chars[start..]);
    chunks
}

/// Skip one leading and one trailing space; drop the chunk if nothing is left.
fn push_trimmed(chunks: &mut Vec<String>, mut chunk: &[char]) {
    if let Some((' ', rest)) = chunk.split_first() {
        chunk = rest;
    }
    if let Some((' ', rest)) = chunk.split_last() {
        chunk = rest;
    }
    if !chunk.is_empty() {
        chunks.push(chunk.iter().collect());
    }
}
