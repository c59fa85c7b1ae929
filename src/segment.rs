/// Sentence splitting boundary. The extraction pass only needs contiguous,
/// in-order slices of the normalized text and a word count per slice.
pub trait Segmenter {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str>;

    fn word_count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Rule-based splitter: breaks at newlines and after sentence punctuation
/// followed by whitespace, never inside `[[...]]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceSplitter;

impl Segmenter for SentenceSplitter {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut segments = Vec::new();
        let mut push = |piece: &'a str| {
            let piece = piece.trim();
            if !piece.is_empty() {
                segments.push(piece);
            }
        };

        let mut depth = 0usize;
        let mut start = 0;
        let mut chars = text.char_indices().peekable();
        while let Some((i, ch)) = chars.next() {
            match ch {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '\n' => {
                    push(&text[start..i]);
                    start = i + 1;
                    depth = 0;
                }
                '.' | '!' | '?' if depth == 0 => {
                    let at_break = chars.peek().is_some_and(|(_, next)| next.is_whitespace());
                    if at_break && !ends_with_initial(&text[start..i]) {
                        push(&text[start..i + 1]);
                        start = i + 1;
                    }
                }
                '。' | '！' | '？' if depth == 0 => {
                    let end = i + ch.len_utf8();
                    push(&text[start..end]);
                    start = end;
                }
                _ => {}
            }
        }
        push(&text[start..]);
        segments
    }
}

/// "J. R. R. Tolkien": a lone letter before the period is an initial.
fn ends_with_initial(before: &str) -> bool {
    let Some(word) = before.split_whitespace().last() else {
        return false;
    };
    let mut chars = word.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}
