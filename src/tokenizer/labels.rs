//! Paragraph label tokenization and fixed-length encoding.

use std::sync::LazyLock;

use regex::Regex;

use super::vocab::ParagraphVocab;

pub const BLANK_TOKEN: &str = "<B>";
pub const START_TOKEN: &str = "<S>";
pub const END_TOKEN: &str = "<E>";
pub const PAD_TOKEN: &str = "<P>";
pub const NEW_LINE_TOKEN: &str = "\n";

pub const GARBAGE_TOKEN: &str = "<G>";
pub const UNDERLINE_TOKEN: &str = "<U>";
pub const ENGLISH_TOKEN: &str = "<ENG>";
pub const DEGREE_TOKEN: &str = "<DEG>";

/// Placeholder symbols kept as single tokens.
pub const PLACEHOLDER_TOKENS: [&str; 4] =
    [GARBAGE_TOKEN, UNDERLINE_TOKEN, ENGLISH_TOKEN, DEGREE_TOKEN];

/// Transcription escapes and the placeholder each one becomes.
pub const ESCAPE_SUBSTITUTIONS: [(&str, &str); 4] = [
    ("&garb", GARBAGE_TOKEN),
    ("&under", UNDERLINE_TOKEN),
    ("&eng", ENGLISH_TOKEN),
    ("&deg", DEGREE_TOKEN),
];

/// Whitespace runs, placeholders and runs of ordinary characters, tried in
/// that order. `<`, `G`, `U`, `E` and `>` outside a placeholder match nothing
/// and are dropped. The ASCII separators U+001C..U+001F count as whitespace.
static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\s\x1c-\x1f]+|<G>|<U>|<ENG>|<DEG>|[^\s\x1c-\x1f<GUE>]+")
        .expect("valid token regex")
});

pub fn substitute_escapes(text: &str) -> String {
    ESCAPE_SUBSTITUTIONS
        .iter()
        .fold(text.to_string(), |acc, (escape, token)| {
            acc.replace(escape, token)
        })
}

/// Split an already substituted string into tokens. Placeholders stay
/// whole; whitespace and character runs yield one token per character.
pub fn segment(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for found in TOKEN_PATTERN.find_iter(text) {
        let run = found.as_str();
        if PLACEHOLDER_TOKENS.contains(&run) {
            tokens.push(run);
        } else {
            tokens.extend(run.char_indices().map(|(idx, ch)| &run[idx..idx + ch.len_utf8()]));
        }
    }
    tokens
}

/// Full token sequence for one paragraph: start, segmented body, end.
pub fn tokenize_paragraph(text: &str) -> Vec<String> {
    let substituted = substitute_escapes(text);
    let body = segment(&substituted);

    let mut tokens = Vec::with_capacity(body.len() + 2);
    tokens.push(START_TOKEN.to_string());
    tokens.extend(body.into_iter().map(str::to_string));
    tokens.push(END_TOKEN.to_string());
    tokens
}

/// Encode each string into a row of exactly `length` ids.
///
/// Rows start filled with the pad id. Tokens missing from the vocabulary
/// encode as pad, and tokens past `length` are dropped.
pub fn convert_strings_to_labels<S: AsRef<str>>(
    strings: &[S],
    vocab: &ParagraphVocab,
    length: usize,
) -> Vec<Vec<u32>> {
    let pad = vocab.pad();
    strings
        .iter()
        .map(|string| {
            let mut row = vec![pad; length];
            for (slot, token) in row.iter_mut().zip(tokenize_paragraph(string.as_ref())) {
                *slot = vocab.index_of(&token).unwrap_or(pad);
            }
            row
        })
        .collect()
}
