//! Deterministic file names derived from document symbols.

use crate::error::{GdocError, Result};

/// Characters that cannot appear in a stored file name, and their stand-ins.
const TRANSLATION: [(char, char); 7] = [
    (' ', '_'),
    ('/', '_'),
    ('[', '^'),
    (']', '^'),
    ('*', '!'),
    (':', '#'),
    (';', '%'),
];

fn sanitize(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| {
            TRANSLATION
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}

/// `A/RES/1` + `EN` + `pdf` → `A_RES_1-EN.pdf`. Several symbols are joined
/// with `&`. The language must be a two-letter tag.
pub fn encode_filename(symbols: &[&str], language: &str, extension: &str) -> Result<String> {
    if language.len() != 2 || !language.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(GdocError::UnknownLanguage(language.to_string()));
    }
    let joined = symbols
        .iter()
        .map(|s| sanitize(s))
        .collect::<Vec<_>>()
        .join("&");
    Ok(format!(
        "{}-{}.{}",
        joined,
        language.to_ascii_uppercase(),
        extension
    ))
}
