// src/sanitizer.rs
//! Text hardening for anything that ends up in front of a human: strips
//! invisible code points, folds look-alike characters for comparison and
//! defangs URL-like spans.

use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

/// Issues detected while sanitizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SanitizeFlag {
    InvisibleStripped,
    ControlStripped,
    Homograph,
    UrlDefanged,
    DecodeError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizationResult {
    pub cleaned: String,
    pub was_modified: bool,
    pub flags: BTreeSet<SanitizeFlag>,
    /// Lowercased ASCII skeletons of every URL/domain span found
    pub links: Vec<String>,
}

impl SanitizationResult {
    pub fn has(&self, flag: SanitizeFlag) -> bool {
        self.flags.contains(&flag)
    }

    fn decode_error() -> Self {
        Self {
            cleaned: String::new(),
            was_modified: true,
            flags: BTreeSet::from([SanitizeFlag::DecodeError]),
            links: Vec::new(),
        }
    }
}

/// Cyrillic and Greek letters that render like Latin ones.
const CONFUSABLE_PAIRS: &[(char, char)] = &[
    ('а', 'a'), ('в', 'b'), ('с', 'c'), ('ԁ', 'd'), ('е', 'e'), ('һ', 'h'),
    ('і', 'i'), ('ј', 'j'), ('к', 'k'), ('ӏ', 'l'), ('м', 'm'), ('н', 'h'),
    ('о', 'o'), ('р', 'p'), ('ԛ', 'q'), ('ѕ', 's'), ('т', 't'), ('ս', 'u'),
    ('ѵ', 'v'), ('ԝ', 'w'), ('х', 'x'), ('у', 'y'), ('А', 'A'), ('В', 'B'),
    ('С', 'C'), ('Е', 'E'), ('Н', 'H'), ('І', 'I'), ('Ј', 'J'), ('К', 'K'),
    ('М', 'M'), ('О', 'O'), ('Р', 'P'), ('Ѕ', 'S'), ('Т', 'T'), ('Х', 'X'),
    ('У', 'Y'), ('α', 'a'), ('ε', 'e'), ('ι', 'i'), ('κ', 'k'), ('ν', 'v'),
    ('ο', 'o'), ('ρ', 'p'), ('τ', 't'), ('υ', 'u'), ('χ', 'x'), ('Α', 'A'),
    ('Β', 'B'), ('Ε', 'E'), ('Η', 'H'), ('Ι', 'I'), ('Κ', 'K'), ('Μ', 'M'),
    ('Ν', 'N'), ('Ο', 'O'), ('Ρ', 'P'), ('Τ', 'T'), ('Χ', 'X'), ('Υ', 'Y'),
    ('Ζ', 'Z'), ('ɡ', 'g'), ('ɩ', 'i'), ('ℓ', 'l'),
    // dots that NFKC leaves alone
    ('\u{3002}', '.'), ('\u{FF61}', '.'), ('\u{2024}', '.'),
];

static CONFUSABLES: LazyLock<HashMap<char, char>> =
    LazyLock::new(|| CONFUSABLE_PAIRS.iter().copied().collect());

// Matches on the folded text, so only ASCII dots need handling. A dotted
// prefix glued to a scheme (`go.https://`) belongs to the same span.
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        \b(?:[\p{L}\p{N}][\p{L}\p{N}_\-]*\.)*\p{L}[\p{L}\p{N}+\-]{0,15}://[^\s<>"'`]*
        |
        \b(?:[\p{L}\p{N}][\p{L}\p{N}_\-]*\.)+\p{L}{2,24}\b(?:/[^\s<>"'`]*)?
        "#,
    )
    .expect("link pattern is valid")
});

/// Zero-width, bidi-control, tag and other code points that render as nothing.
pub fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{061C}'
            | '\u{115F}'
            | '\u{1160}'
            | '\u{17B4}'
            | '\u{17B5}'
            | '\u{180B}'..='\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{206F}'
            | '\u{3164}'
            | '\u{FEFF}'
            | '\u{FFA0}'
            | '\u{FFF9}'..='\u{FFFB}'
            | '\u{1D173}'..='\u{1D17A}'
            | '\u{E0000}'..='\u{E007F}'
            | '\u{E0100}'..='\u{E01EF}'
    )
}

fn is_stray_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Fold one character to its comparison form. Always yields exactly one char,
/// so folded text stays index-aligned with the display text.
fn fold_char(c: char) -> char {
    if c.is_ascii() {
        return c;
    }
    if let Some(&mapped) = CONFUSABLES.get(&c) {
        return mapped;
    }
    let mut nfkc = std::iter::once(c).nfkc();
    match (nfkc.next(), nfkc.next()) {
        (Some(d), None) => CONFUSABLES.get(&d).copied().unwrap_or(d),
        _ => c,
    }
}

/// ASCII-lowercased comparison skeleton of `text`.
pub fn skeleton(text: &str) -> String {
    text.chars()
        .filter(|&c| !is_invisible(c))
        .map(|c| fold_char(c).to_ascii_lowercase())
        .collect()
}

/// Remove invisible and control characters; reports (invisible, control) hits.
pub fn strip_hidden(text: &str) -> (String, bool, bool) {
    let mut invisible = false;
    let mut control = false;
    let out = text
        .chars()
        .filter(|&c| {
            if is_invisible(c) {
                invisible = true;
                false
            } else if is_stray_control(c) {
                control = true;
                false
            } else {
                true
            }
        })
        .collect();
    (out, invisible, control)
}

fn trim_span_end(folded: &[char], start: usize, mut end: usize) -> usize {
    while end > start && matches!(folded[end - 1], '.' | ',' | ';' | ':' | '!' | '?' | ')') {
        end -= 1;
    }
    end
}

fn is_scheme_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+' || c == '-'
}

/// Start of every `http*` scheme token that directly precedes `://`.
fn http_scheme_starts(folded: &[char]) -> Vec<usize> {
    let mut starts = Vec::new();
    for p in 0..folded.len() {
        if !folded[p..].starts_with(&[':', '/', '/']) {
            continue;
        }
        let start = folded[..p]
            .iter()
            .rposition(|&c| !is_scheme_char(c))
            .map_or(0, |i| i + 1);
        let scheme: String = folded[start..p].iter().map(|c| c.to_ascii_lowercase()).collect();
        if scheme.starts_with("http") {
            starts.push(start);
        }
    }
    starts
}

fn defang_span(display: &[char], folded: &[char]) -> String {
    let mut out = String::with_capacity(display.len() + 8);
    let schemes = http_scheme_starts(folded);
    let mut i = 0;

    while i < display.len() {
        if schemes.contains(&i) {
            out.push_str("hxxp");
            i += 4;
            continue;
        }
        if folded[i] == '.' {
            let bracketed = i > 0 && folded[i - 1] == '[' && folded.get(i + 1) == Some(&']');
            if bracketed {
                out.push(display[i]);
            } else {
                out.push_str("[.]");
            }
        } else {
            out.push(display[i]);
        }
        i += 1;
    }
    out
}

/// Sanitize untrusted text for display.
pub fn sanitize(text: &str) -> SanitizationResult {
    let mut flags = BTreeSet::new();

    let (visible, invisible, control) = strip_hidden(text);
    if invisible {
        flags.insert(SanitizeFlag::InvisibleStripped);
    }
    if control {
        flags.insert(SanitizeFlag::ControlStripped);
    }

    let display: Vec<char> = visible.chars().collect();
    let folded_chars: Vec<char> = display.iter().map(|&c| fold_char(c)).collect();
    let folded: String = folded_chars.iter().collect();
    let offsets: Vec<usize> = folded.char_indices().map(|(i, _)| i).collect();
    let char_at = |byte: usize| offsets.partition_point(|&o| o < byte);

    let mut cleaned = String::with_capacity(visible.len());
    let mut links = Vec::new();
    let mut cursor = 0;

    for m in LINK_RE.find_iter(&folded) {
        let start = char_at(m.start());
        let end = trim_span_end(&folded_chars, start, char_at(m.end()));
        if end <= start {
            continue;
        }

        let span = &display[start..end];
        let folded_span = &folded_chars[start..end];
        let skel: String = folded_span.iter().map(|c| c.to_ascii_lowercase()).collect();

        if span.iter().any(|c| !c.is_ascii()) && skel.is_ascii() {
            flags.insert(SanitizeFlag::Homograph);
        }

        let defanged = defang_span(span, folded_span);
        if !defanged.chars().eq(span.iter().copied()) {
            flags.insert(SanitizeFlag::UrlDefanged);
        }

        cleaned.extend(&display[cursor..start]);
        cleaned.push_str(&defanged);
        links.push(skel);
        cursor = end;
    }
    cleaned.extend(&display[cursor..]);

    let was_modified = cleaned != text;
    SanitizationResult {
        cleaned,
        was_modified,
        flags,
        links,
    }
}

/// Sanitize raw bytes; non-UTF-8 input yields an empty result flagged `decode_error`.
pub fn sanitize_bytes(bytes: &[u8]) -> SanitizationResult {
    match std::str::from_utf8(bytes) {
        Ok(text) => sanitize(text),
        Err(err) => {
            debug!(valid_up_to = err.valid_up_to(), "undecodable text replaced");
            SanitizationResult::decode_error()
        }
    }
}
