use regex::Regex;
use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::ParserBuilder;

/// Longest repetition growth tried while searching for a match of the
/// requested length.
const MAX_EXTENSION: usize = 64;

/// Characters tried, in order, when building a string a pattern rejects.
const NON_MATCHING_CHARS: [char; 6] = ['0', 'a', 'A', '-', ' ', '!'];

/// Preferred characters when a class allows a choice.
const PREFERRED_CHARS: [char; 3] = ['0', 'a', 'A'];

/// Shortest string matching `pattern` whose length lies within the bounds,
/// if one is found by growing the first open repetition.
pub(crate) fn minimal_match(
    pattern: &str,
    min_length: usize,
    max_length: Option<usize>,
) -> Option<String> {
    let regex = Regex::new(pattern).ok()?;
    let hir = ParserBuilder::new().build().parse(pattern).ok()?;
    let mut previous: Option<String> = None;
    for extension in 0..=MAX_EXTENSION {
        let mut budget = extension;
        let mut rendered = String::new();
        render(&hir, &mut rendered, &mut budget);
        if previous.as_deref() == Some(rendered.as_str()) {
            // No repetition left to grow.
            break;
        }
        let length = rendered.chars().count();
        if max_length.is_some_and(|max| length > max) {
            break;
        }
        if length < min_length {
            let padded = format!("{rendered}{}", "0".repeat(min_length - length));
            if regex.is_match(&padded) && max_length.map_or(true, |max| min_length <= max) {
                return Some(padded);
            }
        } else if regex.is_match(&rendered) {
            return Some(rendered);
        }
        previous = Some(rendered);
    }
    None
}

/// A string of `length` repeated characters that `pattern` does not match.
pub(crate) fn non_matching(pattern: &str, length: usize) -> Option<String> {
    let regex = Regex::new(pattern).ok()?;
    NON_MATCHING_CHARS
        .iter()
        .map(|ch| ch.to_string().repeat(length))
        .find(|candidate| !regex.is_match(candidate))
}

/// Writes the shortest expansion of `hir`; `budget` extra iterations go to the
/// first repetition that can take them.
fn render(hir: &Hir, out: &mut String, budget: &mut usize) {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {}
        HirKind::Literal(literal) => out.push_str(&String::from_utf8_lossy(&literal.0)),
        HirKind::Class(class) => {
            if let Some(ch) = class_char(class) {
                out.push(ch);
            }
        }
        HirKind::Repetition(repetition) => {
            let min = repetition.min as usize;
            let room = repetition
                .max
                .map(|max| (max as usize).saturating_sub(min))
                .unwrap_or(usize::MAX);
            let extra = (*budget).min(room);
            *budget -= extra;
            for _ in 0..min + extra {
                render(&repetition.sub, out, budget);
            }
        }
        HirKind::Capture(capture) => render(&capture.sub, out, budget),
        HirKind::Concat(items) => {
            for item in items {
                render(item, out, budget);
            }
        }
        HirKind::Alternation(alternatives) => {
            if let Some(first) = alternatives.first() {
                render(first, out, budget);
            }
        }
    }
}

fn class_char(class: &Class) -> Option<char> {
    match class {
        Class::Unicode(unicode) => {
            let ranges = unicode.ranges();
            PREFERRED_CHARS
                .iter()
                .copied()
                .find(|ch| {
                    ranges
                        .iter()
                        .any(|range| range.start() <= *ch && *ch <= range.end())
                })
                .or_else(|| ranges.first().map(|range| range.start()))
        }
        Class::Bytes(bytes) => {
            let ranges = bytes.ranges();
            PREFERRED_CHARS
                .iter()
                .copied()
                .find(|ch| {
                    ranges
                        .iter()
                        .any(|range| range.start() <= *ch as u8 && *ch as u8 <= range.end())
                })
                .or_else(|| {
                    ranges
                        .first()
                        .map(|range| range.start())
                        .filter(u8::is_ascii)
                        .map(char::from)
                })
        }
    }
}
