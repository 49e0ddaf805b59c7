use regex_syntax::hir::HirKind;
use regex_syntax::ParserBuilder;

/// Folds `minLength`/`maxLength` into a single-atom pattern.
///
/// Returns `None` when the pattern is not a single character atom with an
/// optional `*`/`+` quantifier, or when the bounds cannot be satisfied.
pub(crate) fn fold_length_bounds(
    pattern: &str,
    min_length: Option<u64>,
    max_length: Option<u64>,
) -> Option<String> {
    if min_length.is_none() && max_length.is_none() {
        return None;
    }
    let (anchored_start, core, anchored_end) = split_anchors(pattern);
    let (atom, atom_min) = split_quantifier(core);
    if !is_single_char_atom(atom) {
        return None;
    }
    let lower = min_length.unwrap_or(0).max(atom_min);
    let quantifier = match max_length {
        Some(upper) if upper < lower => return None,
        Some(upper) if upper == lower => format!("{{{upper}}}"),
        Some(upper) => format!("{{{lower},{upper}}}"),
        None => format!("{{{lower},}}"),
    };
    let start = if anchored_start { "^" } else { "" };
    let end = if anchored_end { "$" } else { "" };
    Some(format!("{start}({atom}){quantifier}{end}"))
}

fn split_anchors(pattern: &str) -> (bool, &str, bool) {
    let bytes = pattern.as_bytes();
    let mut start = 0;
    let mut end = bytes.len();
    if bytes.first() == Some(&b'^') {
        start = 1;
    }
    let anchored_end = end > start && bytes[end - 1] == b'$' && !is_escaped(bytes, end - 1);
    if anchored_end {
        end -= 1;
    }
    (start == 1, &pattern[start..end], anchored_end)
}

/// Splits a trailing `*`, `+`, `*?` or `+?` off the core; returns the atom
/// and its implied minimum repetition count.
fn split_quantifier(core: &str) -> (&str, u64) {
    let bytes = core.as_bytes();
    let mut end = bytes.len();
    if end >= 2 && bytes[end - 1] == b'?' && matches!(bytes[end - 2], b'*' | b'+') {
        end -= 1;
    }
    if end >= 1 && matches!(bytes[end - 1], b'*' | b'+') && !is_escaped(bytes, end - 1) {
        let atom_min = if bytes[end - 1] == b'*' { 0 } else { 1 };
        return (&core[..end - 1], atom_min);
    }
    (core, 1)
}

fn is_single_char_atom(atom: &str) -> bool {
    if atom.is_empty() {
        return false;
    }
    let Ok(hir) = ParserBuilder::new().build().parse(atom) else {
        return false;
    };
    match hir.kind() {
        HirKind::Literal(literal) => std::str::from_utf8(&literal.0)
            .map(|text| text.chars().count() == 1)
            .unwrap_or(false),
        HirKind::Class(_) => true,
        _ => false,
    }
}

pub(crate) fn is_escaped(bytes: &[u8], idx: usize) -> bool {
    if idx == 0 {
        return false;
    }
    let mut count = 0;
    let mut pos = idx;
    while pos > 0 {
        pos -= 1;
        if bytes[pos] == b'\\' {
            count += 1;
        } else {
            break;
        }
    }
    count % 2 == 1
}
