//! Textual formula analysis.
//!
//! A formula is evaluated by rewriting its text before it ever reaches the
//! parser: absolute markers are stripped, ranges are expanded into nested
//! sequence literals, and each remaining reference token is replaced by the
//! referenced cell's value literal. These passes share one scanner that
//! walks the text for reference-shaped tokens. The scanner is deliberately
//! naive about quoted strings, so `"A1"` inside a text literal is rewritten
//! like any other reference.

use crate::addr::{expand_range, Addr, CellRef};
use crate::formula::functions;

/// Raw input starting with `=` holds a formula; everything else is a plain
/// value.
pub fn is_formula(raw: &str) -> bool {
    raw.starts_with('=')
}

/// The expression text after the leading `=`.
pub fn expression_body(raw: &str) -> &str {
    &raw[1..]
}

/// Remove every `$` marker. Absolute markers only matter to copy
/// translation; evaluation and dependency identity ignore them.
pub fn strip_absolute_markers(text: &str) -> String {
    text.replace('$', "")
}

/// A reference-shaped token found in expression text.
struct RefToken {
    start: usize,
    end: usize,
    cell: CellRef,
}

/// Scan for reference tokens: maximal alphanumeric runs that parse as a
/// cell reference and are not immediately followed by `(` (those are
/// function calls).
fn ref_tokens(text: &str) -> Vec<RefToken> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if is_token_byte(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_token_byte(bytes[i]) {
                i += 1;
            }
            let word = &text[start..i];
            if bytes.get(i) == Some(&b'(') || functions::is_builtin(&word.to_uppercase()) {
                continue;
            }
            if let Ok(cell) = CellRef::parse(word) {
                tokens.push(RefToken { start, end: i, cell });
            }
        } else {
            i += 1;
        }
    }

    tokens
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'$' || b == b'.'
}

/// Replace every `A1:B2`-style range with a nested sequence literal,
/// row-major: `[[A1,B1],[A2,B2]]`. Single references pass through.
pub fn expand_ranges(text: &str) -> String {
    let tokens = ref_tokens(text);
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut i = 0;

    while i < tokens.len() {
        let tl = &tokens[i];
        let is_range = i + 1 < tokens.len()
            && bytes.get(tl.end) == Some(&b':')
            && tokens[i + 1].start == tl.end + 1;
        if is_range {
            let br = &tokens[i + 1];
            out.push_str(&text[cursor..tl.start]);
            out.push_str(&range_literal(tl.cell.addr, br.cell.addr));
            cursor = br.end;
            i += 2;
        } else {
            i += 1;
        }
    }

    out.push_str(&text[cursor..]);
    out
}

fn range_literal(top_left: Addr, bottom_right: Addr) -> String {
    let rows: Vec<String> = expand_range(top_left, bottom_right)
        .into_iter()
        .map(|row| {
            let cells: Vec<String> = row.iter().map(|addr| addr.to_string()).collect();
            format!("[{}]", cells.join(","))
        })
        .collect();
    format!("[{}]", rows.join(","))
}

/// Every address the expression references, ranges expanded, deduplicated,
/// in address order. This is the cell's observed set after an edit.
pub fn referenced_addrs(body: &str) -> Vec<Addr> {
    let expanded = expand_ranges(&strip_absolute_markers(body));
    let mut addrs: Vec<Addr> = ref_tokens(&expanded).iter().map(|t| t.cell.addr).collect();
    addrs.sort();
    addrs.dedup();
    addrs
}

/// Replace each reference token with the text `lookup` yields for its
/// address. Ranges must already be expanded.
pub fn substitute_refs<F>(text: &str, mut lookup: F) -> String
where
    F: FnMut(Addr) -> String,
{
    map_refs(text, |cell| lookup(cell.addr))
}

/// Rewrite each reference token through `f`, keeping everything between
/// tokens intact. The single left-to-right scan guarantees each reference
/// is rewritten exactly once, even when one reference's text is a
/// substring of another's.
pub(crate) fn map_refs<F>(text: &str, mut f: F) -> String
where
    F: FnMut(CellRef) -> String,
{
    let tokens = ref_tokens(text);
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for token in &tokens {
        out.push_str(&text[cursor..token.start]);
        out.push_str(&f(token.cell));
        cursor = token.end;
    }

    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_formula() {
        assert!(is_formula("=A1+1"));
        assert!(!is_formula("A1+1"));
        assert!(!is_formula(""));
        assert_eq!(expression_body("=A1+1"), "A1+1");
    }

    #[test]
    fn test_strip_absolute_markers() {
        assert_eq!(strip_absolute_markers("$A$1+B2"), "A1+B2");
        assert_eq!(strip_absolute_markers("A1"), "A1");
    }

    #[test]
    fn test_expand_ranges() {
        assert_eq!(expand_ranges("SUM(A1:B2)"), "SUM([[A1,B1],[A2,B2]])");
        assert_eq!(expand_ranges("A1+A2"), "A1+A2");
        assert_eq!(
            expand_ranges("SUM(A1:A2)+SUM(B1:B2)"),
            "SUM([[A1],[A2]])+SUM([[B1],[B2]])"
        );
    }

    #[test]
    fn test_referenced_addrs_expands_and_dedups() {
        // A1:B2 covers A1, B1, A2, B2; the extra A1 term dedups away.
        let addrs = referenced_addrs("SUM(A1:B2)+A1");
        assert_eq!(
            addrs,
            vec![
                Addr::new(0, 0),
                Addr::new(0, 1),
                Addr::new(1, 0),
                Addr::new(1, 1),
            ]
        );
    }

    #[test]
    fn test_referenced_addrs_case_insensitive() {
        assert_eq!(referenced_addrs("a1+B2"), vec![Addr::new(0, 0), Addr::new(1, 1)]);
    }

    #[test]
    fn test_referenced_addrs_skips_function_names() {
        assert_eq!(referenced_addrs("SUM(1,2)"), Vec::<Addr>::new());
    }

    #[test]
    fn test_referenced_addrs_ignores_absolute_markers() {
        assert_eq!(
            referenced_addrs("$B$1+B1"),
            vec![Addr::new(0, 1)]
        );
    }

    #[test]
    fn test_substitute_refs() {
        let result = substitute_refs("A1+B2*A1", |addr| {
            if addr == Addr::new(0, 0) {
                "(2)".to_string()
            } else {
                "(10)".to_string()
            }
        });
        assert_eq!(result, "(2)+(10)*(2)");
    }

    #[test]
    fn test_substitute_inside_string_literal() {
        // The scanner does not understand quotes; a reference-shaped token
        // inside a text literal is rewritten too.
        let result = substitute_refs("\"A1\"", |_| "(5)".to_string());
        assert_eq!(result, "\"(5)\"");
    }
}
