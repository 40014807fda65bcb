//! Line Normaliser (§4.1): input caveats applied once at load

use crate::error::{Error, Result};
use log::warn;

/// Applies the input caveats of §4.1 to raw deck text, returning the
/// normalised physical lines the Card Tokeniser consumes.
///
/// Every correction is a `Caveat`-class condition and is reported via
/// `log::warn!` rather than surfaced as an error, except the one check that
/// is fatal by definition: a comment line sandwiched between the first and
/// continuation lines of the same card.
pub(crate) fn normalize_lines(raw: &str) -> Result<Vec<String>> {
    let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();

    expand_tabs(&mut lines);
    strip_message_block(&mut lines);

    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];

        if is_comment(line) {
            let trimmed = line.trim_start();
            if trimmed.len() != line.len() {
                warn!("caveat: re-indenting left-padded comment line {i}");
                out.push(trimmed.to_string());
            } else {
                out.push(line.clone());
            }
            i += 1;
            continue;
        }

        let mut current = collapse_hash_space(line);

        if starts_with_word(&current, "read") {
            warn!("caveat: commenting out 'read' directive on line {i}");
            current = format!("c {current}");
            out.push(current);
            i += 1;
            continue;
        }

        if let Some(pos) = unescaped_ampersand(&current) {
            current.replace_range(pos..pos + 1, "$");
            out.push(current);
            i += 1;
            if i < lines.len() {
                let next = &lines[i];
                if is_comment(next) {
                    return Err(Error::MalformedInput {
                        detail: format!(
                            "comment line {i} interrupts a card continued with '&'"
                        ),
                    });
                }
                if !starts_with_blank_columns(next, 5) {
                    warn!("caveat: forcing five-space continuation indent on line {i}");
                    out.push(format!("     {}", next.trim_start()));
                } else {
                    out.push(next.clone());
                }
                i += 1;
            }
            continue;
        }

        out.push(current);
        i += 1;
    }

    if let Some(first) = out.first() {
        if !is_comment(first) {
            warn!("caveat: prepending 'c ' to make the first line a comment");
            out.insert(0, "c ".to_string());
        }
    } else {
        out.push("c ".to_string());
    }

    Ok(out)
}

fn expand_tabs(lines: &mut [String]) {
    for (i, line) in lines.iter_mut().enumerate() {
        if line.contains('\t') {
            warn!("caveat: expanding tabs to five spaces on line {i}");
            *line = line.replace('\t', "     ");
        }
    }
}

fn strip_message_block(lines: &mut Vec<String>) {
    let first_non_blank = lines.iter().position(|l| !l.trim().is_empty());
    if let Some(start) = first_non_blank {
        if lines[start].trim_start().to_ascii_lowercase().starts_with("message") {
            warn!("caveat: stripping 'message' prologue block");
            let end = lines[start..]
                .iter()
                .position(|l| l.trim().is_empty())
                .map(|p| start + p + 1)
                .unwrap_or(lines.len());
            lines.drain(start..end);
        }
    }
}

fn collapse_hash_space(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        result.push(c);
        if c == '#' {
            while matches!(chars.peek(), Some(c) if c.is_whitespace() && *c != '\n') {
                chars.next();
            }
        }
    }
    if result != line {
        warn!("caveat: collapsing '# ' into '#'");
    }
    result
}

/// Finds an `&` that is not inside a `$`-comment tail.
fn unescaped_ampersand(line: &str) -> Option<usize> {
    let comment_start = line.find('$');
    let scope = match comment_start {
        Some(pos) => &line[..pos],
        None => line,
    };
    scope.find('&')
}

fn starts_with_blank_columns(line: &str, n: usize) -> bool {
    line.len() >= n && line[..n].chars().all(|c| c == ' ')
}

fn starts_with_word(line: &str, word: &str) -> bool {
    line.trim_start().to_ascii_lowercase().starts_with(word)
}

pub(crate) fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty()
        && (trimmed.eq_ignore_ascii_case("c")
            || trimmed.to_ascii_lowercase().starts_with("c ")
            || trimmed.to_ascii_lowercase().starts_with("c\t"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tabs() {
        let out = normalize_lines("c header\n1\t0 -1\n").unwrap();
        assert!(out.iter().any(|l| l.contains("     0 -1")));
    }

    #[test]
    fn strips_message_block() {
        let out = normalize_lines("message\nfoo\n\nc header\n1 0 -1\n").unwrap();
        assert_eq!(out[0], "c header");
    }

    #[test]
    fn collapses_hash_space() {
        let out = normalize_lines("c h\n1 0 # 2 3\n").unwrap();
        assert!(out.iter().any(|l| l.contains("#2 3")));
    }

    #[test]
    fn comments_out_read_directive() {
        let out = normalize_lines("c h\nread file=foo.i\n").unwrap();
        assert!(out.iter().any(|l| l == "c read file=foo.i"));
    }

    #[test]
    fn prepends_comment_on_first_line() {
        let out = normalize_lines("1 0 -1\n").unwrap();
        assert_eq!(out[0], "c ");
    }
}
