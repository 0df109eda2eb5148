//! Line grammar shared by the weaving and splitting passes.
//!
//! Lines are classified by their first whitespace-delimited token,
//! case-insensitively, with leading whitespace allowed. Tags must be
//! whole tokens: `cx 1 2 0` is not a comment. Payload slices point into
//! the input line with case and spacing preserved, so writers can pass
//! them through byte for byte.

use thiserror::Error;

/// Marker letter of an annotated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// `x`: an extension-variable definition.
    Extension,
    /// `o`: an original-clause annotation.
    Original,
}

/// What one input line is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass<'a> {
    /// `p ...` header line.
    Problem,
    /// `c x ...` or `c o ...`; the payload starts at the tag letter.
    TaggedComment { tag: Tag, payload: &'a [u8] },
    /// Any other `c ...` line.
    Comment,
    /// `e ...`; the payload starts after the tag and one separator.
    Expansion { payload: &'a [u8] },
    /// A bare `x ...` or `o ...` line; the payload starts at the tag letter.
    Tagged { tag: Tag, payload: &'a [u8] },
    /// Clauses, proof steps, blank lines.
    Other,
}

/// Classify one line, terminator included.
pub fn classify(line: &[u8]) -> LineClass<'_> {
    let body = trim_start(line);
    let (token, rest) = split_token(body);
    if token.eq_ignore_ascii_case(b"p") {
        LineClass::Problem
    } else if token.eq_ignore_ascii_case(b"c") {
        let tagged = trim_start(rest);
        let (second, _) = split_token(tagged);
        if second.eq_ignore_ascii_case(b"x") {
            LineClass::TaggedComment {
                tag: Tag::Extension,
                payload: tagged,
            }
        } else if second.eq_ignore_ascii_case(b"o") {
            LineClass::TaggedComment {
                tag: Tag::Original,
                payload: tagged,
            }
        } else {
            LineClass::Comment
        }
    } else if token.eq_ignore_ascii_case(b"e") {
        LineClass::Expansion {
            payload: strip_one_separator(rest),
        }
    } else if token.eq_ignore_ascii_case(b"x") {
        LineClass::Tagged {
            tag: Tag::Extension,
            payload: body,
        }
    } else if token.eq_ignore_ascii_case(b"o") {
        LineClass::Tagged {
            tag: Tag::Original,
            payload: body,
        }
    } else {
        LineClass::Other
    }
}

/// A token that should have been a DIMACS literal but does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid literal token `{0}`")]
pub struct BadLiteral(pub String);

/// Largest variable among the integer tokens of `payload`, scanning up
/// to the first `0`. Returns 0 for a payload without literals.
pub fn max_var_before_zero(payload: &[u8]) -> Result<u64, BadLiteral> {
    let mut max = 0u64;
    for token in tokens(payload) {
        let literal: i64 = std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| BadLiteral(String::from_utf8_lossy(token).into_owned()))?;
        if literal == 0 {
            break;
        }
        max = max.max(literal.unsigned_abs());
    }
    Ok(max)
}

/// The payload with its leading tag token removed.
pub fn after_tag(payload: &[u8]) -> &[u8] {
    split_token(payload).1
}

fn tokens(payload: &[u8]) -> impl Iterator<Item = &[u8]> {
    payload
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty())
}

fn trim_start(line: &[u8]) -> &[u8] {
    let skip = line
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    &line[skip..]
}

fn split_token(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|b| b.is_ascii_whitespace()) {
        Some(i) => (&line[..i], &line[i..]),
        None => (line, b""),
    }
}

fn strip_one_separator(rest: &[u8]) -> &[u8] {
    match rest.first() {
        Some(b) if b.is_ascii_whitespace() && *b != b'\n' => &rest[1..],
        _ => rest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_and_comment_lines() {
        assert_eq!(classify(b"p cnf 3 2\n"), LineClass::Problem);
        assert_eq!(classify(b"  P CNF 3 2\n"), LineClass::Problem);
        assert_eq!(classify(b"c just a note\n"), LineClass::Comment);
        assert_eq!(classify(b"c\n"), LineClass::Comment);
    }

    #[test]
    fn tags_must_be_whole_tokens() {
        assert_eq!(classify(b"cx 1 2 0\n"), LineClass::Other);
        assert_eq!(classify(b"ee 1 0\n"), LineClass::Other);
        assert_eq!(classify(b"c xtra words\n"), LineClass::Comment);
    }

    #[test]
    fn tagged_comments_keep_their_payload_from_the_tag() {
        match classify(b"c x 1 2 0\n") {
            LineClass::TaggedComment { tag, payload } => {
                assert_eq!(tag, Tag::Extension);
                assert_eq!(payload, b"x 1 2 0\n");
            }
            other => panic!("unexpected class {other:?}"),
        }
        match classify(b"  c   O 5 0\n") {
            LineClass::TaggedComment { tag, payload } => {
                assert_eq!(tag, Tag::Original);
                assert_eq!(payload, b"O 5 0\n");
            }
            other => panic!("unexpected class {other:?}"),
        }
    }

    #[test]
    fn expansion_payload_drops_tag_and_one_separator() {
        match classify(b"e 1 -2 0\n") {
            LineClass::Expansion { payload } => assert_eq!(payload, b"1 -2 0\n"),
            other => panic!("unexpected class {other:?}"),
        }
        match classify(b"e   1 0\n") {
            LineClass::Expansion { payload } => assert_eq!(payload, b"  1 0\n"),
            other => panic!("unexpected class {other:?}"),
        }
        match classify(b"e\n") {
            LineClass::Expansion { payload } => assert_eq!(payload, b"\n"),
            other => panic!("unexpected class {other:?}"),
        }
    }

    #[test]
    fn bare_tag_lines() {
        match classify(b"x 1 2 0 3 0\n") {
            LineClass::Tagged { tag, payload } => {
                assert_eq!(tag, Tag::Extension);
                assert_eq!(payload, b"x 1 2 0 3 0\n");
            }
            other => panic!("unexpected class {other:?}"),
        }
        assert!(matches!(
            classify(b"o 7 0\n"),
            LineClass::Tagged {
                tag: Tag::Original,
                ..
            }
        ));
    }

    #[test]
    fn clauses_and_blanks_are_other() {
        assert_eq!(classify(b"1 -2 3 0\n"), LineClass::Other);
        assert_eq!(classify(b"-1 0\n"), LineClass::Other);
        assert_eq!(classify(b"\n"), LineClass::Other);
        assert_eq!(classify(b""), LineClass::Other);
        assert_eq!(classify(b"d 1 2 0\n"), LineClass::Other);
    }

    #[test]
    fn max_var_stops_at_the_first_zero() {
        assert_eq!(max_var_before_zero(b"1 -7 3 0 99 0\n"), Ok(7));
        assert_eq!(max_var_before_zero(b"0 99 0\n"), Ok(0));
        assert_eq!(max_var_before_zero(b"\n"), Ok(0));
        assert_eq!(max_var_before_zero(b"12 -15\n"), Ok(15));
    }

    #[test]
    fn non_numeric_literals_are_rejected() {
        assert_eq!(
            max_var_before_zero(b"1 two 0\n"),
            Err(BadLiteral("two".into()))
        );
    }

    #[test]
    fn after_tag_drops_the_leading_token() {
        assert_eq!(after_tag(b"x 1 2 0\n"), b" 1 2 0\n");
        assert_eq!(max_var_before_zero(after_tag(b"x 1 9 0 3 0\n")), Ok(9));
    }
}
