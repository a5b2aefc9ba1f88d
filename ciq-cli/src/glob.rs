//! Shell-style glob patterns
//!
//! Used by the job filters on runner names, job names, build ids, tags and
//! option values:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character of the set
//! - `[!abc]` or `[^abc]` match one character not in the set
//! - `\x` matches `x` literally
//!
//! Patterns are validated when compiled, so a malformed pattern is reported
//! once instead of silently never matching.

use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("syntax error in pattern '{0}': unterminated character class")]
    UnterminatedClass(String),

    #[error("syntax error in pattern '{0}': trailing backslash")]
    TrailingEscape(String),

    #[error("syntax error in pattern '{0}': invalid range {1}-{2}")]
    InvalidRange(String, char, char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    Range(char, char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    AnyChar,
    Star,
    Class { negated: bool, items: Vec<ClassItem> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyChar => true,
            Token::Star => false,
            Token::Class { negated, items } => {
                let hit = items.iter().any(|item| match item {
                    ClassItem::Char(x) => *x == c,
                    ClassItem::Range(lo, hi) => (*lo..=*hi).contains(&c),
                });
                hit != *negated
            }
        }
    }
}

/// A compiled glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '*' => {
                    // consecutive stars are one star
                    if tokens.last() != Some(&Token::Star) {
                        tokens.push(Token::Star);
                    }
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::AnyChar);
                    i += 1;
                }
                '\\' => {
                    let escaped = chars
                        .get(i + 1)
                        .ok_or_else(|| PatternError::TrailingEscape(pattern.to_string()))?;
                    tokens.push(Token::Literal(*escaped));
                    i += 2;
                }
                '[' => {
                    let (token, next) = parse_class(pattern, &chars, i)?;
                    tokens.push(token);
                    i = next;
                }
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            tokens,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if the pattern matches the entire input
    pub fn matches(&self, input: &str) -> bool {
        let chars: Vec<char> = input.chars().collect();
        let (mut p, mut i) = (0, 0);
        // position of the last star and the input index it currently covers up to
        let mut backtrack: Option<(usize, usize)> = None;

        while i < chars.len() {
            match self.tokens.get(p) {
                Some(Token::Star) => {
                    backtrack = Some((p, i));
                    p += 1;
                    continue;
                }
                Some(token) if token.matches(chars[i]) => {
                    p += 1;
                    i += 1;
                    continue;
                }
                _ => {}
            }

            match backtrack {
                Some((star, covered)) => {
                    p = star + 1;
                    i = covered + 1;
                    backtrack = Some((star, covered + 1));
                }
                None => return false,
            }
        }

        self.tokens[p.min(self.tokens.len())..]
            .iter()
            .all(|t| *t == Token::Star)
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::new(s)
    }
}

/// Parses `[...]` starting at `start`, returns the token and the next index
fn parse_class(pattern: &str, chars: &[char], start: usize) -> Result<(Token, usize), PatternError> {
    let unterminated = || PatternError::UnterminatedClass(pattern.to_string());

    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let first = i;
    let mut items = Vec::new();
    loop {
        let c = *chars.get(i).ok_or_else(unterminated)?;
        // `]` right after the opening bracket is a literal
        if c == ']' && i > first {
            return Ok((Token::Class { negated, items }, i + 1));
        }

        let (lo, after_lo) = class_char(pattern, chars, i)?;
        if chars.get(after_lo) == Some(&'-') && chars.get(after_lo + 1).is_some_and(|n| *n != ']') {
            let (hi, after_hi) = class_char(pattern, chars, after_lo + 1)?;
            if lo > hi {
                return Err(PatternError::InvalidRange(pattern.to_string(), lo, hi));
            }
            items.push(ClassItem::Range(lo, hi));
            i = after_hi;
        } else {
            items.push(ClassItem::Char(lo));
            i = after_lo;
        }
    }
}

fn class_char(pattern: &str, chars: &[char], i: usize) -> Result<(char, usize), PatternError> {
    match chars.get(i) {
        Some('\\') => chars
            .get(i + 1)
            .map(|c| (*c, i + 2))
            .ok_or_else(|| PatternError::UnterminatedClass(pattern.to_string())),
        Some(c) => Ok((*c, i + 1)),
        None => Err(PatternError::UnterminatedClass(pattern.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, input: &str) -> bool {
        Pattern::new(pattern).unwrap().matches(input)
    }

    #[test]
    fn literal_matches() {
        assert!(m("unit", "unit"));
        assert!(m("", ""));
        assert!(!m("unit", "units"));
        assert!(!m("units", "unit"));
    }

    #[test]
    fn star_wildcard() {
        assert!(m("*", ""));
        assert!(m("*", "nightly"));
        assert!(m("unit-*", "unit-"));
        assert!(m("unit-*", "unit-linux"));
        assert!(m("*-linux", "unit-linux"));
        assert!(m("u*t*x", "unit-linux"));
        assert!(m("**x", "linux"));
        assert!(!m("*-linux", "unit-windows"));
        assert!(m("feature/*", "feature/login"));
    }

    #[test]
    fn question_wildcard() {
        assert!(m("12?", "123"));
        assert!(!m("12?", "12"));
        assert!(!m("12?", "1234"));
    }

    #[test]
    fn character_classes() {
        assert!(m("[abc]", "b"));
        assert!(!m("[abc]", "d"));
        assert!(m("1[0-4]", "13"));
        assert!(!m("1[0-4]", "15"));
        assert!(m("[!0-4]", "7"));
        assert!(m("[^0-4]", "7"));
        assert!(!m("[!0-4]", "2"));
        assert!(m("[]]", "]"));
        assert!(m("[a-]", "-"));
    }

    #[test]
    fn escapes() {
        assert!(m("\\*", "*"));
        assert!(!m("\\*", "x"));
        assert!(m("[\\]]", "]"));
    }

    #[test]
    fn malformed_patterns() {
        assert!(matches!(
            Pattern::new("[abc"),
            Err(PatternError::UnterminatedClass(_))
        ));
        assert!(matches!(
            Pattern::new("build\\"),
            Err(PatternError::TrailingEscape(_))
        ));
        assert!(matches!(
            Pattern::new("[z-a]"),
            Err(PatternError::InvalidRange(_, 'z', 'a'))
        ));
        assert_eq!(
            Pattern::new("[").unwrap_err().to_string(),
            "syntax error in pattern '[': unterminated character class"
        );
    }

    #[test]
    fn pathological_pattern_is_linear_enough() {
        let pattern = "*a".repeat(20);
        let input = "a".repeat(19) + "b";
        assert!(!m(&pattern, &input));
    }

    #[test]
    fn parses_from_str() {
        let pattern: Pattern = "ci-*".parse().unwrap();
        assert_eq!(pattern.as_str(), "ci-*");
        assert!(pattern.matches("ci-east"));
    }
}
