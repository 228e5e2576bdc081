//! Address pattern parsing
//!
//! OSC address patterns are `/`-separated like addresses, but each segment
//! may contain glob syntax:
//! ```text
//! /synth/*/freq          any run of characters
//! /synth/voice?/freq     exactly one character
//! /mixer/ch[1-4]/gain    one character from a set (`[!...]` negates)
//! /mixer/{left,right}    one of several literal strings
//! ```
//!
//! Segments are tokenized independently. Malformed glob syntax is never an
//! error: an unbalanced `[` or `{` is read as a literal character.

use crate::config::{AlternativeOrder, PatternOptions, RangePolicy};
use crate::{Error, Result, PATH_SEPARATOR};

/// One member of a `[...]` character class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterGroup {
    Single(char),
    /// Inclusive range; never matches when `start > end`
    Range(char, char),
}

impl CharacterGroup {
    /// Check if `c` belongs to this group
    pub fn contains(&self, c: char) -> bool {
        match *self {
            CharacterGroup::Single(s) => s == c,
            CharacterGroup::Range(start, end) => start <= c && c <= end,
        }
    }

    fn malformed(&self) -> Option<(char, char)> {
        match *self {
            CharacterGroup::Range(start, end) if start > end => Some((start, end)),
            _ => None,
        }
    }
}

/// A single matching primitive of a pattern segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// Verbatim text
    Literal(String),
    /// `*`: any run of characters, including none
    ZeroOrMoreWildcard,
    /// `?`: exactly one character
    SingleCharWildcard,
    /// `[...]` / `[!...]`: exactly one character from (or outside) the groups
    SingleChar {
        exclusion: bool,
        groups: Vec<CharacterGroup>,
    },
    /// `{a,b,c}`: one of the alternatives, tried in order
    Strings(Vec<String>),
}

impl Token {
    /// Check if this token is plain text
    pub fn is_literal(&self) -> bool {
        matches!(self, Token::Literal(_))
    }
}

/// One tokenized path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    raw: String,
    tokens: Vec<Token>,
}

impl Component {
    /// The segment text this component was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The text of a component made of exactly one literal token
    pub fn literal(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [Token::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// Check if this component contains no glob syntax
    pub fn is_literal(&self) -> bool {
        self.tokens.iter().all(Token::is_literal)
    }

    /// Check if `name` matches this component
    pub fn matches(&self, name: &str) -> bool {
        crate::matcher::evaluate(&self.tokens, name)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Tokenize one path segment with default options
///
/// Never fails: malformed ranges are kept and never match, and alternatives
/// are tried longest first.
pub fn tokenize(segment: &str) -> Component {
    let (tokens, _) = scan(segment, AlternativeOrder::default());
    Component {
        raw: segment.to_string(),
        tokens,
    }
}

/// Tokenize one path segment with explicit options
pub fn tokenize_with(segment: &str, options: &PatternOptions) -> Result<Component> {
    let (tokens, malformed) = scan(segment, options.alternative_order);

    if let (RangePolicy::Reject, Some((start, end))) = (options.range_policy, malformed) {
        return Err(Error::InvalidRange { start, end });
    }

    Ok(Component {
        raw: segment.to_string(),
        tokens,
    })
}

/// Scan a segment into tokens, reporting the first malformed range seen
fn scan(segment: &str, order: AlternativeOrder) -> (Vec<Token>, Option<(char, char)>) {
    let chars: Vec<char> = segment.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut malformed = None;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                flush_literal(&mut literal, &mut tokens);
                // Consecutive wildcards collapse to one
                if tokens.last() != Some(&Token::ZeroOrMoreWildcard) {
                    tokens.push(Token::ZeroOrMoreWildcard);
                }
                i += 1;
            }
            '?' => {
                flush_literal(&mut literal, &mut tokens);
                tokens.push(Token::SingleCharWildcard);
                i += 1;
            }
            '[' => match find_close(&chars, i + 1, ']') {
                Some(close) => {
                    flush_literal(&mut literal, &mut tokens);
                    let (exclusion, groups) = parse_bracket(&chars[i + 1..close]);
                    if malformed.is_none() {
                        malformed = groups.iter().find_map(CharacterGroup::malformed);
                    }
                    tokens.push(Token::SingleChar { exclusion, groups });
                    i = close + 1;
                }
                None => {
                    literal.push('[');
                    i += 1;
                }
            },
            '{' => match find_close(&chars, i + 1, '}') {
                Some(close) => {
                    flush_literal(&mut literal, &mut tokens);
                    tokens.push(Token::Strings(parse_braces(&chars[i + 1..close], order)));
                    i = close + 1;
                }
                None => {
                    literal.push('{');
                    i += 1;
                }
            },
            c => {
                literal.push(c);
                i += 1;
            }
        }
    }

    flush_literal(&mut literal, &mut tokens);
    (tokens, malformed)
}

fn flush_literal(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

fn find_close(chars: &[char], from: usize, close: char) -> Option<usize> {
    chars[from..]
        .iter()
        .position(|&c| c == close)
        .map(|offset| from + offset)
}

/// Parse the inside of `[...]` into (exclusion, groups)
fn parse_bracket(content: &[char]) -> (bool, Vec<CharacterGroup>) {
    let (exclusion, content) = match content.split_first() {
        Some((&'!', rest)) => (true, rest),
        _ => (false, content),
    };

    let mut groups = Vec::with_capacity(content.len());
    let mut i = 0;

    while i < content.len() {
        // A dash with a neighbour on both sides forms a range
        if i + 2 < content.len() && content[i + 1] == '-' {
            groups.push(CharacterGroup::Range(content[i], content[i + 2]));
            i += 3;
        } else {
            // Orphan dashes end up here as plain members
            groups.push(CharacterGroup::Single(content[i]));
            i += 1;
        }
    }

    (exclusion, groups)
}

/// Parse the inside of `{...}` into ordered, de-duplicated alternatives
fn parse_braces(content: &[char], order: AlternativeOrder) -> Vec<String> {
    let content: String = content.iter().collect();
    let mut alternatives: Vec<String> = Vec::new();

    for piece in content.split(',') {
        if !alternatives.iter().any(|a| a == piece) {
            alternatives.push(piece.to_string());
        }
    }

    if order == AlternativeOrder::Longest {
        // Stable: equal lengths keep declared order
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    alternatives
}

/// Split an address or pattern into its path segments
///
/// One leading `/` is dropped and empty segments are preserved, so `"//m"`
/// gives `["", "m"]`. `""` and `"/"` give no segments.
pub(crate) fn split_path(s: &str) -> Vec<&str> {
    let body = s.strip_prefix(PATH_SEPARATOR).unwrap_or(s);
    if body.is_empty() {
        return Vec::new();
    }
    body.split(PATH_SEPARATOR).collect()
}

/// A parsed OSC address pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPattern {
    raw: String,
    components: Vec<Component>,
}

impl AddressPattern {
    /// Parse a pattern with default options; never fails
    pub fn parse(s: &str) -> Self {
        Self {
            raw: s.to_string(),
            components: split_path(s).into_iter().map(tokenize).collect(),
        }
    }

    /// Parse a pattern with explicit options
    pub fn parse_with(s: &str, options: &PatternOptions) -> Result<Self> {
        let components = split_path(s)
            .into_iter()
            .map(|segment| tokenize_with(segment, options))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: s.to_string(),
            components,
        })
    }

    /// Get the raw pattern string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Check if no component contains glob syntax
    pub fn is_literal(&self) -> bool {
        self.components.iter().all(Component::is_literal)
    }
}

impl std::fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for AddressPattern {
    fn from(s: &str) -> Self {
        AddressPattern::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Literal(s.to_string())
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(tokenize("freq").tokens(), &[lit("freq")]);
        assert_eq!(tokenize("freq").literal(), Some("freq"));
        assert!(tokenize("").tokens().is_empty());
    }

    #[test]
    fn test_wildcards_collapse() {
        assert_eq!(
            tokenize("a**b").tokens(),
            &[lit("a"), Token::ZeroOrMoreWildcard, lit("b")]
        );
        assert_eq!(tokenize("***").tokens(), &[Token::ZeroOrMoreWildcard]);
        assert_eq!(
            tokenize("*?*").tokens(),
            &[
                Token::ZeroOrMoreWildcard,
                Token::SingleCharWildcard,
                Token::ZeroOrMoreWildcard
            ]
        );
    }

    #[test]
    fn test_bracket_ranges() {
        assert_eq!(
            tokenize("ch[1-4x]").tokens(),
            &[
                lit("ch"),
                Token::SingleChar {
                    exclusion: false,
                    groups: vec![CharacterGroup::Range('1', '4'), CharacterGroup::Single('x')],
                }
            ]
        );
    }

    #[test]
    fn test_bracket_orphan_dashes() {
        let component = tokenize("[-a-]");
        assert_eq!(
            component.tokens(),
            &[Token::SingleChar {
                exclusion: false,
                groups: vec![
                    CharacterGroup::Single('-'),
                    CharacterGroup::Single('a'),
                    CharacterGroup::Single('-'),
                ],
            }]
        );
    }

    #[test]
    fn test_bracket_exclusion() {
        assert_eq!(
            tokenize("[!]").tokens(),
            &[Token::SingleChar {
                exclusion: true,
                groups: vec![],
            }]
        );
        assert_eq!(
            tokenize("[!a-z]").tokens(),
            &[Token::SingleChar {
                exclusion: true,
                groups: vec![CharacterGroup::Range('a', 'z')],
            }]
        );
    }

    #[test]
    fn test_unbalanced_falls_back_to_literal() {
        assert_eq!(tokenize("a[bc").tokens(), &[lit("a[bc")]);
        assert_eq!(tokenize("{x,y").tokens(), &[lit("{x,y")]);
        assert_eq!(
            tokenize("[a*").tokens(),
            &[lit("[a"), Token::ZeroOrMoreWildcard]
        );
    }

    #[test]
    fn test_braces() {
        assert_eq!(
            tokenize("{foo,bar,}").tokens(),
            &[Token::Strings(vec![
                "foo".to_string(),
                "bar".to_string(),
                String::new()
            ])]
        );

        let declared = PatternOptions {
            alternative_order: AlternativeOrder::Declared,
            ..Default::default()
        };
        assert_eq!(
            tokenize_with("{a,ab,a}", &declared).unwrap().tokens(),
            &[Token::Strings(vec!["a".to_string(), "ab".to_string()])]
        );
        assert_eq!(
            tokenize("{a,ab,a}").tokens(),
            &[Token::Strings(vec!["ab".to_string(), "a".to_string()])]
        );
    }

    #[test]
    fn test_malformed_range_policy() {
        assert!(tokenize_with("[z-a]", &PatternOptions::default()).is_ok());

        let reject = PatternOptions {
            range_policy: RangePolicy::Reject,
            ..Default::default()
        };
        assert_eq!(
            tokenize_with("[z-a]", &reject),
            Err(Error::InvalidRange {
                start: 'z',
                end: 'a'
            })
        );
        assert!(tokenize_with("[a-z]", &reject).is_ok());
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
        assert_eq!(split_path("//m"), vec!["", "m"]);
        assert_eq!(split_path("/a/b/"), vec!["a", "b", ""]);
        assert_eq!(split_path("/synth/1/freq"), vec!["synth", "1", "freq"]);
    }

    #[test]
    fn test_address_pattern() {
        let pattern = AddressPattern::parse("/some/*/method?");
        assert_eq!(pattern.components().len(), 3);
        assert_eq!(pattern.components()[0].literal(), Some("some"));
        assert!(!pattern.is_literal());
        assert!(AddressPattern::parse("/some/address").is_literal());
        assert_eq!(pattern.to_string(), "/some/*/method?");
    }
}
