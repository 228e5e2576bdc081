//! Component matching
//!
//! A component's tokens are run against a candidate node name with an
//! anchored backtracking search: the whole name must be consumed. Only `*`
//! backtracks; every other token matches at most once, deterministically.
//!
//! Recursion depth is bounded by the token count and each wildcard tries at
//! most `remaining.len() + 1` lengths, so evaluation always terminates.
//! Worst-case cost grows as `len^k` for `k` wildcards that cannot match,
//! e.g. `*a*a*a*b` against a long run of `a`; bound pattern or name length
//! when patterns come straight from the network.

use crate::pattern::{CharacterGroup, Token};

/// Outcome of one match attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    /// Number of bytes consumed
    Match(usize),
}

/// Per-token matching state
#[derive(Debug)]
pub struct TokenMatcher<'t> {
    token: &'t Token,
    /// Candidate length (wildcard) in bytes
    trial: usize,
    exhausted: bool,
}

impl<'t> TokenMatcher<'t> {
    pub fn new(token: &'t Token) -> Self {
        Self {
            token,
            trial: 0,
            exhausted: false,
        }
    }

    pub fn reset(&mut self) {
        self.trial = 0;
        self.exhausted = false;
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Try the current candidate against the start of `remaining`
    pub fn matches(&self, remaining: &str) -> MatchResult {
        match self.token {
            Token::Literal(text) => {
                if remaining.starts_with(text.as_str()) {
                    MatchResult::Match(text.len())
                } else {
                    MatchResult::NoMatch
                }
            }
            Token::ZeroOrMoreWildcard => {
                if self.trial <= remaining.len() {
                    MatchResult::Match(self.trial)
                } else {
                    MatchResult::NoMatch
                }
            }
            Token::SingleCharWildcard => match remaining.chars().next() {
                Some(c) => MatchResult::Match(c.len_utf8()),
                None => MatchResult::NoMatch,
            },
            Token::SingleChar { exclusion, groups } => match remaining.chars().next() {
                Some(c) if in_groups(groups, c) != *exclusion => MatchResult::Match(c.len_utf8()),
                _ => MatchResult::NoMatch,
            },
            Token::Strings(alternatives) => {
                if alternatives.is_empty() {
                    return MatchResult::Match(0);
                }
                alternatives
                    .iter()
                    .find(|alt| remaining.starts_with(alt.as_str()))
                    .map_or(MatchResult::NoMatch, |alt| MatchResult::Match(alt.len()))
            }
        }
    }

    /// Move to the next candidate length
    ///
    /// `remaining` is the input as of entry to this token. Single-shot
    /// tokens are exhausted after one attempt.
    pub fn advance(&mut self, remaining: &str) {
        match self.token {
            Token::ZeroOrMoreWildcard => match remaining.get(self.trial..) {
                Some(rest) => match rest.chars().next() {
                    Some(c) => self.trial += c.len_utf8(),
                    None => self.exhausted = true,
                },
                None => self.exhausted = true,
            },
            _ => self.exhausted = true,
        }
    }
}

fn in_groups(groups: &[CharacterGroup], c: char) -> bool {
    groups.iter().any(|g| g.contains(c))
}

/// Check if `candidate` matches `tokens` in full
pub fn evaluate(tokens: &[Token], candidate: &str) -> bool {
    match tokens {
        [] => candidate.is_empty(),
        [Token::Literal(text)] => text == candidate,
        [Token::ZeroOrMoreWildcard] => true,
        _ => {
            let mut matchers: Vec<TokenMatcher<'_>> =
                tokens.iter().map(TokenMatcher::new).collect();
            run_state(&mut matchers, 0, candidate, 0)
        }
    }
}

fn run_state(
    matchers: &mut [TokenMatcher<'_>],
    index: usize,
    candidate: &str,
    entry: usize,
) -> bool {
    let remaining = &candidate[entry..];
    let last = index + 1 == matchers.len();

    matchers[index].reset();
    loop {
        if let MatchResult::Match(len) = matchers[index].matches(remaining) {
            let next = entry + len;
            if last {
                if next == candidate.len() {
                    return true;
                }
            } else if run_state(matchers, index + 1, candidate, next) {
                return true;
            }
        }

        matchers[index].advance(remaining);
        if matchers[index].is_exhausted() {
            return false;
        }
    }
}
