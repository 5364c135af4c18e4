//! Comparator-set view of npm ranges.
//!
//! `node_semver::Range` answers membership questions but does not expose the
//! comparators a range was written with. Rewriting a range's lower bound needs
//! exactly that, so this module keeps its own light parse of the range text:
//! `||`-separated sets, each desugared into plain comparators the way npm does
//! (hyphen ranges, x-ranges, partial versions).

use crate::version::{is_valid_range, parse_version};
use crate::{Error, Result};
use std::fmt;
use tracing::debug;

/// Comparison operator of a single comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Bare version, matches exactly
    Exact,
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Exact => "",
            Operator::Greater => ">",
            Operator::GreaterEq => ">=",
            Operator::Less => "<",
            Operator::LessEq => "<=",
        }
    }
}

/// One desugared comparator, e.g. `>=1.2.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    /// Operator
    pub op: Operator,
    /// Full version (x.y.z with optional prerelease)
    pub version: String,
}

impl Comparator {
    fn new(op: Operator, version: impl Into<String>) -> Self {
        Self {
            op,
            version: version.into(),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A possibly partial version such as `1`, `1.2.x` or `1.2.3-beta.1`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    suffix: String,
}

impl Partial {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_start_matches('=').trim_start_matches(['v', 'V']);
        if text.is_empty() {
            return Some(Self::any());
        }

        let (core, suffix) = match text.find(['-', '+']) {
            Some(idx) => (&text[..idx], &text[idx..]),
            None => (text, ""),
        };

        let pieces: Vec<&str> = core.split('.').collect();
        if pieces.len() > 3 {
            return None;
        }

        let mut numbers = [None; 3];
        for (idx, piece) in pieces.iter().enumerate() {
            if matches!(*piece, "x" | "X" | "*") {
                break;
            }
            numbers[idx] = Some(piece.parse::<u64>().ok()?);
        }

        let [major, minor, patch] = numbers;
        Some(Self {
            major,
            minor,
            patch,
            // Prerelease tags only mean something on a complete version.
            suffix: if patch.is_some() {
                suffix.to_string()
            } else {
                String::new()
            },
        })
    }

    fn any() -> Self {
        Self {
            major: None,
            minor: None,
            patch: None,
            suffix: String::new(),
        }
    }

    fn is_any(&self) -> bool {
        self.major.is_none()
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// Lowest version the partial covers
    fn floor(&self) -> String {
        format!(
            "{}.{}.{}{}",
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
            self.suffix
        )
    }

    /// First version above what a partial covers, as an exclusive `-0` bound.
    /// Only meaningful when the partial is not full.
    fn ceiling(&self) -> String {
        let major = self.major.unwrap_or(0);
        match self.minor {
            None => format!("{}.0.0-0", major + 1),
            Some(minor) => format!("{}.{}.0-0", major, minor + 1),
        }
    }

    /// The version a `>` comparator on a partial starts at (`>1.2` is `>=1.3.0`)
    fn next_floor(&self) -> String {
        let major = self.major.unwrap_or(0);
        match self.minor {
            None => format!("{}.0.0", major + 1),
            Some(minor) => format!("{}.{}.0", major, minor + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Caret(Partial),
    Tilde(Partial),
    Hyphen(Partial, Partial),
    Compare(Operator, Partial),
}

impl Term {
    fn parse(token: &str) -> Option<Self> {
        if let Some(rest) = token.strip_prefix("~>").or_else(|| token.strip_prefix('~')) {
            return Some(Term::Tilde(Partial::parse(rest)?));
        }
        if let Some(rest) = token.strip_prefix('^') {
            return Some(Term::Caret(Partial::parse(rest)?));
        }

        const PREFIXES: [(&str, Operator); 5] = [
            (">=", Operator::GreaterEq),
            ("<=", Operator::LessEq),
            (">", Operator::Greater),
            ("<", Operator::Less),
            ("=", Operator::Exact),
        ];
        for (prefix, op) in PREFIXES {
            if let Some(rest) = token.strip_prefix(prefix) {
                return Some(Term::Compare(op, Partial::parse(rest)?));
            }
        }
        Some(Term::Compare(Operator::Exact, Partial::parse(token)?))
    }

    fn desugar(&self) -> Vec<Comparator> {
        use Operator::*;

        match self {
            // Shorthand ranges are only desugared for their floor.
            Term::Caret(p) | Term::Tilde(p) => vec![Comparator::new(GreaterEq, p.floor())],
            Term::Hyphen(from, to) => {
                let mut comparators = vec![Comparator::new(GreaterEq, from.floor())];
                if to.is_full() {
                    comparators.push(Comparator::new(LessEq, to.floor()));
                } else if !to.is_any() {
                    comparators.push(Comparator::new(Less, to.ceiling()));
                }
                comparators
            }
            Term::Compare(op, p) if p.is_any() => match op {
                Greater | Less => vec![Comparator::new(Less, "0.0.0-0")],
                _ => vec![Comparator::new(GreaterEq, "0.0.0")],
            },
            Term::Compare(op, p) if p.is_full() => vec![Comparator::new(*op, p.floor())],
            Term::Compare(op, p) => match op {
                Exact => vec![
                    Comparator::new(GreaterEq, p.floor()),
                    Comparator::new(Less, p.ceiling()),
                ],
                GreaterEq => vec![Comparator::new(GreaterEq, p.floor())],
                Greater => vec![Comparator::new(GreaterEq, p.next_floor())],
                Less => vec![Comparator::new(Less, format!("{}-0", p.floor()))],
                LessEq => vec![Comparator::new(Less, p.ceiling())],
            },
        }
    }
}

/// A range split into its `||` alternatives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparatorSets {
    sets: Vec<Vec<Term>>,
    shorthand: Vec<Option<char>>,
}

impl ComparatorSets {
    /// Parse range text. Returns `None` when the text isn't a range this
    /// module understands (tags, URLs, git refs).
    pub fn parse(raw: &str) -> Option<Self> {
        let mut sets = Vec::new();
        let mut shorthand = Vec::new();

        for set in raw.split("||") {
            sets.push(parse_set(set)?);
            shorthand.push(if set.contains('^') {
                Some('^')
            } else if set.contains('~') {
                Some('~')
            } else {
                None
            });
        }

        Some(Self { sets, shorthand })
    }

    /// Number of disjoint comparator sets
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether the range has no sets at all
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Desugared comparators of one set
    pub fn comparators(&self, index: usize) -> Vec<Comparator> {
        self.sets
            .get(index)
            .map(|terms| terms.iter().flat_map(Term::desugar).collect())
            .unwrap_or_default()
    }

    /// Lowest version the range admits: the smallest per-set floor, where a
    /// set's floor is its highest lower bound (`0.0.0` when it has none).
    pub fn floor(&self) -> Result<node_semver::Version> {
        let mut lowest: Option<node_semver::Version> = None;

        for index in 0..self.sets.len() {
            let mut set_floor = parse_version("0.0.0")?;
            for comparator in self.comparators(index) {
                if matches!(
                    comparator.op,
                    Operator::Exact | Operator::Greater | Operator::GreaterEq
                ) {
                    let bound = parse_version(&comparator.version)?;
                    if bound > set_floor {
                        set_floor = bound;
                    }
                }
            }
            lowest = match lowest {
                Some(current) if current <= set_floor => Some(current),
                _ => Some(set_floor),
            };
        }

        match lowest {
            Some(version) => Ok(version),
            None => parse_version("0.0.0"),
        }
    }
}

fn parse_set(set: &str) -> Option<Vec<Term>> {
    let raw: Vec<&str> = set.split_whitespace().collect();

    // Glue detached operators to their versions: `>= 1.2.3` -> `>=1.2.3`.
    let mut tokens: Vec<String> = Vec::with_capacity(raw.len());
    let mut idx = 0;
    while idx < raw.len() {
        let token = raw[idx];
        if is_bare_operator(token) && idx + 1 < raw.len() {
            tokens.push(format!("{}{}", token, raw[idx + 1]));
            idx += 2;
        } else {
            tokens.push(token.to_string());
            idx += 1;
        }
    }

    let mut terms = Vec::with_capacity(tokens.len());
    let mut idx = 0;
    while idx < tokens.len() {
        if idx + 2 < tokens.len() && tokens[idx + 1] == "-" {
            terms.push(Term::Hyphen(
                Partial::parse(&tokens[idx])?,
                Partial::parse(&tokens[idx + 2])?,
            ));
            idx += 3;
        } else {
            terms.push(Term::parse(&tokens[idx])?);
            idx += 1;
        }
    }
    Some(terms)
}

fn is_bare_operator(token: &str) -> bool {
    matches!(token, ">" | ">=" | "<" | "<=" | "=" | "^" | "~" | "~>")
}

/// Raise a range's lower bound to `new_min`.
///
/// - one set written with `^`/`~`: returns the same shorthand on `new_min`
/// - one set of explicit comparators: the first comparator's version becomes
///   `new_min`, its operator and every other comparator are kept
/// - several `||` sets: returned unchanged, compound ranges are not rewritten
///
/// # Errors
/// `InvalidVersion` when `range` is not a valid range or `new_min` is not a
/// valid version.
pub fn rewrite_lower_bound(range: &str, new_min: &str) -> Result<String> {
    let new_min = new_min.trim();
    parse_version(new_min)?;

    if !is_valid_range(range) {
        return Err(Error::invalid_version(range, "not a valid semver range"));
    }
    let sets = ComparatorSets::parse(range)
        .ok_or_else(|| Error::invalid_version(range, "unsupported range syntax"))?;

    if sets.len() != 1 {
        debug!(
            "{} has {} comparator sets, leaving it unchanged",
            range,
            sets.len()
        );
        return Ok(range.to_string());
    }

    if let Some(prefix) = sets.shorthand[0] {
        return Ok(format!("{}{}", prefix, new_min));
    }

    let mut comparators = sets.comparators(0);
    match comparators.first_mut() {
        Some(first) => first.version = new_min.to_string(),
        None => comparators.push(Comparator::new(Operator::GreaterEq, new_min)),
    }

    Ok(comparators
        .iter()
        .map(Comparator::to_string)
        .collect::<Vec<_>>()
        .join(" "))
}
