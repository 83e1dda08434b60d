//! Locating operators in raw expression text.
//!
//! There is no token stream: an expression is inspected as text, and every
//! position that can never hold an operator or a grouping parenthesis is
//! masked out up front. Masked positions are quoted strings, `[...]` and
//! `{...}` literals, signs of scientific-notation exponents, and the five
//! characters of each matrix inverse marker `^(-1)`.

use std::collections::BTreeMap;
use std::ops::Range;

use bitvec::prelude::*;

use crate::error::ParseError;

/// Postfix marker for matrix inversion. Never a power operation.
pub const INVERSE_MARKER: &str = "^(-1)";

/// Characters allowed right after a transpose or inverse marker.
const MATRIX_OPERATOR_FOLLOWERS: &[u8] = b"+-*/^')],;}";

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperatorSymbol {
    Plus,
    Minus,
    Times,
    Divide,
    Caret,
    Quote,
}

/// Precedence tiers, loosest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Additive,
    Multiplicative,
    Power,
}

impl OperatorSymbol {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'+' => Some(Self::Plus),
            b'-' => Some(Self::Minus),
            b'*' => Some(Self::Times),
            b'/' => Some(Self::Divide),
            b'^' => Some(Self::Caret),
            b'\'' => Some(Self::Quote),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Plus => '+',
            Self::Minus => '-',
            Self::Times => '*',
            Self::Divide => '/',
            Self::Caret => '^',
            Self::Quote => '\'',
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            Self::Plus | Self::Minus => Tier::Additive,
            Self::Times | Self::Divide => Tier::Multiplicative,
            Self::Caret | Self::Quote => Tier::Power,
        }
    }
}

/// One expression string with its masked positions precomputed.
pub struct Scan<'a> {
    text: &'a str,
    mask: BitVec,
    /// Start of every inverse marker.
    markers: Vec<usize>,
    /// Outermost `[...]` / `{...}` literals.
    groups: Vec<Range<usize>>,
}

impl<'a> Scan<'a> {
    pub fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut mask = bitvec![0; len];
        let mut markers = Vec::new();
        let mut groups = Vec::new();
        let mut group_start = 0;
        let mut group_depth = 0usize;

        let mut i = 0;
        while i < len {
            let byte = bytes[i];
            if byte == b'"' || (byte == b'\'' && !follows_operand(bytes, i)) {
                let end = bytes[i + 1..]
                    .iter()
                    .position(|&c| c == byte)
                    .map_or(len - 1, |p| i + 1 + p);
                mask[i..=end].fill(true);
                i = end + 1;
                continue;
            }
            match byte {
                b'[' | b'{' => {
                    if group_depth == 0 {
                        group_start = i;
                    }
                    group_depth += 1;
                    mask.set(i, true);
                }
                b']' | b'}' if group_depth > 0 => {
                    mask.set(i, true);
                    group_depth -= 1;
                    if group_depth == 0 {
                        groups.push(group_start..i + 1);
                    }
                }
                _ if group_depth > 0 => mask.set(i, true),
                b'^' if bytes[i..].starts_with(INVERSE_MARKER.as_bytes()) => {
                    mask[i..i + INVERSE_MARKER.len()].fill(true);
                    markers.push(i);
                    i += INVERSE_MARKER.len();
                    continue;
                }
                b'e' | b'E' if is_exponent(bytes, i) => mask.set(i + 1, true),
                _ => {}
            }
            i += 1;
        }

        Self {
            text,
            mask,
            markers,
            groups,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    /// Unmasked bytes with their positions.
    fn live(&self, range: Range<usize>) -> impl Iterator<Item = (usize, u8)> + '_ {
        range
            .filter(|&i| !self.mask[i])
            .map(|i| (i, self.bytes()[i]))
    }

    fn unbalanced(&self) -> ParseError {
        ParseError::UnbalancedParenthesis {
            text: self.text.to_string(),
        }
    }

    pub fn check_balance(&self) -> Result<(), ParseError> {
        self.segments(0).map(|_| ())
    }

    /// Position of the first grouping `(` at or after `from`.
    pub fn first_open_paren(&self, from: usize) -> Option<usize> {
        self.live(from..self.text.len())
            .find(|&(_, b)| b == b'(')
            .map(|(i, _)| i)
    }

    pub fn matching_paren(&self, open: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        for (i, byte) in self.live(open..self.text.len()) {
            match byte {
                b'(' => depth += 1,
                b')' => {
                    depth = depth.checked_sub(1).ok_or_else(|| self.unbalanced())?;
                    if depth == 0 {
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(self.unbalanced())
    }

    /// True if one parenthesis pair encloses the whole text.
    pub fn is_wrapped(&self) -> bool {
        let len = self.text.len();
        len >= 2
            && self.bytes()[0] == b'('
            && !self.mask[0]
            && self.matching_paren(0).is_ok_and(|close| close == len - 1)
    }

    /// True if the whole text is one `[...]` or `{...}` literal.
    pub fn is_group_literal(&self) -> bool {
        self.groups.first() == Some(&(0..self.text.len()))
    }

    pub fn ends_with_marker(&self) -> bool {
        let len = self.text.len();
        len >= INVERSE_MARKER.len() && self.markers.last() == Some(&(len - INVERSE_MARKER.len()))
    }

    pub fn ends_with_transpose(&self) -> bool {
        let len = self.text.len();
        len >= 2 && self.bytes()[len - 1] == b'\'' && !self.mask[len - 1]
    }

    /// Maximal runs of text outside any grouping parenthesis, from `start`.
    pub fn segments(&self, start: usize) -> Result<Vec<Range<usize>>, ParseError> {
        let mut segments = Vec::new();
        let mut segment_start = start;
        let mut depth = 0usize;
        for (i, byte) in self.live(start..self.text.len()) {
            match byte {
                b'(' => {
                    if depth == 0 && segment_start < i {
                        segments.push(segment_start..i);
                    }
                    depth += 1;
                }
                b')' => {
                    depth = depth.checked_sub(1).ok_or_else(|| self.unbalanced())?;
                    if depth == 0 {
                        segment_start = i + 1;
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(self.unbalanced());
        }
        if segment_start < self.text.len() {
            segments.push(segment_start..self.text.len());
        }
        Ok(segments)
    }

    /// The operator an expression should be split on, if any.
    ///
    /// Each top-level segment contributes at most one candidate: its rightmost
    /// binary `+`/`-`, else its rightmost `*`/`/`, else its rightmost `^`/`'`.
    /// The loosest tier present wins, and within a tier the rightmost
    /// recorded position wins so that chains associate to the left.
    pub fn find_lowest_operator(
        &self,
        start: usize,
    ) -> Result<Option<(OperatorSymbol, usize)>, ParseError> {
        let mut recorded = BTreeMap::new();
        for segment in self.segments(start)? {
            if let Some((symbol, position)) = self.segment_candidate(segment) {
                recorded.insert(symbol, position);
            }
        }
        for tier in [Tier::Additive, Tier::Multiplicative, Tier::Power] {
            let lowest = recorded
                .iter()
                .filter(|(symbol, _)| symbol.tier() == tier)
                .max_by_key(|(_, &position)| position);
            if let Some((&symbol, &position)) = lowest {
                return Ok(Some((symbol, position)));
            }
        }
        Ok(None)
    }

    fn segment_candidate(&self, segment: Range<usize>) -> Option<(OperatorSymbol, usize)> {
        let mut additive = None;
        let mut multiplicative = None;
        let mut power = None;
        for (i, byte) in self.live(segment) {
            let Some(symbol) = OperatorSymbol::from_byte(byte) else {
                continue;
            };
            match symbol.tier() {
                Tier::Additive if !self.is_sign(i) => additive = Some((symbol, i)),
                Tier::Additive => {}
                Tier::Multiplicative => multiplicative = Some((symbol, i)),
                Tier::Power => power = Some((symbol, i)),
            }
        }
        additive.or(multiplicative).or(power)
    }

    /// A `+`/`-` with nothing but an opener or another operator before it is
    /// the sign of the following operand.
    pub fn is_sign(&self, position: usize) -> bool {
        let previous = self.bytes()[..position]
            .iter()
            .rev()
            .find(|b| !b.is_ascii_whitespace());
        match previous {
            None => true,
            Some(b) => b"(,=;+-*/^".contains(b),
        }
    }

    pub fn has_leading_sign(&self) -> bool {
        self.text
            .bytes()
            .position(|b| !b.is_ascii_whitespace())
            .is_some_and(|i| matches!(self.bytes()[i], b'+' | b'-'))
    }

    /// Splits on `separator` outside parentheses, strings and literals.
    pub fn split_top_level(&self, separator: u8) -> Vec<&'a str> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut part_start = 0;
        for (i, byte) in self.live(0..self.text.len()) {
            match byte {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b if b == separator && depth == 0 => {
                    parts.push(&self.text[part_start..i]);
                    part_start = i + 1;
                }
                _ => {}
            }
        }
        parts.push(&self.text[part_start..]);
        parts
    }

    /// First position of `byte` outside parentheses, strings and literals.
    pub fn find_top_level(&self, byte: u8) -> Option<usize> {
        let mut depth = 0usize;
        for (i, b) in self.live(0..self.text.len()) {
            match b {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b if b == byte && depth == 0 => return Some(i),
                _ => {}
            }
        }
        None
    }

    /// A `(` directly after a `)`, as in `(a)(b)`.
    pub fn find_juxtaposed_group(&self) -> Option<usize> {
        let mut previous = None;
        for (i, byte) in self.live(0..self.text.len()) {
            if byte.is_ascii_whitespace() {
                continue;
            }
            if byte == b'(' && previous == Some(b')') {
                return Some(i);
            }
            previous = Some(byte);
        }
        None
    }

    /// First unmasked position holding one of `bytes`, at any paren depth.
    pub fn find_any(&self, bytes: &[u8]) -> Option<usize> {
        self.live(0..self.text.len())
            .find(|(_, b)| bytes.contains(b))
            .map(|(i, _)| i)
    }

    /// Rejects a transpose or inverse marker followed by anything other than
    /// an operator or a closer.
    pub fn check_matrix_adjacency(&self) -> Result<(), ParseError> {
        let transposes = self
            .live(0..self.text.len())
            .filter(|&(_, b)| b == b'\'')
            .map(|(i, _)| ("'", i + 1));
        let markers = self
            .markers
            .iter()
            .map(|&i| (INVERSE_MARKER, i + INVERSE_MARKER.len()));
        for (operator, after) in transposes.chain(markers) {
            let next = self.text[after..].trim_start().chars().next();
            let allowed = |c: &char| u8::try_from(*c).is_ok_and(|b| MATRIX_OPERATOR_FOLLOWERS.contains(&b));
            if let Some(found) = next.filter(|c| !allowed(c)) {
                return Err(ParseError::UnknownOperatorAdjacency {
                    operator: operator.to_string(),
                    found,
                });
            }
        }
        Ok(())
    }
}

/// A quote right after an operand or closer is a transpose, not a string.
fn follows_operand(bytes: &[u8], position: usize) -> bool {
    position > 0
        && matches!(bytes[position - 1], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'.' | b')' | b']' | b'}' | b'\'')
}

/// `e`/`E` at `position` followed by a signed digit, inside a number.
fn is_exponent(bytes: &[u8], position: usize) -> bool {
    let (Some(&sign), Some(&digit)) = (bytes.get(position + 1), bytes.get(position + 2)) else {
        return false;
    };
    if !matches!(sign, b'+' | b'-') || !digit.is_ascii_digit() {
        return false;
    }
    let mut start = position;
    let mut has_digit = false;
    while start > 0 && (bytes[start - 1].is_ascii_digit() || bytes[start - 1] == b'.') {
        has_digit |= bytes[start - 1].is_ascii_digit();
        start -= 1;
    }
    has_digit && (start == 0 || !(bytes[start - 1].is_ascii_alphabetic() || bytes[start - 1] == b'_'))
}
