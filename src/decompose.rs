//! Splitting one expression string into operator and operand texts.
//!
//! [`MathParser::decompose`] tries a fixed chain of stages. A stage either
//! decides (returns a [`Decomposition`]) or defers to the next one; when no
//! stage decides, the text is a leaf.

use crate::error::ParseError;
use crate::expression::{BinaryOperator, Callee, UnaryOperator};
use crate::lexical;
use crate::parse::MathParser;
use crate::registry::{Arity, FunctionKind};
use crate::scan::{OperatorSymbol, Scan, INVERSE_MARKER};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Unary(UnaryOperator),
    Binary(BinaryOperator),
    /// `left` holds the text between the call's parentheses.
    Function(Callee),
}

/// Result of one decomposition step.
///
/// `operator == None` means the text is a leaf, whose (possibly narrowed)
/// text is `left`. Unary operators and function calls leave `right` empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decomposition<'s> {
    pub operator: Option<Operator>,
    pub left: &'s str,
    pub right: &'s str,
}

impl<'s> Decomposition<'s> {
    pub fn leaf(text: &'s str) -> Self {
        Self {
            operator: None,
            left: text,
            right: "",
        }
    }

    fn unary(operator: UnaryOperator, operand: &'s str) -> Self {
        Self {
            operator: Some(Operator::Unary(operator)),
            left: operand,
            right: "",
        }
    }

    fn binary(operator: BinaryOperator, left: &'s str, right: &'s str) -> Self {
        Self {
            operator: Some(Operator::Binary(operator)),
            left,
            right,
        }
    }

    fn call(callee: Callee, arguments: &'s str) -> Self {
        Self {
            operator: Some(Operator::Function(callee)),
            left: arguments,
            right: "",
        }
    }
}

type Lowest = Option<(OperatorSymbol, usize)>;
type Stage<'s> = Result<Option<Decomposition<'s>>, ParseError>;

impl MathParser<'_> {
    pub fn decompose<'s>(&self, text: &'s str) -> Result<Decomposition<'s>, ParseError> {
        let text = text.trim();
        if text.is_empty() || lexical::is_numeric_literal(text) || lexical::is_quoted(text) {
            return Ok(Decomposition::leaf(text));
        }
        let scan = Scan::new(text);
        if scan.is_group_literal() {
            return Ok(Decomposition::leaf(text));
        }
        scan.check_balance()?;
        scan.check_matrix_adjacency()?;
        if scan.find_juxtaposed_group().is_some() {
            return Err(ParseError::MissingOperator {
                text: text.to_string(),
            });
        }

        let lowest = scan.find_lowest_operator(0)?;
        log::trace!("decompose \"{text}\": lowest operator {lowest:?}");

        if let Some(found) = self.parenthesis_stage(&scan, lowest)? {
            return Ok(found);
        }
        if let Some(found) = additive_stage(&scan, lowest) {
            return Ok(found);
        }
        if let Some(found) = multiplicative_stage(&scan, lowest)? {
            return Ok(found);
        }
        if let Some(found) = power_stage(&scan, lowest) {
            return Ok(found);
        }
        if let Some(found) = self.unary_stage(&scan)? {
            return Ok(found);
        }
        if let Some(found) = self.call_form(&scan, &[FunctionKind::Scalar, FunctionKind::UserDefined])? {
            return Ok(found);
        }
        if let Some(found) = self.matrix_stage(&scan)? {
            return Ok(found);
        }
        if let Some(found) = self.call_form(&scan, &[FunctionKind::UnitConversion])? {
            return Ok(found);
        }
        Ok(Decomposition::leaf(text))
    }

    fn parenthesis_stage<'s>(&self, scan: &Scan<'s>, lowest: Lowest) -> Stage<'s> {
        let text = scan.text();
        if scan.first_open_paren(0).is_none() {
            return Ok(None);
        }
        match lowest {
            // Additive splits bind loosest; leave them to the next stage.
            Some((OperatorSymbol::Plus | OperatorSymbol::Minus, _)) => return Ok(None),
            Some((symbol @ (OperatorSymbol::Times | OperatorSymbol::Divide), position)) => {
                return split_multiplicative(text, symbol, position).map(Some);
            }
            Some((symbol, position)) if !scan.has_leading_sign() => {
                return split_power_tier(text, symbol, position).map(Some);
            }
            // A signed power, e.g. `-x^(2)`: negate the whole power later.
            Some(_) => return Ok(None),
            None => {}
        }
        if let Some(call) = self.call_form(scan, &[])? {
            return Ok(Some(call));
        }
        if scan.is_wrapped() {
            return self.decompose(&text[1..text.len() - 1]).map(Some);
        }
        // Anything left is either an inverse marker for the matrix stage or
        // an indexed reference such as `arr(1, 2)`.
        Ok(None)
    }

    fn unary_stage<'s>(&self, scan: &Scan<'s>) -> Stage<'s> {
        let text = scan.text();
        if let Some(operand) = text.strip_prefix('-') {
            return Ok(Some(Decomposition::unary(UnaryOperator::Negate, operand)));
        }
        if let Some(operand) = text.strip_prefix('+') {
            return self.decompose(operand).map(Some);
        }
        Ok(None)
    }

    fn matrix_stage<'s>(&self, scan: &Scan<'s>) -> Stage<'s> {
        if let Some(call) = self.call_form(scan, &[FunctionKind::Matrix])? {
            return Ok(Some(call));
        }
        let text = scan.text();
        if scan.ends_with_marker() {
            let operand = &text[..text.len() - INVERSE_MARKER.len()];
            return Ok(Some(Decomposition::unary(UnaryOperator::Inverse, operand)));
        }
        if scan.ends_with_transpose() {
            let operand = &text[..text.len() - 1];
            return Ok(Some(Decomposition::unary(UnaryOperator::Transpose, operand)));
        }
        Ok(None)
    }

    /// `name(arguments)` spanning the whole text, where `name` is a function
    /// of one of `kinds` (any kind when `kinds` is empty).
    fn call_form<'s>(&self, scan: &Scan<'s>, kinds: &[FunctionKind]) -> Stage<'s> {
        let text = scan.text();
        let Some(open) = scan.first_open_paren(0) else {
            return Ok(None);
        };
        let name = text[..open].trim();
        let Some(kind) = self.registry().kind_of(name) else {
            return Ok(None);
        };
        if !kinds.is_empty() && !kinds.contains(&kind) {
            return Ok(None);
        }
        if scan.matching_paren(open)? != text.len() - 1 {
            return Ok(None);
        }
        let arguments = &text[open + 1..text.len() - 1];
        let count = if arguments.trim().is_empty() {
            0
        } else {
            Scan::new(arguments).split_top_level(b',').len()
        };
        if let Some(Arity::Exact(expected)) = self.registry().arity(name).filter(|a| !a.accepts(count)) {
            return Err(if expected == 1 && count == 0 {
                ParseError::MissingOperand {
                    operator: name.to_string(),
                }
            } else {
                ParseError::InvalidFunctionArity {
                    function: name.to_string(),
                    expected,
                    found: count,
                }
            });
        }
        log::trace!("call to {kind:?} function '{name}' with {count} argument(s)");
        let callee = Callee {
            name: name.to_string(),
            kind,
        };
        Ok(Some(Decomposition::call(callee, arguments)))
    }
}

fn additive_stage<'s>(scan: &Scan<'s>, lowest: Lowest) -> Option<Decomposition<'s>> {
    let (symbol, position) = lowest?;
    let mut operator = match symbol {
        OperatorSymbol::Plus => BinaryOperator::Add,
        OperatorSymbol::Minus => BinaryOperator::Subtract,
        _ => return None,
    };
    let text = scan.text();
    let left = &text[..position];
    let mut right = &text[position + 1..];

    // Fold the sign of the right operand into the operator.
    let trimmed = right.trim_start();
    if let Some(rest) = trimmed.strip_prefix('+') {
        right = rest;
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        right = rest;
        operator = match operator {
            BinaryOperator::Add => BinaryOperator::Subtract,
            _ => BinaryOperator::Add,
        };
    }
    Some(Decomposition::binary(operator, left, right))
}

fn multiplicative_stage<'s>(scan: &Scan<'s>, lowest: Lowest) -> Stage<'s> {
    match lowest {
        Some((symbol @ (OperatorSymbol::Times | OperatorSymbol::Divide), position)) => {
            split_multiplicative(scan.text(), symbol, position).map(Some)
        }
        _ => Ok(None),
    }
}

fn power_stage<'s>(scan: &Scan<'s>, lowest: Lowest) -> Option<Decomposition<'s>> {
    match lowest? {
        (OperatorSymbol::Caret, position) if !scan.has_leading_sign() => {
            let text = scan.text();
            Some(Decomposition::binary(
                BinaryOperator::Power,
                &text[..position],
                &text[position + 1..],
            ))
        }
        _ => None,
    }
}

fn split_multiplicative(
    text: &str,
    symbol: OperatorSymbol,
    position: usize,
) -> Result<Decomposition<'_>, ParseError> {
    let (left, right) = (&text[..position], &text[position + 1..]);
    if left.trim().is_empty() || right.trim().is_empty() {
        return Err(ParseError::MissingOperand {
            operator: symbol.as_char().to_string(),
        });
    }
    let operator = match symbol {
        OperatorSymbol::Times => BinaryOperator::Multiply,
        _ => BinaryOperator::Divide,
    };
    Ok(Decomposition::binary(operator, left, right))
}

fn split_power_tier(
    text: &str,
    symbol: OperatorSymbol,
    position: usize,
) -> Result<Decomposition<'_>, ParseError> {
    let (left, right) = (&text[..position], &text[position + 1..]);
    if symbol == OperatorSymbol::Caret {
        return Ok(Decomposition::binary(BinaryOperator::Power, left, right));
    }
    match right.trim_start().chars().next() {
        None => Ok(Decomposition::unary(UnaryOperator::Transpose, left)),
        Some(found) => Err(ParseError::UnknownOperatorAdjacency {
            operator: "'".to_string(),
            found,
        }),
    }
}
