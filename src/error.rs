use thiserror::Error;

use crate::assignment::PropertyType;

/// Failure to turn one expression string into a tree.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Parenthesis counts never return to zero, or a `)` has no opener.
    #[error("unbalanced parenthesis in \"{text}\"")]
    UnbalancedParenthesis { text: String },

    /// A binary operator, negation target or required function argument is empty.
    #[error("missing operand for '{operator}'")]
    MissingOperand { operator: String },

    /// Two parenthesized groups with nothing between them, e.g. `(a)(b)`.
    #[error("missing operator between groups in \"{text}\"")]
    MissingOperator { text: String },

    #[error("function '{function}' expects {expected} argument(s), found {found}")]
    InvalidFunctionArity {
        function: String,
        expected: usize,
        found: usize,
    },

    /// A transpose or inverse marker directly followed by something that is
    /// not an operator.
    #[error("unexpected '{found}' after matrix operator '{operator}'")]
    UnknownOperatorAdjacency { operator: String, found: char },

    /// Only raised when nested equations are rejected by [`crate::ParseOptions`].
    #[error("argument \"{argument}\" of '{function}' is an equation")]
    EquationArgument { function: String, argument: String },
}

/// A script-level failure, always tagged with the line of the statement that
/// raised it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    pub kind: ScriptErrorKind,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ScriptErrorKind {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("\"{rhs}\" is an equation but '{lhs}' is a {property_type:?} field")]
    AmbiguousEquationContext {
        lhs: String,
        rhs: String,
        property_type: PropertyType,
    },

    #[error("invalid statement \"{text}\": {reason}")]
    InvalidStatement { text: String, reason: String },

    #[error("'{name}' is not declared")]
    UndeclaredName { name: String },

    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },
}

impl ScriptErrorKind {
    pub fn at(self, line: usize) -> ScriptError {
        ScriptError { line, kind: self }
    }
}

impl ScriptError {
    pub(crate) fn parse(line: usize, error: ParseError) -> Self {
        ScriptErrorKind::Parse(error).at(line)
    }
}
