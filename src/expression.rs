use crate::registry::FunctionKind;

/// Parsed expression tree.
///
/// Leaves keep their source text (numbers, strings, names, `object.property`
/// and array element references). Resolving them is up to the evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Leaf(String),

    // Postfix matrix ops and negation.
    Unary(UnaryOperator, Box<Expression>),

    Binary(BinaryOperator, Box<Expression>, Box<Expression>),

    Call(FunctionCall),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Transpose,
    Inverse,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Transpose => "'",
            Self::Inverse => crate::scan::INVERSE_MARKER,
        }
    }
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Power => "^",
        }
    }
}

/// A function name as matched against the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Callee {
    pub name: String,
    pub kind: FunctionKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub kind: FunctionKind,
    pub args: Vec<Expression>,
    /// Raw argument text, in order. Only filled for user-defined functions,
    /// which are bound by name and signature rather than by tree shape.
    pub inputs: Vec<String>,
}

impl FunctionCall {
    pub fn is_user_defined(&self) -> bool {
        self.kind == FunctionKind::UserDefined
    }
}

impl Expression {
    pub fn leaf(text: impl Into<String>) -> Self {
        Self::Leaf(text.into())
    }

    pub fn unary(operator: UnaryOperator, operand: Expression) -> Self {
        Self::Unary(operator, Box::new(operand))
    }

    pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Self {
        Self::Binary(operator, Box::new(left), Box::new(right))
    }

    /// Every leaf text, left to right.
    pub fn leaves(&self) -> Vec<&str> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a str>) {
        match self {
            Self::Leaf(text) => leaves.push(text),
            Self::Unary(_, operand) => operand.collect_leaves(leaves),
            Self::Binary(_, left, right) => {
                left.collect_leaves(leaves);
                right.collect_leaves(leaves);
            }
            Self::Call(call) => call.args.iter().for_each(|arg| arg.collect_leaves(leaves)),
        }
    }
}

/// Builds nodes on behalf of the parser.
///
/// The parser never constructs [`Expression`]s directly, so callers can
/// produce their own node types (or validate while building) by supplying a
/// different factory.
pub trait NodeFactory {
    type Node;

    fn leaf(&mut self, text: &str) -> Self::Node;

    fn unary(&mut self, operator: UnaryOperator, operand: Self::Node) -> Self::Node;

    fn binary(&mut self, operator: BinaryOperator, left: Self::Node, right: Self::Node)
        -> Self::Node;

    fn call(&mut self, callee: &Callee, inputs: Vec<String>, args: Vec<Self::Node>) -> Self::Node;
}

/// Produces plain [`Expression`] trees.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeFactory;

impl NodeFactory for TreeFactory {
    type Node = Expression;

    fn leaf(&mut self, text: &str) -> Expression {
        Expression::leaf(text)
    }

    fn unary(&mut self, operator: UnaryOperator, operand: Expression) -> Expression {
        Expression::unary(operator, operand)
    }

    fn binary(&mut self, operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
        Expression::binary(operator, left, right)
    }

    fn call(&mut self, callee: &Callee, inputs: Vec<String>, args: Vec<Expression>) -> Expression {
        let inputs = if callee.kind == FunctionKind::UserDefined {
            inputs
        } else {
            Vec::new()
        };
        Expression::Call(FunctionCall {
            name: callee.name.clone(),
            kind: callee.kind,
            args,
            inputs,
        })
    }
}
