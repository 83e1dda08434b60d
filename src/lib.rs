//! Expression and statement parser for mission scripts.
//!
//! Two layers:
//!
//! - [`MathParser`] turns one infix expression such as `a+b*sin(c)-M'^(-1)`
//!   into an [`Expression`] tree. There is no tokenizer: operators are found
//!   by scanning the raw text, and whether a name is a function or an indexed
//!   reference depends on the [`FunctionRegistry`] at hand.
//! - [`Interpreter`] splits a script into logical blocks, tags each one, and
//!   decides for every assignment whether it configures an object once or
//!   runs as an instruction of the mission sequence.
//!
//! # Example
//!
//! ```rust
//! use mission_expr::*;
//!
//! fn script_functions(name: &str) -> Option<FunctionLocation> {
//!     match name {
//!         "Hohmann" => Some(FunctionLocation::Path("functions/Hohmann.gmf".into())),
//!         _ => None,
//!     }
//! }
//!
//! let mut registry = FunctionRegistry::new();
//! let parsed = Expression::parse("-sin(x)^2 + Hohmann(r1, r2)", &mut registry, &script_functions).unwrap();
//!
//! let Expression::Binary(BinaryOperator::Add, left, right) = parsed else {
//!     unreachable!()
//! };
//! assert!(matches!(*left, Expression::Unary(UnaryOperator::Negate, _)));
//! assert!(matches!(*right, Expression::Call(ref call) if call.is_user_defined()));
//! assert_eq!(right.leaves(), ["r1", "r2"]);
//! ```

mod assignment;
mod decompose;
mod error;
mod expression;
mod interpreter;
mod lexical;
mod parse;
mod registry;
mod scan;
mod statement;

/// Uses the [`pest`] parsing expression grammar language.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use assignment::*;
pub use decompose::{Decomposition, Operator};
pub use error::*;
pub use expression::*;
pub use interpreter::*;
pub use lexical::{Declaration, DeclaredName};
pub use parse::*;
pub use registry::*;
pub use statement::{classify, read_blocks, BlockKind, Command, CommandForm, LogicalBlock};

#[cfg(test)]
mod tests {
    use super::*;

    struct NoObjects;

    impl ObjectResolver for NoObjects {
        fn resolve_property(&self, _lhs: &str) -> Option<PropertyInfo> {
            None
        }
    }

    #[test]
    fn expression_round_trip_through_leaves() {
        let mut registry = FunctionRegistry::new();
        let parsed =
            Expression::parse("2 * (foo + bar) * -baz", &mut registry, &NoFunctions).unwrap();
        assert_eq!(parsed.leaves(), ["2", "foo", "bar", "baz"]);
        let Expression::Binary(BinaryOperator::Multiply, _, right) = parsed else {
            panic!("expected a product");
        };
        assert_eq!(
            *right,
            Expression::unary(UnaryOperator::Negate, Expression::leaf("baz"))
        );
    }

    #[test]
    fn op_precedence() {
        let registry = FunctionRegistry::new();
        let parser = MathParser::new(&registry);
        let one_two = Expression::binary(
            BinaryOperator::Multiply,
            Expression::leaf("1"),
            Expression::leaf("2"),
        );
        let three_four = Expression::binary(
            BinaryOperator::Multiply,
            Expression::leaf("3"),
            Expression::leaf("4"),
        );
        assert_eq!(
            parser.build("1 * 2 + 3 * 4").unwrap(),
            Expression::binary(BinaryOperator::Add, one_two, three_four)
        );
        assert_eq!(
            parser.build("4 ^ 3 ^ 2").unwrap(),
            Expression::binary(
                BinaryOperator::Power,
                Expression::binary(BinaryOperator::Power, Expression::leaf("4"), Expression::leaf("3")),
                Expression::leaf("2")
            )
        );
    }

    #[test]
    fn errors_carry_lines() {
        let script = "\
Create Spacecraft Sat % comment
Sat.X = sin()";
        let error = Interpreter::new(&NoFunctions, &NoObjects)
            .interpret(script)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "line 2: missing operand for 'sin'"
        );
    }

    #[test]
    fn empty_script() {
        let program = Interpreter::new(&NoFunctions, &NoObjects).interpret("").unwrap();
        assert!(program.instructions.is_empty());
        let program = Interpreter::new(&NoFunctions, &NoObjects)
            .interpret("% only a comment\n;")
            .unwrap();
        assert!(program.instructions.is_empty());
    }
}
