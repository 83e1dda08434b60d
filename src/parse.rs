use std::collections::HashSet;

use crate::decompose::Operator;
use crate::error::ParseError;
use crate::expression::{Callee, Expression, NodeFactory, TreeFactory};
use crate::lexical;
use crate::registry::{FunctionPathResolver, FunctionRegistry};
use crate::scan::Scan;

#[cfg(feature = "rayon")]
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

/// How to treat function arguments that are themselves equations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NestedEquations {
    /// `sin(x + 1)` parses its argument recursively.
    #[default]
    Allow,
    /// Only plain operands may be passed to functions.
    Reject,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub nested_equations: NestedEquations,
}

/// Builds expression trees against one session's function registry.
#[derive(Clone, Copy)]
pub struct MathParser<'r> {
    registry: &'r FunctionRegistry,
    options: ParseOptions,
}

impl<'r> MathParser<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self::with_options(registry, ParseOptions::default())
    }

    pub fn with_options(registry: &'r FunctionRegistry, options: ParseOptions) -> Self {
        Self { registry, options }
    }

    pub fn registry(&self) -> &'r FunctionRegistry {
        self.registry
    }

    pub fn build(&self, text: &str) -> Result<Expression, ParseError> {
        self.build_with(text, &mut TreeFactory)
    }

    /// Builds `text` with nodes produced by `factory`.
    pub fn build_with<F: NodeFactory>(
        &self,
        text: &str,
        factory: &mut F,
    ) -> Result<F::Node, ParseError> {
        let decomposition = self.decompose(text)?;
        match decomposition.operator {
            None => {
                let leaf = decomposition.left.trim();
                if leaf.is_empty() {
                    return Err(ParseError::MissingOperand {
                        operator: "expression".to_string(),
                    });
                }
                Ok(factory.leaf(leaf))
            }
            Some(Operator::Unary(operator)) => {
                let operand = require_operand(decomposition.left, operator.symbol())?;
                let operand = self.build_with(operand, factory)?;
                Ok(factory.unary(operator, operand))
            }
            Some(Operator::Binary(operator)) => {
                let left = require_operand(decomposition.left, operator.symbol())?;
                let right = require_operand(decomposition.right, operator.symbol())?;
                let left = self.build_with(left, factory)?;
                let right = self.build_with(right, factory)?;
                Ok(factory.binary(operator, left, right))
            }
            Some(Operator::Function(callee)) => self.build_call(&callee, decomposition.left, factory),
        }
    }

    fn build_call<F: NodeFactory>(
        &self,
        callee: &Callee,
        arguments: &str,
        factory: &mut F,
    ) -> Result<F::Node, ParseError> {
        let inputs: Vec<&str> = if arguments.trim().is_empty() {
            Vec::new()
        } else {
            Scan::new(arguments)
                .split_top_level(b',')
                .into_iter()
                .map(str::trim)
                .collect()
        };
        let mut args = Vec::with_capacity(inputs.len());
        for &input in &inputs {
            let input = require_operand(input, &callee.name)?;
            if self.options.nested_equations == NestedEquations::Reject && self.is_equation(input)? {
                return Err(ParseError::EquationArgument {
                    function: callee.name.clone(),
                    argument: input.to_string(),
                });
            }
            args.push(self.build_with(input, factory)?);
        }
        let inputs = inputs.into_iter().map(str::to_string).collect();
        Ok(factory.call(callee, inputs, args))
    }

    /// True if `text` contains operators or function calls, rather than being
    /// a single number, string or reference.
    pub fn is_equation(&self, text: &str) -> Result<bool, ParseError> {
        if lexical::is_quoted(text) {
            return Ok(false);
        }
        Ok(self.decompose(text)?.operator.is_some())
    }
}

fn require_operand<'s>(text: &'s str, operator: &str) -> Result<&'s str, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::MissingOperand {
            operator: operator.to_string(),
        });
    }
    Ok(text)
}

impl Expression {
    /// Every `name` or `object.property` referenced by `input`.
    pub fn parse_reference_names(input: &str) -> HashSet<String> {
        lexical::references(input)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Parse the expression from `input`.
    ///
    /// Names in `input` that `resolver` can locate are registered as script
    /// functions in `registry` first, so they parse as calls rather than
    /// indexed references.
    pub fn parse<R>(
        input: &str,
        registry: &mut FunctionRegistry,
        resolver: &R,
    ) -> Result<Self, ParseError>
    where
        R: FunctionPathResolver + ?Sized,
    {
        registry.refresh_user_defined(input, resolver);
        MathParser::new(registry).build(input)
    }

    /// Parses independent expressions, each against its own copy of
    /// `registry`.
    pub fn parse_many<I, R>(
        inputs: &[I],
        registry: &FunctionRegistry,
        resolver: &R,
    ) -> Vec<Result<Self, ParseError>>
    where
        I: AsRef<str> + Sync,
        R: FunctionPathResolver + Sync + ?Sized,
    {
        let parse_one = |input: &I| {
            let mut session = registry.clone();
            Self::parse(input.as_ref(), &mut session, resolver)
        };

        #[cfg(feature = "rayon")]
        {
            inputs.par_iter().map(parse_one).collect()
        }

        #[cfg(not(feature = "rayon"))]
        {
            inputs.iter().map(parse_one).collect()
        }
    }
}
