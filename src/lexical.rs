//! Token-level helpers backed by the [`pest`] grammar in `grammar.pest`.

use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct LexicalParser;

pub type GrammarError = pest::error::Error<Rule>;

/// True if `text` is a single, optionally signed, numeric literal such as
/// `42`, `-.5` or `+6.02E+23`.
pub fn is_numeric_literal(text: &str) -> bool {
    LexicalParser::parse(Rule::numeric_literal, text.trim()).is_ok()
}

/// True if the whole of `text` is one quoted string.
pub fn is_quoted(text: &str) -> bool {
    let text = text.trim();
    match LexicalParser::parse(Rule::string_literal, text) {
        Ok(mut pairs) => pairs.next().is_some_and(|p| p.as_str().len() == text.len()),
        Err(_) => false,
    }
}

/// Every `name` or `object.property` reference in `text`, in source order.
///
/// Quoted strings are skipped, and a quote that follows an operand is read as
/// a transpose rather than the start of a string.
pub fn references(text: &str) -> Vec<&str> {
    let Ok(pairs) = LexicalParser::parse(Rule::tokens, text) else {
        return Vec::new();
    };
    pairs
        .flatten()
        .filter(|p| p.as_rule() == Rule::reference)
        .map(|p| p.as_str())
        .collect()
}

/// The leading name of a reference: `Sat` for `Sat.X`, `arr` for `arr(2)`.
pub fn reference_head(reference: &str) -> &str {
    let reference = reference.trim();
    let end = reference
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(reference.len());
    &reference[..end]
}

/// Parsed `Create <Type> name[, name]...` statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    pub type_name: String,
    pub names: Vec<DeclaredName>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclaredName {
    pub name: String,
    /// Empty unless the type is indexable.
    pub dimensions: Vec<usize>,
}

pub fn parse_declaration(text: &str) -> Result<Declaration, GrammarError> {
    let pairs = LexicalParser::parse(Rule::declaration, text.trim())?;
    let mut type_name = String::new();
    let mut names = Vec::new();
    for pair in pairs.flatten() {
        match pair.as_rule() {
            Rule::type_name => type_name = pair.as_str().to_string(),
            Rule::declared_name => {
                let mut inner = pair.into_inner();
                let name = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                let dimensions = inner
                    .next()
                    .map(|dims| {
                        dims.into_inner()
                            .filter_map(|d| d.as_str().parse::<usize>().ok())
                            .collect()
                    })
                    .unwrap_or_default();
                names.push(DeclaredName { name, dimensions });
            }
            _ => {}
        }
    }
    Ok(Declaration { type_name, names })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_literals() {
        for literal in ["1", "-1", "+2.5", ".5", "1.", "1e5", "1.5e-3", "-6.02E+23"] {
            assert!(is_numeric_literal(literal), "{literal}");
        }
        for not_literal in ["", "-", "e5", "1e", "1e-", "--1", "1+2", "x1", "1.5.2"] {
            assert!(!is_numeric_literal(not_literal), "{not_literal}");
        }
    }

    #[test]
    fn quoted_strings() {
        assert!(is_quoted("'hello world'"));
        assert!(is_quoted("  \"a-b\"  "));
        assert!(!is_quoted("'a' + 'b'"));
        assert!(!is_quoted("A'"));
    }

    #[test]
    fn references_skip_strings_and_numbers() {
        let refs = references("Sat.X + 2.5e-3*sin(theta) - 'not a ref' + A'*B'");
        assert_eq!(refs, ["Sat.X", "sin", "theta", "A", "B"]);
    }

    #[test]
    fn reference_heads() {
        assert_eq!(reference_head("Sat.X"), "Sat");
        assert_eq!(reference_head("arr(2,3)"), "arr");
        assert_eq!(reference_head("Var1"), "Var1");
    }

    #[test]
    fn declarations() {
        let decl = parse_declaration("Create Spacecraft Sat1, Sat2 Sat3;").unwrap();
        assert_eq!(decl.type_name, "Spacecraft");
        let names: Vec<_> = decl.names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["Sat1", "Sat2", "Sat3"]);

        let decl = parse_declaration("Create Array A[3, 3] v[6]").unwrap();
        assert_eq!(decl.names[0].dimensions, [3, 3]);
        assert_eq!(decl.names[1].dimensions, [6]);

        assert!(parse_declaration("CreateSpacecraft Sat").is_err());
        assert!(parse_declaration("Create Spacecraft").is_err());
    }
}
