use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use once_cell::sync::Lazy;

use crate::lexical;

/// Which family a callable name belongs to.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Matrix,
    UnitConversion,
    UserDefined,
}

/// Number of top-level arguments a function accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(n) => n == count,
            Self::Variadic => true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BuiltinFunction {
    pub kind: FunctionKind,
    pub arity: Arity,
}

/// The fixed set of built-in functions, keyed by canonical (lower-case first
/// letter) name.
pub struct BuiltinFunctions {
    functions: HashMap<&'static str, BuiltinFunction>,
}

impl BuiltinFunctions {
    fn new() -> Self {
        use Arity::*;
        use FunctionKind::*;

        let table: &[(&str, FunctionKind, Arity)] = &[
            ("sin", Scalar, Exact(1)),
            ("cos", Scalar, Exact(1)),
            ("tan", Scalar, Exact(1)),
            ("asin", Scalar, Exact(1)),
            ("acos", Scalar, Exact(1)),
            ("atan", Scalar, Exact(1)),
            ("atan2", Scalar, Exact(2)),
            ("sinh", Scalar, Exact(1)),
            ("cosh", Scalar, Exact(1)),
            ("tanh", Scalar, Exact(1)),
            ("log", Scalar, Exact(1)),
            ("log10", Scalar, Exact(1)),
            ("exp", Scalar, Exact(1)),
            ("sqrt", Scalar, Exact(1)),
            ("abs", Scalar, Exact(1)),
            ("mod", Scalar, Exact(2)),
            ("floor", Scalar, Exact(1)),
            ("ceil", Scalar, Exact(1)),
            ("fix", Scalar, Exact(1)),
            ("round", Scalar, Exact(1)),
            ("transpose", Matrix, Exact(1)),
            ("det", Matrix, Exact(1)),
            ("inv", Matrix, Exact(1)),
            ("norm", Matrix, Exact(1)),
            ("degToRad", UnitConversion, Exact(1)),
            ("radToDeg", UnitConversion, Exact(1)),
            ("deg2Rad", UnitConversion, Exact(1)),
            ("rad2Deg", UnitConversion, Exact(1)),
        ];
        Self {
            functions: table
                .iter()
                .map(|&(name, kind, arity)| (name, BuiltinFunction { kind, arity }))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFunction> {
        if let Some(f) = self.functions.get(name) {
            return Some(*f);
        }
        let lowered = lower_first(name)?;
        self.functions.get(lowered.as_str()).copied()
    }
}

static BUILTINS: Lazy<BuiltinFunctions> = Lazy::new(BuiltinFunctions::new);

/// `Sin` -> `sin`; `None` when the first character is already lower-case.
fn lower_first(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;
    if !first.is_uppercase() {
        return None;
    }
    Some(first.to_lowercase().chain(chars).collect())
}

/// Where a user-defined function lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FunctionLocation {
    Path(PathBuf),
    Signature(String),
}

/// Looks up script functions by name, typically on a function search path.
pub trait FunctionPathResolver {
    fn resolve(&self, identifier: &str) -> Option<FunctionLocation>;
}

impl<F> FunctionPathResolver for F
where
    F: Fn(&str) -> Option<FunctionLocation>,
{
    fn resolve(&self, identifier: &str) -> Option<FunctionLocation> {
        self(identifier)
    }
}

/// Pass where a resolver is required but no script functions exist.
pub struct NoFunctions;

impl FunctionPathResolver for NoFunctions {
    fn resolve(&self, _identifier: &str) -> Option<FunctionLocation> {
        None
    }
}

/// Callable names known to one parse session.
///
/// Built-ins are shared by every registry. User-defined names only ever
/// accumulate, via [`FunctionRegistry::refresh_user_defined`].
#[derive(Clone)]
pub struct FunctionRegistry {
    builtins: &'static BuiltinFunctions,
    user_defined: BTreeSet<String>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            builtins: &*BUILTINS,
            user_defined: BTreeSet::new(),
        }
    }

    pub fn is_known(&self, name: &str, kind: FunctionKind) -> bool {
        match kind {
            FunctionKind::UserDefined => {
                self.user_defined.contains(name)
                    || lower_first(name).is_some_and(|n| self.user_defined.contains(&n))
            }
            _ => self.builtins.get(name).is_some_and(|f| f.kind == kind),
        }
    }

    /// Built-ins shadow user-defined functions of the same name.
    pub fn kind_of(&self, name: &str) -> Option<FunctionKind> {
        if let Some(builtin) = self.builtins.get(name) {
            return Some(builtin.kind);
        }
        self.is_known(name, FunctionKind::UserDefined)
            .then_some(FunctionKind::UserDefined)
    }

    pub fn arity(&self, name: &str) -> Option<Arity> {
        match self.kind_of(name)? {
            FunctionKind::UserDefined => Some(Arity::Variadic),
            _ => self.builtins.get(name).map(|f| f.arity),
        }
    }

    pub fn user_defined(&self) -> impl Iterator<Item = &str> {
        self.user_defined.iter().map(String::as_str)
    }

    /// Registers every plain identifier in `expr` that `resolver` can locate.
    ///
    /// Must run before the expression is decomposed, so that a script
    /// function name is never split as if it contained operators. Returns the
    /// number of newly registered names.
    pub fn refresh_user_defined<R>(&mut self, expr: &str, resolver: &R) -> usize
    where
        R: FunctionPathResolver + ?Sized,
    {
        let mut added = 0;
        for name in lexical::references(expr) {
            if name.contains('.') || self.kind_of(name).is_some() {
                continue;
            }
            if let Some(location) = resolver.resolve(name) {
                log::debug!("found script function '{name}' at {location:?}");
                self.user_defined.insert(name.to_string());
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(name: &str) -> Option<FunctionLocation> {
        match name {
            "MyFunc" | "Helper" => Some(FunctionLocation::Path(PathBuf::from(format!(
                "functions/{name}.gmf"
            )))),
            _ => None,
        }
    }

    #[test]
    fn builtins_ignore_case_of_first_letter() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_known("sin", FunctionKind::Scalar));
        assert!(registry.is_known("Sin", FunctionKind::Scalar));
        assert!(!registry.is_known("SIN", FunctionKind::Scalar));
        assert!(registry.is_known("DegToRad", FunctionKind::UnitConversion));
        assert!(!registry.is_known("sin", FunctionKind::Matrix));
        assert_eq!(registry.kind_of("Inv"), Some(FunctionKind::Matrix));
        assert_eq!(registry.kind_of("x"), None);
    }

    #[test]
    fn arities() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.arity("atan2"), Some(Arity::Exact(2)));
        assert_eq!(registry.arity("Atan2"), Some(Arity::Exact(2)));
        assert_eq!(registry.arity("cos"), Some(Arity::Exact(1)));
        assert_eq!(registry.arity("unknown"), None);
        assert!(Arity::Variadic.accepts(0));
        assert!(!Arity::Exact(2).accepts(1));
    }

    #[test]
    fn refresh_only_adds_resolvable_names() {
        let mut registry = FunctionRegistry::new();
        let added = registry.refresh_user_defined("MyFunc(x) + sin(y) + Sat.MyFunc", &resolver);
        assert_eq!(added, 1);
        assert!(registry.is_known("MyFunc", FunctionKind::UserDefined));
        assert_eq!(registry.kind_of("MyFunc"), Some(FunctionKind::UserDefined));
        assert_eq!(registry.arity("MyFunc"), Some(Arity::Variadic));

        // Idempotent, and never forgets earlier discoveries.
        assert_eq!(registry.refresh_user_defined("MyFunc(1)", &resolver), 0);
        assert_eq!(registry.refresh_user_defined("2*x", &NoFunctions), 0);
        assert!(registry.is_known("MyFunc", FunctionKind::UserDefined));

        registry.refresh_user_defined("Helper()", &resolver);
        assert_eq!(registry.user_defined().collect::<Vec<_>>(), ["Helper", "MyFunc"]);
    }
}
