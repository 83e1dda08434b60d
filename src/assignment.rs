//! Deciding whether an assignment configures an object once or becomes a
//! runtime instruction.

use crate::error::ScriptErrorKind;
use crate::expression::Expression;
use crate::lexical;
use crate::parse::MathParser;

/// Declared type of an object property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyType {
    Real,
    String,
    Enumeration,
    Filename,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    pub owner: String,
    pub property_id: usize,
    pub declared_type: PropertyType,
}

/// The object model, as far as assignments need to see it.
pub trait ObjectResolver {
    /// Resolves an assignment target such as `Sat.X` or `arr(2)`.
    fn resolve_property(&self, lhs: &str) -> Option<PropertyInfo>;

    /// Type name of the object called `name`, e.g. `Spacecraft`.
    fn object_type(&self, _name: &str) -> Option<String> {
        None
    }

    fn is_declared(&self, name: &str) -> bool {
        self.object_type(name).is_some()
    }

    /// True for objects that hold a runtime value rather than configuration.
    fn is_variable(&self, name: &str) -> bool {
        self.object_type(name)
            .is_some_and(|t| ObjectKind::from_type_name(&t) == ObjectKind::Variable)
    }
}

/// Object categories that change how assignments are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    CoordinateSystem,
    /// Plots, reports and other objects fed by the mission run.
    Subscriber,
    Variable,
    Other,
}

impl ObjectKind {
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "CoordinateSystem" => Self::CoordinateSystem,
            "OrbitView" | "OpenGLPlot" | "Enhanced3DView" | "GroundTrackPlot" | "XYPlot"
            | "ReportFile" | "EphemerisFile" | "DynamicDataDisplay" => Self::Subscriber,
            "Variable" | "Array" | "String" => Self::Variable,
            _ => Self::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mode {
    pub in_command_mode: bool,
    /// Set by the first command other than `BeginMissionSequence`.
    pub in_real_command_mode: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Evaluate every time control reaches the statement.
    pub deferred: bool,
    pub switch_to_command_mode: bool,
    pub target: Option<PropertyInfo>,
    pub tree: Expression,
}

pub struct AssignmentResolver<'a> {
    parser: MathParser<'a>,
    objects: &'a dyn ObjectResolver,
}

impl<'a> AssignmentResolver<'a> {
    pub fn new(parser: MathParser<'a>, objects: &'a dyn ObjectResolver) -> Self {
        Self { parser, objects }
    }

    pub fn resolve(&self, mode: Mode, lhs: &str, rhs: &str) -> Result<Resolution, ScriptErrorKind> {
        let (lhs, rhs) = (lhs.trim(), rhs.trim());
        let target = self.objects.resolve_property(lhs);
        let quoted = lexical::is_quoted(rhs);

        if mode.in_command_mode {
            let owner = target
                .as_ref()
                .map_or_else(|| lexical::reference_head(lhs), |t| t.owner.as_str());
            let kind = self
                .objects
                .object_type(owner)
                .map_or(ObjectKind::Other, |t| ObjectKind::from_type_name(&t));
            let immediate = match kind {
                ObjectKind::CoordinateSystem => true,
                ObjectKind::Subscriber => !mode.in_real_command_mode,
                ObjectKind::Variable | ObjectKind::Other => false,
            };
            let tree = self.tree(rhs, quoted)?;
            return Ok(Resolution {
                deferred: !immediate,
                switch_to_command_mode: false,
                target,
                tree,
            });
        }

        // Self-reference defers whatever the target's type.
        let head = lexical::reference_head(lhs);
        if !quoted
            && self.objects.is_variable(head)
            && Expression::parse_reference_names(rhs)
                .iter()
                .any(|name| lexical::reference_head(name) == head)
        {
            log::debug!("\"{lhs} = {rhs}\" refers to itself");
            let tree = self.parser.build(rhs)?;
            return Ok(switch(target, tree));
        }

        let equation = !quoted && self.parser.is_equation(rhs)?;
        if equation {
            if let Some(info) = &target {
                match info.declared_type {
                    PropertyType::Real | PropertyType::Other => {
                        log::debug!("\"{lhs} = {rhs}\" is an equation on a {:?} field", info.declared_type);
                        let tree = self.parser.build(rhs)?;
                        return Ok(switch(target, tree));
                    }
                    PropertyType::Filename => {
                        return Err(ScriptErrorKind::AmbiguousEquationContext {
                            lhs: lhs.to_string(),
                            rhs: rhs.to_string(),
                            property_type: info.declared_type,
                        });
                    }
                    // Text such as `a-b` stored verbatim.
                    PropertyType::String | PropertyType::Enumeration => {
                        return Ok(Resolution {
                            deferred: false,
                            switch_to_command_mode: false,
                            target,
                            tree: Expression::leaf(rhs),
                        });
                    }
                }
            }
        }

        Ok(Resolution {
            deferred: false,
            switch_to_command_mode: false,
            target,
            tree: self.tree(rhs, quoted)?,
        })
    }

    fn tree(&self, rhs: &str, quoted: bool) -> Result<Expression, ScriptErrorKind> {
        if quoted {
            return Ok(Expression::leaf(rhs));
        }
        Ok(self.parser.build(rhs)?)
    }
}

fn switch(target: Option<PropertyInfo>, tree: Expression) -> Resolution {
    Resolution {
        deferred: true,
        switch_to_command_mode: true,
        target,
        tree,
    }
}
