//! Turning a whole script into an ordered list of instructions.
//!
//! Interpretation runs in two passes. The first pass handles blocks in source
//! order, setting aside any statement that names an object declared further
//! down. The second pass replays those delayed blocks, in their original
//! order, with every declaration visible.

use std::collections::HashMap;

use crate::assignment::{AssignmentResolver, Mode, ObjectResolver, PropertyInfo, PropertyType};
use crate::error::{ScriptError, ScriptErrorKind};
use crate::expression::Expression;
use crate::lexical::{self, Declaration};
use crate::parse::{MathParser, ParseOptions};
use crate::registry::{FunctionPathResolver, FunctionRegistry};
use crate::statement::{self, BlockKind, Command, CommandForm, LogicalBlock};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub line: usize,
    pub lhs: String,
    /// Runs every time control reaches it, rather than once at load.
    pub deferred: bool,
    /// Owner and property id, when the target resolved to an object field.
    pub target: Option<(String, usize)>,
    pub tree: Expression,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Declare { line: usize, declaration: Declaration },
    Assign(Assignment),
    Command { line: usize, command: Command },
}

impl Instruction {
    pub fn line(&self) -> usize {
        match self {
            Self::Declare { line, .. } | Self::Command { line, .. } => *line,
            Self::Assign(assignment) => assignment.line,
        }
    }
}

/// Instructions in the order they take effect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::Assign(assignment) => Some(assignment),
            _ => None,
        })
    }
}

/// State of one `interpret` run.
struct ParserState {
    original_text: String,
    mode: Mode,
    /// Object name to type name, for objects created by the script.
    declared: HashMap<String, String>,
    delayed_blocks: Vec<(LogicalBlock, Mode)>,
    program: Program,
}

impl ParserState {
    fn new(script: &str) -> Self {
        Self {
            original_text: script.to_string(),
            mode: Mode::default(),
            declared: HashMap::new(),
            delayed_blocks: Vec::new(),
            program: Program::default(),
        }
    }
}

/// Script declarations layered over the external object model.
struct Scope<'a> {
    declared: &'a HashMap<String, String>,
    objects: &'a dyn ObjectResolver,
}

impl ObjectResolver for Scope<'_> {
    fn resolve_property(&self, lhs: &str) -> Option<PropertyInfo> {
        if let Some(info) = self.objects.resolve_property(lhs) {
            return Some(info);
        }
        // Variables, strings and array elements are their own targets.
        let head = lexical::reference_head(lhs);
        if lhs.contains('.') || !self.is_variable(head) {
            return None;
        }
        let declared_type = match self.object_type(head).as_deref() {
            Some("String") => PropertyType::String,
            _ => PropertyType::Real,
        };
        Some(PropertyInfo {
            owner: head.to_string(),
            property_id: 0,
            declared_type,
        })
    }

    fn object_type(&self, name: &str) -> Option<String> {
        self.declared
            .get(name)
            .cloned()
            .or_else(|| self.objects.object_type(name))
    }
}

/// What to do with a block on this pass.
enum Outcome {
    Done,
    Delay,
}

pub struct Interpreter<'a> {
    registry: FunctionRegistry,
    functions: &'a dyn FunctionPathResolver,
    objects: &'a dyn ObjectResolver,
    options: ParseOptions,
}

impl<'a> Interpreter<'a> {
    pub fn new(functions: &'a dyn FunctionPathResolver, objects: &'a dyn ObjectResolver) -> Self {
        Self::with_options(functions, objects, ParseOptions::default())
    }

    pub fn with_options(
        functions: &'a dyn FunctionPathResolver,
        objects: &'a dyn ObjectResolver,
        options: ParseOptions,
    ) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            functions,
            objects,
            options,
        }
    }

    /// Script functions discovered so far, across runs.
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn interpret(&mut self, script: &str) -> Result<Program, ScriptError> {
        let mut state = ParserState::new(script);
        for block in statement::read_blocks(&state.original_text)? {
            let mode = state.mode;
            if let Outcome::Delay = self.process(&mut state, &block, mode, false)? {
                log::debug!("line {}: delaying \"{}\"", block.line, block.text);
                state.delayed_blocks.push((block, mode));
            }
        }

        let delayed = std::mem::take(&mut state.delayed_blocks);
        for (block, mode) in delayed {
            log::debug!("line {}: replaying \"{}\"", block.line, block.text);
            self.process(&mut state, &block, mode, true)?;
        }
        Ok(state.program)
    }

    fn process(
        &mut self,
        state: &mut ParserState,
        block: &LogicalBlock,
        mode: Mode,
        replay: bool,
    ) -> Result<Outcome, ScriptError> {
        let line = block.line;
        match &block.kind {
            BlockKind::Comment => {}
            BlockKind::Declaration(declaration) => {
                for name in &declaration.names {
                    state
                        .declared
                        .insert(name.name.clone(), declaration.type_name.clone());
                }
                state.program.instructions.push(Instruction::Declare {
                    line,
                    declaration: declaration.clone(),
                });
            }
            BlockKind::Command(command) => {
                if command.form == CommandForm::Call {
                    self.registry.refresh_user_defined(&command.keyword, self.functions);
                    if self.registry.kind_of(&command.keyword).is_none() {
                        if replay {
                            return Err(ScriptErrorKind::UnknownCommand {
                                name: command.keyword.clone(),
                            }
                            .at(line));
                        }
                        return Ok(Outcome::Delay);
                    }
                }
                if !replay {
                    enter_command_mode(state, &command.keyword, line);
                }
                state.program.instructions.push(Instruction::Command {
                    line,
                    command: command.clone(),
                });
            }
            BlockKind::Assignment { lhs, rhs } => {
                return self.assign(state, line, lhs, rhs, mode, replay);
            }
        }
        Ok(Outcome::Done)
    }

    fn assign(
        &mut self,
        state: &mut ParserState,
        line: usize,
        lhs: &str,
        rhs: &str,
        mode: Mode,
        replay: bool,
    ) -> Result<Outcome, ScriptError> {
        self.registry.refresh_user_defined(rhs, self.functions);
        let parser = MathParser::with_options(&self.registry, self.options);
        let scope = Scope {
            declared: &state.declared,
            objects: self.objects,
        };

        match first_undeclared(&scope, &parser, lhs, rhs).map_err(|e| ScriptError::parse(line, e))? {
            Some(Undeclared::Object(name)) if replay => {
                return Err(ScriptErrorKind::UndeclaredName { name }.at(line));
            }
            // A bare name on the right may be an enumeration value.
            Some(Undeclared::Value(_)) if replay => {}
            Some(Undeclared::Object(name) | Undeclared::Value(name)) => {
                log::trace!("line {line}: '{name}' is not declared yet");
                return Ok(Outcome::Delay);
            }
            None => {}
        }

        let resolution = AssignmentResolver::new(parser, &scope)
            .resolve(mode, lhs, rhs)
            .map_err(|kind| kind.at(line))?;
        if resolution.switch_to_command_mode && !replay && !state.mode.in_command_mode {
            log::debug!("line {line}: entering command mode at \"{lhs} = {rhs}\"");
            state.mode.in_command_mode = true;
        }
        state.program.instructions.push(Instruction::Assign(Assignment {
            line,
            lhs: lhs.to_string(),
            deferred: resolution.deferred,
            target: resolution.target.map(|t| (t.owner, t.property_id)),
            tree: resolution.tree,
        }));
        Ok(Outcome::Done)
    }
}

fn enter_command_mode(state: &mut ParserState, keyword: &str, line: usize) {
    if !state.mode.in_command_mode {
        log::debug!("line {line}: entering command mode at {keyword}");
        state.mode.in_command_mode = true;
    }
    if keyword != statement::BEGIN_MISSION_SEQUENCE && !state.mode.in_real_command_mode {
        log::debug!("line {line}: mission run starts at {keyword}");
        state.mode.in_real_command_mode = true;
    }
}

/// A name an assignment needs that nothing has declared yet.
enum Undeclared {
    /// The target's owner, or the owner in an `object.property` reference.
    Object(String),
    /// A bare name inside an equation.
    Value(String),
}

/// The first undeclared name of an assignment: the target's owner, then the
/// owners of `object.property` references on the right, then the plain names
/// an equation on the right uses.
fn first_undeclared(
    scope: &Scope<'_>,
    parser: &MathParser<'_>,
    lhs: &str,
    rhs: &str,
) -> Result<Option<Undeclared>, crate::error::ParseError> {
    let owner = lexical::reference_head(lhs);
    if !scope.is_declared(owner) {
        return Ok(Some(Undeclared::Object(owner.to_string())));
    }
    if lexical::is_quoted(rhs) {
        return Ok(None);
    }
    let registry = parser.registry();
    let known = |head: &str| scope.is_declared(head) || registry.kind_of(head).is_some();
    let references = lexical::references(rhs);
    let object = references
        .iter()
        .filter(|reference| reference.contains('.'))
        .map(|reference| lexical::reference_head(reference))
        .find(|head| !known(*head));
    if let Some(head) = object {
        return Ok(Some(Undeclared::Object(head.to_string())));
    }
    if !parser.is_equation(rhs)? {
        return Ok(None);
    }
    Ok(references
        .into_iter()
        .map(lexical::reference_head)
        .find(|head| !known(*head))
        .map(|head| Undeclared::Value(head.to_string())))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::error::ParseError;
    use crate::expression::BinaryOperator;
    use crate::registry::FunctionLocation;

    /// Field schema of a few object types; instances come from the script.
    struct Schema;

    impl ObjectResolver for Schema {
        fn resolve_property(&self, lhs: &str) -> Option<PropertyInfo> {
            let (owner, field) = lhs.split_once('.')?;
            let (property_id, declared_type) = match field {
                "X" => (0, PropertyType::Real),
                "Y" => (1, PropertyType::Real),
                "Id" => (2, PropertyType::String),
                "Filename" => (3, PropertyType::Filename),
                "Origin" => (4, PropertyType::Other),
                "ViewScaleFactor" => (5, PropertyType::Real),
                _ => return None,
            };
            Some(PropertyInfo {
                owner: owner.to_string(),
                property_id,
                declared_type,
            })
        }
    }

    fn functions(name: &str) -> Option<FunctionLocation> {
        matches!(name, "Lambert" | "Report2")
            .then(|| FunctionLocation::Path(PathBuf::from(format!("{name}.gmf"))))
    }

    fn interpret(script: &str) -> Result<Program, ScriptError> {
        Interpreter::new(&functions, &Schema).interpret(script)
    }

    fn assignments(program: &Program) -> Vec<(usize, &str, bool)> {
        program
            .assignments()
            .map(|a| (a.line, a.lhs.as_str(), a.deferred))
            .collect()
    }

    #[test]
    fn delayed_blocks_replay_after_first_pass() {
        let script = "\
Create Spacecraft Sat
Sat.X = Relay.X + 1
Sat.Y = 7000
Create Spacecraft Relay";
        let program = interpret(script).unwrap();
        let lines: Vec<_> = program.instructions.iter().map(Instruction::line).collect();
        assert_eq!(lines, [1, 3, 4, 2]);
        assert_eq!(
            assignments(&program),
            [(3, "Sat.Y", false), (2, "Sat.X", true)]
        );
    }

    #[test]
    fn forward_property_references_are_delayed() {
        let script = "\
Create Spacecraft Sat
Sat.X = Relay.X
Sat.Y = 1
Create Spacecraft Relay";
        let program = interpret(script).unwrap();
        let lines: Vec<_> = program.instructions.iter().map(Instruction::line).collect();
        assert_eq!(lines, [1, 3, 4, 2]);
        assert_eq!(
            assignments(&program),
            [(3, "Sat.Y", false), (2, "Sat.X", false)]
        );

        let error = interpret("Create Spacecraft Sat\nSat.X = Ghost.X").unwrap_err();
        assert_eq!(
            error,
            ScriptErrorKind::UndeclaredName {
                name: "Ghost".to_string()
            }
            .at(2)
        );
    }

    #[test]
    fn string_self_reference_is_deferred() {
        let script = "\
Create String s
Create String t
s = s + t";
        let program = interpret(script).unwrap();
        assert_eq!(assignments(&program), [(3, "s", true)]);
        let assignment = program.assignments().next().unwrap();
        assert_eq!(assignment.target, Some(("s".to_string(), 0)));
        assert!(matches!(assignment.tree, Expression::Binary(BinaryOperator::Add, ..)));
    }

    #[test]
    fn replay_errors_keep_original_lines() {
        let script = "\
Create Spacecraft Sat
Ghost.X = 5
Sat.X = 1";
        assert_eq!(
            interpret(script),
            Err(ScriptErrorKind::UndeclaredName {
                name: "Ghost".to_string()
            }
            .at(2))
        );

        let script = "\
Create Spacecraft Sat
Sat.X = (1 + Relay.X
Create Spacecraft Relay";
        let error = interpret(script).unwrap_err();
        assert_eq!(error.line, 2);
        assert!(matches!(
            error.kind,
            ScriptErrorKind::Parse(ParseError::UnbalancedParenthesis { .. })
        ));

        let error = interpret("BeginMissionSequence\nNoSuchFunction(1)").unwrap_err();
        assert_eq!(
            error,
            ScriptErrorKind::UnknownCommand {
                name: "NoSuchFunction".to_string()
            }
            .at(2)
        );
    }

    #[test]
    fn command_mode_transitions() {
        let script = "\
Create Spacecraft Sat
Create CoordinateSystem EarthFixed
Create OrbitView View
Sat.X = 7000
BeginMissionSequence
Sat.X = 7100
EarthFixed.Origin = Luna
View.ViewScaleFactor = 2
Propagate Prop(Sat)
View.ViewScaleFactor = 3
EarthFixed.Origin = Earth";
        let program = interpret(script).unwrap();
        assert_eq!(
            assignments(&program),
            [
                (4, "Sat.X", false),
                (6, "Sat.X", true),
                (7, "EarthFixed.Origin", false),
                (8, "View.ViewScaleFactor", false),
                (10, "View.ViewScaleFactor", true),
                (11, "EarthFixed.Origin", false),
            ]
        );
    }

    #[test]
    fn equations_switch_to_command_mode() {
        let script = "\
Create Variable x
Create Spacecraft Sat
x = 1
Sat.X = 7000 + x
Sat.Y = 2";
        let program = interpret(script).unwrap();
        assert_eq!(
            assignments(&program),
            [(3, "x", false), (4, "Sat.X", true), (5, "Sat.Y", true)]
        );
        let equation = program.assignments().nth(1).unwrap();
        assert_eq!(equation.target, Some(("Sat".to_string(), 0)));
        assert!(matches!(equation.tree, Expression::Binary(BinaryOperator::Add, ..)));
    }

    #[test]
    fn self_reference_switches_to_command_mode() {
        let script = "\
Create Array arr[3]
Create Spacecraft Sat
arr(1) = arr(2)
Sat.X = 1";
        let program = interpret(script).unwrap();
        assert_eq!(
            assignments(&program),
            [(3, "arr(1)", true), (4, "Sat.X", true)]
        );
    }

    #[test]
    fn string_fields_and_ambiguity() {
        let script = "\
Create Spacecraft Sat
Create ReportFile rf
Sat.Id = Sat-1
rf.Filename = 'orbit.txt'";
        let program = interpret(script).unwrap();
        assert_eq!(
            assignments(&program),
            [(3, "Sat.Id", false), (4, "rf.Filename", false)]
        );

        let error = interpret("Create ReportFile rf\n\nrf.Filename = out/orbit-1.txt").unwrap_err();
        assert_eq!(error.line, 3);
        assert!(matches!(
            error.kind,
            ScriptErrorKind::AmbiguousEquationContext {
                property_type: PropertyType::Filename,
                ..
            }
        ));
    }

    #[test]
    fn script_functions_are_calls() {
        let script = "\
Create Variable x
Create Variable r
BeginMissionSequence
x = Lambert(r, 2) * 2
Report2(x)";
        let mut interpreter = Interpreter::new(&functions, &Schema);
        let program = interpreter.interpret(script).unwrap();
        let Some(Instruction::Assign(assignment)) = program.instructions.get(3) else {
            panic!("expected an assignment");
        };
        let Expression::Binary(BinaryOperator::Multiply, call, _) = &assignment.tree else {
            panic!("expected a product");
        };
        assert!(matches!(&**call, Expression::Call(call) if call.inputs == ["r", "2"]));
        assert!(matches!(
            program.instructions.last(),
            Some(Instruction::Command { command, .. }) if command.form == CommandForm::Call
        ));
        assert_eq!(interpreter.registry().user_defined().collect::<Vec<_>>(), ["Lambert", "Report2"]);
    }
}
