//! Splitting script text into logical blocks and tagging each one.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::error::{ScriptError, ScriptErrorKind};
use crate::lexical::{self, Declaration};
use crate::scan::Scan;

/// The first command that puts a script into command mode without starting
/// the mission run proper.
pub const BEGIN_MISSION_SEQUENCE: &str = "BeginMissionSequence";

static COMMAND_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        BEGIN_MISSION_SEQUENCE,
        "Achieve",
        "BeginFiniteBurn",
        "BeginScript",
        "CallFunction",
        "ClearPlot",
        "Else",
        "EndFiniteBurn",
        "EndFor",
        "EndIf",
        "EndOptimize",
        "EndScript",
        "EndTarget",
        "EndWhile",
        "FindEvents",
        "For",
        "Global",
        "If",
        "Maneuver",
        "MarkPoint",
        "Minimize",
        "NonlinearConstraint",
        "Optimize",
        "PenDown",
        "PenUp",
        "Propagate",
        "Report",
        "Save",
        "Set",
        "Stop",
        "Target",
        "Toggle",
        "UpdateDynamicData",
        "Vary",
        "While",
        "Write",
    ]
    .into_iter()
    .collect()
});

/// Types whose declarations carry `[rows, cols]` dimensions.
const INDEXABLE_TYPES: &[&str] = &["Array"];

/// Explicit assignment prefix, e.g. `GMAT Sat.X = 7000`.
const ASSIGNMENT_KEYWORD: &str = "GMAT";

pub fn is_command_keyword(word: &str) -> bool {
    COMMAND_KEYWORDS.contains(word)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandForm {
    /// `Propagate 'Coast' Prop(Sat)`
    Keyword,
    /// `MyFunction(a, b)`
    Call,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub keyword: String,
    /// Optional quoted label right after the keyword, without its quotes.
    pub description: Option<String>,
    pub arguments: String,
    pub form: CommandForm,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Comment,
    Declaration(Declaration),
    Command(Command),
    Assignment { lhs: String, rhs: String },
}

/// One statement with the comments that belong to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogicalBlock {
    /// 1-based line the statement starts on.
    pub line: usize,
    pub text: String,
    /// Comment lines directly above the statement.
    pub preface: String,
    pub inline_comment: String,
    pub kind: BlockKind,
}

/// A physical statement line, possibly joined from `...` continuations.
struct PendingLine {
    line: usize,
    code: String,
    comment: String,
}

/// Reads every logical block of `script`, in source order.
pub fn read_blocks(script: &str) -> Result<Vec<LogicalBlock>, ScriptError> {
    let mut blocks = Vec::new();
    let mut preface = String::new();
    let mut preface_line = None;
    let mut pending: Option<PendingLine> = None;

    for (index, raw) in script.lines().enumerate() {
        let line = index + 1;
        let (code, comment) = split_comment(raw);

        let current = match pending.take() {
            Some(mut continued) => {
                continued.code.push(' ');
                continued.code.push_str(code.trim());
                append_comment(&mut continued.comment, comment);
                continued
            }
            None if code.trim().is_empty() => {
                if let Some(comment) = comment {
                    preface_line.get_or_insert(line);
                    preface.push_str(comment);
                    preface.push('\n');
                } else if !preface.is_empty() {
                    preface.push('\n');
                }
                continue;
            }
            None => PendingLine {
                line,
                code: code.trim().to_string(),
                comment: comment.map(str::to_string).unwrap_or_default(),
            },
        };

        if let Some(stripped) = current.code.strip_suffix("...") {
            pending = Some(PendingLine {
                code: stripped.trim_end().to_string(),
                ..current
            });
            continue;
        }
        preface_line = None;
        flush(&mut blocks, current, std::mem::take(&mut preface))?;
    }

    if let Some(current) = pending {
        flush(&mut blocks, current, std::mem::take(&mut preface))?;
    }
    if let Some(line) = preface_line {
        if !preface.trim().is_empty() {
            blocks.push(LogicalBlock {
                line,
                text: preface.clone(),
                preface,
                inline_comment: String::new(),
                kind: BlockKind::Comment,
            });
        }
    }
    Ok(blocks)
}

fn append_comment(comments: &mut String, comment: Option<&str>) {
    if let Some(comment) = comment {
        if !comments.is_empty() {
            comments.push(' ');
        }
        comments.push_str(comment);
    }
}

/// Splits off a `%` comment that is not inside a string.
fn split_comment(raw: &str) -> (&str, Option<&str>) {
    match Scan::new(raw).find_any(b"%") {
        Some(position) => (&raw[..position], Some(raw[position..].trim_end())),
        None => (raw, None),
    }
}

/// Splits one physical statement line on `;` and classifies the parts.
fn flush(blocks: &mut Vec<LogicalBlock>, current: PendingLine, preface: String) -> Result<(), ScriptError> {
    let mut preface = Some(preface);
    let statements: Vec<&str> = Scan::new(&current.code)
        .split_top_level(b';')
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let count = statements.len();
    for (i, text) in statements.into_iter().enumerate() {
        let kind = classify(text).map_err(|kind| kind.at(current.line))?;
        blocks.push(LogicalBlock {
            line: current.line,
            text: text.to_string(),
            preface: preface.take().unwrap_or_default(),
            inline_comment: if i + 1 == count {
                current.comment.clone()
            } else {
                String::new()
            },
            kind,
        });
    }
    Ok(())
}

fn invalid(text: &str, reason: impl Into<String>) -> ScriptErrorKind {
    ScriptErrorKind::InvalidStatement {
        text: text.to_string(),
        reason: reason.into(),
    }
}

/// Tags one statement. `text` holds no `;` separators.
pub fn classify(text: &str) -> Result<BlockKind, ScriptErrorKind> {
    let text = text.trim();
    let first_word = lexical::reference_head(text);
    let rest = &text[first_word.len()..];
    // A keyword must stand alone: `Propagate Prop(Sat)`, `Report 'a' x`.
    let keyword_ends = rest.is_empty() || rest.starts_with([' ', '\t', '\'', '"']);

    if first_word == "Create" && keyword_ends {
        return declaration(text).map(BlockKind::Declaration);
    }
    if first_word == ASSIGNMENT_KEYWORD && keyword_ends {
        let rest = rest.trim_start();
        return match Scan::new(rest).find_top_level(b'=') {
            Some(position) => assignment(rest, position),
            None => Err(invalid(text, format!("'{ASSIGNMENT_KEYWORD}' must be followed by an assignment"))),
        };
    }
    if is_command_keyword(first_word) && keyword_ends {
        return Ok(BlockKind::Command(keyword_command(first_word, rest)));
    }
    let scan = Scan::new(text);
    if let Some(position) = scan.find_top_level(b'=') {
        return assignment(text, position);
    }
    if let Some(command) = call_command(&scan, first_word) {
        return Ok(BlockKind::Command(command));
    }
    Err(invalid(text, "not a declaration, command or assignment"))
}

fn declaration(text: &str) -> Result<Declaration, ScriptErrorKind> {
    let declaration = lexical::parse_declaration(text)
        .map_err(|e| invalid(text, e.variant.message().into_owned()))?;
    let indexable = INDEXABLE_TYPES.contains(&declaration.type_name.as_str());
    for name in &declaration.names {
        if indexable && name.dimensions.is_empty() {
            return Err(invalid(
                text,
                format!("{} '{}' needs dimensions", declaration.type_name, name.name),
            ));
        }
        if !indexable && !name.dimensions.is_empty() {
            return Err(invalid(
                text,
                format!("{} objects cannot have dimensions", declaration.type_name),
            ));
        }
    }
    Ok(declaration)
}

fn assignment(text: &str, position: usize) -> Result<BlockKind, ScriptErrorKind> {
    let lhs = text[..position].trim();
    let rhs = text[position + 1..].trim();
    if lhs.is_empty() {
        return Err(invalid(text, "nothing to assign to"));
    }
    if rhs.is_empty() {
        return Err(invalid(text, "missing value"));
    }
    if let Some(found) = Scan::new(rhs).find_any(b"=~<>") {
        return Err(invalid(
            text,
            format!("unexpected '{}' in value", char::from(rhs.as_bytes()[found])),
        ));
    }
    Ok(BlockKind::Assignment {
        lhs: lhs.to_string(),
        rhs: rhs.to_string(),
    })
}

fn keyword_command(keyword: &str, rest: &str) -> Command {
    let rest = rest.trim();
    let labelled = rest.strip_prefix('\'').and_then(|quoted| {
        let end = quoted.find('\'')?;
        Some((&quoted[..end], quoted[end + 1..].trim()))
    });
    let (description, arguments) = match labelled {
        Some((label, arguments)) => (Some(label.to_string()), arguments),
        None => (None, rest),
    };
    Command {
        keyword: keyword.to_string(),
        description,
        arguments: arguments.to_string(),
        form: CommandForm::Keyword,
    }
}

/// `name(args)` spanning the whole statement.
fn call_command(scan: &Scan<'_>, name: &str) -> Option<Command> {
    let text = scan.text();
    if name.is_empty() || !text[name.len()..].trim_start().starts_with('(') {
        return None;
    }
    let open = scan.first_open_paren(name.len())?;
    if scan.matching_paren(open).ok()? != text.len() - 1 {
        return None;
    }
    Some(Command {
        keyword: name.to_string(),
        description: None,
        arguments: text[open + 1..text.len() - 1].trim().to_string(),
        form: CommandForm::Call,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(script: &str) -> Vec<BlockKind> {
        read_blocks(script).unwrap().into_iter().map(|b| b.kind).collect()
    }

    fn assign(lhs: &str, rhs: &str) -> BlockKind {
        BlockKind::Assignment {
            lhs: lhs.to_string(),
            rhs: rhs.to_string(),
        }
    }

    #[test]
    fn tags() {
        let script = "\
Create Spacecraft Sat
Sat.X = 7000
BeginMissionSequence
Propagate 'Coast' Prop(Sat) {Sat.ElapsedDays = 1}
MyFunction(a, b)
GMAT Sat.Y = Sat.X * 2";
        let kinds = kinds(script);
        assert!(matches!(&kinds[0], BlockKind::Declaration(d) if d.type_name == "Spacecraft"));
        assert_eq!(kinds[1], assign("Sat.X", "7000"));
        assert_eq!(
            kinds[2],
            BlockKind::Command(Command {
                keyword: BEGIN_MISSION_SEQUENCE.to_string(),
                description: None,
                arguments: String::new(),
                form: CommandForm::Keyword,
            })
        );
        assert_eq!(
            kinds[3],
            BlockKind::Command(Command {
                keyword: "Propagate".to_string(),
                description: Some("Coast".to_string()),
                arguments: "Prop(Sat) {Sat.ElapsedDays = 1}".to_string(),
                form: CommandForm::Keyword,
            })
        );
        assert_eq!(
            kinds[4],
            BlockKind::Command(Command {
                keyword: "MyFunction".to_string(),
                description: None,
                arguments: "a, b".to_string(),
                form: CommandForm::Call,
            })
        );
        assert_eq!(kinds[5], assign("Sat.Y", "Sat.X * 2"));
    }

    #[test]
    fn comments_attach_to_statements() {
        let script = "\
% Initial state
% in km

Sat.X = 7000 % semi-major axis
x = '50% done'
% trailing note";
        let blocks = read_blocks(script).unwrap();
        assert_eq!(blocks.len(), 3);

        assert_eq!(blocks[0].line, 4);
        assert_eq!(blocks[0].preface, "% Initial state\n% in km\n\n");
        assert_eq!(blocks[0].inline_comment, "% semi-major axis");
        assert_eq!(blocks[0].kind, assign("Sat.X", "7000"));

        assert_eq!(blocks[1].kind, assign("x", "'50% done'"));
        assert!(blocks[1].preface.is_empty());
        assert!(blocks[1].inline_comment.is_empty());

        assert_eq!(blocks[2].line, 6);
        assert_eq!(blocks[2].kind, BlockKind::Comment);
        assert_eq!(blocks[2].text, "% trailing note\n");
    }

    #[test]
    fn semicolons_split_statements() {
        let blocks = read_blocks("a = 1; b = [1 2; 3 4];; ; % both\n;").unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, assign("a", "1"));
        assert_eq!(blocks[1].kind, assign("b", "[1 2; 3 4]"));
        assert!(blocks[0].inline_comment.is_empty());
        assert_eq!(blocks[1].inline_comment, "% both");
        assert!(blocks.iter().all(|b| b.line == 1));
    }

    #[test]
    fn continuation_lines_join() {
        let script = "\
x = 1
Sat.X = 1 + ... % first
   2 + ...
   3";
        let blocks = read_blocks(script).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].line, 2);
        assert_eq!(blocks[1].kind, assign("Sat.X", "1 + 2 + 3"));
        assert_eq!(blocks[1].inline_comment, "% first");
    }

    #[test]
    fn declarations_check_dimensions() {
        assert!(classify("Create Array A[3, 3]").is_ok());
        assert!(matches!(
            classify("Create Array A"),
            Err(ScriptErrorKind::InvalidStatement { .. })
        ));
        assert!(matches!(
            classify("Create Spacecraft Sat[2]"),
            Err(ScriptErrorKind::InvalidStatement { .. })
        ));
        assert!(classify("Create").is_err());
    }

    #[test]
    fn stray_relational_operators_are_invalid() {
        for text in ["x = y == 2", "x = a < b", "x = ~a", "x = (b > 1)"] {
            assert!(
                matches!(classify(text), Err(ScriptErrorKind::InvalidStatement { .. })),
                "{text}"
            );
        }
        assert_eq!(classify("s = 'a <= b'").unwrap(), assign("s", "'a <= b'"));
        assert!(matches!(classify("If x > 2").unwrap(), BlockKind::Command(_)));
    }

    #[test]
    fn unrecognized_statements() {
        let error = read_blocks("x = 1\nfoo bar").unwrap_err();
        assert_eq!(error.line, 2);
        assert!(matches!(error.kind, ScriptErrorKind::InvalidStatement { .. }));
        assert!(classify("= 3").is_err());
        assert!(classify("x =").is_err());
        assert!(classify("GMAT Sat").is_err());
    }

    #[test]
    fn classify_trims_unicode_whitespace() {
        assert_eq!(classify("\u{3000}x = 1\u{3000}").unwrap(), assign("x", "1"));
        assert!(matches!(
            classify("\u{3000}Propagate Prop(Sat)").unwrap(),
            BlockKind::Command(Command { form: CommandForm::Keyword, .. })
        ));
    }
}
