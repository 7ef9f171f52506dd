use engine::{Action, Direction};
use roxmltree::{Document, Node};
use thiserror::Error;

const START_BLOCK: &str = "on_start";
const MOVE_BLOCK: &str = "move_dir";
const INTERACT_BLOCK: &str = "interact";
const REPEAT_BLOCK: &str = "controls_repeat";
const BODY_STATEMENT: &str = "DO";
const DIRECTION_FIELD: &str = "DIR";
const TIMES_FIELD: &str = "TIMES";
/// Upper bound on actions produced by one compile; nested repeats can otherwise explode.
pub(crate) const MAX_COMPILED_ACTIONS: usize = 10_000;
/// Upper bound on block evaluations, counting every repeat iteration, so bodies that emit
/// nothing still terminate quickly.
pub(crate) const MAX_BLOCK_EVALUATIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScriptErrorCode {
    XmlMalformed,
    InvalidRoot,
    MissingStart,
    UnknownBlock,
    MissingField,
    InvalidValue,
    TooManyActions,
    ExpansionLimit,
}

#[derive(Debug, Default)]
struct Compiled {
    actions: Vec<Action>,
    evaluations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SourceLocation {
    pub(crate) line: u32,
    pub(crate) column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message} (line {}, column {})", .location.line, .location.column)]
pub(crate) struct ScriptCompileError {
    pub(crate) code: ScriptErrorCode,
    pub(crate) message: String,
    pub(crate) location: SourceLocation,
}

/// Compiles a block-workspace XML payload into the actions its `on_start` blocks describe.
///
/// Top-level `on_start` blocks run in document order; other top-level blocks are ignored,
/// as detached blocks are in the editor.
pub(crate) fn compile_script(raw: &str) -> Result<Vec<Action>, ScriptCompileError> {
    let doc = Document::parse(raw).map_err(|error| ScriptCompileError {
        code: ScriptErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        location: SourceLocation {
            line: error.pos().row,
            column: error.pos().col,
        },
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "xml" {
        return Err(error_at_node(
            ScriptErrorCode::InvalidRoot,
            "root element must be <xml>".to_string(),
            &doc,
            root,
        ));
    }

    let starts = element_children(root, "block")
        .filter(|block| block.attribute("type") == Some(START_BLOCK))
        .collect::<Vec<_>>();
    if starts.is_empty() {
        return Err(error_at_node(
            ScriptErrorCode::MissingStart,
            format!("add an '{START_BLOCK}' block"),
            &doc,
            root,
        ));
    }

    let mut compiled = Compiled::default();
    for start in starts {
        if let Some(body) = statement_body(start, BODY_STATEMENT) {
            compile_chain(&doc, body, &mut compiled)?;
        }
    }
    Ok(compiled.actions)
}

fn compile_chain(
    doc: &Document<'_>,
    first: Node<'_, '_>,
    compiled: &mut Compiled,
) -> Result<(), ScriptCompileError> {
    let mut current = Some(first);
    while let Some(block) = current {
        count_evaluation(doc, block, compiled)?;
        compile_block(doc, block, compiled)?;
        current = element_children(block, "next")
            .next()
            .and_then(|next| element_children(next, "block").next());
    }
    Ok(())
}

fn compile_block(
    doc: &Document<'_>,
    block: Node<'_, '_>,
    compiled: &mut Compiled,
) -> Result<(), ScriptCompileError> {
    match block.attribute("type").unwrap_or_default() {
        MOVE_BLOCK => {
            let token = required_field(doc, block, DIRECTION_FIELD)?;
            let direction = Direction::from_token(&token).ok_or_else(|| {
                error_at_node(
                    ScriptErrorCode::InvalidValue,
                    format!("field {DIRECTION_FIELD} has unknown direction '{token}'"),
                    doc,
                    block,
                )
            })?;
            push_action(doc, block, compiled, Action::step(direction))
        }
        INTERACT_BLOCK => push_action(doc, block, compiled, Action::Interact),
        REPEAT_BLOCK => {
            let token = required_field(doc, block, TIMES_FIELD)?;
            let times = token.parse::<u32>().map_err(|_| {
                error_at_node(
                    ScriptErrorCode::InvalidValue,
                    format!("field {TIMES_FIELD} must be a non-negative integer, got '{token}'"),
                    doc,
                    block,
                )
            })?;
            let Some(body) = statement_body(block, BODY_STATEMENT) else {
                return Ok(());
            };
            for _ in 0..times {
                count_evaluation(doc, block, compiled)?;
                compile_chain(doc, body, compiled)?;
            }
            Ok(())
        }
        other => Err(error_at_node(
            ScriptErrorCode::UnknownBlock,
            format!("unsupported block type '{other}'"),
            doc,
            block,
        )),
    }
}

fn push_action(
    doc: &Document<'_>,
    block: Node<'_, '_>,
    compiled: &mut Compiled,
    action: Action,
) -> Result<(), ScriptCompileError> {
    if compiled.actions.len() >= MAX_COMPILED_ACTIONS {
        return Err(error_at_node(
            ScriptErrorCode::TooManyActions,
            format!("script expands to more than {MAX_COMPILED_ACTIONS} actions"),
            doc,
            block,
        ));
    }
    compiled.actions.push(action);
    Ok(())
}

fn count_evaluation(
    doc: &Document<'_>,
    block: Node<'_, '_>,
    compiled: &mut Compiled,
) -> Result<(), ScriptCompileError> {
    compiled.evaluations += 1;
    if compiled.evaluations > MAX_BLOCK_EVALUATIONS {
        return Err(error_at_node(
            ScriptErrorCode::ExpansionLimit,
            format!("script needs more than {MAX_BLOCK_EVALUATIONS} block evaluations"),
            doc,
            block,
        ));
    }
    Ok(())
}

fn element_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

fn statement_body<'a, 'input: 'a>(
    block: Node<'a, 'input>,
    name: &str,
) -> Option<Node<'a, 'input>> {
    element_children(block, "statement")
        .find(|statement| statement.attribute("name") == Some(name))
        .and_then(|statement| element_children(statement, "block").next())
}

fn required_field(
    doc: &Document<'_>,
    block: Node<'_, '_>,
    name: &str,
) -> Result<String, ScriptCompileError> {
    let value = element_children(block, "field")
        .find(|field| field.attribute("name") == Some(name))
        .and_then(|field| field.text())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if value.is_empty() {
        return Err(error_at_node(
            ScriptErrorCode::MissingField,
            format!("field {name} must not be empty"),
            doc,
            block,
        ));
    }
    Ok(value)
}

fn error_at_node(
    code: ScriptErrorCode,
    message: String,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> ScriptCompileError {
    let pos = doc.text_pos_at(node.range().start);
    ScriptCompileError {
        code,
        message,
        location: SourceLocation {
            line: pos.row,
            column: pos.col,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(body: &str) -> String {
        format!(
            r#"<xml xmlns="https://developers.google.com/blockly/xml">
  <block type="on_start" x="20" y="20">
    <statement name="DO">{body}</statement>
  </block>
</xml>"#
        )
    }

    fn move_block(direction: &str, next: &str) -> String {
        format!(
            r#"<block type="move_dir"><field name="DIR">{direction}</field>{}</block>"#,
            if next.is_empty() {
                String::new()
            } else {
                format!("<next>{next}</next>")
            }
        )
    }

    #[test]
    fn chained_blocks_compile_in_order() {
        let interact = r#"<block type="interact"/>"#;
        let chain = move_block("UP", &move_block("right", interact));

        let actions = compile_script(&workspace(&chain)).expect("compile");

        assert_eq!(
            actions,
            vec![
                Action::step(Direction::Up),
                Action::step(Direction::Right),
                Action::Interact,
            ]
        );
    }

    #[test]
    fn empty_start_block_compiles_to_nothing() {
        let raw = r#"<xml><block type="on_start"/></xml>"#;
        assert_eq!(compile_script(raw).expect("compile"), Vec::new());
    }

    #[test]
    fn detached_blocks_are_ignored() {
        let raw = format!(
            r#"<xml>{}<block type="on_start"><statement name="DO">{}</statement></block></xml>"#,
            move_block("LEFT", ""),
            move_block("DOWN", "")
        );
        assert_eq!(
            compile_script(&raw).expect("compile"),
            vec![Action::step(Direction::Down)]
        );
    }

    #[test]
    fn repeat_expands_its_body() {
        let body = format!(
            r#"<block type="controls_repeat"><field name="TIMES">3</field><statement name="DO">{}</statement></block>"#,
            move_block("LEFT", "")
        );
        let actions = compile_script(&workspace(&body)).expect("compile");
        assert_eq!(actions, vec![Action::step(Direction::Left); 3]);
    }

    #[test]
    fn runaway_repeat_is_rejected() {
        let inner = format!(
            r#"<block type="controls_repeat"><field name="TIMES">1000</field><statement name="DO">{}</statement></block>"#,
            move_block("UP", "")
        );
        let outer = format!(
            r#"<block type="controls_repeat"><field name="TIMES">1000</field><statement name="DO">{inner}</statement></block>"#
        );
        let error = compile_script(&workspace(&outer)).expect_err("too many");
        assert_eq!(error.code, ScriptErrorCode::TooManyActions);
    }

    #[test]
    fn repeats_with_empty_bodies_still_terminate() {
        let idle = r#"<block type="controls_repeat"><field name="TIMES">0</field><statement name="DO"><block type="interact"/></statement></block>"#;
        let outer = format!(
            r#"<block type="controls_repeat"><field name="TIMES">4000000000</field><statement name="DO">{idle}</statement></block>"#
        );
        let error = compile_script(&workspace(&outer)).expect_err("unbounded work");
        assert_eq!(error.code, ScriptErrorCode::ExpansionLimit);

        let nested = format!(
            r#"<block type="controls_repeat"><field name="TIMES">4000000000</field><statement name="DO">{outer}</statement></block>"#
        );
        let error = compile_script(&workspace(&nested)).expect_err("unbounded work");
        assert_eq!(error.code, ScriptErrorCode::ExpansionLimit);
    }

    #[test]
    fn missing_start_block_is_reported() {
        let raw = format!("<xml>{}</xml>", move_block("UP", ""));
        let error = compile_script(&raw).expect_err("no start");
        assert_eq!(error.code, ScriptErrorCode::MissingStart);
    }

    #[test]
    fn unknown_block_reports_location() {
        let raw = "<xml>\n<block type=\"on_start\"><statement name=\"DO\">\n<block type=\"jump\"/></statement></block></xml>";
        let error = compile_script(raw).expect_err("unknown block");
        assert_eq!(error.code, ScriptErrorCode::UnknownBlock);
        assert_eq!(error.location.line, 3);
        assert!(error.to_string().contains("jump"));
    }

    #[test]
    fn bad_direction_and_malformed_xml_are_errors() {
        let error = compile_script(&workspace(&move_block("NORTH", ""))).expect_err("bad dir");
        assert_eq!(error.code, ScriptErrorCode::InvalidValue);

        let error = compile_script("<xml><block type=").expect_err("malformed");
        assert_eq!(error.code, ScriptErrorCode::XmlMalformed);

        let error = compile_script("<workspace/>").expect_err("wrong root");
        assert_eq!(error.code, ScriptErrorCode::InvalidRoot);
    }

    #[test]
    fn move_without_direction_is_missing_field() {
        let error = compile_script(&workspace(r#"<block type="move_dir"/>"#)).expect_err("no dir");
        assert_eq!(error.code, ScriptErrorCode::MissingField);
    }
}
