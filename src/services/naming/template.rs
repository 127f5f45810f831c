//! Template parsing
//!
//! Turns template source into a tree of [Node]s. The accepted language is the
//! text/template subset naming templates use in practice: field and variable
//! references, pipelines, `if`/`else if`/`else`, `range`, `with`, variable
//! declaration and assignment, `{{-`/`-}}` whitespace trimming and
//! `{{/* comments */}}`.

use serde_json::Value;

use crate::error::RenderError;

/// Functions the renderer knows how to call
pub(crate) const FUNCTIONS: &[&str] = &[
    "printf", "eq", "ne", "lt", "le", "gt", "ge", "and", "or", "not", "len", "index", "lower",
    "upper", "title",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Variable { name: String, fields: Vec<String> },
    Ident(String),
    Literal(Value),
    Declare,
    Assign,
    Pipe,
    LParen,
    RParen,
    Comma,
}

/// One argument position of a command
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`
    Dot,
    /// `.A.B`, relative to dot
    Field(Vec<String>),
    /// `$name.A.B`; `$` alone is the root context
    Variable { name: String, fields: Vec<String> },
    Literal(Value),
    Function(String),
    /// Parenthesized pipeline
    Nested(Box<Pipeline>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub operands: Vec<Operand>,
}

/// `$a := ...` / `$a, $b := ...` / `$a = ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub variables: Vec<String>,
    pub reassign: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub declaration: Option<Declaration>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    Range {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
    With {
        pipeline: Pipeline,
        body: Vec<Node>,
        otherwise: Option<Vec<Node>>,
    },
}

/// A parsed template, ready to execute any number of times
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub(crate) nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, RenderError> {
        let segments = split_segments(source)?;
        let mut parser = Parser {
            segments: &segments,
            pos: 0,
        };
        let (nodes, terminator) = parser.parse_list()?;
        if let Some(terminator) = terminator {
            let word = match terminator.kind {
                TerminatorKind::End => "end",
                TerminatorKind::Else(_) => "else",
            };
            return Err(RenderError::syntax(
                terminator.offset,
                format!("unexpected {{{{{}}}}}", word),
            ));
        }
        Ok(Self { nodes })
    }
}

// =============================================================================
// Segmenting
// =============================================================================

#[derive(Debug)]
enum Segment {
    Text(String),
    Action { body: String, offset: usize },
}

/// Byte index of the `}}` closing an action whose body starts at `from`
fn find_action_end(source: &str, from: usize, open: usize) -> Result<usize, RenderError> {
    let bytes = source.as_bytes();
    let mut i = from;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'`' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Ok(i),
            None => {}
        }
        i += 1;
    }
    Err(RenderError::syntax(open, "unclosed action"))
}

fn push_text(segments: &mut Vec<Segment>, text: &str, trim_start: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}

fn split_segments(source: &str) -> Result<Vec<Segment>, RenderError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    let mut trim_next = false;

    while let Some(open) = source[pos..].find("{{").map(|p| pos + p) {
        let mut body_start = open + 2;
        let trim_left = source[body_start..].starts_with('-')
            && source[body_start + 1..].starts_with(|c: char| c.is_ascii_whitespace());
        let mut text = &source[pos..open];
        if trim_left {
            body_start += 1;
            text = text.trim_end();
        }
        push_text(&mut segments, text, trim_next);

        let close = find_action_end(source, body_start, open)?;
        let mut body_end = close;
        let trim_right = body_end > body_start + 1
            && source[..body_end].ends_with('-')
            && source[..body_end - 1].ends_with(|c: char| c.is_ascii_whitespace());
        if trim_right {
            body_end -= 1;
        }

        let body = source[body_start..body_end].trim();
        if body.starts_with("/*") {
            if !body.ends_with("*/") {
                return Err(RenderError::syntax(open, "unclosed comment"));
            }
        } else {
            segments.push(Segment::Action {
                body: body.to_string(),
                offset: open,
            });
        }

        pos = close + 2;
        trim_next = trim_right;
    }
    push_text(&mut segments, &source[pos..], trim_next);

    Ok(segments)
}

// =============================================================================
// Lexing
// =============================================================================

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Read `.Name.Name...` starting at a '.' followed by an identifier
fn read_fields(chars: &[char], i: &mut usize) -> Vec<String> {
    let mut fields = Vec::new();
    while *i + 1 < chars.len() && chars[*i] == '.' && is_ident_start(chars[*i + 1]) {
        *i += 1;
        let start = *i;
        while *i < chars.len() && is_ident_char(chars[*i]) {
            *i += 1;
        }
        fields.push(chars[start..*i].iter().collect());
    }
    fields
}

fn tokenize(body: &str, offset: usize) -> Result<Vec<Token>, RenderError> {
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                let fields = read_fields(&chars, &mut i);
                if fields.is_empty() {
                    tokens.push(Token::Dot);
                    i += 1;
                } else {
                    tokens.push(Token::Field(fields));
                }
            }
            '$' => {
                i += 1;
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                let fields = read_fields(&chars, &mut i);
                tokens.push(Token::Variable { name, fields });
            }
            '"' => {
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err(RenderError::syntax(offset, "unterminated quoted string")),
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('\\') => '\\',
                                Some('"') => '"',
                                other => {
                                    return Err(RenderError::syntax(
                                        offset,
                                        format!("invalid escape sequence \\{}", other.copied().unwrap_or(' ')),
                                    ));
                                }
                            };
                            s.push(escaped);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                i += 1;
                tokens.push(Token::Literal(Value::String(s)));
            }
            '`' => {
                i += 1;
                let start = i;
                while i < chars.len() && chars[i] != '`' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(RenderError::syntax(offset, "unterminated raw string"));
                }
                let s: String = chars[start..i].iter().collect();
                i += 1;
                tokens.push(Token::Literal(Value::String(s)));
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let number = if let Ok(n) = text.parse::<i64>() {
                    Value::from(n)
                } else {
                    text.parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .ok_or_else(|| RenderError::syntax(offset, format!("bad number syntax: {}", text)))?
                };
                tokens.push(Token::Literal(number));
            }
            ':' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Declare);
                i += 2;
            }
            '=' => {
                tokens.push(Token::Assign);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" => Token::Literal(Value::Bool(true)),
                    "false" => Token::Literal(Value::Bool(false)),
                    "nil" => Token::Literal(Value::Null),
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(RenderError::syntax(
                    offset,
                    format!("unexpected {:?} in action", other),
                ));
            }
        }
    }

    Ok(tokens)
}

// =============================================================================
// Pipelines
// =============================================================================

fn is_plain_variable(token: Option<&Token>) -> Option<&str> {
    match token {
        Some(Token::Variable { name, fields }) if fields.is_empty() && !name.is_empty() => {
            Some(name)
        }
        _ => None,
    }
}

/// Split off a leading `$a :=`, `$a =` or `$a, $b :=`
fn parse_declaration(tokens: &[Token]) -> (Option<Declaration>, &[Token]) {
    if let Some(first) = is_plain_variable(tokens.first()) {
        match tokens.get(1) {
            Some(Token::Declare) | Some(Token::Assign) => {
                let declaration = Declaration {
                    variables: vec![first.to_string()],
                    reassign: tokens[1] == Token::Assign,
                };
                return (Some(declaration), &tokens[2..]);
            }
            Some(Token::Comma) => {
                if let (Some(second), Some(Token::Declare)) =
                    (is_plain_variable(tokens.get(2)), tokens.get(3))
                {
                    let declaration = Declaration {
                        variables: vec![first.to_string(), second.to_string()],
                        reassign: false,
                    };
                    return (Some(declaration), &tokens[4..]);
                }
            }
            _ => {}
        }
    }
    (None, tokens)
}

fn parse_pipeline(tokens: &[Token], offset: usize, context: &str) -> Result<Pipeline, RenderError> {
    let (declaration, rest) = parse_declaration(tokens);
    if declaration
        .as_ref()
        .is_some_and(|d| d.variables.len() == 2)
        && context != "range"
    {
        return Err(RenderError::syntax(offset, "too many declarations"));
    }

    let mut commands = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        match &rest[i] {
            Token::Pipe => {
                commands.push(finish_command(std::mem::take(&mut current), offset)?);
            }
            Token::LParen => {
                let close = matching_paren(rest, i)
                    .ok_or_else(|| RenderError::syntax(offset, "unclosed left paren"))?;
                let inner = parse_pipeline(&rest[i + 1..close], offset, "parenthesized pipeline")?;
                if inner.declaration.is_some() {
                    return Err(RenderError::syntax(offset, "declaration inside parentheses"));
                }
                current.push(Operand::Nested(Box::new(inner)));
                i = close;
            }
            Token::RParen => return Err(RenderError::syntax(offset, "unexpected right paren")),
            Token::Declare | Token::Assign | Token::Comma => {
                return Err(RenderError::syntax(offset, "unexpected declaration"));
            }
            Token::Dot => current.push(Operand::Dot),
            Token::Field(fields) => current.push(Operand::Field(fields.clone())),
            Token::Variable { name, fields } => current.push(Operand::Variable {
                name: name.clone(),
                fields: fields.clone(),
            }),
            Token::Literal(value) => current.push(Operand::Literal(value.clone())),
            Token::Ident(name) => {
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(RenderError::UnknownFunction(name.clone()));
                }
                current.push(Operand::Function(name.clone()));
            }
        }
        i += 1;
    }
    if !current.is_empty() || !commands.is_empty() {
        commands.push(finish_command(current, offset)?);
    }

    if commands.is_empty() {
        return Err(RenderError::syntax(offset, format!("missing value for {}", context)));
    }
    // Piped values are passed as the last argument, which only functions take
    if commands[1..]
        .iter()
        .any(|c| !matches!(c.operands.first(), Some(Operand::Function(_))))
    {
        return Err(RenderError::syntax(offset, "non-function command in pipeline"));
    }

    Ok(Pipeline {
        declaration,
        commands,
    })
}

fn finish_command(operands: Vec<Operand>, offset: usize) -> Result<Command, RenderError> {
    match operands.first() {
        None => Err(RenderError::syntax(offset, "missing command in pipeline")),
        Some(Operand::Function(_)) => Ok(Command { operands }),
        Some(_) if operands.len() > 1 => Err(RenderError::syntax(
            offset,
            "can't give argument to non-function",
        )),
        Some(_) => Ok(Command { operands }),
    }
}

fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

// =============================================================================
// Structure
// =============================================================================

enum TerminatorKind {
    End,
    /// Tokens after `else`
    Else(Vec<Token>),
}

struct Terminator {
    kind: TerminatorKind,
    offset: usize,
}

struct Parser<'s> {
    segments: &'s [Segment],
    pos: usize,
}

impl Parser<'_> {
    /// Parse nodes until `{{end}}`, `{{else ...}}` or end of input
    fn parse_list(&mut self) -> Result<(Vec<Node>, Option<Terminator>), RenderError> {
        let mut nodes = Vec::new();
        while let Some(segment) = self.segments.get(self.pos) {
            self.pos += 1;
            let (body, offset) = match segment {
                Segment::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    continue;
                }
                Segment::Action { body, offset } => (body, *offset),
            };

            let tokens = tokenize(body, offset)?;
            let keyword = match tokens.first() {
                Some(Token::Ident(word)) => word.as_str(),
                _ => "",
            };
            match keyword {
                "if" => nodes.push(self.parse_if(&tokens[1..], offset)?),
                "range" => {
                    let pipeline = parse_pipeline(&tokens[1..], offset, "range")?;
                    let (body, otherwise) = self.parse_block(offset, "range")?;
                    nodes.push(Node::Range {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                "with" => {
                    let pipeline = parse_pipeline(&tokens[1..], offset, "with")?;
                    let (body, otherwise) = self.parse_block(offset, "with")?;
                    nodes.push(Node::With {
                        pipeline,
                        body,
                        otherwise,
                    });
                }
                "end" => {
                    if tokens.len() > 1 {
                        return Err(RenderError::syntax(offset, "unexpected tokens after end"));
                    }
                    let terminator = Terminator {
                        kind: TerminatorKind::End,
                        offset,
                    };
                    return Ok((nodes, Some(terminator)));
                }
                "else" => {
                    let terminator = Terminator {
                        kind: TerminatorKind::Else(tokens[1..].to_vec()),
                        offset,
                    };
                    return Ok((nodes, Some(terminator)));
                }
                "define" | "template" | "block" | "break" | "continue" => {
                    return Err(RenderError::syntax(
                        offset,
                        format!("{} is not supported in naming templates", keyword),
                    ));
                }
                _ => nodes.push(Node::Output(parse_pipeline(&tokens, offset, "command")?)),
            }
        }
        Ok((nodes, None))
    }

    fn expect_end(&mut self, offset: usize, construct: &str) -> Result<Vec<Node>, RenderError> {
        match self.parse_list()? {
            (nodes, Some(Terminator {
                kind: TerminatorKind::End,
                ..
            })) => Ok(nodes),
            (_, Some(terminator)) => Err(RenderError::syntax(
                terminator.offset,
                format!("expected end of {}", construct),
            )),
            (_, None) => Err(RenderError::syntax(
                offset,
                format!("unexpected EOF: {} has no end", construct),
            )),
        }
    }

    /// Body plus optional plain `else` of `range`/`with`
    fn parse_block(
        &mut self,
        offset: usize,
        construct: &str,
    ) -> Result<(Vec<Node>, Option<Vec<Node>>), RenderError> {
        match self.parse_list()? {
            (body, Some(Terminator {
                kind: TerminatorKind::End,
                ..
            })) => Ok((body, None)),
            (body, Some(Terminator {
                kind: TerminatorKind::Else(rest),
                offset: else_offset,
            })) => {
                if !rest.is_empty() {
                    return Err(RenderError::syntax(
                        else_offset,
                        format!("unexpected tokens after else in {}", construct),
                    ));
                }
                let otherwise = self.expect_end(offset, construct)?;
                Ok((body, Some(otherwise)))
            }
            (_, None) => Err(RenderError::syntax(
                offset,
                format!("unexpected EOF: {} has no end", construct),
            )),
        }
    }

    fn parse_if(&mut self, condition: &[Token], offset: usize) -> Result<Node, RenderError> {
        let mut branches = Vec::new();
        let mut condition = parse_pipeline(condition, offset, "if")?;
        loop {
            let (body, terminator) = self.parse_list()?;
            let Some(terminator) = terminator else {
                return Err(RenderError::syntax(offset, "unexpected EOF: if has no end"));
            };
            branches.push((condition, body));
            match terminator.kind {
                TerminatorKind::End => {
                    return Ok(Node::If {
                        branches,
                        otherwise: None,
                    });
                }
                TerminatorKind::Else(rest) if rest.is_empty() => {
                    let otherwise = self.expect_end(offset, "if")?;
                    return Ok(Node::If {
                        branches,
                        otherwise: Some(otherwise),
                    });
                }
                TerminatorKind::Else(rest) => {
                    if rest.first() != Some(&Token::Ident("if".to_string())) {
                        return Err(RenderError::syntax(
                            terminator.offset,
                            "expected if after else",
                        ));
                    }
                    condition = parse_pipeline(&rest[1..], terminator.offset, "if")?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(source: &str) -> Vec<Node> {
        Template::parse(source).unwrap().nodes
    }

    // =========================================================================
    // Segment Tests
    // =========================================================================

    #[test]
    fn test_text_and_fields() {
        let nodes = parse("{{.Dbmovie.Title}} ({{.Dbmovie.Year}})");
        assert_eq!(nodes.len(), 4);
        assert_matches!(&nodes[0], Node::Output(p) if p.commands[0].operands == vec![
            Operand::Field(vec!["Dbmovie".to_string(), "Title".to_string()])
        ]);
        assert_eq!(nodes[1], Node::Text(" (".to_string()));
    }

    #[test]
    fn test_trim_markers() {
        let nodes = parse("a  {{- .X -}}  b");
        assert_eq!(nodes[0], Node::Text("a".to_string()));
        assert_eq!(nodes[2], Node::Text("b".to_string()));
    }

    #[test]
    fn test_negative_number_is_not_trim_marker() {
        let nodes = parse("{{-3}}");
        assert_matches!(&nodes[0], Node::Output(p) if p.commands[0].operands == vec![
            Operand::Literal(Value::from(-3))
        ]);
    }

    #[test]
    fn test_comment_is_dropped() {
        assert_eq!(parse("a{{/* note */}}b"), vec![
            Node::Text("a".to_string()),
            Node::Text("b".to_string()),
        ]);
    }

    #[test]
    fn test_braces_inside_strings() {
        let nodes = parse(r#"{{printf "}}%s" .X}}"#);
        assert_eq!(nodes.len(), 1);
    }

    // =========================================================================
    // Pipeline Tests
    // =========================================================================

    #[test]
    fn test_pipeline_and_declaration() {
        let nodes = parse("{{$t := .Title | lower}}");
        let Node::Output(pipeline) = &nodes[0] else {
            panic!("expected output node");
        };
        assert_eq!(
            pipeline.declaration,
            Some(Declaration {
                variables: vec!["t".to_string()],
                reassign: false
            })
        );
        assert_eq!(pipeline.commands.len(), 2);
    }

    #[test]
    fn test_nested_pipeline() {
        let nodes = parse("{{printf \"%s-%s\" (lower .A) .B}}");
        let Node::Output(pipeline) = &nodes[0] else {
            panic!("expected output node");
        };
        assert_matches!(pipeline.commands[0].operands[2], Operand::Nested(_));
    }

    #[test]
    fn test_unknown_function() {
        assert_matches!(
            Template::parse("{{shout .Title}}"),
            Err(RenderError::UnknownFunction(name)) if name == "shout"
        );
    }

    #[test]
    fn test_argument_to_non_function() {
        assert_matches!(Template::parse("{{.A .B}}"), Err(RenderError::Syntax { .. }));
        assert_matches!(Template::parse("{{.A | .B}}"), Err(RenderError::Syntax { .. }));
    }

    // =========================================================================
    // Structure Tests
    // =========================================================================

    #[test]
    fn test_if_else_if_chain() {
        let nodes = parse("{{if .A}}a{{else if .B}}b{{else}}c{{end}}");
        assert_matches!(&nodes[0], Node::If { branches, otherwise: Some(_) } if branches.len() == 2);
    }

    #[test]
    fn test_range_with_index_declaration() {
        let nodes = parse("{{range $i, $e := .Episodes}}{{$e}}{{end}}");
        let Node::Range { pipeline, .. } = &nodes[0] else {
            panic!("expected range node");
        };
        assert_eq!(
            pipeline.declaration.as_ref().unwrap().variables,
            vec!["i".to_string(), "e".to_string()]
        );
    }

    #[test]
    fn test_missing_end() {
        let err = Template::parse("{{if .A}}a").unwrap_err();
        assert_matches!(err, RenderError::Syntax { offset: 0, .. });
    }

    #[test]
    fn test_stray_end_and_else() {
        assert_matches!(Template::parse("a{{end}}"), Err(RenderError::Syntax { offset: 1, .. }));
        assert_matches!(Template::parse("{{else}}"), Err(RenderError::Syntax { .. }));
    }

    #[test]
    fn test_unclosed_action() {
        assert_matches!(Template::parse("{{.Title"), Err(RenderError::Syntax { .. }));
        assert_matches!(Template::parse("{{\"open}}"), Err(RenderError::Syntax { .. }));
    }

    #[test]
    fn test_two_variable_declaration_only_in_range() {
        assert_matches!(Template::parse("{{$a, $b := .X}}"), Err(RenderError::Syntax { .. }));
    }
}
