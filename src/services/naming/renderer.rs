//! Template execution
//!
//! Runs a parsed [Template] against a JSON context. Missing map keys render as
//! empty output so optional metadata never fails a rename; type errors (a
//! field on a number, ordering a string against a number, `len` of a bool)
//! surface as [RenderError].

use std::cmp::Ordering;
use std::fmt::Write;

use serde_json::Value;

use crate::error::RenderError;
use crate::services::naming::template::{Command, Node, Operand, Pipeline, Template};

/// Parse and execute `source` against `context`
pub fn render(source: &str, context: &Value) -> Result<String, RenderError> {
    Template::parse(source)?.execute(context)
}

impl Template {
    pub fn execute(&self, context: &Value) -> Result<String, RenderError> {
        self.run(context, None)
    }

    /// Execute, passing every `{{...}}` output through `escape`; literal text is kept
    pub fn execute_escaped(
        &self,
        context: &Value,
        escape: fn(&str) -> String,
    ) -> Result<String, RenderError> {
        self.run(context, Some(escape))
    }

    fn run(&self, context: &Value, escape: Option<fn(&str) -> String>) -> Result<String, RenderError> {
        let mut state = ExecState {
            root: context,
            variables: Vec::new(),
            escape,
            out: String::new(),
        };
        state.walk(&self.nodes, context)?;
        Ok(state.out)
    }
}

struct ExecState<'c> {
    root: &'c Value,
    variables: Vec<(String, Value)>,
    escape: Option<fn(&str) -> String>,
    out: String,
}

impl ExecState<'_> {
    fn walk(&mut self, nodes: &[Node], dot: &Value) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Output(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if pipeline.declaration.is_none() {
                        let text = display(&value);
                        match self.escape {
                            Some(escape) => self.out.push_str(&escape(&text)),
                            None => self.out.push_str(&text),
                        }
                    }
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mark = self.variables.len();
                    let mut taken = false;
                    for (condition, body) in branches {
                        if is_truthy(&self.eval_pipeline(condition, dot)?) {
                            self.walk(body, dot)?;
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(otherwise) = otherwise {
                            self.walk(otherwise, dot)?;
                        }
                    }
                    self.variables.truncate(mark);
                }
                Node::Range {
                    pipeline,
                    body,
                    otherwise,
                } => self.range(pipeline, body, otherwise.as_deref(), dot)?,
                Node::With {
                    pipeline,
                    body,
                    otherwise,
                } => {
                    let mark = self.variables.len();
                    let value = self.eval_pipeline(pipeline, dot)?;
                    if is_truthy(&value) {
                        self.walk(body, &value)?;
                    } else if let Some(otherwise) = otherwise {
                        self.walk(otherwise, dot)?;
                    }
                    self.variables.truncate(mark);
                }
            }
        }
        Ok(())
    }

    fn range(
        &mut self,
        pipeline: &Pipeline,
        body: &[Node],
        otherwise: Option<&[Node]>,
        dot: &Value,
    ) -> Result<(), RenderError> {
        let value = self.eval_commands(&pipeline.commands, dot)?;
        let items: Vec<(Value, Value)> = match value {
            Value::Null => Vec::new(),
            Value::Array(elements) => elements
                .into_iter()
                .enumerate()
                .map(|(i, e)| (Value::from(i), e))
                .collect(),
            Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            other => {
                return Err(RenderError::TypeMismatch(format!(
                    "range can't iterate over {}",
                    type_name(&other)
                )));
            }
        };

        if items.is_empty() {
            if let Some(otherwise) = otherwise {
                self.walk(otherwise, dot)?;
            }
            return Ok(());
        }

        let names = pipeline
            .declaration
            .as_ref()
            .map(|d| d.variables.as_slice())
            .unwrap_or_default();
        for (key, element) in items {
            let mark = self.variables.len();
            match names {
                [elem] => self.variables.push((elem.clone(), element.clone())),
                [idx, elem] => {
                    self.variables.push((idx.clone(), key));
                    self.variables.push((elem.clone(), element.clone()));
                }
                _ => {}
            }
            self.walk(body, &element)?;
            self.variables.truncate(mark);
        }
        Ok(())
    }

    fn eval_pipeline(&mut self, pipeline: &Pipeline, dot: &Value) -> Result<Value, RenderError> {
        let value = self.eval_commands(&pipeline.commands, dot)?;
        if let Some(declaration) = &pipeline.declaration {
            // Only single-variable declarations reach here; range handles pairs
            let name = &declaration.variables[0];
            if declaration.reassign {
                let slot = self
                    .variables
                    .iter_mut()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| RenderError::UndefinedVariable(name.clone()))?;
                slot.1 = value.clone();
            } else {
                self.variables.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&mut self, commands: &[Command], dot: &Value) -> Result<Value, RenderError> {
        let mut piped: Option<Value> = None;
        for command in commands {
            piped = Some(self.eval_command(command, dot, piped)?);
        }
        Ok(piped.unwrap_or(Value::Null))
    }

    fn eval_command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> Result<Value, RenderError> {
        match command.operands.as_slice() {
            [Operand::Function(name), rest @ ..] => {
                let mut args = rest
                    .iter()
                    .map(|operand| self.eval_operand(operand, dot))
                    .collect::<Result<Vec<_>, _>>()?;
                args.extend(piped);
                call_function(name, args)
            }
            [operand] => self.eval_operand(operand, dot),
            _ => Err(RenderError::TypeMismatch("empty command".to_string())),
        }
    }

    fn eval_operand(&mut self, operand: &Operand, dot: &Value) -> Result<Value, RenderError> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(fields) => resolve_fields(dot, fields),
            Operand::Variable { name, fields } => {
                let base = if name.is_empty() {
                    self.root
                } else {
                    self.variables
                        .iter()
                        .rev()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| RenderError::UndefinedVariable(name.clone()))?
                };
                resolve_fields(base, fields)
            }
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Function(name) => call_function(name, Vec::new()),
            Operand::Nested(pipeline) => self.eval_commands(&pipeline.commands, dot),
        }
    }
}

fn resolve_fields(base: &Value, fields: &[String]) -> Result<Value, RenderError> {
    let mut current = base;
    for field in fields {
        current = match current {
            Value::Object(map) => match map.get(field) {
                Some(value) => value,
                None => return Ok(Value::Null),
            },
            Value::Null => return Ok(Value::Null),
            other => {
                return Err(RenderError::FieldOnScalar {
                    field: field.clone(),
                    found: type_name(other),
                });
            }
        };
    }
    Ok(current.clone())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float64",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "map",
    }
}

/// Empty, zero, false, null and empty collections are false
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Text form of a value; null renders as nothing
pub(crate) fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(u)) => u.to_string(),
            _ => n.as_f64().map(|f| f.to_string()).unwrap_or_default(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(display).collect::<Vec<_>>().join(" ")
        ),
        Value::Object(map) => format!(
            "map[{}]",
            map.iter()
                .map(|(k, v)| format!("{}:{}", k, display(v)))
                .collect::<Vec<_>>()
                .join(" ")
        ),
    }
}

// =============================================================================
// Builtin functions
// =============================================================================

fn expect_args(name: &str, args: &[Value], want: usize) -> Result<(), RenderError> {
    if args.len() != want {
        return Err(RenderError::Arity {
            name: name.to_string(),
            want,
            got: args.len(),
        });
    }
    Ok(())
}

fn call_function(name: &str, mut args: Vec<Value>) -> Result<Value, RenderError> {
    match name {
        "printf" => {
            if args.is_empty() {
                return Err(RenderError::Arity {
                    name: name.to_string(),
                    want: 1,
                    got: 0,
                });
            }
            let format = args.remove(0);
            let Value::String(format) = format else {
                return Err(RenderError::TypeMismatch(format!(
                    "printf format must be a string, got {}",
                    type_name(&format)
                )));
            };
            sprintf(&format, &args).map(Value::String)
        }
        "eq" => {
            if args.len() < 2 {
                return Err(RenderError::Arity {
                    name: name.to_string(),
                    want: 2,
                    got: args.len(),
                });
            }
            for other in &args[1..] {
                if values_equal(&args[0], other)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "ne" => {
            expect_args(name, &args, 2)?;
            Ok(Value::Bool(!values_equal(&args[0], &args[1])?))
        }
        "lt" | "le" | "gt" | "ge" => {
            expect_args(name, &args, 2)?;
            let ordering = compare(&args[0], &args[1])?;
            Ok(Value::Bool(match name {
                "lt" => ordering == Ordering::Less,
                "le" => ordering != Ordering::Greater,
                "gt" => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        "and" | "or" => {
            if args.is_empty() {
                return Err(RenderError::Arity {
                    name: name.to_string(),
                    want: 1,
                    got: 0,
                });
            }
            // Returns the first deciding argument, or the last one
            let stop_on = name == "or";
            let last = args.len() - 1;
            let idx = args
                .iter()
                .position(|a| is_truthy(a) == stop_on)
                .unwrap_or(last);
            Ok(args.swap_remove(idx))
        }
        "not" => {
            expect_args(name, &args, 1)?;
            Ok(Value::Bool(!is_truthy(&args[0])))
        }
        "len" => {
            expect_args(name, &args, 1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => {
                    return Err(RenderError::TypeMismatch(format!(
                        "len of {}",
                        type_name(other)
                    )));
                }
            };
            Ok(Value::from(len))
        }
        "index" => {
            if args.is_empty() {
                return Err(RenderError::Arity {
                    name: name.to_string(),
                    want: 2,
                    got: 0,
                });
            }
            let mut current = args.remove(0);
            for key in args {
                current = index_value(current, &key)?;
            }
            Ok(current)
        }
        "lower" | "upper" | "title" => {
            expect_args(name, &args, 1)?;
            let text = display(&args[0]);
            Ok(Value::String(match name {
                "lower" => text.to_lowercase(),
                "upper" => text.to_uppercase(),
                _ => title_case(&text),
            }))
        }
        other => Err(RenderError::UnknownFunction(other.to_string())),
    }
}

fn index_value(collection: Value, key: &Value) -> Result<Value, RenderError> {
    match (collection, key) {
        (Value::Array(mut items), Value::Number(n)) => {
            let idx = n
                .as_u64()
                .map(|i| i as usize)
                .filter(|i| *i < items.len())
                .ok_or_else(|| RenderError::TypeMismatch(format!("index out of range: {}", n)))?;
            Ok(items.swap_remove(idx))
        }
        (Value::Object(mut map), Value::String(k)) => Ok(map.remove(k).unwrap_or(Value::Null)),
        (Value::Null, _) => Ok(Value::Null),
        (collection, key) => Err(RenderError::TypeMismatch(format!(
            "can't index {} with {}",
            type_name(&collection),
            type_name(key)
        ))),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !c.is_alphanumeric();
    }
    out
}

// =============================================================================
// Comparison
// =============================================================================

/// Scalar view used by comparisons; null takes the zero value of the other side
enum Scalar<'a> {
    Number(f64),
    Str(&'a str),
    Bool(bool),
    Null,
}

fn scalar(value: &Value) -> Result<Scalar<'_>, RenderError> {
    match value {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => Ok(Scalar::Number(n.as_f64().unwrap_or_default())),
        Value::String(s) => Ok(Scalar::Str(s)),
        other => Err(RenderError::TypeMismatch(format!(
            "non-comparable type {}",
            type_name(other)
        ))),
    }
}

fn zero_like<'a>(other: &Scalar<'_>) -> Scalar<'a> {
    match other {
        Scalar::Number(_) => Scalar::Number(0.0),
        Scalar::Str(_) => Scalar::Str(""),
        Scalar::Bool(_) => Scalar::Bool(false),
        Scalar::Null => Scalar::Null,
    }
}

fn comparable_pair<'a>(a: &'a Value, b: &'a Value) -> Result<(Scalar<'a>, Scalar<'a>), RenderError> {
    let (a, b) = (scalar(a)?, scalar(b)?);
    if matches!(a, Scalar::Null) {
        let zero = zero_like(&b);
        return Ok((zero, b));
    }
    if matches!(b, Scalar::Null) {
        let zero = zero_like(&a);
        return Ok((a, zero));
    }
    Ok((a, b))
}

fn values_equal(a: &Value, b: &Value) -> Result<bool, RenderError> {
    match comparable_pair(a, b)? {
        (Scalar::Null, Scalar::Null) => Ok(true),
        (Scalar::Number(x), Scalar::Number(y)) => Ok(x == y),
        (Scalar::Str(x), Scalar::Str(y)) => Ok(x == y),
        (Scalar::Bool(x), Scalar::Bool(y)) => Ok(x == y),
        _ => Err(RenderError::TypeMismatch(format!(
            "incompatible types for comparison: {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, RenderError> {
    match comparable_pair(a, b)? {
        (Scalar::Number(x), Scalar::Number(y)) => x
            .partial_cmp(&y)
            .ok_or_else(|| RenderError::TypeMismatch("NaN is not ordered".to_string())),
        (Scalar::Str(x), Scalar::Str(y)) => Ok(x.cmp(y)),
        (Scalar::Null, Scalar::Null) => Ok(Ordering::Equal),
        _ => Err(RenderError::TypeMismatch(format!(
            "invalid type for ordering: {} and {}",
            type_name(a),
            type_name(b)
        ))),
    }
}

// =============================================================================
// printf
// =============================================================================

#[derive(Default)]
struct Spec {
    left_align: bool,
    zero_pad: bool,
    plus: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String, numeric: bool) -> String {
        let Some(width) = self.width else {
            return body;
        };
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.left_align {
            format!("{}{}", body, " ".repeat(fill))
        } else if self.zero_pad && numeric {
            // Keep a sign in front of the zeros
            match body.strip_prefix(['-', '+']) {
                Some(digits) => format!("{}{}{}", &body[..1], "0".repeat(fill), digits),
                None => format!("{}{}", "0".repeat(fill), body),
            }
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }
}

fn as_integer(value: &Value, verb: char) -> Result<i64, RenderError> {
    match value {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| RenderError::TypeMismatch(format!("%{} of non-integer {}", verb, n))),
        other => Err(RenderError::TypeMismatch(format!(
            "%{} of {}",
            verb,
            type_name(other)
        ))),
    }
}

/// Largest printf width or precision accepted
const MAX_FORMAT_BOUND: usize = 1_000_000;

fn parse_bound(digits: &str, what: &str) -> Result<usize, RenderError> {
    digits
        .parse::<usize>()
        .ok()
        .filter(|n| *n <= MAX_FORMAT_BOUND)
        .ok_or_else(|| RenderError::TypeMismatch(format!("printf: bad {} {}", what, digits)))
}

fn sprintf(format: &str, args: &[Value]) -> Result<String, RenderError> {
    let mut out = String::new();
    let mut args = args.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.left_align = true,
                '0' => spec.zero_pad = true,
                '+' => spec.plus = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
            width.push(d);
        }
        if !width.is_empty() {
            spec.width = Some(parse_bound(&width, "width")?);
        }
        if chars.next_if_eq(&'.').is_some() {
            let mut precision = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                precision.push(d);
            }
            spec.precision = Some(if precision.is_empty() {
                0
            } else {
                parse_bound(&precision, "precision")?
            });
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let arg = args.next().ok_or_else(|| {
            RenderError::TypeMismatch(format!("printf: missing argument for %{}", verb))
        })?;

        let formatted = match verb {
            'd' => {
                let n = as_integer(arg, verb)?;
                let body = if spec.plus && n >= 0 {
                    format!("+{}", n)
                } else {
                    n.to_string()
                };
                spec.pad(body, true)
            }
            'x' | 'X' => {
                let n = as_integer(arg, verb)?;
                let body = if verb == 'x' {
                    format!("{:x}", n)
                } else {
                    format!("{:X}", n)
                };
                spec.pad(body, true)
            }
            'f' => {
                let f = match arg {
                    Value::Null => 0.0,
                    Value::Number(n) => n.as_f64().unwrap_or_default(),
                    other => {
                        return Err(RenderError::TypeMismatch(format!(
                            "%f of {}",
                            type_name(other)
                        )));
                    }
                };
                let mut body = String::new();
                let _ = write!(body, "{:.*}", spec.precision.unwrap_or(6), f);
                if spec.plus && f >= 0.0 {
                    body.insert(0, '+');
                }
                spec.pad(body, true)
            }
            's' | 'v' => {
                let mut body = display(arg);
                if let Some(precision) = spec.precision {
                    body = body.chars().take(precision).collect();
                }
                spec.pad(body, false)
            }
            'q' => spec.pad(format!("{:?}", display(arg)), false),
            't' => match arg {
                Value::Bool(b) => spec.pad(b.to_string(), false),
                other => {
                    return Err(RenderError::TypeMismatch(format!(
                        "%t of {}",
                        type_name(other)
                    )));
                }
            },
            other => {
                return Err(RenderError::TypeMismatch(format!(
                    "unsupported printf verb %{}",
                    other
                )));
            }
        };
        out.push_str(&formatted);
    }

    Ok(out)
}
