//! Branch conditions.
//!
//! Anything implementing [`Condition`] can guard a choice branch. Closures
//! work directly; [`Expression`] covers the textual form used in node
//! parameters:
//!
//! ```text
//! ${temperature} > 30 && ${body.device.online} == true || ${mode} == 'force'
//! ```
//!
//! `&&` binds tighter than `||`; parentheses are not supported. `${name}`
//! reads a context property, `${body.a.b}` walks the message body.

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use ruleflow_context::RuleContext;
use serde_json::Value;
use std::fmt;

pub trait Condition: Send + Sync {
    fn test(&self, ctx: &RuleContext) -> Result<bool>;
}

impl<F> Condition for F
where
    F: Fn(&RuleContext) -> Result<bool> + Send + Sync,
{
    fn test(&self, ctx: &RuleContext) -> Result<bool> {
        self(ctx)
    }
}

/// Parsed condition expression in disjunctive form.
#[derive(Clone, PartialEq)]
pub struct Expression {
    source: String,
    any_of: Vec<Vec<Term>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Literal(bool),
    Truthy(Operand),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Property(String),
    Body(Vec<String>),
    Literal(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let reference =
            Regex::new(r"^\$\{\s*([^}]+?)\s*\}$").context("compile reference regex")?;

        let mut any_of = Vec::new();
        let mut all_of = Vec::new();
        let mut term = Vec::new();
        for token in tokenize(source)? {
            match token {
                Token::Or => {
                    all_of.push(parse_term(std::mem::take(&mut term), source, &reference)?);
                    any_of.push(std::mem::take(&mut all_of));
                }
                Token::And => {
                    all_of.push(parse_term(std::mem::take(&mut term), source, &reference)?);
                }
                other => term.push(other),
            }
        }
        all_of.push(parse_term(term, source, &reference)?);
        any_of.push(all_of);

        Ok(Self {
            source: source.to_string(),
            any_of,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, ctx: &RuleContext) -> Result<bool> {
        for clause in &self.any_of {
            let mut matched = true;
            for term in clause {
                if !term.evaluate(ctx)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Condition for Expression {
    fn test(&self, ctx: &RuleContext) -> Result<bool> {
        self.evaluate(ctx)
            .with_context(|| format!("evaluating '{}'", self.source))
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'s> {
    Operand(&'s str),
    Compare(CompareOp),
    And,
    Or,
}

/// Splits `source` into operands and operators. Quoted strings and
/// `${...}` references are single operands whatever they contain.
fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    let token = Regex::new(
        r#"^\s*(?:('[^']*'|"[^"]*"|\$\{[^}]*\})|(==|!=|>=|<=|>|<)|(&&)|(\|\|)|([^\s'"<>=!&|$]+))"#,
    )
    .context("compile token regex")?;

    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.trim_start().is_empty() {
        let caps = token
            .captures(rest)
            .ok_or_else(|| anyhow!("unexpected input '{}' in expression '{source}'", rest.trim()))?;

        tokens.push(if let Some(m) = caps.get(1).or_else(|| caps.get(5)) {
            Token::Operand(m.as_str())
        } else if let Some(m) = caps.get(2) {
            Token::Compare(match m.as_str() {
                "==" => CompareOp::Eq,
                "!=" => CompareOp::Ne,
                ">=" => CompareOp::Ge,
                "<=" => CompareOp::Le,
                ">" => CompareOp::Gt,
                _ => CompareOp::Lt,
            })
        } else if caps.get(3).is_some() {
            Token::And
        } else {
            Token::Or
        });

        rest = &rest[caps[0].len()..];
    }
    Ok(tokens)
}

fn parse_term(tokens: Vec<Token<'_>>, source: &str, reference: &Regex) -> Result<Term> {
    match tokens.as_slice() {
        [] => bail!("empty term in expression '{source}'"),
        [Token::Operand("true")] => Ok(Term::Literal(true)),
        [Token::Operand("false")] => Ok(Term::Literal(false)),
        [Token::Operand(raw)] => match parse_operand(raw, reference)? {
            Operand::Literal(value) => bail!("constant term '{}' in condition", value),
            operand => Ok(Term::Truthy(operand)),
        },
        [Token::Operand(left), Token::Compare(op), Token::Operand(right)] => Ok(Term::Compare {
            left: parse_operand(left, reference)?,
            op: *op,
            right: parse_operand(right, reference)?,
        }),
        _ => bail!("malformed term in expression '{source}'"),
    }
}

fn parse_operand(raw: &str, reference: &Regex) -> Result<Operand> {
    let raw = raw.trim();

    if let Some(caps) = reference.captures(raw) {
        let path = &caps[1];
        return Ok(match path.strip_prefix("body") {
            Some("") => Operand::Body(Vec::new()),
            Some(rest) if rest.starts_with('.') => {
                Operand::Body(rest[1..].split('.').map(str::to_string).collect())
            }
            _ => Operand::Property(path.to_string()),
        });
    }

    let quoted = (raw.starts_with('\'') && raw.ends_with('\''))
        || (raw.starts_with('"') && raw.ends_with('"'));
    if quoted && raw.len() >= 2 {
        return Ok(Operand::Literal(Value::String(raw[1..raw.len() - 1].to_string())));
    }

    match raw {
        "true" => return Ok(Operand::Literal(Value::Bool(true))),
        "false" => return Ok(Operand::Literal(Value::Bool(false))),
        "null" => return Ok(Operand::Literal(Value::Null)),
        _ => {}
    }

    if let Ok(number) = raw.parse::<f64>() {
        return serde_json::Number::from_f64(number)
            .map(|n| Operand::Literal(Value::Number(n)))
            .ok_or_else(|| anyhow!("unsupported number '{raw}'"));
    }

    bail!("unrecognised operand '{raw}'")
}

impl Term {
    fn evaluate(&self, ctx: &RuleContext) -> Result<bool> {
        match self {
            Term::Literal(value) => Ok(*value),
            Term::Truthy(operand) => Ok(truthy(&operand.resolve(ctx)?)),
            Term::Compare { left, op, right } => {
                let left = left.resolve(ctx)?;
                let right = right.resolve(ctx)?;
                compare(&left, *op, &right)
            }
        }
    }
}

impl Operand {
    fn resolve(&self, ctx: &RuleContext) -> Result<Value> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Property(name) => ctx
                .property(name)
                .map(|v| Value::String(v.to_string()))
                .ok_or_else(|| anyhow!("unknown property '{name}'")),
            Operand::Body(path) => {
                let mut current = &ctx.body;
                for segment in path {
                    current = match current {
                        Value::Object(map) => map.get(segment),
                        Value::Array(items) => {
                            segment.parse::<usize>().ok().and_then(|i| items.get(i))
                        }
                        _ => None,
                    }
                    .ok_or_else(|| anyhow!("body path 'body.{}' not found", path.join(".")))?;
                }
                Ok(current.clone())
            }
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool> {
    let numbers = as_number(left).zip(as_number(right));

    match op {
        CompareOp::Eq | CompareOp::Ne => {
            let equal = match numbers {
                Some((l, r)) => l == r,
                None => as_text(left) == as_text(right),
            };
            Ok(equal == (op == CompareOp::Eq))
        }
        _ => {
            let (l, r) = numbers
                .ok_or_else(|| anyhow!("cannot order {} and {}", left, right))?;
            Ok(match op {
                CompareOp::Gt => l > r,
                CompareOp::Ge => l >= r,
                CompareOp::Lt => l < r,
                _ => l <= r,
            })
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "false",
        _ => true,
    }
}
