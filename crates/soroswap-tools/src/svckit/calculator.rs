//! Calculator Tool
//!
//! Arithmetic over `+ - * / ^` and parentheses. Takes a legacy string input:
//! either the bare expression or JSON with an `input`/`expression` field.

use async_trait::async_trait;

use swap_agent_core::{
    AgentError, Result as CoreResult, Tool, ToolInput, ToolOutput, ToolSchema, tool::ParameterSchema,
};

use super::legacy_text;

const ALLOWED: &str = "0123456789+-*/().^";

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 64;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "calculator".into(),
            description: "A simple calculator that can perform basic arithmetic operations (+, -, *, /, ^)".into(),
            parameters: vec![ParameterSchema::required(
                "expression",
                "string",
                "Arithmetic expression, e.g. '15*23'",
            )],
            category: Some("utility".into()),
            has_side_effects: false,
            accepts_structured_args: false,
            needs_caller_context: false,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let expression: String = legacy_text(&input, &["input", "expression"])
            .chars()
            .filter(|c| ALLOWED.contains(*c))
            .collect();
        if expression.is_empty() {
            return Err(AgentError::ToolValidation("Invalid characters in expression".into()));
        }

        let value = evaluate(&expression)?;
        Ok(ToolOutput::text(format!("Result: {}", format_number(value))))
    }
}

/// Evaluate an already-sanitized expression
pub fn evaluate(expression: &str) -> CoreResult<f64> {
    let mut parser = Parser {
        chars: expression.as_bytes(),
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos != parser.chars.len() || !value.is_finite() {
        return Err(invalid());
    }
    Ok(value)
}

fn invalid() -> AgentError {
    AgentError::ToolExecution("Invalid mathematical expression".into())
}

/// Integers print without a fractional part
#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct Parser<'a> {
    chars: &'a [u8],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn nested(&mut self, rule: fn(&mut Self) -> CoreResult<f64>) -> CoreResult<f64> {
        if self.depth >= MAX_DEPTH {
            return Err(invalid());
        }
        self.depth += 1;
        let value = rule(self);
        self.depth -= 1;
        value
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> CoreResult<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat(b'+') {
                value += self.term()?;
            } else if self.eat(b'-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    // term := power (('*' | '/') power)*
    fn term(&mut self) -> CoreResult<f64> {
        let mut value = self.power()?;
        loop {
            if self.eat(b'*') {
                value *= self.power()?;
            } else if self.eat(b'/') {
                value /= self.power()?;
            } else {
                return Ok(value);
            }
        }
    }

    // power := unary ('^' power)?, right-associative
    fn power(&mut self) -> CoreResult<f64> {
        let base = self.unary()?;
        if self.eat(b'^') {
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> CoreResult<f64> {
        if self.eat(b'-') {
            return Ok(-self.nested(Self::unary)?);
        }
        if self.eat(b'+') {
            return self.nested(Self::unary);
        }
        self.primary()
    }

    fn primary(&mut self) -> CoreResult<f64> {
        if self.eat(b'(') {
            let value = self.nested(Self::expr)?;
            if !self.eat(b')') {
                return Err(invalid());
            }
            return Ok(value);
        }

        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9' | b'.')) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.chars[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(invalid)
    }
}
