//! # Condition Expressions
//!
//! Small boolean expression evaluator used by the conditional strategy to
//! gate task execution against the execution context. Supports equality
//! comparisons between variables and literals, `&&`, `||`, `!` and
//! parentheses; a bare variable is truthy when it renders to "true".
//!
//! Grammar (precedence low to high):
//! ```text
//! expr    := or
//! or      := and ("||" and)*
//! and     := unary ("&&" unary)*
//! unary   := "!" unary | comparison
//! compare := operand (("==" | "!=") operand)?
//! operand := "(" expr ")" | literal | variable
//! ```

use crate::context::ExecutionContext;

/// Errors raised while parsing or evaluating a condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token at offset {0}")]
    UnexpectedToken(usize),
    #[error("unterminated string literal at offset {0}")]
    UnterminatedLiteral(usize),
}

/// Evaluate a condition against the context.
///
/// Comparison operands resolve variables through the context; names with
/// no binding compare as empty strings (and are falsy bare).
pub fn evaluate(expression: &str, context: &ExecutionContext) -> Result<bool, ExpressionError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
        context,
    };
    let value = parser.parse_or()?;
    if parser.position != parser.tokens.len() {
        return Err(ExpressionError::UnexpectedToken(
            parser.tokens[parser.position].offset,
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Literal(String),
    Eq,
    NotEq,
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token { kind: TokenKind::OpenParen, offset: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::CloseParen, offset: i });
                i += 1;
            }
            '=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token { kind: TokenKind::Eq, offset: i });
                i += 2;
            }
            '!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token { kind: TokenKind::NotEq, offset: i });
                i += 2;
            }
            '!' => {
                tokens.push(Token { kind: TokenKind::Not, offset: i });
                i += 1;
            }
            '&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token { kind: TokenKind::And, offset: i });
                i += 2;
            }
            '|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token { kind: TokenKind::Or, offset: i });
                i += 2;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] as char != quote {
                    j += 1;
                }
                if j >= bytes.len() {
                    return Err(ExpressionError::UnterminatedLiteral(i));
                }
                tokens.push(Token {
                    kind: TokenKind::Literal(input[start..j].to_string()),
                    offset: i,
                });
                i = j + 1;
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let start = i;
                while i < bytes.len() {
                    let c = bytes[i] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Ident(input[start..i].to_string()),
                    offset: start,
                });
            }
            _ => return Err(ExpressionError::UnexpectedToken(i)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    context: &'a ExecutionContext,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.position).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<bool, ExpressionError> {
        let mut value = self.parse_and()?;
        while self.peek() == Some(&TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<bool, ExpressionError> {
        let mut value = self.parse_unary()?;
        while self.peek() == Some(&TokenKind::And) {
            self.advance();
            let rhs = self.parse_unary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_unary(&mut self) -> Result<bool, ExpressionError> {
        if self.peek() == Some(&TokenKind::Not) {
            self.advance();
            return Ok(!self.parse_unary()?);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<bool, ExpressionError> {
        // Parenthesized sub-expressions are boolean operands
        if self.peek() == Some(&TokenKind::OpenParen) {
            self.advance();
            let value = self.parse_or()?;
            match self.advance() {
                Some(token) if token.kind == TokenKind::CloseParen => return Ok(value),
                Some(token) => return Err(ExpressionError::UnexpectedToken(token.offset)),
                None => return Err(ExpressionError::UnexpectedEnd),
            }
        }

        let left = self.parse_operand()?;
        match self.peek() {
            Some(TokenKind::Eq) => {
                self.advance();
                let right = self.parse_operand()?;
                Ok(left == right)
            }
            Some(TokenKind::NotEq) => {
                self.advance();
                let right = self.parse_operand()?;
                Ok(left != right)
            }
            // Bare operand: truthy when it renders to "true"
            _ => Ok(left == "true"),
        }
    }

    fn parse_operand(&mut self) -> Result<String, ExpressionError> {
        match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::Literal(text) => Ok(text.clone()),
                TokenKind::Ident(name) => {
                    Ok(self.context.get_string(name).unwrap_or_default())
                }
                _ => Err(ExpressionError::UnexpectedToken(token.offset)),
            },
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set_variable("status", Value::String("approved".to_string()));
        ctx.set_variable("region", Value::String("eu".to_string()));
        ctx.set_variable("enabled", Value::String("true".to_string()));
        ctx.set_variable("disabled", Value::String("false".to_string()));
        ctx
    }

    #[test]
    fn equality_against_literals() {
        let ctx = context();
        assert!(evaluate("status == 'approved'", &ctx).unwrap());
        assert!(!evaluate("status == 'rejected'", &ctx).unwrap());
        assert!(evaluate("status != 'rejected'", &ctx).unwrap());
    }

    #[test]
    fn logical_operators() {
        let ctx = context();
        assert!(evaluate("status == 'approved' && region == 'eu'", &ctx).unwrap());
        assert!(!evaluate("status == 'approved' && region == 'us'", &ctx).unwrap());
        assert!(evaluate("region == 'us' || enabled", &ctx).unwrap());
    }

    #[test]
    fn negation_and_parentheses() {
        let ctx = context();
        assert!(evaluate("!(region == 'us')", &ctx).unwrap());
        assert!(evaluate("!disabled && (region == 'eu' || region == 'us')", &ctx).unwrap());
    }

    #[test]
    fn bare_variable_truthiness() {
        let ctx = context();
        assert!(evaluate("enabled", &ctx).unwrap());
        assert!(!evaluate("disabled", &ctx).unwrap());
        assert!(!evaluate("missing_variable", &ctx).unwrap());
    }

    #[test]
    fn unknown_variables_compare_as_empty() {
        let ctx = context();
        assert!(evaluate("missing == ''", &ctx).unwrap());
        assert!(!evaluate("missing == 'x'", &ctx).unwrap());
    }

    #[test]
    fn double_quoted_literals() {
        let ctx = context();
        assert!(evaluate("status == \"approved\"", &ctx).unwrap());
    }

    #[test]
    fn malformed_expressions_error() {
        let ctx = context();
        assert!(evaluate("status ==", &ctx).is_err());
        assert!(evaluate("status == 'open", &ctx).is_err());
        assert!(evaluate("(status == 'approved'", &ctx).is_err());
        assert!(evaluate("status @ 'x'", &ctx).is_err());
    }
}
