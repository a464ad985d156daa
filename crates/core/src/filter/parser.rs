use super::ast::Expr;
use super::lexer::{Spanned, Token};
use serde_json::Value;

/// Recursive-descent parser over the token stream.
///
/// ```text
/// or         := and (("or" | "||" | "|") and)*
/// and        := not (("and" | "&&" | "&") not)*
/// not        := ("not" | "!" | "~") not | comparison
/// comparison := operand [op operand] | operand "is" ["not"] "null"
/// operand    := column [".str." text_op "(" string ")"] | literal | "(" or ")"
/// ```
pub struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    source_len: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned], source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            source_len,
        }
    }

    pub fn parse(mut self) -> Result<Expr, String> {
        if self.tokens.is_empty() {
            return Err("condition is empty".to_string());
        }
        let expr = self.parse_or()?;
        if let Some((token, offset)) = self.tokens.get(self.pos) {
            return Err(format!("unexpected {:?} at offset {}", token, offset));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, o)| *o)
            .unwrap_or(self.source_len)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        let offset = self.offset();
        match self.advance() {
            Some(token) if *token == expected => Ok(()),
            Some(token) => Err(format!(
                "expected {:?} but found {:?} at offset {}",
                expected, token, offset
            )),
            None => Err(format!("expected {:?} but the condition ended", expected)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let left = self.parse_operand()?;

        match self.peek() {
            Some(Token::Compare(op)) => {
                let op = *op;
                self.advance();
                let right = self.parse_operand()?;
                if matches!(self.peek(), Some(Token::Compare(_)) | Some(Token::Is)) {
                    return Err(format!(
                        "chained comparisons are not supported (offset {})",
                        self.offset()
                    ));
                }
                Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
            }
            Some(Token::Is) => {
                self.advance();
                let negated = if self.peek() == Some(&Token::Not) {
                    self.advance();
                    true
                } else {
                    false
                };
                self.expect(Token::Null)?;
                Ok(Expr::IsNull {
                    expr: Box::new(left),
                    negated,
                })
            }
            _ => Ok(left),
        }
    }

    fn parse_operand(&mut self) -> Result<Expr, String> {
        let offset = self.offset();
        let token = self
            .advance()
            .cloned()
            .ok_or_else(|| "condition ended where a value was expected".to_string())?;

        match token {
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if name == "df" && self.peek() == Some(&Token::LBracket) => {
                self.advance();
                let column = match self.advance() {
                    Some(Token::Str(column)) => column.clone(),
                    _ => return Err(format!("expected a quoted column name after df[ at offset {}", offset)),
                };
                self.expect(Token::RBracket)?;
                self.parse_str_method(Expr::Column(column))
            }
            Token::Ident(name) | Token::QuotedIdent(name) => self.parse_str_method(Expr::Column(name)),
            Token::Str(text) => Ok(Expr::Literal(Value::String(text))),
            Token::Int(n) => Ok(Expr::Literal(Value::from(n))),
            Token::Float(n) => float_literal(n, offset),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Minus => match self.advance() {
                Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(-*n))),
                Some(Token::Float(n)) => float_literal(-*n, offset),
                _ => Err(format!("expected a number after '-' at offset {}", offset)),
            },
            other => Err(format!("unexpected {:?} at offset {}", other, offset)),
        }
    }

    /// `column.str.contains('x')`, `.str.startswith(..)` and `.str.endswith(..)`
    fn parse_str_method(&mut self, column: Expr) -> Result<Expr, String> {
        if self.peek() != Some(&Token::Dot) {
            return Ok(column);
        }
        let offset = self.offset();
        self.advance();

        match self.advance() {
            Some(Token::Ident(name)) if name == "str" => {}
            _ => return Err(format!("only the .str accessor is supported (offset {})", offset)),
        }
        self.expect(Token::Dot)?;
        let op = match self.advance() {
            Some(Token::Compare(op)) if op.is_text() => *op,
            _ => {
                return Err(format!(
                    "expected contains, startswith or endswith after .str (offset {})",
                    offset
                ))
            }
        };
        self.expect(Token::LParen)?;
        let pattern = match self.advance() {
            Some(Token::Str(text)) => text.clone(),
            _ => return Err(format!("expected a quoted string argument to {} (offset {})", op, offset)),
        };
        self.expect(Token::RParen)?;

        Ok(Expr::Compare(
            op,
            Box::new(column),
            Box::new(Expr::Literal(Value::String(pattern))),
        ))
    }
}

fn float_literal(n: f64, offset: usize) -> Result<Expr, String> {
    serde_json::Number::from_f64(n)
        .map(|n| Expr::Literal(Value::Number(n)))
        .ok_or_else(|| format!("number out of range at offset {}", offset))
}
