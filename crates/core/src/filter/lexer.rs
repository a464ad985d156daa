use super::ast::CompareOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    /// Backtick-quoted column name
    QuotedIdent(String),
    Str(String),
    Int(i64),
    Float(f64),
    Compare(CompareOp),
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
    Minus,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
}

/// Token plus its byte offset in the source
pub type Spanned = (Token, usize);

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, String> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).map(|(_, c)| *c);
        let (token, consumed) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '-' => (Token::Minus, 1),
            '=' if next == Some('=') => (Token::Compare(CompareOp::Eq), 2),
            '=' => (Token::Compare(CompareOp::Eq), 1),
            '!' if next == Some('=') => (Token::Compare(CompareOp::NotEq), 2),
            '!' => (Token::Not, 1),
            '<' if next == Some('=') => (Token::Compare(CompareOp::Le), 2),
            '<' if next == Some('>') => (Token::Compare(CompareOp::NotEq), 2),
            '<' => (Token::Compare(CompareOp::Lt), 1),
            '>' if next == Some('=') => (Token::Compare(CompareOp::Ge), 2),
            '>' => (Token::Compare(CompareOp::Gt), 1),
            '&' if next == Some('&') => (Token::And, 2),
            '&' => (Token::And, 1),
            '|' if next == Some('|') => (Token::Or, 2),
            '|' => (Token::Or, 1),
            '~' => (Token::Not, 1),
            '\'' | '"' => {
                let (text, consumed) = read_quoted(&chars[i..], c)
                    .ok_or_else(|| format!("unterminated string starting at offset {}", pos))?;
                (Token::Str(text), consumed)
            }
            '`' => {
                let (text, consumed) = read_quoted(&chars[i..], '`')
                    .ok_or_else(|| format!("unterminated column name starting at offset {}", pos))?;
                (Token::QuotedIdent(text), consumed)
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                read_number(&chars[i..])
                    .ok_or_else(|| format!("malformed number at offset {}", pos))?
            }
            '.' => (Token::Dot, 1),
            c if c.is_alphabetic() || c == '_' => {
                let word: String = chars[i..]
                    .iter()
                    .map(|(_, c)| *c)
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                let consumed = word.chars().count();
                (keyword_or_ident(word), consumed)
            }
            other => return Err(format!("unexpected character '{}' at offset {}", other, pos)),
        };

        tokens.push((token, pos));
        i += consumed;
    }

    Ok(tokens)
}

fn keyword_or_ident(word: String) -> Token {
    match word.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "is" => Token::Is,
        "null" | "none" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        "contains" => Token::Compare(CompareOp::Contains),
        "startswith" => Token::Compare(CompareOp::StartsWith),
        "endswith" => Token::Compare(CompareOp::EndsWith),
        _ => Token::Ident(word),
    }
}

/// Read a quoted run starting at `chars[0]`; backslash escapes the next char.
fn read_quoted(chars: &[(usize, char)], quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i].1 {
            '\\' if quote != '`' => {
                let escaped = chars.get(i + 1)?.1;
                text.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Some((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    None
}

fn read_number(chars: &[(usize, char)]) -> Option<(Token, usize)> {
    let mut text = String::new();
    let mut is_float = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].1;
        if c.is_ascii_digit() || c == '_' {
            if c != '_' {
                text.push(c);
            }
        } else if c == '.' && !is_float {
            is_float = true;
            text.push(c);
        } else if (c == 'e' || c == 'E') && !text.is_empty() {
            is_float = true;
            text.push(c);
            if let Some((_, sign @ ('+' | '-'))) = chars.get(i + 1) {
                text.push(*sign);
                i += 1;
            }
        } else {
            break;
        }
        i += 1;
    }

    let token = if is_float {
        Token::Float(text.parse().ok()?)
    } else {
        Token::Int(text.parse().ok()?)
    };
    Some((token, i))
}
