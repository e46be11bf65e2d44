//! Static evaluation of C integer constant expressions.
//!
//! Enough of C to resolve enum initializers and numeric `#define`s:
//! integer and character literals, identifiers resolved through a lookup,
//! parentheses, simple casts, unary and binary operators with C precedence.
//! Anything else evaluates to `None` ("unresolved").

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(i64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+", "-", "*", "/", "%", "&", "|", "^", "~",
    "!", "<", ">",
];

/// Parse an integer literal, ignoring `u/U/l/L` suffixes
pub fn parse_int_literal(text: &str) -> Option<i64> {
    let body = text.trim_end_matches(['u', 'U', 'l', 'L']);
    let lower = body.to_ascii_lowercase();
    let value = if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()?
    } else if lower.len() > 1 && lower.starts_with('0') {
        u64::from_str_radix(&lower[1..], 8).ok()?
    } else {
        lower.parse::<u64>().ok()?
    };
    i64::try_from(value).ok()
}

fn parse_char_literal(chars: &[char]) -> Option<(i64, usize)> {
    // chars[0] is the opening quote
    match (chars.get(1)?, chars.get(2)?) {
        ('\\', esc) => {
            let value = match esc {
                'n' => 10,
                't' => 9,
                'r' => 13,
                '0' => 0,
                '\\' => 92,
                '\'' => 39,
                '"' => 34,
                _ => return None,
            };
            (chars.get(3)? == &'\'').then_some((value, 4))
        }
        (c, '\'') => Some((*c as i64, 3)),
        _ => None,
    }
}

fn tokenize(expr: &str) -> Option<Vec<Token>> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            tokens.push(Token::Num(parse_int_literal(&literal)?));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }
        if c == '\'' {
            let (value, len) = parse_char_literal(&chars[i..])?;
            tokens.push(Token::Num(value));
            i += len;
            continue;
        }
        if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
            continue;
        }
        if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
            continue;
        }
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = OPERATORS
            .iter()
            .find(|op| two.starts_with(**op))
            .copied()?;
        tokens.push(Token::Op(op));
        i += op.len();
    }
    Some(tokens)
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "*" | "/" | "%" => 10,
        "+" | "-" => 9,
        "<<" | ">>" => 8,
        "<" | "<=" | ">" | ">=" => 7,
        "==" | "!=" => 6,
        "&" => 5,
        "^" => 4,
        "|" => 3,
        "&&" => 2,
        "||" => 1,
        _ => return None,
    })
}

fn is_cast_type_word(word: &str) -> bool {
    matches!(
        word,
        "int" | "unsigned" | "signed" | "long" | "short" | "char" | "const"
    ) || word.ends_with("_t")
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    lookup: &'a dyn Fn(&str) -> Option<i64>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    /// `( type-words )` directly ahead
    fn cast_len(&self) -> Option<usize> {
        let mut n = 1;
        loop {
            match self.tokens.get(self.pos + n)? {
                Token::Ident(word) if is_cast_type_word(word) => n += 1,
                Token::RParen if n > 1 => return Some(n + 1),
                _ => return None,
            }
        }
    }

    fn expr(&mut self, min_prec: u8) -> Option<i64> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            let prec = match binary_precedence(op) {
                Some(p) if p >= min_prec => p,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.expr(prec + 1)?;
            lhs = apply_binary(op, lhs, rhs)?;
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i64> {
        match self.next()? {
            Token::Num(n) => Some(n),
            Token::Ident(name) => (self.lookup)(&name),
            Token::LParen => {
                self.pos -= 1;
                if let Some(len) = self.cast_len() {
                    self.pos += len;
                    return self.unary();
                }
                self.pos += 1;
                let value = self.expr(0)?;
                match self.next()? {
                    Token::RParen => Some(value),
                    _ => None,
                }
            }
            Token::Op("+") => self.unary(),
            Token::Op("-") => self.unary()?.checked_neg(),
            Token::Op("~") => Some(!self.unary()?),
            Token::Op("!") => Some(i64::from(self.unary()? == 0)),
            _ => None,
        }
    }
}

fn apply_binary(op: &str, a: i64, b: i64) -> Option<i64> {
    let shift = |b: i64| u32::try_from(b).ok().filter(|s| *s < 64);
    Some(match op {
        "*" => a.checked_mul(b)?,
        "/" => a.checked_div(b)?,
        "%" => a.checked_rem(b)?,
        "+" => a.checked_add(b)?,
        "-" => a.checked_sub(b)?,
        "<<" => a.checked_shl(shift(b)?)?,
        ">>" => a.checked_shr(shift(b)?)?,
        "<" => i64::from(a < b),
        "<=" => i64::from(a <= b),
        ">" => i64::from(a > b),
        ">=" => i64::from(a >= b),
        "==" => i64::from(a == b),
        "!=" => i64::from(a != b),
        "&" => a & b,
        "^" => a ^ b,
        "|" => a | b,
        "&&" => i64::from(a != 0 && b != 0),
        "||" => i64::from(a != 0 || b != 0),
        _ => return None,
    })
}

/// Evaluate `expr`; identifiers are resolved through `lookup`
pub fn eval_int_expr(expr: &str, lookup: &dyn Fn(&str) -> Option<i64>) -> Option<i64> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return None;
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        lookup,
    };
    let value = parser.expr(0)?;
    (parser.pos == parser.tokens.len()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> Option<i64> {
        eval_int_expr(expr, &|name| match name {
            "BASE" => Some(16),
            "FLAG_A" => Some(1),
            _ => None,
        })
    }

    #[test]
    fn test_literals_with_suffixes() {
        assert_eq!(parse_int_literal("42u"), Some(42));
        assert_eq!(parse_int_literal("0x1Fu"), Some(31));
        assert_eq!(parse_int_literal("0b101"), Some(5));
        assert_eq!(parse_int_literal("010"), Some(8));
        assert_eq!(parse_int_literal("0"), Some(0));
        assert_eq!(parse_int_literal("12UL"), Some(12));
        assert_eq!(parse_int_literal("0xZZ"), None);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Some(7));
        assert_eq!(eval("(1 + 2) * 3"), Some(9));
        assert_eq!(eval("1 << 2 | 1"), Some(5));
        assert_eq!(eval("0xF0 & 0x3C ^ 1"), Some(0x31));
        assert_eq!(eval("10 - 4 - 3"), Some(3));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(eval("-1"), Some(-1));
        assert_eq!(eval("~0"), Some(-1));
        assert_eq!(eval("!0"), Some(1));
        assert_eq!(eval("+(3)"), Some(3));
    }

    #[test]
    fn test_identifiers_and_casts() {
        assert_eq!(eval("BASE + 1"), Some(17));
        assert_eq!(eval("FLAG_A << 4"), Some(16));
        assert_eq!(eval("(int)BASE"), Some(16));
        assert_eq!(eval("(uint32_t)0x10u"), Some(16));
    }

    #[test]
    fn test_unresolved() {
        assert_eq!(eval("UNKNOWN + 1"), None);
        assert_eq!(eval("1 / 0"), None);
        assert_eq!(eval("sizeof(int)"), None);
        assert_eq!(eval("1 +"), None);
        assert_eq!(eval(""), None);
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(eval("'A'"), Some(65));
        assert_eq!(eval("'\\n'"), Some(10));
    }
}
