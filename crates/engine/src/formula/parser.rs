// Expression parser - converts substituted expression strings into an AST.
// By the time text reaches this parser every cell reference has been replaced
// by a literal, so the grammar is deliberately small: numbers, strings,
// nested list literals, function calls, basic math (+, -, *, /), and
// comparison operators (<, >, =, <=, >=, <>).

/// Expression AST for the sandboxed evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    /// List literal `[a, b, ...]`; nested lists carry expanded ranges.
    List(Vec<Expr>),
    Function {
        name: String,
        args: Vec<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Negate(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    // Comparison
    Lt,   // <
    Gt,   // >
    Eq,   // =
    LtEq, // <=
    GtEq, // >=
    NotEq, // <>
}

/// Parse a fully-substituted expression string into an AST.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("Empty expression".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("Unexpected trailing input at token {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    StringLit(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    // Comparison operators
    Lt,    // <
    Gt,    // >
    Eq,    // =
    LtEq,  // <=
    GtEq,  // >=
    NotEq, // <>
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '[' => {
                tokens.push(Token::LBracket);
                chars.next();
            }
            ']' => {
                tokens.push(Token::RBracket);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        tokens.push(Token::LtEq);
                        chars.next();
                    }
                    Some('>') => {
                        tokens.push(Token::NotEq);
                        chars.next();
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                tokens.push(Token::Eq);
                chars.next();
            }
            '"' => {
                chars.next(); // consume opening quote
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => {
                                s.push('\\');
                                s.push(other);
                            }
                            None => return Err("Unterminated string literal".to_string()),
                        },
                        Some('"') => break,
                        Some(ch) => s.push(ch),
                        None => return Err("Unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            'A'..='Z' | 'a'..='z' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_uppercase()));
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// Unary minus (and a no-op unary plus)
fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos < tokens.len() {
        match &tokens[pos] {
            Token::Minus => {
                let (inner, new_pos) = parse_unary(tokens, pos + 1)?;
                return Ok((Expr::Negate(Box::new(inner)), new_pos));
            }
            Token::Plus => {
                return parse_unary(tokens, pos + 1);
            }
            _ => {}
        }
    }
    parse_primary(tokens, pos)
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::LParen => {
            let (expr, new_pos) = parse_comparison(tokens, pos + 1)?;
            expect_rparen(tokens, new_pos)?;
            Ok((expr, new_pos + 1))
        }
        Token::LBracket => parse_list(tokens, pos),
        Token::Ident(name) => {
            // Only function calls carry identifiers; a bare name is an
            // unresolved token (e.g. an unreferenced address) and fails.
            if pos + 1 < tokens.len() {
                if let Token::LParen = tokens[pos + 1] {
                    return parse_call(name.clone(), tokens, pos + 2);
                }
            }
            Err(format!("Unknown identifier: {}", name))
        }
        other => Err(format!("Unexpected token: {:?}", other)),
    }
}

fn parse_list(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    // pos points at the opening bracket
    let mut items = Vec::new();
    let mut pos = pos + 1;

    if let Some(Token::RBracket) = tokens.get(pos) {
        return Ok((Expr::List(items), pos + 1));
    }

    loop {
        let (item, new_pos) = parse_comparison(tokens, pos)?;
        items.push(item);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::Comma) => pos += 1,
            Some(Token::RBracket) => return Ok((Expr::List(items), pos + 1)),
            _ => return Err("Expected ',' or ']' in list".to_string()),
        }
    }
}

fn parse_call(name: String, tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    // pos points just past the opening paren
    let mut args = Vec::new();
    let mut pos = pos;

    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((Expr::Function { name, args }, pos + 1));
    }

    loop {
        let (arg, new_pos) = parse_comparison(tokens, pos)?;
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::Comma) => pos += 1,
            Some(Token::RParen) => return Ok((Expr::Function { name, args }, pos + 1)),
            _ => return Err(format!("Expected ',' or ')' in call to {}", name)),
        }
    }
}

fn expect_rparen(tokens: &[Token], pos: usize) -> Result<(), String> {
    match tokens.get(pos) {
        Some(Token::RParen) => Ok(()),
        _ => Err("Expected closing parenthesis".to_string()),
    }
}
