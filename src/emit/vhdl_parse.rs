//! Parses a hand-written VHDL entity into the HIR's own port contract, and
//! evaluates the generic-dependent width expressions those entities use
//! (`std_logic_vector(width - 1 downto 0)`) with a small sandboxed
//! four-function evaluator instead of a general expression engine.

use std::collections::HashMap;

use crate::error::{CcError, Result};
use crate::hir::PortDir;

#[derive(Debug, Clone)]
pub struct ExternalPort {
    pub name: String,
    pub dir: PortDir,
    /// The raw `<expr>` from `std_logic_vector(<expr> downto 0)`, or `None`
    /// for a plain `std_logic` port.
    pub width_expr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExternalEntity {
    pub name: String,
    pub generics: Vec<String>,
    pub ports: Vec<ExternalPort>,
}

/// The ternary-adder primitive's own VHDL source, bundled with the crate
/// rather than resolved from a caller-supplied path, since it is a fixed
/// part of this compiler's output, not a user-provided design.
const ADD8_3W_SRC: &str = include_str!("add8_3w.vhd");

/// Lifts the ternary-adder primitive into its entity/generic/port contract
/// by parsing the same bundled VHDL source the emitter instantiates against,
/// rather than hardcoding its name, generic, and port names separately.
pub fn add8_3w_entity() -> Result<ExternalEntity> {
    parse_entity(ADD8_3W_SRC)
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                // line comment: discard to end of line
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '(' | ')' | ':' | ';' | ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(c.to_string());
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parses a full VHDL source file down to its `entity ... is ... end`
/// declaration: name, generic clause, and port clause with direction and
/// (for vector ports) the raw width expression.
pub fn parse_entity(text: &str) -> Result<ExternalEntity> {
    let tokens = tokenize(text);
    let lower: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();

    let entity_pos = lower
        .iter()
        .position(|t| t == "entity")
        .ok_or_else(|| CcError::VhdlParse("no `entity` declaration found".into()))?;
    let name = tokens
        .get(entity_pos + 1)
        .cloned()
        .ok_or_else(|| CcError::VhdlParse("entity declaration missing a name".into()))?;

    let mut generics = Vec::new();
    if let Some(generic_pos) = lower.iter().position(|t| t == "generic") {
        let open = generic_pos + 1;
        if tokens.get(open).map(String::as_str) != Some("(") {
            return Err(CcError::VhdlParse("malformed generic clause".into()));
        }
        let close = matching_paren(&tokens, open)?;
        let mut i = open + 1;
        while i < close {
            let gname = tokens[i].clone();
            // skip to the next `;` or the closing paren
            while i < close && tokens[i] != ";" {
                i += 1;
            }
            if !gname.is_empty() && gname != ":" {
                generics.push(gname);
            }
            i += 1;
        }
    }

    let port_pos = lower
        .iter()
        .position(|t| t == "port")
        .ok_or_else(|| CcError::VhdlParse("no `port` clause found".into()))?;
    let open = port_pos + 1;
    if tokens.get(open).map(String::as_str) != Some("(") {
        return Err(CcError::VhdlParse("malformed port clause".into()));
    }
    let close = matching_paren(&tokens, open)?;

    let mut ports = Vec::new();
    let mut i = open + 1;
    while i < close {
        let pname = tokens[i].clone();
        i += 1;
        if tokens.get(i).map(String::as_str) != Some(":") {
            return Err(CcError::VhdlParse(format!("port `{pname}` missing `:`")));
        }
        i += 1;
        let dir = match tokens.get(i).map(|s| s.to_ascii_lowercase()) {
            Some(d) if d == "in" => PortDir::In,
            Some(d) if d == "out" => PortDir::Out,
            _ => return Err(CcError::VhdlParse(format!("port `{pname}` has no direction"))),
        };
        i += 1;

        let mut type_tokens = Vec::new();
        while i < close && tokens[i] != ";" {
            type_tokens.push(tokens[i].clone());
            i += 1;
        }
        if i < close {
            i += 1; // skip `;`
        }

        let width_expr = extract_width_expr(&type_tokens);
        ports.push(ExternalPort {
            name: pname,
            dir,
            width_expr,
        });
    }

    Ok(ExternalEntity { name, generics, ports })
}

fn matching_paren(tokens: &[String], open: usize) -> Result<usize> {
    let mut depth = 0i32;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        match t.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(CcError::VhdlParse("unbalanced parentheses".into()))
}

/// `std_logic_vector ( <expr> downto 0 )` -> `<expr>` joined back to text.
fn extract_width_expr(type_tokens: &[String]) -> Option<String> {
    let lower: Vec<String> = type_tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
    if lower.first().map(String::as_str) != Some("std_logic_vector") {
        return None;
    }
    let open = lower.iter().position(|t| t == "(")?;
    let downto = lower.iter().position(|t| t == "downto")?;
    Some(type_tokens[open + 1..downto].join(" "))
}

#[derive(Debug, Clone, Copy)]
enum Tok {
    Num(i64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn lex_expr(expr: &str, generics: &HashMap<String, i64>) -> Result<Vec<Tok>> {
    let mut out = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                out.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                out.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                out.push(Tok::Star);
            }
            '/' => {
                chars.next();
                out.push(Tok::Slash);
            }
            '(' => {
                chars.next();
                out.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                out.push(Tok::RParen);
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Tok::Num(s.parse().map_err(|_| {
                    CcError::VhdlParse(format!("bad integer literal `{s}`"))
                })?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        s.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = generics
                    .get(&s)
                    .ok_or_else(|| CcError::VhdlParse(format!("unbound generic `{s}`")))?;
                out.push(Tok::Num(*value));
            }
            other => {
                return Err(CcError::VhdlParse(format!("unexpected character `{other}`")));
            }
        }
    }
    Ok(out)
}

/// A sandboxed four-function (`+ - * /`) integer expression evaluator for
/// generic-dependent port widths, standing in for the original's raw
/// `eval()` call on an attacker-unreachable but still untrusted string.
pub fn eval_expr(expr: &str, generics: &HashMap<String, i64>) -> Result<i64> {
    let tokens = lex_expr(expr, generics)?;
    let mut pos = 0;
    let value = parse_additive(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(CcError::VhdlParse(format!("trailing tokens in `{expr}`")));
    }
    Ok(value)
}

fn parse_additive(tokens: &[Tok], pos: &mut usize) -> Result<i64> {
    let mut value = parse_multiplicative(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Tok::Plus) => {
                *pos += 1;
                value += parse_multiplicative(tokens, pos)?;
            }
            Some(Tok::Minus) => {
                *pos += 1;
                value -= parse_multiplicative(tokens, pos)?;
            }
            _ => return Ok(value),
        }
    }
}

fn parse_multiplicative(tokens: &[Tok], pos: &mut usize) -> Result<i64> {
    let mut value = parse_primary(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Tok::Star) => {
                *pos += 1;
                value *= parse_primary(tokens, pos)?;
            }
            Some(Tok::Slash) => {
                *pos += 1;
                let rhs = parse_primary(tokens, pos)?;
                if rhs == 0 {
                    return Err(CcError::VhdlParse("division by zero in generic expression".into()));
                }
                value /= rhs;
            }
            _ => return Ok(value),
        }
    }
}

fn parse_primary(tokens: &[Tok], pos: &mut usize) -> Result<i64> {
    match tokens.get(*pos) {
        Some(Tok::Num(n)) => {
            *pos += 1;
            Ok(*n)
        }
        Some(Tok::Minus) => {
            *pos += 1;
            Ok(-parse_primary(tokens, pos)?)
        }
        Some(Tok::LParen) => {
            *pos += 1;
            let value = parse_additive(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Tok::RParen) => {
                    *pos += 1;
                    Ok(value)
                }
                _ => Err(CcError::VhdlParse("missing closing parenthesis".into())),
            }
        }
        _ => Err(CcError::VhdlParse("expected a value".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add8_3w_style_entity() {
        let src = r#"
            entity add8_3w is
                generic (width : integer := 8);
                port (
                    a : in std_logic_vector(width - 1 downto 0);
                    b : in std_logic_vector(width - 1 downto 0);
                    c : in std_logic_vector(width - 1 downto 0);
                    y : out std_logic_vector(width - 1 downto 0)
                );
            end add8_3w;
        "#;
        let entity = parse_entity(src).unwrap();
        assert_eq!(entity.name, "add8_3w");
        assert_eq!(entity.generics, vec!["width"]);
        assert_eq!(entity.ports.len(), 4);
        assert_eq!(entity.ports[0].width_expr.as_deref(), Some("width - 1"));
        assert!(matches!(entity.ports[3].dir, PortDir::Out));
    }

    #[test]
    fn evaluates_generic_width_expression() {
        let mut generics = HashMap::new();
        generics.insert("width".to_string(), 8i64);
        assert_eq!(eval_expr("width - 1", &generics).unwrap(), 7);
        assert_eq!(eval_expr("(width + 2) * 2", &generics).unwrap(), 20);
    }

    #[test]
    fn rejects_unbound_generic() {
        let generics = HashMap::new();
        assert!(eval_expr("width - 1", &generics).is_err());
    }

    #[test]
    fn rejects_malformed_expression() {
        let mut generics = HashMap::new();
        generics.insert("width".to_string(), 8i64);
        assert!(eval_expr("width * ", &generics).is_err());
        assert!(eval_expr("width # 1", &generics).is_err());
    }
}
