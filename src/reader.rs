// ABOUTME: Textual reader: converts source text into data-mode S-expressions

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, multispace1},
    combinator::value,
    multi::many0,
    IResult, Parser as NomParser,
};

use crate::config::ReaderConfig;
use crate::error::ReadError;
use crate::object::Object;
use crate::symbol::{core_package, keyword_package};

/// Characters that terminate a token. `#` is reserved for unreadable
/// printed forms and always errors at the start of a datum.
fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"' | '\'' | ';' | '`' | ',' | '#')
}

/// Skips whitespace and `;` end-of-line comments.
fn skip_ws(input: &str) -> &str {
    let result: IResult<&str, ()> = many0(alt((
        value((), multispace1),
        value((), (char(';'), take_while(|c| c != '\n'))),
    )))
    .map(|_| ())
    .parse(input);
    match result {
        Ok((rest, ())) => rest,
        Err(_) => input,
    }
}

fn take_token(input: &str) -> Option<(&str, &str)> {
    let result: IResult<&str, &str> = take_while1(is_symbol_char).parse(input);
    match result {
        Ok((rest, token)) => Some((token, rest)),
        Err(_) => None,
    }
}

fn is_integer_token(token: &str) -> bool {
    let digits = token
        .strip_prefix(['+', '-'])
        .unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// The textual reader. Produces data-mode objects; symbols are interned in
/// the thread's core package (`:name` tokens in the keyword package).
pub struct Reader {
    cfg: ReaderConfig,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

impl Reader {
    pub fn new(cfg: ReaderConfig) -> Self {
        Reader { cfg }
    }

    /// Reads every datum in `input`.
    pub fn read_all(&self, input: &str) -> Result<Vec<Object>, ReadError> {
        let mut datums = Vec::new();
        let mut rest = skip_ws(input);
        while !rest.is_empty() {
            let (datum, next) = self.datum(rest, 0)?;
            datums.push(datum);
            rest = skip_ws(next);
        }
        Ok(datums)
    }

    /// Reads exactly one datum; trailing input is an error.
    pub fn read_one(&self, input: &str) -> Result<Object, ReadError> {
        let rest = skip_ws(input);
        let (datum, rest) = self.datum(rest, 0)?;
        let rest = skip_ws(rest);
        if rest.is_empty() {
            Ok(datum)
        } else {
            Err(ReadError::TrailingInput(rest.to_string()))
        }
    }

    fn datum<'i>(&self, input: &'i str, depth: usize) -> Result<(Object, &'i str), ReadError> {
        if depth > self.cfg.max_depth {
            return Err(ReadError::DepthLimit(self.cfg.max_depth));
        }
        let input = skip_ws(input);
        let mut chars = input.chars();
        let first = chars.next().ok_or(ReadError::UnexpectedEof)?;
        match first {
            '(' => self.list(chars.as_str(), depth + 1),
            ')' => Err(ReadError::UnexpectedChar(')')),
            '"' => self.string(chars.as_str()),
            '#' => Err(ReadError::Reserved),
            '\'' => self.quoted("quote", chars.as_str(), depth),
            '`' => self.quoted("quasiquote", chars.as_str(), depth),
            ',' => {
                let rest = chars.as_str();
                match rest.strip_prefix('@') {
                    Some(rest) => self.quoted("unquote-splicing", rest, depth),
                    None => self.quoted("unquote", rest, depth),
                }
            }
            _ => {
                let (token, rest) =
                    take_token(input).ok_or(ReadError::UnexpectedChar(first))?;
                if token == "." {
                    return Err(ReadError::StrayDot);
                }
                Ok((self.classify(token)?, rest))
            }
        }
    }

    /// Expands a reader macro: `'x` reads as `(quote x)` and so on.
    fn quoted<'i>(
        &self,
        name: &str,
        input: &'i str,
        depth: usize,
    ) -> Result<(Object, &'i str), ReadError> {
        let (datum, rest) = self.datum(input, depth + 1)?;
        let sym = core_package()
            .make_symbol(name)
            .ok_or(ReadError::UnexpectedEof)?;
        Ok((Object::from_vec(vec![Object::Sym(sym), datum]), rest))
    }

    /// Parses list elements after the opening paren, including an optional
    /// `. tail`.
    fn list<'i>(&self, input: &'i str, depth: usize) -> Result<(Object, &'i str), ReadError> {
        let mut items = Vec::new();
        let mut rest = input;
        loop {
            rest = skip_ws(rest);
            let mut chars = rest.chars();
            match chars.next() {
                None => return Err(ReadError::UnexpectedEof),
                Some(')') => return Ok((Object::from_vec(items), chars.as_str())),
                Some('.') if Self::dot_is_standalone(chars.as_str()) => {
                    if items.is_empty() {
                        return Err(ReadError::StrayDot);
                    }
                    let (tail, after) = self.datum(chars.as_str(), depth)?;
                    let after = skip_ws(after);
                    match after.strip_prefix(')') {
                        Some(after) => {
                            return Ok((Object::from_vec_dotted(items, tail), after))
                        }
                        None => return Err(ReadError::StrayDot),
                    }
                }
                Some(_) => {
                    if items.len() >= self.cfg.max_list_len {
                        return Err(ReadError::LengthLimit(self.cfg.max_list_len));
                    }
                    let (item, after) = self.datum(rest, depth)?;
                    items.push(item);
                    rest = after;
                }
            }
        }
    }

    fn dot_is_standalone(after_dot: &str) -> bool {
        match after_dot.chars().next() {
            None => true,
            Some(c) => !is_symbol_char(c),
        }
    }

    /// Parses string contents after the opening quote.
    fn string<'i>(&self, input: &'i str) -> Result<(Object, &'i str), ReadError> {
        let mut out = String::new();
        let mut chars = input.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => return Ok((Object::string(out), &input[i + 1..])),
                '\\' => {
                    let (_, esc) = chars.next().ok_or(ReadError::UnterminatedString)?;
                    match esc {
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        'x' => out.push(Self::hex_escape(&mut chars, 2)?),
                        'u' => out.push(Self::hex_escape(&mut chars, 4)?),
                        'U' => out.push(Self::hex_escape(&mut chars, 6)?),
                        other => return Err(ReadError::BadEscape(format!("\\{}", other))),
                    }
                }
                c => out.push(c),
            }
        }
        Err(ReadError::UnterminatedString)
    }

    fn hex_escape(
        chars: &mut std::str::CharIndices<'_>,
        len: usize,
    ) -> Result<char, ReadError> {
        let mut digits = String::with_capacity(len);
        for _ in 0..len {
            let (_, c) = chars.next().ok_or(ReadError::UnterminatedString)?;
            digits.push(c);
        }
        let code = u32::from_str_radix(&digits, 16)
            .map_err(|_| ReadError::BadEscape(digits.clone()))?;
        char::from_u32(code).ok_or(ReadError::BadEscape(digits))
    }

    fn classify(&self, token: &str) -> Result<Object, ReadError> {
        if is_integer_token(token) {
            return token
                .parse::<i64>()
                .map(Object::Int)
                .map_err(|_| ReadError::IntOutOfRange(token.to_string()));
        }
        if let Some(name) = token.strip_prefix(':') {
            return Ok(match keyword_package().make_symbol(name) {
                Some(sym) => Object::Sym(sym),
                None => Object::Nil,
            });
        }
        Ok(match core_package().make_symbol(token) {
            Some(sym) => Object::Sym(sym),
            None => Object::Nil,
        })
    }
}
