//! Incremental JSON tokenizer.
//!
//! The reader pulls bytes from a [`BufRead`] only as far as the token it
//! returns, so a caller can hand out each decoded entity before the next
//! one has arrived on a live connection.

use crate::error::{CodecError, CodecResult};
use serde_json::Number;
use std::io::{self, BufRead};

/// Maximum nesting of arrays and objects.
/// Recursion in the decoders follows the input nesting, so this bounds
/// stack use for untrusted input.
const MAX_DEPTH: usize = 512;

/// A single JSON token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `[`
    BeginArray,
    /// `]`
    EndArray,
    /// `{`
    BeginObject,
    /// `}`
    EndObject,
    /// A string, either an object key or a value.
    String(String),
    /// A number.
    Number(Number),
    /// `true` or `false`.
    Bool(bool),
    /// `null`
    Null,
}

impl Token {
    /// Short description for error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Token::BeginArray => "'['",
            Token::EndArray => "']'",
            Token::BeginObject => "'{'",
            Token::EndObject => "'}'",
            Token::String(_) => "string",
            Token::Number(_) => "number",
            Token::Bool(_) => "bool",
            Token::Null => "null",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Array,
    Object,
}

/// What the reader accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    TopValue,
    AfterTopValue,
    ArrayFirstValue,
    ArrayValue,
    ArrayComma,
    ObjectFirstKey,
    ObjectKey,
    ObjectColon,
    ObjectValue,
    ObjectComma,
}

/// Streaming JSON token reader.
pub struct TokenReader<R> {
    reader: R,
    offset: u64,
    stack: Vec<Scope>,
    expect: Expect,
}

impl<R: BufRead> TokenReader<R> {
    /// Creates a token reader positioned before the first value.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            stack: Vec::new(),
            expect: Expect::TopValue,
        }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Current container nesting depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Builds a parse error at the current offset.
    pub fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::parse(self.offset, message)
    }

    /// Reads the next token, failing at end of input.
    pub fn next_token(&mut self) -> CodecResult<Token> {
        loop {
            let Some(b) = self.peek_non_ws()? else {
                return Err(self.error("unexpected end of input"));
            };

            match self.expect {
                Expect::ArrayComma => match b {
                    b',' => {
                        self.bump();
                        self.expect = Expect::ArrayValue;
                    }
                    b']' => return Ok(self.close(Scope::Array)),
                    _ => {
                        return Err(
                            self.error(format!("expected ',' or ']', found {}", show(b)))
                        )
                    }
                },
                Expect::ObjectComma => match b {
                    b',' => {
                        self.bump();
                        self.expect = Expect::ObjectKey;
                    }
                    b'}' => return Ok(self.close(Scope::Object)),
                    _ => {
                        return Err(
                            self.error(format!("expected ',' or '}}', found {}", show(b)))
                        )
                    }
                },
                Expect::ObjectColon => {
                    if b != b':' {
                        return Err(self.error(format!("expected ':', found {}", show(b))));
                    }
                    self.bump();
                    self.expect = Expect::ObjectValue;
                }
                Expect::ArrayFirstValue if b == b']' => return Ok(self.close(Scope::Array)),
                Expect::ObjectFirstKey if b == b'}' => return Ok(self.close(Scope::Object)),
                Expect::ObjectFirstKey | Expect::ObjectKey => {
                    if b != b'"' {
                        return Err(
                            self.error(format!("expected object key, found {}", show(b)))
                        );
                    }
                    let key = self.read_string()?;
                    self.expect = Expect::ObjectColon;
                    return Ok(Token::String(key));
                }
                Expect::AfterTopValue => {
                    return Err(self.error(format!("unexpected trailing data {}", show(b))))
                }
                Expect::TopValue
                | Expect::ArrayFirstValue
                | Expect::ArrayValue
                | Expect::ObjectValue => return self.read_value_token(b),
            }
        }
    }

    /// Reads the next token, returning `None` if the input ends first.
    ///
    /// Ending here is only clean at a token boundary; input that stops
    /// inside a token is still an error.
    pub fn next_token_or_eof(&mut self) -> CodecResult<Option<Token>> {
        if self.peek_non_ws()?.is_none() {
            return Ok(None);
        }
        self.next_token().map(Some)
    }

    /// Reads and discards one complete value.
    pub fn skip_value(&mut self) -> CodecResult<()> {
        let depth = self.stack.len();
        match self.next_token()? {
            Token::BeginArray | Token::BeginObject => {
                while self.stack.len() > depth {
                    self.next_token()?;
                }
                Ok(())
            }
            Token::EndArray | Token::EndObject => {
                Err(self.error("expected a value, found end of container"))
            }
            _ => Ok(()),
        }
    }

    fn read_value_token(&mut self, b: u8) -> CodecResult<Token> {
        match b {
            b'[' => {
                self.open(Scope::Array)?;
                Ok(Token::BeginArray)
            }
            b'{' => {
                self.open(Scope::Object)?;
                Ok(Token::BeginObject)
            }
            b'"' => {
                let s = self.read_string()?;
                self.value_done();
                Ok(Token::String(s))
            }
            b't' => self.read_literal(b"true", Token::Bool(true)),
            b'f' => self.read_literal(b"false", Token::Bool(false)),
            b'n' => self.read_literal(b"null", Token::Null),
            b'-' | b'0'..=b'9' => {
                let n = self.read_number()?;
                self.value_done();
                Ok(Token::Number(n))
            }
            _ => Err(self.error(format!("unexpected {}", show(b)))),
        }
    }

    fn open(&mut self, scope: Scope) -> CodecResult<()> {
        if self.stack.len() >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.bump();
        self.stack.push(scope);
        self.expect = match scope {
            Scope::Array => Expect::ArrayFirstValue,
            Scope::Object => Expect::ObjectFirstKey,
        };
        Ok(())
    }

    fn close(&mut self, scope: Scope) -> Token {
        self.bump();
        let popped = self.stack.pop();
        debug_assert_eq!(popped, Some(scope));
        self.value_done();
        match scope {
            Scope::Array => Token::EndArray,
            Scope::Object => Token::EndObject,
        }
    }

    fn value_done(&mut self) {
        self.expect = match self.stack.last() {
            Some(Scope::Array) => Expect::ArrayComma,
            Some(Scope::Object) => Expect::ObjectComma,
            None => Expect::AfterTopValue,
        };
    }

    fn peek(&mut self) -> CodecResult<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(CodecError::parse(self.offset, format!("read failed: {e}")))
                }
            }
        }
    }

    fn peek_non_ws(&mut self) -> CodecResult<Option<u8>> {
        while let Some(b) = self.peek()? {
            if !matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                return Ok(Some(b));
            }
            self.bump();
        }
        Ok(None)
    }

    #[inline]
    fn bump(&mut self) {
        self.advance(1);
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        self.reader.consume(n);
        self.offset += n as u64;
    }

    fn next_byte(&mut self) -> CodecResult<u8> {
        let b = self
            .peek()?
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.bump();
        Ok(b)
    }

    fn read_literal(&mut self, word: &'static [u8], token: Token) -> CodecResult<Token> {
        let start = self.offset;
        for &expected in word {
            if self.next_byte()? != expected {
                return Err(CodecError::parse(start, "invalid literal"));
            }
        }
        self.value_done();
        Ok(token)
    }

    fn read_number(&mut self) -> CodecResult<Number> {
        let start = self.offset;
        let mut text = String::new();
        while let Some(b) = self.peek()? {
            if !(b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')) {
                break;
            }
            text.push(char::from(b));
            self.bump();
        }
        serde_json::from_str::<Number>(&text)
            .map_err(|_| CodecError::parse(start, format!("invalid number '{text}'")))
    }

    fn read_string(&mut self) -> CodecResult<String> {
        let start = self.offset;
        self.bump();
        let mut out = Vec::new();
        loop {
            if self.peek()?.is_none() {
                return Err(self.error("unterminated string"));
            }
            // The buffer is non-empty after a successful peek, so this does no I/O.
            let offset = self.offset;
            let (taken, stop) = {
                let buf = self
                    .reader
                    .fill_buf()
                    .map_err(|e| CodecError::parse(offset, format!("read failed: {e}")))?;
                match buf.iter().position(|&b| b == b'"' || b == b'\\' || b < 0x20) {
                    Some(i) => {
                        out.extend_from_slice(&buf[..i]);
                        (i, Some(buf[i]))
                    }
                    None => {
                        out.extend_from_slice(buf);
                        (buf.len(), None)
                    }
                }
            };
            self.advance(taken);

            match stop {
                None => {}
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    self.read_escape(&mut out)?;
                }
                Some(b) => {
                    return Err(self.error(format!("control character {} in string", show(b))))
                }
            }
        }
        String::from_utf8(out).map_err(|_| CodecError::parse(start, "invalid UTF-8 in string"))
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> CodecResult<()> {
        let c = match self.next_byte()? {
            b'"' => b'"',
            b'\\' => b'\\',
            b'/' => b'/',
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'u' => {
                let ch = self.read_unicode_escape()?;
                let mut tmp = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
                return Ok(());
            }
            other => return Err(self.error(format!("invalid escape {}", show(other)))),
        };
        out.push(c);
        Ok(())
    }

    fn read_unicode_escape(&mut self) -> CodecResult<char> {
        let first = self.read_hex4()?;
        let code = match first {
            0xD800..=0xDBFF => {
                if self.next_byte()? != b'\\' || self.next_byte()? != b'u' {
                    return Err(self.error("unpaired surrogate in string"));
                }
                let second = self.read_hex4()?;
                if !(0xDC00..=0xDFFF).contains(&second) {
                    return Err(self.error("invalid low surrogate in string"));
                }
                0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(self.error("unpaired surrogate in string")),
            _ => first,
        };
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode escape"))
    }

    fn read_hex4(&mut self) -> CodecResult<u32> {
        let mut value = 0u32;
        for _ in 0..4 {
            let b = self.next_byte()?;
            let digit = char::from(b)
                .to_digit(16)
                .ok_or_else(|| self.error(format!("invalid hex digit {}", show(b))))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }
}

fn show(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("'{}'", char::from(b))
    } else {
        format!("byte 0x{b:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> CodecResult<Vec<Token>> {
        let mut reader = TokenReader::new(input.as_bytes());
        let mut out = Vec::new();
        while let Some(t) = reader.next_token_or_eof()? {
            out.push(t);
        }
        Ok(out)
    }

    fn s(v: &str) -> Token {
        Token::String(v.to_string())
    }

    #[test]
    fn tokenizes_nested_document() {
        let toks = tokens(r#" [ {"a" : 1, "b": [true, null]}, "x" ] "#).unwrap();
        assert_eq!(
            toks,
            vec![
                Token::BeginArray,
                Token::BeginObject,
                s("a"),
                Token::Number(1.into()),
                s("b"),
                Token::BeginArray,
                Token::Bool(true),
                Token::Null,
                Token::EndArray,
                Token::EndObject,
                s("x"),
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn empty_containers() {
        assert_eq!(
            tokens("[{},[]]").unwrap(),
            vec![
                Token::BeginArray,
                Token::BeginObject,
                Token::EndObject,
                Token::BeginArray,
                Token::EndArray,
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let toks = tokens(r#"["a\"b\\c\/d\n\t", "é😀", "plain ü"]"#).unwrap();
        assert_eq!(toks[1], s("a\"b\\c/d\n\t"));
        assert_eq!(toks[2], s("é😀"));
        assert_eq!(toks[3], s("plain ü"));
    }

    #[test]
    fn numbers_keep_representation() {
        let toks = tokens("[0, -12, 3.25, 1e3]").unwrap();
        assert_eq!(toks[1], Token::Number(0.into()));
        assert_eq!(toks[2], Token::Number((-12).into()));
        match &toks[3] {
            Token::Number(n) => assert_eq!(n.as_f64(), Some(3.25)),
            other => panic!("unexpected {other:?}"),
        }
        match &toks[4] {
            Token::Number(n) => assert_eq!(n.as_f64(), Some(1000.0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_separators() {
        assert!(tokens("[1 2]").unwrap_err().is_parse());
        assert!(tokens(r#"{"a" 1}"#).unwrap_err().is_parse());
        assert!(tokens(r#"{"a":1 "b":2}"#).unwrap_err().is_parse());
        assert!(tokens("[1,]").unwrap_err().is_parse());
    }

    #[test]
    fn rejects_non_string_keys() {
        assert!(tokens("{1: 2}").unwrap_err().is_parse());
    }

    #[test]
    fn rejects_bad_literals_and_numbers() {
        assert!(tokens("[tru]").unwrap_err().is_parse());
        assert!(tokens("[-]").unwrap_err().is_parse());
        assert!(tokens("[@]").unwrap_err().is_parse());
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = tokens(r#"["abc"#).unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn rejects_lone_surrogate() {
        assert!(tokens(r#"["\udc00"]"#).unwrap_err().is_parse());
        assert!(tokens(r#"["\ud83dx"]"#).unwrap_err().is_parse());
    }

    #[test]
    fn rejects_trailing_data() {
        assert!(tokens("[] []").unwrap_err().is_parse());
    }

    #[test]
    fn eof_mid_document_is_clean_only_between_tokens() {
        // Ends after a complete element: the reader reports clean EOF.
        let toks = tokens("[1, 2").unwrap();
        assert_eq!(toks.len(), 3);

        // next_token (not _or_eof) treats it as an error.
        let mut reader = TokenReader::new("[".as_bytes());
        reader.next_token().unwrap();
        assert!(reader.next_token().unwrap_err().is_parse());
    }

    #[test]
    fn skip_value_consumes_whole_container() {
        let mut reader = TokenReader::new(r#"[{"a":[1,{"b":2}]}, 7]"#.as_bytes());
        assert_eq!(reader.next_token().unwrap(), Token::BeginArray);
        reader.skip_value().unwrap();
        assert_eq!(reader.next_token().unwrap(), Token::Number(7.into()));
        assert_eq!(reader.next_token().unwrap(), Token::EndArray);
        assert_eq!(reader.depth(), 0);
    }

    #[test]
    fn depth_is_bounded() {
        let deep = "[".repeat(MAX_DEPTH + 1);
        let err = tokens(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting too deep"));
    }

    #[test]
    fn offset_tracks_consumed_bytes() {
        let mut reader = TokenReader::new(r#"  ["ab"]"#.as_bytes());
        reader.next_token().unwrap();
        assert_eq!(reader.offset(), 3);
        reader.next_token().unwrap();
        assert_eq!(reader.offset(), 7);
    }

    #[test]
    fn stops_at_token_boundary() {
        // The reader must not pull bytes past the closing bracket.
        let data = b"[1] trailing";
        let mut cursor = io::Cursor::new(&data[..]);
        {
            let mut reader = TokenReader::new(&mut cursor);
            while reader.depth() > 0 || reader.offset() == 0 {
                reader.next_token().unwrap();
            }
        }
        assert_eq!(cursor.position(), 3);
    }
}
