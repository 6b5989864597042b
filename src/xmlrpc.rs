//! Minimal XML-RPC codec.
//!
//! Covers what the NEOS server speaks: scalar types, `base64`, arrays,
//! structs and faults. Method calls are written as strings; responses are
//! read with `quick-xml` into a flat token list and then parsed by descent.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{NeosError, NeosResult};
use crate::result::payload_text;

/// An XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    String(String),
    Double(f64),
    DateTime(String),
    Base64(Vec<u8>),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
    Nil,
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Double(_) => "double",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Base64(_) => "base64",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
            Value::Nil => "nil",
        }
    }

    fn mismatch<T>(&self, expected: &str) -> NeosResult<T> {
        Err(NeosError::malformed(format!(
            "expected {expected}, got {}",
            self.kind()
        )))
    }

    /// Take a `string` value.
    pub fn into_string(self) -> NeosResult<String> {
        match self {
            Value::String(s) => Ok(s),
            other => other.mismatch("string"),
        }
    }

    /// Take textual content sent either as `string` or as `base64`.
    pub fn into_text(self) -> NeosResult<String> {
        match self {
            Value::String(s) => Ok(s),
            Value::Base64(bytes) => Ok(payload_text(bytes)),
            other => other.mismatch("string or base64"),
        }
    }

    /// Take an integer value.
    pub fn into_int(self) -> NeosResult<i64> {
        match self {
            Value::Int(n) => Ok(n),
            other => other.mismatch("int"),
        }
    }

    /// Take an array value.
    pub fn into_array(self) -> NeosResult<Vec<Value>> {
        match self {
            Value::Array(items) => Ok(items),
            other => other.mismatch("array"),
        }
    }

    /// Take a struct value.
    pub fn into_struct(self) -> NeosResult<BTreeMap<String, Value>> {
        match self {
            Value::Struct(members) => Ok(members),
            other => other.mismatch("struct"),
        }
    }

    /// Take an array of exactly two values.
    pub fn into_pair(self) -> NeosResult<(Value, Value)> {
        let items = self.into_array()?;
        if items.len() != 2 {
            return Err(NeosError::malformed(format!(
                "expected a pair, got {} values",
                items.len()
            )));
        }
        let mut items = items.into_iter();
        match (items.next(), items.next()) {
            (Some(first), Some(second)) => Ok((first, second)),
            _ => Err(NeosError::malformed("expected a pair")),
        }
    }

    /// Take an array of strings.
    pub fn into_string_list(self) -> NeosResult<Vec<String>> {
        self.into_array()?
            .into_iter()
            .map(Value::into_string)
            .collect()
    }

    fn write(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Value::Int(n) if i32::try_from(*n).is_ok() => {
                out.push_str(&format!("<int>{n}</int>"));
            }
            Value::Int(n) => out.push_str(&format!("<i8>{n}</i8>")),
            Value::Bool(b) => out.push_str(&format!("<boolean>{}</boolean>", u8::from(*b))),
            Value::String(s) => {
                out.push_str("<string>");
                out.push_str(&escape(s.as_str()));
                out.push_str("</string>");
            }
            Value::Double(d) => out.push_str(&format!("<double>{d}</double>")),
            Value::DateTime(s) => {
                out.push_str("<dateTime.iso8601>");
                out.push_str(&escape(s.as_str()));
                out.push_str("</dateTime.iso8601>");
            }
            Value::Base64(bytes) => {
                out.push_str("<base64>");
                out.push_str(&BASE64.encode(bytes));
                out.push_str("</base64>");
            }
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write(out);
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    out.push_str("<member><name>");
                    out.push_str(&escape(name.as_str()));
                    out.push_str("</name>");
                    value.write(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
            Value::Nil => out.push_str("<nil/>"),
        }
        out.push_str("</value>");
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Serialize a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        param.write(&mut out);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>\n");
    out
}

/// Parse a `methodResponse` document.
///
/// A `<fault>` response becomes [`NeosError::Fault`]. A response without
/// parameters yields [`Value::Nil`].
pub fn decode_response(xml: &str) -> NeosResult<Value> {
    let mut parser = Parser::new(tokenize(xml)?);
    parser.open("methodResponse")?;
    let value = match parser.next_significant()? {
        Token::Open(tag) if tag == "params" => match parser.next_significant()? {
            Token::Open(tag) if tag == "param" => {
                let value = parser.value()?;
                parser.close("param")?;
                parser.close("params")?;
                value
            }
            Token::Close(tag) if tag == "params" => Value::Nil,
            other => return Err(unexpected(&other, "<param>")),
        },
        Token::Empty(tag) if tag == "params" => Value::Nil,
        Token::Open(tag) if tag == "fault" => {
            let mut fault = parser.value()?.into_struct()?;
            parser.close("fault")?;
            let code = match fault.remove("faultCode") {
                Some(Value::Int(code)) => code,
                _ => 0,
            };
            let message = match fault.remove("faultString") {
                Some(value) => value.into_string()?,
                None => String::new(),
            };
            return Err(NeosError::Fault { code, message });
        }
        other => return Err(unexpected(&other, "<params> or <fault>")),
    };
    parser.close("methodResponse")?;
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open(String),
    Close(String),
    Empty(String),
    Text(String),
}

impl Token {
    fn is_blank(&self) -> bool {
        matches!(self, Token::Text(t) if t.trim().is_empty())
    }
}

fn unexpected(token: &Token, expected: &str) -> NeosError {
    let found = match token {
        Token::Open(tag) => format!("<{tag}>"),
        Token::Close(tag) => format!("</{tag}>"),
        Token::Empty(tag) => format!("<{tag}/>"),
        Token::Text(text) => format!("text {text:?}"),
    };
    NeosError::malformed(format!("expected {expected}, found {found}"))
}

fn tag_name(raw: &[u8]) -> NeosResult<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| NeosError::malformed(format!("invalid tag name: {e}")))
}

fn tokenize(xml: &str) -> NeosResult<Vec<Token>> {
    let mut reader = Reader::from_str(xml);
    let mut tokens: Vec<Token> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => tokens.push(Token::Open(tag_name(e.name().as_ref())?)),
            Ok(Event::End(e)) => tokens.push(Token::Close(tag_name(e.name().as_ref())?)),
            Ok(Event::Empty(e)) => tokens.push(Token::Empty(tag_name(e.name().as_ref())?)),
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| NeosError::malformed(format!("bad text: {e}")))?;
                push_text(&mut tokens, text.into_owned());
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8(c.into_inner().into_owned())
                    .map_err(|e| NeosError::malformed(format!("bad CDATA: {e}")))?;
                push_text(&mut tokens, text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(NeosError::malformed(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }
    Ok(tokens)
}

/// Adjacent text and CDATA sections form one text node.
fn push_text(tokens: &mut Vec<Token>, text: String) {
    if let Some(Token::Text(prev)) = tokens.last_mut() {
        prev.push_str(&text);
    } else {
        tokens.push(Token::Text(text));
    }
}

struct Parser {
    tokens: std::vec::IntoIter<Token>,
    peeked: Option<Token>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
        }
    }

    fn next(&mut self) -> NeosResult<Token> {
        self.peeked
            .take()
            .or_else(|| self.tokens.next())
            .ok_or_else(|| NeosError::malformed("unexpected end of document"))
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = self.tokens.next();
        }
        self.peeked.as_ref()
    }

    /// Consume the next token if it is text.
    fn take_text(&mut self) -> NeosResult<Option<String>> {
        if !matches!(self.peek(), Some(Token::Text(_))) {
            return Ok(None);
        }
        match self.next()? {
            Token::Text(text) => Ok(Some(text)),
            other => Err(unexpected(&other, "text")),
        }
    }

    /// Next token that is not inter-element whitespace.
    fn next_significant(&mut self) -> NeosResult<Token> {
        loop {
            let token = self.next()?;
            if !token.is_blank() {
                return Ok(token);
            }
        }
    }

    fn open(&mut self, name: &str) -> NeosResult<()> {
        match self.next_significant()? {
            Token::Open(tag) if tag == name => Ok(()),
            other => Err(unexpected(&other, &format!("<{name}>"))),
        }
    }

    fn close(&mut self, name: &str) -> NeosResult<()> {
        match self.next_significant()? {
            Token::Close(tag) if tag == name => Ok(()),
            other => Err(unexpected(&other, &format!("</{name}>"))),
        }
    }

    /// Text content up to the closing tag `name`, which is consumed.
    fn text_until(&mut self, name: &str) -> NeosResult<String> {
        let text = self.take_text()?.unwrap_or_default();
        match self.next()? {
            Token::Close(tag) if tag == name => Ok(text),
            other => Err(unexpected(&other, &format!("</{name}>"))),
        }
    }

    /// Parse `<value>...</value>`, the opening tag not yet consumed.
    fn value(&mut self) -> NeosResult<Value> {
        match self.next_significant()? {
            Token::Open(tag) if tag == "value" => {}
            Token::Empty(tag) if tag == "value" => return Ok(Value::String(String::new())),
            other => return Err(unexpected(&other, "<value>")),
        }

        let leading = self.take_text()?;

        let value = match self.next()? {
            // Untyped content is a string.
            Token::Close(tag) if tag == "value" => {
                return Ok(Value::String(leading.unwrap_or_default()));
            }
            Token::Open(tag) => {
                if leading.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                    return Err(NeosError::malformed("mixed content inside <value>"));
                }
                self.typed(&tag)?
            }
            Token::Empty(tag) => empty_typed(&tag)?,
            other => return Err(unexpected(&other, "a value type")),
        };
        self.close("value")?;
        Ok(value)
    }

    fn typed(&mut self, tag: &str) -> NeosResult<Value> {
        match tag {
            "int" | "i4" | "i8" => {
                let text = self.text_until(tag)?;
                text.trim()
                    .parse()
                    .map(Value::Int)
                    .map_err(|e| NeosError::malformed(format!("bad {tag} {text:?}: {e}")))
            }
            "boolean" => match self.text_until(tag)?.trim() {
                "1" => Ok(Value::Bool(true)),
                "0" => Ok(Value::Bool(false)),
                other => Err(NeosError::malformed(format!("bad boolean {other:?}"))),
            },
            "double" => {
                let text = self.text_until(tag)?;
                text.trim()
                    .parse()
                    .map(Value::Double)
                    .map_err(|e| NeosError::malformed(format!("bad double {text:?}: {e}")))
            }
            "string" => self.text_until(tag).map(Value::String),
            "dateTime.iso8601" => self.text_until(tag).map(Value::DateTime),
            "base64" => {
                let text = self.text_until(tag)?;
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(compact.as_bytes())
                    .map(Value::Base64)
                    .map_err(|e| NeosError::malformed(format!("bad base64: {e}")))
            }
            "array" => self.array(),
            "struct" => self.structure(),
            other => Err(NeosError::malformed(format!("unknown value type <{other}>"))),
        }
    }

    fn array(&mut self) -> NeosResult<Value> {
        let mut items = Vec::new();
        match self.next_significant()? {
            Token::Empty(tag) if tag == "data" => {}
            Token::Open(tag) if tag == "data" => loop {
                while self.peek().is_some_and(Token::is_blank) {
                    self.next()?;
                }
                if matches!(self.peek(), Some(Token::Close(tag)) if tag == "data") {
                    self.next()?;
                    break;
                }
                items.push(self.value()?);
            },
            other => return Err(unexpected(&other, "<data>")),
        }
        self.close("array")?;
        Ok(Value::Array(items))
    }

    fn structure(&mut self) -> NeosResult<Value> {
        let mut members = BTreeMap::new();
        loop {
            match self.next_significant()? {
                Token::Close(tag) if tag == "struct" => break,
                Token::Open(tag) if tag == "member" => {
                    self.open("name")?;
                    let name = self.text_until("name")?;
                    let value = self.value()?;
                    self.close("member")?;
                    members.insert(name, value);
                }
                other => return Err(unexpected(&other, "<member> or </struct>")),
            }
        }
        Ok(Value::Struct(members))
    }
}

fn empty_typed(tag: &str) -> NeosResult<Value> {
    match tag {
        "string" => Ok(Value::String(String::new())),
        "base64" => Ok(Value::Base64(Vec::new())),
        "nil" => Ok(Value::Nil),
        "array" => Ok(Value::Array(Vec::new())),
        "struct" => Ok(Value::Struct(BTreeMap::new())),
        other => Err(NeosError::malformed(format!("empty <{other}/> has no value"))),
    }
}
