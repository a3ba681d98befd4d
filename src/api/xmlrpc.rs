//! XML-RPC wire format.
//!
//! Bugzilla speaks plain XML-RPC: a `methodCall` document goes out and a
//! `methodResponse` document (either `params` or a `fault`) comes back.
//! This module owns the value model and both directions of the encoding.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use roxmltree::{Document, Node};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// An XML-RPC `<struct>`.
pub type Struct = BTreeMap<String, Value>;

/// A single XML-RPC value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `<int>`, `<i4>` or `<i8>`.
    Int(i64),
    /// `<boolean>`.
    Bool(bool),
    /// `<string>` or an untyped `<value>`.
    String(String),
    /// `<double>`.
    Double(f64),
    /// `<dateTime.iso8601>`, kept verbatim.
    DateTime(String),
    /// `<base64>`, decoded.
    Base64(Vec<u8>),
    /// `<struct>`.
    Struct(Struct),
    /// `<array>`.
    Array(Vec<Value>),
    /// `<nil/>` extension.
    Nil,
}

impl Value {
    /// Get the integer value, if this is an `Int`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the string value, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Look up a struct member. Returns `None` for non-struct values.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|members| members.get(key))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Struct> for Value {
    fn from(v: Struct) -> Self {
        Value::Struct(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(members) => Value::Struct(
                members
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::String(s) | Value::DateTime(s) => serializer.serialize_str(s),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::Base64(bytes) => serializer.serialize_str(&BASE64.encode(bytes)),
            Value::Struct(members) => members.serialize(serializer),
            Value::Array(items) => items.serialize(serializer),
            Value::Nil => serializer.serialize_unit(),
        }
    }
}

/// Errors raised while decoding a `methodResponse` document.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The body is not well-formed XML.
    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The XML is well-formed but not a valid XML-RPC response.
    #[error("{0}")]
    Malformed(String),
}

/// A decoded `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// The call succeeded with this return value.
    Success(Value),
    /// The server raised a fault.
    Fault { code: i64, message: String },
}

/// Encode a `methodCall` document.
pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Encode a successful `methodResponse` document.
pub fn encode_response(value: &Value) -> String {
    let mut out =
        String::from("<?xml version=\"1.0\"?>\n<methodResponse><params><param>");
    write_value(&mut out, value);
    out.push_str("</param></params></methodResponse>");
    out
}

/// Encode a fault `methodResponse` document.
pub fn encode_fault(code: i64, message: &str) -> String {
    let mut fault = Struct::new();
    fault.insert("faultCode".to_string(), Value::Int(code));
    fault.insert("faultString".to_string(), Value::from(message));

    let mut out = String::from("<?xml version=\"1.0\"?>\n<methodResponse><fault>");
    write_value(&mut out, &Value::Struct(fault));
    out.push_str("</fault></methodResponse>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => out.push_str(&format!("<int>{}</int>", i)),
        Value::Bool(b) => out.push_str(if *b {
            "<boolean>1</boolean>"
        } else {
            "<boolean>0</boolean>"
        }),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s));
            out.push_str("</string>");
        }
        Value::Double(d) => out.push_str(&format!("<double>{}</double>", d)),
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&BASE64.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Decode a `methodResponse` document.
///
/// # Errors
///
/// Returns an error if the body is not XML or not shaped like an XML-RPC
/// response. A fault is not an error at this level.
pub fn decode_response(body: &str) -> Result<MethodResponse, CodecError> {
    let doc = Document::parse(body)?;
    let root = doc.root_element();
    if !root.has_tag_name("methodResponse") {
        return Err(malformed(format!(
            "expected <methodResponse>, found <{}>",
            root.tag_name().name()
        )));
    }

    let content = elements(root)
        .next()
        .ok_or_else(|| malformed("empty <methodResponse>"))?;

    match content.tag_name().name() {
        "params" => match elements(content).find(|n| n.has_tag_name("param")) {
            Some(param) => Ok(MethodResponse::Success(parse_value(child(param, "value")?)?)),
            None => Ok(MethodResponse::Success(Value::Nil)),
        },
        "fault" => {
            let fault = parse_value(child(content, "value")?)?;
            let code = fault
                .get("faultCode")
                .and_then(Value::as_i64)
                .ok_or_else(|| malformed("fault without an integer faultCode"))?;
            let message = fault
                .get("faultString")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(MethodResponse::Fault { code, message })
        }
        other => Err(malformed(format!("unexpected <{}> in response", other))),
    }
}

fn parse_value(node: Node<'_, '_>) -> Result<Value, CodecError> {
    // An untyped <value> is a string.
    let Some(typed) = elements(node).next() else {
        return Ok(Value::String(node.text().unwrap_or_default().to_string()));
    };
    let text = typed.text().unwrap_or_default();

    match typed.tag_name().name() {
        "int" | "i4" | "i8" => text
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|_| malformed(format!("invalid integer '{}'", text))),
        "boolean" => match text.trim() {
            "1" => Ok(Value::Bool(true)),
            "0" => Ok(Value::Bool(false)),
            other => Err(malformed(format!("invalid boolean '{}'", other))),
        },
        "string" => Ok(Value::String(text.to_string())),
        "double" => text
            .trim()
            .parse()
            .map(Value::Double)
            .map_err(|_| malformed(format!("invalid double '{}'", text))),
        "dateTime.iso8601" => Ok(Value::DateTime(text.trim().to_string())),
        "base64" => {
            let compact: String = text.split_whitespace().collect();
            BASE64
                .decode(compact)
                .map(Value::Base64)
                .map_err(|e| malformed(format!("invalid base64: {}", e)))
        }
        "nil" => Ok(Value::Nil),
        "array" => {
            let data = child(typed, "data")?;
            elements(data)
                .filter(|n| n.has_tag_name("value"))
                .map(parse_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = Struct::new();
            for member in elements(typed).filter(|n| n.has_tag_name("member")) {
                let name = child(member, "name")?.text().unwrap_or_default();
                let value = parse_value(child(member, "value")?)?;
                members.insert(name.to_string(), value);
            }
            Ok(Value::Struct(members))
        }
        other => Err(malformed(format!("unknown value type <{}>", other))),
    }
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, CodecError> {
    elements(node).find(|n| n.has_tag_name(name)).ok_or_else(|| {
        malformed(format!(
            "<{}> is missing a <{}> element",
            node.tag_name().name(),
            name
        ))
    })
}

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::Malformed(msg.into())
}
