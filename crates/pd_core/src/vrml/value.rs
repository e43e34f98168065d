//! Typed field values.

use pd_math::{almost_equal, AlmostEq, DVec2, DVec3, Rotation};
use serde_json::{json, Value};

use crate::error::{ProtoError, ProtoResult};
use crate::node::Node;
use crate::vrml::tokenizer::{Token, TokenKind, Tokenizer};
use crate::vrml::FieldType;

/// A value of one of the [`FieldType`] kinds.
///
/// `Clone` is a deep copy: nested nodes are cloned with fresh ids.
#[derive(Debug, Clone)]
pub enum FieldValue {
    SFBool(bool),
    SFInt32(i32),
    SFFloat(f64),
    SFString(String),
    SFVec2f(DVec2),
    SFVec3f(DVec3),
    SFRotation(Rotation),
    SFColor(DVec3),
    /// `None` is `NULL`.
    SFNode(Option<Box<Node>>),
    MFBool(Vec<bool>),
    MFInt32(Vec<i32>),
    MFFloat(Vec<f64>),
    MFString(Vec<String>),
    MFVec2f(Vec<DVec2>),
    MFVec3f(Vec<DVec3>),
    MFRotation(Vec<Rotation>),
    MFColor(Vec<DVec3>),
    MFNode(Vec<Node>),
}

/// Callback used to parse a nested node; supplied by the node factory.
pub type NodeReader<'a> = dyn FnMut(&mut Tokenizer) -> ProtoResult<Node> + 'a;

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::SFBool(_) => FieldType::SFBool,
            FieldValue::SFInt32(_) => FieldType::SFInt32,
            FieldValue::SFFloat(_) => FieldType::SFFloat,
            FieldValue::SFString(_) => FieldType::SFString,
            FieldValue::SFVec2f(_) => FieldType::SFVec2f,
            FieldValue::SFVec3f(_) => FieldType::SFVec3f,
            FieldValue::SFRotation(_) => FieldType::SFRotation,
            FieldValue::SFColor(_) => FieldType::SFColor,
            FieldValue::SFNode(_) => FieldType::SFNode,
            FieldValue::MFBool(_) => FieldType::MFBool,
            FieldValue::MFInt32(_) => FieldType::MFInt32,
            FieldValue::MFFloat(_) => FieldType::MFFloat,
            FieldValue::MFString(_) => FieldType::MFString,
            FieldValue::MFVec2f(_) => FieldType::MFVec2f,
            FieldValue::MFVec3f(_) => FieldType::MFVec3f,
            FieldValue::MFRotation(_) => FieldType::MFRotation,
            FieldValue::MFColor(_) => FieldType::MFColor,
            FieldValue::MFNode(_) => FieldType::MFNode,
        }
    }

    /// Parse one value of `field_type` from the stream.
    ///
    /// MF values accept either a bracketed list or a single bare element.
    /// Node-valued fields call `read_node` for every node that is not `NULL`.
    pub fn parse(
        field_type: FieldType,
        tokens: &mut Tokenizer,
        read_node: &mut NodeReader<'_>,
    ) -> ProtoResult<FieldValue> {
        let value = match field_type {
            FieldType::SFBool => FieldValue::SFBool(read_bool(tokens)?),
            FieldType::SFInt32 => FieldValue::SFInt32(read_int(tokens)?),
            FieldType::SFFloat => FieldValue::SFFloat(read_float(tokens)?),
            FieldType::SFString => FieldValue::SFString(read_string(tokens)?),
            FieldType::SFVec2f => FieldValue::SFVec2f(read_vec2(tokens)?),
            FieldType::SFVec3f => FieldValue::SFVec3f(read_vec3(tokens)?),
            FieldType::SFRotation => FieldValue::SFRotation(read_rotation(tokens)?),
            FieldType::SFColor => FieldValue::SFColor(read_vec3(tokens)?),
            FieldType::SFNode => {
                if tokens.peek_token().is_word("NULL") {
                    tokens.next_token();
                    FieldValue::SFNode(None)
                } else {
                    FieldValue::SFNode(Some(Box::new(read_node(tokens)?)))
                }
            }
            FieldType::MFBool => FieldValue::MFBool(read_multiple(tokens, read_bool)?),
            FieldType::MFInt32 => FieldValue::MFInt32(read_multiple(tokens, read_int)?),
            FieldType::MFFloat => FieldValue::MFFloat(read_multiple(tokens, read_float)?),
            FieldType::MFString => FieldValue::MFString(read_multiple(tokens, read_string)?),
            FieldType::MFVec2f => FieldValue::MFVec2f(read_multiple(tokens, read_vec2)?),
            FieldType::MFVec3f => FieldValue::MFVec3f(read_multiple(tokens, read_vec3)?),
            FieldType::MFRotation => FieldValue::MFRotation(read_multiple(tokens, read_rotation)?),
            FieldType::MFColor => FieldValue::MFColor(read_multiple(tokens, read_vec3)?),
            FieldType::MFNode => FieldValue::MFNode(read_multiple(tokens, |t| read_node(t))?),
        };
        Ok(value)
    }

    /// Parse a standalone literal such as `0 1 0 1.57` or `[ "a" "b" ]`.
    ///
    /// Only `NULL` and `[]` are accepted for node-valued types; use
    /// [`crate::Resolver::create_node_from_text`] to build nodes from text.
    pub fn parse_literal(field_type: FieldType, text: &str) -> ProtoResult<FieldValue> {
        let mut tokens = Tokenizer::tokenize(text)?;
        let value = FieldValue::parse(field_type, &mut tokens, &mut |t: &mut Tokenizer| {
            Err(ProtoError::Unsupported(format!(
                "Node literal at line {} in a plain {} value",
                t.peek_token().line,
                field_type
            )))
        })?;
        if tokens.has_more_tokens() {
            let token = tokens.peek_token();
            return Err(token.error(format!(
                "Unexpected {} after {} value",
                token.describe(),
                field_type
            )));
        }
        Ok(value)
    }

    /// Parse the attribute form produced by [`FieldValue::to_attribute`].
    pub fn from_attribute(field_type: FieldType, text: &str) -> ProtoResult<FieldValue> {
        match field_type {
            FieldType::SFString => Ok(FieldValue::SFString(text.to_string())),
            FieldType::SFNode | FieldType::MFNode => Err(ProtoError::Schema(format!(
                "{} values have no attribute form",
                field_type
            ))),
            _ if field_type.is_multiple() => {
                FieldValue::parse_literal(field_type, &format!("[ {} ]", text))
            }
            _ => FieldValue::parse_literal(field_type, text),
        }
    }

    /// Scene document attribute text, or `None` for node-valued fields.
    pub fn to_attribute(&self) -> Option<String> {
        let text = match self {
            FieldValue::SFBool(v) => bool_attribute(*v),
            FieldValue::SFInt32(v) => v.to_string(),
            FieldValue::SFFloat(v) => v.to_string(),
            FieldValue::SFString(v) => v.clone(),
            FieldValue::SFVec2f(v) => vec2_attribute(v),
            FieldValue::SFVec3f(v) | FieldValue::SFColor(v) => vec3_attribute(v),
            FieldValue::SFRotation(v) => rotation_attribute(v),
            FieldValue::MFBool(v) => join(v.iter().map(|b| bool_attribute(*b))),
            FieldValue::MFInt32(v) => join(v.iter().map(|i| i.to_string())),
            FieldValue::MFFloat(v) => join(v.iter().map(|f| f.to_string())),
            FieldValue::MFString(v) => join(v.iter().map(|s| quote(s))),
            FieldValue::MFVec2f(v) => join(v.iter().map(vec2_attribute)),
            FieldValue::MFVec3f(v) | FieldValue::MFColor(v) => join(v.iter().map(vec3_attribute)),
            FieldValue::MFRotation(v) => join(v.iter().map(rotation_attribute)),
            FieldValue::SFNode(_) | FieldValue::MFNode(_) => return None,
        };
        Some(text)
    }

    /// Payload form used in renderer updates and template contexts.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::SFBool(v) => json!(v),
            FieldValue::SFInt32(v) => json!(v),
            FieldValue::SFFloat(v) => json!(v),
            FieldValue::SFString(v) => json!(v),
            FieldValue::SFVec2f(v) => vec2_json(v),
            FieldValue::SFVec3f(v) => vec3_json(v),
            FieldValue::SFRotation(v) => rotation_json(v),
            FieldValue::SFColor(v) => color_json(v),
            FieldValue::SFNode(v) => v.as_ref().map_or(Value::Null, |node| node.to_json()),
            FieldValue::MFBool(v) => json!(v),
            FieldValue::MFInt32(v) => json!(v),
            FieldValue::MFFloat(v) => json!(v),
            FieldValue::MFString(v) => json!(v),
            FieldValue::MFVec2f(v) => Value::Array(v.iter().map(vec2_json).collect()),
            FieldValue::MFVec3f(v) => Value::Array(v.iter().map(vec3_json).collect()),
            FieldValue::MFRotation(v) => Value::Array(v.iter().map(rotation_json).collect()),
            FieldValue::MFColor(v) => Value::Array(v.iter().map(color_json).collect()),
            FieldValue::MFNode(v) => Value::Array(v.iter().map(Node::to_json).collect()),
        }
    }

    /// Nodes held by this value, in order.
    pub fn nodes(&self) -> Vec<&Node> {
        match self {
            FieldValue::SFNode(Some(node)) => vec![node.as_ref()],
            FieldValue::MFNode(nodes) => nodes.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> Vec<&mut Node> {
        match self {
            FieldValue::SFNode(Some(node)) => vec![node.as_mut()],
            FieldValue::MFNode(nodes) => nodes.iter_mut().collect(),
            _ => Vec::new(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        use FieldValue::*;

        match (self, other) {
            (SFBool(a), SFBool(b)) => a == b,
            (SFInt32(a), SFInt32(b)) => a == b,
            (SFFloat(a), SFFloat(b)) => almost_equal(*a, *b),
            (SFString(a), SFString(b)) => a == b,
            (SFVec2f(a), SFVec2f(b)) => a.almost_eq(b),
            (SFVec3f(a), SFVec3f(b)) | (SFColor(a), SFColor(b)) => a.almost_eq(b),
            (SFRotation(a), SFRotation(b)) => a.almost_eq(b),
            (SFNode(a), SFNode(b)) => match (a, b) {
                (Some(a), Some(b)) => a.same_structure(b),
                (None, None) => true,
                _ => false,
            },
            (MFBool(a), MFBool(b)) => a == b,
            (MFInt32(a), MFInt32(b)) => a == b,
            (MFFloat(a), MFFloat(b)) => all_eq(a, b, |x, y| almost_equal(*x, *y)),
            (MFString(a), MFString(b)) => a == b,
            (MFVec2f(a), MFVec2f(b)) => all_eq(a, b, |x, y| x.almost_eq(y)),
            (MFVec3f(a), MFVec3f(b)) | (MFColor(a), MFColor(b)) => all_eq(a, b, |x, y| x.almost_eq(y)),
            (MFRotation(a), MFRotation(b)) => all_eq(a, b, |x, y| x.almost_eq(y)),
            (MFNode(a), MFNode(b)) => all_eq(a, b, |x, y| x.same_structure(y)),
            _ => false,
        }
    }
}

fn all_eq<T>(a: &[T], b: &[T], eq: impl Fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(x, y))
}

// ============================================================================
// Token readers
// ============================================================================

fn expect_value(tokens: &mut Tokenizer, what: &str) -> ProtoResult<Token> {
    let token = tokens.next_token();
    if token.is_end() || token.kind == TokenKind::Punctuation {
        return Err(token.error(format!("Expected {}, found {}", what, token.describe())));
    }
    Ok(token)
}

fn read_bool(tokens: &mut Tokenizer) -> ProtoResult<bool> {
    let token = expect_value(tokens, "a boolean")?;
    match (token.kind, token.word.as_str()) {
        (TokenKind::Keyword, "TRUE") | (TokenKind::Identifier, "true") => Ok(true),
        (TokenKind::Keyword, "FALSE") | (TokenKind::Identifier, "false") => Ok(false),
        _ => Err(token.error(format!("Expected a boolean, found {}", token.describe()))),
    }
}

fn read_int(tokens: &mut Tokenizer) -> ProtoResult<i32> {
    let token = expect_value(tokens, "an integer")?;
    let word = token.word.as_str();
    let (negative, unsigned) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word.trim_start_matches('+')),
    };
    let parsed = match unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16)
            .ok()
            .map(|v| if negative { -v } else { v }),
        None => word.parse::<i64>().ok(),
    };
    parsed
        .filter(|_| token.kind == TokenKind::Number)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| token.error(format!("Expected an integer, found {}", token.describe())))
}

fn read_float(tokens: &mut Tokenizer) -> ProtoResult<f64> {
    let token = expect_value(tokens, "a number")?;
    if token.kind != TokenKind::Number {
        return Err(token.error(format!("Expected a number, found {}", token.describe())));
    }
    match token.word.parse::<f64>() {
        Ok(v) => Ok(v),
        // hexadecimal integers are valid floats too
        Err(_) => {
            tokens.seek(tokens.position() - 1);
            read_int(tokens).map(f64::from)
        }
    }
}

fn read_string(tokens: &mut Tokenizer) -> ProtoResult<String> {
    let token = expect_value(tokens, "a string")?;
    if token.kind != TokenKind::String {
        return Err(token.error(format!("Expected a string, found {}", token.describe())));
    }
    Ok(token.word)
}

fn read_vec2(tokens: &mut Tokenizer) -> ProtoResult<DVec2> {
    Ok(DVec2::new(read_float(tokens)?, read_float(tokens)?))
}

fn read_vec3(tokens: &mut Tokenizer) -> ProtoResult<DVec3> {
    Ok(DVec3::new(
        read_float(tokens)?,
        read_float(tokens)?,
        read_float(tokens)?,
    ))
}

fn read_rotation(tokens: &mut Tokenizer) -> ProtoResult<Rotation> {
    Ok(Rotation::new(
        read_float(tokens)?,
        read_float(tokens)?,
        read_float(tokens)?,
        read_float(tokens)?,
    ))
}

fn read_multiple<T>(
    tokens: &mut Tokenizer,
    mut read: impl FnMut(&mut Tokenizer) -> ProtoResult<T>,
) -> ProtoResult<Vec<T>> {
    if !tokens.peek_token().is_punctuation("[") {
        return Ok(vec![read(tokens)?]);
    }

    tokens.skip_token("[")?;
    let mut items = Vec::new();
    while !tokens.peek_token().is_punctuation("]") {
        if tokens.peek_token().is_end() {
            return Err(tokens.peek_token().error("Expected ']' before end of input"));
        }
        items.push(read(tokens)?);
    }
    tokens.skip_token("]")?;
    Ok(items)
}

// ============================================================================
// Attribute and payload formatting
// ============================================================================

fn bool_attribute(v: bool) -> String {
    let text = if v { "true" } else { "false" };
    text.to_string()
}

fn vec2_attribute(v: &DVec2) -> String {
    format!("{} {}", v.x, v.y)
}

fn vec3_attribute(v: &DVec3) -> String {
    format!("{} {} {}", v.x, v.y, v.z)
}

fn rotation_attribute(r: &Rotation) -> String {
    let [x, y, z, a] = r.to_array();
    format!("{} {} {} {}", x, y, z, a)
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(" ")
}

fn vec2_json(v: &DVec2) -> Value {
    json!({ "x": v.x, "y": v.y })
}

fn vec3_json(v: &DVec3) -> Value {
    json!({ "x": v.x, "y": v.y, "z": v.z })
}

fn rotation_json(r: &Rotation) -> Value {
    json!({ "x": r.axis.x, "y": r.axis.y, "z": r.axis.z, "a": r.angle })
}

fn color_json(v: &DVec3) -> Value {
    json!({ "r": v.x, "g": v.y, "b": v.z })
}
