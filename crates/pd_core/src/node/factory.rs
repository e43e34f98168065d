//! Turns token streams into configured node instances.

use std::collections::HashMap;

use crate::error::{ProtoError, ProtoResult};
use crate::node::{unknown_field, Node, Parameter};
use crate::resolver::Resolver;
use crate::vrml::{is_base_node, FieldType, FieldValue, TokenKind, Tokenizer};

/// EXTERNPROTO declarations visible to a document: PROTO name to URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternProtos(HashMap<String, String>);

impl ExternProtos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, url: impl Into<String>) {
        self.0.insert(name.into(), url.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared URLs, sorted and without duplicates.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.0.values().cloned().collect();
        urls.sort();
        urls.dedup();
        urls
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, url)| (name.as_str(), url.as_str()))
    }
}

const UNSUPPORTED_FORMS: [&str; 3] = ["IS", "DEF", "USE"];

fn reject_unsupported(tokens: &Tokenizer) -> ProtoResult<()> {
    let token = tokens.peek_token();
    if token.kind == TokenKind::Keyword && UNSUPPORTED_FORMS.contains(&token.word.as_str()) {
        return Err(ProtoError::Unsupported(format!(
            "'{}' at line {}, column {}",
            token.word, token.line, token.column
        )));
    }
    Ok(())
}

/// Read one node (`Type { fields }`) from the stream.
///
/// Built-in types are cloned from the resolver's canonical model. PROTO
/// types must be declared in `context` and already resolved; nothing is
/// fetched here. PROTO instances get their body expanded.
pub fn create_node(
    tokens: &mut Tokenizer,
    context: &ExternProtos,
    resolver: &Resolver,
) -> ProtoResult<Node> {
    reject_unsupported(tokens)?;

    let token = tokens.next_token();
    if token.kind != TokenKind::Identifier {
        return Err(token.error(format!("Expected a node type, found {}", token.describe())));
    }
    let name = token.word.as_str();

    let mut node = if is_base_node(name) {
        Node::Base(resolver.base_model(name)?)
    } else {
        let url = context.get(name).ok_or_else(|| {
            ProtoError::Resolution(format!(
                "'{}' is neither a built-in node nor a declared EXTERNPROTO",
                name
            ))
        })?;
        let model = resolver.proto_model(url).ok_or_else(|| {
            ProtoError::Resolution(format!("PROTO '{}' ({}) has not been resolved", name, url))
        })?;
        Node::Proto(model.as_ref().clone())
    };

    node.configure_from_tokens(tokens, context, resolver)?;
    if let Node::Proto(proto) = &mut node {
        proto.parse_body(resolver)?;
    }
    Ok(node)
}

/// Parse a value, building nested nodes through [`create_node`].
pub fn parse_field_value(
    field_type: FieldType,
    tokens: &mut Tokenizer,
    context: &ExternProtos,
    resolver: &Resolver,
) -> ProtoResult<FieldValue> {
    FieldValue::parse(field_type, tokens, &mut |t: &mut Tokenizer| {
        create_node(t, context, resolver)
    })
}

/// Apply a `{ name value ... }` block to `parameters`.
pub(crate) fn configure_parameters(
    node_name: &str,
    parameters: &mut [Parameter],
    tokens: &mut Tokenizer,
    context: &ExternProtos,
    resolver: &Resolver,
) -> ProtoResult<()> {
    tokens.skip_token("{")?;

    while !tokens.peek_token().is_punctuation("}") {
        let token = tokens.next_token();
        if token.kind != TokenKind::Identifier {
            return Err(token.error(format!(
                "Expected a field name or '}}' in {}, found {}",
                node_name,
                token.describe()
            )));
        }

        let parameter = parameters
            .iter_mut()
            .find(|p| p.name() == token.word)
            .ok_or_else(|| unknown_field(node_name, &token.word))?;

        reject_unsupported(tokens)?;
        let value = parse_field_value(parameter.field_type(), tokens, context, resolver)?;
        log::debug!("Configured {}.{}", node_name, token.word);
        parameter.set_value(value)?;
    }

    tokens.skip_token("}")
}
