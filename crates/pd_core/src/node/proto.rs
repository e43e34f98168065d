//! PROTO definitions and instances.
//!
//! A PROTO source file is split into three regions that are kept verbatim:
//!
//! ```text
//! #VRML_SIM R2022b utf8            <- pre-header: tags and EXTERNPROTO lines
//! EXTERNPROTO "Inner.proto"
//! PROTO Outer [                    <- header: declared fields
//!   field SFFloat offset 0.5
//! ]
//! {                                <- body: one node, possibly templated
//!   Inner { }
//! }
//! ```
//!
//! The header is parsed once per definition. The body is expanded per
//! instance, and again whenever a field that the template reads changes.

use std::collections::HashMap;
use std::rc::Rc;

use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use url::Url;

use crate::bridge::UpdateContext;
use crate::config::ResolverConfig;
use crate::document;
use crate::error::{ProtoError, ProtoResult};
use crate::node::factory::{self, ExternProtos};
use crate::node::{create_node, unknown_field, Node, NodeId, Parameter};
use crate::resolver::Resolver;
use crate::template::TemplateEngine;
use crate::vrml::tokenizer::is_field_kind;
use crate::vrml::{FieldType, FieldValue, TokenKind, Tokenizer};

/// A PROTO definition (as cached by the resolver) or an instance of one.
#[derive(Debug)]
pub struct ProtoNode {
    id: NodeId,
    url: String,
    name: String,
    proto_name: String,
    raw_pre_header: String,
    raw_header: String,
    raw_body: String,
    body: String,
    extern_protos: ExternProtos,
    dependencies: HashMap<String, Rc<ProtoNode>>,
    parameters: Vec<Parameter>,
    template: Option<Rc<TemplateEngine>>,
    value: Option<Box<Node>>,
}

impl ProtoNode {
    /// Split `text` into its regions and collect its EXTERNPROTO declarations.
    ///
    /// Quoted relative asset paths are made absolute against `url` first.
    /// Declared fields are only known after [`ProtoNode::fetch`].
    pub fn new(text: &str, url: &str, config: &ResolverConfig) -> ProtoResult<Self> {
        let name = proto_name_from_url(url);
        log::debug!("Creating PROTO {} from {}", name, url);

        let template = if text.contains(&config.template_marker) {
            log::debug!("PROTO {} is a template", name);
            Some(Rc::new(TemplateEngine::new()))
        } else {
            None
        };

        let text = rewrite_asset_paths(text, url, config);

        let head_start = find_header_start(&text).ok_or_else(|| {
            let (line, column) = text_position(&text, text.len());
            ProtoError::Syntax {
                line,
                column,
                message: format!("Missing 'PROTO <name> [' declaration in {}", url),
            }
        })?;
        let (head_end, body_start) = find_body_start(&text, head_start).ok_or_else(|| {
            let (line, column) = text_position(&text, head_start);
            ProtoError::Syntax {
                line,
                column,
                message: format!("Missing body after the header of {}", url),
            }
        })?;

        let raw_pre_header = text[..head_start].to_string();
        let raw_header = text[head_start..=head_end].to_string();
        let raw_body = text[body_start..].to_string();

        let proto_name = raw_header
            .split_whitespace()
            .nth(1)
            .map(|word| word.trim_end_matches('[').to_string())
            .unwrap_or_else(|| name.clone());

        let extern_protos = parse_extern_protos(&raw_pre_header, url, config)?;
        let body = if template.is_none() {
            raw_body.clone()
        } else {
            String::new()
        };

        Ok(Self {
            id: NodeId::next(),
            url: url.to_string(),
            name,
            proto_name,
            raw_pre_header,
            raw_header,
            raw_body,
            body,
            extern_protos,
            dependencies: HashMap::new(),
            parameters: Vec::new(),
            template,
            value: None,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// File stem of the URL.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name declared in the header.
    pub fn proto_name(&self) -> &str {
        &self.proto_name
    }

    pub fn raw_pre_header(&self) -> &str {
        &self.raw_pre_header
    }

    pub fn raw_header(&self) -> &str {
        &self.raw_header
    }

    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// The body as last expanded: the raw body, or the template output.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn is_template(&self) -> bool {
        self.template.is_some()
    }

    pub fn extern_protos(&self) -> &ExternProtos {
        &self.extern_protos
    }

    /// Resolved EXTERNPROTO prototype for `url`.
    pub fn dependency(&self, url: &str) -> Option<&Rc<ProtoNode>> {
        self.dependencies.get(url)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &Rc<ProtoNode>> {
        self.dependencies.values()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.iter_mut().find(|p| p.name() == name)
    }

    /// Root of the expanded body, once [`ProtoNode::parse_body`] has run.
    pub fn value(&self) -> Option<&Node> {
        self.value.as_deref()
    }

    pub(crate) fn value_mut(&mut self) -> Option<&mut Node> {
        self.value.as_deref_mut()
    }

    // ========================================================================
    // Header
    // ========================================================================

    /// Resolve every EXTERNPROTO, then parse the header.
    pub async fn fetch(&mut self, resolver: &Resolver) -> ProtoResult<()> {
        let chain = vec![self.url.clone()];
        self.fetch_with_chain(resolver, &chain).await
    }

    /// `chain` holds the URLs currently being resolved above this one.
    pub(crate) async fn fetch_with_chain(
        &mut self,
        resolver: &Resolver,
        chain: &[String],
    ) -> ProtoResult<()> {
        let pending = self
            .extern_protos
            .urls()
            .into_iter()
            .map(|url| resolver.resolve(url, None, chain.to_vec()));
        let resolved = try_join_all(pending).await?;
        log::debug!(
            "{}: all {} EXTERNPROTO dependencies resolved",
            self.name,
            resolved.len()
        );

        for dependency in resolved {
            self.dependencies
                .insert(dependency.url().to_string(), dependency);
        }

        self.parse_head(resolver)
    }

    /// Build the declared parameters from the header.
    ///
    /// Field restrictions are discarded. Node defaults are built with the
    /// node factory, so every EXTERNPROTO they use must be resolved.
    pub fn parse_head(&mut self, resolver: &Resolver) -> ProtoResult<()> {
        log::debug!("Parsing header of {}", self.name);
        let mut tokens = Tokenizer::tokenize(&self.raw_header)?;

        tokens.skip_token("PROTO")?;
        let name = tokens.next_token();
        if name.kind != TokenKind::Identifier {
            return Err(name.error(format!("Expected a PROTO name, found {}", name.describe())));
        }
        tokens.skip_token("[")?;

        let mut parameters = Vec::new();
        while !tokens.peek_token().is_punctuation("]") {
            let kind = tokens.next_token();
            if !(kind.kind == TokenKind::Keyword && is_field_kind(&kind.word)) {
                return Err(kind.error(format!(
                    "Expected a field declaration, found {}",
                    kind.describe()
                )));
            }

            let type_token = tokens.next_token();
            let field_type = FieldType::from_keyword(&type_token.word)
                .filter(|_| type_token.kind == TokenKind::Keyword)
                .ok_or_else(|| {
                    type_token.error(format!("Expected a field type, found {}", type_token.describe()))
                })?;

            if tokens.peek_token().is_punctuation("{") {
                log::warn!(
                    "{}: field restrictions at line {} are not supported and were discarded",
                    self.name,
                    tokens.peek_token().line
                );
                tokens.consume_tokens_by_type(FieldType::SFNode)?;
            }

            let field_name = tokens.next_token();
            if field_name.kind != TokenKind::Identifier {
                return Err(field_name.error(format!(
                    "Expected a field name, found {}",
                    field_name.describe()
                )));
            }

            if field_type.is_multiple() {
                return Err(ProtoError::Unsupported(format!(
                    "{} default value of field '{}' in PROTO {}",
                    field_type, field_name.word, name.word
                )));
            }

            let default_value =
                factory::parse_field_value(field_type, &mut tokens, &self.extern_protos, resolver)?;
            let regenerator = self.is_template_regenerator(&field_name.word);
            log::debug!(
                "{}: field {} {}{}",
                self.name,
                field_type,
                field_name.word,
                if regenerator { " (template regenerator)" } else { "" }
            );

            parameters.push(Parameter::declared(
                self.id,
                field_name.word,
                default_value,
                regenerator,
            ));
        }
        tokens.skip_token("]")?;

        self.proto_name = name.word;
        self.parameters = parameters;
        Ok(())
    }

    fn is_template_regenerator(&self, field: &str) -> bool {
        self.template.is_some() && self.raw_body.contains(&format!("fields.{}.", field))
    }

    // ========================================================================
    // Body
    // ========================================================================

    /// Field values in the shape the template engine expects.
    pub fn encode_fields(&self) -> Value {
        let fields: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let encoded = json!({
                    "value": p.value().map_or(Value::Null, |v| v.to_json()),
                    "defaultValue": p.default_value().map_or(Value::Null, |v| v.to_json()),
                });
                (p.name().to_string(), encoded)
            })
            .collect();

        json!({
            "fields": fields,
            "context": { "proto": self.proto_name, "url": self.url },
        })
    }

    /// Expand the body into `value`, regenerating it first if templated.
    ///
    /// On failure the previous body and value are left untouched.
    pub fn parse_body(&mut self, resolver: &Resolver) -> ProtoResult<()> {
        let (body, value) = self.expand_body(resolver)?;
        self.body = body;
        self.value = Some(Box::new(value));
        Ok(())
    }

    fn expand_body(&self, resolver: &Resolver) -> ProtoResult<(String, Node)> {
        let body = match &self.template {
            Some(engine) => engine.generate(&self.encode_fields(), &self.raw_body)?,
            None => self.raw_body.clone(),
        };

        let mut tokens = Tokenizer::tokenize(&body)?;
        tokens.skip_token("{")?;
        let value = create_node(&mut tokens, &self.extern_protos, resolver)?;
        tokens.skip_token("}")?;
        Ok((body, value))
    }

    pub(crate) fn apply_parameter_value(
        &mut self,
        name: &str,
        value: FieldValue,
        ctx: &mut UpdateContext<'_>,
    ) -> ProtoResult<()> {
        let proto_name = self.proto_name.clone();
        let parameter = self
            .parameter_mut(name)
            .ok_or_else(|| unknown_field(&proto_name, name))?;

        // only the in-memory structure changes; the renderer sees the body
        if !parameter.is_template_regenerator() {
            return parameter.set_value(value);
        }

        log::debug!("{}.{} is a template regenerator", proto_name, name);
        let previous = parameter.replace_value(Some(value))?;

        let regenerated = self.expand_body(ctx.resolver).and_then(|(body, node)| {
            let fragment = document::to_fragment(&node)?;
            Ok((body, node, fragment))
        });
        let (body, node, fragment) = match regenerated {
            Ok(result) => result,
            Err(err) => {
                if let Some(parameter) = self.parameter_mut(name) {
                    parameter.replace_value(previous)?;
                }
                return Err(err);
            }
        };

        if let Some(old) = self.value.as_deref() {
            old.release(ctx.bridge);
        }
        self.body = body;
        self.value = Some(Box::new(node));
        ctx.bridge.load(&fragment, None);
        Ok(())
    }
}

impl Clone for ProtoNode {
    fn clone(&self) -> Self {
        let id = NodeId::next();
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| {
                let mut copy = parameter.clone();
                copy.set_owner(id);
                copy
            })
            .collect();

        Self {
            id,
            url: self.url.clone(),
            name: self.name.clone(),
            proto_name: self.proto_name.clone(),
            raw_pre_header: self.raw_pre_header.clone(),
            raw_header: self.raw_header.clone(),
            raw_body: self.raw_body.clone(),
            body: self.body.clone(),
            extern_protos: self.extern_protos.clone(),
            dependencies: self.dependencies.clone(),
            parameters,
            template: self.template.clone(),
            value: self.value.clone(),
        }
    }
}

// ============================================================================
// Source splitting and URLs
// ============================================================================

/// File stem of a PROTO URL: `.../Foo.proto` is `Foo`.
pub fn proto_name_from_url(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.strip_suffix(".proto").unwrap_or(file).to_string()
}

/// Resolve `address` as written in a document located at `parent`.
///
/// `.` and `..` segments are collapsed, so one file always resolves to one
/// cache key.
pub fn resolve_url(address: &str, parent: &str, config: &ResolverConfig) -> String {
    if let Some(path) = address.strip_prefix("webots://") {
        return format!("{}{}", config.mirror_base, path);
    }

    if is_remote(address) {
        return Url::parse(address).map_or_else(|_| address.to_string(), |url| url.to_string());
    }

    let (scheme, path) = split_file_scheme(address);
    if !scheme.is_empty() || path.starts_with('/') {
        return format!("{}{}", scheme, normalize_path(path));
    }

    if is_remote(parent) {
        if let Ok(joined) = Url::parse(parent).and_then(|base| base.join(address)) {
            return joined.to_string();
        }
    }

    let (scheme, parent_path) = split_file_scheme(parent);
    let directory = &parent_path[..parent_path.rfind('/').map_or(0, |i| i + 1)];
    format!("{}{}", scheme, normalize_path(&format!("{}{}", directory, address)))
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn split_file_scheme(url: &str) -> (&str, &str) {
    match url.strip_prefix("file://") {
        Some(path) => ("file://", path),
        None => ("", url),
    }
}

/// Collapse empty, `.` and `..` segments of a slash-separated path.
///
/// Leading `..` segments of a relative path are kept.
fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last().copied() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ if !absolute => segments.push(".."),
                _ => {}
            },
            segment => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn rewrite_asset_paths(text: &str, url: &str, config: &ResolverConfig) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('"') else {
            break;
        };
        let candidate = &after[..close];

        out.push_str(&rest[..=open]);
        if config.is_asset(candidate) {
            out.push_str(&resolve_url(candidate, url, config));
            out.push('"');
            rest = &after[close + 1..];
        } else {
            // the closing quote may open the next candidate
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

fn find_header_start(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("PROTO ") || trimmed.starts_with("PROTO\t") {
            return Some(offset + line.len() - trimmed.len());
        }
        offset += line.len();
    }
    None
}

/// Offsets of the header's closing `]` and of the body's opening `{`.
fn find_body_start(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(relative) = text[search..].find(']') {
        let bracket = search + relative;
        let after = &text[bracket + 1..];
        let trimmed = after.trim_start();
        if trimmed.starts_with('{') {
            return Some((bracket, bracket + 1 + after.len() - trimmed.len()));
        }
        search = bracket + 1;
    }
    None
}

fn parse_extern_protos(
    pre_header: &str,
    url: &str,
    config: &ResolverConfig,
) -> ProtoResult<ExternProtos> {
    let mut extern_protos = ExternProtos::new();

    for (index, line) in pre_header.lines().enumerate() {
        let trimmed = line.trim_start();
        let Some(declaration) = trimmed.strip_prefix("EXTERNPROTO") else {
            continue;
        };

        let address = declaration
            .trim()
            .strip_prefix('"')
            .and_then(|rest| rest.split_once('"'))
            .map(|(address, _)| address)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| ProtoError::Syntax {
                line: index + 1,
                column: line.len() - trimmed.len() + 1,
                message: "Expected EXTERNPROTO \"<url>\"".to_string(),
            })?;

        let resolved = resolve_url(address, url, config);
        let name = proto_name_from_url(&resolved);
        log::debug!("EXTERNPROTO {} -> {}", name, resolved);
        extern_protos.insert(name, resolved);
    }

    Ok(extern_protos)
}

fn text_position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.len() - before.rfind('\n').map_or(0, |i| i + 1) + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeCommand, RecordingBridge};
    use crate::fetch::MemoryFetcher;

    const MIRROR: &str = "https://raw.githubusercontent.com/cyberbotics/webots/R2022b/";

    fn config() -> ResolverConfig {
        ResolverConfig::default()
    }

    fn resolver() -> Resolver {
        Resolver::new(Rc::new(MemoryFetcher::new()))
    }

    #[test]
    fn test_split_regions() {
        let text = "#VRML_SIM R2022b utf8\n\
                    PROTO Foo [\n  field SFString name \"bar\"\n]\n{\n  Shape { }\n}\n";
        let proto = ProtoNode::new(text, "file:///protos/Foo.proto", &config()).unwrap();

        assert_eq!(proto.name(), "Foo");
        assert_eq!(proto.proto_name(), "Foo");
        assert_eq!(proto.raw_pre_header(), "#VRML_SIM R2022b utf8\n");
        assert_eq!(proto.raw_header(), "PROTO Foo [\n  field SFString name \"bar\"\n]");
        assert_eq!(proto.raw_body(), "{\n  Shape { }\n}\n");
        assert_eq!(proto.body(), proto.raw_body());
        assert!(!proto.is_template());
        assert!(proto.parameters().is_empty());
    }

    #[test]
    fn test_header_at_offset_zero() {
        let proto = ProtoNode::new("PROTO Foo [ ] { Shape { } }", "Foo.proto", &config()).unwrap();
        assert_eq!(proto.raw_pre_header(), "");
        assert_eq!(proto.raw_header(), "PROTO Foo [ ]");
        assert_eq!(proto.raw_body(), "{ Shape { } }");
    }

    #[test]
    fn test_missing_header_or_body() {
        let err = ProtoNode::new("Shape { }", "Foo.proto", &config()).unwrap_err();
        assert!(matches!(err, ProtoError::Syntax { .. }));

        let err = ProtoNode::new("#tag\nPROTO Foo [ ]\n", "Foo.proto", &config()).unwrap_err();
        assert!(matches!(err, ProtoError::Syntax { line: 2, column: 1, .. }));
    }

    #[test]
    fn test_extern_protos() {
        let text = "#VRML_SIM R2022b utf8\n\
                    # EXTERNPROTO \"Commented.proto\"\n\
                    EXTERNPROTO \"webots://projects/objects/Chair.proto\"\n\
                    EXTERNPROTO \"../shared/Wheel.proto\"\n\
                    PROTO Robot [ ] { Group { } }";
        let proto = ProtoNode::new(text, "https://example.com/robots/protos/Robot.proto", &config())
            .unwrap();

        let extern_protos = proto.extern_protos();
        assert_eq!(extern_protos.len(), 2);
        assert_eq!(
            extern_protos.get("Chair"),
            Some(format!("{}projects/objects/Chair.proto", MIRROR).as_str())
        );
        assert_eq!(
            extern_protos.get("Wheel"),
            Some("https://example.com/robots/shared/Wheel.proto")
        );
    }

    #[test]
    fn test_malformed_externproto() {
        let err = ProtoNode::new("EXTERNPROTO Wheel.proto\nPROTO A [ ] { Box { } }", "A.proto", &config())
            .unwrap_err();
        assert!(matches!(err, ProtoError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_resolve_url() {
        let config = config();
        assert_eq!(
            resolve_url("Wheel.proto", "/home/user/protos/Robot.proto", &config),
            "/home/user/protos/Wheel.proto"
        );
        assert_eq!(
            resolve_url("./Wheel.proto", "file:///protos/Robot.proto", &config),
            "file:///protos/Wheel.proto"
        );
        assert_eq!(resolve_url("Wheel.proto", "Robot.proto", &config), "Wheel.proto");
        assert_eq!(
            resolve_url("https://a.org/B.proto", "/x/Robot.proto", &config),
            "https://a.org/B.proto"
        );
        assert_eq!(
            resolve_url("webots://a/B.proto", "/x/Robot.proto", &config),
            format!("{}a/B.proto", MIRROR)
        );
    }

    #[test]
    fn test_resolve_url_collapses_dot_segments() {
        let config = config();
        assert_eq!(
            resolve_url("../Wheel.proto", "/robots/left/Left.proto", &config),
            "/robots/Wheel.proto"
        );
        assert_eq!(
            resolve_url("./parts/../Wheel.proto", "robots/Right.proto", &config),
            "robots/Wheel.proto"
        );
        assert_eq!(
            resolve_url("../../Wheel.proto", "file:///robots/left/Left.proto", &config),
            "file:///Wheel.proto"
        );
        assert_eq!(resolve_url("../Wheel.proto", "Left.proto", &config), "../Wheel.proto");
        assert_eq!(resolve_url("/a/./b/../C.proto", "x/Y.proto", &config), "/a/C.proto");
        assert_eq!(
            resolve_url("../shared/Wheel.proto", "https://example.com/robots/protos/Robot.proto", &config),
            "https://example.com/robots/shared/Wheel.proto"
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a//b/./c/../d"), "/a/b/d");
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../../a"), "../../a");
        assert_eq!(normalize_path("a/../../b"), "../b");
    }

    #[test]
    fn test_asset_paths_rewritten() {
        let text = "PROTO Tex [ field SFString label \"a.txt\" ] {\n\
                    ImageTexture { url [ \"textures/wood.jpg\" \"https://cdn.org/x.png\" ] }\n}";
        let proto = ProtoNode::new(text, "https://example.com/protos/Tex.proto", &config()).unwrap();
        assert!(proto
            .raw_body()
            .contains("\"https://example.com/protos/textures/wood.jpg\""));
        assert!(proto.raw_body().contains("\"https://cdn.org/x.png\""));
        assert!(proto.raw_header().contains("\"a.txt\""));
    }

    #[test]
    fn test_parse_head() {
        let resolver = resolver();
        let text = "PROTO Foo [\n\
                      field SFString name \"bar\"\n\
                      vrmlField SFFloat{0.1, 0.5} offset 0.5\n\
                      hiddenField SFNode appearance PBRAppearance { roughness 1 }\n\
                    ] { Shape { } }";
        let mut proto = ProtoNode::new(text, "Foo.proto", &config()).unwrap();
        proto.parse_head(&resolver).unwrap();

        let names: Vec<_> = proto.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["name", "offset", "appearance"]);

        let offset = proto.parameter("offset").unwrap();
        assert_eq!(offset.default_value(), Some(&FieldValue::SFFloat(0.5)));
        assert_eq!(offset.value(), Some(&FieldValue::SFFloat(0.5)));
        assert_eq!(offset.owner(), proto.id());

        let appearance = proto.parameter("appearance").unwrap();
        assert!(appearance.is_default().unwrap());
        assert_eq!(appearance.value().unwrap().nodes()[0].type_name(), "PBRAppearance");
    }

    #[test]
    fn test_mf_default_is_unsupported() {
        let resolver = resolver();
        let mut proto = ProtoNode::new(
            "PROTO Foo [ field MFFloat heights [ 1 2 ] ] { Group { } }",
            "Foo.proto",
            &config(),
        )
        .unwrap();
        let err = proto.parse_head(&resolver).unwrap_err();
        assert!(matches!(err, ProtoError::Unsupported(_)));
        assert!(proto.parameters().is_empty());
    }

    #[test]
    fn test_bad_header_keyword() {
        let resolver = resolver();
        let mut proto =
            ProtoNode::new("PROTO Foo [ field SFTime t 0 ] { Group { } }", "Foo.proto", &config()).unwrap();
        let err = proto.parse_head(&resolver).unwrap_err();
        assert!(matches!(err, ProtoError::Syntax { line: 1, column: 19, .. }));
    }

    #[test]
    fn test_template_regenerators() {
        let resolver = resolver();
        let text = "# template language: handlebars\n\
                    PROTO Crate [\n  field SFVec3f size 1 1 1\n  field SFString name \"crate\"\n]\n\
                    { Box { size {{fields.size.value.x}} {{fields.size.value.y}} {{fields.size.value.z}} } }";
        let mut proto = ProtoNode::new(text, "Crate.proto", &config()).unwrap();
        assert!(proto.is_template());
        proto.parse_head(&resolver).unwrap();

        assert!(proto.parameter("size").unwrap().is_template_regenerator());
        assert!(!proto.parameter("name").unwrap().is_template_regenerator());

        proto.parse_body(&resolver).unwrap();
        assert_eq!(proto.body(), "{ Box { size 1.0 1.0 1.0 } }");
        assert_eq!(proto.raw_body(), "{ Box { size {{fields.size.value.x}} {{fields.size.value.y}} {{fields.size.value.z}} } }");
    }

    #[test]
    fn test_encode_fields() {
        let resolver = resolver();
        let mut proto =
            ProtoNode::new("PROTO Foo [ field SFBool on TRUE ] { Group { } }", "dir/Foo.proto", &config())
                .unwrap();
        proto.parse_head(&resolver).unwrap();
        assert_eq!(
            proto.encode_fields(),
            json!({
                "fields": { "on": { "value": true, "defaultValue": true } },
                "context": { "proto": "Foo", "url": "dir/Foo.proto" },
            })
        );
    }

    #[test]
    fn test_failed_body_leaves_value_untouched() {
        let resolver = resolver();
        let mut proto =
            ProtoNode::new("PROTO Foo [ ] { USE Thing }", "Foo.proto", &config()).unwrap();
        proto.parse_head(&resolver).unwrap();
        let err = proto.parse_body(&resolver).unwrap_err();
        assert!(matches!(err, ProtoError::Unsupported(_)));
        assert!(proto.value().is_none());
    }

    #[test]
    fn test_non_regenerator_change_stays_in_memory() {
        let resolver = resolver();
        let mut proto =
            ProtoNode::new("PROTO Foo [ field SFFloat k 1 ] { Group { } }", "Foo.proto", &config())
                .unwrap();
        proto.parse_head(&resolver).unwrap();
        proto.parse_body(&resolver).unwrap();
        let mut node = Node::Proto(proto);

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        node.set_parameter_value("k", FieldValue::SFFloat(2.0), &mut ctx)
            .unwrap();

        assert_eq!(node.parameter("k").unwrap().value(), Some(&FieldValue::SFFloat(2.0)));
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_failed_regeneration_restores_value() {
        let resolver = resolver();
        let text = "# template language: handlebars\n\
                    PROTO Foo [ field SFBool broken FALSE ] \
                    { {{#if fields.broken.value}} Nope { } {{else}} Group { } {{/if}} }";
        let mut proto = ProtoNode::new(text, "Foo.proto", &config()).unwrap();
        proto.parse_head(&resolver).unwrap();
        proto.parse_body(&resolver).unwrap();
        let mut node = Node::Proto(proto);
        let before = node.base_node().unwrap().id();

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        let err = node
            .set_parameter_value("broken", FieldValue::SFBool(true), &mut ctx)
            .unwrap_err();

        assert!(matches!(err, ProtoError::Resolution(_)));
        assert_eq!(node.parameter("broken").unwrap().value(), Some(&FieldValue::SFBool(false)));
        assert_eq!(node.base_node().unwrap().id(), before);
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_regenerator_change_reloads_body() {
        let resolver = resolver();
        let text = "# template language: handlebars\n\
                    PROTO Foo [ field SFFloat r 1 ] { Sphere { radius {{fields.r.value}} } }";
        let mut proto = ProtoNode::new(text, "Foo.proto", &config()).unwrap();
        proto.parse_head(&resolver).unwrap();
        proto.parse_body(&resolver).unwrap();
        let mut node = Node::Proto(proto);
        let old_id = node.base_node().unwrap().id();

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        node.set_parameter_value("r", FieldValue::SFFloat(3.0), &mut ctx)
            .unwrap();

        let new_id = node.base_node().unwrap().id();
        assert_ne!(new_id, old_id);
        assert_eq!(
            bridge.commands(),
            &[
                BridgeCommand::Delete {
                    id: old_id.bridge_id()
                },
                BridgeCommand::Load {
                    fragment: format!("<nodes><Sphere id=\"{}\" radius=\"3\"/></nodes>", new_id),
                    parent_id: None,
                },
            ]
        );
    }

    #[test]
    fn test_text_position() {
        assert_eq!(text_position("ab\ncd", 4), (2, 2));
        assert_eq!(text_position("ab", 0), (1, 1));
    }
}
