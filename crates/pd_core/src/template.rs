//! Body regeneration for templated PROTOs.
//!
//! A templated body is a handlebars template rendered against the PROTO's
//! encoded fields:
//!
//! ```text
//! { Box { size {{fields.size.value.x}} {{mul fields.size.value.y 2}} 1 } }
//! ```
//!
//! Output is not HTML-escaped and unknown variables are errors.

use std::fmt;

use handlebars::{
    no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError,
    RenderErrorReason,
};
use serde_json::Value;

use crate::error::{ProtoError, ProtoResult};

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(true);

        // Register helpers
        handlebars.register_helper("add", Box::new(add_helper));
        handlebars.register_helper("sub", Box::new(sub_helper));
        handlebars.register_helper("mul", Box::new(mul_helper));
        handlebars.register_helper("div", Box::new(div_helper));

        Self { handlebars }
    }

    /// Render `raw_body` against `fields` (see `ProtoNode::encode_fields`).
    pub fn generate(&self, fields: &Value, raw_body: &str) -> ProtoResult<String> {
        self.handlebars
            .render_template(raw_body, fields)
            .map_err(|e| ProtoError::Template(e.to_string()))
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

// Handlebars helpers

fn number_param(h: &Helper, index: usize) -> Result<f64, RenderError> {
    h.param(index)
        .and_then(|p| p.value().as_f64())
        .ok_or_else(|| {
            RenderErrorReason::Other(format!(
                "helper '{}' expects a number as parameter {}",
                h.name(),
                index
            ))
            .into()
        })
}

fn write_arithmetic(
    h: &Helper,
    out: &mut dyn Output,
    op: impl Fn(f64, f64) -> f64,
) -> HelperResult {
    let result = op(number_param(h, 0)?, number_param(h, 1)?);
    out.write(&result.to_string())?;
    Ok(())
}

fn add_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_arithmetic(h, out, |a, b| a + b)
}

fn sub_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_arithmetic(h, out, |a, b| a - b)
}

fn mul_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_arithmetic(h, out, |a, b| a * b)
}

fn div_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    write_arithmetic(h, out, |a, b| a / b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> Value {
        json!({
            "fields": {
                "size": { "value": { "x": 0.5, "y": 2.0, "z": 1.0 }, "defaultValue": { "x": 1.0, "y": 1.0, "z": 1.0 } },
                "name": { "value": "<crate>", "defaultValue": "crate" },
            },
            "context": { "proto": "Crate", "url": "Crate.proto" },
        })
    }

    #[test]
    fn test_generate() {
        let engine = TemplateEngine::new();
        let body = engine
            .generate(&fields(), "{ Box { size {{fields.size.value.x}} {{mul fields.size.value.y 2}} 1 } }")
            .unwrap();
        assert_eq!(body, "{ Box { size 0.5 4 1 } }");
    }

    #[test]
    fn test_no_html_escaping() {
        let engine = TemplateEngine::new();
        let body = engine.generate(&fields(), "\"{{fields.name.value}}\"").unwrap();
        assert_eq!(body, "\"<crate>\"");
    }

    #[test]
    fn test_generation_is_idempotent() {
        let engine = TemplateEngine::new();
        let raw = "{ Solid { name \"{{context.proto}}\" translation {{add fields.size.value.x 1}} 0 0 } }";
        let first = engine.generate(&fields(), raw).unwrap();
        let second = engine.generate(&fields(), raw).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_field_is_an_error() {
        let engine = TemplateEngine::new();
        let err = engine.generate(&fields(), "{{fields.color.value}}").unwrap_err();
        assert!(matches!(err, ProtoError::Template(_)));
    }

    #[test]
    fn test_helper_type_error() {
        let engine = TemplateEngine::new();
        let err = engine.generate(&fields(), "{{add fields.name.value 1}}").unwrap_err();
        assert!(matches!(err, ProtoError::Template(_)));
    }
}
