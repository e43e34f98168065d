//! Built-in node instances.

use serde_json::{Map, Value};

use crate::bridge::UpdateContext;
use crate::document;
use crate::error::{ProtoError, ProtoResult};
use crate::node::{unknown_field, NodeId, Parameter};
use crate::vrml::{node_schema, FieldValue, NodeSchema};

/// An instance of a built-in node type.
///
/// One parameter per schema field, all undefined until configured.
#[derive(Debug)]
pub struct BaseNode {
    id: NodeId,
    schema: &'static NodeSchema,
    parameters: Vec<Parameter>,
}

impl BaseNode {
    pub fn new(name: &str) -> ProtoResult<Self> {
        let schema = node_schema(name)
            .ok_or_else(|| ProtoError::Schema(format!("'{}' is not a supported built-in node", name)))?;
        let id = NodeId::next();
        log::debug!("Creating built-in node {} ({})", name, id);

        let parameters = schema
            .fields
            .iter()
            .map(|(field, field_type)| Parameter::new(id, *field, *field_type))
            .collect();

        Ok(Self {
            id,
            schema,
            parameters,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn schema(&self) -> &'static NodeSchema {
        self.schema
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

    /// Store a new value and mirror it on the renderer side.
    pub(crate) fn apply_parameter_value(
        &mut self,
        name: &str,
        value: FieldValue,
        ctx: &mut UpdateContext<'_>,
    ) -> ProtoResult<()> {
        let node_name = self.schema.name;
        let bridge_id = self.id.bridge_id();
        let parameter = self
            .parameter_mut(name)
            .ok_or_else(|| unknown_field(node_name, name))?;

        if parameter.is_template_regenerator() {
            return Err(ProtoError::Schema(format!(
                "Field '{}' of built-in node '{}' cannot regenerate a template",
                name, node_name
            )));
        }

        if !parameter.field_type().is_node() {
            let json = value.to_json();
            parameter.set_value(value)?;

            let mut payload = Map::new();
            payload.insert("id".to_string(), Value::String(bridge_id));
            payload.insert(name.to_string(), json);
            ctx.bridge.apply_pose(&Value::Object(payload));
            return Ok(());
        }

        let fragments = value
            .nodes()
            .into_iter()
            .map(document::to_fragment)
            .collect::<ProtoResult<Vec<_>>>()?;

        if let Some(previous) = parameter.value() {
            for node in previous.nodes() {
                log::debug!("Deleting {} from {}.{}", node.id(), node_name, name);
                node.release(ctx.bridge);
            }
        }

        parameter.set_value(value)?;

        for fragment in &fragments {
            ctx.bridge.load(fragment, Some(&bridge_id));
        }
        Ok(())
    }
}

impl Clone for BaseNode {
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
            schema: self.schema,
            parameters,
        }
    }
}
