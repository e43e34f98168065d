//! Node instances: built-in nodes, PROTO instances and their parameters.
//!
//! Every node owns its subtree exclusively. Cloning a node is a deep copy
//! that hands a fresh [`NodeId`] to every node in the copy; only immutable
//! cached prototypes are shared between instances.

pub mod base;
pub mod factory;
pub mod parameter;
pub mod proto;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{json, Map, Value};

use crate::bridge::{RendererBridge, UpdateContext};
use crate::error::{ProtoError, ProtoResult};
use crate::resolver::Resolver;
use crate::vrml::{FieldType, FieldValue, Tokenizer};

pub use base::BaseNode;
pub use factory::{create_node, ExternProtos};
pub use parameter::{NodePath, Parameter, ParameterLink, PathStep};
pub use proto::ProtoNode;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identifier, written `n<number>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a new id.
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// The id as the renderer knows it, without the `n` prefix.
    pub fn bridge_id(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node instance.
#[derive(Debug, Clone)]
pub enum Node {
    Base(BaseNode),
    Proto(ProtoNode),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Base(node) => node.id(),
            Node::Proto(node) => node.id(),
        }
    }

    /// Built-in node name or PROTO name.
    pub fn type_name(&self) -> &str {
        match self {
            Node::Base(node) => node.name(),
            Node::Proto(node) => node.proto_name(),
        }
    }

    pub fn is_proto(&self) -> bool {
        matches!(self, Node::Proto(_))
    }

    pub fn as_proto(&self) -> Option<&ProtoNode> {
        match self {
            Node::Proto(node) => Some(node),
            Node::Base(_) => None,
        }
    }

    pub fn as_base(&self) -> Option<&BaseNode> {
        match self {
            Node::Base(node) => Some(node),
            Node::Proto(_) => None,
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Node::Base(node) => node.parameters(),
            Node::Proto(node) => node.parameters(),
        }
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut [Parameter] {
        match self {
            Node::Base(node) => node.parameters_mut(),
            Node::Proto(node) => node.parameters_mut(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters().iter().find(|p| p.name() == name)
    }

    fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters_mut().iter_mut().find(|p| p.name() == name)
    }

    /// The built-in node this node materializes as.
    ///
    /// PROTO instances are followed through their expanded bodies, which
    /// may themselves be PROTO instances. Unexpanded PROTOs have none.
    pub fn base_node(&self) -> Option<&BaseNode> {
        match self {
            Node::Base(node) => Some(node),
            Node::Proto(node) => node.value()?.base_node(),
        }
    }

    /// Set fields from a `{ name value ... }` block.
    pub fn configure_from_tokens(
        &mut self,
        tokens: &mut Tokenizer,
        context: &ExternProtos,
        resolver: &Resolver,
    ) -> ProtoResult<()> {
        let node_name = self.type_name().to_string();
        factory::configure_parameters(&node_name, self.parameters_mut(), tokens, context, resolver)
    }

    // ========================================================================
    // Paths and links
    // ========================================================================

    fn child(&self, step: &PathStep) -> Option<&Node> {
        self.parameter(&step.field)?
            .value()?
            .nodes()
            .into_iter()
            .nth(step.index)
    }

    fn child_mut(&mut self, step: &PathStep) -> Option<&mut Node> {
        self.parameter_mut(&step.field)?
            .value_mut()?
            .nodes_mut()
            .into_iter()
            .nth(step.index)
    }

    pub fn node_at_path(&self, path: &NodePath) -> Option<&Node> {
        let mut node = self;
        for step in path.steps() {
            node = node.child(step)?;
        }
        Some(node)
    }

    pub fn node_at_path_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = self;
        for step in path.steps() {
            node = node.child_mut(step)?;
        }
        Some(node)
    }

    fn link_root(&self) -> Option<&Node> {
        match self {
            Node::Proto(node) => node.value(),
            base => Some(base),
        }
    }

    fn link_root_mut(&mut self) -> Option<&mut Node> {
        match self {
            Node::Proto(node) => node.value_mut(),
            base => Some(base),
        }
    }

    /// Make parameter `name` propagate its changes to `link`.
    ///
    /// The target must exist now and have the same field type.
    pub fn insert_link(&mut self, name: &str, link: ParameterLink) -> ProtoResult<()> {
        let source_type = self
            .parameter(name)
            .ok_or_else(|| unknown_field(self.type_name(), name))?
            .field_type();

        let target = self
            .link_root()
            .and_then(|root| root.node_at_path(&link.path))
            .ok_or_else(|| {
                ProtoError::Resolution(format!(
                    "Link target '{}' of '{}.{}' does not exist",
                    link.path,
                    self.type_name(),
                    name
                ))
            })?;
        let target_type = target
            .parameter(&link.field)
            .ok_or_else(|| unknown_field(target.type_name(), &link.field))?
            .field_type();

        if target_type != source_type {
            return Err(ProtoError::Schema(format!(
                "Cannot link {} '{}' to {} '{}'",
                source_type, name, target_type, link
            )));
        }

        if let Some(parameter) = self.parameter_mut(name) {
            parameter.insert_link(link);
        }
        Ok(())
    }

    /// Change a field the way an editor does.
    ///
    /// The value is type-checked, pushed depth-first to every linked
    /// parameter in insertion order, then applied here. Built-in nodes
    /// report the change to the renderer; PROTO fields that drive the
    /// template regenerate the body and reload it.
    ///
    /// Every link target is checked before anything changes, so a missing
    /// or mistyped target leaves the whole tree and the renderer untouched.
    pub fn set_parameter_value(
        &mut self,
        name: &str,
        value: FieldValue,
        ctx: &mut UpdateContext<'_>,
    ) -> ProtoResult<()> {
        self.check_parameter_value(name, value.field_type())?;
        self.propagate_parameter_value(name, value, ctx)
    }

    fn check_parameter_value(&self, name: &str, field_type: FieldType) -> ProtoResult<()> {
        let parameter = self
            .parameter(name)
            .ok_or_else(|| unknown_field(self.type_name(), name))?;
        if field_type != parameter.field_type() {
            return Err(ProtoError::type_mismatch(
                name,
                parameter.field_type(),
                field_type,
            ));
        }
        if !self.is_proto() && parameter.is_template_regenerator() {
            return Err(ProtoError::Schema(format!(
                "Field '{}' of built-in node '{}' cannot regenerate a template",
                name,
                self.type_name()
            )));
        }

        for link in parameter.links() {
            let target = self
                .link_root()
                .and_then(|root| root.node_at_path(&link.path))
                .ok_or_else(|| missing_link_target(link, name))?;
            target.check_parameter_value(&link.field, field_type)?;
        }
        Ok(())
    }

    fn propagate_parameter_value(
        &mut self,
        name: &str,
        value: FieldValue,
        ctx: &mut UpdateContext<'_>,
    ) -> ProtoResult<()> {
        let links = self
            .parameter(name)
            .map(|p| p.links().to_vec())
            .unwrap_or_default();
        for link in &links {
            log::debug!("'{}' change notifies '{}'", name, link);
            let target = self
                .link_root_mut()
                .and_then(|root| root.node_at_path_mut(&link.path))
                .ok_or_else(|| missing_link_target(link, name))?;
            target.propagate_parameter_value(&link.field, value.clone(), ctx)?;
        }

        match self {
            Node::Base(node) => node.apply_parameter_value(name, value, ctx),
            Node::Proto(node) => node.apply_parameter_value(name, value, ctx),
        }
    }

    /// Ask the renderer to drop this node's materialized counterpart.
    pub fn release(&self, bridge: &mut dyn RendererBridge) {
        if let Some(base) = self.base_node() {
            bridge.delete(&base.id().bridge_id());
        }
    }

    /// Equality of type and parameter values, ignoring ids and links.
    pub fn same_structure(&self, other: &Node) -> bool {
        self.is_proto() == other.is_proto()
            && self.type_name() == other.type_name()
            && self.parameters().len() == other.parameters().len()
            && self
                .parameters()
                .iter()
                .zip(other.parameters())
                .all(|(a, b)| a.name() == b.name() && a.value() == b.value())
    }

    /// `{ "node_name": ..., "fields": { <defined fields> } }`
    pub fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .parameters()
            .iter()
            .filter_map(|p| Some((p.name().to_string(), p.value()?.to_json())))
            .collect();
        json!({ "node_name": self.type_name(), "fields": fields })
    }
}

fn missing_link_target(link: &ParameterLink, name: &str) -> ProtoError {
    ProtoError::Resolution(format!(
        "Link target '{}' of '{}' no longer exists",
        link.path, name
    ))
}

pub(crate) fn unknown_field(node_name: &str, field: &str) -> ProtoError {
    ProtoError::Schema(format!("Node '{}' has no field '{}'", node_name, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeCommand, RecordingBridge};
    use crate::fetch::MemoryFetcher;
    use pd_math::DVec3;
    use std::rc::Rc;

    fn resolver() -> Resolver {
        Resolver::new(Rc::new(MemoryFetcher::new()))
    }

    fn parse(resolver: &Resolver, text: &str) -> Node {
        resolver
            .create_node_from_text(text, &ExternProtos::default())
            .unwrap()
    }

    #[test]
    fn test_node_id_display() {
        let id = NodeId::next();
        assert_eq!(id.to_string(), format!("n{}", id.value()));
        assert_eq!(id.bridge_id(), id.value().to_string());
        assert!(NodeId::next() > id);
    }

    #[test]
    fn test_clone_assigns_fresh_ids_recursively() {
        let resolver = resolver();
        let source = parse(&resolver, "Shape { geometry Box { size 1 2 3 } }");
        let copy = source.clone();

        assert_ne!(copy.id(), source.id());
        let path = NodePath::root().child("geometry", 0);
        let source_box = source.node_at_path(&path).unwrap();
        let copy_box = copy.node_at_path(&path).unwrap();
        assert_ne!(copy_box.id(), source_box.id());
        assert!(copy.same_structure(&source));
        assert!(copy.parameters().iter().all(|p| p.owner() == copy.id()));
    }

    #[test]
    fn test_clone_is_independent() {
        let resolver = resolver();
        let source = parse(&resolver, "Box { size 1 2 3 }");
        let mut copy = source.clone();
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        copy.set_parameter_value("size", FieldValue::SFVec3f(DVec3::ONE), &mut ctx)
            .unwrap();

        assert_eq!(
            source.parameter("size").unwrap().value(),
            Some(&FieldValue::SFVec3f(DVec3::new(1.0, 2.0, 3.0)))
        );
        assert!(!copy.same_structure(&source));
    }

    #[test]
    fn test_base_node_scalar_change_applies_pose() {
        let resolver = resolver();
        let mut node = parse(&resolver, "Sphere { radius 0.5 }");
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        node.set_parameter_value("radius", FieldValue::SFFloat(2.0), &mut ctx)
            .unwrap();

        assert_eq!(
            bridge.commands(),
            &[BridgeCommand::ApplyPose(
                json!({ "id": node.id().bridge_id(), "radius": 2.0 })
            )]
        );
    }

    #[test]
    fn test_base_node_child_change_reloads_child() {
        let resolver = resolver();
        let mut shape = parse(&resolver, "Shape { geometry Box { } }");
        let old_box = shape
            .node_at_path(&NodePath::root().child("geometry", 0))
            .unwrap()
            .id();
        let sphere = parse(&resolver, "Sphere { radius 1 }");
        let sphere_id = sphere.id();
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        shape
            .set_parameter_value("geometry", FieldValue::SFNode(Some(Box::new(sphere))), &mut ctx)
            .unwrap();

        assert_eq!(
            bridge.commands(),
            &[
                BridgeCommand::Delete {
                    id: old_box.bridge_id()
                },
                BridgeCommand::Load {
                    fragment: format!("<nodes><Sphere id=\"{}\" radius=\"1\"/></nodes>", sphere_id),
                    parent_id: Some(shape.id().bridge_id()),
                },
            ]
        );
    }

    #[test]
    fn test_set_unknown_or_mistyped_field() {
        let resolver = resolver();
        let mut node = parse(&resolver, "Sphere { }");
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        let err = node
            .set_parameter_value("size", FieldValue::SFFloat(1.0), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ProtoError::Schema(_)));
        let err = node
            .set_parameter_value("radius", FieldValue::SFBool(true), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ProtoError::Schema(_)));
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_regenerator_flag_on_base_node_is_rejected() {
        let resolver = resolver();
        let mut node = parse(&resolver, "Sphere { radius 1 }");
        if let Node::Base(base) = &mut node {
            base.parameter_mut("radius")
                .unwrap()
                .set_template_regenerator(true);
        }
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        let err = node
            .set_parameter_value("radius", FieldValue::SFFloat(2.0), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, ProtoError::Schema(_)));
    }

    #[test]
    fn test_links_on_base_node() {
        let resolver = resolver();
        let mut shape = parse(&resolver, "Transform { children [ Shape { geometry Box { } } ] scale 1 1 1 }");
        let path = NodePath::root().child("children", 0).child("geometry", 0);
        shape
            .insert_link("scale", ParameterLink::new(path.clone(), "size"))
            .unwrap();

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        let value = FieldValue::SFVec3f(DVec3::new(2.0, 2.0, 2.0));
        shape.set_parameter_value("scale", value.clone(), &mut ctx).unwrap();

        assert_eq!(shape.node_at_path(&path).unwrap().parameter("size").unwrap().value(), Some(&value));
        assert_eq!(shape.parameter("scale").unwrap().value(), Some(&value));
        assert_eq!(bridge.pose_count(), 2);
    }

    #[test]
    fn test_insert_link_validates_target() {
        let resolver = resolver();
        let mut shape = parse(&resolver, "Shape { geometry Box { } }");

        let missing = ParameterLink::new(NodePath::root().child("appearance", 0), "name");
        assert!(matches!(
            shape.insert_link("castShadows", missing),
            Err(ProtoError::Resolution(_))
        ));

        let mistyped = ParameterLink::new(NodePath::root().child("geometry", 0), "size");
        assert!(matches!(
            shape.insert_link("castShadows", mistyped),
            Err(ProtoError::Schema(_))
        ));
        assert!(shape.parameter("castShadows").unwrap().links().is_empty());
    }

    #[test]
    fn test_to_json_lists_defined_fields() {
        let resolver = resolver();
        let node = parse(&resolver, "Cone { height 2 }");
        assert_eq!(node.to_json(), json!({ "node_name": "Cone", "fields": { "height": 2.0 } }));
        assert_eq!(node.parameter("height").unwrap().field_type(), FieldType::SFFloat);
    }

    fn box_size(node: &Node, child: usize) -> Option<&FieldValue> {
        let path = NodePath::root().child("children", child).child("geometry", 0);
        node.node_at_path(&path)?.parameter("size")?.value()
    }

    fn linked_transform(resolver: &Resolver) -> Node {
        let mut transform = parse(
            resolver,
            "Transform { children [ Shape { geometry Box { } } Shape { geometry Box { } } ] }",
        );
        for child in 0..2 {
            let path = NodePath::root().child("children", child).child("geometry", 0);
            transform
                .insert_link("scale", ParameterLink::new(path, "size"))
                .unwrap();
        }
        transform
    }

    #[test]
    fn test_missing_link_target_changes_nothing() {
        let resolver = resolver();
        let mut transform = linked_transform(&resolver);
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        let remaining = parse(&resolver, "Shape { geometry Box { } }");
        transform
            .set_parameter_value("children", FieldValue::MFNode(vec![remaining]), &mut ctx)
            .unwrap();
        bridge.clear();

        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        let err = transform
            .set_parameter_value("scale", FieldValue::SFVec3f(DVec3::splat(2.0)), &mut ctx)
            .unwrap_err();

        assert!(matches!(err, ProtoError::Resolution(_)));
        assert_eq!(transform.parameter("scale").unwrap().value(), None);
        assert_eq!(box_size(&transform, 0), None);
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_mistyped_link_target_changes_nothing() {
        let resolver = resolver();
        let mut transform = linked_transform(&resolver);
        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);

        let children = vec![
            parse(&resolver, "Shape { geometry Box { } }"),
            parse(&resolver, "Shape { geometry Sphere { } }"),
        ];
        transform
            .set_parameter_value("children", FieldValue::MFNode(children), &mut ctx)
            .unwrap();
        bridge.clear();

        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        let err = transform
            .set_parameter_value("scale", FieldValue::SFVec3f(DVec3::splat(2.0)), &mut ctx)
            .unwrap_err();

        assert!(matches!(err, ProtoError::Schema(_)));
        assert_eq!(transform.parameter("scale").unwrap().value(), None);
        assert_eq!(box_size(&transform, 0), None);
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_mf_node_change_reloads_every_child() {
        let resolver = resolver();
        let mut group = parse(&resolver, "Group { children [ Box { } Sphere { } ] }");
        let old: Vec<NodeId> = (0..2)
            .map(|i| {
                group
                    .node_at_path(&NodePath::root().child("children", i))
                    .unwrap()
                    .id()
            })
            .collect();
        let cone = parse(&resolver, "Cone { }");
        let capsule = parse(&resolver, "Capsule { }");
        let new = [cone.id(), capsule.id()];

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        group
            .set_parameter_value("children", FieldValue::MFNode(vec![cone, capsule]), &mut ctx)
            .unwrap();

        let parent_id = Some(group.id().bridge_id());
        assert_eq!(
            bridge.commands(),
            &[
                BridgeCommand::Delete {
                    id: old[0].bridge_id()
                },
                BridgeCommand::Delete {
                    id: old[1].bridge_id()
                },
                BridgeCommand::Load {
                    fragment: format!("<nodes><Cone id=\"{}\"/></nodes>", new[0]),
                    parent_id: parent_id.clone(),
                },
                BridgeCommand::Load {
                    fragment: format!("<nodes><Capsule id=\"{}\"/></nodes>", new[1]),
                    parent_id,
                },
            ]
        );
        let children = group.parameter("children").unwrap().value().unwrap().nodes();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].type_name(), "Capsule");
    }

    #[test]
    fn test_proto_clone_is_independent() {
        let resolver = resolver();
        let text = "PROTO Lamp [\n\
                      field SFFloat intensity 1\n\
                      field SFFloat radius 1\n\
                      field SFNode shade Cone { height 2 }\n\
                    ] { Transform { children [ Sphere { radius 1 } ] } }";
        pollster::block_on(resolver.load_from_text("Lamp.proto", text)).unwrap();
        let source = resolver.create_instance("Lamp.proto").unwrap();
        let mut copy = source.clone();

        let shade = |node: &Node| node.parameter("shade").unwrap().value().unwrap().nodes()[0].id();
        assert_ne!(shade(&copy), shade(&source));
        let body = |node: &Node| node.as_proto().unwrap().value().unwrap().id();
        assert_ne!(body(&copy), body(&source));

        let sphere = NodePath::root().child("children", 0);
        copy.insert_link("radius", ParameterLink::new(sphere.clone(), "radius"))
            .unwrap();

        let mut bridge = RecordingBridge::default();
        let mut ctx = UpdateContext::new(&resolver, &mut bridge);
        copy.set_parameter_value("intensity", FieldValue::SFFloat(3.0), &mut ctx)
            .unwrap();
        copy.set_parameter_value("radius", FieldValue::SFFloat(4.0), &mut ctx)
            .unwrap();
        let replacement = parse(&resolver, "Box { }");
        copy.set_parameter_value("shade", FieldValue::SFNode(Some(Box::new(replacement))), &mut ctx)
            .unwrap();

        let value = |node: &Node, name: &str| node.parameter(name).unwrap().value().cloned();
        assert_eq!(value(&source, "intensity"), Some(FieldValue::SFFloat(1.0)));
        assert_eq!(value(&source, "radius"), Some(FieldValue::SFFloat(1.0)));
        assert!(source.parameter("radius").unwrap().links().is_empty());

        let source_shade = source.parameter("shade").unwrap();
        assert_eq!(source_shade.value().unwrap().nodes()[0].type_name(), "Cone");
        assert!(source_shade.is_default().unwrap());
        let copy_shade = copy.parameter("shade").unwrap();
        assert_eq!(copy_shade.value().unwrap().nodes()[0].type_name(), "Box");
        assert_eq!(copy_shade.default_value().unwrap().nodes()[0].type_name(), "Cone");

        let radius = |node: &Node| {
            node.as_proto()
                .and_then(|p| p.value())
                .and_then(|root| root.node_at_path(&sphere))
                .and_then(|n| n.parameter("radius"))
                .and_then(|p| p.value())
                .cloned()
        };
        assert_eq!(radius(&source), Some(FieldValue::SFFloat(1.0)));
        assert_eq!(radius(&copy), Some(FieldValue::SFFloat(4.0)));
    }
}
