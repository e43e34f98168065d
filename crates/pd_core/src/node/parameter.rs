//! Parameters and the links between them.

use std::fmt;

use crate::error::{ProtoError, ProtoResult};
use crate::node::NodeId;
use crate::vrml::{FieldType, FieldValue};

/// One step of a [`NodePath`]: the `index`-th node held by node field `field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathStep {
    pub field: String,
    pub index: usize,
}

/// Address of a node relative to the root a link is resolved from.
///
/// Paths are plain data, so links keep working after their owner is cloned
/// or its body is regenerated, as long as the shape of the tree is the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathStep>);

impl NodePath {
    /// The empty path, addressing the root itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend the path by one step.
    pub fn child(mut self, field: impl Into<String>, index: usize) -> Self {
        self.0.push(PathStep {
            field: field.into(),
            index,
        });
        self
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(".");
        }
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{}[{}]", step.field, step.index)?;
        }
        Ok(())
    }
}

/// A parameter that must follow the value of another one.
///
/// For a PROTO instance the path starts at its expanded body root; for a
/// built-in node it starts at the node itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterLink {
    pub path: NodePath,
    pub field: String,
}

impl ParameterLink {
    pub fn new(path: NodePath, field: impl Into<String>) -> Self {
        Self {
            path,
            field: field.into(),
        }
    }
}

impl fmt::Display for ParameterLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            return f.write_str(&self.field);
        }
        write!(f, "{}.{}", self.path, self.field)
    }
}

/// A named, typed field slot of a node.
///
/// `value` and `default_value` are both undefined (`None`) for built-in
/// fields that were never written, and always hold a value of `field_type`
/// otherwise.
#[derive(Debug, Clone)]
pub struct Parameter {
    owner: NodeId,
    name: String,
    field_type: FieldType,
    value: Option<FieldValue>,
    default_value: Option<FieldValue>,
    template_regenerator: bool,
    links: Vec<ParameterLink>,
}

impl Parameter {
    /// An undefined parameter.
    pub fn new(owner: NodeId, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            owner,
            name: name.into(),
            field_type,
            value: None,
            default_value: None,
            template_regenerator: false,
            links: Vec::new(),
        }
    }

    /// A parameter declared in a PROTO header: current value equals default.
    pub fn declared(
        owner: NodeId,
        name: impl Into<String>,
        default_value: FieldValue,
        template_regenerator: bool,
    ) -> Self {
        let mut parameter = Self::new(owner, name, default_value.field_type());
        parameter.value = Some(default_value.clone());
        parameter.default_value = Some(default_value);
        parameter.template_regenerator = template_regenerator;
        parameter
    }

    /// Id of the node this parameter belongs to.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: NodeId) {
        self.owner = owner;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        self.default_value.as_ref()
    }

    /// Store `value` without notifying links or the renderer.
    pub fn set_value(&mut self, value: FieldValue) -> ProtoResult<()> {
        self.check_type(&value)?;
        self.value = Some(value);
        Ok(())
    }

    pub fn set_default_value(&mut self, value: FieldValue) -> ProtoResult<()> {
        self.check_type(&value)?;
        self.default_value = Some(value);
        Ok(())
    }

    /// Swap the current value, returning the previous one.
    pub(crate) fn replace_value(
        &mut self,
        value: Option<FieldValue>,
    ) -> ProtoResult<Option<FieldValue>> {
        if let Some(value) = &value {
            self.check_type(value)?;
        }
        Ok(std::mem::replace(&mut self.value, value))
    }

    pub(crate) fn value_mut(&mut self) -> Option<&mut FieldValue> {
        self.value.as_mut()
    }

    /// True if changing this parameter requires regenerating the PROTO body.
    pub fn is_template_regenerator(&self) -> bool {
        self.template_regenerator
    }

    pub fn set_template_regenerator(&mut self, regenerator: bool) {
        self.template_regenerator = regenerator;
    }

    pub fn links(&self) -> &[ParameterLink] {
        &self.links
    }

    /// Register a parameter to notify whenever this one changes.
    ///
    /// Prefer [`crate::Node::insert_link`], which validates the target.
    pub fn insert_link(&mut self, link: ParameterLink) {
        self.links.push(link);
    }

    pub fn reset_links(&mut self) {
        self.links.clear();
    }

    /// Whether the current value equals the default value.
    pub fn is_default(&self) -> ProtoResult<bool> {
        match (&self.value, &self.default_value) {
            (Some(value), Some(default_value)) => Ok(value == default_value),
            _ => Err(ProtoError::Schema(format!(
                "Cannot check default-ness of '{}', either value or default value is undefined",
                self.name
            ))),
        }
    }

    fn check_type(&self, value: &FieldValue) -> ProtoResult<()> {
        if value.field_type() != self.field_type {
            return Err(ProtoError::type_mismatch(
                &self.name,
                self.field_type,
                value.field_type(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_value_equals_default() {
        let parameter = Parameter::declared(NodeId::next(), "offset", FieldValue::SFFloat(0.5), false);
        assert_eq!(parameter.field_type(), FieldType::SFFloat);
        assert_eq!(parameter.value(), Some(&FieldValue::SFFloat(0.5)));
        assert_eq!(parameter.default_value(), Some(&FieldValue::SFFloat(0.5)));
        assert!(parameter.is_default().unwrap());
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut parameter = Parameter::new(NodeId::next(), "radius", FieldType::SFFloat);
        let err = parameter.set_value(FieldValue::SFInt32(1)).unwrap_err();
        assert!(matches!(err, ProtoError::Schema(_)));
        assert!(parameter.value().is_none());
        assert!(parameter.set_default_value(FieldValue::SFBool(true)).is_err());
    }

    #[test]
    fn test_is_default_requires_both_values() {
        let mut parameter = Parameter::new(NodeId::next(), "radius", FieldType::SFFloat);
        assert!(parameter.is_default().is_err());
        parameter.set_value(FieldValue::SFFloat(1.0)).unwrap();
        assert!(parameter.is_default().is_err());
        parameter.set_default_value(FieldValue::SFFloat(2.0)).unwrap();
        assert!(!parameter.is_default().unwrap());
    }

    #[test]
    fn test_links_keep_insertion_order() {
        let mut parameter = Parameter::new(NodeId::next(), "size", FieldType::SFVec3f);
        parameter.insert_link(ParameterLink::new(NodePath::root().child("geometry", 0), "size"));
        parameter.insert_link(ParameterLink::new(NodePath::root(), "scale"));
        let fields: Vec<_> = parameter.links().iter().map(|l| l.to_string()).collect();
        assert_eq!(fields, vec!["geometry[0].size", "scale"]);
        parameter.reset_links();
        assert!(parameter.links().is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let source = Parameter::declared(NodeId::next(), "name", FieldValue::SFString("a".into()), false);
        let mut copy = source.clone();
        copy.set_value(FieldValue::SFString("b".into())).unwrap();
        assert_eq!(source.value(), Some(&FieldValue::SFString("a".into())));
    }
}
