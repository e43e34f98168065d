//! Built-in node types and the fields each one supports.

use crate::vrml::FieldType::{self, *};

/// Field table of one built-in node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSchema {
    pub name: &'static str,
    /// Fields in declaration order.
    pub fields: &'static [(&'static str, FieldType)],
}

impl NodeSchema {
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, field_type)| *field_type)
    }
}

macro_rules! schemas {
    ($($name:literal => [$($field:literal: $ty:ident),* $(,)?]),* $(,)?) => {
        const SCHEMAS: &[NodeSchema] = &[
            $(NodeSchema { name: $name, fields: &[$(($field, $ty)),*] }),*
        ];
    };
}

schemas! {
    "Appearance" => [
        "material": SFNode,
        "texture": SFNode,
        "textureTransform": SFNode,
        "name": SFString,
    ],
    "Box" => ["size": SFVec3f],
    "Capsule" => [
        "bottom": SFBool,
        "height": SFFloat,
        "radius": SFFloat,
        "side": SFBool,
        "top": SFBool,
        "subdivision": SFInt32,
    ],
    "Color" => ["color": MFColor],
    "Cone" => [
        "bottomRadius": SFFloat,
        "height": SFFloat,
        "side": SFBool,
        "bottom": SFBool,
        "subdivision": SFInt32,
    ],
    "Coordinate" => ["point": MFVec3f],
    "Cylinder" => [
        "bottom": SFBool,
        "height": SFFloat,
        "radius": SFFloat,
        "side": SFBool,
        "top": SFBool,
        "subdivision": SFInt32,
    ],
    "DirectionalLight" => [
        "ambientIntensity": SFFloat,
        "color": SFColor,
        "direction": SFVec3f,
        "intensity": SFFloat,
        "on": SFBool,
        "castShadows": SFBool,
    ],
    "ElevationGrid" => [
        "color": SFNode,
        "colorPerVertex": SFBool,
        "height": MFFloat,
        "texCoord": SFNode,
        "thickness": SFFloat,
        "xDimension": SFInt32,
        "xSpacing": SFFloat,
        "zDimension": SFInt32,
        "zSpacing": SFFloat,
    ],
    "Group" => ["children": MFNode],
    "HingeJoint" => [
        "jointParameters": SFNode,
        "device": MFNode,
        "endPoint": SFNode,
    ],
    "HingeJointParameters" => [
        "position": SFFloat,
        "axis": SFVec3f,
        "anchor": SFVec3f,
        "minStop": SFFloat,
        "maxStop": SFFloat,
        "springConstant": SFFloat,
        "dampingConstant": SFFloat,
        "staticFriction": SFFloat,
    ],
    "ImageTexture" => [
        "url": MFString,
        "repeatS": SFBool,
        "repeatT": SFBool,
        "filtering": SFInt32,
    ],
    "IndexedFaceSet" => [
        "coord": SFNode,
        "normal": SFNode,
        "texCoord": SFNode,
        "ccw": SFBool,
        "coordIndex": MFInt32,
        "normalIndex": MFInt32,
        "texCoordIndex": MFInt32,
        "creaseAngle": SFFloat,
    ],
    "IndexedLineSet" => [
        "coord": SFNode,
        "coordIndex": MFInt32,
    ],
    "Material" => [
        "ambientIntensity": SFFloat,
        "diffuseColor": SFColor,
        "emissiveColor": SFColor,
        "shininess": SFFloat,
        "specularColor": SFColor,
        "transparency": SFFloat,
    ],
    "Normal" => ["vector": MFVec3f],
    "PBRAppearance" => [
        "baseColor": SFColor,
        "baseColorMap": SFNode,
        "transparency": SFFloat,
        "roughness": SFFloat,
        "roughnessMap": SFNode,
        "metalness": SFFloat,
        "metalnessMap": SFNode,
        "IBLStrength": SFFloat,
        "normalMap": SFNode,
        "normalMapFactor": SFFloat,
        "occlusionMap": SFNode,
        "occlusionMapStrength": SFFloat,
        "emissiveColor": SFColor,
        "emissiveColorMap": SFNode,
        "emissiveIntensity": SFFloat,
        "textureTransform": SFNode,
        "name": SFString,
    ],
    "Physics" => [
        "density": SFFloat,
        "mass": SFFloat,
        "centerOfMass": MFVec3f,
    ],
    "Plane" => ["size": SFVec2f],
    "PointLight" => [
        "ambientIntensity": SFFloat,
        "attenuation": SFVec3f,
        "color": SFColor,
        "intensity": SFFloat,
        "location": SFVec3f,
        "on": SFBool,
        "radius": SFFloat,
        "castShadows": SFBool,
    ],
    "Pose" => [
        "translation": SFVec3f,
        "rotation": SFRotation,
        "children": MFNode,
    ],
    "Shape" => [
        "appearance": SFNode,
        "geometry": SFNode,
        "castShadows": SFBool,
        "isPickable": SFBool,
    ],
    "Solid" => [
        "translation": SFVec3f,
        "rotation": SFRotation,
        "scale": SFVec3f,
        "children": MFNode,
        "name": SFString,
        "model": SFString,
        "description": SFString,
        "contactMaterial": SFString,
        "boundingObject": SFNode,
        "physics": SFNode,
        "locked": SFBool,
    ],
    "Sphere" => [
        "radius": SFFloat,
        "subdivision": SFInt32,
        "ico": SFBool,
    ],
    "SpotLight" => [
        "ambientIntensity": SFFloat,
        "attenuation": SFVec3f,
        "beamWidth": SFFloat,
        "color": SFColor,
        "cutOffAngle": SFFloat,
        "direction": SFVec3f,
        "intensity": SFFloat,
        "location": SFVec3f,
        "on": SFBool,
        "radius": SFFloat,
        "castShadows": SFBool,
    ],
    "TextureCoordinate" => ["point": MFVec2f],
    "TextureTransform" => [
        "center": SFVec2f,
        "rotation": SFFloat,
        "scale": SFVec2f,
        "translation": SFVec2f,
    ],
    "Transform" => [
        "translation": SFVec3f,
        "rotation": SFRotation,
        "scale": SFVec3f,
        "children": MFNode,
    ],
}

/// Schema of a built-in node type, if `name` is one.
pub fn node_schema(name: &str) -> Option<&'static NodeSchema> {
    SCHEMAS.iter().find(|schema| schema.name == name)
}

pub fn is_base_node(name: &str) -> bool {
    node_schema(name).is_some()
}

/// Names of every built-in node type, in alphabetical order.
pub fn base_node_names() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|schema| schema.name)
}
