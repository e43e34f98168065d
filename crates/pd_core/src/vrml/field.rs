//! Field kinds of the description language.

use std::fmt;

/// The closed set of field types a PROTO parameter or built-in field can have.
///
/// Every multi-valued (MF) kind pairs with exactly one single-valued (SF)
/// element kind, see [`FieldType::element_type`] and [`FieldType::multiple_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    SFBool,
    SFInt32,
    SFFloat,
    SFString,
    SFVec2f,
    SFVec3f,
    SFRotation,
    SFColor,
    SFNode,
    MFBool,
    MFInt32,
    MFFloat,
    MFString,
    MFVec2f,
    MFVec3f,
    MFRotation,
    MFColor,
    MFNode,
}

impl FieldType {
    pub const ALL: [FieldType; 18] = [
        FieldType::SFBool,
        FieldType::SFInt32,
        FieldType::SFFloat,
        FieldType::SFString,
        FieldType::SFVec2f,
        FieldType::SFVec3f,
        FieldType::SFRotation,
        FieldType::SFColor,
        FieldType::SFNode,
        FieldType::MFBool,
        FieldType::MFInt32,
        FieldType::MFFloat,
        FieldType::MFString,
        FieldType::MFVec2f,
        FieldType::MFVec3f,
        FieldType::MFRotation,
        FieldType::MFColor,
        FieldType::MFNode,
    ];

    /// The keyword used for this type in PROTO headers.
    pub fn keyword(self) -> &'static str {
        match self {
            FieldType::SFBool => "SFBool",
            FieldType::SFInt32 => "SFInt32",
            FieldType::SFFloat => "SFFloat",
            FieldType::SFString => "SFString",
            FieldType::SFVec2f => "SFVec2f",
            FieldType::SFVec3f => "SFVec3f",
            FieldType::SFRotation => "SFRotation",
            FieldType::SFColor => "SFColor",
            FieldType::SFNode => "SFNode",
            FieldType::MFBool => "MFBool",
            FieldType::MFInt32 => "MFInt32",
            FieldType::MFFloat => "MFFloat",
            FieldType::MFString => "MFString",
            FieldType::MFVec2f => "MFVec2f",
            FieldType::MFVec3f => "MFVec3f",
            FieldType::MFRotation => "MFRotation",
            FieldType::MFColor => "MFColor",
            FieldType::MFNode => "MFNode",
        }
    }

    pub fn from_keyword(word: &str) -> Option<FieldType> {
        Self::ALL.into_iter().find(|t| t.keyword() == word)
    }

    pub fn is_multiple(self) -> bool {
        matches!(
            self,
            FieldType::MFBool
                | FieldType::MFInt32
                | FieldType::MFFloat
                | FieldType::MFString
                | FieldType::MFVec2f
                | FieldType::MFVec3f
                | FieldType::MFRotation
                | FieldType::MFColor
                | FieldType::MFNode
        )
    }

    /// True for `SFNode` and `MFNode`.
    pub fn is_node(self) -> bool {
        matches!(self, FieldType::SFNode | FieldType::MFNode)
    }

    /// SF element kind of an MF type (SF types map to themselves).
    pub fn element_type(self) -> FieldType {
        match self {
            FieldType::MFBool => FieldType::SFBool,
            FieldType::MFInt32 => FieldType::SFInt32,
            FieldType::MFFloat => FieldType::SFFloat,
            FieldType::MFString => FieldType::SFString,
            FieldType::MFVec2f => FieldType::SFVec2f,
            FieldType::MFVec3f => FieldType::SFVec3f,
            FieldType::MFRotation => FieldType::SFRotation,
            FieldType::MFColor => FieldType::SFColor,
            FieldType::MFNode => FieldType::SFNode,
            sf => sf,
        }
    }

    /// MF counterpart of an SF type (MF types map to themselves).
    pub fn multiple_type(self) -> FieldType {
        match self {
            FieldType::SFBool => FieldType::MFBool,
            FieldType::SFInt32 => FieldType::MFInt32,
            FieldType::SFFloat => FieldType::MFFloat,
            FieldType::SFString => FieldType::MFString,
            FieldType::SFVec2f => FieldType::MFVec2f,
            FieldType::SFVec3f => FieldType::MFVec3f,
            FieldType::SFRotation => FieldType::MFRotation,
            FieldType::SFColor => FieldType::MFColor,
            FieldType::SFNode => FieldType::MFNode,
            mf => mf,
        }
    }

    /// Number of tokens one scalar element of this type occupies.
    ///
    /// Node kinds have no fixed width and return 0.
    pub fn token_count(self) -> usize {
        match self.element_type() {
            FieldType::SFBool | FieldType::SFInt32 | FieldType::SFFloat | FieldType::SFString => 1,
            FieldType::SFVec2f => 2,
            FieldType::SFVec3f | FieldType::SFColor => 3,
            FieldType::SFRotation => 4,
            _ => 0,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
