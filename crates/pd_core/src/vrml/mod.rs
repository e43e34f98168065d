//! The description language: lexing, field types, values and the
//! built-in node table.

pub mod field;
pub mod schema;
pub mod tokenizer;
pub mod value;

pub use field::FieldType;
pub use schema::{base_node_names, is_base_node, node_schema, NodeSchema};
pub use tokenizer::{Token, TokenKind, Tokenizer};
pub use value::FieldValue;
