//! PD Core - PROTO resolution and instantiation for robot-simulation scenes.
//!
//! This crate provides:
//!
//! - **Description language**: tokenizer, field types and values, built-in node table
//! - **Node model**: built-in nodes, PROTO instances, parameters and parameter links
//! - **Resolver**: recursive EXTERNPROTO fetching with a shared prototype cache
//! - **Templates**: handlebars-based body regeneration
//! - **Scene documents**: XML fragments and incremental updates for the renderer
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use pd_core::{FileFetcher, LoggingBridge, Resolver, UpdateContext, FieldValue};
//!
//! let resolver = Resolver::new(Rc::new(FileFetcher));
//! pollster::block_on(resolver.load("protos/Crate.proto"))?;
//!
//! let mut node = resolver.create_instance("protos/Crate.proto")?;
//! println!("{}", pd_core::to_scene_document(&node)?);
//!
//! let mut bridge = LoggingBridge;
//! let mut ctx = UpdateContext::new(&resolver, &mut bridge);
//! node.set_parameter_value("mass", FieldValue::SFFloat(2.0), &mut ctx)?;
//! ```

pub mod bridge;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod node;
pub mod resolver;
pub mod template;
pub mod vrml;

// Re-export commonly used types
pub use bridge::{BridgeCommand, LoggingBridge, RecordingBridge, RendererBridge, UpdateContext};
pub use config::ResolverConfig;
pub use document::{to_fragment, to_scene_document};
pub use error::{ProtoError, ProtoResult};
pub use fetch::{FileFetcher, MemoryFetcher, ProtoFetcher};
pub use node::{
    BaseNode, ExternProtos, Node, NodeId, NodePath, Parameter, ParameterLink, ProtoNode,
};
pub use resolver::Resolver;
pub use template::TemplateEngine;
pub use vrml::{FieldType, FieldValue, Tokenizer};
