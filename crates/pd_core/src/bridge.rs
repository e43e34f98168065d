//! The boundary to the native renderer.

use serde_json::Value;

use crate::resolver::Resolver;

/// Operations the renderer exposes, keyed by bridge ids (node ids without
/// the `n` prefix).
pub trait RendererBridge {
    /// Insert a `<nodes>` fragment, under `parent_id` or at the scene root.
    fn load(&mut self, fragment: &str, parent_id: Option<&str>);

    /// Remove a node and its subtree.
    fn delete(&mut self, id: &str);

    /// Incremental update: `{ "id": <bridge id>, <field>: <value> }`.
    fn apply_pose(&mut self, payload: &Value);
}

/// Everything a field change may need besides the node itself.
pub struct UpdateContext<'a> {
    pub resolver: &'a Resolver,
    pub bridge: &'a mut dyn RendererBridge,
}

impl<'a> UpdateContext<'a> {
    pub fn new(resolver: &'a Resolver, bridge: &'a mut dyn RendererBridge) -> Self {
        Self { resolver, bridge }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    Load {
        fragment: String,
        parent_id: Option<String>,
    },
    Delete {
        id: String,
    },
    ApplyPose(Value),
}

/// Keeps every command it receives, in order.
#[derive(Debug, Default)]
pub struct RecordingBridge {
    commands: Vec<BridgeCommand>,
}

impl RecordingBridge {
    pub fn commands(&self) -> &[BridgeCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn load_count(&self) -> usize {
        self.count(|c| matches!(c, BridgeCommand::Load { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, BridgeCommand::Delete { .. }))
    }

    pub fn pose_count(&self) -> usize {
        self.count(|c| matches!(c, BridgeCommand::ApplyPose(_)))
    }

    fn count(&self, predicate: impl Fn(&BridgeCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }
}

impl RendererBridge for RecordingBridge {
    fn load(&mut self, fragment: &str, parent_id: Option<&str>) {
        self.commands.push(BridgeCommand::Load {
            fragment: fragment.to_string(),
            parent_id: parent_id.map(str::to_string),
        });
    }

    fn delete(&mut self, id: &str) {
        self.commands.push(BridgeCommand::Delete { id: id.to_string() });
    }

    fn apply_pose(&mut self, payload: &Value) {
        self.commands.push(BridgeCommand::ApplyPose(payload.clone()));
    }
}

/// Writes every command to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBridge;

impl RendererBridge for LoggingBridge {
    fn load(&mut self, fragment: &str, parent_id: Option<&str>) {
        match parent_id {
            Some(parent) => log::info!("load under {}: {}", parent, fragment),
            None => log::info!("load: {}", fragment),
        }
    }

    fn delete(&mut self, id: &str) {
        log::info!("delete: {}", id);
    }

    fn apply_pose(&mut self, payload: &Value) {
        log::info!("applyPose: {}", payload);
    }
}
