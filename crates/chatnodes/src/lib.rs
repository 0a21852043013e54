//! Built-in node handlers
//!
//! One handler per node type a flow editor can place on the canvas.

mod input;
mod message;
mod tag;
mod takeover;
mod wait;

pub use input::GetInputNode;
pub use message::MessageNode;
pub use tag::TagContactNode;
pub use takeover::HumanTakeoverNode;
pub use wait::{WaitNode, DEFAULT_WAIT_SECONDS};
use chatruntime::NodeRegistry;

use std::sync::Arc;

/// Register all built-in handlers with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(MessageNode));
    registry.register(Arc::new(TagContactNode));
    registry.register(Arc::new(HumanTakeoverNode));
    registry.register(Arc::new(WaitNode::default()));
    registry.register(Arc::new(GetInputNode));
}
