//! Connection selection.
//!
//! Connections are scanned in list order and the first one whose guard holds
//! wins. An unguarded connection matches the moment it is reached, so flow
//! authors put conditional branches first and the fallback last.

use chatcore::{Condition, InboundEvent, Node, NodeKind};

/// Pick the target of the first connection of `node` that matches `event`.
/// `None` means the flow ends here.
pub fn select_next<'a>(node: &'a Node, event: &InboundEvent) -> Option<&'a str> {
    node.connections
        .iter()
        .find(|conn| match &conn.condition {
            None => true,
            Some(condition) => condition_holds(condition, node, event),
        })
        .map(|conn| conn.target_node_id.as_str())
}

pub fn condition_holds(condition: &Condition, node: &Node, event: &InboundEvent) -> bool {
    match condition {
        Condition::ButtonPayload(expected) => event.button_payload() == Some(expected.as_str()),
        Condition::InputValid(expected) => validate_input(node, event) == *expected,
        Condition::Unsupported { kind, .. } => {
            tracing::debug!("Condition type '{}' is not evaluated; treating as unmatched", kind);
            false
        }
    }
}

/// Heuristic input validation for `get_input` nodes; every other node type passes.
///
/// `email` needs an `@` and a `.`; `phone` must be all digits once spaces and
/// hyphens are removed. Anything else passes.
pub fn validate_input(node: &Node, event: &InboundEvent) -> bool {
    if node.kind != NodeKind::GetInput {
        return true;
    }

    let text = event.text();
    match node.param_str("inputType") {
        Some("email") => text.contains('@') && text.contains('.'),
        Some("phone") => {
            let digits: Vec<char> = text.chars().filter(|c| *c != ' ' && *c != '-').collect();
            !digits.is_empty() && digits.iter().all(|c| c.is_ascii_digit())
        }
        _ => true,
    }
}
