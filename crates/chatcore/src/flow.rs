use crate::{AccountId, GraphError, Value, ValueMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

pub type FlowId = Uuid;
pub type NodeId = String;

/// Node type tag.
///
/// Built-in kinds get their own variant; anything else is kept as `Custom`
/// so it can be served by a registered handler or rejected at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Message,
    TagContact,
    HumanTakeover,
    Wait,
    GetInput,
    Custom(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Message => "message",
            NodeKind::TagContact => "tag_contact",
            NodeKind::HumanTakeover => "human_takeover",
            NodeKind::Wait => "wait",
            NodeKind::GetInput => "get_input",
            NodeKind::Custom(s) => s,
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "message" => NodeKind::Message,
            "tag_contact" => NodeKind::TagContact,
            "human_takeover" => NodeKind::HumanTakeover,
            "wait" => NodeKind::Wait,
            "get_input" => NodeKind::GetInput,
            _ => NodeKind::Custom(s),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        NodeKind::from(s.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guard on a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    /// Inbound event is a button response carrying exactly this payload
    ButtonPayload(String),
    /// Input validation of the current node yields this value
    InputValid(bool),
    /// Condition type this engine does not evaluate; never matches
    Unsupported { kind: String, value: Value },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            "button_payload" => match raw.value {
                Value::String(payload) => Ok(Condition::ButtonPayload(payload)),
                other => Err(format!("button_payload expects a string, got {}", other)),
            },
            "input_valid" => match raw.value {
                Value::Bool(b) => Ok(Condition::InputValid(b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Condition::InputValid(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Condition::InputValid(false)),
                other => Err(format!("input_valid expects a boolean, got {}", other)),
            },
            _ => Ok(Condition::Unsupported {
                kind: raw.kind,
                value: raw.value,
            }),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::ButtonPayload(payload) => RawCondition {
                kind: "button_payload".to_string(),
                value: Value::String(payload),
            },
            Condition::InputValid(b) => RawCondition {
                kind: "input_valid".to_string(),
                value: Value::Bool(b),
            },
            Condition::Unsupported { kind, value } => RawCondition { kind, value },
        }
    }
}

/// Directed edge to another node; list order within a node is significant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub target_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Connection {
    pub fn to(target: impl Into<NodeId>) -> Self {
        Self {
            target_node_id: target.into(),
            condition: None,
        }
    }

    pub fn when(target: impl Into<NodeId>, condition: Condition) -> Self {
        Self {
            target_node_id: target.into(),
            condition: Some(condition),
        }
    }
}

/// One step of a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub content: ValueMap,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Node-level settings such as `tagName`, `inputType`, `durationSeconds`
    #[serde(flatten)]
    pub attributes: ValueMap,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            content: ValueMap::new(),
            connections: Vec::new(),
            attributes: ValueMap::new(),
        }
    }

    pub fn with_content(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn connect(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    /// Look up a type-specific setting, node attributes first, then content
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).or_else(|| self.content.get(key))
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.param(key).and_then(Value::as_f64)
    }
}

/// Serialized form of a flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub start_node_id: NodeId,
    pub nodes: Vec<Node>,
}

/// Parsed, validated flow graph. Immutable once built.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    definition: FlowDefinition,
    index: HashMap<NodeId, usize>,
}

impl FlowGraph {
    /// Build a graph, checking that the start node and every connection target resolve.
    ///
    /// Cycles are allowed.
    pub fn new(start_node_id: impl Into<NodeId>, nodes: Vec<Node>) -> Result<Self, GraphError> {
        let definition = FlowDefinition {
            start_node_id: start_node_id.into(),
            nodes,
        };

        let mut index = HashMap::with_capacity(definition.nodes.len());
        for (pos, node) in definition.nodes.iter().enumerate() {
            if index.insert(node.id.clone(), pos).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }

        if !index.contains_key(&definition.start_node_id) {
            return Err(GraphError::MissingStartNode(definition.start_node_id.clone()));
        }

        for node in &definition.nodes {
            for conn in &node.connections {
                if !index.contains_key(&conn.target_node_id) {
                    return Err(GraphError::DanglingConnection {
                        node: node.id.clone(),
                        target: conn.target_node_id.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            "Parsed flow graph: {} nodes, start '{}'",
            definition.nodes.len(),
            definition.start_node_id
        );

        Ok(Self { definition, index })
    }

    pub fn parse(json: &str) -> Result<Self, GraphError> {
        let definition: FlowDefinition = serde_json::from_str(json)?;
        Self::try_from(definition)
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self, GraphError> {
        let definition: FlowDefinition = serde_json::from_value(json)?;
        Self::try_from(definition)
    }

    pub fn start_node_id(&self) -> &str {
        &self.definition.start_node_id
    }

    pub fn start_node(&self) -> &Node {
        // Presence of the start node is checked in `new`
        &self.definition.nodes[self.index[&self.definition.start_node_id]]
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|pos| &self.definition.nodes[*pos])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.definition.nodes
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }
}

impl TryFrom<FlowDefinition> for FlowGraph {
    type Error = GraphError;

    fn try_from(def: FlowDefinition) -> Result<Self, Self::Error> {
        FlowGraph::new(def.start_node_id, def.nodes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Active,
    Inactive,
    Draft,
}

/// A stored flow: ownership, status and the raw definition it was saved with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: FlowId,
    pub account_id: AccountId,
    pub name: String,
    pub status: FlowStatus,
    pub definition: serde_json::Value,
}

impl FlowRecord {
    pub fn new(account_id: AccountId, name: impl Into<String>, definition: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            name: name.into(),
            status: FlowStatus::Active,
            definition,
        }
    }

    pub fn from_graph(
        account_id: AccountId,
        name: impl Into<String>,
        graph: &FlowGraph,
    ) -> Result<Self, GraphError> {
        let definition = serde_json::to_value(graph.definition())?;
        Ok(Self::new(account_id, name, definition))
    }

    pub fn with_status(mut self, status: FlowStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == FlowStatus::Active
    }

    /// Re-parse the stored definition
    pub fn graph(&self) -> Result<FlowGraph, GraphError> {
        FlowGraph::from_json(self.definition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELCOME: &str = r#"{
        "startNodeId": "n1",
        "nodes": [
            {"id": "n1", "type": "message", "name": "Hello",
             "content": {"text": "Hello {{contact.firstName}}!"},
             "connections": [
                {"targetNodeId": "n2", "condition": {"type": "button_payload", "value": "YES"}},
                {"targetNodeId": "n3"}
             ]},
            {"id": "n2", "type": "get_input", "inputType": "email", "connections": [
                {"targetNodeId": "n3", "condition": {"type": "input_valid", "value": "true"}}
            ]},
            {"id": "n3", "type": "tag_contact", "tagName": "lead", "connections": [
                {"targetNodeId": "n1"}
            ]}
        ]
    }"#;

    #[test]
    fn parses_builder_definition() {
        let graph = FlowGraph::parse(WELCOME).unwrap();

        assert_eq!(graph.start_node_id(), "n1");
        assert_eq!(graph.start_node().kind, NodeKind::Message);
        assert_eq!(graph.nodes().len(), 3);

        let n1 = graph.node("n1").unwrap();
        assert_eq!(
            n1.connections[0].condition,
            Some(Condition::ButtonPayload("YES".to_string()))
        );
        assert_eq!(n1.connections[1].condition, None);

        let n2 = graph.node("n2").unwrap();
        assert_eq!(n2.param_str("inputType"), Some("email"));
        assert_eq!(n2.connections[0].condition, Some(Condition::InputValid(true)));

        assert_eq!(graph.node("n3").unwrap().param_str("tagName"), Some("lead"));
    }

    #[test]
    fn start_node_is_resolved_by_id_not_position() {
        let graph = FlowGraph::new(
            "second",
            vec![Node::new("first", "message"), Node::new("second", "wait")],
        )
        .unwrap();
        assert_eq!(graph.start_node().id, "second");
    }

    #[test]
    fn rejects_missing_start_node() {
        let err = FlowGraph::new("nope", vec![Node::new("n1", "message")]).unwrap_err();
        assert_eq!(err, GraphError::MissingStartNode("nope".to_string()));
    }

    #[test]
    fn rejects_dangling_connection() {
        let err = FlowGraph::new(
            "n1",
            vec![Node::new("n1", "message").connect(Connection::to("ghost"))],
        )
        .unwrap_err();
        assert_eq!(
            err,
            GraphError::DanglingConnection {
                node: "n1".to_string(),
                target: "ghost".to_string()
            }
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = FlowGraph::new(
            "n1",
            vec![Node::new("n1", "message"), Node::new("n1", "wait")],
        )
        .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("n1".to_string()));
    }

    #[test]
    fn unknown_types_and_conditions_still_parse() {
        let graph = FlowGraph::parse(
            r#"{"startNodeId": "a", "nodes": [
                {"id": "a", "type": "condition", "connections": [
                    {"targetNodeId": "a", "condition": {"type": "attribute_equals", "value": {"plan": "pro"}}}
                ]}
            ]}"#,
        )
        .unwrap();

        let a = graph.node("a").unwrap();
        assert_eq!(a.kind, NodeKind::Custom("condition".to_string()));
        assert!(matches!(
            a.connections[0].condition,
            Some(Condition::Unsupported { ref kind, .. }) if kind == "attribute_equals"
        ));
    }

    #[test]
    fn bad_condition_value_is_a_parse_error() {
        let err = FlowGraph::parse(
            r#"{"startNodeId": "a", "nodes": [
                {"id": "a", "type": "message", "connections": [
                    {"targetNodeId": "a", "condition": {"type": "input_valid", "value": 3}}
                ]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Parse(_)));
    }

    #[test]
    fn record_reparses_definition() {
        let graph = FlowGraph::parse(WELCOME).unwrap();
        let record = FlowRecord::from_graph(Uuid::new_v4(), "welcome", &graph).unwrap();
        assert!(record.definition.is_object());
        assert_eq!(record.definition["startNodeId"], "n1");
        let reparsed = record.graph().unwrap();
        assert_eq!(reparsed.definition(), graph.definition());
    }
}
