//! Decoded protocol-control messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::frame::RawFrame;

/// One node of the opaque decoded payload tree.
///
/// The decoder adapter renders protocol structure into nested field/value
/// nodes; the engine stores and forwards them without interpretation. `raw`
/// holds the bit substring the node was decoded from, as the adapter rendered
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadNode {
    pub field: String,
    pub raw: String,
    pub value: PayloadValue,
}

/// Value of a payload node: a rendered scalar or a group of child nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadValue {
    Scalar(String),
    Group(Vec<PayloadNode>),
}

impl PayloadNode {
    /// Build a leaf node.
    pub fn scalar(
        field: impl Into<String>,
        raw: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self { field: field.into(), raw: raw.into(), value: PayloadValue::Scalar(value.into()) }
    }

    /// Build a group node.
    pub fn group(field: impl Into<String>, raw: impl Into<String>, children: Vec<PayloadNode>) -> Self {
        Self { field: field.into(), raw: raw.into(), value: PayloadValue::Group(children) }
    }

    /// Render the tree as indented text, one `field: value` line per node.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        self.render_into(0, &mut out);
        out
    }

    fn render_into(&self, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("    ");
        }
        match &self.value {
            PayloadValue::Scalar(value) => {
                out.push_str(&format!("{}: {}\n", self.field, value));
            }
            PayloadValue::Group(children) => {
                out.push_str(&format!("{}:\n", self.field));
                for child in children {
                    child.render_into(depth + 1, out);
                }
            }
        }
    }
}

/// A fully decoded Power Delivery control message.
///
/// Header fields are decoder-rendered strings; revision and the role fields
/// are optional because some message variants omit them. Immutable once
/// constructed, shared as `Arc` between the log, the decode context, and the
/// quick-status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub timestamp: DateTime<Utc>,
    /// Start-of-Packet identifier (`SOP`, `SOP'`, ...).
    pub sop: String,
    pub revision: Option<String>,
    pub power_role: Option<String>,
    pub data_role: Option<String>,
    pub message_type: String,
    pub payload: PayloadNode,
    pub raw: RawFrame,
}

impl DecodedMessage {
    /// Uppercase hex rendering of the raw frame, for export records.
    pub fn raw_hex(&self) -> String {
        self.raw.to_hex()
    }

    /// Rendered textual form of the decoded tree, for export records.
    pub fn render_text(&self) -> String {
        self.payload.render_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_text_indents_nested_groups() {
        let tree = PayloadNode::group(
            "Message Header",
            "0001",
            vec![
                PayloadNode::scalar("Message Type", "00001", "GoodCRC"),
                PayloadNode::group(
                    "Objects",
                    "1111",
                    vec![PayloadNode::scalar("PDO 1", "101", "5.00V 3.00A")],
                ),
            ],
        );

        let text = tree.render_text();
        assert_eq!(
            text,
            "Message Header:\n    Message Type: GoodCRC\n    Objects:\n        PDO 1: 5.00V 3.00A\n"
        );
    }
}
