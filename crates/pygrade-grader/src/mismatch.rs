//! The first divergence between a submission and a solution.

use pygrade_types::node::NodeRef;
use pygrade_types::BindError;
use serde::{Deserialize, Serialize};

use crate::format::{describe, format_node};

/// What kind of divergence was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MismatchKind {
    /// The solution has a node where the submission has none.
    Missing,
    /// The submission has a node where the solution has none.
    Unexpected,
    WrongValue,
    /// Both sides have a node, of different kinds.
    WrongType,
    /// The submission's call cannot bind to its callee's parameters.
    MalformedCall { error: BindError },
}

/// A node as it appears in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    /// Node kind, e.g. `Int` or `Call`.
    pub kind: String,
    /// Prose kind, e.g. "a number".
    pub description: String,
    pub text: String,
}

impl Rendered {
    pub fn node(node: NodeRef<'_>) -> Self {
        Self {
            kind: node.kind().to_string(),
            description: describe(node).to_string(),
            text: format_node(node),
        }
    }

    /// A rendering that is not backed by a single node, such as a
    /// normalized `name=value` argument.
    pub fn text(kind: &str, description: &str, text: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
            text: text.into(),
        }
    }
}

/// One divergence, with what is needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MismatchRecord {
    #[serde(flatten)]
    pub kind: MismatchKind,
    pub submission: Option<Rendered>,
    pub solution: Option<Rendered>,
    /// Line in the submission the divergence is reported at.
    pub line: Option<u32>,
    pub solution_line: Option<u32>,
    /// Nearest enclosing call, rendered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl MismatchRecord {
    /// Submission text, or an empty string when the submission side is absent.
    pub fn submission_text(&self) -> &str {
        self.submission.as_ref().map_or("", |r| r.text.as_str())
    }

    pub fn solution_text(&self) -> &str {
        self.solution.as_ref().map_or("", |r| r.text.as_str())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
