use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of node kinds the runtime can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "startAgentflow")]
    Start,
    #[serde(rename = "conditionAgentflow")]
    Condition,
    #[serde(rename = "customFunctionAgentflow")]
    CustomFunction,
    #[serde(rename = "executeFlowAgentflow")]
    ExecuteFlow,
    #[serde(rename = "httpAgentflow")]
    Http,
    #[serde(rename = "llmAgentflow")]
    Llm,
    #[serde(rename = "directReplyAgentflow")]
    DirectReply,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        Self::Start,
        Self::Condition,
        Self::CustomFunction,
        Self::ExecuteFlow,
        Self::Http,
        Self::Llm,
        Self::DirectReply,
    ];

    /// Stable wire name used in flow definitions
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "startAgentflow",
            Self::Condition => "conditionAgentflow",
            Self::CustomFunction => "customFunctionAgentflow",
            Self::ExecuteFlow => "executeFlowAgentflow",
            Self::Http => "httpAgentflow",
            Self::Llm => "llmAgentflow",
            Self::DirectReply => "directReplyAgentflow",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Condition => "Condition",
            Self::CustomFunction => "Custom Function",
            Self::ExecuteFlow => "Execute Flow",
            Self::Http => "HTTP",
            Self::Llm => "LLM",
            Self::DirectReply => "Direct Reply",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("Unknown node type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.name().parse::<NodeKind>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.name().to_string())
            );
        }
        assert!("toolAgentflow".parse::<NodeKind>().is_err());
    }
}
