//! Condition node: first-match-wins branching over a condition set

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::services::NodeServices;
use crate::domain::condition::ConditionSet;
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::variable::VariableResolver;

pub const CONDITIONS: &str = "conditions";

/// Evaluates clauses in order and reports which branch was taken
#[derive(Debug, Clone)]
pub struct ConditionNode {
    services: NodeServices,
}

impl ConditionNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    fn parse_conditions(data: &NodeData) -> Result<ConditionSet, NodeError> {
        match data.input(CONDITIONS) {
            Some(value) => {
                ConditionSet::from_input(value).map_err(|e| NodeError::parse(CONDITIONS, e))
            }
            None => Ok(ConditionSet::default()),
        }
    }
}

#[async_trait]
impl FlowNode for ConditionNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Condition
    }

    fn description(&self) -> &'static str {
        "Split flows based on If Else conditions"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(CONDITIONS, "Conditions", InputType::Array)
                .optional()
                .accept_variable()
                .with_description("Values to compare"),
        ]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let mut conditions = Self::parse_conditions(data)?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        for clause in conditions.clauses_mut() {
            clause.value1 = resolver.resolve_value(&clause.value1);
            clause.value2 = resolver.resolve_value(&clause.value2);
        }

        let resolved = conditions.clone();
        let evaluated = conditions.evaluate();

        debug!(
            node_id = %data.id,
            fulfilled = evaluated.fulfilled_index,
            is_else = evaluated.is_else(),
            "Conditions evaluated"
        );

        Ok(NodeOutputEnvelope::new(
            data,
            json!({ CONDITIONS: resolved }),
            options.state().clone(),
        )
        .with_output(json!({ CONDITIONS: evaluated.conditions })))
    }
}
