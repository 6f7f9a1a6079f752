//! Condition sets: ordered clauses evaluated first-match-wins
//!
//! Exactly one clause of an evaluated set is fulfilled: the first real clause
//! whose operation holds, or else the synthetic clause appended at the end.

mod operation;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use operation::{coerce_number, ConditionOperation, Operand};

/// How `value1`/`value2` are coerced before comparison
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    #[default]
    String,
    Number,
    Boolean,
}

/// One clause of a condition set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionClause {
    #[serde(rename = "type", default)]
    pub condition_type: ConditionType,

    #[serde(default)]
    pub value1: Value,

    pub operation: ConditionOperation,

    #[serde(default)]
    pub value2: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fulfilled: Option<bool>,
}

impl ConditionClause {
    pub fn new(
        condition_type: ConditionType,
        value1: impl Into<Value>,
        operation: ConditionOperation,
        value2: impl Into<Value>,
    ) -> Self {
        Self {
            condition_type,
            value1: value1.into(),
            operation,
            value2: value2.into(),
            is_fulfilled: None,
        }
    }

    /// The clause appended when nothing else matched
    pub fn synthetic_else() -> Self {
        Self::new(ConditionType::String, "", ConditionOperation::Equal, "")
    }

    /// Coerce both operands per the declared type and apply the operation
    pub fn holds(&self) -> bool {
        let left = Operand::coerce(self.condition_type, &self.value1);
        let right = Operand::coerce(self.condition_type, &self.value2);
        self.operation.apply(&left, &right)
    }
}

/// Ordered sequence of condition clauses
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ConditionSet(Vec<ConditionClause>);

/// Result of evaluating a condition set
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedConditions {
    /// All clauses plus the trailing else clause
    pub conditions: Vec<ConditionClause>,

    /// Index of the single fulfilled clause
    pub fulfilled_index: usize,
}

impl EvaluatedConditions {
    /// Whether the synthetic else clause was the one fulfilled
    pub fn is_else(&self) -> bool {
        self.fulfilled_index + 1 == self.conditions.len()
    }

    pub fn fulfilled(&self) -> &ConditionClause {
        &self.conditions[self.fulfilled_index]
    }
}

impl ConditionSet {
    pub fn new(clauses: Vec<ConditionClause>) -> Self {
        Self(clauses)
    }

    /// Parse from a node input: a JSON array or a JSON-encoded string
    pub fn from_input(input: &Value) -> Result<Self, serde_json::Error> {
        match input {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.clone()),
        }
    }

    pub fn clauses(&self) -> &[ConditionClause] {
        &self.0
    }

    pub fn clauses_mut(&mut self) -> &mut [ConditionClause] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluate left-to-right, stopping at the first clause that holds
    pub fn evaluate(self) -> EvaluatedConditions {
        let mut conditions = self.0;
        let mut fulfilled_index = None;

        for (index, clause) in conditions.iter_mut().enumerate() {
            if fulfilled_index.is_none() && clause.holds() {
                clause.is_fulfilled = Some(true);
                fulfilled_index = Some(index);
            } else {
                clause.is_fulfilled = Some(false);
            }
        }

        let mut else_clause = ConditionClause::synthetic_else();
        else_clause.is_fulfilled = Some(fulfilled_index.is_none());
        conditions.push(else_clause);

        let fulfilled_index = fulfilled_index.unwrap_or(conditions.len() - 1);

        EvaluatedConditions {
            conditions,
            fulfilled_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fulfilled_count(result: &EvaluatedConditions) -> usize {
        result
            .conditions
            .iter()
            .filter(|c| c.is_fulfilled == Some(true))
            .count()
    }

    #[test]
    fn test_number_larger_matches_first_clause() {
        let set = ConditionSet::new(vec![ConditionClause::new(
            ConditionType::Number,
            5,
            ConditionOperation::Larger,
            3,
        )]);

        let result = set.evaluate();

        assert_eq!(result.conditions.len(), 2);
        assert_eq!(result.conditions[0].is_fulfilled, Some(true));
        assert_eq!(result.conditions[1].is_fulfilled, Some(false));
        assert_eq!(result.fulfilled_index, 0);
        assert!(!result.is_else());
    }

    #[test]
    fn test_string_is_empty_matches() {
        let set = ConditionSet::new(vec![ConditionClause::new(
            ConditionType::String,
            "",
            ConditionOperation::IsEmpty,
            "",
        )]);

        let result = set.evaluate();
        assert_eq!(result.conditions[0].is_fulfilled, Some(true));
    }

    #[test]
    fn test_first_match_wins() {
        let set = ConditionSet::new(vec![
            ConditionClause::new(ConditionType::String, "abc", ConditionOperation::Equal, "x"),
            ConditionClause::new(ConditionType::String, "abc", ConditionOperation::Contains, "b"),
            ConditionClause::new(ConditionType::String, "abc", ConditionOperation::StartsWith, "a"),
        ]);

        let result = set.evaluate();

        assert_eq!(result.fulfilled_index, 1);
        assert_eq!(result.conditions[2].is_fulfilled, Some(false));
        assert_eq!(fulfilled_count(&result), 1);
    }

    #[test]
    fn test_else_when_nothing_matches() {
        let set = ConditionSet::new(vec![ConditionClause::new(
            ConditionType::Number,
            1,
            ConditionOperation::Larger,
            2,
        )]);

        let result = set.evaluate();

        assert!(result.is_else());
        assert_eq!(result.fulfilled().operation, ConditionOperation::Equal);
        assert_eq!(fulfilled_count(&result), 1);
    }

    #[test]
    fn test_empty_set_fulfils_else() {
        let result = ConditionSet::default().evaluate();
        assert_eq!(result.conditions.len(), 1);
        assert_eq!(result.fulfilled_index, 0);
        assert!(result.is_else());
    }

    #[test]
    fn test_exactly_one_fulfilled_across_mixed_sets() {
        let values = [json!(""), json!("x"), json!(null), json!(7), json!("7"), json!("abc")];
        let operations = [
            ConditionOperation::Equal,
            ConditionOperation::NotEqual,
            ConditionOperation::IsEmpty,
            ConditionOperation::NotEmpty,
            ConditionOperation::Larger,
            ConditionOperation::Regex,
        ];

        for (i, v1) in values.iter().enumerate() {
            for (j, op) in operations.iter().enumerate() {
                let set = ConditionSet::new(vec![
                    ConditionClause::new(ConditionType::String, v1.clone(), *op, values[j].clone()),
                    ConditionClause::new(
                        ConditionType::Number,
                        values[(i + 1) % values.len()].clone(),
                        *op,
                        v1.clone(),
                    ),
                ]);
                let result = set.evaluate();
                assert_eq!(fulfilled_count(&result), 1);

                let expected = result
                    .conditions
                    .iter()
                    .take(result.conditions.len() - 1)
                    .position(|c| c.holds())
                    .unwrap_or(result.conditions.len() - 1);
                assert_eq!(result.fulfilled_index, expected);
            }
        }
    }

    #[test]
    fn test_parse_from_string_input() {
        let input = json!(r#"[{"type":"number","value1":"10","operation":"smallerEqual","value2":10}]"#);
        let set = ConditionSet::from_input(&input).unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.clauses()[0].condition_type, ConditionType::Number);
        assert!(set.evaluate().conditions[0].is_fulfilled == Some(true));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(ConditionSet::from_input(&json!("not json")).is_err());
        assert!(ConditionSet::from_input(&json!([{"type": "string"}])).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let result = ConditionSet::new(vec![ConditionClause::new(
            ConditionType::Boolean,
            true,
            ConditionOperation::Equal,
            true,
        )])
        .evaluate();

        let json = serde_json::to_value(&result.conditions).unwrap();
        assert_eq!(json[0]["type"], json!("boolean"));
        assert_eq!(json[0]["isFulfilled"], json!(true));
        assert_eq!(json[1]["operation"], json!("equal"));
    }
}
