use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::graph::{GraphDocument, GraphEdge, GraphNode};
use crate::PlanError;

/// Value object: Patient ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatientId(pub i64);

impl PatientId {
    /// Create a patient id, rejecting zero and negative values
    pub fn new(raw: i64) -> Result<Self, PlanError> {
        if raw <= 0 {
            return Err(PlanError::Validation(format!(
                "patient id must be positive, got {}",
                raw
            )));
        }
        Ok(Self(raw))
    }

    /// Raw numeric value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl FromStr for PatientId {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|_| PlanError::Validation(format!("patient id '{}' is not a number", s)))?;
        Self::new(raw)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value object: Plan ID (storage assigned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub i64);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored treatment plan: at most one per patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    /// Storage id
    pub id: PlanId,

    /// Owning patient
    pub patient_id: PatientId,

    /// Graph nodes
    pub nodes: Vec<GraphNode>,

    /// Graph edges
    pub edges: Vec<GraphEdge>,

    /// Set on first insert
    pub created_at: DateTime<Utc>,

    /// Refreshed on every save
    pub updated_at: DateTime<Utc>,
}

impl TreatmentPlan {
    /// Assemble a plan from a stored row
    pub fn new(
        id: PlanId,
        patient_id: PatientId,
        document: GraphDocument,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id,
            nodes: document.nodes,
            edges: document.edges,
            created_at,
            updated_at,
        }
    }

    /// Graph document of this plan
    pub fn document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Consume the plan, keeping only its graph
    pub fn into_document(self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{GraphNode, Position};
    use serde_json::json;

    #[test]
    fn test_patient_id_rejects_non_positive() {
        assert!(PatientId::new(0).is_err());
        assert!(PatientId::new(-4).is_err());
        assert_eq!(PatientId::new(12).unwrap().get(), 12);
    }

    #[test]
    fn test_patient_id_parse() {
        assert_eq!(" 7 ".parse::<PatientId>().unwrap(), PatientId(7));
        assert!(matches!(
            "abc".parse::<PatientId>(),
            Err(PlanError::Validation(_))
        ));
        assert!("0".parse::<PatientId>().is_err());
    }

    #[test]
    fn test_plan_wire_shape() {
        let now = Utc::now();
        let doc = GraphDocument {
            nodes: vec![GraphNode::new("1", "Diagnosis", "#ffcce6", Position::new(1.0, 2.0))],
            edges: vec![],
        };
        let plan = TreatmentPlan::new(PlanId(3), PatientId(42), doc.clone(), now, now);

        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["id"], json!(3));
        assert_eq!(value["patient_id"], json!(42));
        assert_eq!(value["nodes"][0]["type"], json!("custom"));
        assert!(value.get("created_at").is_some());
        assert!(value.get("updated_at").is_some());

        let decoded: TreatmentPlan = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.document(), doc);
        assert_eq!(decoded.into_document(), doc);
    }
}
