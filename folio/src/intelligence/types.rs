use serde::{Deserialize, Serialize};

use crate::models::{EntityMetadata, MetadataValue};

/// One entity as proposed by the reasoning service, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposedEntity {
    /// Local handle that proposed relationships point at.
    #[serde(rename = "ref", alias = "id", default)]
    pub reference: String,
    #[serde(rename = "type", alias = "entity_type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ProposedEntity {
    /// Typed metadata; values that do not fit are dropped.
    pub fn typed_metadata(&self) -> EntityMetadata {
        self.metadata
            .iter()
            .filter_map(|(key, value)| MetadataValue::from_json(value).map(|v| (key.clone(), v)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposedRelationship {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(rename = "type", alias = "relationship_type", default)]
    pub relationship_type: String,
    #[serde(default)]
    pub strength: Option<f32>,
}

/// Everything the reasoning service proposed for one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionProposal {
    #[serde(default)]
    pub entities: Vec<ProposedEntity>,
    #[serde(default)]
    pub relationships: Vec<ProposedRelationship>,
}

impl ExtractionProposal {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Similarity band a candidate fell into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Strong,
    Moderate,
    Weak,
}

/// Which stored record to run relationship detection for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DetectionTarget {
    Memory(String),
    Note(String),
    Document(String),
}

impl DetectionTarget {
    pub fn id(&self) -> &str {
        match self {
            DetectionTarget::Memory(id)
            | DetectionTarget::Note(id)
            | DetectionTarget::Document(id) => id,
        }
    }
}

/// Counts from one detection pass. `created` only counts rows that did not
/// already exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub scanned: u32,
    pub created: u32,
    pub strong: u32,
    pub moderate: u32,
    pub weak: u32,
}

impl DetectionReport {
    pub fn record(&mut self, band: Band) {
        self.created += 1;
        match band {
            Band::Strong => self.strong += 1,
            Band::Moderate => self.moderate += 1,
            Band::Weak => self.weak += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn proposal_tolerates_missing_sections() {
        let proposal: ExtractionProposal = serde_json::from_value(json!({
            "entities": [{"ref": "e1", "type": "concept", "text": "Entropy"}]
        }))
        .unwrap();
        assert_eq!(proposal.entities.len(), 1);
        assert!(proposal.relationships.is_empty());
        assert_eq!(proposal.entities[0].reference, "e1");
    }

    #[test]
    fn typed_metadata_drops_nested_objects() {
        let entity: ProposedEntity = serde_json::from_value(json!({
            "ref": "e1",
            "type": "reference",
            "text": "Chapter 3",
            "metadata": {"page": 42, "source": "Book", "nested": {"x": 1}}
        }))
        .unwrap();

        let metadata = entity.typed_metadata();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata["page"].as_number(), Some(42.0));
    }

    #[test]
    fn detection_target_wire_form() {
        let target: DetectionTarget =
            serde_json::from_value(json!({"kind": "note", "id": "n1"})).unwrap();
        assert_eq!(target, DetectionTarget::Note("n1".into()));
        assert_eq!(target.id(), "n1");
    }

    #[test]
    fn report_counts_bands() {
        let mut report = DetectionReport::default();
        report.record(Band::Strong);
        report.record(Band::Weak);
        report.record(Band::Weak);
        assert_eq!(report.created, 3);
        assert_eq!((report.strong, report.moderate, report.weak), (1, 0, 2));
    }
}
