use serde::{Deserialize, Serialize};

use super::record::default_label;

/// What kind of media a request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
    Ultra,
}

/// An uploaded input image, already encoded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAsset {
    pub name: String,
    pub media_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

/// One output slot of a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSlot {
    /// Display label, e.g. "Floor Plan". Defaults to "Result N".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Per-slot prompt override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl BatchSlot {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            prompt: None,
        }
    }
}

/// Everything the submission backend needs for one generation call.
///
/// A request with more than one slot is submitted as a batch; each slot
/// becomes one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub project_id: String,
    pub prompt: String,
    pub kind: GenerationKind,
    #[serde(default)]
    pub quality: Quality,
    pub aspect_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputAsset>,
    /// How many input assets the tool requires. Checked locally.
    #[serde(skip)]
    pub min_inputs: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<BatchSlot>,
    /// Declared price of a single unit of work.
    #[serde(skip)]
    pub credits_per_unit: u64,
}

impl GenerationRequest {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>, kind: GenerationKind) -> Self {
        Self {
            project_id: project_id.into(),
            prompt: prompt.into(),
            kind,
            quality: Quality::default(),
            aspect_ratio: "16:9".to_string(),
            duration_secs: None,
            inputs: Vec::new(),
            min_inputs: 0,
            slots: Vec::new(),
            credits_per_unit: 0,
        }
    }

    pub fn with_slots(mut self, slots: Vec<BatchSlot>) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<InputAsset>, min_inputs: usize) -> Self {
        self.inputs = inputs;
        self.min_inputs = min_inputs;
        self
    }

    pub fn with_cost(mut self, credits_per_unit: u64) -> Self {
        self.credits_per_unit = credits_per_unit;
        self
    }

    pub fn is_batch(&self) -> bool {
        self.slots.len() > 1
    }

    /// Number of jobs this request produces.
    pub fn unit_count(&self) -> usize {
        self.slots.len().max(1)
    }

    pub fn total_cost(&self) -> u64 {
        self.credits_per_unit.saturating_mul(self.unit_count() as u64)
    }

    /// Labels for every unit, in slot order, known before anything is sent.
    pub fn labels(&self) -> Vec<String> {
        (0..self.unit_count())
            .map(|i| {
                self.slots
                    .get(i)
                    .and_then(|slot| slot.label.clone())
                    .unwrap_or_else(|| default_label(i))
            })
            .collect()
    }
}
