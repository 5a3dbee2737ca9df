//! The structured-output contract for waste classification: the prompt, the schema
//! the hosted model is held to, and the validation that turns its JSON into a
//! [`ClassificationResult`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::error::ServiceError;

pub const CLASSIFICATION_PROMPT: &str = "Identifikasi sampah dalam gambar ini. Tentukan apakah ini Organik atau Anorganik. \
Berikan saran pembuangan yang spesifik untuk konteks desa wisata di Indonesia (Pulau Untung Jawa). \
Jawab dalam format JSON.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WasteCategory {
    #[serde(rename = "Organik")]
    Organic,
    #[serde(rename = "Anorganik")]
    Inorganic,
    #[serde(rename = "Tidak Diketahui")]
    Uncertain,
}

impl WasteCategory {
    pub const LABELS: [&'static str; 3] = ["Organik", "Anorganik", "Tidak Diketahui"];

    pub fn label(self) -> &'static str {
        match self {
            WasteCategory::Organic => "Organik",
            WasteCategory::Inorganic => "Anorganik",
            WasteCategory::Uncertain => "Tidak Diketahui",
        }
    }

    /// Accepts the wire labels plus their English names.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "organik" | "organic" => Some(WasteCategory::Organic),
            "anorganik" | "inorganic" => Some(WasteCategory::Inorganic),
            "tidak diketahui" | "uncertain" | "unknown" => Some(WasteCategory::Uncertain),
            _ => None,
        }
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecyclingPotential {
    #[serde(rename = "Tinggi")]
    High,
    #[serde(rename = "Sedang")]
    Medium,
    #[serde(rename = "Rendah")]
    Low,
    #[serde(rename = "Tidak Ada")]
    None,
}

impl RecyclingPotential {
    pub const LABELS: [&'static str; 4] = ["Tinggi", "Sedang", "Rendah", "Tidak Ada"];

    pub fn label(self) -> &'static str {
        match self {
            RecyclingPotential::High => "Tinggi",
            RecyclingPotential::Medium => "Sedang",
            RecyclingPotential::Low => "Rendah",
            RecyclingPotential::None => "Tidak Ada",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "tinggi" | "high" => Some(RecyclingPotential::High),
            "sedang" | "medium" => Some(RecyclingPotential::Medium),
            "rendah" | "low" => Some(RecyclingPotential::Low),
            "tidak ada" | "none" => Some(RecyclingPotential::None),
            _ => None,
        }
    }
}

impl fmt::Display for RecyclingPotential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The model's judgment on one photographed item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub item_name: String,
    pub category: WasteCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub explanation: String,
    pub disposal_advice: Vec<String>,
    pub recycling_potential: RecyclingPotential,
}

/// Response schema sent with every classification request.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "itemName": {
                "type": "STRING",
                "description": "Nama benda sampah yang teridentifikasi dalam bahasa Indonesia."
            },
            "category": {
                "type": "STRING",
                "enum": WasteCategory::LABELS,
                "description": "Kategori utama sampah."
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Tingkat keyakinan AI antara 0.0 hingga 1.0."
            },
            "explanation": {
                "type": "STRING",
                "description": "Penjelasan singkat mengapa benda tersebut masuk ke dalam kategori tersebut."
            },
            "disposalAdvice": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Daftar langkah-langkah cara membuang atau mengolah sampah ini dengan benar."
            },
            "recyclingPotential": {
                "type": "STRING",
                "enum": RecyclingPotential::LABELS,
                "description": "Potensi daur ulang sampah tersebut."
            }
        },
        "required": ["itemName", "category", "explanation", "disposalAdvice", "recyclingPotential"]
    })
}

// Every field optional so a missing one is reported by name instead of as a serde error.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct RawClassification {
    item_name: Option<String>,
    category: Option<String>,
    confidence: Option<f64>,
    explanation: Option<String>,
    disposal_advice: Option<Vec<String>>,
    recycling_potential: Option<String>,
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, ServiceError> {
    let value = value.ok_or(ServiceError::MissingField(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl TryFrom<RawClassification> for ClassificationResult {
    type Error = ServiceError;

    fn try_from(raw: RawClassification) -> Result<Self, Self::Error> {
        let item_name = required_text(raw.item_name, "itemName")?;

        let category_label = raw.category.ok_or(ServiceError::MissingField("category"))?;
        let category = WasteCategory::parse(&category_label).ok_or_else(|| ServiceError::InvalidField {
            field: "category",
            reason: format!("unknown category `{}`", category_label),
        })?;

        let explanation = required_text(raw.explanation, "explanation")?;

        let disposal_advice: Vec<String> = raw
            .disposal_advice
            .ok_or(ServiceError::MissingField("disposalAdvice"))?
            .into_iter()
            .map(|step| step.trim().to_string())
            .filter(|step| !step.is_empty())
            .collect();
        if disposal_advice.is_empty() {
            return Err(ServiceError::InvalidField {
                field: "disposalAdvice",
                reason: "must list at least one step".to_string(),
            });
        }

        let potential_label = raw
            .recycling_potential
            .ok_or(ServiceError::MissingField("recyclingPotential"))?;
        let recycling_potential =
            RecyclingPotential::parse(&potential_label).ok_or_else(|| ServiceError::InvalidField {
                field: "recyclingPotential",
                reason: format!("unknown recycling potential `{}`", potential_label),
            })?;

        if let Some(confidence) = raw.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ServiceError::InvalidField {
                    field: "confidence",
                    reason: format!("{} is outside 0.0..=1.0", confidence),
                });
            }
        }

        Ok(ClassificationResult {
            item_name,
            category,
            confidence: raw.confidence,
            explanation,
            disposal_advice,
            recycling_potential,
        })
    }
}

/// Parse and validate the model's reply text. Never yields a partial result.
pub fn parse_classification(text: &str) -> Result<ClassificationResult, ServiceError> {
    let raw: RawClassification = serde_json::from_str(strip_code_fence(text))?;
    ClassificationResult::try_from(raw)
}

// Some models wrap JSON in ```json fences even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
