//! Type definitions for webhook payloads and record backend resources.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON:API resource type of parent and child records.
pub const RECORD_RESOURCE_TYPE: &str = "records";

// =========================================================================
// Inbound webhook
// =========================================================================

/// Change notification received on the webhook endpoint.
///
/// Any field other than `parent_id` is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    parent_id: Option<RawParentId>,
}

/// `parent_id` as it may appear on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawParentId {
    Text(String),
    Number(serde_json::Number),
}

impl WebhookEvent {
    /// Normalized parent identifier; `None` when absent, null or blank.
    #[must_use]
    pub fn parent_id(&self) -> Option<ParentId> {
        match self.parent_id.as_ref()? {
            RawParentId::Text(s) if s.trim().is_empty() => None,
            RawParentId::Text(s) => Some(ParentId(s.trim().to_string())),
            RawParentId::Number(n) => Some(ParentId(n.to_string())),
        }
    }
}

/// Identifier of a parent record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id contains characters that cannot appear in a query literal.
    #[must_use]
    pub fn has_control_chars(&self) -> bool {
        self.0.chars().any(char::is_control)
    }
}

impl fmt::Display for ParentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =========================================================================
// Work order categories
// =========================================================================

/// Child work order category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Maintenance,
    Calibration,
    Requalification,
}

impl Category {
    /// All categories, in the order they are searched and reported.
    pub const ALL: [Self; 3] = [Self::Maintenance, Self::Calibration, Self::Requalification];

    /// `pkey` tag identifying child records of this category.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Maintenance => "MNT",
            Self::Calibration => "CAL",
            Self::Requalification => "RQ",
        }
    }

    /// Due-date attribute carried by child records and the parent.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Maintenance => "cf_next_pm_due_date",
            Self::Calibration => "cf_next_calibration_due",
            Self::Requalification => "cf_next_requalification",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Maintenance => "maintenance",
            Self::Calibration => "calibration",
            Self::Requalification => "requalification",
        };
        f.write_str(name)
    }
}

// =========================================================================
// Record backend payloads
// =========================================================================

/// Body of a `/records/search` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub aql: String,
}

/// Body of a `/records/search` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    data: Option<Vec<RecordResource>>,
}

impl SearchResponse {
    /// Returned records; empty when the backend omitted `data`.
    #[must_use]
    pub fn records(&self) -> &[RecordResource] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// A child record as returned by the search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordResource {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RecordResource {
    /// String value of an attribute, if present and a string.
    #[must_use]
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Reduced due date per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DueDates {
    pub maintenance: Option<String>,
    pub calibration: Option<String>,
    pub requalification: Option<String>,
}

impl DueDates {
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&str> {
        match category {
            Category::Maintenance => self.maintenance.as_deref(),
            Category::Calibration => self.calibration.as_deref(),
            Category::Requalification => self.requalification.as_deref(),
        }
    }

    pub fn set(&mut self, category: Category, date: Option<String>) {
        match category {
            Category::Maintenance => self.maintenance = date,
            Category::Calibration => self.calibration = date,
            Category::Requalification => self.requalification = date,
        }
    }
}

/// Partial update of a parent record's due-date attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentUpdate {
    data: UpdateResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct UpdateResource {
    #[serde(rename = "type")]
    resource_type: &'static str,
    id: ParentId,
    attributes: Map<String, Value>,
}

impl ParentUpdate {
    /// Sparse patch: only categories with a date are included.
    #[must_use]
    pub fn sparse(parent_id: &ParentId, dates: &DueDates) -> Self {
        let attributes = Category::ALL
            .into_iter()
            .filter_map(|c| {
                dates
                    .get(c)
                    .map(|d| (c.field().to_string(), Value::String(d.to_string())))
            })
            .collect();
        Self::with_attributes(parent_id, attributes)
    }

    /// Full patch: every category is included, absent dates as `""`.
    #[must_use]
    pub fn full(parent_id: &ParentId, dates: &DueDates) -> Self {
        let attributes = Category::ALL
            .into_iter()
            .map(|c| {
                (
                    c.field().to_string(),
                    Value::String(dates.get(c).unwrap_or_default().to_string()),
                )
            })
            .collect();
        Self::with_attributes(parent_id, attributes)
    }

    fn with_attributes(parent_id: &ParentId, attributes: Map<String, Value>) -> Self {
        Self {
            data: UpdateResource {
                resource_type: RECORD_RESOURCE_TYPE,
                id: parent_id.clone(),
                attributes,
            },
        }
    }

    #[must_use]
    pub fn parent_id(&self) -> &ParentId {
        &self.data.id
    }

    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.data.attributes
    }
}

// =========================================================================
// Outbound webhook response
// =========================================================================

/// Success body returned to the webhook caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub message: String,
    pub updated_parent_id: ParentId,
    pub nearest_maintenance_date: Option<String>,
    pub nearest_calibration_date: Option<String>,
    pub nearest_requalification_date: Option<String>,
}

impl ReconcileSummary {
    #[must_use]
    pub fn new(parent_id: ParentId, dates: DueDates) -> Self {
        Self {
            message: "Webhook event processed successfully".to_string(),
            updated_parent_id: parent_id,
            nearest_maintenance_date: dates.maintenance,
            nearest_calibration_date: dates.calibration,
            nearest_requalification_date: dates.requalification,
        }
    }
}
