//! Record types shared by the aggregates.

use drillbit_client::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stored environment: a name plus one foreign key per forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub id: ObjectId,
    pub name: String,
    pub block_schedule: ObjectId,
    pub bitcoin_price: ObjectId,
    pub transaction_fees: ObjectId,
    pub hash_rate: ObjectId,
}

/// A time-series forecast (block schedule, price, fee or hash rate).
///
/// Only the fields the lock gate reads are typed; the series itself rides
/// along in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub id: ObjectId,
    /// Block schedule this forecast was generated against. Absent on the
    /// block schedule itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<ObjectId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A mining project definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Stored project group header (membership lives on the aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroupRecord {
    pub id: ObjectId,
    pub name: String,
}

/// Anything with a primary key.
pub trait HasId {
    fn id(&self) -> ObjectId;
}

impl HasId for ForecastRecord {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl HasId for ProjectRecord {
    fn id(&self) -> ObjectId {
        self.id
    }
}

impl HasId for EnvironmentRecord {
    fn id(&self) -> ObjectId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_forecast_keeps_extra_fields() {
        let record: ForecastRecord = serde_json::from_value(json!({
            "id": 4,
            "blocks": 1,
            "model": "GBM",
            "initial": 60000.0
        }))
        .unwrap();

        assert_eq!(record.blocks, Some(1));
        assert_eq!(record.fields["model"], "GBM");
        assert_eq!(serde_json::to_value(&record).unwrap()["initial"], 60000.0);
    }

    #[test]
    fn test_forecast_rejects_string_foreign_key() {
        let result: Result<ForecastRecord, _> =
            serde_json::from_value(json!({"id": 4, "blocks": "1"}));
        assert!(result.is_err());
    }
}
