//! Sync engine: transforms incoming PIM product payloads into the
//! denormalized records the graph engine consumes.
//!
//! Relationship fields are discovered dynamically via the classifier; a
//! SHA-256 checksum over the canonical payload values skips unchanged
//! products.

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::graph::classify;
use crate::store::{ProductRecord, ProductStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Product payload as delivered by the PIM source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PimProduct {
    pub id: i64,
    pub sku: String,
    /// 1 = active, anything else = inactive.
    pub status: i64,
    #[serde(rename = "type")]
    pub product_type: Option<String>,
    #[serde(default)]
    pub values: PimValues,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PimValues {
    #[serde(default)]
    pub common: serde_json::Map<String, Value>,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Notification payload for the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
}

/// Result of syncing one product.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Stored checksum matched; nothing written.
    Unchanged(String),
    /// Record transformed and upserted.
    Updated(Box<ProductRecord>),
}

pub struct SyncEngine {
    store: ProductStore,
    classifier: ClassifierConfig,
}

impl SyncEngine {
    pub fn new(store: ProductStore, classifier: ClassifierConfig) -> Self {
        Self { store, classifier }
    }

    /// Transform and upsert one PIM product. Products whose values hash to
    /// the stored checksum are skipped.
    pub async fn sync_product(&self, payload: PimProduct) -> Result<SyncOutcome> {
        log::info!("Syncing product: {}", payload.sku);

        let checksum = values_checksum(&payload.values);

        if let Some(existing) = self.store.checksum(&payload.sku).await? {
            if existing == checksum {
                log::info!("Product {} unchanged, skipping", payload.sku);
                return Ok(SyncOutcome::Unchanged(payload.sku));
            }
        }

        let record = transform_product(&self.classifier, payload, checksum)?;
        self.store.upsert(record.clone()).await?;

        log::info!("Product {} synced successfully", record.sku);
        Ok(SyncOutcome::Updated(Box::new(record)))
    }
}

/// Transform a PIM payload into a stored record: classify fields, map
/// status, generate the display title.
pub fn transform_product(
    classifier: &ClassifierConfig,
    payload: PimProduct,
    checksum: String,
) -> Result<ProductRecord> {
    let (attributes, relationships) = classify::split_fields(classifier, &payload.values.common);

    let status = if payload.status == 1 { "active" } else { "inactive" };
    let title = generate_title(&payload.sku, &attributes);

    Ok(ProductRecord {
        sku: payload.sku,
        pim_id: Some(payload.id),
        status: status.to_string(),
        product_type: payload.product_type,
        title,
        attributes,
        relationships,
        categories: payload.values.categories,
        checksum,
        created_at: parse_pim_timestamp(payload.created_at.as_deref()),
        updated_at: parse_pim_timestamp(payload.updated_at.as_deref()),
        synced_at: Utc::now(),
    })
}

/// SHA-256 over the canonical (sorted-key) JSON of the payload values.
pub fn values_checksum(values: &PimValues) -> String {
    let canonical = canonicalize(&serde_json::json!({
        "common": values.common,
        "categories": values.categories,
    }));
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Rebuild a value with all object keys sorted, so serialization order
/// never changes the checksum.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Human-readable title: meter model or software type suffix, SKU fallback.
fn generate_title(sku: &str, attributes: &serde_json::Map<String, Value>) -> String {
    if let Some(Value::String(model)) = attributes.get("modelo_medidor") {
        return format!("{} - {}", sku, model);
    }
    if let Some(Value::String(kind)) = attributes.get("tipo_software") {
        return format!("{} - {}", sku, kind.to_uppercase());
    }
    sku.to_string()
}

fn parse_pim_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = value?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::test_store;
    use serde_json::json;

    fn pim_product(sku: &str, common: Value) -> PimProduct {
        PimProduct {
            id: 7,
            sku: sku.to_string(),
            status: 1,
            product_type: Some("simple".to_string()),
            values: PimValues {
                common: common.as_object().cloned().unwrap_or_default(),
                categories: vec!["medidores".to_string()],
            },
            created_at: Some("2025-03-01T10:00:00+00:00".to_string()),
            updated_at: Some("2025-03-02T10:00:00+00:00".to_string()),
        }
    }

    #[test]
    fn test_transform_classifies_fields() {
        let payload = pim_product(
            "med_01",
            json!({
                "protocolo": "abnt,modbus",
                "modelo_medidor": "E750",
                "tensao": "220V"
            }),
        );
        let record =
            transform_product(&ClassifierConfig::default(), payload, "x".to_string()).unwrap();

        assert_eq!(record.status, "active");
        assert_eq!(record.title, "med_01 - E750");
        assert_eq!(
            record.relationships.get("protocolo"),
            Some(&vec!["abnt".to_string(), "modbus".to_string()])
        );
        assert_eq!(record.attributes.get("tensao"), Some(&json!("220V")));
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_transform_inactive_status() {
        let mut payload = pim_product("med_01", json!({}));
        payload.status = 0;
        let record =
            transform_product(&ClassifierConfig::default(), payload, "x".to_string()).unwrap();
        assert_eq!(record.status, "inactive");
    }

    #[test]
    fn test_title_software_fallbacks() {
        let payload = pim_product("soft_01", json!({"tipo_software": "scada"}));
        let record =
            transform_product(&ClassifierConfig::default(), payload, "x".to_string()).unwrap();
        assert_eq!(record.title, "soft_01 - SCADA");

        let bare = pim_product("plain_01", json!({}));
        let record =
            transform_product(&ClassifierConfig::default(), bare, "x".to_string()).unwrap();
        assert_eq!(record.title, "plain_01");
    }

    #[test]
    fn test_checksum_ignores_key_order() {
        let a = PimValues {
            common: json!({"b": 1, "a": 2}).as_object().cloned().unwrap(),
            categories: vec![],
        };
        let b = PimValues {
            common: json!({"a": 2, "b": 1}).as_object().cloned().unwrap(),
            categories: vec![],
        };
        assert_eq!(values_checksum(&a), values_checksum(&b));
    }

    #[test]
    fn test_checksum_changes_with_values() {
        let a = PimValues {
            common: json!({"a": 1}).as_object().cloned().unwrap(),
            categories: vec![],
        };
        let b = PimValues {
            common: json!({"a": 2}).as_object().cloned().unwrap(),
            categories: vec![],
        };
        assert_ne!(values_checksum(&a), values_checksum(&b));
    }

    #[tokio::test]
    async fn test_sync_writes_then_skips_unchanged() {
        let (store, _temp) = test_store().await;
        let engine = SyncEngine::new(store.clone(), ClassifierConfig::default());

        let payload = pim_product("med_01", json!({"protocolo": "abnt"}));

        let first = engine.sync_product(payload.clone()).await.unwrap();
        assert!(matches!(first, SyncOutcome::Updated(_)));
        assert_eq!(store.count(None).await.unwrap(), 1);

        let second = engine.sync_product(payload.clone()).await.unwrap();
        assert!(matches!(second, SyncOutcome::Unchanged(_)));

        // Changed values write again
        let mut changed = payload;
        changed
            .values
            .common
            .insert("protocolo".to_string(), json!("abnt,modbus"));
        let third = engine.sync_product(changed).await.unwrap();
        match third {
            SyncOutcome::Updated(record) => {
                assert_eq!(record.relationship_count(), 2);
            }
            SyncOutcome::Unchanged(_) => panic!("expected update"),
        }
    }
}
