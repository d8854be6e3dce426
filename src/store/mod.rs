//! Product store: synchronized PIM records persisted in SQLite.
//!
//! The graph facade consumes this through two calls: all active products
//! and single-product lookup by SKU. The REST layer adds filtered listing
//! and category aggregation on top of the same table.

use crate::db::Db;
use crate::error::{EcographError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A synchronized product record. Immutable from the graph engine's
/// perspective; written only by the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: String,
    pub pim_id: Option<i64>,
    pub status: String,
    pub product_type: Option<String>,
    pub title: String,
    /// Scalar attributes, name -> raw value.
    pub attributes: serde_json::Map<String, Value>,
    /// Relationship field name -> ordered list of target identifiers.
    pub relationships: BTreeMap<String, Vec<String>>,
    pub categories: Vec<String>,
    pub checksum: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Total relationship targets across all relationship fields.
    pub fn relationship_count(&self) -> usize {
        self.relationships.values().map(|v| v.len()).sum()
    }
}

/// Listing filters for the REST layer.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub status: Option<String>,
    pub category: Option<String>,
    /// Matched (case-insensitive substring) against SKU and title.
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct ProductStore {
    db: Arc<Db>,
}

impl ProductStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Insert or replace a product row keyed by SKU.
    pub async fn upsert(&self, record: ProductRecord) -> Result<()> {
        self.db
            .with_connection(move |conn| upsert_row(conn, &record))
            .await
    }

    /// Checksum of the stored row, if the product exists.
    pub async fn checksum(&self, sku: &str) -> Result<Option<String>> {
        let sku = sku.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare("SELECT checksum FROM products WHERE sku = ?1")?;
                let mut rows = stmt.query([&sku])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    /// All status-active products. This is the graph builder's input.
    pub async fn find_active(&self) -> Result<Vec<ProductRecord>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE status = 'active' ORDER BY sku",
                    SELECT_PRODUCT
                ))?;
                let records = collect_records(stmt.query([])?);
                records
            })
            .await
    }

    pub async fn find_by_sku(&self, sku: &str) -> Result<Option<ProductRecord>> {
        let sku = sku.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{} WHERE sku = ?1", SELECT_PRODUCT))?;
                let mut records = collect_records(stmt.query([&sku])?)?;
                Ok(records.pop())
            })
            .await
    }

    /// Filtered product listing with pagination.
    ///
    /// Status and search are pushed into SQL; category lives inside a JSON
    /// column so it is filtered after the fetch, like the pagination window.
    /// Returns (page of records, total matching count).
    pub async fn list(
        &self,
        filter: ProductFilter,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<ProductRecord>, usize)> {
        self.db
            .with_connection(move |conn| {
                let mut sql = format!("{} WHERE 1=1", SELECT_PRODUCT);
                let mut args: Vec<String> = Vec::new();

                if let Some(status) = &filter.status {
                    args.push(status.clone());
                    sql.push_str(&format!(" AND status = ?{}", args.len()));
                }
                if let Some(search) = &filter.search {
                    args.push(format!("%{}%", search.to_lowercase()));
                    let idx = args.len();
                    sql.push_str(&format!(
                        " AND (LOWER(sku) LIKE ?{idx} OR LOWER(title) LIKE ?{idx})"
                    ));
                }
                sql.push_str(" ORDER BY sku");

                let mut stmt = conn.prepare(&sql)?;
                let mut records =
                    collect_records(stmt.query(rusqlite::params_from_iter(args.iter()))?)?;

                if let Some(category) = &filter.category {
                    records.retain(|r| r.categories.iter().any(|c| c == category));
                }

                let total = records.len();
                let start = (page.saturating_sub(1)) * per_page;
                let page_records: Vec<ProductRecord> = records
                    .into_iter()
                    .skip(start)
                    .take(per_page)
                    .collect();

                Ok((page_records, total))
            })
            .await
    }

    /// Count products, optionally restricted to one status.
    pub async fn count(&self, status: Option<String>) -> Result<i64> {
        self.db
            .with_connection(move |conn| {
                let count = match status {
                    Some(status) => conn.query_row(
                        "SELECT COUNT(*) FROM products WHERE status = ?1",
                        [&status],
                        |row| row.get(0),
                    )?,
                    None => {
                        conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?
                    }
                };
                Ok(count)
            })
            .await
    }

    /// Category slugs with how many active products carry each,
    /// extracted from the categories JSON column.
    pub async fn category_counts(&self) -> Result<Vec<(String, usize)>> {
        let products = self.find_active().await?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for product in &products {
            for category in &product.categories {
                *counts.entry(category.clone()).or_default() += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    pub async fn clear(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let deleted = conn.execute("DELETE FROM products", [])?;
                Ok(deleted)
            })
            .await
    }
}

const SELECT_PRODUCT: &str = "SELECT sku, pim_id, status, product_type, title, \
     attributes, relationships, categories, checksum, \
     created_at, updated_at, synced_at FROM products";

fn upsert_row(conn: &Connection, record: &ProductRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO products (sku, pim_id, status, product_type, title, \
             attributes, relationships, categories, checksum, \
             created_at, updated_at, synced_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
         ON CONFLICT(sku) DO UPDATE SET \
             pim_id = excluded.pim_id, \
             status = excluded.status, \
             product_type = excluded.product_type, \
             title = excluded.title, \
             attributes = excluded.attributes, \
             relationships = excluded.relationships, \
             categories = excluded.categories, \
             checksum = excluded.checksum, \
             created_at = excluded.created_at, \
             updated_at = excluded.updated_at, \
             synced_at = excluded.synced_at",
        params![
            record.sku,
            record.pim_id,
            record.status,
            record.product_type,
            record.title,
            serde_json::to_string(&record.attributes)?,
            serde_json::to_string(&record.relationships)?,
            serde_json::to_string(&record.categories)?,
            record.checksum,
            record.created_at.map(|t| t.to_rfc3339()),
            record.updated_at.map(|t| t.to_rfc3339()),
            record.synced_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn collect_records(mut rows: rusqlite::Rows<'_>) -> Result<Vec<ProductRecord>> {
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(record_from_row(row)?);
    }
    Ok(records)
}

fn record_from_row(row: &Row<'_>) -> Result<ProductRecord> {
    let attributes: String = row.get(5)?;
    let relationships: String = row.get(6)?;
    let categories: String = row.get(7)?;
    let created_at: Option<String> = row.get(9)?;
    let updated_at: Option<String> = row.get(10)?;
    let synced_at: String = row.get(11)?;

    Ok(ProductRecord {
        sku: row.get(0)?,
        pim_id: row.get(1)?,
        status: row.get(2)?,
        product_type: row.get(3)?,
        title: row.get(4)?,
        attributes: serde_json::from_str(&attributes)?,
        relationships: serde_json::from_str(&relationships)?,
        categories: serde_json::from_str(&categories)?,
        checksum: row.get(8)?,
        created_at: parse_timestamp(created_at)?,
        updated_at: parse_timestamp(updated_at)?,
        synced_at: parse_timestamp(Some(synced_at))?
            .ok_or_else(|| EcographError::Parse("missing synced_at".to_string()))?,
    })
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(s) => {
            let parsed = DateTime::parse_from_rfc3339(&s)
                .map_err(|e| EcographError::Parse(format!("bad timestamp {}: {}", s, e)))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::migrate;
    use std::path::Path;
    use tempfile::TempDir;

    pub(crate) async fn test_store() -> (ProductStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(Db::new(&db_path));
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        db.with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await
            .unwrap();
        (ProductStore::new(db), temp_dir)
    }

    pub(crate) fn sample_record(sku: &str, status: &str) -> ProductRecord {
        let mut attributes = serde_json::Map::new();
        attributes.insert("tensao".to_string(), Value::String("220V".to_string()));

        let mut relationships = BTreeMap::new();
        relationships.insert(
            "protocolo".to_string(),
            vec!["abnt".to_string(), "modbus".to_string()],
        );

        ProductRecord {
            sku: sku.to_string(),
            pim_id: Some(1),
            status: status.to_string(),
            product_type: Some("simple".to_string()),
            title: format!("{} - Demo", sku),
            attributes,
            relationships,
            categories: vec!["medidores".to_string()],
            checksum: "abc123".to_string(),
            created_at: None,
            updated_at: None,
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_find_by_sku() {
        let (store, _temp) = test_store().await;
        store.upsert(sample_record("med_01", "active")).await.unwrap();

        let found = store.find_by_sku("med_01").await.unwrap().unwrap();
        assert_eq!(found.sku, "med_01");
        assert_eq!(found.categories, vec!["medidores"]);
        assert_eq!(found.relationship_count(), 2);
        assert_eq!(
            found.attributes.get("tensao"),
            Some(&Value::String("220V".to_string()))
        );

        assert!(store.find_by_sku("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing() {
        let (store, _temp) = test_store().await;
        store.upsert(sample_record("med_01", "active")).await.unwrap();

        let mut updated = sample_record("med_01", "inactive");
        updated.checksum = "def456".to_string();
        store.upsert(updated).await.unwrap();

        let found = store.find_by_sku("med_01").await.unwrap().unwrap();
        assert_eq!(found.status, "inactive");
        assert_eq!(found.checksum, "def456");
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_active_excludes_inactive() {
        let (store, _temp) = test_store().await;
        store.upsert(sample_record("med_01", "active")).await.unwrap();
        store.upsert(sample_record("med_02", "inactive")).await.unwrap();

        let active = store.find_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sku, "med_01");
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates() {
        let (store, _temp) = test_store().await;
        for i in 0..5 {
            store
                .upsert(sample_record(&format!("med_{:02}", i), "active"))
                .await
                .unwrap();
        }
        let mut other = sample_record("soft_01", "active");
        other.categories = vec!["software".to_string()];
        store.upsert(other).await.unwrap();

        let (page, total) = store
            .list(
                ProductFilter {
                    status: Some("active".to_string()),
                    category: Some("medidores".to_string()),
                    search: None,
                },
                1,
                3,
            )
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 3);

        let (page2, total2) = store
            .list(
                ProductFilter {
                    search: Some("SOFT".to_string()),
                    ..Default::default()
                },
                1,
                20,
            )
            .await
            .unwrap();
        assert_eq!(total2, 1);
        assert_eq!(page2[0].sku, "soft_01");
    }

    #[tokio::test]
    async fn test_category_counts() {
        let (store, _temp) = test_store().await;
        store.upsert(sample_record("med_01", "active")).await.unwrap();
        store.upsert(sample_record("med_02", "active")).await.unwrap();
        let mut soft = sample_record("soft_01", "active");
        soft.categories = vec!["software".to_string()];
        store.upsert(soft).await.unwrap();

        let counts = store.category_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![("medidores".to_string(), 2), ("software".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_checksum_lookup() {
        let (store, _temp) = test_store().await;
        assert!(store.checksum("med_01").await.unwrap().is_none());
        store.upsert(sample_record("med_01", "active")).await.unwrap();
        assert_eq!(
            store.checksum("med_01").await.unwrap(),
            Some("abc123".to_string())
        );
    }
}
