//! PostgreSQL catalog store
//!
//! Queries are compiled from [`DatasetQuery`] with `QueryBuilder`; every value is a
//! bind parameter, only table and column names from the fixed catalogue are
//! interpolated. Ingestion runs in one transaction.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::{
    distinct_names, CatalogStore, DatasetQuery, IngestItem, IngestReport, Scope, StoreError,
    StoreResult, INGEST_CHUNK_SIZE,
};
use crate::filters::resolve::{Condition, EntityMatch, Relation, ScalarValue};
use crate::models::{
    truncate_chars, Dataset, DatasetPatch, DatasetRecord, FilterOptions, LookupEntry, NewDataset,
    AREA_NAME_MAX_LEN, LOOKUP_NAME_MAX_LEN, UNKNOWN_AREA,
};

/// Join rows per INSERT statement
const LINK_CHUNK_SIZE: usize = 500;

const AREAS_TABLE: &str = "anatomical_areas";

const DATASET_COLUMNS: &str = "d.id, d.title, d.description, d.external_path, d.local_path, \
     d.record_count, d.size, d.license, d.anatomical_area_id, \
     a.name AS anatomical_area_name, d.created_at, d.updated_at";

/// Catalog store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load the many-to-many entities for `records` and build the views.
    async fn hydrate(&self, records: Vec<DatasetRecord>) -> StoreResult<Vec<Dataset>> {
        let ids: Vec<i64> = records
            .iter()
            .map(|r| r.id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let modalities = load_related(&self.pool, Relation::Modalities, &ids).await?;
        let ml_tasks = load_related(&self.pool, Relation::MlTasks, &ids).await?;
        let tags = load_related(&self.pool, Relation::Tags, &ids).await?;

        // rows repeat when the query is not distinct, so entries are cloned per row
        let entries = |map: &HashMap<i64, Vec<LookupEntry>>, id: i64| {
            map.get(&id).cloned().unwrap_or_default()
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let id = record.id;
                record.into_dataset(
                    entries(&modalities, id),
                    entries(&ml_tasks, id),
                    entries(&tags, id),
                )
            })
            .collect())
    }
}

/// Escape LIKE metacharacters and wrap in `%`.
fn contains_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Build the SELECT for `query`, optionally paginated.
pub(crate) fn compile(
    query: &DatasetQuery,
    page: Option<(i64, i64)>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT ");
    if query.is_distinct() {
        builder.push("DISTINCT ");
    }
    builder.push(DATASET_COLUMNS);
    builder.push(" FROM datasets d LEFT JOIN anatomical_areas a ON a.id = d.anatomical_area_id");

    for (idx, condition) in query.conditions().iter().enumerate() {
        if let Condition::Related(relation, _) = condition {
            builder.push(format!(
                " JOIN {join} j{idx} ON j{idx}.dataset_id = d.id JOIN {table} e{idx} ON e{idx}.id = j{idx}.{fk}",
                join = relation.join_table(),
                table = relation.table(),
                fk = relation.foreign_key(),
            ));
        }
    }

    builder.push(" WHERE TRUE");

    match query.scope() {
        Scope::All => {},
        Scope::Text(text) => {
            let pattern = contains_pattern(text);
            builder.push(" AND (d.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR d.description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        },
        Scope::Ids(ids) => {
            builder.push(" AND d.id = ANY(");
            builder.push_bind(ids.clone());
            builder.push(")");
        },
    }

    for (idx, condition) in query.conditions().iter().enumerate() {
        match condition {
            Condition::Scalar { column, op, value } => {
                builder.push(format!(" AND d.{}{}", column.name(), op.sql()));
                match value {
                    ScalarValue::Int(v) => builder.push_bind(*v),
                    ScalarValue::Text(v) => builder.push_bind(v.clone()),
                };
            },
            Condition::AnatomicalArea(entity) => {
                push_entity_match(&mut builder, "d.anatomical_area_id", "a.name", entity);
            },
            Condition::Related(_, entity) => {
                let id = format!("e{}.id", idx);
                let name = format!("e{}.name", idx);
                push_entity_match(&mut builder, &id, &name, entity);
            },
        }
    }

    let ordering = query.ordering();
    let direction = if ordering.descending { "DESC" } else { "ASC" };
    builder.push(format!(
        " ORDER BY d.{column} {direction}, d.id {direction}",
        column = ordering.column.name(),
    ));

    if let Some((offset, limit)) = page {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);
    }

    builder
}

fn push_entity_match(
    builder: &mut QueryBuilder<'static, Postgres>,
    id_column: &str,
    name_column: &str,
    entity: &EntityMatch,
) {
    match entity {
        EntityMatch::Id(id) => {
            builder.push(format!(" AND {} = ", id_column));
            builder.push_bind(*id);
        },
        EntityMatch::Name(name) => {
            builder.push(format!(" AND {} = ", name_column));
            builder.push_bind(name.clone());
        },
        EntityMatch::IdIn(ids) => {
            builder.push(format!(" AND {} = ANY(", id_column));
            builder.push_bind(ids.clone());
            builder.push(")");
        },
        EntityMatch::NameIn(names) => {
            builder.push(format!(" AND {} = ANY(", name_column));
            builder.push_bind(names.clone());
            builder.push(")");
        },
    }
}

async fn load_related(
    pool: &PgPool,
    relation: Relation,
    dataset_ids: &[i64],
) -> StoreResult<HashMap<i64, Vec<LookupEntry>>> {
    if dataset_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT j.dataset_id, e.id, e.name FROM {join} j JOIN {table} e ON e.id = j.{fk} \
         WHERE j.dataset_id = ANY($1) ORDER BY e.name",
        join = relation.join_table(),
        table = relation.table(),
        fk = relation.foreign_key(),
    );
    let rows: Vec<(i64, i64, String)> = sqlx::query_as(&sql)
        .bind(dataset_ids)
        .fetch_all(pool)
        .await?;

    let mut related: HashMap<i64, Vec<LookupEntry>> = HashMap::new();
    for (dataset_id, id, name) in rows {
        related
            .entry(dataset_id)
            .or_default()
            .push(LookupEntry::new(id, name));
    }
    Ok(related)
}

/// Batched existence query plus bulk create of the missing names.
///
/// Returns the name cache and how many rows were created. A name that lost an
/// insert race is absent from the cache; callers fall back to
/// [`get_or_create_lookup`] for it.
async fn ensure_lookups(
    conn: &mut PgConnection,
    table: &str,
    names: &[String],
) -> StoreResult<(HashMap<String, i64>, usize)> {
    if names.is_empty() {
        return Ok((HashMap::new(), 0));
    }

    let existing: Vec<(i64, String)> =
        sqlx::query_as(&format!("SELECT id, name FROM {} WHERE name = ANY($1)", table))
            .bind(names)
            .fetch_all(&mut *conn)
            .await?;
    let mut cache: HashMap<String, i64> = existing.into_iter().map(|(id, n)| (n, id)).collect();

    let missing: Vec<&String> = names.iter().filter(|n| !cache.contains_key(*n)).collect();
    if missing.is_empty() {
        return Ok((cache, 0));
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} (name) ", table));
    builder.push_values(&missing, |mut b, name| {
        b.push_bind(name.as_str());
    });
    builder.push(" ON CONFLICT (name) DO NOTHING RETURNING id, name");

    let created: Vec<(i64, String)> = builder
        .build_query_as()
        .fetch_all(&mut *conn)
        .await?;
    let created_count = created.len();
    cache.extend(created.into_iter().map(|(id, n)| (n, id)));

    Ok((cache, created_count))
}

/// Second-chance create for a single name. Returns the id and whether it was created.
async fn get_or_create_lookup(
    conn: &mut PgConnection,
    table: &str,
    name: &str,
) -> StoreResult<(i64, bool)> {
    let inserted: Option<i64> = sqlx::query_scalar(&format!(
        "INSERT INTO {} (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id",
        table
    ))
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok((id, true));
    }

    let id: i64 = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE name = $1", table))
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok((id, false))
}

/// Lookup id for `name` from `cache`, with a second-chance create when the
/// batch step left it out.
async fn cached_lookup_id(
    conn: &mut PgConnection,
    table: &str,
    cache: &mut HashMap<String, i64>,
    name: String,
    created: &mut usize,
) -> StoreResult<i64> {
    if let Some(id) = cache.get(&name) {
        return Ok(*id);
    }
    let (id, was_created) = get_or_create_lookup(conn, table, &name).await?;
    *created += usize::from(was_created);
    cache.insert(name, id);
    Ok(id)
}

/// Pick one anatomical area for an ingested dataset: the first extracted name,
/// or `unknown` when nothing was extracted.
async fn resolve_area(
    conn: &mut PgConnection,
    candidates: &[String],
    created: &mut usize,
) -> StoreResult<i64> {
    let names: Vec<String> = distinct_names(candidates)
        .iter()
        .map(|name| truncate_chars(name, AREA_NAME_MAX_LEN))
        .collect();

    let Some(first) = names.first() else {
        let (id, was_created) = get_or_create_lookup(conn, AREAS_TABLE, UNKNOWN_AREA).await?;
        *created += usize::from(was_created);
        return Ok(id);
    };

    let (cache, created_count) = ensure_lookups(conn, AREAS_TABLE, &names).await?;
    *created += created_count;

    match cache.get(first) {
        Some(id) => Ok(*id),
        None => {
            let (id, was_created) = get_or_create_lookup(conn, AREAS_TABLE, first).await?;
            *created += usize::from(was_created);
            Ok(id)
        },
    }
}

async fn ensure_ids_exist(
    conn: &mut PgConnection,
    table: &str,
    entity: &'static str,
    ids: &[i64],
) -> StoreResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: Vec<i64> = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ANY($1)", table))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    match ids.iter().find(|id| !found.contains(id)) {
        Some(id) => Err(StoreError::MissingReference { entity, id: *id }),
        None => Ok(()),
    }
}

async fn replace_links(
    conn: &mut PgConnection,
    relation: Relation,
    dataset_id: i64,
    ids: &[i64],
) -> StoreResult<()> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE dataset_id = $1",
        relation.join_table()
    ))
    .bind(dataset_id)
    .execute(&mut *conn)
    .await?;

    if ids.is_empty() {
        return Ok(());
    }

    sqlx::query(&format!(
        "INSERT INTO {join} (dataset_id, {fk}) SELECT $1, UNNEST($2::bigint[]) \
         ON CONFLICT (dataset_id, {fk}) DO NOTHING",
        join = relation.join_table(),
        fk = relation.foreign_key(),
    ))
    .bind(dataset_id)
    .bind(ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn check_references(
    conn: &mut PgConnection,
    area: Option<i64>,
    relations: [(Relation, &[i64]); 3],
) -> StoreResult<()> {
    if let Some(id) = area {
        ensure_ids_exist(conn, AREAS_TABLE, "anatomical area", &[id]).await?;
    }
    for (relation, ids) in relations {
        ensure_ids_exist(conn, relation.table(), relation.name(), ids).await?;
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[tracing::instrument(skip(self))]
    async fn probe(&self, text: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM datasets WHERE title ILIKE $1 OR description ILIKE $1",
        )
        .bind(contains_pattern(text))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self, query), fields(scope = ?query.scope()))]
    async fn fetch(&self, query: &DatasetQuery) -> StoreResult<Vec<Dataset>> {
        let mut builder = compile(query, None);
        debug!(sql = builder.sql(), "Compiled dataset query");
        let records: Vec<DatasetRecord> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(records).await
    }

    #[tracing::instrument(skip(self, batch), fields(items = batch.len()))]
    async fn ingest(&self, batch: Vec<IngestItem>) -> StoreResult<IngestReport> {
        let mut report = IngestReport::default();
        if batch.is_empty() {
            return Ok(report);
        }

        let mut tx = self.pool.begin().await?;

        let mut area_ids = Vec::with_capacity(batch.len());
        for item in &batch {
            let id = resolve_area(&mut tx, &item.dataset.area_candidates, &mut report.areas_created)
                .await?;
            area_ids.push(id);
        }

        for (chunk, areas) in batch
            .chunks(INGEST_CHUNK_SIZE)
            .zip(area_ids.chunks(INGEST_CHUNK_SIZE))
        {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO datasets (title, description, external_path, local_path, \
                 record_count, size, license, anatomical_area_id) ",
            );
            builder.push_values(chunk.iter().zip(areas), |mut b, (item, area_id)| {
                let dataset = &item.dataset;
                b.push_bind(&dataset.title)
                    .push_bind(&dataset.description)
                    .push_bind(&dataset.external_path)
                    .push_bind(&dataset.local_path)
                    .push_bind(dataset.record_count)
                    .push_bind(dataset.size)
                    .push_bind(&dataset.license)
                    .push_bind(*area_id);
            });
            builder.push(" RETURNING id");

            let ids: Vec<i64> = builder.build_query_scalar().fetch_all(&mut *tx).await?;
            report.dataset_ids.extend(ids);
        }

        let all_tags: Vec<String> = distinct_names(batch.iter().flat_map(|item| &item.tags))
            .iter()
            .map(|name| truncate_chars(name, LOOKUP_NAME_MAX_LEN))
            .collect();
        let (mut cache, created) = ensure_lookups(&mut tx, Relation::Tags.table(), &all_tags).await?;
        report.tags_created += created;

        let mut links: Vec<(i64, i64)> = Vec::new();
        for (item, dataset_id) in batch.iter().zip(&report.dataset_ids) {
            for name in distinct_names(&item.tags) {
                let name = truncate_chars(&name, LOOKUP_NAME_MAX_LEN);
                let tag_id = cached_lookup_id(
                    &mut tx,
                    Relation::Tags.table(),
                    &mut cache,
                    name,
                    &mut report.tags_created,
                )
                .await?;
                links.push((*dataset_id, tag_id));
            }
        }

        for chunk in links.chunks(LINK_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO dataset_tags (dataset_id, tag_id) ");
            builder.push_values(chunk, |mut b, (dataset_id, tag_id)| {
                b.push_bind(*dataset_id).push_bind(*tag_id);
            });
            builder.push(" ON CONFLICT (dataset_id, tag_id) DO NOTHING");
            let result = builder.build().execute(&mut *tx).await?;
            report.links_created += result.rows_affected() as usize;
        }

        tx.commit().await?;

        info!(
            datasets = report.dataset_ids.len(),
            areas_created = report.areas_created,
            tags_created = report.tags_created,
            links_created = report.links_created,
            "Ingested external datasets"
        );

        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    async fn get_dataset(&self, id: i64) -> StoreResult<Option<Dataset>> {
        let mut datasets = self.fetch(&DatasetQuery::ids(vec![id])).await?;
        Ok(datasets.pop())
    }

    #[tracing::instrument(skip(self))]
    async fn list_datasets(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Dataset>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await?;

        let mut builder = compile(&DatasetQuery::all(), Some((offset, limit)));
        let records: Vec<DatasetRecord> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;
        Ok((self.hydrate(records).await?, total))
    }

    #[tracing::instrument(skip(self, new), fields(title = %new.title))]
    async fn create_dataset(&self, new: NewDataset) -> StoreResult<Dataset> {
        let mut tx = self.pool.begin().await?;
        check_references(
            &mut tx,
            new.anatomical_area_id,
            [
                (Relation::Modalities, new.modality_ids.as_slice()),
                (Relation::MlTasks, new.ml_task_ids.as_slice()),
                (Relation::Tags, new.tag_ids.as_slice()),
            ],
        )
        .await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO datasets (
                title, description, external_path, local_path,
                record_count, size, license, anatomical_area_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.external_path)
        .bind(&new.local_path)
        .bind(new.record_count)
        .bind(new.size)
        .bind(&new.license)
        .bind(new.anatomical_area_id)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(&mut tx, Relation::Modalities, id, &new.modality_ids).await?;
        replace_links(&mut tx, Relation::MlTasks, id, &new.ml_task_ids).await?;
        replace_links(&mut tx, Relation::Tags, id, &new.tag_ids).await?;

        tx.commit().await?;
        info!(dataset_id = id, "Dataset created");

        self.get_dataset(id).await?.ok_or(StoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update_dataset(&self, id: i64, patch: DatasetPatch) -> StoreResult<Dataset> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM datasets WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(id));
        }

        check_references(
            &mut tx,
            patch.anatomical_area_id,
            [
                (Relation::Modalities, patch.modality_ids.as_deref().unwrap_or_default()),
                (Relation::MlTasks, patch.ml_task_ids.as_deref().unwrap_or_default()),
                (Relation::Tags, patch.tag_ids.as_deref().unwrap_or_default()),
            ],
        )
        .await?;

        sqlx::query(
            r#"
            UPDATE datasets SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                external_path = COALESCE($4, external_path),
                local_path = COALESCE($5, local_path),
                record_count = COALESCE($6, record_count),
                size = COALESCE($7, size),
                license = COALESCE($8, license),
                anatomical_area_id = COALESCE($9, anatomical_area_id),
                readme_content = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.external_path)
        .bind(&patch.local_path)
        .bind(patch.record_count)
        .bind(patch.size)
        .bind(&patch.license)
        .bind(patch.anatomical_area_id)
        .execute(&mut *tx)
        .await?;

        for (relation, ids) in [
            (Relation::Modalities, &patch.modality_ids),
            (Relation::MlTasks, &patch.ml_task_ids),
            (Relation::Tags, &patch.tag_ids),
        ] {
            if let Some(ids) = ids {
                replace_links(&mut tx, relation, id, ids).await?;
            }
        }

        tx.commit().await?;
        info!(dataset_id = id, "Dataset updated");

        self.get_dataset(id).await?.ok_or(StoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self))]
    async fn readme_content(&self, id: i64) -> StoreResult<Option<String>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT readme_content FROM datasets WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(content,)| content).ok_or(StoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self, content))]
    async fn store_readme(&self, id: i64, content: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE datasets SET readme_content = $2 WHERE id = $1")
            .bind(id)
            .bind(content)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn filter_options(&self) -> StoreResult<FilterOptions> {
        async fn entries(pool: &PgPool, table: &str) -> StoreResult<Vec<LookupEntry>> {
            let rows = sqlx::query_as::<_, LookupEntry>(&format!(
                "SELECT id, name FROM {} ORDER BY name",
                table
            ))
            .fetch_all(pool)
            .await?;
            Ok(rows)
        }

        Ok(FilterOptions {
            anatomical_areas: entries(&self.pool, AREAS_TABLE).await?,
            modalities: entries(&self.pool, Relation::Modalities.table()).await?,
            ml_tasks: entries(&self.pool, Relation::MlTasks.table()).await?,
            tags: entries(&self.pool, Relation::Tags.table()).await?,
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::db::health_check(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::resolve::{CmpOp, OrderColumn, Ordering, ScalarColumn};
    use crate::models::ExternalDataset;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("lung"), "%lung%");
        assert_eq!(contains_pattern("100%_a"), "%100\\%\\_a%");
    }

    #[test]
    fn test_compile_text_scope_with_filters() {
        let query = DatasetQuery::matching("lungs")
            .filter([Condition::Scalar {
                column: ScalarColumn::Size,
                op: CmpOp::Gte,
                value: ScalarValue::Int(1000),
            }])
            .order_by(Ordering {
                column: OrderColumn::Scalar(ScalarColumn::Size),
                descending: true,
            });
        let builder = compile(&query, None);
        let sql = builder.sql();

        assert!(sql.starts_with("SELECT d.id"));
        assert!(sql.contains("d.title ILIKE $1 OR d.description ILIKE $2"));
        assert!(sql.contains("AND d.size >= $3"));
        assert!(sql.ends_with("ORDER BY d.size DESC, d.id DESC"));
    }

    #[test]
    fn test_compile_relation_membership_joins_and_distinct() {
        let query = DatasetQuery::all()
            .filter([Condition::Related(
                Relation::Tags,
                EntityMatch::NameIn(vec!["mri".to_string()]),
            )])
            .distinct(true);
        let builder = compile(&query, Some((20, 10)));
        let sql = builder.sql();

        assert!(sql.starts_with("SELECT DISTINCT "));
        assert!(sql.contains("JOIN dataset_tags j0 ON j0.dataset_id = d.id"));
        assert!(sql.contains("JOIN tags e0 ON e0.id = j0.tag_id"));
        assert!(sql.contains("AND e0.name = ANY($1)"));
        assert!(sql.contains("ORDER BY d.created_at DESC"));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore] // Requires database
    async fn test_ingest_links_tags_once(pool: PgPool) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO tags (name) VALUES ('mri')")
            .execute(&pool)
            .await?;
        let store = PgCatalogStore::new(pool.clone());

        let item = |title: &str, tags: &[&str]| IngestItem {
            dataset: ExternalDataset {
                title: title.to_string(),
                area_candidates: vec!["lung".to_string()],
                ..Default::default()
            },
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };

        let report = store
            .ingest(vec![item("a", &["mri", "ct"]), item("b", &["ct", "xray"])])
            .await
            .unwrap();

        assert_eq!(report.dataset_ids.len(), 2);
        assert_eq!(report.tags_created, 2);
        assert_eq!(report.links_created, 4);
        assert_eq!(report.areas_created, 1);

        let fetched = store
            .fetch(&DatasetQuery::ids(report.dataset_ids.clone()))
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched
            .iter()
            .all(|d| d.anatomical_area_name.as_deref() == Some("lung")));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore] // Requires database
    async fn test_lookup_missing_from_batch_is_created_individually(
        pool: PgPool,
    ) -> sqlx::Result<()> {
        let mut conn = pool.acquire().await?;
        let names = vec!["ct".to_string(), "mri".to_string()];
        let (mut cache, created) = ensure_lookups(&mut conn, "tags", &names).await.unwrap();
        assert_eq!(created, 2);

        // a name that lost the batch insert race
        let mri = cache.remove("mri").unwrap();
        let mut created = 0;
        let id = cached_lookup_id(&mut conn, "tags", &mut cache, "mri".to_string(), &mut created)
            .await
            .unwrap();
        assert_eq!(id, mri);
        assert_eq!(created, 0);

        // a name the batch never saw
        let xray =
            cached_lookup_id(&mut conn, "tags", &mut cache, "xray".to_string(), &mut created)
                .await
                .unwrap();
        assert_eq!(created, 1);
        assert_eq!(cache.get("xray"), Some(&xray));

        let stored: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = 'xray'")
            .fetch_one(&mut *conn)
            .await?;
        assert_eq!(stored, xray);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore] // Requires database
    async fn test_update_clears_readme(pool: PgPool) -> sqlx::Result<()> {
        let store = PgCatalogStore::new(pool);
        let created = store
            .create_dataset(NewDataset {
                title: "Brain MRI".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store.store_readme(created.id, "# Brain MRI").await.unwrap();

        let updated = store
            .update_dataset(
                created.id,
                DatasetPatch {
                    size: Some(2048),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.size, Some(2048));
        assert_eq!(store.readme_content(created.id).await.unwrap(), None);
        Ok(())
    }
}
