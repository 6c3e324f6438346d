//! In-memory catalog store
//!
//! Mirrors the PostgreSQL store's semantics closely enough to run the whole search
//! flow without a database: relation joins multiply rows unless the query is
//! distinct, NULLs sort last ascending and first descending, and ingestion is
//! all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::{
    distinct_names, CatalogStore, DatasetQuery, IngestItem, IngestReport, Scope, StoreError,
    StoreResult, INGEST_CHUNK_SIZE,
};
use crate::filters::resolve::{
    CmpOp, Condition, EntityMatch, OrderColumn, Ordering, Relation, ScalarColumn, ScalarValue,
};
use crate::models::{
    truncate_chars, Dataset, DatasetPatch, FilterOptions, LookupEntry, NewDataset,
    AREA_NAME_MAX_LEN, LOOKUP_NAME_MAX_LEN, UNKNOWN_AREA,
};

#[derive(Debug, Clone)]
struct StoredDataset {
    id: i64,
    title: String,
    description: Option<String>,
    external_path: Option<String>,
    local_path: Option<String>,
    record_count: Option<i64>,
    size: Option<i64>,
    license: Option<String>,
    anatomical_area_id: Option<i64>,
    readme_content: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum SortValue<'a> {
    Int(Option<i64>),
    Text(Option<&'a str>),
    Time(DateTime<Utc>),
}

impl StoredDataset {
    fn int(&self, column: ScalarColumn) -> Option<i64> {
        match column {
            ScalarColumn::Id => Some(self.id),
            ScalarColumn::RecordCount => self.record_count,
            ScalarColumn::Size => self.size,
            _ => None,
        }
    }

    fn text(&self, column: ScalarColumn) -> Option<&str> {
        match column {
            ScalarColumn::Title => Some(self.title.as_str()),
            ScalarColumn::Description => self.description.as_deref(),
            ScalarColumn::ExternalPath => self.external_path.as_deref(),
            ScalarColumn::LocalPath => self.local_path.as_deref(),
            ScalarColumn::License => self.license.as_deref(),
            _ => None,
        }
    }

    fn sort_value(&self, column: OrderColumn) -> SortValue<'_> {
        match column {
            OrderColumn::CreatedAt => SortValue::Time(self.created_at),
            OrderColumn::UpdatedAt => SortValue::Time(self.updated_at),
            OrderColumn::Scalar(c) if c.is_integer() => SortValue::Int(self.int(c)),
            OrderColumn::Scalar(c) => SortValue::Text(self.text(c)),
        }
    }

    fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Default)]
struct LookupTable {
    rows: BTreeMap<i64, String>,
    next_id: i64,
}

impl LookupTable {
    fn find(&self, name: &str) -> Option<i64> {
        self.rows
            .iter()
            .find_map(|(id, existing)| (existing == name).then_some(*id))
    }

    fn name(&self, id: i64) -> Option<&str> {
        self.rows.get(&id).map(String::as_str)
    }

    fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    fn insert(&mut self, name: &str) -> i64 {
        self.next_id += 1;
        self.rows.insert(self.next_id, name.to_string());
        self.next_id
    }

    /// Returns the id and whether a row was created.
    fn get_or_create(&mut self, name: &str) -> (i64, bool) {
        match self.find(name) {
            Some(id) => (id, false),
            None => (self.insert(name), true),
        }
    }

    fn entry(&self, id: i64) -> Option<LookupEntry> {
        self.name(id).map(|name| LookupEntry::new(id, name))
    }

    fn entries(&self) -> Vec<LookupEntry> {
        let mut entries: Vec<_> = self
            .rows
            .iter()
            .map(|(id, name)| LookupEntry::new(*id, name.as_str()))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    fn matches(&self, id: i64, entity: &EntityMatch) -> bool {
        match entity {
            EntityMatch::Id(wanted) => id == *wanted,
            EntityMatch::IdIn(ids) => ids.contains(&id),
            EntityMatch::Name(wanted) => self.name(id) == Some(wanted.as_str()),
            EntityMatch::NameIn(names) => self
                .name(id)
                .is_some_and(|name| names.iter().any(|n| n == name)),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    datasets: BTreeMap<i64, StoredDataset>,
    next_dataset_id: i64,
    areas: LookupTable,
    modalities: LookupTable,
    ml_tasks: LookupTable,
    tags: LookupTable,
    modality_links: BTreeSet<(i64, i64)>,
    ml_task_links: BTreeSet<(i64, i64)>,
    tag_links: BTreeSet<(i64, i64)>,
}

impl State {
    fn table(&self, relation: Relation) -> &LookupTable {
        match relation {
            Relation::Modalities => &self.modalities,
            Relation::MlTasks => &self.ml_tasks,
            Relation::Tags => &self.tags,
        }
    }

    fn links(&self, relation: Relation) -> &BTreeSet<(i64, i64)> {
        match relation {
            Relation::Modalities => &self.modality_links,
            Relation::MlTasks => &self.ml_task_links,
            Relation::Tags => &self.tag_links,
        }
    }

    fn links_mut(&mut self, relation: Relation) -> &mut BTreeSet<(i64, i64)> {
        match relation {
            Relation::Modalities => &mut self.modality_links,
            Relation::MlTasks => &mut self.ml_task_links,
            Relation::Tags => &mut self.tag_links,
        }
    }

    fn linked(&self, relation: Relation, dataset_id: i64) -> impl Iterator<Item = i64> + '_ {
        self.links(relation)
            .range((dataset_id, i64::MIN)..=(dataset_id, i64::MAX))
            .map(|(_, entity_id)| *entity_id)
    }

    /// Rows a dataset contributes under `condition`; 0 means filtered out.
    ///
    /// Relation conditions count matching association rows, like a SQL join.
    fn multiplicity(&self, dataset: &StoredDataset, condition: &Condition) -> usize {
        match condition {
            Condition::Scalar { column, op, value } => {
                usize::from(scalar_matches(dataset, *column, *op, value))
            },
            Condition::AnatomicalArea(entity) => dataset
                .anatomical_area_id
                .map_or(0, |id| usize::from(self.areas.matches(id, entity))),
            Condition::Related(relation, entity) => {
                let table = self.table(*relation);
                self.linked(*relation, dataset.id)
                    .filter(|id| table.matches(*id, entity))
                    .count()
            },
        }
    }

    fn view(&self, dataset: &StoredDataset) -> Dataset {
        let related = |relation: Relation| -> Vec<LookupEntry> {
            let table = self.table(relation);
            let mut entries: Vec<_> = self
                .linked(relation, dataset.id)
                .filter_map(|id| table.entry(id))
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            entries
        };

        Dataset {
            id: dataset.id,
            title: dataset.title.clone(),
            description: dataset.description.clone(),
            external_path: dataset.external_path.clone(),
            local_path: dataset.local_path.clone(),
            record_count: dataset.record_count,
            size: dataset.size,
            license: dataset.license.clone(),
            anatomical_area: dataset.anatomical_area_id,
            anatomical_area_name: dataset
                .anatomical_area_id
                .and_then(|id| self.areas.name(id))
                .map(str::to_string),
            modalities: related(Relation::Modalities),
            ml_tasks: related(Relation::MlTasks),
            tags: related(Relation::Tags),
            created_at: dataset.created_at,
            updated_at: dataset.updated_at,
        }
    }

    fn check_references(
        &self,
        area: Option<i64>,
        relations: &[(Relation, &[i64])],
    ) -> StoreResult<()> {
        if let Some(id) = area {
            if !self.areas.contains(id) {
                return Err(StoreError::MissingReference {
                    entity: "anatomical area",
                    id,
                });
            }
        }
        for (relation, ids) in relations {
            if let Some(id) = ids.iter().find(|id| !self.table(*relation).contains(**id)) {
                return Err(StoreError::MissingReference {
                    entity: relation.name(),
                    id: *id,
                });
            }
        }
        Ok(())
    }

    fn replace_links(&mut self, relation: Relation, dataset_id: i64, ids: &[i64]) {
        self.links_mut(relation).retain(|(d, _)| *d != dataset_id);
        let links = self.links_mut(relation);
        for id in ids {
            links.insert((dataset_id, *id));
        }
    }

    fn insert_dataset(&mut self, mut dataset: StoredDataset) -> i64 {
        self.next_dataset_id += 1;
        dataset.id = self.next_dataset_id;
        self.datasets.insert(dataset.id, dataset);
        self.next_dataset_id
    }

    /// Tag id for `name`, falling back to a single get-or-create when the batch
    /// step left it out of `cache`.
    fn cached_tag_id(
        &mut self,
        cache: &mut HashMap<String, i64>,
        name: String,
        created: &mut usize,
    ) -> i64 {
        if let Some(id) = cache.get(&name) {
            return *id;
        }
        let (id, was_created) = self.tags.get_or_create(&name);
        *created += usize::from(was_created);
        cache.insert(name, id);
        id
    }

    /// Resolve extracted area names to one area id, creating what is missing.
    fn resolve_area(&mut self, candidates: &[String], created: &mut usize) -> i64 {
        let names: Vec<String> = distinct_names(candidates)
            .iter()
            .map(|name| truncate_chars(name, AREA_NAME_MAX_LEN))
            .collect();

        let mut resolved = Vec::with_capacity(names.len());
        for name in &names {
            let (id, was_created) = self.areas.get_or_create(name);
            if was_created {
                *created += 1;
            }
            resolved.push(id);
        }

        match resolved.first() {
            Some(id) => *id,
            None => {
                let (id, was_created) = self.areas.get_or_create(UNKNOWN_AREA);
                if was_created {
                    *created += 1;
                }
                id
            },
        }
    }
}

fn scalar_matches(
    dataset: &StoredDataset,
    column: ScalarColumn,
    op: CmpOp,
    value: &ScalarValue,
) -> bool {
    let ordering = match value {
        ScalarValue::Int(wanted) => dataset.int(column).map(|actual| actual.cmp(wanted)),
        ScalarValue::Text(wanted) => dataset
            .text(column)
            .map(|actual| actual.cmp(wanted.as_str())),
    };

    match (ordering, op) {
        (None, _) => false,
        (Some(o), CmpOp::Eq) => o == CmpOrdering::Equal,
        (Some(o), CmpOp::Gte) => o != CmpOrdering::Less,
        (Some(o), CmpOp::Lte) => o != CmpOrdering::Greater,
    }
}

/// NULLs compare greater than any value, as in PostgreSQL.
fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> CmpOrdering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
    }
}

fn compare(a: &StoredDataset, b: &StoredDataset, ordering: Ordering) -> CmpOrdering {
    let primary = match (a.sort_value(ordering.column), b.sort_value(ordering.column)) {
        (SortValue::Int(x), SortValue::Int(y)) => nulls_last(x, y),
        (SortValue::Text(x), SortValue::Text(y)) => nulls_last(x, y),
        (SortValue::Time(x), SortValue::Time(y)) => x.cmp(&y),
        _ => CmpOrdering::Equal,
    };
    let ordered = primary.then_with(|| a.id.cmp(&b.id));
    if ordering.descending {
        ordered.reverse()
    } else {
        ordered
    }
}

/// Catalog store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add lookup entities directly. Returns their ids in input order.
    pub async fn seed_lookups(&self, relation: Option<Relation>, names: &[&str]) -> Vec<i64> {
        let mut state = self.state.write().await;
        let table = match relation {
            None => &mut state.areas,
            Some(Relation::Modalities) => &mut state.modalities,
            Some(Relation::MlTasks) => &mut state.ml_tasks,
            Some(Relation::Tags) => &mut state.tags,
        };
        names.iter().map(|name| table.get_or_create(name).0).collect()
    }

    pub async fn dataset_count(&self) -> usize {
        self.state.read().await.datasets.len()
    }

    pub async fn tag_link_count(&self) -> usize {
        self.state.read().await.tag_links.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn probe(&self, text: &str) -> StoreResult<i64> {
        let state = self.state.read().await;
        let hits = state
            .datasets
            .values()
            .filter(|d| d.matches_text(text))
            .count();
        Ok(hits as i64)
    }

    async fn fetch(&self, query: &DatasetQuery) -> StoreResult<Vec<Dataset>> {
        let state = self.state.read().await;

        let mut rows: Vec<&StoredDataset> = Vec::new();
        for dataset in state.datasets.values() {
            let in_scope = match query.scope() {
                Scope::All => true,
                Scope::Text(text) => dataset.matches_text(text),
                Scope::Ids(ids) => ids.contains(&dataset.id),
            };
            if !in_scope {
                continue;
            }

            let copies = query
                .conditions()
                .iter()
                .map(|condition| state.multiplicity(dataset, condition))
                .product::<usize>();
            let copies = if query.is_distinct() {
                copies.min(1)
            } else {
                copies
            };
            rows.extend(std::iter::repeat(dataset).take(copies));
        }

        let ordering = query.ordering();
        rows.sort_by(|a, b| compare(a, b, ordering));

        Ok(rows.into_iter().map(|d| state.view(d)).collect())
    }

    async fn ingest(&self, batch: Vec<IngestItem>) -> StoreResult<IngestReport> {
        let mut guard = self.state.write().await;
        // work on a copy so a failure leaves the store untouched
        let mut state = (*guard).clone();
        let mut report = IngestReport::default();
        let now = Utc::now();

        for chunk in batch.chunks(INGEST_CHUNK_SIZE) {
            for item in chunk {
                let area_id = state.resolve_area(
                    &item.dataset.area_candidates,
                    &mut report.areas_created,
                );
                let dataset = &item.dataset;
                let id = state.insert_dataset(StoredDataset {
                    id: 0,
                    title: dataset.title.clone(),
                    description: dataset.description.clone(),
                    external_path: dataset.external_path.clone(),
                    local_path: dataset.local_path.clone(),
                    record_count: dataset.record_count,
                    size: dataset.size,
                    license: dataset.license.clone(),
                    anatomical_area_id: Some(area_id),
                    readme_content: None,
                    created_at: now,
                    updated_at: now,
                });
                report.dataset_ids.push(id);
            }
        }

        let all_tags: Vec<String> = distinct_names(batch.iter().flat_map(|item| &item.tags))
            .iter()
            .map(|name| truncate_chars(name, LOOKUP_NAME_MAX_LEN))
            .collect();
        let mut cache: HashMap<String, i64> = all_tags
            .iter()
            .filter_map(|name| state.tags.find(name).map(|id| (name.clone(), id)))
            .collect();
        for name in &all_tags {
            if !cache.contains_key(name) {
                let id = state.tags.insert(name);
                cache.insert(name.clone(), id);
                report.tags_created += 1;
            }
        }

        for (item, dataset_id) in batch.iter().zip(&report.dataset_ids) {
            for name in distinct_names(&item.tags) {
                let name = truncate_chars(&name, LOOKUP_NAME_MAX_LEN);
                let tag_id = state.cached_tag_id(&mut cache, name, &mut report.tags_created);
                if state.tag_links.insert((*dataset_id, tag_id)) {
                    report.links_created += 1;
                }
            }
        }

        *guard = state;
        Ok(report)
    }

    async fn get_dataset(&self, id: i64) -> StoreResult<Option<Dataset>> {
        let state = self.state.read().await;
        Ok(state.datasets.get(&id).map(|d| state.view(d)))
    }

    async fn list_datasets(&self, offset: i64, limit: i64) -> StoreResult<(Vec<Dataset>, i64)> {
        let state = self.state.read().await;
        let mut rows: Vec<&StoredDataset> = state.datasets.values().collect();
        rows.sort_by(|a, b| compare(a, b, Ordering::default()));

        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|d| state.view(d))
            .collect();
        Ok((page, total))
    }

    async fn create_dataset(&self, new: NewDataset) -> StoreResult<Dataset> {
        let mut state = self.state.write().await;
        state.check_references(
            new.anatomical_area_id,
            &[
                (Relation::Modalities, new.modality_ids.as_slice()),
                (Relation::MlTasks, new.ml_task_ids.as_slice()),
                (Relation::Tags, new.tag_ids.as_slice()),
            ],
        )?;

        let now = Utc::now();
        let id = state.insert_dataset(StoredDataset {
            id: 0,
            title: new.title,
            description: new.description,
            external_path: new.external_path,
            local_path: new.local_path,
            record_count: new.record_count,
            size: new.size,
            license: new.license,
            anatomical_area_id: new.anatomical_area_id,
            readme_content: None,
            created_at: now,
            updated_at: now,
        });
        state.replace_links(Relation::Modalities, id, &new.modality_ids);
        state.replace_links(Relation::MlTasks, id, &new.ml_task_ids);
        state.replace_links(Relation::Tags, id, &new.tag_ids);

        let dataset = state.datasets.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(state.view(dataset))
    }

    async fn update_dataset(&self, id: i64, patch: DatasetPatch) -> StoreResult<Dataset> {
        let mut state = self.state.write().await;
        if !state.datasets.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        let empty: &[i64] = &[];
        state.check_references(
            patch.anatomical_area_id,
            &[
                (Relation::Modalities, patch.modality_ids.as_deref().unwrap_or(empty)),
                (Relation::MlTasks, patch.ml_task_ids.as_deref().unwrap_or(empty)),
                (Relation::Tags, patch.tag_ids.as_deref().unwrap_or(empty)),
            ],
        )?;

        let dataset = state.datasets.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if let Some(title) = patch.title {
            dataset.title = title;
        }
        if let Some(description) = patch.description {
            dataset.description = Some(description);
        }
        if let Some(path) = patch.external_path {
            dataset.external_path = Some(path);
        }
        if let Some(path) = patch.local_path {
            dataset.local_path = Some(path);
        }
        if let Some(count) = patch.record_count {
            dataset.record_count = Some(count);
        }
        if let Some(size) = patch.size {
            dataset.size = Some(size);
        }
        if let Some(license) = patch.license {
            dataset.license = Some(license);
        }
        if let Some(area) = patch.anatomical_area_id {
            dataset.anatomical_area_id = Some(area);
        }
        dataset.readme_content = None;
        dataset.updated_at = Utc::now();

        for (relation, ids) in [
            (Relation::Modalities, patch.modality_ids),
            (Relation::MlTasks, patch.ml_task_ids),
            (Relation::Tags, patch.tag_ids),
        ] {
            if let Some(ids) = ids {
                state.replace_links(relation, id, &ids);
            }
        }

        let dataset = state.datasets.get(&id).ok_or(StoreError::NotFound(id))?;
        Ok(state.view(dataset))
    }

    async fn readme_content(&self, id: i64) -> StoreResult<Option<String>> {
        let state = self.state.read().await;
        state
            .datasets
            .get(&id)
            .map(|d| d.readme_content.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn store_readme(&self, id: i64, content: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let dataset = state.datasets.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        dataset.readme_content = Some(content.to_string());
        Ok(())
    }

    async fn filter_options(&self) -> StoreResult<FilterOptions> {
        let state = self.state.read().await;
        Ok(FilterOptions {
            anatomical_areas: state.areas.entries(),
            modalities: state.modalities.entries(),
            ml_tasks: state.ml_tasks.entries(),
            tags: state.tags.entries(),
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
