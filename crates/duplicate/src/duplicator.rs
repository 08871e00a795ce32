//! The duplication engine
//!
//! [`Duplicator::save_as_duplicate`] clones a root record and, unless deep
//! duplication is disabled, the records attached to it through child-like and
//! pivoted relations. All writes of one duplication share a single store
//! transaction; the `duplicating` hooks run before it begins and the
//! `duplicated` hooks after it commits.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{DuplicatorConfig, RelationUniqueScope};
use crate::error::{DuplicateError, DuplicateResult};
use crate::model::{Duplicable, ModelDefinition, TimestampColumns};
use crate::observers::DuplicationHooks;
use crate::options::DuplicateOptions;
use crate::pivot::extract_pivot_attributes;
use crate::record::Record;
use crate::relationships::{classify, RelationClass, RelationshipMetadata, RelationshipRegistry};
use crate::store::{DuplicationStore, ExistsScope, StoreTransaction, StoreUniqueCheck};
use crate::unique::make_unique_within;
use crate::value::DatabaseValue;

/// Outcome of a duplication request
#[derive(Debug, Clone, PartialEq)]
pub enum Duplication<T> {
    /// The persisted clone
    Duplicated(T),
    /// A `duplicating` hook cancelled the request; nothing was written
    Vetoed,
}

impl<T> Duplication<T> {
    pub fn is_vetoed(&self) -> bool {
        matches!(self, Duplication::Vetoed)
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            Duplication::Duplicated(value) => Some(value),
            Duplication::Vetoed => None,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Duplication::Duplicated(value) => Some(value),
            Duplication::Vetoed => None,
        }
    }
}

#[derive(Debug, Default)]
struct DuplicationSummary {
    children: usize,
    attachments: usize,
}

/// Duplicates records and their relations against a [`DuplicationStore`]
pub struct Duplicator<S> {
    store: S,
    hooks: DuplicationHooks,
    registry: RelationshipRegistry,
    config: DuplicatorConfig,
}

impl<S: DuplicationStore> Duplicator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            hooks: DuplicationHooks::new(),
            registry: RelationshipRegistry::new(),
            config: DuplicatorConfig::default(),
        }
    }

    pub fn with_config(store: S, config: DuplicatorConfig) -> DuplicateResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(store)
        })
    }

    /// Share model definitions with other duplicators
    pub fn with_registry(mut self, registry: RelationshipRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hooks(&self) -> &DuplicationHooks {
        &self.hooks
    }

    pub fn registry(&self) -> &RelationshipRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DuplicatorConfig {
        &self.config
    }

    /// Duplicate a typed model with the options it declares for itself
    pub async fn duplicate<M: Duplicable>(&self, model: &M) -> DuplicateResult<Duplication<M>> {
        let options = model.duplicate_options();
        self.duplicate_with(model, &options).await
    }

    /// Duplicate a typed model with explicit options.
    ///
    /// Only the primary key is taken from `model`. The root is the stored row,
    /// so columns the struct does not declare are copied too and every value
    /// keeps the type the store reports.
    pub async fn duplicate_with<M: Duplicable>(
        &self,
        model: &M,
        options: &DuplicateOptions,
    ) -> DuplicateResult<Duplication<M>> {
        let definition = M::model_definition();
        let key = Record::from_model(definition.table.clone(), model)?
            .primary_key(&definition.primary_key)
            .cloned()
            .ok_or_else(|| DuplicateError::MissingPrimaryKey {
                table: definition.table.clone(),
            })?;
        let root = self.load(&definition, &key).await?;

        match self.save_as_duplicate(&definition, &root, options).await? {
            Duplication::Duplicated(record) => Ok(Duplication::Duplicated(record.into_model()?)),
            Duplication::Vetoed => Ok(Duplication::Vetoed),
        }
    }

    /// Read the stored row of `model` whose primary key holds `key`
    pub async fn load(&self, model: &ModelDefinition, key: &DatabaseValue) -> DuplicateResult<Record> {
        let mut transaction = self.store.begin(&self.config.transaction).await?;
        let row = transaction.fetch(&model.table, &model.primary_key, key).await;
        // read only, nothing to keep
        transaction.rollback().await?;

        row?.ok_or_else(|| DuplicateError::NotFound {
            table: model.table.clone(),
            key: key.to_string(),
        })
    }

    /// Duplicate a record of a model registered in this duplicator's registry
    pub async fn duplicate_registered(
        &self,
        model_name: &str,
        root: &Record,
        options: &DuplicateOptions,
    ) -> DuplicateResult<Duplication<Record>> {
        let definition = self.registry.model(model_name).ok_or_else(|| {
            DuplicateError::configuration(format!("Model '{}' is not registered", model_name))
        })?;

        self.save_as_duplicate(&definition, root, options).await
    }

    /// Persist a clone of `root` and, with deep duplication, of its relations.
    ///
    /// `root` itself is never modified. On any failure every write made for
    /// this duplication is rolled back and the error is returned.
    pub async fn save_as_duplicate(
        &self,
        model: &ModelDefinition,
        root: &Record,
        options: &DuplicateOptions,
    ) -> DuplicateResult<Duplication<Record>> {
        if root.primary_key(&model.primary_key).is_none() {
            return Err(DuplicateError::MissingPrimaryKey {
                table: model.table.clone(),
            });
        }

        if self
            .hooks
            .trigger_duplicating(&model.name, root)
            .await
            .is_veto()
        {
            info!("Duplication of '{}' vetoed by a duplicating hook", model.name);
            return Ok(Duplication::Vetoed);
        }

        let mut transaction = self.store.begin(&self.config.transaction).await?;

        let result = self
            .duplicate_graph(transaction.as_mut(), model, root, options)
            .await;

        let (duplicate, summary) = match result {
            Ok(result) => result,
            Err(error) => {
                warn!("Duplication of '{}' failed: {}", model.name, error);
                if let Err(rollback_error) = transaction.rollback().await {
                    warn!(
                        "Rollback after failed duplication of '{}' also failed: {}",
                        model.name, rollback_error
                    );
                }
                return Err(error);
            }
        };

        transaction.commit().await?;

        info!(
            "Duplicated '{}' as {} = {} with {} child record(s) and {} attachment(s)",
            model.name,
            model.primary_key,
            duplicate
                .get(&model.primary_key)
                .unwrap_or(&DatabaseValue::Null),
            summary.children,
            summary.attachments
        );

        self.hooks
            .trigger_duplicated(&model.name, root, &duplicate)
            .await;

        Ok(Duplication::Duplicated(duplicate))
    }

    async fn duplicate_graph(
        &self,
        transaction: &mut dyn StoreTransaction,
        model: &ModelDefinition,
        root: &Record,
        options: &DuplicateOptions,
    ) -> DuplicateResult<(Record, DuplicationSummary)> {
        let mut except = vec![model.primary_key.as_str()];
        except.extend(timestamp_columns(model.timestamps.as_ref()));
        except.extend(options.excluded_columns().iter().map(String::as_str));

        let mut clone = root.replicate(except);
        self.apply_unique_columns(
            &mut *transaction,
            &mut clone,
            options.unique_column_names(),
            &model.table,
            &ExistsScope::Table,
        )
        .await?;
        stamp_timestamps(&mut clone, model.timestamps.as_ref());

        let duplicate = transaction
            .insert(clone, Some(model.primary_key.as_str()))
            .await?;
        debug!(
            "Inserted duplicate of '{}' into '{}'",
            model.name, model.table
        );

        let mut summary = DuplicationSummary::default();
        if !options.should_duplicate_deeply() {
            return Ok((duplicate, summary));
        }

        for relation in classify(model) {
            if options.is_relation_excluded(relation.name()) {
                debug!("Relation '{}' excluded from duplication", relation.name());
                continue;
            }

            match relation.class {
                RelationClass::ChildLike => {
                    summary.children += self
                        .duplicate_children(
                            &mut *transaction,
                            root,
                            &duplicate,
                            &relation.metadata,
                            options,
                        )
                        .await?;
                }
                RelationClass::Pivoted => {
                    summary.attachments += self
                        .duplicate_attachments(
                            &mut *transaction,
                            root,
                            &duplicate,
                            &relation.metadata,
                        )
                        .await?;
                }
                RelationClass::Unsupported => {
                    debug!(
                        "Relation '{}' ({:?}) is not duplicated",
                        relation.name(),
                        relation.metadata.relationship_type
                    );
                }
            }
        }

        Ok((duplicate, summary))
    }

    async fn duplicate_children(
        &self,
        transaction: &mut dyn StoreTransaction,
        root: &Record,
        duplicate: &Record,
        relation: &RelationshipMetadata,
        options: &DuplicateOptions,
    ) -> DuplicateResult<usize> {
        let Some((parent_key, new_parent_key)) = relation_keys(root, duplicate, relation) else {
            return Ok(0);
        };

        let mut related = transaction.fetch_related(relation, &parent_key).await?;
        if !relation.relationship_type.is_collection() {
            related.truncate(1);
        }

        let mut except = vec![relation.related_primary_key.as_str()];
        except.extend(timestamp_columns(relation.related_timestamps.as_ref()));
        except.extend(
            options
                .excluded_columns_for(&relation.name)
                .iter()
                .map(String::as_str),
        );

        let scope = match self.config.relation_unique_scope {
            RelationUniqueScope::Parent => ExistsScope::Parent {
                foreign_key: relation.foreign_key.column.clone(),
                parent: new_parent_key.clone(),
            },
            RelationUniqueScope::Table => ExistsScope::Table,
        };

        let count = related.len();
        for item in related {
            let mut child = item.record.replicate(except.iter().copied());
            child.set(relation.foreign_key.column.clone(), new_parent_key.clone());

            self.apply_unique_columns(
                &mut *transaction,
                &mut child,
                options.unique_columns_for(&relation.name),
                &relation.related_table,
                &scope,
            )
            .await?;
            stamp_timestamps(&mut child, relation.related_timestamps.as_ref());

            transaction
                .insert(child, Some(relation.related_primary_key.as_str()))
                .await?;
        }

        debug!("Duplicated {} record(s) of relation '{}'", count, relation.name);
        Ok(count)
    }

    async fn duplicate_attachments(
        &self,
        transaction: &mut dyn StoreTransaction,
        root: &Record,
        duplicate: &Record,
        relation: &RelationshipMetadata,
    ) -> DuplicateResult<usize> {
        let pivot = relation.pivot_config.as_ref().ok_or_else(|| {
            DuplicateError::Relationship(format!(
                "Relation '{}' has no pivot configuration",
                relation.name
            ))
        })?;

        let Some((parent_key, new_parent_key)) = relation_keys(root, duplicate, relation) else {
            return Ok(0);
        };

        let related = transaction.fetch_related(relation, &parent_key).await?;
        let count = related.len();

        for item in related {
            let related_key = item
                .pivot
                .as_ref()
                .and_then(|row| row.primary_key(&pivot.foreign_key))
                .or_else(|| item.record.primary_key(&relation.related_primary_key))
                .cloned()
                .ok_or_else(|| DuplicateError::MissingPrimaryKey {
                    table: relation.related_table.clone(),
                })?;

            let mut attributes = item
                .pivot
                .as_ref()
                .map(|row| extract_pivot_attributes(row, pivot))
                .unwrap_or_default();
            if let Some(timestamps) = pivot.timestamps.as_ref() {
                let now = DatabaseValue::DateTime(Utc::now());
                attributes.insert(timestamps.created_at.clone(), now.clone());
                attributes.insert(timestamps.updated_at.clone(), now);
            }

            transaction
                .attach(pivot, &new_parent_key, &related_key, attributes)
                .await?;
        }

        debug!("Re-attached {} record(s) of relation '{}'", count, relation.name);
        Ok(count)
    }

    async fn apply_unique_columns(
        &self,
        transaction: &mut dyn StoreTransaction,
        record: &mut Record,
        columns: &[String],
        table: &str,
        scope: &ExistsScope,
    ) -> DuplicateResult<()> {
        for column in columns {
            // Null and excluded columns have nothing to make unique.
            let Some(current) = record.get(column).and_then(DatabaseValue::to_unique_string) else {
                continue;
            };

            let mut check = StoreUniqueCheck::new(&mut *transaction, table, scope);
            let unique = make_unique_within(
                &current,
                column,
                &mut check,
                self.config.max_unique_attempts,
            )
            .await?;

            if unique != current {
                record.set(column.clone(), unique);
            }
        }
        Ok(())
    }
}

/// Local key of the original parent and of its duplicate for `relation`
fn relation_keys(
    root: &Record,
    duplicate: &Record,
    relation: &RelationshipMetadata,
) -> Option<(DatabaseValue, DatabaseValue)> {
    let parent_key = root.primary_key(&relation.local_key)?;
    match duplicate.primary_key(&relation.local_key) {
        Some(new_parent_key) => Some((parent_key.clone(), new_parent_key.clone())),
        None => {
            warn!(
                "Duplicate has no value for local key '{}' of relation '{}'",
                relation.local_key, relation.name
            );
            None
        }
    }
}

fn timestamp_columns(timestamps: Option<&TimestampColumns>) -> Vec<&str> {
    timestamps
        .map(|timestamps| timestamps.columns().to_vec())
        .unwrap_or_default()
}

fn stamp_timestamps(record: &mut Record, timestamps: Option<&TimestampColumns>) {
    if let Some(timestamps) = timestamps {
        let now = DatabaseValue::DateTime(Utc::now());
        record.set(timestamps.created_at.clone(), now.clone());
        record.set(timestamps.updated_at.clone(), now);
    }
}
