//! Relationship Registry - Runtime storage for model definitions and their relations

use std::sync::Arc;

use dashmap::DashMap;

use super::metadata::RelationshipMetadata;
use crate::error::{DuplicateError, DuplicateResult};
use crate::model::ModelDefinition;

/// Thread-safe registry of model definitions, keyed by model name
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    models: Arc<DashMap<String, ModelDefinition>>,
}

impl RelationshipRegistry {
    /// Create a new empty relationship registry
    pub fn new() -> Self {
        Self {
            models: Arc::new(DashMap::new()),
        }
    }

    /// Register (or replace) a model definition
    pub fn register_model(&self, definition: ModelDefinition) -> DuplicateResult<()> {
        definition.validate().map_err(|e| {
            DuplicateError::Configuration(format!(
                "Validation failed for model '{}': {}",
                definition.name, e
            ))
        })?;

        self.models.insert(definition.name.clone(), definition);
        Ok(())
    }

    /// Register a relationship on an already registered model.
    ///
    /// A relation with the same name is replaced in place, so declaration order
    /// is kept stable.
    pub fn register(&self, model_name: &str, metadata: RelationshipMetadata) -> DuplicateResult<()> {
        metadata.validate()?;

        let mut model = self.models.get_mut(model_name).ok_or_else(|| {
            DuplicateError::Configuration(format!("Model '{}' is not registered", model_name))
        })?;

        match model
            .relations
            .iter_mut()
            .find(|existing| existing.name == metadata.name)
        {
            Some(existing) => *existing = metadata,
            None => model.relations.push(metadata),
        }

        Ok(())
    }

    /// Get a model definition by name
    pub fn model(&self, model_name: &str) -> Option<ModelDefinition> {
        self.models.get(model_name).map(|entry| entry.clone())
    }

    /// Get relationship metadata by model and relationship name
    pub fn get(&self, model_name: &str, relationship_name: &str) -> Option<RelationshipMetadata> {
        self.models
            .get(model_name)?
            .find_relation(relationship_name)
            .cloned()
    }

    /// Get all relationships for a model, in declaration order
    pub fn get_all_for_model(&self, model_name: &str) -> Vec<RelationshipMetadata> {
        self.models
            .get(model_name)
            .map(|model| model.relations.clone())
            .unwrap_or_default()
    }

    /// Check if a relationship exists
    pub fn has_relationship(&self, model_name: &str, relationship_name: &str) -> bool {
        self.get(model_name, relationship_name).is_some()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }
}
