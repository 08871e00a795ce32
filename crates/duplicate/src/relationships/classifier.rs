//! Relation classification - decides how each declared relation is duplicated

use tracing::warn;

use super::metadata::{RelationshipMetadata, RelationshipType};
use crate::model::ModelDefinition;

/// How a relation is handled during duplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationClass {
    /// One-to-one / one-to-many: related rows are owned and copied outright
    ChildLike,
    /// Many-to-many: only a new association row is created
    Pivoted,
    /// Anything else: skipped
    Unsupported,
}

impl RelationClass {
    pub fn of(relationship_type: RelationshipType) -> Self {
        match relationship_type {
            RelationshipType::HasOne | RelationshipType::HasMany => RelationClass::ChildLike,
            RelationshipType::ManyToMany => RelationClass::Pivoted,
            RelationshipType::BelongsTo
            | RelationshipType::MorphOne
            | RelationshipType::MorphMany
            | RelationshipType::MorphTo
            | RelationshipType::HasManyThrough => RelationClass::Unsupported,
        }
    }

    pub fn is_child(self) -> bool {
        self == RelationClass::ChildLike
    }

    pub fn is_pivoted(self) -> bool {
        self == RelationClass::Pivoted
    }
}

/// A declared relation together with its classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedRelation {
    pub class: RelationClass,
    pub metadata: RelationshipMetadata,
}

impl ClassifiedRelation {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Classify every relation the model declares, in declaration order.
///
/// A many-to-many relation without pivot configuration cannot be re-attached,
/// so it is reported as unsupported.
pub fn classify(model: &ModelDefinition) -> Vec<ClassifiedRelation> {
    model
        .relations
        .iter()
        .map(|metadata| {
            let mut class = RelationClass::of(metadata.relationship_type);

            if class.is_pivoted() && metadata.pivot_config.is_none() {
                warn!(
                    "Relation '{}' on model '{}' has no pivot configuration and will not be duplicated",
                    metadata.name, model.name
                );
                class = RelationClass::Unsupported;
            }

            ClassifiedRelation {
                class,
                metadata: metadata.clone(),
            }
        })
        .collect()
}
