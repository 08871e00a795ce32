//! Duplication options
//!
//! [`DuplicateOptions`] is built once per duplication and only read while the
//! duplication runs. Unset options mean "no restriction". Column and relation
//! names are not validated; names that match nothing are ignored.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DuplicateError, DuplicateResult};

/// Options controlling what a duplication copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateOptions {
    excluded_columns: Vec<String>,
    unique_columns: Vec<String>,
    excluded_relations: Vec<String>,
    excluded_relation_columns: HashMap<String, Vec<String>>,
    unique_relation_columns: HashMap<String, Vec<String>>,
    deep_duplication: bool,
}

impl Default for DuplicateOptions {
    fn default() -> Self {
        Self {
            excluded_columns: Vec::new(),
            unique_columns: Vec::new(),
            excluded_relations: Vec::new(),
            excluded_relation_columns: HashMap::new(),
            unique_relation_columns: HashMap::new(),
            deep_duplication: true,
        }
    }
}

fn ordered_set<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut set: Vec<String> = Vec::new();
    for item in items {
        let item = item.into();
        if !set.contains(&item) {
            set.push(item);
        }
    }
    set
}

impl DuplicateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns of the root record left out of the copy
    pub fn exclude_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns = ordered_set(columns);
        self
    }

    /// Columns of the root record that get a `" (n)"` suffix until unique, in order
    pub fn unique_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_columns = ordered_set(columns);
        self
    }

    /// Relations that are not walked at all
    pub fn exclude_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_relations = ordered_set(relations);
        self
    }

    /// Columns left out when copying the rows of `relation`
    pub fn exclude_relation_columns<I, S>(mut self, relation: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_relation_columns
            .insert(relation.into(), ordered_set(columns));
        self
    }

    /// Columns made unique when copying the rows of `relation`
    pub fn unique_relation_columns<I, S>(mut self, relation: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_relation_columns
            .insert(relation.into(), ordered_set(columns));
        self
    }

    /// Copy only the root record
    pub fn disable_deep_duplication(mut self) -> Self {
        self.deep_duplication = false;
        self
    }

    pub fn enable_deep_duplication(mut self) -> Self {
        self.deep_duplication = true;
        self
    }

    pub fn excluded_columns(&self) -> &[String] {
        &self.excluded_columns
    }

    pub fn unique_column_names(&self) -> &[String] {
        &self.unique_columns
    }

    pub fn excluded_relations(&self) -> &[String] {
        &self.excluded_relations
    }

    pub fn is_relation_excluded(&self, relation: &str) -> bool {
        self.excluded_relations.iter().any(|name| name == relation)
    }

    pub fn excluded_columns_for(&self, relation: &str) -> &[String] {
        self.excluded_relation_columns
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn unique_columns_for(&self, relation: &str) -> &[String] {
        self.unique_relation_columns
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn should_duplicate_deeply(&self) -> bool {
        self.deep_duplication
    }

    /// Look up an option by name.
    ///
    /// Fails with [`DuplicateError::Configuration`] for a name that is not an option.
    pub fn option(&self, name: &str) -> DuplicateResult<OptionValue> {
        let name: OptionName = name.parse()?;

        Ok(match name {
            OptionName::ExcludedColumns => OptionValue::Columns(self.excluded_columns.clone()),
            OptionName::UniqueColumns => OptionValue::Columns(self.unique_columns.clone()),
            OptionName::ExcludedRelations => OptionValue::Columns(self.excluded_relations.clone()),
            OptionName::ExcludedRelationColumns => {
                OptionValue::RelationColumns(self.excluded_relation_columns.clone())
            }
            OptionName::UniqueRelationColumns => {
                OptionValue::RelationColumns(self.unique_relation_columns.clone())
            }
            OptionName::DeepDuplication => OptionValue::Flag(self.deep_duplication),
        })
    }
}

/// The named options of [`DuplicateOptions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionName {
    ExcludedColumns,
    UniqueColumns,
    ExcludedRelations,
    ExcludedRelationColumns,
    UniqueRelationColumns,
    DeepDuplication,
}

impl FromStr for OptionName {
    type Err = DuplicateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excluded_columns" | "excludedColumns" => Ok(OptionName::ExcludedColumns),
            "unique_columns" | "uniqueColumns" => Ok(OptionName::UniqueColumns),
            "excluded_relations" | "excludedRelations" => Ok(OptionName::ExcludedRelations),
            "excluded_relation_columns" | "excludedRelationColumns" => {
                Ok(OptionName::ExcludedRelationColumns)
            }
            "unique_relation_columns" | "uniqueRelationColumns" => {
                Ok(OptionName::UniqueRelationColumns)
            }
            "deep_duplication" | "deepDuplication" | "shouldDuplicateDeeply" => {
                Ok(OptionName::DeepDuplication)
            }
            other => Err(DuplicateError::Configuration(format!(
                "The option \"{}\" does not exist in DuplicateOptions",
                other
            ))),
        }
    }
}

/// Value of an option looked up by name
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Columns(Vec<String>),
    RelationColumns(HashMap<String, Vec<String>>),
    Flag(bool),
}
