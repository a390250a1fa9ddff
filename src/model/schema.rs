use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::core::{ModelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `local_key` on this record holds the id of one foreign record.
    One,
    /// `local_key` on the foreign table holds this record's id.
    Many,
}

/// Join from one model to another, declared on the owning model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub local_key: String,
    pub foreign: String,
    pub cardinality: Cardinality,
}

impl Relation {
    pub fn one(local_key: impl Into<String>, foreign: impl Into<String>) -> Self {
        Self {
            local_key: local_key.into(),
            foreign: foreign.into(),
            cardinality: Cardinality::One,
        }
    }

    pub fn many(local_key: impl Into<String>, foreign: impl Into<String>) -> Self {
        Self {
            local_key: local_key.into(),
            foreign: foreign.into(),
            cardinality: Cardinality::Many,
        }
    }
}

/// Static description of one model: where its rows live and how it joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDef {
    kind: String,
    table: String,
    primary_key: String,
    relations: BTreeMap<String, Relation>,
    read_only: bool,
}

impl ModelDef {
    pub fn new(kind: impl Into<String>, table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            table: table.into(),
            primary_key: primary_key.into(),
            relations: BTreeMap::new(),
            read_only: false,
        }
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    /// Instances of a read-only model ignore every mutation.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(name, rel)| (name.as_str(), rel))
    }
}

/// Every model known to a data source, by kind.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: HashMap<String, Arc<ModelDef>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: ModelDef) -> Result<()> {
        if self.models.contains_key(def.kind()) {
            return Err(ModelError::ConstraintViolation(format!(
                "Model '{}' is already registered",
                def.kind()
            )));
        }
        self.models.insert(def.kind().to_string(), Arc::new(def));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Result<Arc<ModelDef>> {
        self.models
            .get(kind)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.models.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_def_builder() {
        let def = ModelDef::new("route", "routes", "route_id")
            .relation("agency", Relation::one("agency_id", "agency"))
            .relation("trips", Relation::many("route_id", "trip"));

        assert_eq!(def.table(), "routes");
        assert_eq!(def.primary_key(), "route_id");
        assert_eq!(def.get_relation("agency").unwrap().cardinality, Cardinality::One);
        assert_eq!(def.get_relation("trips").unwrap().foreign, "trip");
        assert!(def.get_relation("stops").is_none());
        assert!(!def.is_read_only());
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let mut catalog = Catalog::new();
        catalog.register(ModelDef::new("route", "routes", "id")).unwrap();
        assert!(catalog.register(ModelDef::new("route", "other", "id")).is_err());
        assert!(matches!(catalog.get("trip"), Err(ModelError::UnknownModel(_))));
        assert_eq!(catalog.get("route").unwrap().table(), "routes");
    }
}
