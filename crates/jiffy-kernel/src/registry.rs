//! Partition registry (spec.md §4.5 "Partition registry").
//!
//! Grounded on the original `partition_manager`/`REGISTER_IMPLEMENTATION`
//! macro pair, expressed here as a trait object registry rather than macro
//! magic — the same shape the teacher uses for its pluggable storage
//! backends.

use std::collections::HashMap;
use std::sync::Arc;

use crate::partition::{KernelError, Partition};

/// Constructs a partition of one kind from its `(name, metadata)` pair.
pub trait PartitionBuilder: Send + Sync {
    fn build(&self, name: &str, metadata: &str) -> Result<Arc<dyn Partition>, KernelError>;
}

/// Maps partition type names (e.g. `"hashtable"`) to their builders, so a
/// block request handler can instantiate the right partition kind for an
/// incoming `put_block` without a compile-time dependency on every kind.
#[derive(Default)]
pub struct PartitionRegistry {
    builders: HashMap<String, Box<dyn PartitionBuilder>>,
}

impl PartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: impl Into<String>, builder: Box<dyn PartitionBuilder>) -> &mut Self {
        self.builders.insert(type_name.into(), builder);
        self
    }

    pub fn build(
        &self,
        type_name: &str,
        name: &str,
        metadata: &str,
    ) -> Result<Arc<dyn Partition>, RegistryError> {
        let builder = self
            .builders
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))?;
        builder
            .build(name, metadata)
            .map_err(|e| RegistryError::Build(type_name.to_string(), e))
    }

    pub fn known_types(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no partition builder registered for type {0:?}")]
    UnknownType(String),

    #[error("failed to build partition of type {0:?}: {1}")]
    Build(String, #[source] KernelError),
}

/// The `hashtable` partition kind, built with default thresholds.
pub struct HashTableBuilder {
    pub config: crate::hash_table::HashTableConfig,
}

impl Default for HashTableBuilder {
    fn default() -> Self {
        Self {
            config: crate::hash_table::HashTableConfig::default(),
        }
    }
}

impl PartitionBuilder for HashTableBuilder {
    fn build(&self, name: &str, metadata: &str) -> Result<Arc<dyn Partition>, KernelError> {
        let partition = crate::hash_table::HashTablePartition::new(name, metadata, self.config)?;
        Ok(Arc::new(partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_registered_hashtable_partition() {
        let mut registry = PartitionRegistry::new();
        registry.register("hashtable", Box::new(HashTableBuilder::default()));
        let partition = registry.build("hashtable", "0_65536", "regular").unwrap();
        assert_eq!(partition.storage_size(), 0);
    }

    #[test]
    fn unknown_type_errors() {
        let registry = PartitionRegistry::new();
        assert!(matches!(
            registry.build("nope", "0_65536", "regular"),
            Err(RegistryError::UnknownType(_))
        ));
    }
}
