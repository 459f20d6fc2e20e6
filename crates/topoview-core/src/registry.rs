//! Lookup tables for resolving entities named by something other than their id.
//!
//! Update messages identify their target through filter predicates, which may
//! use the node name instead of its id, and channels reference nodes through
//! interface identifiers. The [`EntityRegistry`] keeps the id↔name bijection
//! and the interface→node map that make these lookups possible.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{CoreError, Result};
use crate::logging::targets;
use crate::protocol::Filter;

/// How conflicting registrations are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    /// A re-registration under a different name overwrites the old one.
    #[default]
    Permissive,
    /// A re-registration under a different name fails with `DuplicateId`.
    Strict,
}

/// Bidirectional id↔name and interface→node lookup tables.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    mode: RegistryMode,
    names: HashMap<EntityId, String>,
    ids: HashMap<String, EntityId>,
    interfaces: HashMap<String, EntityId>,
    edge_capacities: HashMap<EntityId, f64>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new(mode: RegistryMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// The conflict mode.
    pub fn mode(&self) -> RegistryMode {
        self.mode
    }

    /// Register a node under `name` and map each interface to it.
    ///
    /// Registering the same id and name again is a no-op apart from adding
    /// interfaces. In strict mode a different name for a known id fails with
    /// `DuplicateId`, and a name held by another id fails with `DuplicateName`.
    /// In permissive mode both overwrite: the old name is dropped, or the name
    /// moves to the new id, so that id↔name stays a bijection.
    pub fn register_node<I, S>(&mut self, id: EntityId, name: &str, interfaces: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(existing) = self.names.get(&id)
            && existing != name
        {
            if self.mode == RegistryMode::Strict {
                return Err(CoreError::DuplicateId {
                    id,
                    existing: existing.clone(),
                    requested: name.to_string(),
                });
            }
            tracing::debug!(target: targets::REGISTRY, %id, old = %existing, new = name, "node re-registered under a new name");
        }
        self.check_name_free(&id, name)?;

        self.bind_name(id.clone(), name);

        for interface in interfaces {
            let interface = interface.into();
            if let Some(previous) = self.interfaces.insert(interface.clone(), id.clone())
                && previous != id
            {
                tracing::debug!(target: targets::REGISTRY, %interface, from = %previous, to = %id, "interface moved to another node");
            }
        }

        Ok(())
    }

    /// Change the name of a registered node.
    ///
    /// Unknown ids are registered with the new name. In strict mode a name
    /// held by another id is refused.
    pub fn rename(&mut self, id: &EntityId, name: &str) -> Result<()> {
        self.check_name_free(id, name)?;
        self.bind_name(id.clone(), name);
        Ok(())
    }

    fn check_name_free(&self, id: &EntityId, name: &str) -> Result<()> {
        match self.ids.get(name) {
            Some(holder) if holder != id && self.mode == RegistryMode::Strict => {
                Err(CoreError::DuplicateName {
                    name: name.to_string(),
                    holder: holder.clone(),
                    requested: id.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn bind_name(&mut self, id: EntityId, name: &str) {
        if let Some(old_name) = self.names.get(&id)
            && old_name != name
            && self.ids.get(old_name) == Some(&id)
        {
            self.ids.remove(old_name);
        }

        if let Some(old_id) = self.ids.get(name)
            && *old_id != id
        {
            tracing::debug!(target: targets::REGISTRY, name, from = %old_id, to = %id, "name moved to another node");
            self.names.remove(old_id);
        }

        self.ids.insert(name.to_string(), id.clone());
        self.names.insert(id, name.to_string());
    }

    /// Resolve the target of an update from its filter.
    ///
    /// Only equality predicates are considered. An `id` predicate wins over
    /// everything else; otherwise a `name` predicate is looked up. Anything
    /// else fails with `AmbiguousTarget`.
    pub fn resolve_by_filter(&self, filter: &Filter) -> Result<EntityId> {
        let equalities = filter.equalities();

        let resolved = if let Some(id) = equalities.get("id") {
            EntityId::from_value(id)
        } else if let Some(name) = equalities.get("name") {
            name.as_str().and_then(|name| self.ids.get(name)).cloned()
        } else {
            None
        };

        resolved.ok_or_else(|| CoreError::AmbiguousTarget {
            filter: filter.to_string(),
        })
    }

    /// Name of a node.
    pub fn name_of(&self, id: &EntityId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Id of a node by name.
    pub fn id_of(&self, name: &str) -> Option<&EntityId> {
        self.ids.get(name)
    }

    /// The node owning an interface.
    pub fn node_for_interface(&self, interface: &str) -> Option<&EntityId> {
        self.interfaces.get(interface)
    }

    /// Remember the nominal capacity of an edge.
    pub fn record_edge_capacity(&mut self, id: EntityId, capacity: f64) {
        self.edge_capacities.insert(id, capacity);
    }

    /// Nominal capacity of an edge.
    pub fn edge_capacity(&self, id: &EntityId) -> Option<f64> {
        self.edge_capacities.get(id).copied()
    }

    /// Number of named nodes.
    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Number of known interfaces.
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }
}
