//! Vendor automation registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::automation::{ScriptedVendor, VendorAutomation, VendorServices};
use crate::descriptor::VendorDescriptor;
use crate::error::VendorError;

/// Registered vendor automations keyed by vendor id.
pub struct VendorRegistry {
    items: DashMap<String, Arc<dyn VendorAutomation>>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// A [`ScriptedVendor`] for each descriptor.
    pub fn from_descriptors(
        descriptors: Vec<VendorDescriptor>,
        services: Arc<VendorServices>,
    ) -> Result<Self, VendorError> {
        let registry = Self::new();
        for descriptor in descriptors {
            registry.register(Arc::new(ScriptedVendor::new(descriptor, Arc::clone(&services))))?;
        }
        Ok(registry)
    }

    /// Returns an error if the id is already taken.
    pub fn register(&self, vendor: Arc<dyn VendorAutomation>) -> Result<(), VendorError> {
        let id = vendor.id().to_string();
        match self.items.entry(id) {
            Entry::Occupied(entry) => {
                Err(VendorError::AlreadyRegistered(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                entry.insert(vendor);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn VendorAutomation>> {
        self.items.get(id).map(|item| Arc::clone(item.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.iter().map(|item| item.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Descriptors of every registered vendor, sorted by id.
    pub fn descriptors(&self) -> Vec<VendorDescriptor> {
        let mut descriptors: Vec<VendorDescriptor> = self
            .items
            .iter()
            .map(|item| item.value().descriptor().clone())
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
