//! In-memory data service.
//!
//! Reference implementation of [`DataService`]: a fixed catalogue loaded
//! up front. Useful for tests, for embedding a local product library, and
//! (when built editable) as the write-back target for reviewed choices.
//!
//! ## Limitations
//!
//! - Queries before `login` fail with `ServiceUnavailable`, mirroring a
//!   remote database without a session.
//! - Product ids are not checked for uniqueness on `add_product`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;

use super::{DataService, EditableDataService};
use crate::product::{PhaseProfile, ProductRecord, ProfileSet};
use crate::{Error, Result};

pub struct MemoryDataService {
    name: String,
    editable: bool,
    connected: AtomicBool,
    products: RwLock<Vec<ProductRecord>>,
    /// product id → profile sets served as its children
    children: RwLock<HashMap<String, Vec<ProfileSet>>>,
    phase_profiles: RwLock<HashMap<String, PhaseProfile>>,
    request_date: RwLock<Option<NaiveDate>>,
}

impl MemoryDataService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            editable: false,
            connected: AtomicBool::new(false),
            products: RwLock::new(Vec::new()),
            children: RwLock::new(HashMap::new()),
            phase_profiles: RwLock::new(HashMap::new()),
            request_date: RwLock::new(None),
        }
    }

    /// A service that also implements [`EditableDataService`].
    pub fn editable(name: impl Into<String>) -> Self {
        Self { editable: true, ..Self::new(name) }
    }

    /// Add a catalogue entry. Profile sets embedded in the record are
    /// served as its children.
    pub fn with_product(self, mut record: ProductRecord) -> Self {
        let sets = std::mem::take(&mut record.profile_sets);
        if !sets.is_empty() {
            self.children.write().insert(record.id.clone(), sets);
        }
        self.products.write().push(record);
        self
    }

    pub fn with_phase_profile(self, profile: PhaseProfile) -> Self {
        self.phase_profiles.write().insert(profile.id.clone(), profile);
        self
    }

    pub fn product_count(&self) -> usize {
        self.products.read().len()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::ServiceUnavailable {
                service: self.name.clone(),
                reason: "not logged in".into(),
            })
        }
    }
}

#[async_trait]
impl DataService for MemoryDataService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn login(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn list_all_products(&self) -> Result<Vec<ProductRecord>> {
        self.ensure_connected()?;
        Ok(self.products.read().clone())
    }

    async fn list_child_products(&self, product: &ProductRecord) -> Result<Vec<ProfileSet>> {
        self.ensure_connected()?;
        Ok(self.children.read().get(&product.id).cloned().unwrap_or_default())
    }

    async fn list_phase_profiles(&self, ids: &[String]) -> Result<Vec<PhaseProfile>> {
        self.ensure_connected()?;
        let profiles = self.phase_profiles.read();
        Ok(ids.iter().filter_map(|id| profiles.get(id).cloned()).collect())
    }

    fn as_editable(&self) -> Option<&dyn EditableDataService> {
        if self.editable { Some(self) } else { None }
    }
}

#[async_trait]
impl EditableDataService for MemoryDataService {
    fn request_date(&self) -> Option<NaiveDate> {
        *self.request_date.read()
    }

    fn set_request_date(&self, date: NaiveDate) {
        *self.request_date.write() = Some(date);
    }

    async fn add_product(&self, mut record: ProductRecord) -> Result<()> {
        let sets = std::mem::take(&mut record.profile_sets);
        if !sets.is_empty() {
            self.children.write().insert(record.id.clone(), sets);
        }
        self.products.write().push(record);
        Ok(())
    }

    async fn update_product(&self, mut record: ProductRecord) -> Result<bool> {
        let sets = std::mem::take(&mut record.profile_sets);
        let mut products = self.products.write();
        let Some(existing) = products.iter_mut().find(|p| p.id == record.id) else {
            return Ok(false);
        };
        if !sets.is_empty() {
            self.children.write().insert(record.id.clone(), sets);
        }
        *existing = record;
        Ok(true)
    }
}
