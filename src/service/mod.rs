//! # Data services
//!
//! The contract between the resolution pipeline and any external product
//! database.
//!
//! ## Implementations
//!
//! | Service | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryDataService` | `memory` | In-memory catalogue, optionally editable |
//!
//! Empty results are answers, not failures. Only connectivity problems
//! (and malformed responses) come back as `Err`.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::product::{PhaseProfile, ProductRecord, ProfileSet};
use crate::Result;

pub use memory::MemoryDataService;

/// What a service can do beyond the required calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCapabilities {
    pub editable: bool,
}

/// Read access to an external product database.
///
/// Every call takes `&self`; sessions keep their state behind interior
/// mutability so one service can be shared between workers.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    // ========================================================================
    // Session
    // ========================================================================

    async fn login(&self) -> Result<()>;

    /// Warm caches after login. Default: nothing to do.
    async fn preload(&self) -> Result<()> {
        Ok(())
    }

    async fn logout(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    // ========================================================================
    // Queries
    // ========================================================================

    /// The full product catalogue (without profile detail).
    async fn list_all_products(&self) -> Result<Vec<ProductRecord>>;

    /// Profile sets belonging to a product.
    async fn list_child_products(&self, product: &ProductRecord) -> Result<Vec<ProfileSet>>;

    /// Phase profiles by id. Unknown ids are left out.
    async fn list_phase_profiles(&self, ids: &[String]) -> Result<Vec<PhaseProfile>>;

    // ========================================================================
    // Capability negotiation
    // ========================================================================

    /// Write access, when this service accepts new records.
    fn as_editable(&self) -> Option<&dyn EditableDataService> {
        None
    }

    fn capabilities(&self) -> ServiceCapabilities {
        ServiceCapabilities {
            editable: self.as_editable().is_some(),
        }
    }
}

/// A service that also accepts new and edited product records, so choices
/// made during review can be reused in later runs.
#[async_trait]
pub trait EditableDataService: DataService {
    /// Date the edits are registered under.
    fn request_date(&self) -> Option<NaiveDate>;

    fn set_request_date(&self, date: NaiveDate);

    async fn add_product(&self, record: ProductRecord) -> Result<()>;

    /// Replace the record with the same id. Returns false when there is none.
    async fn update_product(&self, record: ProductRecord) -> Result<bool>;
}
