//! # bim-mpg: building-model object store and product resolution
//!
//! Holds the element tree of a parsed building model, derives quantities
//! from its geometry, and binds elements to environmental product records
//! from one or more external databases.
//!
//! ## Design Principles
//!
//! 1. **Flat registry**: elements live in one table; parents are found by
//!    global id only, never owned
//! 2. **Absence is data**: missing measurements, unmapped types and
//!    out-of-bounds scaling come back as `None`, not as errors
//! 3. **Trait-first services**: `DataService` is the contract between the
//!    pipeline and any product database
//! 4. **Injected reference data**: impact categories and the
//!    classification table are passed in, never global
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bim_mpg::{
//!     CancellationToken, ElementDescriptor, MemoryDataService, ObjectStore,
//!     ResolutionPipeline, ResolverConfig, StoreSnapshot,
//! };
//!
//! # async fn example() -> bim_mpg::Result<()> {
//! let store = ObjectStore::new();
//! store.add_element(
//!     ElementDescriptor::new(1, "2O2Fr$t4X7Zf8NOew3FNr2")
//!         .typed("IfcWallStandardCase")
//!         .with_layer("brick", 0.1)
//!         .with_volume(4.2),
//! );
//!
//! let pipeline = ResolutionPipeline::new(ResolverConfig::default())
//!     .with_service(Arc::new(MemoryDataService::new("local")));
//! let report = pipeline.resolve(&store, &CancellationToken::new()).await?;
//! println!("{} bound, {} unresolved", report.bound.len(), report.unresolved.len());
//!
//! StoreSnapshot::from_store(&store).write_json(&mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Services
//!
//! | Service | Description |
//! |---------|-------------|
//! | `MemoryDataService` | In-memory catalogue for tests and local libraries, optionally editable |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod scaling;
pub mod product;
pub mod store;
pub mod service;
pub mod resolve;
pub mod report;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Element, ElementDescriptor, ElementKey, Layer, MaterialSource,
    Material, MaterialSpec, Geometry, VolumeState,
    ResolutionState, ProductBinding, BindingSource,
    Value, PropertyMap,
};

// ============================================================================
// Re-exports: Scaling and products
// ============================================================================

pub use scaling::{Scaler, ScalerKind, ScalingUnit, Bounds, AxisBounds};
pub use product::{
    ProductRecord, ProductUnit, ProfileSet,
    PhaseProfile, CategoryTable, ImpactCategory, CostFactor,
};

// ============================================================================
// Re-exports: Store, services, resolution
// ============================================================================

pub use store::ObjectStore;
pub use service::{DataService, EditableDataService, ServiceCapabilities, MemoryDataService};
pub use resolve::{
    ResolutionPipeline, ResolutionReport, ResolverConfig,
    ClassificationMap, CancellationToken,
};
pub use report::StoreSnapshot;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Service '{service}' unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("Service '{service}' fault: {message}")]
    ServiceFault { service: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
