//! # Product resolution
//!
//! Binds elements to external product records. For every element, in store
//! order:
//!
//! 1. Look up the element type in the [`ClassificationMap`]. An unmapped
//!    type ends resolution of that element.
//! 2. Ask each service in priority order for the first product whose
//!    classification code contains one of the mapped prefixes. No
//!    candidate means the next service is asked.
//! 3. Fetch the candidate's profile sets from the same service. A
//!    candidate without profile sets counts as no match.
//! 4. The first accepted record is bound to the element and, through the
//!    store, to its unbound descendants.
//!
//! Services are started before the loop and stopped after it, whatever
//! happened in between. A service fault abandons the rest of the run but
//! keeps the bindings made so far.

mod cancel;
mod config;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::model::{Element, ElementKey, ResolutionState};
use crate::product::ProductRecord;
use crate::service::{DataService, EditableDataService};
use crate::store::ObjectStore;
use crate::{Error, Result};

pub use cancel::CancellationToken;
pub use config::{ClassificationMap, ResolverConfig};

/// Outcome of one resolution run, by global id.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Bound directly during this run.
    pub bound: Vec<String>,
    /// Mapped, but no service produced a usable product.
    pub unresolved: Vec<String>,
    /// Type without a classification mapping.
    pub unmapped: Vec<String>,
    /// Already carried a binding.
    pub skipped: Vec<String>,
    pub cancelled: bool,
    /// The fault that ended the run early.
    pub aborted: Option<Error>,
}

impl ResolutionReport {
    /// Every element was visited.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.aborted.is_none()
    }
}

// ============================================================================
// ResolutionPipeline
// ============================================================================

pub struct ResolutionPipeline {
    services: Vec<Arc<dyn DataService>>,
    editor: Option<usize>,
    config: ResolverConfig,
}

impl ResolutionPipeline {
    pub fn new(config: ResolverConfig) -> Self {
        Self { services: Vec::new(), editor: None, config }
    }

    pub fn with_service(mut self, service: Arc<dyn DataService>) -> Self {
        self.add_service(service);
        self
    }

    /// Append a service at the lowest priority. An editable service becomes
    /// the editor, replacing any earlier one; having several is the
    /// caller's business.
    pub fn add_service(&mut self, service: Arc<dyn DataService>) {
        if service.as_editable().is_some() {
            self.editor = Some(self.services.len());
        }
        self.services.push(service);
    }

    pub fn services(&self) -> &[Arc<dyn DataService>] {
        &self.services
    }

    /// The service that accepts write-back of reviewed choices.
    pub fn editor(&self) -> Option<&dyn EditableDataService> {
        self.editor.and_then(|i| self.services[i].as_editable())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve every element of `store`.
    ///
    /// Returns `Err` only when a service cannot be started; services that
    /// did start are stopped again first. Faults during the loop end up in
    /// [`ResolutionReport::aborted`].
    #[tracing::instrument(
        skip_all,
        fields(elements = store.element_count(), services = self.services.len())
    )]
    pub async fn resolve(&self, store: &ObjectStore, cancel: &CancellationToken) -> Result<ResolutionReport> {
        for (i, service) in self.services.iter().enumerate() {
            if let Err(e) = self.start(service.as_ref()).await {
                error!(service = service.name(), error = %e, "service failed to start");
                self.stop(&self.services[..=i]).await;
                return Err(e);
            }
        }

        let mut report = ResolutionReport::default();
        if let Err(e) = self.resolve_elements(store, cancel, &mut report).await {
            error!(error = %e, bound = report.bound.len(), "resolution aborted, remaining elements left unresolved");
            report.aborted = Some(e);
        }

        self.stop(&self.services).await;
        info!(
            bound = report.bound.len(),
            unresolved = report.unresolved.len(),
            unmapped = report.unmapped.len(),
            skipped = report.skipped.len(),
            "resolution finished"
        );
        Ok(report)
    }

    async fn start(&self, service: &dyn DataService) -> Result<()> {
        self.call(service, "login", service.login()).await?;
        self.call(service, "preload", service.preload()).await?;
        info!(service = service.name(), "service started");
        Ok(())
    }

    async fn stop(&self, services: &[Arc<dyn DataService>]) {
        for service in services {
            let service = service.as_ref();
            match self.call(service, "logout", service.logout()).await {
                Ok(()) => info!(service = service.name(), "service stopped"),
                Err(e) => warn!(service = service.name(), error = %e, "logout failed"),
            }
        }
    }

    async fn resolve_elements(
        &self,
        store: &ObjectStore,
        cancel: &CancellationToken,
        report: &mut ResolutionReport,
    ) -> Result<()> {
        // Catalogues are fetched once per run, on first use.
        let mut catalogues: Vec<Option<Vec<ProductRecord>>> = vec![None; self.services.len()];
        let count = store.element_count();

        for index in 0..count {
            if cancel.is_cancelled() {
                info!(remaining = count - index, "resolution cancelled");
                report.cancelled = true;
                break;
            }

            let key = ElementKey(index);
            let Some(element) = store.get_element_by_key(key) else {
                break;
            };
            let guid = element.global_id();

            if self.config.skip_bound && element.binding().is_some() {
                debug!(guid, "already bound");
                report.skipped.push(guid.to_string());
                continue;
            }
            let Some(prefixes) = self.config.classification.prefixes(element.element_type()) else {
                debug!(guid, element_type = element.element_type(), "no classification mapping");
                report.unmapped.push(guid.to_string());
                continue;
            };

            store.set_resolution_state(key, ResolutionState::Resolving);
            match self.resolve_one(&element, prefixes, &mut catalogues).await {
                Ok(Some(record)) => {
                    debug!(guid, product = %record.id, "resolved");
                    store.bind_product_at(key, record)?;
                    report.bound.push(guid.to_string());
                }
                Ok(None) => {
                    debug!(guid, "no service produced a usable product");
                    store.set_resolution_state(key, ResolutionState::Unresolved);
                    report.unresolved.push(guid.to_string());
                }
                Err(e) => {
                    store.set_resolution_state(key, ResolutionState::Unresolved);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    async fn resolve_one(
        &self,
        element: &Element,
        prefixes: &[String],
        catalogues: &mut [Option<Vec<ProductRecord>>],
    ) -> Result<Option<Arc<ProductRecord>>> {
        for (service, catalogue) in self.services.iter().zip(catalogues.iter_mut()) {
            let service = service.as_ref();
            if catalogue.is_none() {
                *catalogue = Some(self.call(service, "list_all_products", service.list_all_products()).await?);
            }
            let products = catalogue.as_deref().unwrap_or(&[]);

            let Some(candidate) = products.iter().find(|p| p.matches_any(prefixes)) else {
                debug!(service = service.name(), guid = element.global_id(), "no candidate, trying next service");
                continue;
            };

            let mut sets = self
                .call(service, "list_child_products", service.list_child_products(candidate))
                .await?;
            if sets.is_empty() {
                debug!(
                    service = service.name(),
                    product = %candidate.id,
                    "candidate without profile sets, trying next service"
                );
                continue;
            }
            for set in sets
                .iter_mut()
                .filter(|s| s.phase_profiles.is_empty() && !s.phase_profile_ids.is_empty())
            {
                set.phase_profiles = self
                    .call(service, "list_phase_profiles", service.list_phase_profiles(&set.phase_profile_ids))
                    .await?;
            }

            let mut record = candidate.clone();
            record.profile_sets = sets;
            return Ok(Some(Arc::new(record)));
        }
        Ok(None)
    }

    /// Run one service call under the configured timeout. A call that
    /// does not finish in time is reported as the service being unavailable.
    async fn call<T>(
        &self,
        service: &dyn DataService,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let timeout = self.config.call_timeout;
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Error::ServiceUnavailable {
                service: service.name().to_string(),
                reason: format!("{operation} timed out after {timeout:?}"),
            })?
    }
}

impl std::fmt::Debug for ResolutionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.services.iter().map(|s| s.name()).collect();
        f.debug_struct("ResolutionPipeline")
            .field("services", &names)
            .field("editor", &self.editor)
            .field("config", &self.config)
            .finish()
    }
}
