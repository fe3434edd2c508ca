//! Scan transaction orchestration
//!
//! Drives one scan from raw decode event to recorded count: verifier
//! confirmation → product lookup (verifier suspended for the duration) →
//! operator review → commit → ledger upsert. The commit discipline is
//! strict: the backend must acknowledge the count before the ledger
//! records it, so the operator is never shown "saved" for a count the
//! server never received.
//!
//! Teardown of the scanning screen drops any in-flight lookup future (its
//! response is thereby discarded, never applied) and calls `detach()` to
//! cancel verifier state; stopping the missing-products monitor stays with
//! whichever scope started it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use barinv_common::storage::LedgerStore;
use barinv_common::types::{InventoryItem, ProductRecord};
use barinv_common::{Error, Result};

use crate::gateway::{ApiGateway, Lookup};
use crate::ledger::InventoryLedger;
use crate::scan::{ScanOutcome, ScanVerifier};

/// What the host should show after feeding the flow an event.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// Nothing to do (invalid decode, or the flow is mid-review).
    Ignored,
    /// A candidate is pending confirmation.
    Pending { code: String, count: u32 },
    /// Lookup succeeded; the operator reviews and sets a quantity.
    ProductReady(ProductRecord),
    /// The backend does not know this ean. Scanner re-armed.
    ProductNotFound { ean: String },
    /// Transient lookup failure. Scanner re-armed.
    LookupFailed { ean: String, message: String },
}

/// One scan transaction at a time, end to end.
pub struct ScanFlow {
    gateway: Arc<ApiGateway>,
    verifier: ScanVerifier,
    ledger: InventoryLedger,
    ledger_store: Option<LedgerStore>,
    inventory_id: String,
    pending: Option<ProductRecord>,
    rearm_delay: Duration,
}

impl ScanFlow {
    /// Build the flow for an inventory session, restoring any persisted
    /// ledger for `inventory_id`.
    pub fn new(
        gateway: Arc<ApiGateway>,
        inventory_id: impl Into<String>,
        ledger_store: Option<LedgerStore>,
        rearm_delay: Duration,
    ) -> Result<Self> {
        let inventory_id = inventory_id.into();
        let ledger = match &ledger_store {
            Some(store) => InventoryLedger::from_items(store.load(&inventory_id)?),
            None => InventoryLedger::new(),
        };
        Ok(Self {
            gateway,
            verifier: ScanVerifier::new(),
            ledger,
            ledger_store,
            inventory_id,
            pending: None,
            rearm_delay,
        })
    }

    /// Feed one raw camera decode event.
    pub async fn handle_decode(&mut self, raw: &str) -> Result<FlowEvent> {
        if self.pending.is_some() {
            // Decode source should be detached during review; tolerate a
            // straggler event without disturbing the transaction.
            return Ok(FlowEvent::Ignored);
        }
        match self.verifier.accept(raw) {
            ScanOutcome::Confirmed(code) => self.resolve(&code).await,
            ScanOutcome::Pending { code, count } => Ok(FlowEvent::Pending { code, count }),
            ScanOutcome::Ignored => Ok(FlowEvent::Ignored),
        }
    }

    /// Manual entry or a missing-product retry: trusted, no debounce.
    pub async fn submit_ean(&mut self, ean: &str) -> Result<FlowEvent> {
        if self.pending.is_some() {
            return Err(Error::Validation(
                "a product is already under review".to_string(),
            ));
        }
        let code = self.verifier.submit(ean)?;
        self.resolve(&code).await
    }

    /// Look up a confirmed code. The verifier stays suspended while the
    /// request runs and is re-armed on every outcome except `Found`.
    async fn resolve(&mut self, ean: &str) -> Result<FlowEvent> {
        match self.gateway.lookup_by_ean(ean).await {
            Ok(Lookup::Found(product)) => {
                self.pending = Some(product.clone());
                Ok(FlowEvent::ProductReady(product))
            }
            Ok(Lookup::NotFound) => {
                self.rearm().await;
                Ok(FlowEvent::ProductNotFound {
                    ean: ean.to_string(),
                })
            }
            Err(Error::Network(message)) | Err(Error::ServerError(message)) => {
                tracing::warn!(%ean, %message, "lookup failed; re-arming scanner");
                self.rearm().await;
                Ok(FlowEvent::LookupFailed {
                    ean: ean.to_string(),
                    message,
                })
            }
            Err(e) => {
                // Unauthorized and the like end the transaction; session
                // teardown is the manager's business.
                self.verifier.reset();
                Err(e)
            }
        }
    }

    /// Commit the operator-confirmed quantity, then record it locally.
    ///
    /// On failure the flow STAYS in review and the error surfaces, so the
    /// operator knows the count was not saved.
    pub async fn commit(&mut self, quantity: u32) -> Result<InventoryItem> {
        let product = self
            .pending
            .as_ref()
            .ok_or_else(|| Error::Validation("no product under review".to_string()))?
            .clone();

        let scan_id = self.gateway.commit_count(&product, quantity).await?;

        let item = InventoryItem {
            ean: product.ean.clone(),
            name: product.name.clone(),
            quantity,
            volume: product.volume.clone(),
            alcohol_content: product.alcohol_content.clone(),
            scan_id: scan_id.or_else(|| product.scan_id.clone()),
            recorded_at: Utc::now(),
        };
        self.ledger.upsert(item.clone());
        self.persist_ledger();

        self.pending = None;
        self.verifier.reset();
        tracing::info!(ean = %item.ean, quantity, "count recorded");
        Ok(item)
    }

    /// Abandon the product under review and re-arm scanning.
    pub fn cancel_review(&mut self) {
        self.pending = None;
        self.verifier.reset();
    }

    /// Remove a recorded count (operator action from the list view).
    pub fn remove_item(&mut self, ean: &str) {
        self.ledger.remove(ean);
        self.persist_ledger();
    }

    /// Called when the scanning screen is torn down: cancels verifier
    /// state and drops the transaction. An in-flight lookup future must be
    /// dropped by the caller; its response is then discarded unapplied.
    pub fn detach(&mut self) {
        self.pending = None;
        self.verifier.cancel();
    }

    /// Wipe the ledger, on inventory completion or an explicit
    /// "new inventory" action only.
    pub fn clear_inventory(&mut self) -> Result<()> {
        self.ledger.clear();
        if let Some(store) = &self.ledger_store {
            store.delete(&self.inventory_id)?;
        }
        Ok(())
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn reviewing(&self) -> Option<&ProductRecord> {
        self.pending.as_ref()
    }

    pub fn is_scanning(&self) -> bool {
        self.pending.is_none() && !self.verifier.is_suspended()
    }

    pub fn verifier(&self) -> &ScanVerifier {
        &self.verifier
    }

    /// Wait out the cooldown, then re-arm the verifier.
    async fn rearm(&mut self) {
        tokio::time::sleep(self.rearm_delay).await;
        self.verifier.reset();
    }

    fn persist_ledger(&self) {
        if let Some(store) = &self.ledger_store {
            // The count is already confirmed remotely; a local persistence
            // failure is logged, not surfaced as a failed commit.
            if let Err(e) = store.save(&self.inventory_id, self.ledger.list()) {
                tracing::warn!(error = %e, "failed to persist ledger");
            }
        }
    }
}
