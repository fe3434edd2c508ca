//! # Barinv Client
//!
//! Runtime cores of the handheld stock-take client:
//! - `gateway`: typed request/response layer with auth injection
//! - `session`: token storage, scheduled refresh, forced logout
//! - `scan`: decode-event debounce and confirmation state machine
//! - `ledger`: deduplicated local store of counted products
//! - `missing`: periodic poll of the "not yet counted" view
//! - `flow`: one scan transaction end to end
//!
//! Screens and styling live in the host application; these cores are
//! UI-agnostic and talk to the backend described in the data contracts of
//! `barinv-common`.

pub mod flow;
pub mod gateway;
pub mod ledger;
pub mod missing;
pub mod scan;
pub mod session;

pub use flow::{FlowEvent, ScanFlow};
pub use gateway::{ApiGateway, Lookup, TokenCell};
pub use ledger::InventoryLedger;
pub use missing::{MissingProductsMonitor, PollHandle};
pub use scan::{ScanOutcome, ScanState, ScanVerifier};
pub use session::SessionManager;
