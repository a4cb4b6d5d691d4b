//! BundleSink trait - subscriber output interface
//!
//! Defines the abstract interface for anything that consumes synchronized
//! bundles one at a time (recorder session, display emitter, log).

use crate::{ContractError, SyncBundle};

/// Bundle output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(BundleSink: Send)]
pub trait LocalBundleSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one synchronized bundle
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, bundle: &SyncBundle) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
