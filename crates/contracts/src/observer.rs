//! BeaconObserver trait - local consumers of parsed batches

use crate::{CanonicalRecord, ObserverError};

/// Local observer of the relay
///
/// Callbacks run on the observer's own worker task, one at a time and in
/// the order the pipeline emitted them. Errors are logged and swallowed.
pub trait BeaconObserver: Send + 'static {
    /// Observer name (used for logging)
    fn name(&self) -> &str;

    /// A scanning session started
    fn on_start(&mut self) -> Result<(), ObserverError> {
        Ok(())
    }

    /// A cycle produced at least one record
    fn on_update(&mut self, records: &[CanonicalRecord]) -> Result<(), ObserverError>;

    /// The scanning session stopped
    fn on_stop(&mut self) -> Result<(), ObserverError> {
        Ok(())
    }
}

impl<T: BeaconObserver + ?Sized> BeaconObserver for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_start(&mut self) -> Result<(), ObserverError> {
        (**self).on_start()
    }

    fn on_update(&mut self, records: &[CanonicalRecord]) -> Result<(), ObserverError> {
        (**self).on_update(records)
    }

    fn on_stop(&mut self) -> Result<(), ObserverError> {
        (**self).on_stop()
    }
}
