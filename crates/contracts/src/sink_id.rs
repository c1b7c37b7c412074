//! SinkId - name of a registered sink
//!
//! Stamped on every delivery report and used as the metrics label, so it is
//! an `Arc<str>` that clones without allocating.

use std::fmt;
use std::sync::Arc;

/// Registered sink name, unique within a dispatcher.
///
/// # Examples
/// ```
/// use contracts::SinkId;
///
/// let id = SinkId::from("collector");
/// assert_eq!(id.as_str(), "collector");
/// assert_eq!(id.to_string(), "collector");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SinkId(Arc<str>);

impl SinkId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SinkId {
    #[inline]
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SinkId({:?})", self.0)
    }
}
