use crate::application::read_models::ComponentListView;
use crate::shared::Result;

/// ComponentListFormatter port for rendering component listings
///
/// This port abstracts how a listing such as the latest components of a
/// stream is rendered (plain text table, JSON).
pub trait ComponentListFormatter {
    /// Formats the listing
    ///
    /// # Errors
    /// Returns an error if serialization fails
    fn format(&self, view: &ComponentListView) -> Result<String>;
}
