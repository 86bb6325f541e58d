use crate::application::read_models::ComponentListView;
use crate::ports::outbound::ComponentListFormatter;
use crate::shared::Result;

/// JsonFormatter adapter rendering listings as pretty-printed JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl ComponentListFormatter for JsonFormatter {
    fn format(&self, view: &ComponentListView) -> Result<String> {
        Ok(serde_json::to_string_pretty(view)?)
    }
}
