use crate::application::read_models::{ComponentListView, ComponentView};
use crate::ports::outbound::ComponentListFormatter;
use crate::shared::Result;

const HEADERS: [&str; 5] = ["TYPE", "NAME", "ARCH", "NVR", "BUILD"];

/// TableFormatter adapter rendering listings as an aligned text table
#[derive(Debug, Default, Clone, Copy)]
pub struct TableFormatter;

impl TableFormatter {
    pub fn new() -> Self {
        Self
    }

    fn cells(component: &ComponentView) -> [String; 5] {
        [
            component.component_type.clone(),
            component.name.clone(),
            component.arch.clone(),
            component.nvr.clone(),
            component.build.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }

    /// Newlines would break the row layout
    fn sanitize(text: &str) -> String {
        text.replace(['\n', '\r'], " ")
    }
}

impl ComponentListFormatter for TableFormatter {
    fn format(&self, view: &ComponentListView) -> Result<String> {
        let rows: Vec<[String; 5]> = view
            .components
            .iter()
            .map(|component| Self::cells(component).map(|cell| Self::sanitize(&cell)))
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let render = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let scope = if view.roots_only { "root components" } else { "components" };
        let mut output = format!("Latest {} of {}\n\n", scope, view.stream);
        output.push_str(&render(&HEADERS.map(String::from)));
        output.push('\n');
        for row in &rows {
            output.push_str(&render(row));
            output.push('\n');
        }
        output.push_str(&format!("\n{} component(s)\n", rows.len()));
        Ok(output)
    }
}
