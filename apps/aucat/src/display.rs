//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;

/// Final result of a command
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OperationResult {
    Success(String),
    /// Package id to installed version
    Installed(BTreeMap<String, String>),
    /// Queued usage events
    Pending(Vec<aucat_state::TelemetryEvent>),
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render operation result
    pub fn render_result(&self, result: &OperationResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            OperationResult::Success(message) => println!("{message}"),
            OperationResult::Installed(packages) => Self::render_installed(packages),
            OperationResult::Pending(events) => {
                if events.is_empty() {
                    println!("No queued events.");
                }
                for event in events {
                    println!(
                        "{} {} {}",
                        event.ts,
                        event.kind.as_str(),
                        event.package_id.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Ok(())
    }

    fn render_installed(packages: &BTreeMap<String, String>) {
        if packages.is_empty() {
            println!("No packages installed.");
            return;
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
        ]);
        for (id, version) in packages {
            let version = if version.is_empty() { "-" } else { version };
            table.add_row(vec![Cell::new(id), Cell::new(version)]);
        }
        println!("{table}");
    }
}
