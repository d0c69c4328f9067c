//! Print the JSON Schema of the panel configuration file
//!
//! Usage:
//!   cargo run --features dev-bins --bin generate_schema > config-schema.json

use schemars::schema_for;
use shell_panel::config::PanelConfig;

fn main() {
    let schema = schema_for!(PanelConfig);
    let output = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema");
    println!("{}", output);
}
