use std::path::Path;

use anyhow::Context;
use comfy_table::{presets::UTF8_FULL, Table};
use cosim::{FmuArchive, PortDescriptor};

pub fn inspect(fmu_path: &Path) -> anyhow::Result<()> {
    let entries = FmuArchive::entries(fmu_path)
        .with_context(|| format!("Failed to read FMU zip: {}", fmu_path.display()))?;
    let description = FmuArchive::read_description(fmu_path)
        .with_context(|| format!("Failed to read model description of {}", fmu_path.display()))?;

    println!("FMU: {}", fmu_path.display());
    println!("Entries:");
    for entry in &entries {
        println!("  - {entry}");
    }

    println!("\nModel name:      {}", description.model_name);
    println!("GUID:            {}", description.guid);
    println!("FMI version:     {}", description.fmi_version);
    if let Some(id) = description.model_identifier() {
        println!("Identifier:      {id}");
    }
    if let Some(tool) = &description.generation_tool {
        println!("Generation tool: {tool}");
    }
    if let Some(experiment) = &description.default_experiment {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_owned(), |v| v.to_string());
        println!(
            "Experiment:      start {}, stop {}, step {}",
            show(experiment.start_time),
            show(experiment.stop_time),
            show(experiment.step_size)
        );
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(["Port", "Value reference", "Causality", "Type"]);
    for port in description.model_variables().map(PortDescriptor::from) {
        table.add_row([
            port.name,
            port.value_reference.to_string(),
            port.causality.to_string(),
            port.port_type.to_string(),
        ]);
    }
    println!("\n{table}");

    Ok(())
}
