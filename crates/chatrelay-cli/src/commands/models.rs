//! Model catalog listing.

use chatrelay_core::model::MODELS;

/// Print every supported model and its family.
pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(MODELS)?);
        return Ok(());
    }

    for model in MODELS {
        println!(
            "{:<24} {:<7} temperature={}",
            model.id,
            model.family.as_str(),
            model.sampling.temperature
        );
    }
    Ok(())
}
