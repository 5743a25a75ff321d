use clap::Args;
use shelter::AnimalShelter;
use tracing::{error, info};

use super::parse_document;

/// Arguments for the update command.
#[derive(Args, Clone, Default)]
pub struct UpdateArgs {
    /// Filter selecting the documents to change, as a JSON object
    #[arg(short, long)]
    pub filter: String,
    /// Fields to set, as a JSON object
    #[arg(short, long)]
    pub set:    String,
}

/// Set fields on every matching document and print the modified count.
pub async fn run(shelter: &AnimalShelter, args: UpdateArgs) -> shelter::Result<()> {
    let filter = parse_document(&args.filter, "filter")?;
    let new_values = parse_document(&args.set, "set")?;

    match shelter.try_update(filter, new_values).await {
        Ok(modified) => {
            info!(
                "Modified {} document(s) in collection '{}'",
                modified,
                shelter.name()
            );
            super::write_count(modified)
        },
        Err(e) => {
            error!(
                "Failed to update documents in collection '{}': {}",
                shelter.name(),
                e
            );
            Err(e)
        },
    }
}
