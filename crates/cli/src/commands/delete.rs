use clap::Args;
use shelter::AnimalShelter;
use tracing::{error, info};

use super::parse_document;

/// Arguments for the delete command.
#[derive(Args, Clone, Default)]
pub struct DeleteArgs {
    /// Filter selecting the documents to remove, as a JSON object. `{}`
    /// removes everything.
    #[arg(short, long)]
    pub filter: String,
}

/// Delete every matching document and print the deleted count.
pub async fn run(shelter: &AnimalShelter, args: DeleteArgs) -> shelter::Result<()> {
    let filter = parse_document(&args.filter, "filter")?;

    match shelter.try_delete(filter).await {
        Ok(deleted) => {
            info!(
                "Deleted {} document(s) from collection '{}'",
                deleted,
                shelter.name()
            );
            super::write_count(deleted)
        },
        Err(e) => {
            error!(
                "Failed to delete documents from collection '{}': {}",
                shelter.name(),
                e
            );
            Err(e)
        },
    }
}
