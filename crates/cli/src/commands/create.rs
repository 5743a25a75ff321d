use clap::Args;
use serde_json::Value;
use shelter::AnimalShelter;
use tracing::{error, info, warn};

/// Arguments for the create command.
#[derive(Args, Clone, Default)]
pub struct CreateArgs {
    /// A JSON object, or a JSON array of objects
    #[arg(short, long)]
    pub data: String,
}

/// Insert the given document(s) into the collection.
///
/// Any `_id` or `rec_num` in the input is replaced. An insert the server does
/// not acknowledge stops the batch and is reported as an error.
pub async fn run(shelter: &AnimalShelter, args: CreateArgs) -> shelter::Result<()> {
    let value: Value = match serde_json::from_str(&args.data) {
        Ok(v) => v,
        Err(e) => {
            error!("Invalid JSON data: {}", e);
            return Err(e.into());
        },
    };

    if shelter.create_json(value).await? {
        info!("Documents created in collection '{}'", shelter.name());
        Ok(())
    }
    else {
        warn!(
            "Create in collection '{}' stopped at an unacknowledged insert",
            shelter.name()
        );
        Err(shelter::ShelterError::Internal {
            message: "insert was not acknowledged".to_owned(),
        })
    }
}
