use clap::Args;
use shelter::AnimalShelter;
use tracing::info;

use super::{parse_document, write_documents};

/// Arguments for the read command.
#[derive(Args, Clone, Default)]
pub struct ReadArgs {
    /// Filter as a JSON object; `{}` matches everything. Without a filter
    /// nothing is returned.
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Print every matching document to stdout, one per line.
pub async fn run(shelter: &AnimalShelter, args: ReadArgs) -> shelter::Result<()> {
    let filter = args
        .filter
        .as_deref()
        .map(|text| parse_document(text, "filter"))
        .transpose()?;

    let documents = shelter.read(filter).await?;
    let written = write_documents(documents, &mut std::io::stdout().lock()).await?;
    info!(
        "Read {} document(s) from collection '{}'",
        written,
        shelter.name()
    );
    Ok(())
}
