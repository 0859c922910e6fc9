use stash_tagger::args::Args;
use stash_tagger::catalog::CatalogClient;
use stash_tagger::runner::Runner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stash_tagger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line arguments
    let args = Args::parse()?;

    // Create the catalog client and run the reconciliation
    let catalog = CatalogClient::new(args.endpoint);
    let mut runner = Runner::new(catalog);

    runner.run(&args.root)?;

    Ok(())
}
