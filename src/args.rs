use anyhow::{bail, Result};
use std::path::PathBuf;

const DEFAULT_ENDPOINT: &str = "http://localhost:9999/graphql";

/// Run configuration, fixed at start-up and never re-read mid-run.
#[derive(Debug)]
pub struct Args {
    pub root: PathBuf,
    pub endpoint: String,
}

impl Args {
    /// Parse and validate command line arguments
    pub fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let endpoint_env = std::env::var("STASH_ENDPOINT").ok();
        let parsed = Self::parse_from(&args, endpoint_env)?;

        if !parsed.root.exists() {
            bail!("Root directory does not exist: {}", parsed.root.display());
        }
        if !parsed.root.is_dir() {
            bail!("Root path is not a directory: {}", parsed.root.display());
        }

        Ok(parsed)
    }

    fn parse_from(args: &[String], endpoint_env: Option<String>) -> Result<Self> {
        if args.len() < 2 {
            bail!(
                "Usage: stash_tagger <root_dir> [-e <endpoint_url>]\n\n\
                 Example:\n  stash_tagger \"/media/Exclusive Content\" -e http://10.0.0.25:9999/graphql"
            );
        }

        let mut root: Option<PathBuf> = None;
        let mut endpoint: Option<String> = None;
        let mut i = 1; // Skip program name

        while i < args.len() {
            let arg = &args[i];
            if arg == "-e" || arg == "--endpoint" {
                if i + 1 >= args.len() {
                    bail!("Endpoint flag provided but no URL specified");
                }
                endpoint = Some(args[i + 1].clone());
                i += 2;
            } else if root.is_none() {
                root = Some(PathBuf::from(arg));
                i += 1;
            } else {
                bail!("Unexpected argument: {}", arg);
            }
        }

        let Some(root) = root else {
            bail!("Root directory must be specified");
        };

        // Flag beats environment beats default.
        let endpoint = endpoint
            .or(endpoint_env)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Args { root, endpoint })
    }
}
