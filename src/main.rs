//! quaver: a batch downloader for the Qobuz catalog.
//!
//! Usage:
//!   quaver <url|file.txt>...
//!   quaver lucky <query>...

mod catalog;
mod client;
mod config;
mod download;
mod error;
mod filter;
mod naming;
mod quality;
mod resolver;
mod session;
mod store;
mod tagger;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{error, info};

use crate::client::{CatalogClient, DEFAULT_BASE_URL};
use crate::config::Config;
use crate::error::Error;
use crate::resolver::{Orchestrator, RunSummary};
use crate::session::Credentials;

/// Expands arguments: a readable `.txt` file contributes one url per
/// non-empty line, anything else passes through as-is.
fn expand_inputs(args: &[String]) -> Result<Vec<String>, Error> {
    let mut inputs = Vec::new();
    for arg in args {
        let path = Path::new(arg);
        if path.extension().map(|ext| ext == "txt").unwrap_or(false) && path.is_file() {
            let contents = std::fs::read_to_string(path)?;
            inputs.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(ToOwned::to_owned),
            );
        } else {
            inputs.push(arg.clone());
        }
    }
    Ok(inputs)
}

fn config_path() -> Result<PathBuf, Error> {
    Config::default_path().ok_or_else(|| Error::ConfigRead {
        path: PathBuf::from(config::CONFIG_FILE_NAME),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no configuration directory available on this platform",
        ),
    })
}

fn run(args: &[String]) -> Result<RunSummary, Error> {
    let config = Config::load(&config_path()?)?;
    let credentials = Credentials {
        email: config.account.email.clone(),
        password: config.account.password.clone(),
    };
    let client = CatalogClient::connect(
        DEFAULT_BASE_URL,
        &credentials,
        &config.account.app_id,
        &config.account.secrets,
    )?;
    let orchestrator = Orchestrator::new(&client, &config)?;

    match args.split_first() {
        Some((command, query)) if command == "lucky" && !query.is_empty() => {
            orchestrator.run_lucky(&query.join(" "))
        }
        _ => {
            let inputs = expand_inputs(args)?;
            orchestrator.run(&inputs)
        }
    }
}

fn main() -> ExitCode {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Info);
    clog.init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        error!("usage: quaver <url|file.txt>...  |  quaver lucky <query>");
        return ExitCode::from(2);
    }

    match run(&args) {
        Ok(summary) => {
            info!(
                "Done: {} downloaded, {} skipped, {} failed",
                summary.completed, summary.skipped, summary.failed
            );
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::expand_inputs;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_expand_inputs_passes_urls_through() {
        let args = vec!["https://www.qobuz.com/us-en/album/x/1".to_string()];
        let inputs = expand_inputs(&args).expect("expansion should succeed");
        assert_eq!(inputs, args);
    }

    #[test]
    fn test_expand_inputs_reads_txt_files() {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be valid")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("quaver_urls_{nonce}.txt"));
        fs::write(
            &path,
            "https://www.qobuz.com/album/a/1\n\n# comment\nhttps://www.qobuz.com/track/2\n",
        )
        .expect("fixture should be writable");

        let inputs = expand_inputs(&[path.to_string_lossy().into_owned()])
            .expect("expansion should succeed");
        fs::remove_file(&path).expect("fixture should be removable");

        assert_eq!(
            inputs,
            [
                "https://www.qobuz.com/album/a/1",
                "https://www.qobuz.com/track/2"
            ]
        );
    }
}
