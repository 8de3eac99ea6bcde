use anyhow::{anyhow, Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Plain commands write to stderr.
    Stderr,
    /// The board owns the terminal, so logs go to `logs/taches.log`.
    File,
}

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "taches=debug,reqwest=info"
        } else {
            "taches=info,reqwest=warn"
        })
    })
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// whole run or buffered file lines are lost.
pub fn init(target: LogTarget, verbose: bool) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|err| anyhow!("installing log subscriber: {}", err))?;
            Ok(None)
        }
        LogTarget::File => {
            let dir = crate::storage::logs_dir()?;
            std::fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(&dir, "taches.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter(verbose))
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|err| anyhow!("installing log subscriber: {}", err))?;
            Ok(Some(guard))
        }
    }
}
