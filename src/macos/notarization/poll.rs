//! Status polling and failure log retrieval

use super::response::{NotarizationStatus, parse_log_url, parse_status};
use super::{Credentials, Notarizer, Ticket};
use crate::error::{NotarizeError, Result};
use crate::process::{CommandRunner, ToolCommand};
use crate::{error, success};
use std::future::Future;
use std::io::Write;
use std::time::Duration;

/// Waits between status queries.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retrieves the service's failure log and writes it to stderr.
pub trait LogFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Plain HTTP GET with no timeout; the body is streamed as it arrives.
#[derive(Debug, Clone, Default)]
pub struct HttpLogFetcher {
    client: reqwest::Client,
}

impl HttpLogFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl LogFetcher for HttpLogFetcher {
    async fn fetch(&self, url: &str) -> Result<()> {
        let mut response = self.client.get(url).send().await?;
        log::debug!("log server answered {}", response.status());
        while let Some(chunk) = response.chunk().await? {
            std::io::stderr().write_all(&chunk)?;
        }
        writeln!(std::io::stderr())?;
        Ok(())
    }
}

pub(super) fn info_command(
    ticket: &Ticket,
    credentials: &Credentials,
    verbosity: u8,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("xcrun")
        .args(["altool", "--notarization-info"])
        .arg(ticket.as_str())
        .arg("--username")
        .arg(credentials.username.clone())
        .arg("--password")
        .arg(credentials.password.clone());
    if verbosity > 0 {
        cmd = cmd.arg("--verbose");
    }
    cmd
}

impl<R, S, L> Notarizer<R, S, L>
where
    R: CommandRunner,
    S: Sleeper,
    L: LogFetcher,
{
    /// Raw status text for `ticket`. Unlike submission, a non-zero exit is fatal.
    pub async fn notarization_info(
        &self,
        ticket: &Ticket,
        credentials: &Credentials,
    ) -> Result<String> {
        let cmd = info_command(ticket, credentials, self.runner.output().verbosity);
        self.runner.capture(&cmd).await
    }

    /// Poll until the service reports a terminal state.
    ///
    /// `in progress` is the only retried state. Without a configured
    /// `max_wait` the loop runs for as long as the service takes.
    pub async fn wait_for_notarization(
        &self,
        ticket: &Ticket,
        credentials: &Credentials,
    ) -> Result<()> {
        let interval = self.settings.poll_interval;
        let mut waited = Duration::ZERO;

        loop {
            let info = self.notarization_info(ticket, credentials).await?;
            if self.runner.dry_run() {
                log::info!("dry run, assuming {ticket} is accepted");
                return Ok(());
            }

            match parse_status(&info)? {
                NotarizationStatus::Success => {
                    success!("notarization completed");
                    return Ok(());
                }
                NotarizationStatus::Invalid => return Err(self.report_failure(&info).await),
                NotarizationStatus::InProgress => {}
            }

            if let Some(max_wait) = self.settings.max_wait
                && waited + interval > max_wait
            {
                return Err(NotarizeError::Timeout {
                    ticket: ticket.to_string(),
                    waited_secs: waited.as_secs(),
                });
            }

            println!("notarization in progress, will check again in {interval:?}...");
            self.sleeper.sleep(interval).await;
            waited += interval;
        }
    }

    /// Print the failure log if the response points at one. Fetch problems
    /// are reported but the result is always `NotarizationFailed`.
    async fn report_failure(&self, info: &str) -> NotarizeError {
        match parse_log_url(info) {
            Some(url) => {
                log::info!("fetching notarization log from {url}");
                if let Err(e) = self.logs.fetch(url).await {
                    error!("error reading log: {e}");
                }
            }
            None => error!("could not find log URL"),
        }
        NotarizeError::NotarizationFailed
    }
}
