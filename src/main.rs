use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kodegen_bundler_notarize::config::{DEFAULT_IDENTITY, FileConfig, OutputConfig};
use kodegen_bundler_notarize::macos::{
    Credentials, NotarizationRequest, Notarizer, SignOptions, ZipOptions, sign_bundle, zip_bundle,
};
use kodegen_bundler_notarize::{CommandRunner, SystemRunner, error, success};

// ============================================================================
// ERROR HANDLING STRATEGY
// ============================================================================
//
// CRITICAL I/O - Errors propagated with `?` operator:
//   • External processes: ditto, codesign, spctl, xcrun
//   • File operations: archives, config file, bundle removal
//
//   A failure ends the subcommand with one red line naming the artifact
//   and exit status 1.
//
// DECORATIVE I/O - Errors ignored with `let _ =`:
//   • Terminal coloring and status lines (see `macos::prompts`)
// ============================================================================

#[derive(Parser)]
#[command(name = "kodegen_notarize")]
#[command(version, about = "Sign, package and notarize macOS app bundles")]
struct Cli {
    /// Verbosity level (repeat for more output)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Don't perform any changes, just print them to stdout
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Notarize an app bundle
    Notarize {
        /// Apple Developer account username
        #[arg(short, long, env = "APPLE_ID")]
        username: Option<String>,

        /// Apple Developer account application password
        #[arg(short, long, env = "APPLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Already submitted request, used to check on it without uploading again
        #[arg(long, value_name = "UUID")]
        uuid: Option<String>,

        /// `.app` bundle or `.zip` archive
        artifact: PathBuf,
    },

    /// Sign an app bundle and everything nested inside it
    Sign {
        /// Identity to sign the app with [default: Developer ID]
        #[arg(short, long)]
        identity: Option<String>,

        /// Custom entitlements to use
        #[arg(short, long)]
        entitlements: Option<PathBuf>,

        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Create a zip file from an app bundle
    Zip {
        /// Output filename. Defaults to App_version_macOS.zip
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave the _macOS suffix out of the default output filename
        #[arg(long)]
        no_macos_suffix: bool,

        /// Delete original .app bundle after zipping
        #[arg(short, long)]
        delete: bool,

        /// Overwrite output file if it exists
        #[arg(short, long)]
        force: bool,

        app: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = match FileConfig::load(cli.config.as_deref()).await {
        Ok(file) => file,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let runner = SystemRunner::new(OutputConfig {
        verbosity: cli.verbose,
        dry_run: cli.dry_run,
    });

    let (action, target, result) = match cli.command {
        Command::Notarize {
            username,
            password,
            uuid,
            artifact,
        } => {
            let result = run_notarize(runner, &file, username, password, uuid, &artifact).await;
            ("notarizing", artifact, result)
        }
        Command::Sign {
            identity,
            entitlements,
            paths,
        } => return run_sign(&runner, &file, identity, entitlements, &paths).await,
        Command::Zip {
            output,
            no_macos_suffix,
            delete,
            force,
            app,
        } => {
            let app = normalize(&app);
            let options = ZipOptions {
                output,
                include_macos_suffix: !no_macos_suffix,
                delete_source: delete,
                force,
            };
            let result = zip_bundle(&runner, &app, &options)
                .await
                .map(|zip| {
                    if !cli.dry_run {
                        success!("created {}", zip.display());
                    }
                })
                .map_err(anyhow::Error::from);
            ("zipping", app, result)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("error {action} {}: {e:#}", target.display());
            ExitCode::FAILURE
        }
    }
}

/// `-v` count picks the default filter; `RUST_LOG` still wins
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Drops a trailing `/` so `MyApp.app/` names the bundle itself
fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

async fn run_notarize(
    runner: SystemRunner,
    file: &FileConfig,
    username: Option<String>,
    password: Option<String>,
    uuid: Option<String>,
    artifact: &Path,
) -> Result<()> {
    let username = username
        .or_else(|| file.notarize.username.clone())
        .unwrap_or_default();
    let credentials = Credentials::new(username, password.unwrap_or_default());

    let mut request = NotarizationRequest::new(normalize(artifact), credentials);
    if let Some(uuid) = uuid {
        request = request.with_ticket(uuid);
    }

    let notarizer = Notarizer::new(runner, file.notary_settings());
    notarizer.notarize(request).await?;
    Ok(())
}

async fn run_sign(
    runner: &SystemRunner,
    file: &FileConfig,
    identity: Option<String>,
    entitlements: Option<PathBuf>,
    paths: &[PathBuf],
) -> ExitCode {
    let options = match sign_options(file, identity, entitlements) {
        Ok(options) => options,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    for path in paths {
        let path = normalize(path);
        if let Err(e) = sign_bundle(runner, &path, &options).await {
            error!("error signing {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        if !runner.output().dry_run {
            success!("signed {}", path.display());
        }
    }
    ExitCode::SUCCESS
}

fn sign_options(
    file: &FileConfig,
    identity: Option<String>,
    entitlements: Option<PathBuf>,
) -> Result<SignOptions> {
    let identity = identity
        .or_else(|| file.sign.identity.clone())
        .unwrap_or_else(|| DEFAULT_IDENTITY.to_string());
    let entitlements = match entitlements {
        Some(path) => Some(path),
        None => file
            .entitlements_path()
            .context("invalid entitlements path in config file")?,
    };
    Ok(SignOptions {
        identity,
        entitlements,
    })
}
