//! Scripted stand-ins for the macOS tools, the sleeper and the log fetcher.
#![allow(dead_code)]

use kodegen_bundler_notarize::config::OutputConfig;
use kodegen_bundler_notarize::macos::notarization::{LogFetcher, Sleeper};
use kodegen_bundler_notarize::{CommandRunner, NotarizeError, Result, ToolCommand};
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

pub const TICKET: &str = "11111111-2222-3333-4444-555555555555";

/// File the mock `stapler` drops into a bundle
pub const STAPLE_MARKER: &str = "Contents/CodeResources.ticket";

pub fn info_plist(bundle_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>{bundle_id}</string>
    <key>CFBundleName</key>
    <string>MyApp</string>
    <key>CFBundleShortVersionString</key>
    <string>2.0.1</string>
</dict>
</plist>"#
    )
}

/// `<dir>/MyApp.app` with an Info.plist and one executable
pub fn write_app(dir: &Path, bundle_id: &str) -> PathBuf {
    let app = dir.join("MyApp.app");
    let macos = app.join("Contents").join("MacOS");
    std::fs::create_dir_all(&macos).unwrap();
    std::fs::write(app.join("Contents").join("Info.plist"), info_plist(bundle_id)).unwrap();
    std::fs::write(macos.join("MyApp"), b"\xcf\xfa\xed\xfe").unwrap();
    set_mode(&macos.join("MyApp"), 0o755);
    app
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) {}

#[cfg(unix)]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

/// What `ditto -c -k --keepParent src out` produces
pub fn zip_directory(src: &Path, out: &Path) -> Result<()> {
    let base = src.parent().unwrap_or(Path::new(""));
    let mut zip = zip::ZipWriter::new(File::create(out)?);
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        let name = entry
            .path()
            .strip_prefix(base)
            .map_err(|e| NotarizeError::InvalidConfig(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let options = SimpleFileOptions::default().unix_permissions(mode_of(&entry.metadata()?));
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else {
            zip.start_file(name, options)?;
            zip.write_all(&std::fs::read(entry.path())?)?;
        }
    }
    zip.finish()?;
    Ok(())
}

/// Single-entry archive holding a bare executable
pub fn zip_executable(out: &Path, name: &str) {
    let mut zip = zip::ZipWriter::new(File::create(out).unwrap());
    zip.start_file(name, SimpleFileOptions::default().unix_permissions(0o755))
        .unwrap();
    zip.write_all(b"\xcf\xfa\xed\xfe").unwrap();
    zip.finish().unwrap();
}

pub fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

enum SubmitReply {
    Success(String),
    Failure(String),
}

/// Records every command and emulates `ditto`, `altool`, `stapler`,
/// `spctl` and `codesign`.
pub struct MockRunner {
    output: OutputConfig,
    calls: Mutex<Vec<ToolCommand>>,
    submit: Mutex<SubmitReply>,
    statuses: Mutex<VecDeque<String>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            output: OutputConfig::default(),
            calls: Mutex::new(Vec::new()),
            submit: Mutex::new(SubmitReply::Success(format!(
                "No errors uploading 'MyApp.zip'.\nRequestUUID = {TICKET}\n"
            ))),
            statuses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_submit_output(self, text: &str) -> Self {
        *self.submit.lock().unwrap() = SubmitReply::Success(text.to_string());
        self
    }

    /// `altool` exits non-zero but still prints `text`
    pub fn with_failing_submit(self, text: &str) -> Self {
        *self.submit.lock().unwrap() = SubmitReply::Failure(text.to_string());
        self
    }

    pub fn with_statuses<I, S>(self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(Into::into));
        self
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose program is `program` and that carry `arg`
    pub fn calls_with(&self, program: &str, arg: &str) -> Vec<ToolCommand> {
        self.calls()
            .into_iter()
            .filter(|c| c.program() == program && c.has_arg(arg))
            .collect()
    }

    fn handle(&self, command: &ToolCommand) -> Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        let args = command.get_args();
        match (command.program(), args.first().map(String::as_str)) {
            ("ditto", Some("-c")) => {
                let (src, out) = last_two(args);
                zip_directory(Path::new(src), Path::new(out))?;
                Ok(String::new())
            }
            ("ditto", Some("-x")) => {
                let (archive, dest) = last_two(args);
                zip::ZipArchive::new(File::open(archive)?)?.extract(dest)?;
                Ok(String::new())
            }
            ("xcrun", Some("altool")) if command.has_arg("--notarize-app") => {
                match &*self.submit.lock().unwrap() {
                    SubmitReply::Success(text) => Ok(text.clone()),
                    SubmitReply::Failure(text) => Err(NotarizeError::CommandFailed {
                        command: command.redacted(),
                        status: "exit status: 1".to_string(),
                        output: text.clone(),
                    }),
                }
            }
            ("xcrun", Some("altool")) if command.has_arg("--notarization-info") => self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| NotarizeError::CommandFailed {
                    command: command.redacted(),
                    status: "exit status: 1".to_string(),
                    output: "no scripted status left".to_string(),
                }),
            ("xcrun", Some("stapler")) => {
                let bundle = Path::new(&args[2]);
                std::fs::write(bundle.join(STAPLE_MARKER), b"ticket")?;
                Ok(String::new())
            }
            ("spctl" | "codesign", _) => Ok(String::new()),
            (program, _) => panic!("unexpected command {program}: {}", command.redacted()),
        }
    }
}

fn last_two(args: &[String]) -> (&str, &str) {
    match args {
        [.., a, b] => (a.as_str(), b.as_str()),
        _ => panic!("expected at least two arguments, got {args:?}"),
    }
}

impl CommandRunner for MockRunner {
    fn output(&self) -> OutputConfig {
        self.output
    }

    async fn run(&self, command: &ToolCommand) -> Result<()> {
        self.handle(command).map(|_| ())
    }

    async fn capture(&self, command: &ToolCommand) -> Result<String> {
        self.handle(command)
    }
}

/// Counts sleeps without waiting
#[derive(Clone, Default)]
pub struct MockSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl MockSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for MockSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Records requested log URLs, optionally failing every fetch
#[derive(Clone, Default)]
pub struct MockLogFetcher {
    urls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockLogFetcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl LogFetcher for MockLogFetcher {
    async fn fetch(&self, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(NotarizeError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(())
    }
}
