//! Payload inspection and bundle identifier discovery.
//!
//! A payload is what gets uploaded for notarization: normally a zip archive
//! with one top-level `*.app`, occasionally a single bare executable. An
//! on-disk `.app` directory can be read the same way, which lets dry runs
//! report the identifier before any archive exists.

use crate::error::{NotarizeError, Result};
use crate::info_plist::InfoPlist;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Prefix for identifiers synthesized for bare executables
pub const SYNTHETIC_ID_PREFIX: &str = "com.example.";

/// One file inside a payload, named with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEntry {
    pub name: String,
    pub executable: bool,
}

/// Sequential access to payload entries in their native order.
pub trait PayloadReader {
    fn entries(&self) -> &[PayloadEntry];

    fn read_entry(&mut self, index: usize) -> Result<Vec<u8>>;
}

/// Zip archive payload; entries follow the central directory order.
pub struct ZipPayload {
    archive: zip::ZipArchive<File>,
    entries: Vec<PayloadEntry>,
}

impl ZipPayload {
    pub fn open(path: &Path) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let file = archive.by_index(i)?;
            entries.push(PayloadEntry {
                name: file.name().to_string(),
                executable: file.unix_mode().is_some_and(|mode| mode & 0o111 != 0),
            });
        }
        Ok(Self { archive, entries })
    }
}

impl PayloadReader for ZipPayload {
    fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let mut file = self.archive.by_index(index)?;
        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

/// A single executable uploaded as-is.
pub struct ExecutablePayload {
    path: PathBuf,
    entries: Vec<PayloadEntry>,
}

impl ExecutablePayload {
    pub fn open(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                NotarizeError::InvalidConfig(format!("Invalid payload name: {}", path.display()))
            })?
            .to_string();
        Ok(Self {
            path: path.to_path_buf(),
            entries: vec![PayloadEntry {
                name,
                executable: is_executable(&metadata),
            }],
        })
    }
}

impl PayloadReader for ExecutablePayload {
    fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        if index != 0 {
            return Err(NotarizeError::InvalidConfig(format!(
                "no entry {index} in {}",
                self.path.display()
            )));
        }
        Ok(std::fs::read(&self.path)?)
    }
}

/// An unarchived `.app` directory. Entry names are relative to the bundle's
/// parent, matching what `ditto --keepParent` would store.
pub struct DirectoryPayload {
    base: PathBuf,
    entries: Vec<PayloadEntry>,
}

impl DirectoryPayload {
    pub fn open(bundle: &Path) -> Result<Self> {
        let base = bundle.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut entries = Vec::new();
        for entry in WalkDir::new(bundle).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&base).map_err(|_| {
                NotarizeError::InvalidConfig(format!(
                    "{} is outside {}",
                    entry.path().display(),
                    base.display()
                ))
            })?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(PayloadEntry {
                name,
                executable: is_executable(&entry.metadata()?),
            });
        }
        Ok(Self { base, entries })
    }
}

impl PayloadReader for DirectoryPayload {
    fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    fn read_entry(&mut self, index: usize) -> Result<Vec<u8>> {
        let entry = self.entries.get(index).ok_or_else(|| {
            NotarizeError::InvalidConfig(format!("no entry {index} in {}", self.base.display()))
        })?;
        Ok(std::fs::read(self.base.join(&entry.name))?)
    }
}

/// Open the right reader for `path`: directories are read in place, `.zip`
/// files as archives, anything else as a bare executable.
pub fn open_payload(path: &Path) -> Result<Box<dyn PayloadReader>> {
    if path.is_dir() {
        return Ok(Box::new(DirectoryPayload::open(path)?));
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("zip") => Ok(Box::new(ZipPayload::open(path)?)),
        _ => Ok(Box::new(ExecutablePayload::open(path)?)),
    }
}

/// Locate the primary bundle identifier.
///
/// The first entry shaped `<name>.app/Contents/Info.plist` wins. A payload
/// made of exactly one executable at the root gets `com.example.<name>`.
pub fn find_primary_bundle_id(reader: &mut dyn PayloadReader) -> Result<String> {
    let found = reader
        .entries()
        .iter()
        .position(|entry| is_primary_info_plist(&entry.name));

    if let Some(index) = found {
        log::debug!("reading {}", reader.entries()[index].name);
        let data = reader.read_entry(index)?;
        let plist = InfoPlist::from_bytes(&data)?;
        return plist.bundle_identifier().map(str::to_string);
    }

    if let [only] = reader.entries()
        && !only.name.contains('/')
        && only.executable
    {
        return Ok(format!("{SYNTHETIC_ID_PREFIX}{}", only.name));
    }

    Err(NotarizeError::InfoPlistNotFound)
}

/// Convenience wrapper: open `path` and find its bundle identifier
pub fn bundle_id_for(path: &Path) -> Result<String> {
    let mut reader = open_payload(path)?;
    find_primary_bundle_id(reader.as_mut())
}

fn is_primary_info_plist(name: &str) -> bool {
    let parts: Vec<&str> = name.split('/').collect();
    parts.len() == 3
        && Path::new(parts[0]).extension().is_some_and(|e| e == "app")
        && parts[1] == "Contents"
        && parts[2] == "Info.plist"
}

#[cfg(unix)]
pub(crate) fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub(crate) fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn info_plist(bundle_id: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>CFBundleIdentifier</key>
    <string>{bundle_id}</string>
</dict>
</plist>"#
        )
    }

    fn write_zip(dir: &TempDir, entries: &[(&str, &str, u32)]) -> PathBuf {
        let path = dir.path().join("payload.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        for (name, data, mode) in entries {
            let options = SimpleFileOptions::default().unix_permissions(*mode);
            zip.start_file(*name, options).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_finds_bundle_id_in_zip() {
        let dir = TempDir::new().unwrap();
        let plist = info_plist("com.acme.widget");
        let path = write_zip(
            &dir,
            &[
                ("Widget.app/Contents/MacOS/Widget", "MH_MAGIC_64", 0o755),
                ("Widget.app/Contents/Info.plist", plist.as_str(), 0o644),
            ],
        );
        assert_eq!(bundle_id_for(&path).unwrap(), "com.acme.widget");
    }

    #[test]
    fn test_first_match_wins() {
        let dir = TempDir::new().unwrap();
        let first = info_plist("com.acme.first");
        let second = info_plist("com.acme.second");
        let path = write_zip(
            &dir,
            &[
                ("First.app/Contents/Info.plist", first.as_str(), 0o644),
                ("Second.app/Contents/Info.plist", second.as_str(), 0o644),
            ],
        );
        assert_eq!(bundle_id_for(&path).unwrap(), "com.acme.first");
    }

    #[test]
    fn test_nested_info_plist_is_ignored() {
        let dir = TempDir::new().unwrap();
        let nested = info_plist("com.acme.helper");
        let path = write_zip(
            &dir,
            &[(
                "Widget.app/Contents/Helpers/Helper.app/Contents/Info.plist",
                nested.as_str(),
                0o644,
            )],
        );
        assert!(matches!(
            bundle_id_for(&path).unwrap_err(),
            NotarizeError::InfoPlistNotFound
        ));
    }

    #[test]
    fn test_single_executable_fallback() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("mytool", "#!/bin/sh\n", 0o755)]);
        assert_eq!(bundle_id_for(&path).unwrap(), "com.example.mytool");
    }

    #[test]
    fn test_single_non_executable_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("README", "hello", 0o644)]);
        assert!(matches!(
            bundle_id_for(&path).unwrap_err(),
            NotarizeError::InfoPlistNotFound
        ));
    }

    #[test]
    fn test_two_executables_fail() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(&dir, &[("a", "a", 0o755), ("b", "b", 0o755)]);
        assert!(matches!(
            bundle_id_for(&path).unwrap_err(),
            NotarizeError::InfoPlistNotFound
        ));
    }

    #[test]
    fn test_malformed_plist_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = write_zip(
            &dir,
            &[("Widget.app/Contents/Info.plist", "<plist><dict><key>", 0o644)],
        );
        assert!(matches!(
            bundle_id_for(&path).unwrap_err(),
            NotarizeError::PlistDecode(_)
        ));
    }

    #[test]
    fn test_missing_identifier_is_key_error() {
        let dir = TempDir::new().unwrap();
        let plist = r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>CFBundleName</key><string>Widget</string></dict></plist>"#;
        let path = write_zip(&dir, &[("Widget.app/Contents/Info.plist", plist, 0o644)]);
        assert!(matches!(
            bundle_id_for(&path).unwrap_err(),
            NotarizeError::KeyNotFound { .. }
        ));
    }

    #[test]
    fn test_directory_payload() {
        let dir = TempDir::new().unwrap();
        let contents = dir.path().join("Widget.app").join("Contents");
        std::fs::create_dir_all(contents.join("MacOS")).unwrap();
        std::fs::write(contents.join("Info.plist"), info_plist("com.acme.dir")).unwrap();
        std::fs::write(contents.join("MacOS").join("Widget"), b"bin").unwrap();

        let mut reader = DirectoryPayload::open(&dir.path().join("Widget.app")).unwrap();
        assert!(
            reader
                .entries()
                .iter()
                .any(|e| e.name == "Widget.app/Contents/Info.plist")
        );
        assert_eq!(find_primary_bundle_id(&mut reader).unwrap(), "com.acme.dir");
    }

    #[cfg(unix)]
    #[test]
    fn test_bare_executable_payload() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cli-tool");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(bundle_id_for(&path).unwrap(), "com.example.cli-tool");
    }

    #[test]
    fn test_primary_info_plist_shape() {
        assert!(is_primary_info_plist("A.app/Contents/Info.plist"));
        assert!(!is_primary_info_plist("A.bundle/Contents/Info.plist"));
        assert!(!is_primary_info_plist("A.app/Contents/info.plist"));
        assert!(!is_primary_info_plist("x/A.app/Contents/Info.plist"));
    }
}
