//! Package descriptors as published in catalog files

use crate::step::{InstallStep, UninstallStep};
use crate::sanitize_key;
use serde::{Deserialize, Serialize};

/// One installable package.
///
/// Catalog entries carry more fields (name, author, description, ...) that
/// the installer does not need; they are ignored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub id: String,
    #[serde(
        rename = "latest-version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_version: Option<String>,
    pub installer: InstallerSpec,
    /// Published versions, oldest first, with the files that identify them.
    #[serde(
        rename = "version",
        alias = "versions",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub versions: Vec<VersionEntry>,
}

impl PackageDescriptor {
    /// Version string used for keys and logs; `latest` when unset.
    #[must_use]
    pub fn version_or_latest(&self) -> &str {
        match self.latest_version.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => "latest",
        }
    }

    /// File-system safe `{id}-{version}` key for per-run temp directories.
    #[must_use]
    pub fn temp_key(&self) -> String {
        sanitize_key(&format!("{}-{}", self.id, self.version_or_latest()))
    }

    /// Whether any version carries a file hash to detect it by.
    #[must_use]
    pub fn has_version_hashes(&self) -> bool {
        self.versions
            .iter()
            .flat_map(|v| &v.file)
            .any(|f| !f.hash.trim().is_empty())
    }
}

/// One published version and the hashes of the files it installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    #[serde(default)]
    pub file: Vec<VersionFile>,
}

/// An installed file of a version; `path` may hold directory placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFile {
    pub path: String,
    /// Lowercase hex XXH3-128 digest of the file contents
    #[serde(rename = "XXH3_128", alias = "xxh3_128", default)]
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerSpec {
    pub source: SourceSpec,
    #[serde(default)]
    pub install: Vec<InstallStep>,
    #[serde(default)]
    pub uninstall: Vec<UninstallStep>,
}

/// Where the installable asset of a package comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceSpec {
    #[serde(rename = "direct")]
    Direct(String),
    #[serde(rename = "github")]
    GitHub {
        owner: String,
        repo: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    #[serde(rename = "GoogleDrive")]
    GoogleDrive { id: String },
    #[serde(rename = "booth")]
    Booth(String),
}

impl SourceSpec {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::GitHub { .. } => "github",
            Self::GoogleDrive { .. } => "google_drive",
            Self::Booth(_) => "booth",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Many(Vec<PackageDescriptor>),
    One(Box<PackageDescriptor>),
}

/// Parse a catalog file holding either one descriptor or an array of them.
///
/// # Errors
///
/// Returns the JSON error when the document matches neither shape.
pub fn parse_catalog(json: &str) -> Result<Vec<PackageDescriptor>, serde_json::Error> {
    match serde_json::from_str::<CatalogFile>(json)? {
        CatalogFile::Many(list) => Ok(list),
        CatalogFile::One(one) => Ok(vec![*one]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"{
        "id": "Author.Plugin",
        "name": "Plugin",
        "latest-version": "1.2.0",
        "installer": {
            "source": {"github": {"owner": "o", "repo": "r", "pattern": "\\.zip$"}},
            "install": [{"action": "download"}],
            "uninstall": [{"action": "delete", "path": "{pluginsDir}/p.aui2"}]
        }
    }"#;

    #[test]
    fn parses_descriptor_and_ignores_extra_fields() {
        let desc: PackageDescriptor = serde_json::from_str(DESCRIPTOR).unwrap();
        assert_eq!(desc.id, "Author.Plugin");
        assert_eq!(desc.version_or_latest(), "1.2.0");
        assert_eq!(
            desc.installer.source,
            SourceSpec::GitHub {
                owner: "o".into(),
                repo: "r".into(),
                pattern: Some("\\.zip$".into()),
                tag: None,
            }
        );
        assert_eq!(desc.installer.install.len(), 1);
        assert_eq!(desc.temp_key(), "Author.Plugin-1.2.0");
    }

    #[test]
    fn source_variants_use_catalog_keys() {
        let direct: SourceSpec = serde_json::from_str(r#"{"direct": "https://x/a.zip"}"#).unwrap();
        assert_eq!(direct, SourceSpec::Direct("https://x/a.zip".into()));
        let drive: SourceSpec = serde_json::from_str(r#"{"GoogleDrive": {"id": "abc"}}"#).unwrap();
        assert_eq!(drive, SourceSpec::GoogleDrive { id: "abc".into() });
        let booth: SourceSpec =
            serde_json::from_str(r#"{"booth": "https://booth.pm/downloadables/1"}"#).unwrap();
        assert_eq!(booth.kind(), "booth");
    }

    #[test]
    fn missing_version_keys_as_latest() {
        let desc: PackageDescriptor = serde_json::from_str(
            r#"{"id": "a b", "installer": {"source": {"direct": "https://x"}}}"#,
        )
        .unwrap();
        assert_eq!(desc.temp_key(), "a_b-latest");
        assert!(desc.installer.uninstall.is_empty());
    }

    #[test]
    fn version_files_parse_with_either_hash_key() {
        let desc: PackageDescriptor = serde_json::from_str(
            r#"{
                "id": "A.B",
                "installer": {"source": {"direct": "https://x"}},
                "version": [
                    {"version": "1.0", "release_date": "2024-01-01",
                     "file": [{"path": "{pluginsDir}/a.aui2", "XXH3_128": "00ff"}]},
                    {"version": "1.1", "file": [{"path": "{pluginsDir}/a.aui2", "xxh3_128": "11ee"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(desc.versions.len(), 2);
        assert_eq!(desc.versions[0].file[0].hash, "00ff");
        assert_eq!(desc.versions[1].file[0].hash, "11ee");
        assert!(desc.has_version_hashes());
    }

    #[test]
    fn catalog_accepts_single_or_array() {
        assert_eq!(parse_catalog(DESCRIPTOR).unwrap().len(), 1);
        let array = format!("[{DESCRIPTOR}, {DESCRIPTOR}]");
        assert_eq!(parse_catalog(&array).unwrap().len(), 2);
        assert!(parse_catalog("{}").is_err());
    }
}
