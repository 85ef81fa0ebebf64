//! Download source resolution

use crate::host::Host;
use aucat_errors::InstallError;
use aucat_net::GitHubSource;
use aucat_types::SourceSpec;

/// A located asset, tagged with the transfer that can fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Plain https URL
    Url(String),
    /// Storefront URL needing the login session
    Authenticated(String),
    /// Cloud-drive file id
    CloudDrive(String),
}

impl ResolvedSource {
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Url(s) | Self::Authenticated(s) | Self::CloudDrive(s) => s,
        }
    }
}

/// Resolve `source` into something a transfer can fetch.
///
/// # Errors
///
/// Returns `InstallError::SourceUnresolved` when the source is blank or no
/// GitHub release asset matches.
pub async fn resolve_source(
    host: &dyn Host,
    source: &SourceSpec,
) -> Result<ResolvedSource, InstallError> {
    let resolved = match source {
        SourceSpec::Direct(url) => ResolvedSource::Url(url.trim().to_string()),
        SourceSpec::Booth(url) => ResolvedSource::Authenticated(url.trim().to_string()),
        SourceSpec::GoogleDrive { id } => ResolvedSource::CloudDrive(id.trim().to_string()),
        SourceSpec::GitHub {
            owner,
            repo,
            pattern,
            tag,
        } => {
            let lookup = GitHubSource {
                owner,
                repo,
                pattern: pattern.as_deref().filter(|p| !p.is_empty()),
                tag: tag.as_deref().filter(|t| !t.is_empty()),
            };
            let url = host.github_release_asset(&lookup).await.unwrap_or_default();
            if url.is_empty() {
                return Err(InstallError::SourceUnresolved {
                    message: format!("no release asset of {owner}/{repo} matched"),
                });
            }
            ResolvedSource::Url(url)
        }
    };

    if resolved.location().is_empty() {
        return Err(InstallError::SourceUnresolved {
            message: format!("{} source is empty", source.kind()),
        });
    }
    Ok(resolved)
}
