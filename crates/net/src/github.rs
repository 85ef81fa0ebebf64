//! GitHub release asset resolution

use aucat_errors::Error;
use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;

use crate::download::check_status;
use crate::NetClient;

/// How many recent releases are scanned when `latest` has no match.
const RELEASE_SCAN_LIMIT: usize = 30;

/// Where to look for a release asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubSource<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub pattern: Option<&'a str>,
    pub tag: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct Release {
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
struct Asset {
    #[serde(default)]
    name: String,
    browser_download_url: String,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
}

struct AssetFilter(Option<Regex>);

impl AssetFilter {
    fn matches(&self, asset: &Asset) -> bool {
        self.0.as_ref().is_none_or(|re| re.is_match(&asset.name))
    }

    /// First matching asset of a single release; with no pattern, the first asset.
    fn pick<'r>(&self, release: &'r Release) -> Option<&'r Asset> {
        release.assets.iter().find(|a| self.matches(a))
    }

    /// Most recently updated matching asset across releases.
    ///
    /// The timestamp falls back from the asset's `updated_at` and `created_at`
    /// to the release's `published_at` and `created_at`; ties keep the asset
    /// encountered first.
    fn newest<'r>(&self, releases: &'r [Release]) -> Option<&'r Asset> {
        let mut best: Option<(&Asset, i64)> = None;
        for release in releases {
            for asset in release.assets.iter().filter(|a| self.matches(a)) {
                let ts = [
                    &asset.updated_at,
                    &asset.created_at,
                    &release.published_at,
                    &release.created_at,
                ]
                .into_iter()
                .find_map(|v| v.as_deref().filter(|s| !s.is_empty()))
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map_or(0, |dt| dt.timestamp_millis());
                if best.is_none_or(|(_, best_ts)| ts > best_ts) {
                    best = Some((asset, ts));
                }
            }
        }
        best.map(|(asset, _)| asset)
    }
}

/// Resolve the download URL of a release asset.
///
/// Returns `None` when nothing matches or every request fails; callers
/// treat that as an unresolved source.
pub async fn resolve_release_asset(client: &NetClient, source: &GitHubSource<'_>) -> Option<String> {
    let filter = match source.pattern.filter(|p| !p.is_empty()).map(Regex::new) {
        None => AssetFilter(None),
        Some(Ok(re)) => AssetFilter(Some(re)),
        Some(Err(e)) => {
            tracing::warn!(owner = source.owner, repo = source.repo, error = %e, "invalid asset pattern");
            return None;
        }
    };
    let base = format!(
        "{}/repos/{}/{}",
        client.config().github_api,
        source.owner,
        source.repo
    );

    if let Some(tag) = source.tag.filter(|t| !t.is_empty()) {
        let release = fetch_release(client, &format!("{base}/releases/tags/{tag}")).await?;
        return filter.pick(&release).map(|a| a.browser_download_url.clone());
    }

    if let Some(release) = fetch_release(client, &format!("{base}/releases/latest")).await {
        if let Some(asset) = filter.pick(&release) {
            return Some(asset.browser_download_url.clone());
        }
    }

    let releases = fetch_releases(client, &format!("{base}/releases?per_page={RELEASE_SCAN_LIMIT}")).await;
    filter
        .newest(&releases)
        .map(|a| a.browser_download_url.clone())
}

async fn fetch_json(client: &NetClient, url: &str) -> Result<serde_json::Value, Error> {
    let response = client
        .send(|| {
            client
                .inner()
                .get(url)
                .header("Accept", "application/vnd.github+json")
        })
        .await?;
    let response = check_status(response).await?;
    let text = response
        .text()
        .await
        .map_err(|e| aucat_errors::NetworkError::DownloadFailed(e.to_string()))?;
    Ok(serde_json::from_str(&text)?)
}

async fn fetch_release(client: &NetClient, url: &str) -> Option<Release> {
    match fetch_json(client, url).await {
        Ok(value) => serde_json::from_value(value).ok(),
        Err(e) => {
            tracing::debug!(url, error = %e, "release lookup failed");
            None
        }
    }
}

/// Fetch a release list, skipping entries that do not parse.
async fn fetch_releases(client: &NetClient, url: &str) -> Vec<Release> {
    match fetch_json(client, url).await {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            tracing::warn!(url, error = %e, "release list lookup failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, updated_at: Option<&str>) -> Asset {
        Asset {
            name: name.to_string(),
            browser_download_url: format!("https://dl/{name}"),
            updated_at: updated_at.map(str::to_string),
            created_at: None,
        }
    }

    fn release(published_at: Option<&str>, assets: Vec<Asset>) -> Release {
        Release {
            published_at: published_at.map(str::to_string),
            created_at: None,
            assets,
        }
    }

    #[test]
    fn newest_prefers_latest_timestamp() {
        let releases = vec![
            release(None, vec![asset("a.zip", Some("2024-01-01T00:00:00Z"))]),
            release(None, vec![asset("b.zip", Some("2024-06-01T00:00:00Z"))]),
        ];
        let picked = AssetFilter(None).newest(&releases).unwrap();
        assert_eq!(picked.name, "b.zip");
    }

    #[test]
    fn newest_falls_back_to_release_dates_and_keeps_first_on_tie() {
        let releases = vec![
            release(Some("2024-03-01T00:00:00Z"), vec![asset("x.zip", None), asset("y.zip", None)]),
            release(Some("2023-03-01T00:00:00Z"), vec![asset("z.zip", None)]),
        ];
        let picked = AssetFilter(None).newest(&releases).unwrap();
        assert_eq!(picked.name, "x.zip");
    }

    #[test]
    fn filter_applies_to_pick_and_scan() {
        let filter = AssetFilter(Some(Regex::new(r"^b\.zip$").unwrap()));
        let rel = release(None, vec![asset("a.zip", None)]);
        assert!(filter.pick(&rel).is_none());
        assert!(filter.newest(std::slice::from_ref(&rel)).is_none());
        assert_eq!(
            AssetFilter(None).pick(&rel).map(|a| a.name.as_str()),
            Some("a.zip")
        );
    }
}
