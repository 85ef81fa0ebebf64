//! Placeholder expansion for step fields
//!
//! Recognised tokens are `{tmp}`, `{appDir}`, `{pluginsDir}`, `{scriptsDir}`,
//! `{dataDir}` and `{download}`. Anything else, stray braces included, is
//! copied through untouched. Substituted values are never re-scanned.

use crate::context::ExecutionContext;
use aucat_errors::InstallError;
use aucat_types::AppDirs;
use std::borrow::Cow;

const DOWNLOAD_TOKEN: &str = "download";

/// Expand every recognised placeholder in `input`.
///
/// # Errors
///
/// Returns `InstallError::DownloadNotReady` if `input` uses `{download}`
/// before any download step produced a file.
pub fn expand(
    input: &str,
    dirs: &AppDirs,
    context: &ExecutionContext,
) -> Result<String, InstallError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let token = &after[..close];
        match lookup(token, dirs, context)? {
            Some(value) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup<'a>(
    token: &str,
    dirs: &'a AppDirs,
    context: &'a ExecutionContext,
) -> Result<Option<Cow<'a, str>>, InstallError> {
    let value = match token {
        "tmp" => context.tmp_dir().to_string_lossy(),
        "appDir" => dirs.root.to_string_lossy(),
        "pluginsDir" => dirs.plugin_dir.to_string_lossy(),
        "scriptsDir" => dirs.script_dir.to_string_lossy(),
        "dataDir" => dirs.data_dir.to_string_lossy(),
        DOWNLOAD_TOKEN => context.require_download()?.to_string_lossy(),
        _ => return Ok(None),
    };
    Ok(Some(value))
}
