//! Cookbook metadata editing.
//!
//! A cookbook declares its version in `metadata.rb` (`version '1.2.3'`) and,
//! when generated, in `metadata.json`. Deploy rewrites both before tagging.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{CookforgeError, Result};

pub const METADATA_RB: &str = "metadata.rb";
pub const METADATA_JSON: &str = "metadata.json";

fn version_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^(\s*)version\s+(['"])([^'"]*)['"](.*)$"#)
            .unwrap_or_else(|e| unreachable!("static metadata pattern: {e}"))
    })
}

/// The version declared in `metadata.rb` content
pub fn metadata_rb_version(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| version_line().captures(line).map(|c| c[3].to_string()))
}

/// Read the cookbook version, preferring `metadata.rb`
pub fn read_version(dir: &Path) -> Result<String> {
    let rb = dir.join(METADATA_RB);
    if rb.exists() {
        let content = std::fs::read_to_string(&rb)?;
        return metadata_rb_version(&content)
            .ok_or_else(|| CookforgeError::Metadata(format!("No version field found in {}", rb.display())));
    }

    let json = dir.join(METADATA_JSON);
    if json.exists() {
        let content = std::fs::read_to_string(&json)?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| CookforgeError::Metadata(format!("{}: {e}", json.display())))?;
        return value
            .get("version")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CookforgeError::Metadata(format!("No version field found in {}", json.display())));
    }

    Err(CookforgeError::Metadata(format!("No cookbook metadata in {}", dir.display())))
}

/// Edit the version line of `metadata.rb`, keeping its quoting and any
/// trailing comment. Returns the new file content.
pub fn set_metadata_rb_version(dir: &Path, new_version: &str) -> Result<String> {
    let path = dir.join(METADATA_RB);
    let content = std::fs::read_to_string(&path)?;
    let mut found = false;

    let lines: Vec<String> = content
        .lines()
        .map(|line| {
            if found {
                return line.to_string();
            }
            match version_line().captures(line) {
                Some(caps) => {
                    found = true;
                    format!("{}version {q}{new_version}{q}{}", &caps[1], &caps[4], q = &caps[2])
                }
                None => line.to_string(),
            }
        })
        .collect();

    if !found {
        return Err(CookforgeError::Metadata(format!("No version field found in {}", path.display())));
    }

    let result = lines.join("\n") + "\n";
    std::fs::write(&path, &result)?;
    Ok(result)
}

/// Edit `version` in `metadata.json`. Returns the new file content.
pub fn set_metadata_json_version(dir: &Path, new_version: &str) -> Result<String> {
    let path = dir.join(METADATA_JSON);
    let content = std::fs::read_to_string(&path)?;
    let mut value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| CookforgeError::Metadata(format!("{}: {e}", path.display())))?;

    let Some(obj) = value.as_object_mut() else {
        return Err(CookforgeError::Metadata(format!("{} is not a JSON object", path.display())));
    };
    obj.insert(
        "version".to_string(),
        serde_json::Value::String(new_version.to_string()),
    );

    let result = serde_json::to_string_pretty(&value)
        .map_err(|e| CookforgeError::Metadata(format!("{}: {e}", path.display())))?
        + "\n";
    std::fs::write(&path, &result)?;
    Ok(result)
}

/// Write `new_version` into every metadata file present.
///
/// Returns the files changed; a cookbook without any metadata is an error.
pub fn set_version(dir: &Path, new_version: &str) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();

    if dir.join(METADATA_RB).exists() {
        set_metadata_rb_version(dir, new_version)?;
        changed.push(dir.join(METADATA_RB));
    }
    if dir.join(METADATA_JSON).exists() {
        set_metadata_json_version(dir, new_version)?;
        changed.push(dir.join(METADATA_JSON));
    }

    if changed.is_empty() {
        return Err(CookforgeError::Metadata(format!("No cookbook metadata in {}", dir.display())));
    }
    Ok(changed)
}
