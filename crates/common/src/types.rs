//! Core types shared by the harness

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Browser family a web session is launched with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BrowserFamily {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserFamily {
    /// Parse a family name. Unrecognized names fall back to chromium.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "firefox" => BrowserFamily::Firefox,
            "webkit" => BrowserFamily::Webkit,
            _ => BrowserFamily::Chromium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserFamily::Chromium => "chromium",
            BrowserFamily::Firefox => "firefox",
            BrowserFamily::Webkit => "webkit",
        }
    }
}

impl From<String> for BrowserFamily {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<BrowserFamily> for String {
    fn from(family: BrowserFamily) -> Self {
        family.as_str().to_string()
    }
}

impl std::fmt::Display for BrowserFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of captured evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    Video,
    ErrorDetail,
    RequestLog,
    ResponseLog,
}

impl ArtifactKind {
    /// Directory under the evidence base path this kind is stored in
    pub fn category(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshots",
            ArtifactKind::Video => "videos",
            ArtifactKind::ErrorDetail => "errors",
            ArtifactKind::RequestLog | ArtifactKind::ResponseLog => "api",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::Video => "webm",
            ArtifactKind::ErrorDetail | ArtifactKind::RequestLog => "txt",
            ArtifactKind::ResponseLog => "json",
        }
    }

    /// MIME type a report sink should attach the file with
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "image/png",
            ArtifactKind::Video => "video/webm",
            ArtifactKind::ErrorDetail | ArtifactKind::RequestLog => "text/plain",
            ArtifactKind::ResponseLog => "application/json",
        }
    }
}

/// A file produced as evidence for a scenario step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub scenario: String,
    #[serde(default)]
    pub step: Option<String>,
    /// Hex SHA-256 of the file contents, when the file was readable at record time
    #[serde(default)]
    pub sha256: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl EvidenceArtifact {
    pub fn new(path: PathBuf, kind: ArtifactKind, scenario: &str, step: Option<&str>) -> Self {
        let sha256 = sha256_file(&path).ok();
        Self {
            path,
            kind,
            scenario: scenario.to_string(),
            step: step.map(String::from),
            sha256,
            captured_at: Utc::now(),
        }
    }
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Replace everything that is not alphanumeric or underscore with `_`
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Normalized tag set deciding which scenarios run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: Vec<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for tag in tags {
            let tag = normalize_tag(tag.as_ref());
            if !tag.is_empty() && !normalized.contains(&tag) {
                normalized.push(tag);
            }
        }
        Self { tags: normalized }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// An empty filter admits everything; otherwise any shared tag admits.
    pub fn admits<S: AsRef<str>>(&self, scenario_tags: &[S]) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        scenario_tags
            .iter()
            .map(|t| normalize_tag(t.as_ref()))
            .any(|t| self.tags.contains(&t))
    }
}

/// Trim, drop leading `@` and lowercase
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('@').to_lowercase()
}
