use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ASSISTANT_BIN_NAME: &str = "claude";

/// Where a discovered assistant binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Configured,
    Path,
    NodeBin,
    KnownPrefix,
}

impl DiscoverySource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Path => "path",
            Self::NodeBin => "node-bin",
            Self::KnownPrefix => "known-prefix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredAssistant {
    pub bin: PathBuf,
    pub source: DiscoverySource,
}

fn ensure_executable_path(path: &Path) -> Result<()> {
    let meta = fs::metadata(path)
        .with_context(|| format!("assistant binary path does not exist: {}", path.display()))?;
    if !meta.is_file() {
        anyhow::bail!("assistant binary path is not a file: {}", path.display());
    }
    Ok(())
}

fn known_prefixes(home: Option<&Path>) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = home {
        out.push(home.join(".claude/local"));
        out.push(home.join(".npm-global/bin"));
        out.push(home.join(".local/bin"));
        out.push(home.join(".volta/bin"));
    }
    out.push(PathBuf::from("/usr/local/bin"));
    out.push(PathBuf::from("/opt/homebrew/bin"));
    out
}

/// Ordered search: explicit configuration, `PATH`, the directory holding the
/// `node` runtime, then a short list of install prefixes.
///
/// A configured binary that does not exist is an error; the other stages are
/// best-effort and `Ok(None)` means "not installed".
pub fn discover_assistant(
    configured: Option<&str>,
    home: Option<&Path>,
) -> Result<Option<DiscoveredAssistant>> {
    if let Some(custom) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        let candidate = Path::new(custom);
        let resolved = if candidate.components().count() == 1 {
            which::which(custom).with_context(|| format!("assistant `{custom}` not on PATH"))?
        } else {
            ensure_executable_path(candidate)?;
            candidate.to_path_buf()
        };
        return Ok(Some(DiscoveredAssistant {
            bin: resolved,
            source: DiscoverySource::Configured,
        }));
    }

    if let Ok(found) = which::which(ASSISTANT_BIN_NAME) {
        return Ok(Some(DiscoveredAssistant {
            bin: found,
            source: DiscoverySource::Path,
        }));
    }

    if let Ok(node) = which::which("node")
        && let Some(dir) = node.parent()
    {
        let candidate = dir.join(ASSISTANT_BIN_NAME);
        if candidate.is_file() {
            return Ok(Some(DiscoveredAssistant {
                bin: candidate,
                source: DiscoverySource::NodeBin,
            }));
        }
    }

    for prefix in known_prefixes(home) {
        let candidate = prefix.join(ASSISTANT_BIN_NAME);
        if candidate.is_file() {
            return Ok(Some(DiscoveredAssistant {
                bin: candidate,
                source: DiscoverySource::KnownPrefix,
            }));
        }
    }

    Ok(None)
}
