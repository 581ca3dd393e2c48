use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::daylog::report::template_path;

pub const SIMPLE_TEMPLATE: &str = include_str!("../assets/templates/simple.md");
pub const DETAILED_TEMPLATE: &str = include_str!("../assets/templates/detailed.md");

pub const BUNDLED_TEMPLATES: &[(&str, &str)] =
    &[("simple", SIMPLE_TEMPLATE), ("detailed", DETAILED_TEMPLATE)];

#[derive(Debug, Clone, Default)]
pub struct InstallOutcome {
    pub written: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Copy the bundled templates into `templates_dir`. Existing files are kept
/// unless `force` is set.
pub fn install_templates(templates_dir: &Path, force: bool) -> Result<InstallOutcome> {
    fs::create_dir_all(templates_dir)
        .with_context(|| format!("failed to create {}", templates_dir.display()))?;
    let mut outcome = InstallOutcome::default();
    for (name, body) in BUNDLED_TEMPLATES {
        let path = template_path(templates_dir, name);
        if path.exists() && !force {
            outcome.kept.push(path);
            continue;
        }
        fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
        outcome.written.push(path);
    }
    Ok(outcome)
}
