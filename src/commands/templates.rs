use anyhow::Result;

use crate::commands::CommandReport;
use crate::daylog::paths::resolve_paths;
use crate::daylog::report::{list_templates, template_path};

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("templates");
    report.detail(format!("templates_dir={}", paths.templates_dir.display()));

    let names = list_templates(&paths.templates_dir)?;
    if names.is_empty() {
        report.issue("no templates installed; run `daylog init`");
        return Ok(report);
    }
    for name in names {
        report.detail(format!(
            "template={name} path={}",
            template_path(&paths.templates_dir, &name).display()
        ));
    }
    Ok(report)
}
