use std::path::Path;

use fnscale_core::FnscaleConfig;
use fnscale_core::config::CONFIG_FILE;

pub fn init(path: &str, name: Option<&str>) -> anyhow::Result<()> {
    let project_path = Path::new(path);
    let output = project_path.join(CONFIG_FILE);
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    let name = match name {
        Some(n) => n.to_string(),
        None => default_app_name(project_path)?,
    };

    let config = FnscaleConfig::scaffold(&name);
    std::fs::write(&output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());

    Ok(())
}

/// Directory name, lowercased into a valid resource name.
pub fn default_app_name(project_path: &Path) -> anyhow::Result<String> {
    let dir = project_path.canonicalize()?;
    let raw = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("cannot derive an app name from {}", dir.display()))?;

    let name: String = raw
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect();
    Ok(name.trim_matches('-').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_scaffold_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        init(path, Some("orders-api")).unwrap();
        let config = FnscaleConfig::from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.app.name, "orders-api");

        assert!(init(path, Some("orders-api")).is_err());
    }

    #[test]
    fn app_name_from_directory() {
        let parent = tempfile::tempdir().unwrap();
        let project = parent.path().join("My_Func App");
        std::fs::create_dir(&project).unwrap();

        assert_eq!(default_app_name(&project).unwrap(), "my-func-app");
    }
}
