use std::path::Path;

use anyhow::Context;
use walkdir::WalkDir;

use fnscale_autoscale::{Composition, ManifestComposer, ScaledObject, ScalingOptions, UnknownTriggerPolicy};
use fnscale_core::{FnscaleConfig, TriggerBinding};

pub struct ManifestArgs {
    pub path: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub format: String,
    pub unknown_triggers: Option<String>,
}

pub fn manifest(args: &ManifestArgs) -> anyhow::Result<()> {
    let (object, composition) = build_manifest(args)?;

    let rendered = match args.format.as_str() {
        "json" => object.to_json()?,
        _ => object.to_yaml()?,
    };
    println!("{rendered}");

    for error in &composition.errors {
        eprintln!("  ✗ {error}");
    }
    eprintln!(
        "{} trigger(s), digest {}",
        composition.descriptors.len(),
        composition.digest()
    );

    if !composition.is_clean() {
        anyhow::bail!("{} binding(s) failed validation", composition.errors.len());
    }
    Ok(())
}

/// Load the project, compose its triggers and wrap them in a ScaledObject.
///
/// Validation errors are returned inside the [`Composition`]; only I/O,
/// config and naming problems fail the call.
pub fn build_manifest(args: &ManifestArgs) -> anyhow::Result<(ScaledObject, Composition)> {
    let project_path = Path::new(&args.path);
    let config = FnscaleConfig::load_from_dir(project_path)?;

    let policy: UnknownTriggerPolicy = match args
        .unknown_triggers
        .as_deref()
        .or_else(|| config.as_ref()?.scaling.as_ref()?.unknown_triggers.as_deref())
    {
        Some(p) => p.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        None => UnknownTriggerPolicy::default(),
    };

    let bindings = collect_bindings(project_path)?;
    tracing::info!(
        path = %project_path.display(),
        bindings = bindings.len(),
        "collected trigger bindings"
    );

    let composition = ManifestComposer::new()
        .unknown_triggers(policy)
        .compose(&bindings);

    let name = match (&args.name, &config) {
        (Some(n), _) => n.clone(),
        (None, Some(c)) => c.app.name.clone(),
        (None, None) => super::init::default_app_name(project_path)?,
    };
    let namespace = args
        .namespace
        .as_deref()
        .or_else(|| config.as_ref().map(FnscaleConfig::namespace));
    let options = config
        .as_ref()
        .and_then(|c| c.scaling.as_ref())
        .map(ScalingOptions::from)
        .unwrap_or_default();

    let object = ScaledObject::new(
        &name,
        namespace,
        &name,
        &options,
        composition.descriptors.clone(),
    )?;

    Ok((object, composition))
}

/// Trigger bindings from every `function.json` one level below `root`,
/// in directory-name order.
pub fn collect_bindings(root: &Path) -> anyhow::Result<Vec<TriggerBinding>> {
    let mut bindings = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry?;
        if entry.file_name() != "function.json" {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())
            .with_context(|| format!("reading {}", entry.path().display()))?;
        let found = TriggerBinding::from_function_json(&content)
            .with_context(|| format!("parsing {}", entry.path().display()))?;
        tracing::debug!(file = %entry.path().display(), triggers = found.len(), "parsed function");
        bindings.extend(found);
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_function(root: &Path, dir: &str, json: &str) {
        let func_dir = root.join(dir);
        std::fs::create_dir_all(&func_dir).unwrap();
        std::fs::write(func_dir.join("function.json"), json).unwrap();
    }

    fn args(path: &Path) -> ManifestArgs {
        ManifestArgs {
            path: path.to_str().unwrap().to_string(),
            name: None,
            namespace: None,
            format: "yaml".to_string(),
            unknown_triggers: None,
        }
    }

    fn sample_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("fnscale.toml"),
            "[app]\nname = \"orders-api\"\nnamespace = \"shop\"\n\n[scaling]\nmin_replicas = 0\nmax_replicas = 20\n",
        )
        .unwrap();
        write_function(
            dir.path(),
            "HttpStart",
            r#"{"bindings":[{"type":"httpTrigger","name":"req","direction":"in","methods":["get"]},{"type":"http","name":"$return","direction":"out"}]}"#,
        );
        write_function(
            dir.path(),
            "ProcessOrder",
            r#"{"bindings":[{"type":"queueTrigger","name":"order","queueName":"orders","connection":"AzureWebJobsStorage"}]}"#,
        );
        dir
    }

    #[test]
    fn composes_project_from_config_and_functions() {
        let dir = sample_project();
        let (object, composition) = build_manifest(&args(dir.path())).unwrap();

        assert!(composition.is_clean());
        assert_eq!(object.metadata.name, "orders-api");
        assert_eq!(object.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(object.spec.max_replica_count, Some(20));

        let types: Vec<&str> = object
            .spec
            .triggers
            .iter()
            .map(|t| t.trigger_type.as_str())
            .collect();
        assert_eq!(types, vec!["azure-queue"]);
    }

    #[test]
    fn flags_override_config() {
        let dir = sample_project();
        let mut a = args(dir.path());
        a.name = Some("orders-v2".to_string());
        a.namespace = Some("staging".to_string());

        let (object, _) = build_manifest(&a).unwrap();
        assert_eq!(object.metadata.name, "orders-v2");
        assert_eq!(object.metadata.namespace.as_deref(), Some("staging"));
    }

    #[test]
    fn invalid_binding_is_reported_not_fatal() {
        let dir = sample_project();
        write_function(
            dir.path(),
            "Broken",
            r#"{"bindings":[{"type":"queueTrigger","name":"bad","queueName":"x"}]}"#,
        );

        let (object, composition) = build_manifest(&args(dir.path())).unwrap();
        assert_eq!(composition.errors.len(), 1);
        assert_eq!(composition.errors[0].binding_name(), "bad");
        assert_eq!(object.spec.triggers.len(), 1);
        assert!(manifest(&args(dir.path())).is_err());
    }

    #[test]
    fn reject_policy_from_flag() {
        let dir = sample_project();
        write_function(
            dir.path(),
            "Orchestrator",
            r#"{"bindings":[{"type":"orchestrationTrigger","name":"ctx"}]}"#,
        );

        let (_, lenient) = build_manifest(&args(dir.path())).unwrap();
        assert!(lenient.is_clean());

        let mut a = args(dir.path());
        a.unknown_triggers = Some("reject".to_string());
        let (_, strict) = build_manifest(&a).unwrap();
        assert_eq!(strict.errors.len(), 1);

        a.unknown_triggers = Some("sometimes".to_string());
        assert!(build_manifest(&a).is_err());
    }

    #[test]
    fn malformed_function_json_names_the_file() {
        let dir = sample_project();
        write_function(dir.path(), "Bad", "{ not json");

        let err = build_manifest(&args(dir.path())).unwrap_err();
        assert!(format!("{err:#}").contains("function.json"));
    }

    #[test]
    fn no_functions_yields_empty_trigger_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = args(dir.path());
        a.name = Some("empty".to_string());

        let (object, composition) = build_manifest(&a).unwrap();
        assert!(composition.is_clean());
        assert!(object.spec.triggers.is_empty());
        assert!(object.to_yaml().unwrap().contains("kind: ScaledObject"));
    }
}
