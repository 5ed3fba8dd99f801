use fnscale_core::{DEFAULT_REGISTRY, ImageReference};

pub fn image(reference: &str, default_registry: Option<&str>, format: &str) -> anyhow::Result<()> {
    let registry = default_registry.unwrap_or(DEFAULT_REGISTRY);
    let image = ImageReference::parse_with_default(reference, registry)?;

    match format {
        "json" => {
            let doc = serde_json::json!({
                "registry": image.registry(),
                "repository": image.repository(),
                "tag": image.tag(),
                "reference": image.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        _ => {
            println!("{image}");
        }
    }

    Ok(())
}
