use actionloop_tools::{Action, ToolCatalog};
use serde_json::Value;

/// List the built-in tools, optionally only those with `tag`.
pub async fn list(tag: Option<String>) -> anyhow::Result<()> {
    let catalog = ToolCatalog::with_defaults();
    let actions: Vec<&Action> = catalog
        .actions()
        .into_iter()
        .filter(|a| tag.as_deref().map_or(true, |t| a.has_tag(t)))
        .collect();

    println!();
    println!("🔧 Built-in tools ({} shown)", actions.len());
    println!();
    for action in actions {
        let short_desc: String = action.description.chars().take(60).collect();
        let ellipsis = if action.description.chars().count() > 60 { "..." } else { "" };
        let marker = if action.terminal { " [terminal]" } else { "" };
        println!("  {:<18} {}{}{}", action.name, short_desc, ellipsis, marker);
        if !action.tags.is_empty() {
            println!("  {:<18} tags: {}", "", action.tags.join(", "));
        }
    }
    println!();
    println!("  Tags: {}", catalog.tags().join(", "));
    Ok(())
}

/// Show the derived metadata of one tool.
pub async fn info(tool_name: &str) -> anyhow::Result<()> {
    let catalog = ToolCatalog::with_defaults();
    let action = catalog.get(tool_name).ok_or_else(|| {
        anyhow::anyhow!(
            "Tool '{}' not found. Use `actionloop tools list` to see available tools.",
            tool_name
        )
    })?;

    println!();
    println!("🔧 {}", action.name);
    println!();
    println!("  Description: {}", action.description);
    println!("  Terminal:    {}", action.terminal);
    println!("  Tags:        {}", action.tags.join(", "));
    println!();

    let required: Vec<&str> = action
        .parameters
        .get("required")
        .and_then(|r: &Value| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();
    match action.parameters.get("properties").and_then(|p| p.as_object()) {
        Some(props) if !props.is_empty() => {
            println!("  Parameters:");
            for (name, schema) in props {
                let ty = schema.get("type").and_then(|t| t.as_str()).unwrap_or("any");
                let req = if required.contains(&name.as_str()) { "required" } else { "optional" };
                let desc = schema.get("description").and_then(|d| d.as_str()).unwrap_or("");
                println!("    {:<18} {:<8} {:<9} {}", name, ty, req, desc);
            }
        }
        _ => println!("  Parameters: (none)"),
    }

    println!();
    println!("  Schema:");
    println!("{}", serde_json::to_string_pretty(&action.schema())?);
    Ok(())
}
