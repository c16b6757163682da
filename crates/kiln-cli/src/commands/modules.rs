//! Implementation of the `kiln modules` command.

use std::sync::Arc;

use kiln_core::domain::{
    Archetype, Category, Framework, ModuleDescriptor, ModuleRegistry, Target,
};
use kiln_core::error::KilnError;
use tracing::instrument;

use crate::{
    cli::{ListFormat, ModulesArgs},
    commands::load_registry,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all)]
pub fn execute(args: ModulesArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let registry = load_registry(&config, &args.modules_dir)?;

    if let Some(id) = &args.id {
        let module = registry.get(id).map_err(KilnError::from)?;
        return describe(&module, args.format, &output);
    }

    let modules = select(&registry, &args)?;

    match args.format {
        ListFormat::Json => {
            let docs = modules
                .iter()
                .map(|m| serde_json::to_value(&**m))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CliError::InvalidInput {
                    message: format!("module could not be serialised: {e}"),
                    source: Some(Box::new(e)),
                })?;
            output.json(&serde_json::Value::Array(docs))?;
        }
        ListFormat::List => {
            for m in &modules {
                output.print(m.id.as_str())?;
            }
        }
        ListFormat::Table => {
            if modules.is_empty() {
                output.info("No modules match the given filters.")?;
                return Ok(());
            }
            output.header(&format!("Available modules ({}):", modules.len()))?;
            let width = modules.iter().map(|m| m.id.as_str().len()).max().unwrap_or(0);
            for m in &modules {
                let category = m.category.as_ref().map_or("-", Category::as_str);
                output.print(&format!(
                    "  {:<width$}  {:<8}  {:<10}  {}",
                    m.id.as_str(),
                    m.version.to_string(),
                    category,
                    m.description,
                ))?;
            }
        }
    }

    Ok(())
}

/// Apply the command-line filters. Baselines are hidden unless `--all`.
fn select(registry: &ModuleRegistry, args: &ModulesArgs) -> CliResult<Vec<Arc<ModuleDescriptor>>> {
    let category = args
        .category
        .as_deref()
        .map(Category::parse)
        .transpose()
        .map_err(|e| CliError::InvalidInput {
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

    let frameworks: Vec<Framework> = match args.framework {
        Some(f) => vec![f.into()],
        None => Framework::ALL.to_vec(),
    };
    let archetypes: Vec<Archetype> = match args.archetype {
        Some(a) => vec![a.into()],
        None => Archetype::ALL.to_vec(),
    };
    let filter_target = args.framework.is_some() || args.archetype.is_some();

    let modules = registry
        .query(category.as_ref(), None)
        .into_iter()
        .filter(|m| args.all || !m.baseline)
        .filter(|m| {
            !filter_target
                || frameworks.iter().any(|f| {
                    archetypes
                        .iter()
                        .any(|a| m.supports(&Target::new(*f, *a)))
                })
        })
        .collect();
    Ok(modules)
}

fn describe(module: &ModuleDescriptor, format: ListFormat, output: &OutputManager) -> CliResult<()> {
    if format == ListFormat::Json {
        let doc = serde_json::to_value(module).map_err(|e| CliError::InvalidInput {
            message: format!("module could not be serialised: {e}"),
            source: Some(Box::new(e)),
        })?;
        output.json(&doc)?;
        return Ok(());
    }

    output.header(&module.key())?;
    if !module.description.is_empty() {
        output.print(&format!("  {}", module.description))?;
    }
    if let Some(category) = &module.category {
        output.print(&format!("  category:     {category}"))?;
    }
    output.print(&format!("  priority:     {}", module.priority))?;
    output.print(&format!("  supports:     {}", module.support))?;
    if !module.dependencies.is_empty() {
        let deps: Vec<String> = module.dependencies.iter().map(ToString::to_string).collect();
        output.print(&format!("  depends on:   {}", deps.join(", ")))?;
    }
    if !module.conflicts.is_empty() {
        let rules: Vec<String> = module.conflicts.iter().map(ToString::to_string).collect();
        output.print(&format!("  conflicts:    {}", rules.join(", ")))?;
    }
    for (framework, variant) in &module.variants {
        output.print(&format!("  on {framework}: replaced by {variant}"))?;
    }
    if !module.tags.is_empty() {
        output.print(&format!("  tags:         {}", module.tags.join(", ")))?;
    }

    if !module.files.is_empty() {
        output.print("")?;
        output.print("Files:")?;
        for file in &module.files {
            output.detail(&format!("  {} ({})", file.path, file.strategy.as_str()))?;
        }
    }
    if !module.manifest.is_empty() {
        output.print("")?;
        output.print("Dependencies:")?;
        for (name, range) in &module.manifest {
            output.detail(&format!("  {name} {range}"))?;
        }
    }
    if !module.defaults.is_empty() {
        output.print("")?;
        output.print("Variables:")?;
        for (name, value) in &module.defaults {
            output.detail(&format!("  {name} = {value}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ArchetypeArg, FrameworkArg};

    fn args() -> ModulesArgs {
        ModulesArgs {
            id: None,
            framework: None,
            archetype: None,
            category: None,
            all: false,
            modules_dir: Vec::new(),
            format: ListFormat::List,
        }
    }

    fn ids(modules: &[Arc<ModuleDescriptor>]) -> Vec<&str> {
        modules.iter().map(|m| m.id.as_str()).collect()
    }

    fn registry() -> ModuleRegistry {
        kiln_adapters::builtin_modules::registry().unwrap()
    }

    #[test]
    fn baselines_hidden_by_default() {
        let registry = registry();
        let listed = select(&registry, &args()).unwrap();
        assert!(listed.iter().all(|m| !m.baseline));

        let all = select(&registry, &ModulesArgs { all: true, ..args() }).unwrap();
        assert!(all.iter().any(|m| m.baseline));
        assert_eq!(all.len(), registry.len());
    }

    #[test]
    fn framework_filter_drops_unsupported_modules() {
        let registry = registry();
        let mobile = select(
            &registry,
            &ModulesArgs {
                framework: Some(FrameworkArg::Mobile),
                ..args()
            },
        )
        .unwrap();
        let names = ids(&mobile);
        assert!(names.contains(&"database-sqlite"));
        assert!(!names.contains(&"payment-stripe"));
    }

    #[test]
    fn category_filter() {
        let registry = registry();
        let auth = select(
            &registry,
            &ModulesArgs {
                category: Some("auth".into()),
                archetype: Some(ArchetypeArg::Business),
                ..args()
            },
        )
        .unwrap();
        assert!(!auth.is_empty());
        assert!(auth
            .iter()
            .all(|m| m.category.as_ref().map(Category::as_str) == Some("auth")));
    }

    #[test]
    fn invalid_category_is_user_input_error() {
        let registry = registry();
        let err = select(
            &registry,
            &ModulesArgs {
                category: Some("Not A Category".into()),
                ..args()
            },
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
