mod display;
mod manifest;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use tcgate_core::differ::create_plan;
use tcgate_core::effect::Effect;
use tcgate_core::interpreter::{EffectOutcome, Interpreter};
use tcgate_core::plan::Plan;
use tcgate_core::provider::Provider;
use tcgate_core::resource::{Resource, ResourceId, State, Value};
use tcgate_core::schema::ResourceSchema;
use tcgate_provider_tencentcloud::{TencentCloudProvider, resource_types};
use tcgate_state::{
    BackendConfig, LockInfo, ResourceState, StateBackend, StateFile, create_backend,
};

use display::{format_effect, format_value, print_plan};
use manifest::{Bindings, Manifest, unresolved};

const DEFAULT_MANIFEST: &str = "tcgate.json";

#[derive(Parser)]
#[command(name = "tcgate")]
#[command(about = "Declarative management of Tencent Cloud API Gateway resources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the manifest
    Validate {
        /// Path to manifest file
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to manifest file
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to manifest file
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy all resources defined in the manifest
    Destroy {
        /// Path to manifest file
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing cloud entity under management
    Import {
        /// Path to manifest file
        file: PathBuf,
        /// Resource type (e.g., tencentcloud_api_gateway_api_key)
        resource_type: String,
        /// Resource name in the manifest
        name: String,
        /// Cloud-side identifier, composite ids joined with '#'
        id: String,
    },
    /// Evaluate the data sources of the manifest
    Query {
        /// Path to manifest file
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// State management commands
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resources recorded in the state
    List {
        /// Manifest whose backend holds the state
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
    /// Remove a lock left behind by an interrupted run
    ForceUnlock {
        /// Lock ID reported by the failing command
        lock_id: String,

        /// Manifest whose backend holds the state
        #[arg(default_value = DEFAULT_MANIFEST)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file, auto_approve } => run_apply(&file, auto_approve).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Import {
            file,
            resource_type,
            name,
            id,
        } => run_import(&file, &ResourceId::new(resource_type, name), &id).await,
        Commands::Query { file } => run_query(&file).await,
        Commands::State { command } => match command {
            StateCommands::List { file } => run_state_list(&file).await,
            StateCommands::ForceUnlock { lock_id, file } => {
                run_force_unlock(&file, &lock_id).await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources {
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            all_errors.push(format!("{}: unknown resource type", resource.id));
            continue;
        };
        if schema.data_source != resource.is_data_source() {
            let section = if schema.data_source { "data" } else { "resources" };
            all_errors.push(format!(
                "{}: must be declared under \"{}\"",
                resource.id, section
            ));
        }
        if let Err(errors) = schema.validate(&resource.attributes) {
            for error in errors {
                all_errors.push(format!("{}: {}", resource.id, error));
            }
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

/// Parse, fill schema defaults and validate
fn load_manifest(file: &Path) -> Result<Manifest, String> {
    let mut manifest = Manifest::load(file)?;
    let schemas = get_schemas();
    for resource in &mut manifest.resources {
        if let Some(schema) = schemas.get(&resource.id.resource_type) {
            schema.apply_defaults(&mut resource.attributes);
        }
    }
    validate_resources(&manifest.resources, &schemas)?;
    Ok(manifest)
}

fn connect(manifest: &Manifest) -> Result<TencentCloudProvider, String> {
    TencentCloudProvider::from_env(manifest.region.as_deref())
        .map_err(|e| format!("Failed to configure Tencent Cloud client: {}", e))
}

async fn open_backend(config: &BackendConfig) -> Result<Box<dyn StateBackend>, String> {
    create_backend(config)
        .await
        .map_err(|e| format!("Failed to open state backend: {}", e))
}

async fn load_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    let state = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?;
    Ok(state.unwrap_or_default())
}

async fn save_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn acquire_lock(backend: &dyn StateBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .acquire_lock(operation)
        .await
        .map_err(|e| format!("Failed to lock state: {}", e))
}

async fn unlock(backend: &dyn StateBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        log::warn!("failed to release state lock {}: {}", lock.id, e);
    }
}

fn confirm(question: &str, detail: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", detail.yellow());
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

/// Current state of every managed resource and every tracked orphan
///
/// Attributes the cloud does not echo back are taken from the saved state.
async fn read_current_states(
    provider: &dyn Provider,
    manifest: &Manifest,
    saved: &StateFile,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut ids: Vec<ResourceId> = manifest.managed().map(|r| r.id.clone()).collect();
    for entry in &saved.resources {
        let id = entry.resource_id();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    let mut states = HashMap::new();
    for id in ids {
        let entry = saved.find_resource(&id.resource_type, &id.name);
        let identifier = entry.and_then(|e| e.identifier.as_deref());
        let mut state = provider
            .read(&id, identifier)
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if state.exists
            && let Some(entry) = entry
        {
            for (k, v) in entry.to_state().attributes {
                state.attributes.entry(k).or_insert(v);
            }
        }
        states.insert(id, state);
    }
    Ok(states)
}

fn bindings_for(manifest: &Manifest, states: &HashMap<ResourceId, State>) -> Bindings {
    let mut bindings = Bindings::default();
    for resource in manifest.managed() {
        if let Some(state) = states.get(&resource.id) {
            bindings.insert(resource, state);
        }
    }
    bindings
}

fn plan_changes(
    manifest: &Manifest,
    states: &HashMap<ResourceId, State>,
    bindings: &Bindings,
) -> Plan {
    let desired: Vec<Resource> = manifest
        .resources
        .iter()
        .map(|r| bindings.resolve_resource(r))
        .collect();
    create_plan(&desired, states, &get_schemas())
}

fn resolve_effect(effect: &Effect, bindings: &Bindings) -> Effect {
    match effect {
        Effect::Read { resource } => Effect::Read {
            resource: bindings.resolve_resource(resource),
        },
        Effect::Create(resource) => Effect::Create(bindings.resolve_resource(resource)),
        Effect::Update { id, from, to } => Effect::Update {
            id: id.clone(),
            from: from.clone(),
            to: bindings.resolve_resource(to),
        },
        Effect::Replace {
            id,
            from,
            to,
            changed_attributes,
        } => Effect::Replace {
            id: id.clone(),
            from: from.clone(),
            to: bindings.resolve_resource(to),
            changed_attributes: changed_attributes.clone(),
        },
        Effect::Delete { .. } => effect.clone(),
    }
}

fn desired_of(effect: &Effect) -> Option<&Resource> {
    match effect {
        Effect::Read { resource } | Effect::Create(resource) => Some(resource),
        Effect::Update { to, .. } | Effect::Replace { to, .. } => Some(to),
        Effect::Delete { .. } => None,
    }
}

/// State entry for a resource, keeping inputs the read did not return
fn snapshot(state: &State, desired: Option<&Resource>, provider: &str) -> ResourceState {
    let mut entry = ResourceState::from_state(state, provider);
    if let Some(desired) = desired {
        for (k, v) in &desired.attributes {
            entry
                .attributes
                .entry(k.clone())
                .or_insert_with(|| v.to_json());
        }
    }
    entry
}

fn run_validate(file: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let manifest = load_manifest(file)?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            manifest.resources.len()
        )
        .green()
        .bold()
    );

    for resource in &manifest.resources {
        let kind = if resource.is_data_source() { " (data)" } else { "" };
        println!(
            "  • {}.{}{}",
            resource.id.resource_type, resource.id.name, kind
        );
    }

    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    let provider = connect(&manifest)?;
    let backend = open_backend(&manifest.backend).await?;
    let saved = load_state(backend.as_ref()).await?;

    let states = read_current_states(&provider, &manifest, &saved).await?;
    let bindings = bindings_for(&manifest, &states);
    let plan = plan_changes(&manifest, &states, &bindings);
    print_plan(&plan);
    Ok(())
}

async fn run_apply(file: &Path, auto_approve: bool) -> Result<(), String> {
    let manifest = load_manifest(file)?;
    let provider = connect(&manifest)?;
    let backend = open_backend(&manifest.backend).await?;

    let lock = acquire_lock(backend.as_ref(), "apply").await?;
    let result = apply_locked(&manifest, provider, backend.as_ref(), auto_approve).await;
    unlock(backend.as_ref(), &lock).await;
    result
}

async fn apply_locked(
    manifest: &Manifest,
    provider: TencentCloudProvider,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut saved = load_state(backend).await?;
    let interpreter = Interpreter::new(provider);
    let provider_name = interpreter.provider().name();

    let states = read_current_states(interpreter.provider(), manifest, &saved).await?;
    let mut drifted = false;
    for state in states.values().filter(|s| !s.exists) {
        if saved
            .remove_resource(&state.id.resource_type, &state.id.name)
            .is_some()
        {
            log::warn!("{} no longer exists; dropped from state", state.id);
            drifted = true;
        }
    }

    let mut bindings = bindings_for(manifest, &states);
    let plan = plan_changes(manifest, &states, &bindings);

    if plan.is_read_only() {
        println!("{}", "No changes needed.".green());
        if drifted {
            save_state(backend, &mut saved).await?;
        }
        return Ok(());
    }

    print_plan(&plan);
    println!();

    if !auto_approve
        && !confirm(
            "Do you want to perform these actions?",
            "Only 'yes' will be accepted to approve.",
        )?
    {
        println!("{}", "Apply cancelled.".yellow());
        if drifted {
            save_state(backend, &mut saved).await?;
        }
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;

    for effect in plan.effects() {
        let effect = resolve_effect(effect, &bindings);
        if let Some(desired) = desired_of(&effect) {
            let pending = unresolved(desired);
            if !pending.is_empty() {
                println!(
                    "  {} {} - unresolved reference to {}",
                    "✗".red(),
                    format_effect(&effect),
                    pending.join(", ")
                );
                failure_count += 1;
                break;
            }
        }

        match interpreter.execute_effect(&effect).await {
            Ok(outcome) => {
                if effect.is_mutating() {
                    println!("  {} {}", "✓".green(), format_effect(&effect));
                    success_count += 1;
                }
                match outcome {
                    EffectOutcome::Read { state } => {
                        if let Some(resource) = manifest.find(&state.id) {
                            bindings.insert(resource, &state);
                        }
                    }
                    EffectOutcome::Created { state }
                    | EffectOutcome::Updated { state }
                    | EffectOutcome::Replaced { state } => {
                        saved.upsert_resource(snapshot(
                            &state,
                            desired_of(&effect),
                            provider_name,
                        ));
                        if let Some(resource) = manifest.find(&state.id) {
                            bindings.insert(resource, &state);
                        }
                    }
                    EffectOutcome::Deleted { id } => {
                        saved.remove_resource(&id.resource_type, &id.name);
                    }
                    EffectOutcome::Skipped { reason } => {
                        log::debug!("{} skipped: {}", effect.resource_id(), reason);
                    }
                }
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(&effect), e);
                failure_count += 1;
                break;
            }
        }
    }

    save_state(backend, &mut saved).await?;

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        println!(
            "{}",
            format!(
                "Apply failed. {} succeeded, {} failed.",
                success_count, failure_count
            )
            .red()
            .bold()
        );
        Err("apply did not complete".to_string())
    }
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let manifest = load_manifest(file)?;

    if manifest.managed().next().is_none() {
        println!("{}", "No resources defined in manifest.".yellow());
        return Ok(());
    }

    let provider = connect(&manifest)?;
    let backend = open_backend(&manifest.backend).await?;

    let lock = acquire_lock(backend.as_ref(), "destroy").await?;
    let result = destroy_locked(&manifest, provider, backend.as_ref(), auto_approve).await;
    unlock(backend.as_ref(), &lock).await;
    result
}

async fn destroy_locked(
    manifest: &Manifest,
    provider: TencentCloudProvider,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let mut saved = load_state(backend).await?;
    let interpreter = Interpreter::new(provider);
    let states = read_current_states(interpreter.provider(), manifest, &saved).await?;

    // Dependents first
    let managed: Vec<&Resource> = manifest.managed().collect();
    let mut plan = Plan::new();
    for resource in managed.into_iter().rev() {
        let Some(state) = states.get(&resource.id).filter(|s| s.exists) else {
            saved.remove_resource(&resource.id.resource_type, &resource.id.name);
            continue;
        };
        if let Some(identifier) = &state.identifier {
            plan.add(Effect::Delete {
                id: resource.id.clone(),
                identifier: identifier.clone(),
            });
        }
    }

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        save_state(backend, &mut saved).await?;
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        let id = effect.resource_id();
        println!("  {} {}.{}", "-".red().bold(), id.resource_type, id.name);
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        plan.mutation_count().to_string().red()
    );
    println!();

    if !auto_approve
        && !confirm(
            "Do you really want to destroy all resources?",
            "This action cannot be undone. Type 'yes' to confirm.",
        )?
    {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let mut success_count = 0;
    let mut failure_count = 0;

    for effect in plan.effects() {
        match interpreter.execute_effect(effect).await {
            Ok(_) => {
                let id = effect.resource_id();
                saved.remove_resource(&id.resource_type, &id.name);
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                failure_count += 1;
            }
        }
    }

    save_state(backend, &mut saved).await?;

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        println!(
            "{}",
            format!(
                "Destroy failed. {} succeeded, {} failed.",
                success_count, failure_count
            )
            .red()
            .bold()
        );
        Err("destroy did not complete".to_string())
    }
}

async fn run_import(file: &Path, id: &ResourceId, import_id: &str) -> Result<(), String> {
    let manifest = load_manifest(file)?;

    let schemas = get_schemas();
    match schemas.get(&id.resource_type) {
        None => return Err(format!("Unknown resource type: {}", id.resource_type)),
        Some(schema) if schema.data_source => {
            return Err(format!("{} is a data source", id.resource_type));
        }
        Some(schema) if !schema.importable => {
            return Err(format!("{} does not support import", id.resource_type));
        }
        Some(_) => {}
    }
    if manifest.find(id).is_none() {
        println!(
            "{}",
            format!("Warning: {} is not declared in {}", id, file.display()).yellow()
        );
    }

    let provider = connect(&manifest)?;
    let backend = open_backend(&manifest.backend).await?;

    let lock = acquire_lock(backend.as_ref(), "import").await?;
    let result = import_locked(&provider, backend.as_ref(), id, import_id).await;
    unlock(backend.as_ref(), &lock).await;
    result
}

async fn import_locked(
    provider: &TencentCloudProvider,
    backend: &dyn StateBackend,
    id: &ResourceId,
    import_id: &str,
) -> Result<(), String> {
    let mut saved = load_state(backend).await?;
    if saved.find_resource(&id.resource_type, &id.name).is_some() {
        return Err(format!("{} is already managed", id));
    }

    println!("{}", format!("Importing {}...", id).cyan());
    let state = provider
        .import(id, import_id)
        .await
        .map_err(|e| format!("Import failed: {}", e))?;

    saved.upsert_resource(snapshot(&state, None, provider.name()));
    save_state(backend, &mut saved).await?;

    println!(
        "{}",
        format!(
            "✓ Imported {} ({}).",
            id,
            state.identifier.as_deref().unwrap_or(import_id)
        )
        .green()
        .bold()
    );
    Ok(())
}

async fn run_query(file: &Path) -> Result<(), String> {
    let manifest = load_manifest(file)?;

    if manifest.data_sources().next().is_none() {
        println!("{}", "No data sources defined in manifest.".yellow());
        return Ok(());
    }

    let provider = connect(&manifest)?;
    let backend = open_backend(&manifest.backend).await?;
    let saved = load_state(backend.as_ref()).await?;

    let mut bindings = Bindings::default();
    for resource in manifest.managed() {
        if let Some(entry) = saved.find_resource(&resource.id.resource_type, &resource.id.name) {
            bindings.insert(resource, &entry.to_state());
        }
    }

    for resource in manifest.data_sources() {
        let resolved = bindings.resolve_resource(resource);
        let pending = unresolved(&resolved);
        if !pending.is_empty() {
            return Err(format!(
                "{}: unresolved reference to {} (apply first)",
                resource.id,
                pending.join(", ")
            ));
        }

        let state = provider
            .read_data_source(&resolved)
            .await
            .map_err(|e| format!("Query failed: {}", e))?;
        bindings.insert(resource, &state);

        println!(
            "{} {}.{}",
            "<=".normal(),
            resource.id.resource_type.cyan().bold(),
            resource.id.name
        );
        let mut outputs: Vec<(&String, &Value)> = state
            .attributes
            .iter()
            .filter(|(k, _)| !resolved.attributes.contains_key(k.as_str()))
            .collect();
        outputs.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in outputs {
            let rendered = serde_json::to_string_pretty(&value.to_json())
                .unwrap_or_else(|_| format_value(value));
            println!("  {} = {}", key.bold(), rendered);
        }
        println!();
    }

    Ok(())
}

/// Backend of the manifest, or the default local one when there is none
fn backend_config(file: &Path) -> Result<BackendConfig, String> {
    if file.exists() {
        Ok(Manifest::load(file)?.backend)
    } else {
        Ok(BackendConfig::local())
    }
}

async fn run_state_list(file: &Path) -> Result<(), String> {
    let backend = open_backend(&backend_config(file)?).await?;
    let Some(state) = backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))?
    else {
        println!("{}", "No state found.".yellow());
        return Ok(());
    };

    println!(
        "{}",
        format!("State serial {} (lineage {})", state.serial, state.lineage).cyan()
    );
    let mut entries: Vec<&ResourceState> = state.resources.iter().collect();
    entries.sort_by(|a, b| {
        (&a.resource_type, &a.name).cmp(&(&b.resource_type, &b.name))
    });
    for entry in entries {
        let protected = if entry.protected { " (protected)" } else { "" };
        println!(
            "  • {}.{}  {}{}",
            entry.resource_type,
            entry.name,
            entry.identifier.as_deref().unwrap_or("-").dimmed(),
            protected
        );
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let backend = open_backend(&backend_config(file)?).await?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| format!("Failed to unlock state: {}", e))?;
    println!("{}", format!("✓ Lock {} released.", lock_id).green().bold());
    Ok(())
}
