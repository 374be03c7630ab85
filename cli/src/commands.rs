//! Commands implements each `opm` subcommand: config resolution, pipeline
//! invocation, and cluster interaction, wired the way the teacher's
//! `main::run` wires controllers to a resolved `Context`.
use std::{fs, path::Path, sync::Arc};

use kube::discovery::Discovery;
use opm_core::{
    config::{Config, Inputs},
    cue,
    resource::InventoryEntry,
};
use opm_render::pipeline::{self, RenderResult};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::{
    cli::{
        BuildOutputFormat, Cli, ConfigInit, ConfigVet, EventTypeArg, ModApply, ModBuild, ModDelete, ModDiff, ModEvents, ModInit,
        ModStatus, ModVet,
    },
    error::{Error, Result},
    output,
};

fn resolve_config(cli: &Cli) -> Result<Config> {
    let inputs = Inputs {
        config_path: cli.config.clone(),
        registry: cli.registry.clone(),
        kubeconfig: cli.kubeconfig.clone(),
        context: cli.context.clone(),
        namespace: cli.namespace.clone(),
        provider: cli.provider.clone(),
        providers_dir: cli.providers_dir.clone(),
    };
    let cue = Arc::new(cue::Runtime::new().map_err(opm_core::error::Error::from)?);
    Ok(Config::resolve(inputs, cue)?)
}

fn default_values_paths<'a>(files: &'a [std::path::PathBuf]) -> Vec<&'a Path> {
    files.iter().map(std::path::PathBuf::as_path).collect()
}

/// Render loads the module at `path`, resolves the module-default-namespace
/// addendum, and runs the full pipeline.
fn render(
    config: Config,
    path: &Path,
    values_files: &[std::path::PathBuf],
    release_name: Option<&str>,
    namespace: Option<&str>,
    provider: Option<&str>,
    cancel: &CancellationToken,
) -> Result<(Config, RenderResult)> {
    let loader = opm_core::loader::Loader::new((*config.cue).clone());
    let module = loader.load(path, config.registry.value.as_deref()).map_err(opm_core::error::Error::from)?;

    let config = config.with_module_default_namespace(module.default_namespace());
    let resolved_namespace = namespace.map(str::to_string).unwrap_or_else(|| config.kube.namespace.value.clone());
    let resolved_name = release_name.map(str::to_string).unwrap_or_else(|| module.name().to_string());

    let opts = pipeline::Options {
        dir: path,
        release_name: resolved_name,
        namespace: resolved_namespace,
        values_files: default_values_paths(values_files),
        provider,
        strict: false,
    };
    let result = pipeline::run(&config, opts, cancel)?;
    Ok((config, result))
}

/// Mod_init scaffolds a minimal module directory. Per spec.md's Non-goal
/// "template-file generation for init", this writes one fixed, minimal
/// skeleton rather than implementing a templating system.
pub fn mod_init(args: &ModInit) -> Result<()> {
    if args.template != "minimal" {
        return Err(Error::Usage(format!("unknown template `{}`; only `minimal` is built in", args.template)));
    }
    fs::create_dir_all(&args.dir)?;
    let module_cue = args.dir.join("module.cue");
    if !module_cue.exists() {
        fs::write(
            &module_cue,
            "metadata: {\n\tname:    \"example\"\n\tfqn:     \"example.com/example@v0\"\n\tversion: \"v0\"\n}\n\ncomponents: {}\n",
        )?;
    }
    let values_cue = args.dir.join("values.cue");
    if !values_cue.exists() {
        fs::write(&values_cue, "// values.cue holds this module's default release values.\n")?;
    }
    info!(dir = %args.dir.display(), "module scaffolded");
    Ok(())
}

/// Mod_vet parses and validates a module without rendering it.
pub fn mod_vet(cli: &Cli, args: &ModVet) -> Result<()> {
    let config = resolve_config(cli)?;
    let loader = opm_core::loader::Loader::new((*config.cue).clone());
    let module = loader.load(&args.path, config.registry.value.as_deref()).map_err(opm_core::error::Error::from)?;

    let mut builder = opm_core::release::Builder::new(&module, "vet".to_string(), "default".to_string());
    for path in &args.values_files {
        builder = builder.with_values_file(path);
    }

    // Builder::build always requires full concreteness after injection; when
    // --concrete was not requested, a bare NotConcrete result still counts
    // as a valid module (values are simply left open for a future release).
    match builder.build(&config.cue) {
        Ok(_) => {}
        Err(opm_core::error::Error::NotConcrete(detail)) if !args.concrete => {
            println!("module `{}` is valid (not fully concrete: {detail})", module.fqn());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }
    println!("module `{}` is valid", module.fqn());
    Ok(())
}

/// Mod_build renders a module and writes its manifests.
pub fn mod_build(cli: &Cli, args: &ModBuild) -> Result<()> {
    let config = resolve_config(cli)?;
    let cancel = CancellationToken::new();
    let (_, result) = render(
        config,
        &args.path,
        &args.values_files,
        args.release_name.as_deref(),
        args.namespace.as_deref(),
        args.provider.as_deref(),
        &cancel,
    )?;

    if !result.errors.is_empty() {
        for e in &result.errors {
            eprintln!("{e}");
        }
        return Err(Error::Usage(format!("{} resource(s) failed to render", result.errors.len())));
    }

    match args.output {
        BuildOutputFormat::Dir => {
            let dir = args.output_dir.clone().ok_or_else(|| Error::Usage("--output-dir is required for -o dir".into()))?;
            fs::create_dir_all(&dir)?;
            for resource in &result.resources {
                let file = dir.join(format!("{}-{}-{}.yaml", resource.gvk.kind.to_lowercase(), resource.namespace.as_deref().unwrap_or(""), resource.name));
                fs::write(file, serde_yaml::to_string(&resource.payload)?)?;
            }
        }
        BuildOutputFormat::Yaml | BuildOutputFormat::Json => {
            let rendered: String = match args.output {
                BuildOutputFormat::Json => serde_json::to_string_pretty(&result.resources.iter().map(|r| &r.payload).collect::<Vec<_>>())?,
                _ => result
                    .resources
                    .iter()
                    .map(|r| serde_yaml::to_string(&r.payload))
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .join("---\n"),
            };
            match &args.output_file {
                Some(file) => fs::write(file, rendered)?,
                None => println!("{rendered}"),
            }
        }
    }
    Ok(())
}

/// Mod_apply runs the full apply flow.
pub async fn mod_apply(cli: &Cli, args: &ModApply, cancel: &CancellationToken) -> Result<()> {
    let config = resolve_config(cli)?;
    let (config, result) = render(
        config,
        &args.path,
        &args.values_files,
        args.release_name.as_deref(),
        args.namespace.as_deref(),
        args.provider.as_deref(),
        cancel,
    )?;

    if args.dry_run {
        println!("dry-run: would apply {} resource(s) for release `{}`", result.resources.len(), result.release.name);
        return Ok(());
    }

    let client = opm_reconcile::client::build(&config.kube).await.map_err(opm_reconcile::error::Error::from)?;
    let store = opm_inventory::store::Store::new(client.clone(), result.release.namespace.clone());
    let discovery = Discovery::new(client.clone()).run().await.map_err(opm_reconcile::error::Error::from)?;

    let opts = opm_reconcile::apply::Options {
        force: args.force || args.no_prune,
        max_history: args.max_history,
    };
    let outcome = opm_reconcile::apply::run(client, &result, &store, &discovery, opts, cancel)
        .await
        .map_err(opm_reconcile::error::Error::from)?;

    if outcome.noop {
        println!("no changes (change id `{}` already applied)", outcome.change_id);
    } else {
        println!(
            "applied {} resource(s), pruned {} resource(s) (change id `{}`)",
            outcome.applied.len(),
            outcome.pruned.len(),
            outcome.change_id
        );
    }
    Ok(())
}

/// Mod_diff renders and compares against live cluster state.
pub async fn mod_diff(cli: &Cli, args: &ModDiff) -> Result<()> {
    let config = resolve_config(cli)?;
    let cancel = CancellationToken::new();
    let (config, result) = render(
        config,
        &args.path,
        &args.values_files,
        args.release_name.as_deref(),
        args.namespace.as_deref(),
        None,
        &cancel,
    )?;

    let client = opm_reconcile::client::build(&config.kube).await.map_err(opm_reconcile::error::Error::from)?;
    let store = opm_inventory::store::Store::new(client.clone(), result.release.namespace.clone());
    let discovery = Discovery::new(client.clone()).run().await.map_err(opm_reconcile::error::Error::from)?;

    let previous = store
        .get(Some(&result.release.name), &result.release.uuid)
        .await
        .map_err(opm_reconcile::error::Error::from)?;
    let previous_entries: Vec<InventoryEntry> = previous.map(|(body, _)| body.latest_entries().to_vec()).unwrap_or_default();

    let entries = opm_reconcile::diff::run(client, &discovery, &result.resources, &previous_entries, &result.release.namespace)
        .await
        .map_err(opm_reconcile::error::Error::from)?;
    println!("{}", output::diff_report(&entries));
    Ok(())
}

fn resolve_target(release_name: Option<&str>, release_id: Option<Uuid>, namespace: Option<&str>, config: &Config) -> Result<(Option<String>, Option<Uuid>, String)> {
    if release_name.is_none() && release_id.is_none() {
        return Err(Error::Usage("specify exactly one of --name or --release-id".into()));
    }
    let namespace = namespace.map(str::to_string).unwrap_or_else(|| config.kube.namespace.value.clone());
    Ok((release_name.map(str::to_string), release_id, namespace))
}

/// Mod_delete deletes a release.
pub async fn mod_delete(cli: &Cli, args: &ModDelete) -> Result<()> {
    let config = resolve_config(cli)?;
    let (release_name, release_uuid, namespace) = resolve_target(args.release_name.as_deref(), args.release_id, args.namespace.as_deref(), &config)?;

    let client = opm_reconcile::client::build(&config.kube).await.map_err(opm_reconcile::error::Error::from)?;
    let store = opm_inventory::store::Store::new(client.clone(), namespace.clone());
    let discovery = Discovery::new(client.clone()).run().await.map_err(opm_reconcile::error::Error::from)?;

    if args.dry_run {
        println!("dry-run: would delete release in namespace `{namespace}`");
        return Ok(());
    }

    let target = opm_reconcile::delete::Target {
        namespace,
        release_name,
        release_uuid,
    };
    let outcome = opm_reconcile::delete::run(client, &store, &discovery, target).await.map_err(opm_reconcile::error::Error::from)?;
    println!("deleted {} resource(s) (inventory-tracked: {})", outcome.deleted.len(), outcome.used_inventory);
    Ok(())
}

/// Mod_status reports release health, returning the exit code the CLI
/// entrypoint should use.
pub async fn mod_status(cli: &Cli, args: &ModStatus, cancel: &CancellationToken) -> Result<i32> {
    let config = resolve_config(cli)?;
    let (release_name, release_uuid, namespace) = resolve_target(args.release_name.as_deref(), args.release_id, args.namespace.as_deref(), &config)?;
    let release_uuid = release_uuid.ok_or_else(|| Error::Usage("status currently requires --release-id; resolve --name via the inventory label scan first".into()))?;

    let client = opm_reconcile::client::build(&config.kube).await.map_err(opm_reconcile::error::Error::from)?;
    let store = opm_inventory::store::Store::new(client.clone(), namespace.clone());
    let discovery = Discovery::new(client.clone()).run().await.map_err(opm_reconcile::error::Error::from)?;

    let Some((body, _)) = store.get(release_name.as_deref(), &release_uuid).await.map_err(opm_reconcile::error::Error::from)? else {
        if args.ignore_not_found {
            return Ok(0);
        }
        return Ok(5);
    };
    let entries = body.latest_entries().to_vec();

    if args.watch {
        let code = std::cell::Cell::new(0i32);
        opm_reconcile::status::watch(client, &discovery, &entries, &namespace, cancel, |report| {
            code.set(report.exit_code());
            if let Ok(rendered) = output::status_report(&report.entries, args.output) {
                println!("{rendered}");
            }
        })
        .await
        .map_err(opm_reconcile::error::Error::from)?;
        Ok(code.get())
    } else {
        let report = opm_reconcile::status::run(client, &discovery, &entries, &namespace).await.map_err(opm_reconcile::error::Error::from)?;
        println!("{}", output::status_report(&report.entries, args.output)?);
        Ok(if entries.is_empty() && args.ignore_not_found { 0 } else { report.exit_code() })
    }
}

/// Mod_events reports events for a release's managed resources.
pub async fn mod_events(cli: &Cli, args: &ModEvents) -> Result<()> {
    let config = resolve_config(cli)?;
    let (release_name, release_uuid, namespace) = resolve_target(args.release_name.as_deref(), args.release_id, args.namespace.as_deref(), &config)?;
    let release_uuid = release_uuid.ok_or_else(|| Error::Usage("events currently requires --release-id".into()))?;

    let client = opm_reconcile::client::build(&config.kube).await.map_err(opm_reconcile::error::Error::from)?;
    let store = opm_inventory::store::Store::new(client.clone(), namespace.clone());
    let discovery = Discovery::new(client.clone()).run().await.map_err(opm_reconcile::error::Error::from)?;

    let Some((body, _)) = store.get(release_name.as_deref(), &release_uuid).await.map_err(opm_reconcile::error::Error::from)? else {
        return Err(Error::NotFound(release_name.unwrap_or_default()));
    };
    let parents = body.latest_entries().to_vec();

    let since_unix = args.since.as_deref().and_then(parse_since);
    let type_filter = args.r#type.map(|t| match t {
        EventTypeArg::Normal => opm_reconcile::events::EventType::Normal,
        EventTypeArg::Warning => opm_reconcile::events::EventType::Warning,
    });

    let entries = opm_reconcile::events::run(client, &discovery, &parents, &namespace, since_unix, type_filter)
        .await
        .map_err(opm_reconcile::error::Error::from)?;
    println!("{}", output::events_report(&entries));
    Ok(())
}

/// Parse_since parses a duration like `10m`/`2h`/`1d` into a Unix-seconds
/// cutoff relative to the caller-supplied `now`.
fn parse_since(text: &str) -> Option<i64> {
    let (digits, unit) = text.split_at(text.len().checked_sub(1)?);
    let n: i64 = digits.parse().ok()?;
    let seconds = match unit {
        "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(3600)?,
        "d" => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(seconds)
}

/// Config_init creates `~/.opm/config.cue` and its companion directory with
/// restrictive permissions.
pub fn config_init(args: &ConfigInit) -> Result<()> {
    let path = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from(".")).join(".opm/config.cue");
    let dir = path.parent().expect("config path always has a parent").to_path_buf();

    if path.exists() && !args.force {
        return Err(Error::Usage(format!("{} already exists; pass --force to overwrite", path.display())));
    }

    fs::create_dir_all(&dir)?;
    fs::write(&path, "// OPM config. See `opm config vet` for validation.\nregistry: \"\"\nnamespace: \"default\"\n")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    println!("wrote {}", path.display());
    Ok(())
}

/// Config_vet validates the config file: existence, syntax, evaluation, and
/// schema conformance.
pub fn config_vet(args: &ConfigVet) -> Result<()> {
    let cue = cue::Runtime::new().map_err(opm_core::error::Error::from)?;
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from(".")).join(".opm/config.cue"));

    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let value = cue.compile_file(&path).map_err(opm_core::error::Error::from)?;
    let _: opm_core::config::ConfigFile = value.decode().map_err(opm_core::error::Error::from)?;
    println!("{} is valid", path.display());
    Ok(())
}
