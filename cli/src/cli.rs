//! Cli defines the `opm` command surface via `clap`'s derive API: every
//! subcommand has a fixed, typed argument set, unlike the teacher's single
//! dynamic `run` subcommand, so the derive API is used here instead of the
//! teacher's builder style (`clap::Command`/`Arg`) — both idiomatic `clap`,
//! per §4.10.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// Cli is the top-level `opm` command.
#[derive(Debug, Parser)]
#[command(name = "opm", version, about = "Open Platform Model CLI")]
pub struct Cli {
    /// Path to the OPM config file.
    #[arg(long, global = true, env = "OPM_CONFIG")]
    pub config: Option<PathBuf>,
    /// Default OCI registry for module dependency resolution.
    #[arg(long, global = true, env = "OPM_REGISTRY")]
    pub registry: Option<String>,
    /// Path to the kubeconfig file.
    #[arg(long, global = true, env = "OPM_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,
    /// kubeconfig context to use.
    #[arg(long, global = true, env = "OPM_CONTEXT")]
    pub context: Option<String>,
    /// Default namespace.
    #[arg(short = 'n', long, global = true, env = "OPM_NAMESPACE")]
    pub namespace: Option<String>,
    /// Default provider name.
    #[arg(long, global = true, env = "OPM_PROVIDER")]
    pub provider: Option<String>,
    /// Directory holding the provider catalog, one subdirectory per provider.
    #[arg(long, global = true, env = "OPM_PROVIDERS_DIR")]
    pub providers_dir: Option<PathBuf>,
    /// Increase log verbosity (can be repeated).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Commands is the top-level subcommand dispatch.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Module lifecycle commands.
    #[command(subcommand)]
    Mod(ModCommands),
    /// Config lifecycle commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// ModCommands covers the module/release lifecycle.
#[derive(Debug, Subcommand)]
pub enum ModCommands {
    /// Scaffold a new module.
    Init(ModInit),
    /// Validate a module without rendering.
    Vet(ModVet),
    /// Render a module and write manifests.
    Build(ModBuild),
    /// Render, apply, prune, and track a release.
    Apply(ModApply),
    /// Render and compare against live cluster state.
    Diff(ModDiff),
    /// Delete a release.
    Delete(ModDelete),
    /// Report release health.
    Status(ModStatus),
    /// Report Events for a release's managed resources and their children.
    Events(ModEvents),
}

/// ConfigCommands covers the `~/.opm/config.cue` lifecycle.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Create the config file and its companion directory.
    Init(ConfigInit),
    /// Validate the config file.
    Vet(ConfigVet),
}

/// OutputFormat is the `-o` value shared by commands that emit structured
/// or tabular output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// A compact table.
    #[default]
    Table,
    /// A wide table with extra columns.
    Wide,
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

/// BuildOutputFormat is `mod build`'s `-o`, which additionally supports
/// writing a directory of manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum BuildOutputFormat {
    /// YAML manifests.
    #[default]
    Yaml,
    /// JSON manifests.
    Json,
    /// One file per resource, written under `--output-dir`.
    Dir,
}

/// ModInit scaffolds a new module directory.
#[derive(Debug, clap::Args)]
pub struct ModInit {
    /// Scaffold template name.
    #[arg(long, default_value = "minimal")]
    pub template: String,
    /// Directory to scaffold into.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

/// ModVet validates a module, optionally requiring full concreteness.
#[derive(Debug, clap::Args)]
pub struct ModVet {
    /// Module directory.
    #[arg(default_value = ".")]
    pub path: PathBuf,
    /// `--values` overlay files, applied in order.
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<PathBuf>,
    /// Additionally require every value to be concrete.
    #[arg(long)]
    pub concrete: bool,
}

/// ModBuild renders a module and writes manifests.
#[derive(Debug, clap::Args)]
pub struct ModBuild {
    /// Module directory.
    #[arg(default_value = ".")]
    pub path: PathBuf,
    /// `--values` overlay files, applied in order.
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<PathBuf>,
    /// Release name.
    #[arg(long = "name")]
    pub release_name: Option<String>,
    /// Target namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
    /// Provider name.
    #[arg(long)]
    pub provider: Option<String>,
    /// Output format.
    #[arg(short = 'o', long, value_enum, default_value_t = BuildOutputFormat::Yaml)]
    pub output: BuildOutputFormat,
    /// Write combined output to this file instead of stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,
    /// Write one file per resource into this directory (`-o dir`).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// ModApply runs the full apply flow.
#[derive(Debug, clap::Args)]
pub struct ModApply {
    /// Module directory.
    #[arg(default_value = ".")]
    pub path: PathBuf,
    /// `--values` overlay files, applied in order.
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<PathBuf>,
    /// Release name.
    #[arg(long = "name")]
    pub release_name: Option<String>,
    /// Target namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
    /// Provider name.
    #[arg(long)]
    pub provider: Option<String>,
    /// Render and report without touching the cluster.
    #[arg(long)]
    pub dry_run: bool,
    /// Wait for every applied resource to become ready before exiting.
    #[arg(long)]
    pub wait: bool,
    /// Timeout in seconds for `--wait`.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
    /// Skip pruning resources no longer produced by the render.
    #[arg(long)]
    pub no_prune: bool,
    /// Maximum retained inventory history entries.
    #[arg(long, default_value_t = 10)]
    pub max_history: usize,
    /// Proceed even if the render would prune every previously tracked resource.
    #[arg(long)]
    pub force: bool,
}

/// ModDiff compares a render against live cluster state.
#[derive(Debug, clap::Args)]
pub struct ModDiff {
    /// Module directory.
    #[arg(default_value = ".")]
    pub path: PathBuf,
    /// `--values` overlay files, applied in order.
    #[arg(short = 'f', long = "values")]
    pub values_files: Vec<PathBuf>,
    /// Release name.
    #[arg(long = "name")]
    pub release_name: Option<String>,
    /// Target namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
}

/// ModDelete deletes a release, identified by name or release id.
#[derive(Debug, clap::Args)]
pub struct ModDelete {
    /// Release name.
    #[arg(long = "name", conflicts_with = "release_id")]
    pub release_name: Option<String>,
    /// Release UUID.
    #[arg(long = "release-id", conflicts_with = "release_name")]
    pub release_id: Option<Uuid>,
    /// Namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
    /// Skip the found-but-unforced prune guard equivalent for delete.
    #[arg(long)]
    pub force: bool,
    /// Report what would be deleted without deleting.
    #[arg(long)]
    pub dry_run: bool,
    /// Wait for every resource to disappear before exiting.
    #[arg(long)]
    pub wait: bool,
}

/// ModStatus reports release health.
#[derive(Debug, clap::Args)]
pub struct ModStatus {
    /// Release name.
    #[arg(long = "name", conflicts_with = "release_id")]
    pub release_name: Option<String>,
    /// Release UUID.
    #[arg(long = "release-id", conflicts_with = "release_name")]
    pub release_id: Option<Uuid>,
    /// Namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
    /// Output format.
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,
    /// Poll every two seconds instead of reporting once.
    #[arg(long)]
    pub watch: bool,
    /// Exit 0 instead of 5 when the release has no resources.
    #[arg(long)]
    pub ignore_not_found: bool,
}

/// ModEvents reports Events for a release's managed resources and their
/// discovered children.
#[derive(Debug, clap::Args)]
pub struct ModEvents {
    /// Release name.
    #[arg(long = "name", conflicts_with = "release_id")]
    pub release_name: Option<String>,
    /// Release UUID.
    #[arg(long = "release-id", conflicts_with = "release_name")]
    pub release_id: Option<Uuid>,
    /// Namespace.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
    /// Only report events no older than this, e.g. `10m`, `2h`.
    #[arg(long)]
    pub since: Option<String>,
    /// Only report events of this type.
    #[arg(long, value_enum)]
    pub r#type: Option<EventTypeArg>,
}

/// EventTypeArg is `--type`'s value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventTypeArg {
    /// Routine events.
    Normal,
    /// Events worth operator attention.
    Warning,
}

/// ConfigInit creates `~/.opm/config.cue`.
#[derive(Debug, clap::Args)]
pub struct ConfigInit {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

/// ConfigVet validates the config file.
#[derive(Debug, clap::Args)]
pub struct ConfigVet {
    /// Path to the config file, overriding the usual resolution.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
