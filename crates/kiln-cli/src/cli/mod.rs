//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kiln_core::domain::{Archetype, Framework, Strictness};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "kiln",
    bin_name = "kiln",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Compose projects from feature modules",
    long_about = "Kiln builds a project tree out of independently-authored \
                  feature modules: it resolves their dependencies and conflicts, \
                  merges their files and writes the result atomically.",
    after_help = "EXAMPLES:\n\
        \x20 kiln new shop --archetype business -m auth-jwt,payment-stripe\n\
        \x20 kiln new api --framework api -m auth-provider-a -m auth-provider-b --strictness auto\n\
        \x20 kiln modules --framework mobile\n\
        \x20 kiln completions bash > /usr/share/bash-completion/completions/kiln",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// All available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a new project from modules.
    #[command(
        visible_alias = "n",
        about = "Generate a new project",
        after_help = "EXAMPLES:\n\
            \x20 kiln new shop -a business -m auth-jwt -m payment-stripe\n\
            \x20 kiln new notes -f mobile -m database-postgres --var DATABASE_NAME=notes\n\
            \x20 kiln new shop -m auth-jwt --dry-run --output-format json"
    )]
    New(NewArgs),

    /// List the modules kiln knows about.
    #[command(
        visible_alias = "ls",
        about = "List available modules",
        after_help = "EXAMPLES:\n\
            \x20 kiln modules\n\
            \x20 kiln modules --framework api --category auth\n\
            \x20 kiln modules auth-jwt"
    )]
    Modules(ModulesArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 kiln completions bash > ~/.local/share/bash-completion/completions/kiln\n\
            \x20 kiln completions zsh  > ~/.zfunc/_kiln\n\
            \x20 kiln completions fish > ~/.config/fish/completions/kiln.fish"
    )]
    Completions(CompletionsArgs),

    /// Inspect the effective configuration.
    #[command(
        about = "Configuration inspection",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 kiln config get pipeline.max_retries\n\
            \x20 kiln config list\n\
            \x20 kiln config path"
    )]
    Config(ConfigCommands),
}

// ── new ───────────────────────────────────────────────────────────────────────

/// Arguments for `kiln new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Project name. The project is created at `<output>/<name>`.
    #[arg(value_name = "NAME", help = "Project name")]
    pub name: String,

    #[arg(
        short = 'f',
        long = "framework",
        value_name = "FRAMEWORK",
        value_enum,
        help = "Target framework [default: from config, else web-app]"
    )]
    pub framework: Option<FrameworkArg>,

    #[arg(
        short = 'a',
        long = "archetype",
        value_name = "ARCHETYPE",
        value_enum,
        help = "Project archetype [default: from config, else foundation]"
    )]
    pub archetype: Option<ArchetypeArg>,

    /// Modules to include. Repeat the flag or separate ids with commas.
    #[arg(
        short = 'm',
        long = "module",
        value_name = "ID",
        value_delimiter = ',',
        help = "Module to include (repeatable, comma-separated)"
    )]
    pub modules: Vec<String>,

    /// Template variable overrides.
    #[arg(
        long = "var",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        help = "Set a template variable (repeatable)"
    )]
    pub vars: Vec<(String, String)>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Directory the project is created in (default: current directory)"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long = "strictness",
        value_enum,
        value_name = "MODE",
        help = "Conflict handling: strict fails, auto keeps one winner"
    )]
    pub strictness: Option<StrictnessArg>,

    #[arg(long = "no-cache", help = "Bypass the generation cache")]
    pub no_cache: bool,

    #[arg(long = "no-parallel", help = "Render files sequentially")]
    pub no_parallel: bool,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help = "Time budget for the whole run"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "max-retries",
        value_name = "N",
        help = "Retries for transient filesystem or cache failures"
    )]
    pub max_retries: Option<u32>,

    /// Preview what would be created without writing any files.
    #[arg(long = "dry-run", help = "Show what would be created without creating")]
    pub dry_run: bool,

    /// Extra directories of `module.toml` modules, on top of the config.
    #[arg(
        long = "modules-dir",
        value_name = "DIR",
        help = "Load additional modules from DIR (repeatable)"
    )]
    pub modules_dir: Vec<PathBuf>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

// ── modules ───────────────────────────────────────────────────────────────────

/// Arguments for `kiln modules`.
#[derive(Debug, Args)]
pub struct ModulesArgs {
    /// Show details for one module instead of the list.
    #[arg(value_name = "ID", help = "Module to describe")]
    pub id: Option<String>,

    #[arg(short = 'f', long = "framework", value_enum, help = "Filter by framework")]
    pub framework: Option<FrameworkArg>,

    /// Only meaningful together with `--framework`; a lone archetype is
    /// combined with every framework.
    #[arg(short = 'a', long = "archetype", value_enum, help = "Filter by archetype")]
    pub archetype: Option<ArchetypeArg>,

    #[arg(long = "category", value_name = "NAME", help = "Filter by category")]
    pub category: Option<String>,

    /// Include baseline scaffold modules.
    #[arg(long = "all", help = "Show baseline modules too")]
    pub all: bool,

    #[arg(
        long = "modules-dir",
        value_name = "DIR",
        help = "Load additional modules from DIR (repeatable)"
    )]
    pub modules_dir: Vec<PathBuf>,

    #[arg(
        long = "format",
        value_enum,
        default_value = "table",
        help = "Output format"
    )]
    pub format: ListFormat,
}

/// Output format for the `modules` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table.
    Table,
    /// One id per line.
    List,
    /// JSON array.
    Json,
}

// ── completions ───────────────────────────────────────────────────────────────

/// Arguments for `kiln completions`.
#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

/// Subcommands for `kiln config`.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the value of a configuration key.
    Get {
        /// Dotted key path, e.g. `pipeline.max_retries`.
        key: String,
    },
    /// Print the effective configuration as TOML.
    List,
    /// Print the path of the default configuration file.
    Path,
}

// ── value enums ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum FrameworkArg {
    #[value(alias = "web")]
    WebApp,
    Api,
    Mobile,
    Desktop,
    Cli,
}

impl From<FrameworkArg> for Framework {
    fn from(arg: FrameworkArg) -> Self {
        match arg {
            FrameworkArg::WebApp => Self::WebApp,
            FrameworkArg::Api => Self::Api,
            FrameworkArg::Mobile => Self::Mobile,
            FrameworkArg::Desktop => Self::Desktop,
            FrameworkArg::Cli => Self::Cli,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum ArchetypeArg {
    Foundation,
    Business,
    Performance,
    CrossPlatform,
}

impl From<ArchetypeArg> for Archetype {
    fn from(arg: ArchetypeArg) -> Self {
        match arg {
            ArchetypeArg::Foundation => Self::Foundation,
            ArchetypeArg::Business => Self::Business,
            ArchetypeArg::Performance => Self::Performance,
            ArchetypeArg::CrossPlatform => Self::CrossPlatform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrictnessArg {
    Strict,
    Auto,
}

impl From<StrictnessArg> for Strictness {
    fn from(arg: StrictnessArg) -> Self {
        match arg {
            StrictnessArg::Strict => Self::Strict,
            StrictnessArg::Auto => Self::Auto,
        }
    }
}
