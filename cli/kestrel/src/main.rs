//! Kestrel CLI: target descriptions and the optimization pipeline from the
//! command line.

mod commands;
mod logging;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use kestrel_opt::OptimizeOptions;

use manifest::KestrelManifest;

#[derive(Parser)]
#[command(name = "kestrel", version, about = "Kestrel backend configuration tools")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter kestrel.toml in the current directory
    Init {
        /// Default target triple (default: host)
        #[arg(long)]
        triple: Option<String>,
    },
    /// Inspect supported and project-defined targets
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
    /// Print the optimization pipeline for a set of flags
    Pipeline {
        #[command(flatten)]
        mode: ModeArgs,
        /// Also print the equivalent LLVM pipeline text
        #[arg(long)]
        native: bool,
    },
    /// Optimize a compilation unit (JSON)
    Opt {
        /// Input unit
        input: PathBuf,
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Build the target from a project spec instead of the unit's metadata
        #[arg(long)]
        target: Option<String>,
        #[command(flatten)]
        mode: ModeArgs,
        /// Print the optimization report to stderr
        #[arg(long)]
        report: bool,
    },
    /// Structurally verify a compilation unit (JSON)
    Verify {
        /// Input unit
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// List supported architectures and project target specs
    List,
    /// Resolve and describe a target machine
    Describe {
        /// Target spec name from targets/, or a triple
        name: String,
        /// CPU name (default: host when the triple matches it)
        #[arg(long)]
        cpu: Option<String>,
        /// Feature string, e.g. "+avx2,-fma"
        #[arg(long)]
        features: Option<String>,
        /// Position-independent code
        #[arg(long)]
        pic: bool,
        /// Output format (human, toml, json)
        #[arg(long)]
        format: Option<String>,
    },
}

/// Pipeline flags. Unset flags fall back to `[optimize]` in kestrel.toml.
#[derive(Args, Debug, Clone, Copy)]
struct ModeArgs {
    /// Debug pipeline
    #[arg(long, conflicts_with = "release")]
    debug: bool,
    /// Release pipeline (overrides `debug = true` in kestrel.toml)
    #[arg(long)]
    release: bool,
    /// The unit will be JIT-compiled
    #[arg(long)]
    jit: bool,
    /// Position-independent code
    #[arg(long)]
    pic: bool,
}

impl ModeArgs {
    fn resolve(self, manifest: Option<&KestrelManifest>) -> OptimizeOptions<'static> {
        let defaults = manifest.map(|m| m.optimize.clone()).unwrap_or_default();
        OptimizeOptions {
            debug: if self.release {
                false
            } else {
                self.debug || defaults.debug
            },
            jit: self.jit || defaults.jit,
            pic: self.pic || defaults.pic,
            plugins: None,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let (manifest, project_dir) = load_manifest_optional(&cwd)?;
    let project_dir = project_dir.unwrap_or_else(|| cwd.clone());

    let configured_level = manifest.as_ref().and_then(|m| m.logging.level.as_deref());
    logging::init(cli.verbose, configured_level)?;

    match cli.command {
        Commands::Init { triple } => commands::init::run(&cwd, triple.as_deref()),

        Commands::Target { action } => match action {
            TargetAction::List => commands::target::list(&project_dir),
            TargetAction::Describe {
                name,
                cpu,
                features,
                pic,
                format,
            } => commands::target::describe(
                &project_dir,
                &name,
                cpu.as_deref(),
                features.as_deref(),
                pic,
                format.as_deref(),
            ),
        },

        Commands::Pipeline { mode, native } => {
            let registry = manifest
                .as_ref()
                .map(KestrelManifest::plugin_registry)
                .transpose()?
                .unwrap_or_default();
            let options = mode.resolve(manifest.as_ref()).with_plugins(&registry);
            commands::pipeline::run(&options, native)
        }

        Commands::Opt {
            input,
            output,
            target,
            mode,
            report,
        } => {
            let registry = manifest
                .as_ref()
                .map(KestrelManifest::plugin_registry)
                .transpose()?
                .unwrap_or_default();
            let options = mode.resolve(manifest.as_ref()).with_plugins(&registry);
            commands::opt::run(
                &project_dir,
                manifest.as_ref(),
                &input,
                output.as_deref(),
                target.as_deref(),
                &options,
                report,
            )
        }

        Commands::Verify { input } => commands::verify::run(&input),
    }
}

fn load_manifest_optional(cwd: &Path) -> anyhow::Result<(Option<KestrelManifest>, Option<PathBuf>)> {
    match KestrelManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}
