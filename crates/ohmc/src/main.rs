//! Circuit compiler CLI
//!
//! One generated artifact per invocation: the engine struct header, a call or
//! timer translation unit, a graphviz view, or the CMake fragment. Documents
//! are plain JSON; output goes to a file or stdout.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use ohm_core::loader::{
    generate_call_dot_file, generate_call_file, generate_circuit_dot_file,
    generate_cmake_fragment, generate_struct_file, generate_timer_file, load_circuit,
    load_definitions, load_loader_config, LoaderConfig, StructFileTarget,
};
use ohm_core::CircuitData;

#[derive(Parser)]
#[command(name = "ohmc")]
#[command(author, version, about = "Circuit compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CircuitArgs {
    /// Circuit graph JSON document
    #[arg(long)]
    circuit: PathBuf,
}

#[derive(Args)]
struct TargetArgs {
    /// Name of the generated engine struct
    #[arg(long)]
    struct_name: String,

    /// File stem of the struct header, without `.hh`
    #[arg(long)]
    struct_header: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the engine struct header
    Struct {
        #[command(flatten)]
        circuit: CircuitArgs,

        /// Loader config JSON with the include-path roots
        #[arg(long)]
        loader_config: PathBuf,

        #[arg(long)]
        struct_name: String,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate the translation unit for one call group
    Call {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Call group to generate
        #[arg(long)]
        call_name: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate the timer callback translation unit for one component
    Timer {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Component whose timer callset fires
        #[arg(long)]
        component: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Graphviz view of the components one call group wakes
    Dot {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[arg(long)]
        struct_name: String,

        #[arg(long)]
        call_name: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Graphviz view of every wire in the circuit
    CircuitDot {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// CMake fragment registering every generated translation unit
    Cmake {
        #[command(flatten)]
        circuit: CircuitArgs,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate documents without generating anything
    Check {
        #[command(flatten)]
        circuit: CircuitArgs,

        /// Standalone definition catalog JSON to validate as well
        #[arg(long)]
        definitions: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Struct {
            circuit,
            loader_config,
            struct_name,
            output,
        } => {
            let circuit = read_circuit(&circuit.circuit)?;
            let config = read_loader_config(&loader_config)?;
            let text = generate_struct_file(&struct_name, &config, &circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::Call {
            circuit,
            target,
            call_name,
            output,
        } => {
            let circuit = read_circuit(&circuit.circuit)?;
            if !circuit.call_groups.contains_key(&call_name) {
                bail!("call {call_name} not contained in circuit config");
            }
            let text = generate_call_file(&target.into(), &call_name, &circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::Timer {
            circuit,
            target,
            component,
            output,
        } => {
            let circuit = read_circuit(&circuit.circuit)?;
            if !circuit.components.contains_key(&component) {
                bail!("component {component} does not exist");
            }
            let text = generate_timer_file(&target.into(), &component, &circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::Dot {
            circuit,
            struct_name,
            call_name,
            output,
        } => {
            let circuit = read_circuit(&circuit.circuit)?;
            if !circuit.call_groups.contains_key(&call_name) {
                bail!("call {call_name} not contained in circuit config");
            }
            let text = generate_call_dot_file(&struct_name, &call_name, &circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::CircuitDot { circuit, output } => {
            let circuit = read_circuit(&circuit.circuit)?;
            let text = generate_circuit_dot_file(&circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::Cmake { circuit, output } => {
            let circuit = read_circuit(&circuit.circuit)?;
            let text = generate_cmake_fragment(&circuit)?;
            write_artifact(output.as_deref(), &text)
        }
        Commands::Check {
            circuit,
            definitions,
        } => {
            if let Some(path) = definitions {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                load_definitions(&text)
                    .with_context(|| format!("invalid definition catalog {}", path.display()))?;
                tracing::info!(catalog = %path.display(), "definition catalog ok");
            }
            let circuit = read_circuit(&circuit.circuit)?;
            tracing::info!(
                components = circuit.components.len(),
                externals = circuit.externals.len(),
                call_groups = circuit.call_groups.len(),
                "circuit ok"
            );
            Ok(())
        }
    }
}

impl From<TargetArgs> for StructFileTarget {
    fn from(args: TargetArgs) -> Self {
        StructFileTarget {
            struct_name: args.struct_name,
            struct_header: args.struct_header,
        }
    }
}

fn read_circuit(path: &Path) -> Result<CircuitData> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let circuit = load_circuit(&text)
        .with_context(|| format!("invalid circuit document {}", path.display()))?;
    Ok(circuit)
}

fn read_loader_config(path: &Path) -> Result<LoaderConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = load_loader_config(&text)
        .with_context(|| format!("invalid loader config {}", path.display()))?;
    Ok(config)
}

fn write_artifact(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}
