use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "fnscale",
    about = "fnscale — ship function apps as containers with event-driven autoscaling",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and normalize a container image reference
    Image {
        /// Image reference, e.g. reg.example.com/app:v2
        reference: String,
        /// Registry used when the reference does not name one
        #[arg(long)]
        default_registry: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Compose an autoscaler ScaledObject from the project's trigger bindings.
    ///
    /// Reads fnscale.toml (if present) and every */function.json under the
    /// project directory. Exits non-zero when any binding fails validation.
    Manifest {
        /// Project directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        path: String,
        /// Name of the ScaledObject and its scale target.
        /// Defaults to [app].name in fnscale.toml.
        #[arg(short, long)]
        name: Option<String>,
        /// Namespace. Defaults to [app].namespace in fnscale.toml, then "default".
        #[arg(long)]
        namespace: Option<String>,
        /// Output format: yaml or json
        #[arg(short, long, default_value = "yaml")]
        format: String,
        /// Trigger types without a schema: skip, warn or reject
        #[arg(long)]
        unknown_triggers: Option<String>,
    },
    /// Generate an fnscale.toml scaffold
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
        /// App name. Defaults to the directory name.
        #[arg(short, long)]
        name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fnscale=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Image {
            reference,
            default_registry,
            format,
        } => commands::image::image(&reference, default_registry.as_deref(), &format),
        Commands::Manifest {
            path,
            name,
            namespace,
            format,
            unknown_triggers,
        } => commands::manifest::manifest(&commands::manifest::ManifestArgs {
            path,
            name,
            namespace,
            format,
            unknown_triggers,
        }),
        Commands::Init { path, name } => commands::init::init(&path, name.as_deref()),
    }
}
