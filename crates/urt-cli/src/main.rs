use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "urt")]
#[command(about = "Regime-gated trading pipeline operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monte Carlo risk reports and veto checks
    Mc {
        #[command(subcommand)]
        cmd: McCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Build the pipeline and router from layered config and report unused keys
    ConfigCheck {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Unused keys are an error instead of a warning
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum McCmd {
    /// Simulate an R-multiple sample and write one RiskReport
    Run(commands::mc::RunArgs),

    /// Absolute veto over one report file
    Veto {
        #[arg(long)]
        report: String,
    },

    /// Drift veto over a recent/baseline pair of report files
    Drift {
        #[arg(long)]
        recent: String,

        #[arg(long)]
        baseline: String,

        #[arg(long, default_value_t = 0.05)]
        threshold: f64,
    },
}

fn main() -> ExitCode {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    let res = match cli.cmd {
        Commands::Mc { cmd } => match cmd {
            McCmd::Run(args) => commands::mc::run(args),
            McCmd::Veto { report } => commands::mc::veto(&report),
            McCmd::Drift {
                recent,
                baseline,
                threshold,
            } => commands::mc::drift(&recent, &baseline, threshold),
        },
        Commands::ConfigHash { paths } => commands::config::hash(&paths),
        Commands::ConfigCheck { paths, strict } => commands::config::check(&paths, strict),
    };

    match res {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(commands::EXIT_ERROR)
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
