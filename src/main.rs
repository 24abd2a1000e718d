use clap::Parser;
use repoxplode::{Cli, OutputFormatter, RepoXplode, UserFriendlyError, XplodeError};
use std::process;

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(&cli);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match RepoXplode::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&cli, &e);
            return exit_code(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &app);
    }

    match app.explode(cli.repository_path()).await {
        Ok(report) => match report.verdict() {
            Ok(()) => 0,
            Err(aggregate) => {
                let cancelled = report.cancelled;
                let error = XplodeError::from(aggregate);
                app.handle_error(&error);
                if cancelled {
                    130
                } else {
                    exit_code(&error)
                }
            }
        },
        Err(e) => {
            app.handle_error(&e);
            exit_code(&e)
        }
    }
}

fn exit_code(error: &XplodeError) -> i32 {
    match error {
        XplodeError::Cancelled => 130, // Interrupted (SIGINT)
        XplodeError::Config { .. } | XplodeError::InvalidFolderFormat { .. } => 2,
        XplodeError::NotARepository { .. } | XplodeError::RefNotFound { .. } => 3,
        XplodeError::NoCommits { .. } => 4,
        XplodeError::OutputDirectoryExists { .. } => 8,
        _ => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "repoxplode.toml".to_string());

    if std::path::Path::new(&config_path).exists() && !cli.force {
        eprintln!("Configuration file already exists: {}", config_path);
        eprintln!("Suggestion: use --force to overwrite it.");
        return 8;
    }

    match RepoXplode::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  repoxplode <repository> --config {}", config_path);
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, app: &RepoXplode) -> i32 {
    let formatter = app.output_formatter();

    if let Err(e) = app.config().tools.resolve() {
        app.handle_error(&e);
        return exit_code(&e);
    }

    let plan = match app.plan(cli.repository_path()) {
        Ok(plan) => plan,
        Err(e) => {
            app.handle_error(&e);
            return exit_code(&e);
        }
    };

    formatter.print_plan(&plan);

    if plan.output_directory.exists() {
        if app.config().output.force {
            formatter.warning("Output directory exists and would be replaced");
        } else {
            formatter.warning("Output directory already exists; the run would fail without --force");
        }
    }

    0
}

fn print_startup_error(cli: &Cli, error: &XplodeError) {
    let formatter = OutputFormatter::new(cli.output_format.into(), 0, false);
    formatter.print_user_friendly_error(error);
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `-vv`.
fn setup_logging(cli: &Cli) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        match cli.verbosity_level() {
            0 | 1 => "repoxplode=warn".to_string(),
            2 => "repoxplode=debug".to_string(),
            _ => "repoxplode=trace".to_string(),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
