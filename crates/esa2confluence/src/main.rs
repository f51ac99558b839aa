use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use esa2confluence_core::config::{
    ConfluenceSettings, EsaSettings, FileConfig, config_path, load_config,
};
use esa2confluence_core::confirm::StdinConfirm;
use esa2confluence_core::confluence::ConfluenceClient;
use esa2confluence_core::esa::EsaClient;
use esa2confluence_core::migrate::{MigrateOptions, MigrateReport, RootPage, migrate_documents};
use esa2confluence_core::space::ConfluenceSpace;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "esa2confluence",
    version,
    about = "Migrate exported esa posts into a Confluence space",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    #[command(flatten)]
    migrate: MigrateArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(
        name = "delete-all",
        about = "Delete every page in the configured space, batch by batch"
    )]
    DeleteAll(DeleteAllArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(long, value_name = "PATH", help = "TOML config file (default: ./esa2confluence.toml)")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[arg(value_name = "TARGET_DIR", help = "Directory of exported esa Markdown files")]
    target_dir: Option<PathBuf>,
    #[arg(
        value_name = "RESTART_AT",
        help = "Skip files until one whose path contains this text (plain substring, not a pattern); that file is migrated"
    )]
    restart_at: Option<String>,
    #[arg(long, help = "Also migrate comments from the esa API")]
    comments: bool,
    #[arg(
        long,
        value_name = "TITLE",
        help = "Title of the root page (default: current time, UTC+09:00)"
    )]
    root_page_title: Option<String>,
    #[arg(
        long,
        conflicts_with = "root_page_title",
        help = "Create top-level pages at the space root"
    )]
    no_root_page: bool,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Args)]
struct DeleteAllArgs {
    #[command(flatten)]
    config: ConfigArgs,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::DeleteAll(args)) => run_delete_all(args),
        None => run_migrate(cli.migrate),
    }
}

fn run_migrate(args: MigrateArgs) -> Result<()> {
    let Some(target_dir) = args.target_dir else {
        bail!("please specify the directory of exported esa posts");
    };
    if !target_dir.is_dir() {
        bail!("directory `{}` does not exist", normalize_path(&target_dir));
    }

    let file_config = load_runtime_config(&args.config)?;
    let settings = ConfluenceSettings::resolve(&file_config)?;
    let esa_settings = if args.comments {
        Some(EsaSettings::resolve(&file_config)?)
    } else {
        None
    };

    let root_page = match (args.no_root_page, args.root_page_title) {
        (true, _) => RootPage::None,
        (false, Some(title)) => RootPage::Titled(title),
        (false, None) => RootPage::Timestamped,
    };
    let options = MigrateOptions {
        target_dir,
        restart_at: args.restart_at,
        root_page,
        migrate_comments: args.comments,
    };

    let space_id = settings.space_id.clone();
    let mut space = ConfluenceSpace::new(ConfluenceClient::new(settings)?, StdinConfirm, &space_id);
    let mut esa = esa_settings.map(EsaClient::new).transpose()?;
    let report = migrate_documents(&mut space, esa.as_mut(), &options)?;

    print_migrate_report(&options, &space_id, &report);
    Ok(())
}

fn run_delete_all(args: DeleteAllArgs) -> Result<()> {
    let file_config = load_runtime_config(&args.config)?;
    let settings = ConfluenceSettings::resolve(&file_config)?;
    let space_id = settings.space_id.clone();
    let mut space = ConfluenceSpace::new(ConfluenceClient::new(settings)?, StdinConfirm, &space_id);

    let deleted = space.delete_all_pages()?;

    println!("delete-all");
    println!("space_id: {space_id}");
    println!("deleted_pages: {deleted}");
    println!("request_count: {}", space.request_count());
    Ok(())
}

fn load_runtime_config(args: &ConfigArgs) -> Result<FileConfig> {
    dotenvy::dotenv().ok();
    load_config(&config_path(args.config.as_deref()))
}

fn print_migrate_report(options: &MigrateOptions, space_id: &str, report: &MigrateReport) {
    println!("migrate");
    println!("target_dir: {}", normalize_path(&options.target_dir));
    println!("space_id: {space_id}");
    println!(
        "root_page_id: {}",
        report.root_page_id.as_deref().unwrap_or("<none>")
    );
    println!("scanned_files: {}", report.scanned_files);
    println!("skipped_files: {}", report.skipped_files);
    println!("migrated_pages: {}", report.migrated_pages);
    println!("directory_pages: {}", report.directory_pages);
    if options.migrate_comments {
        println!("migrated_comments: {}", report.migrated_comments);
    }
    if let Some(matched) = report.restart_marker_matched {
        println!("restart_marker_matched: {}", format_flag(matched));
    }
    println!("request_count: {}", report.request_count);
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
