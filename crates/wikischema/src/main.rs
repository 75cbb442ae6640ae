use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wikischema_core::batch::{
    BatchReport, SnapshotFormat, load_snapshots, process_batch, write_snapshot,
};
use wikischema_core::config::{SchemaConfig, load_config};
use wikischema_core::diff::{diff_entities, diff_sections};
use wikischema_core::extract::extract_document;
use wikischema_core::naming::PatternNameDeriver;
use wikischema_core::projections::{Projections, write_side_files};
use wikischema_core::report::{summary_line, write_reports};
use wikischema_core::runtime::{
    InitOptions, PathOverrides, ResolutionContext, ResolvedPaths, init_layout, inspect_runtime,
    resolve_paths,
};
use wikischema_core::source::DirectorySource;

#[derive(Debug, Parser)]
#[command(
    name = "wikischema",
    version,
    about = "Extract versioned entity metadata schemas from wiki markup and report changes"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    config: Option<PathBuf>,
    diagnostics: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            config: cli.config.clone(),
            diagnostics: cli.diagnostics,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create source/, output/ and .wikischema/ with a default config")]
    Init(InitArgs),
    #[command(about = "Extract one wiki document into a snapshot")]
    Extract(ExtractArgs),
    #[command(about = "Extract every source/<version>.txt into output/")]
    Batch,
    #[command(about = "Compare all snapshots in output/ and write change reports")]
    Diff,
    #[command(about = "Show resolved paths and document counts")]
    Status,
}

#[derive(Debug, Args)]
struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    force: bool,
    #[arg(long, help = "Skip writing .wikischema/config.toml")]
    no_config: bool,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
    #[arg(long, value_name = "FILE", help = "Write here instead of stdout")]
    output: Option<PathBuf>,
    #[arg(long, value_name = "LABEL", help = "Version label (defaults to the input file stem)")]
    version: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Init(args)) => run_init(&runtime, args),
        Some(Commands::Extract(args)) => run_extract(&runtime, args),
        Some(Commands::Batch) => run_batch(&runtime),
        Some(Commands::Diff) => run_diff(&runtime),
        Some(Commands::Status) => run_status(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_init(runtime: &RuntimeOptions, args: InitArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let report = init_layout(
        &paths,
        &InitOptions {
            materialize_config: !args.no_config,
            force: args.force,
        },
    )?;

    println!("Initialized wikischema layout");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!("source_dir: {}", normalize_path(&paths.source_dir));
    println!("output_dir: {}", normalize_path(&paths.output_dir));
    println!("reports_dir: {}", normalize_path(&paths.reports_dir));
    println!("state_dir: {}", normalize_path(&paths.state_dir));
    println!("config_path: {}", normalize_path(&paths.config_path));
    println!("created_dirs: {}", report.created_dirs.len());
    println!("wrote_config: {}", report.wrote_config);
    print_diagnostics(runtime, &paths);

    Ok(())
}

fn run_extract(runtime: &RuntimeOptions, args: ExtractArgs) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let options = config.batch_options()?;

    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let hint = args.version.clone().or_else(|| {
        args.input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
    });
    let deriver = PatternNameDeriver;
    let snapshot = extract_document(&text, hint.as_deref(), &options.extract, &deriver);

    let Some(output) = args.output else {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    };

    let format = SnapshotFormat::from_path(&output).unwrap_or(options.format);
    write_snapshot(&output, &snapshot, format)?;

    println!("extract");
    println!("input: {}", normalize_path(&args.input));
    println!("output: {}", normalize_path(&output));
    println!("version: {}", snapshot.version);
    println!("format: {}", format.as_str());
    println!("entities: {}", snapshot.entities.len());
    println!("sections: {}", snapshot.sections.len());
    if options.side_files {
        let side_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let projections = Projections::from_snapshot(&snapshot, &deriver);
        let files = write_side_files(side_dir, &snapshot.version, &projections)?;
        println!("side_files.meanings: {}", normalize_path(&files.meanings));
        println!("side_files.names: {}", normalize_path(&files.names));
        println!(
            "side_files.meaning_compare: {}",
            normalize_path(&files.meaning_compare)
        );
        println!("side_files.types: {}", normalize_path(&files.types));
    }
    print_diagnostics(runtime, &paths);

    Ok(())
}

fn run_batch(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let config = load_runtime_config(&paths)?;
    let options = config.batch_options()?;
    if !paths.source_dir.exists() {
        bail!(
            "source directory is missing: {}\nRun: wikischema init --project-root {}",
            normalize_path(&paths.source_dir),
            normalize_path(&paths.project_root)
        );
    }

    let source = DirectorySource::new(&paths.source_dir);
    let report = process_batch(&source, &paths.output_dir, &options, &PatternNameDeriver)?;

    println!("batch");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!("source_dir: {}", normalize_path(&paths.source_dir));
    println!("output_dir: {}", normalize_path(&paths.output_dir));
    println!("format: {}", options.format.as_str());
    println!("side_files: {}", format_flag(options.side_files));
    print_batch_report("batch", &report);
    print_diagnostics(runtime, &paths);

    if report.processed.is_empty() && !report.failures.is_empty() {
        bail!("every source document failed to extract");
    }
    Ok(())
}

fn run_diff(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let loaded = load_snapshots(&paths.output_dir)?;
    if loaded.snapshots.is_empty() {
        bail!(
            "no snapshots found in {} (run `wikischema batch` first)",
            normalize_path(&paths.output_dir)
        );
    }

    let entities = diff_entities(&loaded.snapshots);
    let sections = diff_sections(&loaded.snapshots);
    let written = write_reports(&paths.reports_dir, &entities, &sections)?;

    println!("diff");
    println!("versions: {}", entities.versions.join(", "));
    println!(
        "entities: {}",
        summary_line("entities", entities.changes.len(), entities.total)
    );
    println!(
        "metadata: {}",
        summary_line("metadata types", sections.changes.len(), sections.total)
    );
    println!("report.entities: {}", normalize_path(&written.entity_report));
    println!("report.metadata: {}", normalize_path(&written.metadata_report));
    if !loaded.skipped.is_empty() {
        println!("warnings:");
        for skipped in &loaded.skipped {
            println!("  - skipped {}: {}", skipped.version, skipped.error);
        }
    }
    print_diagnostics(runtime, &paths);

    Ok(())
}

fn run_status(runtime: &RuntimeOptions) -> Result<()> {
    let paths = resolve_runtime_paths(runtime)?;
    let status = inspect_runtime(&paths)?;

    println!("runtime status");
    println!("project_root: {}", normalize_path(&paths.project_root));
    println!(
        "project_root_exists: {}",
        format_flag(status.project_root_exists)
    );
    println!("source_dir_exists: {}", format_flag(status.source_dir_exists));
    println!("output_dir_exists: {}", format_flag(status.output_dir_exists));
    println!("state_dir_exists: {}", format_flag(status.state_dir_exists));
    println!("config_exists: {}", format_flag(status.config_exists));
    println!("source.documents: {}", status.source_documents);
    println!("output.snapshots: {}", status.snapshot_files);
    if !status.warnings.is_empty() {
        println!("warnings:");
        for warning in &status.warnings {
            println!("  - {warning}");
        }
    }
    print_diagnostics(runtime, &paths);

    Ok(())
}

fn print_batch_report(prefix: &str, report: &BatchReport) {
    println!("{prefix}.processed: {}", report.processed.len());
    for processed in &report.processed {
        println!(
            "{prefix}.document: {} entities={} sections={} hash={} -> {}",
            processed.version,
            processed.entity_count,
            processed.section_count,
            processed.content_hash,
            normalize_path(&processed.output_path)
        );
    }
    println!("{prefix}.failures: {}", report.failures.len());
    for failure in &report.failures {
        println!("{prefix}.failure: {} ({})", failure.version, failure.error);
    }
}

fn print_diagnostics(runtime: &RuntimeOptions, paths: &ResolvedPaths) {
    if runtime.diagnostics {
        println!("\n[diagnostics]\n{}", paths.diagnostics());
    }
}

fn load_runtime_config(paths: &ResolvedPaths) -> Result<SchemaConfig> {
    load_config(&paths.config_path)
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    let paths = resolve_paths(&context, &overrides)?;
    debug!(
        project_root = %normalize_path(&paths.project_root),
        source = paths.root_source.as_str(),
        "resolved runtime paths"
    );
    Ok(paths)
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn format_flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
