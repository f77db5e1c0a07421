//! ipedslab CLI — IPEDS collection, import and report commands.
//!
//! Commands:
//! - `collect` — sweep the Education Data Portal API for every member and year
//! - `import` — load annual survey databases (`.accdb`) into the local store
//! - `titles` — load variable titles from the yearly documentation workbooks
//! - `report` — library report (combined and/or per year) as XLSX
//! - `fte-report` — FTE & total expenses report as XLSX
//! - `summary` — institutions per survey table and year
//! - `describe` — tables in the local store, or titles of named variables
//! - `config` — print the effective configuration as TOML

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ipedslab_core::data::{datacenter, EducationDataPortal, LogProgress, MdbToolsSource};
use ipedslab_core::domain::{AcademicYear, UnitId};
use ipedslab_core::reconcile::{AliasTable, SchemaReconciler};
use ipedslab_runner::report::fte::{self, FteData};
use ipedslab_runner::report::summary::AvailabilitySummary;
use ipedslab_runner::report::{filter_descriptions, library, save_reports};
use ipedslab_runner::{
    collect_all, import_releases, import_titles, present_release_years, save_collection,
    timestamp, CollectOptions, HarvestConfig, ImportSummary, ReportLayout, Store, TitleLookup,
    YearRange, YearStatus, API_METRICS,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ipedslab",
    about = "ipedslab — IPEDS data collection and reporting for consortium libraries"
)]
struct Cli {
    /// TOML configuration file. Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch library and enrollment records from the API for every member and year.
    Collect {
        /// First survey year (overrides config).
        #[arg(long)]
        from: Option<i32>,

        /// Last survey year (overrides config).
        #[arg(long)]
        to: Option<i32>,

        /// Output directory for the CSV and SQLite artifacts.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Only sweep these unit ids (repeatable).
        #[arg(long = "unit", value_name = "UNITID")]
        units: Vec<u32>,
    },
    /// Import annual survey databases into the local store.
    Import {
        /// Replace an existing store.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Import variable titles into the local store.
    Titles,
    /// Generate the library report.
    Report {
        #[arg(long, value_enum, default_value_t = Layout::Both)]
        layout: Layout,
    },
    /// Generate the FTE & total expenses report.
    FteReport {
        #[arg(long, value_enum, default_value_t = Layout::Both)]
        layout: Layout,
    },
    /// Distinct institutions per survey table and year.
    Summary,
    /// List tables in the local store.
    Describe {
        /// Print the current title of these variables instead (repeatable).
        #[arg(long = "var", value_name = "NAME")]
        vars: Vec<String>,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Combined,
    PerYear,
    Both,
}

impl From<Layout> for ReportLayout {
    fn from(l: Layout) -> Self {
        match l {
            Layout::Combined => ReportLayout::Combined,
            Layout::PerYear => ReportLayout::PerYear,
            Layout::Both => ReportLayout::Both,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = HarvestConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Collect {
            from,
            to,
            output_dir,
            units,
        } => run_collect(&config, from, to, output_dir, &units),
        Commands::Import { force } => run_import(&config, force),
        Commands::Titles => run_titles(&config),
        Commands::Report { layout } => run_report(&config, layout.into()),
        Commands::FteReport { layout } => run_fte_report(&config, layout.into()),
        Commands::Summary => run_summary(&config),
        Commands::Describe { vars } => run_describe(&config, &vars),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn run_collect(
    config: &HarvestConfig,
    from: Option<i32>,
    to: Option<i32>,
    output_dir: Option<PathBuf>,
    units: &[u32],
) -> Result<()> {
    let range = YearRange::new(
        from.unwrap_or(config.api.years.first),
        to.unwrap_or(config.api.years.last),
    );
    if range.is_empty() {
        bail!("--from {} is after --to {}", range.first, range.last);
    }
    let units: Vec<UnitId> = units.iter().copied().map(UnitId).collect();
    let registry = config.collection_registry(&units)?;
    let api =
        EducationDataPortal::new(&config.api.base_url, config.timeout(), config.api.max_pages)?;
    let opts = CollectOptions {
        years: range.years(),
        delay: config.request_delay(),
    };
    // Documented names from an imported store take priority when one exists.
    let reconciler = match Store::open(&config.paths.store) {
        Ok(store) => store.reconciler()?,
        Err(_) => SchemaReconciler::standard(),
    };

    let outcome = collect_all(&api, &registry, &reconciler, &opts, &LogProgress);
    let s = &outcome.summary;

    println!("Collection complete");
    println!("  Institutions: {}", s.institutions);
    println!("  Years:        {} ({}-{})", s.years, range.first, range.last);
    println!("  Rows:         {}", s.rows);
    println!("  API calls:    {} ({} failed)", s.calls, s.failed_calls);
    println!("\nRecords per year:");
    for year in &opts.years {
        println!("  {year}: {}", s.records_per_year.get(year).copied().unwrap_or(0));
    }
    println!("\nMissing values:");
    for metric in API_METRICS {
        println!(
            "  {:<18} {:>5} ({:.1}%)",
            metric.key(),
            s.missing.get(&metric).copied().unwrap_or(0),
            s.missing_pct(metric)
        );
    }

    let dir = output_dir.unwrap_or_else(|| config.paths.output_dir.clone());
    let saved = save_collection(
        &outcome,
        &API_METRICS,
        &dir,
        &config.names.collection,
        &timestamp(),
    )?;
    println!("\nSaved: {}", saved.csv.display());
    println!("Saved: {}", saved.sqlite.display());
    Ok(())
}

fn run_import(config: &HarvestConfig, force: bool) -> Result<()> {
    let registry = config.registry()?;
    let years = config.database.years.years();
    if present_release_years(&config.paths.input_dir, &years).is_empty() {
        bail!(
            "no survey databases for {}-{} in {}",
            config.database.years.first,
            config.database.years.last,
            config.paths.input_dir.display()
        );
    }
    let mut store = Store::create(&config.paths.store, force)?;
    let bin_dir = config.database.mdb_bin_dir.clone();
    let summary = import_releases(
        &config.paths.input_dir,
        &years,
        &registry,
        &mut store,
        |path| MdbToolsSource::open(path, bin_dir.clone()),
    )?;
    print_import(&summary);

    if summary.imported_years().is_empty() {
        bail!(
            "no survey databases imported from {}",
            config.paths.input_dir.display()
        );
    }
    println!("\nStore: {}", store.path().display());
    Ok(())
}

fn print_import(summary: &ImportSummary) {
    for y in &summary.years {
        match &y.status {
            YearStatus::Imported { tables, missing_tables } => {
                println!("{}:", y.year);
                for (name, rows) in tables {
                    println!("  {name:<12} {rows:>5} rows");
                }
                for name in missing_tables {
                    println!("  {name:<12} not imported");
                }
            }
            YearStatus::MissingFile(path) => {
                println!("{}: {} not found, skipped", y.year, path.display())
            }
            YearStatus::Failed(msg) => println!("{}: FAILED: {msg}", y.year),
        }
    }
    println!(
        "\nImported {} year(s), {} table(s)",
        summary.imported_years().len(),
        summary.tables_written()
    );
}

fn run_titles(config: &HarvestConfig) -> Result<()> {
    let mut store = Store::open(&config.paths.store)
        .context("run `ipedslab import` first to create the store")?;
    let summary = import_titles(
        &config.paths.input_dir,
        &config.database.titles_years.years(),
        &AliasTable::standard(),
        &mut store,
    )?;

    println!("Loaded years:  {}", join_years(&summary.loaded_years));
    if !summary.skipped_years.is_empty() {
        println!("Skipped years: {}", join_years(&summary.skipped_years));
    }
    println!("Variables:     {}", summary.variables);
    println!("With title changes: {}", summary.variations);
    println!("Name map entries:   {}", summary.name_map_entries);
    println!("\nSample:");
    for (name, title) in &summary.sample {
        println!("  {name:<12} {title}");
    }
    Ok(())
}

fn run_report(config: &HarvestConfig, layout: ReportLayout) -> Result<()> {
    let store = Store::open(&config.paths.store)
        .context("run `ipedslab import` first to create the store")?;
    let titles = TitleLookup::new(store.title_lookup()?);

    println!("Variable filters:");
    for line in filter_descriptions() {
        println!("  {line}");
    }

    let combined = if layout.combined() {
        Some(library::combined_report(&store, &titles)?)
    } else {
        None
    };
    let per_year = if layout.per_year() {
        library::year_reports(&store, &titles)?
    } else {
        Default::default()
    };

    let saved = save_reports(
        combined.as_ref(),
        &per_year,
        &config.paths.output_dir,
        &config.names.library_report,
        &timestamp(),
    )?;
    if let Some(table) = &combined {
        println!(
            "\nCombined: {} institutions × {} columns",
            table.len(),
            table.columns.len()
        );
    }
    for (year, table) in &per_year {
        println!("{year}: {} institutions × {} columns", table.len(), table.columns.len());
    }
    print_saved(&saved);
    Ok(())
}

fn run_fte_report(config: &HarvestConfig, layout: ReportLayout) -> Result<()> {
    let registry = config.registry()?;
    let exports =
        datacenter::find_exports(&config.paths.input_dir, &config.names.data_center_export)?;

    // Exports alone are enough when no store has been imported.
    let mut data = match Store::open(&config.paths.store) {
        Ok(store) => {
            println!("Store years: {}", join_years(&FteData::store_years(&store)?));
            FteData::from_store(&store, &registry, &store.reconciler()?)?
        }
        Err(e) => {
            tracing::warn!("{e}");
            FteData::default()
        }
    };
    for (year, path) in &exports {
        println!("Export {year}: {}", path.display());
    }
    data.apply_exports(&exports, &registry);
    if data.years().is_empty() {
        bail!("no FTE or expenses data in the store or Data Center exports");
    }
    println!("Report years: {}", join_years(&data.years()));

    let combined = layout.combined().then(|| fte::combined_table(&data, &registry));
    let per_year = if layout.per_year() {
        fte::year_tables(&data, &registry)
    } else {
        Default::default()
    };
    let saved = save_reports(
        combined.as_ref(),
        &per_year,
        &config.paths.output_dir,
        &config.names.fte_report,
        &timestamp(),
    )?;
    print_saved(&saved);
    Ok(())
}

fn run_summary(config: &HarvestConfig) -> Result<()> {
    let store = Store::open(&config.paths.store)
        .context("run `ipedslab import` first to create the store")?;
    let summary = AvailabilitySummary::from_source(&store)?;
    print!("{summary}");
    Ok(())
}

fn run_describe(config: &HarvestConfig, vars: &[String]) -> Result<()> {
    let store = Store::open(&config.paths.store)
        .context("run `ipedslab import` first to create the store")?;
    if !vars.is_empty() {
        for name in vars {
            match store.variable_title(name)? {
                Some(title) => println!("{name:<12} {title}"),
                None => println!("{name:<12} (no title; run `ipedslab titles`)"),
            }
        }
        return Ok(());
    }
    println!("{}", store.path().display());
    for t in store.describe()? {
        println!("  {:<24} {:>6} rows  {:>3} columns", t.name, t.rows, t.columns.len());
    }
    Ok(())
}

fn join_years(years: &[AcademicYear]) -> String {
    if years.is_empty() {
        return "none".into();
    }
    years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(", ")
}

fn print_saved(paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("\nNo reports written");
        return;
    }
    println!("\nSaved:");
    for p in paths {
        println!("  {}", p.display());
    }
}
