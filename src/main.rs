use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{error, warn};

use genua::config::AppConfig;
use genua::dashboard::PatientDashboard;
use genua::demo;
use genua::error::GenuaError;
use genua::logging::init_logging;
use genua::models::{CheckInForm, Observation, PatientId, PatientProfile, StandardizedAssessment};
use genua::report::json::JsonRenderer;
use genua::report::text::TextRenderer;
use genua::report::{ChartImage, Document, RenderSink};
use genua::store::{CsvStore, RecordStore};

/// genua - knee rehabilitation check-in analytics
///
/// Records patient check-ins, derives functional scores, projects a discharge
/// date and assembles progress reports.
#[derive(Parser)]
#[command(name = "genua")]
#[command(author = "genua contributors")]
#[command(version)]
#[command(about = "Knee rehabilitation check-in analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the data directory from the configuration
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a patient check-in
    Checkin {
        #[arg(short, long)]
        patient: String,

        /// Pain level 0-10
        #[arg(long)]
        pain: String,

        /// Sleep quality (Poor, Fair, Good)
        #[arg(long)]
        sleep: String,

        /// Posture during the day (Sitting, Balanced, Standing)
        #[arg(long)]
        posture: String,

        /// Squat test (Unable, Moderate Pain, Mild Pain, No Pain)
        #[arg(long)]
        squat: String,

        #[arg(long)]
        step_up: String,

        #[arg(long)]
        step_down: String,

        /// Stroke test swelling grade 0-3
        #[arg(long)]
        swelling: Option<String>,

        /// Capture time (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Record a standardized (IKDC) assessment
    Assess {
        #[arg(short, long)]
        patient: String,

        /// Score 0-100
        #[arg(short, long)]
        score: f64,

        /// Assessment date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Register or update a patient's clinical history
    Register {
        #[arg(short, long)]
        patient: String,

        #[arg(long)]
        history: String,
    },

    /// Import a check-in export (CSV, English or legacy Portuguese headers)
    Import {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List known patients
    Patients,

    /// Show a patient's dashboard
    Dashboard {
        #[arg(short, long)]
        patient: String,

        /// Number of recent check-ins to list
        #[arg(short, long, default_value = "5")]
        recent: usize,

        /// Print the view model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a progress report
    Report {
        #[arg(short, long)]
        patient: String,

        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: ReportFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Clinical summary text (generated when omitted)
        #[arg(short, long)]
        narrative: Option<String>,

        /// Directory for rendered chart images
        #[arg(long)]
        charts_dir: Option<PathBuf>,
    },

    /// Generate the synthetic demo cohort
    Demo {
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// First session date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Write a legacy-format CSV export instead of seeding the store
        #[arg(long, value_name = "FILE")]
        legacy_csv: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        match err.downcast_ref::<GenuaError>() {
            Some(genua_err) => {
                if genua_err.severity().to_tracing_level() == tracing::Level::ERROR {
                    error!(error = %genua_err, "Command failed");
                } else {
                    warn!(error = %genua_err, "Command failed");
                }
                eprintln!("{} {}", "Error:".red().bold(), genua_err.user_message());
            }
            None => eprintln!("{} {:#}", "Error:".red().bold(), err),
        }
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.settings.data_dir = dir.clone();
    }
    config.logging.level = config.logging.level.raised_by(cli.verbose);
    Ok(config)
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", value))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    let open_store = || -> Result<CsvStore> { Ok(CsvStore::open(&config.settings.data_dir)?) };

    match cli.command {
        Commands::Checkin {
            patient,
            pain,
            sleep,
            posture,
            squat,
            step_up,
            step_down,
            swelling,
            at,
        } => {
            let form = CheckInForm {
                patient,
                timestamp: at,
                pain_level: pain,
                sleep_quality: sleep,
                posture,
                squat_test: squat,
                step_up_test: step_up,
                step_down_test: step_down,
                swelling_grade: swelling,
            };
            let observation = Observation::from_form(&form, Local::now().naive_local())?;
            let mut store = open_store()?;
            store.append_observation(&observation)?;
            println!(
                "{} Check-in recorded for {} at {}",
                "✓".green(),
                observation.patient,
                observation.timestamp.format("%Y-%m-%d %H:%M")
            );
        }

        Commands::Assess { patient, score, date } => {
            let date = match date {
                Some(d) => parse_date(&d)?,
                None => Local::now().date_naive(),
            };
            let patient = PatientId::new(&patient).map_err(GenuaError::from)?;
            let assessment =
                StandardizedAssessment::new(patient, date, score).map_err(GenuaError::from)?;
            let mut store = open_store()?;
            store.append_assessment(&assessment)?;
            println!(
                "{} Assessment recorded: {:.1} ({})",
                "✓".green(),
                assessment.score,
                assessment.band()
            );
        }

        Commands::Register { patient, history } => {
            let profile = PatientProfile {
                patient: PatientId::new(&patient).map_err(GenuaError::from)?,
                history,
            };
            let mut store = open_store()?;
            store.register_profile(&profile)?;
            println!("{} Registry updated for {}", "✓".green(), profile.patient);
        }

        Commands::Import { file } => {
            println!("{}", "Importing check-ins...".green().bold());
            let mut store = open_store()?;
            let summary = store.import_file(&file)?;
            println!(
                "{} Read {} rows: {} imported, {} duplicates skipped",
                "✓".green(),
                summary.rows_read,
                summary.imported,
                summary.skipped_duplicates
            );
        }

        Commands::Patients => {
            let store = open_store()?;
            let mut builder = Builder::default();
            builder.push_record(["Patient", "Check-ins", "Latest"].map(String::from));
            for patient in store.patients()? {
                let observations = store.observations(&patient)?;
                let latest = observations
                    .iter()
                    .map(|o| o.timestamp)
                    .max()
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                builder.push_record([
                    patient.display_name().to_string(),
                    observations.len().to_string(),
                    latest,
                ]);
            }
            let mut table = builder.build();
            table.with(Style::rounded());
            println!("{}", table);
        }

        Commands::Dashboard {
            patient,
            recent,
            json,
        } => {
            let store = open_store()?;
            let dashboard = PatientDashboard::load(&store, &patient, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                print!("{}", dashboard.render(recent));
            }
        }

        Commands::Report {
            patient,
            format,
            output,
            narrative,
            charts_dir,
        } => {
            let store = open_store()?;
            let dashboard = PatientDashboard::load(&store, &patient, &config)?;
            let document = dashboard.report(&config, narrative.as_deref());
            let images = render_chart_images(&document, charts_dir.as_deref())?;

            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_report(format, BufWriter::new(file), &document, &images)?;
                    println!("{} Report written to {}", "✓".green(), path.display());
                }
                None => write_report(format, io::stdout().lock(), &document, &images)?,
            }
        }

        Commands::Demo {
            seed,
            start,
            legacy_csv,
        } => {
            let start = match start {
                Some(s) => parse_date(&s)?,
                None => demo::default_start_date(),
            };
            match legacy_csv {
                Some(path) => {
                    let cohort = demo::generate_cohort(seed, start)?;
                    demo::write_legacy_csv(&cohort, &path)?;
                    println!(
                        "{} Wrote {} demo check-ins to {}",
                        "✓".green(),
                        cohort.len(),
                        path.display()
                    );
                }
                None => {
                    let mut store = open_store()?;
                    let summary = demo::seed_store(&mut store, seed, start)?;
                    println!(
                        "{} Seeded {} check-ins ({} already present), {} registry entries, {} assessments",
                        "✓".green(),
                        summary.observations,
                        summary.skipped_duplicates,
                        summary.profiles,
                        summary.assessments
                    );
                }
            }
        }

        Commands::Config { init, show } => {
            if init {
                let path = cli
                    .config
                    .clone()
                    .unwrap_or_else(AppConfig::default_config_path);
                if path.exists() {
                    anyhow::bail!("Configuration already exists at {}", path.display());
                }
                let mut fresh = AppConfig::default();
                fresh.save_to_file(&path)?;
                println!("{} Configuration written to {}", "✓".green(), path.display());
            }
            if show || !init {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

fn write_report<W: Write>(
    format: ReportFormat,
    out: W,
    document: &Document,
    images: &[ChartImage],
) -> Result<()> {
    match format {
        ReportFormat::Text => TextRenderer::new(out).render(document, images)?,
        ReportFormat::Json => JsonRenderer::new(out).render(document, images)?,
    }
    Ok(())
}

#[cfg(feature = "charts")]
fn render_chart_images(document: &Document, dir: Option<&Path>) -> Result<Vec<ChartImage>> {
    use genua::report::charts::SvgChartRenderer;
    use genua::report::{render_charts, write_chart_files};

    let dir = match dir {
        Some(dir) => dir,
        None => return Ok(Vec::new()),
    };
    let images = render_charts(document, &SvgChartRenderer::new())?;
    let paths = write_chart_files(&images, dir)?;
    eprintln!("{}", format!("Wrote {} charts to {}", paths.len(), dir.display()).dimmed());
    Ok(images)
}

#[cfg(not(feature = "charts"))]
fn render_chart_images(_document: &Document, dir: Option<&Path>) -> Result<Vec<ChartImage>> {
    if dir.is_some() {
        eprintln!(
            "{}",
            "Chart images need the `charts` feature; charts are included as data tables only."
                .yellow()
        );
    }
    Ok(Vec::new())
}
