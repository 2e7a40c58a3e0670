//! polar-ec - command-line host for the EC study analysis core
//!
//! Prints the tables a dashboard would chart, and writes the merged-table
//! spreadsheet.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use polar_ec::config::Config;
use polar_ec::data::cache::{EnvironmentTable, GrowthTable};
use polar_ec::data::{DataLoader, Field, Frames, LoadCache, SchoolSelection};
use polar_ec::export;
use polar_ec::stats::{MergedRow, StatsCalculator};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LevelFilter::Error,
            LogLevelArg::Warn => LevelFilter::Warn,
            LogLevelArg::Info => LevelFilter::Info,
            LogLevelArg::Debug => LevelFilter::Debug,
            LogLevelArg::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
enum Dataset {
    Environment,
    Growth,
}

#[derive(Debug, Parser)]
#[command(
    name = "polar-ec",
    version,
    about = "Polar plant EC study: environment and growth analysis"
)]
struct Cli {
    /// Config file (defaults to ./polar-ec.toml, then built-in defaults)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the CSV and XLSX inputs
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevelArg>,

    /// Continue with the schools that loaded when some environment files fail
    #[arg(long, global = true)]
    allow_partial: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Target EC and number of individuals per school
    Overview {
        #[arg(long)]
        json: bool,
    },
    /// Raw records, optionally for one school
    Raw {
        #[arg(value_enum)]
        dataset: Dataset,
        #[arg(long)]
        school: Option<String>,
    },
    /// Per-school environment and growth means
    Summary {
        #[arg(long)]
        school: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Environment and growth means joined per school
    Merged {
        #[arg(long)]
        json: bool,
    },
    /// Correlation matrix across schools
    Correlate {
        /// Comma-separated field keys (e.g. temperature,ec,weight)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Write the merged table as an XLSX workbook
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// One invocation's view of the data: config, data source and cache.
struct Session {
    config: Config,
    loader: DataLoader,
    cache: LoadCache,
    allow_partial: bool,
}

impl Session {
    fn environment(&mut self) -> Result<Arc<EnvironmentTable>> {
        if !self.allow_partial {
            return self
                .cache
                .environment(&self.loader, &self.config.schools)
                .context("loading environment data");
        }

        let load = self
            .loader
            .load_environment(&self.config.schools)
            .context("loading environment data")?;
        for failure in &load.failures {
            warn!("Proceeding without {}: {}", failure.school, failure.error);
        }
        if load.records.is_empty() {
            bail!("no school's environment data could be loaded");
        }
        Ok(Arc::new(load.records))
    }

    fn growth(&mut self) -> Result<Arc<GrowthTable>> {
        self.cache
            .growth(&self.loader, &self.config.data.growth_workbook)
            .context("loading growth data")
    }

    fn merged(&mut self) -> Result<Vec<MergedRow>> {
        let env = StatsCalculator::summarize(self.environment()?.as_ref())?;
        let growth = StatsCalculator::summarize(self.growth()?.as_ref())?;
        let merged = StatsCalculator::merge(&env, &growth);
        if merged.is_empty() {
            bail!("no school has both environment and growth data");
        }
        info!("{} school(s) with both environment and growth data", merged.len());
        Ok(merged)
    }
}

fn parse_fields(keys: &[String], default: &[Field]) -> Result<Vec<Field>> {
    if keys.is_empty() {
        return Ok(default.to_vec());
    }
    keys.iter()
        .map(|key| Field::from_key(key).with_context(|| format!("unknown field '{key}'")))
        .collect()
}

fn selection(school: Option<String>) -> SchoolSelection {
    school.map_or(SchoolSelection::All, SchoolSelection::One)
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let loader = config.loader();
    let mut session = Session {
        config,
        loader,
        cache: LoadCache::new(),
        allow_partial: cli.allow_partial,
    };

    match cli.command {
        Command::Overview { json } => {
            let growth = session.growth()?;
            let rows = StatsCalculator::overview(&session.config.schools, growth.as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    let target = row
                        .target_ec
                        .map_or_else(|| "-".to_string(), |ec| format!("{ec:.1}"));
                    println!("{:<8} EC {:>5}  n={}", row.school, target, row.individuals);
                }
            }
        }
        Command::Raw { dataset, school } => {
            let selection = selection(school);
            let df = match dataset {
                Dataset::Environment => {
                    Frames::environment(session.environment()?.as_ref(), &selection)?
                }
                Dataset::Growth => Frames::growth(session.growth()?.as_ref(), &selection)?,
            };
            println!("{df}");
        }
        Command::Summary { school, json } => {
            let env = StatsCalculator::summarize(session.environment()?.as_ref())?;
            let growth = StatsCalculator::summarize(session.growth()?.as_ref())?;
            if json {
                let (env, growth): (Vec<_>, Vec<_>) = match &school {
                    Some(name) => (
                        env.into_iter().filter(|r| &r.school == name).collect(),
                        growth.into_iter().filter(|r| &r.school == name).collect(),
                    ),
                    None => (env, growth),
                };
                let out = serde_json::json!({ "environment": env, "growth": growth });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                let mut env_df = Frames::summary(&env)?;
                let mut growth_df = Frames::summary(&growth)?;
                if let Some(name) = &school {
                    env_df = Frames::filter_by_school(&env_df, name)?;
                    growth_df = Frames::filter_by_school(&growth_df, name)?;
                }
                println!("Environment\n{env_df}\n\nGrowth\n{growth_df}");
            }
        }
        Command::Merged { json } => {
            let merged = session.merged()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&merged)?);
            } else {
                let fields = session.config.analysis.export_fields.clone();
                println!("{}", Frames::merged(&merged, &fields)?);
            }
        }
        Command::Correlate { fields, json } => {
            let fields = parse_fields(&fields, &session.config.analysis.correlation_fields)?;
            let merged = session.merged()?;
            let matrix = StatsCalculator::correlate(&merged, &fields)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matrix)?);
            } else {
                println!("{}", Frames::correlation(&matrix)?);
                if matrix.is_descriptive_only() {
                    println!(
                        "Note: {} observations (one per school); coefficients are descriptive only.",
                        matrix.observations
                    );
                }
            }
        }
        Command::Export { output } => {
            let merged = session.merged()?;
            let output =
                output.unwrap_or_else(|| PathBuf::from(&session.config.export.file_name));
            export::export_merged(&merged, &session.config.analysis.export_fields, &output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Exported {} school(s) to {}", merged.len(), output.display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data.dir = dir.clone();
    }

    let level = cli
        .log_level
        .map(LevelFilter::from)
        .or_else(|| config.logging.level.parse().ok())
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    run(cli, config)
}
