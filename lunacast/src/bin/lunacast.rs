//! Command line front end for lunacast

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use lunacast::config::{ForecastConfig, SourceKind};
use lunacast::engine::ForecastTable;
use lunacast::evaluation::{evaluate_forecast, write_report, GeminiEvaluator};
use lunacast::ingest::{DataSource, OpenMeteoSource, PowerSource, SyntheticSource};
use lunacast::location::Coordinate;
use lunacast::logging::LoggingConfig;
use lunacast::models::selection::seasonal_period;
use lunacast::models::{ModelTable, OrderGrid};
use lunacast::utils::infer_step;
use lunacast::DataLoader;
use lunacast::orchestrator::{csv_output_file_name, write_table, ForecastRequest, Orchestrator, Target};
use lunacast::resolver::{CoordinateResolver, JsonCoordinateStore};
use lunar_math::{label_for_date, phase_fraction};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lunacast", version, about = "Lunar-conditioned condition forecasts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast conditions at a coordinate
    Forecast(ForecastArgs),
    /// Print the moon phase of a date
    Phase {
        /// Date as YYYY-MM-DD, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Search model orders by AIC for a merged CSV
    Select {
        #[arg(long)]
        csv: PathBuf,
        /// Override the seasonal period inferred from the date spacing
        #[arg(long)]
        period: Option<usize>,
    },
    /// Look up the stored coordinate a query would reuse
    Resolve {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long)]
        data_root: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ForecastArgs {
    /// Activity slug, e.g. fishing
    #[arg(long, default_value = "general")]
    activity: String,
    #[arg(long, allow_hyphen_values = true, required_unless_present = "csv")]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, required_unless_present = "csv")]
    lon: Option<f64>,
    /// Forecast through this date
    #[arg(long, conflicts_with = "horizon")]
    target_date: Option<NaiveDate>,
    /// Forecast this many days past the as-of date
    #[arg(long)]
    horizon: Option<usize>,
    /// Days the historical source lags behind today
    #[arg(long, conflicts_with = "csv")]
    lag: Option<u32>,
    /// Directory for the forecast CSV
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// power, open-meteo or synthetic
    #[arg(long)]
    source: Option<SourceKind>,
    #[arg(long)]
    data_root: Option<PathBuf>,
    /// Forecast an existing merged CSV instead of fetching
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Score every forecast day with Gemini (needs GEMINI_API_KEY)
    #[arg(long)]
    evaluate: bool,
}

fn main() -> Result<()> {
    LoggingConfig::from_env().init()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Forecast(args) => forecast(args),
        Command::Phase { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            println!("{}\t{:.4}\t{}", date, phase_fraction(date), label_for_date(date));
            Ok(())
        }
        Command::Select { csv, period } => select(&csv, period),
        Command::Resolve { lat, lon, data_root } => {
            let mut config = ForecastConfig::from_env();
            if let Some(root) = data_root {
                config = config.with_data_root(root);
            }
            let resolver = CoordinateResolver::new(
                JsonCoordinateStore::new(&config.coordinate_store),
                config.match_radius_km,
            );
            let query = Coordinate::new(lat, lon)?.quantized();
            let resolution = resolver.find_existing(query);
            let status = if resolution.found { "reuse" } else { "new" };
            println!("{}\t{}\t{}", status, resolution.coordinate, resolution.coordinate.token());
            Ok(())
        }
    }
}

fn build_source(kind: SourceKind, config: &ForecastConfig) -> Result<Box<dyn DataSource>> {
    Ok(match kind {
        SourceKind::Power => Box::new(PowerSource::new(config)?),
        SourceKind::OpenMeteo => Box::new(OpenMeteoSource::new(config)?),
        SourceKind::Synthetic => Box::new(SyntheticSource::new(1)),
    })
}

fn forecast(args: ForecastArgs) -> Result<()> {
    let mut config = ForecastConfig::from_env();
    if let Some(root) = &args.data_root {
        config = config.with_data_root(root);
    }
    if let Some(kind) = args.source {
        config.source = kind;
    }

    let target = match (args.target_date, args.horizon) {
        (Some(date), _) => Target::Date(date),
        (None, Some(horizon)) => Target::Horizon(horizon),
        (None, None) => bail!("either --target-date or --horizon is required"),
    };

    let source = build_source(config.source, &config)?;
    let store = JsonCoordinateStore::new(&config.coordinate_store);
    let request_timeout = config.request_timeout;
    let orchestrator = Orchestrator::new(config, source, store)?;

    let (table, output) = if let Some(csv) = &args.csv {
        let table = orchestrator
            .forecast_from_csv(csv, target)
            .with_context(|| format!("forecasting {}", csv.display()))?;
        let output = match &args.out_dir {
            Some(dir) => {
                let target_date = args.target_date;
                let name = csv_output_file_name(table.len(), target_date, Utc::now());
                Some(write_table(&table, dir, &name)?)
            }
            None => None,
        };
        (table, output)
    } else {
        let (lat, lon) = match (args.lat, args.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => bail!("--lat and --lon are required"),
        };
        let mut request = ForecastRequest::new(&args.activity, lat, lon, target);
        if let Some(lag) = args.lag {
            request = request.with_lag_days(lag);
        }
        if let Some(dir) = &args.out_dir {
            request = request.with_output_dir(dir);
        }

        let outcome = orchestrator.run(&request)?;
        info!(
            asof = %outcome.asof,
            horizon = outcome.horizon,
            coordinate = %outcome.coordinate,
            reused = outcome.reused,
            dataset = %outcome.dataset_dir.display(),
            "Forecast ready"
        );
        (outcome.table, outcome.output_path)
    };

    print_table(&table);
    if let Some(path) = &output {
        println!("saved {}", path.display());
    }

    if args.evaluate {
        let evaluator = GeminiEvaluator::from_env(request_timeout)?;
        let evaluations = evaluate_forecast(&evaluator, &args.activity, &table);
        for evaluation in &evaluations {
            match &evaluation.outcome {
                Ok(e) => println!("{}\t{}\t{}", evaluation.date, e.rating, e.justification),
                Err(e) => println!("{}\terror\t{}", evaluation.date, e),
            }
        }
        if let Some(path) = &output {
            let report = path.with_extension("evaluation.csv");
            write_report(&report, &table, &evaluations)?;
            println!("saved {}", report.display());
        }
    }

    Ok(())
}

fn select(csv: &std::path::Path, period: Option<usize>) -> Result<()> {
    let series = DataLoader::from_csv(csv).with_context(|| format!("reading {}", csv.display()))?;
    let period = period.unwrap_or_else(|| seasonal_period(infer_step(series.dates())));
    let grid = OrderGrid::for_period(period);

    let selection = ModelTable::select_by_aic(&series, &grid)?;
    println!(
        "# seasonal period {} | exog columns {} | {} candidates",
        period,
        selection.exog_columns,
        grid.len()
    );
    for choice in &selection.choices {
        match choice.best {
            Some((spec, aic)) => println!("{}\t{}\tAIC={:.2}", choice.target, spec, aic),
            None => println!("{}\tno candidate fitted", choice.target),
        }
    }
    Ok(())
}

fn print_table(table: &ForecastTable) {
    print!("date\tmoon_phase");
    for target in table.targets() {
        print!("\t{}", target);
    }
    println!();

    for row in table.rows() {
        print!("{}\t{}", row.date, row.moon_phase);
        for value in &row.values {
            print!("\t{:.3}", value);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_conflicts_with_csv() {
        let parsed = Cli::try_parse_from([
            "lunacast", "forecast", "--csv", "merged.csv", "--horizon", "3", "--lag", "5",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_csv_mode_needs_no_coordinate() {
        let cli = Cli::try_parse_from(["lunacast", "forecast", "--csv", "merged.csv", "--horizon", "3"]).unwrap();
        match cli.command {
            Command::Forecast(args) => {
                assert_eq!(args.csv, Some(PathBuf::from("merged.csv")));
                assert_eq!(args.lag, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_lag_accepted_with_coordinate() {
        let cli = Cli::try_parse_from([
            "lunacast", "forecast", "--lat", "-33.8688", "--lon", "151.2093", "--horizon", "3", "--lag", "5",
        ])
        .unwrap();
        match cli.command {
            Command::Forecast(args) => {
                assert_eq!(args.lag, Some(5));
                assert_eq!(args.lat, Some(-33.8688));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_select_parses() {
        let cli = Cli::try_parse_from(["lunacast", "select", "--csv", "merged.csv", "--period", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Select { period: Some(7), .. }));
    }
}
