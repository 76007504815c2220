use chrono::{Duration, Utc};
use lunacast::config::ForecastConfig;
use lunacast::ingest::SyntheticSource;
use lunacast::orchestrator::{ForecastRequest, Orchestrator, Target};
use lunacast::resolver::MemoryCoordinateStore;
use lunacast::DataLoader;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Lunacast: Basic Forecasting Example");
    println!("===================================\n");

    let workdir = tempfile::tempdir()?;
    let mut config = ForecastConfig::default().with_data_root(workdir.path());
    config.lookback_days = 180;

    let orchestrator = Orchestrator::new(config, SyntheticSource::new(42), MemoryCoordinateStore::new())?;

    // Kyiv, one week past today
    let target = Utc::now().date_naive() + Duration::days(7);
    let request = ForecastRequest::new("fishing", 50.4501, 30.5234, Target::Date(target))
        .with_output_dir(workdir.path().join("forecasts"));

    println!("Running first request (fetches and caches history)...");
    let outcome = orchestrator.run(&request)?;
    println!(
        "as-of {} horizon {} coordinate {} reused {}",
        outcome.asof, outcome.horizon, outcome.coordinate, outcome.reused
    );

    print!("\ndate        moon_phase     ");
    for target in outcome.table.targets() {
        print!(" {:>22}", target);
    }
    println!();
    for row in outcome.table.rows() {
        print!("{}  {:<14}", row.date, row.moon_phase.as_str());
        for value in &row.values {
            print!(" {:>22.3}", value);
        }
        println!();
    }

    // A query a few hundred metres away reuses the stored coordinate
    println!("\nRunning nearby request...");
    let nearby = ForecastRequest::new("fishing", 50.4530, 30.5260, Target::Horizon(3));
    let second = orchestrator.run(&nearby)?;
    println!("reused {} coordinate {}", second.reused, second.coordinate);

    // Backtest the last two weeks of the cached history
    let merged = outcome.dataset_dir.join(lunacast::cache::MERGED_FILE);
    let history = DataLoader::from_csv(&merged)?;
    let report = orchestrator.engine().backtest(&history, 14)?;
    println!("\nBacktest over {} days:", report.holdout);
    for (target, accuracy) in &report.accuracy {
        println!("  {:<24} {}", target, accuracy);
    }

    if let Some(path) = &outcome.output_path {
        println!("\nForecast saved to {}", path.display());
    }

    Ok(())
}
