//! Train a DeepAR forecaster on the air passengers series, reload the best
//! checkpoint and print the mean forecast for the following year.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use deepar::backend::{InferBackend, TrainBackend};
use deepar::prelude::*;
use deepar::train::{LOSS_PROPERTY, RMSSE_PROPERTY};

/// Steps forecast, also used as the context length.
const PREDICTION_LENGTH: usize = 12;

#[derive(Parser)]
#[command(name = "deepar")]
#[command(author, version)]
#[command(about = "Train a DeepAR model on a monthly count series and forecast the next year")]
#[command(long_about = "Trains a DeepAR network with a negative binomial output on a monthly
series, keeping the last 32 points as a holdout scored with RMSSE. The best
epoch is saved to the output directory, reloaded, and used to forecast the
12 months after the end of the series.

EXAMPLES:
  # Train on the air passengers series and print the forecast
  deepar

  # Train longer on a local copy, with progress logging
  deepar --source data/air_passengers.json --epochs 20 -v")]
struct Cli {
    /// Series location: an http(s) URL or a JSON file
    #[arg(long, default_value = AIR_PASSENGERS_URL, value_name = "URL|PATH")]
    source: String,

    /// Directory for the best checkpoint
    #[arg(long, default_value = "output/model", value_name = "DIR")]
    output: PathBuf,

    /// Number of training epochs
    #[arg(long, default_value_t = 5)]
    epochs: usize,

    /// Windows per batch
    #[arg(long, default_value_t = 32)]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-3)]
    lr: f64,

    /// Random seed for weight initialization and shuffling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let source: SeriesSource = classify(cli.source.parse(), "parsing the series source")?;
    let windows = WindowConfig::new(Frequency::Monthly, PREDICTION_LENGTH, PREDICTION_LENGTH);

    train(&cli, &source, &windows)?;
    let forecast_lines = predict(&cli, &source, &windows)?;
    for line in forecast_lines {
        println!("{}", line);
    }
    Ok(())
}

/// Fit the network and leave the best epoch in `cli.output`.
fn train(cli: &Cli, source: &SeriesSource, windows: &WindowConfig) -> Result<()> {
    let device = Default::default();
    TrainBackend::seed(cli.seed);

    let series = Arc::new(classify(source.fetch(), "fetching the training series")?);
    let train = classify(
        WindowedSeriesDataset::build(series.clone(), Usage::Train, windows.clone()),
        "building the training dataset",
    )?;
    let test = classify(
        WindowedSeriesDataset::build(series, Usage::Test, windows.clone()),
        "building the holdout dataset",
    )?;

    let network = classify(
        DeepARConfig::new(Frequency::Monthly, PREDICTION_LENGTH, vec![train.size()])
            .build_training::<TrainBackend>(&device),
        "building the network",
    )?;

    let config = ForecastTrainerConfig::default()
        .with_epochs(cli.epochs)
        .with_batch_size(cli.batch_size)
        .with_lr(cli.lr)
        .with_seed(Seed::new(cli.seed));
    let mut trainer = ForecastTrainer::<TrainBackend>::new(config, device)
        .with_callback(ProgressCallback::default())
        .with_callback(SaveModelCallback::new(&cli.output));
    let result = classify(trainer.fit(network, &train, Some(&test)), "training")?;

    match (result.best_epoch, result.best_monitor, result.best_metric) {
        (Some(epoch), Some(monitor), Some(metric)) => tracing::info!(
            "Best epoch {} ({} {:.5}) saved to {}",
            epoch + 1,
            monitor,
            metric,
            cli.output.display()
        ),
        _ => tracing::warn!("No epoch produced a finite metric"),
    }
    Ok(())
}

/// Reload the checkpoint, fetch the series again and format the mean
/// forecast, one `YYYY-MM value` line per step.
fn predict(cli: &Cli, source: &SeriesSource, windows: &WindowConfig) -> Result<Vec<String>> {
    let device = Default::default();

    let loaded = classify(
        load_checkpoint::<InferBackend>(&cli.output, &device),
        "loading the trained model",
    )?;
    let properties = &loaded.properties;
    if let (Some(rmsse), Some(loss)) = (properties.get(RMSSE_PROPERTY), properties.get(LOSS_PROPERTY)) {
        tracing::info!("Loaded model with RMSSE {} and loss {}", rmsse, loss);
    }
    let predictor = loaded.into_inference();

    let series = classify(source.fetch(), "fetching the series for prediction")?;
    let window = classify(forecast_window(&series, windows), "building the forecast window")?;
    let forecast = classify(
        ForecastSampler::default().predict(&predictor, &window, &device),
        "forecasting",
    )?;
    let start = classify(
        forecast.start_date(&series, Frequency::Monthly),
        "dating the forecast",
    )?;

    forecast
        .mean
        .iter()
        .enumerate()
        .map(|(step, value)| {
            let month = start
                .add_months(step as i64)
                .with_context(|| format!("month {} of the forecast", step + 1))?;
            Ok(format!("{} {:.2}", month, value))
        })
        .collect()
}

/// Attach the failure class and a description of the step to an error.
fn classify<T, E>(result: std::result::Result<T, E>, step: &str) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
    for<'a> ErrorKind: From<&'a E>,
{
    result.map_err(|err| {
        let kind = ErrorKind::from(&err);
        anyhow::Error::new(err).context(format!("{} while {}", kind, step))
    })
}
