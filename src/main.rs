use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use flashcheck::capture::{LoopbackProvider, SourceSettings};
use flashcheck::challenge::LoopbackIndicator;
use flashcheck::config::{RunConfig, app_name, version};
use flashcheck::display::{DisplaySink, MemorySink, PngSequenceSink};
use flashcheck::pipeline::{LivenessCoordinator, RunHooks};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};

fn cli() -> Command {
    Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON run configuration."),
        )
        .arg(
            Arg::new("pattern")
                .short('p')
                .long("pattern")
                .value_name("PATTERN")
                .help("Fixed challenge pattern such as BWBW (random when omitted)."),
        )
        .arg(
            Arg::new("length")
                .short('l')
                .long("length")
                .value_name("STEPS")
                .value_parser(clap::value_parser!(usize))
                .help("Steps in a random pattern."),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration-ms")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64))
                .help("Total challenge duration in milliseconds."),
        )
        .arg(
            Arg::new("codec")
                .long("codec")
                .value_name("CODEC")
                .help("Video codec: delta or h264."),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Write the replayed frames as PNG files into DIR."),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_parser(clap::value_parser!(u32))
                .default_value("320"),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_parser(clap::value_parser!(u32))
                .default_value("240"),
        )
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_parser(clap::value_parser!(u32))
                .default_value("30"),
        )
        .arg(
            Arg::new("classifier")
                .long("classifier")
                .value_name("URL")
                .help("Scene-classification endpoint (needs the http-classifier feature)."),
        )
}

fn load_config(matches: &ArgMatches) -> Result<RunConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => RunConfig::default(),
    };

    if let Some(pattern) = matches.get_one::<String>("pattern") {
        config.pattern = Some(pattern.clone());
    }
    if let Some(length) = matches.get_one::<usize>("length") {
        config.pattern_length = *length;
    }
    if let Some(duration) = matches.get_one::<u64>("duration") {
        config.total_duration_ms = *duration;
    }
    if let Some(codec) = matches.get_one::<String>("codec") {
        config.codec = codec.parse()?;
    }
    Ok(config)
}

#[cfg(feature = "http-classifier")]
fn with_classifier(
    coordinator: LivenessCoordinator,
    matches: &ArgMatches,
) -> Result<LivenessCoordinator> {
    Ok(match matches.get_one::<String>("classifier") {
        Some(url) => coordinator.with_classifier(Arc::new(
            flashcheck::validation::http::HttpClassifier::new(url.as_str())?,
        )),
        None => coordinator,
    })
}

#[cfg(not(feature = "http-classifier"))]
fn with_classifier(
    coordinator: LivenessCoordinator,
    matches: &ArgMatches,
) -> Result<LivenessCoordinator> {
    if matches.contains_id("classifier") {
        warn!("--classifier ignored: built without the http-classifier feature");
    }
    Ok(coordinator)
}

async fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches)?;
    let settings = SourceSettings::new(
        *matches.get_one::<u32>("width").unwrap_or(&320),
        *matches.get_one::<u32>("height").unwrap_or(&240),
        *matches.get_one::<u32>("fps").unwrap_or(&30),
    );

    let (indicator, signal_rx) = LoopbackIndicator::new();
    let provider = LoopbackProvider::new(settings, signal_rx);
    let coordinator = LivenessCoordinator::new(Arc::new(provider), Box::new(indicator), config);
    let mut coordinator = with_classifier(coordinator, &matches)?;

    let mut sink: Box<dyn DisplaySink> = match matches.get_one::<String>("output") {
        Some(dir) => Box::new(PngSequenceSink::new(dir)?),
        None => Box::new(MemorySink::new()),
    };

    let hooks = RunHooks {
        progress: Some(Box::new(|percent: u8, status: &str| {
            info!("[{:>3}%] {}", percent, status)
        })),
        ..RunHooks::default()
    };

    let outcome = tokio::select! {
        outcome = coordinator.execute(sink.as_mut(), hooks) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };
    coordinator.shutdown().await?;

    let Some(outcome) = outcome else {
        warn!("Interrupted");
        // the cancelled run stops its source from a background task
        tokio::time::sleep(Duration::from_millis(100)).await;
        process::exit(130);
    };
    let report = outcome?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = cli().get_matches();

    // kill the process as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    run(matches).await
}
