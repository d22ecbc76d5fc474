mod demo;
mod openf1;
mod prompt;
mod viewer;

use std::io;
use std::path::PathBuf;

use clap::{arg, value_parser, ArgMatches, Command};
use f1_replay_logic::cache::{save_comparison, CachedProvider};
use f1_replay_logic::palette::DriverPalette;
use f1_replay_logic::{
    load_comparison, Comparison, DriverSelection, ReplayState, ReplayVariant, SessionKind, SessionRequest,
    TelemetryProvider,
};
use iced::{Application, Settings};
use log::{error, info, warn};

use demo::DemoProvider;
use openf1::{OpenF1Provider, DEFAULT_BASE_URL};
use viewer::{ReplayViewer, ViewerFlags};

const DEFAULT_CACHE_DIR: &str = "./cache";
const DEMO_SEED: u64 = 2024;
const SNAPSHOT_FILE: &str = "last_comparison.bin";

type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(cli().get_matches()) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("f1-replay")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Animated fastest-lap comparison with sector dominance")
        .arg(arg!(--year <YEAR> "Season year").value_parser(value_parser!(u16).range(2018..=2025)))
        .arg(arg!(--round <ROUND> "Round number").value_parser(value_parser!(u8).range(1..=24)))
        .arg(arg!(--session <CODE> "Session code: Q, R, FP1, FP2 or FP3").value_parser(prompt::parse_session))
        .arg(arg!(--drivers <LIST> "2-3 comma separated driver abbreviations").value_parser(prompt::parse_drivers))
        .arg(
            arg!(--variant <VARIANT> "Replay style")
                .value_parser(["session", "qualifying"])
                .default_value("session"),
        )
        .arg(arg!(--demo "Use a synthetic offline session"))
        .arg(arg!(--"cache-dir" <DIR> "Session cache directory [env: F1_REPLAY_CACHE_DIR]"))
        .arg(arg!(--"no-cache" "Always fetch from the provider"))
}

fn run(matches: ArgMatches) -> AppResult<()> {
    let variant = match matches.get_one::<String>("variant").map(String::as_str) {
        Some("qualifying") => ReplayVariant::Qualifying,
        _ => ReplayVariant::Session,
    };
    let demo = matches.get_flag("demo");
    let (request, selection) = session_request(&matches, variant, demo)?;

    let cache_dir = matches
        .get_one::<String>("cache-dir")
        .cloned()
        .or_else(|| std::env::var("F1_REPLAY_CACHE_DIR").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR), PathBuf::from);
    let use_cache = !matches.get_flag("no-cache");

    let provider: Box<dyn TelemetryProvider> = if demo {
        info!("Using the synthetic demo session");
        Box::new(DemoProvider::new(DEMO_SEED))
    } else {
        let base_url = std::env::var("OPENF1_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if use_cache {
            Box::new(CachedProvider::new(OpenF1Provider::new(base_url), &cache_dir)?)
        } else {
            Box::new(OpenF1Provider::new(base_url))
        }
    };

    let comparison = {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(load_comparison(
            provider.as_ref(),
            &request,
            &selection,
            &DriverPalette::builtin(),
        ))?
    };
    write_snapshot(&cache_dir, &comparison);

    let title = format!("{} - Sector Dominance", comparison.request);
    let replay = ReplayState::new(comparison.drivers, variant)?;
    let flags = ViewerFlags::new(title, replay)?;

    let mut settings = Settings::with_flags(flags);
    settings.antialiasing = true;
    ReplayViewer::run(settings)?;
    Ok(())
}

/// Session and driver choice from flags, asking for whatever is missing.
/// The qualifying replay always compares the top three of the qualifying
/// classification.
fn session_request(
    matches: &ArgMatches,
    variant: ReplayVariant,
    demo: bool,
) -> io::Result<(SessionRequest, DriverSelection)> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let interactive = !demo;

    let year = match matches.get_one::<u16>("year") {
        Some(year) => *year,
        None if interactive => prompt::ask(&mut input, &mut output, "Enter year (2018-2025): ", prompt::parse_year, prompt::YEARS.1)?,
        None => prompt::YEARS.1,
    };
    let round = match matches.get_one::<u8>("round") {
        Some(round) => *round,
        None if interactive => prompt::ask(&mut input, &mut output, "Enter round (1-24): ", prompt::parse_round, prompt::ROUNDS.0)?,
        None => prompt::ROUNDS.0,
    };

    if variant == ReplayVariant::Qualifying {
        if matches.contains_id("session") || matches.contains_id("drivers") {
            warn!("The qualifying replay ignores --session and --drivers");
        }
        let request = SessionRequest {
            year,
            round,
            kind: SessionKind::Qualifying,
        };
        return Ok((request, DriverSelection::TopByClassification));
    }

    let kind = match matches.get_one::<SessionKind>("session") {
        Some(kind) => *kind,
        None if interactive => prompt::ask(
            &mut input,
            &mut output,
            "Enter session (Q, R, FP1, FP2, FP3): ",
            prompt::parse_session,
            SessionKind::Qualifying,
        )?,
        None => SessionKind::Qualifying,
    };
    let selection = match matches.get_one::<DriverSelection>("drivers") {
        Some(selection) => selection.clone(),
        None if interactive => prompt::ask(
            &mut input,
            &mut output,
            "Enter 2-3 drivers (e.g. VER,HAM,LEC) or press Enter for the fastest 3: ",
            prompt::parse_drivers,
            DriverSelection::TopByLapTime,
        )?,
        None => DriverSelection::TopByLapTime,
    };

    Ok((SessionRequest { year, round, kind }, selection))
}

fn write_snapshot(cache_dir: &std::path::Path, comparison: &Comparison) {
    if let Err(err) = save_comparison(&cache_dir.join(SNAPSHOT_FILE), comparison) {
        warn!("could not save comparison snapshot: {}", err);
    }
}
