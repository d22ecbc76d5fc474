// Interactive fallback for session parameters not given on the command line.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use f1_replay_logic::loader::{DriverSelection, MAX_DRIVERS, MIN_DRIVERS};
use f1_replay_logic::SessionKind;
use log::warn;

pub const YEARS: (u16, u16) = (2018, 2025);
pub const ROUNDS: (u8, u8) = (1, 24);
const MAX_ATTEMPTS: usize = 5;

pub fn parse_year(input: &str) -> Result<u16, String> {
    parse_in_range(input, YEARS, "Year")
}

pub fn parse_round(input: &str) -> Result<u8, String> {
    parse_in_range(input, ROUNDS, "Round")
}

pub fn parse_session(input: &str) -> Result<SessionKind, String> {
    SessionKind::from_str(input).map_err(|_| {
        let codes: Vec<&str> = SessionKind::ALL.iter().map(SessionKind::code).collect();
        format!("Session must be one of {}", codes.join(", "))
    })
}

/// Empty input selects the fastest drivers; otherwise 2-3 comma separated
/// abbreviations, extra entries are dropped. A single driver also falls back
/// to the fastest drivers.
pub fn parse_drivers(input: &str) -> Result<DriverSelection, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(DriverSelection::TopByLapTime);
    }
    let mut drivers: Vec<String> = input
        .split(',')
        .map(|d| d.trim().to_ascii_uppercase())
        .filter(|d| !d.is_empty())
        .collect();
    if drivers.len() < MIN_DRIVERS {
        warn!("Need at least {} drivers. Using top {} instead.", MIN_DRIVERS, MAX_DRIVERS);
        return Ok(DriverSelection::TopByLapTime);
    }
    if drivers.len() > MAX_DRIVERS {
        warn!("Only the first {} drivers are used", MAX_DRIVERS);
        drivers.truncate(MAX_DRIVERS);
    }
    Ok(DriverSelection::Explicit(drivers))
}

fn parse_in_range<T>(input: &str, (min, max): (T, T), what: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + std::fmt::Display,
{
    match input.trim().parse::<T>() {
        Ok(value) if value >= min && value <= max => Ok(value),
        _ => Err(format!("{} must be a number between {} and {}", what, min, max)),
    }
}

/// Asks until `parse` accepts the answer. After a few failed attempts, or
/// when input ends, `fallback` is used.
pub fn ask<R, W, T, F>(input: &mut R, output: &mut W, question: &str, parse: F, fallback: T) -> io::Result<T>
where
    R: BufRead,
    W: Write,
    F: Fn(&str) -> Result<T, String>,
{
    for _ in 0..MAX_ATTEMPTS {
        write!(output, "{}", question)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        match parse(&line) {
            Ok(value) => return Ok(value),
            Err(message) => writeln!(output, "{}", message)?,
        }
    }
    warn!("No valid answer for '{}', using the default", question.trim());
    Ok(fallback)
}
