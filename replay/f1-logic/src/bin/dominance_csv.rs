use std::path::Path;

use f1_replay_logic::cache::load_comparison_snapshot;
use f1_replay_logic::dominance::{calculate_sector_dominance, DEFAULT_SECTOR_COUNT};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (snapshot, output) = match (args.next(), args.next()) {
        (Some(snapshot), Some(output)) => (snapshot, output),
        _ => {
            eprintln!("usage: dominance_csv <snapshot.bin> <out.csv>");
            std::process::exit(2);
        }
    };

    let comparison = load_comparison_snapshot(Path::new(&snapshot))?;
    println!("{}: {} drivers", comparison.request, comparison.drivers.len());

    let dominance = calculate_sector_dominance(&comparison.drivers, DEFAULT_SECTOR_COUNT);
    let reference = match comparison.drivers.first() {
        Some(driver) => driver,
        None => return Err("snapshot has no drivers".into()),
    };

    let mut writer = csv::Writer::from_path(&output)?;
    writer.write_record(["index", "distance", "driver", "color"])?;
    for (index, (dominant, color)) in dominance.drivers.iter().zip(&dominance.colors).enumerate() {
        let distance = reference.telemetry[index].distance;
        writer.write_record([
            index.to_string(),
            format!("{:.1}", distance),
            dominant.label().to_string(),
            color.to_hex(),
        ])?;
    }
    writer.flush()?;

    println!("Wrote {} samples in {} sectors to {}", dominance.len(), dominance.sectors.len(), output);
    Ok(())
}
