use chrono::{DateTime, Duration, Utc};
use serde_json::{from_reader, to_string_pretty};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

use super::store::{NewItem, Tables};

pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Tables, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open file: {}", e))?;
    let reader = BufReader::new(file);

    from_reader(reader).map_err(|e| format!("Failed to parse snapshot: {}", e))
}

pub fn write_snapshot<P: AsRef<Path>>(path: P, tables: &Tables) -> Result<(), String> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| format!("Failed to open file for writing: {}", e))?;

    let json = to_string_pretty(tables).map_err(|e| format!("Failed to serialize snapshot: {}", e))?;

    file.write_all(json.as_bytes())
        .map_err(|e| format!("Failed to write to file: {}", e))?;

    Ok(())
}

/// Small data set so a fresh process has something to bid on: one listing of
/// each status, relative to `now`.
pub fn demo_tables(now: DateTime<Utc>) -> Tables {
    let mut tables = Tables::default();
    let alice = tables.add_seller("alice");
    let bob = tables.add_seller("bob");
    for buyer in ["carol", "dave", "erin"] {
        tables.add_buyer(buyer);
    }

    let listings = [
        ("Vintage camera", alice, now + Duration::hours(1), 3600, 100.0),
        ("Mechanical keyboard", alice, now - Duration::minutes(5), 3600, 50.0),
        ("Road bike", bob, now - Duration::hours(3), 3600, 300.0),
    ];
    for (name, seller_id, start_time, duration_seconds, starting_price) in listings {
        let item = NewItem {
            name: name.to_string(),
            description: String::new(),
            seller_id,
            start_time,
            duration_seconds,
            starting_price,
        };
        // Sellers were inserted just above.
        if let Err(err) = tables.add_item(item, now) {
            log::warn!("Skipping demo listing {}: {}", name, err);
        }
    }
    tables
}
