use crate::domain::keys::parse_pubkey;
use crate::error::Result;
use crate::infrastructure::in_memory::StaticDirectory;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct DirectoryRow {
    email: String,
    wallet: String,
}

/// Loads an `email,wallet` CSV into a [`StaticDirectory`].
///
/// Any malformed row fails the whole load, so a typo never silently routes
/// a participant to the wrong wallet.
pub fn read_directory<R: Read>(source: R) -> Result<StaticDirectory> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);
    let mut directory = StaticDirectory::new();
    for row in reader.deserialize::<DirectoryRow>() {
        let row = row?;
        let wallet = parse_pubkey(&row.wallet)?;
        directory.insert(&row.email, wallet);
    }
    Ok(directory)
}
