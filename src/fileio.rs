use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::data::{Column, Table};
use crate::error::{Error, Result};

// Tokens treated as a missing cell (compared after trimming)
const MISSING_TOKENS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "?"];

pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/*
What it does: Loads a headed CSV file into a column-oriented table

Inputs: Path of the CSV file
Outputs: Table with one column per header, missing cells stored as None

High-level logic:
- Opens the file and wraps it in a BufReader for the csv reader
- Reads the header row to name the columns
- Pushes each cell into its column, mapping missing tokens to None.
  Ragged rows are rejected by the csv reader itself
 */
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let mut columns: Vec<Column> = reader
        .headers()?
        .iter()
        .map(|name| Column::new(name, Vec::new()))
        .collect();

    for record in reader.records() {
        let record = record?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            let value = if is_missing(cell) {
                None
            } else {
                Some(cell.to_string())
            };
            column.values.push(value);
        }
    }

    let table = Table::new(columns)?;
    debug!(
        "loaded {} rows x {} columns from {}",
        table.nrows(),
        table.ncols(),
        path.display()
    );
    Ok(table)
}

/// Writes a table as CSV, missing cells as `NA`.
pub fn write_table<P: AsRef<Path>>(table: &Table, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(table.columns().iter().map(|c| c.name.as_str()))?;
    for row in 0..table.nrows() {
        let record: Vec<&str> = table
            .columns()
            .iter()
            .map(|c| c.values[row].as_deref().unwrap_or("NA"))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
