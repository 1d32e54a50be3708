//! Header reading for Campbell Scientific TOA5 ("long header") data files.
//!
//! Only the first two lines are read: the environment line, whose last field
//! is the logger table name, and the column name line.

use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use csv::StringRecord;

const TOA5_MARKER: &str = "TOA5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toa5Header {
    pub station: String,
    pub table: String,
    pub columns: Vec<String>,
}

impl Toa5Header {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = reader.records();

        let environment: StringRecord = records
            .next()
            .ok_or_else(|| anyhow!("File is empty"))?
            .context("Reading TOA5 environment line")?;
        ensure!(
            environment.get(0).map(str::trim) == Some(TOA5_MARKER),
            "Not a TOA5 file: first field is {:?}",
            environment.get(0).unwrap_or_default()
        );
        let table = environment
            .iter()
            .last()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && value != TOA5_MARKER)
            .ok_or_else(|| anyhow!("TOA5 environment line does not name a table"))?;
        let station = environment
            .get(1)
            .map(|value| value.trim().to_string())
            .unwrap_or_default();

        let names = records
            .next()
            .ok_or_else(|| anyhow!("TOA5 file has no column name line"))?
            .context("Reading TOA5 column name line")?;
        let columns: Vec<String> = names.iter().map(|name| name.trim().to_string()).collect();
        ensure!(
            columns.iter().all(|name| !name.is_empty()),
            "TOA5 column name line contains an empty name"
        );

        Ok(Toa5Header {
            station,
            table,
            columns,
        })
    }
}

pub fn read_header(path: &Path) -> Result<Toa5Header> {
    let file = File::open(path).with_context(|| format!("Opening TOA5 file {path:?}"))?;
    Toa5Header::from_reader(file).with_context(|| format!("Reading TOA5 header from {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_table_station_and_columns() {
        let raw = concat!(
            "\"TOA5\",\"CFNT\",\"CR3000\",\"2504\",\"CR3000.Std.11\",\"CPU:flux.CR3\",\"21048\",\"flux\"\n",
            "\"TIMESTAMP\",\"RECORD\",\"WS_ms_WVc(1)\",\"gps_ready\"\n",
            "\"TS\",\"RN\",\"meters/second\",\"unitless\"\n",
            "\"\",\"\",\"WVc\",\"Smp\"\n",
            "\"2011-10-11 12:30:00\",0,3.2,1\n",
        );
        let header = Toa5Header::from_reader(raw.as_bytes()).expect("header");
        assert_eq!(header.station, "CFNT");
        assert_eq!(header.table, "flux");
        assert_eq!(
            header.columns,
            vec!["TIMESTAMP", "RECORD", "WS_ms_WVc(1)", "gps_ready"]
        );
    }

    #[test]
    fn rejects_other_formats() {
        let err = Toa5Header::from_reader("\"TOB1\",\"CFNT\",\"flux\"\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Not a TOA5 file"));
    }

    #[test]
    fn requires_column_line() {
        let err = Toa5Header::from_reader("\"TOA5\",\"CFNT\",\"flux\"\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("no column name line"));
    }
}
