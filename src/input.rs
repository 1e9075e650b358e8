//! CSV loaders for the roster and the department placement table.
//!
//! A file that cannot be read or parsed aborts the run; individual rows with
//! missing cells load as blanks and are rejected later, one outcome each.
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use log::{debug, warn};
use serde::Deserialize;

use crate::record::{DepartmentMap, PersonRecord};

#[derive(Debug, Deserialize)]
struct PlacementRow {
    #[serde(rename = "DepartmentID", default)]
    department_id: String,
    #[serde(rename = "OU", alias = "OUPath", default)]
    ou_path: String,
}

fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

fn reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(text.as_bytes())
}

pub fn parse_people(text: &str, delimiter: u8) -> Result<Vec<PersonRecord>> {
    let mut rdr = reader(text, delimiter);
    let mut people = Vec::new();
    for (idx, row) in rdr.deserialize::<PersonRecord>().enumerate() {
        people.push(row.with_context(|| format!("roster row {}", idx + 1))?);
    }
    Ok(people)
}

pub fn parse_departments(text: &str, delimiter: u8) -> Result<DepartmentMap> {
    let mut rdr = reader(text, delimiter);
    let mut map = DepartmentMap::new();
    for (idx, row) in rdr.deserialize::<PlacementRow>().enumerate() {
        let row = row.with_context(|| format!("department row {}", idx + 1))?;
        if row.department_id.trim().is_empty() {
            debug!("department row {} has no code; ignored", idx + 1);
            continue;
        }
        if !map.insert(&row.department_id, &row.ou_path) {
            warn!(
                "duplicate department {} on row {}; keeping the first mapping",
                row.department_id.trim(),
                idx + 1
            );
        }
    }
    Ok(map)
}

pub fn load_people<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Vec<PersonRecord>> {
    let path = path.as_ref();
    parse_people(&read_text(path)?, delimiter).with_context(|| format!("parse {}", path.display()))
}

pub fn load_departments<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<DepartmentMap> {
    let path = path.as_ref();
    parse_departments(&read_text(path)?, delimiter)
        .with_context(|| format!("parse {}", path.display()))
}
