//! Conditions files.
//!
//! Column headers follow the `PREFIX.name.units` convention, for example
//! `ENV.temperature.K`, `CONC.O3.mol m-3` or `PHOTO.O2_1.s-1`. The older
//! `PREFIX.name [units]` form is accepted too, and units may be left out to
//! use the property's own units. Evolving conditions files start with a
//! `time.<units>` column.
//!
//! | Prefix  | Property                              |
//! |---------|---------------------------------------|
//! | `ENV`   | `<name>`                              |
//! | `CONC`  | `chemical_species%<name>`             |
//! | `EMIS`  | `emission_rates%<name>`               |
//! | `PHOTO` | `photolysis_rate_constants%<name>`    |
//! | `LOSS`  | `loss_rate_constants%<name>`          |
//! | `USER`  | `user_defined_rate_parameters%<name>` |
//!
//! Columns for properties no component registered are skipped with a
//! warning, except `ENV` columns, which must name a registered property.

use boxchem_core::domain::Domain;
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use boxchem_core::io::ConditionsTable;
use boxchem_core::property::join_name;
use boxchem_core::standard_properties::{
    CHEMICAL_SPECIES, EMISSION_RATES, LOSS_RATE_CONSTANTS, PHOTOLYSIS_RATE_CONSTANTS,
    USER_DEFINED_RATE_PARAMETERS,
};
use boxchem_core::units::convert_value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A parsed column header.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnHeader {
    pub prefix: String,
    pub name: String,
    pub units: Option<String>,
}

impl ColumnHeader {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (body, units) = match header.strip_suffix(']').and_then(|h| h.split_once(" [")) {
            Some((body, units)) => (body, Some(units.to_string())),
            None => (header, None),
        };
        let (prefix, rest) = body.split_once('.')?;
        let (name, units) = match units {
            Some(units) => (rest, Some(units)),
            None => match rest.split_once('.') {
                Some((name, units)) => (name, Some(units.to_string())),
                None => (rest, None),
            },
        };
        if prefix.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            prefix: prefix.to_string(),
            name: name.to_string(),
            units,
        })
    }

    /// Name of the domain property the column sets, if the prefix is known.
    pub fn property_name(&self) -> Option<String> {
        let family = match self.prefix.as_str() {
            "ENV" => return Some(self.name.clone()),
            "CONC" => CHEMICAL_SPECIES,
            "EMIS" => EMISSION_RATES,
            "PHOTO" => PHOTOLYSIS_RATE_CONSTANTS,
            "LOSS" => LOSS_RATE_CONSTANTS,
            "USER" => USER_DEFINED_RATE_PARAMETERS,
            _ => return None,
        };
        Some(join_name(family, &self.name))
    }
}

/// Parsed CSV contents.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    /// One entry per data row. Empty cells are NaN.
    pub rows: Vec<Vec<f64>>,
}

/// Reads a comma separated file of numbers with a header row.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_csv(path: &Path) -> BoxModelResult<CsvTable> {
    let contents = fs::read_to_string(path)
        .map_err(|e| BoxModelError::io(format!("reading '{}'", path.display()), e))?;
    parse_csv(&path.display().to_string(), &contents)
}

pub fn parse_csv(source: &str, contents: &str) -> BoxModelResult<CsvTable> {
    let mut lines = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

    let headers: Vec<String> = match lines.next() {
        Some((_, line)) => line.split(',').map(|h| h.trim().to_string()).collect(),
        None => return Err(BoxModelError::configuration(source, "no header row")),
    };

    let mut rows = Vec::new();
    for (index, line) in lines {
        let location = format!("{source}:{}", index + 1);
        let cells: Vec<&str> = line.split(',').map(str::trim).collect();
        if cells.len() != headers.len() {
            return Err(BoxModelError::configuration(
                location,
                format!("expected {} values, found {}", headers.len(), cells.len()),
            ));
        }
        let row = cells
            .iter()
            .map(|cell| {
                if cell.is_empty() {
                    Ok(f64::NAN)
                } else {
                    cell.parse::<f64>().map_err(|e| {
                        BoxModelError::configuration(&location, format!("'{cell}': {e}"))
                    })
                }
            })
            .collect::<BoxModelResult<Vec<_>>>()?;
        rows.push(row);
    }
    Ok(CsvTable { headers, rows })
}

/// Binds each recognised column of a table to its property.
fn add_columns<'a>(
    table: &mut ConditionsTable,
    domain: &Domain,
    columns: impl IntoIterator<Item = (&'a str, Vec<f64>)>,
) -> BoxModelResult<()> {
    for (header, values) in columns {
        let Some(column) = ColumnHeader::parse(header) else {
            warn!(input = table.label(), header, "Ignoring column with unrecognised header");
            continue;
        };
        let Some(name) = column.property_name() else {
            warn!(input = table.label(), header, "Ignoring column with unknown prefix");
            continue;
        };
        if !domain.is_variable(&name) {
            if column.prefix == "ENV" {
                return Err(BoxModelError::UnknownProperty(name));
            }
            warn!(
                input = table.label(),
                header,
                property = name.as_str(),
                "Ignoring column for unregistered property"
            );
            continue;
        }
        let units = match column.units {
            Some(units) => units,
            None => domain.variable_units(&name)?.to_string(),
        };
        debug!(
            input = table.label(),
            property = name.as_str(),
            units = units.as_str(),
            "Bound column"
        );
        table.add_column(domain, &name, &units, values)?;
    }
    Ok(())
}

/// Initial conditions given inline as header to value pairs.
pub fn initial_conditions(
    domain: &Domain,
    values: &BTreeMap<String, f64>,
) -> BoxModelResult<ConditionsTable> {
    let mut table = ConditionsTable::initial("initial conditions");
    add_columns(
        &mut table,
        domain,
        values.iter().map(|(header, value)| (header.as_str(), vec![*value])),
    )?;
    Ok(table)
}

/// Initial conditions from a CSV file with exactly one data row.
pub fn read_initial_conditions(domain: &Domain, path: &Path) -> BoxModelResult<ConditionsTable> {
    let csv = read_csv(path)?;
    if csv.rows.len() != 1 {
        return Err(BoxModelError::configuration(
            path.display().to_string(),
            format!("initial conditions need one data row, found {}", csv.rows.len()),
        ));
    }
    let mut table = ConditionsTable::initial(path.display().to_string());
    add_columns(
        &mut table,
        domain,
        csv.headers
            .iter()
            .zip(&csv.rows[0])
            .map(|(header, value)| (header.as_str(), vec![*value])),
    )?;
    Ok(table)
}

/// Evolving conditions from a CSV file whose first column is time.
pub fn read_evolving_conditions(domain: &Domain, path: &Path) -> BoxModelResult<ConditionsTable> {
    let label = path.display().to_string();
    let csv = read_csv(path)?;
    let time_units = csv
        .headers
        .first()
        .and_then(|h| time_units(h))
        .ok_or_else(|| {
            BoxModelError::configuration(&label, "first column must be time, e.g. 'time.s'")
        })?;

    let times = csv
        .rows
        .iter()
        .map(|row| {
            if row[0].is_nan() {
                return Err(BoxModelError::configuration(&label, "missing time value"));
            }
            convert_value(row[0], &time_units, "s")
                .map_err(|e| BoxModelError::configuration(&label, e.to_string()))
        })
        .collect::<BoxModelResult<Vec<_>>>()?;
    let mut table = ConditionsTable::new(label, times)?;

    let columns = csv.headers.iter().enumerate().skip(1).map(|(i, header)| {
        (
            header.as_str(),
            csv.rows.iter().map(|row| row[i]).collect::<Vec<_>>(),
        )
    });
    add_columns(&mut table, domain, columns)?;
    debug!(
        input = table.label(),
        entries = csv.rows.len(),
        columns = table.column_names().len(),
        "Read evolving conditions"
    );
    Ok(table)
}

/// Units of a `time.<units>` or `time [<units>]` header.
fn time_units(header: &str) -> Option<String> {
    let header = header.trim();
    if header == "time" {
        return Some("s".to_string());
    }
    if let Some(units) = header.strip_prefix("time.") {
        return Some(units.to_string());
    }
    header
        .strip_prefix("time [")
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::to_string)
}
