//! CSV output.

use boxchem_core::domain::{Domain, DomainState};
use boxchem_core::errors::{BoxModelError, BoxModelResult};
use boxchem_core::io::{Output, OutputTable};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Collects output in memory and writes it as CSV when closed.
///
/// Writes to standard output when no path is given.
#[derive(Debug)]
pub struct CsvOutput {
    table: OutputTable,
    path: Option<PathBuf>,
}

impl CsvOutput {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            table: OutputTable::new(),
            path,
        }
    }

    pub fn table(&self) -> &OutputTable {
        &self.table
    }

    fn write_file(&self, path: &Path) -> BoxModelResult<()> {
        let context = || format!("writing '{}'", path.display());
        let file = File::create(path).map_err(|e| BoxModelError::io(context(), e))?;
        write_csv(&self.table, BufWriter::new(file))
            .map_err(|e| BoxModelError::io(context(), e))?;
        info!(path = %path.display(), rows = self.table.rows().len(), "Wrote output");
        Ok(())
    }
}

impl Output for CsvOutput {
    fn register_output_variable(
        &mut self,
        domain: &Domain,
        internal_name: &str,
        units: &str,
        external_name: &str,
    ) -> BoxModelResult<()> {
        self.table
            .register_output_variable(domain, internal_name, units, external_name)
    }

    fn output(&mut self, time_s: f64, domain: &Domain, state: &DomainState) -> BoxModelResult<()> {
        self.table.output(time_s, domain, state)
    }

    fn close(&mut self) -> BoxModelResult<()> {
        self.table.close()?;
        match &self.path {
            Some(path) => self.write_file(path),
            None => write_csv(&self.table, io::stdout().lock())
                .map_err(|e| BoxModelError::io("writing to standard output", e)),
        }
    }
}

/// Writes the header row and one line per output row.
pub fn write_csv<W: Write>(table: &OutputTable, mut writer: W) -> io::Result<()> {
    let headers = table.headers();
    writeln!(writer, "{}", headers.join(","))?;
    for row in table.rows() {
        let mut fields = vec![row.time_s.to_string()];
        if headers.len() > row.values.len() + 1 {
            fields.push(row.element.to_string());
        }
        fields.extend(row.values.iter().map(f64::to_string));
        writeln!(writer, "{}", fields.join(","))?;
    }
    writer.flush()
}
