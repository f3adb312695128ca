//! Result set output.
//!
//! The whole result set is serialized once, after the run, and handed to a
//! single sink: a record file, or a named output value. Named outputs go to
//! the file in `GITHUB_OUTPUT` when the job runs under Actions and to stdout
//! otherwise.

use crate::config::Config;
use crate::error::Result;
use crate::record::PublicationRecord;
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the serialized result set ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Write the JSON array to this file
    File(PathBuf),
    /// Publish the JSON array as output value `name`
    Named {
        name: String,
        /// Actions output file; `None` prints to stdout
        github_output: Option<PathBuf>,
    },
}

impl OutputSink {
    /// Pick the sink for a run, reading `GITHUB_OUTPUT` from the environment.
    pub fn from_config(config: &Config) -> Self {
        Self::resolve(config, std::env::var_os("GITHUB_OUTPUT"))
    }

    fn resolve(config: &Config, github_output: Option<OsString>) -> Self {
        match &config.record_file {
            Some(path) => OutputSink::File(path.clone()),
            None => OutputSink::Named {
                name: config.output_name.clone(),
                github_output: github_output.filter(|p| !p.is_empty()).map(PathBuf::from),
            },
        }
    }

    /// Serialize and deliver the result set.
    pub fn write(&self, records: &[PublicationRecord], pretty: bool) -> Result<()> {
        let json = render(records, pretty)?;

        match self {
            OutputSink::File(path) => {
                write_atomically(path, &json)?;
                info!(count = records.len(), path = ?path, "Successfully wrote publications");
            }
            OutputSink::Named { name, github_output: Some(path) } => {
                append_output(path, name, &json)?;
                info!(count = records.len(), output = %name, "Successfully fetched publications");
            }
            OutputSink::Named { name, github_output: None } => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", json)?;
                stdout.flush()?;
                info!(count = records.len(), output = %name, "Successfully fetched publications");
            }
        }
        Ok(())
    }
}

/// JSON text of the result set.
pub fn render(records: &[PublicationRecord], pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    Ok(json)
}

/// Write to a sibling temp file and rename over the target, so readers
/// never observe a half-written file.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Append a multiline `name<<DELIM` block to the Actions output file.
fn append_output(path: &Path, name: &str, value: &str) -> Result<()> {
    let delimiter = format!("ghadelimiter_{:016x}", rand::random::<u64>());
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    write!(file, "{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)?;
    Ok(())
}
