//! Runtime-parameter dump parser.
//!
//! A dump is the plain-text parameter listing a simulation writes at the end
//! of a run:
//!
//! ```text
//! ===============================================================================
//!  Runtime Parameter Information
//! ===============================================================================
//! [*] indicates overridden default
//! [*]             parameter_alpha = 1.000
//!                   parameter_one = F
//! ```
//!
//! The table starts two lines after the first line mentioning the header
//! keyword, at the first line carrying the assignment separator. Every line
//! from there to the end of the file is one parameter row.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{PcovError, Result};

/// Spellings that identify the parts of a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpFormat {
    /// Keyword on the line that precedes the parameter table.
    pub header_marker: String,
    /// Token flagging a parameter overridden from its default.
    pub override_marker: String,
    /// Separator between a parameter name and its value.
    pub assignment_separator: String,
    /// Housekeeping rows that are never parameters when left at default.
    pub reserved_names: Vec<String>,
}

impl Default for DumpFormat {
    fn default() -> Self {
        Self {
            header_marker: "Parameter".to_string(),
            override_marker: "[*]".to_string(),
            assignment_separator: "=".to_string(),
            reserved_names: vec!["Restart".to_string()],
        }
    }
}

/// One parameter row of a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamLine {
    pub name: String,
    pub overridden: bool,
}

impl ParamLine {
    fn new(name: &str, overridden: bool) -> Self {
        Self {
            name: name.to_string(),
            overridden,
        }
    }
}

/// Parameter rows of one run, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDump {
    /// Identifies the artifact the rows came from (archive or file path).
    pub label: String,
    pub lines: Vec<ParamLine>,
}

impl RunDump {
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Parse one run's raw dump text.
///
/// Fails with [`PcovError::MalformedDump`] when the header keyword is absent
/// or no row carrying the assignment separator follows it.
pub fn parse_dump(label: &str, text: &str, format: &DumpFormat) -> Result<RunDump> {
    let lines: Vec<&str> = text.lines().collect();
    let start = table_start(label, &lines, format)?;

    let rows = lines[start..]
        .iter()
        .filter_map(|line| parse_row(line, format))
        .collect();

    Ok(RunDump {
        label: label.to_string(),
        lines: rows,
    })
}

/// Index of the first parameter row.
fn table_start(label: &str, lines: &[&str], format: &DumpFormat) -> Result<usize> {
    let header = lines
        .iter()
        .position(|line| line.contains(format.header_marker.as_str()))
        .ok_or_else(|| {
            PcovError::malformed(
                label,
                format!("no header line containing {:?}", format.header_marker),
            )
        })?;

    lines
        .iter()
        .enumerate()
        .skip(header + 2)
        .find(|(_, line)| line.contains(format.assignment_separator.as_str()))
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            PcovError::malformed(
                label,
                format!(
                    "no parameter rows containing {:?} after the header on line {}",
                    format.assignment_separator,
                    header + 1
                ),
            )
        })
}

fn parse_row(line: &str, format: &DumpFormat) -> Option<ParamLine> {
    if line.contains(format.override_marker.as_str()) {
        let stripped = line.replace(format.override_marker.as_str(), "");
        return stripped
            .split_whitespace()
            .next()
            .map(|name| ParamLine::new(name, true));
    }

    let name = line.split_whitespace().next()?;
    if format.reserved_names.iter().any(|reserved| reserved == name) {
        return None;
    }
    Some(ParamLine::new(name, false))
}
