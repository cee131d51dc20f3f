use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{PairError, ParseError, Result};

/// Separates category from text; only the first occurrence splits.
pub const DELIMITER: &str = " ,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub category: String,
    pub text: String,
}

impl Record {
    pub fn new(category: impl Into<String>, text: impl Into<String>) -> Self {
        Record {
            category: category.into(),
            text: text.into(),
        }
    }
}

/// What to do with a line that does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    #[default]
    Abort,
    Skip,
}

/// Records in input line order. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
    skipped: usize,
}

/// Parse one input line. `line_number` is 1-based and only used for errors.
pub fn parse_record(line: &str, line_number: usize) -> std::result::Result<Record, ParseError> {
    match line.split_once(DELIMITER) {
        Some((category, text)) => Ok(Record::new(category.trim(), text.trim())),
        None => Err(ParseError::MissingDelimiter {
            line_number,
            line: line.to_string(),
        }),
    }
}

impl Dataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        Dataset {
            records,
            skipped: 0,
        }
    }

    pub fn load(path: &Path, policy: MalformedPolicy) -> Result<Dataset> {
        let file = File::open(path).map_err(|e| PairError::io(path, e))?;
        let dataset = Self::read_from(BufReader::new(file), policy).map_err(|e| match e {
            PairError::Io { source, .. } => PairError::io(path, source),
            other => other,
        })?;
        log::info!(
            "Loaded {} records from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn read_from<R: BufRead>(reader: R, policy: MalformedPolicy) -> Result<Dataset> {
        let mut records = Vec::new();
        let mut skipped = 0;

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| PairError::io("<input>", e))?;
            match parse_record(&line, idx + 1) {
                Ok(record) => records.push(record),
                Err(err) => match policy {
                    MalformedPolicy::Abort => return Err(err.into()),
                    MalformedPolicy::Skip => {
                        log::warn!("Skipping {}", err);
                        skipped += 1;
                    }
                },
            }
        }

        Ok(Dataset { records, skipped })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of malformed lines dropped under [`MalformedPolicy::Skip`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn same_category(&self, a: usize, b: usize) -> bool {
        self.records[a].category == self.records[b].category
    }

    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counter: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &self.records {
            counter
                .entry(record.category.as_str())
                .and_modify(|e| *e += 1)
                .or_insert(1);
        }
        counter
    }
}
