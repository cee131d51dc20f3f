use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::dataset::Dataset;
use crate::error::{PairError, Result};
use crate::sampler::Pair;

pub const LABEL_FILE: &str = "train.label";
pub const FIRST_FILE: &str = "train.first";
pub const SECOND_FILE: &str = "train.second";

struct Stream {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Stream {
    fn create(path: PathBuf) -> Result<Self> {
        let file = File::create(&path).map_err(|e| PairError::io(&path, e))?;
        Ok(Stream {
            path,
            writer: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, parts: &[&str]) -> Result<()> {
        let line = parts.join("\t");
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .map_err(|e| PairError::io(&self.path, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PairError::io(&self.path, e))
    }
}

/// The three row-aligned output files. Line `i` of each refers to the same pair.
pub struct PairWriter {
    label: Stream,
    first: Stream,
    second: Stream,
    written: usize,
}

impl PairWriter {
    /// Create or truncate `train.label`, `train.first` and `train.second` in
    /// `dir`, creating `dir` first if it is missing.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| PairError::io(dir, e))?;
        Ok(PairWriter {
            label: Stream::create(dir.join(LABEL_FILE))?,
            first: Stream::create(dir.join(FIRST_FILE))?,
            second: Stream::create(dir.join(SECOND_FILE))?,
            written: 0,
        })
    }

    pub fn write_pair(&mut self, dataset: &Dataset, pair: &Pair) -> Result<()> {
        let first: &str = &dataset.records()[pair.first_index].text;
        let second: &str = &dataset.records()[pair.second_index].text;

        self.label.write_line(&[pair.label.as_str(), first, second])?;
        self.first.write_line(&[first])?;
        self.second.write_line(&[second])?;
        self.written += 1;
        Ok(())
    }

    /// Flush all three files, returning the number of pairs written.
    pub fn finish(mut self) -> Result<usize> {
        self.label.flush()?;
        self.first.flush()?;
        self.second.flush()?;
        Ok(self.written)
    }
}
