use std::path::PathBuf;

use crate::dataset::MalformedPolicy;
use crate::output::{FIRST_FILE, LABEL_FILE, SECOND_FILE};
use crate::sampler::SamplingStrategy;

/// Options for one pairing run.
#[derive(Debug, Clone)]
pub struct PairOpt {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub seed: Option<u64>, // None draws from OS entropy
    pub strategy: SamplingStrategy,
    pub malformed: MalformedPolicy,
}

impl Default for PairOpt {
    fn default() -> Self {
        PairOpt {
            input: PathBuf::new(),
            output_dir: PathBuf::from("."),
            seed: None,
            strategy: SamplingStrategy::default(),
            malformed: MalformedPolicy::default(),
        }
    }
}

impl PairOpt {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        PairOpt {
            input: input.into(),
            ..Default::default()
        }
    }

    /// `train.label`, `train.first` and `train.second` under the output directory.
    pub fn output_paths(&self) -> [PathBuf; 3] {
        [
            self.output_dir.join(LABEL_FILE),
            self.output_dir.join(FIRST_FILE),
            self.output_dir.join(SECOND_FILE),
        ]
    }
}
