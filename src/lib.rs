pub mod dataset;
pub mod error;
pub mod options;
pub mod output;
pub mod sampler;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::options::PairOpt;
use crate::output::PairWriter;
use crate::sampler::{MatchLabel, PairSampler};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub skipped: usize,
    pub pairs: usize,
    pub matches: usize,
}

pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Load the input, sample one partner per record and write the three output files.
///
/// Output files are only created once the input has parsed and holds enough
/// records to pair.
pub fn run<R: Rng>(opt: &PairOpt, rng: &mut R) -> Result<RunSummary> {
    let dataset = Dataset::load(&opt.input, opt.malformed)?;

    let categories = dataset.category_counts();
    log::info!("{} distinct categories", categories.len());
    for (category, count) in &categories {
        log::debug!("  {}: {}", category, count);
    }

    let sampler = PairSampler::new(&dataset, opt.strategy)?;
    log::info!("Sampling partners with {:?}", sampler.strategy());
    let mut writer = PairWriter::create(&opt.output_dir)?;
    let mut matches = 0;

    for pair in sampler.pairs(rng) {
        let pair = pair?;
        if pair.label == MatchLabel::Match {
            matches += 1;
        }
        log::trace!(
            "{} -> {} ({})",
            pair.first_index,
            pair.second_index,
            pair.label
        );
        writer.write_pair(&dataset, &pair)?;
    }

    let pairs = writer.finish()?;
    Ok(RunSummary {
        records: dataset.len(),
        skipped: dataset.skipped(),
        pairs,
        matches,
    })
}
