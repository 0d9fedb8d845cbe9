//! Run configuration and engine construction

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::apss::{
    ApssContext, ApssTask, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_OUTPUT_BUFFER_SIZE, FeatureIndex,
    InnerEngine, InvertedApss, NaiveApss, ThreadedApss,
};
use crate::error::{Error, Result};
use crate::filter::{self, PairFilter, RecordFilter};
use crate::measure::weighting::{self, weighting_by_name};
use crate::measure::{self, FeatureMarginals, MeasureParams, Proximity};
use crate::sink::ObjectSink;
use crate::source::SeekableSource;
use crate::stats::ApssStats;
use crate::structures::{IndexedVector, WeightedPair};

/// All-pairs run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApssConfig {
    /// Engine used for each comparison (alone, or per chunk pair when threaded)
    pub algorithm: InnerEngine,
    /// Run chunk pairs in parallel
    pub threaded: bool,
    /// Worker threads for the threaded engine
    pub num_threads: usize,
    /// Upper bound on records per chunk
    pub max_chunk_size: usize,
    /// Memory available for live chunks; shrinks chunks when set
    pub memory_budget_bytes: Option<u64>,
    /// Measure name, resolved with `measure::by_name_in`
    pub measure: String,
    pub measure_params: MeasureParams,
    /// Swap the operands of a non-commutative measure
    pub measure_reversed: bool,
    /// Weighting applied to both operands before measuring (`none` to skip)
    pub weighting: String,
    /// Keep pairs with similarity >= this value
    pub min_similarity: Option<f64>,
    /// Keep pairs with similarity <= this value
    pub max_similarity: Option<f64>,
    /// Emit pairs relating a token to itself
    pub output_identity_pairs: bool,
    /// Skip vectors with fewer stored features
    pub min_entries: usize,
    /// Pairs buffered before a sorted batch is written
    pub output_buffer_size: usize,
}

impl Default for ApssConfig {
    fn default() -> Self {
        Self {
            algorithm: InnerEngine::Inverted,
            threaded: true,
            num_threads: num_cpus::get() + 1,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            memory_budget_bytes: None,
            measure: "jaccard".to_string(),
            measure_params: MeasureParams::default(),
            measure_reversed: false,
            weighting: "none".to_string(),
            min_similarity: None,
            max_similarity: None,
            output_identity_pairs: false,
            min_entries: 0,
            output_buffer_size: DEFAULT_OUTPUT_BUFFER_SIZE,
        }
    }
}

impl ApssConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::Config("num_threads must be at least 1".into()));
        }
        if self.max_chunk_size == 0 {
            return Err(Error::Config("max_chunk_size must be at least 1".into()));
        }
        if self.max_chunk_size > FeatureIndex::MAX_VECTORS {
            return Err(Error::Config(format!(
                "max_chunk_size must be at most {}",
                FeatureIndex::MAX_VECTORS
            )));
        }
        if let (Some(min), Some(max)) = (self.min_similarity, self.max_similarity) {
            if min > max {
                return Err(Error::Config(format!(
                    "min_similarity {} exceeds max_similarity {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Whether the measure or weighting reads corpus feature marginals
    pub fn needs_marginals(&self) -> bool {
        measure::needs_marginals(&self.measure) || weighting::needs_marginals(&self.weighting)
    }

    /// Resolve the configured measure
    pub fn proximity(&self) -> Result<Proximity> {
        self.proximity_with(None)
    }

    /// Resolve the configured measure, weighting and direction, reading
    /// `marginals` where they are needed
    pub fn proximity_with(&self, marginals: Option<&Arc<FeatureMarginals>>) -> Result<Proximity> {
        let mut proximity = measure::by_name_in(&self.measure, &self.measure_params, marginals)?;
        if let Some(w) = weighting_by_name(
            &self.weighting,
            self.measure_params.weighting_factor,
            marginals,
        )? {
            proximity = proximity.weighted(w);
        }
        Ok(if self.measure_reversed {
            proximity.reversed()
        } else {
            proximity
        })
    }

    /// Conjunction of the configured pair filters
    pub fn pair_filter(&self) -> PairFilter {
        let mut filters = Vec::new();
        if let Some(min) = self.min_similarity {
            filters.push(filter::min_similarity(min));
        }
        if let Some(max) = self.max_similarity {
            filters.push(filter::max_similarity(max));
        }
        if !self.output_identity_pairs {
            filters.push(filter::exclude_identity());
        }
        filter::all_of(filters)
    }

    pub fn record_filter(&self) -> RecordFilter {
        if self.min_entries > 0 {
            filter::min_entries(self.min_entries)
        } else {
            filter::accept_all()
        }
    }

    /// Shared engine context writing to `sink` and counting into `stats`
    pub fn context(
        &self,
        sink: Arc<dyn ObjectSink<WeightedPair>>,
        stats: Arc<ApssStats>,
    ) -> Result<ApssContext> {
        self.context_with(sink, stats, None)
    }

    fn context_with(
        &self,
        sink: Arc<dyn ObjectSink<WeightedPair>>,
        stats: Arc<ApssStats>,
        marginals: Option<&Arc<FeatureMarginals>>,
    ) -> Result<ApssContext> {
        Ok(ApssContext::new(sink)
            .with_measure(self.proximity_with(marginals)?)
            .with_record_filter(self.record_filter())
            .with_pair_filter(self.pair_filter())
            .with_stats(stats)
            .with_output_buffer_size(self.output_buffer_size))
    }

    /// Build the configured engine over two sources.
    ///
    /// When the measure or weighting needs feature marginals, source A is
    /// scanned once for them first.
    pub fn build<A, B>(
        &self,
        mut source_a: A,
        source_b: B,
        sink: Arc<dyn ObjectSink<WeightedPair>>,
        stats: Arc<ApssStats>,
    ) -> Result<Box<dyn ApssTask>>
    where
        A: SeekableSource<Item = IndexedVector> + 'static,
        B: SeekableSource<Item = IndexedVector> + 'static,
    {
        self.validate()?;
        let marginals = if self.needs_marginals() {
            let marginals = FeatureMarginals::scan(&mut source_a)?;
            stats.add_source_reads(marginals.vectors());
            info!(
                "[config] feature marginals over {} vectors, {} features",
                marginals.vectors(),
                marginals.num_features()
            );
            Some(Arc::new(marginals))
        } else {
            None
        };
        let ctx = self.context_with(sink, stats, marginals.as_ref())?;
        info!(
            "[config] algorithm={:?} threaded={} measure={}",
            self.algorithm,
            self.threaded,
            ctx.proximity.name()
        );

        let task: Box<dyn ApssTask> = match (self.threaded, self.algorithm) {
            (true, inner) => Box::new(
                ThreadedApss::new(source_a, source_b, ctx)?
                    .with_inner(inner)
                    .with_num_threads(self.num_threads)
                    .with_max_chunk_size(self.max_chunk_size)
                    .with_memory_budget(self.memory_budget_bytes),
            ),
            (false, InnerEngine::Inverted) => Box::new(InvertedApss::new(source_a, source_b, ctx)?),
            (false, InnerEngine::Naive) => Box::new(NaiveApss::new(source_a, source_b, ctx)?),
        };
        Ok(task)
    }
}
