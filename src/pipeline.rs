//! Melting driver: filter, reduce and optionally melt recoverable chains.

use crate::cactus::DecompositionBuilder;
use crate::coverage::{contains_required_species, tree_coverage};
use crate::error::{inconsistent, CafError};
use crate::melting::{reduce, MeltParams, MeltStats};
use crate::metadata::{EventTree, SequenceCatalog};
use crate::pinch::{BlockId, ThreadSet};
use crate::recoverable::{
    melt_recoverable_chains, DiagnosticContext, RecoverabilityReport, RecoverableMeltParams,
};
use log::{error, info};

/// Knobs of one melting pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MeltingConfig {
    pub block_end_trim: i64,
    pub minimum_chain_length: i64,
    pub break_chains_at_reverse_tandems: bool,
    pub maximum_median_spacing_between_linked_ends: i64,
    /// Blocks with fewer ingroup segments are filtered out
    pub minimum_ingroup_degree: usize,
    pub minimum_outgroup_degree: usize,
    pub minimum_total_degree: usize,
    /// Blocks covering less of the species tree are filtered out
    pub minimum_tree_coverage: f64,
    pub melt_recoverable_chains: bool,
    pub max_recoverable_chain_length: i64,
}

impl Default for MeltingConfig {
    fn default() -> Self {
        Self {
            block_end_trim: 0,
            minimum_chain_length: 1,
            break_chains_at_reverse_tandems: true,
            maximum_median_spacing_between_linked_ends: i64::MAX,
            minimum_ingroup_degree: 0,
            minimum_outgroup_degree: 0,
            minimum_total_degree: 0,
            minimum_tree_coverage: 0.0,
            melt_recoverable_chains: false,
            max_recoverable_chain_length: i64::MAX,
        }
    }
}

impl MeltingConfig {
    pub fn melt_params(&self) -> MeltParams {
        MeltParams {
            block_end_trim: self.block_end_trim,
            minimum_chain_length: self.minimum_chain_length,
            break_chains_at_reverse_tandems: self.break_chains_at_reverse_tandems,
            maximum_median_spacing_between_linked_ends: self
                .maximum_median_spacing_between_linked_ends,
        }
    }

    pub fn recoverable_params(&self) -> RecoverableMeltParams {
        RecoverableMeltParams {
            break_chains_at_reverse_tandems: self.break_chains_at_reverse_tandems,
            maximum_median_spacing_between_linked_ends: self
                .maximum_median_spacing_between_linked_ends,
            max_recoverable_chain_length: self.max_recoverable_chain_length,
        }
    }

    /// Whether any species or coverage threshold is set.
    pub fn filters_blocks(&self) -> bool {
        self.minimum_ingroup_degree > 0
            || self.minimum_outgroup_degree > 0
            || self.minimum_total_degree > 0
            || self.minimum_tree_coverage > 0.0
    }

    /// Predicate returning `true` for blocks that miss the required species
    /// or the minimum tree coverage.
    pub fn block_filter<'a>(
        &'a self,
        catalog: &'a SequenceCatalog,
        events: &'a EventTree,
    ) -> impl Fn(&ThreadSet, BlockId) -> Result<bool, CafError> + 'a {
        move |threads: &ThreadSet, block: BlockId| {
            let has_species = contains_required_species(
                threads,
                block,
                catalog,
                events,
                self.minimum_ingroup_degree,
                self.minimum_outgroup_degree,
                self.minimum_total_degree,
            )?;
            if !has_species {
                return Ok(true);
            }
            if self.minimum_tree_coverage > 0.0 {
                return Ok(tree_coverage(threads, block, catalog, events)? < self.minimum_tree_coverage);
            }
            Ok(false)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeltingReport {
    pub melt: MeltStats,
    pub recoverable: Option<RecoverabilityReport>,
}

/// Run a full melting pass. On failure the state of the alignment graph is
/// logged before the error is returned; the graph is left partially reduced.
pub fn run_melting<B>(
    threads: &mut ThreadSet,
    builder: &mut B,
    config: &MeltingConfig,
    catalog: Option<&SequenceCatalog>,
    events: Option<&EventTree>,
) -> Result<MeltingReport, CafError>
where
    B: DecompositionBuilder + ?Sized,
{
    match melt(threads, builder, config, catalog, events) {
        Ok(report) => Ok(report),
        Err(e) => {
            error!("Melting aborted: {}", e);
            error!(
                "Alignment graph at abort: {} threads, {} blocks, {} segments",
                threads.thread_count(),
                threads.block_count(),
                threads.segment_count()
            );
            Err(e)
        }
    }
}

fn melt<B>(
    threads: &mut ThreadSet,
    builder: &mut B,
    config: &MeltingConfig,
    catalog: Option<&SequenceCatalog>,
    events: Option<&EventTree>,
) -> Result<MeltingReport, CafError>
where
    B: DecompositionBuilder + ?Sized,
{
    let melt = if config.filters_blocks() {
        let (Some(catalog), Some(events)) = (catalog, events) else {
            return Err(inconsistent(
                "Species and coverage filters need sequence and event metadata",
            ));
        };
        let filter = config.block_filter(catalog, events);
        reduce(threads, builder, Some(&filter), &config.melt_params())?
    } else {
        reduce(threads, builder, None, &config.melt_params())?
    };

    let recoverable = if config.melt_recoverable_chains {
        let ctx = DiagnosticContext { catalog, events };
        Some(melt_recoverable_chains(
            threads,
            builder,
            &config.recoverable_params(),
            &ctx,
        )?)
    } else {
        None
    };

    info!(
        "Melting finished with {} blocks over {} threads",
        threads.block_count(),
        threads.thread_count()
    );
    Ok(MeltingReport { melt, recoverable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cactus::{CactusGraph, Decomposition, DecompositionParams};

    fn empty_builder(_: &ThreadSet, _: &DecompositionParams) -> Result<Decomposition, CafError> {
        let mut graph = CactusGraph::new();
        let root = graph.add_node();
        Ok(Decomposition {
            graph,
            root,
            dead_end_component: Vec::new(),
        })
    }

    #[test]
    fn test_filters_need_metadata() {
        let mut threads = ThreadSet::new();
        threads.add_thread(1, 0, 10).unwrap();
        let config = MeltingConfig {
            minimum_ingroup_degree: 2,
            ..MeltingConfig::default()
        };
        let mut builder = empty_builder;
        assert!(run_melting(&mut threads, &mut builder, &config, None, None).is_err());
    }

    #[test]
    fn test_species_filter_removes_single_species_blocks() {
        let mut events = EventTree::new("root");
        let human = events.add_event(events.root(), "human", 1.0, false).unwrap();
        let chimp = events.add_event(events.root(), "chimp", 1.0, false).unwrap();
        let mut catalog = SequenceCatalog::new();
        catalog.insert(1, "h1", human);
        catalog.insert(2, "c1", chimp);

        let mut threads = ThreadSet::new();
        let a = threads.add_thread(1, 0, 100).unwrap();
        let b = threads.add_thread(2, 0, 100).unwrap();
        let shared = threads.construct_block(&[(a, 10, true), (b, 10, true)], 5).unwrap();
        let lonely = threads.construct_block(&[(a, 40, true)], 5).unwrap();

        let config = MeltingConfig {
            minimum_ingroup_degree: 2,
            ..MeltingConfig::default()
        };
        let mut builder = empty_builder;
        let report =
            run_melting(&mut threads, &mut builder, &config, Some(&catalog), Some(&events)).unwrap();
        assert_eq!(report.melt.blocks_filtered, 1);
        assert!(report.recoverable.is_none());
        assert!(threads.block(shared).is_some());
        assert!(threads.block(lonely).is_none());
    }

    #[test]
    fn test_tree_coverage_threshold() {
        let mut events = EventTree::new("root");
        let anc = events.add_event(events.root(), "anc", 0.0, false).unwrap();
        let human = events.add_event(anc, "human", 1.0, false).unwrap();
        let chimp = events.add_event(anc, "chimp", 1.0, false).unwrap();
        let gorilla = events.add_event(anc, "gorilla", 2.0, false).unwrap();
        let mut catalog = SequenceCatalog::new();
        catalog.insert(1, "h", human);
        catalog.insert(2, "c", chimp);
        catalog.insert(3, "g", gorilla);

        let mut threads = ThreadSet::new();
        let h = threads.add_thread(1, 0, 50).unwrap();
        let c = threads.add_thread(2, 0, 50).unwrap();
        let block = threads.construct_block(&[(h, 10, true), (c, 10, true)], 5).unwrap();

        let config = MeltingConfig {
            minimum_tree_coverage: 0.6,
            ..MeltingConfig::default()
        };
        let filter = config.block_filter(&catalog, &events);
        // human + chimp cover 2 of 4 units
        assert!(filter(&threads, block).unwrap());

        let config = MeltingConfig {
            minimum_tree_coverage: 0.5,
            ..MeltingConfig::default()
        };
        let filter = config.block_filter(&catalog, &events);
        assert!(!filter(&threads, block).unwrap());
    }

    #[test]
    fn test_recoverable_pass_reports() {
        let mut threads = ThreadSet::new();
        threads.add_thread(1, 0, 10).unwrap();
        let config = MeltingConfig {
            melt_recoverable_chains: true,
            ..MeltingConfig::default()
        };
        let mut builder = empty_builder;
        let report = run_melting(&mut threads, &mut builder, &config, None, None).unwrap();
        let recoverable = report.recoverable.unwrap();
        assert_eq!(recoverable.node_count, 1);
        assert_eq!(recoverable.blocks_destroyed, 0);
    }
}
