use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use refdata_domain::{
    FacilityId, HierarchyExpander, HierarchyGap, ProgramId, ProgramScope, SupervisionHierarchy,
    SupervisoryNodeId,
};
use tracing::{debug, warn};

/// Counters collected by one cache over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HierarchyCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that expanded the hierarchy.
    pub misses: u64,
    /// Hierarchy gaps met while expanding.
    pub gaps: u64,
}

/// Supervised facility sets keyed by node and program, shared by concurrent
/// workers during one rebuild.
///
/// Two workers missing the same key at once both expand the subtree; the
/// first inserted value wins and the other is dropped.
#[derive(Debug)]
pub struct HierarchyExpansionCache {
    hierarchy: Arc<SupervisionHierarchy>,
    scope: ProgramScope,
    entries: DashMap<(SupervisoryNodeId, ProgramId), Arc<BTreeSet<FacilityId>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    gaps: AtomicU64,
}

impl HierarchyExpansionCache {
    /// Creates an empty cache over a hierarchy snapshot.
    #[must_use]
    pub fn new(hierarchy: Arc<SupervisionHierarchy>, scope: ProgramScope) -> Self {
        Self {
            hierarchy,
            scope,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            gaps: AtomicU64::new(0),
        }
    }

    /// Returns facilities supervised by the node for the program.
    #[must_use]
    pub fn supervised_facilities(
        &self,
        node: SupervisoryNodeId,
        program: ProgramId,
    ) -> Arc<BTreeSet<FacilityId>> {
        let key = (node, program);
        if let Some(entry) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(entry.value());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // expand outside the map lock
        let expansion = HierarchyExpander::new(self.hierarchy.as_ref(), self.scope)
            .supervised_facilities(node, Some(program));
        for gap in &expansion.gaps {
            self.record_gap(gap, program);
        }

        let facilities = Arc::new(expansion.facilities);
        Arc::clone(self.entries.entry(key).or_insert(facilities).value())
    }

    /// Returns the counters collected so far.
    #[must_use]
    pub fn stats(&self) -> HierarchyCacheStats {
        HierarchyCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            gaps: self.gaps.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_gap(&self, gap: &HierarchyGap, program: ProgramId) {
        self.gaps.fetch_add(1, Ordering::Relaxed);
        match gap {
            HierarchyGap::NoFacilities { node } => debug!(
                node_id = %node,
                program_id = %program,
                "supervisory node supervises no facilities"
            ),
            _ => warn!(
                program_id = %program,
                gap = %gap,
                "supervision hierarchy could not be fully resolved"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use refdata_domain::{
        FacilityId, ProgramId, ProgramScope, RequisitionGroup, RequisitionGroupId,
        SupervisionHierarchy, SupervisoryNode, SupervisoryNodeId,
    };

    use super::{HierarchyCacheStats, HierarchyExpansionCache};

    fn leaf_hierarchy(members: &[FacilityId]) -> (SupervisionHierarchy, SupervisoryNodeId) {
        let group = RequisitionGroup::new(RequisitionGroupId::new(), "RG1", members.iter().copied())
            .unwrap_or_else(|_| unreachable!());
        let node = SupervisoryNode::new(SupervisoryNodeId::new(), "SN1")
            .map(|node| node.with_requisition_group(group.id()))
            .unwrap_or_else(|_| unreachable!());
        let node_id = node.id();

        let mut hierarchy = SupervisionHierarchy::new();
        hierarchy.insert_requisition_group(group);
        hierarchy.insert_node(node);
        (hierarchy, node_id)
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let members = [FacilityId::new(), FacilityId::new()];
        let (hierarchy, node_id) = leaf_hierarchy(&members);
        let cache = HierarchyExpansionCache::new(Arc::new(hierarchy), ProgramScope::Unrestricted);
        let program = ProgramId::new();

        let first = cache.supervised_facilities(node_id, program);
        let second = cache.supervised_facilities(node_id, program);

        assert_eq!(*first, BTreeSet::from(members));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            HierarchyCacheStats {
                hits: 1,
                misses: 1,
                gaps: 0,
            }
        );
    }

    #[test]
    fn programs_are_cached_separately() {
        let (hierarchy, node_id) = leaf_hierarchy(&[FacilityId::new()]);
        let cache = HierarchyExpansionCache::new(Arc::new(hierarchy), ProgramScope::Unrestricted);

        let _ = cache.supervised_facilities(node_id, ProgramId::new());
        let _ = cache.supervised_facilities(node_id, ProgramId::new());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn unknown_node_counts_a_gap_and_yields_nothing() {
        let cache = HierarchyExpansionCache::new(
            Arc::new(SupervisionHierarchy::new()),
            ProgramScope::Unrestricted,
        );

        let facilities = cache.supervised_facilities(SupervisoryNodeId::new(), ProgramId::new());

        assert!(facilities.is_empty());
        assert_eq!(cache.stats().gaps, 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_agree() {
        let members = [FacilityId::new(), FacilityId::new(), FacilityId::new()];
        let (hierarchy, node_id) = leaf_hierarchy(&members);
        let cache = Arc::new(HierarchyExpansionCache::new(
            Arc::new(hierarchy),
            ProgramScope::Unrestricted,
        ));
        let program = ProgramId::new();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.supervised_facilities(node_id, program) });
        }

        while let Some(joined) = tasks.join_next().await {
            let facilities = joined.unwrap_or_else(|_| unreachable!());
            assert_eq!(*facilities, BTreeSet::from(members));
        }
        assert_eq!(cache.len(), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 8);
    }
}
