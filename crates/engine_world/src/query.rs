//! Multi-type component queries.
//!
//! A query names K component types and visits every tuple of live components
//! that share a host, one tuple per combination. The join sorts the
//! requested types by world-wide cardinality and iterates the rarest type's
//! pool (plus descendant pools) as the outer loop; every other type is
//! satisfied by probing the candidate host's collection, which is a map
//! lookup, not a scan. Total cost is proportional to the rarest type's
//! population times K, independent of how populous the other types are.
//!
//! Structural mutation during a query goes through [`Commands`]: the visit
//! callback records frees and host destructions, and they take effect at the
//! next safe point. Iterating a query therefore never invalidates the
//! handles it is visiting.

use engine_component::{Component, Handle, HostId, Pool, RawHandle, SlotIndex, TypeId};

use crate::collection::ComponentCollection;
use crate::world::World;

/// Deferred structural mutations recorded during a query visit.
///
/// Nothing here takes effect immediately; the world merges the buffer into
/// its pending queues when the query returns, and the pending queues drain
/// at the tick safe point.
#[derive(Debug, Default)]
pub struct Commands {
    frees: Vec<RawHandle>,
    host_destroys: Vec<HostId>,
}

impl Commands {
    /// Create an empty command buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a component for deletion at the next safe point.
    pub fn free(&mut self, handle: impl Into<RawHandle>) {
        self.frees.push(handle.into());
    }

    /// Queue a host (and everything it owns) for destruction at the next
    /// safe point.
    pub fn destroy_host(&mut self, host: HostId) {
        self.host_destroys.push(host);
    }

    /// `true` if no mutations were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frees.is_empty() && self.host_destroys.is_empty()
    }
}

/// Instrumentation counters for one query run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueryStats {
    /// Host-collection probes performed while matching non-outer types.
    pub collection_lookups: usize,
    /// Tuples handed to the visit callback.
    pub tuples_emitted: usize,
}

impl World {
    /// Merge a command buffer into the world's pending queues.
    ///
    /// Queries call this on return; it is public so systems that batch
    /// mutations outside a query can use the same path.
    pub fn apply(&mut self, commands: Commands) {
        for handle in commands.frees {
            self.defer_free(handle);
        }
        for host in commands.host_destroys {
            self.defer_destroy_host(host);
        }
    }

    /// Visit every same-host tuple of the requested component types.
    ///
    /// With `implements` set, a requested type is satisfied by any component
    /// of that type or a descendant; otherwise matching is exact. Handles
    /// arrive in the caller's type order; when a host owns several
    /// components of one requested type, every combination is visited.
    /// Emission order across hosts is unspecified.
    pub fn query_raw(
        &mut self,
        types: &[TypeId],
        implements: bool,
        mut visit: impl FnMut(&mut Commands, HostId, &[RawHandle]),
    ) -> QueryStats {
        let mut stats = QueryStats::default();
        let mut commands = Commands::new();
        self.run_join(types, implements, &mut stats, &mut commands, &mut visit);
        self.apply(commands);
        stats
    }

    fn run_join(
        &self,
        types: &[TypeId],
        implements: bool,
        stats: &mut QueryStats,
        commands: &mut Commands,
        visit: &mut impl FnMut(&mut Commands, HostId, &[RawHandle]),
    ) {
        if types.is_empty() {
            return;
        }
        let manager = self.manager();
        let registry = manager.registry();

        let expand = |type_id: TypeId| -> Vec<TypeId> {
            if implements {
                registry.metadata(type_id).implementing().to_vec()
            } else {
                vec![type_id]
            }
        };

        // World-wide cardinality per requested type. Any empty type means no
        // tuple can exist, so the join never starts.
        let counts: Vec<usize> = types
            .iter()
            .map(|&t| {
                if implements {
                    manager.count_allocated_that_implement(t)
                } else {
                    manager.count_allocated(t)
                }
            })
            .collect();
        if counts.iter().any(|&count| count == 0) {
            return;
        }

        // Visit positions rarest-first; the rarest drives the outer loop.
        let mut order: Vec<usize> = (0..types.len()).collect();
        order.sort_by_key(|&position| counts[position]);

        let rarest = types[order[0]];
        for outer_type in expand(rarest) {
            let outer_pool = manager.pool_dyn(outer_type);
            for slot in outer_pool.live_slots() {
                let Some(host) = outer_pool.host_of(slot) else {
                    continue;
                };
                let Some(outer_handle) = outer_pool.handle_at(slot) else {
                    continue;
                };
                let Some(collection) = self.collection(host) else {
                    continue;
                };

                // Candidate handles per visit position. The outer position
                // is pinned to the current instance so each outer component
                // anchors its own tuples exactly once; the remaining
                // positions walk the host's chains.
                let mut candidates: Vec<Vec<RawHandle>> = Vec::with_capacity(types.len());
                candidates.push(vec![outer_handle]);
                let mut matched = true;
                for &position in &order[1..] {
                    let mut list = Vec::new();
                    for descendant in expand(types[position]) {
                        stats.collection_lookups += 1;
                        let pool = manager.pool_dyn(descendant);
                        let mut cursor = collection.first(descendant);
                        while let Some(index) = cursor {
                            if let Some(handle) = pool.handle_at(index) {
                                list.push(handle);
                            }
                            cursor = pool.next_of(index);
                        }
                    }
                    if list.is_empty() {
                        matched = false;
                        break;
                    }
                    candidates.push(list);
                }
                if !matched {
                    continue;
                }

                // Odometer over the candidate lists. Tuples are rebuilt in
                // the caller's original type order before each visit.
                let mut indices = vec![0usize; candidates.len()];
                'emit: loop {
                    let mut tuple = vec![outer_handle; types.len()];
                    for (nth, &position) in order.iter().enumerate() {
                        tuple[position] = candidates[nth][indices[nth]];
                    }
                    stats.tuples_emitted += 1;
                    visit(commands, host, &tuple);

                    let mut nth = candidates.len() - 1;
                    loop {
                        indices[nth] += 1;
                        if indices[nth] < candidates[nth].len() {
                            continue 'emit;
                        }
                        indices[nth] = 0;
                        if nth == 0 {
                            break 'emit;
                        }
                        nth -= 1;
                    }
                }
            }
        }
    }

    /// Visit every live component of exactly `A`, mutably.
    ///
    /// The typed single-type query; always exact-match, unlike the raw
    /// engine's implements mode.
    pub fn query_components<A: Component>(
        &mut self,
        mut visit: impl FnMut(&mut Commands, HostId, Handle<A>, &mut A),
    ) -> QueryStats {
        let mut stats = QueryStats::default();
        let mut commands = Commands::new();

        let matches: Vec<(HostId, Handle<A>)> = {
            let pool = self.manager().pool::<A>();
            pool.live_slots()
                .filter_map(|slot| Some((pool.host_of(slot)?, pool.typed_at(slot)?)))
                .collect()
        };

        let pool = self.manager_mut().pool_mut::<A>();
        for (host, handle) in matches {
            if let Some(component) = pool.resolve_mut(handle.raw()) {
                stats.tuples_emitted += 1;
                visit(&mut commands, host, handle, component);
            }
        }

        self.apply(commands);
        stats
    }

    /// Visit every same-host pair of exactly `A` and `B`, mutably.
    ///
    /// The rarer type drives the outer loop; the other is satisfied through
    /// the host's collection. Hosts owning several of one type yield every
    /// pair.
    pub fn query_components2<A: Component, B: Component>(
        &mut self,
        mut visit: impl FnMut(&mut Commands, HostId, (Handle<A>, &mut A), (Handle<B>, &mut B)),
    ) -> QueryStats {
        let mut stats = QueryStats::default();
        let mut commands = Commands::new();

        let matches: Vec<(HostId, Handle<A>, Handle<B>)> = {
            let manager = self.manager();
            let type_a = manager.registry().type_id::<A>();
            let type_b = manager.registry().type_id::<B>();
            let pool_a = manager.pool::<A>();
            let pool_b = manager.pool::<B>();

            if pool_a.allocated_count() == 0 || pool_b.allocated_count() == 0 {
                return stats;
            }

            let mut matches = Vec::new();
            if pool_a.allocated_count() <= pool_b.allocated_count() {
                for slot in pool_a.live_slots() {
                    let (Some(host), Some(handle_a)) =
                        (pool_a.host_of(slot), pool_a.typed_at(slot))
                    else {
                        continue;
                    };
                    let Some(collection) = self.collection(host) else {
                        continue;
                    };
                    stats.collection_lookups += 1;
                    for handle_b in chain_handles(pool_b, collection, type_b) {
                        matches.push((host, handle_a, handle_b));
                    }
                }
            } else {
                for slot in pool_b.live_slots() {
                    let (Some(host), Some(handle_b)) =
                        (pool_b.host_of(slot), pool_b.typed_at(slot))
                    else {
                        continue;
                    };
                    let Some(collection) = self.collection(host) else {
                        continue;
                    };
                    stats.collection_lookups += 1;
                    for handle_a in chain_handles(pool_a, collection, type_a) {
                        matches.push((host, handle_a, handle_b));
                    }
                }
            }
            matches
        };

        let (pool_a, pool_b) = self.manager_mut().pool_pair_mut::<A, B>();
        for (host, handle_a, handle_b) in matches {
            let (Some(a), Some(b)) = (
                pool_a.resolve_mut(handle_a.raw()),
                pool_b.resolve_mut(handle_b.raw()),
            ) else {
                continue;
            };
            stats.tuples_emitted += 1;
            visit(&mut commands, host, (handle_a, a), (handle_b, b));
        }

        self.apply(commands);
        stats
    }

    /// Visit every same-host triple of exactly `A`, `B`, and `C`, mutably.
    pub fn query_components3<A: Component, B: Component, C: Component>(
        &mut self,
        mut visit: impl FnMut(
            &mut Commands,
            HostId,
            (Handle<A>, &mut A),
            (Handle<B>, &mut B),
            (Handle<C>, &mut C),
        ),
    ) -> QueryStats {
        let mut stats = QueryStats::default();
        let mut commands = Commands::new();

        let matches: Vec<(HostId, Handle<A>, Handle<B>, Handle<C>)> = {
            let manager = self.manager();
            let type_a = manager.registry().type_id::<A>();
            let type_b = manager.registry().type_id::<B>();
            let type_c = manager.registry().type_id::<C>();
            let pool_a = manager.pool::<A>();
            let pool_b = manager.pool::<B>();
            let pool_c = manager.pool::<C>();

            let count_a = pool_a.allocated_count();
            let count_b = pool_b.allocated_count();
            let count_c = pool_c.allocated_count();
            if count_a == 0 || count_b == 0 || count_c == 0 {
                return stats;
            }

            let mut matches = Vec::new();
            if count_a <= count_b && count_a <= count_c {
                for slot in pool_a.live_slots() {
                    let (Some(host), Some(handle_a)) =
                        (pool_a.host_of(slot), pool_a.typed_at(slot))
                    else {
                        continue;
                    };
                    let Some(collection) = self.collection(host) else {
                        continue;
                    };
                    stats.collection_lookups += 2;
                    let b_handles = chain_handles(pool_b, collection, type_b);
                    let c_handles = chain_handles(pool_c, collection, type_c);
                    for &handle_b in &b_handles {
                        for &handle_c in &c_handles {
                            matches.push((host, handle_a, handle_b, handle_c));
                        }
                    }
                }
            } else if count_b <= count_c {
                for slot in pool_b.live_slots() {
                    let (Some(host), Some(handle_b)) =
                        (pool_b.host_of(slot), pool_b.typed_at(slot))
                    else {
                        continue;
                    };
                    let Some(collection) = self.collection(host) else {
                        continue;
                    };
                    stats.collection_lookups += 2;
                    let a_handles = chain_handles(pool_a, collection, type_a);
                    let c_handles = chain_handles(pool_c, collection, type_c);
                    for &handle_a in &a_handles {
                        for &handle_c in &c_handles {
                            matches.push((host, handle_a, handle_b, handle_c));
                        }
                    }
                }
            } else {
                for slot in pool_c.live_slots() {
                    let (Some(host), Some(handle_c)) =
                        (pool_c.host_of(slot), pool_c.typed_at(slot))
                    else {
                        continue;
                    };
                    let Some(collection) = self.collection(host) else {
                        continue;
                    };
                    stats.collection_lookups += 2;
                    let a_handles = chain_handles(pool_a, collection, type_a);
                    let b_handles = chain_handles(pool_b, collection, type_b);
                    for &handle_a in &a_handles {
                        for &handle_b in &b_handles {
                            matches.push((host, handle_a, handle_b, handle_c));
                        }
                    }
                }
            }
            matches
        };

        let (pool_a, pool_b, pool_c) = self.manager_mut().pool_triple_mut::<A, B, C>();
        for (host, handle_a, handle_b, handle_c) in matches {
            let (Some(a), Some(b), Some(c)) = (
                pool_a.resolve_mut(handle_a.raw()),
                pool_b.resolve_mut(handle_b.raw()),
                pool_c.resolve_mut(handle_c.raw()),
            ) else {
                continue;
            };
            stats.tuples_emitted += 1;
            visit(
                &mut commands,
                host,
                (handle_a, a),
                (handle_b, b),
                (handle_c, c),
            );
        }

        self.apply(commands);
        stats
    }
}

/// Collect the host's whole chain for one exact type, newest first.
fn chain_handles<T: Component>(
    pool: &Pool<T>,
    collection: &ComponentCollection,
    type_id: TypeId,
) -> Vec<Handle<T>> {
    let mut found = Vec::new();
    let mut cursor: Option<SlotIndex> = collection.first(type_id);
    while let Some(index) = cursor {
        if let Some(handle) = pool.typed_at(index) {
            found.push(handle);
        }
        cursor = pool.next_of(index);
    }
    found
}
