// ============================================================================
// domain/resolver.rs - DEPENDENCY RESOLUTION
// ============================================================================
//
// Turns a list of requested module ids into a dependency-complete,
// cycle-free, conflict-free, target-compatible module list in deterministic
// topological order.
//
// Steps:
//   1. Expansion. Every id is looked up in the registry; a missing id fails
//      with `ModuleNotFound` naming the requester, an unsatisfied version
//      range fails with `VersionMismatch`. A module that does not support the
//      target but declares a registered variant for the target's framework is
//      swapped for that variant here, so the variant's own dependencies are
//      expanded too.
//   2. Cycle detection. Three-colour DFS; hitting a grey node reports the
//      whole path (`a -> b -> c -> a`).
//   3. Ordering. Roots in request order, dependencies in ascending id order,
//      post-order emission. Dependencies always precede dependents.
//   4. Target compatibility. `IncompatibleModule` for anything left that does
//      not support the target.
//   5/6. Conflicts (exclusive categories, then explicit declarations).
//      Strict mode reports every colliding id in one `Conflict`.
//
// Steps 1-3 share a single DFS, so resolution is O(V + E). Conflict rules
// are matched through id and category indexes rather than pairwise.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::entities::module::{ConflictRule, ModuleDescriptor};
use crate::domain::entities::resolved::ResolvedModuleSet;
use crate::domain::entities::target::Target;
use crate::domain::error::DomainError;
use crate::domain::registry::ModuleRegistry;
use crate::domain::value_objects::{Category, ModuleId, Strictness};
use crate::domain::warning::Warning;

/// Requester name used for ids that come straight from the request.
pub const REQUEST: &str = "request";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// Resolve `requested` against `registry` for `target`.
pub fn resolve(
    registry: &ModuleRegistry,
    requested: &[ModuleId],
    target: Target,
    strictness: Strictness,
) -> Result<ResolvedModuleSet, DomainError> {
    Resolver::new(registry, target).resolve(requested, strictness)
}

pub struct Resolver<'r> {
    registry: &'r ModuleRegistry,
    target: Target,
}

/// Result of one DFS pass.
struct Closure {
    /// Effective root ids, request order, deduplicated.
    roots: Vec<ModuleId>,
    order: Vec<Arc<ModuleDescriptor>>,
    warnings: Vec<Warning>,
}

struct Walk<'a> {
    colors: HashMap<ModuleId, Color>,
    stack: Vec<ModuleId>,
    order: Vec<Arc<ModuleDescriptor>>,
    warnings: &'a mut Vec<Warning>,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r ModuleRegistry, target: Target) -> Self {
        Self { registry, target }
    }

    pub fn resolve(
        &self,
        requested: &[ModuleId],
        strictness: Strictness,
    ) -> Result<ResolvedModuleSet, DomainError> {
        let closure = self.closure(requested)?;
        self.check_targets(&closure.order)?;

        let conflicts = self.find_conflicts(&closure);
        if conflicts.is_empty() {
            return Ok(ResolvedModuleSet::new(
                self.target,
                closure.order,
                closure.warnings,
            ));
        }

        match strictness {
            Strictness::Strict => Err(merge_conflicts(conflicts)),
            Strictness::Auto => self.auto_resolve(closure, conflicts),
        }
    }

    // ------------------------------------------------------------------------
    // Steps 1-3: expansion, cycle detection, ordering
    // ------------------------------------------------------------------------

    fn closure(&self, requested: &[ModuleId]) -> Result<Closure, DomainError> {
        let mut warnings = Vec::new();
        let mut roots: Vec<Arc<ModuleDescriptor>> = Vec::new();
        for id in requested {
            let found = self.lookup(id, REQUEST)?;
            let effective = self.effective(found, &mut warnings);
            if !roots.iter().any(|r| r.id == effective.id) {
                roots.push(effective);
            }
        }

        let mut walk = Walk {
            colors: HashMap::new(),
            stack: Vec::new(),
            order: Vec::new(),
            warnings: &mut warnings,
        };
        for root in &roots {
            self.visit(Arc::clone(root), &mut walk)?;
        }
        let order = walk.order;

        Ok(Closure {
            roots: roots.iter().map(|r| r.id.clone()).collect(),
            order,
            warnings,
        })
    }

    fn visit(&self, module: Arc<ModuleDescriptor>, walk: &mut Walk<'_>) -> Result<(), DomainError> {
        match walk.colors.get(&module.id) {
            Some(Color::Black) => return Ok(()),
            Some(Color::Gray) => {
                let start = walk
                    .stack
                    .iter()
                    .position(|id| *id == module.id)
                    .unwrap_or(0);
                let mut path: Vec<String> =
                    walk.stack[start..].iter().map(ToString::to_string).collect();
                path.push(module.id.to_string());
                return Err(DomainError::CircularDependency { path });
            }
            None => {}
        }

        walk.colors.insert(module.id.clone(), Color::Gray);
        walk.stack.push(module.id.clone());

        let mut deps: Vec<_> = module.dependencies.iter().collect();
        deps.sort_by(|a, b| a.id.cmp(&b.id));

        for dep in deps {
            let found = self.lookup(&dep.id, module.id.as_str())?;
            if let Some(range) = &dep.range {
                if !range.contains(&found.version) {
                    return Err(DomainError::VersionMismatch {
                        id: dep.id.to_string(),
                        found: found.version.to_string(),
                        required: range.to_string(),
                        requested_by: module.id.to_string(),
                    });
                }
            }
            let effective = self.effective(found, walk.warnings);
            self.visit(effective, walk)?;
        }

        walk.stack.pop();
        walk.colors.insert(module.id.clone(), Color::Black);
        walk.order.push(module);
        Ok(())
    }

    fn lookup(&self, id: &ModuleId, requested_by: &str) -> Result<Arc<ModuleDescriptor>, DomainError> {
        self.registry
            .find(id)
            .cloned()
            .ok_or_else(|| DomainError::ModuleNotFound {
                id: id.to_string(),
                requested_by: requested_by.to_string(),
            })
    }

    /// Swap an unsupported module for its framework variant, if one exists.
    fn effective(
        &self,
        module: Arc<ModuleDescriptor>,
        warnings: &mut Vec<Warning>,
    ) -> Arc<ModuleDescriptor> {
        if module.supports(&self.target) {
            return module;
        }
        let variant = module
            .variants
            .get(&self.target.framework())
            .and_then(|id| self.registry.find(id))
            .filter(|v| v.supports(&self.target));

        match variant {
            Some(variant) => {
                let warning = Warning::VariantSubstituted {
                    original: module.id.to_string(),
                    variant: variant.id.to_string(),
                    target: self.target.to_string(),
                };
                if !warnings.contains(&warning) {
                    warnings.push(warning);
                }
                Arc::clone(variant)
            }
            None => module,
        }
    }

    // ------------------------------------------------------------------------
    // Step 4: target compatibility
    // ------------------------------------------------------------------------

    fn check_targets(&self, order: &[Arc<ModuleDescriptor>]) -> Result<(), DomainError> {
        match order.iter().find(|m| !m.supports(&self.target)) {
            Some(m) => Err(DomainError::IncompatibleModule {
                id: m.id.to_string(),
                target: self.target.to_string(),
            }),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------------
    // Steps 5-6: conflicts
    // ------------------------------------------------------------------------

    /// Every conflict in the closure: category groups first (by category
    /// name), then explicit pairs (in resolution order).
    fn find_conflicts(&self, closure: &Closure) -> Vec<ConflictGroup> {
        let ranks = rank(closure);
        let by_rank = |ids: &mut Vec<Arc<ModuleDescriptor>>| {
            ids.sort_by_key(|m| ranks.get(&m.id).copied().unwrap_or(usize::MAX));
        };

        let mut groups = Vec::new();

        let mut categories: BTreeMap<String, Vec<Arc<ModuleDescriptor>>> = BTreeMap::new();
        for m in &closure.order {
            if let Some(category) = &m.category {
                if !m.compatible_with_siblings {
                    categories
                        .entry(category.to_string())
                        .or_default()
                        .push(Arc::clone(m));
                }
            }
        }
        for (category, mut members) in categories {
            if members.len() > 1 {
                by_rank(&mut members);
                groups.push(ConflictGroup {
                    members,
                    reason: format!("exclusive category '{category}'"),
                });
            }
        }

        for (i, j) in explicit_pairs(&closure.order) {
            let (a, b) = (&closure.order[i], &closure.order[j]);
            let declared_by = if a.conflicts_with(b) { a } else { b };
            let mut members = vec![Arc::clone(a), Arc::clone(b)];
            by_rank(&mut members);
            groups.push(ConflictGroup {
                members,
                reason: format!("conflict declared by '{}'", declared_by.id),
            });
        }

        groups
    }

    /// Settle conflicts one group at a time, pruning and recomputing the
    /// closure after each, until none remain.
    ///
    /// The group with the best winner is settled first, so a conflict between
    /// requested modules is decided before conflicts among their dependencies
    /// (which often disappear once a loser's subtree is pruned).
    fn auto_resolve(
        &self,
        mut closure: Closure,
        mut conflicts: Vec<ConflictGroup>,
    ) -> Result<ResolvedModuleSet, DomainError> {
        let mut resolution_warnings = Vec::new();

        while !conflicts.is_empty() {
            let ranks = rank(&closure);
            let key = |m: &Arc<ModuleDescriptor>| winner_key(&ranks, m);

            let Some(group) = conflicts
                .into_iter()
                .filter_map(|g| {
                    let best = g.members.iter().map(|m| key(m)).min()?;
                    Some((best, g))
                })
                .min_by(|a, b| a.0.cmp(&b.0))
                .map(|(_, g)| g)
            else {
                break;
            };

            let mut members = group.members.clone();
            members.sort_by_key(|m| key(m));
            let (winner, losers) = match members.split_first() {
                Some((w, rest)) => (Arc::clone(w), rest.to_vec()),
                None => break,
            };

            for loser in &losers {
                resolution_warnings.push(Warning::ConflictAutoResolved {
                    winner: winner.id.to_string(),
                    superseded: loser.id.to_string(),
                    reason: group.reason.clone(),
                });
            }

            let retained: Vec<ModuleId> = closure
                .roots
                .iter()
                .filter(|id| !losers.iter().any(|l| l.id == **id))
                .cloned()
                .collect();
            let pruned = self.closure(&retained)?;

            if let Some(still) = pruned
                .order
                .iter()
                .find(|m| losers.iter().any(|l| l.id == m.id))
            {
                let dependent = pruned
                    .order
                    .iter()
                    .find(|m| m.depends_on(&still.id))
                    .map_or_else(|| REQUEST.to_string(), |m| m.id.to_string());
                return Err(DomainError::Conflict {
                    ids: vec![winner.id.to_string(), still.id.to_string()],
                    reason: format!(
                        "'{}' cannot be superseded because '{dependent}' requires it",
                        still.id
                    ),
                });
            }

            closure = pruned;
            conflicts = self.find_conflicts(&closure);
        }

        let mut warnings = closure.warnings;
        warnings.extend(resolution_warnings);
        Ok(ResolvedModuleSet::new(self.target, closure.order, warnings))
    }
}

/// Auto-resolution ordering, smallest wins: request position (every
/// transitive module shares the position after the last requested one), then
/// highest priority, then ascending id.
fn winner_key(
    ranks: &HashMap<ModuleId, usize>,
    m: &Arc<ModuleDescriptor>,
) -> (usize, Reverse<i32>, ModuleId) {
    (
        ranks.get(&m.id).copied().unwrap_or(usize::MAX),
        Reverse(m.priority),
        m.id.clone(),
    )
}

struct ConflictGroup {
    members: Vec<Arc<ModuleDescriptor>>,
    reason: String,
}

/// Fold every group into one error: ids in group order without repeats,
/// reasons joined.
fn merge_conflicts(conflicts: Vec<ConflictGroup>) -> DomainError {
    let mut ids: Vec<String> = Vec::new();
    let mut reasons: Vec<String> = Vec::new();
    for group in conflicts {
        for m in &group.members {
            let id = m.id.to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if !reasons.contains(&group.reason) {
            reasons.push(group.reason);
        }
    }
    if reasons.is_empty() {
        reasons.push("unresolved conflict".into());
    }
    DomainError::Conflict {
        ids,
        reason: reasons.join("; "),
    }
}

/// Index pairs `(i, j)`, `i < j`, of modules in `order` where either side
/// declares a conflict with the other. Rules are looked up by id and by
/// category, so the cost follows the number of rules and hits.
fn explicit_pairs(order: &[Arc<ModuleDescriptor>]) -> BTreeSet<(usize, usize)> {
    let position: HashMap<&ModuleId, usize> =
        order.iter().enumerate().map(|(i, m)| (&m.id, i)).collect();
    let mut by_category: HashMap<&Category, Vec<usize>> = HashMap::new();
    for (i, m) in order.iter().enumerate() {
        if let Some(category) = &m.category {
            by_category.entry(category).or_default().push(i);
        }
    }

    let mut pairs = BTreeSet::new();
    for (i, m) in order.iter().enumerate() {
        for rule in &m.conflicts {
            let hits: &[usize] = match rule {
                ConflictRule::Module(id) => match position.get(id) {
                    Some(j) => std::slice::from_ref(j),
                    None => &[],
                },
                ConflictRule::Category(category) => match by_category.get(category) {
                    Some(members) => members,
                    None => &[],
                },
            };
            for &j in hits {
                if j != i {
                    pairs.insert((i.min(j), i.max(j)));
                }
            }
        }
    }
    pairs
}

/// Request position of every module. Requested modules rank by position;
/// every transitive module shares the next rank.
fn rank(closure: &Closure) -> HashMap<ModuleId, usize> {
    let mut ranks: HashMap<ModuleId, usize> = closure
        .roots
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();
    let transitive = closure.roots.len();
    for m in &closure.order {
        ranks.entry(m.id.clone()).or_insert(transitive);
    }
    ranks
}

/// Every edge `dependent -> dependency` in `set`, for checks and tests.
pub fn edges(set: &ResolvedModuleSet) -> BTreeSet<(String, String)> {
    set.iter()
        .flat_map(|m| {
            m.dependencies
                .iter()
                .filter(|d| set.contains(d.id.as_str()))
                .map(move |d| (m.id.to_string(), d.id.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::module::FileContribution;
    use crate::domain::entities::target::TargetSupport;
    use crate::domain::value_objects::{Archetype, Framework};

    fn web() -> Target {
        Target::new(Framework::WebApp, Archetype::Business)
    }

    fn ids(list: &[&str]) -> Vec<ModuleId> {
        list.iter().map(|s| ModuleId::parse(*s).unwrap()).collect()
    }

    fn m(id: &str, deps: &[&str]) -> ModuleDescriptor {
        deps.iter()
            .fold(ModuleDescriptor::builder(id), |b, d| b.depends_on(*d))
            .file(FileContribution::new(format!("{id}.txt").as_str(), id))
            .build()
            .unwrap()
    }

    fn in_category(id: &str, category: &str, priority: i32) -> ModuleDescriptor {
        ModuleDescriptor::builder(id)
            .category(category)
            .priority(priority)
            .file(FileContribution::new(format!("{id}.txt").as_str(), id))
            .build()
            .unwrap()
    }

    fn registry(mods: Vec<ModuleDescriptor>) -> ModuleRegistry {
        ModuleRegistry::from_descriptors(mods).unwrap()
    }

    fn assert_topological(set: &ResolvedModuleSet) {
        for (dependent, dependency) in edges(set) {
            let d = set.position(&dependent).unwrap();
            let p = set.position(&dependency).unwrap();
            assert!(p < d, "{dependency} must precede {dependent}");
        }
    }

    #[test]
    fn dependencies_precede_dependents() {
        let reg = registry(vec![
            m("app", &["db", "http"]),
            m("db", &["config"]),
            m("http", &["config"]),
            m("config", &[]),
        ]);
        let set = resolve(&reg, &ids(&["app"]), web(), Strictness::Strict).unwrap();
        assert_eq!(set.ids(), ["config", "db", "http", "app"]);
        assert_topological(&set);
    }

    #[test]
    fn order_is_deterministic_for_roots_in_request_order() {
        let reg = registry(vec![m("a", &["z"]), m("b", &[]), m("z", &[])]);
        let set = resolve(&reg, &ids(&["b", "a", "b"]), web(), Strictness::Strict).unwrap();
        assert_eq!(set.ids(), ["b", "z", "a"]);
    }

    #[test]
    fn random_dags_are_topologically_ordered() {
        // Deterministic pseudo-random DAGs: edges only go from higher to lower
        // index, so the graph is acyclic by construction.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };
        for _ in 0..25 {
            let n = 12;
            let mut mods = Vec::new();
            for i in 0..n {
                let deps: Vec<String> = (0..i)
                    .filter(|_| next() % 3 == 0)
                    .map(|j| format!("m{j}"))
                    .collect();
                let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
                mods.push(m(&format!("m{i}"), &dep_refs));
            }
            let reg = registry(mods);
            let roots: Vec<ModuleId> = (0..n)
                .filter(|_| next() % 2 == 0)
                .map(|i| ModuleId::parse(format!("m{i}")).unwrap())
                .collect();
            let set = resolve(&reg, &roots, web(), Strictness::Strict).unwrap();
            assert_topological(&set);
            for root in &roots {
                assert!(set.contains(root.as_str()));
            }
        }
    }

    #[test]
    fn missing_dependency_names_requester() {
        let reg = registry(vec![m("a", &["ghost"])]);
        let err = resolve(&reg, &ids(&["a"]), web(), Strictness::Strict).unwrap_err();
        assert_eq!(
            err,
            DomainError::ModuleNotFound {
                id: "ghost".into(),
                requested_by: "a".into()
            }
        );

        let err = resolve(&reg, &ids(&["nope"]), web(), Strictness::Strict).unwrap_err();
        assert!(matches!(err, DomainError::ModuleNotFound { requested_by, .. } if requested_by == REQUEST));
    }

    #[test]
    fn version_ranges_are_enforced() {
        let reg = registry(vec![m("a", &["lib@^2.0"]), m("lib", &[])]);
        let err = resolve(&reg, &ids(&["a"]), web(), Strictness::Strict).unwrap_err();
        assert!(matches!(err, DomainError::VersionMismatch { ref id, ref found, .. }
            if id == "lib" && found == "1.0.0"));

        let reg = registry(vec![m("a", &["lib@^1.0"]), m("lib", &[])]);
        assert!(resolve(&reg, &ids(&["a"]), web(), Strictness::Strict).is_ok());
    }

    #[test]
    fn cycle_reports_full_path() {
        let reg = registry(vec![m("a", &["b"]), m("b", &["c"]), m("c", &["a"])]);
        let err = resolve(&reg, &ids(&["a"]), web(), Strictness::Strict).unwrap_err();
        assert_eq!(err.to_string(), "circular dependency: a -> b -> c -> a");
    }

    #[test]
    fn cycle_path_excludes_acyclic_prefix() {
        let reg = registry(vec![m("root", &["b"]), m("b", &["c"]), m("c", &["b"])]);
        let err = resolve(&reg, &ids(&["root"]), web(), Strictness::Strict).unwrap_err();
        assert_eq!(
            err,
            DomainError::CircularDependency {
                path: vec!["b".into(), "c".into(), "b".into()]
            }
        );
    }

    #[test]
    fn incompatible_module_is_rejected() {
        let mut mobile = m("push", &[]);
        mobile.support = TargetSupport::frameworks([Framework::Mobile]);
        let reg = registry(vec![mobile]);
        let err = resolve(&reg, &ids(&["push"]), web(), Strictness::Strict).unwrap_err();
        assert_eq!(
            err,
            DomainError::IncompatibleModule {
                id: "push".into(),
                target: "web-app/business".into()
            }
        );
    }

    #[test]
    fn variants_are_substituted_with_warning() {
        let mut mobile = m("storage", &[]);
        mobile.support = TargetSupport::frameworks([Framework::Mobile]);
        mobile
            .variants
            .insert(Framework::WebApp, ModuleId::parse("storage-web").unwrap());
        let mut web_variant = m("storage-web", &["config"]);
        web_variant.support = TargetSupport::frameworks([Framework::WebApp]);
        let reg = registry(vec![mobile, web_variant, m("config", &[]), m("app", &["storage"])]);

        let set = resolve(&reg, &ids(&["app"]), web(), Strictness::Strict).unwrap();
        assert_eq!(set.ids(), ["config", "storage-web", "app"]);
        assert_eq!(set.warnings().len(), 1);
        assert!(matches!(&set.warnings()[0], Warning::VariantSubstituted { original, .. } if original == "storage"));
    }

    #[test]
    fn category_conflict_strict_lists_all_ids() {
        let reg = registry(vec![
            in_category("auth-provider-a", "auth", 0),
            in_category("auth-provider-b", "auth", 0),
        ]);
        let err = resolve(
            &reg,
            &ids(&["auth-provider-a", "auth-provider-b"]),
            web(),
            Strictness::Strict,
        )
        .unwrap_err();
        match err {
            DomainError::Conflict { ids, .. } => {
                assert_eq!(ids, ["auth-provider-a", "auth-provider-b"]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn strict_conflict_lists_every_colliding_group() {
        let reg = registry(vec![
            in_category("auth-a", "auth", 0),
            in_category("auth-b", "auth", 0),
            in_category("store-a", "storage", 0),
            in_category("store-b", "storage", 0),
        ]);
        let err = resolve(
            &reg,
            &ids(&["auth-a", "auth-b", "store-a", "store-b"]),
            web(),
            Strictness::Strict,
        )
        .unwrap_err();
        match err {
            DomainError::Conflict { ids, reason } => {
                assert_eq!(ids, ["auth-a", "auth-b", "store-a", "store-b"]);
                assert!(reason.contains("'auth'"), "{reason}");
                assert!(reason.contains("'storage'"), "{reason}");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn explicit_rules_are_matched_by_id_and_category() {
        let local = ModuleDescriptor::builder("local-cache")
            .category("cache")
            .conflicts_with("category:cache")
            .conflicts_with("missing-module")
            .file(FileContribution::new("local.txt", "l"))
            .build()
            .unwrap();
        let rest = ModuleDescriptor::builder("rest")
            .conflicts_with("graphql")
            .file(FileContribution::new("rest.txt", "r"))
            .build()
            .unwrap();
        let order: Vec<Arc<ModuleDescriptor>> = vec![
            Arc::new(local),
            Arc::new(in_category("redis-cache", "cache", 0)),
            Arc::new(m("graphql", &[])),
            Arc::new(rest),
            Arc::new(in_category("memcached", "cache", 0)),
        ];
        let pairs: Vec<_> = explicit_pairs(&order).into_iter().collect();
        assert_eq!(pairs, [(0, 1), (0, 4), (2, 3)]);
    }

    #[test]
    fn category_conflict_auto_keeps_first_requested() {
        let reg = registry(vec![
            in_category("auth-provider-a", "auth", 0),
            in_category("auth-provider-b", "auth", 10),
        ]);
        let set = resolve(
            &reg,
            &ids(&["auth-provider-b", "auth-provider-a"]),
            web(),
            Strictness::Auto,
        )
        .unwrap();
        assert_eq!(set.ids(), ["auth-provider-b"]);
        assert_eq!(set.warnings().len(), 1);
        assert!(set.warnings()[0].to_string().contains("auth-provider-a"));
    }

    #[test]
    fn transitive_conflicts_use_priority_then_id() {
        let reg = registry(vec![
            m("x", &["cache-a"]),
            m("y", &["cache-b"]),
            in_category("cache-a", "cache", 1),
            in_category("cache-b", "cache", 5),
        ]);
        // Both cache modules are transitive, so priority decides; the loser
        // is still required by root x and cannot be pruned.
        let err = resolve(&reg, &ids(&["x", "y"]), web(), Strictness::Auto).unwrap_err();
        match err {
            DomainError::Conflict { ids, reason } => {
                assert_eq!(ids, ["cache-b", "cache-a"]);
                assert!(reason.contains("'x'"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn dependency_conflicts_vanish_with_pruned_subtree() {
        let reg = registry(vec![
            ModuleDescriptor::builder("auth-a")
                .category("auth")
                .depends_on("session-redis")
                .file(FileContribution::new("a.txt", "a"))
                .build()
                .unwrap(),
            ModuleDescriptor::builder("auth-b")
                .category("auth")
                .depends_on("session-memory")
                .file(FileContribution::new("b.txt", "b"))
                .build()
                .unwrap(),
            in_category("session-redis", "session", 0),
            in_category("session-memory", "session", 9),
        ]);
        let set = resolve(&reg, &ids(&["auth-a", "auth-b"]), web(), Strictness::Auto).unwrap();
        assert_eq!(set.ids(), ["session-redis", "auth-a"]);
        assert_eq!(set.warnings().len(), 1);
    }

    #[test]
    fn superseded_module_still_required_is_an_error() {
        let reg = registry(vec![
            in_category("auth-a", "auth", 0),
            in_category("auth-b", "auth", 0),
            m("admin", &["auth-b"]),
        ]);
        let err = resolve(&reg, &ids(&["auth-a", "admin"]), web(), Strictness::Auto).unwrap_err();
        match err {
            DomainError::Conflict { ids, reason } => {
                assert_eq!(ids, ["auth-a", "auth-b"]);
                assert!(reason.contains("admin"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn pruning_drops_dependencies_only_the_loser_needed() {
        let reg = registry(vec![
            ModuleDescriptor::builder("auth-a")
                .category("auth")
                .depends_on("jwt-lib")
                .file(FileContribution::new("a.txt", "a"))
                .build()
                .unwrap(),
            ModuleDescriptor::builder("auth-b")
                .category("auth")
                .depends_on("oauth-lib")
                .file(FileContribution::new("b.txt", "b"))
                .build()
                .unwrap(),
            m("jwt-lib", &[]),
            m("oauth-lib", &[]),
        ]);
        let set = resolve(&reg, &ids(&["auth-a", "auth-b"]), web(), Strictness::Auto).unwrap();
        assert_eq!(set.ids(), ["jwt-lib", "auth-a"]);
    }

    #[test]
    fn explicit_conflicts() {
        let a = ModuleDescriptor::builder("rest")
            .conflicts_with("graphql")
            .file(FileContribution::new("rest.txt", "r"))
            .build()
            .unwrap();
        let reg = registry(vec![a, m("graphql", &[])]);
        let req = ids(&["graphql", "rest"]);

        let err = resolve(&reg, &req, web(), Strictness::Strict).unwrap_err();
        assert!(matches!(err, DomainError::Conflict { ref ids, .. } if ids == &["graphql", "rest"]));

        let set = resolve(&reg, &req, web(), Strictness::Auto).unwrap();
        assert_eq!(set.ids(), ["graphql"]);
    }

    #[test]
    fn category_conflict_rule() {
        let a = ModuleDescriptor::builder("local-files")
            .conflicts_with("category:storage")
            .file(FileContribution::new("files.txt", "f"))
            .build()
            .unwrap();
        let reg = registry(vec![a, in_category("storage-s3", "storage", 0)]);
        let err = resolve(
            &reg,
            &ids(&["local-files", "storage-s3"]),
            web(),
            Strictness::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));
    }

    #[test]
    fn compatible_siblings_coexist() {
        let mut audit = in_category("auth-audit", "auth", 0);
        audit.compatible_with_siblings = true;
        let reg = registry(vec![in_category("auth-jwt", "auth", 0), audit]);
        let set = resolve(
            &reg,
            &ids(&["auth-jwt", "auth-audit"]),
            web(),
            Strictness::Strict,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.warnings().is_empty());
    }
}
