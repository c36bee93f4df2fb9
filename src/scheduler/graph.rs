//! Dependency Graph
//!
//! Turns step declarations into a single edge set. Artifact matching
//! (`requires`/`creates`) and explicit ordering (`next`) both end up as
//! producer/consumer pairs inserted through the same path.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::error::{Result, SchedulerError};
use crate::workflow::StepSpec;

/// Immutable dependency graph keyed by step id.
///
/// `dependencies[b]` holds the ids `b` must wait for and `dependents[a]`
/// holds the ids waiting on `a`; the two maps are exact inverses.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<String, StepSpec>,
    dependencies: HashMap<String, HashSet<String>>,
    dependents: HashMap<String, HashSet<String>>,
    /// Ids in declaration order
    order: Vec<String>,
    /// Returned for ids the graph does not know
    empty: HashSet<String>,
}

impl DependencyGraph {
    /// Builds a graph from a list of steps. Shorthand for
    /// [`DependencyGraphBuilder::build`].
    pub fn from_steps(steps: &[StepSpec]) -> Result<Self> {
        DependencyGraphBuilder::new(steps).build()
    }

    /// Returns the declaration of a step.
    pub fn step(&self, id: &str) -> Option<&StepSpec> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Ids this step must wait for.
    pub fn get_dependencies(&self, id: &str) -> &HashSet<String> {
        self.dependencies.get(id).unwrap_or(&self.empty)
    }

    /// Ids waiting on this step.
    pub fn get_dependents(&self, id: &str) -> &HashSet<String> {
        self.dependents.get(id).unwrap_or(&self.empty)
    }

    /// Step ids in declaration order.
    pub fn step_ids(&self) -> &[String] {
        &self.order
    }

    /// Iterates over step declarations in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &StepSpec> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    /// Steps with no dependencies, sorted.
    pub fn root_steps(&self) -> Vec<String> {
        self.sorted_ids_where(|id| self.get_dependencies(id).is_empty())
    }

    /// Steps nothing depends on, sorted.
    pub fn leaf_steps(&self) -> Vec<String> {
        self.sorted_ids_where(|id| self.get_dependents(id).is_empty())
    }

    /// Total number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.dependencies.values().map(HashSet::len).sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn sorted_ids_where(&self, predicate: impl Fn(&str) -> bool) -> Vec<String> {
        let mut ids: Vec<String> = self
            .order
            .iter()
            .filter(|id| predicate(id))
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

/// Builds a [`DependencyGraph`] from an ordered list of steps.
///
/// The builder performs no cycle checking; see
/// [`TopologicalScheduler`](super::TopologicalScheduler) for that.
pub struct DependencyGraphBuilder<'a> {
    steps: &'a [StepSpec],
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(steps: &'a [StepSpec]) -> Self {
        Self { steps }
    }

    /// Builds the graph.
    ///
    /// Fails with [`SchedulerError::Configuration`] on an empty or duplicate
    /// step id. Artifacts nobody creates are treated as externally
    /// satisfied. A `next` naming an unknown step or the step itself adds no
    /// edge; [`TopologicalScheduler::validate_dag`](super::TopologicalScheduler::validate_dag)
    /// reports those.
    pub fn build(self) -> Result<DependencyGraph> {
        let mut nodes: HashMap<String, StepSpec> = HashMap::new();
        let mut order = Vec::with_capacity(self.steps.len());

        for step in self.steps {
            if step.id.trim().is_empty() {
                return Err(SchedulerError::Configuration(
                    "Step has empty or whitespace-only ID".to_string(),
                ));
            }
            if nodes.insert(step.id.clone(), step.clone()).is_some() {
                return Err(SchedulerError::Configuration(format!(
                    "Duplicate step ID: '{}'",
                    step.id
                )));
            }
            order.push(step.id.clone());
        }

        let mut dependencies: HashMap<String, HashSet<String>> = order
            .iter()
            .map(|id| (id.clone(), HashSet::new()))
            .collect();
        let mut dependents = dependencies.clone();

        // artifact -> producers
        let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in self.steps {
            for artifact in &step.creates {
                producers.entry(artifact.as_str()).or_default().push(&step.id);
            }
        }

        let mut edges: Vec<(&str, &str)> = Vec::new();

        for step in self.steps {
            for artifact in &step.requires {
                match producers.get(artifact.as_str()) {
                    Some(list) => {
                        for producer in list.iter().filter(|p| **p != step.id) {
                            edges.push((*producer, step.id.as_str()));
                        }
                    }
                    None => debug!(
                        "Artifact '{}' required by '{}' has no producer; assuming it is provided externally",
                        artifact, step.id
                    ),
                }
            }

            if let Some(next) = &step.next {
                if next == &step.id {
                    warn!("Step '{}' names itself as next; ignoring", step.id);
                } else if !nodes.contains_key(next) {
                    warn!(
                        "Step '{}' names unknown step '{}' as next; ignoring",
                        step.id, next
                    );
                } else {
                    edges.push((step.id.as_str(), next.as_str()));
                }
            }
        }

        for (producer, consumer) in edges {
            add_edge(&mut dependencies, &mut dependents, producer, consumer);
        }

        let graph = DependencyGraph {
            nodes,
            dependencies,
            dependents,
            order,
            empty: HashSet::new(),
        };

        debug!(
            "Built dependency graph: {} steps, {} edges",
            graph.len(),
            graph.edge_count()
        );

        Ok(graph)
    }
}

/// Records that `consumer` waits on `producer`.
fn add_edge(
    dependencies: &mut HashMap<String, HashSet<String>>,
    dependents: &mut HashMap<String, HashSet<String>>,
    producer: &str,
    consumer: &str,
) {
    if let Some(deps) = dependencies.get_mut(consumer) {
        deps.insert(producer.to_string());
    }
    if let Some(waiting) = dependents.get_mut(producer) {
        waiting.insert(consumer.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(set: &HashSet<String>) -> Vec<String> {
        let mut ids: Vec<_> = set.iter().cloned().collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_artifact_edges() {
        let steps = vec![
            StepSpec::new("step1", "analyst", "collect").creates("req"),
            StepSpec::new("step2", "architect", "plan")
                .requires("req")
                .creates("plan"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();

        assert_eq!(sorted(graph.get_dependencies("step2")), vec!["step1"]);
        assert_eq!(sorted(graph.get_dependents("step1")), vec!["step2"]);
        assert!(graph.get_dependencies("step1").is_empty());
    }

    #[test]
    fn test_next_adds_edge() {
        let steps = vec![
            StepSpec::new("a", "dev", "code").then("b"),
            StepSpec::new("b", "reviewer", "review"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();

        assert_eq!(sorted(graph.get_dependencies("b")), vec!["a"]);
        assert_eq!(sorted(graph.get_dependents("a")), vec!["b"]);
    }

    #[test]
    fn test_unknown_next_is_ignored() {
        let steps = vec![StepSpec::new("a", "dev", "code").then("ghost")];
        let graph = DependencyGraph::from_steps(&steps).unwrap();

        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.contains("ghost"));
    }

    #[test]
    fn test_self_next_is_ignored() {
        let steps = vec![StepSpec::new("a", "dev", "code").then("a")];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert!(graph.get_dependencies("a").is_empty());
    }

    #[test]
    fn test_self_produced_artifact_adds_no_edge() {
        let steps = vec![StepSpec::new("a", "dev", "code")
            .requires("cache")
            .creates("cache")];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_unproduced_artifact_is_external() {
        let steps = vec![StepSpec::new("a", "dev", "code").requires("repo_checkout")];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert!(graph.get_dependencies("a").is_empty());
        assert_eq!(graph.root_steps(), vec!["a"]);
    }

    #[test]
    fn test_multiple_producers() {
        let steps = vec![
            StepSpec::new("p1", "dev", "code").creates("module"),
            StepSpec::new("p2", "dev", "code").creates("module"),
            StepSpec::new("c", "tester", "test").requires("module"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert_eq!(sorted(graph.get_dependencies("c")), vec!["p1", "p2"]);
    }

    #[test]
    fn test_artifact_and_next_share_edge() {
        let steps = vec![
            StepSpec::new("a", "dev", "code").creates("x").then("b"),
            StepSpec::new("b", "dev", "test").requires("x"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_dependencies_and_dependents_are_inverse() {
        let steps = vec![
            StepSpec::new("s1", "a", "x").creates("req"),
            StepSpec::new("s2a", "a", "x").requires("req").creates("plan1"),
            StepSpec::new("s2b", "a", "x").requires("req").creates("design"),
            StepSpec::new("s3", "a", "x").requires("plan1").requires("design").then("s4"),
            StepSpec::new("s4", "a", "x"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();

        for id in graph.step_ids() {
            for dep in graph.get_dependencies(id) {
                assert!(graph.get_dependents(dep).contains(id));
            }
            for waiting in graph.get_dependents(id) {
                assert!(graph.get_dependencies(waiting).contains(id));
            }
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let steps = vec![
            StepSpec::new("same", "dev", "code"),
            StepSpec::new("same", "dev", "test"),
        ];
        let result = DependencyGraph::from_steps(&steps);
        assert!(matches!(result, Err(SchedulerError::Configuration(_))));
    }

    #[test]
    fn test_empty_id_rejected() {
        let steps = vec![StepSpec::new("  ", "dev", "code")];
        assert!(DependencyGraph::from_steps(&steps).is_err());
    }

    #[test]
    fn test_build_is_deterministic() {
        let steps = vec![
            StepSpec::new("b", "dev", "code").requires("x"),
            StepSpec::new("a", "dev", "code").creates("x"),
            StepSpec::new("c", "dev", "code").requires("x"),
        ];
        let first = DependencyGraph::from_steps(&steps).unwrap();
        let second = DependencyGraph::from_steps(&steps).unwrap();

        for id in first.step_ids() {
            assert_eq!(first.get_dependencies(id), second.get_dependencies(id));
            assert_eq!(first.get_dependents(id), second.get_dependents(id));
        }
        assert_eq!(first.step_ids(), &["b", "a", "c"]);
    }

    #[test]
    fn test_root_and_leaf_steps() {
        let steps = vec![
            StepSpec::new("root", "a", "x").creates("r"),
            StepSpec::new("leaf", "a", "x").requires("r"),
        ];
        let graph = DependencyGraph::from_steps(&steps).unwrap();
        assert_eq!(graph.root_steps(), vec!["root"]);
        assert_eq!(graph.leaf_steps(), vec!["leaf"]);
    }

    #[test]
    fn test_unknown_id_queries_are_empty() {
        let graph = DependencyGraph::from_steps(&[]).unwrap();
        assert!(graph.is_empty());
        assert!(graph.get_dependencies("nope").is_empty());
        assert!(graph.get_dependents("nope").is_empty());
    }
}
