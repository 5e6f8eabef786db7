//! Static view of the dependency graph.
//!
//! Evaluation never needs this: tasks pull their dependencies on demand. The
//! graph is built on request, for cycle checks and for rendering.

use petgraph::Graph;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;

use crate::Scheduler;
use crate::core::TaskId;
use crate::error::SchedulerError;

impl Scheduler {
    /// Builds the dependency graph, with an edge from every dependency to the
    /// task reading it.
    ///
    /// Node `i` of the graph is the task with index `i`. Dependencies on ids
    /// that are not registered yet are left out.
    pub fn graph(&self) -> Graph<TaskId, ()> {
        let nodes = self.nodes();
        let mut graph = Graph::with_capacity(nodes.len(), nodes.len());

        for node in nodes.iter() {
            graph.add_node(node.id);
        }

        for node in nodes.iter() {
            for dependency in node.dependencies() {
                if dependency.index() < nodes.len() {
                    graph.add_edge(
                        NodeIndex::new(dependency.index()),
                        NodeIndex::new(node.id.index()),
                        (),
                    );
                }
            }
        }

        graph
    }

    /// Checks the registered tasks for dependency cycles without evaluating
    /// anything.
    ///
    /// Cycles can only be built through [`Scheduler::next_id`], they would
    /// otherwise be reported during evaluation.
    pub fn check_acyclic(&self) -> Result<(), SchedulerError> {
        let graph = self.graph();

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => {
                let id = graph[cycle.node_id()];
                Err(SchedulerError::Cycle {
                    id,
                    name: self.name(id)?,
                })
            }
        }
    }
}

/// Makes a Rust type name safe to use as a Mermaid edge label.
pub(crate) fn escape(type_name: &str) -> String {
    type_name.replace('<', "&lt;").replace('>', "&gt;")
}

impl std::fmt::Display for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        let graph = self.graph();
        let nodes = self.nodes();

        for node in nodes.iter() {
            let name = node.name().replace('"', "\\\"");
            writeln!(f, "    {}[\"{}\"]", node.id.index(), name)?;
        }

        for edge in graph.raw_edges() {
            let (source, target) = (edge.source(), edge.target());
            writeln!(
                f,
                "    {} -- \"{}\" --> {}",
                source.index(),
                escape(nodes[source.index()].output_type_name()),
                target.index()
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_edges() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.add(|| 2.0_f32, ());
        let b = scheduler.add(|| 3.0_f32, ());
        let c = scheduler.add(
            |x: f32, y: f32| x * y,
            (
                scheduler.get_future_result::<f32>(a),
                scheduler.get_future_result::<f32>(b),
            ),
        );

        let graph = scheduler.graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.contains_edge(NodeIndex::new(a.index()), NodeIndex::new(c.index())));
        assert!(graph.contains_edge(NodeIndex::new(b.index()), NodeIndex::new(c.index())));
        assert!(scheduler.check_acyclic().is_ok());
    }

    #[test]
    fn test_graph_skips_unregistered() {
        let mut scheduler = Scheduler::new();
        let ahead = TaskId::new(5);
        scheduler.add(|x: i32| x, (scheduler.get_future_result::<i32>(ahead),));

        assert_eq!(scheduler.graph().edge_count(), 0);
        assert!(scheduler.check_acyclic().is_ok());
    }

    #[test]
    fn test_cycle_detected() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.next_id();
        let b = scheduler.nth_next_id(1);

        let from_b = scheduler.get_future_result::<i32>(b);
        let from_a = scheduler.get_future_result::<i32>(a);
        scheduler.task().name("a").add(|x: i32| x, (from_b,));
        scheduler.task().name("b").add(|x: i32| x, (from_a,));

        assert!(matches!(
            scheduler.check_acyclic(),
            Err(SchedulerError::Cycle { .. })
        ));

        // evaluation trips over the same cycle instead of recursing forever
        assert!(matches!(
            scheduler.get_result::<i32>(a),
            Err(SchedulerError::Cycle { id, .. }) if id == a
        ));
        assert!(!scheduler.is_evaluated(a).unwrap());
        assert!(!scheduler.is_evaluated(b).unwrap());
    }

    #[test]
    fn test_display_mermaid() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.task().name("words").add(|| vec!["a", "b"], ());
        let words = scheduler.get_future_result::<Vec<&'static str>>(a);
        scheduler
            .task()
            .name("count")
            .add(|words: Vec<&'static str>| words.len(), (words,));

        let diagram = scheduler.to_string();
        assert_eq!(
            diagram,
            "graph LR\n    0[\"words\"]\n    1[\"count\"]\n    0 -- \"alloc::vec::Vec&lt;&str&gt;\" --> 1\n"
        );
    }
}
