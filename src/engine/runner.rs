mod diagnostics;

use std::collections::HashSet;
use std::rc::Rc;

use tracing::Level;

use crate::engine::Node;
use crate::error::SchedulerError;

pub use diagnostics::Diagnostics;

/// Forces every node in registration order, returning how many nodes were
/// evaluated by this call.
///
/// There is no scheduling pass: a node that reads another node forces it on
/// the spot, so by the time the loop reaches a dependency it is usually
/// already cached and skipped. The first failure aborts the loop, whatever
/// was evaluated before it stays evaluated.
pub(crate) fn run_all(nodes: &[Rc<Node>]) -> Result<usize, SchedulerError> {
    let span = tracing::span!(Level::INFO, "execute_all", tasks = nodes.len());
    let _enter = span.enter();

    let cached = count_evaluated(nodes);

    for node in nodes {
        if node.is_evaluated() {
            continue;
        }

        prime(nodes, node)?;
        node.force()?;
    }

    // Counted from the nodes themselves, dependencies forced on the way and
    // forward references included.
    let evaluated = count_evaluated(nodes) - cached;
    tracing::info!("{evaluated} tasks evaluated, {cached} already cached");
    Ok(evaluated)
}

fn count_evaluated(nodes: &[Rc<Node>]) -> usize {
    nodes.iter().filter(|node| node.is_evaluated()).count()
}

/// Evaluates the unevaluated upstream of `target`, leaving `target` itself
/// for the caller.
///
/// Walks the dependencies with an explicit stack and forces them in post
/// order, which is the same order recursive evaluation would run them in.
/// Afterwards forcing `target` only goes one level deep, however long the
/// chain behind it is. Cycles and nodes that are already running are left to
/// [`Node::force`], which reports them.
pub(crate) fn prime(nodes: &[Rc<Node>], target: &Rc<Node>) -> Result<(), SchedulerError> {
    if target.is_evaluated() {
        return Ok(());
    }

    let mut path = HashSet::from([target.id]);
    let mut stack = vec![(target.clone(), target.dependencies().into_iter())];

    loop {
        let next = match stack.last_mut() {
            Some((_, dependencies)) => dependencies.next(),
            None => return Ok(()),
        };

        match next {
            Some(id) => {
                let Some(dependency) = nodes.get(id.index()) else {
                    continue;
                };
                if dependency.is_evaluated() {
                    continue;
                }
                if path.contains(&id) || dependency.is_running() {
                    return Ok(());
                }

                path.insert(id);
                stack.push((dependency.clone(), dependency.dependencies().into_iter()));
            }
            None => {
                let Some((node, _)) = stack.pop() else {
                    return Ok(());
                };
                path.remove(&node.id);

                if !stack.is_empty() {
                    node.force()?;
                }
            }
        }
    }
}
