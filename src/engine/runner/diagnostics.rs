use std::collections::HashMap;
use std::fmt::Write;

use crate::Scheduler;
use crate::core::TaskId;
use crate::engine::TaskExecution;
use crate::graph::escape;

/// Evaluation metrics collected from a [`Scheduler`].
///
/// Returned by [`Scheduler::diagnostics`]. Only tasks that finished
/// successfully have an entry in `execution_times`, `attempts` counts every
/// invocation of a task's callable, failed ones included.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Timing of the evaluation that produced each cached result.
    pub execution_times: HashMap<TaskId, TaskExecution>,
    /// How many times each task's callable has been invoked.
    pub attempts: HashMap<TaskId, u32>,
}

impl Diagnostics {
    pub(crate) fn collect(scheduler: &Scheduler) -> Self {
        let mut diagnostics = Self::default();

        for node in scheduler.nodes().iter() {
            if let Some(execution) = node.execution() {
                diagnostics.execution_times.insert(node.id, execution);
            }
            if node.attempts() > 0 {
                diagnostics.attempts.insert(node.id, node.attempts());
            }
        }

        diagnostics
    }

    /// Renders the task graph as a Mermaid diagram, color-coded by evaluation
    /// duration.
    ///
    /// * **Green**: Fast
    /// * **Yellow**: Moderate
    /// * **Red**: Slow
    /// * **Blue**: Pending (not evaluated)
    pub fn render_mermaid(&self, scheduler: &Scheduler) -> String {
        let mut f = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_mermaid(&mut f, scheduler);
        f
    }

    fn write_mermaid(&self, f: &mut String, scheduler: &Scheduler) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        let (min_time, max_time) = self.time_range();

        for node in scheduler.nodes().iter() {
            let index = node.id.index();
            let name = node.name().replace('"', "\\\"");

            let (label, color) = match self.execution_times.get(&node.id) {
                Some(exec) => {
                    let t = (exec.duration.as_secs_f64() - min_time) / (max_time - min_time);
                    (format!("{:.2?}", exec.duration), heat(t))
                }
                None => ("Pending".to_string(), "#ADD8E6".to_string()),
            };

            writeln!(f, "    {index}[\"{name}\\n{label}\"]")?;
            writeln!(f, "    style {index} fill:{color}")?;
        }

        for node in scheduler.nodes().iter() {
            for dependency in node.dependencies() {
                if let Some(source) = scheduler.nodes().get(dependency.index()) {
                    writeln!(
                        f,
                        "    {} -- \"{}\" --> {}",
                        dependency.index(),
                        escape(source.output_type_name()),
                        node.id.index()
                    )?;
                }
            }
        }

        Ok(())
    }

    fn time_range(&self) -> (f64, f64) {
        let mut min_time = f64::MAX;
        let mut max_time = f64::MIN;

        for t in self.execution_times.values() {
            let secs = t.duration.as_secs_f64();
            min_time = min_time.min(secs);
            max_time = max_time.max(secs);
        }

        if min_time > max_time {
            // nothing ran
            min_time = 0.0;
            max_time = 0.0;
        }

        // all tasks took the same time
        if (max_time - min_time).abs() < f64::EPSILON {
            max_time = min_time + 1.0;
        }

        (min_time, max_time)
    }
}

/// Green (0.0) through yellow (0.5) to red (1.0).
fn heat(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);

    let (r, g, b) = if t < 0.5 {
        ((255.0 * t * 2.0) as u8, 255, 0)
    } else {
        (255, (255.0 * (1.0 - (t - 0.5) * 2.0)) as u8, 0)
    };

    format!("#{r:02X}{g:02X}{b:02X}")
}
