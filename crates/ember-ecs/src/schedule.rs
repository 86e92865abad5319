//! System scheduling.
//!
//! Systems declare the names of the systems they depend on, and the
//! [`SystemScheduler`] runs them in dependency order using a layered
//! topological sort: each layer contains systems whose dependencies were all
//! satisfied by earlier layers. Within the single-threaded frame model,
//! layers and the systems inside them run sequentially on the calling
//! thread; the layering still pins down a deterministic, dependency-correct
//! order.

use std::collections::{HashMap, VecDeque};

use crate::entity::EntityManager;
use crate::manager::ComponentManager;
use crate::EcsError;

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// A unit of per-frame simulation logic.
///
/// Systems receive both managers side by side each frame and interact with
/// entity state only through them -- never through storage internals.
pub trait System {
    /// Unique name used by other systems' dependency declarations.
    fn name(&self) -> &str;

    /// Names of the systems that must run before this one each frame.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    /// Run one frame step.
    fn run(
        &mut self,
        entities: &mut EntityManager,
        components: &mut ComponentManager,
    ) -> Result<(), EcsError>;
}

// ---------------------------------------------------------------------------
// SystemScheduler
// ---------------------------------------------------------------------------

/// Owns a set of systems and runs them in dependency order.
#[derive(Default)]
pub struct SystemScheduler {
    systems: Vec<Box<dyn System>>,
}

impl SystemScheduler {
    /// Create a scheduler with no systems.
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    /// Add a system.
    ///
    /// # Panics
    ///
    /// Panics if another system with the same name was already added; names
    /// are the dependency key, so a duplicate is a startup misconfiguration.
    pub fn add_system(&mut self, system: Box<dyn System>) {
        if self.systems.iter().any(|s| s.name() == system.name()) {
            panic!("system '{}' is already scheduled", system.name());
        }
        self.systems.push(system);
    }

    /// Number of scheduled systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no systems are scheduled.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Compute execution layers: each layer lists indices (into the
    /// scheduler's system set) whose dependencies were satisfied by earlier
    /// layers.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownSystemDependency`] when a system names a
    /// dependency that was never added, [`EcsError::SystemDependencyCycle`]
    /// when the dependency graph has a cycle.
    pub fn layers(&self) -> Result<Vec<Vec<usize>>, EcsError> {
        let index_of: HashMap<&str, usize> = self
            .systems
            .iter()
            .enumerate()
            .map(|(idx, sys)| (sys.name(), idx))
            .collect();

        let mut in_degree = vec![0usize; self.systems.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.systems.len()];
        for (idx, sys) in self.systems.iter().enumerate() {
            for dep in sys.dependencies() {
                let &dep_idx = index_of.get(dep).ok_or_else(|| {
                    EcsError::UnknownSystemDependency {
                        system: sys.name().to_owned(),
                        dependency: (*dep).to_owned(),
                    }
                })?;
                dependents[dep_idx].push(idx);
                in_degree[idx] += 1;
            }
        }

        let mut ready: VecDeque<usize> = (0..self.systems.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();

        let mut layers = Vec::new();
        let mut resolved = 0;
        while !ready.is_empty() {
            let layer_size = ready.len();
            let mut layer = Vec::with_capacity(layer_size);
            for _ in 0..layer_size {
                let idx = ready.pop_front().expect("layer size was just measured");
                layer.push(idx);
                resolved += 1;
                for &dependent in &dependents[idx] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
            layers.push(layer);
        }

        if resolved != self.systems.len() {
            return Err(EcsError::SystemDependencyCycle);
        }
        Ok(layers)
    }

    /// Run every system once, in dependency order.
    ///
    /// # Errors
    ///
    /// Propagates layering errors and the first error a system returns.
    pub fn run_frame(
        &mut self,
        entities: &mut EntityManager,
        components: &mut ComponentManager,
    ) -> Result<(), EcsError> {
        let layers = self.layers()?;
        for layer in layers {
            for idx in layer {
                self.systems[idx].run(entities, components)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SystemScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemScheduler")
            .field("systems", &self.systems.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
