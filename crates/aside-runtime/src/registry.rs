//! Task registry.
//!
//! Task definitions are created and edited by the hosting configuration UI;
//! the engine only reads them. The host replaces the whole set whenever its
//! configuration changes.

use parking_lot::RwLock;

use aside_core::ids::TaskId;
use aside_core::task::{TaskDefinition, TriggerMode};

/// Read-mostly snapshot of the configured task definitions.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<TaskDefinition>>,
}

impl TaskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with a task set.
    #[must_use]
    pub fn with_tasks(tasks: Vec<TaskDefinition>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
        }
    }

    /// Replace the whole task set.
    pub fn replace_all(&self, tasks: Vec<TaskDefinition>) {
        *self.tasks.write() = tasks;
    }

    /// Snapshot of every definition, enabled or not.
    #[must_use]
    pub fn all(&self) -> Vec<TaskDefinition> {
        self.tasks.read().clone()
    }

    /// Snapshot of the enabled definitions.
    #[must_use]
    pub fn enabled(&self) -> Vec<TaskDefinition> {
        self.tasks.read().iter().filter(|t| t.enabled).cloned().collect()
    }

    /// Snapshot of the enabled manual-mode definitions.
    #[must_use]
    pub fn enabled_manual(&self) -> Vec<TaskDefinition> {
        self.tasks
            .read()
            .iter()
            .filter(|t| t.enabled && t.trigger_mode == TriggerMode::Manual)
            .cloned()
            .collect()
    }

    /// Look up one definition by id.
    #[must_use]
    pub fn by_id(&self, id: &TaskId) -> Option<TaskDefinition> {
        self.tasks.read().iter().find(|t| &t.id == id).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aside_core::task::{FormatStyle, ModelConfig, RequestMode, ResponseLocation};

    fn task(id: &str, mode: TriggerMode, enabled: bool) -> TaskDefinition {
        TaskDefinition {
            id: TaskId::from(id),
            name: id.to_uppercase(),
            enabled,
            trigger_mode: mode,
            trigger_config: None,
            request_mode: RequestMode::Standalone,
            response_location: ResponseLocation::SideChannel,
            format_style: FormatStyle::default(),
            model: ModelConfig::default(),
        }
    }

    #[test]
    fn enabled_filters_disabled() {
        let reg = TaskRegistry::with_tasks(vec![
            task("a", TriggerMode::Auto, true),
            task("b", TriggerMode::Auto, false),
        ]);
        let enabled = reg.enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id.as_str(), "a");
        assert_eq!(reg.all().len(), 2);
    }

    #[test]
    fn enabled_manual_filters_mode() {
        let reg = TaskRegistry::with_tasks(vec![
            task("a", TriggerMode::Auto, true),
            task("m", TriggerMode::Manual, true),
            task("m2", TriggerMode::Manual, false),
        ]);
        let manual = reg.enabled_manual();
        assert_eq!(manual.len(), 1);
        assert_eq!(manual[0].id.as_str(), "m");
    }

    #[test]
    fn replace_all_swaps_the_set() {
        let reg = TaskRegistry::with_tasks(vec![task("a", TriggerMode::Auto, true)]);
        reg.replace_all(vec![task("b", TriggerMode::Auto, true)]);
        assert!(reg.by_id(&TaskId::from("a")).is_none());
        assert!(reg.by_id(&TaskId::from("b")).is_some());
    }
}
