use futures::future::join_all;
use std::panic::{self, AssertUnwindSafe};
use tokio::runtime::Handle;

use crate::minecraft::error::InstallError;

/// One unit of installation work.
///
/// The executor calls the hooks in a fixed order: `pre_execute`, then every
/// unit returned by `take_dependents` (concurrently), then `execute`, then every
/// unit returned by `take_dependencies` (concurrently). `on_done` runs exactly
/// once afterwards with the overall outcome.
pub trait Task: Send {
    fn name(&self) -> String;

    fn stage(&self) -> Option<&str> {
        None
    }

    fn pre_execute(&mut self) -> Result<(), InstallError> {
        Ok(())
    }

    fn execute(&mut self) -> Result<(), InstallError>;

    /// Units that must finish before `execute` runs.
    fn take_dependents(&mut self) -> Vec<Box<dyn Task>> {
        Vec::new()
    }

    /// Units that must finish before this unit counts as done.
    fn take_dependencies(&mut self) -> Vec<Box<dyn Task>> {
        Vec::new()
    }

    fn on_done(&mut self, _failed: bool) {}
}

/// Tags a unit with the pipeline stage it reports under.
pub struct Staged {
    inner: Box<dyn Task>,
    stage: String,
}

pub fn with_stage(task: Box<dyn Task>, stage: &str) -> Box<dyn Task> {
    Box::new(Staged {
        inner: task,
        stage: stage.to_string(),
    })
}

impl Task for Staged {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn stage(&self) -> Option<&str> {
        Some(&self.stage)
    }

    fn pre_execute(&mut self) -> Result<(), InstallError> {
        self.inner.pre_execute()
    }

    fn execute(&mut self) -> Result<(), InstallError> {
        self.inner.execute()
    }

    fn take_dependents(&mut self) -> Vec<Box<dyn Task>> {
        self.inner.take_dependents()
    }

    fn take_dependencies(&mut self) -> Vec<Box<dyn Task>> {
        self.inner.take_dependencies()
    }

    fn on_done(&mut self, failed: bool) {
        self.inner.on_done(failed)
    }
}

pub struct TaskExecutor;

impl TaskExecutor {
    /// Runs `task` and everything it spawns on the tokio blocking pool.
    pub async fn run(task: Box<dyn Task>) -> Result<(), InstallError> {
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || Self::run_unit(&handle, task))
            .await
            .map_err(|e| InstallError::Join(e.to_string()))?
    }

    fn run_unit(handle: &Handle, mut task: Box<dyn Task>) -> Result<(), InstallError> {
        let name = task.name();
        match task.stage() {
            Some(stage) => log::debug!("Starting task {} [{}]", name, stage),
            None => log::debug!("Starting task {}", name),
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| Self::run_phases(handle, task.as_mut())))
            .unwrap_or_else(|_| Err(InstallError::Join(format!("task {} panicked", name))));

        match &outcome {
            Ok(()) => log::debug!("Task {} finished", name),
            Err(e) => log::warn!("Task {} failed: {}", name, e),
        }
        task.on_done(outcome.is_err());
        outcome
    }

    fn run_phases(handle: &Handle, task: &mut dyn Task) -> Result<(), InstallError> {
        task.pre_execute()?;
        Self::run_all(handle, task.take_dependents())?;
        task.execute()?;
        Self::run_all(handle, task.take_dependencies())
    }

    fn run_all(handle: &Handle, tasks: Vec<Box<dyn Task>>) -> Result<(), InstallError> {
        if tasks.is_empty() {
            return Ok(());
        }

        let units = tasks.into_iter().map(|task| {
            let name = task.name();
            let handle = handle.clone();
            async move {
                let inner = handle.clone();
                let result = tokio::task::spawn_blocking(move || Self::run_unit(&inner, task))
                    .await
                    .map_err(|e| InstallError::Join(e.to_string()))
                    .and_then(|r| r);
                (name, result)
            }
        });

        let results = handle.block_on(join_all(units));
        for (name, result) in results {
            if let Err(source) = result {
                return Err(InstallError::TaskFailed {
                    task: name,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        journal: Journal,
        fail_in_execute: bool,
        dependents: Vec<Box<dyn Task>>,
        dependencies: Vec<Box<dyn Task>>,
    }

    impl Recorder {
        fn new(label: &'static str, journal: &Journal) -> Self {
            Recorder {
                label,
                journal: journal.clone(),
                fail_in_execute: false,
                dependents: Vec::new(),
                dependencies: Vec::new(),
            }
        }

        fn log(&self, event: &str) {
            self.journal.lock().unwrap().push(format!("{}:{}", self.label, event));
        }
    }

    impl Task for Recorder {
        fn name(&self) -> String {
            self.label.to_string()
        }

        fn pre_execute(&mut self) -> Result<(), InstallError> {
            self.log("pre");
            Ok(())
        }

        fn execute(&mut self) -> Result<(), InstallError> {
            self.log("execute");
            if self.fail_in_execute {
                return Err(InstallError::InvalidModpack(self.label.to_string()));
            }
            Ok(())
        }

        fn take_dependents(&mut self) -> Vec<Box<dyn Task>> {
            std::mem::take(&mut self.dependents)
        }

        fn take_dependencies(&mut self) -> Vec<Box<dyn Task>> {
            std::mem::take(&mut self.dependencies)
        }

        fn on_done(&mut self, failed: bool) {
            self.log(if failed { "failed" } else { "done" });
        }
    }

    #[tokio::test]
    async fn phases_run_in_order() {
        let journal: Journal = Arc::default();
        let mut root = Recorder::new("root", &journal);
        root.dependents.push(Box::new(Recorder::new("dependent", &journal)));
        root.dependencies.push(Box::new(Recorder::new("dependency", &journal)));

        TaskExecutor::run(Box::new(root)).await.unwrap();

        let events = journal.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "root:pre",
                "dependent:pre",
                "dependent:execute",
                "dependent:done",
                "root:execute",
                "dependency:pre",
                "dependency:execute",
                "dependency:done",
                "root:done",
            ]
        );
    }

    #[tokio::test]
    async fn failing_dependency_fails_parent_once() {
        let journal: Journal = Arc::default();
        let mut root = Recorder::new("root", &journal);
        let mut broken = Recorder::new("broken", &journal);
        broken.fail_in_execute = true;
        root.dependencies.push(Box::new(broken));

        let err = TaskExecutor::run(Box::new(root)).await.unwrap_err();
        assert!(matches!(err, InstallError::TaskFailed { ref task, .. } if task == "broken"));
        assert!(matches!(err.root_cause(), InstallError::InvalidModpack(_)));

        let events = journal.lock().unwrap().clone();
        assert_eq!(events.iter().filter(|e| e.starts_with("root:failed")).count(), 1);
        assert!(!events.contains(&"root:done".to_string()));
    }

    #[tokio::test]
    async fn staged_units_report_their_stage() {
        let journal: Journal = Arc::default();
        let staged = with_stage(Box::new(Recorder::new("child", &journal)), "modpack");
        assert_eq!(staged.stage(), Some("modpack"));
        assert_eq!(staged.name(), "child");
        TaskExecutor::run(staged).await.unwrap();
    }
}
