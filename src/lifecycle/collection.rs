use super::instance::{lock_inner, ProjectInner, TemplateProject};
use super::state::LifecycleState;
use super::teardown::TeardownReport;
use crate::config::HarnessSettings;
use crate::materializer::{MaterializeError, Materializer};
use crate::options::ProjectOptions;
use crate::shared::ids::TemplateId;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Weak};

/// Materializes projects under one root and remembers them, so a test
/// fixture can tear down whatever is still alive when it ends.
///
/// Only weak references are held; dropping a project still tears it down
/// immediately.
#[derive(Debug)]
pub struct ProjectCollection {
    materializer: Materializer,
    root: PathBuf,
    tracked: Mutex<Vec<Weak<Mutex<ProjectInner>>>>,
}

impl ProjectCollection {
    pub fn new(materializer: Materializer, root: impl Into<PathBuf>) -> Self {
        Self {
            materializer,
            root: root.into(),
            tracked: Mutex::new(Vec::new()),
        }
    }

    pub fn from_settings(settings: &HarnessSettings) -> Self {
        Self::new(
            Materializer::from_settings(settings),
            settings.projects_root.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }

    pub fn materialize(
        &self,
        template: &TemplateId,
        options: &ProjectOptions,
    ) -> Result<TemplateProject, MaterializeError> {
        let project = self.materializer.materialize(template, options, &self.root)?;
        let mut tracked = self.lock_tracked();
        tracked.retain(|weak| weak.strong_count() > 0);
        tracked.push(project.tracker());
        Ok(project)
    }

    /// Projects that still exist and have not been torn down.
    pub fn live_count(&self) -> usize {
        self.lock_tracked()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|inner| lock_inner(inner).state() != LifecycleState::TornDown)
            .count()
    }

    /// Tears down every tracked project that is still alive.
    pub fn sweep(&self) -> Vec<TeardownReport> {
        let tracked = std::mem::take(&mut *self.lock_tracked());
        let mut reports = Vec::new();
        for shared in tracked.iter().filter_map(Weak::upgrade) {
            let mut inner = lock_inner(&shared);
            if inner.state() == LifecycleState::TornDown {
                continue;
            }
            reports.push(inner.teardown());
        }
        if !reports.is_empty() {
            tracing::info!(swept = reports.len(), root = %self.root.display(), "swept live projects");
        }
        reports
    }

    fn lock_tracked(&self) -> std::sync::MutexGuard<'_, Vec<Weak<Mutex<ProjectInner>>>> {
        self.tracked
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProjectCollection {
    fn drop(&mut self) {
        self.sweep();
    }
}
