use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::future::Future;

type Compensation = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Ordered undo log for a multi-resource creation. Each completed step
/// registers how to undo itself; on a later failure the undos run newest
/// first. Undo failures are logged and collected, never returned as errors.
pub struct Saga {
    name: String,
    steps: Vec<(String, Compensation)>,
}

#[derive(Debug, Clone, Default)]
pub struct CompensationReport {
    pub compensated: Vec<String>,
    pub errors: Vec<String>,
}

impl Saga {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn on_failure<F, Fut>(&mut self, step: &str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.steps
            .push((step.to_string(), Box::new(move || undo().boxed())));
    }

    pub async fn compensate(self) -> CompensationReport {
        let mut report = CompensationReport::default();
        for (step, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => {
                    debug!("[{}] compensated step '{step}'", self.name);
                    report.compensated.push(step);
                }
                Err(e) => {
                    warn!("[{}] failed to compensate step '{step}': {e:#}", self.name);
                    report.errors.push(format!("{step}: {e:#}"));
                }
            }
        }
        if !report.compensated.is_empty() || !report.errors.is_empty() {
            info!(
                "[{}] rolled back {} step(s), {} compensation failure(s)",
                self.name,
                report.compensated.len(),
                report.errors.len()
            );
        }
        report
    }

    pub fn commit(self) {
        debug!("[{}] committed {} step(s)", self.name, self.steps.len());
    }
}
