use crate::merge::consumer::WriteError;
use camino::Utf8Path;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Fans out per-item output work and joins it before the pass ends.
///
/// Every task is spawned immediately and queues on a semaphore, so at most
/// `max_concurrent` run at once. No ordering between tasks is guaranteed.
#[derive(Debug)]
pub struct TaskCoordinator {
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<(), WriteError>>,
}

impl TaskCoordinator {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: JoinSet::new(),
        }
    }

    pub fn spawn<F>(&mut self, handle: &Handle, work: F)
    where
        F: Future<Output = Result<(), WriteError>> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn_on(
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| WriteError::Task(e.to_string()))?;
                work.await
            },
            handle,
        );
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every spawned task, including after a failure.
    ///
    /// Returns the number of successful tasks, or the first failure once all
    /// tasks have finished. A panicking task counts as a failure.
    pub async fn join_all(&mut self) -> Result<usize, Vec<WriteError>> {
        let mut completed = 0;
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => completed += 1,
                Ok(Err(e)) => {
                    tracing::error!("Output task failed: {}", e);
                    failures.push(e);
                }
                Err(e) => {
                    tracing::error!("Output task join error: {}", e);
                    failures.push(WriteError::Task(e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(completed)
        } else {
            Err(failures)
        }
    }
}

impl Default for TaskCoordinator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Creates output directories one caller at a time.
///
/// Concurrent tasks writing into the same folder both ask for it; the check
/// and the creation happen under one lock so only one of them creates it.
#[derive(Debug, Default)]
pub struct DirCreator {
    lock: Mutex<()>,
}

impl DirCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ensure(&self, folder: &Utf8Path) -> Result<(), WriteError> {
        let _guard = self.lock.lock().await;
        if tokio::fs::metadata(folder).await.is_ok_and(|m| m.is_dir()) {
            return Ok(());
        }
        tokio::fs::create_dir_all(folder)
            .await
            .map_err(|source| WriteError::CreateDir {
                path: folder.to_path_buf(),
                source,
            })?;
        tracing::debug!("Created output folder {}", folder);
        Ok(())
    }
}
