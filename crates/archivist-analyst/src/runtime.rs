//! Task execution runtime
//!
//! Tracks every admitted task from arrival to completion. A task id may be
//! queued or executing at most once per analyst; a second dispatch of the
//! same id is rejected with a fault rather than silently replacing the
//! first. Pipelines themselves run synchronously on blocking threads, with
//! concurrency bounded by the executor slot count.

use archivist_cluster::{fault, ClusterFault, TaskKill, TaskResult, TaskStart};
use archivist_core::{
    BulkIngestCommitter, CancelToken, ObjectFileSystem, Pipeline, PipelineContext, PipelineError,
    PipelineSpec, ProcessorRegistry, EXIT_KILLED,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
}

/// One admitted task. Kill requests flip the cancel token; the pipeline
/// observes it cooperatively between stages.
pub struct ClusterProcess {
    task: TaskStart,
    cancel: CancelToken,
    state: Mutex<TaskState>,
}

impl ClusterProcess {
    fn new(task: TaskStart) -> Self {
        Self {
            task,
            cancel: CancelToken::new(),
            state: Mutex::new(TaskState::Queued),
        }
    }

    pub fn task(&self) -> &TaskStart {
        &self.task
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: TaskState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Request cancellation. Returns true only for the first request.
    pub fn kill(&self) -> bool {
        self.cancel.cancel()
    }
}

/// Shared state behind the analyst command port.
pub struct TaskRuntime {
    registry: ProcessorRegistry,
    ofs: Arc<ObjectFileSystem>,
    committer: Arc<BulkIngestCommitter>,
    url_base: String,
    threads: usize,
    processes: Mutex<HashMap<u64, Arc<ClusterProcess>>>,
    slots: Arc<Semaphore>,
}

impl TaskRuntime {
    pub fn new(
        registry: ProcessorRegistry,
        ofs: Arc<ObjectFileSystem>,
        committer: Arc<BulkIngestCommitter>,
        url_base: String,
        threads: usize,
    ) -> Self {
        let threads = threads.max(1);
        Self {
            registry,
            ofs,
            committer,
            url_base,
            threads,
            processes: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(threads)),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Ids of every task currently queued or executing, sorted.
    pub fn running_task_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.lock_processes().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Execute a dispatched task to completion. The entry stays in the
    /// process table for the whole call so concurrent re-dispatch of the
    /// same id faults instead of double-executing.
    pub async fn execute_task(&self, task: TaskStart) -> Result<TaskResult, ClusterFault> {
        let id = task.id;
        let process = self.admit(task)?;
        let result = self.run_admitted(&process).await;
        self.lock_processes().remove(&id);
        result
    }

    /// Request cancellation of one task. Unknown ids are a no-op: the task
    /// already finished or never reached this analyst.
    pub fn kill_task(&self, kill: &TaskKill) -> bool {
        let process = match self.lock_processes().get(&kill.id) {
            Some(process) => Arc::clone(process),
            None => {
                tracing::debug!("kill for unknown task {} ignored", kill.id);
                return false;
            }
        };
        tracing::info!(
            "task {} kill requested by {}: {}",
            kill.id,
            kill.user,
            kill.reason
        );
        process.kill()
    }

    /// Cancel every queued or executing task. Returns how many were
    /// signalled for the first time.
    pub fn kill_all(&self) -> usize {
        let processes: Vec<Arc<ClusterProcess>> =
            self.lock_processes().values().cloned().collect();
        let mut killed = 0;
        for process in processes {
            if process.kill() {
                tracing::info!("task {} killed by kill-all", process.task().id);
                killed += 1;
            }
        }
        killed
    }

    fn admit(&self, task: TaskStart) -> Result<Arc<ClusterProcess>, ClusterFault> {
        let mut processes = self.lock_processes();
        match processes.entry(task.id) {
            Entry::Occupied(_) => Err(ClusterFault {
                code: fault::DUPLICATE_TASK,
                message: format!("task {} is already queued or executing", task.id),
            }),
            Entry::Vacant(slot) => {
                tracing::info!("task {} admitted: {}", task.id, task.name);
                let process = Arc::new(ClusterProcess::new(task));
                slot.insert(Arc::clone(&process));
                Ok(process)
            }
        }
    }

    async fn run_admitted(&self, process: &Arc<ClusterProcess>) -> Result<TaskResult, ClusterFault> {
        let task = process.task();
        let spec = PipelineSpec::from_json(&task.payload).map_err(fault_for)?;
        let pipeline = Pipeline::build(&self.registry, &spec.processors).map_err(fault_for)?;

        // Bound concurrency; the permit is held for the whole run
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|e| internal_fault(&e.to_string()))?;

        if process.cancel.is_cancelled() {
            tracing::info!("task {} killed while queued", task.id);
            return Ok(TaskResult {
                id: task.id,
                exit_status: EXIT_KILLED,
            });
        }
        process.set_state(TaskState::Running);

        let ctx = PipelineContext {
            ofs: Arc::clone(&self.ofs),
            committer: Arc::clone(&self.committer),
            cancel: process.cancel.clone(),
            url_base: self.url_base.clone(),
        };
        let inputs = spec.inputs;
        let id = task.id;
        let exit_status = tokio::task::spawn_blocking(move || pipeline.run(&ctx, &inputs))
            .await
            .map_err(|e| {
                tracing::error!("task {} execution thread failed: {}", id, e);
                internal_fault(&format!("task {id} execution thread failed"))
            })?;

        tracing::info!("task {} finished with exit status {}", id, exit_status);
        Ok(TaskResult { id, exit_status })
    }

    fn lock_processes(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<ClusterProcess>>> {
        self.processes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn fault_for(err: PipelineError) -> ClusterFault {
    match err {
        PipelineError::InvalidPayload(reason) => ClusterFault {
            code: fault::INVALID_PAYLOAD,
            message: reason,
        },
        PipelineError::UnknownProcessor(name) => ClusterFault {
            code: fault::UNKNOWN_PROCESSOR,
            message: format!("unknown processor: {name}"),
        },
        PipelineError::InvalidArgs { name, reason } => ClusterFault {
            code: fault::INVALID_PAYLOAD,
            message: format!("bad args for {name}: {reason}"),
        },
        other => internal_fault(&other.to_string()),
    }
}

fn internal_fault(message: &str) -> ClusterFault {
    ClusterFault {
        code: fault::INTERNAL,
        message: message.to_string(),
    }
}
