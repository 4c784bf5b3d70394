//! The task state machine.
//!
//! Owns the lifecycle of run-once tasks:
//!
//! ```text
//! Pending ──start──▶ Running ──complete/fail──▶ Completed ──resolve──▶ Resolving ──delete──▶ (gone)
//!    └───────────cancel/fail──────────────────▶ Completed
//! ```
//!
//! Every mutation follows get → validate transition → mutate in memory →
//! compare-and-swap with the version read. A lost CAS is retried once from
//! the get; a second loss surfaces `ResourceConflict`. Side effects (the
//! cell cancel RPC) run strictly after persistence and are best-effort.

use std::sync::{Arc, Mutex};

use berth_core::codec;
use berth_core::keys::TaskRecordKey;
use berth_core::workpool::Throttler;
use berth_core::{Error, Result};

use crate::clients::CellClient;
use crate::gateway::StoreGateway;
use crate::models::{Task, TaskDefinition, TaskFilter, TaskState, TaskTransition};

/// Attempts per mutation: the initial CAS plus one retry from a fresh get.
const CAS_MAX_ATTEMPTS: u32 = 2;

/// Concurrency cap for deserializing task listings.
const TASK_GETTER_MAX_WORKERS: usize = 50;

/// Outcome of a task mutation closure.
enum Mutation<R> {
    /// Persist the mutated record, then return the value.
    Persist(R),
    /// Return without writing.
    Skip(R),
}

/// The authoritative store for run-once tasks.
#[derive(Clone)]
pub struct TaskStore {
    gateway: StoreGateway,
    cells: Arc<dyn CellClient>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("gateway", &self.gateway)
            .field("cells", &"<CellClient>")
            .finish()
    }
}

impl TaskStore {
    /// Creates a task store over the given gateway and cell collaborator.
    #[must_use]
    pub fn new(gateway: StoreGateway, cells: Arc<dyn CellClient>) -> Self {
        Self { gateway, cells }
    }

    /// Creates a new pending task.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when validation fails; `ResourceExists` when a task
    /// with this guid already exists.
    pub async fn desire_task(
        &self,
        task_guid: &str,
        domain: &str,
        definition: TaskDefinition,
    ) -> Result<()> {
        let task = Task::new(task_guid, domain, definition);
        task.validate()?;

        let key = TaskRecordKey::guid(task_guid);
        self.gateway.create(key.as_ref(), &task).await?;

        tracing::info!(task_guid, domain, "desired task");
        Ok(())
    }

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when no task with this guid exists.
    pub async fn task_by_guid(&self, task_guid: &str) -> Result<Task> {
        let key = TaskRecordKey::guid(task_guid);
        let (task, _version) = self.gateway.fetch::<Task>(key.as_ref()).await?;
        Ok(task)
    }

    /// Lists every task passing the filter.
    ///
    /// Deserialization fans out through the work pool; any undecodable
    /// record collapses the whole listing to `Unknown`.
    ///
    /// # Errors
    ///
    /// `Unknown` when a stored record cannot be decoded.
    pub async fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let records = self.gateway.list_raw(TaskRecordKey::dir().as_ref()).await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let throttler = Throttler::new(TASK_GETTER_MAX_WORKERS)?;
        let results = Arc::new(Mutex::new(Vec::new()));

        let works = records.into_iter().map(|record| {
            let results = Arc::clone(&results);
            let filter = filter.clone();
            async move {
                let task: Task = codec::decode(&record.value).map_err(|e| {
                    tracing::error!(key = %record.key, error = %e, "failed to parse task record");
                    Error::unknown(format!("cannot parse task for key {}", record.key))
                })?;

                if filter.matches(&task) {
                    results
                        .lock()
                        .map_err(|_| Error::unknown("task listing lock poisoned"))?
                        .push(task);
                }
                Ok(())
            }
        });

        if let Err(e) = throttler.run(works).await {
            tracing::error!(error = %e, "failed deserializing task records");
            return Err(Error::unknown("failed deserializing task records"));
        }

        let tasks = {
            let mut guard = results
                .lock()
                .map_err(|_| Error::unknown("task listing lock poisoned"))?;
            std::mem::take(&mut *guard)
        };
        Ok(tasks)
    }

    /// Lists every task in the given domain.
    ///
    /// # Errors
    ///
    /// As for [`TaskStore::tasks`].
    pub async fn tasks_by_domain(&self, domain: &str) -> Result<Vec<Task>> {
        self.tasks(&TaskFilter {
            domain: Some(domain.to_string()),
            cell_id: None,
        })
        .await
    }

    /// Lists every task currently placed on the given cell.
    ///
    /// # Errors
    ///
    /// As for [`TaskStore::tasks`].
    pub async fn tasks_by_cell_id(&self, cell_id: &str) -> Result<Vec<Task>> {
        self.tasks(&TaskFilter {
            domain: None,
            cell_id: Some(cell_id.to_string()),
        })
        .await
    }

    /// Places a pending task on a cell.
    ///
    /// Returns `true` when the caller should start execution. A repeated
    /// start from the cell that already owns the task is an idempotent
    /// success returning `false`.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is running on another cell or
    /// already past Running.
    pub async fn start_task(&self, task_guid: &str, cell_id: &str) -> Result<bool> {
        let (_, should_start) = self
            .mutate_task(task_guid, |task| {
                if task.state == TaskState::Running && task.cell_id == cell_id {
                    return Ok(Mutation::Skip(false));
                }

                let next = task
                    .state
                    .transition(TaskTransition::Start)
                    .ok_or_else(|| {
                        Error::invalid_state_transition(task.state, TaskState::Running)
                    })?;

                task.state = next;
                task.cell_id = cell_id.to_string();
                task.touch();
                Ok(Mutation::Persist(true))
            })
            .await?;

        tracing::info!(task_guid, cell_id, should_start, "started task");
        Ok(should_start)
    }

    /// Abandons a pending or running task.
    ///
    /// The task completes as failed with the cancellation reason. When it
    /// was running, the owning cell is told to stop it after persistence
    /// succeeds; that RPC is best-effort.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is already Completed or
    /// Resolving.
    pub async fn cancel_task(&self, task_guid: &str) -> Result<()> {
        let (_, running_cell) = self
            .mutate_task(task_guid, |task| {
                task.state
                    .transition(TaskTransition::Cancel)
                    .ok_or_else(|| {
                        Error::invalid_state_transition(task.state, TaskState::Completed)
                    })?;

                let running_cell =
                    (task.state == TaskState::Running).then(|| task.cell_id.clone());
                task.mark_completed(true, crate::models::TASK_CANCELLED_REASON, "");
                Ok(Mutation::Persist(running_cell))
            })
            .await?;

        tracing::info!(task_guid, "cancelled task");

        if let Some(cell_id) = running_cell {
            if let Err(e) = self.cells.cancel_task(&cell_id, task_guid).await {
                tracing::error!(
                    task_guid,
                    cell_id,
                    error = %e,
                    "failed to cancel task on cell"
                );
            }
        }
        Ok(())
    }

    /// Marks a pending or running task as failed.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is already Completed or
    /// Resolving.
    pub async fn fail_task(&self, task_guid: &str, failure_reason: &str) -> Result<()> {
        self.mutate_task(task_guid, |task| {
            task.state.transition(TaskTransition::Fail).ok_or_else(|| {
                Error::invalid_state_transition(task.state, TaskState::Completed)
            })?;

            task.mark_completed(true, failure_reason, "");
            Ok(Mutation::Persist(()))
        })
        .await?;

        tracing::info!(task_guid, failure_reason, "failed task");
        Ok(())
    }

    /// Records the outcome reported by the executing cell.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is not Running;
    /// `InvalidRequest` when `cell_id` is not the cell the task runs on.
    pub async fn complete_task(
        &self,
        task_guid: &str,
        cell_id: &str,
        failed: bool,
        failure_reason: &str,
        result: &str,
    ) -> Result<()> {
        self.mutate_task(task_guid, |task| {
            task.state
                .transition(TaskTransition::Complete)
                .ok_or_else(|| {
                    Error::invalid_state_transition(task.state, TaskState::Completed)
                })?;

            if task.cell_id != cell_id {
                return Err(Error::invalid_request(format!(
                    "task {task_guid} is running on cell {}, not {cell_id}",
                    task.cell_id
                )));
            }

            task.mark_completed(failed, failure_reason, result);
            Ok(Mutation::Persist(()))
        })
        .await?;

        tracing::info!(task_guid, cell_id, failed, "completed task");
        Ok(())
    }

    /// Claims a completed task's result for resolution.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is not Completed.
    pub async fn resolving_task(&self, task_guid: &str) -> Result<()> {
        self.mutate_task(task_guid, |task| {
            let next = task
                .state
                .transition(TaskTransition::Resolve)
                .ok_or_else(|| {
                    Error::invalid_state_transition(task.state, TaskState::Resolving)
                })?;

            task.state = next;
            task.touch();
            Ok(Mutation::Persist(()))
        })
        .await?;

        tracing::info!(task_guid, "resolving task");
        Ok(())
    }

    /// Removes a resolved task record.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` when the task is not Resolving;
    /// `ResourceNotFound` when no task with this guid exists.
    pub async fn delete_task(&self, task_guid: &str) -> Result<()> {
        let key = TaskRecordKey::guid(task_guid);
        let (task, _version) = self.gateway.fetch::<Task>(key.as_ref()).await?;

        task.state.transition(TaskTransition::Delete).ok_or_else(|| {
            Error::invalid_state_transition(task.state, TaskState::Resolving)
        })?;

        self.gateway.delete(key.as_ref(), false).await?;
        tracing::info!(task_guid, "deleted task");
        Ok(())
    }

    /// Runs one mutation through the get → validate → CAS protocol.
    ///
    /// The closure may run more than once (after a lost CAS it is re-applied
    /// to the freshly read record), so it must be free of side effects.
    async fn mutate_task<R, F>(&self, task_guid: &str, mut mutate: F) -> Result<(Task, R)>
    where
        F: FnMut(&mut Task) -> Result<Mutation<R>>,
    {
        let key = TaskRecordKey::guid(task_guid);

        for attempt in 1..=CAS_MAX_ATTEMPTS {
            let (mut task, version) = self.gateway.fetch::<Task>(key.as_ref()).await?;

            match mutate(&mut task)? {
                Mutation::Skip(value) => return Ok((task, value)),
                Mutation::Persist(value) => {
                    match self
                        .gateway
                        .compare_and_swap(key.as_ref(), &task, &version)
                        .await
                    {
                        Ok(()) => return Ok((task, value)),
                        Err(e) if e.is_conflict() && attempt < CAS_MAX_ATTEMPTS => {
                            // Another writer updated the record between the
                            // get and the swap. Retry from fresh state.
                            tracing::debug!(task_guid, attempt, "task CAS lost the race");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Err(Error::unknown("unreachable: task CAS retry loop exhausted"))
    }
}
