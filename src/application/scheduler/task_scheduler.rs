use super::handler::TaskHandler;
use super::retry::RetryPolicy;
use super::task::{Task, TaskOutcome};
use crate::ports::outbound::{LockKey, LockService, TaskJournal, TaskRecord, TaskStatus};
use crate::shared::Result;
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

struct SchedulerState {
    locks: Arc<dyn LockService>,
    journal: Arc<dyn TaskJournal>,
    handler: Arc<dyn TaskHandler>,
    workers: Arc<Semaphore>,
    retry: RetryPolicy,
    /// Delayed and follow-up submissions not yet awaited
    pending: Mutex<Vec<JoinHandle<TaskOutcome>>>,
    /// Keys held by this scheduler; `true` once a rerun was requested
    running: Mutex<HashMap<LockKey, bool>>,
}

/// Runs tasks with at most one execution per lock key.
///
/// A submission whose key is held elsewhere returns
/// [`TaskOutcome::Duplicate`] without running, except for tasks that
/// [rerun when held](Task::reruns_when_held): those return
/// [`TaskOutcome::Deferred`] and run again after the holder. Transient errors
/// are retried with the configured backoff; every outcome is written to the
/// journal.
#[derive(Clone)]
pub struct TaskScheduler {
    state: Arc<SchedulerState>,
}

impl TaskScheduler {
    /// Builds a scheduler and clears locks left behind by crashed holders
    pub fn start(
        locks: Arc<dyn LockService>,
        journal: Arc<dyn TaskJournal>,
        handler: Arc<dyn TaskHandler>,
        workers: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let cleared = locks.clear_all()?;
        if cleared > 0 {
            tracing::warn!(cleared, "cleared stale task locks");
        }
        tracing::debug!(workers, max_retries = retry.max_retries(), "task scheduler started");
        Ok(Self {
            state: Arc::new(SchedulerState {
                locks,
                journal,
                handler,
                workers: Arc::new(Semaphore::new(workers.max(1))),
                retry,
                pending: Mutex::new(Vec::new()),
                running: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Runs one task to completion
    pub async fn submit(&self, task: Task) -> TaskOutcome {
        execute(self.state.clone(), task).await
    }

    /// Queues a task to run after `delay`; its outcome is collected by [`Self::drain`]
    pub fn submit_after(&self, task: Task, delay: Duration) {
        schedule(&self.state, task, delay);
    }

    /// Runs tasks concurrently, bounded by the worker count.
    ///
    /// Outcomes are returned in submission order.
    pub async fn run_all(&self, tasks: Vec<Task>) -> Vec<TaskOutcome> {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|task| tokio::spawn(execute(self.state.clone(), task)))
            .collect();
        collect(handles).await
    }

    /// Waits for every queued and follow-up task, including follow-ups
    /// queued while draining
    pub async fn drain(&self) -> Vec<TaskOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let handles = std::mem::take(&mut *lock(&self.state.pending));
            if handles.is_empty() {
                return outcomes;
            }
            outcomes.extend(collect(handles).await);
        }
    }
}

async fn collect(handles: Vec<JoinHandle<TaskOutcome>>) -> Vec<TaskOutcome> {
    future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| {
            joined.unwrap_or_else(|err| TaskOutcome::Failed {
                error: format!("task did not complete: {}", err),
                attempts: 1,
            })
        })
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn schedule(state: &Arc<SchedulerState>, task: Task, delay: Duration) {
    enqueue(state, task, delay, 0);
}

fn enqueue(state: &Arc<SchedulerState>, task: Task, delay: Duration, deferrals: u32) {
    tracing::debug!(task = %task, delay_secs = delay.as_secs_f64(), deferrals, "queued task");
    let handle = tokio::spawn(execute_after(state.clone(), task, delay, deferrals));
    lock(&state.pending).push(handle);
}

async fn execute_after(
    state: Arc<SchedulerState>,
    task: Task,
    delay: Duration,
    deferrals: u32,
) -> TaskOutcome {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    execute_with(state, task, deferrals).await
}

fn execute(state: Arc<SchedulerState>, task: Task) -> BoxFuture<'static, TaskOutcome> {
    execute_with(state, task, 0)
}

/// Queues a task whose key is held so it runs after the holder.
///
/// A holder inside this scheduler reruns the task when it finishes. A holder
/// in another process is polled with the retry backoff until the retry
/// budget is spent.
fn defer(state: &Arc<SchedulerState>, task: &Task, key: &LockKey, deferrals: u32) -> TaskOutcome {
    if let Some(rerun) = lock(&state.running).get_mut(key) {
        *rerun = true;
        tracing::info!(task = %task, key = %key, "task already running; rerun queued behind it");
        return TaskOutcome::Deferred;
    }
    if deferrals >= state.retry.max_retries() {
        tracing::warn!(task = %task, key = %key, deferrals, "task lock still held elsewhere; dropped");
        return TaskOutcome::Duplicate;
    }
    let delay = state.retry.backoff(deferrals);
    tracing::info!(task = %task, key = %key, delay_ms = delay.as_millis() as u64, "task lock held elsewhere; retrying later");
    enqueue(state, task.clone(), delay, deferrals + 1);
    TaskOutcome::Deferred
}

/// Boxed so follow-up scheduling can spawn this same future type
fn execute_with(
    state: Arc<SchedulerState>,
    task: Task,
    deferrals: u32,
) -> BoxFuture<'static, TaskOutcome> {
    async move {
        let started_at = Utc::now();
        let key = task.lock_key();

        let guard = match state.locks.acquire(&key) {
            Ok(Some(guard)) => guard,
            Ok(None) if task.reruns_when_held() => {
                let outcome = defer(&state, &task, &key, deferrals);
                record(&state, &task, &outcome, started_at);
                return outcome;
            }
            Ok(None) => {
                tracing::info!(task = %task, key = %key, "task already running; skipped as duplicate");
                let outcome = TaskOutcome::Duplicate;
                record(&state, &task, &outcome, started_at);
                return outcome;
            }
            Err(err) => {
                let outcome = TaskOutcome::Failed {
                    error: format!("{:#}", err.context("Failed to acquire task lock")),
                    attempts: 0,
                };
                record(&state, &task, &outcome, started_at);
                return outcome;
            }
        };

        lock(&state.running).insert(key.clone(), false);

        let Ok(permit) = state.workers.clone().acquire_owned().await else {
            lock(&state.running).remove(&key);
            let outcome = TaskOutcome::Failed {
                error: "worker pool is closed".to_string(),
                attempts: 0,
            };
            record(&state, &task, &outcome, started_at);
            return outcome;
        };

        let mut attempts = 0u32;
        let result = loop {
            attempts += 1;
            match state.handler.handle(&task).await {
                Ok(result) => break Ok(result),
                Err(err) if state.retry.should_retry(attempts - 1, &err) => {
                    let delay = state.retry.backoff(attempts - 1);
                    tracing::warn!(
                        task = %task,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => break Err(err),
            }
        };
        drop(permit);
        // Leave the running set before releasing the key, so a submission
        // that still sees the key held polls for it instead.
        let rerun = lock(&state.running).remove(&key).unwrap_or(false);
        drop(guard);
        if rerun {
            schedule(&state, task.clone(), Duration::ZERO);
        }

        let outcome = match result {
            Ok(result) => {
                for follow_up in result.follow_ups {
                    schedule(&state, follow_up.task, follow_up.delay);
                }
                if result.skipped {
                    tracing::info!(task = %task, reason = %result.summary, "task skipped");
                    TaskOutcome::Skipped {
                        reason: result.summary,
                    }
                } else {
                    tracing::info!(task = %task, attempts, summary = %result.summary, "task succeeded");
                    TaskOutcome::Succeeded {
                        summary: result.summary,
                        attempts,
                    }
                }
            }
            Err(err) => {
                tracing::error!(task = %task, attempts, error = %format!("{:#}", err), "task failed");
                TaskOutcome::Failed {
                    error: format!("{:#}", err),
                    attempts,
                }
            }
        };
        record(&state, &task, &outcome, started_at);
        outcome
    }
    .boxed()
}

fn record(state: &SchedulerState, task: &Task, outcome: &TaskOutcome, started_at: DateTime<Utc>) {
    let (status, attempts, detail) = match outcome {
        TaskOutcome::Succeeded { summary, attempts } => (TaskStatus::Succeeded, *attempts, summary.clone()),
        TaskOutcome::Skipped { reason } => (TaskStatus::Skipped, 1, reason.clone()),
        TaskOutcome::Duplicate => (TaskStatus::Duplicate, 0, String::new()),
        TaskOutcome::Deferred => (TaskStatus::Deferred, 0, String::new()),
        TaskOutcome::Failed { error, attempts } => (TaskStatus::Failed, *attempts, error.clone()),
    };
    let entry = TaskRecord {
        task_name: task.name().to_string(),
        arguments: task.canonical_args(),
        lock_key: task.lock_key().to_string(),
        status,
        attempts,
        detail,
        started_at,
        finished_at: Utc::now(),
    };
    if let Err(err) = state.journal.record(&entry) {
        tracing::warn!(task = %task, error = %err, "failed to record task outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::memory::InMemoryLockService;
    use crate::application::scheduler::TaskResult;
    use crate::shared::error::RegistryError;
    use crate::taxonomy::domain::{BuildKey, BuildType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct RecordingJournal {
        records: Mutex<Vec<TaskRecord>>,
    }

    impl TaskJournal for RecordingJournal {
        fn record(&self, record: &TaskRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    /// Fails with a transient error `transient_failures` times, then succeeds.
    /// Ingest tasks queue a materialize follow-up.
    struct FlakyHandler {
        transient_failures: u32,
        calls: AtomicU32,
        hold: Duration,
    }

    impl FlakyHandler {
        fn new(transient_failures: u32) -> Self {
            Self {
                transient_failures,
                calls: AtomicU32::new(0),
                hold: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl TaskHandler for FlakyHandler {
        async fn handle(&self, task: &Task) -> Result<TaskResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.hold.is_zero() {
                tokio::time::sleep(self.hold).await;
            }
            if call < self.transient_failures {
                return Err(RegistryError::SourceUnavailable {
                    details: "collector timed out".to_string(),
                }
                .into());
            }
            match task {
                Task::IngestBuild { key, .. } => Ok(TaskResult::done("ingested")
                    .then(Task::Materialize { key: key.clone() }, Duration::from_millis(5))),
                Task::LoadProducts { .. } => Err(RegistryError::InvalidInput {
                    message: "bad definitions".to_string(),
                }
                .into()),
                _ => Ok(TaskResult::done("ok")),
            }
        }
    }

    fn ingest(id: &str) -> Task {
        Task::IngestBuild {
            key: BuildKey::new(id, BuildType::Brew),
            force: false,
        }
    }

    fn scheduler(
        handler: Arc<FlakyHandler>,
        locks: InMemoryLockService,
        journal: Arc<RecordingJournal>,
    ) -> TaskScheduler {
        let retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4));
        TaskScheduler::start(Arc::new(locks), journal, handler, 2, retry).unwrap()
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let handler = Arc::new(FlakyHandler::new(2));
        let journal = Arc::new(RecordingJournal::default());
        let scheduler = scheduler(handler.clone(), InMemoryLockService::new(), journal.clone());

        let outcome = scheduler
            .submit(Task::Materialize {
                key: BuildKey::new("1", BuildType::Brew),
            })
            .await;
        assert_eq!(
            outcome,
            TaskOutcome::Succeeded {
                summary: "ok".to_string(),
                attempts: 3
            }
        );
        let records = journal.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, TaskStatus::Succeeded);
        assert_eq!(records[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_retries_are_capped_and_permanent_errors_fail_fast() {
        let journal = Arc::new(RecordingJournal::default());
        let flaky = scheduler(Arc::new(FlakyHandler::new(10)), InMemoryLockService::new(), journal.clone());
        let outcome = flaky.submit(ingest("1")).await;
        assert!(matches!(outcome, TaskOutcome::Failed { attempts: 4, .. }));

        let steady = scheduler(Arc::new(FlakyHandler::new(0)), InMemoryLockService::new(), journal);
        let outcome = steady
            .submit(Task::LoadProducts {
                path: "products.yml".into(),
            })
            .await;
        match outcome {
            TaskOutcome::Failed { error, attempts } => {
                assert_eq!(attempts, 1, "not transient: {}", error);
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_held_key_is_a_duplicate() {
        let locks = InMemoryLockService::new();
        let handler = Arc::new(FlakyHandler::new(0));
        let journal = Arc::new(RecordingJournal::default());
        let scheduler = scheduler(handler.clone(), locks.clone(), journal.clone());

        let task = ingest("1");
        let _held = locks.acquire(&task.lock_key()).unwrap().unwrap();
        assert_eq!(scheduler.submit(task).await, TaskOutcome::Duplicate);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(journal.records.lock().unwrap()[0].status, TaskStatus::Duplicate);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_runs_once() {
        let handler = Arc::new(FlakyHandler {
            hold: Duration::from_millis(50),
            ..FlakyHandler::new(0)
        });
        let journal = Arc::new(RecordingJournal::default());
        let locks = InMemoryLockService::new();
        let scheduler = scheduler(handler.clone(), locks.clone(), journal);

        let outcomes = scheduler.run_all(vec![ingest("1"), ingest("1"), ingest("2")]).await;
        let duplicates = outcomes.iter().filter(|o| **o == TaskOutcome::Duplicate).count();
        assert_eq!(duplicates, 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);

        scheduler.drain().await;
        assert_eq!(locks.held_count(), 0, "guards release on completion");
    }

    #[tokio::test]
    async fn test_materialize_behind_a_running_copy_reruns_after_it() {
        let handler = Arc::new(FlakyHandler {
            hold: Duration::from_millis(50),
            ..FlakyHandler::new(0)
        });
        let journal = Arc::new(RecordingJournal::default());
        let locks = InMemoryLockService::new();
        let scheduler = scheduler(handler.clone(), locks.clone(), journal.clone());
        let materialize = Task::Materialize {
            key: BuildKey::new("1", BuildType::Brew),
        };

        let outcomes = scheduler
            .run_all(vec![materialize.clone(), materialize.clone()])
            .await;
        assert_eq!(
            outcomes.iter().filter(|o| **o == TaskOutcome::Deferred).count(),
            1
        );

        let reruns = scheduler.drain().await;
        assert_eq!(
            reruns
                .iter()
                .filter(|o| matches!(o, TaskOutcome::Succeeded { .. }))
                .count(),
            1
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(locks.held_count(), 0);

        let statuses: Vec<TaskStatus> = journal.records.lock().unwrap().iter().map(|r| r.status).collect();
        assert!(statuses.contains(&TaskStatus::Deferred));
        assert_eq!(statuses.iter().filter(|s| **s == TaskStatus::Succeeded).count(), 2);
    }

    #[tokio::test]
    async fn test_materialize_waits_for_a_key_held_elsewhere() {
        let locks = InMemoryLockService::new();
        let handler = Arc::new(FlakyHandler::new(0));
        let retry = RetryPolicy::new(3, Duration::from_millis(40), Duration::from_millis(200));
        let scheduler = TaskScheduler::start(
            Arc::new(locks.clone()),
            Arc::new(RecordingJournal::default()),
            handler.clone(),
            2,
            retry,
        )
        .unwrap();
        let materialize = Task::Materialize {
            key: BuildKey::new("1", BuildType::Brew),
        };

        let held = locks.acquire(&materialize.lock_key()).unwrap().unwrap();
        assert_eq!(scheduler.submit(materialize).await, TaskOutcome::Deferred);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        drop(held);

        let later = scheduler.drain().await;
        assert!(later.iter().any(|o| matches!(o, TaskOutcome::Succeeded { .. })));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_materialize_gives_up_when_key_is_never_released() {
        let locks = InMemoryLockService::new();
        let handler = Arc::new(FlakyHandler::new(0));
        let scheduler = scheduler(handler.clone(), locks.clone(), Arc::new(RecordingJournal::default()));
        let materialize = Task::Materialize {
            key: BuildKey::new("1", BuildType::Brew),
        };

        let _held = locks.acquire(&materialize.lock_key()).unwrap().unwrap();
        assert_eq!(scheduler.submit(materialize).await, TaskOutcome::Deferred);
        let later = scheduler.drain().await;
        assert_eq!(later.last(), Some(&TaskOutcome::Duplicate));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_follow_ups_run_on_drain() {
        let handler = Arc::new(FlakyHandler::new(0));
        let journal = Arc::new(RecordingJournal::default());
        let scheduler = scheduler(handler.clone(), InMemoryLockService::new(), journal.clone());

        scheduler.submit(ingest("7")).await;
        let follow_ups = scheduler.drain().await;
        assert_eq!(follow_ups.len(), 1);
        assert!(matches!(follow_ups[0], TaskOutcome::Succeeded { .. }));

        let names: Vec<String> = journal
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.task_name.clone())
            .collect();
        assert_eq!(names, vec!["ingest_build", "materialize"]);
    }

    #[tokio::test]
    async fn test_start_clears_stale_locks() {
        let locks = InMemoryLockService::new();
        std::mem::forget(locks.acquire(&ingest("1").lock_key()).unwrap());
        assert_eq!(locks.held_count(), 1);

        let handler = Arc::new(FlakyHandler::new(0));
        let scheduler = scheduler(handler, locks.clone(), Arc::new(RecordingJournal::default()));
        assert_eq!(locks.held_count(), 0);
        assert!(matches!(
            scheduler.submit(ingest("1")).await,
            TaskOutcome::Succeeded { .. }
        ));
    }
}
