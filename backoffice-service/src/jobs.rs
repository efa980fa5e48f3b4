//! In-process job dispatcher.
//!
//! Every back-office operation runs as its own tokio task. Callers get a task
//! id back immediately and read the outcome later through [`JobDispatcher::snapshot`],
//! [`JobDispatcher::wait`] or the frame stream behind the task websocket.
//! Finished results are kept for a fixed retention period and then swept.

use common_observability::BackofficeMetrics;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{BackofficeError, BackofficeResult, JobError};
use crate::store::StoreError;

pub const PROCESSING_FRAME: &str = "Processing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub task_id: Uuid,
    pub job: &'static str,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl JobSnapshot {
    fn pending(task_id: Uuid, job: &'static str) -> Self {
        Self { task_id, job, state: JobState::Pending, result: None, error: None }
    }

    fn failed(task_id: Uuid, job: &'static str, error: JobError) -> Self {
        Self { task_id, job, state: JobState::Failed, result: None, error: Some(error) }
    }

    pub fn is_finished(&self) -> bool {
        self.state != JobState::Pending
    }
}

/// One message on the task progress stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFrame {
    Processing,
    Finished(JobSnapshot),
}

impl TaskFrame {
    pub fn to_text(&self) -> String {
        match self {
            TaskFrame::Processing => PROCESSING_FRAME.to_string(),
            TaskFrame::Finished(snapshot) => serde_json::to_string(snapshot)
                .unwrap_or_else(|e| format!(r#"{{"task_id":"{}","state":"failed","error":{{"code":"serialization_error","message":"{e}"}}}}"#, snapshot.task_id)),
        }
    }
}

struct JobEntry {
    tenant_id: Uuid,
    updates: watch::Receiver<JobSnapshot>,
    finished_at: Option<Instant>,
}

struct Inner {
    jobs: RwLock<HashMap<Uuid, JobEntry>>,
    metrics: Arc<BackofficeMetrics>,
    result_ttl: Duration,
}

#[derive(Clone)]
pub struct JobDispatcher {
    inner: Arc<Inner>,
}

impl JobDispatcher {
    pub fn new(metrics: Arc<BackofficeMetrics>, result_ttl: Duration) -> Self {
        Self { inner: Arc::new(Inner { jobs: RwLock::new(HashMap::new()), metrics, result_ttl }) }
    }

    /// Start `fut` on its own task and return the id its outcome is filed under.
    #[tracing::instrument(skip(self, fut))]
    pub async fn submit<T, F>(&self, tenant_id: Uuid, job: &'static str, fut: F) -> Uuid
    where
        T: Serialize + Send + 'static,
        F: Future<Output = BackofficeResult<T>> + Send + 'static,
    {
        let task_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(JobSnapshot::pending(task_id, job));
        self.inner.jobs.write().await.insert(task_id, JobEntry { tenant_id, updates: rx, finished_at: None });

        let metrics = &self.inner.metrics;
        metrics.jobs_submitted_total.with_label_values(&[job]).inc();
        metrics.jobs_in_flight.inc();
        info!(%task_id, "job submitted");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            // The inner task turns a panicking job into a failed one.
            let snapshot = match tokio::spawn(fut).await {
                Ok(Ok(value)) => match serde_json::to_value(value) {
                    Ok(result) => JobSnapshot {
                        task_id,
                        job,
                        state: JobState::Succeeded,
                        result: Some(result),
                        error: None,
                    },
                    Err(e) => JobSnapshot::failed(
                        task_id,
                        job,
                        JobError { code: "serialization_error".into(), message: e.to_string() },
                    ),
                },
                Ok(Err(err)) => {
                    match &err {
                        BackofficeError::Store(StoreError::Database(db)) => {
                            error!(%task_id, job, error = %db, "job failed on the store")
                        }
                        other => debug!(%task_id, job, code = other.code(), "job rejected"),
                    }
                    JobSnapshot::failed(task_id, job, err.job_error())
                }
                Err(join_err) => {
                    warn!(%task_id, job, error = %join_err, "job aborted");
                    JobSnapshot::failed(
                        task_id,
                        job,
                        JobError { code: "internal_error".into(), message: "job aborted".into() },
                    )
                }
            };

            inner.metrics.job_duration_seconds.observe(started.elapsed().as_secs_f64());
            inner.metrics.jobs_in_flight.dec();
            if snapshot.state == JobState::Failed {
                inner.metrics.jobs_failed_total.with_label_values(&[job]).inc();
            }
            let _ = tx.send(snapshot);
            // Stamped only once the final snapshot is published.
            if let Some(entry) = inner.jobs.write().await.get_mut(&task_id) {
                entry.finished_at = Some(Instant::now());
            }
        });

        task_id
    }

    async fn updates(&self, tenant_id: Uuid, task_id: Uuid) -> Option<watch::Receiver<JobSnapshot>> {
        let jobs = self.inner.jobs.read().await;
        jobs.get(&task_id).filter(|entry| entry.tenant_id == tenant_id).map(|entry| entry.updates.clone())
    }

    /// Current state of a task. Tasks of other tenants are invisible.
    pub async fn snapshot(&self, tenant_id: Uuid, task_id: Uuid) -> Option<JobSnapshot> {
        let updates = self.updates(tenant_id, task_id).await?;
        let snapshot = updates.borrow().clone();
        Some(snapshot)
    }

    /// Resolve once the task has finished.
    pub async fn wait(&self, tenant_id: Uuid, task_id: Uuid) -> Option<JobSnapshot> {
        let mut updates = self.updates(tenant_id, task_id).await?;
        // A closed channel still holds the last snapshot sent.
        let _ = updates.wait_for(JobSnapshot::is_finished).await;
        let snapshot = updates.borrow().clone();
        Some(snapshot)
    }

    /// Stream of progress frames: one [`TaskFrame::Processing`] per `period`
    /// while the task runs, then the final snapshot.
    pub async fn progress_frames(
        &self,
        tenant_id: Uuid,
        task_id: Uuid,
        period: Duration,
    ) -> Option<mpsc::Receiver<TaskFrame>> {
        let mut updates = self.updates(tenant_id, task_id).await?;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                let current = updates.borrow_and_update().clone();
                if current.is_finished() {
                    let _ = tx.send(TaskFrame::Finished(current)).await;
                    break;
                }
                if tx.send(TaskFrame::Processing).await.is_err() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = updates.changed() => {
                        if changed.is_err() {
                            ticker.tick().await;
                        }
                    }
                }
            }
        });
        Some(rx)
    }

    /// Drop finished results older than the retention period.
    pub async fn sweep_expired(&self) -> usize {
        let ttl = self.inner.result_ttl;
        let mut jobs = self.inner.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| entry.finished_at.map_or(true, |at| at.elapsed() < ttl));
        let evicted = before - jobs.len();
        if evicted > 0 {
            self.inner.metrics.jobs_evicted_total.inc_by(evicted as u64);
        }
        evicted
    }

    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = dispatcher.sweep_expired().await;
                if evicted > 0 {
                    debug!(evicted, "expired job results swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Entity;
    use tokio::sync::oneshot;

    fn dispatcher(ttl: Duration) -> (JobDispatcher, Arc<BackofficeMetrics>) {
        let metrics = Arc::new(BackofficeMetrics::new().unwrap());
        (JobDispatcher::new(metrics.clone(), ttl), metrics)
    }

    async fn stamped(jobs: &JobDispatcher, id: Uuid) {
        loop {
            if jobs.inner.jobs.read().await.get(&id).is_some_and(|entry| entry.finished_at.is_some()) {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn successful_job_exposes_result() {
        let (jobs, metrics) = dispatcher(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let id = jobs.submit(tenant, "echo", async { Ok(serde_json::json!({"ok": true})) }).await;
        let done = jobs.wait(tenant, id).await.unwrap();
        assert_eq!(done.state, JobState::Succeeded);
        assert_eq!(done.result, Some(serde_json::json!({"ok": true})));
        assert_eq!(metrics.jobs_submitted_total.with_label_values(&["echo"]).get(), 1);
    }

    #[tokio::test]
    async fn failed_job_carries_error_code() {
        let (jobs, metrics) = dispatcher(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let id = jobs
            .submit(tenant, "lookup", async { Err::<(), _>(BackofficeError::from(StoreError::NotFound(Entity::Seller))) })
            .await;
        let done = jobs.wait(tenant, id).await.unwrap();
        assert_eq!(done.state, JobState::Failed);
        assert_eq!(done.error.unwrap().code, "seller_not_found");
        assert_eq!(metrics.jobs_failed_total.with_label_values(&["lookup"]).get(), 1);
    }

    #[tokio::test]
    async fn panicking_job_is_reported_as_failed() {
        let (jobs, _) = dispatcher(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let id = jobs
            .submit(tenant, "boom", async {
                if true {
                    panic!("boom");
                }
                Ok(())
            })
            .await;
        let done = jobs.wait(tenant, id).await.unwrap();
        assert_eq!(done.state, JobState::Failed);
        assert_eq!(done.error.unwrap().code, "internal_error");
    }

    #[tokio::test]
    async fn tasks_are_private_to_their_tenant() {
        let (jobs, _) = dispatcher(Duration::from_secs(60));
        let id = jobs.submit(Uuid::new_v4(), "echo", async { Ok(1) }).await;
        assert!(jobs.snapshot(Uuid::new_v4(), id).await.is_none());
        assert!(jobs.wait(Uuid::new_v4(), id).await.is_none());
    }

    #[tokio::test]
    async fn sweeper_evicts_finished_results_only() {
        let (jobs, metrics) = dispatcher(Duration::ZERO);
        let tenant = Uuid::new_v4();
        let (release, gate) = oneshot::channel::<()>();
        let running = jobs
            .submit(tenant, "slow", async move {
                let _ = gate.await;
                Ok(())
            })
            .await;
        let done = jobs.submit(tenant, "echo", async { Ok(2) }).await;
        jobs.wait(tenant, done).await.unwrap();
        stamped(&jobs, done).await;

        assert_eq!(jobs.sweep_expired().await, 1);
        assert!(jobs.snapshot(tenant, done).await.is_none());
        assert_eq!(jobs.snapshot(tenant, running).await.unwrap().state, JobState::Pending);
        assert_eq!(metrics.jobs_evicted_total.get(), 1);
        let _ = release.send(());
    }

    #[tokio::test]
    async fn stamped_entries_always_hold_final_snapshot() {
        let (jobs, _) = dispatcher(Duration::ZERO);
        let tenant = Uuid::new_v4();
        let mut ids = Vec::new();
        for n in 0..16 {
            ids.push(jobs.submit(tenant, "echo", async move { Ok(n) }).await);
        }
        loop {
            let mut stamped = 0;
            for entry in jobs.inner.jobs.read().await.values() {
                if entry.finished_at.is_some() {
                    assert!(entry.updates.borrow().is_finished());
                    stamped += 1;
                }
            }
            if stamped == ids.len() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(jobs.sweep_expired().await, ids.len());
    }

    #[tokio::test]
    async fn progress_frames_end_with_snapshot() {
        let (jobs, _) = dispatcher(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let (release, gate) = oneshot::channel::<()>();
        let id = jobs
            .submit(tenant, "slow", async move {
                let _ = gate.await;
                Ok("done")
            })
            .await;
        let mut frames = jobs.progress_frames(tenant, id, Duration::from_millis(10)).await.unwrap();
        assert_eq!(frames.recv().await, Some(TaskFrame::Processing));
        let _ = release.send(());

        let mut last = None;
        while let Some(frame) = frames.recv().await {
            last = Some(frame);
        }
        match last {
            Some(TaskFrame::Finished(snapshot)) => {
                assert_eq!(snapshot.state, JobState::Succeeded);
                assert_eq!(snapshot.result, Some(serde_json::json!("done")));
            }
            other => panic!("unexpected final frame {other:?}"),
        }
    }

    #[test]
    fn frames_render_as_text() {
        assert_eq!(TaskFrame::Processing.to_text(), "Processing...");
        let snap = JobSnapshot::failed(
            Uuid::nil(),
            "echo",
            JobError { code: "invoice_not_found".into(), message: "invoice not found".into() },
        );
        let text = TaskFrame::Finished(snap).to_text();
        assert!(text.contains(r#""state":"failed""#));
        assert!(text.contains("invoice_not_found"));
        assert!(!text.contains("result"));
    }
}
