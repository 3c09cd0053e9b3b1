#![allow(dead_code)]

use anyhow::Result;
use futures::future::join_all;
use hub::{
    Document, ErrorKind, Job, JobStatus, JobStore, NewJob, NewTerminal, Terminal,
    TerminalStatus, TerminalStore, RECENT_JOBS_LIMIT,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Serial numbers are unique per call so scenarios can share a database.
pub fn serial(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

pub async fn new_terminal<S: TerminalStore>(store: &S) -> Result<Terminal> {
    Ok(store
        .create_terminal(NewTerminal::new(serial("TERM"), TerminalStatus::Idle))
        .await?)
}

pub async fn running_job<S: TerminalStore + JobStore>(store: &S) -> Result<Job> {
    let terminal = new_terminal(store).await?;
    let job = store
        .create_job(NewJob::new(terminal.id, "diagnostic"))
        .await?;
    store.update_job_status(job.id, JobStatus::Running).await?;
    Ok(store.get_job(job.id).await?)
}

fn assert_newest_first(jobs: &[Job]) {
    assert!(
        jobs.windows(2).all(|w| w[0].created_at >= w[1].created_at),
        "jobs are not ordered newest first"
    );
}

pub async fn diagnostic_lifecycle<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let serial_number = serial("TERM-001");
    let terminal = store
        .create_terminal(NewTerminal::new(&serial_number, TerminalStatus::Idle))
        .await?;
    assert_eq!(terminal.serial_number, serial_number);
    assert_eq!(terminal.status, TerminalStatus::Idle);
    assert_eq!(terminal.last_seen, terminal.created_at);

    let job = store
        .create_job(
            NewJob::new(terminal.id, "diagnostic")
                .with_payload(doc(json!({"level": 2})))
                .with_status(JobStatus::Pending),
        )
        .await?;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.result, None);

    store.update_job_status(job.id, JobStatus::Running).await?;
    let running = store.get_job(job.id).await?;
    assert_eq!(running.status, JobStatus::Running);
    assert!(running.updated_at >= job.updated_at);

    let done = store
        .update_job_result(job.id, JobStatus::Done, Some(doc(json!({"passed": true}))))
        .await?;
    assert_eq!(done.status, JobStatus::Done);

    let fetched = store.get_job(job.id).await?;
    assert_eq!(fetched.status, JobStatus::Done);
    assert_eq!(fetched.result, Some(doc(json!({"passed": true}))));
    assert_eq!(fetched.payload, Some(doc(json!({"level": 2}))));
    assert_eq!(fetched.created_at, job.created_at);

    let err = store
        .update_job_status(job.id, JobStatus::Failed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(store.get_job(job.id).await?.status, JobStatus::Done);
    Ok(())
}

pub async fn creation_assigns_identity<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let terminal = new_terminal(store).await?;
    assert!(!terminal.id.is_nil());

    for status in [JobStatus::Pending, JobStatus::Running] {
        let job = store
            .create_job(NewJob::new(terminal.id, "firmware").with_status(status))
            .await?;
        assert!(!job.id.is_nil());
        assert_eq!(job.terminal_id, terminal.id);
        assert_eq!(job.job_type, "firmware");
        assert_eq!(job.status, status);
        assert_eq!(job.created_at, job.updated_at);
        assert_eq!(store.get_job(job.id).await?, job);
    }
    Ok(())
}

pub async fn references_are_checked<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let err = store
        .create_job(NewJob::new(Uuid::new_v4(), "diagnostic"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTerminal);

    let terminal = new_terminal(store).await?;
    let err = store
        .create_terminal(NewTerminal::new(
            &terminal.serial_number,
            TerminalStatus::Offline,
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateSerial);
    assert!(!err.is_retryable());

    // The original registration is untouched.
    let stored = store.get_terminal(terminal.id).await?;
    assert_eq!(stored.status, TerminalStatus::Idle);
    Ok(())
}

pub async fn missing_entities<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let ghost = Uuid::new_v4();

    let err = store
        .update_job_status(ghost, JobStatus::Running)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = store
        .update_job_result(ghost, JobStatus::Done, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(store.get_job(ghost).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        store.get_terminal(ghost).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        store
            .get_terminal_by_serial(&serial("NOPE"))
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        store
            .record_heartbeat(ghost, TerminalStatus::Idle)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );

    let terminal = new_terminal(store).await?;
    assert!(store.list_jobs_by_terminal(terminal.id).await?.is_empty());
    assert!(store.list_jobs_by_terminal(ghost).await?.is_empty());
    Ok(())
}

pub async fn finished_jobs_are_frozen<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let job = running_job(store).await?;
    let closed = store
        .update_job_result(job.id, JobStatus::Failed, Some(doc(json!({"code": 17}))))
        .await?;

    for status in JobStatus::ALL {
        let err = store.update_job_status(job.id, status).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let err = store
            .update_job_result(job.id, status, Some(doc(json!({"code": 0}))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    let stored = store.get_job(job.id).await?;
    assert_eq!(stored, closed);
    assert_eq!(stored.result, Some(doc(json!({"code": 17}))));
    Ok(())
}

pub async fn illegal_shortcuts_are_rejected<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let terminal = new_terminal(store).await?;
    let job = store
        .create_job(NewJob::new(terminal.id, "diagnostic"))
        .await?;

    // pending cannot skip running
    let err = store
        .update_job_result(job.id, JobStatus::Done, Some(doc(json!({"passed": true}))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    let err = store
        .update_job_status(job.id, JobStatus::Failed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    store.update_job_status(job.id, JobStatus::Running).await?;

    // results only come with a terminal status
    let err = store
        .update_job_result(job.id, JobStatus::Running, Some(doc(json!({"partial": 1}))))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let stored = store.get_job(job.id).await?;
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.result, None);
    Ok(())
}

pub async fn status_only_close_keeps_result_absent<S: TerminalStore + JobStore>(
    store: &S,
) -> Result<()> {
    let job = running_job(store).await?;
    store.update_job_status(job.id, JobStatus::Done).await?;
    let stored = store.get_job(job.id).await?;
    assert_eq!(stored.status, JobStatus::Done);
    assert_eq!(stored.result, None);

    let job = running_job(store).await?;
    let closed = store
        .update_job_result(job.id, JobStatus::Done, Some(Document::new()))
        .await?;
    assert_eq!(closed.result, None);
    Ok(())
}

pub async fn listings_are_newest_first<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let terminal = new_terminal(store).await?;
    let other = new_terminal(store).await?;

    let mut created = Vec::new();
    for i in 0..5 {
        let job = store
            .create_job(NewJob::new(terminal.id, "probe").with_payload(doc(json!({"seq": i}))))
            .await?;
        created.push(job.id);
        store
            .create_job(NewJob::new(other.id, "probe"))
            .await?;
    }

    let jobs = store.list_jobs_by_terminal(terminal.id).await?;
    assert_eq!(jobs.len(), 5);
    assert!(jobs.iter().all(|j| j.terminal_id == terminal.id));
    assert_newest_first(&jobs);
    let listed: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    created.reverse();
    assert_eq!(listed, created);

    let recent = store.list_recent_jobs().await?;
    assert!(recent.len() as i64 <= RECENT_JOBS_LIMIT);
    assert!(recent.len() >= 10);
    assert_newest_first(&recent);
    Ok(())
}

pub async fn racing_status_writes<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let terminal = new_terminal(store).await?;
    let job = store
        .create_job(NewJob::new(terminal.id, "diagnostic"))
        .await?;

    let targets: Vec<JobStatus> = (0..12)
        .map(|i| match i % 3 {
            0 => JobStatus::Running,
            1 => JobStatus::Done,
            _ => JobStatus::Failed,
        })
        .collect();
    let outcomes = join_all(
        targets
            .iter()
            .map(|target| store.update_job_status(job.id, *target)),
    )
    .await;

    let mut applied = Vec::new();
    for (target, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(()) => applied.push(*target),
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidTransition),
        }
    }

    // One claim, then at most one close.
    assert_eq!(
        applied.iter().filter(|s| **s == JobStatus::Running).count(),
        1
    );
    assert!(applied.iter().filter(|s| s.is_terminal()).count() <= 1);

    let stored = store.get_job(job.id).await?;
    assert!(targets.contains(&stored.status));
    let expected = applied
        .iter()
        .copied()
        .find(|s| s.is_terminal())
        .unwrap_or(JobStatus::Running);
    assert_eq!(stored.status, expected);
    Ok(())
}

pub async fn racing_result_writes<S: TerminalStore + JobStore>(store: &S) -> Result<()> {
    let job = running_job(store).await?;

    let writes: Vec<(JobStatus, Document)> = (0..10)
        .map(|i| {
            let status = if i % 2 == 0 {
                JobStatus::Done
            } else {
                JobStatus::Failed
            };
            (status, doc(json!({"attempt": i})))
        })
        .collect();
    let outcomes = join_all(
        writes
            .iter()
            .map(|(status, result)| store.update_job_result(job.id, *status, Some(result.clone()))),
    )
    .await;

    let mut winners = Vec::new();
    for (write, outcome) in writes.iter().zip(outcomes) {
        match outcome {
            Ok(closed) => winners.push((write.clone(), closed)),
            Err(err) => assert_eq!(err.kind(), ErrorKind::InvalidTransition),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one close must win");

    let ((status, result), closed) = winners.remove(0);
    let stored = store.get_job(job.id).await?;
    assert_eq!(stored, closed);
    assert_eq!(stored.status, status);
    assert_eq!(stored.result, Some(result));
    Ok(())
}

pub async fn terminal_records<S: TerminalStore>(store: &S) -> Result<()> {
    let metadata = doc(json!({
        "model": "T-800",
        "firmware": {"version": "1.4.2", "channels": ["stable", "beta"]},
        "slots": 4
    }));
    let terminal = store
        .create_terminal(
            NewTerminal::new(serial("TERM"), TerminalStatus::Idle).with_metadata(metadata.clone()),
        )
        .await?;
    assert_eq!(terminal.metadata, Some(metadata));

    let by_serial = store.get_terminal_by_serial(&terminal.serial_number).await?;
    assert_eq!(by_serial, terminal);

    let beat = store
        .record_heartbeat(terminal.id, TerminalStatus::Running)
        .await?;
    assert_eq!(beat.status, TerminalStatus::Running);
    assert!(beat.last_seen >= terminal.last_seen);
    assert_eq!(beat.created_at, terminal.created_at);
    assert_eq!(beat.id, terminal.id);

    let again = store
        .record_heartbeat(terminal.id, TerminalStatus::Offline)
        .await?;
    assert!(again.last_seen >= beat.last_seen);

    let offline = store
        .list_terminals_by_status(TerminalStatus::Offline)
        .await?;
    assert!(offline.iter().any(|t| t.id == terminal.id));
    assert!(offline.iter().all(|t| t.status == TerminalStatus::Offline));
    assert!(offline
        .windows(2)
        .all(|w| w[0].serial_number <= w[1].serial_number));

    let bare = store
        .create_terminal(
            NewTerminal::new(serial("TERM"), TerminalStatus::Idle).with_metadata(Document::new()),
        )
        .await?;
    assert_eq!(bare.metadata, None);
    Ok(())
}
