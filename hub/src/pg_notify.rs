use crate::{db::schema::JOB_STATUS_CHANNEL, lifecycle::JobStatus};
use anyhow::Result;
use futures::{future, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{postgres::PgListener, PgPool};
use tokio::sync::mpsc;
use tracing::{debug, error, span, Level};
use uuid::Uuid;

/// Payload published by the `jobs_notify_status` trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusChanged {
    pub id: Uuid,
    pub terminal_id: Uuid,
    pub status: JobStatus,
}

#[derive(Clone)]
pub struct TypedChannel<T> {
    pub channel_name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> TypedChannel<T> {
    pub fn new(channel_name: &str) -> Self {
        Self {
            channel_name: channel_name.to_string(),
            _phantom: std::marker::PhantomData,
        }
    }
}

pub fn job_status_channel() -> TypedChannel<JobStatusChanged> {
    TypedChannel::new(JOB_STATUS_CHANNEL)
}

pub struct PgNotifier<T> {
    notifications: mpsc::UnboundedReceiver<T>,
}

impl<T: DeserializeOwned + Send + 'static> PgNotifier<T> {
    pub async fn new(pool: &PgPool, channel: TypedChannel<T>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut listener = PgListener::connect_with(pool).await?;
        listener.listen(&channel.channel_name).await?;

        let listener_span = span!(
            Level::INFO,
            "pg_listener",
            channel = %channel.channel_name
        );

        tokio::spawn(async move {
            let forward = listener
                .into_stream()
                .filter_map(|message| {
                    let span = span!(parent: &listener_span, Level::DEBUG, "pg_notification");
                    match message {
                        Ok(notification) => {
                            match serde_json::from_str::<T>(notification.payload()) {
                                Ok(data) => future::ready(Some(data)),
                                Err(e) => {
                                    error!(parent: &span, error = %e, "Deserialization error");
                                    future::ready(None)
                                }
                            }
                        }
                        Err(e) => {
                            error!(parent: &span, error = %e, "Error receiving notification");
                            future::ready(None)
                        }
                    }
                })
                .for_each(|t| {
                    let tx = tx.clone();
                    async move {
                        if let Err(e) = tx.send(t) {
                            error!(error = %e, "Failed to forward notification");
                        }
                    }
                });

            // The listener connection is released as soon as the subscriber
            // is dropped, without waiting for another notification.
            tokio::select! {
                _ = forward => {}
                _ = tx.closed() => {
                    debug!(parent: &listener_span, "Subscriber dropped, closing listener");
                }
            }
        });
        Ok(Self { notifications: rx })
    }

    pub fn subscribe(self) -> mpsc::UnboundedReceiver<T> {
        self.notifications
    }
}
