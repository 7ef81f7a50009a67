//! Action executor.
//!
//! Performs the I/O behind [`SessionAction`]s. Every transport call runs on
//! its own task and reports back by posting a [`SessionEvent::Completed`]
//! tagged with the connection it ran against, so the dispatch loop never
//! blocks on the network and results from retired connections are recognised
//! as stale.

use std::{future::Future, sync::Arc};

use parley_core::{
    ConnectParams, ConnectionId, Connector, Environment, EventSink, TransportClient,
    TransportError,
};
use tokio::sync::mpsc;

use crate::{
    config::ClientConfig,
    event::{Completion, Notification, SendRoute, SessionAction, SessionEvent},
    registry::ConnectionRegistry,
};

/// Executes session actions against transport client instances.
pub struct ActionExecutor<C: Connector, E: Environment> {
    connector: C,
    env: E,
    config: ClientConfig,
    registry: ConnectionRegistry<C::Client>,
    events: mpsc::WeakUnboundedSender<SessionEvent>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl<C: Connector, E: Environment> ActionExecutor<C, E> {
    /// Create an executor posting completions to `events`.
    pub fn new(
        connector: C,
        env: E,
        config: ClientConfig,
        events: mpsc::WeakUnboundedSender<SessionEvent>,
        notifications: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        Self { connector, env, config, registry: ConnectionRegistry::new(), events, notifications }
    }

    /// Execute one action. Never blocks on the network.
    pub fn execute(&mut self, action: SessionAction) {
        match action {
            SessionAction::Connect { conn, identity } => {
                let params = ConnectParams {
                    server_url: self.config.server_url.clone(),
                    identity,
                    platform: self.config.platform.clone(),
                    language: self.config.language.clone(),
                };
                let client = Arc::new(self.connector.build(params, self.sink(conn)));
                self.registry.insert(conn, Arc::clone(&client));

                tracing::debug!(%conn, "connecting");
                self.spawn(conn, async move { client.connect().await.err().map(Completion::ConnectFailed) });
            },
            SessionAction::Disconnect { conn } => self.disconnect(conn),
            SessionAction::JoinChannel { conn, channel } => {
                let client = self.registry.get(conn);
                self.spawn(conn, async move {
                    let result = match client {
                        Some(client) => client.join_channel(&channel).await,
                        None => Err(TransportError::NotConnected),
                    };
                    Some(Completion::ChannelJoined { channel, result })
                });
            },
            SessionAction::Leave { conn, scope } => {
                let Some(client) = self.registry.get(conn) else {
                    tracing::debug!(%conn, "leave for unknown connection");
                    return;
                };
                self.spawn(conn, async move {
                    if let Err(e) = client.leave(&scope).await {
                        tracing::warn!(%conn, %scope, error = %e, "leave failed");
                    }
                    None
                });
            },
            SessionAction::FetchHistory { conn, channel } => {
                let client = self.registry.get(conn);
                self.spawn(conn, async move {
                    let result = match client {
                        Some(client) => client.fetch_history(&channel).await,
                        None => Err(TransportError::NotConnected),
                    };
                    Some(Completion::HistoryFetched { channel, result })
                });
            },
            SessionAction::FetchTicket { conn, ticket_id } => {
                let client = self.registry.get(conn);
                self.spawn(conn, async move {
                    let result = match client {
                        Some(client) => client.get_ticket(&ticket_id).await,
                        None => Err(TransportError::NotConnected),
                    };
                    Some(Completion::TicketFetched { ticket_id, result })
                });
            },
            SessionAction::CreateTicket { conn, ticket } => {
                let client = self.registry.get(conn);
                self.spawn(conn, async move {
                    let result = match client {
                        Some(client) => client.create_ticket(&ticket.topic, &ticket.description).await,
                        None => Err(TransportError::NotConnected),
                    };
                    Some(Completion::TicketCreated(result))
                });
            },
            SessionAction::Send { conn, request } => {
                let client = self.registry.get(conn);
                self.spawn(conn, async move {
                    let result = match (client, &request.route) {
                        (None, _) => Err(TransportError::NotConnected),
                        (Some(client), SendRoute::Channel { channel, content }) => {
                            client.send_broadcast(content, channel).await
                        },
                        (Some(client), SendRoute::Whisper { recipient, content }) => {
                            client.send_whisper(content, recipient).await
                        },
                        (Some(client), SendRoute::Ticket { ticket_id, content }) => {
                            client.send_ticket_message(ticket_id, content).await
                        },
                    };
                    Some(Completion::SendCompleted { request: request.id, result })
                });
            },
            SessionAction::FocusInput => {},
            SessionAction::Notify(notification) => {
                if self.notifications.send(notification).is_err() {
                    tracing::debug!("notification receiver dropped");
                }
            },
        }
    }

    /// Retire `conn`. The disconnect runs in the background, bounded by the
    /// configured timeout; its outcome is only logged.
    fn disconnect(&mut self, conn: ConnectionId) {
        let Some(client) = self.registry.remove(conn) else {
            tracing::debug!(%conn, "disconnect for unknown connection");
            return;
        };

        let env = self.env.clone();
        let timeout = self.config.disconnect_timeout;
        tokio::spawn(async move {
            tokio::select! {
                result = client.disconnect() => match result {
                    Ok(()) => tracing::debug!(%conn, "disconnected"),
                    Err(e) => tracing::warn!(%conn, error = %e, "disconnect failed"),
                },
                () = env.sleep(timeout) => {
                    tracing::warn!(%conn, timeout_ms = timeout.as_millis(), "disconnect timed out");
                },
            }
        });
    }

    /// Event sink for a new instance. Holds only a weak reference so live
    /// instances do not keep the driver alive.
    fn sink(&self, conn: ConnectionId) -> EventSink {
        let events = self.events.clone();
        EventSink::new(conn, move |conn, event| {
            events
                .upgrade()
                .is_some_and(|tx| tx.send(SessionEvent::Transport { conn, event }).is_ok())
        })
    }

    fn spawn<F>(&self, conn: ConnectionId, task: F)
    where
        F: Future<Output = Option<Completion>> + Send + 'static,
    {
        let Some(events) = self.events.upgrade() else {
            tracing::debug!(%conn, "driver stopped, action skipped");
            return;
        };

        tokio::spawn(async move {
            if let Some(completion) = task.await {
                if events.send(SessionEvent::Completed { conn, completion }).is_err() {
                    tracing::debug!(%conn, "driver stopped, completion dropped");
                }
            }
        });
    }
}
