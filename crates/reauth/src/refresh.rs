//! The refresh coordinator: single-flight credential renewal.
//!
//! When several requests fail with 401 at roughly the same time, exactly
//! one of them (the *leader*) triggers a renewal call. Everyone else (the
//! *waiters*) parks on a one-shot channel until that renewal resolves.
//!
//! ```text
//!  A ──401──┐
//!  B ──401──┼──→ [queue: A, B, C] ──→ POST /auth/token (once)
//!  C ──401──┘                              │
//!                      ┌───────────────────┴─────────────────┐
//!                   success                               failure
//!          replay A, B, C in order               fail A, B, C with AuthExpired
//!          each with Bearer T2                   teardown once for the batch
//! ```
//!
//! # State
//!
//! `RenewalState` is the only shared mutable state. It lives behind a
//! `std::sync::Mutex` owned by the coordinator; the lock is never held
//! across an `.await`, so "is a renewal in flight? if not, I'm the leader"
//! is a single atomic step.
//!
//! # Renewal task
//!
//! The leader spawns the renewal instead of awaiting it inline. Each
//! parked request is queued with its envelope and a reply channel; once
//! the renewal resolves, the task itself starts every replay in queue
//! order and routes each result back to its caller. If the leader's
//! caller is dropped mid-renewal, the batch still completes. Should the
//! task itself die before draining the batch, a drop guard fails it
//! instead of leaving it parked.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use reauth_protocol::{
    Credential, JsonCodec, RenewalGrant, RequestEnvelope, Response, STATUS_FORBIDDEN,
    STATUS_UNAUTHORIZED,
};
use reauth_session::SessionTeardown;
use reauth_transport::Transport;
use tokio::sync::oneshot;

use crate::client::{empty_json_post, settle};
use crate::{ClientError, ExpiryReason};

/// The result of one renewal call.
type RenewalOutcome = Result<Credential, ExpiryReason>;

/// One parked request: what to replay, and where its result goes.
struct Waiter {
    envelope: RequestEnvelope,
    reply: oneshot::Sender<Result<Response, ClientError>>,
}

/// Single-flight bookkeeping.
///
/// Invariants (upheld because every mutation happens under one lock):
/// - `in_progress` is `true` iff exactly one renewal is outstanding
/// - `waiters` is non-empty only while `in_progress` is `true`
/// - `waiters` is drained exactly once per renewal, together with
///   clearing `in_progress`
#[derive(Default)]
struct RenewalState {
    in_progress: bool,
    waiters: VecDeque<Waiter>,
}

struct Shared<T: Transport, S: SessionTeardown> {
    transport: Arc<T>,
    teardown: Arc<S>,
    refresh_path: String,
    codec: JsonCodec,
    state: Mutex<RenewalState>,
}

impl<T: Transport, S: SessionTeardown> Shared<T, S> {
    fn lock_state(&self) -> MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Performs the renewal call and turns its answer into an outcome.
    async fn renew(&self) -> RenewalOutcome {
        let request = empty_json_post(&self.refresh_path);
        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| ExpiryReason::RenewalFailed(e.to_string()))?;

        match response.status() {
            status @ (STATUS_UNAUTHORIZED | STATUS_FORBIDDEN) => {
                return Err(ExpiryReason::RenewalRejected { status });
            }
            status if !response.is_success() => {
                return Err(ExpiryReason::RenewalFailed(format!(
                    "unexpected status {status}"
                )));
            }
            _ => {}
        }

        response
            .json::<_, RenewalGrant>(&self.codec)
            .and_then(RenewalGrant::into_credential)
            .map_err(|e| ExpiryReason::RenewalFailed(e.to_string()))
    }

    /// Takes the whole batch and clears `in_progress` in one critical
    /// section.
    fn drain(&self) -> VecDeque<Waiter> {
        let mut state = self.lock_state();
        state.in_progress = false;
        std::mem::take(&mut state.waiters)
    }

    /// Replays every waiter with `credential`.
    ///
    /// Sends are started strictly in enqueue order: each replay future is
    /// pushed in queue order and `FuturesUnordered` polls new futures in
    /// the order they were pushed. Completion order is up to the backend.
    async fn replay_all(&self, waiters: VecDeque<Waiter>, credential: &Credential) {
        tracing::info!(waiters = waiters.len(), "renewal succeeded, replaying requests");

        let transport = &self.transport;
        let mut replays = FuturesUnordered::new();
        for Waiter { envelope, reply } in waiters {
            if reply.is_closed() {
                tracing::debug!(path = envelope.target(), "caller went away, skipping replay");
                continue;
            }
            let replay = envelope.replay_with(credential);
            replays.push(async move {
                tracing::debug!(
                    method = %replay.method(),
                    path = replay.target(),
                    "replaying request with renewed credential"
                );
                let result = match transport.send(&replay).await {
                    Ok(response) => settle(&replay, response),
                    Err(e) => Err(ClientError::Transport(e)),
                };
                // A dropped receiver means that caller went away.
                let _ = reply.send(result);
            });
        }

        while replays.next().await.is_some() {}
    }

    /// Fails every waiter with `reason`, after running teardown once for
    /// the batch.
    fn fail_all(&self, waiters: VecDeque<Waiter>, reason: ExpiryReason) {
        tracing::warn!(
            waiters = waiters.len(),
            %reason,
            "renewal failed, failing blocked requests"
        );
        self.teardown.invalidate();

        for Waiter { envelope, reply } in waiters {
            let _ = reply.send(Err(ClientError::AuthExpired {
                target: envelope.target().to_string(),
                reason: reason.clone(),
            }));
        }
    }
}

/// Drives one renewal, and the replays of its batch, to completion.
///
/// If the task is torn down before the batch is drained (runtime
/// shutdown, a panicking transport), `Drop` fails the batch so no waiter
/// stays parked and `in_progress` is cleared.
struct RenewalTask<T: Transport, S: SessionTeardown> {
    shared: Arc<Shared<T, S>>,
    drained: bool,
}

impl<T: Transport, S: SessionTeardown> RenewalTask<T, S> {
    async fn run(mut self) {
        let outcome = self.shared.renew().await;
        let waiters = self.shared.drain();
        self.drained = true;

        match outcome {
            Ok(credential) => self.shared.replay_all(waiters, &credential).await,
            Err(reason) => self.shared.fail_all(waiters, reason),
        }
    }
}

impl<T: Transport, S: SessionTeardown> Drop for RenewalTask<T, S> {
    fn drop(&mut self) {
        if !self.drained {
            tracing::warn!("renewal task ended without an outcome");
            let waiters = self.shared.drain();
            self.shared.fail_all(waiters, ExpiryReason::RenewalAbandoned);
        }
    }
}

/// Coordinates credential renewal for one client.
///
/// Created once per [`Client`](crate::Client); there is no global state.
/// Cheap to clone (it's an `Arc` inside), and clones share the same
/// renewal state.
pub struct RefreshCoordinator<T: Transport, S: SessionTeardown> {
    shared: Arc<Shared<T, S>>,
}

impl<T: Transport, S: SessionTeardown> Clone for RefreshCoordinator<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport, S: SessionTeardown> RefreshCoordinator<T, S> {
    /// Creates a coordinator that renews through `refresh_path`.
    pub fn new(transport: Arc<T>, teardown: Arc<S>, refresh_path: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                teardown,
                refresh_path: refresh_path.into(),
                codec: JsonCodec,
                state: Mutex::new(RenewalState::default()),
            }),
        }
    }

    /// Returns the renewal endpoint path.
    pub fn refresh_path(&self) -> &str {
        &self.shared.refresh_path
    }

    /// Returns `true` if `envelope` targets the renewal endpoint.
    ///
    /// Matches on the path suffix, so both `/auth/token` and
    /// `https://host/api/auth/token?x=1` count.
    pub fn is_renewal_target(&self, envelope: &RequestEnvelope) -> bool {
        let refresh = self.shared.refresh_path.trim_end_matches('/');
        let path = envelope.target_path().trim_end_matches('/');
        !refresh.is_empty() && path.ends_with(refresh)
    }

    /// Returns `true` while a renewal call is outstanding.
    pub fn is_renewing(&self) -> bool {
        self.shared.lock_state().in_progress
    }

    /// Returns how many requests are parked on the in-flight renewal,
    /// the leader included.
    pub fn pending_waiters(&self) -> usize {
        self.shared.lock_state().waiters.len()
    }

    /// Handles a request whose first attempt came back 401.
    ///
    /// Only called by the client facade, and only for envelopes that
    /// haven't been retried yet. The caller is parked until the batch it
    /// joined resolves; on success its replay is issued by the renewal
    /// task, in enqueue order.
    ///
    /// # Errors
    /// - [`ClientError::AuthExpired`] if the envelope targets the renewal
    ///   endpoint, if renewal fails, or if the replay is rejected again
    /// - [`ClientError::Transport`] / [`ClientError::Rejected`] from the
    ///   replay, unchanged
    pub async fn handle_expiry(&self, envelope: RequestEnvelope) -> Result<Response, ClientError> {
        let target = envelope.target().to_string();

        if self.is_renewal_target(&envelope) {
            tracing::warn!(path = %target, "renewal endpoint answered 401");
            self.shared.teardown.invalidate();
            return Err(ClientError::AuthExpired {
                target,
                reason: ExpiryReason::RenewalEndpoint,
            });
        }

        let (reply, rx) = oneshot::channel();
        let (leader, position) = {
            let mut state = self.shared.lock_state();
            state.waiters.push_back(Waiter { envelope, reply });
            let leader = !state.in_progress;
            state.in_progress = true;
            (leader, state.waiters.len())
        };

        if leader {
            tracing::info!(path = %target, "credential expired, starting renewal");
            let task = RenewalTask {
                shared: Arc::clone(&self.shared),
                drained: false,
            };
            tokio::spawn(task.run());
        } else {
            tracing::debug!(path = %target, position, "renewal in flight, waiting");
        }

        rx.await.unwrap_or_else(|_| {
            Err(ClientError::AuthExpired {
                target,
                reason: ExpiryReason::RenewalAbandoned,
            })
        })
    }
}
