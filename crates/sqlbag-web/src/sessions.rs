//! Request-scoped database sessions.
//!
//! [`ScopedSessions`] holds one session factory (a pool) per database. The
//! [`session_layer`] middleware gives every request a fresh
//! [`RequestSessions`]; handlers extract it and begin sessions lazily. When
//! the handler returns:
//!
//! - status below 400: sessions whose factory has `commit_after_request` set
//!   are committed, the rest are rolled back;
//! - status 400 or above: every session is rolled back.
//!
//! Either way every session is removed before the response leaves the
//! middleware, so nothing leaks into the next request.

use std::sync::Arc;

use axum::Router;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use sqlbag::{ConnectionDescriptor, Session};
use sqlx::AnyPool;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::error::{WebError, WebResult};

/// Exclusive access to one request session. Derefs to [`Session`].
pub type SessionGuard = OwnedMappedMutexGuard<Option<Session>, Session>;

#[derive(Clone)]
struct SessionFactory {
    name: String,
    pool: AnyPool,
    commit_after_request: bool,
}

/// Registry of session factories, shared by every request.
#[derive(Clone, Default)]
pub struct ScopedSessions {
    factories: Arc<Vec<SessionFactory>>,
}

impl ScopedSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pool` under `name`, committing after successful requests.
    pub fn register(self, name: impl Into<String>, pool: AnyPool) -> Self {
        self.register_with(name, pool, true)
    }

    /// Register `pool` under `name`. A later registration with the same name
    /// replaces the earlier one.
    pub fn register_with(
        mut self,
        name: impl Into<String>,
        pool: AnyPool,
        commit_after_request: bool,
    ) -> Self {
        let name = name.into();
        let factories = Arc::make_mut(&mut self.factories);
        factories.retain(|f| f.name != name);
        factories.push(SessionFactory {
            name,
            pool,
            commit_after_request,
        });
        self
    }

    /// Open a pool for `descriptor` and register it under `name`.
    pub async fn connect(
        self,
        name: impl Into<String>,
        descriptor: &ConnectionDescriptor,
        commit_after_request: bool,
    ) -> WebResult<Self> {
        let pool = sqlbag::pool(descriptor, 5).await?;
        Ok(self.register_with(name, pool, commit_after_request))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.iter().map(|f| f.name.as_str())
    }

    /// A fresh, empty set of sessions for one request.
    pub fn scope(&self) -> RequestSessions {
        let slots = self
            .factories
            .iter()
            .map(|factory| Slot {
                factory: factory.clone(),
                session: Arc::new(Mutex::new(None)),
            })
            .collect();
        RequestSessions {
            slots: Arc::new(slots),
        }
    }

    /// Close every pool.
    pub async fn close(&self) {
        for factory in self.factories.iter() {
            factory.pool.close().await;
        }
    }
}

struct Slot {
    factory: SessionFactory,
    session: Arc<Mutex<Option<Session>>>,
}

/// The sessions belonging to one request.
///
/// Extract it in a handler (the [`session_layer`] must be installed):
///
/// ```ignore
/// async fn create(sessions: RequestSessions) -> Result<&'static str, WebError> {
///     let mut s = sessions.session("main").await?;
///     s.execute("insert into t values (1)").await?;
///     Ok("created")
/// }
/// ```
#[derive(Clone)]
pub struct RequestSessions {
    slots: Arc<Vec<Slot>>,
}

impl RequestSessions {
    /// The session registered as `name`, begun on first use.
    ///
    /// The guard holds the session exclusively; drop it before asking for
    /// the same session again.
    pub async fn session(&self, name: &str) -> WebResult<SessionGuard> {
        let slot = self
            .slots
            .iter()
            .find(|s| s.factory.name == name)
            .ok_or_else(|| WebError::UnknownSession(name.to_owned()))?;

        let mut guard = Arc::clone(&slot.session).lock_owned().await;
        if guard.is_none() {
            debug!(session = name, "beginning request session");
            *guard = Some(Session::begin(&slot.factory.pool).await?);
        }
        OwnedMutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| WebError::UnknownSession(name.to_owned()))
    }

    /// Whether the session `name` has been begun in this request.
    pub async fn is_active(&self, name: &str) -> bool {
        match self.slots.iter().find(|s| s.factory.name == name) {
            Some(slot) => slot.session.lock().await.is_some(),
            None => false,
        }
    }

    /// End every begun session: commit the committing ones when `success`,
    /// roll back the rest. Returns the first commit failure.
    pub async fn finish(&self, success: bool) -> WebResult<()> {
        let mut first_failure = None;

        for slot in self.slots.iter() {
            let Some(session) = slot.session.lock().await.take() else {
                continue;
            };
            let name = &slot.factory.name;

            if success && slot.factory.commit_after_request {
                debug!(session = %name, "committing request session");
                if let Err(e) = session.commit().await {
                    error!(session = %name, error = %e, "commit after request failed");
                    first_failure.get_or_insert(WebError::from(e));
                }
            } else if let Err(e) = session.rollback().await {
                warn!(session = %name, error = %e, "rollback after request failed");
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<S> FromRequestParts<S> for RequestSessions
where
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSessions>()
            .cloned()
            .ok_or(WebError::MissingLayer)
    }
}

/// Middleware that scopes sessions to the request.
///
/// Install with [`session_setup`] or
/// `axum::middleware::from_fn_with_state(sessions, session_layer)`.
pub async fn session_layer(
    State(sessions): State<ScopedSessions>,
    mut request: Request,
    next: Next,
) -> Response {
    let scope = sessions.scope();
    request.extensions_mut().insert(scope.clone());

    let response = next.run(request).await;
    let success = response.status().as_u16() < 400;

    match scope.finish(success).await {
        Ok(()) => response,
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("database commit failed: {e}"),
        )
            .into_response(),
    }
}

/// Wrap every route of `router` in [`session_layer`].
pub fn session_setup<S>(router: Router<S>, sessions: ScopedSessions) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(sessions, session_layer))
}

#[cfg(test)]
mod tests {
    use sqlbag::{ConnectionDescriptor, Dialect};

    use super::*;

    async fn memory_pool() -> AnyPool {
        sqlbag::pool(&ConnectionDescriptor::new(Dialect::Sqlite), 1)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn registration_replaces_same_name() {
        let pool = memory_pool().await;
        let sessions = ScopedSessions::new()
            .register("main", pool.clone())
            .register_with("audit", pool.clone(), false)
            .register_with("main", pool, false);

        assert_eq!(sessions.names().collect::<Vec<_>>(), vec!["audit", "main"]);
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let sessions = ScopedSessions::new().register("main", memory_pool().await);
        let scope = sessions.scope();
        assert!(matches!(
            scope.session("other").await,
            Err(WebError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn sessions_begin_lazily_and_are_removed_on_finish() {
        let sessions = ScopedSessions::new().register("main", memory_pool().await);
        let scope = sessions.scope();
        assert!(!scope.is_active("main").await);

        {
            let mut s = scope.session("main").await.unwrap();
            s.execute("SELECT 1").await.unwrap();
        }
        assert!(scope.is_active("main").await);

        scope.finish(true).await.unwrap();
        assert!(!scope.is_active("main").await);

        // Each request gets its own scope.
        assert!(!sessions.scope().is_active("main").await);
    }
}
