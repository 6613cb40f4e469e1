//! # sqlbag-web
//!
//! Request-scoped database sessions for axum.
//!
//! Register one pool per database in a [`ScopedSessions`], wrap the router
//! with [`session_setup`], and extract [`RequestSessions`] in handlers. A
//! session begins the first time a handler asks for it and ends with the
//! request: committed when the response status is below 400 (and the
//! factory commits after requests), rolled back otherwise.
//!
//! ```ignore
//! let sessions = ScopedSessions::new()
//!     .connect("main", &descriptor, true)
//!     .await?;
//! let app = session_setup(Router::new().route("/", post(create)), sessions);
//! ```

pub mod error;
pub mod sessions;

pub use error::{WebError, WebResult};
pub use sessions::{RequestSessions, ScopedSessions, SessionGuard, session_layer, session_setup};
