//! Shared building blocks for the cachefs proxy and server.
//!
//! - [`path`]: lexical normalization of client paths and root confinement
//! - [`remote`]: the [`remote::RemoteStore`] contract the proxy consumes and the
//!   server implements
//! - [`api`]: request/response plumbing shared by every HTTP client
//! - [`logging`]: tracing subscriber setup for the binaries
//! - [`version`]: build information reported by the `/_status/version` endpoints

pub mod api;
pub mod logging;
pub mod path;
pub mod remote;
pub mod version;

pub use path::{normalize, PathError};
pub use remote::{RemoteError, RemoteFileInfo, RemoteStatus, RemoteStore};
