//! GitHub-facing collaborators: API endpoints, the HTTP transport, the
//! current-viewer username lookup and the per-account status report.

pub mod host;
pub mod scopes;
pub mod status;
pub mod transport;
pub mod viewer;

pub use scopes::{HttpScopeChecker, ScopeChecker, ScopeError};
pub use status::{
    mask_token, AccountState, AccountStatus, HostStatus, Severity, StatusOptions, StatusReport,
    TokenSource,
};
pub use transport::{Method, Request, Response, Transport, TransportError, UreqTransport};
pub use viewer::ViewerResolver;
