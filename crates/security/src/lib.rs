//! Security policy for Alin tool execution.
//!
//! Provides:
//! - **Path confinement**: every filesystem path is resolved against a
//!   workspace root and checked after resolution
//! - **Command deny-list**: destructive shell patterns are refused before a
//!   process is spawned
//! - **Git verb allow-list**: only known git operations may run
//! - **Fetch guard**: outbound fetches to loopback/private hosts are refused
//!
//! The deny-list is a heuristic, not a sandbox. Processes still run with the
//! server's own privileges.

pub mod command;
pub mod endpoint;
pub mod git;
pub mod path;

pub use command::CommandPolicy;
pub use endpoint::{check_fetch_url, is_private_url};
pub use git::{GitVerb, check_git_args};
pub use path::{PathValidationError, relative_display, resolve_in_workspace};
