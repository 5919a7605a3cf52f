//! Remote Build Proxy - command-remoting engine
//!
//! Classifies `cmake`/`conan` invocations, mirrors the project tree to a
//! build host, runs the rewritten command there and brings the results back.

#![deny(unsafe_code)]

pub mod cmake_cache;
pub mod command;
pub mod config;
pub mod driver;
pub mod errors;
pub mod lock;
pub mod logging;
pub mod mock;
pub mod path_mapping;
pub mod rewrite;
pub mod ssh;
pub mod sync;
pub mod transport;
pub mod types;
pub mod util;

pub use cmake_cache::{CMakeCache, CacheRewriter};
pub use command::{BuildToolMode, Command, PackageManagerMode, SourceLocation, Tool};
pub use config::{LoadedConfig, PackageHomeSource, RbpConfig};
pub use driver::{Driver, Plan};
pub use errors::{RemotingError, Result};
pub use lock::MirrorLock;
pub use logging::{LogConfig, init_logging};
pub use mock::{MockTransport, TransportCall};
pub use path_mapping::{MappedPaths, PathMapper};
pub use rewrite::{ArgumentRewriter, RemoteCommand};
pub use ssh::SshTransport;
pub use sync::SyncOrchestrator;
pub use transport::{RemoteExecutor, RemoteRun};
pub use types::{Environment, Invocation, SyncPlan};
