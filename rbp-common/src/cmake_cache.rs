//! `CMakeCache.txt` patching.
//!
//! After a remote configure the cache records remote absolute paths. The
//! source-dir prefix is swapped back to the local one with a literal
//! substitution (no stable key exists for it), while the toolchain entries
//! rewritten for IDE toolset probes go through a parsed key/value view so
//! only exact keys are touched.

use crate::config::ToolchainConfig;
use crate::errors::Result;
use crate::transport::RemoteExecutor;
use crate::types::Environment;
use std::fmt;
use tracing::{debug, info};

/// Cache keys rewritten for toolset probes.
pub const MAKE_PROGRAM_KEY: &str = "CMAKE_MAKE_PROGRAM:FILEPATH";
pub const C_COMPILER_KEY: &str = "CMAKE_C_COMPILER:FILEPATH";
pub const CXX_COMPILER_KEY: &str = "CMAKE_CXX_COMPILER:FILEPATH";

/// Literal `(from, to)` pair swapping the remote source prefix for the local one.
///
/// Idempotent only while the local source dir and the remote root do not nest;
/// the driver rejects such layouts before anything runs.
pub fn source_prefix_patterns(local: &Environment, remote: &Environment) -> (String, String) {
    (
        format!("={}", remote.source_dir.display()),
        format!("={}", local.source_dir.display()),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CacheLine {
    Entry {
        /// `NAME` or `NAME:TYPE`, exactly as written.
        key: String,
        value: String,
    },
    /// Comments, blank lines and anything unparseable, kept verbatim.
    Verbatim(String),
}

/// Parsed view of a `CMakeCache.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CMakeCache {
    lines: Vec<CacheLine>,
    trailing_newline: bool,
}

impl CMakeCache {
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| {
                let trimmed = line.trim_start();
                if trimmed.is_empty() || trimmed.starts_with("//") || trimmed.starts_with('#') {
                    return CacheLine::Verbatim(line.to_string());
                }
                match line.split_once('=') {
                    Some((key, value)) if !key.is_empty() => CacheLine::Entry {
                        key: key.to_string(),
                        value: value.to_string(),
                    },
                    _ => CacheLine::Verbatim(line.to_string()),
                }
            })
            .collect();
        Self {
            lines,
            trailing_newline: content.ends_with('\n'),
        }
    }

    /// Value of `key` (`NAME:TYPE`), if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            CacheLine::Entry { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Update an existing entry. Returns whether the key was present.
    pub fn set(&mut self, key: &str, new_value: &str) -> bool {
        let mut found = false;
        for line in &mut self.lines {
            if let CacheLine::Entry { key: k, value } = line
                && k == key
            {
                *value = new_value.to_string();
                found = true;
            }
        }
        found
    }
}

impl fmt::Display for CMakeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            match line {
                CacheLine::Entry { key, value } => write!(f, "{key}={value}")?,
                CacheLine::Verbatim(text) => f.write_str(text)?,
            }
        }
        if self.trailing_newline {
            f.write_str("\n")?;
        }
        Ok(())
    }
}

/// Patches the remote cache before it is downloaded.
pub struct CacheRewriter<'a, E: RemoteExecutor> {
    executor: &'a E,
    toolchain: &'a ToolchainConfig,
}

impl<'a, E: RemoteExecutor> CacheRewriter<'a, E> {
    pub fn new(executor: &'a E, toolchain: &'a ToolchainConfig) -> Self {
        Self {
            executor,
            toolchain,
        }
    }

    /// Toolchain entries a probing IDE should see.
    pub fn toolchain_entries(&self) -> [(&'static str, &'a str); 3] {
        [
            (MAKE_PROGRAM_KEY, self.toolchain.make_program()),
            (C_COMPILER_KEY, self.toolchain.cc.as_str()),
            (CXX_COMPILER_KEY, self.toolchain.cxx.as_str()),
        ]
    }

    pub fn rewrite(&self, local: &Environment, remote: &Environment, toolset_check: bool) -> Result<()> {
        let cache = remote.cmake_cache();
        let (from, to) = source_prefix_patterns(local, remote);
        info!(cache = %cache.display(), "rewriting cache paths");
        self.executor.replace_in_file(&cache, &from, &to)?;

        if toolset_check {
            let mut parsed = CMakeCache::parse(&self.executor.read_file(&cache)?);
            for (key, value) in self.toolchain_entries() {
                if !parsed.set(key, value) {
                    debug!(key, "cache entry not present, left alone");
                }
            }
            self.executor.write_file(&cache, &parsed.to_string())?;
        }
        Ok(())
    }
}
