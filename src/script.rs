// src/script.rs - Fire-and-forget invocation of the RF actuator script
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Script reference is empty")]
    Empty,
    #[error("No async runtime available to run script '{0}'")]
    NoRuntime(String),
    #[error("Failed to spawn script '{script}': {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invokes an external script without waiting for it to finish.
///
/// Callers treat errors as non-fatal: the motion sensors, not the script call,
/// decide whether the cover actually moved.
pub trait ScriptInvoker: Send + Sync {
    fn invoke(&self, script: &str) -> Result<(), ScriptError>;
}

/// Runs the script reference as a program (`program arg1 arg2 ...`) on the tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct ProcessScriptInvoker;

impl ScriptInvoker for ProcessScriptInvoker {
    fn invoke(&self, script: &str) -> Result<(), ScriptError> {
        let mut parts = script.split_whitespace();
        let program = parts.next().ok_or(ScriptError::Empty)?;
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| ScriptError::NoRuntime(script.to_string()))?;

        // Spawning registers the child with the runtime's process driver.
        let _guard = handle.enter();
        let mut child = tokio::process::Command::new(program)
            .args(parts)
            .stdin(std::process::Stdio::null())
            .spawn()
            .map_err(|source| ScriptError::Spawn {
                script: script.to_string(),
                source,
            })?;

        let script = script.to_string();
        handle.spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => tracing::debug!("Script '{}' finished", script),
                Ok(status) => tracing::warn!("Script '{}' exited with {}", script, status),
                Err(e) => tracing::warn!("Failed waiting on script '{}': {}", script, e),
            }
        });
        Ok(())
    }
}

/// Only logs the call. Used when the host runs with script execution disabled.
#[derive(Debug, Clone, Default)]
pub struct LogScriptInvoker;

impl ScriptInvoker for LogScriptInvoker {
    fn invoke(&self, script: &str) -> Result<(), ScriptError> {
        tracing::info!("Script invocation (dry run): {}", script);
        Ok(())
    }
}

/// Records every invocation; optionally fails each call after recording it.
#[derive(Debug, Clone, Default)]
pub struct RecordingScriptInvoker {
    calls: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingScriptInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ScriptInvoker for RecordingScriptInvoker {
    fn invoke(&self, script: &str) -> Result<(), ScriptError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(script.to_string());
        }
        if self.fail {
            return Err(ScriptError::Spawn {
                script: script.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "simulated failure"),
            });
        }
        Ok(())
    }
}
