//! Scripted stand-ins for external tools

#![allow(dead_code)]

use async_trait::async_trait;
use lspkg_errors::{Error, PlatformError};
use lspkg_index::RegistryItem;
use lspkg_install::{InstallOperation, InstallStep};
use lspkg_platform::{CommandOutput, LineSink, PlatformCommand, ProcessOperations};
use std::sync::{Arc, Mutex};

/// What a scripted command does
pub enum Reply {
    Lines(Vec<String>),
    Fail(Error),
    /// Never finishes; only cancellation ends it
    Hang,
}

impl Reply {
    pub fn lines(lines: &[&str]) -> Self {
        Self::Lines(lines.iter().map(|l| (*l).to_string()).collect())
    }

    pub fn exit(command: &str, code: i32) -> Self {
        Self::Fail(
            PlatformError::CommandFailed {
                command: command.to_string(),
                code: Some(code),
                stderr: String::new(),
            }
            .into(),
        )
    }
}

type Script = dyn Fn(&PlatformCommand) -> Reply + Send + Sync;

/// Shell whose behaviour is a closure over the command line
pub struct ScriptedShell {
    script: Box<Script>,
    calls: Mutex<Vec<PlatformCommand>>,
}

impl ScriptedShell {
    pub fn new(script: impl Fn(&PlatformCommand) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Command lines executed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(ToString::to_string).collect()
    }

    pub fn commands(&self) -> Vec<PlatformCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessOperations for ScriptedShell {
    async fn execute(
        &self,
        cmd: PlatformCommand,
        on_line: LineSink<'_>,
    ) -> Result<CommandOutput, Error> {
        self.calls.lock().unwrap().push(cmd.clone());
        match (self.script)(&cmd) {
            Reply::Lines(lines) => {
                for line in &lines {
                    on_line(line);
                }
                Ok(CommandOutput {
                    code: Some(0),
                    lines,
                })
            }
            Reply::Fail(error) => Err(error),
            Reply::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

pub fn item(json: &str) -> RegistryItem {
    serde_json::from_str(json).unwrap()
}

pub fn operation(steps: Vec<InstallStep>, shell: Arc<dyn ProcessOperations>) -> InstallOperation {
    let package = item(r#"{"name": "demo-ls", "source": {"id": "pkg:npm/demo-ls@1.0.0"}}"#);
    InstallOperation::new(package, steps, shell)
}

/// Run `op`, confirming every gate as soon as it appears
pub async fn run_confirming(op: &InstallOperation) -> Result<(), Error> {
    let mut updates = op.subscribe();
    let confirmer = op.clone();
    let driver = tokio::spawn(async move {
        loop {
            let waiting = updates.borrow_and_update().waiting_for_confirmation.is_some();
            if waiting {
                let _ = confirmer.confirm();
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    });
    let result = op.run().await;
    driver.abort();
    result
}
