//! Wires a backend, workspace and shell together for one CLI session.

use std::sync::Arc;
use std::time::Duration;

use sandbox::Sandbox;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use workbench::fs::{HybridFs, LocalFs, SandboxFs};
use workbench::logs::RuntimeErrorProcessor;
use workbench::preprocess::{HttpScriptSource, ScriptSource};
use workbench::{
    Alert, AlertSink, ChannelAlertSink, CommandBuffer, CommandOutput, Instrumentation, PortCatcher,
    Shell, Terminal, Workspace,
};

use crate::backend;
use crate::config::WorkbenchConfig;
use crate::error::CliResult;
use crate::terminal::StdioTerminal;

/// Dispose spawns its teardown request; let it leave before the runtime stops.
const DISPOSE_GRACE: Duration = Duration::from_millis(500);

pub struct Session {
    sandbox: Arc<dyn Sandbox>,
    terminal: Arc<StdioTerminal>,
    shell: Arc<Shell>,
    alerts: JoinHandle<()>,
}

impl Session {
    pub fn start(config: &WorkbenchConfig) -> CliResult<Self> {
        let sandbox = backend::connect(&config.backend)?;
        let terminal = Arc::new(StdioTerminal::new());

        let (sink, mut alert_rx) = ChannelAlertSink::new();
        let alerts: Arc<dyn AlertSink> = Arc::new(sink);
        let alert_task = tokio::spawn(async move {
            while let Some(alert) = alert_rx.recv().await {
                print_alert(&alert);
            }
        });

        let ports = Arc::new(PortCatcher::new());
        announce_preview_links(&ports, &sandbox, &terminal);

        let local = LocalFs::new(&config.workspace.local_root);
        let remote = SandboxFs::new(Arc::clone(&sandbox));
        let workspace = Arc::new(Workspace::new(HybridFs::new(local, remote)));
        let scripts: Arc<dyn ScriptSource> =
            Arc::new(HttpScriptSource::new(&config.workspace.origin)?);

        let inst = Instrumentation {
            workspace,
            ports,
            alerts: Arc::clone(&alerts),
            scripts,
            origin: config.workspace.origin.clone(),
        };
        let term: Arc<dyn Terminal> = terminal.clone();
        let shell = Shell::builder(Arc::clone(&sandbox), term)
            .config(config.shell_config())
            .interactive(&inst)
            .log_processor(RuntimeErrorProcessor::new(alerts))
            .build();

        Ok(Self {
            sandbox,
            terminal,
            shell: Arc::new(shell),
            alerts: alert_task,
        })
    }

    pub async fn run_once(&self, command: &str) -> CliResult<Option<CommandOutput>> {
        Ok(self.shell.execute_command(command, None).await?)
    }

    /// Read commands from stdin until end of input. Ctrl-C stops the running
    /// command and keeps the session.
    pub async fn interactive(&self) -> CliResult<()> {
        let shell = Arc::clone(&self.shell);
        let handle = Handle::current();
        let term: Arc<dyn Terminal> = self.terminal.clone();
        let buffer = Arc::new(
            CommandBuffer::new(
                term,
                Box::new(move |command| {
                    let shell = Arc::clone(&shell);
                    handle.spawn(async move {
                        match shell.execute_command(&command, None).await {
                            Ok(Some(out)) => info!(%command, exit_code = out.exit_code, "command done"),
                            Ok(None) => info!(%command, "command ended without exit code"),
                            Err(e) => eprintln!("error: {e}"),
                        }
                    });
                }),
            )
            .without_echo(),
        );
        buffer.attach();

        let pump = self.terminal.pump();
        tokio::pin!(pump);
        loop {
            tokio::select! {
                res = &mut pump => return Ok(res?),
                res = tokio::signal::ctrl_c() => {
                    res?;
                    self.shell.interrupt().await;
                }
            }
        }
    }

    pub async fn close(self) {
        self.shell.interrupt().await;
        self.sandbox.dispose();
        tokio::time::sleep(DISPOSE_GRACE).await;
        self.alerts.abort();
    }
}

fn print_alert(alert: &Alert) {
    eprintln!("\n[{:?}] {}: {}", alert.kind, alert.title, alert.description);
}

fn announce_preview_links(
    ports: &PortCatcher,
    sandbox: &Arc<dyn Sandbox>,
    terminal: &Arc<StdioTerminal>,
) {
    let handle = Handle::current();
    let sandbox = Arc::clone(sandbox);
    let terminal = Arc::clone(terminal);
    ports.on_added(move |port| {
        let sandbox = Arc::clone(&sandbox);
        let terminal = Arc::clone(&terminal);
        handle.spawn(async move {
            match sandbox.get_preview_link(port).await {
                Ok(link) => terminal.write(&format!("\r\nPreview on port {port}: {}\r\n", link.url)),
                Err(e) => warn!(port, error = %e, "failed to resolve preview link"),
            }
        });
    });
}
