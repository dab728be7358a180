#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod support;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sandbox::testing::{MemorySandbox, SandboxEvent, ScriptedRun};
use sandbox::{Sandbox, SandboxError};
use support::{ORIGIN, builder, created_sessions, eventually, position, workspace};
use workbench::logs::PortLogProcessor;
use workbench::preprocess::{
    CommandPreprocessor, PLUGIN_SCRIPT, REPORTER_SCRIPT, StaticScriptSource,
};
use workbench::{
    AbortCallback, Alert, ChannelAlertSink, Instrumentation, PortCatcher, Shell, ShellState,
    WorkbenchError,
};

fn script(command: &str) -> ScriptedRun {
    if command.ends_with("npm run dev") {
        ScriptedRun::runs_forever(&["  VITE v5.0.0  ready\n", "  ➜  Local:   http://localhost:5173/\n"])
    } else if command.ends_with("npm test") {
        ScriptedRun::exits(1, &["FAIL src/app.test.ts\n"])
    } else {
        ScriptedRun::exits(0, &["\x1b[32mhello\x1b[0m\n", "\n\n\n\nworld\n"])
    }
}

#[tokio::test(start_paused = true)]
async fn returns_cleaned_output_and_streams_raw_chunks() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, terminal) = builder(&sandbox);
    let shell = builder.build();

    let out = shell.execute_command("echo hi", None).await.unwrap().unwrap();

    assert_eq!(out.exit_code, 0);
    assert_eq!(out.output, "hello\n\nworld");
    assert_eq!(
        terminal.output(),
        "\x1b[32mhello\x1b[0m\n\n\n\n\nworld\n"
    );
    assert_eq!(shell.state(), ShellState::Idle);
    assert_eq!(shell.log_cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn sessions_are_fresh_and_deleted() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder.build();

    shell.execute_command("ls", None).await.unwrap();
    shell.execute_command("ls", None).await.unwrap();

    let sessions = created_sessions(&sandbox);
    assert_eq!(sessions.len(), 2);
    assert_ne!(sessions[0], sessions[1]);
    assert!(position(&sandbox, &SandboxEvent::DeleteSession(sessions[0].clone()))
        < position(&sandbox, &SandboxEvent::CreateSession(sessions[1].clone())));
    assert_eq!(sandbox.open_sessions(), 0);
    assert_eq!(sandbox.max_open_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn failing_command_output_is_colorized_in_terminal() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, terminal) = builder(&sandbox);
    let shell = builder.build();

    let out = shell.execute_command("npm test", None).await.unwrap().unwrap();

    assert_eq!(out.exit_code, 1);
    assert_eq!(out.output, "FAIL src/app.test.ts");
    assert_eq!(terminal.output(), "\x1b[31mFAIL src/app.test.ts\n\x1b[0m");
}

#[tokio::test(start_paused = true)]
async fn silent_failure_writes_nothing() {
    let sandbox = Arc::new(MemorySandbox::with_script(|_| ScriptedRun::exits(2, &[])));
    let (builder, terminal) = builder(&sandbox);
    let shell = builder.build();

    let out = shell.execute_command("false", None).await.unwrap().unwrap();

    assert_eq!(out.exit_code, 2);
    assert_eq!(out.output, "");
    assert_eq!(terminal.output(), "");
}

#[tokio::test(start_paused = true)]
async fn polling_failure_resolves_to_unknown() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    sandbox.fail_polling();
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder.build();

    let out = shell.execute_command("ls", None).await.unwrap();

    assert!(out.is_none());
    assert_eq!(shell.state(), ShellState::Idle);
    assert_eq!(sandbox.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn session_creation_failure_is_an_error() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    sandbox.dispose();
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder.build();

    let err = shell.execute_command("ls", None).await.unwrap_err();

    assert!(matches!(err, WorkbenchError::Sandbox(SandboxError::Disposed)));
}

#[tokio::test(start_paused = true)]
async fn superseding_serialises_cleanup_before_next_session() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, _terminal) = builder(&sandbox);
    let shell = Arc::new(builder.build());

    let aborted = Arc::new(AtomicBool::new(false));
    let resolved_at = Arc::new(Mutex::new(None));
    let first = {
        let shell = Arc::clone(&shell);
        let sandbox = Arc::clone(&sandbox);
        let aborted = Arc::clone(&aborted);
        let resolved_at = Arc::clone(&resolved_at);
        tokio::spawn(async move {
            let abort: AbortCallback = Box::new(move || aborted.store(true, Ordering::SeqCst));
            let out = shell.execute_command("npm run dev", Some(abort)).await;
            *resolved_at.lock().unwrap() = Some(sandbox.events().len());
            out
        })
    };

    eventually(|| shell.state() == ShellState::Executing && shell.log_cursor() > 0).await;
    let second = shell.execute_command("ls", None).await.unwrap().unwrap();
    let first = first.await.unwrap().unwrap();

    assert!(first.is_none());
    assert_eq!(second.exit_code, 0);
    assert!(aborted.load(Ordering::SeqCst));

    let sessions = created_sessions(&sandbox);
    let deleted_a = position(&sandbox, &SandboxEvent::DeleteSession(sessions[0].clone()));
    let created_b = position(&sandbox, &SandboxEvent::CreateSession(sessions[1].clone()));
    let resolved_a = resolved_at.lock().unwrap().unwrap();
    assert!(deleted_a < resolved_a);
    assert!(resolved_a <= created_b);
    assert_eq!(sandbox.max_open_sessions(), 1);
    assert_eq!(sandbox.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn dev_server_port_is_registered() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let ports = Arc::new(PortCatcher::new());
    let (builder, _terminal) = builder(&sandbox);
    let shell = Arc::new(
        builder
            .log_processor(PortLogProcessor::new(Arc::clone(&ports)))
            .build(),
    );

    let running = {
        let shell = Arc::clone(&shell);
        tokio::spawn(async move { shell.execute_command("npm run dev", None).await })
    };
    eventually(|| ports.current() == Some(5173)).await;

    shell.interrupt().await;
    assert!(running.await.unwrap().unwrap().is_none());
    assert_eq!(shell.state(), ShellState::Idle);
    assert_eq!(sandbox.open_sessions(), 0);
}

struct Neutralise;

#[async_trait]
impl CommandPreprocessor for Neutralise {
    async fn process(&self, _command: String) -> String {
        String::new()
    }
}

struct Rename(&'static str);

#[async_trait]
impl CommandPreprocessor for Rename {
    async fn process(&self, command: String) -> String {
        format!("{command} {}", self.0)
    }
}

#[tokio::test(start_paused = true)]
async fn preprocessors_chain_in_order() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder
        .preprocessor(Rename("--a"))
        .preprocessor(Rename("--b"))
        .build();

    shell.execute_command("ls", None).await.unwrap();

    let submitted: Vec<String> = sandbox
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SandboxEvent::SessionCommand { command, .. } => Some(command),
            _ => None,
        })
        .collect();
    assert_eq!(submitted, vec!["ls --a --b"]);
}

#[tokio::test(start_paused = true)]
async fn neutralised_command_is_not_submitted() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder.preprocessor(Neutralise).build();

    let out = shell.execute_command("npm run build", None).await.unwrap();

    assert!(out.is_none());
    assert!(!sandbox
        .events()
        .iter()
        .any(|e| matches!(e, SandboxEvent::SessionCommand { .. })));
    assert_eq!(sandbox.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupt_when_idle_is_noop() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (builder, _terminal) = builder(&sandbox);
    let shell = builder.build();

    shell.interrupt().await;

    assert!(sandbox.events().is_empty());
}

const VITE_CONFIG: &str = "import react from '@vitejs/plugin-react'\n\nexport default defineConfig({\n  plugins: [react()],\n})\n";

fn submitted(sandbox: &MemorySandbox) -> Vec<String> {
    sandbox
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SandboxEvent::SessionCommand { command, .. } => Some(command),
            _ => None,
        })
        .collect()
}

/// Instrumented shell over `sandbox` with a dev server already known on 5173.
fn instrumented(
    sandbox: &Arc<MemorySandbox>,
) -> (
    Arc<Shell>,
    tokio::sync::mpsc::UnboundedReceiver<Alert>,
    tempfile::TempDir,
) {
    let (ws, dir) = workspace(sandbox);
    let (alerts, rx) = ChannelAlertSink::new();
    let ports = Arc::new(PortCatcher::new());
    ports.put_new_port(5173);
    let inst = Instrumentation {
        workspace: ws,
        ports,
        alerts: Arc::new(alerts),
        scripts: Arc::new(
            StaticScriptSource::new()
                .with(REPORTER_SCRIPT, "window.parent.postMessage(payload, '*');")
                .with(PLUGIN_SCRIPT, "export default function previewReporter() {}"),
        ),
        origin: ORIGIN.to_string(),
    };
    let (builder, _terminal) = builder(sandbox);
    (Arc::new(builder.interactive(&inst).build()), rx, dir)
}

#[tokio::test]
async fn broken_config_stops_dev_server_before_anything_runs() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    sandbox.put_file("vite.config.js", "export default defineConfig({\n  plugins: [react(),\n})\n");
    let (shell, mut alerts, dir) = instrumented(&sandbox);

    let out = shell.execute_command("npm run dev", None).await.unwrap();

    assert!(out.is_none());
    assert!(submitted(&sandbox).is_empty(), "{:?}", submitted(&sandbox));
    assert_eq!(sandbox.open_sessions(), 0);
    assert!(sandbox.file(REPORTER_SCRIPT).is_none());
    assert!(sandbox.file(PLUGIN_SCRIPT).is_none());
    assert!(!dir.path().join(REPORTER_SCRIPT).exists());
    assert_eq!(alerts.try_recv().unwrap().title, "Config Syntax Error");
}

#[tokio::test]
async fn previous_dev_server_is_killed_before_the_new_one_starts() {
    let sandbox = Arc::new(MemorySandbox::with_script(script));
    sandbox.put_file("vite.config.js", VITE_CONFIG);
    let (shell, _alerts, _dir) = instrumented(&sandbox);

    let running = {
        let shell = Arc::clone(&shell);
        tokio::spawn(async move { shell.execute_command("npm run dev", None).await })
    };
    eventually(|| submitted(&sandbox).iter().any(|c| c.ends_with("npm run dev"))).await;

    let commands = submitted(&sandbox);
    let kill = commands.iter().position(|c| c.contains("-i:5173")).unwrap();
    let dev = commands.iter().position(|c| c.ends_with("npm run dev")).unwrap();
    assert!(kill < dev, "{commands:?}");
    assert!(sandbox.file_text(REPORTER_SCRIPT).is_some());
    assert!(
        sandbox
            .file_text("vite.config.js")
            .unwrap()
            .contains("plugins: [react(), previewReporter()]")
    );

    shell.interrupt().await;
    assert!(running.await.unwrap().unwrap().is_none());
}
