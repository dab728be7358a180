#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod support;

use std::sync::Arc;

use sandbox::Sandbox;
use sandbox::testing::{MemorySandbox, SandboxEvent};
use support::{ORIGIN, workspace};
use workbench::preprocess::{
    CommandPreprocessor, ConfigSyntaxGuard, InstrumentationInjector, InstrumentationRemover,
    PLUGIN_SCRIPT, PreviewKill, REPORTER_SCRIPT, StaticScriptSource,
};
use workbench::{ChannelAlertSink, PortCatcher, WorkbenchError};

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({
  plugins: [react()],
})
"#;

const BROKEN_CONFIG: &str = "export default defineConfig({\n  plugins: [react(),\n})\n";

fn scripts() -> Arc<StaticScriptSource> {
    Arc::new(
        StaticScriptSource::new()
            .with(REPORTER_SCRIPT, "window.parent.postMessage(payload, '*');")
            .with(PLUGIN_SCRIPT, "export default function previewReporter() {}"),
    )
}

#[tokio::test]
async fn injector_writes_locked_files_and_registers_plugin() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.ts", VITE_CONFIG);
    let (ws, dir) = workspace(&sandbox);
    let injector = InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN);

    assert_eq!(injector.process("npm run dev".into()).await, "npm run dev");

    let reporter = sandbox.file_text(REPORTER_SCRIPT).unwrap();
    assert_eq!(
        reporter,
        "window.parent.postMessage(payload, 'https://app.example.com');"
    );
    assert!(ws.is_locked(REPORTER_SCRIPT));
    assert!(ws.is_locked(PLUGIN_SCRIPT));

    let config = sandbox.file_text("vite.config.ts").unwrap();
    assert!(config.contains("plugins: [react(), previewReporter()]"));
    let mirrored = std::fs::read_to_string(dir.path().join("vite.config.ts")).unwrap();
    assert_eq!(mirrored, config);

    let user: Vec<String> = ws.user_files().into_iter().map(|n| n.path).collect();
    assert_eq!(user, vec!["vite.config.ts"]);
}

#[tokio::test]
async fn injector_patches_the_sandbox_copy_over_a_stale_mirror() {
    let edited = VITE_CONFIG.replace(
        "  plugins: [react()],\n",
        "  plugins: [react()],\n  server: { port: 4000 },\n",
    );
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.ts", edited.as_str());
    let (ws, dir) = workspace(&sandbox);
    std::fs::write(dir.path().join("vite.config.ts"), VITE_CONFIG).unwrap();
    let injector = InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN);

    injector.process("npm run dev".into()).await;

    let config = sandbox.file_text("vite.config.ts").unwrap();
    assert!(config.contains("server: { port: 4000 }"), "{config}");
    assert!(config.contains("plugins: [react(), previewReporter()]"));
    let mirrored = std::fs::read_to_string(dir.path().join("vite.config.ts")).unwrap();
    assert_eq!(mirrored, config);
}

#[tokio::test]
async fn injector_twice_registers_once() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.ts", VITE_CONFIG);
    let (ws, _dir) = workspace(&sandbox);
    let injector = InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN);

    injector.process("pnpm dev".into()).await;
    let once = sandbox.file_text("vite.config.ts").unwrap();
    injector.process("pnpm dev".into()).await;
    let twice = sandbox.file_text("vite.config.ts").unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.matches("previewReporter()").count(), 1);
    assert_eq!(twice.matches("import previewReporter").count(), 1);
}

#[tokio::test]
async fn build_removes_instrumentation_losslessly() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.ts", VITE_CONFIG);
    let (ws, dir) = workspace(&sandbox);
    let injector = InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN);
    let remover = InstrumentationRemover::new(Arc::clone(&ws));

    injector.process("npm run dev".into()).await;
    assert_eq!(remover.process("npm run build".into()).await, "npm run build");

    assert_eq!(sandbox.file_text("vite.config.ts").unwrap(), VITE_CONFIG);
    assert!(sandbox.file(REPORTER_SCRIPT).is_none());
    assert!(sandbox.file(PLUGIN_SCRIPT).is_none());
    assert!(!dir.path().join(PLUGIN_SCRIPT).exists());
    assert!(ws.node(REPORTER_SCRIPT).is_none());
}

#[tokio::test]
async fn unlisted_commands_pass_through_without_io() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.ts", VITE_CONFIG);
    let (ws, _dir) = workspace(&sandbox);
    let (alerts, _rx) = ChannelAlertSink::new();
    let ports = Arc::new(PortCatcher::new());
    ports.put_new_port(5173);

    let chain: Vec<Box<dyn CommandPreprocessor>> = vec![
        Box::new(ConfigSyntaxGuard::new(Arc::clone(&ws), Arc::new(alerts))),
        Box::new(PreviewKill::new(sandbox.clone(), Arc::clone(&ports))),
        Box::new(InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN)),
        Box::new(InstrumentationRemover::new(Arc::clone(&ws))),
    ];
    for command in ["ls -la", "npm run dev -- --host", "npm install"] {
        for p in &chain {
            assert_eq!(p.process(command.to_string()).await, command);
        }
    }

    assert!(sandbox.events().is_empty());
    assert_eq!(ports.current(), Some(5173));
}

#[tokio::test]
async fn syntax_guard_suppresses_command_and_alerts() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("vite.config.js", BROKEN_CONFIG);
    let (ws, _dir) = workspace(&sandbox);
    let (alerts, mut rx) = ChannelAlertSink::new();
    let guard = ConfigSyntaxGuard::new(Arc::clone(&ws), Arc::new(alerts));

    assert_eq!(guard.process("npm run build".into()).await, "");

    let alert = rx.try_recv().unwrap();
    assert_eq!(alert.title, "Config Syntax Error");
    assert!(alert.description.starts_with("vite.config.js:3:"), "{}", alert.description);
}

#[tokio::test]
async fn syntax_guard_passes_without_config() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (ws, _dir) = workspace(&sandbox);
    let (alerts, mut rx) = ChannelAlertSink::new();
    let guard = ConfigSyntaxGuard::new(ws, Arc::new(alerts));

    assert_eq!(guard.process("npm run dev".into()).await, "npm run dev");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn preview_kill_stops_registered_port() {
    let sandbox = Arc::new(MemorySandbox::new());
    let ports = Arc::new(PortCatcher::new());
    ports.put_new_port(5173);
    let kill = PreviewKill::new(sandbox.clone(), Arc::clone(&ports));

    assert_eq!(kill.process("npm run dev".into()).await, "npm run dev");

    let events = sandbox.events();
    assert!(matches!(&events[0], SandboxEvent::CreateSession(_)));
    match &events[1] {
        SandboxEvent::SessionCommand { command, .. } => {
            assert!(command.contains("lsof -t -i:5173"), "{command}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(&events[2], SandboxEvent::DeleteSession(_)));
    assert_eq!(ports.current(), None);
    assert_eq!(sandbox.open_sessions(), 0);
}

#[tokio::test]
async fn preview_kill_fires_when_leaving_preview() {
    let sandbox = Arc::new(MemorySandbox::new());
    let ports = Arc::new(PortCatcher::new());
    let kill = PreviewKill::new(sandbox.clone(), Arc::clone(&ports));

    kill.process("npm run dev".into()).await;
    assert!(sandbox.events().is_empty());

    ports.put_new_port(5173);
    kill.process("ls".into()).await;
    assert_eq!(ports.current(), None);
    assert_eq!(sandbox.events().len(), 3);
}

#[tokio::test]
async fn preview_kill_failure_still_clears_port() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.dispose();
    let ports = Arc::new(PortCatcher::new());
    ports.put_new_port(3000);
    let kill = PreviewKill::new(sandbox.clone(), Arc::clone(&ports));

    assert_eq!(kill.process("next dev".into()).await, "next dev");
    assert_eq!(ports.current(), None);
}

#[tokio::test]
async fn generated_files_refuse_user_writes() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (ws, _dir) = workspace(&sandbox);
    let injector = InstrumentationInjector::new(Arc::clone(&ws), scripts(), ORIGIN);
    injector.process("vite".into()).await;

    let err = ws.write_file(PLUGIN_SCRIPT, b"tampered").await.unwrap_err();
    assert!(matches!(err, WorkbenchError::Locked(_)));
    assert_eq!(
        sandbox.file_text(PLUGIN_SCRIPT).unwrap(),
        "export default function previewReporter() {}"
    );
}
