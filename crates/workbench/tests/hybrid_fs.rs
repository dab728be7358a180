#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod support;

use std::sync::Arc;

use sandbox::Sandbox;
use sandbox::testing::{MEMORY_HOME, MemorySandbox, SandboxEvent};
use workbench::fs::{FileSystem, HybridFs, LocalFs, SandboxFs};
use workbench::{NodeContent, NodeKind};

fn hybrid(sandbox: &Arc<MemorySandbox>) -> (HybridFs, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let remote: Arc<dyn Sandbox> = sandbox.clone();
    (
        HybridFs::new(LocalFs::new(dir.path()), SandboxFs::new(remote)),
        dir,
    )
}

#[tokio::test]
async fn absolute_local_paths_map_onto_sandbox_home() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (fs, dir) = hybrid(&sandbox);
    let local = dir.path().join("src/App.tsx");
    let local = local.to_str().unwrap();

    fs.write_file(local, b"export default () => null").await.unwrap();

    assert_eq!(
        fs.remote_path(local).await.unwrap(),
        format!("{MEMORY_HOME}/src/App.tsx")
    );
    assert_eq!(
        sandbox.file_text(&format!("{MEMORY_HOME}/src/App.tsx")).unwrap(),
        "export default () => null"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/App.tsx")).unwrap(),
        "export default () => null"
    );
}

#[tokio::test]
async fn remote_is_written_before_local() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.dispose();
    let (fs, dir) = hybrid(&sandbox);

    assert!(fs.write_file("index.html", b"<html>").await.is_err());
    assert!(!dir.path().join("index.html").exists());
}

#[tokio::test]
async fn paths_outside_root_pass_through() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (fs, _dir) = hybrid(&sandbox);

    assert_eq!(fs.remote_path("src/main.ts").await.unwrap(), "src/main.ts");
    assert_eq!(fs.remote_path("/tmp/other").await.unwrap(), "/tmp/other");
}

#[tokio::test]
async fn read_comes_from_sandbox_and_refreshes_stale_mirror() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("package.json", "{\"name\":\"app\",\"version\":\"2.0.0\"}");
    let (fs, dir) = hybrid(&sandbox);
    std::fs::write(dir.path().join("package.json"), "{\"name\":\"app\"}").unwrap();

    assert_eq!(
        fs.read_file("package.json").await.unwrap(),
        b"{\"name\":\"app\",\"version\":\"2.0.0\"}"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("package.json")).unwrap(),
        "{\"name\":\"app\",\"version\":\"2.0.0\"}"
    );

    let missing = fs.read_file("nope.txt").await.unwrap_err();
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn recursive_remove_goes_through_shell() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (fs, dir) = hybrid(&sandbox);
    fs.write_file("dist/assets/index.js", b"x").await.unwrap();
    fs.write_file("dist/index.html", b"y").await.unwrap();

    fs.remove("dist", true).await.unwrap();

    assert!(
        sandbox
            .events()
            .contains(&SandboxEvent::Exec(format!("rm -rf {MEMORY_HOME}/dist")))
    );
    assert!(sandbox.file("dist/index.html").is_none());
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn local_only_operations_skip_sandbox() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (fs, dir) = hybrid(&sandbox);

    fs.mkdir_local("dist").await.unwrap();
    fs.write_file_local("dist/index.html", b"built").await.unwrap();
    assert!(dir.path().join("dist/index.html").exists());
    fs.remove_local("dist", true).await.unwrap();

    assert!(sandbox.events().is_empty());
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn pull_refreshes_mirror_only() {
    let sandbox = Arc::new(MemorySandbox::new());
    sandbox.put_file("dist/index.html", "<html>built</html>");
    let (fs, dir) = hybrid(&sandbox);

    fs.pull("dist/index.html").await.unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("dist/index.html")).unwrap(),
        "<html>built</html>"
    );
    assert!(
        !sandbox
            .events()
            .iter()
            .any(|e| matches!(e, SandboxEvent::Upload(_)))
    );
}

#[tokio::test]
async fn workspace_tracks_nodes_and_binary_content() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (ws, _dir) = support::workspace(&sandbox);

    ws.mkdir("public").await.unwrap();
    ws.write_file("public/logo.png", &[0x89, 0x50, 0xff, 0x00]).await.unwrap();
    ws.write_file("src/main.ts", b"console.log(1)").await.unwrap();

    let logo = ws.node("public/logo.png").unwrap();
    assert_eq!(logo.content, Some(NodeContent::Base64("iVD/AA==".into())));
    assert!(!logo.pending);
    assert_eq!(ws.node("public").unwrap().kind, NodeKind::Folder);
    assert_eq!(ws.user_files().len(), 2);

    ws.remove("public", true).await.unwrap();
    assert!(ws.node("public/logo.png").is_none());
    assert_eq!(ws.user_files().len(), 1);
}

#[tokio::test]
async fn failed_write_leaves_nodes_as_they_were() {
    let sandbox = Arc::new(MemorySandbox::new());
    let (ws, _dir) = support::workspace(&sandbox);
    ws.write_file("src/main.ts", b"console.log(1)").await.unwrap();
    sandbox.dispose();

    assert!(ws.write_file("src/main.ts", b"console.log(2)").await.is_err());
    let kept = ws.node("src/main.ts").unwrap();
    assert_eq!(kept.content, Some(NodeContent::Text("console.log(1)".into())));
    assert!(!kept.pending);

    assert!(ws.write_file("src/new.ts", b"export {}").await.is_err());
    assert!(ws.node("src/new.ts").is_none());
}
