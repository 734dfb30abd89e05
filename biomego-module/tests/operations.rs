//! Module operations against the in-memory engine

use biomego::{Biomego, DEFAULT_BASE_IMAGE, ModuleConfig, TOOL_IMAGE};
use biomego_core::{Directory, Snapshot};
use biomego_engine::{Engine, EngineError, FakeEngine, FakeProcess};
use std::sync::Arc;

fn setup(source: Directory, base_image: &str) -> (Arc<FakeEngine>, Biomego) {
    let engine = Arc::new(FakeEngine::new());
    let module = Biomego::new(ModuleConfig::new(source, base_image), engine.clone());
    (engine, module)
}

fn greeting() -> Directory {
    Snapshot::new().with_new_file("a.txt", "hello world").into()
}

/// Stand-in for `npx @biomejs/biome check [--write] FILES...`
///
/// Flags any `.ts` file outside node_modules containing `var `. With
/// `--write`, rewrites those to `let ` instead.
fn fake_biome(process: &mut FakeProcess<'_>) -> i32 {
    let write = process.args.iter().any(|arg| arg == "--write");
    let mut problems = Vec::new();

    for (path, contents) in process.files_under(".") {
        if path.starts_with("node_modules/") || !path.ends_with(".ts") {
            continue;
        }
        let text = String::from_utf8_lossy(&contents).to_string();
        if text.contains("var ") {
            if write {
                process.write(&path, text.replace("var ", "let "));
            } else {
                problems.push(path);
            }
        }
    }

    if problems.is_empty() {
        0
    } else {
        process.stderr = format!("{}: lint/style/noVar\n", problems.join(", "));
        1
    }
}

fn fake_npm(process: &mut FakeProcess<'_>) -> i32 {
    process.write("node_modules/.package-lock.json", "{}");
    process.write("node_modules/@biomejs/biome/index.ts", "var internal = 1");
    0
}

fn toolchain_engine(engine: &FakeEngine) {
    engine.on_command("npm", fake_npm);
    engine.on_command("npx", fake_biome);
}

#[tokio::test]
async fn test_echo_container_resolves_to_text_and_newline() {
    let (engine, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    for text in ["hello", "", "two words", "ünïcödé"] {
        let container = module.echo_container(text);
        assert_eq!(engine.stdout(&container).await.unwrap(), format!("{}\n", text));
    }
}

#[tokio::test]
async fn test_echo_container_is_lazy() {
    let (engine, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    let _container = module.echo_container("not yet");

    assert!(engine.resolved().is_empty());
}

#[tokio::test]
async fn test_grep_directory_reports_path_and_line() {
    let (_, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    let output = module.grep_directory(greeting(), "hello").await.unwrap();

    assert!(output.contains("./a.txt:hello world"));
}

#[tokio::test]
async fn test_grep_directory_searches_recursively() {
    let (_, module) = setup(greeting(), DEFAULT_BASE_IMAGE);
    let dir = Snapshot::new()
        .with_new_file("top.txt", "no match here")
        .with_new_file("deep/er/file.md", "line one\nneedle in here\nneedle again");

    let output = module.grep_directory(dir.into(), "needle").await.unwrap();

    assert_eq!(
        output,
        "./deep/er/file.md:needle in here\n./deep/er/file.md:needle again\n"
    );
}

#[tokio::test]
async fn test_grep_directory_without_match_fails() {
    let (_, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    let err = module
        .grep_directory(greeting(), "goodbye")
        .await
        .unwrap_err();

    assert!(err.is_exec_failure());
    assert_eq!(err.exit_code(), Some(1));
}

#[tokio::test]
async fn test_grep_directory_is_stable() {
    let (_, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    let first = module.grep_directory(greeting(), "o").await.unwrap();
    let second = module.grep_directory(greeting(), "o").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_grep_directory_ignores_base_image() {
    let (engine_a, module_a) = setup(greeting(), DEFAULT_BASE_IMAGE);
    let (_, module_b) = setup(greeting(), "node:22-alpine");

    let a = module_a.grep_directory(greeting(), "hello").await.unwrap();
    let b = module_b.grep_directory(greeting(), "hello").await.unwrap();

    assert_eq!(a, b);
    assert_eq!(engine_a.resolved()[0].image(), TOOL_IMAGE);
}

#[tokio::test]
async fn test_grep_directory_propagates_engine_failure() {
    let (engine, module) = setup(greeting(), DEFAULT_BASE_IMAGE);
    engine.fail_image(TOOL_IMAGE);

    let err = module
        .grep_directory(greeting(), "hello")
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::ContainerStart { image, .. } if image == TOOL_IMAGE));
}

#[tokio::test]
async fn test_grep_directory_reads_host_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
    let (_, module) = setup(greeting(), DEFAULT_BASE_IMAGE);

    let output = module
        .grep_directory(Directory::host(dir.path()), "hello")
        .await
        .unwrap();

    assert_eq!(output, "./a.txt:hello world\n");
}

#[tokio::test]
async fn test_lint_passes_on_clean_source() {
    let source = Snapshot::new().with_new_file("src/index.ts", "let a = 1");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    module.lint(&[]).await.unwrap();

    let resolved = engine.resolved();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].image(), DEFAULT_BASE_IMAGE);
}

#[tokio::test]
async fn test_lint_fails_with_biome_error() {
    let source = Snapshot::new().with_new_file("src/index.ts", "var a = 1");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    let err = module.lint(&[]).await.unwrap_err();

    match err {
        EngineError::ExecFailed {
            command, stderr, ..
        } => {
            assert_eq!(command, "npx @biomejs/biome check");
            assert!(stderr.contains("src/index.ts"));
        }
        other => panic!("expected exec failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_lint_fails_when_install_fails() {
    let source = Snapshot::new().with_new_file("src/index.ts", "let a = 1");
    let (_, module) = setup(source.into(), DEFAULT_BASE_IMAGE);

    // No npm registered: the install step exits 127
    let err = module.lint(&[]).await.unwrap_err();

    assert_eq!(err.exit_code(), Some(127));
}

#[tokio::test]
async fn test_fix_returns_filtered_changeset() {
    let source = Snapshot::new()
        .with_new_file("package.json", "{}")
        .with_new_file("src/index.ts", "var a = 1")
        .with_new_file("src/ok.ts", "let b = 2");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    let changes = module.fix(&[], &[]).await.unwrap();

    assert_eq!(changes.modified_paths().collect::<Vec<_>>(), ["src/index.ts"]);
    assert_eq!(
        changes.modified.get("src/index.ts").map(Vec::as_slice),
        Some(&b"let a = 1"[..])
    );
    // node_modules is dropped and package-lock.json is outside the filter
    assert_eq!(changes.added_paths().count(), 0);
    assert_eq!(changes.removed_paths().count(), 0);
}

#[tokio::test]
async fn test_fix_custom_filter() {
    let source = Snapshot::new()
        .with_new_file("src/index.ts", "var a = 1")
        .with_new_file("lib/util.ts", "var c = 3");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    let changes = module
        .fix(&[], &["lib/**/*.ts".to_string()])
        .await
        .unwrap();

    assert_eq!(changes.modified_paths().collect::<Vec<_>>(), ["lib/util.ts"]);
}

#[tokio::test]
async fn test_fix_clean_source_is_empty() {
    let source = Snapshot::new().with_new_file("src/index.ts", "let a = 1");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    assert!(module.fix(&[], &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fix_rejects_bad_filter() {
    let source = Snapshot::new().with_new_file("src/index.ts", "let a = 1");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    let err = module.fix(&[], &["***".to_string()]).await.unwrap_err();

    assert!(matches!(err, EngineError::InvalidPattern(_)));
}

#[tokio::test]
async fn test_fix_ignores_host_node_modules() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/lodash")).unwrap();
    std::fs::write(dir.path().join("node_modules/lodash/index.js"), "module.exports = {}").unwrap();
    std::fs::write(dir.path().join("index.ts"), "var a = 1").unwrap();
    let (engine, module) = setup(Directory::host(dir.path()), DEFAULT_BASE_IMAGE);
    toolchain_engine(&engine);

    let changes = module.fix(&[], &[]).await.unwrap();

    assert_eq!(changes.modified_paths().collect::<Vec<_>>(), ["index.ts"]);
    assert_eq!(changes.removed_paths().count(), 0);
    assert_eq!(changes.added_paths().count(), 0);

    changes.export(dir.path()).unwrap();
    assert!(dir.path().join("node_modules/lodash/index.js").exists());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("index.ts")).unwrap(),
        "let a = 1"
    );
}

#[tokio::test]
async fn test_fix_reports_deleted_files() {
    let source = Snapshot::new()
        .with_new_file("src/index.ts", "let a = 1")
        .with_new_file("src/stale.ts", "let b = 2");
    let (engine, module) = setup(source.into(), DEFAULT_BASE_IMAGE);
    engine.on_command("npm", fake_npm);
    engine.on_command("npx", |process| {
        process.remove("src/stale.ts");
        0
    });

    let changes = module.fix(&[], &[]).await.unwrap();

    assert_eq!(changes.removed_paths().collect::<Vec<_>>(), ["src/stale.ts"]);
    assert_eq!(changes.modified_paths().count(), 0);
}
