/// Acceptance tests for the packaging pipeline
///
/// These tests drive the full chain (dedup, variable collection, fan-out,
/// compile-with-cache) through the library interface over tempdir fixtures.
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use dopack::compiler::{CompileConfig, CompileFuture};
use dopack::pipeline::{build_pipeline, run_files, PipelineOptions, Step};
use dopack::{
    CompileCache, CompileOutput, Compiler, Mode, MtimeCache, PassthroughCompiler, ScriptFile,
    Target,
};

/// Compiler double that counts invocations per file name.
struct RecordingCompiler {
    invocations: AtomicUsize,
}

impl RecordingCompiler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            invocations: AtomicUsize::new(0),
        })
    }

    fn count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Compiler for RecordingCompiler {
    fn compile(&self, source: &str, _config: &CompileConfig, _filename: &Path) -> CompileFuture {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        let code = format!("compiled[{source}]");
        Box::pin(async move {
            Ok(CompileOutput {
                code,
                source_map: None,
            })
        })
    }
}

/// Source tree fixture; files are registered in write order, mirroring the
/// priority-ordered stream a locator would produce.
struct SourceTree {
    temp: TempDir,
    files: Vec<(PathBuf, PathBuf)>,
}

impl SourceTree {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
            files: Vec::new(),
        }
    }

    fn write(&mut self, source: &str, relative: &str, contents: &str) -> PathBuf {
        let path = self.temp.path().join(source).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        set_mtime(&path, 0);
        self.files.push((path.clone(), PathBuf::from(relative)));
        path
    }

    fn stream(&self) -> Vec<ScriptFile> {
        self.files
            .iter()
            .map(|(path, relative)| ScriptFile::load(path, relative.clone()).unwrap())
            .collect()
    }
}

fn set_mtime(path: &Path, offset_secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs))
        .unwrap();
}

fn fixed_version(token: &str) -> PipelineOptions {
    let token = token.to_string();
    PipelineOptions {
        version: Some(Box::new(move || Box::pin(async move { Ok(token) }))),
        ..Default::default()
    }
}

async fn passthrough_pipeline(options: PipelineOptions) -> Step<ScriptFile> {
    build_pipeline(PipelineOptions {
        compiler: Arc::new(PassthroughCompiler),
        mode: Some(Mode::Debug),
        ..options
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn earliest_source_wins_for_duplicate_identities() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.js", "from app");
    tree.write("lib", "widget.js", "from lib");

    let pipeline = passthrough_pipeline(fixed_version("1")).await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].contents, b"from app");
}

#[tokio::test]
async fn fan_out_produces_one_copy_per_target_sharing_one_version() {
    let mut tree = SourceTree::new();
    tree.write("app", "ui/widget.js", "let w;");
    tree.write("app", "api.js", "entry");

    let pipeline = passthrough_pipeline(PipelineOptions {
        targets: vec![Target::Es5, Target::Es6],
        ..fixed_version("77")
    })
    .await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    // Two widget copies plus the single entry instance.
    assert_eq!(out.len(), 3);

    let destinations: Vec<String> = out
        .iter()
        .map(|f| f.destination.to_string_lossy().into_owned())
        .collect();
    assert!(destinations.contains(&"es5_77/ui/widget.js".to_string()));
    assert!(destinations.contains(&"es6_77/ui/widget.js".to_string()));
    assert!(destinations.contains(&"api.js".to_string()));
}

#[tokio::test]
async fn sidecar_variables_are_substituted_and_consumed() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.json", r#"{"color":"red"}"#);
    tree.write("app", "widget.js", "paint(dopeVars.color);");

    let pipeline = passthrough_pipeline(fixed_version("1")).await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out.len(), 1, "the sidecar must not become an artifact");
    assert_eq!(out[0].contents, br#"paint("red");"#);
    assert_eq!(out[0].destination, PathBuf::from("es5_1/widget.js"));
}

#[tokio::test]
async fn directory_globals_apply_to_sibling_scripts() {
    let mut tree = SourceTree::new();
    tree.write("app", "ui/globals.json", r#"{"theme":"dark"}"#);
    tree.write("app", "ui/widget.js", "style(dopeVars.theme);");

    let pipeline = passthrough_pipeline(fixed_version("1")).await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].contents, br#"style("dark");"#);
}

#[tokio::test]
async fn entry_file_carries_dispatch_metadata() {
    let mut tree = SourceTree::new();
    tree.write(
        "app",
        "api.js",
        "load(dopeVars.prefix, dopeVars.version, dopeVars.isES6);",
    );

    let pipeline = passthrough_pipeline(PipelineOptions {
        prefix: Some("/static/scripts".to_string()),
        targets: vec![Target::Es5, Target::Es6],
        ..fixed_version("9")
    })
    .await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].contents, br#"load("/static/scripts", "9", true);"#);
    assert_eq!(out[0].destination, PathBuf::from("api.js"));
}

#[tokio::test]
async fn unchanged_files_hit_the_cache_across_runs() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.js", "let w;");

    let compiler = RecordingCompiler::new();
    let cache: Arc<dyn CompileCache> = Arc::new(MtimeCache::new());

    for _ in 0..2 {
        let pipeline = build_pipeline(PipelineOptions {
            cache: Some(Arc::clone(&cache)),
            compiler: compiler.clone(),
            mode: Some(Mode::Debug),
            ..fixed_version("5")
        })
        .await
        .unwrap();
        let out = run_files(&pipeline, tree.stream()).await.unwrap();
        assert_eq!(out[0].contents, b"compiled[let w;]");
    }

    assert_eq!(
        compiler.count(),
        1,
        "second run must not invoke the compiler"
    );
}

#[tokio::test]
async fn touched_files_recompile_on_the_next_run() {
    let mut tree = SourceTree::new();
    let path = tree.write("app", "widget.js", "let w;");

    let compiler = RecordingCompiler::new();
    let cache: Arc<dyn CompileCache> = Arc::new(MtimeCache::new());

    let run = |compiler: Arc<RecordingCompiler>, cache: Arc<dyn CompileCache>, files| async move {
        let pipeline = build_pipeline(PipelineOptions {
            cache: Some(cache),
            compiler,
            mode: Some(Mode::Debug),
            ..fixed_version("5")
        })
        .await
        .unwrap();
        run_files(&pipeline, files).await.unwrap()
    };

    run(compiler.clone(), Arc::clone(&cache), tree.stream()).await;
    set_mtime(&path, 60);
    run(compiler.clone(), Arc::clone(&cache), tree.stream()).await;

    assert_eq!(compiler.count(), 2);
}

#[tokio::test]
async fn sidecar_changes_recompile_unchanged_files() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.json", r#"{"color":"red"}"#);
    let sidecar_index = 0;
    tree.write("app", "widget.js", "paint(dopeVars.color);");

    let compiler = RecordingCompiler::new();
    let cache: Arc<dyn CompileCache> = Arc::new(MtimeCache::new());

    let pipeline = build_pipeline(PipelineOptions {
        cache: Some(Arc::clone(&cache)),
        compiler: compiler.clone(),
        mode: Some(Mode::Debug),
        ..fixed_version("5")
    })
    .await
    .unwrap();
    let out = run_files(&pipeline, tree.stream()).await.unwrap();
    assert_eq!(out[0].contents, br#"compiled[paint("red");]"#);

    // Rewrite the sidecar; the script itself is untouched.
    let (sidecar_path, _) = &tree.files[sidecar_index];
    fs::write(sidecar_path, r#"{"color":"blue"}"#).unwrap();
    set_mtime(sidecar_path, 0);

    let pipeline = build_pipeline(PipelineOptions {
        cache: Some(Arc::clone(&cache)),
        compiler: compiler.clone(),
        mode: Some(Mode::Debug),
        ..fixed_version("5")
    })
    .await
    .unwrap();
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out[0].contents, br#"compiled[paint("blue");]"#);
    assert_eq!(compiler.count(), 2);
}

#[tokio::test]
async fn unsupported_sidecar_value_fails_when_referenced() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.json", r#"{"palette":["red","blue"]}"#);
    tree.write("app", "widget.js", "use(dopeVars.palette);");

    let pipeline = passthrough_pipeline(fixed_version("1")).await;
    let result = run_files(&pipeline, tree.stream()).await;

    assert!(matches!(
        result,
        Err(dopack::PipelineError::UnsupportedSubstitution { ref name, .. }) if name == "palette"
    ));
}

#[tokio::test]
async fn fanned_out_copies_share_cache_buckets_across_runs() {
    // Two runs with the same version factory output resolve fan-out copies
    // of one source to the same (identity, profile) buckets.
    let mut tree = SourceTree::new();
    tree.write("app", "widget.js", "let w;");

    let compiler = RecordingCompiler::new();
    let cache: Arc<dyn CompileCache> = Arc::new(MtimeCache::new());

    for _ in 0..2 {
        let pipeline = build_pipeline(PipelineOptions {
            targets: vec![Target::Es5, Target::Es6],
            cache: Some(Arc::clone(&cache)),
            compiler: compiler.clone(),
            mode: Some(Mode::Debug),
            ..fixed_version("5")
        })
        .await
        .unwrap();
        run_files(&pipeline, tree.stream()).await.unwrap();
    }

    // One compile per profile, none repeated in the second run.
    assert_eq!(compiler.count(), 2);
}

#[tokio::test]
async fn later_sidecars_for_a_registered_key_are_ignored() {
    let mut tree = SourceTree::new();
    tree.write("app", "widget.json", r#"{"color":"red"}"#);
    tree.write("app", "widget.js", "paint(dopeVars.color);");
    tree.write("lib", "widget.json", r#"{"color":"blue"}"#);

    let pipeline = passthrough_pipeline(fixed_version("1")).await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].contents, br#"paint("red");"#);
}

#[tokio::test]
async fn variables_mixing_layers_resolve_with_injected_winning() {
    let mut tree = SourceTree::new();
    tree.write("app", "ui/globals.json", r#"{"color":"dir","theme":"dark"}"#);
    tree.write("app", "ui/widget.json", r#"{"color":"file"}"#);
    tree.write("app", "ui/widget.js", "use(dopeVars.color, dopeVars.theme);");
    tree.write("app", "api.js", "boot(dopeVars.version);");

    let pipeline = passthrough_pipeline(fixed_version("3")).await;
    let out = run_files(&pipeline, tree.stream()).await.unwrap();

    let widget = out
        .iter()
        .find(|f| f.relative == PathBuf::from("ui/widget.js"))
        .unwrap();
    assert_eq!(widget.contents, br#"use("file", "dark");"#);

    let entry = out
        .iter()
        .find(|f| f.relative == PathBuf::from("api.js"))
        .unwrap();
    assert_eq!(entry.contents, br#"boot("3");"#);
    assert_eq!(entry.variables.get("version"), Some(&json!("3")));
}
