/// Per-file compile memoization
///
/// Results are keyed by (stable source identity, compilation profile) and
/// validated against the file's on-disk modification time plus deep equality
/// of the bound-variable context. A stale entry is discarded wholesale and
/// replaced, never patched.
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::asset::Variables;
use crate::compiler::{CompileFuture, CompileOutput, Profile};
use crate::error::PipelineError;

/// Deferred computation handed to the cache on a miss.
pub type ComputeFn = Box<dyn FnOnce() -> CompileFuture + Send>;

type CacheFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompileOutput, PipelineError>> + Send + 'a>>;

/// Memoization seam between the compile stage and the external compiler.
///
/// `variables` is the invalidation context; `None` and an empty mapping are
/// equivalent.
pub trait CompileCache: Send + Sync {
    fn get_or_add<'a>(
        &'a self,
        identity: &Path,
        profile: Profile,
        variables: Option<&Variables>,
        compute: ComputeFn,
    ) -> CacheFuture<'a>;
}

/// Last known compiled state of one (identity, profile) pair.
#[derive(Debug)]
struct CacheEntry {
    mtime: SystemTime,
    variables: Variables,
    /// None until the first successful compile for this entry.
    result: Option<CompileOutput>,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Mtime-and-variables keyed cache, shareable across pipeline invocations.
///
/// Each (identity, profile) key owns a slot guarded by an async mutex held
/// across the stat-validate-compute sequence, so overlapping `get_or_add`
/// calls for the same key run at most one compute. Distinct keys never
/// contend.
#[derive(Default)]
pub struct MtimeCache {
    slots: Mutex<HashMap<(PathBuf, Profile), Slot>>,
}

impl MtimeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompileCache for MtimeCache {
    fn get_or_add<'a>(
        &'a self,
        identity: &Path,
        profile: Profile,
        variables: Option<&Variables>,
        compute: ComputeFn,
    ) -> CacheFuture<'a> {
        let identity = identity.to_path_buf();
        let variables = variables.cloned().unwrap_or_default();

        Box::pin(async move {
            let slot = {
                let mut slots = self.slots.lock().await;
                Arc::clone(
                    slots
                        .entry((identity.clone(), profile))
                        .or_insert_with(Slot::default),
                )
            };
            let mut entry = slot.lock().await;

            // The stat is the validation point: a file deleted mid-run fails
            // here and no entry is written.
            let metadata = tokio::fs::metadata(&identity)
                .await
                .map_err(|source| PipelineError::fs(&identity, source))?;
            let mtime = metadata
                .modified()
                .map_err(|source| PipelineError::fs(&identity, source))?;

            let valid = entry
                .as_ref()
                .is_some_and(|e| e.mtime == mtime && e.variables == variables);
            if !valid {
                *entry = Some(CacheEntry {
                    mtime,
                    variables,
                    result: None,
                });
            }

            if let Some(result) = entry.as_ref().and_then(|e| e.result.as_ref()) {
                debug!(
                    operation = "cache.get",
                    status = "hit",
                    identity = %identity.display(),
                    profile = %profile,
                    "returning memoized output"
                );
                return Ok(result.clone());
            }

            debug!(
                operation = "cache.get",
                status = "miss",
                identity = %identity.display(),
                profile = %profile,
                "running compute"
            );
            let result = compute().await?;
            if let Some(e) = entry.as_mut() {
                e.result = Some(result.clone());
            }
            Ok(result)
        })
    }
}

/// Opt-out collaborator: always computes, never memoizes.
pub struct PassthroughCache;

impl CompileCache for PassthroughCache {
    fn get_or_add<'a>(
        &'a self,
        _identity: &Path,
        _profile: Profile,
        _variables: Option<&Variables>,
        compute: ComputeFn,
    ) -> CacheFuture<'a> {
        Box::pin(async move { compute().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Mode, Target};
    use serde_json::json;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn profile() -> Profile {
        Profile::new(Target::Es5, Mode::Debug)
    }

    fn counting_compute(counter: &Arc<AtomicUsize>, code: &str) -> ComputeFn {
        let counter = Arc::clone(counter);
        let code = code.to_string();
        Box::new(move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(CompileOutput {
                    code,
                    source_map: None,
                })
            })
        })
    }

    fn touch(path: &Path, offset_secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + offset_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn second_identical_call_is_a_hit() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let vars = Variables::from([("color".to_string(), json!("red"))]);

        let first = cache
            .get_or_add(&path, profile(), Some(&vars), counting_compute(&counter, "a"))
            .await
            .unwrap();
        let second = cache
            .get_or_add(&path, profile(), Some(&vars), counting_compute(&counter, "b"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second.code, "a");
    }

    #[tokio::test]
    async fn mtime_change_invalidates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "a"))
            .await
            .unwrap();

        touch(&path, 10);
        let second = cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "b"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(second.code, "b");
    }

    #[tokio::test]
    async fn variable_change_invalidates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let red = Variables::from([("color".to_string(), json!("red"))]);
        let blue = Variables::from([("color".to_string(), json!("blue"))]);

        cache
            .get_or_add(&path, profile(), Some(&red), counting_compute(&counter, "a"))
            .await
            .unwrap();
        let second = cache
            .get_or_add(&path, profile(), Some(&blue), counting_compute(&counter, "b"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(second.code, "b");
    }

    #[tokio::test]
    async fn absent_and_empty_variables_are_equivalent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let empty = Variables::new();

        cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "a"))
            .await
            .unwrap();
        cache
            .get_or_add(&path, profile(), Some(&empty), counting_compute(&counter, "b"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn profiles_have_independent_buckets() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "a"))
            .await
            .unwrap();
        cache
            .get_or_add(
                &path,
                Profile::new(Target::Es6, Mode::Debug),
                None,
                counting_compute(&counter, "b"),
            )
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_file_is_a_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.js");

        let cache = MtimeCache::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let result = cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "a"))
            .await;

        assert!(matches!(result, Err(PipelineError::Filesystem { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlapping_calls_for_one_key_compute_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();
        touch(&path, 0);

        let cache = Arc::new(MtimeCache::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let slow_compute = || -> ComputeFn {
            let counter = Arc::clone(&counter);
            Box::new(move || {
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(25)).await;
                    Ok(CompileOutput {
                        code: "slow".to_string(),
                        source_map: None,
                    })
                })
            })
        };

        let (a, b) = tokio::join!(
            cache.get_or_add(&path, profile(), None, slow_compute()),
            cache.get_or_add(&path, profile(), None, slow_compute()),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn passthrough_cache_always_computes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("widget.js");
        fs::write(&path, "let x;").unwrap();

        let cache = PassthroughCache;
        let counter = Arc::new(AtomicUsize::new(0));

        cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "a"))
            .await
            .unwrap();
        cache
            .get_or_add(&path, profile(), None, counting_compute(&counter, "b"))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
