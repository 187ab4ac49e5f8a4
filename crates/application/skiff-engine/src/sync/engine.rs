use camino::Utf8Path;
use skiff_core::formats::checksum_doc::{self, REMOTE_MANIFEST_PATH};
use skiff_core::path_utils::SyncPath;
use skiff_core::{
    diff, ChangeRecord, DeploymentResult, DiffOptions, ExclusionMatcher, FileEntry, Manifest,
    Transport, Update,
};
use skiff_scanner::Scanner;
use tracing::{debug, info, warn};

use crate::sync::SyncError;

/// The outcome of planning one deployment: the validated change set plus
/// the baseline manifest to persist after a real (non-dry) run. The
/// baseline is returned as a value; whether and where to store it is the
/// orchestrator's decision ([`DeployEngine::store_baseline`] writes it
/// through the transport for callers that want that).
#[derive(Debug)]
pub struct DeploymentPlan {
    pub result: DeploymentResult,
    pub next_baseline: Manifest,
}

/// Plans deployments over any protocol that implements the [`Transport`]
/// capability interface. The engine itself never opens connections; it
/// receives a live session from the transport collaborator.
pub struct DeployEngine<T: Transport> {
    transport: T,
}

impl<T: Transport> DeployEngine<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Fetch the stored baseline manifest. An absent document is a normal
    /// condition (first deployment) and yields `None`; an undecodable one
    /// is surfaced so the caller can decide whether to fall back to a full
    /// diff or abort. Paths that would escape the deployment root are
    /// dropped, not trusted.
    pub fn load_baseline(&mut self) -> Result<Option<Manifest>, SyncError> {
        if !self.transport.exists(REMOTE_MANIFEST_PATH)? {
            debug!("no baseline manifest on remote");
            return Ok(None);
        }
        let bytes = self.transport.read(REMOTE_MANIFEST_PATH)?;
        let stored = checksum_doc::decode(&bytes)?;

        let mut baseline = Manifest::new();
        for (path, digest) in stored.iter() {
            if SyncPath::is_safe(path) {
                baseline.insert(path, digest);
            } else {
                warn!("dropping unsafe path from remote manifest: {path}");
            }
        }
        Ok(Some(baseline))
    }

    /// Persist a baseline manifest to its well-known remote location.
    pub fn store_baseline(&mut self, manifest: &Manifest) -> Result<(), SyncError> {
        let bytes = checksum_doc::encode(manifest)?;
        self.transport.write(REMOTE_MANIFEST_PATH, &bytes)?;
        info!(files = manifest.len(), "baseline manifest stored");
        Ok(())
    }

    /// Diff a whole-tree scan against the stored baseline.
    pub fn plan(
        &mut self,
        local_root: &Utf8Path,
        local: &[FileEntry],
        opts: &DiffOptions,
    ) -> Result<DeploymentPlan, SyncError> {
        let baseline = self.load_baseline()?;
        self.plan_with_baseline(local_root, local, baseline.as_ref(), opts, false)
    }

    /// Diff a scan restricted to an explicit path subset. The next baseline
    /// is then the union of the previous manifest and the subset entries,
    /// never a wholesale replacement, so untouched remote paths keep their
    /// digests.
    pub fn plan_subset(
        &mut self,
        local_root: &Utf8Path,
        local: &[FileEntry],
        opts: &DiffOptions,
    ) -> Result<DeploymentPlan, SyncError> {
        let baseline = self.load_baseline()?;
        self.plan_with_baseline(local_root, local, baseline.as_ref(), opts, true)
    }

    /// Scan and plan in one step for whole-tree runs.
    pub fn plan_tree(
        &mut self,
        local_root: &Utf8Path,
        excludes: &ExclusionMatcher,
        opts: &DiffOptions,
    ) -> Result<DeploymentPlan, SyncError> {
        let scan = Scanner::scan_tree(local_root, excludes)?;
        self.plan(local_root, &scan.entries, opts)
    }

    /// Plan against a caller-supplied baseline. Lets an orchestrator that
    /// caught a [`SyncError::Document`] retry with `None` once it decided
    /// the corrupt document should count as "no baseline".
    pub fn plan_with_baseline(
        &mut self,
        local_root: &Utf8Path,
        local: &[FileEntry],
        baseline: Option<&Manifest>,
        opts: &DiffOptions,
        subset: bool,
    ) -> Result<DeploymentPlan, SyncError> {
        let records = diff(local, baseline, opts, &mut self.transport, local_root)?;
        debug!(records = records.len(), "deployment plan computed");

        let next_baseline = next_baseline(baseline, local, &records, subset);
        let result = DeploymentResult::new(records)?;
        Ok(DeploymentPlan {
            result,
            next_baseline,
        })
    }
}

fn next_baseline(
    previous: Option<&Manifest>,
    local: &[FileEntry],
    records: &[ChangeRecord],
    subset: bool,
) -> Manifest {
    let mut next = if subset {
        previous.cloned().unwrap_or_default()
    } else {
        Manifest::new()
    };
    for entry in local {
        next.insert(entry.path.clone(), entry.digest.clone());
    }
    // Digests of paths the plan removes must not survive the run.
    for record in records {
        if record.update == Update::Deleted {
            next.remove(&record.filename);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_core::{Reason, TransportError};
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    /// In-memory remote, keyed by relative path.
    #[derive(Default)]
    struct MemoryRemote {
        files: BTreeMap<String, Vec<u8>>,
    }

    impl Transport for MemoryRemote {
        fn exists(&mut self, rel: &str) -> Result<bool, TransportError> {
            Ok(self.files.contains_key(rel))
        }

        fn size(&mut self, rel: &str) -> Result<Option<u64>, TransportError> {
            Ok(self.files.get(rel).map(|d| d.len() as u64))
        }

        fn read(&mut self, rel: &str) -> Result<Vec<u8>, TransportError> {
            self.files
                .get(rel)
                .cloned()
                .ok_or_else(|| TransportError::NotFound(rel.to_string()))
        }

        fn write(&mut self, rel: &str, data: &[u8]) -> Result<(), TransportError> {
            self.files.insert(rel.to_string(), data.to_vec());
            Ok(())
        }

        fn mkdir(&mut self, _rel: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn delete(&mut self, rel: &str) -> Result<(), TransportError> {
            self.files.remove(rel);
            Ok(())
        }
    }

    fn entry(path: &str, digest: &str) -> FileEntry {
        FileEntry {
            path: path.to_string(),
            size: 16,
            digest: digest.to_string(),
        }
    }

    fn seeded_remote(baseline: &[(&str, &str)]) -> MemoryRemote {
        let manifest: Manifest = baseline
            .iter()
            .map(|(p, d)| (p.to_string(), d.to_string()))
            .collect();
        let mut remote = MemoryRemote::default();
        remote
            .write(
                REMOTE_MANIFEST_PATH,
                &checksum_doc::encode(&manifest).unwrap(),
            )
            .unwrap();
        remote
    }

    const ROOT: &str = "/work/site";

    #[test]
    fn load_baseline_distinguishes_absent_from_corrupt() {
        let mut engine = DeployEngine::new(MemoryRemote::default());
        assert!(engine.load_baseline().unwrap().is_none());

        let mut remote = MemoryRemote::default();
        remote
            .write(REMOTE_MANIFEST_PATH, b"definitely not gzip")
            .unwrap();
        let mut engine = DeployEngine::new(remote);
        assert!(matches!(
            engine.load_baseline().unwrap_err(),
            SyncError::Document(_)
        ));
    }

    #[test]
    fn load_baseline_drops_traversal_paths() {
        let mut engine = DeployEngine::new(seeded_remote(&[
            ("good.txt", "aa"),
            ("../escape.txt", "bb"),
        ]));
        let baseline = engine.load_baseline().unwrap().unwrap();
        assert_eq!(baseline.len(), 1);
        assert!(baseline.contains("good.txt"));
    }

    #[test]
    fn plan_produces_result_and_replacement_baseline() {
        let mut engine = DeployEngine::new(seeded_remote(&[("a", "h1"), ("gone", "h9")]));
        let local = vec![entry("a", "h1-new"), entry("b", "h2")];
        let opts = DiffOptions {
            delete: true,
            ..Default::default()
        };

        let plan = engine.plan(Utf8Path::new(ROOT), &local, &opts).unwrap();

        assert_eq!(plan.result.count_of(Update::Sent), 1);
        assert_eq!(plan.result.count_of(Update::Created), 1);
        assert_eq!(plan.result.count_of(Update::Deleted), 1);

        // Whole-tree run: the baseline is the fresh local manifest.
        assert_eq!(plan.next_baseline.len(), 2);
        assert_eq!(plan.next_baseline.digest("a"), Some("h1-new"));
        assert_eq!(plan.next_baseline.digest("b"), Some("h2"));
        assert!(!plan.next_baseline.contains("gone"));
    }

    #[test]
    fn subset_plan_unions_previous_baseline() {
        let mut engine = DeployEngine::new(seeded_remote(&[
            ("app/a.php", "h1"),
            ("web/index.php", "h5"),
        ]));
        // Only app/ was scanned this run.
        let local = vec![entry("app/a.php", "h1-new"), entry("app/b.php", "h2")];

        let plan = engine
            .plan_subset(Utf8Path::new(ROOT), &local, &DiffOptions::default())
            .unwrap();

        assert_eq!(plan.result.len(), 2);
        // Untouched remote paths keep their digests.
        assert_eq!(plan.next_baseline.digest("web/index.php"), Some("h5"));
        assert_eq!(plan.next_baseline.digest("app/a.php"), Some("h1-new"));
        assert_eq!(plan.next_baseline.digest("app/b.php"), Some("h2"));
    }

    #[test]
    fn stored_baseline_round_trips() {
        let mut engine = DeployEngine::new(MemoryRemote::default());
        let mut manifest = Manifest::new();
        manifest.insert("x", "00ff");
        engine.store_baseline(&manifest).unwrap();
        assert_eq!(engine.load_baseline().unwrap(), Some(manifest));
    }

    #[test]
    fn full_plan_uses_live_probes_when_manifest_is_corrupt() {
        let mut remote = MemoryRemote::default();
        remote.write(REMOTE_MANIFEST_PATH, b"garbage").unwrap();
        remote.write("kept.bin", &[0u8; 16]).unwrap();
        let mut engine = DeployEngine::new(remote);

        // The orchestrator saw the Document error and chose full mode with
        // no baseline rather than aborting.
        let local = vec![entry("kept.bin", "h1"), entry("fresh.bin", "h2")];
        let opts = DiffOptions {
            full: true,
            ..Default::default()
        };
        let plan = engine
            .plan_with_baseline(Utf8Path::new(ROOT), &local, None, &opts, false)
            .unwrap();

        let names: Vec<(&str, Update)> = plan
            .result
            .iter()
            .map(|r| (r.filename.as_str(), r.update))
            .collect();
        assert_eq!(names, [("fresh.bin", Update::Created)]);
        assert_eq!(
            plan.result.records()[0].reason,
            BTreeSet::from([Reason::Missing])
        );
    }
}
