use anyhow::{Context, Result};
use std::path::Path;
use walkdir::WalkDir;

use crate::catalog::{Catalog, Studio};
use crate::reconcile::{reconcile_folder, Outcome, PerformerIndex};

#[derive(Debug, Default)]
pub struct RunStats {
    pub folders: usize,
    pub tagged: usize,
    pub images_tagged: usize,
    pub scenes_tagged: usize,
    pub skipped_no_performer: usize,
    pub skipped_no_studio: usize,
    pub failed: usize,
}

/// Drives one run: snapshot fetch, then one folder at a time.
pub struct Runner<C: Catalog> {
    catalog: C,
    stats: RunStats,
}

impl<C: Catalog> Runner<C> {
    pub fn new(catalog: C) -> Self {
        Runner {
            catalog,
            stats: RunStats::default(),
        }
    }

    pub fn run(&mut self, root: &Path) -> Result<()> {
        let base_name = root
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .with_context(|| format!("root path has no usable folder name: {}", root.display()))?;

        tracing::info!(root = %root.display(), "scanning for performer folders");
        let folders = list_subfolders(root)?;
        tracing::info!(count = folders.len(), "found folders to reconcile");

        // Global snapshots, fetched once per run. Either failing is fatal:
        // nothing can resolve without them.
        let performers = self
            .catalog
            .list_performers()
            .context("failed to fetch performer snapshot")?;
        let studios = self
            .catalog
            .list_studios()
            .context("failed to fetch studio snapshot")?;
        tracing::info!(
            performers = performers.len(),
            studios = studios.len(),
            "fetched catalog snapshots"
        );

        let index = PerformerIndex::new(performers);
        self.process_folders(&index, &studios, &base_name, &folders);

        self.print_summary();
        Ok(())
    }

    fn process_folders(
        &mut self,
        performers: &PerformerIndex,
        studios: &[Studio],
        base_name: &str,
        folders: &[String],
    ) {
        for folder in folders {
            self.stats.folders += 1;

            match reconcile_folder(&self.catalog, performers, studios, base_name, folder) {
                Ok(Outcome::Tagged { images, scenes }) => {
                    self.stats.tagged += 1;
                    self.stats.images_tagged += images;
                    self.stats.scenes_tagged += scenes;
                    tracing::info!(folder = %folder, images, scenes, "tagged");
                }
                Ok(Outcome::SkippedNoPerformer) => {
                    self.stats.skipped_no_performer += 1;
                    tracing::info!(folder = %folder, "skipped: no matching performer");
                }
                Ok(Outcome::SkippedNoStudio) => {
                    self.stats.skipped_no_studio += 1;
                    tracing::info!(folder = %folder, "skipped: no studio matches root folder name");
                }
                Err(e) => {
                    // One folder failing must not stop the rest of the run.
                    self.stats.failed += 1;
                    tracing::error!(folder = %folder, error = %format!("{e:#}"), "failed");
                }
            }
        }
    }

    fn print_summary(&self) {
        let stats = &self.stats;

        println!();
        println!("=== RUN COMPLETE ===");
        println!("Folders processed: {}", stats.folders);
        println!(
            "Tagged: {} ({} images, {} scenes)",
            stats.tagged, stats.images_tagged, stats.scenes_tagged
        );
        println!("Skipped (no performer): {}", stats.skipped_no_performer);
        println!("Skipped (no studio): {}", stats.skipped_no_studio);
        println!("Failed: {}", stats.failed);
    }

    #[cfg(test)]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }
}

/// Names of the immediate subdirectories of `root`, in filesystem order.
/// Hidden directories are skipped, as are entries the walker cannot read.
pub fn list_subfolders(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        anyhow::bail!("root path is not a directory: {}", root.display());
    }

    let mut folders = Vec::new();

    for entry_result in WalkDir::new(root).min_depth(1).max_depth(1).into_iter() {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                if let Some(path) = err.path() {
                    tracing::warn!(path = %path.display(), error = %err, "failed to access entry");
                } else {
                    tracing::warn!(error = %err, "walkdir error");
                }
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let name = match entry.file_name().to_str() {
            Some(n) => n,
            None => {
                tracing::warn!(path = %entry.path().display(), "skipping non-UTF-8 folder name");
                continue;
            }
        };

        if name.starts_with('.') {
            continue;
        }

        folders.push(name.to_string());
    }

    Ok(folders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, MediaKind, Performer, Studio};
    use std::cell::RefCell;
    use std::fs;

    struct FlakyCatalog {
        performers: Vec<Performer>,
        studios: Vec<Studio>,
        fail_fragment: String,
        performer_fetches: RefCell<usize>,
        studio_fetches: RefCell<usize>,
        tag_calls: RefCell<Vec<(MediaKind, Vec<String>)>>,
    }

    impl Catalog for FlakyCatalog {
        fn list_performers(&self) -> Result<Vec<Performer>, CatalogError> {
            *self.performer_fetches.borrow_mut() += 1;
            Ok(self.performers.clone())
        }

        fn list_studios(&self) -> Result<Vec<Studio>, CatalogError> {
            *self.studio_fetches.borrow_mut() += 1;
            Ok(self.studios.clone())
        }

        fn find_media(
            &self,
            _kind: MediaKind,
            path_fragment: &str,
        ) -> Result<Vec<String>, CatalogError> {
            if path_fragment.contains(&self.fail_fragment) {
                return Err(CatalogError::Decode("connection reset".to_string()));
            }
            Ok(vec!["42".to_string()])
        }

        fn bulk_tag(
            &self,
            kind: MediaKind,
            ids: &[String],
            _performer_id: &str,
            _studio_id: Option<&str>,
        ) -> Result<(), CatalogError> {
            self.tag_calls.borrow_mut().push((kind, ids.to_vec()));
            Ok(())
        }
    }

    fn catalog_with(fail_fragment: &str) -> FlakyCatalog {
        FlakyCatalog {
            performers: vec![
                Performer {
                    id: "1".to_string(),
                    name: "Bad Actor".to_string(),
                    alias_list: vec![],
                },
                Performer {
                    id: "2".to_string(),
                    name: "Jane Doe".to_string(),
                    alias_list: vec![],
                },
            ],
            studios: vec![Studio {
                id: "9".to_string(),
                name: "Exclusive Content".to_string(),
            }],
            fail_fragment: fail_fragment.to_string(),
            performer_fetches: RefCell::new(0),
            studio_fetches: RefCell::new(0),
            tag_calls: RefCell::new(Vec::new()),
        }
    }

    /// Catalog whose snapshot fetches always fail; media operations must
    /// never be reached when the snapshots are missing.
    struct DeadCatalog;

    impl Catalog for DeadCatalog {
        fn list_performers(&self) -> Result<Vec<Performer>, CatalogError> {
            Err(CatalogError::Decode("connection refused".to_string()))
        }

        fn list_studios(&self) -> Result<Vec<Studio>, CatalogError> {
            Err(CatalogError::Decode("connection refused".to_string()))
        }

        fn find_media(
            &self,
            _kind: MediaKind,
            _path_fragment: &str,
        ) -> Result<Vec<String>, CatalogError> {
            unreachable!("media lookup without a snapshot")
        }

        fn bulk_tag(
            &self,
            _kind: MediaKind,
            _ids: &[String],
            _performer_id: &str,
            _studio_id: Option<&str>,
        ) -> Result<(), CatalogError> {
            unreachable!("bulk tag without a snapshot")
        }
    }

    #[test]
    fn test_one_folder_failing_does_not_stop_the_run() {
        let catalog = catalog_with("Bad Actor");
        let mut runner = Runner::new(catalog);

        let index = PerformerIndex::new(runner.catalog.list_performers().unwrap());
        let studios = runner.catalog.list_studios().unwrap();
        let folders = vec!["Bad Actor".to_string(), "Jane Doe".to_string()];

        runner.process_folders(&index, &studios, "Exclusive Content", &folders);

        let stats = runner.stats();
        assert_eq!(stats.folders, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.tagged, 1);
        // Both kinds tagged for the folder that survived.
        assert_eq!(runner.catalog.tag_calls.borrow().len(), 2);
    }

    #[test]
    fn test_skips_are_counted_separately_from_failures() {
        let catalog = catalog_with("never-matches");
        let mut runner = Runner::new(catalog);

        let index = PerformerIndex::new(runner.catalog.list_performers().unwrap());
        let studios = runner.catalog.list_studios().unwrap();
        let folders = vec!["Unknown Person".to_string(), "Jane Doe".to_string()];

        runner.process_folders(&index, &studios, "Exclusive Content", &folders);

        let stats = runner.stats();
        assert_eq!(stats.skipped_no_performer, 1);
        assert_eq!(stats.tagged, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn test_snapshot_fetch_failure_aborts_before_any_folder() {
        let root =
            std::env::temp_dir().join(format!("stash_tagger_test_dead_{}", std::process::id()));
        fs::create_dir_all(root.join("Jane Doe")).unwrap();

        let mut runner = Runner::new(DeadCatalog);
        let result = runner.run(&root);

        assert!(result.is_err());
        assert_eq!(runner.stats().folders, 0);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_run_fetches_snapshots_exactly_once() {
        let root =
            std::env::temp_dir().join(format!("stash_tagger_test_run_{}", std::process::id()));
        fs::create_dir_all(root.join("Jane Doe")).unwrap();
        fs::create_dir_all(root.join("Bad Actor")).unwrap();

        let mut runner = Runner::new(catalog_with("never-matches"));
        runner.run(&root).unwrap();

        assert_eq!(*runner.catalog.performer_fetches.borrow(), 1);
        assert_eq!(*runner.catalog.studio_fetches.borrow(), 1);

        // The temp root's name matches no studio, so every folder skips,
        // but all of them are still processed.
        let stats = runner.stats();
        assert_eq!(stats.folders, 2);
        assert_eq!(stats.skipped_no_studio, 2);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_list_subfolders_only_immediate_visible_directories() {
        let root = std::env::temp_dir().join(format!("stash_tagger_test_{}", std::process::id()));
        fs::create_dir_all(root.join("Jane Doe/nested")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::write(root.join("stray_file.txt"), b"x").unwrap();

        let mut folders = list_subfolders(&root).unwrap();
        folders.sort();

        assert_eq!(folders, vec!["Jane Doe".to_string()]);

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_list_subfolders_rejects_missing_root() {
        let root = std::env::temp_dir().join("stash_tagger_test_does_not_exist");
        assert!(list_subfolders(&root).is_err());
    }
}
