use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::MAIN_SEPARATOR;

use crate::catalog::{Catalog, MediaKind, Performer, Studio};

/// What happened to one folder. Created per folder, logged, discarded.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Tagged { images: usize, scenes: usize },
    SkippedNoPerformer,
    SkippedNoStudio,
}

/// Name/alias lookup built once per run from the performer snapshot.
///
/// Keys are inserted in catalog return order with first-writer-wins, so a
/// folder name shared between performers resolves to the earliest one, the
/// same tie-break a linear first-match scan would give. Matching is exact
/// and case-sensitive.
pub struct PerformerIndex {
    performers: Vec<Performer>,
    by_name: HashMap<String, usize>,
}

impl PerformerIndex {
    pub fn new(performers: Vec<Performer>) -> Self {
        let mut by_name = HashMap::new();
        for (i, performer) in performers.iter().enumerate() {
            by_name.entry(performer.name.clone()).or_insert(i);
            for alias in &performer.alias_list {
                by_name.entry(alias.clone()).or_insert(i);
            }
        }
        PerformerIndex {
            performers,
            by_name,
        }
    }

    pub fn resolve(&self, folder_name: &str) -> Option<&Performer> {
        self.by_name.get(folder_name).map(|&i| &self.performers[i])
    }
}

/// First studio whose name equals the root folder's own name.
pub fn resolve_studio<'a>(studios: &'a [Studio], base_name: &str) -> Option<&'a Studio> {
    studios.iter().find(|s| s.name == base_name)
}

/// Substring the catalog matches stored media paths against. Built from the
/// performer's canonical name and wrapped in separators so a performer named
/// "Jane" never matches paths under "Jane Smith".
pub fn media_path_fragment(performer_name: &str) -> String {
    format!("{MAIN_SEPARATOR}{performer_name}{MAIN_SEPARATOR}")
}

/// One folder, start to finish: resolve performer and studio, find matching
/// media, tag it. Resolution misses are skips; catalog failures are errors
/// for the driver to isolate.
pub fn reconcile_folder<C: Catalog>(
    catalog: &C,
    performers: &PerformerIndex,
    studios: &[Studio],
    base_name: &str,
    folder_name: &str,
) -> Result<Outcome> {
    let performer = match performers.resolve(folder_name) {
        Some(p) => p,
        None => return Ok(Outcome::SkippedNoPerformer),
    };

    let studio = match resolve_studio(studios, base_name) {
        Some(s) => s,
        None => return Ok(Outcome::SkippedNoStudio),
    };

    // The catalog stores the canonical name in media paths, so an alias
    // match still searches under the performer's real name. The fragment
    // uses this platform's separator; if the catalog indexed paths from
    // another platform the lookups match nothing, so log what was searched.
    let fragment = media_path_fragment(&performer.name);
    tracing::info!(folder = %folder_name, fragment = %fragment, "searching catalog media");

    let images = tag_media(catalog, MediaKind::Image, &fragment, performer, studio)?;
    let scenes = tag_media(catalog, MediaKind::Scene, &fragment, performer, studio)?;

    Ok(Outcome::Tagged { images, scenes })
}

fn tag_media<C: Catalog>(
    catalog: &C,
    kind: MediaKind,
    fragment: &str,
    performer: &Performer,
    studio: &Studio,
) -> Result<usize> {
    let ids = catalog
        .find_media(kind, fragment)
        .with_context(|| format!("{} lookup failed for '{}'", kind, performer.name))?;

    if ids.is_empty() {
        return Ok(0);
    }

    catalog
        .bulk_tag(kind, &ids, &performer.id, Some(&studio.id))
        .with_context(|| format!("bulk {} update failed for '{}'", kind, performer.name))?;

    tracing::debug!(
        kind = %kind,
        performer = %performer.name,
        count = ids.len(),
        "tagged media"
    );

    Ok(ids.len())
}
