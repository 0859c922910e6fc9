use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// A performer record as the catalog returns it. Read-only on our side.
#[derive(Debug, Clone, Deserialize)]
pub struct Performer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias_list: Vec<String>,
}

/// A studio record. Read-only on our side.
#[derive(Debug, Clone, Deserialize)]
pub struct Studio {
    pub id: String,
    pub name: String,
}

/// Images and scenes are parallel variants of the same shape; the kind only
/// selects which query/mutation pair the client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Scene,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Scene => write!(f, "scene"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("catalog returned errors: {0}")]
    Graphql(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// The four logical operations the run needs from the remote catalog.
///
/// Every call is a single round trip with no retries. Failures come back as
/// `Err(CatalogError)` so callers can tell "zero records" from "request
/// failed"; the two are distinct outcomes, not both empty.
pub trait Catalog {
    fn list_performers(&self) -> Result<Vec<Performer>, CatalogError>;
    fn list_studios(&self) -> Result<Vec<Studio>, CatalogError>;
    fn find_media(&self, kind: MediaKind, path_fragment: &str) -> Result<Vec<String>, CatalogError>;
    fn bulk_tag(
        &self,
        kind: MediaKind,
        ids: &[String],
        performer_id: &str,
        studio_id: Option<&str>,
    ) -> Result<(), CatalogError>;
}

// Fixed query text; user-controlled strings only ever travel in `variables`.
// per_page: -1 asks the catalog for every record in one page.
const LIST_PERFORMERS: &str = "\
query { findPerformers(filter: { per_page: -1 }) { performers { id name alias_list } } }";

const LIST_STUDIOS: &str = "\
query { findStudios(filter: { per_page: -1 }) { studios { id name } } }";

const FIND_IMAGES: &str = "\
query FindImages($fragment: String!) {
  findImages(
    image_filter: { path: { value: $fragment, modifier: INCLUDES } }
    filter: { per_page: -1 }
  ) { images { id } }
}";

const FIND_SCENES: &str = "\
query FindScenes($fragment: String!) {
  findScenes(
    scene_filter: { path: { value: $fragment, modifier: INCLUDES } }
    filter: { per_page: -1 }
  ) { scenes { id } }
}";

const BULK_IMAGE_UPDATE: &str = "\
mutation BulkImageUpdate($input: BulkImageUpdateInput!) {
  bulkImageUpdate(input: $input) { id }
}";

const BULK_SCENE_UPDATE: &str = "\
mutation BulkSceneUpdate($input: BulkSceneUpdateInput!) {
  bulkSceneUpdate(input: $input) { id }
}";

/// Build the `{query, variables}` body for a media lookup.
pub fn find_media_request(kind: MediaKind, path_fragment: &str) -> Value {
    let query = match kind {
        MediaKind::Image => FIND_IMAGES,
        MediaKind::Scene => FIND_SCENES,
    };
    json!({
        "query": query,
        "variables": { "fragment": path_fragment },
    })
}

/// Build the `{query, variables}` body for a bulk tag mutation.
/// Performer association is additive; studio assignment, when present,
/// overwrites whatever the item had.
pub fn bulk_tag_request(
    kind: MediaKind,
    ids: &[String],
    performer_id: &str,
    studio_id: Option<&str>,
) -> Value {
    let query = match kind {
        MediaKind::Image => BULK_IMAGE_UPDATE,
        MediaKind::Scene => BULK_SCENE_UPDATE,
    };
    let mut input = json!({
        "ids": ids,
        "performer_ids": { "mode": "ADD", "ids": [performer_id] },
    });
    if let Some(studio_id) = studio_id {
        input["studio_id"] = json!(studio_id);
    }
    json!({ "query": query, "variables": { "input": input } })
}

#[derive(Deserialize)]
struct GqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GqlError>,
}

#[derive(Deserialize)]
struct GqlError {
    message: String,
}

#[derive(Deserialize)]
struct PerformersData {
    #[serde(rename = "findPerformers")]
    find_performers: PerformerPage,
}

#[derive(Deserialize)]
struct PerformerPage {
    performers: Vec<Performer>,
}

#[derive(Deserialize)]
struct StudiosData {
    #[serde(rename = "findStudios")]
    find_studios: StudioPage,
}

#[derive(Deserialize)]
struct StudioPage {
    studios: Vec<Studio>,
}

#[derive(Deserialize)]
struct ImagesData {
    #[serde(rename = "findImages")]
    find_images: MediaPage,
}

#[derive(Deserialize)]
struct ScenesData {
    #[serde(rename = "findScenes")]
    find_scenes: MediaPage,
}

#[derive(Deserialize)]
struct MediaPage {
    #[serde(alias = "images", alias = "scenes")]
    items: Vec<MediaId>,
}

#[derive(Deserialize)]
struct MediaId {
    id: String,
}

/// Blocking client for the catalog's GraphQL endpoint.
pub struct CatalogClient {
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl CatalogClient {
    pub fn new(endpoint: String) -> Self {
        CatalogClient {
            endpoint,
            http: reqwest::blocking::Client::new(),
        }
    }

    fn post<T: for<'de> Deserialize<'de>>(&self, body: &Value) -> Result<T, CatalogError> {
        let response = self.http.post(&self.endpoint).json(body).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }

        let parsed: GqlResponse<T> = response
            .json()
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        if !parsed.errors.is_empty() {
            let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(CatalogError::Graphql(messages.join("; ")));
        }

        parsed
            .data
            .ok_or_else(|| CatalogError::Decode("response has no data field".to_string()))
    }
}

impl Catalog for CatalogClient {
    fn list_performers(&self) -> Result<Vec<Performer>, CatalogError> {
        let body = json!({ "query": LIST_PERFORMERS });
        let data: PerformersData = self.post(&body)?;
        Ok(data.find_performers.performers)
    }

    fn list_studios(&self) -> Result<Vec<Studio>, CatalogError> {
        let body = json!({ "query": LIST_STUDIOS });
        let data: StudiosData = self.post(&body)?;
        Ok(data.find_studios.studios)
    }

    fn find_media(&self, kind: MediaKind, path_fragment: &str) -> Result<Vec<String>, CatalogError> {
        let body = find_media_request(kind, path_fragment);
        let items = match kind {
            MediaKind::Image => self.post::<ImagesData>(&body)?.find_images.items,
            MediaKind::Scene => self.post::<ScenesData>(&body)?.find_scenes.items,
        };
        Ok(items.into_iter().map(|m| m.id).collect())
    }

    fn bulk_tag(
        &self,
        kind: MediaKind,
        ids: &[String],
        performer_id: &str,
        studio_id: Option<&str>,
    ) -> Result<(), CatalogError> {
        let body = bulk_tag_request(kind, ids, performer_id, studio_id);
        self.post::<Value>(&body).map(|_| ())
    }
}
