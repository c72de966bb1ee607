use std::fmt;
use std::path::Component;
use std::path::Path;
use std::str::FromStr;

use serde_json::Map;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;

/// First bytes of a Scratch 1.x binary project.
pub const LEGACY_MAGIC: &[u8; 9] = b"ScratchV0";

/// Numeric project id. Parsing it is the only way an id reaches a filesystem path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(u64);

impl ProjectId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for ProjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::InvalidProjectId(s.to_owned()))
    }
}

impl TryFrom<&Value> for ProjectId {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(Self)
                .ok_or_else(|| Error::InvalidProjectId(n.to_string())),
            Value::String(s) => s.parse(),
            other => Err(Error::InvalidProjectId(other.to_string())),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    /// Scratch 1.x opaque binary.
    LegacyBinary,
    /// Scratch 2.0 JSON with `info`, `children` and MD5 asset references.
    LegacyJson,
    /// Scratch 3.0 JSON with `targets` and `md5ext` asset references.
    Json,
}

impl ProjectFormat {
    pub fn tag(self) -> u8 {
        match self {
            ProjectFormat::LegacyBinary => 1,
            ProjectFormat::LegacyJson => 2,
            ProjectFormat::Json => 3,
        }
    }

    /// Archive extension, e.g. `sb2`.
    pub fn extension(self) -> String {
        format!("sb{}", self.tag())
    }
}

pub fn is_legacy_binary(payload: &[u8]) -> bool {
    payload.starts_with(LEGACY_MAGIC)
}

/// Classifies an already parsed structured document.
pub fn classify(doc: &Value) -> ProjectFormat {
    if doc.get("info").is_some() {
        ProjectFormat::LegacyJson
    } else {
        ProjectFormat::Json
    }
}

/// One asset to fetch: `remote` is the content-hash name on the asset server,
/// `local` the file name inside the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDownload {
    pub remote: String,
    pub local: String,
}

/// Assigns sequential local ids to every asset of a Scratch 2.0 document and
/// injects them (`penLayerID`, `soundID`, `baseLayerID`) into `doc`.
///
/// The counter is shared by the stage and all children and advances in
/// traversal order: pen layer, sounds, costumes, then each child the same way.
pub fn renumber_legacy_assets(doc: &mut Value) -> Result<Vec<AssetDownload>> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| Error::MalformedProject("top level is not an object".into()))?;

    let mut renumberer = Renumberer::default();
    renumberer.visit_sprite(root)?;

    if let Some(children) = root.get_mut("children").and_then(Value::as_array_mut) {
        for child in children.iter_mut().filter_map(Value::as_object_mut) {
            renumberer.visit_sprite(child)?;
        }
    }

    Ok(renumberer.downloads)
}

#[derive(Default)]
struct Renumberer {
    counter: u64,
    downloads: Vec<AssetDownload>,
}

impl Renumberer {
    fn visit_sprite(&mut self, sprite: &mut Map<String, Value>) -> Result<()> {
        let pen_layer = sprite
            .get("penLayerMD5")
            .and_then(Value::as_str)
            .filter(|hash| !hash.is_empty())
            .map(str::to_owned);
        if let Some(hash) = pen_layer {
            let id = self.assign(&hash)?;
            sprite.insert("penLayerID".to_owned(), id.into());
        }

        self.visit_list(sprite, "sounds", "md5", "soundID")?;
        self.visit_list(sprite, "costumes", "baseLayerMD5", "baseLayerID")
    }

    fn visit_list(
        &mut self,
        sprite: &mut Map<String, Value>,
        list_key: &str,
        hash_key: &str,
        id_key: &str,
    ) -> Result<()> {
        let Some(items) = sprite.get_mut(list_key).and_then(Value::as_array_mut) else {
            return Ok(());
        };

        for item in items {
            let item = item.as_object_mut().ok_or_else(|| {
                Error::MalformedProject(format!("entry in {list_key} is not an object"))
            })?;
            let hash = item
                .get(hash_key)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::MalformedProject(format!("entry in {list_key} has no {hash_key}"))
                })?
                .to_owned();
            let id = self.assign(&hash)?;
            item.insert(id_key.to_owned(), id.into());
        }
        Ok(())
    }

    fn assign(&mut self, remote: &str) -> Result<u64> {
        let id = self.counter;
        let extension = remote.rsplit('.').next().unwrap_or(remote);
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::UnsafeAssetName(remote.to_owned()));
        }
        self.downloads.push(AssetDownload {
            remote: remote.to_owned(),
            local: format!("{id}.{extension}"),
        });
        self.counter += 1;
        Ok(id)
    }
}

/// Lists the assets of a Scratch 3.0 document, costumes before sounds for each
/// target. Assets keep their remote `md5ext` name and the document is untouched.
pub fn current_assets(doc: &Value) -> Result<Vec<AssetDownload>> {
    let targets = doc
        .get("targets")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedProject("missing targets".into()))?;

    let mut downloads = Vec::new();
    for target in targets {
        for key in ["costumes", "sounds"] {
            let Some(items) = target.get(key).and_then(Value::as_array) else {
                continue;
            };
            for item in items {
                let md5ext = item.get("md5ext").and_then(Value::as_str).ok_or_else(|| {
                    Error::MalformedProject(format!("entry in {key} has no md5ext"))
                })?;
                let name = plain_file_name(md5ext)
                    .ok_or_else(|| Error::UnsafeAssetName(md5ext.to_owned()))?;
                downloads.push(AssetDownload {
                    remote: name.to_owned(),
                    local: name.to_owned(),
                });
            }
        }
    }
    Ok(downloads)
}

/// Returns `name` if it is a single normal path component.
fn plain_file_name(name: &str) -> Option<&str> {
    if name.contains('\0') || name.contains('\\') {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Some(name),
        _ => None,
    }
}
