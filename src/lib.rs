use std::fs;
use std::path::Path;
use std::path::PathBuf;

use attohttpc::header::USER_AGENT;
use attohttpc::Session;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::error;
use tracing::info;

pub mod archive;
pub mod error;
pub mod listing;
pub mod project;
pub mod target;

pub use error::Error;
pub use error::ErrorLog;
pub use error::Result;
pub use listing::ListingKind;
pub use project::ProjectFormat;
pub use project::ProjectId;
pub use target::parse_target;
pub use target::Target;
pub use target::Username;

use listing::PAGE_SIZE;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/81.0.4044.129 Safari/537.36";

/// Archive extensions a finished project may have been saved with. `sb` is
/// the historical name for Scratch 1.x projects.
const ARCHIVE_EXTENSIONS: [&str; 4] = ["sb", "sb1", "sb2", "sb3"];

/// Base URLs of the Scratch services.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api: String,
    pub projects: String,
    pub assets: String,
    pub cdn: String,
}

impl Endpoints {
    pub fn scratch() -> Self {
        Self {
            api: String::from("https://api.scratch.mit.edu"),
            projects: String::from("https://projects.scratch.mit.edu"),
            assets: String::from("https://assets.scratch.mit.edu"),
            cdn: String::from("https://cdn2.scratch.mit.edu"),
        }
    }

    /// Points every service at the same server.
    pub fn all<S: Into<String>>(base_url: S) -> Self {
        let base_url = base_url.into();
        Self {
            api: base_url.clone(),
            projects: base_url.clone(),
            assets: base_url.clone(),
            cdn: base_url,
        }
    }

    fn project(&self, id: ProjectId) -> String {
        format!("{}/{}", self.projects, id)
    }

    fn project_metadata(&self, id: ProjectId) -> String {
        format!("{}/projects/{}", self.api, id)
    }

    fn project_image(&self, id: ProjectId) -> String {
        format!("{}/get_image/project/{}_100000x100000.png", self.cdn, id)
    }

    fn user(&self, username: &Username) -> String {
        format!("{}/users/{}", self.api, username)
    }

    fn user_image(&self, user_id: u64) -> String {
        format!("{}/get_image/user/{}_100000x100000.png", self.cdn, user_id)
    }

    fn studio(&self, studio_id: u64) -> String {
        format!("{}/studios/{}", self.api, studio_id)
    }

    fn listing(&self, path: &str) -> String {
        format!("{}/{}", self.api, path)
    }

    fn asset(&self, name: &str) -> String {
        format!("{}/internalapi/asset/{}/get/", self.assets, name)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::scratch()
    }
}

/// Result of archiving a single project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    Archived(ProjectFormat),
    MetadataOnly,
    /// An archive and its metadata were already on disk.
    Skipped,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: u64,
}

pub struct Downloader {
    /// Base directory downloads are written under.
    dest: PathBuf,

    endpoints: Endpoints,

    /// Only fetch `<id>.json` and `<id>.png`, not the project itself.
    metadata_only: bool,

    sess: Session,
}

impl Downloader {
    pub fn builder() -> DownloaderBuilder {
        DownloaderBuilder::default()
    }

    /// Downloads whatever `target` names into the base directory. Failures of
    /// single projects and listings are logged and skipped.
    pub fn download(&self, target: &Target) -> Result<()> {
        match target {
            Target::Project(id) => {
                self.archive_project_or_log(*id, &self.dest)?;
                Ok(())
            }
            Target::User(username) => self.download_user(username),
            Target::Studio(studio_id) => self.download_studio(*studio_id),
        }
    }

    /// Downloads metadata and the project for `id` into `dest`, unless both
    /// are already there.
    pub fn archive_project(&self, id: ProjectId, dest: &Path) -> Result<ProjectOutcome> {
        if self.already_downloaded(id, dest) {
            info!(project = %id, "Skipping (already downloaded)");
            return Ok(ProjectOutcome::Skipped);
        }

        self.download_metadata(id, dest)?;
        if self.metadata_only {
            return Ok(ProjectOutcome::MetadataOnly);
        }

        let format = self.download_project(id, dest)?;
        Ok(ProjectOutcome::Archived(format))
    }

    /// Like [`Downloader::archive_project`], but a failure is written to
    /// `dest/error.log` and reported as `None`.
    pub fn archive_project_or_log(
        &self,
        id: ProjectId,
        dest: &Path,
    ) -> Result<Option<ProjectOutcome>> {
        match self.archive_project(id, dest) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => {
                log_failure(dest, &id.to_string(), &err)?;
                Ok(None)
            }
        }
    }

    fn already_downloaded(&self, id: ProjectId, dest: &Path) -> bool {
        let has_metadata = dest.join(format!("{id}.json")).is_file();
        if self.metadata_only {
            return has_metadata;
        }
        has_metadata
            && ARCHIVE_EXTENSIONS
                .iter()
                .any(|ext| dest.join(format!("{id}.{ext}")).is_file())
    }

    pub fn download_metadata(&self, id: ProjectId, dest: &Path) -> Result<()> {
        info!(project = %id, "Downloading metadata");
        self.fetch_to(
            &self.endpoints.project_metadata(id),
            &dest.join(format!("{id}.json")),
        )?;
        self.fetch_to(
            &self.endpoints.project_image(id),
            &dest.join(format!("{id}.png")),
        )
    }

    /// Fetches the project payload and writes `dest/<id>.sb<tag>`.
    ///
    /// A Scratch 1.x payload is written as is. A JSON payload is assembled in
    /// the working directory `dest/<id>` together with its assets and zipped.
    /// A failure while fetching assets leaves the working directory behind.
    pub fn download_project(&self, id: ProjectId, dest: &Path) -> Result<ProjectFormat> {
        info!(project = %id, "Downloading project");
        let payload = self.get(&self.endpoints.project(id))?;

        if project::is_legacy_binary(&payload) {
            let format = ProjectFormat::LegacyBinary;
            fs::write(dest.join(format!("{id}.{}", format.extension())), &payload)?;
            info!(project = %id, version = format.tag(), "Downloaded project");
            return Ok(format);
        }

        let work_dir = dest.join(id.to_string());
        fs::create_dir_all(&work_dir)?;
        fs::write(work_dir.join("project.json"), &payload)?;

        let mut doc: Value = serde_json::from_slice(&payload)?;
        let format = project::classify(&doc);
        let assets = match format {
            ProjectFormat::LegacyJson => project::renumber_legacy_assets(&mut doc)?,
            _ => project::current_assets(&doc)?,
        };

        for asset in &assets {
            debug!(project = %id, asset = %asset.remote, local = %asset.local, "Downloading asset");
            self.fetch_to(&self.endpoints.asset(&asset.remote), &work_dir.join(&asset.local))?;
        }

        if format == ProjectFormat::LegacyJson {
            fs::rename(work_dir.join("project.json"), work_dir.join("original.json"))?;
            fs::write(work_dir.join("project.json"), serde_json::to_vec(&doc)?)?;
        }

        archive::package(&work_dir, dest, id, format)?;
        info!(project = %id, version = format.tag(), assets = assets.len(), "Downloaded project");
        Ok(format)
    }

    /// Downloads a user's profile, avatar, listings and projects into
    /// `<dest>/<username>`.
    pub fn download_user(&self, username: &Username) -> Result<()> {
        info!(user = %username, "Downloading user");
        let user_dir = self.dest.join(username.as_str());
        fs::create_dir_all(&user_dir)?;

        let profile = self.get(&self.endpoints.user(username))?;
        fs::write(user_dir.join("userinfo.json"), &profile)?;
        let profile: UserProfile = serde_json::from_slice(&profile)?;

        self.fetch_to(
            &self.endpoints.user_image(profile.id),
            &user_dir.join("avatar.png"),
        )?;

        let mut projects = Vec::new();
        for kind in ListingKind::USER {
            let entries = self.sync_listing_or_log(
                &user_dir,
                &format!("{username}'s {kind}"),
                &format!("users/{username}/{kind}"),
                &kind.file_name(),
            )?;
            if kind == ListingKind::Projects {
                projects = entries;
            }
        }

        self.archive_listed_projects(&projects, &user_dir)
    }

    /// Downloads a studio's info and projects into `<dest>/studio-<id>`.
    pub fn download_studio(&self, studio_id: u64) -> Result<()> {
        info!(studio = studio_id, "Downloading studio");
        let studio_dir = self.dest.join(format!("studio-{studio_id}"));
        fs::create_dir_all(&studio_dir)?;

        self.fetch_to(
            &self.endpoints.studio(studio_id),
            &studio_dir.join("studioinfo.json"),
        )?;

        let projects = self.sync_listing_or_log(
            &studio_dir,
            &format!("studio {studio_id}'s projects"),
            &format!("studios/{studio_id}/projects"),
            &ListingKind::Projects.file_name(),
        )?;

        self.archive_listed_projects(&projects, &studio_dir)
    }

    /// Fetches every page of the listing at `path` until an empty page.
    pub fn fetch_listing(&self, path: &str) -> Result<Vec<Value>> {
        let mut entries = Vec::new();
        let mut page = 0;
        loop {
            info!(listing = path, page = page + 1, "Downloading listing page");
            let body = self
                .sess
                .get(self.endpoints.listing(path))
                .param("limit", PAGE_SIZE)
                .param("offset", page * PAGE_SIZE)
                .send()?
                .error_for_status()?
                .bytes()?;

            let content: Vec<Value> = serde_json::from_slice(&body)?;
            if content.is_empty() {
                break;
            }
            entries.extend(content);
            page += 1;
        }
        Ok(entries)
    }

    /// Fetches a listing and merges it into `dir/file_name`. On failure the
    /// error is logged and an empty listing is returned.
    fn sync_listing_or_log(
        &self,
        dir: &Path,
        label: &str,
        path: &str,
        file_name: &str,
    ) -> Result<Vec<Value>> {
        let synced = self
            .fetch_listing(path)
            .and_then(|fresh| listing::save_merged(&dir.join(file_name), fresh));
        match synced {
            Ok(entries) => Ok(entries),
            Err(err) => {
                log_failure(dir, label, &err)?;
                Ok(Vec::new())
            }
        }
    }

    fn archive_listed_projects(&self, entries: &[Value], dest: &Path) -> Result<()> {
        for entry in entries {
            let id = entry.get("id").unwrap_or(&Value::Null);
            match ProjectId::try_from(id) {
                Ok(id) => {
                    self.archive_project_or_log(id, dest)?;
                }
                Err(err) => log_failure(dest, &id.to_string(), &err)?,
            }
        }
        Ok(())
    }

    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.sess.get(url).send()?.error_for_status()?;
        Ok(resp.bytes()?)
    }

    fn fetch_to(&self, url: &str, path: &Path) -> Result<()> {
        let body = self.get(url)?;
        fs::write(path, body)?;
        Ok(())
    }
}

fn log_failure(dir: &Path, label: &str, err: &Error) -> Result<()> {
    error!(label, error = %err, "Download failed");
    ErrorLog::in_dir(dir).record(label, err)?;
    Ok(())
}

#[derive(Debug)]
pub struct DownloaderBuilder {
    dest: PathBuf,
    endpoints: Endpoints,
    metadata_only: bool,
}

impl DownloaderBuilder {
    pub fn dest<P: Into<PathBuf>>(mut self, dest: P) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn metadata_only(mut self, metadata_only: bool) -> Self {
        self.metadata_only = metadata_only;
        self
    }

    pub fn build(self) -> Downloader {
        let mut sess = Session::new();
        sess.header(USER_AGENT, BROWSER_USER_AGENT);
        Downloader {
            dest: self.dest,
            endpoints: self.endpoints,
            metadata_only: self.metadata_only,
            sess,
        }
    }
}

impl Default for DownloaderBuilder {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("."),
            endpoints: Endpoints::default(),
            metadata_only: false,
        }
    }
}
