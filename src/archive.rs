use std::fs;
use std::fs::File;
use std::io;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use zip::write::FileOptions;
use zip::CompressionMethod;
use zip::ZipWriter;

use crate::error::Result;
use crate::project::ProjectFormat;
use crate::project::ProjectId;

/// Zips `work_dir` into `<dest>/<id>.zip`, renames it to `<dest>/<id>.sb<tag>`
/// and removes `work_dir`. Returns the archive path.
pub fn package(
    work_dir: &Path,
    dest: &Path,
    id: ProjectId,
    format: ProjectFormat,
) -> Result<PathBuf> {
    let zip_path = dest.join(format!("{id}.zip"));
    zip_dir(work_dir, &zip_path)?;

    let archive_path = dest.join(format!("{id}.{}", format.extension()));
    fs::rename(&zip_path, &archive_path)?;
    fs::remove_dir_all(work_dir)?;

    debug!(path = %archive_path.display(), "Packaged project");
    Ok(archive_path)
}

/// Writes every file under `src` into a new zip at `dest`, with paths relative to `src`.
pub fn zip_dir(src: &Path, dest: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(File::create(dest)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    add_dir(&mut zip, src, "", options)?;
    zip.finish()?;
    Ok(())
}

fn add_dir<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: FileOptions,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        if entry.file_type()?.is_dir() {
            zip.add_directory(name.as_str(), options)?;
            add_dir(zip, &entry.path(), &format!("{name}/"), options)?;
        } else {
            zip.start_file(name.as_str(), options)?;
            io::copy(&mut File::open(entry.path())?, zip)?;
        }
    }
    Ok(())
}
