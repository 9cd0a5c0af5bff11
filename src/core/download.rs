use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use zip::read::ZipArchive;

use crate::error::{Error, IoContext, Result};

pub const ARCHIVE_FILE_NAME: &str = "roboflow.zip";

const CHUNK_SIZE: usize = 32 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// Signed link to the archive bytes.
    pub uri: String,
    pub destination: PathBuf,
}

impl DownloadPlan {
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.destination.join(ARCHIVE_FILE_NAME)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    Downloading {
        downloaded: u64,
        total: Option<u64>,
    },
    Extracting {
        index: usize,
        count: usize,
        name: &'a str,
    },
}

impl Progress<'_> {
    /// Completion between 0 and 100, when it can be known.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        let (done, total) = match *self {
            Progress::Downloading { downloaded, total } => (downloaded, total?),
            Progress::Extracting { index, count, .. } => (index as u64 + 1, count as u64),
        };
        if total == 0 {
            return None;
        }
        Some(((done.min(total) * 100) / total) as u8)
    }
}

/// Rewrites one stdout line per phase. Write failures are ignored.
pub struct ConsoleProgress {
    location: String,
    download_type: String,
    phase_open: bool,
}

impl ConsoleProgress {
    pub fn new(location: &Path, download_type: &str) -> Self {
        Self {
            location: location.display().to_string(),
            download_type: download_type.to_string(),
            phase_open: false,
        }
    }

    pub fn report(&mut self, progress: Progress<'_>) {
        let mut stdout = io::stdout().lock();
        let _ = self.write_line(&mut stdout, progress);
    }

    fn write_line<W: Write>(&mut self, out: &mut W, progress: Progress<'_>) -> io::Result<()> {
        match progress {
            Progress::Downloading { downloaded, total } => {
                write!(
                    out,
                    "\rDownloading Dataset Version Zip in {} to {}: ",
                    self.location, self.download_type
                )?;
                match (progress.percent(), total) {
                    (Some(percent), Some(total)) => {
                        write!(out, "{percent}% [{downloaded} / {total}] bytes")?
                    }
                    _ => write!(out, "{downloaded} bytes")?,
                }
                self.phase_open = true;
            }
            Progress::Extracting { index, count, .. } => {
                if self.phase_open && index == 0 {
                    writeln!(out)?;
                }
                write!(
                    out,
                    "\rExtracting Dataset Version Zip to {} in {}: {}% [{} / {}]",
                    self.location,
                    self.download_type,
                    progress.percent().unwrap_or(0),
                    index + 1,
                    count
                )?;
                self.phase_open = index + 1 < count;
                if !self.phase_open {
                    writeln!(out)?;
                }
            }
        }
        out.flush()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct DownloadOutcome {
    pub final_path: PathBuf,
    pub archive_size_bytes: u64,
    pub bytes_downloaded: u64,
    pub checksum: String,
    pub extracted_entries: usize,
    pub skipped_entries: Vec<SkippedEntry>,
}

/// Fetches the archive behind `plan.uri` into the staging file, unpacks it into
/// `plan.destination` and removes the staging file on every exit path.
pub fn download_and_extract_with_progress<F>(
    client: &Client,
    plan: &DownloadPlan,
    mut progress: F,
) -> Result<DownloadOutcome>
where
    F: FnMut(Progress<'_>),
{
    fs::create_dir_all(&plan.destination).with_context(|| {
        format!(
            "create destination directory {}",
            plan.destination.display()
        )
    })?;

    let (staged, bytes_downloaded, checksum) = download_to_file(client, plan, &mut progress)?;

    let archive_size_bytes = fs::metadata(&staged.path)
        .context("stat downloaded archive")?
        .len();
    tracing::debug!(
        "Archive {} is {} bytes (sha256 {})",
        staged.path.display(),
        archive_size_bytes,
        checksum
    );

    let extraction = extract_zip(&plan.destination, &staged.path, &mut progress)?;
    if !extraction.skipped.is_empty() {
        tracing::warn!(
            "Skipped {} corrupted archive entries while extracting to {}",
            extraction.skipped.len(),
            plan.destination.display()
        );
    }
    drop(staged);

    Ok(DownloadOutcome {
        final_path: plan.destination.clone(),
        archive_size_bytes,
        bytes_downloaded,
        checksum,
        extracted_entries: extraction.extracted,
        skipped_entries: extraction.skipped,
    })
}

/// Removes the staging archive when dropped, whether extraction succeeded or not.
/// Only created once this download owns the file.
struct StagedArchive {
    path: PathBuf,
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => tracing::warn!(
                "Failed to remove staged archive {}: {error}",
                self.path.display()
            ),
        }
    }
}

fn download_to_file<F>(
    client: &Client,
    plan: &DownloadPlan,
    progress: &mut F,
) -> Result<(StagedArchive, u64, String)>
where
    F: FnMut(Progress<'_>),
{
    let mut response = client.get(&plan.uri).send()?.error_for_status()?;
    let total = response.content_length();

    let path = plan.staging_path();
    let mut file = File::create(&path)
        .with_context(|| format!("create staging archive {}", path.display()))?;
    let staged = StagedArchive { path };
    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match response.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(Error::io("read download chunk", error)),
        };
        file.write_all(&buffer[..read])
            .context("write download chunk")?;
        hasher.update(&buffer[..read]);
        downloaded += read as u64;
        progress(Progress::Downloading { downloaded, total });
    }
    file.flush().context("flush staging archive")?;

    Ok((staged, downloaded, format!("{:x}", hasher.finalize())))
}

#[derive(Debug, Default)]
struct Extraction {
    extracted: usize,
    skipped: Vec<SkippedEntry>,
}

enum CopyFailure {
    Read(io::Error),
    Write(io::Error),
}

fn extract_zip<F>(destination: &Path, archive_path: &Path, progress: &mut F) -> Result<Extraction>
where
    F: FnMut(Progress<'_>),
{
    let file = File::open(archive_path).context("open archive")?;
    let mut archive = ZipArchive::new(file)?;
    let count = archive.len();
    let mut extraction = Extraction::default();

    for index in 0..count {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(error) => {
                extraction.skip(index, format!("#{index}"), error.to_string());
                continue;
            }
        };
        let name = entry.name().to_string();
        progress(Progress::Extracting {
            index,
            count,
            name: &name,
        });

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            extraction.skip(index, name, "entry path escapes destination".into());
            continue;
        };
        let dest = destination.join(relative);
        if dest == archive_path {
            extraction.skip(index, name, "entry would overwrite the archive being read".into());
            continue;
        }

        if entry.is_dir() {
            fs::create_dir_all(&dest)
                .with_context(|| format!("create directory {}", dest.display()))?;
            extraction.extracted += 1;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }

        match copy_entry(&mut entry, &dest) {
            Ok(_) => extraction.extracted += 1,
            Err(CopyFailure::Read(error)) => {
                let _ = fs::remove_file(&dest);
                extraction.skip(index, name, error.to_string());
            }
            Err(CopyFailure::Write(error)) => {
                return Err(Error::io(format!("write {}", dest.display()), error));
            }
        }
    }

    Ok(extraction)
}

impl Extraction {
    fn skip(&mut self, index: usize, name: String, reason: String) {
        tracing::warn!("Skipping archive entry {name}: {reason}");
        self.skipped.push(SkippedEntry {
            index,
            name,
            reason,
        });
    }
}

/// Read-side failures come from the archive; write-side failures come from the disk.
fn copy_entry<R: Read>(reader: &mut R, dest: &Path) -> Result<u64, CopyFailure> {
    let mut outfile = File::create(dest).map_err(CopyFailure::Write)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(CopyFailure::Read(error)),
        };
        outfile
            .write_all(&buffer[..read])
            .map_err(CopyFailure::Write)?;
        written += read as u64;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use zip::{write::FileOptions, CompressionMethod, ZipWriter};

    use super::*;

    fn stored() -> FileOptions {
        FileOptions::default().compression_method(CompressionMethod::Stored)
    }

    fn write_archive(path: &Path, bytes: &[u8]) {
        fs::write(path, bytes).unwrap();
    }

    fn build_archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, stored()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive.zip");
        write_archive(
            &archive,
            &build_archive(&[("a.txt", "alpha"), ("b/c.txt", "charlie")]),
        );
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let mut names = Vec::new();
        let extraction = extract_zip(&out, &archive, &mut |progress: Progress<'_>| {
            if let Progress::Extracting { name, .. } = progress {
                names.push(name.to_string());
            }
        })
        .unwrap();

        assert_eq!(extraction.extracted, 2);
        assert!(extraction.skipped.is_empty());
        assert_eq!(names, vec!["a.txt", "b/c.txt"]);
        assert_eq!(fs::read(out.join("a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(out.join("b/c.txt")).unwrap(), b"charlie");
    }

    #[test]
    fn corrupted_entry_is_skipped_and_rest_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = build_archive(&[
            ("good.txt", "intact contents"),
            ("bad.txt", "corrupt-me-please"),
            ("after.txt", "still here"),
        ]);
        let needle = b"corrupt-me-please";
        let offset = bytes
            .windows(needle.len())
            .position(|window| window == needle)
            .unwrap();
        bytes[offset] = b'X';

        let archive = dir.path().join("archive.zip");
        write_archive(&archive, &bytes);
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();

        let extraction = extract_zip(&out, &archive, &mut |_: Progress<'_>| {}).unwrap();

        assert_eq!(extraction.extracted, 2);
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].name, "bad.txt");
        assert_eq!(extraction.skipped[0].index, 1);
        assert!(!out.join("bad.txt").exists());
        assert_eq!(fs::read(out.join("good.txt")).unwrap(), b"intact contents");
        assert_eq!(fs::read(out.join("after.txt")).unwrap(), b"still here");
    }

    #[test]
    fn unreadable_archive_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive.zip");
        write_archive(&archive, b"definitely not a zip file");

        let result = extract_zip(dir.path(), &archive, &mut |_: Progress<'_>| {});
        assert!(matches!(result, Err(Error::Zip(_))));
    }

    #[test]
    fn staged_archive_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ARCHIVE_FILE_NAME);
        fs::write(&path, b"partial").unwrap();
        drop(StagedArchive { path: path.clone() });
        assert!(!path.exists());
        drop(StagedArchive { path: path.clone() });
    }

    #[test]
    fn failed_fetch_keeps_existing_archive_file() {
        let dir = tempfile::tempdir().unwrap();
        let plan = DownloadPlan {
            uri: "http://127.0.0.1:9/unreachable.zip".into(),
            destination: dir.path().to_path_buf(),
        };
        fs::write(plan.staging_path(), b"user data").unwrap();

        let result =
            download_and_extract_with_progress(&Client::new(), &plan, |_: Progress<'_>| {});

        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(fs::read(plan.staging_path()).unwrap(), b"user data");
    }

    #[test]
    fn entry_shadowing_the_archive_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_archive(&[(ARCHIVE_FILE_NAME, "nested"), ("a.txt", "alpha")]);
        let archive = dir.path().join(ARCHIVE_FILE_NAME);
        write_archive(&archive, &bytes);

        let extraction = extract_zip(dir.path(), &archive, &mut |_: Progress<'_>| {}).unwrap();

        assert_eq!(extraction.extracted, 1);
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].name, ARCHIVE_FILE_NAME);
        assert_eq!(fs::read(&archive).unwrap(), bytes);
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"alpha");
    }

    #[test]
    fn percent_handles_unknown_total() {
        let unknown = Progress::Downloading {
            downloaded: 10,
            total: None,
        };
        assert_eq!(unknown.percent(), None);
        let empty = Progress::Downloading {
            downloaded: 0,
            total: Some(0),
        };
        assert_eq!(empty.percent(), None);
        let half = Progress::Downloading {
            downloaded: 50,
            total: Some(100),
        };
        assert_eq!(half.percent(), Some(50));
        let last = Progress::Extracting {
            index: 3,
            count: 4,
            name: "x",
        };
        assert_eq!(last.percent(), Some(100));
    }

    #[test]
    fn console_progress_formats_both_phases() {
        let mut reporter = ConsoleProgress::new(Path::new("/tmp/chess-3"), "yolov5pytorch");
        let mut out = Vec::new();
        reporter
            .write_line(
                &mut out,
                Progress::Downloading {
                    downloaded: 512,
                    total: Some(1024),
                },
            )
            .unwrap();
        reporter
            .write_line(
                &mut out,
                Progress::Extracting {
                    index: 0,
                    count: 1,
                    name: "a.txt",
                },
            )
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains(
            "Downloading Dataset Version Zip in /tmp/chess-3 to yolov5pytorch: 50% [512 / 1024] bytes\n"
        ));
        assert!(text.ends_with(
            "\rExtracting Dataset Version Zip to /tmp/chess-3 in yolov5pytorch: 100% [1 / 1]\n"
        ));
    }

    #[test]
    fn console_progress_without_total() {
        let mut reporter = ConsoleProgress::new(Path::new("out"), "coco");
        let mut out = Vec::new();
        reporter
            .write_line(
                &mut out,
                Progress::Downloading {
                    downloaded: 7,
                    total: None,
                },
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\rDownloading Dataset Version Zip in out to coco: 7 bytes"
        );
    }

    #[test]
    fn staging_path_lives_in_destination() {
        let plan = DownloadPlan {
            uri: "https://example.com/a.zip".into(),
            destination: PathBuf::from("../datasets/chess-3"),
        };
        assert_eq!(
            plan.staging_path(),
            PathBuf::from("../datasets/chess-3/roboflow.zip")
        );
    }
}
