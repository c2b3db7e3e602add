use anyhow::{Context, Result};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::OutputConfig;
use crate::error::Failure;
use crate::exif::{self, ExistingMetadata};
use crate::tagging::{TagResult, TaggingService};

/// Extensions picked up from the batch folder (compared case-insensitively).
const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Terminal folder an image is moved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Metadata was written.
    Ready,
    /// Tagging failed, came back incomplete, or the write failed.
    Failed,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// The two terminal folders under a batch directory.
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub ready: PathBuf,
    pub failed: PathBuf,
}

impl OutputDirs {
    pub fn path_for(&self, destination: Destination) -> &Path {
        match destination {
            Destination::Ready => &self.ready,
            Destination::Failed => &self.failed,
        }
    }
}

/// Progress after an image has been moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Images finished so far, including the current one.
    pub done: usize,
    /// Images in the batch snapshot.
    pub total: usize,
    /// `round(100 * done / total)`.
    pub percent: u8,
}

/// What happened to a single image.
///
/// # Example
///
/// ```rust,no_run
/// # use phototag_batch::pipeline::{process_image, ensure_output_dirs, Destination};
/// # use phototag_batch::config::{Config, OutputConfig};
/// # use phototag_batch::tagging::PhotoTagClient;
/// # async fn example() -> anyhow::Result<()> {
/// # let config = Config::default();
/// let client = PhotoTagClient::new(&config.service);
/// let dirs = ensure_output_dirs("./photos".as_ref(), &config.output)?;
/// let outcome = process_image("./photos/a.jpg".as_ref(), &client, &dirs).await;
///
/// if outcome.destination == Destination::Ready {
///     println!("Tagged: {:?}", outcome.tags.map(|t| t.title));
/// } else if let Some(ref err) = outcome.failure {
///     println!("Failed: {err}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Serialize)]
pub struct ImageOutcome {
    /// Where the image was found.
    pub path: PathBuf,
    /// Title and description read before tagging.
    pub existing: ExistingMetadata,
    /// What the service returned, if it returned anything.
    pub tags: Option<TagResult>,
    /// Why the image failed; `None` when it went to ready.
    #[serde(rename = "error", serialize_with = "serialize_failure")]
    pub failure: Option<Failure>,
    pub destination: Destination,
    /// Where the image ended up; `None` if the move itself failed.
    pub final_path: Option<PathBuf>,
    pub move_error: Option<String>,
}

impl ImageOutcome {
    pub fn file_name(&self) -> String {
        display_name(&self.path)
    }
}

fn serialize_failure<S: Serializer>(
    failure: &Option<Failure>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match failure {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// All outcomes of one batch, in processing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ImageOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn ready_count(&self) -> usize {
        self.count(Destination::Ready)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Destination::Failed)
    }

    fn count(&self, destination: Destination) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.destination == destination)
            .count()
    }
}

/// Serialised as the counts followed by every outcome under `images`.
impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("BatchReport", 4)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("ready", &self.ready_count())?;
        state.serialize_field("failed", &self.failed_count())?;
        state.serialize_field("images", &self.outcomes)?;
        state.end()
    }
}

/// Percentage of the batch done, rounded half to even; an empty batch is complete.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done.min(total) as f64 / total as f64 * 100.0).round_ties_even();
    pct as u8
}

/// Check if a file has a `.jpg`/`.jpeg` extension, ignoring case.
fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| JPEG_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// List the JPEG files directly inside `dir`.
///
/// Not recursive. The list is a snapshot in directory enumeration order
/// (not sorted); files added afterwards are not seen.
///
/// # Example
///
/// ```rust,no_run
/// use phototag_batch::pipeline::collect_jpegs;
///
/// let images = collect_jpegs("./photos".as_ref()).unwrap();
/// println!("Found {} images", images.len());
/// ```
pub fn collect_jpegs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("Not a directory: {}", dir.display());
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let p = entry.path();
        if p.is_file() && is_jpeg(p) {
            images.push(p.to_path_buf());
        }
    }

    Ok(images)
}

/// Create the ready and failed folders under `dir` if they are missing.
pub fn ensure_output_dirs(dir: &Path, output: &OutputConfig) -> Result<OutputDirs> {
    let dirs = OutputDirs {
        ready: dir.join(&output.ready_dir),
        failed: dir.join(&output.failed_dir),
    };
    for d in [&dirs.ready, &dirs.failed] {
        std::fs::create_dir_all(d)
            .with_context(|| format!("Failed to create {}", d.display()))?;
    }
    Ok(dirs)
}

/// Move `path` into `dir`, keeping its file name.
fn move_into(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name")
    })?;
    let target = dir.join(file_name);
    std::fs::rename(path, &target)?;
    Ok(target)
}

/// Tag then write; the tagging result is kept in `slot` even when a later stage fails.
async fn tag_and_write(
    path: &Path,
    service: &dyn TaggingService,
    context: &str,
    slot: &mut Option<TagResult>,
) -> Result<(), Failure> {
    let image = std::fs::read(path).map_err(Failure::Read)?;
    let file_name = display_name(path);

    let tags = slot.insert(service.tag(image, &file_name, context).await?);
    log::info!(
        "Metadata fetched for {file_name}: title={:?}, {} keyword(s)",
        tags.title,
        tags.keywords.len()
    );

    if !tags.is_complete() {
        return Err(Failure::Incomplete);
    }

    exif::write_tags(path, tags)?;
    Ok(())
}

/// Run one image through read → tag → write and move it to its terminal folder.
///
/// Never fails: every fault is recorded in the returned [`ImageOutcome`] and
/// sends the image to the failed folder. The image goes to the ready folder
/// only if its metadata was written.
pub async fn process_image(
    path: &Path,
    service: &dyn TaggingService,
    dirs: &OutputDirs,
) -> ImageOutcome {
    let existing = exif::read_existing(path);
    let context = existing.context();

    let mut tags = None;
    let failure = tag_and_write(path, service, &context, &mut tags).await.err();

    let destination = if failure.is_none() {
        Destination::Ready
    } else {
        Destination::Failed
    };

    if let Some(ref err) = failure {
        log::warn!("{}: {err}", display_name(path));
    }

    let (final_path, move_error) = match move_into(path, dirs.path_for(destination)) {
        Ok(target) => {
            log::debug!("Moved {} → {}", path.display(), target.display());
            (Some(target), None)
        }
        Err(e) => {
            log::error!(
                "Failed to move {} to {}: {e}",
                path.display(),
                destination.as_str()
            );
            (None, Some(e.to_string()))
        }
    };

    ImageOutcome {
        path: path.to_path_buf(),
        existing,
        tags,
        failure,
        destination,
        final_path,
        move_error,
    }
}

/// Process every JPEG directly inside `dir`, one at a time.
///
/// Creates the terminal folders, snapshots the JPEG list, then runs
/// [`process_image`] on each file in order. After each image, `on_progress`
/// receives its outcome and the batch progress. There is no cancellation:
/// once started, every listed image is processed.
///
/// Only setup problems (unreadable directory, folders that cannot be
/// created) are returned as errors.
///
/// # Example
///
/// ```rust,no_run
/// use phototag_batch::config::Config;
/// use phototag_batch::pipeline::run_batch;
/// use phototag_batch::tagging::PhotoTagClient;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(Some("config.json".as_ref()))?;
/// let client = PhotoTagClient::new(&config.service);
///
/// let report = run_batch("./photos".as_ref(), &client, &config.output, |outcome, progress| {
///     println!("{} → {} ({}%)", outcome.file_name(), outcome.destination.as_str(), progress.percent);
/// })
/// .await?;
/// println!("{} ready, {} failed", report.ready_count(), report.failed_count());
/// # Ok(())
/// # }
/// ```
pub async fn run_batch<F>(
    dir: &Path,
    service: &dyn TaggingService,
    output: &OutputConfig,
    mut on_progress: F,
) -> Result<BatchReport>
where
    F: FnMut(&ImageOutcome, Progress),
{
    let dirs = ensure_output_dirs(dir, output)?;
    let images = collect_jpegs(dir)?;
    let total = images.len();

    log::info!("Found {total} image(s) in {}", dir.display());

    let mut report = BatchReport::default();
    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, display_name(image_path));

        let outcome = process_image(image_path, service, &dirs).await;
        let done = i + 1;
        let progress = Progress {
            done,
            total,
            percent: progress_percent(done, total),
        };
        on_progress(&outcome, progress);
        report.outcomes.push(outcome);
    }

    log::info!(
        "Done: {} ready, {} failed out of {total} images",
        report.ready_count(),
        report.failed_count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TagError;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Test double answering by file name and recording the context it was given.
    struct ScriptedService {
        respond: fn(&str) -> Result<TagResult, TagError>,
        contexts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(respond: fn(&str) -> Result<TagResult, TagError>) -> Self {
            Self {
                respond,
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl TaggingService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn tag(
            &self,
            _image: Vec<u8>,
            file_name: &str,
            context: &str,
        ) -> Result<TagResult, TagError> {
            self.contexts.lock().unwrap().push(context.to_string());
            (self.respond)(file_name)
        }
    }

    fn complete(_: &str) -> Result<TagResult, TagError> {
        Ok(TagResult {
            title: "Sunset".into(),
            description: String::new(),
            keywords: vec!["sky".into(), "orange".into()],
        })
    }

    fn no_keywords(_: &str) -> Result<TagResult, TagError> {
        Ok(TagResult {
            title: "Sunset".into(),
            description: "desc".into(),
            keywords: Vec::new(),
        })
    }

    fn no_title(_: &str) -> Result<TagResult, TagError> {
        Ok(TagResult {
            title: String::new(),
            description: "desc".into(),
            keywords: vec!["sky".into()],
        })
    }

    fn server_error(_: &str) -> Result<TagResult, TagError> {
        Err(TagError::Status {
            status: 500,
            body: String::new(),
        })
    }

    fn write_jpeg(path: &Path) {
        image::RgbImage::from_pixel(8, 8, image::Rgb([90, 60, 30]))
            .save(path)
            .unwrap();
    }

    fn setup() -> (TempDir, OutputDirs) {
        let dir = TempDir::new().unwrap();
        let dirs = ensure_output_dirs(dir.path(), &OutputConfig::default()).unwrap();
        (dir, dirs)
    }

    // ── progress_percent ─────────────────────────────────────────────

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(1, 2), 50);
        assert_eq!(progress_percent(1, 7), 14);
    }

    #[test]
    fn progress_percent_ties_to_even() {
        // 1/8 = 12.5%, 3/8 = 37.5%
        assert_eq!(progress_percent(1, 8), 12);
        assert_eq!(progress_percent(3, 8), 38);
    }

    #[test]
    fn progress_percent_empty_batch_is_complete() {
        assert_eq!(progress_percent(0, 0), 100);
    }

    #[test]
    fn progress_percent_is_monotonic() {
        for total in 1..=50 {
            let mut last = 0;
            for done in 1..=total {
                let p = progress_percent(done, total);
                assert!(p >= last, "{done}/{total}");
                last = p;
            }
            assert_eq!(last, 100);
        }
    }

    // ── is_jpeg / collect_jpegs ──────────────────────────────────────

    #[test]
    fn jpeg_extensions_case_insensitive() {
        assert!(is_jpeg(Path::new("a.jpg")));
        assert!(is_jpeg(Path::new("a.JPG")));
        assert!(is_jpeg(Path::new("a.Jpeg")));
        assert!(!is_jpeg(Path::new("a.png")));
        assert!(!is_jpeg(Path::new("a.jpg.txt")));
        assert!(!is_jpeg(Path::new("jpg")));
    }

    #[test]
    fn collect_jpegs_top_level_only() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();

        fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        fs::write(dir.path().join("B.JPEG"), b"x").unwrap();
        fs::write(dir.path().join("c.png"), b"x").unwrap();
        fs::write(sub.join("d.jpg"), b"x").unwrap();

        let mut names: Vec<String> = collect_jpegs(dir.path())
            .unwrap()
            .iter()
            .map(|p| display_name(p))
            .collect();
        names.sort();
        assert_eq!(names, vec!["B.JPEG", "a.jpg"]);
    }

    #[test]
    fn collect_jpegs_skips_directories_named_like_images() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("album.jpg")).unwrap();
        assert!(collect_jpegs(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn collect_jpegs_rejects_missing_dir() {
        assert!(collect_jpegs(Path::new("/nonexistent/batch")).is_err());
    }

    #[test]
    fn ensure_output_dirs_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let first = ensure_output_dirs(dir.path(), &OutputConfig::default()).unwrap();
        let second = ensure_output_dirs(dir.path(), &OutputConfig::default()).unwrap();
        assert_eq!(first.ready, second.ready);
        assert!(first.ready.is_dir());
        assert!(first.failed.is_dir());
    }

    // ── process_image decision table ─────────────────────────────────

    #[tokio::test]
    async fn complete_result_goes_to_ready() {
        let (dir, dirs) = setup();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);

        let service = ScriptedService::new(complete);
        let outcome = process_image(&path, &service, &dirs).await;

        assert_eq!(outcome.destination, Destination::Ready);
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.final_path.as_deref(), Some(dirs.ready.join("a.jpg").as_path()));
        assert!(!path.exists());
        assert_eq!(exif::read_existing(&dirs.ready.join("a.jpg")).title, "Sunset");
    }

    #[tokio::test]
    async fn missing_keywords_goes_to_failed_untouched() {
        let (dir, dirs) = setup();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);
        let original = fs::read(&path).unwrap();

        let service = ScriptedService::new(no_keywords);
        let outcome = process_image(&path, &service, &dirs).await;

        assert_eq!(outcome.destination, Destination::Failed);
        assert!(matches!(outcome.failure, Some(Failure::Incomplete)));
        assert_eq!(fs::read(dirs.failed.join("a.jpg")).unwrap(), original);
    }

    #[tokio::test]
    async fn missing_title_goes_to_failed() {
        let (dir, dirs) = setup();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);

        let service = ScriptedService::new(no_title);
        let outcome = process_image(&path, &service, &dirs).await;

        assert_eq!(outcome.destination, Destination::Failed);
        assert!(matches!(outcome.failure, Some(Failure::Incomplete)));
        assert!(outcome.tags.is_some());
    }

    #[tokio::test]
    async fn service_error_goes_to_failed() {
        let (dir, dirs) = setup();
        let path = dir.path().join("b.jpg");
        write_jpeg(&path);

        let service = ScriptedService::new(server_error);
        let outcome = process_image(&path, &service, &dirs).await;

        assert_eq!(outcome.destination, Destination::Failed);
        assert!(matches!(outcome.failure, Some(Failure::Tagging(_))));
        assert!(outcome.tags.is_none());
        assert!(dirs.failed.join("b.jpg").exists());
    }

    #[tokio::test]
    async fn write_error_goes_to_failed() {
        let (dir, dirs) = setup();
        let path = dir.path().join("corrupt.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        let service = ScriptedService::new(complete);
        let outcome = process_image(&path, &service, &dirs).await;

        assert_eq!(outcome.destination, Destination::Failed);
        assert!(matches!(outcome.failure, Some(Failure::Write(_))));
        assert!(outcome.tags.as_ref().is_some_and(|t| t.is_complete()));
        assert!(dirs.failed.join("corrupt.jpg").exists());
    }

    #[tokio::test]
    async fn existing_metadata_is_sent_as_context() {
        let (dir, dirs) = setup();
        let path = dir.path().join("a.jpg");
        write_jpeg(&path);
        exif::write_tags(
            &path,
            &TagResult {
                title: "Old title".into(),
                description: "Old description".into(),
                keywords: vec!["old".into()],
            },
        )
        .unwrap();

        let service = ScriptedService::new(complete);
        process_image(&path, &service, &dirs).await;

        let contexts = service.contexts.lock().unwrap();
        assert_eq!(contexts.as_slice(), ["Old title Old description"]);
    }

    // ── run_batch ────────────────────────────────────────────────────

    #[tokio::test]
    async fn run_batch_empties_the_source_folder() {
        let dir = TempDir::new().unwrap();
        for name in ["one.jpg", "two.JPG", "three.jpeg"] {
            write_jpeg(&dir.path().join(name));
        }
        fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        let service = ScriptedService::new(complete);
        let mut seen = Vec::new();
        let report = run_batch(dir.path(), &service, &OutputConfig::default(), |o, p| {
            seen.push((o.file_name(), p));
        })
        .await
        .unwrap();

        assert_eq!(report.total(), 3);
        assert_eq!(report.ready_count(), 3);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen.last().unwrap().1.percent, 100);
        assert_eq!(collect_jpegs(dir.path()).unwrap().len(), 0);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn report_serialises_counts_and_outcomes() {
        let dir = TempDir::new().unwrap();
        write_jpeg(&dir.path().join("a.jpg"));

        let service = ScriptedService::new(server_error);
        let report = run_batch(dir.path(), &service, &OutputConfig::default(), |_, _| {})
            .await
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["ready"], 0);
        assert_eq!(json["failed"], 1);

        let image = &json["images"][0];
        assert_eq!(image["destination"], "failed");
        assert!(image["error"].as_str().is_some_and(|e| e.contains("500")));
        assert!(image["tags"].is_null());
        assert!(image["move_error"].is_null());
        assert!(image["final_path"].as_str().is_some_and(|p| p.ends_with("a.jpg")));
    }

    #[tokio::test]
    async fn run_batch_on_empty_folder_creates_outputs() {
        let dir = TempDir::new().unwrap();
        let service = ScriptedService::new(complete);
        let mut calls = 0;
        let report = run_batch(dir.path(), &service, &OutputConfig::default(), |_, _| calls += 1)
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(calls, 0);
        assert!(dir.path().join("ready").is_dir());
        assert!(dir.path().join("failed").is_dir());
    }

    /// Drops a new JPEG into the batch folder on every call.
    struct LateArrivals {
        dir: PathBuf,
    }

    #[async_trait::async_trait]
    impl TaggingService for LateArrivals {
        fn name(&self) -> &str {
            "late-arrivals"
        }

        async fn tag(
            &self,
            _image: Vec<u8>,
            file_name: &str,
            _context: &str,
        ) -> Result<TagResult, TagError> {
            write_jpeg(&self.dir.join(format!("late-{file_name}")));
            complete(file_name)
        }
    }

    #[tokio::test]
    async fn run_batch_ignores_files_added_mid_run() {
        let dir = TempDir::new().unwrap();
        write_jpeg(&dir.path().join("one.jpg"));
        write_jpeg(&dir.path().join("two.jpg"));

        let service = LateArrivals {
            dir: dir.path().to_path_buf(),
        };
        let report = run_batch(dir.path(), &service, &OutputConfig::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(report.total(), 2);
        assert!(dir.path().join("late-one.jpg").exists());
        assert!(dir.path().join("late-two.jpg").exists());
        assert!(!dir.path().join("ready").join("late-one.jpg").exists());
    }

    #[tokio::test]
    async fn run_batch_does_not_descend_into_outputs() {
        let dir = TempDir::new().unwrap();
        let dirs = ensure_output_dirs(dir.path(), &OutputConfig::default()).unwrap();
        write_jpeg(&dirs.ready.join("done.jpg"));
        write_jpeg(&dir.path().join("new.jpg"));

        let service = ScriptedService::new(server_error);
        let report = run_batch(dir.path(), &service, &OutputConfig::default(), |_, _| {})
            .await
            .unwrap();

        assert_eq!(report.total(), 1);
        assert!(dirs.ready.join("done.jpg").exists());
        assert!(dirs.failed.join("new.jpg").exists());
    }
}
