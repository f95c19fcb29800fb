use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use careguide_scan::config::AppConfig;
use careguide_scan::errors::error_logging;
use careguide_scan::medicine_extraction::MedicineExtractor;
use careguide_scan::observability;
use careguide_scan::ocr::TesseractRecognizer;
use careguide_scan::pipeline::{PrescriptionScanner, ScanOutcome, ScanReport};
use clap::Parser;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// How long exit waits for scans abandoned by a timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

const AFTER_HELP: &str = r#"ENVIRONMENT:
  TESSERACT_PATH          Tesseract installation or tessdata directory, searched first
  OCR_LANGUAGES           Recognition languages joined with '+' (default: eng)
  MEDICINE_LEXICON_PATH   JSON file replacing the built-in medicine lexicon
  NER_MODEL_PATH          Gazetteer file enabling the entity-based method
  LOG_FORMAT              pretty | json
  RUST_LOG                Tracing filter directives, taking precedence per target
"#;

/// Extract medicine names from photographed prescriptions.
#[derive(Parser, Debug)]
#[command(
    name = "careguide-scan",
    version,
    about = "Extract medicine names from photographed prescriptions",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Prescription images to scan.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Print one JSON object per image instead of text.
    #[arg(long)]
    json: bool,

    /// Give up on an image after this many seconds.
    #[arg(long, env = "SCAN_TIMEOUT_SECS",
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    timeout_secs: Option<u64>,

    /// Recognition languages, e.g. eng or eng+hin.
    #[arg(long, env = "OCR_LANGUAGES")]
    languages: Option<String>,

    /// Number of images processed concurrently.
    #[arg(short, long, env = "MAX_CONCURRENT_SCANS")]
    concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ImageOutput {
    image: String,
    #[serde(flatten)]
    report: Option<ScanReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ImageOutput {
    fn failed(image: String, error: impl ToString) -> Self {
        Self {
            image,
            report: None,
            error: Some(error.to_string()),
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;

    if let Some(languages) = &cli.languages {
        config.ocr.languages = languages.clone();
    }
    if cli.timeout_secs.is_some() {
        config.runtime.scan_timeout_secs = cli.timeout_secs;
    }
    if let Some(concurrency) = cli.concurrency {
        config.runtime.max_concurrent_scans = concurrency;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;
    Ok(config)
}

/// Scan one image once a permit is free.
///
/// The permit moves into the blocking job, so an image that timed out still
/// counts against the concurrency limit until its scan actually returns.
async fn scan_one(
    scanner: Arc<PrescriptionScanner>,
    path: PathBuf,
    timeout: Option<Duration>,
    permits: Arc<Semaphore>,
) -> ImageOutput {
    let image = path.display().to_string();
    let permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return ImageOutput::failed(image, e),
    };
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        scanner.scan_file(&path)
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(image = %image, timeout_ms = limit.as_millis() as u64, "Scan timed out");
                return ImageOutput::failed(image, format!("timed out after {:?}", limit));
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(ScanOutcome::Readable(report))) => ImageOutput {
            image,
            report: Some(report),
            error: None,
        },
        Ok(Ok(ScanOutcome::NothingReadable)) => {
            ImageOutput::failed(image, "No text could be extracted from the image")
        }
        Ok(Err(err)) => {
            error_logging::log_ocr_error(&err, "scan_file", Some(&image), None, None);
            ImageOutput::failed(image, err)
        }
        Err(join_error) => ImageOutput::failed(image, format!("scan task failed: {}", join_error)),
    }
}

/// Scan every image with at most `max_concurrent` scans running; outputs keep input order.
async fn scan_all(
    scanner: Arc<PrescriptionScanner>,
    images: &[PathBuf],
    timeout: Option<Duration>,
    max_concurrent: usize,
) -> Vec<ImageOutput> {
    let permits = Arc::new(Semaphore::new(max_concurrent));

    let handles: Vec<_> = images
        .iter()
        .cloned()
        .map(|path| {
            let scanner = Arc::clone(&scanner);
            let permits = Arc::clone(&permits);
            tokio::spawn(scan_one(scanner, path, timeout, permits))
        })
        .collect();

    let mut outputs = Vec::with_capacity(images.len());
    for (handle, path) in handles.into_iter().zip(images) {
        outputs.push(handle.await.unwrap_or_else(|e| {
            ImageOutput::failed(path.display().to_string(), format!("scan task failed: {}", e))
        }));
    }
    outputs
}

fn print_output(output: &ImageOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(output)?);
        return Ok(());
    }

    println!("== {}", output.image);
    match (&output.report, &output.error) {
        (Some(report), _) => {
            println!("{}", report.extracted_text);
            println!("--");
            if report.medicines_detected.is_empty() {
                println!("medicines: (none detected)");
            } else {
                println!("medicines: {}", report.medicines_detected.join(", "));
            }
        }
        (None, Some(error)) => println!("error: {}", error),
        (None, None) => {}
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = load_config(&cli)?;
    observability::init_tracing_with_config(&config.observability)?;
    info!("{}", config.summary());

    // Fail before touching any image when the engine is missing
    let recognizer = TesseractRecognizer::new(&config.ocr)?;
    let extractor = MedicineExtractor::from_config(&config.extraction)?;

    let scanner = Arc::new(PrescriptionScanner::new(
        config.conditioning.clone(),
        Arc::new(recognizer),
        Arc::new(extractor),
    ));

    let timeout = config.runtime.scan_timeout_secs.map(Duration::from_secs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let outputs = runtime.block_on(scan_all(
        scanner,
        &cli.images,
        timeout,
        config.runtime.max_concurrent_scans,
    ));
    // Timed-out scans cannot be cancelled; do not wait for them on exit
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    let mut failures = 0usize;
    for output in &outputs {
        if output.error.is_some() {
            failures += 1;
        }
        print_output(output, cli.json)?;
    }

    info!(
        images = cli.images.len(),
        failures = failures,
        "Scan run finished"
    );

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use careguide_scan::ocr::{OcrError, TextRecognizer};
    use careguide_scan::preprocessing::{ConditionedImage, ConditioningConfig};
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use tempfile::TempDir;

    /// Sleeps while "recognizing" and records how many calls overlap.
    struct SlowRecognizer {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowRecognizer {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognizer for SlowRecognizer {
        fn recognize(&self, _image: &ConditionedImage) -> Result<String, OcrError> {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("Tab Amlodipine 5mg".to_string())
        }

        fn engine_name(&self) -> &str {
            "slow"
        }
    }

    fn scanner_with(recognizer: Arc<SlowRecognizer>) -> Arc<PrescriptionScanner> {
        Arc::new(PrescriptionScanner::new(
            ConditioningConfig::default(),
            recognizer,
            Arc::new(MedicineExtractor::with_builtin_lexicon()),
        ))
    }

    fn write_pages(dir: &TempDir, count: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.path().join(format!("rx{}.png", i));
                DynamicImage::ImageLuma8(GrayImage::from_pixel(80, 60, Luma([230])))
                    .save(&path)
                    .unwrap();
                path
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_scan_keeps_its_slot() {
        let dir = TempDir::new().unwrap();
        let images = write_pages(&dir, 3);
        let recognizer = Arc::new(SlowRecognizer::new(Duration::from_millis(200)));

        let outputs = scan_all(
            scanner_with(Arc::clone(&recognizer)),
            &images,
            Some(Duration::from_millis(20)),
            1,
        )
        .await;

        assert_eq!(outputs.len(), 3);
        for output in &outputs {
            assert!(output.report.is_none());
            assert!(output.error.as_deref().unwrap().contains("timed out"));
        }

        // Let the abandoned scans drain before reading the counters
        while Arc::strong_count(&recognizer) > 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(recognizer.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outputs_follow_input_order() {
        let dir = TempDir::new().unwrap();
        let mut images = write_pages(&dir, 2);
        images.insert(1, dir.path().join("missing.png"));
        let recognizer = Arc::new(SlowRecognizer::new(Duration::from_millis(1)));

        let outputs = scan_all(scanner_with(Arc::clone(&recognizer)), &images, None, 2).await;

        let names: Vec<_> = outputs.iter().map(|o| o.image.clone()).collect();
        let expected: Vec<_> = images.iter().map(|p| p.display().to_string()).collect();
        assert_eq!(names, expected);
        assert_eq!(
            outputs[0].report.as_ref().unwrap().medicines_detected,
            vec!["amlodipine"]
        );
        assert!(outputs[1].error.is_some());
        assert!(outputs[2].report.is_some());
        assert!(recognizer.max_in_flight.load(Ordering::SeqCst) <= 2);
    }
}
