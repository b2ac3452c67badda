mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use faceveil_core::assembly::domain::media_assembler::{AssemblyOutcome, MediaAssembler};
use faceveil_core::assembly::infrastructure::ffmpeg_cli_remux_tool::FfmpegCliRemuxTool;
use faceveil_core::concealment::domain::concealment_config::ConcealmentConfig;
use faceveil_core::concealment::infrastructure::cpu_face_concealer::CpuFaceConcealer;
use faceveil_core::detection::domain::face_detector::FaceDetector;
use faceveil_core::detection::infrastructure::model_resolver::{
    self, DETECTION_MODEL, EMBEDDING_MODEL,
};
use faceveil_core::detection::infrastructure::onnx_face_analyzer::OnnxFaceAnalyzer;
use faceveil_core::pipeline::build_whitelist_use_case::BuildWhitelistUseCase;
use faceveil_core::pipeline::conceal_image_use_case::ConcealImageUseCase;
use faceveil_core::pipeline::conceal_video_use_case::{ConcealVideoUseCase, VideoJobOutcome};
use faceveil_core::pipeline::frame_processor::FrameProcessor;
use faceveil_core::pipeline::infrastructure::batched_pipeline_executor::BatchedPipelineExecutor;
use faceveil_core::pipeline::job_state::JobState;
use faceveil_core::pipeline::pipeline_executor::PipelineConfig;
use faceveil_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use faceveil_core::shared::constants::{DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS, MAX_WORKERS};
use faceveil_core::shared::time_range::TimeRange;
use faceveil_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use faceveil_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use faceveil_core::video::infrastructure::image_file_reader::ImageFileReader;
use faceveil_core::video::infrastructure::image_file_writer::ImageFileWriter;
use faceveil_core::whitelist::domain::whitelist::{SimilarityThreshold, Whitelist};

use settings::{Settings, Shape};

/// Exit status for a job stopped with Ctrl+C.
const EXIT_CANCELLED: i32 = 130;

/// Conceal faces in images and videos, sparing whitelisted people.
#[derive(Parser)]
#[command(
    name = "faceveil",
    after_help = "Documents (.docx, .pdf) are not supported; convert their pages to images first."
)]
struct Cli {
    /// Input image or video file. Documents are rejected.
    input: PathBuf,

    /// Output file.
    output: PathBuf,

    /// Concealment shape.
    #[arg(long, value_enum)]
    shape: Option<Shape>,

    /// Blur strength; the kernel is the next odd size.
    #[arg(long)]
    strength: Option<u32>,

    /// Feather radius of the mask edge, in pixels (0 = hard edge).
    #[arg(long)]
    feather: Option<u32>,

    /// Effect opacity (0.0-1.0).
    #[arg(long)]
    opacity: Option<f32>,

    /// Tile size for mosaic and pixelate.
    #[arg(long)]
    block_size: Option<u32>,

    /// Directory of reference photos whose faces are left visible.
    #[arg(long)]
    whitelist_dir: Option<PathBuf>,

    /// Cosine similarity above which a face counts as whitelisted (0.0-1.0, exclusive).
    #[arg(long)]
    threshold: Option<f32>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Start of the video range to process, in seconds.
    #[arg(long, default_value = "0")]
    start: f64,

    /// Length of the video range in seconds (0 or absent = until the end).
    #[arg(long)]
    duration: Option<f64>,

    /// ffmpeg binary used to restore the audio track.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Directory holding (or receiving) the ONNX models.
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Worker threads for video frames (default: CPU count, at most 4).
    #[arg(long)]
    workers: Option<usize>,

    /// Settings file to read instead of the user default.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long)]
    save_settings: bool,
}

impl Cli {
    /// Flags given on the command line win over the settings file.
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(shape) = self.shape {
            settings.shape = shape;
        }
        if let Some(strength) = self.strength {
            settings.strength = strength;
        }
        if let Some(feather) = self.feather {
            settings.feather = feather;
        }
        if let Some(opacity) = self.opacity {
            settings.opacity = opacity;
        }
        if let Some(block_size) = self.block_size {
            settings.block_size = block_size;
        }
        if let Some(threshold) = self.threshold {
            settings.threshold = threshold;
        }
        if let Some(confidence) = self.confidence {
            settings.confidence = confidence;
        }
        if self.whitelist_dir.is_some() {
            settings.whitelist_dir = self.whitelist_dir.clone();
        }
        if self.models_dir.is_some() {
            settings.models_dir = self.models_dir.clone();
        }
        if self.ffmpeg.is_some() {
            settings.ffmpeg = self.ffmpeg.clone();
        }
        if self.workers.is_some() {
            settings.workers = self.workers;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Document
        } else {
            MediaKind::Video
        }
    }
}

enum JobStatus {
    Done,
    Cancelled,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(JobStatus::Done) => {}
        Ok(JobStatus::Cancelled) => process::exit(EXIT_CANCELLED),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn run() -> Result<JobStatus, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };
    cli.apply_to(&mut settings);
    if cli.save_settings {
        save_settings(&settings, cli.settings.as_deref())?;
    }

    let kind = validate(&cli, &settings)?;
    let config = ConcealmentConfig::new(
        settings.shape.into(),
        settings.strength,
        settings.feather,
        settings.opacity,
        settings.block_size,
    )?;
    let threshold = SimilarityThreshold::new(settings.threshold)?;

    let analyzer = build_analyzer(&settings)?;
    let whitelist = match &settings.whitelist_dir {
        Some(dir) => BuildWhitelistUseCase::new(Box::new(ImageFileReader::new()), analyzer.clone())
            .build_from_dir(dir)?,
        None => Whitelist::Empty,
    };
    let processor = Arc::new(FrameProcessor::new(
        analyzer,
        Arc::new(whitelist),
        threshold,
        Arc::new(CpuFaceConcealer::new(config)),
    ));

    match kind {
        MediaKind::Image => {
            let use_case = ConcealImageUseCase::new(
                Box::new(ImageFileReader::new()),
                Box::new(ImageFileWriter::new()),
                processor,
            );
            use_case.execute(&cli.input, &cli.output)?;
            log::info!("Output written to {}", cli.output.display());
            Ok(JobStatus::Done)
        }
        MediaKind::Video => run_video(&cli, &settings, processor),
        MediaKind::Document => Err(format!(
            "{}: documents are not supported by the command-line tool",
            cli.input.display()
        )
        .into()),
    }
}

fn run_video(
    cli: &Cli,
    settings: &Settings,
    processor: Arc<FrameProcessor>,
) -> Result<JobStatus, Box<dyn std::error::Error>> {
    let range = TimeRange::new(cli.start, cli.duration)?;

    let job = Arc::new(JobState::new());
    let handler_job = job.clone();
    ctrlc::set_handler(move || {
        log::info!("Cancelling...");
        handler_job.cancel();
    })?;

    let mut config = PipelineConfig::new(job);
    if let Some(workers) = settings.workers {
        config.workers = workers;
    }
    config.logger = Box::new(
        StdoutPipelineLogger::default().with_whitelist_size(processor.whitelist().len()),
    );

    let remux_tool = match &settings.ffmpeg {
        Some(program) => FfmpegCliRemuxTool::new(program),
        None => FfmpegCliRemuxTool::default(),
    };
    let mut use_case = ConcealVideoUseCase::new(
        Box::new(FfmpegReader::new()),
        Box::new(FfmpegWriter::new()),
        processor,
        Box::new(BatchedPipelineExecutor::new()),
        MediaAssembler::new(Arc::new(remux_tool)),
        config,
    );

    match use_case.execute(&cli.input, &cli.output, &range)? {
        VideoJobOutcome::Completed { assembly, .. } => {
            if assembly == AssemblyOutcome::AudioLess {
                log::warn!("Output has no audio track");
            }
            log::info!("Output written to {}", cli.output.display());
            Ok(JobStatus::Done)
        }
        VideoJobOutcome::Cancelled => {
            eprintln!("Cancelled; no output written");
            Ok(JobStatus::Cancelled)
        }
    }
}

fn build_analyzer(settings: &Settings) -> Result<Arc<dyn FaceDetector>, Box<dyn std::error::Error>> {
    let models_dir = settings.models_dir.as_deref();
    let mut paths = Vec::new();
    for spec in [DETECTION_MODEL, EMBEDDING_MODEL] {
        log::info!("Resolving model: {}", spec.name);
        let path = model_resolver::resolve(
            &spec,
            models_dir,
            Some(Box::new(move |done: u64, total: u64| {
                download_progress(spec.name, done, total)
            })),
        )?;
        paths.push(path);
    }

    Ok(Arc::new(OnnxFaceAnalyzer::new(
        &paths[0],
        &paths[1],
        settings.confidence,
    )?))
}

fn save_settings(settings: &Settings, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Settings::default_path().ok_or("no configuration directory for settings")?,
    };
    settings.save_to(&path)?;
    log::info!("Settings saved to {}", path.display());
    Ok(())
}

fn validate(cli: &Cli, settings: &Settings) -> Result<MediaKind, Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if cli.input == cli.output {
        return Err("Output must differ from the input".into());
    }
    if !(0.0..=1.0).contains(&settings.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            settings.confidence
        )
        .into());
    }
    if let Some(workers) = settings.workers {
        if workers == 0 || workers > MAX_WORKERS {
            return Err(
                format!("Workers must be between 1 and {MAX_WORKERS}, got {workers}").into(),
            );
        }
    }
    Ok(MediaKind::of(&cli.input))
}

fn download_progress(name: &str, downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading {name}... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading {name}... {downloaded} bytes");
    }
}
