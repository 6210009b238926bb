//! CLI tool for converting, translating and optimizing PowerPoint decks.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use deck_core::markdown;
use deck_core::progress::SinkError;
use deck_core::terms::DEFAULT_MAX_TERMS;
use deck_core::translate::{translate_documents, DEFAULT_BATCH_SIZE};
use deck_core::{
    collect_term_candidates, ChartMode, ExtractOptions, FigureMode, Glossary, GlossaryLimits,
    OverflowPolicy, Progress, ProgressEvent, Rephraser, SlideRange, TranslationBatcher, TranslationConfig,
};
use deck_llm::client::{API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL, MODEL_ENV};
use deck_llm::{run_preflight, LlmConfig, OpenAiClient, PreflightOptions};
use deck_pptx::media::{DEFAULT_MAX_PX, DEFAULT_QUALITY};
use deck_pptx::{
    extract, optimize_archive, reinsert_blocks, translate_presentation, Deck, MediaCache,
};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Convert PowerPoint decks to Markdown and translate them in place.
#[derive(Parser, Debug)]
#[command(name = "deck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a deck as Markdown
    Markdown(MarkdownArgs),
    /// Translate a deck and write a new .pptx
    Translate(TranslateArgs),
    /// Recompress the images of a deck
    OptimizeImages(OptimizeArgs),
    /// List terminology candidates of a deck
    Terms(TermsArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Include speaker notes
    #[arg(short, long)]
    notes: bool,

    /// How pictures are rendered: placeholder or omit
    #[arg(long, default_value = "placeholder")]
    figures: FigureMode,

    /// How charts are rendered: labels, placeholder or omit
    #[arg(long, default_value = "labels")]
    charts: ChartMode,

    /// Do not treat the first table row as a header
    #[arg(long)]
    no_table_header: bool,

    /// Slides to include, e.g. "1-3,5"
    #[arg(short, long)]
    slides: Option<SlideRange>,
}

impl ExtractArgs {
    fn options(&self) -> ExtractOptions {
        ExtractOptions::default()
            .with_notes(self.notes)
            .with_figures(self.figures)
            .with_charts(self.charts)
            .with_table_header(!self.no_table_header)
            .with_slide_range(self.slides.clone())
    }
}

#[derive(Args, Debug)]
struct MarkdownArgs {
    /// Input PowerPoint file(s) (.pptx)
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output directory (default: same as input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print output to stdout instead of writing to file
    #[arg(short, long)]
    print: bool,

    /// Emit the block model as JSON instead of Markdown
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    extract: ExtractArgs,
}

#[derive(Args, Debug)]
struct LlmArgs {
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Chat model used for translation
    #[arg(short, long, env = MODEL_ENV, default_value = DEFAULT_MODEL)]
    model: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,
}

impl LlmArgs {
    fn client(&self) -> Result<OpenAiClient> {
        let config = LlmConfig::new(self.api_key.clone().unwrap_or_default())
            .with_base_url(self.base_url.as_str())
            .with_model(self.model.as_str())
            .with_timeout(Duration::from_secs(self.timeout));
        Ok(OpenAiClient::new(config)?)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Strategy {
    /// Rewrite each paragraph, keeping its first run's formatting
    Paragraphs,
    /// Rebuild shapes from translated blocks, shortening long lines
    Blocks,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    /// Input PowerPoint file (.pptx)
    input: PathBuf,

    /// Output .pptx (default: <input>_<target>.pptx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language code, or "auto"
    #[arg(short, long, default_value = "auto")]
    source: String,

    /// Target language code
    #[arg(short, long, default_value = "en")]
    target: String,

    #[arg(long, value_enum, default_value = "paragraphs")]
    strategy: Strategy,

    /// Glossary file (JSON object or "source<TAB>target" lines)
    #[arg(short, long)]
    glossary: Option<PathBuf>,

    /// Additional instructions for the translator
    #[arg(long)]
    instructions: Option<String>,

    /// Review terminology with the model before translating
    #[arg(long)]
    preflight: bool,

    /// Unique strings per request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Character budget per line (blocks strategy)
    #[arg(long, default_value = "180")]
    max_chars: usize,

    /// Smallest font size in points when shrinking (blocks strategy)
    #[arg(long, default_value = "12")]
    min_font_size: f32,

    /// Recompress embedded images after translating
    #[arg(long)]
    optimize_images: bool,

    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    quality: u8,

    #[arg(long, default_value_t = DEFAULT_MAX_PX)]
    max_px: u32,

    /// Also write the translated deck as Markdown
    #[arg(long)]
    markdown: Option<PathBuf>,

    #[command(flatten)]
    llm: LlmArgs,
}

#[derive(Args, Debug)]
struct OptimizeArgs {
    /// Input PowerPoint file (.pptx)
    input: PathBuf,

    /// Output .pptx (default: <input>_optimized.pptx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    quality: u8,

    /// Longest image edge in pixels (0 keeps the size)
    #[arg(long, default_value_t = DEFAULT_MAX_PX)]
    max_px: u32,
}

#[derive(Args, Debug)]
struct TermsArgs {
    /// Input PowerPoint file (.pptx)
    input: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MAX_TERMS)]
    max_terms: usize,

    /// Ask the model for preferred translations into this language
    #[arg(long)]
    suggest: Option<String>,

    #[command(flatten)]
    llm: LlmArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    match &cli.command {
        Command::Markdown(args) => run_markdown(args),
        Command::Translate(args) => run_translate(args),
        Command::OptimizeImages(args) => run_optimize(args),
        Command::Terms(args) => run_terms(args),
    }
}

fn open_deck(path: &Path) -> Result<Deck> {
    Deck::open_path(path).with_context(|| format!("Failed to open {}", path.display()))
}

fn log_progress(event: &ProgressEvent) -> std::result::Result<(), SinkError> {
    log::info!("[{:>3.0}%] {}", event.ratio * 100.0, event.message);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_markdown(args: &MarkdownArgs) -> Result<()> {
    let options = args.extract.options();
    for input_path in &args.input {
        log::debug!("Processing: {}", input_path.display());

        match process_file(input_path, args, &options) {
            Ok(output) => {
                if args.print {
                    print!("{}", output);
                } else {
                    let ext = if args.json { "json" } else { "md" };
                    let output_path = get_output_path(input_path, args.output.as_ref(), ext)?;
                    write_output(&output_path, &output)?;
                    log::info!("Written to: {}", output_path.display());
                }
            }
            Err(e) => {
                eprintln!("Error processing {}: {:#}", input_path.display(), e);
            }
        }
    }
    Ok(())
}

/// Render a single deck.
fn process_file(input_path: &Path, args: &MarkdownArgs, options: &ExtractOptions) -> Result<String> {
    let deck = open_deck(input_path)?;
    log::debug!("  Found {} slides", deck.slide_count());

    let documents = extract(&deck, options)?;
    if args.json {
        let mut json = serde_json::to_string_pretty(&documents)?;
        json.push('\n');
        return Ok(json);
    }
    Ok(markdown::render(&documents, options))
}

fn read_glossary(path: &Path) -> Result<Glossary> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read glossary {}", path.display()))?;
    Ok(Glossary::parse(&content, &GlossaryLimits::default())?)
}

#[derive(Serialize)]
struct TranslateSummary<T: Serialize> {
    output: PathBuf,
    translation: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<deck_pptx::MediaStats>,
}

fn run_translate(args: &TranslateArgs) -> Result<()> {
    let glossary = args.glossary.as_deref().map(read_glossary).transpose()?;
    let client = args.llm.client()?;
    let mut deck = open_deck(&args.input)?;

    let mut config = TranslationConfig::new(args.source.as_str(), args.target.as_str())
        .with_model(args.llm.model.as_str())
        .with_glossary(glossary)
        .with_extra_instructions(args.instructions.clone());

    if args.preflight {
        let documents = extract(&deck, &ExtractOptions::default())?;
        let options = PreflightOptions::new(args.target.as_str()).with_model(Some(args.llm.model.clone()));
        let review = run_preflight(&documents, &client, &options);
        let mut merged = config.glossary.take().unwrap_or_default();
        merged.merge_missing(&review.suggested_glossary());
        log::info!("Using {} glossary entries after preflight", merged.len());
        let instructions = match (config.extra_instructions.take(), review.style_note.as_str()) {
            (Some(own), "") => Some(own),
            (Some(own), note) => Some(format!("{}\n{}", own, note)),
            (None, note) => Some(note.to_string()),
        };
        config = config
            .with_glossary(Some(merged))
            .with_extra_instructions(instructions);
    }

    let sink = log_progress;
    let progress = Progress::new(&sink);
    let batcher = TranslationBatcher::new(&client).with_batch_size(args.batch_size);

    let translation = match args.strategy {
        Strategy::Paragraphs => {
            serde_json::to_value(translate_presentation(&mut deck, &batcher, &config, &progress)?)?
        }
        Strategy::Blocks => {
            let documents = extract(&deck, &ExtractOptions::default().with_notes(true))?;
            let translated = translate_documents(&documents, &batcher, &config, &progress)?;
            let policy = OverflowPolicy::default()
                .with_max_chars(args.max_chars)
                .with_min_font_size(args.min_font_size);
            serde_json::to_value(reinsert_blocks(&mut deck, &translated, &policy, Some(&client as &dyn Rephraser))?)?
        }
    };

    let images = if args.optimize_images {
        let mut cache = MediaCache::new(args.quality, args.max_px);
        Some(deck.optimize_media(&mut cache)?)
    } else {
        None
    };

    let output = match &args.output {
        Some(path) => path.clone(),
        None => sibling_path(&args.input, &args.target, "pptx"),
    };
    deck.save_path(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if let Some(md_path) = &args.markdown {
        let options = ExtractOptions::default();
        let documents = extract(&deck, &options)?;
        write_output(md_path, &markdown::render(&documents, &options))?;
    }

    print_json(&TranslateSummary {
        output,
        translation,
        images,
    })
}

fn run_optimize(args: &OptimizeArgs) -> Result<()> {
    let source = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let mut cache = MediaCache::new(args.quality, args.max_px);
    let (rewritten, stats) = optimize_archive(&source, &mut cache)?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => sibling_path(&args.input, "optimized", "pptx"),
    };
    let mut file =
        File::create(&output).with_context(|| format!("Failed to create {}", output.display()))?;
    file.write_all(&rewritten)
        .with_context(|| format!("Failed to write to {}", output.display()))?;

    print_json(&stats)
}

fn run_terms(args: &TermsArgs) -> Result<()> {
    let deck = open_deck(&args.input)?;
    let documents = extract(&deck, &ExtractOptions::default().with_notes(true))?;

    match &args.suggest {
        Some(target) => {
            let client = args.llm.client()?;
            let options = PreflightOptions::new(target.as_str())
                .with_model(Some(args.llm.model.clone()))
                .with_max_terms(args.max_terms);
            print_json(&run_preflight(&documents, &client, &options))
        }
        None => print_json(&collect_term_candidates(&documents, args.max_terms)),
    }
}

/// `<dir>/<stem>_<suffix>.<ext>` next to the input.
fn sibling_path(input_path: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input_path.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
}

/// Determine the output path for a processed file.
fn get_output_path(input_path: &Path, output_dir: Option<&PathBuf>, ext: &str) -> Result<PathBuf> {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let output_filename = format!("{}.{}", stem, ext);

    let output_path = match output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            dir.join(output_filename)
        }
        None => {
            if let Some(parent) = input_path.parent() {
                parent.join(output_filename)
            } else {
                PathBuf::from(output_filename)
            }
        }
    };

    Ok(output_path)
}

/// Write output to a file.
fn write_output(path: &Path, content: &str) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_translate_defaults() {
        let cli = Cli::try_parse_from(["deck", "translate", "talk.pptx", "-t", "ko", "--api-key", "sk"]).unwrap();
        match cli.command {
            Command::Translate(args) => {
                assert_eq!(args.strategy, Strategy::Paragraphs);
                assert_eq!(args.source, "auto");
                assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
                assert_eq!(args.max_chars, 180);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_markdown_options() {
        let cli = Cli::try_parse_from([
            "deck", "markdown", "a.pptx", "--notes", "--figures", "omit", "--charts", "placeholder", "-s", "2-3",
        ])
        .unwrap();
        let Command::Markdown(args) = cli.command else {
            panic!("expected markdown");
        };
        let options = args.extract.options();
        assert!(options.with_notes);
        assert_eq!(options.figures, FigureMode::Omit);
        assert_eq!(options.charts, ChartMode::Placeholder);
        assert!(options.includes_slide(3));
        assert!(!options.includes_slide(1));

        assert!(Cli::try_parse_from(["deck", "markdown", "a.pptx", "--figures", "maybe"]).is_err());
    }

    #[test]
    fn test_output_paths() {
        assert_eq!(
            sibling_path(Path::new("/tmp/talk.pptx"), "ko", "pptx"),
            PathBuf::from("/tmp/talk_ko.pptx")
        );
        assert_eq!(
            get_output_path(Path::new("decks/talk.pptx"), None, "md").unwrap(),
            PathBuf::from("decks/talk.md")
        );
    }
}
