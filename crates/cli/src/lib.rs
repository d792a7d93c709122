use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use page_canvas::Template;
use paperdeck_core::{
    detect_cover_candidates, load_document, DocumentStore, LoaderConfig, MutationOutcome,
    SkipReason,
};
use pdf_engine::{default_engine, LopdfEngine, OpenSource, PdfEngine, ThumbnailSize};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "paperdeck-cli")]
#[command(about = "Paperdeck CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the page list as it would load into a session.
    Pages {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a thumbnail PNG for a page.
    RenderThumb {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 320)]
        width: u32,
        #[arg(long, default_value_t = 320)]
        height: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Delete a page and write the edited PDF.
    DeletePage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: u32,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Apply a cover template to a page and write the edited PDF.
    Cover {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, value_enum, default_value_t = TemplateArg::Blank)]
        template: TemplateArg,
        /// Carry the page's text runs into the editing session.
        #[arg(long)]
        with_text: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a PDF containing all pages, or only the ones given.
    Export {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// 1-based page numbers, comma separated.
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TemplateArg {
    Blank,
    Business,
    Academic,
    Creative,
}

impl From<TemplateArg> for Template {
    fn from(value: TemplateArg) -> Self {
        match value {
            TemplateArg::Blank => Template::Blank,
            TemplateArg::Business => Template::Business,
            TemplateArg::Academic => Template::Academic,
            TemplateArg::Creative => Template::Creative,
        }
    }
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    id: String,
    page_number: u32,
    has_thumbnail: bool,
    cover_candidate: bool,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    init_tracing();

    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Pages { file } => run_pages(&file),
        Commands::RenderThumb { file, page, width, height, output } => {
            run_render_thumb(&file, page, width, height, output.as_deref())
        }
        Commands::DeletePage { file, page, output } => {
            run_delete_page(&file, page, output.as_deref())
        }
        Commands::Cover { file, page, template, with_text, output } => {
            run_cover(&file, page, template, with_text, output.as_deref())
        }
        Commands::Export { file, pages, output } => run_export(&file, &pages, output.as_deref()),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    engine.close(handle)?;

    Ok(())
}

fn run_pages(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let store = load_store(file)?;
    let document = store.state().document.as_ref().context("no document loaded")?;
    let candidates = detect_cover_candidates(document);

    let payload: Vec<PageOutput> = document
        .pages
        .iter()
        .map(|page| PageOutput {
            id: page.id.clone(),
            page_number: page.page_number,
            has_thumbnail: page.thumbnail.is_some(),
            cover_candidate: candidates.contains(&page.id),
        })
        .collect();

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_render_thumb(
    file: &Path,
    page: u32,
    width: u32,
    height: u32,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_index = page - 1;
    let image = engine
        .render_thumbnail(handle, page_index, ThumbnailSize { width_px: width, height_px: height })
        .context("failed to render thumbnail")?;

    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_thumbnail_output(file, page));

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    engine.close(handle)?;

    Ok(())
}

fn run_delete_page(file: &Path, page: u32, output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut store = load_store(file)?;
    let page_id = page_id_for_number(&store, page)
        .with_context(|| format!("page {page} is out of range"))?;

    let revision = store.revision();
    let outcome = store.delete_page(&page_id, revision).context("failed to delete page")?;
    report_outcome(outcome)?;

    write_export(&mut store, file, output)
}

fn run_cover(
    file: &Path,
    page: u32,
    template: TemplateArg,
    with_text: bool,
    output: Option<&Path>,
) -> Result<()> {
    ensure_pdf_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut store = load_store(file)?;
    let page_index = (page - 1) as usize;

    let mut session = store
        .cover_session(page_index, with_text)
        .context("failed to start cover session")?;
    session.apply_template(template.into()).context("failed to apply template")?;

    let raster = session.scene().rasterize().context("failed to rasterize cover")?;
    let revision = store.revision();
    let outcome = store
        .apply_cover_edit(page_index, &raster, revision)
        .context("failed to apply cover edit")?;
    report_outcome(outcome)?;

    let page_id = page_id_for_number(&store, page)
        .with_context(|| format!("page {page} is out of range"))?;
    store.mark_as_cover(page_id);

    write_export(&mut store, file, output)
}

fn run_export(file: &Path, pages: &[u32], output: Option<&Path>) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut store = load_store(file)?;
    for number in pages {
        let page_id = page_id_for_number(&store, *number)
            .with_context(|| format!("page {number} is out of range"))?;
        store.select_page(page_id);
    }

    write_export(&mut store, file, output)
}

fn load_store(file: &Path) -> Result<DocumentStore<LopdfEngine>> {
    let bytes =
        fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let name =
        file.file_name().and_then(|name| name.to_str()).unwrap_or("document.pdf").to_owned();

    let mut engine = default_engine();
    let document = load_document(&mut engine, &name, bytes, &LoaderConfig::default())
        .context("failed to open PDF")?;

    let mut store = DocumentStore::new(engine);
    store.set_document(document);
    Ok(store)
}

fn page_id_for_number(store: &DocumentStore<LopdfEngine>, page: u32) -> Option<String> {
    store
        .state()
        .document
        .as_ref()?
        .pages
        .iter()
        .find(|candidate| candidate.page_number == page)
        .map(|candidate| candidate.id.clone())
}

fn report_outcome(outcome: MutationOutcome) -> Result<()> {
    match outcome {
        MutationOutcome::Applied => Ok(()),
        MutationOutcome::Degraded(_) => {
            eprintln!("warning: page metadata updated but the PDF bytes kept their previous content");
            Ok(())
        }
        MutationOutcome::Skipped(reason) => anyhow::bail!("skipped: {}", skip_message(reason)),
    }
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NoDocument => "no document loaded",
        SkipReason::LastPage => "cannot delete the only remaining page",
        SkipReason::UnknownPage => "page not found",
    }
}

fn write_export(
    store: &mut DocumentStore<LopdfEngine>,
    source: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let bytes = store.export().context("no document loaded")?;

    let output = output
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_export_output(store, source));

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(&output, bytes)
        .with_context(|| format!("failed to write PDF to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn default_export_output(store: &DocumentStore<LopdfEngine>, source: &Path) -> PathBuf {
    let name =
        store.export_file_name().unwrap_or_else(|| "document_edited.pdf".to_owned());

    source.with_file_name(name)
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_thumbnail_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("thumbnail");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
