//! quire - assemble scanned page images into a single PDF file.
//!
//! Takes pre-processed bilevel page images (TIFF or PNG), discovers
//! their background/foreground/hOCR sidecar files, optionally runs the
//! external `jbig2` encoder over the stencils, and hands everything to
//! the core builder.

use std::error::Error;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use clap::{ArgAction, Parser, ValueEnum};
use quire_core::builder::{BuildOptions, Builder, PageSource, Stencil, StencilFormat};
use quire_core::inspect::ImageDescriptor;
use quire_core::labels::PageLabels;
use quire_core::meta::parse_meta;
use quire_core::outline::Outline;
use regex::Regex;

/// Stencil compression selected on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StencilArg {
    /// JBIG2 with a shared symbol dictionary (needs the jbig2 encoder)
    #[default]
    Jbig2,
    /// CCITT group 4 fax compression
    Ccitt,
}

/// Initial page layout the viewer is asked to use.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum PageLayoutArg {
    #[default]
    SinglePage,
    OneColumn,
    TwoColumnLeft,
    TwoColumnRight,
}

impl PageLayoutArg {
    fn pdf_name(self) -> &'static str {
        match self {
            Self::SinglePage => "SinglePage",
            Self::OneColumn => "OneColumn",
            Self::TwoColumnLeft => "TwoColumnLeft",
            Self::TwoColumnRight => "TwoColumnRight",
        }
    }
}

/// Assemble scanned page images into a single PDF file.
#[derive(Parser, Debug)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Page image files (TIFF or PNG, one per page)
    #[arg(required = true)]
    files: Vec<String>,

    /// Path of the PDF file to write, or "-" for stdout
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Table of contents file for the document outline
    #[arg(short = 'C', long = "toc")]
    toc: Option<PathBuf>,

    /// Page label ranges, e.g. "0:Cover %;2:%R;8:%D"
    #[arg(short = 'L', long = "labels")]
    labels: Option<String>,

    /// Metadata file with Key: "value" lines
    #[arg(short = 'M', long = "meta")]
    meta: Option<PathBuf>,

    /// Initial page layout shown by the viewer
    #[arg(long = "page-layout", value_enum, default_value = "single-page")]
    page_layout: PageLayoutArg,

    /// Compression format for the stencil layer
    #[arg(long = "st-format", value_enum, default_value = "jbig2")]
    st_format: StencilArg,

    /// Number of pages sharing one JBIG2 symbol dictionary
    #[arg(long = "pages-per-dict", default_value = "15")]
    pages_per_dict: usize,

    /// Delete the generated encoder files after the build
    #[arg(short = 'd', long = "delfiles", action = ArgAction::SetTrue)]
    delfiles: bool,
}

static INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\A([^.]*)\.(TIFF?|PNG)\z").unwrap());

/// Sidecar extensions in embedding-preference order: lossless formats
/// first, then JPEG2000, then JPEG.
const SIDECAR_EXTS: [&str; 7] = ["png", "tif", "tiff", "jp2", "jpx", "jpg", "jpeg"];

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let mut pages = collect_pages(&args.files);
    if pages.is_empty() {
        eprintln!("Error: no usable page images given");
        std::process::exit(1);
    }

    let labels = args.labels.as_deref().map(PageLabels::parse);
    let toc = args.toc.as_deref().and_then(load_toc);
    let meta = match args.meta.as_deref().and_then(read_aux) {
        Some(text) => parse_meta(&text),
        None => Default::default(),
    };

    let mut generated: Vec<PathBuf> = Vec::new();
    let mut st_format = match args.st_format {
        StencilArg::Jbig2 => StencilFormat::Jbig2,
        StencilArg::Ccitt => StencilFormat::Ccitt,
    };
    if st_format == StencilFormat::Jbig2
        && !jbig2_encode(&mut pages, args.pages_per_dict.max(1), &mut generated)
    {
        st_format = StencilFormat::Ccitt;
    }

    let mut builder = Builder::new(BuildOptions {
        labels,
        toc,
        meta,
        page_layout: args.page_layout.pdf_name().into(),
        st_format,
    });
    builder.process(&pages)?;
    let pdf = builder.finish()?;

    if args.output == "-" {
        io::stdout().write_all(&pdf)?;
    } else {
        fs::write(&args.output, &pdf)
            .map_err(|e| format!("could not write to {}: {e}", args.output))?;
    }

    if args.delfiles {
        for path in &generated {
            match fs::remove_file(path) {
                Ok(()) => eprintln!(" Deleted {}", path.display()),
                Err(err) => eprintln!("Could not delete {}: {err}", path.display()),
            }
        }
    }
    Ok(())
}

/// Read an auxiliary input file, trading failure for a diagnostic.
fn read_aux(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            eprintln!("Could not read {}: {err}", path.display());
            None
        }
    }
}

/// Load the table of contents. An unreadable or malformed TOC file
/// drops the outline and lets the rest of the run proceed.
fn load_toc(path: &Path) -> Option<Outline> {
    let text = read_aux(path)?;
    match Outline::parse(&text) {
        Ok(toc) => Some(toc),
        Err(err) => {
            eprintln!("Could not parse {}: {err}", path.display());
            None
        }
    }
}

/// Inspect the input files and gather per-page data.
///
/// A page image must be bilevel with no transparency: it doubles as its
/// own stencil. Anything else still needs the layer-separation step of
/// an external preprocessor and is skipped with a diagnostic.
fn collect_pages(files: &[String]) -> Vec<PageSource> {
    let mut pages = Vec::new();
    for fname in files {
        let path = Path::new(fname);
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = INPUT_RE.captures(name) else {
            eprintln!("Skipping {fname}: only TIFF and PNG page images are supported");
            continue;
        };
        let base = caps[1].to_string();
        let dir = match path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };

        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                eprintln!("Skipping {fname}: {err}");
                continue;
            }
        };
        let mut insp = match ImageDescriptor::inspect(&mut file) {
            Ok(i) => i,
            Err(err) => {
                eprintln!("Skipping {fname}: {err}");
                continue;
            }
        };
        if insp.depth != 1 || insp.trans.is_some() {
            eprintln!("Skipping {fname}: not a bilevel image; separate it into layers first");
            continue;
        }

        pages.push(PageSource {
            name: fname.clone(),
            width: insp.width,
            height: insp.height,
            x_dpi: insp.x_dpi,
            y_dpi: insp.y_dpi,
            stencils: vec![Stencil::new(path.to_path_buf())],
            fg_layer: find_sidecar(dir, &base, &["fg"]),
            bg_layer: find_sidecar(dir, &base, &["bg", "sep"]),
            hocr_path: find_hocr(dir, &base),
        });
        eprintln!("Prepared data for processing {fname}");

        if let Ok(true) = insp.next_image(&mut file) {
            eprintln!("Warning: {fname} contains multiple images, but only the first one");
            eprintln!("\tis going to be used");
        }
    }
    pages
}

/// Case-insensitive listing of the directory holding a page image.
fn dir_entries(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = match fs::read_dir(dir) {
        Ok(rd) => rd
            .filter_map(|e| e.ok()?.file_name().into_string().ok())
            .collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

/// Find `<base>.<kind>.<ext>` next to the page image, trying extensions
/// in preference order.
fn find_sidecar(dir: &Path, base: &str, kinds: &[&str]) -> Option<PathBuf> {
    let entries = dir_entries(dir);
    for ext in SIDECAR_EXTS {
        for kind in kinds {
            let want = format!("{base}.{kind}.{ext}");
            if let Some(name) = entries.iter().find(|n| n.eq_ignore_ascii_case(&want)) {
                return Some(dir.join(name));
            }
        }
    }
    None
}

fn find_hocr(dir: &Path, base: &str) -> Option<PathBuf> {
    let entries = dir_entries(dir);
    for ext in ["hocr", "html", "htm"] {
        let want = format!("{base}.{ext}");
        if let Some(name) = entries.iter().find(|n| n.eq_ignore_ascii_case(&want)) {
            return Some(dir.join(name));
        }
    }
    None
}

fn jbig2_available() -> bool {
    let path = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&path).any(|dir| dir.join("jbig2").is_file())
}

/// Run the external `jbig2` encoder over the stencils, one invocation
/// per group of `per_dict` pages, so every group shares one symbol
/// dictionary. The encoder writes `output.NNNN` page streams and an
/// `output.sym` dictionary into the working directory; both are renamed
/// next to their source stencils.
///
/// Returns false when the encoder is missing or fails, in which case
/// the caller falls back to CCITT compression.
fn jbig2_encode(pages: &mut [PageSource], per_dict: usize, generated: &mut Vec<PathBuf>) -> bool {
    if !jbig2_available() {
        eprintln!("JBIG2 compression has been requested, but the encoder is not available.");
        eprintln!("  I'll use CCITT Group 4 fax compression instead.");
        return false;
    }

    let mut start = 0;
    while start < pages.len() {
        let end = (start + per_dict).min(pages.len());

        let mut to_convert: Vec<PathBuf> = Vec::new();
        for p in &mut pages[start..end] {
            for s in &mut p.stencils {
                to_convert.push(s.path.clone());
                s.jbig2_path = Some(s.path.with_extension("jbig2"));
            }
        }
        let Some(first) = to_convert.first() else {
            start = end;
            continue;
        };
        let dict = first.with_extension("sym");
        for p in &mut pages[start..end] {
            for s in &mut p.stencils {
                s.jbig2_dict = Some(dict.clone());
            }
        }

        let status = Command::new("jbig2")
            .arg("-s")
            .arg("-p")
            .args(&to_convert)
            .status();
        match status {
            Ok(st) if st.success() => {}
            _ => {
                eprintln!("The jbig2 encoder failed.");
                eprintln!("  I'll use CCITT Group 4 fax compression instead.");
                return false;
            }
        }

        for (j, src) in to_convert.iter().enumerate() {
            let oname = format!("output.{j:04}");
            if Path::new(&oname).exists() {
                let target = src.with_extension("jbig2");
                let _ = fs::rename(&oname, &target);
                generated.push(target);
            }
        }
        if Path::new("output.sym").exists() {
            let _ = fs::rename("output.sym", &dict);
            generated.push(dict);
        }

        start = end;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("quire-{name}-{}", std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn malformed_toc_is_dropped_not_fatal() {
        // Mixed space and tab indentation aborts only the outline.
        let path = temp_file("badtoc", "\"A\" \"1\"\n \"A1\" \"2\"\n\t\"A2\" \"3\"\n");
        assert!(load_toc(&path).is_none());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_toc_file_is_dropped_not_fatal() {
        assert!(load_toc(Path::new("/nonexistent/book.toc")).is_none());
    }

    #[test]
    fn readable_toc_loads() {
        let path = temp_file("goodtoc", "\"Chapter One\" \"1\"\n");
        let toc = load_toc(&path).unwrap();
        assert_eq!(toc.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_meta_file_yields_nothing() {
        assert!(read_aux(Path::new("/nonexistent/book.meta")).is_none());
    }
}
