//! Page assembly: turns prepared page sources into a layered PDF.
//!
//! Each output page stacks up to three layers: a bilevel stencil with
//! the printed text (JBIG2 or CCITT G4), an optional halftone background
//! and an optional foreground carrying the text color. Foreground and
//! background are wrapped in optional content groups so viewers can
//! toggle them. When hOCR data is present an invisible text layer is
//! appended to the content stream and a pool of Type1 fonts is emitted
//! for it.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use flate2::Compression as FlateLevel;
use flate2::write::ZlibEncoder;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::font::{FontEncoder, TIMES_HEADER, chardata, to_unicode_cmap};
use crate::inspect::{
    ColorSpace, Compression, ImageDescriptor, ImageFormat, TAG_ROWS_PER_STRIP,
};
use crate::jbig2::Jbig2Geometry;
use crate::labels::PageLabels;
use crate::model::{Document, ObjectId, PdfDict, PdfObject, PdfValue};
use crate::outline::Outline;
use crate::text::compose_text_layer;
use crate::text::hocr::{HocrDoc, decode_bytes};

/// Compression applied to the stencil layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilFormat {
    Jbig2,
    Ccitt,
}

/// One bilevel stencil of a page, with the color it is painted in.
#[derive(Debug, Clone)]
pub struct Stencil {
    pub path: PathBuf,
    pub rgb: [f64; 3],
    /// Encoded page stream, set when the JBIG2 format is in use.
    pub jbig2_path: Option<PathBuf>,
    /// Shared symbol dictionary the encoded page depends on.
    pub jbig2_dict: Option<PathBuf>,
}

impl Stencil {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            rgb: [0.0, 0.0, 0.0],
            jbig2_path: None,
            jbig2_dict: None,
        }
    }
}

/// Everything known about one source page before assembly.
#[derive(Debug, Clone)]
pub struct PageSource {
    /// Display name used in progress messages.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub x_dpi: u32,
    pub y_dpi: u32,
    pub stencils: Vec<Stencil>,
    pub fg_layer: Option<PathBuf>,
    pub bg_layer: Option<PathBuf>,
    pub hocr_path: Option<PathBuf>,
}

/// Document-wide assembly options.
#[derive(Debug)]
pub struct BuildOptions {
    pub labels: Option<PageLabels>,
    pub toc: Option<Outline>,
    pub meta: IndexMap<String, String>,
    /// Value of the catalog /PageLayout entry, without the slash.
    pub page_layout: String,
    pub st_format: StencilFormat,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            labels: None,
            toc: None,
            meta: IndexMap::new(),
            page_layout: "SinglePage".into(),
            st_format: StencilFormat::Jbig2,
        }
    }
}

/// Assembles a [`Document`] from page sources.
pub struct Builder {
    doc: Document,
    opts: BuildOptions,
    /// Symbol dictionary shared by consecutive JBIG2 pages; a new
    /// object is only emitted when the dictionary path changes.
    dict_path: Option<PathBuf>,
    dict_obj: Option<ObjectId>,
}

impl Builder {
    pub fn new(opts: BuildOptions) -> Self {
        Self {
            doc: Document::new(),
            opts,
            dict_path: None,
            dict_obj: None,
        }
    }

    /// Build all document objects for the given pages.
    pub fn process(&mut self, pages: &[PageSource]) -> Result<()> {
        let page_layout = self.opts.page_layout.clone();
        let cat = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("Catalog"));
            o.set("PageLayout", PdfValue::name(page_layout));
            o
        });
        self.doc.root = Some(cat);

        let date = creation_date();
        let info = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Creator", PdfValue::text("Quire"));
            o.set("Producer", PdfValue::text("Quire"));
            o.set("CreationDate", PdfValue::text(date));
            o
        });
        self.doc.info = Some(info);
        for (key, value) in &self.opts.meta {
            if let Some(obj) = self.doc.get_mut(info) {
                obj.set(key.clone(), PdfValue::Str(utf16_text(value)));
            }
        }

        let out = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("Outlines"));
            o.set("Count", PdfValue::Int(0));
            o
        });
        if let Some(obj) = self.doc.get_mut(cat) {
            obj.set("Outlines", PdfValue::Ref(out));
        }

        let pages_obj = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("Pages"));
            o
        });
        if let Some(obj) = self.doc.get_mut(cat) {
            obj.set("Pages", PdfValue::Ref(pages_obj));
        }

        let creator = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Subtype", PdfValue::name("Artwork"));
            o.set("Creator", PdfValue::text("Quire"));
            o.set("Feature", PdfValue::text("Layers"));
            o
        });
        let oc_fore = self.add_ocg("Foreground", creator);
        let oc_back = self.add_ocg("Background", creator);
        if let Some(obj) = self.doc.get_mut(cat) {
            obj.set(
                "OCProperties",
                PdfValue::Raw(format!(
                    "<< /OCGs[{oc_fore} 0 R {oc_back} 0 R] \
                     /D<< /Intent /View /BaseState (ON) \
                     /Order[{oc_fore} 0 R {oc_back} 0 R] >>>>"
                )),
            );
        }

        if let Some(labels) = &self.opts.labels
            && !labels.is_empty()
        {
            let tree = label_tree(labels);
            if let Some(obj) = self.doc.get_mut(cat) {
                obj.set("PageLabels", tree);
            }
        }

        let needs_font = pages.iter().any(|p| p.hocr_path.is_some());
        let mut fdict = None;
        let mut descr = None;
        if needs_font {
            fdict = Some(self.doc.add(PdfObject::new));
            descr = Some(self.doc.add(|id| {
                let mut o = PdfObject::new(id);
                o.set("Type", PdfValue::name("FontDescriptor"));
                o.set("BaseFont", PdfValue::name("Times-Roman"));
                o.set("Ascent", PdfValue::Int(TIMES_HEADER.ascent.into()));
                o.set("XHeight", PdfValue::Int(TIMES_HEADER.x_height.into()));
                o.set("CapHeight", PdfValue::Int(TIMES_HEADER.cap_height.into()));
                o.set("Descent", PdfValue::Int(TIMES_HEADER.descent.into()));
                o.set("Flags", PdfValue::Int(TIMES_HEADER.flags.into()));
                o.set(
                    "FontBBox",
                    PdfValue::Array(
                        TIMES_HEADER
                            .font_bbox
                            .iter()
                            .map(|&v| PdfValue::Int(v.into()))
                            .collect(),
                    ),
                );
                o.set("ItalicAngle", PdfValue::Int(TIMES_HEADER.italic_angle.into()));
                o.set("StemV", PdfValue::Int(TIMES_HEADER.stem_v.into()));
                o
            }));
        }

        let mut fonts = FontEncoder::new();
        let mut page_objs: Vec<ObjectId> = Vec::new();
        let mut pages_by_num: FxHashMap<String, ObjectId> = FxHashMap::default();
        let mut cur_range_id = 0usize;

        for (pidx, p) in pages.iter().enumerate() {
            let mut proc_set: Vec<&'static str> = vec!["/PDF", "/ImageB"];
            let pwidth = p.width as f64 / p.x_dpi as f64 * 72.0;
            let pheight = p.height as f64 / p.y_dpi as f64 * 72.0;
            let (mut xres, mut yres) = (p.x_dpi as f64, p.y_dpi as f64);

            let mut c_str = String::new();
            let mut stencil_ids = Vec::new();
            for s in &p.stencils {
                let loaded = match self.opts.st_format {
                    StencilFormat::Jbig2 => self.load_jbig2_page(s, oc_fore)?,
                    StencilFormat::Ccitt => self.load_ccitt_page(&s.path, oc_fore)?,
                };
                let Some((xobj, sx, sy)) = loaded else { break };
                c_str.push_str(&format!(
                    "{} {} {} rg /Im{} Do ",
                    s.rgb[0],
                    s.rgb[1],
                    s.rgb[2],
                    stencil_ids.len()
                ));
                stencil_ids.push(xobj);
                xres = sx as f64;
                yres = sy as f64;
            }

            let fg_image = match &p.fg_layer {
                Some(path) => self.load_image(path, oc_fore, &mut proc_set)?,
                None => None,
            };
            let bg_image = match &p.bg_layer {
                Some(path) => self.load_image(path, oc_back, &mut proc_set)?,
                None => None,
            };

            let mut resdict = PdfDict::default();
            if let Some(fg) = fg_image {
                // The stencil becomes a soft mask on the foreground, so
                // the text pixels take their color from the fg image.
                if let Some(&st0) = stencil_ids.first() {
                    if let Some(obj) = self.doc.get_mut(fg) {
                        obj.set("SMask", PdfValue::Ref(st0));
                    }
                    if let Some(obj) = self.doc.get_mut(st0) {
                        obj.dict.shift_remove("ImageMask");
                        obj.set("Decode", PdfValue::Raw("[1 0]".into()));
                    }
                }
                resdict.insert("Im0".into(), PdfValue::Ref(fg));
                c_str = "/Im0 Do ".into();
            } else {
                for (i, &id) in stencil_ids.iter().enumerate() {
                    resdict.insert(format!("Im{i}"), PdfValue::Ref(id));
                }
            }
            if let Some(bg) = bg_image {
                c_str = format!("/Im{} Do {}", resdict.len(), c_str);
                resdict.insert(format!("Im{}", resdict.len()), PdfValue::Ref(bg));
            }
            c_str = format!("q {pwidth:.2} 0 0 {pheight:.2} 0 0 cm {c_str}Q");

            let mut has_text = false;
            if let Some(hp) = &p.hocr_path {
                let bytes = std::fs::read(hp)?;
                let (text, fell_back) = decode_bytes(&bytes);
                if fell_back {
                    eprintln!(
                        "Warning: {} is not valid UTF-8, reading it as Latin-1",
                        hp.display()
                    );
                }
                let hdoc = HocrDoc::parse(&text);
                if let Some(cs) = hdoc.charset()
                    && !cs.eq_ignore_ascii_case("utf-8")
                    && !fell_back
                {
                    eprintln!(
                        "Warning: {} declares charset {cs}, but its bytes decode as UTF-8",
                        hp.display()
                    );
                }
                proc_set.push("/Text");
                c_str.push_str(&compose_text_layer(
                    &hdoc,
                    pheight,
                    72.0 / xres,
                    72.0 / yres,
                    &mut fonts,
                ));
                has_text = true;
            }

            let mut z = ZlibEncoder::new(Vec::new(), FlateLevel::best());
            z.write_all(c_str.as_bytes())?;
            let compressed = z.finish()?;
            let contents = self.doc.add(|id| {
                let mut o = PdfObject::new(id);
                o.set("Filter", PdfValue::name("FlateDecode"));
                o.stream = Some(compressed);
                o
            });

            let resobj = self.doc.add(|id| PdfObject {
                id,
                dict: resdict,
                stream: None,
            });
            let proc_str = proc_set.join(" ");
            let resources = self.doc.add(|id| {
                let mut o = PdfObject::new(id);
                o.set("XObject", PdfValue::Ref(resobj));
                o.set("ProcSet", PdfValue::Raw(format!("[ {proc_str} ]")));
                o
            });
            if has_text
                && let (Some(fd), Some(obj)) = (fdict, self.doc.get_mut(resources))
            {
                obj.set("Font", PdfValue::Ref(fd));
            }

            // Acrobat blends transparency in DeviceCMYK by default,
            // which shifts the colors of an SMask-carrying page unless
            // the page declares its own blending space.
            let group = fg_image.map(|fg| {
                let cs = self
                    .doc
                    .get_mut(fg)
                    .and_then(|o| o.dict.get("ColorSpace").cloned())
                    .unwrap_or_else(|| PdfValue::name("DeviceRGB"));
                let mut g = PdfDict::default();
                g.insert("S".into(), PdfValue::name("Transparency"));
                g.insert("CS".into(), cs);
                PdfValue::Dict(g)
            });
            let page = self.doc.add(|id| {
                let mut o = PdfObject::new(id);
                o.set("Type", PdfValue::name("Page"));
                o.set("Parent", PdfValue::Ref(pages_obj));
                o.set(
                    "MediaBox",
                    PdfValue::Raw(format!("[ 0 0 {pwidth:.2} {pheight:.2} ]")),
                );
                o.set("Contents", PdfValue::Ref(contents));
                o.set("Resources", PdfValue::Ref(resources));
                if let Some(g) = group {
                    o.set("Group", g);
                }
                o
            });
            page_objs.push(page);

            if let Some(obj) = self.doc.get_mut(pages_obj) {
                obj.set("Count", PdfValue::Int(page_objs.len() as i64));
                obj.set(
                    "Kids",
                    PdfValue::Array(page_objs.iter().map(|&id| PdfValue::Ref(id)).collect()),
                );
            }

            let mut pkey = (pidx + 1).to_string();
            if let Some(labels) = &self.opts.labels
                && !labels.is_empty()
            {
                pkey = labels.page_label(cur_range_id, pidx);
                if cur_range_id < labels.len() - 1
                    && labels
                        .get(cur_range_id + 1)
                        .is_some_and(|r| r.first == pidx + 1)
                {
                    cur_range_id += 1;
                }
            }
            pages_by_num.insert(pkey, page);

            eprintln!("Processed {}", p.name);
            if bg_image.is_some()
                && let Some(bg) = &p.bg_layer
            {
                eprintln!("  Added background image from {}", bg.display());
            }
            if fg_image.is_some()
                && let Some(fg) = &p.fg_layer
            {
                eprintln!("  Added foreground image from {}", fg.display());
            }
        }

        if needs_font
            && let (Some(fd), Some(de)) = (fdict, descr)
        {
            let buckets: Vec<Vec<char>> = fonts.buckets().to_vec();
            for (i, bucket) in buckets.iter().enumerate() {
                let fname = format!("Fnt{}", i + 1);
                let font = self.add_font(de, bucket, &fname)?;
                if let Some(obj) = self.doc.get_mut(fd) {
                    obj.set(fname, PdfValue::Ref(font));
                }
            }
        }

        if let Some(toc) = self.opts.toc.take() {
            if !toc.is_empty() {
                let root_id = outline_objects(&mut self.doc, &toc, &pages_by_num);
                if let Some(obj) = self.doc.get_mut(cat) {
                    obj.set("Outlines", PdfValue::Ref(root_id));
                    obj.set("PageMode", PdfValue::name("UseOutlines"));
                }
            }
            self.opts.toc = Some(toc);
        }

        Ok(())
    }

    /// Serialize the assembled document.
    pub fn finish(self) -> Result<Vec<u8>> {
        self.doc.serialize()
    }

    fn add_ocg(&mut self, name: &str, creator: ObjectId) -> ObjectId {
        let name = name.to_string();
        self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("OCG"));
            o.set("Name", PdfValue::text(name));
            o.set(
                "Usage",
                PdfValue::Raw(format!("<</CreatorInfo {creator} 0 R>>")),
            );
            o.set("Intent", PdfValue::Raw("[/View/Design]".into()));
            o
        })
    }

    fn add_font(&mut self, descr: ObjectId, enc: &[char], fname: &str) -> Result<ObjectId> {
        let enc_str = enc
            .iter()
            .map(|&c| format!("/{}", chardata(c as u32).0))
            .collect::<Vec<_>>()
            .join(" ");
        let enc_obj = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("Encoding"));
            o.set("Differences", PdfValue::Raw(format!("[ 0 {enc_str} ]")));
            o
        });

        let cmap = to_unicode_cmap(enc)?;
        let to_uni = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Filter", PdfValue::name("FlateDecode"));
            o.stream = Some(cmap);
            o
        });

        let widths = enc
            .iter()
            .map(|&c| chardata(c as u32).1.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let fname = fname.to_string();
        let last_char = enc.len() as i64 - 1;
        Ok(self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("BaseFont", PdfValue::name("Times-Roman"));
            o.set("Name", PdfValue::name(fname));
            o.set("Subtype", PdfValue::name("Type1"));
            o.set("Type", PdfValue::name("Font"));
            o.set("FirstChar", PdfValue::Int(0));
            o.set("LastChar", PdfValue::Int(last_char));
            o.set("Widths", PdfValue::Raw(format!("[ {widths} ]")));
            o.set("FontDescriptor", PdfValue::Ref(descr));
            o.set("ToUnicode", PdfValue::Ref(to_uni));
            o.set("Encoding", PdfValue::Ref(enc_obj));
            o
        }))
    }

    /// Load one JBIG2-encoded stencil. The shared symbol dictionary is
    /// registered once and reused until the dictionary path changes.
    fn load_jbig2_page(
        &mut self,
        s: &Stencil,
        oc: ObjectId,
    ) -> Result<Option<(ObjectId, u32, u32)>> {
        let (Some(jpath), Some(dpath)) = (&s.jbig2_path, &s.jbig2_dict) else {
            eprintln!(
                "Page not completed: no JBIG2 data for {}",
                s.path.display()
            );
            return Ok(None);
        };
        let jbig2 = match std::fs::read(jpath) {
            Ok(d) => d,
            Err(_) => {
                eprintln!("Page not completed: could not access {}", jpath.display());
                return Ok(None);
            }
        };
        let geom = match Jbig2Geometry::read(&jbig2) {
            Ok(g) => g,
            Err(err) => {
                eprintln!("Page not completed: {err}");
                return Ok(None);
            }
        };

        if self.dict_path.as_deref() != Some(dpath.as_path()) {
            let symd = match std::fs::read(dpath) {
                Ok(d) => d,
                Err(_) => {
                    eprintln!("Page not completed: could not access {}", dpath.display());
                    return Ok(None);
                }
            };
            let symd_o = self.doc.add(|id| {
                let mut o = PdfObject::new(id);
                o.stream = Some(symd);
                o
            });
            self.dict_path = Some(dpath.clone());
            self.dict_obj = Some(symd_o);
        }
        let Some(dict_obj) = self.dict_obj else {
            return Ok(None);
        };

        let xobj = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("XObject"));
            o.set("Subtype", PdfValue::name("Image"));
            o.set("OC", PdfValue::Ref(oc));
            o.set("Width", PdfValue::Int(geom.width.into()));
            o.set("Height", PdfValue::Int(geom.height.into()));
            o.set("ImageMask", PdfValue::Bool(true));
            o.set("ColorSpace", PdfValue::name("DeviceGray"));
            o.set("BitsPerComponent", PdfValue::Int(1));
            o.set("Filter", PdfValue::name("JBIG2Decode"));
            o.set(
                "DecodeParms",
                PdfValue::Raw(format!("<< /JBIG2Globals {dict_obj} 0 R >>")),
            );
            o.stream = Some(jbig2);
            o
        });
        Ok(Some((xobj, geom.x_dpi, geom.y_dpi)))
    }

    /// Load a stencil stored as a single-strip CCITT G4 TIFF. Anything
    /// else is rejected: re-encoding pixels is the preprocessing step's
    /// job, not ours.
    fn load_ccitt_page(
        &mut self,
        path: &Path,
        oc: ObjectId,
    ) -> Result<Option<(ObjectId, u32, u32)>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => {
                eprintln!("Page not completed: could not access {}", path.display());
                return Ok(None);
            }
        };
        let insp = match ImageDescriptor::inspect(&mut file) {
            Ok(i) => i,
            Err(err) => {
                eprintln!("Page not completed: {err}");
                return Ok(None);
            }
        };
        let rows_per_strip = insp
            .tag_int(TAG_ROWS_PER_STRIP)
            .unwrap_or(insp.height.into());
        if insp.compression != Some(Compression::CcittFax) || rows_per_strip < insp.height.into() {
            eprintln!(
                "Page not completed: {} is not a single-strip CCITT group 4 image",
                path.display()
            );
            return Ok(None);
        }
        let body = insp.raw_data(&mut file)?;

        let (width, height) = (insp.width, insp.height);
        let xobj = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("XObject"));
            o.set("Subtype", PdfValue::name("Image"));
            o.set("OC", PdfValue::Ref(oc));
            o.set("Width", PdfValue::Int(width.into()));
            o.set("Height", PdfValue::Int(height.into()));
            o.set("ImageMask", PdfValue::Bool(true));
            o.set("ColorSpace", PdfValue::name("DeviceGray"));
            o.set("BitsPerComponent", PdfValue::Int(1));
            o.set("Filter", PdfValue::name("CCITTFaxDecode"));
            o.set(
                "DecodeParms",
                PdfValue::Raw(format!("<< /Columns {width} /K -1 >>")),
            );
            o.stream = Some(body);
            o
        });
        Ok(Some((xobj, insp.x_dpi, insp.y_dpi)))
    }

    /// Load a background or foreground image as an image XObject.
    ///
    /// JPEG, JPEG2000 and PNG sources embed directly. TIFF embeds only
    /// when uncompressed or when the whole payload is a single strip;
    /// multi-strip compressed TIFF chunks cannot be concatenated into
    /// one PDF stream, so such files are skipped with a diagnostic.
    fn load_image(
        &mut self,
        path: &Path,
        oc: ObjectId,
        proc_set: &mut Vec<&'static str>,
    ) -> Result<Option<ObjectId>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(_) => {
                eprintln!("Could not access {}", path.display());
                return Ok(None);
            }
        };
        let insp = match ImageDescriptor::inspect(&mut file) {
            Ok(i) => i,
            Err(err) => {
                eprintln!("Could not load {}: {err}", path.display());
                return Ok(None);
            }
        };

        let usable = match insp.format {
            ImageFormat::Jpeg | ImageFormat::Jpeg2000 | ImageFormat::Png => true,
            ImageFormat::Tiff => match insp.compression {
                Some(Compression::None) => true,
                Some(Compression::Flate | Compression::Lzw | Compression::CcittFax) => {
                    insp.tag_int(TAG_ROWS_PER_STRIP).unwrap_or(0) >= insp.height.into()
                }
                _ => false,
            },
        };
        if !usable {
            eprintln!(
                "Can't embed {} directly: convert it to PNG, JPEG or a single-strip TIFF first",
                path.display()
            );
            return Ok(None);
        }
        let rawdata = insp.raw_data(&mut file)?;

        let cspace = insp.cspace.unwrap_or(ColorSpace::DeviceRgb);
        let mut per_comp = 1i64;
        let cs_value;
        if cspace == ColorSpace::Indexed
            && let Some(cpal) = &insp.palette
        {
            let rgb = cpal.iter().any(|c| c[0] != c[1] || c[0] != c[2]);
            let base = if rgb { "DeviceRGB" } else { "DeviceGray" };
            let mut s = format!("[/Indexed /{base} {} < ", cpal.len() - 1);
            for c in cpal {
                if rgb {
                    s.push_str(&format!("{:02x} {:02x} {:02x} ", c[0], c[1], c[2]));
                } else {
                    s.push_str(&format!("{:02x} ", c[0]));
                }
            }
            s.push_str(">]");
            cs_value = PdfValue::Raw(s);
            if !proc_set.contains(&"/ImageI") {
                proc_set.push("/ImageI");
            }
        } else {
            cs_value = PdfValue::name(cspace.pdf_name());
            if cspace != ColorSpace::DeviceGray && !proc_set.contains(&"/ImageC") {
                proc_set.push("/ImageC");
            }
            per_comp = match cspace {
                ColorSpace::DeviceRgb => 3,
                ColorSpace::DeviceCmyk => 4,
                _ => 1,
            };
        }

        let decode_parms = match (insp.format, insp.compression) {
            (
                ImageFormat::Png | ImageFormat::Tiff,
                Some(Compression::Flate | Compression::Lzw),
            ) => {
                let predictor = if insp.format == ImageFormat::Png { 15 } else { 2 };
                Some(format!(
                    "<< /Predictor {predictor} /Colors {per_comp} \
                     /BitsPerComponent {} /Columns {} >>",
                    insp.depth, insp.width
                ))
            }
            (ImageFormat::Tiff, Some(Compression::CcittFax)) => {
                Some(format!("<< /Columns {} /K -1 >>", insp.width))
            }
            _ => None,
        };

        let image = self.doc.add(|id| {
            let mut o = PdfObject::new(id);
            o.set("Type", PdfValue::name("XObject"));
            o.set("Subtype", PdfValue::name("Image"));
            o.set("OC", PdfValue::Ref(oc));
            o.set("Width", PdfValue::Int(insp.width.into()));
            o.set("Height", PdfValue::Int(insp.height.into()));
            o.set("Interpolate", PdfValue::Bool(true));
            // JPEG2000 carries depth and color space in its own headers.
            if insp.format != ImageFormat::Jpeg2000 {
                o.set("BitsPerComponent", PdfValue::Int(insp.depth.into()));
                o.set("ColorSpace", cs_value);
            }
            if let Some(filter) = insp.compression.and_then(Compression::filter_name) {
                o.set("Filter", PdfValue::name(filter));
            }
            if let Some(parms) = decode_parms {
                o.set("DecodeParms", PdfValue::Raw(parms));
            }
            o.stream = Some(rawdata);
            o
        });
        Ok(Some(image))
    }
}

/// Emit the outline object tree and return the root object number.
fn outline_objects(
    doc: &mut Document,
    toc: &Outline,
    page_ids: &FxHashMap<String, ObjectId>,
) -> ObjectId {
    let nodes = toc.nodes();
    let ids: Vec<ObjectId> = nodes.iter().map(|_| doc.alloc()).collect();

    let mut root = PdfObject::new(ids[0]);
    root.set("Type", PdfValue::name("Outlines"));
    root.set("Count", PdfValue::Int(toc.visible_count(0)));
    doc.insert(root);

    for (idx, node) in nodes.iter().enumerate().skip(1) {
        let dest = page_ids.get(&node.page_ref).copied();
        if dest.is_none() {
            eprintln!(
                "Malformed TOC: there is no page {} in this document.",
                node.page_ref
            );
        }

        let parent = ids[node.parent.unwrap_or(0)];
        let mut obj = PdfObject::new(ids[idx]);
        obj.set("Title", PdfValue::Str(utf16_text(&node.title)));
        obj.set("Parent", PdfValue::Ref(parent));
        match dest {
            Some(d) => {
                obj.set(
                    "Dest",
                    PdfValue::Raw(format!("[ {d} 0 R /XYZ null null null ]")),
                );
            }
            // Dangling entries stay in the tree, grayed out.
            None => {
                obj.set("C", PdfValue::Raw("[0.75 0.75 0.75]".into()));
            }
        }

        if !node.children.is_empty() {
            let cnt = toc.visible_count(idx);
            obj.set(
                "Count",
                PdfValue::Int(if node.open { cnt } else { -cnt }),
            );
        }

        match node.prev {
            None => {
                if let Some(po) = doc.get_mut(parent) {
                    po.set("First", PdfValue::Ref(ids[idx]));
                }
            }
            Some(prev) => {
                if let Some(po) = doc.get_mut(ids[prev]) {
                    po.set("Next", PdfValue::Ref(ids[idx]));
                }
                obj.set("Prev", PdfValue::Ref(ids[prev]));
            }
        }
        if node.next.is_none()
            && let Some(po) = doc.get_mut(parent)
        {
            po.set("Last", PdfValue::Ref(ids[idx]));
        }

        doc.insert(obj);
    }
    ids[0]
}

/// /PageLabels number tree built from the parsed ranges.
fn label_tree(labels: &PageLabels) -> PdfValue {
    let mut nums = Vec::new();
    for rng in labels.ranges() {
        nums.push(PdfValue::Int(rng.first as i64));
        let mut d = PdfDict::default();
        if let Some(prefix) = &rng.prefix {
            d.insert(
                "P".into(),
                PdfValue::Str(label_prefix(prefix, rng.style.is_some())),
            );
        }
        if let Some(style) = rng.style {
            d.insert("S".into(), PdfValue::name(style.pdf_name()));
        }
        if let Some(start) = rng.start {
            d.insert("St".into(), PdfValue::Int(start));
        }
        nums.push(PdfValue::Dict(d));
    }
    let mut tree = PdfDict::default();
    tree.insert("Nums".into(), PdfValue::Array(nums));
    PdfValue::Dict(tree)
}

/// Prefix bytes for a page label: Latin-1 (PDFDocEncoding-safe) when the
/// text allows it, UTF-16BE otherwise. A UTF-16 prefix with no number
/// after it gets a trailing NUL, which keeps Acrobat from mangling it.
fn label_prefix(prefix: &str, has_style: bool) -> Vec<u8> {
    if prefix.chars().all(|c| (c as u32) <= 0xFF) {
        prefix.chars().map(|c| c as u8).collect()
    } else {
        let mut out = utf16_text(prefix);
        if !has_style {
            out.extend_from_slice(&[0, 0]);
        }
        out
    }
}

/// UTF-16BE text string bytes with a byte-order mark.
fn utf16_text(s: &str) -> Vec<u8> {
    let mut out = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// `D:YYYYMMDDHHMMSS+HH'MM` timestamp for the info dictionary.
fn creation_date() -> String {
    let now = Local::now();
    let off = now.offset().local_minus_utc();
    let sign = if off > 0 { '+' } else { '-' };
    let mins = off.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}",
        now.format("%Y%m%d%H%M%S"),
        sign,
        mins / 60,
        mins % 60
    )
}
