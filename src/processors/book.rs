//! EPUB container reading and rewriting

use epub::doc::{EpubDoc, NavPoint};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::errors::{Result, TranslationError};
use crate::processors::html;

const CONTAINER_PATH: &str = "META-INF/container.xml";
const MIMETYPE_PATH: &str = "mimetype";
const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

fn rootfile_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<rootfile\b[^>]*\bfull-path\s*=\s*["']([^"']+)["']"#)
            .expect("valid rootfile regex")
    })
}

fn dc_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<dc:title\b[^>]*>(.*?)</dc:title>").expect("valid title regex"))
}

fn dc_language() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)(<dc:language\b[^>]*>)(.*?)(</dc:language>)").expect("valid language regex")
    })
}

fn metadata_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)</(?:opf:)?metadata\s*>").expect("valid metadata regex"))
}

/// One spine document of the book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in reading order
    pub index: usize,
    /// Manifest id
    pub id: String,
    /// Entry name inside the archive
    pub path: String,
    pub title: String,
    pub content: String,
}

impl Chapter {
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Rough token estimate at four characters per token
    pub fn approx_tokens(&self) -> usize {
        self.char_count().div_ceil(4)
    }
}

/// An opened EPUB with its chapters loaded in reading order
#[derive(Debug, Clone)]
pub struct EpubBook {
    path: PathBuf,
    title: Option<String>,
    package_path: String,
    chapters: Vec<Chapter>,
}

impl EpubBook {
    /// Open `path` and load every XHTML spine document
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TranslationError::FileError {
                path: path.display().to_string(),
                message: "File not found".to_string(),
            });
        }

        let (package_path, title) = read_package_info(path)?;

        let mut doc = EpubDoc::new(path).map_err(|e| TranslationError::epub(path.display(), e.to_string()))?;

        let mut toc_titles = HashMap::new();
        collect_toc_titles(&doc.toc, &mut toc_titles);

        let mut chapters = Vec::new();
        for spine_index in 0..doc.get_num_chapters() {
            if !doc.set_current_chapter(spine_index) {
                continue;
            }
            let Some((content, mime)) = doc.get_current_str() else {
                warn!("Skipping unreadable spine item {}", spine_index);
                continue;
            };
            if !mime.contains("html") {
                debug!("Skipping non-HTML spine item {} ({})", spine_index, mime);
                continue;
            }

            let entry_path = doc
                .get_current_path()
                .map(|p| normalize_entry_path(&p))
                .unwrap_or_default();
            let id = doc.get_current_id().unwrap_or_default();
            let index = chapters.len() + 1;

            let title = toc_titles
                .get(&entry_path)
                .cloned()
                .or_else(|| html::extract_title(&content))
                .unwrap_or_else(|| format!("Chapter {}", index));

            chapters.push(Chapter {
                index,
                id,
                path: entry_path,
                title,
                content,
            });
        }

        debug!("Loaded {} chapters from {}", chapters.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            title,
            package_path,
            chapters,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Chapter by 1-based index
    pub fn chapter(&self, index: usize) -> Option<&Chapter> {
        index.checked_sub(1).and_then(|i| self.chapters.get(i))
    }

    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(Chapter::char_count).sum()
    }

    /// Write a copy of the book with chapter documents swapped out.
    ///
    /// `replacements` maps chapter indices to full XHTML documents. All other
    /// entries are copied without recompression. When `language` is given the
    /// package `dc:language` is rewritten to it.
    pub fn write(
        &self,
        output: &Path,
        replacements: &BTreeMap<usize, String>,
        language: Option<&str>,
    ) -> Result<()> {
        let mut by_entry: HashMap<&str, &str> = HashMap::new();
        for (index, content) in replacements {
            let chapter = self.chapter(*index).ok_or_else(|| {
                TranslationError::epub(self.path.display(), format!("No chapter {} to replace", index))
            })?;
            by_entry.insert(chapter.path.as_str(), content.as_str());
        }

        let mut archive = open_archive(&self.path)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(output).map_err(|e| TranslationError::FileError {
            path: output.display().to_string(),
            message: e.to_string(),
        })?;
        let mut writer = ZipWriter::new(BufWriter::new(file));

        writer.start_file(
            MIMETYPE_PATH,
            FileOptions::default().compression_method(CompressionMethod::Stored),
        )?;
        writer.write_all(EPUB_MIMETYPE)?;

        let mut replaced = 0;
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            if name == MIMETYPE_PATH {
                continue;
            }

            let new_content = match by_entry.get(name.as_str()) {
                Some(content) => {
                    replaced += 1;
                    Some(content.to_string())
                }
                None if language.is_some() && name == self.package_path => {
                    let mut opf = String::new();
                    archive.by_index(i)?.read_to_string(&mut opf)?;
                    language.map(|lang| set_language(&opf, lang))
                }
                None => None,
            };

            match new_content {
                Some(content) => {
                    let modified = archive.by_index_raw(i)?.last_modified();
                    let options = FileOptions::default()
                        .compression_method(CompressionMethod::Deflated)
                        .last_modified_time(modified);
                    writer.start_file(name.as_str(), options)?;
                    writer.write_all(content.as_bytes())?;
                }
                None => writer.raw_copy_file(archive.by_index_raw(i)?)?,
            }
        }

        if replaced != by_entry.len() {
            return Err(TranslationError::epub(
                self.path.display(),
                format!(
                    "Only {} of {} chapter documents were found in the archive",
                    replaced,
                    by_entry.len()
                ),
            ));
        }

        writer.finish()?.flush()?;
        debug!(
            "Wrote {} ({} chapters replaced)",
            output.display(),
            replaced
        );
        Ok(())
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file)).map_err(|e| TranslationError::epub(path.display(), e.to_string()))
}

fn read_entry(archive: &mut ZipArchive<BufReader<File>>, name: &str) -> Option<String> {
    let mut entry = archive.by_name(name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    Some(content)
}

/// Package document path and `dc:title`
fn read_package_info(path: &Path) -> Result<(String, Option<String>)> {
    let mut archive = open_archive(path)?;

    let container = read_entry(&mut archive, CONTAINER_PATH)
        .ok_or_else(|| TranslationError::epub(path.display(), format!("Missing {}", CONTAINER_PATH)))?;
    let package_path = rootfile_path()
        .captures(&container)
        .map(|c| c[1].to_string())
        .ok_or_else(|| TranslationError::epub(path.display(), "container.xml names no package document"))?;

    let opf = read_entry(&mut archive, &package_path)
        .ok_or_else(|| TranslationError::epub(path.display(), format!("Missing {}", package_path)))?;
    let title = dc_title()
        .captures(&opf)
        .map(|c| unescape_xml(c[1].trim()))
        .filter(|t| !t.is_empty());

    Ok((package_path, title))
}

fn set_language(opf: &str, language: &str) -> String {
    if dc_language().is_match(opf) {
        return dc_language()
            .replace(opf, |c: &regex::Captures| format!("{}{}{}", &c[1], language, &c[3]))
            .into_owned();
    }
    match metadata_close().find(opf) {
        Some(m) => format!(
            "{}<dc:language>{}</dc:language>\n{}",
            &opf[..m.start()],
            language,
            &opf[m.start()..]
        ),
        None => opf.to_string(),
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collect_toc_titles(points: &[NavPoint], titles: &mut HashMap<String, String>) {
    for point in points {
        let target = point.content.to_string_lossy();
        let entry = normalize_entry_path(Path::new(target.split('#').next().unwrap_or_default()));
        let label = point.label.trim();
        if !label.is_empty() {
            titles.entry(entry).or_insert_with(|| label.to_string());
        }
        collect_toc_titles(&point.children, titles);
    }
}

/// Archive entry name for a path resolved against the package directory
fn normalize_entry_path(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal EPUB fixture

    use std::io::Write;
    use std::path::Path;
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";
    pub const STYLESHEET: &str = "body { font-family: serif; }\n";

    pub fn chapter_xhtml(heading: &str, paragraphs: &[&str]) -> String {
        let body: String = paragraphs.iter().map(|p| format!("<p>{}</p>\n", p)).collect();
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><link rel="stylesheet" type="text/css" href="style.css"/></head>
<body>
<h1>{}</h1>
{}<img src="images/pic.png" alt="pic"/>
</body>
</html>"#,
            heading, body
        )
    }

    /// Three chapters; the TOC names only the first two
    pub fn write_sample_epub(path: &Path) {
        let chapters = [
            chapter_xhtml("The Start", &["Once upon a time.", "There was a cat."]),
            chapter_xhtml("The Middle", &["The cat slept.", "Then it woke up."]),
            chapter_xhtml("The End", &["The cat left."]),
        ];

        let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

        let opf = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="bookid" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Sample &amp; Book</dc:title>
    <dc:language>en</dc:language>
    <dc:identifier id="bookid">urn:uuid:sample</dc:identifier>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch3" href="ch3.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="style.css" media-type="text/css"/>
    <item id="pic" href="images/pic.png" media-type="image/png"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
    <itemref idref="ch3"/>
  </spine>
</package>"#;

        let ncx = r#"<?xml version="1.0" encoding="utf-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="urn:uuid:sample"/></head>
  <docTitle><text>Sample Book</text></docTitle>
  <navMap>
    <navPoint id="n1" playOrder="1">
      <navLabel><text>Opening</text></navLabel>
      <content src="ch1.xhtml"/>
    </navPoint>
    <navPoint id="n2" playOrder="2">
      <navLabel><text>Interlude</text></navLabel>
      <content src="ch2.xhtml#top"/>
    </navPoint>
  </navMap>
</ncx>"#;

        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.start_file("META-INF/container.xml", deflated).unwrap();
        zip.write_all(container.as_bytes()).unwrap();
        zip.start_file("OEBPS/content.opf", deflated).unwrap();
        zip.write_all(opf.as_bytes()).unwrap();
        zip.start_file("OEBPS/toc.ncx", deflated).unwrap();
        zip.write_all(ncx.as_bytes()).unwrap();
        for (i, content) in chapters.iter().enumerate() {
            zip.start_file(format!("OEBPS/ch{}.xhtml", i + 1), deflated).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.start_file("OEBPS/style.css", deflated).unwrap();
        zip.write_all(STYLESHEET.as_bytes()).unwrap();
        zip.start_file("OEBPS/images/pic.png", stored).unwrap();
        zip.write_all(IMAGE_BYTES).unwrap();
        zip.finish().unwrap();
    }
}
