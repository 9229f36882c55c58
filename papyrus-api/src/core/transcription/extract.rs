use quick_xml::Reader;
use quick_xml::events::Event;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::models::error::{ApiError, ApiResult, ErrorCode};

/// File types accepted for ingestion, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Mp3,
    Mp4,
    Wav,
    Pdf,
    Docx,
    Txt,
}

pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "mp4", "wav", "pdf", "docx", "txt"];

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "mp4" => Some(Self::Mp4),
            "wav" => Some(Self::Wav),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Kind from the text after the last `.` of a URL or path.
    pub fn from_url(url: &str) -> Option<Self> {
        url.rsplit_once('.')
            .and_then(|(_, ext)| Self::from_extension(ext))
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
            Self::Wav => "wav",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Mp4 | Self::Wav)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Mp4 => "video/mp4",
            Self::Wav => "audio/wav",
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            },
            Self::Txt => "text/plain",
        }
    }
}

pub fn extract_pdf(path: &Path) -> ApiResult<String> {
    pdf_extract::extract_text(path)
        .map(|text| text.trim().to_string())
        .map_err(|e| {
            ApiError::extraction(
                ErrorCode::PdfExtraction,
                format!("Failed to extract text from PDF: {e}"),
            )
        })
}

/// Paragraph text of a Word document, one paragraph per line.
pub fn extract_docx(path: &Path) -> ApiResult<String> {
    let fail = |e: String| {
        ApiError::extraction(
            ErrorCode::DocxExtraction,
            format!("Failed to extract text from DOCX: {e}"),
        )
    };

    let file = File::open(path).map_err(|e| fail(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| fail(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| fail(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| fail(e.to_string()))?;

    document_paragraphs(&xml)
        .map(|paragraphs| paragraphs.join("\n").trim().to_string())
        .map_err(|e| fail(e.to_string()))
}

/// Text of each top-level `w:p` in `word/document.xml`. Paragraphs nested in
/// text boxes are inlined into the paragraph that anchors them.
fn document_paragraphs(xml: &str) -> quick_xml::Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => depth += 1,
                b"w:t" => in_text = true,
                _ => {},
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                },
                b"w:t" => in_text = false,
                _ => {},
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" if depth == 0 => paragraphs.push(String::new()),
                b"w:tab" if depth > 0 => current.push('\t'),
                b"w:br" | b"w:cr" if depth > 0 => current.push('\n'),
                _ => {},
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {},
        }
    }

    Ok(paragraphs)
}

pub fn extract_txt(path: &Path) -> ApiResult<String> {
    std::fs::read_to_string(path)
        .map(|text| text.trim().to_string())
        .map_err(|e| {
            ApiError::extraction(ErrorCode::TxtRead, format!("Failed to read TXT file: {e}"))
        })
}

/// Text of a downloaded document. Media kinds are not handled here.
pub fn extract_document(kind: FileKind, path: &Path) -> ApiResult<String> {
    match kind {
        FileKind::Pdf => extract_pdf(path),
        FileKind::Docx => extract_docx(path),
        FileKind::Txt => extract_txt(path),
        media => Err(ApiError::extraction(
            ErrorCode::UnsupportedFileType,
            format!("{} is not a document type", media.extension()),
        )),
    }
}
