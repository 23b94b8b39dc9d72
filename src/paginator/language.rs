//! Syntax-highlighting language and text-encoding detection.
//!
//! Hints are file names, URLs or content-type headers. Content analysis
//! looks at byte-order marks, `coding:` declarations and shebang lines.

use std::sync::LazyLock;

use regex::Regex;
use regex::bytes::Regex as BytesRegex;
use reqwest::Url;

use super::PaginatorError;

/// Extension (or bare file name) to highlight tag.
const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "py"),
    ("pyw", "py"),
    ("rs", "rust"),
    ("js", "js"),
    ("mjs", "js"),
    ("ts", "ts"),
    ("json", "json"),
    ("toml", "toml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("md", "md"),
    ("html", "html"),
    ("htm", "html"),
    ("xml", "xml"),
    ("css", "css"),
    ("sh", "sh"),
    ("bash", "sh"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("hpp", "cpp"),
    ("go", "go"),
    ("java", "java"),
    ("rb", "rb"),
    ("lua", "lua"),
    ("sql", "sql"),
    ("ini", "ini"),
    ("cfg", "ini"),
    ("dockerfile", "dockerfile"),
    ("makefile", "makefile"),
];

/// MIME type (without parameters) to highlight tag.
const MIME_TYPES: &[(&str, &str)] = &[
    ("application/json", "json"),
    ("application/javascript", "js"),
    ("text/javascript", "js"),
    ("application/xml", "xml"),
    ("text/xml", "xml"),
    ("text/html", "html"),
    ("text/css", "css"),
    ("text/markdown", "md"),
    ("text/x-python", "py"),
    ("application/x-python", "py"),
    ("application/toml", "toml"),
    ("application/x-yaml", "yaml"),
    ("text/x-rust", "rust"),
    ("application/x-sh", "sh"),
];

/// Interpreter named in a shebang to highlight tag.
const INTERPRETERS: &[(&str, &str)] = &[
    ("python", "py"),
    ("node", "js"),
    ("bash", "sh"),
    ("sh", "sh"),
    ("zsh", "sh"),
    ("ruby", "rb"),
    ("lua", "lua"),
];

#[allow(clippy::unwrap_used)]
static CODING_DECLARATION: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"coding[=:]\s*([-\w.]+)").unwrap());

#[allow(clippy::unwrap_used)]
static INTERPRETER_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d.]+$").unwrap());

/// Text decoded from raw bytes, with what was learned on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedContent {
    pub text: String,
    pub encoding: &'static str,
    /// Language implied by the content itself, such as a shebang.
    pub language: Option<&'static str>,
}

/// Guesses a highlight tag from a file name, URL or content type.
pub fn detect_language(hint: &str) -> Option<&'static str> {
    let hint = hint.trim().to_lowercase();
    if hint.is_empty() {
        return None;
    }

    let mime = hint.split(';').next().unwrap_or_default().trim();
    if let Some((_, tag)) = MIME_TYPES.iter().find(|(m, _)| *m == mime) {
        return Some(tag);
    }

    // A URL's host never names a file; only its last path segment does.
    let name = match Url::parse(&hint) {
        Ok(url) if url.has_host() => {
            let segment = url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()));
            segment?.to_owned()
        }
        _ => {
            let path = hint.trim_end_matches(['/', '\\']);
            path.rsplit(['/', '\\']).next().unwrap_or(path).to_owned()
        }
    };

    let extension = name.rsplit_once('.').map(|(_, ext)| ext);
    EXTENSIONS
        .iter()
        .find(|(ext, _)| extension == Some(*ext) || *ext == name)
        .map(|(_, tag)| *tag)
}

/// Decodes `data` and looks for a language signal inside it.
pub fn analyze_content(data: &[u8]) -> Result<AnalyzedContent, PaginatorError> {
    let (text, encoding) = decode(data)?;
    let language = shebang_language(&text);
    Ok(AnalyzedContent {
        text,
        encoding,
        language,
    })
}

fn decode(data: &[u8]) -> Result<(String, &'static str), PaginatorError> {
    if let Some(rest) = data.strip_prefix(b"\xEF\xBB\xBF") {
        return utf8(rest).map(|text| (text, "utf-8-sig"));
    }
    if let Some(rest) = data.strip_prefix(b"\xFF\xFE") {
        return utf16(rest, u16::from_le_bytes).map(|text| (text, "utf-16-le"));
    }
    if let Some(rest) = data.strip_prefix(b"\xFE\xFF") {
        return utf16(rest, u16::from_be_bytes).map(|text| (text, "utf-16-be"));
    }

    match declared_encoding(data).as_deref() {
        Some("latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1") => {
            Ok((data.iter().copied().map(char::from).collect(), "latin-1"))
        }
        Some("ascii" | "us-ascii") => {
            if data.is_ascii() {
                utf8(data).map(|text| (text, "ascii"))
            } else {
                Err(PaginatorError::Decode(
                    "declared ascii but found non-ascii bytes".to_owned(),
                ))
            }
        }
        _ => utf8(data).map(|text| (text, "utf-8")),
    }
}

/// Encoding named by a `coding:` declaration in the first two lines.
fn declared_encoding(data: &[u8]) -> Option<String> {
    data.split(|b| *b == b'\n')
        .take(2)
        .find_map(|line| CODING_DECLARATION.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_lowercase())
}

fn utf8(data: &[u8]) -> Result<String, PaginatorError> {
    String::from_utf8(data.to_vec()).map_err(|e| PaginatorError::Decode(e.to_string()))
}

fn utf16(data: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, PaginatorError> {
    if data.len() % 2 != 0 {
        return Err(PaginatorError::Decode(
            "odd number of bytes in utf-16 data".to_owned(),
        ));
    }
    let units = data.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| PaginatorError::Decode(e.to_string()))
}

fn shebang_language(text: &str) -> Option<&'static str> {
    let line = text.lines().next()?.strip_prefix("#!")?;
    let mut parts = line.split_whitespace();
    let program = parts.next()?;
    let mut interpreter = program.rsplit('/').next().unwrap_or(program);
    if interpreter == "env" {
        interpreter = parts.find(|p| !p.starts_with('-'))?;
    }

    let bare = INTERPRETER_VERSION
        .find(interpreter)
        .map_or(interpreter, |m| &interpreter[..m.start()]);
    INTERPRETERS
        .iter()
        .find(|(name, _)| *name == bare)
        .map(|(_, tag)| *tag)
}
