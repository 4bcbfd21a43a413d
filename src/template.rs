//! Filename templates and destination path resolution
//!
//! A template is plain text with `%token%` placeholders, e.g.
//! `%copyright%/%md5%.%ext%`. Token names come from a closed table
//! ([`TOKENS`]); any other name is looked up as a tag category
//! (`%artist%`, `%character%`, ...). Unresolved tokens expand to nothing and
//! `%%` is a literal percent sign.

use crate::config::SaveConfig;
use crate::tags::TagData;
use crate::types::{Dimensions, Image, Size};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{MAIN_SEPARATOR_STR, Path, PathBuf};

/// Values a template can refer to
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    /// Content hash
    pub md5: Option<String>,
    /// Extension (declared, rotated or sniffed)
    pub ext: String,
    /// Item id
    pub id: String,
    /// File stem of the item's URL
    pub filename: String,
    /// Host of the item's URL
    pub website: String,
    /// Pixel dimensions, once known
    pub dimensions: Option<Dimensions>,
    /// Caller-provided counter
    pub count: u32,
    /// Formatted creation date
    pub date: Option<String>,
    /// Content rating
    pub rating: Option<String>,
    /// All tags
    pub tags: Vec<String>,
    /// Tags grouped by category
    pub categories: BTreeMap<String, Vec<String>>,
    /// Separator used when a token expands to several tags
    pub separator: String,
    /// Replace underscores with spaces in tag-derived values
    pub replace_underscores: bool,
}

impl Metadata {
    /// Metadata for `image` with the given tag data
    ///
    /// The hash is whatever the item currently knows; the extension is the
    /// declared one. Use [`Metadata::with_md5`] / [`Metadata::with_ext`] once
    /// the content has been fetched.
    pub fn for_image(image: &Image, tags: &TagData, config: &SaveConfig, count: u32) -> Self {
        let source_url = [Size::Full, Size::Sample, Size::Preview]
            .into_iter()
            .find_map(|size| image.url(size));
        let parsed = source_url.and_then(|u| url::Url::parse(u).ok());

        Self {
            md5: image.md5().map(String::from),
            ext: image.ext().to_string(),
            id: image.id().to_string(),
            filename: parsed.as_ref().map(url_file_stem).unwrap_or_default(),
            website: parsed
                .as_ref()
                .and_then(|u| u.host_str().map(String::from))
                .unwrap_or_default(),
            dimensions: image.dimensions(),
            count,
            date: tags
                .created_at
                .map(|d| d.format(&config.date_format).to_string()),
            rating: tags.rating.clone(),
            tags: tags.tags.clone(),
            categories: tags.categories.clone(),
            separator: config.tag_separator.clone(),
            replace_underscores: config.replace_underscores,
        }
    }

    /// Set the content hash
    pub fn with_md5(mut self, md5: impl Into<String>) -> Self {
        self.md5 = Some(md5.into());
        self
    }

    /// Set the extension
    pub fn with_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into();
        self
    }

    /// Set the pixel dimensions
    pub fn with_dimensions(mut self, dimensions: Option<Dimensions>) -> Self {
        if dimensions.is_some() {
            self.dimensions = dimensions;
        }
        self
    }

    /// Resolve one token name
    pub fn lookup(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        if let Some((_, resolve)) = TOKENS.iter().find(|(token, _)| *token == name) {
            return resolve(self);
        }
        self.categories
            .get(&name)
            .filter(|tags| !tags.is_empty())
            .map(|tags| self.join_tags(tags))
    }

    fn join_tags(&self, tags: &[String]) -> String {
        tags.iter()
            .map(|t| self.tag_value(t))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn tag_value(&self, tag: &str) -> String {
        if self.replace_underscores {
            tag.replace('_', " ")
        } else {
            tag.to_string()
        }
    }
}

type Resolver = fn(&Metadata) -> Option<String>;

/// Built-in tokens and their resolvers
pub const TOKENS: &[(&str, Resolver)] = &[
    ("md5", token_md5),
    ("ext", token_ext),
    ("id", token_id),
    ("filename", token_filename),
    ("website", token_website),
    ("width", token_width),
    ("height", token_height),
    ("count", token_count),
    ("date", token_date),
    ("rating", token_rating),
    ("all", token_all),
    ("tags", token_all),
];

/// Tokens resolvable from the item alone, without page data
const ITEM_TOKENS: &[&str] = &[
    "md5", "ext", "id", "filename", "website", "width", "height", "count",
];

fn token_md5(m: &Metadata) -> Option<String> {
    m.md5.clone()
}

fn token_ext(m: &Metadata) -> Option<String> {
    Some(m.ext.clone()).filter(|e| !e.is_empty())
}

fn token_id(m: &Metadata) -> Option<String> {
    Some(m.id.clone())
}

fn token_filename(m: &Metadata) -> Option<String> {
    Some(m.filename.clone()).filter(|f| !f.is_empty())
}

fn token_website(m: &Metadata) -> Option<String> {
    Some(m.website.clone()).filter(|w| !w.is_empty())
}

fn token_width(m: &Metadata) -> Option<String> {
    m.dimensions.map(|d| d.width.to_string())
}

fn token_height(m: &Metadata) -> Option<String> {
    m.dimensions.map(|d| d.height.to_string())
}

fn token_count(m: &Metadata) -> Option<String> {
    Some(m.count.to_string())
}

fn token_date(m: &Metadata) -> Option<String> {
    m.date.clone()
}

fn token_rating(m: &Metadata) -> Option<String> {
    m.rating.clone()
}

fn token_all(m: &Metadata) -> Option<String> {
    Some(m.join_tags(&m.tags)).filter(|t| !t.is_empty())
}

/// Token names referenced by `template`, in order
pub fn tokens(template: &str) -> Vec<&str> {
    let mut found = Vec::new();
    scan(template, |piece| {
        if let Piece::Token(name) = piece {
            found.push(name);
        }
    });
    found
}

/// True if `template` refers to data only a tag load can provide for `image`
pub fn needs_page_data(template: &str, image: &Image) -> bool {
    tokens(template).into_iter().any(|token| {
        let token = token.to_ascii_lowercase();
        match token.as_str() {
            t if ITEM_TOKENS.contains(&t) => false,
            "rating" => image.rating().is_none(),
            "date" => image.created_at().is_none(),
            "all" | "tags" => image.tags().is_empty(),
            _ => true,
        }
    })
}

/// Expand `template` with raw token values
#[must_use]
pub fn render(template: &str, metadata: &Metadata) -> String {
    render_with(template, metadata, |value| value.to_string())
}

/// Expand `template`, passing every token value through `escape`
pub fn render_with(template: &str, metadata: &Metadata, escape: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(template.len());
    scan(template, |piece| match piece {
        Piece::Text(text) => out.push_str(text),
        Piece::Percent => out.push('%'),
        Piece::Token(name) => {
            if let Some(value) = metadata.lookup(name) {
                out.push_str(&escape(&value));
            }
        }
    });
    out
}

/// Resolve `template` into a path under `root`
///
/// Token values cannot introduce directories: separators and characters that
/// are invalid in filenames are replaced. Literal `/` or `\` in the template
/// do create subdirectories. Empty, `.` and `..` components are dropped.
/// Separators are normalized to the platform's. If nothing remains after the
/// root, the result is the root with a trailing separator, which never names a
/// writable file.
///
/// The path is not created.
#[must_use]
pub fn resolve_path(template: &str, metadata: &Metadata, root: &Path) -> PathBuf {
    let rendered = render_with(template, metadata, sanitize_value);
    let mut path: PathBuf = root.components().collect();

    let mut pushed = false;
    for component in rendered.split(['/', '\\']) {
        let component = component.trim();
        if component.is_empty() || component == "." || component == ".." {
            continue;
        }
        path.push(component);
        pushed = true;
    }

    if !pushed {
        let mut raw: OsString = path.into_os_string();
        if !raw.to_string_lossy().ends_with(MAIN_SEPARATOR_STR) {
            raw.push(MAIN_SEPARATOR_STR);
        }
        return PathBuf::from(raw);
    }
    path
}

/// Make a token value safe to use inside one path component
#[must_use]
pub fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect()
}

enum Piece<'a> {
    Text(&'a str),
    Percent,
    Token(&'a str),
}

fn is_token_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn scan<'a>(template: &'a str, mut emit: impl FnMut(Piece<'a>)) {
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        if start > 0 {
            emit(Piece::Text(&rest[..start]));
        }
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('%') {
            emit(Piece::Percent);
            rest = stripped;
            continue;
        }
        match after.find('%') {
            Some(end) if is_token_name(&after[..end]) => {
                emit(Piece::Token(&after[..end]));
                rest = &after[end + 1..];
            }
            _ => {
                emit(Piece::Text("%"));
                rest = after;
            }
        }
    }
    if !rest.is_empty() {
        emit(Piece::Text(rest));
    }
}

fn url_file_stem(url: &url::Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let decoded = urlencoding::decode(last)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last.to_string());
    Path::new(&decoded)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
        .unwrap_or(decoded)
}
