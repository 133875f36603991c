//! Asset classification from URL, content type and content length.
//!
//! Precedence is fixed: the content-type table wins over the pixel size
//! heuristic, which wins over URL suffix sniffing. When no content type is
//! present only the URL substring sniff and the zero-length pixel rule apply.

use crate::model::AssetType;

/// Maps one category to the content types that select it.
#[derive(Clone, Copy, Debug)]
pub struct ContentTypeRule {
    pub asset: AssetType,
    pub content_types: &'static [&'static str],
}

/// Content-type table consulted in order. Values are compared after the
/// parameter suffix is stripped and the remainder is trimmed and lower-cased.
pub const CONTENT_TYPE_RULES: &[ContentTypeRule] = &[
    ContentTypeRule {
        asset: AssetType::Javascript,
        content_types: &[
            "application/javascript",
            "application/x-javascript",
            "text/javascript",
            "application/ecmascript",
            "application/js",
        ],
    },
    ContentTypeRule {
        asset: AssetType::Css,
        content_types: &["text/css"],
    },
    ContentTypeRule {
        asset: AssetType::Xhr,
        content_types: &[
            "application/json",
            "application/ld+json",
            "application/manifest+json",
            "application/xml",
            "text/plain",
            "text/xml",
            "text/x-json",
            "text/json",
            "application/x-json",
        ],
    },
    ContentTypeRule {
        asset: AssetType::Font,
        content_types: &[
            "application/font-otf",
            "application/font-sfnt",
            "application/font-woff",
            "application/font-woff2",
            "application/font",
            "application/otf",
            "application/vnd.ms-fontobject",
            "application/x-font-opentype",
            "application/x-font-otf",
            "application/x-font-truetype",
            "application/x-font-ttf",
            "font/eot",
            "font/opentype",
            "font/otf",
            "font/woff",
            "font/woff2",
            "font/ttf",
            "application/x-font-woff",
            "font/x-woff",
            "application/x-woff",
        ],
    },
    ContentTypeRule {
        asset: AssetType::Image,
        content_types: &[
            "image/bmp",
            "image/gif",
            "image/jpeg",
            "image/jpg",
            "image/psd",
            "image/tiff",
            "image/jp2",
            "image/ico",
            "image/icon",
            "image/pjpeg",
            "image/png",
            "image/svg+xml",
            "image/vnd.microsoft.icon",
            "image/webp",
            "image/x-icon",
            "image/x-png",
            "image",
        ],
    },
    ContentTypeRule {
        asset: AssetType::Html,
        content_types: &["text/html", "application/html", "application/x-iframe-html"],
    },
    ContentTypeRule {
        asset: AssetType::Video,
        content_types: &["video/mp4", "video/webm", "text/vtt", "video/x-flv", "video/ogg"],
    },
    ContentTypeRule {
        asset: AssetType::Audio,
        content_types: &["audio/webm"],
    },
];

/// Encoded sizes of the common 1x1 tracking GIF.
pub const DEFAULT_PIXEL_SIZES: [u64; 2] = [42, 43];

/// Substrings sniffed when a response carries no content type.
const UNTYPED_URL_SNIFFS: &[(&str, AssetType)] = &[
    (".woff", AssetType::Font),
    (".ttf", AssetType::Font),
    (".html", AssetType::Html),
];

/// Suffixes sniffed after the table and the pixel heuristic both miss.
const URL_SUFFIX_SNIFFS: &[(&str, AssetType)] = &[
    (".js", AssetType::Javascript),
    (".json", AssetType::Xhr),
    (".css", AssetType::Css),
    (".gif", AssetType::Image),
    (".png", AssetType::Image),
    (".jpg", AssetType::Image),
];

#[derive(Clone, Debug)]
pub struct AssetClassifier {
    rules: &'static [ContentTypeRule],
    pixel_sizes: Vec<u64>,
}

impl Default for AssetClassifier {
    fn default() -> Self {
        Self {
            rules: CONTENT_TYPE_RULES,
            pixel_sizes: DEFAULT_PIXEL_SIZES.to_vec(),
        }
    }
}

impl AssetClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the byte sizes treated as tracking pixels when the table misses.
    pub fn with_pixel_sizes(mut self, sizes: impl IntoIterator<Item = u64>) -> Self {
        self.pixel_sizes = sizes.into_iter().collect();
        self
    }

    pub fn pixel_sizes(&self) -> &[u64] {
        &self.pixel_sizes
    }

    pub fn classify(
        &self,
        url: &str,
        content_type: Option<&str>,
        content_length: u64,
    ) -> Option<AssetType> {
        // only a missing or zero-length header is untyped; blanks go through the table
        let Some(content_type) = content_type.filter(|value| !value.is_empty()) else {
            return sniff_untyped(url, content_length);
        };

        if let Some(asset) = self.lookup(content_type) {
            return Some(asset);
        }

        if self.pixel_sizes.contains(&content_length) {
            return Some(AssetType::Pixel);
        }

        URL_SUFFIX_SNIFFS
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix))
            .map(|(_, asset)| *asset)
    }

    /// Table lookup only; `None` when the essence matches no rule.
    pub fn lookup(&self, content_type: &str) -> Option<AssetType> {
        let essence = essence(content_type);
        self.rules
            .iter()
            .find(|rule| rule.content_types.iter().any(|known| *known == essence))
            .map(|rule| rule.asset)
    }
}

fn sniff_untyped(url: &str, content_length: u64) -> Option<AssetType> {
    if let Some((_, asset)) = UNTYPED_URL_SNIFFS
        .iter()
        .find(|(needle, _)| url.contains(needle))
    {
        return Some(*asset);
    }
    (content_length == 0).then_some(AssetType::Pixel)
}

/// `text/css; charset=utf-8` -> `text/css`
fn essence(content_type: &str) -> String {
    let media = match content_type.split_once(';') {
        Some((media, _)) => media,
        None => content_type,
    };
    media.trim().to_ascii_lowercase()
}
