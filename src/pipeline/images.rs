//! Image relevance: problem figures vs. site decoration.
//!
//! Rules are checked in order and the first exclusion wins. Anything no
//! rule excludes is kept; dropping a real figure is worse than printing
//! an extra icon.

use crate::model::{ImageRef, Platform, SectionKind};
use tracing::debug;
use url::Url;

/// Where an image was found.
#[derive(Debug, Clone, Copy)]
pub struct ImageContext {
    pub platform: Platform,
    /// Field the image was embedded in, if known.
    pub section: Option<SectionKind>,
    /// Icon-size threshold in pixels (see `ConversionConfig::image_min_dimension`).
    pub threshold: u32,
}

impl ImageContext {
    pub fn new(platform: Platform, threshold: u32) -> Self {
        Self {
            platform,
            section: None,
            threshold,
        }
    }
}

/// Why an image was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    DecorativePath,
    ChromeFileName,
    IconSize,
    TrackingPixel,
    PlatformDenyList,
}

/// Directory fragments that only hold site chrome.
const DECORATIVE_PATHS: &[&str] = &[
    "/nav/", "/navigation/", "/icons/", "/icon/", "/flags/", "/flag/", "/lang/", "/social/",
    "/share/", "/ads/", "/ad/", "/advert", "/banner", "/logo", "/sprites/", "/avatar",
    "/emoji", "/badges/", "/theme/", "/themes/",
];

/// File-name stems of UI chrome.
const CHROME_FILE_NAMES: &[&str] = &[
    "logo", "icon", "favicon", "spinner", "loading", "loader", "arrow", "button", "flag",
    "avatar", "badge", "sprite", "banner", "rss", "twitter", "facebook", "github",
];

/// Exact file names of spacer images.
const SPACER_FILES: &[&str] = &["spacer.gif", "pixel.gif", "blank.gif", "1x1.gif", "clear.gif"];

/// Per-platform chrome, matched against URL parts rather than raw text so
/// figures whose names merely contain a listed word survive.
struct DenyList {
    /// Host (or parent domain) plus path prefix.
    hosts: &'static [(&'static str, &'static str)],
    /// Directory fragments, slash-delimited.
    dirs: &'static [&'static str],
    /// File stems, alone or as a `stem-…` prefix.
    stems: &'static [&'static str],
}

const EMPTY_DENY_LIST: DenyList = DenyList {
    hosts: &[],
    dirs: &[],
    stems: &[],
};

fn platform_deny_list(platform: Platform) -> &'static DenyList {
    match platform {
        Platform::Codeforces => &DenyList {
            hosts: &[("codeforces.org", "/s/"), ("userpic.codeforces.org", "/")],
            dirs: &["/images/flags/"],
            stems: &["rating"],
        },
        Platform::AtCoder => &DenyList {
            hosts: &[("img.atcoder.jp", "/assets/")],
            dirs: &["/public/img/", "/img/lang/"],
            stems: &[],
        },
        Platform::CodeChef => &DenyList {
            hosts: &[("cdn.codechef.com", "/images/")],
            dirs: &["/sites/all/themes/", "/misc/"],
            stems: &["star"],
        },
        Platform::Spoj => &DenyList {
            hosts: &[],
            dirs: &["/gfx/"],
            stems: &[],
        },
        Platform::Unknown => &EMPTY_DENY_LIST,
    }
}

impl DenyList {
    fn matches(&self, target: &Target, stem: &str) -> bool {
        let on_host = |h: &str| target.host == h || target.host.ends_with(&format!(".{h}"));
        self.hosts
            .iter()
            .any(|(h, prefix)| on_host(h) && target.path.starts_with(prefix))
            || self.dirs.iter().any(|d| target.path.contains(d))
            || self
                .stems
                .iter()
                .any(|s| stem == *s || stem.starts_with(&format!("{s}-")))
    }
}

/// Keep `image` unless an exclusion rule matches.
pub fn is_relevant(image: &ImageRef, ctx: &ImageContext) -> bool {
    match exclusion(image, ctx) {
        Some(reason) => {
            debug!(url = %image.url, ?reason, "image excluded");
            false
        }
        None => true,
    }
}

/// First matching exclusion rule, if any.
pub fn exclusion(image: &ImageRef, ctx: &ImageContext) -> Option<Exclusion> {
    let target = Target::parse(&image.url);
    let path = target.path.as_str();

    // ── Rule 1: decorative directories ───────────────────────────────────
    if DECORATIVE_PATHS.iter().any(|p| path.contains(p)) {
        return Some(Exclusion::DecorativePath);
    }

    // ── Rule 2: chrome file names ────────────────────────────────────────
    let file = path.rsplit('/').next().unwrap_or("");
    let stem = file.split('.').next().unwrap_or("");
    if file.ends_with(".ico")
        || SPACER_FILES.contains(&file)
        || CHROME_FILE_NAMES
            .iter()
            .any(|name| stem == *name || stem.starts_with(&format!("{name}_")) || stem.starts_with(&format!("{name}-")))
    {
        return Some(Exclusion::ChromeFileName);
    }

    // ── Rule 3: icon-sized or tracking pixel ─────────────────────────────
    match (image.width, image.height) {
        (Some(1), Some(1)) => return Some(Exclusion::TrackingPixel),
        (Some(w), Some(h)) if w.max(h) <= ctx.threshold => return Some(Exclusion::IconSize),
        _ => {}
    }

    // ── Rule 4: platform deny-list ───────────────────────────────────────
    if platform_deny_list(ctx.platform).matches(&target, stem) {
        return Some(Exclusion::PlatformDenyList);
    }

    None
}

/// Lowercased host and path of an image URL; query and fragment dropped.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    host: String,
    path: String,
}

impl Target {
    fn parse(url: &str) -> Self {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "data" => Self {
                host: String::new(),
                path: String::new(),
            },
            Ok(parsed) => Self {
                host: parsed.host_str().unwrap_or_default().to_ascii_lowercase(),
                path: match parsed.path() {
                    "" => "/".to_string(),
                    p => p.to_ascii_lowercase(),
                },
            },
            // Relative reference: everything before `?` / `#` is path.
            Err(_) => Self {
                host: String::new(),
                path: url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase(),
            },
        }
    }
}
