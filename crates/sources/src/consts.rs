use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Listing markup has changed over the years; each selector catches one
// generation of it. Order matters for the order candidates are emitted in.
selector!(UI_LAZY_IMAGE_SELECTOR, "img.ui.image.lazy");
selector!(DATA_ORIGINAL_SELECTOR, "img[data-original]");
selector!(BQPP_SELECTOR, ".bqppdiv img");
selector!(TAG_BQPP_SELECTOR, ".tagbqppdiv img");
selector!(BQBA_SELECTOR, ".bqba img");
selector!(LAZY_IMAGE_SELECTOR, "img.lazy");
selector!(IMAGE_CONTAINER_SELECTOR, ".image img");
selector!(IMAGE_LINK_SELECTOR, "a.image img");

pub(crate) static IMAGE_SELECTORS: [&LazyLock<Selector>; 8] = [
    &UI_LAZY_IMAGE_SELECTOR,
    &DATA_ORIGINAL_SELECTOR,
    &BQPP_SELECTOR,
    &TAG_BQPP_SELECTOR,
    &BQBA_SELECTOR,
    &LAZY_IMAGE_SELECTOR,
    &IMAGE_CONTAINER_SELECTOR,
    &IMAGE_LINK_SELECTOR,
];

// Attributes holding the real image URL, most reliable first.
pub(crate) const SOURCE_ATTRIBUTES: [&str; 3] = ["data-original", "src", "data-src"];
pub(crate) const REJECTED_URL_MARKERS: [&str; 4] = ["placeholder", "icon", "lazyload", "transparent.gif"];
pub(crate) const IMAGE_EXTENSIONS: [&str; 5] = [".gif", ".jpg", ".jpeg", ".png", ".webp"];

regex!(KNOWN_CATEGORY_REGEX, "(熊猫头|蘑菇头|金馆长|张学友|姚明|暴漫|表情包)");
regex!(CATEGORY_PREFIX_REGEX, r"^([^_\-\s]+?)(?:表情|系列)");
regex!(TAG_SEPARATOR_REGEX, r"[,，、\s_\-]+");
