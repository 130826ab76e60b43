//! 发表情 (fabiaoqing.com), a large Chinese meme gallery.
//!
//! Listing pages are numbered from 1 and hold a grid of lazily-loaded
//! `<img>` elements whose `alt` text doubles as a caption. We take the
//! category and tags from that caption.

use crate::consts::{
    CATEGORY_PREFIX_REGEX, IMAGE_EXTENSIONS, IMAGE_SELECTORS, KNOWN_CATEGORY_REGEX, REJECTED_URL_MARKERS,
    SOURCE_ATTRIBUTES, TAG_SEPARATOR_REGEX,
};
use crate::error::{ErrorKind, Result};
use crate::http::HttpClient;
use async_trait::async_trait;
use emomo_config::Config;
use emomo_crawl::adapter::{DEFAULT_CATEGORY, MAX_TAGS};
use emomo_crawl::error::{ErrorKind as CrawlErrorKind, Result as CrawlResult};
use emomo_crawl::{Adapter, Candidate, Cursor, Fetched};
use emomo_staging::SourceId;
use exn::ResultExt;
use scraper::Html;
use std::collections::HashSet;

pub const BASE_URL: &str = "https://fabiaoqing.com";

pub struct Fabiaoqing {
    source: SourceId,
    http: HttpClient,
}

impl Fabiaoqing {
    pub const ID: &str = "fabiaoqing";

    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            source: SourceId::new(Self::ID).or_raise(|| ErrorKind::UnknownSource(Self::ID.to_string()))?,
            http: HttpClient::new(&config.http, config.crawl.timeout(), BASE_URL)?,
        })
    }

    pub fn list_url(page: u32) -> String {
        format!("{BASE_URL}/biaoqing/lists/page/{page}.html")
    }

    fn page(cursor: &Cursor) -> CrawlResult<u32> {
        match cursor.as_str().parse::<u32>() {
            Ok(page) if page >= 1 => Ok(page),
            _ => exn::bail!(CrawlErrorKind::InvalidCursor(cursor.to_string())),
        }
    }
}

#[async_trait]
impl Adapter for Fabiaoqing {
    fn source_id(&self) -> &SourceId {
        &self.source
    }

    fn display_name(&self) -> &str {
        "发表情 (fabiaoqing.com)"
    }

    fn initial_cursor(&self) -> Cursor {
        Cursor::new("1")
    }

    fn parse_cursor(&self, raw: &str) -> CrawlResult<Cursor> {
        let cursor = Cursor::new(raw.trim());
        Self::page(&cursor)?;
        Ok(cursor)
    }

    fn next_cursor(&self, cursor: &Cursor) -> Cursor {
        let page = Self::page(cursor).unwrap_or(0);
        Cursor::new(page.saturating_add(1).to_string())
    }

    async fn list_candidates(&self, cursor: &Cursor) -> CrawlResult<Vec<Candidate>> {
        let url = Self::list_url(Self::page(cursor)?);
        tracing::debug!(%url, "Fetching listing page");
        let html = self
            .http
            .get_text(&url)
            .await
            .or_raise(|| CrawlErrorKind::Listing(url.clone()))?;
        Ok(parse_listing(&html))
    }

    async fn fetch_bytes(&self, url: &str) -> CrawlResult<Fetched> {
        let (bytes, content_type) = self
            .http
            .get_bytes(url)
            .await
            .or_raise(|| CrawlErrorKind::Download(url.to_string()))?;
        Ok(Fetched { bytes, content_type })
    }
}

/// Every usable image on a listing page, in selector order then document
/// order, without repeats.
pub(crate) fn parse_listing(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let mut found = HashSet::new();
    let mut candidates = Vec::new();
    for selector in IMAGE_SELECTORS {
        for image in document.select(selector) {
            let element = image.value();
            let Some(src) = SOURCE_ATTRIBUTES
                .iter()
                .find_map(|attr| element.attr(attr).filter(|value| !value.is_empty()))
            else {
                continue;
            };
            let Some(url) = normalize_url(src) else {
                continue;
            };
            if !found.insert(url.clone()) {
                continue;
            }
            let caption = element.attr("alt").unwrap_or_default();
            let category = extract_category(caption).unwrap_or(DEFAULT_CATEGORY);
            candidates.push(Candidate::new(url, category, extract_tags(caption)));
        }
    }
    candidates
}

/// Absolute URL for an image `src`, or `None` for placeholders, icons and
/// anything that isn't an image.
fn normalize_url(src: &str) -> Option<String> {
    let lower = src.to_lowercase();
    if REJECTED_URL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return None;
    }
    let url = if src.starts_with("//") {
        format!("https:{src}")
    } else if src.starts_with('/') {
        format!("{BASE_URL}{src}")
    } else {
        src.to_string()
    };
    IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)).then_some(url)
}

fn extract_category(caption: &str) -> Option<&str> {
    KNOWN_CATEGORY_REGEX
        .captures(caption)
        .or_else(|| CATEGORY_PREFIX_REGEX.captures(caption))
        .and_then(|captures| captures.get(1))
        .map(|category| category.as_str())
}

fn extract_tags(caption: &str) -> Vec<String> {
    TAG_SEPARATOR_REGEX
        .split(caption.trim())
        .map(str::trim)
        .filter(|part| (2..=20).contains(&part.chars().count()))
        .filter(|part| !part.chars().all(char::is_numeric))
        .take(MAX_TAGS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use emomo_staging::{Format, item_id};
    use rstest::rstest;

    const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head><title>表情包列表</title></head>
<body>
  <img class="logo" src="/static/images/logo-icon.png" alt="发表情">
  <div class="ui segment">
    <div class="tagbqppdiv">
      <a href="/biaoqing/detail/1.html" class="image">
        <img class="ui image lazy" data-original="//img.fabiaoqing.com/a/熊猫头-好的.gif" src="/static/lazyload.gif" alt="熊猫头 好的 收到">
      </a>
    </div>
    <div class="tagbqppdiv">
      <a href="/biaoqing/detail/2.html" class="image">
        <img class="ui image lazy" data-original="https://img.fabiaoqing.com/b/mushroom.JPG" alt="蘑菇头表情_开心_2024">
      </a>
    </div>
    <div class="tagbqppdiv">
      <img class="lazy" data-original="https://img.fabiaoqing.com/c/placeholder.png" alt="占位">
      <img class="lazy" src="/uploads/d/cat.webp" alt="猫咪系列-睡觉">
      <img class="lazy" src="https://img.fabiaoqing.com/e/video.mp4" alt="视频">
      <img class="lazy" data-original="" src="https://img.fabiaoqing.com/f/dog.png" alt="">
    </div>
    <div class="bqba">
      <img src="//img.fabiaoqing.com/a/熊猫头-好的.gif" alt="duplicate">
    </div>
  </div>
</body>
</html>"#;

    #[test]
    fn test_parse_listing_fixture() {
        let candidates = parse_listing(LISTING);
        let urls: Vec<_> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://img.fabiaoqing.com/a/熊猫头-好的.gif",
                "https://img.fabiaoqing.com/b/mushroom.JPG",
                // An empty data-original still matches `img[data-original]`.
                "https://img.fabiaoqing.com/f/dog.png",
                "https://fabiaoqing.com/uploads/d/cat.webp",
            ]
        );

        let panda = &candidates[0];
        assert_eq!(panda.id, item_id("https://img.fabiaoqing.com/a/熊猫头-好的.gif"));
        assert_eq!(panda.category, "熊猫头");
        assert_eq!(panda.tags, vec!["熊猫头", "好的", "收到"]);
        assert_eq!(panda.format, Format::Gif);

        let mushroom = &candidates[1];
        assert_eq!(mushroom.category, "蘑菇头");
        assert_eq!(mushroom.tags, vec!["蘑菇头表情", "开心"]);
        assert_eq!(mushroom.format, Format::Jpg);

        let cat = &candidates[3];
        assert_eq!(cat.category, "猫咪");
        assert_eq!(cat.tags, vec!["猫咪系列", "睡觉"]);
        assert_eq!(cat.format, Format::Webp);

        let dog = &candidates[2];
        assert_eq!(dog.category, DEFAULT_CATEGORY);
        assert!(dog.tags.is_empty());
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_listing("<html><body><p>没有更多了</p></body></html>").is_empty());
    }

    #[rstest]
    #[case("//img.x.test/a.gif", Some("https://img.x.test/a.gif"))]
    #[case("/uploads/a.png", Some("https://fabiaoqing.com/uploads/a.png"))]
    #[case("https://img.x.test/a.jpeg?x=1", Some("https://img.x.test/a.jpeg?x=1"))]
    #[case("https://img.x.test/Transparent.GIF", None)]
    #[case("https://img.x.test/placeholder.png", None)]
    #[case("https://img.x.test/icons/a.png", None)]
    #[case("/static/lazyload.jpg", None)]
    #[case("https://img.x.test/a.svg", None)]
    fn test_normalize_url(#[case] src: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_url(src).as_deref(), expected);
    }

    #[rstest]
    #[case("金馆长 微笑", Some("金馆长"))]
    #[case("沙雕表情 哈哈", Some("沙雕"))]
    #[case("猫咪系列", Some("猫咪"))]
    #[case("我们是 暴漫 粉丝", Some("暴漫"))]
    #[case("随便 一张图", None)]
    #[case("", None)]
    fn test_extract_category(#[case] caption: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_category(caption), expected);
    }

    #[rstest]
    #[case("好的，收到、明白", vec!["好的", "收到", "明白"])]
    #[case("a 12 哈哈 2024", vec!["哈哈"])]
    #[case("一 二三 四五六 七八 九十 十一 十二", vec!["二三", "四五六", "七八", "九十", "十一"])]
    #[case("  ", vec![])]
    fn test_extract_tags(#[case] caption: &str, #[case] expected: Vec<&str>) {
        assert_eq!(extract_tags(caption), expected);
    }

    #[test]
    fn test_tags_length_is_counted_in_characters() {
        let long = "长".repeat(21);
        let exact = "长".repeat(20);
        assert_eq!(extract_tags(&format!("{long} {exact}")), vec![exact]);
    }

    #[rstest]
    #[case("1", true)]
    #[case(" 42 ", true)]
    #[case("0", false)]
    #[case("-1", false)]
    #[case("abc", false)]
    fn test_parse_cursor(#[case] raw: &str, #[case] valid: bool) {
        let adapter = Fabiaoqing::new(&Config::default()).unwrap();
        assert_eq!(adapter.parse_cursor(raw).is_ok(), valid);
    }

    #[test]
    fn test_cursors_advance_by_page() {
        let adapter = Fabiaoqing::new(&Config::default()).unwrap();
        assert_eq!(adapter.initial_cursor(), Cursor::new("1"));
        assert_eq!(adapter.next_cursor(&Cursor::new("7")), Cursor::new("8"));
        assert_eq!(adapter.source_id().as_str(), "fabiaoqing");
        assert_eq!(Fabiaoqing::list_url(3), "https://fabiaoqing.com/biaoqing/lists/page/3.html");
    }
}
