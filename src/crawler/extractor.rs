//! Recipe detail page extraction
//!
//! Page layout the extractor reads:
//!
//! | Field | Source |
//! |-------|--------|
//! | title | `h1 > a` text, else the `h1`'s own text |
//! | ingredients | `div.rbox h5` headings, each followed by a `ul` of `li` items with two `span`s |
//! | steps | `ul.steplist > li`: text of the child `div`, image in a child `img[data-src]` |
//! | tips | `div` text inside a `div.textbox` whose `h3` mentions 窍门 or 提示 |
//! | categories | links of the `div.textbox` whose own text contains 分类： |
//! | main image | `div.row.mb20 img[src]` |
//!
//! Every field is optional; a page missing all of them still yields a record.

use crate::record::{Ingredient, IngredientSection, RecipeRecord, Step};
use crate::url::recipe_id_from_url;
use crate::ParseFailure;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($css).expect(concat!("selector is valid: ", $css)));
    };
}

selector!(H1, "h1");
selector!(H1_ANCHOR, "h1 > a");
selector!(SECTION_HEADING, "div.rbox h5");
selector!(SPAN, "span");
selector!(STEP_ITEM, "ul.steplist > li");
selector!(TEXTBOX, "div.textbox");
selector!(H3, "h3");
selector!(DIV, "div");
selector!(ANCHOR, "a");
selector!(MAIN_IMAGE, "div.row.mb20 img[src]");

const TIP_MARKERS: [&str; 2] = ["窍门", "提示"];
const CATEGORY_MARKER: &str = "分类：";

/// Extracts a record from a fetched detail page
///
/// Fails only when the body is not UTF-8, is blank, or the URL carries no
/// recipe id.
pub fn extract_recipe(body: &[u8], url: &Url) -> Result<RecipeRecord, ParseFailure> {
    let html = std::str::from_utf8(body).map_err(|_| ParseFailure::NotUtf8 {
        url: url.to_string(),
    })?;
    parse_recipe(html, url)
}

/// Extracts a record from detail page HTML
pub fn parse_recipe(html: &str, url: &Url) -> Result<RecipeRecord, ParseFailure> {
    let recipe_id = recipe_id_from_url(url).ok_or_else(|| ParseFailure::MissingRecipeId {
        url: url.to_string(),
    })?;

    if html.trim().is_empty() {
        return Err(ParseFailure::EmptyDocument {
            url: url.to_string(),
        });
    }

    let document = Html::parse_document(html);
    let mut record = RecipeRecord::new(recipe_id, url.as_str());

    record.title = extract_title(&document);
    record.ingredients = extract_ingredients(&document);
    record.steps = extract_steps(&document, url);
    record.tips = extract_tips(&document);
    for category in extract_categories(&document) {
        record.add_category(category);
    }
    record.main_image_ref = document
        .select(&MAIN_IMAGE)
        .filter_map(|img| img.value().attr("src"))
        .find_map(|src| resolve(src, url));

    Ok(record)
}

/// Concatenated text nodes that are direct children of `element`
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect()
}

/// Direct text nodes of `element`, one entry per node
fn own_text_nodes<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> + 'a {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
}

fn child_elements<'a>(element: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == name)
}

fn resolve(src: &str, page_url: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    page_url.join(src).ok().map(String::from)
}

fn extract_title(document: &Html) -> String {
    let anchored = document
        .select(&H1_ANCHOR)
        .map(|a| a.text().collect::<String>().trim().to_string())
        .find(|text| !text.is_empty());

    anchored
        .or_else(|| {
            document
                .select(&H1)
                .map(|h1| own_text(h1).trim().to_string())
                .find(|text| !text.is_empty())
        })
        .unwrap_or_default()
}

fn extract_ingredients(document: &Html) -> Vec<IngredientSection> {
    let mut sections: Vec<IngredientSection> = Vec::new();

    for heading in document.select(&SECTION_HEADING) {
        let name = own_text(heading).trim().to_string();
        if name.is_empty() {
            continue;
        }

        let Some(list) = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|sibling| sibling.value().name() == "ul")
        else {
            continue;
        };

        let items: Vec<Ingredient> = child_elements(list, "li")
            .filter_map(|item| {
                let mut spans = item
                    .select(&SPAN)
                    .map(|span| own_text(span).trim().to_string())
                    .filter(|text| !text.is_empty());
                let name = spans.next()?;
                let amount = spans.next()?;
                Some(Ingredient { name, amount })
            })
            .collect();

        if items.is_empty() {
            continue;
        }

        // A repeated heading extends the section where it first appeared
        match sections.iter_mut().find(|section| section.name == name) {
            Some(section) => section.items.extend(items),
            None => sections.push(IngredientSection { name, items }),
        }
    }

    sections
}

/// Step text without its leading "N." numbering
fn strip_step_number(text: &str) -> &str {
    match text.split_once('.') {
        Some((_, rest)) => rest.trim(),
        None => text.trim(),
    }
}

fn extract_steps(document: &Html, page_url: &Url) -> Vec<Step> {
    document
        .select(&STEP_ITEM)
        .filter_map(|item| {
            let raw = child_elements(item, "div")
                .next()
                .and_then(|div| own_text_nodes(div).map(str::trim).find(|t| !t.is_empty()))
                .unwrap_or("");
            let text = strip_step_number(raw);
            if text.is_empty() {
                return None;
            }

            let image_ref = child_elements(item, "img")
                .filter_map(|img| img.value().attr("data-src"))
                .find_map(|src| resolve(src, page_url));

            Some(Step {
                text: text.to_string(),
                image_ref,
                resolved_path: None,
            })
        })
        .collect()
}

fn extract_tips(document: &Html) -> Vec<String> {
    let mut tips = Vec::new();

    for block in document.select(&TEXTBOX) {
        let is_tip_block = block.select(&H3).any(|h3| {
            let heading: String = h3.text().collect();
            TIP_MARKERS.iter().any(|marker| heading.contains(marker))
        });
        if !is_tip_block {
            continue;
        }

        for div in block.select(&DIV).filter(|div| div.id() != block.id()) {
            for node in own_text_nodes(div) {
                tips.extend(
                    node.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }

    tips
}

fn extract_categories(document: &Html) -> Vec<String> {
    document
        .select(&TEXTBOX)
        .filter(|block| own_text(*block).contains(CATEGORY_MARKER))
        .flat_map(|block| {
            block
                .select(&ANCHOR)
                .map(|a| a.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
<html><body>
  <div class="row mb20"><img src="//i3.example.com/recipe/main_531604.jpg" alt="cover"></div>
  <h1><a href="/recipe/531604/">红烧肉</a></h1>
  <div class="rbox">
    <h5>主料</h5>
    <ul>
      <li><a href="/ingredient/1"><span>五花肉</span><span>500g</span></a></li>
      <li><span>姜</span><span>3片</span></li>
      <li><span>lonely</span></li>
    </ul>
    <h5>辅料</h5>
    <ul>
      <li><span>冰糖</span><span>适量</span></li>
    </ul>
    <h5>空的</h5>
    <ul><li><span>only one</span></li></ul>
  </div>
  <ul class="steplist">
    <li><div>1. 五花肉切块。</div><img data-src="https://i3.example.com/step/1.png" src="lazy.gif"></li>
    <li><div>2. 焯水</div></li>
    <li><div>3.</div><img data-src="https://i3.example.com/step/x.png"></li>
    <li><div>4. 小火炖一小时</div><img data-src="/step/4.webp"></li>
  </ul>
  <div class="textbox">
    <h3>小窍门</h3>
    <div>
      冰糖炒色更亮
      收汁要快
    </div>
  </div>
  <div class="textbox">分类：<a href="/recipe/category/rc/">热菜</a><a href="/recipe/category/jcc/">家常菜</a><a>热菜</a></div>
</body></html>
"#;

    fn detail_url() -> Url {
        Url::parse("https://m.example.com/recipe/531604/").unwrap()
    }

    #[test]
    fn test_full_page() {
        let record = parse_recipe(DETAIL_PAGE, &detail_url()).unwrap();

        assert_eq!(record.recipe_id, "531604");
        assert_eq!(record.title, "红烧肉");
        assert_eq!(record.detail_url, "https://m.example.com/recipe/531604/");
        assert_eq!(
            record.main_image_ref.as_deref(),
            Some("https://i3.example.com/recipe/main_531604.jpg")
        );
        assert_eq!(record.tips, vec!["冰糖炒色更亮", "收汁要快"]);
        assert_eq!(record.categories, vec!["热菜", "家常菜"]);
    }

    #[test]
    fn test_ingredient_sections_in_order() {
        let record = parse_recipe(DETAIL_PAGE, &detail_url()).unwrap();
        let names: Vec<&str> = record.ingredients.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["主料", "辅料"]);

        let main = record.section("主料").unwrap();
        assert_eq!(
            main.items,
            vec![
                Ingredient {
                    name: "五花肉".to_string(),
                    amount: "500g".to_string()
                },
                Ingredient {
                    name: "姜".to_string(),
                    amount: "3片".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_steps_strip_numbering_and_skip_empty() {
        let record = parse_recipe(DETAIL_PAGE, &detail_url()).unwrap();
        let texts: Vec<&str> = record.steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["五花肉切块。", "焯水", "小火炖一小时"]);

        assert_eq!(
            record.steps[0].image_ref.as_deref(),
            Some("https://i3.example.com/step/1.png")
        );
        assert_eq!(record.steps[1].image_ref, None);
        assert_eq!(
            record.steps[2].image_ref.as_deref(),
            Some("https://m.example.com/step/4.webp")
        );
        assert!(record.steps.iter().all(|s| s.resolved_path.is_none()));
    }

    #[test]
    fn test_repeated_heading_merges_into_first_section() {
        let html = r#"
<html><body><div class="rbox">
  <h5>主料</h5><ul><li><span>a</span><span>1</span></li></ul>
  <h5>辅料</h5><ul><li><span>c</span><span>3</span></li></ul>
  <h5>主料</h5><ul><li><span>b</span><span>2</span></li></ul>
</div></body></html>"#;
        let record = parse_recipe(html, &detail_url()).unwrap();

        let names: Vec<&str> = record.ingredients.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["主料", "辅料"]);
        let main: Vec<&str> = record
            .section("主料")
            .unwrap()
            .items
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(main, vec!["a", "b"]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ingredients"]["主料"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_step_image_must_be_direct_child() {
        let html = r#"
<html><body><ul class="steplist">
  <li><div>1. 切丝<img data-src="https://i3.example.com/step/inline.png"></div></li>
  <li><div>2. 装盘</div><p><img data-src="https://i3.example.com/step/wrapped.png"></p></li>
</ul></body></html>"#;
        let record = parse_recipe(html, &detail_url()).unwrap();

        assert_eq!(record.steps.len(), 2);
        assert!(record.steps.iter().all(|step| step.image_ref.is_none()));
    }

    #[test]
    fn test_title_falls_back_to_h1_text() {
        let html = "<html><body><h1> 清蒸鱼 <small>by cook</small></h1></body></html>";
        let record = parse_recipe(html, &detail_url()).unwrap();
        assert_eq!(record.title, "清蒸鱼");
    }

    #[test]
    fn test_page_without_ingredients() {
        let html = "<html><body><h1>白粥</h1></body></html>";
        let record = parse_recipe(html, &detail_url()).unwrap();
        assert!(record.ingredients.is_empty());
        assert!(record.steps.is_empty());
        assert!(record.main_image_ref.is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ingredients"], serde_json::json!({}));
    }

    #[test]
    fn test_step_without_number() {
        assert_eq!(strip_step_number("  打散鸡蛋 "), "打散鸡蛋");
        assert_eq!(strip_step_number("12.加盐. 出锅"), "加盐. 出锅");
    }

    #[test]
    fn test_recipe_id_from_requested_url() {
        let a = parse_recipe(DETAIL_PAGE, &detail_url()).unwrap();
        let b = parse_recipe("<html><h1>other</h1></html>", &detail_url()).unwrap();
        assert_eq!(a.recipe_id, b.recipe_id);
    }

    #[test]
    fn test_failures() {
        let url = detail_url();
        assert!(matches!(
            extract_recipe(&[0xff, 0xfe, 0x00], &url),
            Err(ParseFailure::NotUtf8 { .. })
        ));
        assert!(matches!(
            parse_recipe("   \n ", &url),
            Err(ParseFailure::EmptyDocument { .. })
        ));

        let no_id = Url::parse("https://m.example.com/about/").unwrap();
        assert!(matches!(
            parse_recipe(DETAIL_PAGE, &no_id),
            Err(ParseFailure::MissingRecipeId { .. })
        ));
    }
}
