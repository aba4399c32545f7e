//! Integration tests for the harvester
//!
//! These tests use wiremock to create a mock recipe site and run the full
//! harvest cycle end-to-end: discovery, pagination, extraction, images and
//! record output.

use recipe_harvest::config::{Config, CrawlerConfig, OutputConfig, QuotaConfig, SiteConfig};
use recipe_harvest::crawler::Coordinator;
use recipe_harvest::storage::{RunStatus, SqliteStorage, Storage};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing every output into `dir`
fn create_test_config(base_url: &str, dir: &TempDir) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            user_agent: "TestBot/1.0".to_string(),
        },
        crawler: CrawlerConfig {
            workers: 4,
            max_requests_per_host: 4,
            delay_min_ms: 0,
            delay_max_ms: 0,
            retry_budget: 0,
            request_timeout_secs: 5,
            shutdown_timeout_secs: 1,
        },
        quota: QuotaConfig::default(),
        output: OutputConfig {
            records_path: dir.path().join("out/recipes.jsonl").display().to_string(),
            image_root: dir.path().join("images").display().to_string(),
            database_path: dir.path().join("harvest.db").display().to_string(),
            incremental: false,
        },
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

fn listing(ids: &[u32]) -> ResponseTemplate {
    let links: String = ids
        .iter()
        .map(|id| format!(r#"<li><a href="/recipe/{}/">recipe {}</a></li>"#, id, id))
        .collect();
    html(&format!(
        r#"<ul>{}</ul><a href="/recipe/category/rc/">back</a>"#,
        links
    ))
}

fn simple_detail(title: &str) -> ResponseTemplate {
    html(&format!(
        r#"<h1>{}</h1>
        <div class="rbox"><h5>主料</h5><ul><li><span>鸡蛋</span><span>2个</span></li></ul></div>
        <ul class="steplist"><li><div>1. 打散</div></li></ul>"#,
        title
    ))
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_root(server: &MockServer) {
    mount(
        server,
        "/recipe/",
        html(r#"<a href="/recipe/category/rc/">热菜</a><a href="/recipe/category/rc/">热菜</a>"#),
    )
    .await;
}

fn read_records(path: &str) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(|line| serde_json::from_str(line).expect("record line is valid JSON"))
        .collect()
}

fn record<'a>(records: &'a [Value], id: &str) -> &'a Value {
    records
        .iter()
        .find(|r| r["id"] == id)
        .unwrap_or_else(|| panic!("record {} not emitted", id))
}

async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

#[tokio::test]
async fn test_full_harvest_with_failing_step_image() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_root(&server).await;
    mount(&server, "/recipe/category/rc/1/", listing(&[101, 102])).await;
    mount(&server, "/recipe/category/rc/2/", html("<p>nothing here</p>")).await;

    let detail = format!(
        r#"<div class="row mb20"><img src="{base}/img/101/cover.jpg"></div>
        <h1><a href="/recipe/101/">番茄炒蛋</a></h1>
        <div class="rbox">
          <h5>主料</h5><ul><li><span>番茄</span><span>2个</span></li></ul>
          <h5>辅料</h5><ul><li><span>盐</span><span>少许</span></li></ul>
        </div>
        <ul class="steplist">
          <li><div>1. 番茄切块</div><img data-src="{base}/img/101/s0.jpg"></li>
          <li><div>2. 炒蛋</div><img data-src="{base}/img/101/s1.jpg"></li>
          <li><div>3. 合炒</div><img data-src="{base}/img/101/s2.png"></li>
        </ul>
        <div class="textbox">分类：<a>家常菜</a></div>"#,
        base = base
    );
    mount(&server, "/recipe/101/", html(&detail)).await;
    mount(&server, "/recipe/102/", simple_detail("蛋花汤")).await;

    let image = || ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]);
    mount(&server, "/img/101/cover.jpg", image()).await;
    mount(&server, "/img/101/s0.jpg", image()).await;
    mount(&server, "/img/101/s2.png", image()).await;
    // s1.jpg is not mounted and answers 404

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&base, &dir);
    let records_path = config.output.records_path.clone();
    let image_root = config.output.image_root.clone();
    let db_path = config.output.database_path.clone();

    let coordinator = Coordinator::new(config, "hash").expect("coordinator starts");
    let summary = coordinator
        .run_until(std::future::pending())
        .await
        .expect("harvest runs");

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.stats.listing_pages, 2);
    assert_eq!(summary.stats.detail_pages, 2);
    assert_eq!(summary.stats.records_emitted, 2);
    assert_eq!(summary.stats.images_succeeded, 3);
    assert_eq!(summary.stats.images_failed, 1);

    let records = read_records(&records_path);
    assert_eq!(records.len(), 2);

    let tomato = record(&records, "101");
    assert_eq!(tomato["recipe_id"], "101");
    assert_eq!(tomato["title"], "番茄炒蛋");
    assert_eq!(tomato["categories"], serde_json::json!(["家常菜"]));
    assert_eq!(
        tomato["main_image_resolved_path"],
        "recipe_images/101/main.jpg"
    );
    let steps = tomato["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["resolved_path"], "recipe_images/101/step_0.jpg");
    assert_eq!(steps[1]["resolved_path"], Value::Null);
    assert_eq!(steps[2]["resolved_path"], "recipe_images/101/step_2.png");

    let root = Path::new(&image_root);
    assert!(root.join("recipe_images/101/main.jpg").exists());
    assert!(root.join("recipe_images/101/step_0.jpg").exists());
    assert!(!root.join("recipe_images/101/step_1.jpg").exists());
    assert!(root.join("recipe_images/101/step_2.png").exists());

    let soup = record(&records, "102");
    assert_eq!(soup["ingredients"]["主料"][0]["name"], "鸡蛋");
    assert_eq!(soup["main_image_resolved_path"], Value::Null);

    let storage = SqliteStorage::new(Path::new(&db_path)).unwrap();
    assert_eq!(storage.count_recipes().unwrap(), 2);
    assert_eq!(storage.count_recipes_with_images().unwrap(), 1);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");
}

#[tokio::test]
async fn test_redirected_listing_stops_feed() {
    let server = MockServer::start().await;

    mount_root(&server).await;
    Mock::given(method("GET"))
        .and(path("/recipe/category/rc/1/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/recipe/category/rc/landing/"))
        .mount(&server)
        .await;
    mount(&server, "/recipe/category/rc/landing/", listing(&[555])).await;
    mount(&server, "/recipe/555/", simple_detail("never")).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);
    let records_path = config.output.records_path.clone();

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.stats.listing_pages, 1);
    assert_eq!(summary.stats.detail_pages, 0);
    assert!(read_records(&records_path).is_empty());

    let paths = requested_paths(&server).await;
    assert!(!paths.iter().any(|p| p == "/recipe/555/"));
    assert!(!paths.iter().any(|p| p == "/recipe/category/rc/2/"));
}

#[tokio::test]
async fn test_missing_listing_page_does_not_end_feed() {
    let server = MockServer::start().await;

    mount_root(&server).await;
    mount(&server, "/recipe/category/rc/1/", listing(&[61])).await;
    // Page 2 is not mounted and answers 404
    mount(&server, "/recipe/category/rc/3/", listing(&[63])).await;
    mount(&server, "/recipe/61/", simple_detail("麻婆豆腐")).await;
    mount(&server, "/recipe/63/", simple_detail("宫保鸡丁")).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), &dir);
    config.quota.default = 3;
    let records_path = config.output.records_path.clone();

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.stats.listing_pages, 2);
    assert_eq!(summary.stats.fetch_failures, 1);

    let mut ids: Vec<String> = read_records(&records_path)
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["61", "63"]);

    let paths = requested_paths(&server).await;
    assert!(paths.iter().any(|p| p == "/recipe/category/rc/2/"));
    assert!(paths.iter().any(|p| p == "/recipe/category/rc/3/"));
    assert!(!paths.iter().any(|p| p == "/recipe/category/rc/4/"));
}

#[tokio::test]
async fn test_quota_bounds_listing_pages() {
    let server = MockServer::start().await;

    mount_root(&server).await;
    mount(&server, "/recipe/category/rc/1/", listing(&[1, 2])).await;
    mount(&server, "/recipe/category/rc/2/", listing(&[3, 2])).await;
    mount(&server, "/recipe/category/rc/3/", listing(&[4])).await;
    for id in 1..=4 {
        mount(&server, &format!("/recipe/{}/", id), simple_detail("菜")).await;
    }

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&server.uri(), &dir);
    config.quota.default = 2;
    let records_path = config.output.records_path.clone();

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.stats.listing_pages, 2);
    assert_eq!(summary.stats.records_emitted, 3);
    // Recipe 2 appears on both pages but is fetched once
    assert!(summary.stats.duplicates_skipped >= 1);

    let mut ids: Vec<String> = read_records(&records_path)
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let paths = requested_paths(&server).await;
    assert!(!paths.iter().any(|p| p == "/recipe/category/rc/3/"));
    assert_eq!(paths.iter().filter(|p| *p == "/recipe/2/").count(), 1);
}

#[tokio::test]
async fn test_incremental_run_skips_known_recipes() {
    let server = MockServer::start().await;

    mount_root(&server).await;
    mount(&server, "/recipe/category/rc/1/", listing(&[7])).await;
    mount(&server, "/recipe/category/rc/2/", html("")).await;
    mount(&server, "/recipe/7/", simple_detail("炒饭")).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), &dir);
    let records_path = config.output.records_path.clone();

    let first = Coordinator::new(config.clone(), "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();
    assert_eq!(first.stats.records_emitted, 1);

    let mut incremental = config;
    incremental.output.incremental = true;
    let second = Coordinator::new(incremental, "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(second.stats.detail_pages, 0);
    assert_eq!(second.stats.records_emitted, 0);
    assert_eq!(read_records(&records_path).len(), 1);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_timeline_walker_follows_recipe_entries() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount(&server, "/recipe/", html("")).await;

    let page_one = serde_json::json!({
        "data": [
            {"type": "recipe", "remark": "菜谱", "wapurl": format!("{}/recipe/31/", base)},
            {"type": "recipe", "remark": "作品", "wapurl": format!("{}/recipe/32/", base)},
            {"type": "pai", "remark": "菜谱", "wapurl": format!("{}/recipe/33/", base)},
            {"type": "recipe", "remark": "菜谱", "wapurl": ""}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/ajax.php"))
        .and(query_param("op", "getTimeLineList"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_one))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ajax.php"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .mount(&server)
        .await;
    mount(&server, "/recipe/31/", simple_detail("鱼香肉丝")).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&base, &dir);
    config.quota.timeline = 5;
    let records_path = config.output.records_path.clone();

    let summary = Coordinator::new(config, "hash")
        .unwrap()
        .run_until(std::future::pending())
        .await
        .unwrap();

    assert_eq!(summary.stats.timeline_pages, 2);
    assert_eq!(summary.stats.records_emitted, 1);
    assert_eq!(read_records(&records_path)[0]["title"], "鱼香肉丝");

    let paths = requested_paths(&server).await;
    assert!(!paths.iter().any(|p| p == "/recipe/32/" || p == "/recipe/33/"));
}
