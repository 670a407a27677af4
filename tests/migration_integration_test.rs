use httpmock::prelude::*;
use serde_json::{json, Value};
use std::io::Cursor;
use wp_shopify_migrate::{
    FileConfig, MigrationContext, MigrationError, MigrationReport, MigrationSettings, Migrator,
    SettingsOverrides,
};

const ADMIN: &str = "/admin/api/2023-10";

fn admin(path: &str) -> String {
    format!("{}/{}", ADMIN, path)
}

fn settings(server: &MockServer, overrides: SettingsOverrides) -> MigrationSettings {
    let toml = format!(
        r#"
[source]
endpoint = "{}"

[shopify]
store = "shop.myshopify.com"
access_token = "shpat_test"
base_url = "{}"

[migration]
record_delay_secs = 0.0
"#,
        server.url("/graphql"),
        server.url(ADMIN)
    );
    let file = FileConfig::from_toml_str(&toml).unwrap();
    MigrationSettings::resolve(file, overrides).unwrap()
}

async fn run(server: &MockServer, overrides: SettingsOverrides) -> Result<MigrationReport, MigrationError> {
    let ctx = MigrationContext::from_settings(settings(server, overrides)).unwrap();
    Migrator::new(ctx).run().await
}

fn post(slug: &str, content: &str) -> Value {
    json!({
        "id": format!("post-{}", slug),
        "title": slug.replace('-', " "),
        "content": content,
        "excerpt": "",
        "date": "2023-05-01T10:00:00",
        "slug": slug,
        "author": { "node": { "name": "Ana" } },
        "categories": { "nodes": [{ "name": "News" }] },
        "tags": { "nodes": [] },
        "featuredImage": null
    })
}

fn page(posts: Vec<Value>, has_next_page: bool, end_cursor: Option<&str>) -> Value {
    json!({
        "data": {
            "posts": {
                "pageInfo": { "hasNextPage": has_next_page, "endCursor": end_cursor },
                "nodes": posts
            }
        }
    })
}

/// Blog 7 with handle `news` holding the given article handles.
fn mock_blog(server: &MockServer, existing: &[&str]) {
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs.json"));
        then.status(200)
            .json_body(json!({ "blogs": [{ "id": 7, "handle": "news" }] }));
    });
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs/7.json"));
        then.status(200)
            .json_body(json!({ "blog": { "id": 7, "handle": "news" } }));
    });

    let articles: Vec<Value> = existing
        .iter()
        .enumerate()
        .map(|(i, handle)| json!({ "id": i + 1, "handle": handle }))
        .collect();
    let last_id = existing.len();
    server.mock(|when, then| {
        when.method(GET)
            .path(admin("blogs/7/articles.json"))
            .query_param("since_id", "0");
        then.status(200).json_body(json!({ "articles": articles }));
    });
    if last_id > 0 {
        server.mock(|when, then| {
            when.method(GET)
                .path(admin("blogs/7/articles.json"))
                .query_param("since_id", last_id.to_string());
            then.status(200).json_body(json!({ "articles": [] }));
        });
    }
}

fn created(handle: &str) -> Value {
    json!({ "article": { "id": 100, "handle": handle, "blog": { "handle": "news" } } })
}

fn numbered_posts(range: std::ops::RangeInclusive<usize>) -> Vec<Value> {
    range
        .map(|i| post(&format!("post-{}", i), "<p>Body</p>"))
        .collect()
}

#[tokio::test]
async fn test_existing_handles_are_skipped_and_new_posts_migrated() {
    let server = MockServer::start();
    mock_blog(&server, &["hello-world"]);

    let source = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(page(
            vec![
                post("hello-world", "<p>Already there</p>"),
                post("first-post", r#"<p>New</p><div class="shortcode">gallery</div>"#),
            ],
            false,
            Some("c1"),
        ));
    });
    let skipped_article = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .body_contains(r#""handle":"hello-world""#);
        then.status(201).json_body(created("hello-world"));
    });
    let new_article = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .header("X-Shopify-Access-Token", "shpat_test")
            .body_contains(r#""handle":"first-post""#)
            .body_contains(r#""tags":"News""#);
        then.status(201).json_body(created("first-post"));
    });
    let redirect = server.mock(|when, then| {
        when.method(POST)
            .path(admin("redirects.json"))
            .body_contains(r#""path":"/first-post/""#)
            .body_contains(r#""target":"/blogs/news/first-post""#);
        then.status(201)
            .json_body(json!({ "redirect": { "id": 1 } }));
    });

    let report = run(&server, SettingsOverrides::default()).await.unwrap();

    source.assert();
    skipped_article.assert_hits(0);
    new_article.assert();
    redirect.assert();
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.redirects_created, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_rejected_article_does_not_stop_the_run() {
    let server = MockServer::start();
    mock_blog(&server, &[]);

    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=3), false, None));
    });
    let rejected = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .body_contains(r#""handle":"post-2""#);
        then.status(422)
            .json_body(json!({ "errors": { "title": ["can't be blank"] } }));
    });
    let accepted = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .matches(|req| {
                let body = String::from_utf8_lossy(req.body.as_deref().unwrap_or_default());
                !body.contains(r#""handle":"post-2""#)
            });
        then.status(201).json_body(created("post"));
    });

    let overrides = SettingsOverrides {
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    rejected.assert();
    accepted.assert_hits(2);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.failed, 1);
}

fn mock_three_pages(server: &MockServer) -> [httpmock::Mock<'_>; 3] {
    let first = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains(r#""after":null"#);
        then.status(200)
            .json_body(page(numbered_posts(1..=2), true, Some("c2")));
    });
    let second = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains(r#""after":"c2""#);
        then.status(200)
            .json_body(page(numbered_posts(3..=4), true, Some("c4")));
    });
    let third = server.mock(|when, then| {
        when.method(POST).path("/graphql").body_contains(r#""after":"c4""#);
        then.status(200)
            .json_body(page(numbered_posts(5..=5), false, Some("c5")));
    });
    [first, second, third]
}

#[tokio::test]
async fn test_pages_are_followed_until_exhausted() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    let pages = mock_three_pages(&server);
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post"));
    });

    let overrides = SettingsOverrides {
        page_size: Some(2),
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    for mock in &pages {
        mock.assert();
    }
    articles.assert_hits(5);
    assert_eq!(report.migrated, 5);
    assert_eq!(report.pages_fetched, 3);
}

#[tokio::test]
async fn test_max_posts_stops_paging_early() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    let [first, second, third] = mock_three_pages(&server);
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post"));
    });

    let overrides = SettingsOverrides {
        page_size: Some(2),
        max_posts: Some(3),
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    first.assert();
    second.assert();
    third.assert_hits(0);
    articles.assert_hits(3);
    assert_eq!(report.migrated, 3);
    assert_eq!(report.pages_fetched, 2);
}

#[tokio::test]
async fn test_failed_redirect_keeps_article() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=2), false, None));
    });
    server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post"));
    });
    let redirects = server.mock(|when, then| {
        when.method(POST).path(admin("redirects.json"));
        then.status(422)
            .json_body(json!({ "errors": { "path": ["has already been taken"] } }));
    });

    let report = run(&server, SettingsOverrides::default()).await.unwrap();

    redirects.assert_hits(2);
    assert_eq!(report.migrated, 2);
    assert_eq!(report.redirects_created, 0);
    assert_eq!(report.redirect_failures, 2);
}

#[tokio::test]
async fn test_missing_blog_aborts_before_reading_posts() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs.json"));
        then.status(200).json_body(json!({ "blogs": [] }));
    });
    let create_blog = server.mock(|when, then| {
        when.method(POST).path(admin("blogs.json"));
        then.status(403).json_body(json!({ "errors": "forbidden" }));
    });
    let source = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(page(vec![], false, None));
    });

    let err = run(&server, SettingsOverrides::default()).await.unwrap_err();

    create_blog.assert();
    source.assert_hits(0);
    assert!(matches!(err, MigrationError::BlogUnavailable { .. }));
    assert!(err.is_fatal());
}

fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[tokio::test]
async fn test_media_is_rehosted_before_the_article_is_written() {
    let server = MockServer::start();
    mock_blog(&server, &[]);

    let photo_url = server.url("/media/photo.png");
    let mut with_images = post(
        "gallery",
        &format!(
            r#"<p><img src="{0}"></p><p><img src="{0}" alt="again"></p>"#,
            photo_url
        ),
    );
    with_images["featuredImage"] = json!({ "node": { "sourceUrl": photo_url } });

    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(vec![with_images], false, None));
    });
    let download = server.mock(|when, then| {
        when.method(GET).path("/media/photo.png");
        then.status(200)
            .header("Content-Type", "image/png")
            .body(tiny_png());
    });
    let upload = server.mock(|when, then| {
        when.method(POST)
            .path(admin("files.json"))
            .body_contains(r#""filename":"photo.png""#);
        then.status(201)
            .json_body(json!({ "file": { "url": "https://cdn.shopify.test/photo.png" } }));
    });
    let article = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .body_contains(r#""src":"https://cdn.shopify.test/photo.png""#)
            .matches(|req| {
                let body = String::from_utf8_lossy(req.body.as_deref().unwrap_or_default());
                !body.contains("/media/photo.png")
            });
        then.status(201).json_body(created("gallery"));
    });

    let overrides = SettingsOverrides {
        upload_media: true,
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    // once for the repeated inline image, once for the featured image
    download.assert_hits(2);
    upload.assert_hits(2);
    article.assert();
    assert_eq!(report.migrated, 1);
    assert_eq!(report.image_failures, 0);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=3), false, None));
    });
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post"));
    });

    let overrides = SettingsOverrides {
        dry_run: true,
        max_posts: Some(2),
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    articles.assert_hits(0);
    assert_eq!(report.planned, 2);
    assert_eq!(report.migrated, 0);
}

#[tokio::test]
async fn test_throttled_article_is_given_up_after_retry_cap() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=1), false, None));
    });
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(429)
            .header("Retry-After", "0")
            .body("Exceeded 2 calls per second for api client");
    });

    let overrides = SettingsOverrides {
        max_throttle_retries: Some(2),
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    articles.assert_hits(3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.migrated, 0);
}

#[tokio::test]
async fn test_source_errors_end_the_run_quietly() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(json!({ "errors": [{ "message": "Internal server error" }] }));
    });

    let report = run(&server, SettingsOverrides::default()).await.unwrap();

    assert_eq!(report, MigrationReport::default());
}

fn mock_blog_with_unreadable_handle(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs.json"));
        then.status(200)
            .json_body(json!({ "blogs": [{ "id": 7, "handle": "news" }] }));
    });
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs/7.json"));
        then.status(200).body("<html>maintenance</html>");
    });
    server.mock(|when, then| {
        when.method(GET).path(admin("blogs/7/articles.json"));
        then.status(200).json_body(json!({ "articles": [] }));
    });
}

#[tokio::test]
async fn test_unreadable_blog_handle_is_tolerated_without_redirects() {
    let server = MockServer::start();
    mock_blog_with_unreadable_handle(&server);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=1), false, None));
    });
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post-1"));
    });

    let overrides = SettingsOverrides {
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    articles.assert();
    assert_eq!(report.migrated, 1);
}

#[tokio::test]
async fn test_unreadable_blog_handle_is_fatal_with_redirects() {
    let server = MockServer::start();
    mock_blog_with_unreadable_handle(&server);
    let source = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(page(vec![], false, None));
    });

    let err = run(&server, SettingsOverrides::default()).await.unwrap_err();

    source.assert_hits(0);
    assert!(matches!(err, MigrationError::BlogUnavailable { .. }));
}

#[tokio::test]
async fn test_missing_cursor_stops_paging() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    let source = server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200)
            .json_body(page(numbered_posts(1..=2), true, None));
    });
    let articles = server.mock(|when, then| {
        when.method(POST).path(admin("blogs/7/articles.json"));
        then.status(201).json_body(created("post"));
    });

    let overrides = SettingsOverrides {
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    source.assert_hits(1);
    articles.assert_hits(2);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.migrated, 2);
}

#[tokio::test]
async fn test_slug_repeated_by_the_source_is_written_once() {
    let server = MockServer::start();
    mock_blog(&server, &[]);
    server.mock(|when, then| {
        when.method(POST).path("/graphql");
        then.status(200).json_body(page(
            vec![
                post("repeat", "<p>First copy</p>"),
                post("repeat", "<p>Second copy</p>"),
                post("other", "<p>Other</p>"),
            ],
            true,
            None,
        ));
    });
    let repeated = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .body_contains(r#""handle":"repeat""#);
        then.status(201).json_body(created("repeat"));
    });
    let other = server.mock(|when, then| {
        when.method(POST)
            .path(admin("blogs/7/articles.json"))
            .body_contains(r#""handle":"other""#);
        then.status(201).json_body(created("other"));
    });

    let overrides = SettingsOverrides {
        no_redirects: true,
        ..Default::default()
    };
    let report = run(&server, overrides).await.unwrap();

    repeated.assert_hits(1);
    other.assert();
    assert_eq!(report.migrated, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.pages_fetched, 1);
}
