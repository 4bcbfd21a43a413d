//! Item fixtures, test content generators and mock server setup

use image::{ImageFormat, RgbImage};
use image_dl::{Image, ImageInfo, Size};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Known MD5 of the test item
pub const KNOWN_MD5: &str = "1bc29b36f623ba82aaf6724fd3b16718";

/// Server paths of the test item's size variants
pub const FULL_PATH: &str = "/img/oldfilename.jpg";
/// Sample variant path
pub const SAMPLE_PATH: &str = "/sample/oldfilename.jpg";
/// Preview variant path
pub const PREVIEW_PATH: &str = "/preview/oldfilename.jpg";
/// Item page path (relative page URL)
pub const PAGE_PATH: &str = "/posts/7331";

/// Page document served for tag loading
pub const PAGE_JSON: &str = r#"{
    "tags": [
        {"name": "to_heart_2", "category": "copyright"},
        {"name": "tag1", "category": "general"},
        {"name": "tag2"},
        {"name": "tag3"}
    ],
    "rating": "safe",
    "created_at": "2024-05-06T07:08:09Z"
}"#;

/// Encode a blank image
pub fn encode(format: ImageFormat, width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap_or_else(|e| panic!("failed to encode test image: {e}"));
    buf
}

/// 1x1 JPEG
pub fn jpeg_bytes() -> Vec<u8> {
    encode(ImageFormat::Jpeg, 1, 1)
}

/// 2x3 PNG
pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png, 2, 3)
}

/// The test item (id 7331) pointing at `server`
pub fn test_image(server: &MockServer, known_md5: bool, tags: &[&str]) -> Arc<Image> {
    let base = server.uri();
    Arc::new(Image::new(ImageInfo {
        id: "7331".into(),
        md5: known_md5.then(|| KNOWN_MD5.to_string()),
        ext: "jpg".into(),
        urls: BTreeMap::from([
            (Size::Full, format!("{base}{FULL_PATH}")),
            (Size::Sample, format!("{base}{SAMPLE_PATH}")),
            (Size::Preview, format!("{base}{PREVIEW_PATH}")),
        ]),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        page_url: Some(PAGE_PATH.into()),
        ..Default::default()
    }))
}

/// Serve `body` with status 200 at `route`
pub async fn serve_bytes(server: &MockServer, route: &str, body: Vec<u8>, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("Content-Type", content_type),
        )
        .mount(server)
        .await;
}

/// Serve an empty response with `status` at `route`
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Serve the item page document
pub async fn serve_page(server: &MockServer) {
    serve_bytes(server, PAGE_PATH, PAGE_JSON.as_bytes().to_vec(), "application/json").await;
}

/// Paths requested from `server`, in order
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}
