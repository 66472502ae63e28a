//! End-to-end tests for the pdfdesk server API
//!
//! The router is driven through axum-test with fake rendering engines, so
//! no pdfium or tesseract installation is needed.

#[cfg(test)]
mod api_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use image::DynamicImage;
    use lopdf::{
        content::{Content, Operation},
        dictionary, Dictionary, Document, Object, Stream, StringFormat,
    };
    use pdfdesk_core::{OcrEngine, PdfDeskError, Rasterizer, RenderedPage, Toolbox};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::api::router;
    use crate::session::SessionStore;
    use crate::AppState;

    struct NoPdfium;

    impl Rasterizer for NoPdfium {
        fn render(&self, _: &[u8], _: &[u32], _: u32) -> Result<Vec<RenderedPage>, PdfDeskError> {
            Err(PdfDeskError::MissingDependency {
                name: "pdfium",
                hint: "set PDFDESK_PDFIUM_DIR".into(),
            })
        }
    }

    struct NoTesseract;

    impl OcrEngine for NoTesseract {
        fn recognize(&self, _: &DynamicImage) -> Result<String, PdfDeskError> {
            Err(PdfDeskError::MissingDependency {
                name: "tesseract",
                hint: "apt install tesseract-ocr".into(),
            })
        }
    }

    fn create_test_server() -> TestServer {
        let state = AppState {
            toolbox: Toolbox::new(Arc::new(NoPdfium), Arc::new(NoTesseract)),
            sessions: Arc::new(SessionStore::new(Duration::from_secs(600))),
        };
        TestServer::new(router(state, 8 * 1024 * 1024)).unwrap()
    }

    /// A PDF whose pages read "<prefix>-Page-<n>"
    fn sample_pdf(pages: u32, prefix: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let kids: Vec<Object> = (1..=pages)
            .map(|n| {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 12.into()]),
                        Operation::new("Td", vec![100.into(), 700.into()]),
                        Operation::new(
                            "Tj",
                            vec![Object::String(
                                format!("{}-Page-{}", prefix, n).into_bytes(),
                                StringFormat::Literal,
                            )],
                        ),
                        Operation::new("ET", vec![]),
                    ],
                };
                let content_id =
                    doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => content_id,
                    "Resources" => dictionary! {
                        "Font" => dictionary! { "F1" => font_id },
                    },
                });
                page_id.into()
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn file(name: &str, bytes: &[u8]) -> Value {
        json!({ "name": name, "data": STANDARD.encode(bytes) })
    }

    fn page_count(data_b64: &str) -> usize {
        let bytes = STANDARD.decode(data_b64).unwrap();
        Document::load_mem(&bytes).unwrap().get_pages().len()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let server = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "pdfdesk-server");
    }

    #[tokio::test]
    async fn test_index_serves_panel() {
        let server = create_test_server();
        let response = server.get("/").await;
        response.assert_status_ok();
        assert!(response.text().contains("pdfdesk"));
    }

    #[tokio::test]
    async fn test_tools_lists_every_tool() {
        let server = create_test_server();
        let json = server.get("/api/tools").await.json::<Value>();

        assert_eq!(json["count"], 13);
        assert_eq!(json["tools"][0]["id"], "merge");
        assert_eq!(json["tools"][12]["id"], "extract_invoice");
    }

    #[tokio::test]
    async fn test_inspect_reports_page_count() {
        let server = create_test_server();
        let pdf = sample_pdf(4, "A");
        let response = server
            .post("/api/inspect")
            .json(&json!({ "file": file("a.pdf", &pdf) }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        assert_eq!(json["name"], "a.pdf");
        assert_eq!(json["page_count"], 4);
        assert_eq!(json["file_size"], pdf.len());
        assert!(json["version"].is_string());
        assert_eq!(json["first_page_size"], json!([612.0, 792.0]));
        assert!(json.get("size_bytes").is_none());
    }

    #[tokio::test]
    async fn test_inspect_rejects_non_pdf() {
        let server = create_test_server();
        let response = server
            .post("/api/inspect")
            .json(&json!({ "file": file("notes.txt", b"hello") }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_PDF");
    }

    #[tokio::test]
    async fn test_merge_returns_combined_pdf() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({
                "command": {
                    "tool": "merge",
                    "files": [file("a.pdf", &sample_pdf(2, "A")), file("b.pdf", &sample_pdf(3, "B"))]
                }
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "merged_document.pdf");
        assert_eq!(json["mime_type"], "application/pdf");
        assert_eq!(json["metrics"]["page_count"], 5);
        assert_eq!(page_count(json["data"].as_str().unwrap()), 5);
    }

    #[tokio::test]
    async fn test_bad_range_is_a_400() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({
                "command": {
                    "tool": "extract_pages",
                    "file": file("a.pdf", &sample_pdf(3, "A")),
                    "pages": "2,9"
                }
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INVALID_RANGE");
        assert!(json["error"].as_str().unwrap().contains("Page 9 does not exist"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_a_400() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({ "command": { "tool": "teleport" } }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_pdfium_is_a_503_with_hint() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({
                "command": { "tool": "rasterize", "file": file("a.pdf", &sample_pdf(1, "A")) }
            }))
            .await;

        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let json = response.json::<Value>();
        assert_eq!(json["code"], "MISSING_DEPENDENCY");
        assert_eq!(json["hint"], "set PDFDESK_PDFIUM_DIR");
    }

    #[tokio::test]
    async fn test_medium_compression_degrades_without_pdfium() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({
                "command": {
                    "tool": "compress",
                    "file": file("a.pdf", &sample_pdf(2, "A")),
                    "tier": "medium"
                }
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        let notes: Vec<&str> = json["notes"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n.as_str())
            .collect();
        assert!(notes.iter().any(|n| n.contains("pdfium is not installed")));
    }

    #[tokio::test]
    async fn test_no_images_is_a_422() {
        let server = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({
                "command": { "tool": "extract_images", "file": file("a.pdf", &sample_pdf(1, "A")) }
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["code"], "NOTHING_FOUND");
    }

    #[tokio::test]
    async fn test_result_download_has_attachment_headers() {
        let server = create_test_server();
        let json = server
            .post("/api/process")
            .json(&json!({
                "command": {
                    "tool": "rotate",
                    "file": file("a.pdf", &sample_pdf(2, "A")),
                    "angle": 90
                }
            }))
            .await
            .json::<Value>();
        let session = json["session_id"].as_str().unwrap().to_string();

        let download = server.get(&format!("/api/session/{}/result", session)).await;
        download.assert_status_ok();
        assert_eq!(download.header("content-type"), "application/pdf");
        assert_eq!(
            download.header("content-disposition"),
            "attachment; filename=\"rotated_document.pdf\""
        );
        assert!(download.as_bytes().starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn test_failed_request_keeps_previous_result() {
        let server = create_test_server();
        let pdf = sample_pdf(3, "A");

        let first = server
            .post("/api/process")
            .json(&json!({
                "command": { "tool": "reorder", "file": file("a.pdf", &pdf), "order": "3,2,1" }
            }))
            .await
            .json::<Value>();
        let session = first["session_id"].as_str().unwrap().to_string();

        let failed = server
            .post("/api/process")
            .json(&json!({
                "session_id": session,
                "command": { "tool": "reorder", "file": file("a.pdf", &pdf), "order": "1,1,2" }
            }))
            .await;
        failed.assert_status(StatusCode::BAD_REQUEST);

        let download = server.get(&format!("/api/session/{}/result", session)).await;
        download.assert_status_ok();
        assert_eq!(
            download.header("content-disposition"),
            "attachment; filename=\"reordered_document.pdf\""
        );
    }

    #[tokio::test]
    async fn test_tool_switch_clears_previous_result() {
        let server = create_test_server();
        let pdf = sample_pdf(2, "A");

        let first = server
            .post("/api/process")
            .json(&json!({
                "command": { "tool": "rotate", "file": file("a.pdf", &pdf), "angle": 180 }
            }))
            .await
            .json::<Value>();
        let session = first["session_id"].as_str().unwrap().to_string();

        // Switch to another tool, which then fails
        server
            .post("/api/process")
            .json(&json!({
                "session_id": session,
                "command": { "tool": "split", "file": file("a.pdf", &pdf),
                             "mode": { "kind": "range", "start": 2, "end": 5 } }
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let download = server.get(&format!("/api/session/{}/result", session)).await;
        download.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(download.json::<Value>()["code"], "NO_RESULT");
    }

    #[tokio::test]
    async fn test_delete_session() {
        let server = create_test_server();
        let json = server
            .post("/api/process")
            .json(&json!({
                "command": { "tool": "extract_text", "file": file("a.pdf", &sample_pdf(1, "T")) }
            }))
            .await
            .json::<Value>();
        let session = json["session_id"].as_str().unwrap().to_string();
        assert!(json["preview"].as_str().unwrap().contains("--- Page 1 ---"));

        server
            .delete(&format!("/api/session/{}", session))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format!("/api/session/{}", session))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
