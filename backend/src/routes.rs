use actix_files::NamedFile;
use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, delete, get, patch, post, web};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, bridge,
    error::AppError,
    ingest::{ProcessFileOptions, process_uploaded_file},
    models::{
        files::UploadResponse,
        nodes::{FileKind, Node},
    },
    names,
};

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(health).service(
        web::scope("/api")
            .service(list_folders)
            .service(get_folder)
            .service(create_folder)
            .service(rename_folder)
            .service(delete_folder)
            .service(get_folder_path)
            .service(get_folder_stats)
            .service(get_folder_contents)
            .service(list_files)
            .service(get_file)
            .service(get_file_content)
            .service(upload_file)
            .service(rename_file)
            .service(delete_file)
            .service(get_dashboard),
    );
}

#[get("/healthz")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "filedeck-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Deserialize)]
struct NameBody {
    name: Option<String>,
}

impl NameBody {
    fn required(self) -> Result<String, AppError> {
        let name = self.name.unwrap_or_default();
        names::clean_name(&name)
    }
}

fn success() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

#[get("/folders")]
async fn list_folders(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.all_folders())
}

#[get("/folders/{id}")]
async fn get_folder(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let folder = state
        .store
        .find_folder(&id)
        .ok_or_else(|| AppError::NotFound(format!("folder {id}")))?;
    Ok(HttpResponse::Ok().json(Node::Folder(folder)))
}

#[post("/folders/{id}")]
async fn create_folder(
    path: web::Path<String>,
    body: web::Json<NameBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let parent_id = path.into_inner();
    let name = body.into_inner().required()?;
    let folder = state.store.create_folder(&parent_id, &name)?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "id": folder.id })))
}

#[patch("/folders/{id}")]
async fn rename_folder(
    path: web::Path<String>,
    body: web::Json<NameBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let name = body.into_inner().required()?;
    state.store.rename_folder(&id, &name)?;
    Ok(success())
}

#[delete("/folders/{id}")]
async fn delete_folder(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    bridge::delete_folder(&state.store, &state.blobs, &id).await?;
    Ok(success())
}

#[get("/folders/{id}/path")]
async fn get_folder_path(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let crumbs = state.store.folder_path(&id);
    if crumbs.is_empty() {
        return Err(AppError::NotFound(format!("folder {id}")));
    }
    Ok(HttpResponse::Ok().json(crumbs))
}

#[get("/folders/{id}/stats")]
async fn get_folder_stats(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let stats = state.store.folder_stats(&id)?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/folders/{id}/contents")]
async fn get_folder_contents(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let contents = state.store.folder_contents(&id)?;
    Ok(HttpResponse::Ok().json(contents))
}

#[derive(Deserialize)]
struct FilesQuery {
    kind: Option<FileKind>,
}

#[get("/files")]
async fn list_files(query: web::Query<FilesQuery>, state: web::Data<AppState>) -> HttpResponse {
    let files = match query.into_inner().kind {
        Some(kind) => state.store.files_of_kind(kind),
        None => state.store.all_files(),
    };
    HttpResponse::Ok().json(files)
}

#[get("/files/{id}")]
async fn get_file(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let file = state
        .store
        .find_file(&id)
        .ok_or_else(|| AppError::NotFound(format!("file {id}")))?;
    Ok(HttpResponse::Ok().json(Node::File(file)))
}

#[get("/files/{id}/content")]
async fn get_file_content(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<NamedFile, AppError> {
    let id = path.into_inner();
    let file = state
        .store
        .find_file(&id)
        .ok_or_else(|| AppError::NotFound(format!("file {id}")))?;
    let blob = NamedFile::open_async(state.blobs.path_of(&file.name))
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound(format!("blob for file {id}")),
            _ => AppError::Io(err),
        })?;
    Ok(blob.disable_content_disposition())
}

#[post("/files/{id}")]
async fn upload_file(
    path: web::Path<String>,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let parent_id = path.into_inner();
    let mut display_name: Option<String> = None;
    let mut upload: Option<UploadedFile> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("multipart error: {err}")))?
    {
        let content_disposition = field.content_disposition().clone();
        let field_name = content_disposition.get_name().unwrap_or("").to_string();

        match field_name.as_str() {
            "name" => {
                display_name = Some(collect_text_field(&mut field).await?);
            }
            "file" => {
                let original_name = content_disposition
                    .get_filename()
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "upload".into());
                let content_type = field.content_type().map(|mime| mime.to_string());
                let bytes = collect_binary_field(&mut field).await?;
                upload = Some(UploadedFile {
                    original_name,
                    bytes,
                    content_type,
                });
            }
            _ => {
                // Ignore unknown fields
                collect_binary_field(&mut field).await?;
            }
        }
    }

    let upload = upload.ok_or_else(|| AppError::BadRequest("file is required".into()))?;

    let file = process_uploaded_file(ProcessFileOptions {
        store: &state.store,
        blobs: &state.blobs,
        parent_id: &parent_id,
        original_name: &upload.original_name,
        display_name: display_name.as_deref(),
        content_type: upload.content_type.as_deref(),
        bytes: &upload.bytes,
    })
    .await?;

    Ok(HttpResponse::Ok().json(UploadResponse {
        success: true,
        id: file.id,
        name: file.name,
        kind: file.kind,
    }))
}

#[patch("/files/{id}")]
async fn rename_file(
    path: web::Path<String>,
    body: web::Json<NameBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let name = body.into_inner().required()?;
    bridge::rename_file(&state.store, &state.blobs, &id, &name).await?;
    Ok(success())
}

#[delete("/files/{id}")]
async fn delete_file(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    bridge::delete_file(&state.store, &state.blobs, &id).await?;
    Ok(success())
}

#[get("/dashboard")]
async fn get_dashboard(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.dashboard())
}

struct UploadedFile {
    original_name: String,
    bytes: Vec<u8>,
    content_type: Option<String>,
}

async fn collect_text_field(field: &mut Field) -> Result<String, AppError> {
    let bytes = collect_binary_field(field).await?;
    let value = String::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest("field is not valid UTF-8".into()))?;
    Ok(value.trim().to_string())
}

async fn collect_binary_field(field: &mut Field) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|err| AppError::BadRequest(format!("failed to read field: {err}")))?
    {
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use serde_json::Value;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{blobs::BlobDir, store::TreeStore};

    fn state(dir: &TempDir) -> web::Data<AppState> {
        web::Data::new(AppState {
            store: TreeStore::load(dir.path().join("data.json")).unwrap(),
            blobs: BlobDir::new(dir.path().join("public")),
        })
    }

    const BOUNDARY: &str = "----filedeck-test-boundary";

    fn multipart_body(file_name: &str, content_type: &str, bytes: &[u8], name: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(name) = name {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(folder_id: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(&format!("/api/files/{folder_id}"))
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn folder_lifecycle() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(&dir)).configure(register)).await;

        let req = test::TestRequest::post()
            .uri("/api/folders/root")
            .set_json(json!({ "name": " Docs " }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["success"], true);
        let docs_id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/folders/{docs_id}"))
            .set_json(json!({ "name": "2024" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let year_id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/folders/{year_id}/path"))
            .to_request();
        let crumbs: Value = test::call_and_read_body_json(&app, req).await;
        let names: Vec<_> = crumbs
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["root", "Docs", "2024"]);

        let req = test::TestRequest::get().uri("/api/folders").to_request();
        let folders: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(folders[1]["displayName"], "Docs/2024");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/folders/{docs_id}"))
            .set_json(json!({ "name": "Papers" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/folders/{docs_id}"))
            .to_request();
        let folder: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(folder["name"], "Papers");
        assert_eq!(folder["type"], "folder");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/folders/{docs_id}"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri(&format!("/api/folders/{year_id}"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_web::test]
    async fn invalid_folder_requests() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(&dir)).configure(register)).await;

        let req = test::TestRequest::post()
            .uri("/api/folders/root")
            .set_json(json!({ "name": "   " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("invalid name"));

        let req = test::TestRequest::patch()
            .uri("/api/folders/missing")
            .set_json(json!({ "name": "x" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        let req = test::TestRequest::delete().uri("/api/folders/root").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::get()
            .uri("/api/folders/missing/path")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_web::test]
    async fn upload_rename_and_delete_file() {
        let dir = tempdir().unwrap();
        let data = state(&dir);
        let app = test::init_service(App::new().app_data(data.clone()).configure(register)).await;

        let mut ids = Vec::new();
        for expected in ["report.pdf", "report (1).pdf"] {
            let body = multipart_body("report.pdf", "application/pdf", b"%PDF", None);
            let uploaded: Value =
                test::call_and_read_body_json(&app, upload_request("root", body).to_request()).await;
            assert_eq!(uploaded["name"], expected);
            assert_eq!(uploaded["kind"], "document");
            ids.push(uploaded["id"].as_str().unwrap().to_string());
        }

        let body = multipart_body("IMG_1.JPG", "image/jpeg", b"\xff\xd8", Some("beach"));
        let uploaded: Value =
            test::call_and_read_body_json(&app, upload_request("root", body).to_request()).await;
        assert_eq!(uploaded["name"], "beach.jpg");
        assert_eq!(uploaded["kind"], "image");

        let req = test::TestRequest::get().uri("/api/files?kind=image").to_request();
        let images: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(images.as_array().unwrap().len(), 1);

        let req = test::TestRequest::patch()
            .uri(&format!("/api/files/{}", ids[1]))
            .set_json(json!({ "name": "report.pdf" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::BAD_REQUEST
        );

        let req = test::TestRequest::patch()
            .uri(&format!("/api/files/{}", ids[1]))
            .set_json(json!({ "name": "summary.pdf" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(data.blobs.exists("summary.pdf").await.unwrap());

        let req = test::TestRequest::get()
            .uri(&format!("/api/files/{}", ids[1]))
            .to_request();
        let file: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(file["name"], "summary.pdf");
        assert_eq!(file["parentId"], "root");

        let req = test::TestRequest::delete()
            .uri(&format!("/api/files/{}", ids[0]))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(!data.blobs.exists("report.pdf").await.unwrap());

        let req = test::TestRequest::get().uri("/api/dashboard").to_request();
        let dashboard: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(dashboard["totalFiles"], 2);
        assert_eq!(dashboard["kinds"]["images"], 1);
        assert_eq!(dashboard["kinds"]["documents"], 1);
    }

    #[actix_web::test]
    async fn upload_without_file_is_rejected() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(&dir)).configure(register)).await;

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nlonely\r\n--{BOUNDARY}--\r\n"
        );
        let resp = test::call_service(&app, upload_request("root", body.into_bytes()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = multipart_body("a.txt", "text/plain", b"hi", None);
        let resp = test::call_service(&app, upload_request("missing", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn folder_stats_and_contents() {
        let dir = tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(&dir)).configure(register)).await;

        let body = multipart_body("ab.txt", "text/plain", b"hi", None);
        test::call_service(&app, upload_request("root", body).to_request()).await;

        let req = test::TestRequest::get().uri("/api/folders/root/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["fileCount"], 1);
        assert_eq!(stats["size"], "6 KB");

        let req = test::TestRequest::get()
            .uri("/api/folders/root/contents")
            .to_request();
        let contents: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(contents["files"][0]["name"], "ab.txt");
        assert_eq!(contents["files"][0]["folder"]["id"], "root");

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
    }

    #[actix_web::test]
    async fn file_content_is_served_from_blob() {
        let dir = tempdir().unwrap();
        let data = state(&dir);
        let app = test::init_service(App::new().app_data(data.clone()).configure(register)).await;

        let pixels = b"\x89PNG\r\n\x1a\nfake";
        let body = multipart_body("cat.png", "image/png", pixels, None);
        let uploaded: Value =
            test::call_and_read_body_json(&app, upload_request("root", body).to_request()).await;
        let id = uploaded["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/files/{id}/content"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");
        assert_eq!(test::read_body(resp).await.as_ref(), pixels);

        let req = test::TestRequest::get()
            .uri("/api/files/ghost/content")
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );

        data.blobs.remove("cat.png").await.unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/api/files/{id}/content"))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[actix_web::test]
    async fn deleting_folder_removes_its_blobs() {
        let dir = tempdir().unwrap();
        let data = state(&dir);
        let app = test::init_service(App::new().app_data(data.clone()).configure(register)).await;

        let req = test::TestRequest::post()
            .uri("/api/folders/root")
            .set_json(json!({ "name": "Reports" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let folder_id = created["id"].as_str().unwrap().to_string();

        let body = multipart_body("q1.pdf", "application/pdf", b"%PDF", None);
        test::call_service(&app, upload_request(&folder_id, body).to_request()).await;
        assert!(data.blobs.exists("q1.pdf").await.unwrap());

        let req = test::TestRequest::delete()
            .uri(&format!("/api/folders/{folder_id}"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(!data.blobs.exists("q1.pdf").await.unwrap());

        let body = multipart_body("q1.pdf", "application/pdf", b"%PDF", None);
        let uploaded: Value =
            test::call_and_read_body_json(&app, upload_request("root", body).to_request()).await;
        assert_eq!(uploaded["name"], "q1.pdf");
    }
}
