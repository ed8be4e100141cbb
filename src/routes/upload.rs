//! `POST /api/upload`: stores one image or video under the upload directory.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Buf;
use chrono::Utc;
use futures_util::TryStreamExt;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;
use warp::filters::multipart::{FormData, Part};
use warp::filters::BoxedFilter;
use warp::{Filter, Rejection, Reply};

use super::{with_state, AppState};
use crate::error::ApiError;

const MAX_UPLOAD: u64 = 1024 * 1024 * 1024;
const MAX_DIMENSION: u32 = 1920;
const JPEG_QUALITY: u8 = 80;

const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "mp4", "mov", "avi", "webm"];
const OPTIMIZED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "webp"];

/// Lowercased extension of the client's file name, without the dot.
fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn accepts(name: &str, mimetype: &str) -> bool {
    let ext_ok = extension(name).is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()));
    ext_ok && (mimetype.starts_with("image/") || mimetype.starts_with("video/"))
}

/// `<millis>-<random><.ext>`, keeping the original extension as sent.
fn stored_name(original: &str) -> String {
    let suffix = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}{}", Utc::now().timestamp_millis(), &random[..6], suffix)
}

/// Shrinks the image to fit `MAX_DIMENSION` and re-encodes it as JPEG in place.
/// Returns the new size on disk.
fn optimize_image(path: &Path) -> anyhow::Result<u64> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let img = if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };

    let mut temp = path.as_os_str().to_owned();
    temp.push(".temp");
    let temp = PathBuf::from(temp);

    let written = (|| -> anyhow::Result<()> {
        let mut writer = BufWriter::new(std::fs::File::create(&temp)?);
        let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        writer.flush()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp);
        return Err(e);
    }

    std::fs::rename(&temp, path)?;
    Ok(std::fs::metadata(path)?.len())
}

async fn save_part(part: Part, path: &Path) -> Result<u64, ApiError> {
    let failed = |e: &dyn std::fmt::Display| ApiError::internal("Upload failed", e.to_string());

    let mut file = tokio::fs::File::create(path).await.map_err(|e| failed(&e))?;
    let mut size = 0u64;
    let mut stream = Box::pin(part.stream());
    while let Some(mut chunk) = stream.try_next().await.map_err(|e| failed(&e))? {
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            file.write_all(bytes).await.map_err(|e| failed(&e))?;
            let n = bytes.len();
            size += n as u64;
            chunk.advance(n);
        }
    }
    file.flush().await.map_err(|e| failed(&e))?;
    Ok(size)
}

async fn store_file(part: Part, state: &AppState) -> Result<warp::reply::Json, Rejection> {
    let original = part.filename().unwrap_or_default().to_owned();
    let mimetype = part
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_owned();
    if !accepts(&original, &mimetype) {
        return Err(ApiError::bad_request(format!(
            "Invalid file type: {}. Only images and videos are allowed.",
            mimetype
        ))
        .into());
    }

    let dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal("Upload failed", e.to_string()))?;
    let filename = stored_name(&original);
    let path = dir.join(&filename);

    let received = match save_part(part, &path).await {
        Ok(size) => size,
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
    };

    let is_video = mimetype.starts_with("video/");
    let mut size = received;
    let optimizable = extension(&original).is_some_and(|e| OPTIMIZED_EXTENSIONS.contains(&e.as_str()));
    if !is_video && optimizable {
        let start = Instant::now();
        let target = path.clone();
        match tokio::task::spawn_blocking(move || optimize_image(&target)).await {
            Ok(Ok(optimized)) => {
                info!(
                    "optimized {}: {:.2}s, {:.1}KB -> {:.1}KB",
                    original,
                    start.elapsed().as_secs_f64(),
                    received as f64 / 1024.0,
                    optimized as f64 / 1024.0
                );
                size = optimized;
            }
            Ok(Err(e)) => warn!("image optimization failed for {}, keeping original: {:#}", original, e),
            Err(e) => warn!("image optimization task failed for {}: {}", original, e),
        }
    }

    info!(
        "file uploaded: {} ({:.2}MB) - {}",
        original,
        size as f64 / 1024.0 / 1024.0,
        if is_video { "VIDEO" } else { "IMAGE" }
    );
    Ok(warp::reply::json(&json!({
        "success": true,
        "message": "File uploaded successfully",
        "data": {
            "url": format!("/uploads/{}", filename),
            "filename": filename,
            "originalName": original,
            "type": if is_video { "video" } else { "image" },
            "mimetype": mimetype,
            "size": size,
        },
    })))
}

async fn upload(mut form: FormData, state: AppState) -> Result<impl Reply, Rejection> {
    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if part.name() == "file" && part.filename().is_some() {
            return store_file(part, &state).await;
        }
    }
    Err(ApiError::bad_request("No file uploaded").into())
}

pub fn routes(state: AppState) -> BoxedFilter<(impl Reply,)> {
    warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_UPLOAD))
        .and(with_state(state))
        .and_then(upload)
        .boxed()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};
    use warp::http::StatusCode;

    use super::*;
    use crate::routes::test_support::{body, config, state_with};

    const BOUNDARY: &str = "----plantspace";

    fn multipart(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        out.extend_from_slice(data);
        out.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        out
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([40, 160, 60]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn upload_request(body: Vec<u8>) -> warp::test::RequestBuilder {
        warp::test::request()
            .method("POST")
            .path("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
    }

    #[test]
    fn accepts_images_and_videos_only() {
        assert!(accepts("leaf.JPG", "image/jpeg"));
        assert!(accepts("clip.webm", "video/webm"));
        assert!(!accepts("notes.txt", "text/plain"));
        assert!(!accepts("leaf.png", "application/octet-stream"));
        assert!(!accepts("noext", "image/png"));
    }

    #[test]
    fn stored_name_keeps_extension() {
        let name = stored_name("Sprout.PNG");
        assert!(name.ends_with(".PNG"));
        let (millis, rest) = name.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest.len(), 6 + ".PNG".len());
    }

    #[tokio::test]
    async fn large_png_is_shrunk_and_reencoded() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().to_str().unwrap().to_owned();
        let api = routes(state_with(config(&["--upload-dir", &upload_dir])));

        let resp = upload_request(multipart("file", "bed.png", "image/png", &png(2400, 1200)))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::OK);
        let data = body(&resp)["data"].clone();
        assert_eq!(data["type"], "image");
        assert_eq!(data["originalName"], "bed.png");
        let filename = data["filename"].as_str().unwrap();
        assert_eq!(data["url"], format!("/uploads/{}", filename));

        let stored = dir.path().join(filename);
        let reader = ImageReader::open(&stored).unwrap().with_guessed_format().unwrap();
        assert_eq!(reader.format(), Some(ImageFormat::Jpeg));
        let img = reader.decode().unwrap();
        assert_eq!((img.width(), img.height()), (1920, 960));
        assert_eq!(data["size"], std::fs::metadata(&stored).unwrap().len());
    }

    #[tokio::test]
    async fn video_is_stored_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().to_str().unwrap().to_owned();
        let api = routes(state_with(config(&["--upload-dir", &upload_dir])));

        let resp = upload_request(multipart("file", "growth.mp4", "video/mp4", b"not really a video"))
            .reply(&api)
            .await;

        let data = body(&resp)["data"].clone();
        assert_eq!(data["type"], "video");
        assert_eq!(data["size"], 18);
    }

    #[tokio::test]
    async fn rejects_other_types() {
        let dir = tempfile::tempdir().unwrap();
        let upload_dir = dir.path().to_str().unwrap().to_owned();
        let api = crate::routes::routes(state_with(config(&["--upload-dir", &upload_dir])));

        let resp = upload_request(multipart("file", "notes.txt", "text/plain", b"hello"))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(&resp)["message"],
            "Invalid file type: text/plain. Only images and videos are allowed."
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_file_field() {
        let api = crate::routes::routes(state_with(config(&[])));
        let resp = upload_request(multipart("photo", "leaf.png", "image/png", &png(2, 2)))
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn oversized_upload_is_a_413() {
        let api = crate::routes::routes(state_with(config(&[])));
        let resp = upload_request(multipart("file", "leaf.png", "image/png", &png(2, 2)))
            .header("content-length", (MAX_UPLOAD + 1).to_string())
            .reply(&api)
            .await;

        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body(&resp)["message"], crate::error::UPLOAD_TOO_LARGE);
    }
}
