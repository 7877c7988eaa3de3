//! Google Drive uploads for document worksheets (pdf, docx, pptx and the
//! rest of the non-media formats).
//!
//! Drive's multipart upload wants `multipart/related` with a JSON metadata
//! part followed by the raw media part, which is not the `form-data` flavor
//! reqwest's multipart builder emits, so the body is assembled by hand.

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Value, json};
use tracing::instrument;

use super::{StorageErr, StorageResult, UploadedFile};
use crate::constants::{GDRIVE_FILES_URL, GDRIVE_UPLOAD_URL};
use crate::db::models::worksheet::StorageKind;
use crate::util::env::Var;
use crate::var;

const RELATED_BOUNDARY: &str = "worksheet_hub_gdrive_boundary";

async fn bearer() -> StorageResult<String> {
    let token = var!(Var::GdriveAccessToken).await?;
    if token.is_empty() {
        return Err(StorageErr::DriveNotConnected);
    }

    Ok(format!("Bearer {token}"))
}

/// Assembles the `multipart/related` request body: metadata JSON first, the
/// file bytes second, closed by the final boundary.
fn build_related_body(metadata: &Value, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + 512);

    body.extend_from_slice(
        format!(
            "--{RELATED_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{RELATED_BOUNDARY}\r\nContent-Type: {mime}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{RELATED_BOUNDARY}--").as_bytes());

    body
}

#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn upload(filename: &str, mime: &str, bytes: Vec<u8>) -> StorageResult<UploadedFile> {
    let auth = bearer().await?;
    let metadata = json!({ "name": filename });
    let body = build_related_body(&metadata, mime, &bytes);

    let res = reqwest::Client::new()
        .post(GDRIVE_UPLOAD_URL)
        .header(AUTHORIZATION, &auth)
        .header(
            CONTENT_TYPE,
            format!("multipart/related; boundary={RELATED_BOUNDARY}"),
        )
        .body(body)
        .send()
        .await?;

    let body = check(res).await?;
    let file_id = body["id"]
        .as_str()
        .ok_or(StorageErr::MalformedResponse("id"))?
        .to_string();

    // freshly uploaded files are private to the drive account; open them up
    // so the download link works without a google login
    share_with_anyone(&auth, &file_id).await?;

    let url = match body["webContentLink"].as_str() {
        Some(link) => link.to_string(),
        None => format!("{GDRIVE_FILES_URL}/{file_id}?alt=media"),
    };

    tracing::debug!(file_id, "gdrive upload complete");

    Ok(UploadedFile {
        url,
        public_id: file_id,
        kind: StorageKind::Gdrive,
    })
}

#[instrument(skip(auth))]
async fn share_with_anyone(auth: &str, file_id: &str) -> StorageResult<()> {
    let res = reqwest::Client::new()
        .post(format!("{GDRIVE_FILES_URL}/{file_id}/permissions"))
        .header(AUTHORIZATION, auth)
        .json(&json!({ "role": "reader", "type": "anyone" }))
        .send()
        .await?;

    check(res).await.map(|_| ())
}

#[instrument]
pub async fn delete(file_id: &str) -> StorageResult<()> {
    let auth = bearer().await?;
    let res = reqwest::Client::new()
        .delete(format!("{GDRIVE_FILES_URL}/{file_id}"))
        .header(AUTHORIZATION, &auth)
        .send()
        .await?;

    let status = res.status();
    // 204 with an empty body on success
    if !status.is_success() {
        let body = res.json::<Value>().await.unwrap_or_default();
        tracing::error!(code = %status, body = ?body, "non-2xx gdrive response");
        return Err(StorageErr::UpstreamErr {
            status: status.as_u16(),
            body,
        });
    }

    tracing::debug!("gdrive delete complete");
    Ok(())
}

async fn check(res: reqwest::Response) -> StorageResult<Value> {
    let status = res.status();

    if !status.is_success() {
        let body = res.json::<Value>().await.unwrap_or_default();
        tracing::error!(code = %status, body = ?body, "non-2xx gdrive response");
        return Err(StorageErr::UpstreamErr {
            status: status.as_u16(),
            body,
        });
    }

    Ok(res.json::<Value>().await?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_related_body_layout() {
        let metadata = json!({ "name": "algebra.pdf" });
        let body = build_related_body(&metadata, "application/pdf", b"%PDF-1.7");
        let text = String::from_utf8(body).unwrap();

        assert!(text.starts_with(&format!("--{RELATED_BOUNDARY}\r\n")));
        assert!(text.contains("Content-Type: application/json; charset=UTF-8"));
        assert!(text.contains(r#"{"name":"algebra.pdf"}"#));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF-1.7"));
        assert!(text.ends_with(&format!("\r\n--{RELATED_BOUNDARY}--")));
    }

    #[test]
    fn test_media_part_follows_metadata() {
        let metadata = json!({ "name": "a.docx" });
        let body = build_related_body(&metadata, "application/msword", b"bytes");
        let text = String::from_utf8(body).unwrap();

        let meta_at = text.find("charset=UTF-8").unwrap();
        let media_at = text.find("application/msword").unwrap();
        assert!(meta_at < media_at);
    }
}
