//! Cloudinary uploads for image and video worksheets.
//!
//! Requests are authenticated per Cloudinary's signed-upload scheme: the
//! alphabetically-sorted request params are concatenated with the API secret
//! and SHA-1 hashed, and the hex digest rides along as the `signature` field.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::multipart::{Form, Part};
use ring::digest;
use serde_json::Value;
use tracing::instrument;

use super::{StorageErr, StorageResult, UploadedFile};
use crate::constants::{CLOUDINARY_API_BASE, CLOUDINARY_FILE_FOLDER};
use crate::db::models::worksheet::StorageKind;
use crate::util::env::Var;
use crate::var;

/// Builds the signature for a signed Cloudinary request. `params` must hold
/// every param the request sends except `file`, `api_key` and `signature`
/// themselves; order does not matter, sorting happens here.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let hashed = digest::digest(
        &digest::SHA1_FOR_LEGACY_USE_ONLY,
        format!("{joined}{api_secret}").as_bytes(),
    );

    hex::encode(hashed.as_ref())
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn upload(filename: &str, bytes: Vec<u8>) -> StorageResult<UploadedFile> {
    upload_to(CLOUDINARY_FILE_FOLDER, filename, bytes).await
}

/// Same as [`upload`] but targets a specific folder; thumbnails land in their
/// own one.
#[instrument(skip(bytes), fields(size = bytes.len()))]
pub async fn upload_to(
    folder: &'static str,
    filename: &str,
    bytes: Vec<u8>,
) -> StorageResult<UploadedFile> {
    let cloud_name = var!(Var::CloudinaryCloudName).await?;
    let api_key = var!(Var::CloudinaryApiKey).await?;
    let api_secret = var!(Var::CloudinaryApiSecret).await?;

    let timestamp = unix_timestamp();
    let signature = sign_params(&[("folder", folder), ("timestamp", &timestamp)], api_secret);

    let form = Form::new()
        .part("file", Part::bytes(bytes).file_name(filename.to_string()))
        .text("api_key", api_key)
        .text("timestamp", timestamp)
        .text("folder", folder)
        .text("signature", signature);

    // `auto` lets cloudinary sort images from videos itself
    let uri = format!("{CLOUDINARY_API_BASE}/{cloud_name}/auto/upload");
    let body = send(reqwest::Client::new().post(uri).multipart(form)).await?;

    let url = body["secure_url"]
        .as_str()
        .ok_or(StorageErr::MalformedResponse("secure_url"))?
        .to_string();
    let public_id = body["public_id"]
        .as_str()
        .ok_or(StorageErr::MalformedResponse("public_id"))?
        .to_string();

    tracing::debug!(public_id, "cloudinary upload complete");

    Ok(UploadedFile {
        url,
        public_id,
        kind: StorageKind::Cloudinary,
    })
}

#[instrument]
pub async fn destroy(public_id: &str) -> StorageResult<()> {
    let cloud_name = var!(Var::CloudinaryCloudName).await?;
    let api_key = var!(Var::CloudinaryApiKey).await?;
    let api_secret = var!(Var::CloudinaryApiSecret).await?;

    let timestamp = unix_timestamp();
    let signature = sign_params(
        &[("public_id", public_id), ("timestamp", &timestamp)],
        api_secret,
    );

    let form = Form::new()
        .text("public_id", public_id.to_string())
        .text("api_key", api_key)
        .text("timestamp", timestamp)
        .text("signature", signature);

    let uri = format!("{CLOUDINARY_API_BASE}/{cloud_name}/image/destroy");
    send(reqwest::Client::new().post(uri).multipart(form)).await?;

    tracing::debug!("cloudinary destroy complete");
    Ok(())
}

async fn send(req: reqwest::RequestBuilder) -> StorageResult<Value> {
    let res = req.send().await?;
    let status = res.status();

    if !status.is_success() {
        let body = res.json::<Value>().await.unwrap_or_default();
        tracing::error!(code = %status, body = ?body, "non-2xx cloudinary response");
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
    fn test_sign_params_matches_known_digest() {
        // sha1("folder=worksheet-hub/files&timestamp=1700000000" + secret)
        let sig = sign_params(
            &[
                ("timestamp", "1700000000"),
                ("folder", "worksheet-hub/files"),
            ],
            "topsecret",
        );
        assert_eq!(sig, "bdf90b6042c7bddfaebbe08500a0445a6a0d5357");
    }

    #[test]
    fn test_sign_params_sorts_keys() {
        let forward = sign_params(&[("a", "1"), ("b", "2")], "s");
        let reversed = sign_params(&[("b", "2"), ("a", "1")], "s");
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_destroy_signature() {
        // sha1("public_id=worksheet-hub/files/abc&timestamp=1700000000" + secret)
        let sig = sign_params(
            &[
                ("public_id", "worksheet-hub/files/abc"),
                ("timestamp", "1700000000"),
            ],
            "topsecret",
        );
        assert_eq!(sig, "8541b13ca28c036651d9ecb9d2596e13e49c428c");
    }
}
