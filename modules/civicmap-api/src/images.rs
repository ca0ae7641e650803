use serde::Deserialize;
use tracing::info;

use civicmap_common::{CivicMapError, Config};

/// Upload response from the image store.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedImage {
    #[serde(rename = "secure_url")]
    pub url: String,
    pub public_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default, rename = "bytes")]
    pub size: u64,
}

/// Client for the Cloudinary-compatible image store. Upload failures are
/// for the caller to degrade on (a photo-less issue), never to abort a
/// submission with.
#[derive(Clone)]
pub struct ImageStore {
    client: reqwest::Client,
    cloud_name: String,
    upload_preset: String,
    folder: String,
}

impl ImageStore {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: config.image_cloud_name.clone(),
            upload_preset: config.image_upload_preset.clone(),
            folder: "civicmap/issues".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty()
    }

    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadedImage, CivicMapError> {
        if !self.is_configured() {
            return Err(CivicMapError::ImageUpload(
                "image store not configured".to_string(),
            ));
        }

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder.clone())
            .text("tags", "civicmap,issue-report");

        let url = format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.cloud_name
        );
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CivicMapError::ImageUpload(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CivicMapError::ImageUpload(format!(
                "upload failed with {status}: {body}"
            )));
        }

        let uploaded: UploadedImage = resp
            .json()
            .await
            .map_err(|e| CivicMapError::ImageUpload(e.to_string()))?;
        info!(public_id = %uploaded.public_id, bytes = uploaded.size, "Image uploaded");
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_decodes_store_field_names() {
        let json = serde_json::json!({
            "secure_url": "https://res.example.com/image/upload/v1/abc.jpg",
            "public_id": "civicmap/issues/abc",
            "width": 1024,
            "height": 768,
            "bytes": 53200,
        });
        let uploaded: UploadedImage = serde_json::from_value(json).unwrap();
        assert_eq!(uploaded.public_id, "civicmap/issues/abc");
        assert_eq!(uploaded.size, 53200);
    }

    #[tokio::test]
    async fn unconfigured_store_fails_before_any_network_call() {
        let store = ImageStore {
            client: reqwest::Client::new(),
            cloud_name: String::new(),
            upload_preset: "civicmap".to_string(),
            folder: "civicmap/issues".to_string(),
        };
        let err = store.upload(vec![1, 2, 3], "photo.jpg").await.unwrap_err();
        assert!(matches!(err, CivicMapError::ImageUpload(_)));
    }
}
