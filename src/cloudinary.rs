//! Avatar storage on Cloudinary through its signed upload API.
use anyhow::Context;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};

use crate::configuration::CloudinarySettings;

pub struct CloudinaryClient {
    http_client: Client,
    api_base_url: String,
    delivery_base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: Secret<String>,
    folder: String,
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    version: u64,
}

impl CloudinaryClient {
    pub fn new(settings: CloudinarySettings, timeout: std::time::Duration) -> Self {
        let http_client = Client::builder().timeout(timeout).build().unwrap();
        Self {
            http_client,
            api_base_url: settings.api_base_url,
            delivery_base_url: settings.delivery_base_url,
            cloud_name: settings.cloud_name,
            api_key: settings.api_key,
            api_secret: settings.api_secret,
            folder: settings.folder,
        }
    }

    /// Public id of the avatar of the user registered as `email`.
    pub fn avatar_public_id(&self, email: &str) -> String {
        format!("{}/{}", self.folder, email)
    }

    /// Upload `image`, replacing any previous version stored under
    /// `public_id`, and return its 250x250 delivery URL.
    #[tracing::instrument(name = "Upload avatar to Cloudinary", skip(self, image))]
    pub async fn upload_avatar(
        &self,
        public_id: &str,
        content_type: &str,
        image: &[u8],
    ) -> Result<String, anyhow::Error> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("overwrite", "true"),
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
        ]);
        let file = format!("data:{};base64,{}", content_type, base64::encode(image));
        let url = format!(
            "{}/v1_1/{}/image/upload",
            self.api_base_url, self.cloud_name
        );

        let response: UploadResponse = self
            .http_client
            .post(&url)
            .form(&[
                ("file", file.as_str()),
                ("public_id", public_id),
                ("overwrite", "true"),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .context("Failed to reach Cloudinary")?
            .error_for_status()
            .context("Cloudinary rejected the upload")?
            .json()
            .await
            .context("Failed to parse the Cloudinary upload response")?;

        Ok(self.avatar_url(public_id, response.version))
    }

    pub fn avatar_url(&self, public_id: &str, version: u64) -> String {
        format!(
            "{}/{}/image/upload/c_fill,h_250,w_250/v{}/{}",
            self.delivery_base_url, self.cloud_name, version, public_id
        )
    }

    // Params sorted by name, joined as a query string, suffixed with the secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut params = params.to_vec();
        params.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");
        let digest = Sha256::digest(
            format!("{}{}", to_sign, self.api_secret.expose_secret()).as_bytes(),
        );
        hex::encode(digest)
    }
}
