//! Gemini REST backend.
//!
//! Images and text go through `generateContent`; videos are submitted with
//! `predictLongRunning` and tracked through the returned operation name.
use crate::config::ClientConfig;
use crate::error::{Result, ServiceError};
use crate::{
    GenerationBackend, ImageRequest, InlineImage, OperationHandle, OperationStatus, TextRequest,
    VideoJobRequest,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Reference images attached to a video job are always subject assets.
const REFERENCE_TYPE_ASSET: &str = "asset";

pub struct GeminiBackend {
    config: ClientConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| ServiceError::Transient(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base(), model.trim(), method)
    }

    fn operation_endpoint(&self, handle: &OperationHandle) -> String {
        format!("{}/v1beta/{}", self.base(), handle.0.trim_start_matches('/'))
    }

    /// POST a JSON payload and decode the JSON answer.
    async fn post_json<T: DeserializeOwned>(&self, url: &str, payload: &Value) -> Result<T> {
        let key = self.config.credential()?;
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key)
            .json(payload)
            .send()
            .await?;
        decode_response(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let key = self.config.credential()?;
        let response = self
            .client
            .get(url)
            .header("x-goog-api-key", key)
            .send()
            .await?;
        decode_response(response).await
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<InlineImage>> {
        let payload = image_payload(request);
        let url = self.model_endpoint(&request.model, "generateContent");
        debug!(model = %request.model, "requesting image");
        let response: GenerateContentResponse = self.post_json(&url, &payload).await?;
        response.inline_images()
    }

    async fn submit_video_job(&self, request: &VideoJobRequest) -> Result<OperationHandle> {
        let payload = video_payload(request);
        let url = self.model_endpoint(&request.model, "predictLongRunning");
        let response: OperationResponse = self.post_json(&url, &payload).await?;
        if response.name.trim().is_empty() {
            return Err(ServiceError::InvalidResponse(
                "video job accepted without an operation name".to_string(),
            ));
        }
        info!(
            model = %request.model,
            operation = %response.name,
            references = request.references.len(),
            "video job submitted"
        );
        Ok(OperationHandle(response.name))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let response: OperationResponse = self.get_json(&self.operation_endpoint(handle)).await?;
        response.into_status()
    }

    async fn fetch_video(&self, locator: &str) -> Result<Vec<u8>> {
        let key = self.config.credential()?;
        let url = download_url(locator, &key)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Download {
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        info!(bytes = bytes.len(), "video downloaded");
        Ok(bytes.to_vec())
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<Option<String>> {
        let payload = text_payload(request);
        let url = self.model_endpoint(&request.model, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &payload).await?;
        Ok(response.text())
    }
}

/// The video locator with the credential appended as the `key` query parameter.
fn download_url(locator: &str, key: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(locator)
        .map_err(|err| ServiceError::InvalidResponse(format!("bad video locator: {err}")))?;
    url.query_pairs_mut().append_pair("key", key);
    Ok(url)
}

fn image_payload(request: &ImageRequest) -> Value {
    json!({
        "contents": [{
            "parts": [{ "text": request.prompt }]
        }],
        "generationConfig": {
            "imageConfig": { "aspectRatio": request.aspect_ratio }
        }
    })
}

fn video_payload(request: &VideoJobRequest) -> Value {
    let references: Vec<Value> = request
        .references
        .iter()
        .map(|image| {
            json!({
                "image": {
                    "bytesBase64Encoded": STANDARD.encode(&image.data),
                    "mimeType": image.mime_type,
                },
                "referenceType": REFERENCE_TYPE_ASSET,
            })
        })
        .collect();

    let mut instance = json!({ "prompt": request.prompt });
    if !references.is_empty() {
        instance["referenceImages"] = Value::Array(references);
    }

    json!({
        "instances": [instance],
        "parameters": {
            "sampleCount": request.config.number_of_videos,
            "resolution": request.config.resolution,
            "aspectRatio": request.config.aspect_ratio,
        }
    })
}

fn text_payload(request: &TextRequest) -> Value {
    let mut payload = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }]
        }]
    });
    if let Some(instruction) = request.system_instruction.as_deref() {
        payload["systemInstruction"] = json!({
            "parts": [{ "text": instruction }]
        });
    }
    payload
}

/// Turn an HTTP answer into `T`, or into a classified error.
async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }
    serde_json::from_str(&body)
        .map_err(|err| ServiceError::InvalidResponse(format!("{err}; raw: {body}")))
}

fn error_from_body(status: u16, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ServiceError::from_status(status, envelope.error.describe()),
        Err(_) => ServiceError::from_status(status, body.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        match (&self.status, self.code) {
            (Some(status), _) => format!("{status}: {}", self.message),
            (None, Some(code)) => format!("{code}: {}", self.message),
            (None, None) => self.message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default = "default_image_mime")]
    mime_type: String,
    data: String,
}

fn default_image_mime() -> String {
    "image/png".to_string()
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    fn inline_images(&self) -> Result<Vec<InlineImage>> {
        self.first_parts()
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .map(|inline| {
                let data = STANDARD.decode(inline.data.as_bytes()).map_err(|err| {
                    ServiceError::InvalidResponse(format!("inline image is not base64: {err}"))
                })?;
                Ok(InlineImage {
                    mime_type: inline.mime_type.clone(),
                    data,
                })
            })
            .collect()
    }

    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ApiError>,
    #[serde(default)]
    response: Option<Value>,
}

impl OperationResponse {
    fn into_status(self) -> Result<OperationStatus> {
        if let Some(error) = &self.error {
            let status = error.code.unwrap_or(500);
            return Err(ServiceError::from_status(status, error.describe()));
        }
        if !self.done {
            return Ok(OperationStatus::Running);
        }
        let video_uri = self.response.as_ref().and_then(first_video_uri);
        Ok(OperationStatus::Done { video_uri })
    }
}

/// Locate the first generated video in an operation response.
///
/// The REST surface nests samples under `generateVideoResponse.generatedSamples`;
/// the SDK-shaped `generatedVideos` list is accepted as well.
fn first_video_uri(response: &Value) -> Option<String> {
    let nested = response
        .get("generateVideoResponse")
        .and_then(|r| r.get("generatedSamples"));
    let flat = response.get("generatedVideos");
    nested
        .or(flat)
        .and_then(|samples| samples.get(0))
        .and_then(|sample| sample.get("video"))
        .and_then(|video| video.get("uri"))
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn backend_with_key(env: &str, key: &str) -> GeminiBackend {
        std::env::set_var(env, key);
        GeminiBackend::new(ClientConfig::new().with_credential_env(env)).unwrap()
    }

    /// Answer one HTTP request with `status_line` and hand back the request head.
    async fn serve_once(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            let answer =
                format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(answer.as_bytes()).await.unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn sample_video_request() -> VideoJobRequest {
        VideoJobRequest {
            model: "veo-3.1-generate-preview".to_string(),
            prompt: "Robo waves hello".to_string(),
            references: vec![InlineImage::png(vec![1, 2, 3])],
            config: Default::default(),
        }
    }

    #[test]
    fn test_endpoints() {
        let backend =
            GeminiBackend::new(ClientConfig::new().with_api_base("http://localhost:9000/")).unwrap();
        assert_eq!(
            backend.model_endpoint("gemini-2.5-flash-image", "generateContent"),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
        assert_eq!(
            backend.operation_endpoint(&OperationHandle("models/veo/operations/abc".to_string())),
            "http://localhost:9000/v1beta/models/veo/operations/abc"
        );
    }

    #[test]
    fn test_video_payload_carries_references_and_parameters() {
        let payload = video_payload(&sample_video_request());
        let instance = &payload["instances"][0];
        assert_eq!(instance["prompt"], "Robo waves hello");
        assert_eq!(instance["referenceImages"][0]["referenceType"], "asset");
        assert_eq!(
            instance["referenceImages"][0]["image"]["bytesBase64Encoded"],
            "AQID"
        );
        assert_eq!(payload["parameters"]["sampleCount"], 1);
        assert_eq!(payload["parameters"]["resolution"], "720p");
        assert_eq!(payload["parameters"]["aspectRatio"], "16:9");
    }

    #[test]
    fn test_text_payload_system_instruction() {
        let payload = text_payload(&TextRequest {
            model: "gemini-3-flash-preview".to_string(),
            system_instruction: Some("You are a teacher.".to_string()),
            prompt: "Bullying".to_string(),
        });
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "You are a teacher.");
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "Bullying");
    }

    #[test]
    fn test_inline_images_take_every_part_with_data() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": "AQID" } },
                        { "inlineData": { "data": "BAUG" } }
                    ]
                }
            }]
        }))
        .unwrap();

        let images = response.inline_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].data, vec![1, 2, 3]);
        assert_eq!(images[1].mime_type, "image/png");
    }

    #[test]
    fn test_no_candidates_means_no_images_and_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.inline_images().unwrap().is_empty());
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_operation_running_and_done() {
        let running: OperationResponse =
            serde_json::from_value(json!({ "name": "operations/1" })).unwrap();
        assert_eq!(running.into_status().unwrap(), OperationStatus::Running);

        let done: OperationResponse = serde_json::from_value(json!({
            "name": "operations/1",
            "done": true,
            "response": {
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": "https://files.example/v.mp4?alt=media" } }]
                }
            }
        }))
        .unwrap();
        assert_eq!(
            done.into_status().unwrap(),
            OperationStatus::Done {
                video_uri: Some("https://files.example/v.mp4?alt=media".to_string())
            }
        );
    }

    #[test]
    fn test_operation_done_without_video() {
        let done: OperationResponse =
            serde_json::from_value(json!({ "name": "operations/1", "done": true, "response": {} }))
                .unwrap();
        assert_eq!(
            done.into_status().unwrap(),
            OperationStatus::Done { video_uri: None }
        );
    }

    #[test]
    fn test_operation_error_is_classified() {
        let failed: OperationResponse = serde_json::from_value(json!({
            "name": "operations/1",
            "done": true,
            "error": { "code": 403, "message": "caller lacks access", "status": "PERMISSION_DENIED" }
        }))
        .unwrap();
        assert!(matches!(failed.into_status(), Err(ServiceError::Auth(_))));
    }

    #[test]
    fn test_error_body_classification() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert!(matches!(error_from_body(404, body), ServiceError::NotFound(_)));
        assert!(matches!(
            error_from_body(503, "upstream unavailable"),
            ServiceError::Transient(_)
        ));
    }

    #[test]
    fn test_download_url_appends_key() {
        let url = download_url("https://files.example/v1beta/files/abc:download?alt=media", "secret")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://files.example/v1beta/files/abc:download?alt=media&key=secret"
        );

        let bare = download_url("https://files.example/v.mp4", "secret").unwrap();
        assert_eq!(bare.query(), Some("key=secret"));
        assert!(matches!(
            download_url("not a url", "secret"),
            Err(ServiceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_video_non_success_is_download_error() {
        let backend = backend_with_key("TOONCRAFT_TEST_KEY_DOWNLOAD_500", "secret");
        let (base, request) = serve_once("500 Internal Server Error").await;

        let err = backend
            .fetch_video(&format!("{base}/v1beta/files/abc:download?alt=media"))
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::Download { status: 500 });

        let head = request.await.unwrap();
        assert!(head.starts_with("GET /v1beta/files/abc:download?alt=media&key=secret "));
    }

    #[tokio::test]
    async fn test_fetch_video_connection_failure_hides_key() {
        let backend = backend_with_key("TOONCRAFT_TEST_KEY_REFUSED", "AIzaSecret403xyz");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = backend
            .fetch_video(&format!("http://{addr}/v1beta/files/abc:download?alt=media"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transient(_)), "{err:?}");
        assert!(!err.is_access_class());
        assert!(!err.to_string().contains("AIzaSecret403xyz"));
    }
}
