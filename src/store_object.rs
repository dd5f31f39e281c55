//! Object-storage store variant.
//!
//! Lists and downloads objects from an S3-compatible endpoint (an internal
//! gateway, MinIO, LocalStack) using the plain REST API: `ListObjectsV2` XML
//! with continuation-token pagination, glob filtering on object keys, and
//! per-object GET for content. Authentication is the gateway's concern —
//! requests are unsigned and no credentials pass through here.
//!
//! HTTP status mapping onto the fetch taxonomy:
//!
//! | Status | Error |
//! |--------|-------|
//! | 404 | `NotFound` |
//! | 401, 403 | `PermissionDenied` |
//! | 429, 5xx, network | `Transient` |

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::GlobSet;
use reqwest::StatusCode;

use crate::config::ObjectStoreConfig;
use crate::error::FetchError;
use crate::models::DocumentDescriptor;
use crate::store::{build_globset, DocumentStore};

pub struct ObjectStore {
    config: ObjectStoreConfig,
    client: reqwest::Client,
    include: GlobSet,
    exclude: GlobSet,
}

impl ObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        let include = build_globset(&config.include_globs)?;
        let exclude = build_globset(&config.exclude_globs)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
            include,
            exclude,
        })
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint_url.trim_end_matches('/'),
            self.config.bucket
        )
    }

    /// Key with the configured prefix stripped, for glob matching.
    fn relative_key(&self, key: &str) -> String {
        if self.config.prefix.is_empty() {
            return key.to_string();
        }
        let prefix = self.config.prefix.trim_end_matches('/');
        key.strip_prefix(prefix)
            .map(|s| s.trim_start_matches('/').to_string())
            .unwrap_or_else(|| key.to_string())
    }

    async fn list_page(
        &self,
        continuation: Option<&str>,
    ) -> Result<ListPage, FetchError> {
        let mut query: Vec<(&str, String)> = vec![("list-type", "2".to_string())];
        if !self.config.prefix.is_empty() {
            query.push(("prefix", self.config.prefix.clone()));
        }
        if let Some(token) = continuation {
            query.push(("continuation-token", token.to_string()));
        }

        let response = self
            .client
            .get(self.bucket_url())
            .query(&query)
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unavailable(format!(
                "listing returned {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unavailable(e.to_string()))?;

        parse_list_response(&body)
            .map_err(|e| FetchError::Unavailable(format!("listing parse error: {}", e)))
    }
}

#[async_trait]
impl DocumentStore for ObjectStore {
    fn label(&self) -> &str {
        "object"
    }

    async fn list(&self) -> Result<Vec<DocumentDescriptor>, FetchError> {
        let mut descriptors = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self.list_page(continuation.as_deref()).await?;

            for object in page.objects {
                let rel_key = self.relative_key(&object.key);
                if self.exclude.is_match(&rel_key) {
                    continue;
                }
                if !self.include.is_match(&rel_key) {
                    continue;
                }

                let name = object
                    .key
                    .rsplit('/')
                    .next()
                    .unwrap_or(&object.key)
                    .to_string();

                descriptors.push(DocumentDescriptor {
                    id: object.key,
                    name,
                    modified: object.last_modified,
                    size: object.size,
                });
            }

            match page.next_continuation {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }

        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(descriptors)
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{}", self.bucket_url(), id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| FetchError::Transient(e.to_string())),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(FetchError::PermissionDenied(format!("{} on {}", status, id)))
            }
            s if s.as_u16() == 429 || s.is_server_error() => {
                Err(FetchError::Transient(format!("{} on {}", status, id)))
            }
            s => Err(FetchError::Unavailable(format!("{} on {}", status, id))),
        }
    }
}

// ── ListObjectsV2 XML parsing ──────────────────────────────────────────

struct ListedObject {
    key: String,
    last_modified: DateTime<Utc>,
    size: u64,
}

struct ListPage {
    objects: Vec<ListedObject>,
    truncated: bool,
    next_continuation: Option<String>,
}

/// Parse a `ListObjectsV2` XML response body.
fn parse_list_response(xml: &str) -> Result<ListPage, quick_xml::Error> {
    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        None,
        Key,
        LastModified,
        Size,
        IsTruncated,
        NextToken,
    }

    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut page = ListPage {
        objects: Vec::new(),
        truncated: false,
        next_continuation: None,
    };

    let mut in_contents = false;
    let mut field = Field::None;
    let mut key = String::new();
    let mut last_modified = DateTime::UNIX_EPOCH;
    let mut size = 0u64;

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"Contents" => {
                        in_contents = true;
                        key.clear();
                        last_modified = DateTime::UNIX_EPOCH;
                        size = 0;
                        Field::None
                    }
                    b"Key" if in_contents => Field::Key,
                    b"LastModified" if in_contents => Field::LastModified,
                    b"Size" if in_contents => Field::Size,
                    b"IsTruncated" => Field::IsTruncated,
                    b"NextContinuationToken" => Field::NextToken,
                    _ => Field::None,
                };
            }
            quick_xml::events::Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                match field {
                    Field::Key => key = text,
                    Field::LastModified => {
                        last_modified = DateTime::parse_from_rfc3339(&text)
                            .map(|dt| dt.with_timezone(&Utc))
                            .unwrap_or(DateTime::UNIX_EPOCH);
                    }
                    Field::Size => size = text.parse().unwrap_or(0),
                    Field::IsTruncated => page.truncated = text == "true",
                    Field::NextToken => page.next_continuation = Some(text),
                    Field::None => {}
                }
            }
            quick_xml::events::Event::End(e) => {
                if e.local_name().as_ref() == b"Contents" {
                    in_contents = false;
                    if !key.is_empty() {
                        page.objects.push(ListedObject {
                            key: std::mem::take(&mut key),
                            last_modified,
                            size,
                        });
                    }
                }
                field = Field::None;
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}
