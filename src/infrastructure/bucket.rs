use crate::domain::errors::AppError;
use roxmltree::{Document, Node};
use std::io::Read;
use std::time::Duration;

/// Result of requesting one object.
pub enum Fetched {
    Body(Box<dyn Read + Send>),
    /// Any response other than 200; recoverable for the caller.
    Status(u16),
}

/// Flat key/value store listed with S3 v1 `prefix`/`delimiter`/`marker` semantics.
pub trait ObjectStore {
    /// Raw XML of one listing page at `prefix`, one level deep.
    fn list(&self, prefix: &str, marker: Option<&str>) -> Result<String, AppError>;
    fn fetch(&self, key: &str) -> Result<Fetched, AppError>;
}

pub struct HttpBucket {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpBucket {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .build();
        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        HttpBucket { agent, base_url }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }
}

impl ObjectStore for HttpBucket {
    fn list(&self, prefix: &str, marker: Option<&str>) -> Result<String, AppError> {
        let mut request = self
            .agent
            .get(&self.base_url)
            .query("prefix", prefix)
            .query("delimiter", "/");
        if let Some(marker) = marker {
            request = request.query("marker", marker);
        }
        match request.call() {
            Ok(response) => Ok(response.into_string()?),
            Err(ureq::Error::Status(status, _)) => Err(AppError::ListingStatus {
                prefix: prefix.to_string(),
                status,
            }),
            Err(e) => Err(AppError::Http(Box::new(e))),
        }
    }

    fn fetch(&self, key: &str) -> Result<Fetched, AppError> {
        match self.agent.get(&self.object_url(key)).call() {
            Ok(response) if response.status() == 200 => {
                Ok(Fetched::Body(Box::new(response.into_reader())))
            }
            Ok(response) => Ok(Fetched::Status(response.status())),
            Err(ureq::Error::Status(status, _)) => Ok(Fetched::Status(status)),
            Err(e) => Err(AppError::Http(Box::new(e))),
        }
    }
}

/// One level of a delimiter listing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Object keys, with directory placeholders (`.../`) removed.
    pub keys: Vec<String>,
    pub prefixes: Vec<String>,
    /// Set only when the server reported a truncated page.
    pub next_marker: Option<String>,
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
        .and_then(|c| c.text())
        .map(str::to_string)
}

pub fn parse_listing(xml: &str) -> Result<ListingPage, AppError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    let mut page = ListingPage::default();
    let mut last_seen = None;

    for node in root.children().filter(Node::is_element) {
        match node.tag_name().name() {
            "Contents" => {
                if let Some(key) = child_text(node, "Key") {
                    if !key.ends_with('/') {
                        page.keys.push(key.clone());
                    }
                    last_seen = Some(key);
                }
            }
            "CommonPrefixes" => {
                if let Some(prefix) = child_text(node, "Prefix") {
                    page.prefixes.push(prefix.clone());
                    last_seen = Some(prefix);
                }
            }
            _ => {}
        }
    }

    if child_text(root, "IsTruncated").is_some_and(|t| t.trim() == "true") {
        page.next_marker = child_text(root, "NextMarker").or(last_seen);
    }
    Ok(page)
}
