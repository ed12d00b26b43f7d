//! S3 XML response documents
//!
//! Both document kinds are rendered pretty-printed with a two-space indent and
//! an explicit `<?xml ...?>` declaration.

use crate::error::{GatewayError, GatewayResult};
use quick_xml::se::{QuoteLevel, Serializer};
use serde::Serialize;

/// S3 document namespace declared on `ListBucketResult`
pub const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// One `<Contents>` entry of a listing
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListEntry {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size")]
    pub size: u64,
    /// Present only on the explicit bucket listing
    #[serde(rename = "LastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// `ListBucketResult` document
#[derive(Debug, Clone, Serialize)]
pub struct ListBucketResult {
    #[serde(rename = "@xmlns")]
    pub xmlns: &'static str,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Prefix", skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(rename = "IsTruncated")]
    pub is_truncated: bool,
    #[serde(rename = "Contents")]
    pub contents: Vec<ListEntry>,
}

impl ListBucketResult {
    /// Untruncated listing; pagination is not supported
    pub fn new(name: impl Into<String>, prefix: Option<String>, contents: Vec<ListEntry>) -> Self {
        Self {
            xmlns: S3_XMLNS,
            name: name.into(),
            prefix,
            is_truncated: false,
            contents,
        }
    }

    pub fn to_xml(&self) -> GatewayResult<String> {
        render("ListBucketResult", self)
    }
}

/// S3 `Error` document
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDocument {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Key")]
    pub key: String,
}

impl ErrorDocument {
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self {
            code: "NoSuchKey".to_string(),
            message: "The specified key does not exist.".to_string(),
            key: key.into(),
        }
    }

    pub fn to_xml(&self) -> GatewayResult<String> {
        render("Error", self)
    }
}

fn render<T: Serialize>(root: &str, value: &T) -> GatewayResult<String> {
    let mut body = String::from(XML_DECLARATION);
    let mut serializer =
        Serializer::with_root(&mut body, Some(root)).map_err(|e| GatewayError::Xml(e.to_string()))?;
    serializer.indent(' ', 2);
    serializer.set_quote_level(QuoteLevel::Minimal);
    value
        .serialize(serializer)
        .map_err(|e| GatewayError::Xml(e.to_string()))?;
    Ok(body)
}
