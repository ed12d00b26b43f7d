//! Utility functions for S3 request translation

use crate::backend::RepoRef;
use crate::error::{GatewayError, GatewayResult};
use percent_encoding::percent_decode_str;

/// Delimiter between owner and repository in a bucket segment
pub const BUCKET_DELIMITER: char = '@';

/// Parse a bucket segment into the repository it names
///
/// Splits on the first `@`; both halves must be non-empty.
///
/// Example: "alice@proj" → owner "alice", repo "proj"
pub fn parse_bucket(bucket: &str) -> GatewayResult<RepoRef> {
    match bucket.split_once(BUCKET_DELIMITER) {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(RepoRef {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }),
        _ => Err(GatewayError::InvalidBucketFormat),
    }
}

/// Wrap a content hash in double quotes for use as an ETag
pub fn quote_etag(sha: &str) -> String {
    format!("\"{}\"", sha)
}

/// Percent-decode a raw path segment
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_segment(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
