use tracing::debug;

use crate::content::{self, ContentError};
use crate::contract::OutboundMessage;

/// Build the message for `content` addressed to `topic`.
///
/// Returns `Ok(None)` when either the topic or the content is blank: there
/// is nothing to publish, which is not an error. Malformed headers are
/// propagated as-is, with no partial message.
pub fn assemble(topic: &str, content: &str) -> Result<Option<OutboundMessage>, ContentError> {
    if topic.trim().is_empty() || content.trim().is_empty() {
        debug!(topic = %topic, "Blank topic or content, nothing to assemble");
        return Ok(None);
    }

    let Some(parts) = content::parse(content)? else {
        return Ok(None);
    };

    Ok(Some(OutboundMessage {
        topic: topic.to_string(),
        key: parts.key,
        headers: parts.headers.unwrap_or_default(),
        body: parts.body,
        // any partition will do, and the broker stamps the time
        partition: None,
        timestamp: None,
    }))
}
