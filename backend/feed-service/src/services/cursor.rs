use base64::{engine::general_purpose, Engine as _};
use uuid::Uuid;

/// Opaque pagination token: "served:segment:drop_id", base64url-encoded.
///
/// `drop_id` is the last item of the previous page. `served` is how many
/// ranked items the client has already seen and sizes the candidate pool of
/// the next request so deep pages still have items to show. `segment` pins
/// the ranking segment size chosen on the first page for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    pub served: usize,
    pub segment: usize,
    pub drop_id: Uuid,
}

impl FeedCursor {
    pub fn new(served: usize, segment: usize, drop_id: Uuid) -> Self {
        Self {
            served,
            segment,
            drop_id,
        }
    }

    pub fn encode(&self) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(format!(
            "{}:{}:{}",
            self.served, self.segment, self.drop_id
        ))
    }

    /// `None` for anything that is not a cursor we issued.
    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = general_purpose::URL_SAFE_NO_PAD.decode(raw.trim()).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let mut parts = text.splitn(3, ':');
        let served = parts.next()?.parse().ok()?;
        let segment = parts.next()?.parse().ok()?;
        let drop_id = Uuid::parse_str(parts.next()?).ok()?;
        Some(Self {
            served,
            segment,
            drop_id,
        })
    }
}
