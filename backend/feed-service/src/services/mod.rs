//! Service layer for the drops feed
//!
//! - topics: tag to taxonomy mapping
//! - interests: per-user topic affinity
//! - decay: time and engagement decay multipliers
//! - posting_limiter: per-author throttle on new drops
//! - feed_assembler: ranking, pagination and first-page caching
//! - publisher: drop creation behind the posting limiter

pub mod cursor;
pub mod decay;
pub mod feed_assembler;
pub mod interests;
pub mod posting_limiter;
pub mod publisher;
pub mod topics;

pub use cursor::FeedCursor;
pub use decay::DecayCalculator;
pub use feed_assembler::FeedAssembler;
pub use interests::{InteractionKind, InterestProfile, InterestTracker, InterestWeights};
pub use posting_limiter::{PostingDecision, PostingLimiter, PostingPolicy};
pub use publisher::DropPublisher;
pub use topics::{map_tags_to_topics, Topic};
