//! Tag → topic taxonomy
//!
//! Drops carry free-form tags; personalization works on a small fixed set of
//! topics. Mapping is total: tags with no taxonomy entry are dropped.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Technology,
    Gaming,
    Music,
    Art,
    Sports,
    Science,
    Politics,
    Entertainment,
    Food,
    Travel,
    Fashion,
    Health,
    Finance,
    Education,
    Memes,
}

impl Topic {
    pub const ALL: [Topic; 15] = [
        Topic::Technology,
        Topic::Gaming,
        Topic::Music,
        Topic::Art,
        Topic::Sports,
        Topic::Science,
        Topic::Politics,
        Topic::Entertainment,
        Topic::Food,
        Topic::Travel,
        Topic::Fashion,
        Topic::Health,
        Topic::Finance,
        Topic::Education,
        Topic::Memes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Technology => "technology",
            Topic::Gaming => "gaming",
            Topic::Music => "music",
            Topic::Art => "art",
            Topic::Sports => "sports",
            Topic::Science => "science",
            Topic::Politics => "politics",
            Topic::Entertainment => "entertainment",
            Topic::Food => "food",
            Topic::Travel => "travel",
            Topic::Fashion => "fashion",
            Topic::Health => "health",
            Topic::Finance => "finance",
            Topic::Education => "education",
            Topic::Memes => "memes",
        }
    }
}

static TAG_TAXONOMY: Lazy<HashMap<&'static str, Topic>> = Lazy::new(|| {
    let entries: &[(Topic, &[&str])] = &[
        (
            Topic::Technology,
            &["tech", "coding", "programming", "ai", "software", "gadgets", "rust", "dev"],
        ),
        (
            Topic::Gaming,
            &["games", "videogames", "esports", "nintendo", "playstation", "xbox", "gamer"],
        ),
        (
            Topic::Music,
            &["songs", "concert", "hiphop", "rap", "rock", "pop", "jazz", "album"],
        ),
        (
            Topic::Art,
            &["drawing", "painting", "design", "illustration", "photography", "artist"],
        ),
        (
            Topic::Sports,
            &["football", "soccer", "basketball", "nba", "nfl", "tennis", "fitness", "gym"],
        ),
        (
            Topic::Science,
            &["space", "physics", "biology", "chemistry", "astronomy", "research"],
        ),
        (Topic::Politics, &["election", "government", "policy", "news"]),
        (
            Topic::Entertainment,
            &["movies", "film", "tv", "series", "anime", "celebrity", "netflix"],
        ),
        (Topic::Food, &["cooking", "recipe", "recipes", "foodie", "baking", "restaurant"]),
        (Topic::Travel, &["trip", "vacation", "adventure", "wanderlust", "roadtrip"]),
        (Topic::Fashion, &["style", "outfit", "ootd", "streetwear", "beauty", "makeup"]),
        (
            Topic::Health,
            &["wellness", "mentalhealth", "nutrition", "meditation", "selfcare"],
        ),
        (
            Topic::Finance,
            &["money", "crypto", "stocks", "investing", "bitcoin", "economy"],
        ),
        (Topic::Education, &["learning", "study", "school", "college", "books", "tutorial"]),
        (Topic::Memes, &["meme", "funny", "humor", "lol", "shitpost"]),
    ];

    let mut map = HashMap::new();
    for (topic, synonyms) in entries {
        map.insert(topic.as_str(), *topic);
        for tag in synonyms.iter() {
            map.insert(*tag, *topic);
        }
    }
    map
});

fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_ascii_lowercase()
}

/// Map raw tags to taxonomy topics, deduplicated, in first-seen order.
pub fn map_tags_to_topics<S: AsRef<str>>(tags: &[S]) -> Vec<Topic> {
    let mut topics = Vec::new();
    for tag in tags {
        let normalized = normalize_tag(tag.as_ref());
        if let Some(topic) = TAG_TAXONOMY.get(normalized.as_str()) {
            if !topics.contains(topic) {
                topics.push(*topic);
            }
        }
    }
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tags_dropped() {
        let topics = map_tags_to_topics(&["#Rust", "qwerty", "", "cooking"]);
        assert_eq!(topics, vec![Topic::Technology, Topic::Food]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let topics = map_tags_to_topics(&["nba", "coding", "Soccer", "AI"]);
        assert_eq!(topics, vec![Topic::Sports, Topic::Technology]);
    }

    #[test]
    fn test_topic_names_map_to_themselves() {
        for topic in Topic::ALL {
            assert_eq!(map_tags_to_topics(&[topic.as_str()]), vec![topic]);
        }
    }

    #[test]
    fn test_empty_input() {
        let empty: [&str; 0] = [];
        assert!(map_tags_to_topics(&empty).is_empty());
    }
}
