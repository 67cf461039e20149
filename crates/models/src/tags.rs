//! Tag criteria handling.
//!
//! The `tags` query parameter is a comma-separated list of `key|value`
//! pairs, a convenience form that is translated into the same unified
//! tag-query expression an explicit `tagQuery` parameter carries. A value
//! of `*` matches any value for the key.

use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("invalid tag criteria '{0}', expected key|value")]
pub struct InvalidTag(pub String);

/// Parse `key1|value1,key2|value2` into a map. A token without exactly one
/// pipe separator is a client error naming the token.
pub fn parse_tags(tags: &str) -> Result<BTreeMap<String, String>, InvalidTag> {
    let mut parsed = BTreeMap::new();
    for token in tags.split(',') {
        let mut fields = token.split('|');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(key), Some(value), None) if !key.is_empty() && !value.is_empty() => {
                parsed.insert(key.to_string(), value.to_string());
            }
            _ => return Err(InvalidTag(token.to_string())),
        }
    }
    Ok(parsed)
}

/// Translate parsed tags into the unified tag-query expression,
/// a conjunction of equality (or, for `*`, existence) terms.
pub fn tags_to_query(tags: &BTreeMap<String, String>) -> String {
    tags.iter()
        .map(|(key, value)| {
            if value == "*" {
                key.clone()
            } else {
                format!("{key} = '{value}'")
            }
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Evaluate a tag query against an entity's tags.
///
/// The full tag-query grammar belongs to the backing engine; this matcher
/// covers the conjunctive subset the `tags` parameter produces, which is
/// what the standalone store and the watch subsystem need.
pub fn matches_tag_query(query: &str, tags: &BTreeMap<String, String>) -> bool {
    query.split(" and ").all(|term| {
        let term = term.trim();
        match term.split_once('=') {
            Some((key, value)) => {
                let key = key.trim();
                let value = value.trim().trim_matches('\'');
                tags.get(key).is_some_and(|v| v == value)
            }
            None => tags.contains_key(term),
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_pairs_and_rejects_malformed_tokens() {
        let tags = parse_tags("env|prod,tier|web").unwrap();
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["tier"], "web");

        assert_eq!(parse_tags("env").unwrap_err(), InvalidTag("env".to_string()));
        assert_eq!(
            parse_tags("env|prod,a|b|c").unwrap_err(),
            InvalidTag("a|b|c".to_string())
        );
    }

    #[test]
    fn query_translation_round_trips() {
        let tags = parse_tags("env|prod,region|*").unwrap();
        assert_eq!(tags_to_query(&tags), "env = 'prod' and region");

        let mut entity_tags = BTreeMap::new();
        entity_tags.insert("env".to_string(), "prod".to_string());
        entity_tags.insert("region".to_string(), "us-east".to_string());
        assert!(matches_tag_query("env = 'prod' and region", &entity_tags));
        assert!(!matches_tag_query("env = 'staging'", &entity_tags));
        assert!(!matches_tag_query("missing", &entity_tags));
    }
}
