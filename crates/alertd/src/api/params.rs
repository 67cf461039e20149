//! Access to the immutable, multi-valued query parameter map built once
//! per request. Single-valued parameters read the first occurrence;
//! repeats are ignored.

use std::collections::BTreeMap;

use super::ApiError;

pub type Params = BTreeMap<String, Vec<String>>;

pub fn first<'p>(params: &'p Params, name: &str) -> Option<&'p str> {
    params
        .get(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}

/// Parse an integer parameter. Absent means unconstrained; a value that is
/// not an integer is a client error naming the parameter.
pub fn parse_i64(params: &Params, name: &str) -> Result<Option<i64>, ApiError> {
    match first(params, name) {
        None => Ok(None),
        Some(value) => value.parse::<i64>().map(Some).map_err(|_| {
            ApiError::bad_request(format!("Bad arguments: {name} must be numeric, got '{value}'"))
        }),
    }
}

pub fn parse_usize(params: &Params, name: &str) -> Result<Option<usize>, ApiError> {
    match first(params, name) {
        None => Ok(None),
        Some(value) => value.parse::<usize>().map(Some).map_err(|_| {
            ApiError::bad_request(format!("Bad arguments: {name} must be numeric, got '{value}'"))
        }),
    }
}

/// Boolean parameters are lenient: anything other than a
/// case-insensitive "true" is false.
pub fn parse_bool(params: &Params, name: &str) -> Option<bool> {
    first(params, name).map(|value| value.eq_ignore_ascii_case("true"))
}

pub fn flag(params: &Params, name: &str) -> bool {
    parse_bool(params, name).unwrap_or(false)
}

/// Split a comma-separated parameter into its values.
pub fn csv(params: &Params, name: &str) -> Vec<String> {
    first(params, name)
        .map(|value| {
            value
                .split(',')
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        let mut map = Params::new();
        for (name, value) in pairs {
            map.entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        map
    }

    #[test]
    fn first_value_wins() {
        let map = params(&[("sort", "ctime"), ("sort", "severity")]);
        assert_eq!(first(&map, "sort"), Some("ctime"));
        assert_eq!(first(&map, "missing"), None);
    }

    #[test]
    fn numeric_parse_failure_is_a_client_error() {
        let map = params(&[("startTime", "not-a-number")]);
        let err = parse_i64(&map, "startTime").unwrap_err();
        assert!(err.message.contains("startTime"));
        assert_eq!(parse_i64(&map, "endTime").unwrap(), None);
    }

    #[test]
    fn csv_splits_and_drops_empty_tokens() {
        let map = params(&[("triggerIds", "t1,t2,,t3")]);
        assert_eq!(csv(&map, "triggerIds"), vec!["t1", "t2", "t3"]);
    }
}
