//! Builders translating flat query parameters into the typed criteria the
//! backing services consume. Absent parameters map to "no constraint",
//! never to a narrowing default.

use models::tags::{parse_tags, tags_to_query};
use models::{ActionsCriteria, AlertsCriteria, EventsCriteria, Severity, Status, TriggersCriteria};

use super::params::{self, Params};
use super::ApiError;

const PARAM_START_TIME: &str = "startTime";
const PARAM_END_TIME: &str = "endTime";
const PARAM_TAGS: &str = "tags";
const PARAM_TAG_QUERY: &str = "tagQuery";
const PARAM_THIN: &str = "thin";

/// The `tags` convenience parameter and an explicit `tagQuery` translate
/// into the same unified representation; `tags` wins when both appear.
fn unified_tag_query(params: &Params) -> Result<Option<String>, ApiError> {
    match params::first(params, PARAM_TAGS) {
        Some(tags) => Ok(Some(tags_to_query(&parse_tags(tags)?))),
        None => Ok(params::first(params, PARAM_TAG_QUERY).map(str::to_string)),
    }
}

fn parse_enum_list<T>(params: &Params, name: &str) -> Result<Vec<T>, ApiError>
where
    T: std::str::FromStr<Err = models::InvalidEnum>,
{
    params::csv(params, name)
        .iter()
        .map(|value| value.parse::<T>().map_err(ApiError::from))
        .collect()
}

pub fn build_alerts_criteria(params: &Params) -> Result<AlertsCriteria, ApiError> {
    Ok(AlertsCriteria {
        start_time: params::parse_i64(params, PARAM_START_TIME)?,
        end_time: params::parse_i64(params, PARAM_END_TIME)?,
        alert_ids: params::csv(params, "alertIds"),
        trigger_ids: params::csv(params, "triggerIds"),
        statuses: parse_enum_list::<Status>(params, "statuses")?,
        severities: parse_enum_list::<Severity>(params, "severities")?,
        tag_query: unified_tag_query(params)?,
        start_resolved_time: params::parse_i64(params, "startResolvedTime")?,
        end_resolved_time: params::parse_i64(params, "endResolvedTime")?,
        start_ack_time: params::parse_i64(params, "startAckTime")?,
        end_ack_time: params::parse_i64(params, "endAckTime")?,
        start_status_time: params::parse_i64(params, "startStatusTime")?,
        end_status_time: params::parse_i64(params, "endStatusTime")?,
        thin: params::flag(params, PARAM_THIN),
    })
}

pub fn build_events_criteria(params: &Params) -> Result<EventsCriteria, ApiError> {
    Ok(EventsCriteria {
        start_time: params::parse_i64(params, PARAM_START_TIME)?,
        end_time: params::parse_i64(params, PARAM_END_TIME)?,
        event_ids: params::csv(params, "eventIds"),
        trigger_ids: params::csv(params, "triggerIds"),
        categories: params::csv(params, "categories"),
        tag_query: unified_tag_query(params)?,
        thin: params::flag(params, PARAM_THIN),
    })
}

pub fn build_triggers_criteria(params: &Params) -> Result<TriggersCriteria, ApiError> {
    let tags = match params::first(params, PARAM_TAGS) {
        Some(tags) => parse_tags(tags)?,
        None => Default::default(),
    };
    Ok(TriggersCriteria {
        trigger_ids: params::csv(params, "triggerIds"),
        tags,
        thin: params::flag(params, PARAM_THIN),
    })
}

pub fn build_actions_criteria(params: &Params) -> Result<ActionsCriteria, ApiError> {
    Ok(ActionsCriteria {
        start_time: params::parse_i64(params, PARAM_START_TIME)?,
        end_time: params::parse_i64(params, PARAM_END_TIME)?,
        action_plugins: params::csv(params, "actionPlugins"),
        action_ids: params::csv(params, "actionIds"),
        alert_ids: params::csv(params, "alertIds"),
        results: params::csv(params, "results"),
    })
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
    fn absent_parameters_leave_no_constraint() {
        let criteria = build_alerts_criteria(&Params::new()).unwrap();
        assert_eq!(criteria, AlertsCriteria::default());
    }

    #[test]
    fn tags_translate_into_the_unified_query() {
        let criteria =
            build_alerts_criteria(&params(&[("tags", "env|prod,tier|web")])).unwrap();
        assert_eq!(
            criteria.tag_query.as_deref(),
            Some("env = 'prod' and tier = 'web'")
        );

        // An explicit tagQuery applies only when tags is absent.
        let criteria = build_alerts_criteria(&params(&[
            ("tags", "env|prod"),
            ("tagQuery", "env = 'staging'"),
        ]))
        .unwrap();
        assert_eq!(criteria.tag_query.as_deref(), Some("env = 'prod'"));
    }

    #[test]
    fn malformed_tag_tokens_name_the_offender() {
        let err = build_alerts_criteria(&params(&[("tags", "env")])).unwrap_err();
        assert!(err.message.contains("'env'"), "{}", err.message);
    }

    #[test]
    fn invalid_enum_values_are_client_errors() {
        let err =
            build_alerts_criteria(&params(&[("severities", "CRITICAL,URGENT")])).unwrap_err();
        assert!(err.message.contains("URGENT"));

        let ok = build_alerts_criteria(&params(&[("severities", "critical,low")])).unwrap();
        assert_eq!(ok.severities, vec![Severity::Critical, Severity::Low]);
    }

    #[test]
    fn numeric_windows_parse_or_reject() {
        let criteria =
            build_events_criteria(&params(&[("startTime", "1000"), ("endTime", "2000")]))
                .unwrap();
        assert_eq!(criteria.start_time, Some(1000));
        assert_eq!(criteria.end_time, Some(2000));

        assert!(build_events_criteria(&params(&[("startTime", "soon")])).is_err());
    }
}
