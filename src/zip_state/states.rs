//! State code table and directory URL projection.

use super::observer::{ZipEvent, ZipObserver};
use serde::Serialize;
use std::collections::BTreeMap;

/// Default root of the dispensary directory site.
pub const DEFAULT_BASE_URL: &str = "https://potadvisor.com";

/// The 50 states plus DC, keyed by postal code, with the lowercase
/// hyphenated name the directory uses in its paths.
pub const STATE_NAMES: &[(&str, &str)] = &[
    ("AL", "alabama"),
    ("AK", "alaska"),
    ("AZ", "arizona"),
    ("AR", "arkansas"),
    ("CA", "california"),
    ("CO", "colorado"),
    ("CT", "connecticut"),
    ("DE", "delaware"),
    ("FL", "florida"),
    ("GA", "georgia"),
    ("HI", "hawaii"),
    ("ID", "idaho"),
    ("IL", "illinois"),
    ("IN", "indiana"),
    ("IA", "iowa"),
    ("KS", "kansas"),
    ("KY", "kentucky"),
    ("LA", "louisiana"),
    ("ME", "maine"),
    ("MD", "maryland"),
    ("MA", "massachusetts"),
    ("MI", "michigan"),
    ("MN", "minnesota"),
    ("MS", "mississippi"),
    ("MO", "missouri"),
    ("MT", "montana"),
    ("NE", "nebraska"),
    ("NV", "nevada"),
    ("NH", "new-hampshire"),
    ("NJ", "new-jersey"),
    ("NM", "new-mexico"),
    ("NY", "new-york"),
    ("NC", "north-carolina"),
    ("ND", "north-dakota"),
    ("OH", "ohio"),
    ("OK", "oklahoma"),
    ("OR", "oregon"),
    ("PA", "pennsylvania"),
    ("RI", "rhode-island"),
    ("SC", "south-carolina"),
    ("SD", "south-dakota"),
    ("TN", "tennessee"),
    ("TX", "texas"),
    ("UT", "utah"),
    ("VT", "vermont"),
    ("VA", "virginia"),
    ("WA", "washington"),
    ("WV", "west-virginia"),
    ("WI", "wisconsin"),
    ("WY", "wyoming"),
    ("DC", "district-of-columbia"),
];

/// Directory listing page for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateUrl {
    pub url: String,
    pub state_name: String,
}

/// State code → directory page.
pub type StateUrlMap = BTreeMap<String, StateUrl>;

/// Lowercase hyphenated name for a state code, if it is one of the 51.
pub fn state_name(code: &str) -> Option<&'static str> {
    STATE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Listing page URL for a state name on the directory rooted at `base_url`.
pub fn state_listing_url(base_url: &str, state_name: &str) -> String {
    format!(
        "{}/states/{}/{}-dispensaries/",
        base_url.trim_end_matches('/'),
        state_name,
        state_name
    )
}

/// Project state codes onto directory listing pages.
///
/// Unknown codes are reported to `observer` and left out.
pub fn states_to_urls<I, S>(states: I, base_url: &str, observer: &dyn ZipObserver) -> StateUrlMap
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut urls = StateUrlMap::new();
    for state in states {
        let state = state.as_ref();
        match state_name(state) {
            Some(name) => {
                urls.insert(
                    state.to_string(),
                    StateUrl {
                        url: state_listing_url(base_url, name),
                        state_name: name.to_string(),
                    },
                );
            }
            None => observer.notify(&ZipEvent::UnknownStateCode { state: state.to_string() }),
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip_state::observer::RecordingObserver;
    use std::collections::HashSet;

    #[test]
    fn test_table_has_fifty_one_unique_codes() {
        let codes: HashSet<_> = STATE_NAMES.iter().map(|(c, _)| *c).collect();
        assert_eq!(codes.len(), 51);
        assert!(codes.contains("DC"));
    }

    #[test]
    fn test_washington_url() {
        let obs = RecordingObserver::new();
        let urls = states_to_urls(["WA"], DEFAULT_BASE_URL, &obs);
        assert_eq!(urls.len(), 1);
        assert_eq!(
            urls["WA"],
            StateUrl {
                url: "https://potadvisor.com/states/washington/washington-dispensaries/".into(),
                state_name: "washington".into(),
            }
        );
        assert!(obs.events().is_empty());
    }

    #[test]
    fn test_hyphenated_name() {
        let obs = RecordingObserver::new();
        let urls = states_to_urls(["NH"], "https://example.test/", &obs);
        assert_eq!(
            urls["NH"].url,
            "https://example.test/states/new-hampshire/new-hampshire-dispensaries/"
        );
    }

    #[test]
    fn test_unknown_state_is_skipped_with_warning() {
        let obs = RecordingObserver::new();
        let states: HashSet<String> = ["ZZ".to_string()].into_iter().collect();
        let urls = states_to_urls(&states, DEFAULT_BASE_URL, &obs);
        assert!(urls.is_empty());
        assert_eq!(obs.events(), vec![ZipEvent::UnknownStateCode { state: "ZZ".into() }]);
    }

    #[test]
    fn test_mixed_known_and_unknown() {
        let obs = RecordingObserver::new();
        let urls = states_to_urls(["AK", "XX", "DC"], DEFAULT_BASE_URL, &obs);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls["DC"].state_name, "district-of-columbia");
        assert_eq!(obs.events().len(), 1);
    }
}
