//! Read preference routing.

use std::time::Duration;

use mongodb::options::{ReadPreference, ReadPreferenceOptions, SelectionCriteria};

use crate::connection::types::ReadPreferenceMode;

/// Lowest staleness bound the server accepts.
pub const MAX_STALENESS: Duration = Duration::from_secs(90);

/// Selection criteria for a routing hint; `None` leaves the driver default.
pub fn selection_criteria(mode: Option<ReadPreferenceMode>) -> Option<SelectionCriteria> {
    let bounded = || Some(ReadPreferenceOptions::builder().max_staleness(MAX_STALENESS).build());
    let preference = match mode? {
        ReadPreferenceMode::Primary => ReadPreference::Primary,
        ReadPreferenceMode::PrimaryPreferred => ReadPreference::PrimaryPreferred { options: None },
        ReadPreferenceMode::Secondary => ReadPreference::Secondary { options: bounded() },
        ReadPreferenceMode::SecondaryPreferred => {
            ReadPreference::SecondaryPreferred { options: bounded() }
        }
        ReadPreferenceMode::Nearest => ReadPreference::Nearest { options: bounded() },
    };
    Some(SelectionCriteria::ReadPreference(preference))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staleness(criteria: Option<SelectionCriteria>) -> Option<Duration> {
        match criteria {
            Some(SelectionCriteria::ReadPreference(
                ReadPreference::Secondary { options }
                | ReadPreference::SecondaryPreferred { options }
                | ReadPreference::Nearest { options }
                | ReadPreference::PrimaryPreferred { options },
            )) => options.and_then(|options| options.max_staleness),
            _ => None,
        }
    }

    #[test]
    fn unset_hint_attaches_nothing() {
        assert!(selection_criteria(None).is_none());
    }

    #[test]
    fn primary_modes_are_unbounded() {
        assert!(matches!(
            selection_criteria(Some(ReadPreferenceMode::Primary)),
            Some(SelectionCriteria::ReadPreference(ReadPreference::Primary))
        ));
        let preferred = selection_criteria(Some(ReadPreferenceMode::PrimaryPreferred));
        assert!(matches!(
            preferred,
            Some(SelectionCriteria::ReadPreference(ReadPreference::PrimaryPreferred { .. }))
        ));
        assert_eq!(staleness(preferred), None);
    }

    #[test]
    fn secondary_modes_bound_staleness() {
        for mode in [
            ReadPreferenceMode::Secondary,
            ReadPreferenceMode::SecondaryPreferred,
            ReadPreferenceMode::Nearest,
        ] {
            assert_eq!(staleness(selection_criteria(Some(mode))), Some(MAX_STALENESS), "{mode:?}");
        }
    }
}
