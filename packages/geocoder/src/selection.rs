//! Picks one candidate out of everything the service returned.
//!
//! The first candidate is the default. Every later candidate whose address
//! components name one of the locality hints replaces the current pick, so
//! when several candidates match, the last one in service order wins.

use geobatch_geocoder_models::{GeocodeCandidate, LocalityHints};

/// Selects the best candidate, or `None` when `candidates` is empty.
#[must_use]
pub fn select_candidate(
    candidates: Vec<GeocodeCandidate>,
    hints: &LocalityHints,
) -> Option<GeocodeCandidate> {
    let mut iter = candidates.into_iter();
    let mut selected = iter.next()?;

    if hints.is_empty() {
        return Some(selected);
    }

    for candidate in iter {
        if candidate.matches_any(hints) {
            selected = candidate;
        }
    }

    Some(selected)
}

#[cfg(test)]
mod tests {
    use geobatch_geocoder_models::{AddressComponent, LocationType};

    use super::*;

    fn candidate(name: &str, locality: &str) -> GeocodeCandidate {
        GeocodeCandidate {
            latitude: 0.5,
            longitude: 0.5,
            formatted_address: name.to_string(),
            location_type: LocationType::Approximate,
            address_components: vec![AddressComponent {
                long_name: locality.to_string(),
                short_name: locality.to_string(),
                types: vec!["locality".to_string()],
            }],
        }
    }

    fn hints(values: &[&str]) -> LocalityHints {
        values.iter().copied().collect()
    }

    #[test]
    fn empty_candidates_select_nothing() {
        assert!(select_candidate(Vec::new(), &hints(&["Springfield"])).is_none());
    }

    #[test]
    fn first_candidate_is_default() {
        let picked = select_candidate(
            vec![candidate("A", "Shelbyville"), candidate("B", "Ogdenville")],
            &hints(&["Springfield"]),
        )
        .unwrap();
        assert_eq!(picked.formatted_address, "A");
    }

    #[test]
    fn matching_candidate_replaces_default() {
        let picked = select_candidate(
            vec![
                candidate("A", "Shelbyville"),
                candidate("B", "Springfield"),
                candidate("C", "Ogdenville"),
            ],
            &hints(&["Springfield"]),
        )
        .unwrap();
        assert_eq!(picked.formatted_address, "B");
    }

    #[test]
    fn last_match_wins() {
        let picked = select_candidate(
            vec![
                candidate("A", "Shelbyville"),
                candidate("B", "Springfield"),
                candidate("C", "Springfield"),
            ],
            &hints(&["Springfield"]),
        )
        .unwrap();
        assert_eq!(picked.formatted_address, "C");
    }

    #[test]
    fn matching_first_candidate_is_not_special() {
        let picked = select_candidate(
            vec![candidate("A", "Springfield"), candidate("B", "Springfield")],
            &hints(&["Springfield"]),
        )
        .unwrap();
        assert_eq!(picked.formatted_address, "B");
    }

    #[test]
    fn no_hints_keeps_first() {
        let picked = select_candidate(
            vec![candidate("A", "Springfield"), candidate("B", "Springfield")],
            &LocalityHints::default(),
        )
        .unwrap();
        assert_eq!(picked.formatted_address, "A");
    }
}
