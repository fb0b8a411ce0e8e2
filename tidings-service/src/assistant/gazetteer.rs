//! Canonical table of known cities.
//!
//! One table serves every normalization call site: the fallback scan over a
//! whole utterance, validation of correction targets, and display-name
//! correction of extracted candidates.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Canonical display names. The lower-cased form of each is always a key.
const CITIES: &[&str] = &[
    // South Asia
    "Delhi",
    "New Delhi",
    "Mumbai",
    "Bangalore",
    "Chennai",
    "Kolkata",
    "Hyderabad",
    "Pune",
    "Ahmedabad",
    "Jaipur",
    "Lucknow",
    "Kanpur",
    "Nagpur",
    "Indore",
    "Bhopal",
    "Patna",
    "Chandigarh",
    "Dehradun",
    "Shimla",
    "Manali",
    "Rishikesh",
    "Haridwar",
    "Varanasi",
    "Agra",
    "Amritsar",
    "Srinagar",
    "Goa",
    "Kochi",
    "Thiruvananthapuram",
    "Coimbatore",
    "Mysore",
    "Visakhapatnam",
    "Surat",
    "Noida",
    "Gurgaon",
    "Guwahati",
    "Bhubaneswar",
    "Ranchi",
    "Udaipur",
    "Jodhpur",
    "Karachi",
    "Lahore",
    "Islamabad",
    "Dhaka",
    "Kathmandu",
    "Colombo",
    "Thimphu",
    // North America
    "New York",
    "Los Angeles",
    "Chicago",
    "Houston",
    "Phoenix",
    "Philadelphia",
    "San Antonio",
    "San Diego",
    "Dallas",
    "Austin",
    "San Francisco",
    "Seattle",
    "Denver",
    "Boston",
    "Las Vegas",
    "Miami",
    "Atlanta",
    "Detroit",
    "Portland",
    "Nashville",
    "New Orleans",
    "Orlando",
    "Minneapolis",
    "Salt Lake City",
    "Washington",
    "Toronto",
    "Vancouver",
    "Montreal",
    "Calgary",
    "Ottawa",
    "Mexico City",
    "Honolulu",
    // Elsewhere
    "London",
    "Paris",
    "Berlin",
    "Madrid",
    "Rome",
    "Amsterdam",
    "Vienna",
    "Prague",
    "Dublin",
    "Lisbon",
    "Zurich",
    "Stockholm",
    "Oslo",
    "Copenhagen",
    "Moscow",
    "Istanbul",
    "Dubai",
    "Abu Dhabi",
    "Doha",
    "Riyadh",
    "Cairo",
    "Nairobi",
    "Lagos",
    "Cape Town",
    "Johannesburg",
    "Tokyo",
    "Osaka",
    "Seoul",
    "Beijing",
    "Shanghai",
    "Hong Kong",
    "Singapore",
    "Bangkok",
    "Kuala Lumpur",
    "Jakarta",
    "Manila",
    "Hanoi",
    "Ho Chi Minh City",
    "Sydney",
    "Melbourne",
    "Auckland",
    "Sao Paulo",
    "Rio de Janeiro",
    "Buenos Aires",
    "Lima",
    "Bogota",
    "Santiago",
    "Monaco",
    "Zandvoort",
];

/// Alternate spellings and short forms mapped to their canonical entry
const ALIASES: &[(&str, &str)] = &[
    ("dehradhun", "Dehradun"),
    ("dehra dun", "Dehradun"),
    ("bengaluru", "Bangalore"),
    ("bombay", "Mumbai"),
    ("madras", "Chennai"),
    ("calcutta", "Kolkata"),
    ("gurugram", "Gurgaon"),
    ("trivandrum", "Thiruvananthapuram"),
    ("cochin", "Kochi"),
    ("vizag", "Visakhapatnam"),
    ("benaras", "Varanasi"),
    ("nyc", "New York"),
    ("new york city", "New York"),
    ("la", "Los Angeles"),
    ("sf", "San Francisco"),
    ("vegas", "Las Vegas"),
    ("washington dc", "Washington"),
    ("frisco", "San Francisco"),
    ("peking", "Beijing"),
    ("saigon", "Ho Chi Minh City"),
];

/// Lower-cased key → canonical display name
static INDEX: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    let mut index = HashMap::with_capacity(CITIES.len() + ALIASES.len());
    for city in CITIES {
        index.insert(city.to_lowercase(), *city);
    }
    for (alias, city) in ALIASES {
        index.insert(alias.to_string(), *city);
    }
    index
});

/// Shortest key the free-text scan considers; two-letter aliases such as
/// "la" only resolve when they are the whole candidate
const MIN_SCAN_KEY_LEN: usize = 3;

/// Word-bounded alternation over every key, longest keys first so that
/// "new delhi" wins over "delhi" at the same position
static SCANNER: LazyLock<Regex> = LazyLock::new(|| {
    let mut keys: Vec<&str> = INDEX
        .keys()
        .map(String::as_str)
        .filter(|k| k.len() >= MIN_SCAN_KEY_LEN)
        .collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("gazetteer pattern is valid")
});

/// Canonical display form of a known city, if the key is in the gazetteer
pub fn canonical(name: &str) -> Option<&'static str> {
    let key = name.trim().to_lowercase();
    INDEX.get(&key).copied()
}

/// Find the first known city mentioned anywhere in `text`
pub fn scan(text: &str) -> Option<&'static str> {
    SCANNER.find(text).and_then(|m| canonical(m.as_str()))
}

/// Display-name correction: gazetteer form when known, title case otherwise
pub fn correct_city_name(candidate: &str) -> String {
    match canonical(candidate) {
        Some(city) => city.to_string(),
        None => title_case(candidate),
    }
}

/// Every canonical city name
pub fn cities() -> impl Iterator<Item = &'static str> {
    CITIES.iter().copied()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_canonical_name_is_its_own_key() {
        for city in cities() {
            assert_eq!(canonical(city), Some(city), "{city} is not self-indexed");
        }
    }

    #[test]
    fn test_gazetteer_covers_over_a_hundred_keys() {
        assert!(INDEX.len() >= 100);
    }

    #[test]
    fn test_alias_spellings_collapse_to_one_entry() {
        assert_eq!(canonical("dehradhun"), Some("Dehradun"));
        assert_eq!(canonical("Dehradun"), Some("Dehradun"));
        assert_eq!(canonical("BENGALURU"), Some("Bangalore"));
    }

    #[test]
    fn test_scan_prefers_longest_city_at_a_position() {
        assert_eq!(scan("flying into new delhi tomorrow"), Some("New Delhi"));
        assert_eq!(scan("is it hot in Salt Lake City?"), Some("Salt Lake City"));
    }

    #[test]
    fn test_scan_respects_word_boundaries() {
        // "paris" inside "comparison" must not match
        assert_eq!(scan("a comparison of things"), None);
    }

    #[test]
    fn test_short_aliases_only_resolve_as_whole_candidates() {
        assert_eq!(scan("ooh la la"), None);
        assert_eq!(canonical("LA"), Some("Los Angeles"));
    }

    #[test]
    fn test_correct_city_name_title_cases_unknown_places() {
        assert_eq!(correct_city_name("new york"), "New York");
        assert_eq!(correct_city_name("springfield falls"), "Springfield Falls");
    }
}
