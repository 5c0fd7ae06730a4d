//! Property-key priority suffixes (spec §4.6, §6): `path:high`, `path:low`,
//! bare `path` defaulting to medium.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Splits `name:priority` into the bare property name and its priority tag,
/// stripping the suffix exactly as the codec is specified to do.
pub fn split_priority(raw_key: &str) -> (&str, Priority) {
    if let Some(stripped) = raw_key.strip_suffix(":high") {
        (stripped, Priority::High)
    } else if let Some(stripped) = raw_key.strip_suffix(":med") {
        (stripped, Priority::Medium)
    } else if let Some(stripped) = raw_key.strip_suffix(":low") {
        (stripped, Priority::Low)
    } else {
        (raw_key, Priority::Medium)
    }
}

/// Splits a raw incoming property map into bare keys plus their priorities.
/// The highest priority present across all keys in the map is also returned
/// since a whole outgoing message carries one priority (spec §4.8: "messages
/// are pre-sorted high -> medium -> low").
pub fn split_properties(
    raw: &std::collections::BTreeMap<String, String>,
) -> (std::collections::BTreeMap<String, String>, Priority) {
    let mut clean = std::collections::BTreeMap::new();
    let mut top = Priority::Low;
    for (k, v) in raw {
        let (name, priority) = split_priority(k);
        if priority < top {
            top = priority;
        }
        clean.insert(name.to_string(), v.clone());
    }
    if raw.is_empty() {
        top = Priority::Medium;
    }
    (clean, top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_suffixes() {
        assert_eq!(split_priority("path:high"), ("path", Priority::High));
        assert_eq!(split_priority("path:low"), ("path", Priority::Low));
        assert_eq!(split_priority("path:med"), ("path", Priority::Medium));
        assert_eq!(split_priority("path"), ("path", Priority::Medium));
    }
}
