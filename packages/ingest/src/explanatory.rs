//! Normalisation of explanatory passthrough fields for charting.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Passthrough key holding the `Yes`/`No` faith flag.
pub const FAITH_SCHOOL: &str = "FaithSchool";

/// Passthrough key holding the admissions policy with blanks filled.
pub const ADMISSIONS_GROUP: &str = "AdmissionsGroup";

static NO_FAITH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(Does not apply|None)$").unwrap_or_else(|_| unreachable!()));

static FAITH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Church|Catholic|Greek|Anglican|Jewish|Christian|Muslim|Hindu|Sikh")
        .unwrap_or_else(|_| unreachable!())
});

/// Reduces a GIAS religious character to `Yes` or `No`.
///
/// Unrecognised characters are returned unchanged.
#[must_use]
pub fn faith_flag(religious_character: &str) -> String {
    let value = religious_character.trim();
    if value.is_empty() || NO_FAITH_RE.is_match(value) {
        "No".to_string()
    } else if FAITH_RE.is_match(value) {
        "Yes".to_string()
    } else {
        value.to_string()
    }
}

/// Treats a blank or "Not applicable" admissions policy as non-selective.
#[must_use]
pub fn admissions_policy(policy: &str) -> String {
    let value = policy.trim();
    if value.is_empty() || value == "Not applicable" {
        "Non-selective".to_string()
    } else {
        value.to_string()
    }
}

/// Adds the [`FAITH_SCHOOL`] and [`ADMISSIONS_GROUP`] keys.
///
/// The raw `ReligiousCharacter` and `AdmissionsPolicy` values are left as
/// loaded.
pub fn normalise_passthrough(passthrough: &mut BTreeMap<String, String>) {
    let faith = faith_flag(
        passthrough
            .get("ReligiousCharacter")
            .map_or("", String::as_str),
    );
    passthrough.insert(FAITH_SCHOOL.to_string(), faith);

    let policy = admissions_policy(passthrough.get("AdmissionsPolicy").map_or("", String::as_str));
    passthrough.insert(ADMISSIONS_GROUP.to_string(), policy);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn faith_flags() {
        for faith in [
            "Church of England",
            "Roman Catholic",
            "Greek Orthodox",
            "Anglican/Church of England",
            "Jewish",
            "Other Christian faith",
            "Muslim",
            "Hindu",
            "Sikh",
        ] {
            assert_eq!(faith_flag(faith), "Yes", "{faith}");
        }
        for none in ["", "None", "Does not apply"] {
            assert_eq!(faith_flag(none), "No", "{none:?}");
        }
        assert_eq!(faith_flag("Quaker"), "Quaker");
    }

    #[test]
    fn admissions_policies() {
        assert_eq!(admissions_policy(""), "Non-selective");
        assert_eq!(admissions_policy("Not applicable"), "Non-selective");
        assert_eq!(admissions_policy("Selective"), "Selective");
    }

    #[test]
    fn passthrough_keeps_raw_values() {
        let mut passthrough = BTreeMap::new();
        passthrough.insert("ReligiousCharacter".to_string(), "Roman Catholic".to_string());
        passthrough.insert("AdmissionsPolicy".to_string(), "Not applicable".to_string());
        normalise_passthrough(&mut passthrough);
        assert_eq!(passthrough[FAITH_SCHOOL], "Yes");
        assert_eq!(passthrough[ADMISSIONS_GROUP], "Non-selective");
        assert_eq!(passthrough["AdmissionsPolicy"], "Not applicable");
        assert_eq!(passthrough["ReligiousCharacter"], "Roman Catholic");
    }
}
