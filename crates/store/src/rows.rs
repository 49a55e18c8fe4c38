use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One output line: a keyword occurrence with its resolved entity and one
/// hierarchy path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub docid: String,
    pub title: String,
    pub keyword: String,
    pub wikidata_label: String,
    pub wikidata_qid: String,
    pub bnf_id: String,
    pub p279_path: String,
    pub match_stage: String,
    #[serde(with = "yes_no")]
    pub is_disambiguation: bool,
    pub label_similarity: f64,
    pub match_score: f64,
    pub p31_types: String,
    pub p31_label: String,
}

impl ResultRow {
    pub const HEADER: [&'static str; 13] = [
        "docid",
        "title",
        "keyword",
        "wikidata_label",
        "wikidata_qid",
        "bnf_id",
        "p279_path",
        "match_stage",
        "is_disambiguation",
        "label_similarity",
        "match_score",
        "p31_types",
        "p31_label",
    ];
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

mod yes_no {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "yes" } else { "no" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.eq_ignore_ascii_case("yes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round1() {
        assert_eq!(round1(88.888), 88.9);
        assert_eq!(round1(53.0), 53.0);
        assert_eq!(round1(0.04), 0.0);
    }

    #[test]
    fn test_disambiguation_flag_serializes_as_yes_no() {
        let row = ResultRow {
            is_disambiguation: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["is_disambiguation"], "yes");

        let back: ResultRow = serde_json::from_value(json).unwrap();
        assert!(back.is_disambiguation);
    }
}
