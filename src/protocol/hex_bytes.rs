//! Serde helper encoding byte fields as lowercase hex strings.

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    hex::decode(&encoded).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapper {
        #[serde(with = "super")]
        data: Vec<u8>,
    }

    #[test]
    fn test_hex_field() {
        let json = serde_json::to_string(&Wrapper {
            data: vec![0xde, 0xad],
        })
        .unwrap();
        assert_eq!(json, r#"{"data":"dead"}"#);
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"data":"zz"}"#).is_err());
    }
}
