pub mod duration {
    use crate::time::timeunit::parse_duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|_| D::Error::custom(format!("invalid duration {}", secs))),
            Raw::Text(value) => parse_duration(&value).map_err(|err| D::Error::custom(err.to_string())),
        }
    }
}

pub mod duration_opt {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    struct Wrapper(#[serde(with = "super::duration")] Duration);

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Wrapper>::deserialize(deserializer).map(|value| value.map(|Wrapper(d)| d))
    }
}

pub mod flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    /// Accepts real booleans as well as the `1`/`yes`/`true` spellings of INI style files.
    pub fn parse(value: &str) -> Option<bool> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => Ok(value),
            Raw::Int(value) => Ok(value != 0),
            Raw::Text(value) => parse(&value)
                .ok_or_else(|| D::Error::custom(format!("'{}' is not a boolean", value))),
        }
    }
}
