pub use self::glob::GlobPattern;
pub use self::seconds::Seconds;

pub mod glob {
    use std::ops::Deref;

    use ::glob::PatternError;
    use ::serde::{
        de::{self, Visitor},
        Deserialize, Serialize,
    };

    /// A glob pattern validated at deserialization time.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct GlobPattern(::glob::Pattern);

    impl GlobPattern {
        pub fn parse(pattern: &str) -> Result<Self, PatternError> {
            ::glob::Pattern::new(pattern).map(Self)
        }
    }

    impl Deref for GlobPattern {
        type Target = ::glob::Pattern;

        fn deref(&self) -> &Self::Target {
            &self.0
        }
    }

    impl Serialize for GlobPattern {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(self.0.as_str())
        }
    }

    impl<'de> Deserialize<'de> for GlobPattern {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct GlobPatternVisitor;

            impl<'de> Visitor<'de> for GlobPatternVisitor {
                type Value = GlobPattern;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "a glob pattern string")
                }

                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: de::Error,
                {
                    Self::Value::parse(v).map_err(de::Error::custom)
                }
            }

            deserializer.deserialize_str(GlobPatternVisitor)
        }
    }

}

pub mod seconds {
    use std::time::Duration;

    use ::serde::{
        de::{self, Visitor},
        Deserialize,
    };

    /// A strictly positive, finite number of seconds.
    /// Accepts integers, floats and numeric strings (`10`, `0.5`, `"3"`).
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Seconds(Duration);

    impl Seconds {
        pub fn parse_f64(secs: f64) -> Result<Self, String> {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(format!("expected a positive number of seconds, got {}", secs));
            }
            Duration::try_from_secs_f64(secs)
                .map(Self)
                .map_err(|e| e.to_string())
        }

        pub fn as_duration(self) -> Duration {
            self.0
        }
    }

    impl From<Seconds> for Duration {
        fn from(s: Seconds) -> Self {
            s.0
        }
    }

    impl<'de> Deserialize<'de> for Seconds {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            struct SecondsVisitor;

            impl<'de> Visitor<'de> for SecondsVisitor {
                type Value = Seconds;

                fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "a positive number of seconds")
                }

                fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                    Seconds::parse_f64(v as f64).map_err(de::Error::custom)
                }

                fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                    Seconds::parse_f64(v as f64).map_err(de::Error::custom)
                }

                fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                    Seconds::parse_f64(v).map_err(de::Error::custom)
                }

                fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                    let secs: f64 = v.trim().parse().map_err(de::Error::custom)?;
                    Seconds::parse_f64(secs).map_err(de::Error::custom)
                }
            }

            deserializer.deserialize_any(SecondsVisitor)
        }
    }

}
