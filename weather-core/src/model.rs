use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{IgnoredAny, MapAccess, Visitor},
};

use crate::error::InvalidPostalCode;

/// Number of characters in a Brazilian postal code (CEP), without separators.
pub const CEP_LENGTH: usize = 8;

/// Inbound body of both services: `{"cep": "01001000"}`.
///
/// The key is matched case-insensitively and other keys are ignored. A missing
/// or `null` `cep` decodes as empty and then fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostalCodeRequest {
    pub cep: String,
}

impl<'de> Deserialize<'de> for PostalCodeRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RequestVisitor;

        impl<'de> Visitor<'de> for RequestVisitor {
            type Value = PostalCodeRequest;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with a string `cep` field")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut cep = String::new();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("cep") {
                        // `null` leaves the value untouched.
                        if let Some(value) = map.next_value::<Option<String>>()? {
                            cep = value;
                        }
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(PostalCodeRequest { cep })
            }
        }

        deserializer.deserialize_map(RequestVisitor)
    }
}

impl PostalCodeRequest {
    pub fn new(cep: impl Into<String>) -> Self {
        Self { cep: cep.into() }
    }

    /// Only the length is checked; content and checksum are left to the lookup service.
    pub fn validate(&self) -> Result<(), InvalidPostalCode> {
        if self.cep.chars().count() == CEP_LENGTH {
            Ok(())
        } else {
            Err(InvalidPostalCode)
        }
    }
}

/// Locality resolved from a postal code. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityRecord {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureReading {
    pub celsius: f64,
}

impl TemperatureReading {
    pub fn fahrenheit(&self) -> f64 {
        self.celsius * 1.8 + 32.0
    }

    pub fn kelvin(&self) -> f64 {
        self.celsius + 273.15
    }
}

/// Success payload of the weather service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherResult {
    pub city: String,
    #[serde(rename = "temp_C")]
    pub temp_c: f64,
    #[serde(rename = "temp_F")]
    pub temp_f: f64,
    #[serde(rename = "temp_K")]
    pub temp_k: f64,
}

impl WeatherResult {
    pub fn compose(locality: LocalityRecord, reading: TemperatureReading) -> Self {
        Self {
            city: locality.name,
            temp_c: reading.celsius,
            temp_f: reading.fahrenheit(),
            temp_k: reading.kelvin(),
        }
    }
}
