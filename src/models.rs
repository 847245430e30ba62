use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Inclusive year window applied during reshape and API queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidYearRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }

    pub fn to_query_param(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 1990,
            end: 2024,
        }
    }
}

/// Metadata section returned by the API (position 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub page: u32,
    pub pages: u32,
    /// Some responses encode `per_page` as a string, others as a number.
    /// Accept both and normalize to `u32`.
    #[serde(deserialize_with = "de_u32_from_string_or_number")]
    pub per_page: u32,
    pub total: u32,
}

/// Serde helper: parse `u32` from either a JSON number or a string.
fn de_u32_from_string_or_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    struct U32Visitor;

    impl Visitor<'_> for U32Visitor {
        type Value = u32;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a string or integer representing a non-negative number")
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u32::try_from(v).map_err(|_| E::custom("negative or oversized value for u32"))
        }

        fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            s.parse::<u32>().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(U32Visitor)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeName {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// Raw observation from the indicator endpoint (position 1 array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub indicator: CodeName,
    pub country: CodeName,
    #[serde(default)]
    pub countryiso3code: String,
    pub date: String,
    pub value: Option<f64>,
}

/// One observation (country, indicator, year) as delivered by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPoint {
    pub indicator_id: String,
    pub indicator_name: String,
    pub country_name: String,
    pub country_iso3: String,
    pub year: i32,
    pub value: Option<f64>,
}

impl From<Entry> for DataPoint {
    fn from(e: Entry) -> Self {
        let year = e.date.parse::<i32>().unwrap_or(0);
        Self {
            indicator_id: e.indicator.id,
            indicator_name: e.indicator.value,
            country_name: e.country.value,
            country_iso3: e.countryiso3code,
            year,
            value: e.value,
        }
    }
}

/// Raw country from the `country` endpoint (position 1 array).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub region: Option<CodeName>,
    #[serde(rename = "incomeLevel")]
    pub income_level: Option<CodeName>,
}

/// One row of the country metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
    pub code: String,
    pub name: String,
    pub region: Option<String>,
    pub income_group: Option<String>,
}

impl CountryEntry {
    /// Countries without an id cannot be joined and are dropped.
    pub fn into_record(self) -> Option<CountryRecord> {
        let code = self.id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
        let label = |c: Option<CodeName>| {
            c.map(|c| c.value.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Some(CountryRecord {
            code,
            name: self.name.unwrap_or_default(),
            region: label(self.region),
            income_group: label(self.income_level),
        })
    }
}
