use std::fmt;
use std::rc::Rc;

/// A country as read from the reference file, with its derived aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    pub source_id: i64,
    pub iso2: String,
    pub iso3: String,
    pub name: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityNames {
    pub name: String,
    pub aliases: Vec<String>,
}

/// One city line, with its country codes already resolved to full records.
///
/// `countries` is never empty; the primary country comes first.
#[derive(Debug, Clone)]
pub struct CityRecord {
    pub id: i64,
    pub names: CityNames,
    pub countries: Vec<Rc<CountryRecord>>,
    pub state: String,
    pub population: i64,
    pub timezone: String,
}

macro_rules! surrogate_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

surrogate_id!(
    CountryId,
    StateId,
    TimezoneId,
    /// Row id in either alias namespace (country or city names).
    AliasId,
    /// Taken verbatim from the source file, never assigned.
    CityId,
);
