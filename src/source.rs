//! Readers for the GeoNames reference dumps.
//!
//! Both dumps are tab-separated without headers. Countries are loaded eagerly into a
//! [`CountryTable`]; cities are streamed one line at a time by [`CityReader`].

use crate::alias::derive_aliases;
use crate::config::{city_cols, country_cols, SourcePaths};
use crate::models::{CityNames, CityRecord, CountryRecord};
use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

fn open_tsv(path: &Path) -> Result<csv::Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_path(path)
        .with_context(|| format!("Failed to open source file: {}", path.display()))
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn field<'r>(record: &'r StringRecord, idx: usize, what: &str) -> Result<&'r str> {
    match record.get(idx) {
        Some(v) => Ok(v.trim()),
        None => bail!(
            "Line {}: missing column {} ({}), got {} columns",
            line_of(record),
            idx,
            what,
            record.len()
        ),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Derives aliases and asserts none of them is blank.
fn checked_aliases(names: &[&str], owner: &str) -> Result<Vec<String>> {
    let aliases = derive_aliases(names);
    ensure!(
        aliases.iter().all(|a| !a.trim().is_empty()),
        "Blank alias derived for {}",
        owner
    );
    if aliases.is_empty() {
        warn!(owner = owner, "No searchable alias could be derived");
    }
    Ok(aliases)
}

/// Loads the auxiliary `sourceId<TAB>alias,alias,...` file.
pub fn load_country_aliases(path: &Path) -> Result<FxHashMap<i64, Vec<String>>> {
    let mut aliases: FxHashMap<i64, Vec<String>> = FxHashMap::default();
    for result in open_tsv(path)?.into_records() {
        let record =
            result.with_context(|| format!("Failed to read record from {}", path.display()))?;
        let raw_id = field(&record, 0, "country id")?;
        if raw_id.is_empty() {
            continue;
        }
        let id: i64 = raw_id
            .parse()
            .with_context(|| format!("Line {}: invalid country id {:?}", line_of(&record), raw_id))?;
        let names: Vec<String> = record
            .get(1)
            .map(|raw| split_list(raw).map(str::to_string).collect())
            .unwrap_or_default();
        aliases.insert(id, names);
    }
    debug!(countries = aliases.len(), "Loaded foreign country names");
    Ok(aliases)
}

/// Countries keyed by upper-case ISO2 code.
#[derive(Debug, Default)]
pub struct CountryTable {
    by_iso2: FxHashMap<String, Rc<CountryRecord>>,
}

impl CountryTable {
    pub fn get(&self, iso2: &str) -> Option<&Rc<CountryRecord>> {
        self.by_iso2.get(&iso2.to_ascii_uppercase())
    }

    pub fn len(&self) -> usize {
        self.by_iso2.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_iso2.is_empty()
    }

    pub fn insert(&mut self, country: CountryRecord) {
        self.by_iso2.insert(country.iso2.clone(), Rc::new(country));
    }
}

/// Loads the country reference file, optionally merging foreign-language names.
pub fn load_countries(paths: &SourcePaths) -> Result<CountryTable> {
    let foreign = if paths.use_foreign_names {
        load_country_aliases(&paths.country_aliases)?
    } else {
        FxHashMap::default()
    };

    let path = &paths.countries;
    let mut table = CountryTable::default();
    for result in open_tsv(path)?.into_records() {
        let record =
            result.with_context(|| format!("Failed to read record from {}", path.display()))?;
        let iso2 = field(&record, country_cols::ISO2, "iso2")?.to_ascii_uppercase();
        let iso3 = field(&record, country_cols::ISO3, "iso3")?.to_ascii_uppercase();
        let name = field(&record, country_cols::NAME, "name")?;
        let raw_id = field(&record, country_cols::SOURCE_ID, "geoname id")?;
        let source_id: i64 = raw_id.parse().with_context(|| {
            format!("Line {}: invalid country id {:?}", line_of(&record), raw_id)
        })?;

        let mut names = vec![name];
        if let Some(extra) = foreign.get(&source_id) {
            names.extend(extra.iter().map(String::as_str));
        }
        let aliases = checked_aliases(&names, &format!("country {}", iso2))?;

        table.insert(CountryRecord {
            source_id,
            iso2,
            iso3,
            name: name.to_string(),
            aliases,
        });
    }

    info!(countries = table.len(), path = ?path, "Countries loaded");
    Ok(table)
}

/// Forward-only stream over the city dump.
///
/// Opening the reader loads the country table and opens the city file, so missing
/// inputs are reported before anything is written.
pub struct CityReader {
    records: StringRecordsIntoIter<File>,
    countries: CountryTable,
    use_foreign_names: bool,
}

impl CityReader {
    pub fn open(paths: &SourcePaths) -> Result<Self> {
        let countries = load_countries(paths)?;
        Self::with_countries(&paths.cities, countries, paths.use_foreign_names)
    }

    pub fn with_countries(
        path: &Path,
        countries: CountryTable,
        use_foreign_names: bool,
    ) -> Result<Self> {
        let records = open_tsv(path)?.into_records();
        Ok(Self {
            records,
            countries,
            use_foreign_names,
        })
    }

    /// Primary code first, then secondaries in listed order; repeats are dropped.
    fn resolve_countries(
        &self,
        city_id: i64,
        primary: &str,
        secondary: &str,
    ) -> Result<Vec<Rc<CountryRecord>>> {
        let mut resolved: Vec<Rc<CountryRecord>> = Vec::new();
        for code in std::iter::once(primary).chain(split_list(secondary)) {
            let Some(country) = self.countries.get(code) else {
                bail!("City {}: unknown country code {:?}", city_id, code);
            };
            if !resolved.iter().any(|c| c.iso2 == country.iso2) {
                resolved.push(Rc::clone(country));
            }
        }
        Ok(resolved)
    }

    fn parse_city(&self, record: &StringRecord) -> Result<CityRecord> {
        let raw_id = field(record, city_cols::ID, "geoname id")?;
        let id: i64 = raw_id
            .parse()
            .with_context(|| format!("Line {}: invalid city id {:?}", line_of(record), raw_id))?;

        let name = field(record, city_cols::NAME, "name")?;
        let ascii_name = field(record, city_cols::ASCII_NAME, "ascii name")?;

        let countries = self.resolve_countries(
            id,
            field(record, city_cols::COUNTRY_CODE, "country code")?,
            field(record, city_cols::SECONDARY_COUNTRY_CODES, "cc2")?,
        )?;

        let state = field(record, city_cols::ADMIN_DIVISION, "admin1 code")?;
        let raw_population = field(record, city_cols::POPULATION, "population")?;
        let population: i64 = raw_population.parse().with_context(|| {
            format!("City {}: invalid population {:?}", id, raw_population)
        })?;
        let timezone = field(record, city_cols::TIMEZONE, "timezone")?;

        let mut names = vec![name, ascii_name];
        if self.use_foreign_names {
            names.extend(split_list(field(
                record,
                city_cols::ALTERNATE_NAMES,
                "alternate names",
            )?));
        }
        let aliases = checked_aliases(&names, &format!("city {}", id))?;

        Ok(CityRecord {
            id,
            names: CityNames {
                name: name.to_string(),
                aliases,
            },
            countries,
            state: state.to_string(),
            population,
            timezone: timezone.to_string(),
        })
    }
}

impl Iterator for CityReader {
    type Item = Result<CityRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e).context("Failed to read city record")),
        };
        Some(self.parse_city(&record))
    }
}
