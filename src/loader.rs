//! Single-pass, deduplicating loader for the entity graph.
//!
//! Every entity except cities gets a surrogate id from the store. The [`Loader`] keeps
//! one idempotency cache per entity so that nothing is inserted twice:
//!
//! - countries by ISO2 code
//! - country and city name aliases by lower-case spelling (separate namespaces)
//! - states by `(country id, lower-case name)`, so equal names in different countries
//!   stay distinct
//! - timezones by lower-case name
//!
//! The caches live only as long as the loader.

use crate::alias::name_token_count;
use crate::config::PROGRESS_INTERVAL;
use crate::models::{AliasId, CityId, CityRecord, CountryId, CountryRecord, StateId, TimezoneId};
use crate::store::{
    CityAliasLink, CityAliasRow, CityCountryLink, CityRow, CityStateLink, CountryAliasLink,
    CountryAliasRow, CountryRow, MetaRow, StateRow, Store, TimezoneRow,
};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

/// Counters for one load run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub cities_read: u64,
    pub cities_inserted: u64,
    pub countries: u64,
    pub country_aliases: u64,
    pub states: u64,
    pub timezones: u64,
    pub city_aliases: u64,
    pub city_alias_links: u64,
    pub max_name_tokens: usize,
}

impl LoadStats {
    /// Whether every streamed city ended up in the store.
    pub fn is_consistent(&self) -> bool {
        self.cities_read == self.cities_inserted
    }
}

#[derive(Default)]
pub struct Loader {
    country_by_iso2: FxHashMap<String, CountryId>,
    country_alias_by_name: FxHashMap<String, AliasId>,
    state_by_key: FxHashMap<(CountryId, String), StateId>,
    timezone_by_name: FxHashMap<String, TimezoneId>,
    city_alias_by_name: FxHashMap<String, AliasId>,
    stats: LoadStats,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    fn resolve_country(&mut self, store: &Store, country: &CountryRecord) -> Result<CountryId> {
        if let Some(&id) = self.country_by_iso2.get(&country.iso2) {
            return Ok(id);
        }

        let id = CountryId(
            store
                .insert(&CountryRow {
                    source_id: country.source_id,
                    name: &country.name,
                    iso2: &country.iso2,
                    iso3: &country.iso3,
                })
                .with_context(|| format!("Failed to insert country {}", country.iso2))?,
        );
        self.country_by_iso2.insert(country.iso2.clone(), id);
        self.stats.countries += 1;
        debug!(iso2 = %country.iso2, id = %id, "Inserted country");

        for alias in &country.aliases {
            let key = alias.to_lowercase();
            let alias_id = match self.country_alias_by_name.get(&key) {
                Some(&alias_id) => alias_id,
                None => {
                    let alias_id = AliasId(store.insert(&CountryAliasRow { name: alias })?);
                    self.country_alias_by_name.insert(key, alias_id);
                    self.stats.country_aliases += 1;
                    alias_id
                }
            };
            store.insert(&CountryAliasLink {
                country_id: id,
                alias_id,
            })?;
        }

        Ok(id)
    }

    fn resolve_state(&mut self, store: &Store, country_id: CountryId, name: &str) -> Result<StateId> {
        let key = (country_id, name.to_lowercase());
        if let Some(&id) = self.state_by_key.get(&key) {
            return Ok(id);
        }
        let id = StateId(store.insert(&StateRow { country_id, name })?);
        self.state_by_key.insert(key, id);
        self.stats.states += 1;
        Ok(id)
    }

    fn resolve_timezone(&mut self, store: &Store, name: &str) -> Result<TimezoneId> {
        let key = name.to_lowercase();
        if let Some(&id) = self.timezone_by_name.get(&key) {
            return Ok(id);
        }
        let id = TimezoneId(store.insert(&TimezoneRow { name })?);
        self.timezone_by_name.insert(key, id);
        self.stats.timezones += 1;
        Ok(id)
    }

    fn resolve_city_alias(&mut self, store: &Store, alias: &str) -> Result<AliasId> {
        let key = alias.to_lowercase();
        if let Some(&id) = self.city_alias_by_name.get(&key) {
            return Ok(id);
        }
        let id = AliasId(store.insert(&CityAliasRow { name: alias })?);
        self.city_alias_by_name.insert(key, id);
        self.stats.city_aliases += 1;
        Ok(id)
    }

    /// Inserts one city together with every entity and link it needs.
    pub fn insert_city(&mut self, store: &Store, city: &CityRecord) -> Result<()> {
        self.stats.cities_read += 1;
        let city_id = CityId(city.id);

        let mut country_ids = Vec::with_capacity(city.countries.len());
        for country in &city.countries {
            country_ids.push(self.resolve_country(store, country)?);
        }

        // The Nth state belongs to the Nth country.
        let mut state_ids = Vec::with_capacity(country_ids.len());
        for &country_id in &country_ids {
            state_ids.push(self.resolve_state(store, country_id, &city.state)?);
        }
        debug_assert_eq!(country_ids.len(), state_ids.len());

        let timezone_id = self.resolve_timezone(store, &city.timezone)?;

        self.stats.max_name_tokens = self
            .stats
            .max_name_tokens
            .max(name_token_count(&city.names.name));

        store
            .insert(&CityRow {
                id: city_id,
                timezone_id,
                name: &city.names.name,
                population: city.population,
            })
            .with_context(|| format!("Failed to insert city {} (duplicate id?)", city.id))?;

        for alias in &city.names.aliases {
            let alias_id = self.resolve_city_alias(store, alias)?;
            store.insert(&CityAliasLink { city_id, alias_id })?;
            self.stats.city_alias_links += 1;
        }

        for &country_id in &country_ids {
            store.insert(&CityCountryLink {
                city_id,
                country_id,
            })?;
        }
        for &state_id in &state_ids {
            store.insert(&CityStateLink { city_id, state_id })?;
        }

        Ok(())
    }

    /// Persists the meta record and checks the stored city count against the stream.
    pub fn finish(mut self, store: &Store) -> Result<LoadStats> {
        store.insert(&MetaRow {
            city_name_chunks_max: self.stats.max_name_tokens as i64,
        })?;

        self.stats.cities_inserted = store.count("cities")?;
        if !self.stats.is_consistent() {
            warn!(
                inserted = self.stats.cities_inserted,
                read = self.stats.cities_read,
                "Cities inserted does not match cities read from file"
            );
        }
        Ok(self.stats)
    }
}

/// Loads a whole city stream into `store` and writes the meta record.
///
/// The first failing record aborts the load; the caller is expected to discard the
/// partially written store.
pub fn load_cities<I>(store: &Store, cities: I) -> Result<LoadStats>
where
    I: IntoIterator<Item = Result<CityRecord>>,
{
    let mut loader = Loader::new();
    let pb = ProgressBar::new_spinner();

    for city in cities {
        let city = city?;
        loader.insert_city(store, &city)?;

        let n = loader.stats().cities_read;
        if n % PROGRESS_INTERVAL == 0 {
            pb.set_message(format!("{} cities", n));
            pb.tick();
            info!(cities = n, "Inserted cities");
        }
    }
    pb.finish_and_clear();

    let stats = loader.finish(store)?;
    info!(
        cities = stats.cities_inserted,
        countries = stats.countries,
        states = stats.states,
        timezones = stats.timezones,
        city_aliases = stats.city_aliases,
        country_aliases = stats.country_aliases,
        max_name_tokens = stats.max_name_tokens,
        "Load complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::derive_aliases;
    use crate::models::CityNames;
    use crate::schema;
    use rusqlite::Connection;
    use std::rc::Rc;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create(&conn).unwrap();
        conn
    }

    fn country(iso2: &str, iso3: &str, name: &str, source_id: i64) -> Rc<CountryRecord> {
        Rc::new(CountryRecord {
            source_id,
            iso2: iso2.to_string(),
            iso3: iso3.to_string(),
            name: name.to_string(),
            aliases: derive_aliases(&[name]),
        })
    }

    fn city(id: i64, name: &str, countries: &[&Rc<CountryRecord>], state: &str, tz: &str) -> CityRecord {
        CityRecord {
            id,
            names: CityNames {
                name: name.to_string(),
                aliases: derive_aliases(&[name]),
            },
            countries: countries.iter().map(|c| Rc::clone(c)).collect(),
            state: state.to_string(),
            population: 20000,
            timezone: tz.to_string(),
        }
    }

    fn scalar(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn country_is_inserted_once_per_iso2() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let us = country("US", "USA", "United States", 6252001);
        let cities = vec![
            Ok(city(1, "Austin", &[&us], "TX", "America/Chicago")),
            Ok(city(2, "Dallas", &[&us], "TX", "America/Chicago")),
            Ok(city(3, "Boston", &[&us], "MA", "America/New_York")),
        ];

        let stats = load_cities(&store, cities).unwrap();

        assert_eq!(stats.countries, 1);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM countries"), 1);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM countries_aliases"), 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM states"), 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM timezones"), 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM cities"), 3);
        assert!(stats.is_consistent());
    }

    #[test]
    fn same_state_name_in_two_countries_yields_two_rows() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let gh = country("GH", "GHA", "Ghana", 2300660);
        let ke = country("KE", "KEN", "Kenya", 192950);
        let cities = vec![
            Ok(city(1, "Cape Coast", &[&gh], "Central", "Africa/Accra")),
            Ok(city(2, "Nyeri", &[&ke], "Central", "Africa/Nairobi")),
            Ok(city(3, "Winneba", &[&gh], "central", "Africa/Accra")),
        ];

        let stats = load_cities(&store, cities).unwrap();

        assert_eq!(stats.states, 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM states WHERE name = 'Central'"), 2);
        assert_eq!(
            scalar(&conn, "SELECT COUNT(DISTINCT country_id) FROM states"),
            2
        );
    }

    #[test]
    fn multi_country_city_links_states_positionally() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let us = country("US", "USA", "United States", 6252001);
        let ca = country("CA", "CAN", "Canada", 6251999);

        load_cities(&store, vec![Ok(city(9, "Border", &[&us, &ca], "01", "UTC"))]).unwrap();

        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM cities_countries WHERE city_id = 9"), 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM cities_states WHERE city_id = 9"), 2);
        // every linked state belongs to a linked country
        assert_eq!(
            scalar(
                &conn,
                "SELECT COUNT(*) FROM cities_states cs
                 JOIN states s ON s.id = cs.state_id
                 JOIN cities_countries cc ON cc.city_id = cs.city_id AND cc.country_id = s.country_id
                 WHERE cs.city_id = 9"
            ),
            2
        );
    }

    #[test]
    fn country_aliases_are_shared_across_countries() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let cg = Rc::new(CountryRecord {
            source_id: 1,
            iso2: "CG".into(),
            iso3: "COG".into(),
            name: "Republic of the Congo".into(),
            aliases: vec!["Congo".into(), "Republic of the Congo".into()],
        });
        let cd = Rc::new(CountryRecord {
            source_id: 2,
            iso2: "CD".into(),
            iso3: "COD".into(),
            name: "DR Congo".into(),
            aliases: vec!["CONGO".into(), "DR Congo".into()],
        });

        let stats = load_cities(
            &store,
            vec![
                Ok(city(1, "Brazzaville", &[&cg], "12", "Africa/Brazzaville")),
                Ok(city(2, "Kinshasa", &[&cd], "06", "Africa/Kinshasa")),
            ],
        )
        .unwrap();

        assert_eq!(stats.country_aliases, 3);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM country_names_aliases"), 3);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM countries_aliases"), 4);
        assert_eq!(
            scalar(
                &conn,
                "SELECT COUNT(*) FROM view_search_by_country_name WHERE name_alias = 'Congo'"
            ),
            2
        );
    }

    #[test]
    fn city_aliases_are_shared_and_linked() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let us = country("US", "USA", "United States", 6252001);
        let cities = vec![
            Ok(city(1, "Springfield", &[&us], "IL", "America/Chicago")),
            Ok(city(2, "Springfield", &[&us], "MA", "America/New_York")),
        ];

        let stats = load_cities(&store, cities).unwrap();

        assert_eq!(stats.city_aliases, 1);
        assert_eq!(stats.city_alias_links, 2);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM city_names_aliases"), 1);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM cities_aliases"), 2);
    }

    #[test]
    fn meta_holds_max_name_token_count() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let br = country("BR", "BRA", "Brazil", 3469034);
        let cities = vec![
            Ok(city(1, "Rio de Janeiro", &[&br], "21", "America/Sao_Paulo")),
            Ok(city(2, "Recife", &[&br], "30", "America/Recife")),
        ];

        let stats = load_cities(&store, cities).unwrap();

        assert_eq!(stats.max_name_tokens, 3);
        assert_eq!(scalar(&conn, "SELECT city_name_chunks_max FROM meta"), 3);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM meta"), 1);
    }

    #[test]
    fn city_keeps_its_source_id() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let fr = country("FR", "FRA", "France", 3017382);

        load_cities(&store, vec![Ok(city(2988507, "Paris", &[&fr], "11", "Europe/Paris"))])
            .unwrap();

        assert_eq!(scalar(&conn, "SELECT id FROM cities"), 2988507);
    }

    #[test]
    fn duplicate_city_id_is_fatal() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let fr = country("FR", "FRA", "France", 3017382);
        let cities = vec![
            Ok(city(42, "Lyon", &[&fr], "84", "Europe/Paris")),
            Ok(city(42, "Lyon bis", &[&fr], "84", "Europe/Paris")),
        ];

        let err = load_cities(&store, cities).unwrap_err();
        assert!(format!("{:#}", err).contains("city 42"));
    }

    #[test]
    fn stream_error_aborts_the_load() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let cities: Vec<Result<CityRecord>> = vec![Err(anyhow::anyhow!("bad line"))];
        assert!(load_cities(&store, cities).is_err());
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM meta"), 0);
    }

    #[test]
    fn timezone_lookup_ignores_case() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let fr = country("FR", "FRA", "France", 3017382);
        let cities = vec![
            Ok(city(1, "Paris", &[&fr], "11", "Europe/Paris")),
            Ok(city(2, "Lille", &[&fr], "32", "europe/paris")),
        ];

        let stats = load_cities(&store, cities).unwrap();
        assert_eq!(stats.timezones, 1);
    }

    #[test]
    fn count_mismatch_is_reported_not_fatal() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let tz = TimezoneId(store.insert(&TimezoneRow { name: "Etc/UTC" }).unwrap());
        store
            .insert(&CityRow {
                id: CityId(99),
                timezone_id: tz,
                name: "Stray",
                population: 0,
            })
            .unwrap();
        let fr = country("FR", "FRA", "France", 3017382);

        let stats =
            load_cities(&store, vec![Ok(city(1, "Nice", &[&fr], "93", "Europe/Paris"))]).unwrap();

        assert_eq!(stats.cities_read, 1);
        assert_eq!(stats.cities_inserted, 2);
        assert!(!stats.is_consistent());
        assert_eq!(stats.timezones, 1);
        assert_eq!(scalar(&conn, "SELECT COUNT(*) FROM meta"), 1);
        assert_eq!(scalar(&conn, "SELECT city_name_chunks_max FROM meta"), 1);
    }

    #[test]
    fn empty_stream_still_writes_meta() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let stats = load_cities(&store, Vec::<Result<CityRecord>>::new()).unwrap();
        assert_eq!(stats, LoadStats::default());
        assert_eq!(scalar(&conn, "SELECT city_name_chunks_max FROM meta"), 0);
    }
}
