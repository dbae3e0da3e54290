//! Typed insert layer over the SQLite connection.
//!
//! Each table is described by a [`Row`] type. Rows whose primary key comes from the
//! source data set [`Row::USES_EXTERNAL_ID`]; every other table gets its id from SQLite.

use crate::models::{AliasId, CityId, CountryId, StateId, TimezoneId};
use crate::schema::TABLES;
use anyhow::{bail, Context, Result};
use rusqlite::{Connection, ToSql};

pub trait Row {
    const TABLE: &'static str;
    /// Data columns, excluding the primary key.
    const COLUMNS: &'static [&'static str];
    const USES_EXTERNAL_ID: bool = false;

    fn external_id(&self) -> Option<i64> {
        None
    }

    /// Values bound to [`Row::COLUMNS`], in the same order.
    fn values(&self) -> Vec<&dyn ToSql>;
}

pub struct CountryRow<'a> {
    pub source_id: i64,
    pub name: &'a str,
    pub iso2: &'a str,
    pub iso3: &'a str,
}

impl Row for CountryRow<'_> {
    const TABLE: &'static str = "countries";
    const COLUMNS: &'static [&'static str] = &["source_id", "name", "iso2", "iso3"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.source_id, &self.name, &self.iso2, &self.iso3]
    }
}

pub struct CountryAliasRow<'a> {
    pub name: &'a str,
}

impl Row for CountryAliasRow<'_> {
    const TABLE: &'static str = "country_names_aliases";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name]
    }
}

pub struct CountryAliasLink {
    pub country_id: CountryId,
    pub alias_id: AliasId,
}

impl Row for CountryAliasLink {
    const TABLE: &'static str = "countries_aliases";
    const COLUMNS: &'static [&'static str] = &["country_id", "alias_id"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.country_id.0, &self.alias_id.0]
    }
}

pub struct StateRow<'a> {
    pub country_id: CountryId,
    pub name: &'a str,
}

impl Row for StateRow<'_> {
    const TABLE: &'static str = "states";
    const COLUMNS: &'static [&'static str] = &["country_id", "name"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.country_id.0, &self.name]
    }
}

pub struct TimezoneRow<'a> {
    pub name: &'a str,
}

impl Row for TimezoneRow<'_> {
    const TABLE: &'static str = "timezones";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name]
    }
}

pub struct CityRow<'a> {
    pub id: CityId,
    pub timezone_id: TimezoneId,
    pub name: &'a str,
    pub population: i64,
}

impl Row for CityRow<'_> {
    const TABLE: &'static str = "cities";
    const COLUMNS: &'static [&'static str] = &["timezone_id", "name", "population"];
    const USES_EXTERNAL_ID: bool = true;

    fn external_id(&self) -> Option<i64> {
        Some(self.id.0)
    }

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.timezone_id.0, &self.name, &self.population]
    }
}

pub struct CityAliasRow<'a> {
    pub name: &'a str,
}

impl Row for CityAliasRow<'_> {
    const TABLE: &'static str = "city_names_aliases";
    const COLUMNS: &'static [&'static str] = &["name"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.name]
    }
}

pub struct CityAliasLink {
    pub city_id: CityId,
    pub alias_id: AliasId,
}

impl Row for CityAliasLink {
    const TABLE: &'static str = "cities_aliases";
    const COLUMNS: &'static [&'static str] = &["city_id", "alias_id"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.city_id.0, &self.alias_id.0]
    }
}

pub struct CityCountryLink {
    pub city_id: CityId,
    pub country_id: CountryId,
}

impl Row for CityCountryLink {
    const TABLE: &'static str = "cities_countries";
    const COLUMNS: &'static [&'static str] = &["city_id", "country_id"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.city_id.0, &self.country_id.0]
    }
}

pub struct CityStateLink {
    pub city_id: CityId,
    pub state_id: StateId,
}

impl Row for CityStateLink {
    const TABLE: &'static str = "cities_states";
    const COLUMNS: &'static [&'static str] = &["city_id", "state_id"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.city_id.0, &self.state_id.0]
    }
}

pub struct MetaRow {
    pub city_name_chunks_max: i64,
}

impl Row for MetaRow {
    const TABLE: &'static str = "meta";
    const COLUMNS: &'static [&'static str] = &["city_name_chunks_max"];

    fn values(&self) -> Vec<&dyn ToSql> {
        vec![&self.city_name_chunks_max]
    }
}

/// Write handle used by the loader. Borrows a connection or an open transaction.
pub struct Store<'c> {
    conn: &'c Connection,
}

impl<'c> Store<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Inserts `row` and returns its primary key.
    ///
    /// For external-id rows this is the id the caller supplied; a collision with an
    /// existing row is an error.
    pub fn insert<R: Row>(&self, row: &R) -> Result<i64> {
        let external_id = row.external_id();
        let mut columns: Vec<&str> = Vec::with_capacity(R::COLUMNS.len() + 1);
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(R::COLUMNS.len() + 1);

        match (R::USES_EXTERNAL_ID, external_id.as_ref()) {
            (true, Some(id)) => {
                columns.push("id");
                values.push(id);
            }
            (true, None) => bail!("Rows of {} must carry their source id", R::TABLE),
            (false, Some(_)) => bail!("Ids of {} are assigned by the store", R::TABLE),
            (false, None) => {}
        }
        columns.extend_from_slice(R::COLUMNS);
        values.extend(row.values());

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            R::TABLE,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .with_context(|| format!("Failed to prepare insert into {}", R::TABLE))?;
        stmt.execute(values.as_slice())
            .with_context(|| format!("Failed to insert into {}", R::TABLE))?;

        Ok(external_id.unwrap_or_else(|| self.conn.last_insert_rowid()))
    }

    pub fn count(&self, table: &str) -> Result<u64> {
        count_rows(self.conn, table)
    }

    pub fn table_counts(&self) -> Result<Vec<(&'static str, u64)>> {
        table_counts(self.conn)
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    if !TABLES.iter().any(|t| *t == table) {
        bail!("Unknown table: {}", table);
    }
    let n: i64 = conn
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .with_context(|| format!("Failed to count rows of {}", table))?;
    Ok(n as u64)
}

/// Row counts for every table, in schema order.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, u64)>> {
    TABLES
        .iter()
        .map(|&table| -> Result<(&'static str, u64)> { Ok((table, count_rows(conn, table)?)) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create(&conn).unwrap();
        conn
    }

    struct Unkeyed;

    impl Row for Unkeyed {
        const TABLE: &'static str = "cities";
        const COLUMNS: &'static [&'static str] = &["name"];
        const USES_EXTERNAL_ID: bool = true;

        fn values(&self) -> Vec<&dyn ToSql> {
            vec![&"nowhere"]
        }
    }

    #[test]
    fn surrogate_ids_are_sequential() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let a = store.insert(&TimezoneRow { name: "Europe/Paris" }).unwrap();
        let b = store.insert(&TimezoneRow { name: "Europe/Berlin" }).unwrap();
        assert_eq!(b, a + 1);
    }

    #[test]
    fn external_id_is_used_verbatim() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let tz = store.insert(&TimezoneRow { name: "Europe/Paris" }).unwrap();
        let id = store
            .insert(&CityRow {
                id: CityId(2988507),
                timezone_id: TimezoneId(tz),
                name: "Paris",
                population: 2138551,
            })
            .unwrap();
        assert_eq!(id, 2988507);

        let name: String = conn
            .query_row("SELECT name FROM cities WHERE id = 2988507", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "Paris");
    }

    #[test]
    fn duplicate_external_id_is_rejected() {
        let conn = memory_db();
        let store = Store::new(&conn);
        let tz = TimezoneId(store.insert(&TimezoneRow { name: "UTC" }).unwrap());
        let row = CityRow {
            id: CityId(1),
            timezone_id: tz,
            name: "A",
            population: 0,
        };
        store.insert(&row).unwrap();
        assert!(store.insert(&row).is_err());
    }

    #[test]
    fn external_id_rows_without_id_are_rejected() {
        let conn = memory_db();
        let store = Store::new(&conn);
        assert!(store.insert(&Unkeyed).is_err());
        assert_eq!(store.count("cities").unwrap(), 0);
    }

    #[test]
    fn count_rejects_unknown_tables() {
        let conn = memory_db();
        assert!(count_rows(&conn, "sqlite_master; DROP TABLE cities").is_err());
    }

    #[test]
    fn table_counts_cover_every_table() {
        let conn = memory_db();
        let store = Store::new(&conn);
        store.insert(&MetaRow { city_name_chunks_max: 3 }).unwrap();
        let counts = store.table_counts().unwrap();
        assert_eq!(counts.len(), TABLES.len());
        assert_eq!(counts[0], ("meta", 1));
    }
}
