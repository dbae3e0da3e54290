use anyhow::{Context, Result};
use rusqlite::Connection;

/// Tables in dependency order (parents before children).
pub const TABLES: &[&str] = &[
    "meta",
    "countries",
    "country_names_aliases",
    "countries_aliases",
    "states",
    "timezones",
    "cities",
    "cities_countries",
    "cities_states",
    "city_names_aliases",
    "cities_aliases",
];

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    city_name_chunks_max INTEGER);

CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER,
    name TEXT COLLATE NOCASE,
    iso2 TEXT UNIQUE COLLATE NOCASE,
    iso3 TEXT UNIQUE COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS country_names_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS countries_aliases (
    country_id INTEGER,
    alias_id INTEGER,
    UNIQUE(country_id, alias_id),
    FOREIGN KEY(country_id) REFERENCES countries(id) ON DELETE CASCADE,
    FOREIGN KEY(alias_id) REFERENCES country_names_aliases(id) ON DELETE CASCADE);

CREATE TABLE IF NOT EXISTS states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    country_id INTEGER,
    name TEXT COLLATE NOCASE,
    UNIQUE(country_id, name),
    FOREIGN KEY(country_id) REFERENCES countries(id) ON DELETE CASCADE);

CREATE TABLE IF NOT EXISTS timezones (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT COLLATE NOCASE UNIQUE);

CREATE TABLE IF NOT EXISTS cities (
    id INTEGER PRIMARY KEY,
    timezone_id INTEGER,
    name TEXT COLLATE NOCASE,
    population INTEGER,
    FOREIGN KEY(timezone_id) REFERENCES timezones(id) ON DELETE CASCADE);

CREATE TABLE IF NOT EXISTS cities_countries (
    city_id INTEGER,
    country_id INTEGER,
    UNIQUE(city_id, country_id),
    FOREIGN KEY(city_id) REFERENCES cities(id) ON DELETE CASCADE,
    FOREIGN KEY(country_id) REFERENCES countries(id) ON DELETE CASCADE);

CREATE TABLE IF NOT EXISTS cities_states (
    city_id INTEGER,
    state_id INTEGER,
    UNIQUE(city_id, state_id),
    FOREIGN KEY(city_id) REFERENCES cities(id) ON DELETE CASCADE,
    FOREIGN KEY(state_id) REFERENCES states(id) ON DELETE CASCADE);

CREATE TABLE IF NOT EXISTS city_names_aliases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS cities_aliases (
    city_id INTEGER,
    alias_id INTEGER,
    UNIQUE(city_id, alias_id),
    FOREIGN KEY(city_id) REFERENCES cities(id) ON DELETE CASCADE,
    FOREIGN KEY(alias_id) REFERENCES city_names_aliases(id) ON DELETE CASCADE);

CREATE INDEX IF NOT EXISTS countries_iso2_idx ON countries(iso2 COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS countries_iso3_idx ON countries(iso3 COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS country_names_aliases_name_idx ON country_names_aliases(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS countries_aliases_country_id_idx ON countries_aliases(country_id);
CREATE INDEX IF NOT EXISTS countries_aliases_alias_id_idx ON countries_aliases(alias_id);
CREATE INDEX IF NOT EXISTS states_name_idx ON states(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS cities_population_idx ON cities(population);
CREATE INDEX IF NOT EXISTS city_names_aliases_name_idx ON city_names_aliases(name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS cities_aliases_city_id_idx ON cities_aliases(city_id);
CREATE INDEX IF NOT EXISTS cities_aliases_alias_id_idx ON cities_aliases(alias_id);
CREATE INDEX IF NOT EXISTS cities_countries_city_id_idx ON cities_countries(city_id);
CREATE INDEX IF NOT EXISTS cities_countries_country_id_idx ON cities_countries(country_id);
CREATE INDEX IF NOT EXISTS cities_states_city_id_idx ON cities_states(city_id);
CREATE INDEX IF NOT EXISTS cities_states_state_id_idx ON cities_states(state_id);
CREATE INDEX IF NOT EXISTS timezones_name_idx ON timezones(name COLLATE NOCASE);

CREATE VIEW IF NOT EXISTS view_search_by_city_name AS
SELECT
    ct.id id, ct.name name, ctna.name name_alias, ct.population population,
    s.id state_id, s.name state_name,
    c.id country_id, c.name country_name, c.iso2 country_iso2, c.iso3 country_iso3,
    t.name timezone
FROM cities ct
INNER JOIN timezones t ON t.id = ct.timezone_id
INNER JOIN cities_countries cc ON cc.city_id = ct.id
INNER JOIN countries c ON c.id = cc.country_id
INNER JOIN cities_states cs ON cs.city_id = ct.id
INNER JOIN states s ON s.id = cs.state_id AND s.country_id = c.id
INNER JOIN cities_aliases cta ON cta.city_id = ct.id
INNER JOIN city_names_aliases ctna ON ctna.id = cta.alias_id;

CREATE VIEW IF NOT EXISTS view_search_by_country_name AS
SELECT
    c.id id, c.name name, cna.name name_alias, c.iso2 iso2, c.iso3 iso3
FROM countries c
INNER JOIN countries_aliases ca ON ca.country_id = c.id
INNER JOIN country_names_aliases cna ON cna.id = ca.alias_id;
"#;

/// Enables foreign key enforcement for this connection.
pub fn enable_foreign_keys(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("Failed to enable foreign keys")
}

/// Creates every table, index and view. Safe to run on an existing database.
pub fn create(conn: &Connection) -> Result<()> {
    enable_foreign_keys(conn)?;
    conn.execute_batch(SCHEMA)
        .context("Failed to create database schema")
}
