use std::path::{Path, PathBuf};

/// Progress update interval (tick every N cities)
pub const PROGRESS_INTERVAL: u64 = 1000;

pub const COUNTRIES_FILE: &str = "countryInfo.txt";
pub const COUNTRY_ALIASES_FILE: &str = "countryinfo_alts.txt";
pub const CITIES_FILE: &str = "cities15000.txt";

pub const DB_BASENAME: &str = "cities";
pub const DB_BASENAME_FULL: &str = "cities-full";
pub const DB_EXTENSION: &str = "sqlite3";

/// Column offsets in `countryInfo.txt`
pub mod country_cols {
    pub const ISO2: usize = 0;
    pub const ISO3: usize = 1;
    pub const NAME: usize = 4;
    pub const SOURCE_ID: usize = 16;
}

/// Column offsets in the `citiesNNNN.txt` dumps
pub mod city_cols {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const ASCII_NAME: usize = 2;
    pub const ALTERNATE_NAMES: usize = 3;
    pub const COUNTRY_CODE: usize = 8;
    pub const SECONDARY_COUNTRY_CODES: usize = 9;
    pub const ADMIN_DIVISION: usize = 10;
    pub const POPULATION: usize = 14;
    pub const TIMEZONE: usize = 17;
}

/// Locations of the reference files read by one build.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub countries: PathBuf,
    pub country_aliases: PathBuf,
    pub cities: PathBuf,
    pub use_foreign_names: bool,
}

impl SourcePaths {
    pub fn in_dir(data_dir: impl AsRef<Path>, use_foreign_names: bool) -> Self {
        let dir = data_dir.as_ref();
        Self {
            countries: dir.join(COUNTRIES_FILE),
            country_aliases: dir.join(COUNTRY_ALIASES_FILE),
            cities: dir.join(CITIES_FILE),
            use_foreign_names,
        }
    }
}

/// File name of the published database for the given build flavour.
pub fn db_file_name(use_foreign_names: bool) -> String {
    let base = if use_foreign_names {
        DB_BASENAME_FULL
    } else {
        DB_BASENAME
    };
    format!("{}.{}", base, DB_EXTENSION)
}
