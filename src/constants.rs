/// Column names in the source dataset and the field names they are renamed to.
/// The source is the per-city "caso_full" export; only these columns are read.

// Source columns
pub const SRC_CITY: &str = "city";
pub const SRC_STATE: &str = "state";
pub const SRC_IS_LAST: &str = "is_last";
pub const SRC_POPULATION: &str = "estimated_population_2019";
pub const SRC_CONFIRMED: &str = "last_available_confirmed";
pub const SRC_DEATHS: &str = "last_available_deaths";

// Target table columns
pub const COL_CITY: &str = "city";
pub const COL_STATE: &str = "state";
pub const COL_POPULATION: &str = "estimated_population";
pub const COL_CONFIRMED: &str = "confirmed_cases";
pub const COL_DEATHS: &str = "deaths";

/// Every source column the loader needs, in target-column order.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    SRC_CITY,
    SRC_STATE,
    SRC_IS_LAST,
    SRC_POPULATION,
    SRC_CONFIRMED,
    SRC_DEATHS,
];

/// Target table columns, in the order they are created and inserted.
pub const TABLE_COLUMNS: [&str; 5] = [
    COL_CITY,
    COL_STATE,
    COL_POPULATION,
    COL_CONFIRMED,
    COL_DEATHS,
];

// Defaults
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_SOURCE_PATH: &str = "caso_full.csv";
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_NAME: &str = "projeto_covid";
pub const DEFAULT_TABLE: &str = "casos_cidades";
pub const DEFAULT_TOP_N: usize = 20;
pub const DEFAULT_DEATHS_CHART: &str = "grafico_mortes_por_cidade.png";
pub const DEFAULT_POPULATION_CHART: &str = "grafico_populacao_por_cidade.png";

// Environment overrides for the database section
pub const ENV_DB_BACKEND: &str = "COVID_DB_BACKEND";
pub const ENV_DB_HOST: &str = "COVID_DB_HOST";
pub const ENV_DB_PORT: &str = "COVID_DB_PORT";
pub const ENV_DB_USER: &str = "COVID_DB_USER";
pub const ENV_DB_PASSWORD: &str = "COVID_DB_PASSWORD";
pub const ENV_DB_NAME: &str = "COVID_DB_NAME";
