//! Compile-time registry of analysed countries.
//!
//! Each entry is a `(id, toml_content)` pair embedded via `include_str!`.
//! Adding a country requires a TOML file in `countries/` and an entry here,
//! alongside its district `GeoJSON` in the geodata directory.

use cchf_map_geography_models::CountryDefinition;

use crate::GeographyError;

/// Number of registered countries. Enforced by a test.
#[cfg(test)]
const EXPECTED_COUNTRY_COUNT: usize = 3;

/// Embedded TOML country definitions.
const COUNTRY_TOMLS: &[(&str, &str)] = &[
    ("serbia", include_str!("../countries/serbia.toml")),
    ("pakistan", include_str!("../countries/pakistan.toml")),
    ("afghanistan", include_str!("../countries/afghanistan.toml")),
];

/// Returns all registered countries in registry order.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. These are compile-time
/// constants, so a parse failure is a development error caught by tests.
#[must_use]
pub fn all_countries() -> Vec<CountryDefinition> {
    COUNTRY_TOMLS
        .iter()
        .map(|(id, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse country definition '{id}': {e}"))
        })
        .collect()
}

/// Looks up a registered country by id or display name (case-insensitive).
///
/// # Errors
///
/// Returns [`GeographyError::UnknownCountry`] if no registered country
/// matches.
pub fn find_country(name: &str) -> Result<CountryDefinition, GeographyError> {
    let countries = all_countries();
    let known = countries
        .iter()
        .map(|c| c.id.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    countries
        .into_iter()
        .find(|c| c.matches(name))
        .ok_or_else(|| GeographyError::UnknownCountry {
            country: name.to_string(),
            known,
        })
}

/// Resolves every requested country, failing on the first unknown one.
///
/// # Errors
///
/// Returns [`GeographyError::UnknownCountry`] for the first name with no
/// registry entry.
pub fn resolve_countries<S: AsRef<str>>(
    names: &[S],
) -> Result<Vec<CountryDefinition>, GeographyError> {
    let mut resolved: Vec<CountryDefinition> = Vec::with_capacity(names.len());
    for name in names {
        let country = find_country(name.as_ref())?;
        if !resolved.iter().any(|c| c.id == country.id) {
            resolved.push(country);
        }
    }
    Ok(resolved)
}
