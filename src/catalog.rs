//! Catalog items and deterministic query/FileKey derivation
//!
//! A [`CatalogItem`] is immutable for a run. Its search query and FileKey are
//! pure functions of the item: the same item always yields the same strings,
//! so output filenames are stable across runs and the skip-if-exists check in
//! the acquisition loop can key off them.

/// Characters that are unsafe in filenames across platforms
const UNSAFE_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// One target device in the acquisition catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Product series (e.g. "Fenix")
    pub series: &'static str,
    /// Product name within the series
    pub product: &'static str,
    /// Model qualifier, absent for base models
    pub model: Option<&'static str>,
}

impl CatalogItem {
    /// Human-readable label, used in search queries and classifier prompts
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.model {
            Some(model) => format!("Garmin {} {}", self.product, model),
            None => format!("Garmin {}", self.product),
        }
    }

    /// Image search query for this item
    #[must_use]
    pub fn search_query(&self) -> String {
        format!(
            "{} watch product photo official front facing high resolution",
            self.full_name()
        )
    }

    /// Filesystem-safe canonical filename stem for this item
    ///
    /// Distinct items are assumed not to collide after sanitization; a
    /// collision would be a catalog bug, not a runtime condition.
    #[must_use]
    pub fn file_key(&self) -> String {
        let raw = match self.model {
            Some(model) => format!("{}_{}_{}", self.series, self.product, model),
            None => format!("{}_{}", self.series, self.product),
        };
        sanitize_file_stem(&raw)
    }

    /// The static catalog of music-capable Garmin watches targeted by a run
    #[must_use]
    pub fn music_catalog() -> Vec<CatalogItem> {
        const CATALOG: &[(&str, &str, Option<&str>)] = &[
            ("Forerunner", "Forerunner", Some("245_Music")),
            ("Forerunner", "Forerunner", Some("645_Music")),
            ("Forerunner", "Forerunner", Some("945")),
            ("Forerunner", "Forerunner", Some("955")),
            ("Forerunner", "Forerunner", Some("965")),
            ("Fenix", "Fenix", Some("5_Plus")),
            ("Fenix", "Fenix", Some("5_Plus_Sapphire")),
            ("Fenix", "Fenix", Some("5X_Plus")),
            ("Fenix", "Fenix", Some("5X_Plus_Sapphire")),
            ("Fenix", "Fenix", Some("6_Pro")),
            ("Fenix", "Fenix", Some("6S_Pro")),
            ("Fenix", "Fenix", Some("6S_Pro_Solar")),
            ("Fenix", "Fenix", Some("6X_Pro_Solar")),
            ("Fenix", "Fenix", Some("7")),
            ("Fenix", "Fenix", Some("7S")),
            ("Fenix", "Fenix", Some("7X")),
            ("Vivoactive", "Vivoactive", Some("3_Music")),
            ("Vivoactive", "Vivoactive", Some("3_Music_Verizon")),
            ("Vivoactive", "Vivoactive", Some("4")),
            ("Vivoactive", "Vivoactive", Some("5")),
            ("Venu", "Venu", None),
            ("Venu", "Venu_Sq", Some("Music")),
            ("Venu", "Venu", Some("2")),
            ("Venu", "Venu", Some("2_Plus")),
            ("D2", "D2", Some("Delta")),
            ("D2", "D2", Some("Air")),
            ("Enduro", "Enduro", Some("2_Music")),
            ("MARQ", "MARQ", Some("Athlete")),
            ("MARQ", "MARQ", Some("Commander")),
            ("MARQ", "MARQ", Some("Adventurer")),
            ("MARQ", "MARQ", Some("Aviator")),
        ];

        CATALOG
            .iter()
            .map(|&(series, product, model)| CatalogItem {
                series,
                product,
                model,
            })
            .collect()
    }
}

/// Replace filesystem-unsafe characters with underscores
#[must_use]
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}
