//! Font catalog.

use crate::storage::{BoxFuture, StorageError, StorageResult};

/// Families offered when the catalog cannot be loaded.
pub const FALLBACK_FONTS: &[&str] = &[
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Courier New",
    "Verdana",
    "Impact",
];

/// Provider of the font families offered in the editor.
pub trait FontCatalog {
    /// Ordered list of family names.
    fn font_families(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;
}

/// Fixed catalog, optionally failing, for tests and offline builds.
#[derive(Debug, Clone, Default)]
pub struct StaticFontCatalog {
    families: Vec<String>,
    fail: bool,
}

impl StaticFontCatalog {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families.into_iter().map(Into::into).collect(),
            fail: false,
        }
    }

    /// A catalog whose lookups always fail.
    pub fn failing() -> Self {
        Self {
            families: Vec::new(),
            fail: true,
        }
    }
}

impl FontCatalog for StaticFontCatalog {
    fn font_families(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            if self.fail {
                return Err(StorageError::Remote("font catalog unavailable".to_string()));
            }
            Ok(self.families.clone())
        })
    }
}

/// The fallback families as owned strings.
pub fn fallback_fonts() -> Vec<String> {
    FALLBACK_FONTS.iter().map(|f| f.to_string()).collect()
}

/// Load the catalog, keeping its order and dropping blanks and duplicates.
///
/// A failed or empty catalog yields [`FALLBACK_FONTS`].
pub async fn load_font_families<F: FontCatalog + ?Sized>(catalog: &F) -> Vec<String> {
    match catalog.font_families().await {
        Ok(families) => {
            let mut out: Vec<String> = Vec::with_capacity(families.len());
            for family in families {
                let family = family.trim();
                if !family.is_empty() && !out.iter().any(|f| f == family) {
                    out.push(family.to_string());
                }
            }
            if out.is_empty() {
                log::warn!("Font catalog is empty, using fallback fonts");
                return fallback_fonts();
            }
            log::info!("Loaded {} font families", out.len());
            out
        }
        Err(e) => {
            log::warn!("Failed to load font catalog, using fallback fonts: {}", e);
            fallback_fonts()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn test_catalog_order_kept() {
        let catalog = StaticFontCatalog::new(["Roboto", " Lobster ", "", "Roboto", "Anton"]);
        assert_eq!(
            block_on(load_font_families(&catalog)),
            vec!["Roboto", "Lobster", "Anton"]
        );
    }

    #[test]
    fn test_failure_uses_fallback() {
        assert_eq!(
            block_on(load_font_families(&StaticFontCatalog::failing())),
            fallback_fonts()
        );
    }

    #[test]
    fn test_empty_uses_fallback() {
        let catalog = StaticFontCatalog::new(Vec::<String>::new());
        assert_eq!(block_on(load_font_families(&catalog)).len(), FALLBACK_FONTS.len());
    }
}
