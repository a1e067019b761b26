//! Built-in skills.
//!
//! Every skill the assistant ships with is registered here, in a fixed
//! order, at startup.

mod about;
mod movie;

use std::sync::Arc;

pub use about::AboutSkill;
pub use movie::{
    CatalogError, Genre, MovieCatalog, MovieSkill, PlexLibrary, TheaterListing, TheaterListings,
    Venue, THEATER_API,
};

use nikita_core::{Config, RegistryError, SkillRegistry};
use tracing::info;

/// Registers the built-in skills: movie, then about.
///
/// The home catalog is the Plex library named by `plex_db`, if any. No
/// theater listings provider is available by default.
pub fn builtin_registry(config: &Config) -> Result<SkillRegistry, RegistryError> {
    let catalog: Option<Arc<dyn MovieCatalog>> = config.plex_db.as_deref().map(|path| {
        info!(path = %path.display(), section = config.plex_library_section, "using plex library");
        Arc::new(PlexLibrary::open(path, config.plex_library_section)) as Arc<dyn MovieCatalog>
    });
    registry_with(catalog, None, config.recommendation_count)
}

/// Registers the built-in skills with explicit movie providers.
pub fn registry_with(
    catalog: Option<Arc<dyn MovieCatalog>>,
    listings: Option<Arc<dyn TheaterListings>>,
    recommendation_count: usize,
) -> Result<SkillRegistry, RegistryError> {
    let mut registry = SkillRegistry::new();

    let movie = MovieSkill::new(catalog, listings, recommendation_count).map_err(|source| {
        RegistryError::Rejected {
            name: MovieSkill::NAME.to_string(),
            source,
        }
    })?;
    registry.register(movie)?;

    let about = AboutSkill::new().map_err(|source| RegistryError::Rejected {
        name: AboutSkill::NAME.to_string(),
        source,
    })?;
    registry.register(about)?;

    Ok(registry)
}

/// Joins items the way they are read aloud: "a", "a or b", "a, b, or c".
pub(crate) fn spoken_list(items: &[String], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} {conjunction} {second}"),
        [rest @ .., last] => format!("{}, {conjunction} {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nikita_core::select;

    #[test]
    fn builtin_registry_orders_movie_before_about() {
        let registry = builtin_registry(&Config::default()).unwrap();
        assert_eq!(registry.names(), vec!["movie", "about"]);
    }

    #[test]
    fn builtin_skills_resolve_overlapping_triggers() {
        let registry = builtin_registry(&Config::default()).unwrap();
        assert_eq!(
            select("what movie should I watch", &registry).map(|s| s.name().to_string()),
            Some("movie".to_string())
        );
        assert_eq!(
            select("who are you", &registry).map(|s| s.name().to_string()),
            Some("about".to_string())
        );
        assert_eq!(
            select("can you recommend a movie", &registry).map(|s| s.name().to_string()),
            Some("movie".to_string())
        );
        assert!(select("what's the weather", &registry).is_none());
    }

    #[test]
    fn spoken_list_formats() {
        let items = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(spoken_list(&items(&[]), "or"), "");
        assert_eq!(spoken_list(&items(&["Clue"]), "or"), "Clue");
        assert_eq!(spoken_list(&items(&["Clue", "Elf"]), "or"), "Clue or Elf");
        assert_eq!(
            spoken_list(&items(&["Clue", "Elf", "Heat"]), "and"),
            "Clue, Elf, and Heat"
        );
    }
}
