//! Movie recommendations, at home from a Plex library or at the theater.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use nikita_core::dialogue::{DialogueSession, Slot};
use nikita_core::text::{contains_word, yes_or_no};
use nikita_core::{ConversationContext, Mic, Skill, SpeechPriority, TriggerSet};
use rand::seq::SliceRandom;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use thiserror::Error;
use tracing::{info, warn};

use super::spoken_list;

/// API name recorded in the usage counters for theater lookups.
pub const THEATER_API: &str = "Rotten Tomatoes";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Home,
    Theater,
}

fn extract_venue(text: &str) -> Option<Venue> {
    if contains_word(text, "home") {
        Some(Venue::Home)
    } else if ["theater", "theatre", "theaters", "cinema", "movies"]
        .iter()
        .any(|w| contains_word(text, w))
    {
        Some(Venue::Theater)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Genre {
    Comedy,
    Drama,
    Romantic,
    Action,
    Crime,
    Thriller,
    Mystery,
}

impl Genre {
    /// Words that select each genre, checked in order.
    const SYNONYMS: [(Genre, &'static [&'static str]); 7] = [
        (Genre::Comedy, &["comedy", "comedies", "funny"]),
        (Genre::Drama, &["drama", "dramas"]),
        (Genre::Romantic, &["romantic", "love", "romance"]),
        (Genre::Action, &["action"]),
        (Genre::Crime, &["crime"]),
        (Genre::Thriller, &["thriller", "thrillers", "scary"]),
        (Genre::Mystery, &["mystery", "mysteries"]),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comedy => "comedy",
            Self::Drama => "drama",
            Self::Romantic => "romantic",
            Self::Action => "action",
            Self::Crime => "crime",
            Self::Thriller => "thriller",
            Self::Mystery => "mystery",
        }
    }

    /// Genre tag as stored in Plex's `tags_genre` column.
    pub fn plex_tag(&self) -> &'static str {
        match self {
            Self::Comedy => "Comedy",
            Self::Drama => "Drama",
            Self::Romantic => "Romance",
            Self::Action => "Action",
            Self::Crime => "Crime",
            Self::Thriller => "Thriller",
            Self::Mystery => "Mystery",
        }
    }

    pub fn extract(text: &str) -> Option<Self> {
        Self::SYNONYMS
            .iter()
            .find(|(_, words)| words.iter().any(|w| contains_word(text, w)))
            .map(|(genre, _)| *genre)
    }
}

/// Titles available to watch at home.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Every title tagged with `genre`, best rated last.
    async fn titles(&self, genre: Genre) -> Result<Vec<String>, CatalogError>;
}

/// A movie currently showing in theaters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TheaterListing {
    pub title: String,
    pub audience_score: i32,
    pub release_date: NaiveDate,
}

/// Source of current theater listings.
#[async_trait]
pub trait TheaterListings: Send + Sync {
    /// Name counted in the API usage table.
    fn api_name(&self) -> &str {
        THEATER_API
    }

    async fn in_theaters(&self) -> Result<Vec<TheaterListing>, CatalogError>;
}

/// Home catalog backed by a Plex Media Server library database.
#[derive(Debug, Clone)]
pub struct PlexLibrary {
    pool: Pool<Sqlite>,
    section: i64,
}

impl PlexLibrary {
    /// Opens the database read-only. Connecting is deferred to the first
    /// query, so a missing file surfaces as an unavailable catalog.
    pub fn open(db_path: &Path, section: i64) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);
        Self { pool, section }
    }
}

#[async_trait]
impl MovieCatalog for PlexLibrary {
    async fn titles(&self, genre: Genre) -> Result<Vec<String>, CatalogError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT title FROM metadata_items \
             WHERE library_section_id = ?1 AND tags_genre LIKE ?2 ORDER BY rating",
        )
        .bind(self.section)
        .bind(format!("%{}%", genre.plex_tag()))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}

/// Recommends something to watch.
pub struct MovieSkill {
    triggers: TriggerSet,
    catalog: Option<Arc<dyn MovieCatalog>>,
    listings: Option<Arc<dyn TheaterListings>>,
    count: usize,
    venue_slot: Slot<Venue>,
    genre_slot: Slot<Genre>,
}

impl std::fmt::Debug for MovieSkill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieSkill")
            .field("has_catalog", &self.catalog.is_some())
            .field("has_listings", &self.listings.is_some())
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

impl MovieSkill {
    pub const NAME: &'static str = "movie";
    pub const PRIORITY: i32 = 3;

    pub fn new(
        catalog: Option<Arc<dyn MovieCatalog>>,
        listings: Option<Arc<dyn TheaterListings>>,
        count: usize,
    ) -> Result<Self, nikita_core::TriggerError> {
        let venue_slot = Slot::new("where", extract_venue, Venue::Home)
            .with_reprompt(
                "I didn't catch that. Do you want to find a movie to watch at home \
                 or at the movie theater?",
            )
            .with_fallback_notice(
                "I'm sorry. We seem to be having trouble getting on the same page. \
                 I'm going to assume you're looking for a movie to watch at home.",
            );
        let genre_slot = Slot::new("genre", Genre::extract, Genre::Comedy)
            .with_reprompt(
                "I'm sorry. I don't understand the type of movie you're looking for. \
                 Please say a genre such as comedy, action, romance, et cetera.",
            )
            .with_fallback_notice(
                "I'm sorry. I can't find the genre you're inquiring about. \
                 I'm going to pick a genre for you.",
            );

        Ok(Self {
            triggers: TriggerSet::new(["movie"])?,
            catalog,
            listings,
            count: count.max(1),
            venue_slot,
            genre_slot,
        })
    }

    async fn at_home(
        &self,
        utterance: &str,
        mic: &mut dyn Mic,
        session: &mut DialogueSession,
    ) -> eyre::Result<()> {
        let genre = match Genre::extract(utterance) {
            Some(genre) => genre,
            None => {
                session
                    .ask(mic, &self.genre_slot, "What type of movie would you like to watch?")
                    .await?
                    .value
            }
        };

        let titles = match &self.catalog {
            Some(catalog) => catalog.titles(genre).await,
            None => Err(CatalogError::Unavailable("no home library configured".to_string())),
        };
        let titles = match titles {
            Ok(titles) => titles,
            Err(e) => {
                warn!(error = %e, genre = genre.as_str(), "home catalog lookup failed");
                mic.say(
                    SpeechPriority::Alert,
                    "I'm sorry, the Plex server is currently unavailable. Please try again later.",
                )
                .await?;
                return Ok(());
            }
        };

        if titles.is_empty() {
            mic.say(
                SpeechPriority::Alert,
                &format!("I couldn't find any {} movies in your library.", genre.as_str()),
            )
            .await?;
            return Ok(());
        }

        let first = sample(&titles, self.count, &[]);
        info!(genre = genre.as_str(), picks = ?first, "recommending home movies");
        mic.say(
            SpeechPriority::Info,
            &format!(
                "I recommend {}. Do any of these sound good?",
                spoken_list(&first, "or")
            ),
        )
        .await?;

        if yes_or_no(&mic.listen_actively().await?) {
            mic.say(SpeechPriority::Alert, "Happy to be of help. Enjoy your movie!")
                .await?;
            return Ok(());
        }

        let second = sample(&titles, self.count, &first);
        mic.say(
            SpeechPriority::Info,
            &format!(
                "I think {} would also be good. I hope this was helpful.",
                spoken_list(&second, "or")
            ),
        )
        .await?;
        Ok(())
    }

    async fn at_theater(&self, mic: &mut dyn Mic, ctx: &ConversationContext) -> eyre::Result<()> {
        let Some(listings) = &self.listings else {
            mic.say(
                SpeechPriority::Alert,
                "I'm sorry, theater listings are currently unavailable.",
            )
            .await?;
            return Ok(());
        };

        let movies = match listings.in_theaters().await {
            Ok(movies) => movies,
            Err(e) => {
                warn!(error = %e, "theater listings lookup failed");
                mic.say(
                    SpeechPriority::Alert,
                    "I'm sorry, theater listings are currently unavailable. Please try again later.",
                )
                .await?;
                return Ok(());
            }
        };
        if let Err(e) = ctx.memory.record_api_call(listings.api_name()).await {
            warn!(error = %e, api = listings.api_name(), "failed to record api usage");
        }

        if movies.is_empty() {
            mic.say(
                SpeechPriority::Alert,
                "I couldn't find any movies showing in theaters right now.",
            )
            .await?;
            return Ok(());
        }

        let words = theater_summary(&movies, self.count);
        mic.say(SpeechPriority::Alert, &words).await?;
        mic.say(
            SpeechPriority::Alert,
            "Would you like me to repeat those listings?",
        )
        .await?;
        if yes_or_no(&mic.listen_actively().await?) {
            mic.say(SpeechPriority::Alert, "OK, try to pay attention this time.")
                .await?;
            mic.say(SpeechPriority::Alert, &format!("{words} Enjoy the show!"))
                .await?;
        } else {
            mic.say(SpeechPriority::Alert, "OK, enjoy the show!").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Skill for MovieSkill {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    async fn handle(
        &self,
        utterance: &str,
        mic: &mut dyn Mic,
        session: &mut DialogueSession,
        ctx: &ConversationContext,
    ) -> eyre::Result<()> {
        let venue = match extract_venue(utterance) {
            Some(venue) => venue,
            None => {
                session
                    .ask(
                        mic,
                        &self.venue_slot,
                        "Are you looking for a movie to watch at home or at the theater?",
                    )
                    .await?
                    .value
            }
        };

        match venue {
            Venue::Home => self.at_home(utterance, mic, session).await,
            Venue::Theater => self.at_theater(mic, ctx).await,
        }
    }
}

/// Picks up to `count` random titles, avoiding `exclude` while enough
/// other titles remain.
fn sample(titles: &[String], count: usize, exclude: &[String]) -> Vec<String> {
    let fresh: Vec<&String> = titles.iter().filter(|t| !exclude.contains(t)).collect();
    let pool: Vec<&String> = if fresh.is_empty() {
        titles.iter().collect()
    } else {
        fresh
    };
    let mut rng = rand::thread_rng();
    pool.choose_multiple(&mut rng, count)
        .map(|t| (*t).clone())
        .collect()
}

/// Top rated and most recent titles, read aloud as two sentences.
fn theater_summary(movies: &[TheaterListing], count: usize) -> String {
    let mut by_score: Vec<&TheaterListing> = movies.iter().collect();
    by_score.sort_by(|a, b| b.audience_score.cmp(&a.audience_score));
    let mut by_release: Vec<&TheaterListing> = movies.iter().collect();
    by_release.sort_by(|a, b| b.release_date.cmp(&a.release_date));

    let top: Vec<String> = by_score.iter().take(count).map(|m| m.title.clone()).collect();
    let recent: Vec<String> = by_release
        .iter()
        .take(count)
        .map(|m| m.title.clone())
        .collect();

    format!(
        "The top rated movies currently showing in theaters are {}. \
         The most recently released movies are {}.",
        spoken_list(&top, "and"),
        spoken_list(&recent, "and")
    )
}
