//! Targets, storage paths and remote payload shapes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestionError, SourceError};

/// Source segment shared by every persisted path.
pub const SOURCE: &str = "sofascore";
/// Container holding raw pages and odds documents.
pub const RAW_CONTAINER: &str = "raw";
/// Container holding the id logs.
pub const LOGS_CONTAINER: &str = "logs";
const ID_LOG_FILE: &str = "ids.txt";

/// Which id log an id set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Events,
    Odds,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Events => "events",
            DataKind::Odds => "odds",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "events" => Some(DataKind::Events),
            "odds" => Some(DataKind::Odds),
            _ => None,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (sport, tournament, season) data partition.
///
/// Fields keep the user-facing names ("Basketball", "NBA", "2024/2025") so the
/// catalog can resolve them; path helpers apply the storage normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IngestionTarget {
    pub sport: String,
    pub tournament: String,
    pub season: String,
}

impl IngestionTarget {
    pub fn new(
        sport: impl Into<String>,
        tournament: impl Into<String>,
        season: impl Into<String>,
    ) -> Self {
        Self {
            sport: sport.into(),
            tournament: tournament.into(),
            season: season.into(),
        }
    }

    pub fn sport_key(&self) -> String {
        normalize_sport(&self.sport)
    }

    pub fn tournament_key(&self) -> String {
        normalize_tournament(&self.tournament)
    }

    pub fn season_key(&self) -> String {
        normalize_season(&self.season)
    }

    /// `raw/sofascore/{sport}/{tournament}/{kind}/{season}/`
    pub fn raw_prefix(&self, kind: DataKind) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}/",
            RAW_CONTAINER,
            SOURCE,
            self.sport_key(),
            self.tournament_key(),
            kind,
            self.season_key()
        )
    }

    pub fn page_path(&self, page: u32) -> String {
        format!("{}{}.json", self.raw_prefix(DataKind::Events), page)
    }

    pub fn odds_path(&self, event_id: u64) -> String {
        format!("{}{}.json", self.raw_prefix(DataKind::Odds), event_id)
    }

    /// `logs/sofascore/{sport}/{tournament}/{kind}/{season}/ids.txt`
    pub fn id_log_path(&self, kind: DataKind) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}/{}",
            LOGS_CONTAINER,
            SOURCE,
            self.sport_key(),
            self.tournament_key(),
            kind,
            self.season_key(),
            ID_LOG_FILE
        )
    }

    /// Recover the target from an id log path written by [`Self::id_log_path`].
    ///
    /// The names come back in their normalized form, which is enough to
    /// address every blob of the partition.
    pub fn from_id_log_path(path: &str) -> Result<(Self, DataKind), IngestionError> {
        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        match parts.as_slice() {
            [LOGS_CONTAINER, SOURCE, sport, tournament, kind, season, ID_LOG_FILE]
                if !sport.is_empty() && !tournament.is_empty() && !season.is_empty() =>
            {
                let kind = DataKind::parse(kind).ok_or_else(|| {
                    IngestionError::Configuration(format!(
                        "unknown data kind {:?} in id log path {}",
                        kind, path
                    ))
                })?;
                Ok((IngestionTarget::new(*sport, *tournament, *season), kind))
            }
            _ => Err(IngestionError::Configuration(format!(
                "not an id log path: {}",
                path
            ))),
        }
    }
}

impl fmt::Display for IngestionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.tournament, self.season)
    }
}

pub fn normalize_sport(sport: &str) -> String {
    sport.to_lowercase()
}

pub fn normalize_tournament(tournament: &str) -> String {
    tournament.replace(' ', "_").to_lowercase()
}

pub fn normalize_season(season: &str) -> String {
    season.replace('/', "-")
}

/// One page of tournament events as returned by the remote API.
///
/// `raw` is the verbatim document that gets persisted; `event_ids` are the
/// ids pulled out of it for the id log.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub event_ids: Vec<u64>,
    pub has_next_page: bool,
    pub raw: Value,
}

#[derive(Deserialize)]
struct PageShape {
    events: Vec<EventRef>,
    #[serde(default, rename = "hasNextPage")]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct EventRef {
    id: u64,
}

impl EventPage {
    pub fn from_json(raw: Value) -> Result<Self, SourceError> {
        let shape = PageShape::deserialize(&raw)
            .map_err(|e| SourceError::Other(format!("malformed events page: {}", e)))?;
        Ok(Self {
            event_ids: shape.events.into_iter().map(|e| e.id).collect(),
            has_next_page: shape.has_next_page,
            raw,
        })
    }
}

/// Result of comparing the events log with the odds log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    NothingPending,
    Pending(BTreeSet<u64>),
}

/// What a job reports to the notifier and to the trigger layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub succeeded: bool,
    pub detail: String,
}

impl IngestionOutcome {
    pub fn from_result<T: fmt::Display, E: fmt::Display>(result: &Result<T, E>) -> Self {
        match result {
            Ok(v) => Self {
                succeeded: true,
                detail: v.to_string(),
            },
            Err(e) => Self {
                succeeded: false,
                detail: e.to_string(),
            },
        }
    }
}
