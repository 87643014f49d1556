//! Sport / tournament / season catalog.
//!
//! The remote API addresses tournaments and seasons by numeric id; the
//! catalog maps the human names used by triggers onto those ids.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::SourceError;

#[derive(Debug, Clone, Deserialize)]
pub struct SportsCatalog {
    pub sports: Vec<SportEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SportEntry {
    pub name: String,
    #[serde(default)]
    pub tournaments: Vec<TournamentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TournamentEntry {
    pub name: String,
    pub id: u64,
    /// Newest season first.
    #[serde(default)]
    pub seasons: Vec<SeasonEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonEntry {
    pub id: u64,
    pub value: String,
}

impl SportsCatalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sports catalog at {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse sports catalog at {}", path.display()))
    }

    fn tournament(&self, sport: &str, tournament: &str) -> Result<&TournamentEntry, SourceError> {
        let sport_entry = self
            .sports
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(sport))
            .ok_or_else(|| SourceError::Configuration(format!("Sport '{}' not found.", sport)))?;

        sport_entry
            .tournaments
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(tournament))
            .ok_or_else(|| {
                SourceError::Configuration(format!(
                    "Tournament '{}' not found under sport '{}'.",
                    tournament, sport
                ))
            })
    }

    /// `(unique_tournament_id, season_id)` for an exact season value.
    pub fn resolve_ids(
        &self,
        sport: &str,
        tournament: &str,
        season: &str,
    ) -> Result<(u64, u64), SourceError> {
        let entry = self.tournament(sport, tournament)?;
        let season_entry = entry
            .seasons
            .iter()
            .find(|s| s.value == season)
            .ok_or_else(|| {
                SourceError::Configuration(format!(
                    "Season '{}' not found for tournament '{}' under sport '{}'.",
                    season, tournament, sport
                ))
            })?;
        Ok((entry.id, season_entry.id))
    }

    pub fn latest_season(&self, sport: &str, tournament: &str) -> Result<String, SourceError> {
        let entry = self.tournament(sport, tournament)?;
        entry
            .seasons
            .first()
            .map(|s| s.value.clone())
            .ok_or_else(|| {
                SourceError::Configuration(format!(
                    "No seasons found for tournament '{}' under sport '{}'.",
                    tournament, sport
                ))
            })
    }
}
