use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MeetingVote, MeetingVoteType, Movie, User},
    services::llm::{ChatCompletion, SYSTEM_PROMPT},
};

const RECOMMENDATION_MAX_TOKENS: u32 = 1000;

/// Phrases that name the pick inside the model's explanation
static PICK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)(?:recommend|choose|select|pick)\s+['"]([^'"]+)['"]"#,
        r#"(?i)(?:recommend|choose|select|pick)\s+([A-Z][^.!?]+?)(?:\.|$)"#,
        r#"(?i)therefore,\s+i\s+(?:recommend|choose|select|pick)\s+['"]([^'"]+)['"]"#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("pick pattern is a valid regex"))
    .collect()
});

/// Vote tally for one candidate
#[derive(Debug, Clone)]
pub struct CandidateStats {
    pub title: String,
    pub description: String,
    pub genres: Vec<String>,
    pub yes: usize,
    pub no: usize,
    pub yes_reasons: Vec<String>,
    pub no_reasons: Vec<String>,
    /// (voter, vote, reason)
    pub ballots: Vec<(String, MeetingVoteType, Option<String>)>,
}

impl CandidateStats {
    pub fn net(&self) -> i64 {
        self.yes as i64 - self.no as i64
    }

    pub fn total(&self) -> usize {
        self.yes + self.no
    }
}

/// The candidate the model picked
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub movie_id: Uuid,
    pub title: String,
    pub poster: String,
    pub description: String,
    pub reason: String,
}

/// Tallies votes per candidate, skipping candidates nobody voted on
pub fn candidate_stats(
    candidates: &[Movie],
    votes: &[MeetingVote],
    users: &HashMap<Uuid, User>,
) -> Vec<CandidateStats> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let cast: Vec<&MeetingVote> =
                votes.iter().filter(|v| v.movie_id == candidate.id).collect();
            if cast.is_empty() {
                return None;
            }

            let mut stats = CandidateStats {
                title: candidate.title.clone(),
                description: candidate.description.clone(),
                genres: candidate.genres.clone(),
                yes: 0,
                no: 0,
                yes_reasons: Vec::new(),
                no_reasons: Vec::new(),
                ballots: Vec::new(),
            };
            for vote in cast {
                let reason = vote.reason.clone().filter(|r| !r.is_empty());
                match vote.vote_type {
                    MeetingVoteType::Yes => {
                        stats.yes += 1;
                        stats.yes_reasons.extend(reason.clone());
                    }
                    MeetingVoteType::No => {
                        stats.no += 1;
                        stats.no_reasons.extend(reason.clone());
                    }
                }
                let voter = users
                    .get(&vote.user_id)
                    .map(|u| u.label().to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                stats.ballots.push((voter, vote.vote_type, reason));
            }
            Some(stats)
        })
        .collect()
}

pub fn recommendation_prompt(stats: &[CandidateStats], theme: Option<&str>) -> String {
    let mut prompt = String::from(
        "Based on the voting patterns and comments from a movie night group, recommend which \
         candidate movie should be selected for this meeting.\n\n\
         CANDIDATES AND THEIR VOTES (you MUST consider ALL candidates listed below):\n",
    );

    for (i, c) in stats.iter().enumerate() {
        let description = if c.description.is_empty() {
            "No description available"
        } else {
            c.description.as_str()
        };
        let genres = if c.genres.is_empty() {
            "Unknown".to_string()
        } else {
            c.genres.join(", ")
        };
        let _ = write!(
            prompt,
            "\n{}. \"{}\"\n   - Description: {}\n   - Genres: {}\n   - YES votes: {}\n   \
             - NO votes: {}\n   - Net votes (YES - NO): {}\n   - Total votes: {}\n",
            i + 1,
            c.title,
            description,
            genres,
            c.yes,
            c.no,
            c.net(),
            c.total()
        );
        if !c.yes_reasons.is_empty() {
            let _ = writeln!(prompt, "   Reasons for YES votes:");
            for (j, r) in c.yes_reasons.iter().enumerate() {
                let _ = writeln!(prompt, "     {}. \"{}\"", j + 1, r);
            }
        }
        if !c.no_reasons.is_empty() {
            let _ = writeln!(prompt, "   Reasons for NO votes:");
            for (j, r) in c.no_reasons.iter().enumerate() {
                let _ = writeln!(prompt, "     {}. \"{}\"", j + 1, r);
            }
        }
        let _ = writeln!(prompt, "   All votes:");
        for (j, (voter, vote, reason)) in c.ballots.iter().enumerate() {
            let _ = write!(
                prompt,
                "     {}. {}: {}",
                j + 1,
                voter,
                vote.as_str().to_uppercase()
            );
            match reason {
                Some(reason) => {
                    let _ = writeln!(prompt, " - \"{}\"", reason);
                }
                None => prompt.push('\n'),
            }
        }
    }

    if let Some(theme) = theme {
        let _ = write!(
            prompt,
            "\nMEETING THEME:\nThe group has requested movies that fit this theme: \"{theme}\"\n\
             Consider this when making your recommendation.\n"
        );
    }

    prompt.push_str(
        "\nTASK:\n\
         Consider EVERY candidate above, then recommend ONE that:\n\
         1. Fits the meeting theme if one is provided (theme fit outweighs vote counts)\n\
         2. Has no strong negative feedback (comments such as \"I really don't want to watch this\")\n\
         3. Has positive or neutral net support, preferring net votes >= 0\n\
         4. Would be most enjoyable for the group based on their comments\n\n\
         DECISION PROCESS:\n\
         - First keep the movies that fit the theme\n\
         - Then drop movies with strong negative feedback\n\
         - Finally choose the remaining movie with the best net votes\n\n\
         Return ONLY valid JSON in this exact format:\n\
         {\n  \"recommendedMovie\": \"Exact Movie Title\",\n  \
         \"reason\": \"5-7 sentences that name every candidate considered, compare their \
         YES/NO/net votes, note theme fit and strong negative feedback, and explain why the \
         chosen movie beats the alternatives\"\n}",
    );
    prompt
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecommendation {
    recommended_movie: Option<String>,
    reason: Option<String>,
}

/// Extracts `(title, reason)` from the model's JSON answer
pub fn parse_recommendation(raw: &str) -> AppResult<(String, String)> {
    let parsed: RawRecommendation = serde_json::from_str(raw).map_err(|e| {
        tracing::error!(error = %e, response = %raw, "Failed to parse AI response");
        AppError::ExternalApi("Invalid JSON response from AI".to_string())
    })?;
    match (parsed.recommended_movie, parsed.reason) {
        (Some(title), Some(reason)) if !title.trim().is_empty() && !reason.is_empty() => {
            Ok((title.trim().to_string(), reason))
        }
        _ => Err(AppError::ExternalApi(
            "Invalid response format from AI".to_string(),
        )),
    }
}

/// Title the explanation says was picked, if it names one
pub fn title_from_reason(reason: &str) -> Option<String> {
    PICK_PATTERNS.iter().find_map(|re| {
        re.captures(reason)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

fn find_candidate<'a>(candidates: &'a [Movie], title: &str) -> Option<&'a Movie> {
    let wanted = title.trim().to_lowercase();
    candidates
        .iter()
        .find(|c| c.title.trim().to_lowercase() == wanted)
}

/// Resolves the model's answer to a candidate
///
/// When the explanation names a different candidate than the JSON field,
/// the explanation wins.
pub fn pick_candidate<'a>(
    candidates: &'a [Movie],
    recommended: &str,
    reason: &str,
) -> AppResult<&'a Movie> {
    let mut title = recommended.trim().to_string();
    if let Some(from_reason) = title_from_reason(reason) {
        if from_reason.to_lowercase() != title.to_lowercase() {
            match find_candidate(candidates, &from_reason) {
                Some(candidate) => {
                    tracing::warn!(
                        json_title = %title,
                        reason_title = %candidate.title,
                        "Recommendation mismatch, using the title from the reason"
                    );
                    title = candidate.title.clone();
                }
                None => {
                    tracing::debug!(reason_title = %from_reason, "Title in reason is not a candidate");
                }
            }
        }
    }

    find_candidate(candidates, &title).ok_or_else(|| {
        AppError::Internal(format!(
            "Recommended movie \"{}\" not found in candidates",
            title
        ))
    })
}

/// Asks the model to pick one of the voted candidates
pub async fn recommend_candidate(
    llm: &dyn ChatCompletion,
    candidates: &[Movie],
    votes: &[MeetingVote],
    users: &HashMap<Uuid, User>,
    theme: Option<&str>,
) -> AppResult<Recommendation> {
    if candidates.is_empty() {
        return Err(AppError::InvalidInput(
            "No candidates available for recommendation".to_string(),
        ));
    }
    if votes.is_empty() {
        return Err(AppError::InvalidInput(
            "No votes available yet. Need votes to generate recommendation.".to_string(),
        ));
    }

    let stats = candidate_stats(candidates, votes, users);
    if stats.is_empty() {
        return Err(AppError::InvalidInput(
            "No candidates with votes available for recommendation. Candidates need at least one vote to be considered."
                .to_string(),
        ));
    }

    for c in &stats {
        tracing::info!(
            title = %c.title,
            yes = c.yes,
            no = c.no,
            net = c.net(),
            "Recommendation candidate"
        );
    }

    let prompt = recommendation_prompt(&stats, theme);
    let raw = llm
        .complete(SYSTEM_PROMPT, &prompt, RECOMMENDATION_MAX_TOKENS)
        .await?;
    let (title, reason) = parse_recommendation(&raw)?;
    let movie = pick_candidate(candidates, &title, &reason)?;

    tracing::info!(movie_id = %movie.id, title = %movie.title, "AI recommendation chosen");

    Ok(Recommendation {
        movie_id: movie.id,
        title: movie.title.clone(),
        poster: movie.poster.clone(),
        description: movie.description.clone(),
        reason,
    })
}
