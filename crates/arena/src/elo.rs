//! Elo rating calculation.
//!
//! Ratings are recomputed from the stored games, oldest first, starting every
//! engine at 1500 with a K-factor of 32. Only games with a chess result take
//! part.

use std::collections::HashMap;

use chess_rules::Outcome;

const K_FACTOR: f64 = 32.0;

/// Rating of an engine with no decided games.
pub const INITIAL_RATING: i32 = 1500;

/// A game with a chess result, as fed to the rating calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecidedGame {
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
}

/// Calculate expected score for player A against player B.
fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    1.0 / (1.0 + 10_f64.powf((rating_b - rating_a) as f64 / 400.0))
}

/// Calculate new rating after a game.
///
/// # Arguments
/// * `rating` - Current rating
/// * `opponent_rating` - Opponent's rating
/// * `actual` - Actual score (1.0 = win, 0.5 = draw, 0.0 = loss)
pub fn new_rating(rating: i32, opponent_rating: i32, actual: f64) -> i32 {
    let expected = expected_score(rating, opponent_rating);
    let new = rating as f64 + K_FACTOR * (actual - expected);
    new.round() as i32
}

/// Name for a rating band.
pub fn tier(rating: i32) -> &'static str {
    match rating {
        r if r >= 4000 => "Immortal",
        r if r >= 3000 => "Super Grandmaster",
        r if r >= 2800 => "Grandmaster",
        r if r >= 2600 => "Master",
        r if r >= 2400 => "Expert",
        r if r >= 2200 => "Advanced",
        r if r >= 2000 => "Intermediate",
        r if r >= 1800 => "Developing",
        r if r >= 1600 => "Beginner",
        _ => "Novice",
    }
}

/// Current ratings and their history, per engine.
#[derive(Debug, Clone, Default)]
pub struct RatingTable {
    ratings: HashMap<String, i32>,
    history: HashMap<String, Vec<i32>>,
}

impl RatingTable {
    /// Replays `games` in order.
    pub fn from_games(games: &[DecidedGame]) -> Self {
        let mut table = Self::default();
        for game in games {
            table.record(game);
        }
        table
    }

    pub fn record(&mut self, game: &DecidedGame) {
        let white_score = match game.outcome {
            Outcome::WhiteWins => 1.0,
            Outcome::BlackWins => 0.0,
            Outcome::Draw => 0.5,
            Outcome::Ongoing => return,
        };
        let white = self.rating(&game.white);
        let black = self.rating(&game.black);
        self.set(&game.white, new_rating(white, black, white_score));
        self.set(&game.black, new_rating(black, white, 1.0 - white_score));
    }

    fn set(&mut self, engine: &str, rating: i32) {
        self.ratings.insert(engine.to_string(), rating);
        self.history
            .entry(engine.to_string())
            .or_default()
            .push(rating);
    }

    pub fn rating(&self, engine: &str) -> i32 {
        self.ratings.get(engine).copied().unwrap_or(INITIAL_RATING)
    }

    /// Rating after each of the engine's decided games.
    pub fn history(&self, engine: &str) -> &[i32] {
        self.history
            .get(engine)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Engines by rating, highest first; ties by name.
    pub fn leaderboard(&self) -> Vec<(String, i32)> {
        let mut entries: Vec<(String, i32)> = self
            .ratings
            .iter()
            .map(|(name, rating)| (name.clone(), *rating))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}
