//! UCI info line types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Score in centipawns or mate distance, from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = engine winning, negative = engine losing).
    Mate(i32),
}

/// Pawn units for centipawns ("+0.35"), "#3" / "#-2" for mates.
impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:+.2}", f64::from(*cp) / 100.0),
            Score::Mate(n) => write!(f, "#{}", n),
        }
    }
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Search depth in plies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Selective search depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    /// Score evaluation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    /// Nodes searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    /// Nodes per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    /// Principal variation (best line found).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pv: Vec<String>,
    /// Arbitrary string info.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

impl EngineInfo {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a newer info line into this one. Fields the newer line carries
    /// replace the old values; the rest are kept.
    pub fn merge(&mut self, newer: EngineInfo) {
        if newer.depth.is_some() {
            self.depth = newer.depth;
        }
        if newer.seldepth.is_some() {
            self.seldepth = newer.seldepth;
        }
        if newer.score.is_some() {
            self.score = newer.score;
        }
        if newer.nodes.is_some() {
            self.nodes = newer.nodes;
        }
        if newer.nps.is_some() {
            self.nps = newer.nps;
        }
        if newer.time.is_some() {
            self.time = newer.time;
        }
        if !newer.pv.is_empty() {
            self.pv = newer.pv;
        }
        if newer.string.is_some() {
            self.string = newer.string;
        }
    }

    /// Parse UCI info line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with("info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            let next = parts.get(i + 1);
            match parts[i] {
                "depth" => {
                    info.depth = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "seldepth" => {
                    info.seldepth = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "score" => {
                    let value = parts.get(i + 2).and_then(|v| v.parse().ok());
                    info.score = match (next, value) {
                        (Some(&"cp"), Some(cp)) => Some(Score::Cp(cp)),
                        (Some(&"mate"), Some(m)) => Some(Score::Mate(m)),
                        _ => info.score,
                    };
                    i += 2;
                }
                "nodes" => {
                    info.nodes = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "nps" => {
                    info.nps = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "time" => {
                    info.time = next.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "pv" => {
                    i += 1;
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                "string" => {
                    // String consumes rest of line
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "string"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_display() {
        assert_eq!(Score::Cp(35).to_string(), "+0.35");
        assert_eq!(Score::Cp(-120).to_string(), "-1.20");
        assert_eq!(Score::Mate(-2).to_string(), "#-2");
    }

    #[test]
    fn parse_info() {
        let line = "info depth 12 seldepth 18 multipv 1 score cp 30 nodes 125000 nps 500000 hashfull 12 time 250 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.seldepth, Some(18));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.nps, Some(500000));
        assert_eq!(info.time, Some(250));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn parse_mate_and_bound_scores() {
        let info = EngineInfo::parse("info depth 20 score mate -3 pv e2e4").unwrap();
        assert_eq!(info.score, Some(Score::Mate(-3)));

        let info = EngineInfo::parse("info depth 7 score cp 12 lowerbound nodes 10").unwrap();
        assert_eq!(info.score, Some(Score::Cp(12)));
        assert_eq!(info.nodes, Some(10));
    }

    #[test]
    fn parse_string_takes_rest_of_line() {
        let info = EngineInfo::parse("info string NNUE evaluation using nn.bin enabled").unwrap();
        assert_eq!(
            info.string.as_deref(),
            Some("NNUE evaluation using nn.bin enabled")
        );
        assert_eq!(EngineInfo::parse("bestmove e2e4"), None);
    }

    #[test]
    fn merge_keeps_latest_values() {
        let mut info = EngineInfo::parse("info depth 5 score cp 20 pv e2e4 e7e5").unwrap();
        info.merge(EngineInfo::parse("info depth 6 currmove d2d4 currmovenumber 3").unwrap());
        assert_eq!(info.depth, Some(6));
        assert_eq!(info.score, Some(Score::Cp(20)));
        assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn serializes_compactly() {
        let info = EngineInfo {
            depth: Some(3),
            score: Some(Score::Mate(2)),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"depth":3,"score":{"mate":2}}"#);
    }
}
