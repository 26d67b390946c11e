//! Leaderboard - rounds won per client, kept for the process lifetime

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Cumulative correct-guess counts. Entries are never removed or decremented.
#[derive(Debug, Default)]
pub struct Leaderboard {
    wins: HashMap<String, u32>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a client is listed, starting at zero
    pub fn ensure(&mut self, name: &str) {
        self.wins.entry(name.to_string()).or_insert(0);
    }

    /// Count a correct guess and return the new total
    pub fn record_win(&mut self, name: &str) -> u32 {
        let wins = self.wins.entry(name.to_string()).or_insert(0);
        *wins += 1;
        *wins
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.wins.get(name).copied()
    }

    /// Detached copy of the current counts
    pub fn snapshot(&self) -> LeaderboardSnapshot {
        LeaderboardSnapshot(self.wins.iter().map(|(name, wins)| (name.clone(), *wins)).collect())
    }
}

/// Point-in-time copy of the leaderboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaderboardSnapshot(BTreeMap<String, u32>);

impl LeaderboardSnapshot {
    pub fn get(&self, name: &str) -> Option<u32> {
        self.0.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, wins)| (name.as_str(), *wins))
    }

    /// Entries ordered by wins (descending), then name
    pub fn ranked(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Plain-text table under a title line
    pub fn render(&self, title: &str) -> String {
        let mut out = format!("{}:\n", title);
        if self.is_empty() {
            out.push_str("(no entries)\n");
        }
        for (name, wins) in self.ranked() {
            let noun = if wins == 1 { "win" } else { "wins" };
            out.push_str(&format!("{}: {} {}\n", name, wins, noun));
        }
        out
    }
}

impl FromIterator<(String, u32)> for LeaderboardSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
