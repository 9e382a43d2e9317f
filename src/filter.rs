use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::domain::Chapter;
use crate::error::MdexError;

#[derive(Debug, Clone, Default)]
pub struct ChapterFilter {
    volumes: Option<HashSet<String>>,
    chapters: Option<HashSet<String>>,
    volume_range: Option<(f64, f64)>,
    chapter_range: Option<(f64, f64)>,
    prefer_groups: Option<HashMap<String, usize>>,
}

impl ChapterFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volumes<I, S>(mut self, volumes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.volumes = Some(volumes.into_iter().map(Into::into).collect());
        self
    }

    pub fn chapters<I, S>(mut self, chapters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chapters = Some(chapters.into_iter().map(Into::into).collect());
        self
    }

    pub fn volume_range(mut self, min: f64, max: f64) -> Self {
        self.volume_range = Some((min, max));
        self
    }

    pub fn chapter_range(mut self, min: f64, max: f64) -> Self {
        self.chapter_range = Some((min, max));
        self
    }

    pub fn prefer_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let groups: Vec<String> = groups
            .into_iter()
            .map(|group| group.as_ref().to_lowercase())
            .collect();
        let total = groups.len();
        let mut ranks = HashMap::with_capacity(total);
        for (position, group) in groups.into_iter().enumerate() {
            ranks.entry(group).or_insert(total - position);
        }
        self.prefer_groups = Some(ranks);
        self
    }

    pub fn accepts(&self, chapter: &Chapter) -> bool {
        if let Some(volumes) = &self.volumes {
            if !volumes.contains(&chapter.volume) {
                return false;
            }
        }
        if let Some(chapters) = &self.chapters {
            if !chapters.contains(&chapter.name) {
                return false;
            }
        }
        if let Some(range) = self.volume_range {
            if !in_range(&chapter.volume, range) {
                return false;
            }
        }
        if let Some(range) = self.chapter_range {
            if !in_range(&chapter.name, range) {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, candidates: &[Chapter]) -> Vec<Chapter> {
        let mut selected: Vec<Chapter> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            if !self.accepts(candidate) {
                continue;
            }
            match by_name.get(&candidate.name) {
                Some(&slot) => {
                    if self.should_replace(&selected[slot], candidate) {
                        selected[slot] = candidate.clone();
                    }
                }
                None => {
                    by_name.insert(candidate.name.clone(), selected.len());
                    selected.push(candidate.clone());
                }
            }
        }

        sort_by_name(&mut selected);
        selected
    }

    fn should_replace(&self, kept: &Chapter, candidate: &Chapter) -> bool {
        match (kept.is_empty(), candidate.is_empty()) {
            (true, false) => true,
            (false, false) => self.group_rank(candidate) > self.group_rank(kept),
            _ => false,
        }
    }

    fn group_rank(&self, chapter: &Chapter) -> usize {
        let Some(ranks) = &self.prefer_groups else {
            return 0;
        };
        chapter
            .group
            .as_deref()
            .and_then(|group| ranks.get(&group.to_lowercase()))
            .copied()
            .unwrap_or(0)
    }
}

/// Numeric value of a chapter name as used for ordering.
///
/// Names that do not parse (oneshots, "extra", ...) count as `0.0`, so they
/// sort alongside chapter zero at the front.
pub fn sort_key(name: &str) -> f64 {
    parse_number(name).unwrap_or(0.0)
}

pub fn sort_by_name(chapters: &mut [Chapter]) {
    chapters.sort_by(|a, b| {
        sort_key(&a.name)
            .partial_cmp(&sort_key(&b.name))
            .unwrap_or(Ordering::Equal)
    });
}

pub fn select_last(mut chapters: Vec<Chapter>, count: usize) -> Vec<Chapter> {
    if chapters.len() > count {
        chapters.drain(..chapters.len() - count);
    }
    chapters
}

pub fn parse_range(values: &[f64], label: &str) -> Result<Option<(f64, f64)>, MdexError> {
    match values {
        [] => Ok(None),
        [min, max] => Ok(Some((*min, *max))),
        other => Err(MdexError::Config(format!(
            "{label} takes 2 values, found {}",
            other.len()
        ))),
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| !number.is_nan())
}

fn in_range(value: &str, (min, max): (f64, f64)) -> bool {
    parse_number(value).is_some_and(|number| number >= min && number <= max)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn sort_key_falls_back_to_zero() {
        assert_eq!(sort_key("12.5"), 12.5);
        assert_eq!(sort_key(""), 0.0);
        assert_eq!(sort_key("extra"), 0.0);
        assert_eq!(sort_key("NaN"), 0.0);
    }

    #[test]
    fn range_requires_two_bounds() {
        assert_eq!(parse_range(&[], "chapter-range").unwrap(), None);
        assert_eq!(
            parse_range(&[1.0, 5.0], "chapter-range").unwrap(),
            Some((1.0, 5.0))
        );
        let err = parse_range(&[1.0], "chapter-range").unwrap_err();
        assert_matches!(err, MdexError::Config(message) if message.contains("found 1"));
        assert!(parse_range(&[1.0, 2.0, 3.0], "volume-range").is_err());
    }

    #[test]
    fn select_last_keeps_tail() {
        let chapters: Vec<Chapter> = (1..=5)
            .map(|n| Chapter::new(format!("id-{n}"), n.to_string(), 10))
            .collect();
        let names: Vec<String> = select_last(chapters.clone(), 2)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["4", "5"]);
        assert_eq!(select_last(chapters, 10).len(), 5);
    }
}
