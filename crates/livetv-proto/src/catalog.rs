//! Channel catalog: the parsed channel list plus pure filter projections.
//!
//! The catalog never caches a filtered view.  Every call to `filter` walks
//! the canonical list, so the view can never drift from its inputs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::protocol::Channel;

/// Category selector.  `All` is the sentinel that matches every group.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Group(String),
}

impl CategoryFilter {
    /// `"all"` maps to the sentinel; anything else is an exact group name.
    pub fn from_label(label: &str) -> Self {
        if label == "all" {
            Self::All
        } else {
            Self::Group(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Group(g) => g,
        }
    }

    pub fn matches(&self, channel: &Channel) -> bool {
        match self {
            Self::All => true,
            Self::Group(g) => channel.group == *g,
        }
    }

    /// Step forward through `All, categories[0], categories[1], …, All`.
    pub fn cycle_next(&self, categories: &[String]) -> Self {
        match self.position(categories) {
            None => categories
                .first()
                .map(|g| Self::Group(g.clone()))
                .unwrap_or(Self::All),
            Some(i) if i + 1 < categories.len() => Self::Group(categories[i + 1].clone()),
            Some(_) => Self::All,
        }
    }

    pub fn cycle_prev(&self, categories: &[String]) -> Self {
        match self.position(categories) {
            None => categories
                .last()
                .map(|g| Self::Group(g.clone()))
                .unwrap_or(Self::All),
            Some(0) => Self::All,
            Some(i) => Self::Group(categories[i - 1].clone()),
        }
    }

    fn position(&self, categories: &[String]) -> Option<usize> {
        match self {
            Self::All => None,
            Self::Group(g) => categories.iter().position(|c| c == g),
        }
    }
}

/// Search text plus category: the two inputs of the filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Filter {
    pub query: String,
    pub category: CategoryFilter,
}

fn matches_search(channel: &Channel, query_lower: &str) -> bool {
    query_lower.is_empty() || channel.name.to_lowercase().contains(query_lower)
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    channels: Vec<Channel>,
}

impl Catalog {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels }
    }

    /// Replace the whole list.  Channels from the previous list are gone.
    pub fn set_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels whose name contains `query` (case-insensitive) and whose
    /// group matches `category`, in canonical order.
    pub fn filter(&self, query: &str, category: &CategoryFilter) -> Vec<Channel> {
        let query_lower = query.to_lowercase();
        self.channels
            .iter()
            .filter(|ch| matches_search(ch, &query_lower) && category.matches(ch))
            .cloned()
            .collect()
    }

    pub fn view(&self, filter: &Filter) -> Vec<Channel> {
        self.filter(&filter.query, &filter.category)
    }

    /// Distinct group names, sorted.  Independent of any filter.
    pub fn categories(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|c| c.group.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get(&self, id: usize) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// Channel with the same group, name and url as `channel`, if any.
    pub fn find_equivalent(&self, channel: &Channel) -> Option<&Channel> {
        self.channels.iter().find(|c| c.is_equivalent(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: usize, group: &str, name: &str) -> Channel {
        Channel {
            id,
            name: name.to_string(),
            group: group.to_string(),
            url: format!("http://tv/{}", id),
            logo: String::new(),
        }
    }

    fn sample() -> Catalog {
        Catalog::new(vec![
            ch(0, "News", "BBC News"),
            ch(1, "Sports", "Sports1"),
            ch(2, "News", "CNN"),
        ])
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let cat = sample();
        let hits = cat.filter("news", &CategoryFilter::All);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "BBC News");
        assert_eq!(cat.filter("NEWS", &CategoryFilter::All), hits);
    }

    #[test]
    fn empty_query_and_all_match_everything() {
        let cat = sample();
        assert_eq!(cat.filter("", &CategoryFilter::All), cat.channels().to_vec());
    }

    #[test]
    fn category_is_exact_match() {
        let cat = sample();
        let news = cat.filter("", &CategoryFilter::Group("News".into()));
        assert_eq!(news.iter().map(|c| c.id).collect::<Vec<_>>(), vec![0, 2]);
        assert!(cat
            .filter("", &CategoryFilter::Group("news".into()))
            .is_empty());
    }

    #[test]
    fn query_and_category_combine() {
        let cat = sample();
        let filter = Filter {
            query: "c".into(),
            category: CategoryFilter::Group("News".into()),
        };
        let ids: Vec<usize> = cat.view(&filter).iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn filtering_does_not_mutate_catalog() {
        let cat = sample();
        let _ = cat.filter("zzz", &CategoryFilter::All);
        assert_eq!(cat.len(), 3);
    }

    #[test]
    fn categories_are_distinct_and_sorted() {
        assert_eq!(sample().categories(), vec!["News", "Sports"]);
        assert!(Catalog::default().categories().is_empty());
    }

    #[test]
    fn category_label_round_trip() {
        assert_eq!(CategoryFilter::from_label("all"), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from_label("Kids"),
            CategoryFilter::Group("Kids".into())
        );
        assert_eq!(CategoryFilter::Group("Kids".into()).label(), "Kids");
    }

    #[test]
    fn category_cycles_through_all() {
        let cats = vec!["A".to_string(), "B".to_string()];
        let mut c = CategoryFilter::All;
        c = c.cycle_next(&cats);
        assert_eq!(c, CategoryFilter::Group("A".into()));
        c = c.cycle_next(&cats);
        assert_eq!(c, CategoryFilter::Group("B".into()));
        c = c.cycle_next(&cats);
        assert_eq!(c, CategoryFilter::All);
        assert_eq!(c.cycle_prev(&cats), CategoryFilter::Group("B".into()));
        assert_eq!(
            CategoryFilter::Group("A".into()).cycle_prev(&cats),
            CategoryFilter::All
        );
        assert_eq!(CategoryFilter::All.cycle_next(&[]), CategoryFilter::All);
    }

    #[test]
    fn find_equivalent_ignores_id() {
        let cat = sample();
        let stale = ch(9, "News", "CNN");
        let stale = Channel {
            url: "http://tv/2".into(),
            ..stale
        };
        assert_eq!(cat.find_equivalent(&stale).map(|c| c.id), Some(2));
        assert!(cat.find_equivalent(&ch(9, "News", "Gone")).is_none());
    }
}
