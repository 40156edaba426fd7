use crate::context::LibraryContext;
use crate::models::{ItemCategory, PhotoItem, TagId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a non-empty tag set combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagMatch {
    /// At least one of the filter tags is on the item.
    AnyOf,
    /// Every filter tag is on the item.
    AllOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingCondition {
    AtLeast,
    Exactly,
    AtMost,
}

/// Category/format group the mime dimension switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MimeFilter {
    All,
    Images,
    Jpeg,
    Png,
    Tiff,
    DngRaw,
    NoRaw,
    Raw,
    Videos,
    Audio,
}

impl MimeFilter {
    pub fn accepts(&self, item: &PhotoItem) -> bool {
        let image = item.category == ItemCategory::Image;
        match self {
            MimeFilter::All => true,
            MimeFilter::Images => image,
            MimeFilter::Jpeg => image && matches!(item.format.as_str(), "JPG" | "JPEG"),
            MimeFilter::Png => image && item.format == "PNG",
            MimeFilter::Tiff => image && matches!(item.format.as_str(), "TIF" | "TIFF"),
            MimeFilter::DngRaw => image && item.format == "RAW-DNG",
            MimeFilter::NoRaw => image && !item.is_raw(),
            MimeFilter::Raw => image && item.is_raw(),
            MimeFilter::Videos => item.category == ItemCategory::Video,
            MimeFilter::Audio => item.category == ItemCategory::Audio,
        }
    }
}

/// Which metadata fields the text filter searches. The owning album's
/// title is always part of the search surface while the dimension is
/// active; these toggles gate the per-item fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearchFields {
    pub name: bool,
    pub comment: bool,
    pub tag_names: bool,
}

impl Default for TextSearchFields {
    fn default() -> Self {
        Self {
            name: true,
            comment: true,
            tag_names: true,
        }
    }
}

impl TextSearchFields {
    pub fn any_enabled(&self) -> bool {
        self.name || self.comment || self.tag_names
    }
}

/// Outcome of one predicate evaluation.
///
/// `found_text` is a side channel, not a component of `matches`: a text
/// hit is reported even when another dimension filters the item out, so
/// the caller can tell "no match" apart from "matches, but hidden".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchResult {
    pub matches: bool,
    pub found_text: bool,
}

/// The active compound predicate of a lister.
///
/// Immutable per application: setters on the lister replace whole
/// slices of this value, they never mutate it mid-evaluation. The
/// default value matches every item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFilter {
    pub tags: HashSet<TagId>,
    pub tag_condition: TagMatch,
    pub show_untagged: bool,
    /// Threshold in stars; negative disables the dimension.
    pub rating: i32,
    pub rating_condition: RatingCondition,
    pub mime: MimeFilter,
    pub days: HashSet<NaiveDate>,
    pub text: String,
    pub text_fields: TextSearchFields,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            tags: HashSet::new(),
            tag_condition: TagMatch::AnyOf,
            show_untagged: false,
            rating: -1,
            rating_condition: RatingCondition::AtLeast,
            mime: MimeFilter::All,
            days: HashSet::new(),
            text: String::new(),
            text_fields: TextSearchFields::default(),
        }
    }
}

impl ItemFilter {
    /// True when no dimension is active, so every item matches without
    /// touching the context.
    pub fn is_neutral(&self) -> bool {
        self.tags.is_empty()
            && !self.show_untagged
            && self.rating < 0
            && self.mime == MimeFilter::All
            && self.days.is_empty()
            && !self.text_active()
    }

    fn text_active(&self) -> bool {
        !self.text.is_empty() && self.text_fields.any_enabled()
    }

    /// Evaluate the predicate against one item. Total and
    /// deterministic; nothing in here can fail.
    pub fn matches(&self, item: &PhotoItem, context: &dyn LibraryContext) -> MatchResult {
        if self.is_neutral() {
            return MatchResult {
                matches: true,
                found_text: false,
            };
        }

        let mut matches = true;

        // Tag and untagged are one dimension, OR-combined internally.
        if !self.tags.is_empty() {
            let tag_hit = match self.tag_condition {
                TagMatch::AnyOf => self.tags.iter().any(|t| item.has_tag(*t)),
                TagMatch::AllOf => self.tags.iter().all(|t| item.has_tag(*t)),
            };
            matches &= tag_hit || (self.show_untagged && item.tag_ids.is_empty());
        } else if self.show_untagged {
            matches &= item.tag_ids.is_empty();
        }

        if !self.days.is_empty() {
            matches &= self.days.contains(&item.calendar_date());
        }

        if self.rating >= 0 {
            let rating = item.effective_rating();
            matches &= match self.rating_condition {
                RatingCondition::AtLeast => rating >= self.rating,
                RatingCondition::Exactly => rating == self.rating,
                RatingCondition::AtMost => rating <= self.rating,
            };
        }

        matches &= self.mime.accepts(item);

        // Always evaluated while active, even when an earlier dimension
        // already failed, so found_text stays accurate for the UI.
        let mut found_text = false;
        if self.text_active() {
            found_text = self.search_text(item, context);
            matches &= found_text;
        }

        MatchResult {
            matches,
            found_text,
        }
    }

    // Case-sensitive containment, consistent across every field.
    fn search_text(&self, item: &PhotoItem, context: &dyn LibraryContext) -> bool {
        let needle = self.text.as_str();

        if self.text_fields.name && item.name.contains(needle) {
            return true;
        }

        if self.text_fields.comment {
            let hit = match &item.comment {
                Some(comment) => comment.contains(needle),
                None => context
                    .comment_for(item.id)
                    .is_some_and(|comment| comment.contains(needle)),
            };
            if hit {
                return true;
            }
        }

        if self.text_fields.tag_names
            && item
                .tag_ids
                .iter()
                .any(|tag| context.tag_name(*tag).is_some_and(|name| name.contains(needle)))
        {
            return true;
        }

        context
            .album_title(item.album_id)
            .is_some_and(|title| title.contains(needle))
    }
}
