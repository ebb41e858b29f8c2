//! Evidence tagger: coarse keyword overlap between free text and the
//! requirement catalog.

use crate::domain::RequirementEntry;

/// Candidate keywords must be longer than this many characters.
const MIN_KEYWORD_CHARS: usize = 5;
/// Keyword occurrences that must appear for a match. A keyword repeated
/// across key points counts once per repetition.
const MIN_KEYWORD_HITS: usize = 2;

/// Lower-cased words longer than five characters from the key points, in order,
/// repeats included.
pub fn candidate_keywords(entry: &RequirementEntry) -> Vec<String> {
  entry
    .key_points
    .iter()
    .flat_map(|kp| {
      kp.to_lowercase()
        .split(' ')
        .filter(|w| w.chars().count() > MIN_KEYWORD_CHARS)
        .map(str::to_string)
        .collect::<Vec<_>>()
    })
    .collect()
}

/// Whether `text_lower` (already lower-cased) evidences `entry`.
fn matches(entry: &RequirementEntry, text_lower: &str) -> bool {
  if text_lower.contains(&entry.id.to_lowercase()) {
    return true;
  }
  candidate_keywords(entry)
    .iter()
    .filter(|k| text_lower.contains(k.as_str()))
    .take(MIN_KEYWORD_HITS)
    .count()
    >= MIN_KEYWORD_HITS
}

/// Requirement codes `text` appears to provide evidence for, in catalog order.
///
/// Pure and cheap; callers re-run it whenever the text changes.
pub fn tag<'a, I>(text: &str, requirements: I) -> Vec<String>
where
  I: IntoIterator<Item = &'a RequirementEntry>,
{
  if text.trim().is_empty() {
    return Vec::new();
  }
  let lower = text.to_lowercase();
  requirements
    .into_iter()
    .filter(|r| matches(r, &lower))
    .map(|r| r.id.clone())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::Catalog;
  use crate::domain::{AssessmentMethod, Category};

  fn entry(id: &str, key_points: &[&str]) -> RequirementEntry {
    RequirementEntry {
      id: id.into(),
      category: Category::Skill,
      title: "t".into(),
      description: "d".into(),
      assessed_by: vec![AssessmentMethod::PracticalObservation],
      key_points: key_points.iter().map(|s| s.to_string()).collect(),
      specialism: None,
    }
  }

  #[test]
  fn keywords_keep_only_long_words() {
    let e = entry("S13", &["Check the generator", "Apply regulation now"]);
    assert_eq!(candidate_keywords(&e), vec!["generator".to_string(), "regulation".to_string()]);
  }

  #[test]
  fn two_keywords_tag_one_does_not() {
    let e = entry("S13", &["Check the generator", "Apply regulation now"]);
    let reqs = [e];

    assert_eq!(tag("The GENERATOR failed a Regulation check", &reqs), vec!["S13"]);
    assert_eq!(tag("regulations around the big generators", &reqs), vec!["S13"]);
    assert!(tag("only the generator was inspected", &reqs).is_empty());
    assert_eq!(tag("only the generator, see s13", &reqs), vec!["S13"]);
  }

  #[test]
  fn repeated_keyword_counts_per_occurrence() {
    let e = entry("S13", &["generator checks", "Generator swaps"]);
    assert_eq!(candidate_keywords(&e), vec!["generator", "checks", "generator"]);
    assert_eq!(tag("the generator", &[e.clone()]), vec!["S13"]);
    assert!(tag("the swaps", &[e]).is_empty());
  }

  #[test]
  fn equipment_alone_evidences_catalog_entry_that_repeats_it() {
    let c = Catalog::embedded().unwrap();
    let codes = tag("I checked the equipment", c.requirements());
    assert!(codes.contains(&"S5".to_string()), "got {codes:?}");
  }

  #[test]
  fn empty_text_tags_nothing() {
    let c = Catalog::embedded().unwrap();
    assert!(tag("", c.requirements()).is_empty());
    assert!(tag("   ", c.requirements()).is_empty());
  }

  #[test]
  fn portfolio_style_text_tags_catalog_codes() {
    let c = Catalog::embedded().unwrap();
    let text = "I carried out a risk assessment and followed the permit to work \
                procedures, using lock-off isolation before testing with a multimeter.";
    let codes = tag(text, c.requirements());
    assert!(codes.contains(&"K2".to_string()), "got {codes:?}");
  }
}
