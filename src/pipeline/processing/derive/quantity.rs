//! Puppy quantity resolution from structured counts and listing text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::QuantityConfig;

/// Where a listing's resolved puppy count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySource {
    Explicit,
    GenderSplit,
    LitterOf,
    PuppyCount,
    GenderedPhrase,
    AvailablePhrase,
    NumberWord,
    Singleton,
    /// Explicit count rejected and nothing to fall back on
    Unresolved,
}

impl QuantitySource {
    pub const ALL: [QuantitySource; 9] = [
        QuantitySource::Explicit,
        QuantitySource::GenderSplit,
        QuantitySource::LitterOf,
        QuantitySource::PuppyCount,
        QuantitySource::GenderedPhrase,
        QuantitySource::AvailablePhrase,
        QuantitySource::NumberWord,
        QuantitySource::Singleton,
        QuantitySource::Unresolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuantitySource::Explicit => "explicit",
            QuantitySource::GenderSplit => "gender_split",
            QuantitySource::LitterOf => "litter_of",
            QuantitySource::PuppyCount => "puppy_count",
            QuantitySource::GenderedPhrase => "gendered_phrase",
            QuantitySource::AvailablePhrase => "available_phrase",
            QuantitySource::NumberWord => "number_word",
            QuantitySource::Singleton => "singleton",
            QuantitySource::Unresolved => "unresolved",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityOutcome {
    pub value: Option<i64>,
    pub source: QuantitySource,
    /// A text-derived value was cut down to the maximum litter size
    pub clamped: bool,
}

static LITTER_OF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\blitter\s+of\s+(\d+)").expect("static regex"));
static PUPPY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:pups?|puppy|puppies)\b").expect("static regex"));
static MALE_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*(?:x\s*)?(?:boys?|males?|dogs?)\b").expect("static regex"));
static FEMALE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:x\s*)?(?:girls?|females?|bitch(?:es)?)\b").expect("static regex")
});
static AVAILABLE_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s+(?:available|left|remaining)\b").expect("static regex"));
static NUMBER_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s+(?:[a-z]+\s+)?(?:pups?|puppy|puppies|boys?|girls?)\b",
    )
    .expect("static regex")
});

fn number_word(word: &str) -> Option<i64> {
    let n = match word.to_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}

/// Resolves a puppy count in strict priority order, first plausible match wins.
pub struct QuantityExtractor {
    max_litter_size: i64,
    hard_ceiling: i64,
}

impl QuantityExtractor {
    pub fn new(config: &QuantityConfig) -> Self {
        Self {
            max_litter_size: i64::from(config.max_litter_size),
            hard_ceiling: i64::from(config.hard_litter_ceiling),
        }
    }

    fn plausible(&self, n: i64) -> Option<i64> {
        (1..=self.hard_ceiling).contains(&n).then_some(n)
    }

    /// Sum of structured male/female counts when at least one is present
    /// and the sum is plausible.
    pub fn gender_split(&self, males: Option<f64>, females: Option<f64>) -> Option<i64> {
        if males.is_none() && females.is_none() {
            return None;
        }
        let sum = males.unwrap_or(0.0) + females.unwrap_or(0.0);
        if sum.fract() != 0.0 {
            return None;
        }
        self.plausible(sum as i64)
    }

    fn first_capture(&self, re: &Regex, text: &str) -> Option<i64> {
        re.captures_iter(text)
            .filter_map(|caps| caps[1].parse::<i64>().ok())
            .find_map(|n| self.plausible(n))
    }

    fn gendered_phrase(&self, text: &str) -> Option<i64> {
        let first = |re: &Regex| re.captures(text).and_then(|c| c[1].parse::<i64>().ok());
        let (boys, girls) = (first(&*MALE_PHRASE), first(&*FEMALE_PHRASE));
        if boys.is_none() && girls.is_none() {
            return None;
        }
        self.plausible(boys.unwrap_or(0) + girls.unwrap_or(0))
    }

    fn number_word(&self, text: &str) -> Option<i64> {
        NUMBER_WORD
            .captures(text)
            .and_then(|caps| number_word(&caps[1]))
            .and_then(|n| self.plausible(n))
    }

    /// Text patterns only, in priority order
    pub fn from_text(&self, text: &str) -> Option<(i64, QuantitySource)> {
        let tagged = |source: QuantitySource| move |n: i64| (n, source);

        self.first_capture(&LITTER_OF, text)
            .map(tagged(QuantitySource::LitterOf))
            .or_else(|| self.first_capture(&PUPPY_COUNT, text).map(tagged(QuantitySource::PuppyCount)))
            .or_else(|| self.gendered_phrase(text).map(tagged(QuantitySource::GenderedPhrase)))
            .or_else(|| {
                self.first_capture(&AVAILABLE_PHRASE, text)
                    .map(tagged(QuantitySource::AvailablePhrase))
            })
            .or_else(|| self.number_word(text).map(tagged(QuantitySource::NumberWord)))
    }

    /// Resolve a count: explicit structured value, gender-split sum, text
    /// patterns, then a singleton default.
    ///
    /// Explicit values are passed through untouched for the quality gate to
    /// judge; text-derived values are clamped to the maximum litter size.
    pub fn extract(
        &self,
        explicit: Option<f64>,
        males: Option<f64>,
        females: Option<f64>,
        text: Option<&str>,
    ) -> QuantityOutcome {
        if let Some(value) = explicit {
            return QuantityOutcome {
                value: Some(value.round() as i64),
                source: QuantitySource::Explicit,
                clamped: false,
            };
        }

        if let Some(sum) = self.gender_split(males, females) {
            return QuantityOutcome {
                value: Some(sum),
                source: QuantitySource::GenderSplit,
                clamped: false,
            };
        }

        if let Some((n, source)) = text.and_then(|t| self.from_text(t)) {
            let clamped = n > self.max_litter_size;
            return QuantityOutcome {
                value: Some(n.min(self.max_litter_size)),
                source,
                clamped,
            };
        }

        QuantityOutcome {
            value: Some(1),
            source: QuantitySource::Singleton,
            clamped: false,
        }
    }
}
