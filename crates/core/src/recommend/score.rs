//! Pairwise similarity between a recently viewed listing and a candidate.
//!
//! The score is the plain sum of five weighted sub-scores. Each sub-score is
//! capped by its own weight, so the total lies in `0.0..=100.0`.

use crate::domain::listing::Listing;

pub const LOCATION_WEIGHT: f64 = 40.0;
pub const PRICE_WEIGHT: f64 = 25.0;
pub const SCHOOL_WEIGHT: f64 = 15.0;
pub const AMENITY_WEIGHT: f64 = 10.0;
pub const RATING_WEIGHT: f64 = 10.0;

// Prices must be within roughly 30% of each other.
const MIN_PRICE_SIMILARITY: f64 = 0.7;
const MAX_RATING_GAP: f64 = 1.0;
const HIGHLY_RATED: f64 = 4.0;
const MIN_TOKEN_CHARS: usize = 3;
const MAX_AMENITY_REASONS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub reasons: Vec<String>,
}

impl Similarity {
    fn add(&mut self, points: f64, reason: String) {
        self.score += points;
        self.reasons.push(reason);
    }
}

pub fn score_pair(reference: &Listing, candidate: &Listing) -> Similarity {
    let mut out = Similarity::default();

    if let Some((points, shared)) = location_overlap(reference, candidate) {
        out.add(points, format!("Similar location: {}", shared.join(", ")));
    }

    if let Some((points, price)) = price_proximity(reference, candidate) {
        out.add(points, format!("Similar price range ({})", format_amount(price)));
    }

    if matches!((reference.school_id, candidate.school_id), (Some(a), Some(b)) if a == b) {
        out.add(SCHOOL_WEIGHT, "Near the same school".to_string());
    }

    if let Some((points, shared)) = amenity_overlap(reference, candidate) {
        let named: Vec<&str> = shared.into_iter().take(MAX_AMENITY_REASONS).collect();
        out.add(points, format!("Shared amenities: {}", named.join(", ")));
    }

    out.score += rating_proximity(reference, candidate);
    if let Some(rating) = finite(candidate.rating).filter(|r| *r >= HIGHLY_RATED) {
        out.reasons.push(format!("Highly rated ({rating:.1}/5)"));
    }

    out
}

/// Lowercased, deduplicated address tokens in first-seen order.
///
/// Both sides of the comparison go through this, so "Accra" and "accra" match.
pub fn address_tokens(address: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for raw in address.split(|c: char| c == ',' || c.is_whitespace()) {
        if raw.chars().count() < MIN_TOKEN_CHARS {
            continue;
        }
        let token = raw.to_lowercase();
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

fn location_overlap(reference: &Listing, candidate: &Listing) -> Option<(f64, Vec<String>)> {
    let ref_tokens = address_tokens(reference.address.as_deref()?);
    let cand_tokens = address_tokens(candidate.address.as_deref()?);

    let shared: Vec<String> = ref_tokens
        .iter()
        .filter(|t| cand_tokens.contains(t))
        .cloned()
        .collect();
    if shared.is_empty() {
        return None;
    }

    let denom = ref_tokens.len().max(cand_tokens.len()) as f64;
    Some((LOCATION_WEIGHT * shared.len() as f64 / denom, shared))
}

fn price_proximity(reference: &Listing, candidate: &Listing) -> Option<(f64, f64)> {
    let a = positive(reference.price_min)?;
    let b = positive(candidate.price_min)?;

    let similarity = 1.0 - (a - b).abs() / a.max(b);
    if similarity <= MIN_PRICE_SIMILARITY {
        return None;
    }
    Some((PRICE_WEIGHT * similarity, b))
}

/// Shared amenities in the candidate's spelling, compared case-insensitively.
fn amenity_overlap<'a>(reference: &Listing, candidate: &'a Listing) -> Option<(f64, Vec<&'a str>)> {
    let ref_set = normalized_amenities(&reference.amenities);
    let cand_set = normalized_amenities(&candidate.amenities);

    let shared: Vec<&str> = cand_set
        .iter()
        .filter(|(key, _)| ref_set.iter().any(|(k, _)| k == key))
        .map(|(_, original)| *original)
        .collect();
    if shared.is_empty() {
        return None;
    }

    let denom = ref_set.len().max(cand_set.len()) as f64;
    Some((AMENITY_WEIGHT * shared.len() as f64 / denom, shared))
}

fn normalized_amenities(amenities: &[String]) -> Vec<(String, &str)> {
    let mut out: Vec<(String, &str)> = Vec::with_capacity(amenities.len());
    for amenity in amenities {
        let trimmed = amenity.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if !out.iter().any(|(k, _)| *k == key) {
            out.push((key, trimmed));
        }
    }
    out
}

fn rating_proximity(reference: &Listing, candidate: &Listing) -> f64 {
    let (Some(a), Some(b)) = (finite(reference.rating), finite(candidate.rating)) else {
        return 0.0;
    };
    let gap = (a - b).abs();
    if gap > MAX_RATING_GAP {
        return 0.0;
    }
    RATING_WEIGHT * (1.0 - gap)
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|n| n.is_finite())
}

fn positive(v: Option<f64>) -> Option<f64> {
    finite(v).filter(|n| *n > 0.0)
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
