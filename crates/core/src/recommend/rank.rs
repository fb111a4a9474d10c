use crate::domain::listing::{Listing, ViewEvent};
use crate::domain::recommendation::{CandidateQuery, PriceBand, RecommendedListing};
use crate::recommend::score::{score_pair, Similarity};
use std::collections::HashSet;
use uuid::Uuid;

pub const RECENT_VIEW_LIMIT: usize = 10;
pub const REFERENCE_LIMIT: usize = 3;
pub const MAX_SCHOOL_FILTER: usize = 3;
pub const CANDIDATE_LIMIT: usize = 50;
pub const MIN_CANDIDATE_RATING: f64 = 3.5;
pub const PRICE_BAND_RATIO: f64 = 0.5;
pub const SCORE_THRESHOLD: f64 = 20.0;
pub const DEFAULT_LIMIT: usize = 10;

/// Distinct listings from a requester's most recent views, newest first.
#[derive(Debug, Clone, Default)]
pub struct History {
    viewed: Vec<Listing>,
}

impl History {
    /// `views` must already be ordered most recent first.
    pub fn from_views(views: Vec<ViewEvent>) -> Self {
        let mut viewed: Vec<Listing> = Vec::new();
        for view in views.into_iter().take(RECENT_VIEW_LIMIT) {
            if viewed.iter().any(|l| l.id == view.listing.id) {
                continue;
            }
            viewed.push(view.listing);
        }
        Self { viewed }
    }

    pub fn is_empty(&self) -> bool {
        self.viewed.is_empty()
    }

    pub fn viewed(&self) -> &[Listing] {
        &self.viewed
    }

    pub fn references(&self) -> &[Listing] {
        &self.viewed[..self.viewed.len().min(REFERENCE_LIMIT)]
    }

    pub fn viewed_ids(&self) -> HashSet<Uuid> {
        self.viewed.iter().map(|l| l.id).collect()
    }

    pub fn candidate_query(&self) -> CandidateQuery {
        let mut school_ids: Vec<Uuid> = Vec::new();
        for school_id in self.viewed.iter().filter_map(|l| l.school_id) {
            if !school_ids.contains(&school_id) {
                school_ids.push(school_id);
            }
        }
        // Too many schools to be a useful filter.
        if school_ids.len() > MAX_SCHOOL_FILTER {
            school_ids.clear();
        }

        let prices: Vec<f64> = self
            .references()
            .iter()
            .filter_map(|l| l.price_min)
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();
        let price_band = (!prices.is_empty()).then(|| {
            let avg = prices.iter().sum::<f64>() / prices.len() as f64;
            PriceBand {
                min: avg * (1.0 - PRICE_BAND_RATIO),
                max: avg * (1.0 + PRICE_BAND_RATIO),
            }
        });

        CandidateQuery {
            school_ids,
            price_band,
            min_rating: MIN_CANDIDATE_RATING,
            exclude_ids: self.viewed.iter().map(|l| l.id).collect(),
            limit: CANDIDATE_LIMIT,
        }
    }
}

/// Scores each candidate against every reference, keeps its best match, then
/// returns the top `limit` candidates scoring above the threshold.
///
/// Candidates are expected in fetch order (rating desc, view count desc); equal
/// scores keep that order.
pub fn rank_candidates(
    references: &[Listing],
    candidates: Vec<Listing>,
    excluded: &HashSet<Uuid>,
    limit: usize,
) -> Vec<RecommendedListing> {
    let mut seen = HashSet::<Uuid>::new();
    let mut scored: Vec<RecommendedListing> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if excluded.contains(&candidate.id) || !seen.insert(candidate.id) {
            continue;
        }

        let Some(best) = best_match(references, &candidate) else {
            continue;
        };
        if best.score <= SCORE_THRESHOLD {
            continue;
        }

        scored.push(RecommendedListing {
            listing: candidate,
            score: best.score,
            reasons: best.reasons,
        });
    }

    // Stable: ties keep fetch order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

/// First-seen reference wins ties; a later one must score strictly higher.
fn best_match(references: &[Listing], candidate: &Listing) -> Option<Similarity> {
    let mut best: Option<Similarity> = None;
    for reference in references {
        let sim = score_pair(reference, candidate);
        if best.as_ref().map_or(true, |b| sim.score > b.score) {
            best = Some(sim);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn school(n: u128) -> Option<Uuid> {
        Some(Uuid::from_u128(n))
    }

    fn hostel(address: &str, price_min: f64, rating: f64, school_id: Option<Uuid>) -> Listing {
        Listing {
            address: Some(address.to_string()),
            price_min: Some(price_min),
            rating: Some(rating),
            school_id,
            ..Listing::new(Uuid::new_v4(), "Hostel")
        }
    }

    fn views(listings: &[Listing]) -> Vec<ViewEvent> {
        let user_id = Uuid::from_u128(99);
        let newest = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
        listings
            .iter()
            .enumerate()
            .map(|(i, listing)| ViewEvent {
                user_id,
                listing: listing.clone(),
                viewed_at: newest - Duration::minutes(i as i64),
            })
            .collect()
    }

    #[test]
    fn history_dedupes_and_keeps_three_most_recent_references() {
        let a = hostel("Legon", 400.0, 4.0, school(1));
        let b = hostel("Legon", 500.0, 4.0, school(1));
        let c = hostel("Legon", 600.0, 4.0, school(1));
        let d = hostel("Legon", 700.0, 4.0, school(1));

        let history = History::from_views(views(&[a.clone(), a.clone(), b.clone(), c.clone(), d.clone()]));

        let refs: Vec<Uuid> = history.references().iter().map(|l| l.id).collect();
        assert_eq!(refs, vec![a.id, b.id, c.id]);
        assert_eq!(history.viewed().len(), 4);
        assert!(history.viewed_ids().contains(&d.id));
    }

    #[test]
    fn history_only_considers_ten_most_recent_events() {
        let listings: Vec<Listing> = (0..12).map(|_| hostel("Legon", 400.0, 4.0, None)).collect();
        let history = History::from_views(views(&listings));
        assert_eq!(history.viewed().len(), RECENT_VIEW_LIMIT);
        assert!(!history.viewed_ids().contains(&listings[11].id));
    }

    #[test]
    fn candidate_query_bands_price_around_reference_average() {
        let history = History::from_views(views(&[
            hostel("Legon", 400.0, 4.0, school(1)),
            hostel("Legon", 800.0, 4.0, school(2)),
            hostel("Legon", 600.0, 4.0, school(1)),
        ]));

        let query = history.candidate_query();
        assert_eq!(query.school_ids, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
        assert_eq!(query.price_band, Some(PriceBand { min: 300.0, max: 900.0 }));
        assert_eq!(query.min_rating, MIN_CANDIDATE_RATING);
        assert_eq!(query.limit, CANDIDATE_LIMIT);
        assert_eq!(query.exclude_ids.len(), 3);
    }

    #[test]
    fn candidate_query_drops_school_filter_beyond_three_schools() {
        let history = History::from_views(views(&[
            hostel("Legon", 400.0, 4.0, school(1)),
            hostel("Legon", 400.0, 4.0, school(2)),
            hostel("Legon", 400.0, 4.0, school(3)),
            hostel("Legon", 400.0, 4.0, school(4)),
        ]));
        assert!(history.candidate_query().school_ids.is_empty());
    }

    #[test]
    fn candidate_query_without_prices_has_no_band() {
        let mut listing = hostel("Legon", 400.0, 4.0, None);
        listing.price_min = None;
        let history = History::from_views(views(&[listing]));
        assert_eq!(history.candidate_query().price_band, None);
    }

    #[test]
    fn viewed_listings_are_never_recommended() {
        let reference = hostel("North Campus, Accra", 400.0, 4.2, school(1));
        let mut twin = reference.clone();
        twin.view_count = 500;

        let excluded: HashSet<Uuid> = [reference.id].into_iter().collect();
        let out = rank_candidates(&[reference.clone()], vec![twin], &excluded, DEFAULT_LIMIT);
        assert!(out.is_empty());
    }

    #[test]
    fn threshold_is_strict() {
        let reference = hostel("Legon", 0.0, 0.0, school(1));
        // School (15) + rating gap 0.5 (5) = exactly 20.
        let at_threshold = hostel("Kumasi", 0.0, 0.5, school(1));
        // School (15) + rating gap 0.4 (6) = 21.
        let above = hostel("Kumasi", 0.0, 0.4, school(1));

        let out = rank_candidates(
            &[reference],
            vec![at_threshold, above.clone()],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].listing.id, above.id);
        assert!(out[0].score > SCORE_THRESHOLD);
    }

    #[test]
    fn best_reference_wins_and_supplies_reasons() {
        let weak = hostel("Kumasi", 2000.0, 1.0, school(5));
        let strong = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let candidate = hostel("North Campus, Accra", 420.0, 4.1, school(1));

        let out = rank_candidates(
            &[weak, strong.clone()],
            vec![candidate.clone()],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );

        assert_eq!(out.len(), 1);
        let expected = score_pair(&strong, &candidate);
        assert_eq!(out[0].score, expected.score);
        assert_eq!(out[0].reasons, expected.reasons);
        assert_eq!(out[0].listing, candidate);
    }

    #[test]
    fn tied_references_keep_first_reasons() {
        let north_first = Listing {
            address: Some("North Campus, Accra".to_string()),
            ..Listing::new(Uuid::new_v4(), "A")
        };
        let accra_first = Listing {
            address: Some("Accra, North Campus".to_string()),
            ..Listing::new(Uuid::new_v4(), "B")
        };
        let candidate = Listing {
            address: Some("North Campus Accra".to_string()),
            ..Listing::new(Uuid::new_v4(), "C")
        };
        assert_eq!(
            score_pair(&north_first, &candidate).score,
            score_pair(&accra_first, &candidate).score
        );

        let out = rank_candidates(
            &[north_first.clone(), accra_first.clone()],
            vec![candidate.clone()],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );
        assert_eq!(out[0].reasons, vec!["Similar location: north, campus, accra".to_string()]);

        let out = rank_candidates(
            &[accra_first, north_first],
            vec![candidate],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );
        assert_eq!(out[0].reasons, vec!["Similar location: accra, north, campus".to_string()]);
    }

    #[test]
    fn equal_scores_keep_fetch_order() {
        let reference = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let first = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let second = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let better_later = Listing {
            amenities: vec!["Wi-Fi".to_string()],
            ..hostel("North Campus, Accra", 400.0, 4.0, school(1))
        };
        let reference = Listing {
            amenities: vec!["Wi-Fi".to_string()],
            ..reference
        };

        let out = rank_candidates(
            &[reference],
            vec![first.clone(), second.clone(), better_later.clone()],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );

        let ids: Vec<Uuid> = out.iter().map(|r| r.listing.id).collect();
        assert_eq!(ids, vec![better_later.id, first.id, second.id]);
    }

    #[test]
    fn truncates_to_top_scores_from_large_pool() {
        let references = vec![
            hostel("North Campus, Accra", 400.0, 4.0, school(1)),
            hostel("Ayeduase, Kumasi", 900.0, 4.5, school(2)),
            hostel("Cape Coast", 300.0, 3.8, school(3)),
        ];
        let candidates: Vec<Listing> = (0..50)
            .map(|i| {
                let address = if i % 2 == 0 { "North Campus, Accra" } else { "Somewhere Else" };
                hostel(address, 300.0 + (i as f64) * 20.0, 3.5 + (i % 3) as f64 * 0.5, school(1 + (i % 4) as u128))
            })
            .collect();

        let out = rank_candidates(&references, candidates.clone(), &HashSet::new(), 5);
        assert!(out.len() <= 5);
        assert!(out.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(out.iter().all(|r| r.score > SCORE_THRESHOLD));

        let mut all: Vec<f64> = candidates
            .iter()
            .map(|c| {
                references
                    .iter()
                    .map(|r| score_pair(r, c).score)
                    .fold(0.0, f64::max)
            })
            .filter(|s| *s > SCORE_THRESHOLD)
            .collect();
        all.sort_by(|a, b| b.partial_cmp(a).unwrap());
        let top: Vec<f64> = all.into_iter().take(5).collect();
        let got: Vec<f64> = out.iter().map(|r| r.score).collect();
        assert_eq!(got, top);
    }

    #[test]
    fn duplicate_candidates_are_scored_once() {
        let reference = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let candidate = hostel("North Campus, Accra", 410.0, 4.0, school(1));

        let out = rank_candidates(
            &[reference],
            vec![candidate.clone(), candidate],
            &HashSet::new(),
            DEFAULT_LIMIT,
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        let reference = hostel("North Campus, Accra", 400.0, 4.0, school(1));
        let candidate = hostel("North Campus, Accra", 410.0, 4.0, school(1));
        assert!(rank_candidates(&[reference], vec![candidate], &HashSet::new(), 0).is_empty());
    }
}
