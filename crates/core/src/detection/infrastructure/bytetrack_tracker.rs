/// Simplified ByteTrack multi-object tracker.
///
/// Two-stage association: high-confidence candidates are matched to
/// existing tracks first, then low-confidence candidates fill remaining
/// unmatched tracks. Weak candidates never start a track, so momentary
/// detector noise doesn't mint ids, while an existing track survives a
/// brief confidence drop.
use std::collections::HashSet;

use crate::shared::bounding_box::BoundingBox;

/// A detection competing for a track id this frame.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub score: f32,
}

const HIGH_THRESH: f32 = 0.5;
const MATCH_THRESH: f32 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: BoundingBox,
    frames_lost: usize,
    matched: bool,
    candidate_index: Option<usize>,
}

pub struct ByteTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Advances the tracker one frame and returns one entry per candidate,
    /// aligned by index: the track id now covering that candidate, or
    /// `None` for a low-confidence candidate that matched nothing.
    pub fn assign(&mut self, candidates: &[Candidate]) -> Vec<Option<u32>> {
        let (high, low) = split_by_confidence(candidates);

        self.reset_match_flags();
        let num_existing = self.tracks.len();
        let matched_high = self.match_candidates(&high, candidates, false);
        self.match_candidates(&low, candidates, true);
        self.create_tracks_for_unmatched(&high, &matched_high, candidates);
        self.age_unmatched_tracks(num_existing);

        let mut ids = vec![None; candidates.len()];
        for track in self.tracks.iter().filter(|t| t.matched) {
            if let Some(ci) = track.candidate_index {
                ids[ci] = Some(track.id);
            }
        }
        ids
    }

    fn reset_match_flags(&mut self) {
        for track in &mut self.tracks {
            track.matched = false;
            track.candidate_index = None;
        }
    }

    /// Matches one confidence band of candidates against tracks. The low
    /// band (`unmatched_only`) may only claim tracks the high band left.
    fn match_candidates(
        &mut self,
        band: &[(usize, &Candidate)],
        candidates: &[Candidate],
        unmatched_only: bool,
    ) -> HashSet<usize> {
        let track_refs: Vec<(usize, BoundingBox)> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !unmatched_only || !t.matched)
            .map(|(i, t)| (i, t.bbox))
            .collect();

        let mut claimed = HashSet::new();
        for (ti, ci) in greedy_match(&track_refs, band, MATCH_THRESH) {
            let bbox = candidates[ci].bbox;
            self.tracks[ti].bbox = bbox;
            self.tracks[ti].frames_lost = 0;
            self.tracks[ti].matched = true;
            self.tracks[ti].candidate_index = Some(ci);
            claimed.insert(ci);
        }
        claimed
    }

    fn create_tracks_for_unmatched(
        &mut self,
        high: &[(usize, &Candidate)],
        matched: &HashSet<usize>,
        candidates: &[Candidate],
    ) {
        for (ci, _) in high {
            if !matched.contains(ci) {
                self.tracks.push(TrackState {
                    id: self.next_id,
                    bbox: candidates[*ci].bbox,
                    frames_lost: 0,
                    matched: true,
                    candidate_index: Some(*ci),
                });
                self.next_id += 1;
            }
        }
    }

    fn age_unmatched_tracks(&mut self, num_existing: usize) {
        for track in self.tracks.iter_mut().take(num_existing) {
            if !track.matched {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);
    }
}

type IndexedCandidates<'a> = Vec<(usize, &'a Candidate)>;

fn split_by_confidence(candidates: &[Candidate]) -> (IndexedCandidates<'_>, IndexedCandidates<'_>) {
    let mut high = Vec::new();
    let mut low = Vec::new();
    for (i, cand) in candidates.iter().enumerate() {
        if cand.score >= HIGH_THRESH {
            high.push((i, cand));
        } else {
            low.push((i, cand));
        }
    }
    (high, low)
}

/// Greedy IoU matching: pairs sorted by descending IoU, each track and
/// candidate used at most once.
fn greedy_match(
    tracks: &[(usize, BoundingBox)],
    candidates: &[(usize, &Candidate)],
    thresh: f32,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
    for (ti, bbox) in tracks {
        for (ci, cand) in candidates {
            let score = bbox.iou(&cand.bbox);
            if score >= thresh {
                pairs.push((*ti, *ci, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_candidates = HashSet::new();
    let mut matches = Vec::new();

    for (ti, ci, _) in &pairs {
        if !used_tracks.contains(ti) && !used_candidates.contains(ci) {
            used_tracks.insert(*ti);
            used_candidates.insert(*ci);
            matches.push((*ti, *ci));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Candidate {
        Candidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
        }
    }

    #[test]
    fn test_high_confidence_candidates_get_distinct_ids() {
        let mut tracker = ByteTracker::new(5);
        let ids = tracker.assign(&[
            cand(0.0, 0.0, 50.0, 50.0, 0.9),
            cand(100.0, 100.0, 150.0, 150.0, 0.8),
        ]);
        assert_eq!(ids.len(), 2);
        assert!(ids[0].is_some());
        assert!(ids[1].is_some());
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_id_stays_with_the_moving_box() {
        let mut tracker = ByteTracker::new(5);
        let first = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let id = first[0].unwrap();

        let second = tracker.assign(&[cand(12.0, 12.0, 62.0, 62.0, 0.9)]);
        assert_eq!(second, vec![Some(id)]);
    }

    #[test]
    fn test_ids_follow_candidates_across_reordering() {
        let mut tracker = ByteTracker::new(5);
        let first = tracker.assign(&[
            cand(0.0, 0.0, 50.0, 50.0, 0.9),
            cand(200.0, 200.0, 250.0, 250.0, 0.9),
        ]);
        let (left_id, right_id) = (first[0].unwrap(), first[1].unwrap());

        // Same people, swapped positions in the candidate list.
        let second = tracker.assign(&[
            cand(202.0, 202.0, 252.0, 252.0, 0.9),
            cand(2.0, 2.0, 52.0, 52.0, 0.9),
        ]);
        assert_eq!(second[0], Some(right_id));
        assert_eq!(second[1], Some(left_id));
    }

    #[test]
    fn test_low_confidence_candidate_matches_nothing_without_tracks() {
        let mut tracker = ByteTracker::new(5);
        let ids = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.3)]);
        assert_eq!(ids, vec![None]);
    }

    #[test]
    fn test_low_confidence_keeps_existing_track_alive() {
        let mut tracker = ByteTracker::new(5);
        let first = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let id = first[0].unwrap();

        let second = tracker.assign(&[cand(12.0, 12.0, 62.0, 62.0, 0.3)]);
        assert_eq!(second, vec![Some(id)]);
    }

    #[test]
    fn test_track_survives_within_max_lost() {
        let mut tracker = ByteTracker::new(3);
        let first = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let id = first[0].unwrap();

        tracker.assign(&[]);
        tracker.assign(&[]);

        let reacquired = tracker.assign(&[cand(12.0, 12.0, 62.0, 62.0, 0.9)]);
        assert_eq!(reacquired, vec![Some(id)]);
    }

    #[test]
    fn test_track_forgotten_after_max_lost() {
        let mut tracker = ByteTracker::new(2);
        let first = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        let id = first[0].unwrap();

        tracker.assign(&[]);
        tracker.assign(&[]);
        tracker.assign(&[]);

        // Re-detection after the memory window gets a fresh id; recovering
        // the person is the identity resolver's job, not the tracker's.
        let reacquired = tracker.assign(&[cand(10.0, 10.0, 60.0, 60.0, 0.9)]);
        assert_ne!(reacquired[0], Some(id));
        assert!(reacquired[0].is_some());
    }

    #[test]
    fn test_empty_frame_returns_empty() {
        let mut tracker = ByteTracker::new(5);
        assert!(tracker.assign(&[]).is_empty());
    }

    #[test]
    fn test_distant_candidate_does_not_steal_track() {
        let mut tracker = ByteTracker::new(5);
        let first = tracker.assign(&[cand(0.0, 0.0, 50.0, 50.0, 0.9)]);
        let id = first[0].unwrap();

        // Far away, no IoU overlap: a new track, not a match.
        let second = tracker.assign(&[cand(300.0, 300.0, 350.0, 350.0, 0.9)]);
        assert!(second[0].is_some());
        assert_ne!(second[0], Some(id));
    }

    #[test]
    fn test_one_track_claims_at_most_one_candidate() {
        let mut tracker = ByteTracker::new(5);
        tracker.assign(&[cand(0.0, 0.0, 50.0, 50.0, 0.9)]);

        // Two overlapping candidates near the track: exactly one claims
        // the old id, the other starts a new track.
        let ids = tracker.assign(&[
            cand(1.0, 1.0, 51.0, 51.0, 0.9),
            cand(4.0, 4.0, 54.0, 54.0, 0.9),
        ]);
        assert!(ids[0].is_some());
        assert!(ids[1].is_some());
        assert_ne!(ids[0], ids[1]);
    }
}
