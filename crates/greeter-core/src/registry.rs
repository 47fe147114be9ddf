//! Append-only registry of individuals seen during this process lifetime.
//!
//! Decides whether an embedding belongs to someone already seen (cosine
//! distance below the threshold) or to a new individual. Entries are never
//! removed; memory grows with the number of distinct people, not frames.
//!
//! The registry does no locking of its own. Callers that share it across
//! threads must hold a single lock around every access.

use crate::types::Embedding;
use std::time::{Duration, Instant};

/// One distinct individual.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub embedding: Embedding,
    pub last_seen: Instant,
}

/// Outcome of [`FaceRegistry::check_and_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub is_new: bool,
    /// 1-based id of the matched or newly created entry (insertion order).
    pub individual_id: usize,
}

#[derive(Debug)]
pub struct FaceRegistry {
    entries: Vec<RegistryEntry>,
    distance_threshold: f32,
    cooldown: Duration,
}

impl FaceRegistry {
    pub fn new(distance_threshold: f32, cooldown: Duration) -> Self {
        Self {
            entries: Vec::new(),
            distance_threshold,
            cooldown,
        }
    }

    /// Match `embedding` against every entry in insertion order, first hit wins.
    pub fn check_and_register(&mut self, embedding: &Embedding) -> Registration {
        self.check_and_register_at(embedding, Instant::now())
    }

    /// [`check_and_register`](Self::check_and_register) with an explicit clock reading.
    ///
    /// A matched entry's `last_seen` is refreshed only once the cooldown has
    /// already elapsed, so an individual seen continuously keeps their original
    /// timestamp until it lapses.
    pub fn check_and_register_at(&mut self, embedding: &Embedding, now: Instant) -> Registration {
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            let distance = entry.embedding.cosine_distance(embedding);
            if distance < self.distance_threshold {
                if now.saturating_duration_since(entry.last_seen) > self.cooldown {
                    tracing::debug!(id = idx + 1, distance, "cooldown lapsed; refreshing last_seen");
                    entry.last_seen = now;
                }
                return Registration {
                    is_new: false,
                    individual_id: idx + 1,
                };
            }
        }

        self.entries.push(RegistryEntry {
            embedding: embedding.clone(),
            last_seen: now,
        });
        tracing::debug!(id = self.entries.len(), "registered new individual");

        Registration {
            is_new: true,
            individual_id: self.entries.len(),
        }
    }

    /// Number of distinct individuals registered so far.
    pub fn individuals(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: f32 = 0.65;
    const COOLDOWN: Duration = Duration::from_secs(20);

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    /// Unit vectors with pairwise cosine distances (1,2)=0.3, (1,3)=0.9, (2,3)=0.8.
    fn triangle() -> (Embedding, Embedding, Embedding) {
        let e1 = emb(&[1.0, 0.0, 0.0]);
        let e2_y = (1.0f32 - 0.7 * 0.7).sqrt();
        let e2 = emb(&[0.7, e2_y, 0.0]);
        let e3_y = (0.2 - 0.7 * 0.1) / e2_y;
        let e3_z = (1.0f32 - 0.1 * 0.1 - e3_y * e3_y).sqrt();
        let e3 = emb(&[0.1, e3_y, e3_z]);
        (e1, e2, e3)
    }

    #[test]
    fn test_triangle_fixture_distances() {
        let (e1, e2, e3) = triangle();
        assert!((e1.cosine_distance(&e2) - 0.3).abs() < 1e-4);
        assert!((e1.cosine_distance(&e3) - 0.9).abs() < 1e-4);
        assert!((e2.cosine_distance(&e3) - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_first_embedding_is_new() {
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        let r = reg.check_and_register(&emb(&[1.0, 0.0]));
        assert_eq!(r, Registration { is_new: true, individual_id: 1 });
        assert_eq!(reg.individuals(), 1);
    }

    #[test]
    fn test_close_embedding_is_not_new() {
        let (e1, e2, _) = triangle();
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register(&e1);
        let r = reg.check_and_register(&e2);
        assert!(!r.is_new);
        assert_eq!(r.individual_id, 1);
        assert_eq!(reg.individuals(), 1);
    }

    #[test]
    fn test_distant_embedding_grows_registry_by_one() {
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register(&emb(&[1.0, 0.0]));
        let r = reg.check_and_register(&emb(&[0.0, 1.0]));
        assert!(r.is_new);
        assert_eq!(r.individual_id, 2);
        assert_eq!(reg.individuals(), 2);
    }

    #[test]
    fn test_distance_equal_to_threshold_is_new() {
        // Orthogonal vectors are exactly distance 1.0 apart.
        let mut reg = FaceRegistry::new(1.0, COOLDOWN);
        reg.check_and_register(&emb(&[1.0, 0.0]));
        assert!(reg.check_and_register(&emb(&[0.0, 1.0])).is_new);
    }

    #[test]
    fn test_three_embedding_scenario() {
        let (e1, e2, e3) = triangle();
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);

        assert!(reg.check_and_register(&e1).is_new);
        assert!(!reg.check_and_register(&e2).is_new);
        let r3 = reg.check_and_register(&e3);
        assert!(r3.is_new);
        assert_eq!(r3.individual_id, 2);
        assert_eq!(reg.individuals(), 2);
    }

    #[test]
    fn test_first_match_wins_in_insertion_order() {
        // Probe is within threshold of both entries; the first one is reported.
        let mut reg = FaceRegistry::new(1.5, COOLDOWN);
        reg.check_and_register(&emb(&[1.0, 0.0]));
        reg.entries.push(RegistryEntry {
            embedding: emb(&[0.0, 1.0]),
            last_seen: Instant::now(),
        });
        let r = reg.check_and_register(&emb(&[0.0, 1.0]));
        assert_eq!(r.individual_id, 1);
    }

    #[test]
    fn test_recheck_before_cooldown_keeps_timestamp() {
        let e = emb(&[1.0, 0.0, 0.0]);
        let t0 = Instant::now();
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register_at(&e, t0);

        let r = reg.check_and_register_at(&e, t0 + Duration::from_secs(5));
        assert!(!r.is_new);
        assert_eq!(reg.entries()[0].last_seen, t0);

        // Exactly at the cooldown boundary is not yet "older than".
        reg.check_and_register_at(&e, t0 + COOLDOWN);
        assert_eq!(reg.entries()[0].last_seen, t0);
    }

    #[test]
    fn test_recheck_after_cooldown_refreshes_timestamp() {
        let e = emb(&[1.0, 0.0, 0.0]);
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(25);
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register_at(&e, t0);

        let r = reg.check_and_register_at(&e, later);
        assert!(!r.is_new);
        assert_eq!(reg.entries()[0].last_seen, later);
        assert_eq!(reg.individuals(), 1);
    }

    #[test]
    fn test_continuous_sighting_does_not_extend_cooldown() {
        let e = emb(&[1.0, 0.0, 0.0]);
        let t0 = Instant::now();
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register_at(&e, t0);

        for secs in [1u64, 5, 10, 15, 19] {
            reg.check_and_register_at(&e, t0 + Duration::from_secs(secs));
        }
        assert_eq!(reg.entries()[0].last_seen, t0);

        let t21 = t0 + Duration::from_secs(21);
        reg.check_and_register_at(&e, t21);
        assert_eq!(reg.entries()[0].last_seen, t21);
    }

    #[test]
    fn test_known_face_never_becomes_new_again() {
        let e = emb(&[0.3, 0.4, 0.5]);
        let t0 = Instant::now();
        let mut reg = FaceRegistry::new(THRESHOLD, COOLDOWN);
        reg.check_and_register_at(&e, t0);
        let r = reg.check_and_register_at(&e, t0 + Duration::from_secs(3600));
        assert!(!r.is_new);
        assert_eq!(reg.individuals(), 1);
    }
}
