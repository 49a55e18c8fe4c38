use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::KbError;
use crate::kb::KnowledgeBase;
use crate::model::{Candidate, MatchStage, Resolution, ResolvedEntity, SearchHit};
use crate::score::{is_exact_match, ScoreBreakdown, TypePolicy, EXACT_MATCH_BONUS};
use crate::text::{normalize, singularize_english};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Search languages, primary first.
    pub languages: Vec<String>,
    pub search_limit: usize,
    pub exact_search_limit: usize,
    pub min_label_similarity: f64,
    pub min_total_score: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "fr".to_string()],
            search_limit: 50,
            exact_search_limit: 5,
            min_label_similarity: 70.0,
            min_total_score: 30.0,
        }
    }
}

/// Where a resolution currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    NotStarted,
    ContextSearch,
    ContextAccepted,
    ContextRejected,
    ExactLabelSearch,
    ExactAccepted,
    Unresolved,
    Terminal,
}

struct Transitions<'a> {
    keyword: &'a str,
    state: ResolveState,
}

impl<'a> Transitions<'a> {
    fn new(keyword: &'a str) -> Self {
        Self {
            keyword,
            state: ResolveState::NotStarted,
        }
    }

    fn to(&mut self, next: ResolveState) {
        debug!(keyword = self.keyword, from = ?self.state, to = ?next, "Resolver transition");
        self.state = next;
    }
}

/// Maps a keyword plus document context to a knowledge-base entity.
pub struct Resolver<K> {
    kb: Arc<K>,
    config: ResolverConfig,
    types: TypePolicy,
}

impl<K: KnowledgeBase> Resolver<K> {
    pub fn new(kb: Arc<K>, config: ResolverConfig) -> Self {
        Self::with_type_policy(kb, config, TypePolicy::default())
    }

    pub fn with_type_policy(kb: Arc<K>, config: ResolverConfig, types: TypePolicy) -> Self {
        Self { kb, config, types }
    }

    pub fn kb(&self) -> &Arc<K> {
        &self.kb
    }

    pub fn languages(&self) -> &[String] {
        &self.config.languages
    }

    /// Resolve `keyword` in the light of `context`.
    ///
    /// No match is not an error: it yields [`Resolution::Unresolved`]. Only
    /// knowledge-base failures that outlived the client's retries propagate.
    pub async fn resolve(&self, keyword: &str, context: &str) -> Result<Resolution, KbError> {
        let keyword = normalize(keyword);
        let context = normalize(context);
        let mut fsm = Transitions::new(&keyword);

        if keyword.is_empty() {
            fsm.to(ResolveState::Terminal);
            return Ok(Resolution::Unresolved { disambiguation: false });
        }

        fsm.to(ResolveState::ContextSearch);
        let accepted = match self.context_search(&keyword, &context).await? {
            Some(candidate) => {
                fsm.to(ResolveState::ContextAccepted);
                Some((candidate, MatchStage::Context))
            }
            None => {
                fsm.to(ResolveState::ContextRejected);
                fsm.to(ResolveState::ExactLabelSearch);
                match self.exact_label_search(&keyword).await? {
                    Some(candidate) => {
                        fsm.to(ResolveState::ExactAccepted);
                        Some((candidate, MatchStage::ExactLabel))
                    }
                    None => None,
                }
            }
        };

        let resolution = match accepted {
            Some((candidate, stage)) => self.finalize(candidate, stage).await?,
            None => Resolution::Unresolved { disambiguation: false },
        };

        if resolution.entity().is_none() {
            fsm.to(ResolveState::Unresolved);
        }
        fsm.to(ResolveState::Terminal);
        Ok(resolution)
    }

    /// Search the keyword and its singular in every language and merge hits
    /// by id; the first language to surface an id keeps it.
    pub async fn candidate_pool(&self, keyword: &str) -> Result<Vec<(SearchHit, String)>, KbError> {
        let mut terms = vec![keyword.to_string()];
        let singular = singularize_english(keyword);
        if singular != keyword {
            terms.push(singular);
        }

        let mut pool = Vec::new();
        let mut seen = HashSet::new();
        for term in &terms {
            for language in &self.config.languages {
                let mut hits = self
                    .kb
                    .search_entities(term, language, self.config.search_limit)
                    .await?;
                if hits.is_empty() {
                    hits = self
                        .kb
                        .search_exact_label(term, language, self.config.search_limit)
                        .await?;
                }
                for hit in hits {
                    if hit.id.is_empty() || !seen.insert(hit.id.clone()) {
                        continue;
                    }
                    pool.push((hit, language.clone()));
                }
            }
        }

        Ok(pool)
    }

    async fn context_search(&self, keyword: &str, context: &str) -> Result<Option<Candidate>, KbError> {
        let pool = self.candidate_pool(keyword).await?;
        if pool.is_empty() {
            return Ok(None);
        }

        let ids: Vec<String> = pool.iter().map(|(hit, _)| hit.id.clone()).collect();
        let details = self.kb.get_entities(&ids, &self.config.languages).await?;

        let mut survivors = Vec::new();
        for (hit, language) in pool {
            let types = details
                .get(&hit.id)
                .map(|d| d.instance_of())
                .unwrap_or_default();
            let verdict = self.types.type_bonus_or_block(&types);
            if verdict.blocked {
                debug!(keyword, candidate = %hit.id, "Candidate blocked by type");
                continue;
            }

            let breakdown = ScoreBreakdown::compute(keyword, context, &hit);
            survivors.push(Candidate {
                label_similarity: breakdown.label_similarity,
                match_score: breakdown.total() + verdict.bonus,
                hit,
                language,
                types,
            });
        }

        let ranked = rank_candidates(survivors, &self.config.languages);
        let Some(top) = ranked.into_iter().next() else {
            return Ok(None);
        };

        debug!(
            keyword,
            candidate = %top.hit.id,
            label_similarity = top.label_similarity,
            match_score = top.match_score,
            "Top context candidate"
        );

        if self.passes_gates(&top) {
            Ok(Some(top))
        } else {
            Ok(None)
        }
    }

    /// Absolute acceptance thresholds, independent of ranking.
    pub fn passes_gates(&self, candidate: &Candidate) -> bool {
        candidate.label_similarity >= self.config.min_label_similarity
            && candidate.match_score >= self.config.min_total_score
    }

    async fn exact_label_search(&self, keyword: &str) -> Result<Option<Candidate>, KbError> {
        let singular = singularize_english(keyword);

        for language in &self.config.languages {
            let mut hits = self
                .kb
                .search_exact_label(&singular, language, self.config.exact_search_limit)
                .await?;
            if hits.is_empty() {
                hits = self
                    .kb
                    .search_entities(&singular, language, self.config.exact_search_limit)
                    .await?;
            }

            for hit in hits {
                if !is_exact_match(keyword, &hit.label) {
                    continue;
                }
                let details = self
                    .kb
                    .get_entities(std::slice::from_ref(&hit.id), &self.config.languages)
                    .await?;
                let types = details
                    .get(&hit.id)
                    .map(|d| d.instance_of())
                    .unwrap_or_default();
                let verdict = self.types.type_bonus_or_block(&types);
                if verdict.blocked {
                    continue;
                }

                return Ok(Some(Candidate {
                    hit,
                    language: language.clone(),
                    types,
                    label_similarity: 100.0,
                    match_score: EXACT_MATCH_BONUS + verdict.bonus,
                }));
            }
        }

        Ok(None)
    }

    /// Re-read the accepted entity and reject disambiguation pages.
    async fn finalize(&self, candidate: Candidate, stage: MatchStage) -> Result<Resolution, KbError> {
        let id = candidate.hit.id.clone();
        let details = self
            .kb
            .get_entities(std::slice::from_ref(&id), &self.config.languages)
            .await?;

        let Some(detail) = details.get(&id) else {
            debug!(entity = %id, "Accepted entity vanished");
            return Ok(Resolution::Unresolved { disambiguation: false });
        };

        if detail.is_disambiguation() {
            debug!(entity = %id, "Discarding disambiguation page");
            return Ok(Resolution::Unresolved { disambiguation: true });
        }

        let description = if candidate.hit.description.is_empty() {
            self.config
                .languages
                .iter()
                .find_map(|l| detail.descriptions.get(l).cloned())
                .unwrap_or_default()
        } else {
            candidate.hit.description.clone()
        };

        Ok(Resolution::Resolved(ResolvedEntity {
            label: detail
                .label(&self.config.languages)
                .unwrap_or_else(|| candidate.hit.label.clone()),
            description,
            cross_ref: detail.bnf_id(),
            stage,
            label_similarity: candidate.label_similarity,
            match_score: candidate.match_score,
            instance_of: detail.instance_of(),
            direct_superclasses: detail.subclass_of(),
            id,
        }))
    }
}

/// Sort by score, then similarity, then language priority (primary first).
/// The sort is stable, so search order breaks any remaining ties.
pub fn rank_candidates(mut candidates: Vec<Candidate>, languages: &[String]) -> Vec<Candidate> {
    let priority = |c: &Candidate| {
        languages
            .iter()
            .position(|l| *l == c.language)
            .unwrap_or(usize::MAX)
    };

    candidates.sort_by(|a, b| {
        b.match_score
            .total_cmp(&a.match_score)
            .then_with(|| b.label_similarity.total_cmp(&a.label_similarity))
            .then_with(|| priority(a).cmp(&priority(b)))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockKb;
    use std::collections::BTreeSet;
    use std::sync::atomic::Ordering;

    fn resolver(kb: MockKb) -> Resolver<MockKb> {
        Resolver::new(Arc::new(kb), ResolverConfig::default())
    }

    fn candidate(id: &str, language: &str, similarity: f64, score: f64) -> Candidate {
        Candidate {
            hit: SearchHit {
                id: id.to_string(),
                label: id.to_string(),
                description: String::new(),
                aliases: Vec::new(),
            },
            language: language.to_string(),
            types: BTreeSet::new(),
            label_similarity: similarity,
            match_score: score,
        }
    }

    #[tokio::test]
    async fn test_machine_learning_resolves() {
        let kb = MockKb::new()
            .entity("Q2539", "machine learning", "study of algorithms that learn", &["Q11862829"], &["Q11660"])
            .search("machine learning", "en", &["Q2539"]);

        let resolution = resolver(kb)
            .resolve("machine learning", "A survey of machine learning algorithms")
            .await
            .unwrap();

        let entity = resolution.entity().expect("resolved");
        assert_eq!(entity.id, "Q2539");
        assert!(matches!(entity.stage, MatchStage::Context | MatchStage::ExactLabel));
        assert_eq!(entity.label_similarity, 100.0);
        assert!(entity.match_score >= 50.0);
        assert_eq!(entity.direct_superclasses, vec!["Q11660"]);
    }

    #[tokio::test]
    async fn test_disambiguation_page_is_unresolved() {
        let kb = MockKb::new()
            .entity("Q_BANK", "bank", "Wikimedia disambiguation page", &["Q4167410"], &[])
            .search("banks", "en", &["Q_BANK"])
            .search("bank", "en", &["Q_BANK"])
            .exact("bank", "en", &["Q_BANK"]);

        let resolution = resolver(kb).resolve("banks", "Central banks and monetary policy").await.unwrap();

        assert_eq!(resolution, Resolution::Unresolved { disambiguation: true });
        assert!(resolution.is_disambiguation());
    }

    #[tokio::test]
    async fn test_blocked_type_never_wins() {
        let kb = MockKb::new()
            .entity("Q_ARTICLE", "polymer", "scholarly article", &["Q13442814"], &[])
            .entity("Q_POLYMERS", "polymers", "class of substances", &[], &[])
            .search("polymer", "en", &["Q_ARTICLE", "Q_POLYMERS"])
            .exact("polymer", "en", &["Q_ARTICLE"]);

        let resolution = resolver(kb).resolve("polymer", "").await.unwrap();
        let entity = resolution.entity().expect("resolved");
        assert_eq!(entity.id, "Q_POLYMERS");
        assert_eq!(entity.stage, MatchStage::Context);
    }

    #[tokio::test]
    async fn test_only_blocked_candidates_is_unresolved() {
        let kb = MockKb::new()
            .entity("Q_ARTICLE", "polymer", "scholarly article", &["Q13442814"], &[])
            .search("polymer", "en", &["Q_ARTICLE"])
            .exact("polymer", "en", &["Q_ARTICLE"]);

        let resolution = resolver(kb).resolve("polymer", "").await.unwrap();
        assert_eq!(resolution, Resolution::Unresolved { disambiguation: false });
    }

    #[tokio::test]
    async fn test_exact_label_fallback() {
        let kb = MockKb::new()
            .entity("Q_KINETICS", "enzyme kinetics", "study of enzyme reaction rates", &[], &[])
            .entity("Q8047", "Enzyme", "biological catalyst", &["Q151885"], &[])
            .search("enzymes", "en", &["Q_KINETICS"])
            .search("enzyme", "en", &["Q_KINETICS"])
            .exact("enzyme", "en", &["Q8047"]);

        let resolution = resolver(kb).resolve("enzymes", "").await.unwrap();
        let entity = resolution.entity().expect("resolved");
        assert_eq!(entity.id, "Q8047");
        assert_eq!(entity.stage, MatchStage::ExactLabel);
        assert_eq!(entity.label_similarity, 100.0);
        assert_eq!(entity.match_score, 80.0);
    }

    #[tokio::test]
    async fn test_weak_top_candidate_is_rejected() {
        let kb = MockKb::new()
            .entity("Q_PIANO", "piano", "keyboard instrument", &[], &[])
            .search("xylophone", "en", &["Q_PIANO"]);

        let resolution = resolver(kb).resolve("xylophone", "percussion").await.unwrap();
        assert_eq!(resolution, Resolution::Unresolved { disambiguation: false });
    }

    #[tokio::test]
    async fn test_resolve_is_idempotent() {
        let kb = MockKb::new()
            .entity("Q81163", "polymer", "substance of repeating units", &["Q16889133"], &[])
            .search("polymers", "en", &["Q81163"]);
        let resolver = resolver(kb);

        let first = resolver.resolve("Polymers", "repeating units").await.unwrap();
        let second = resolver.resolve("Polymers", "repeating units").await.unwrap();
        assert_eq!(first, second);
        assert!(first.entity().is_some());
    }

    #[tokio::test]
    async fn test_empty_keyword_makes_no_calls() {
        let kb = Arc::new(MockKb::new());
        let resolver = Resolver::new(kb.clone(), ResolverConfig::default());

        let resolution = resolver.resolve(" ;, ", "context").await.unwrap();
        assert_eq!(resolution, Resolution::Unresolved { disambiguation: false });
        assert_eq!(kb.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_client_failure_propagates() {
        let result = resolver(MockKb::failing()).resolve("polymer", "").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pool_merges_by_id_first_language_wins() {
        let kb = MockKb::new()
            .entity("Q1", "catalyst", "", &[], &[])
            .entity("Q2", "catalyseur", "", &[], &[])
            .search("catalysts", "en", &["Q1"])
            .search("catalysts", "fr", &["Q2", "Q1"])
            .search("catalyst", "en", &["Q1"]);

        let pool = resolver(kb).candidate_pool("catalysts").await.unwrap();
        let ids: Vec<(&str, &str)> = pool.iter().map(|(h, l)| (h.id.as_str(), l.as_str())).collect();
        assert_eq!(ids, vec![("Q1", "en"), ("Q2", "fr")]);
    }

    #[test]
    fn test_polymer_ranking_follows_formula() {
        let with_context = ScoreBreakdown { exact_bonus: 0.0, context_overlap: 5, label_similarity: 80.0 };
        let similar = ScoreBreakdown { exact_bonus: 0.0, context_overlap: 0, label_similarity: 95.0 };

        let ranked = rank_candidates(
            vec![
                candidate("Q_CONTEXT", "en", 80.0, with_context.total()),
                candidate("Q_SIMILAR", "en", 95.0, similar.total()),
            ],
            &["en".to_string(), "fr".to_string()],
        );

        // 0 + 0.6 * 95 = 57 beats 5 + 0.6 * 80 = 53
        assert_eq!(ranked[0].hit.id, "Q_SIMILAR");
    }

    #[test]
    fn test_ranking_tie_breaks() {
        let languages = vec!["en".to_string(), "fr".to_string()];
        let ranked = rank_candidates(
            vec![
                candidate("Q_FR", "fr", 90.0, 60.0),
                candidate("Q_LOW_SIM", "en", 80.0, 60.0),
                candidate("Q_EN", "en", 90.0, 60.0),
                candidate("Q_EN_LATER", "en", 90.0, 60.0),
            ],
            &languages,
        );
        let order: Vec<&str> = ranked.iter().map(|c| c.hit.id.as_str()).collect();
        assert_eq!(order, vec!["Q_EN", "Q_EN_LATER", "Q_FR", "Q_LOW_SIM"]);
    }

    #[test]
    fn test_gates_are_absolute() {
        let resolver = resolver(MockKb::new());
        assert!(resolver.passes_gates(&candidate("Q1", "en", 70.0, 30.0)));
        assert!(!resolver.passes_gates(&candidate("Q1", "en", 69.9, 500.0)));
        assert!(!resolver.passes_gates(&candidate("Q1", "en", 100.0, 29.9)));
    }
}
