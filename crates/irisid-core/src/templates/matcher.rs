use serde::Serialize;

use crate::errors::{AppError, AppResult};
use crate::templates::model::{SubjectId, Template};

/// One ranked identification candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub distance: f64,
    pub subject: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationDecision {
    pub claimed: SubjectId,
    pub accepted: bool,
    /// `None` when the claimed subject owns no templates.
    pub min_distance: Option<f64>,
    pub templates_compared: usize,
    pub threshold: f64,
}

/// Euclidean (L2) distance between two vectors of the same length.
pub fn euclidean_distance(lhs: &[f64], rhs: &[f64]) -> AppResult<f64> {
    if lhs.len() != rhs.len() {
        return Err(AppError::DimensionMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }

    let sum = lhs
        .iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l - r) * (l - r))
        .sum::<f64>();
    Ok(sum.sqrt())
}

/// Ranks the gallery by distance to `probe`.
///
/// With an acceptance threshold (open set) every candidate at or beyond the
/// threshold is dropped; without one (closed set) the nearest neighbour is
/// always returned. Ties keep gallery order.
pub fn identify(
    probe: &[f64],
    templates: &[Template],
    max_rank: usize,
    acceptance_threshold: Option<f64>,
) -> AppResult<Vec<MatchResult>> {
    let mut ranked = Vec::with_capacity(templates.len());
    for template in templates {
        ranked.push(MatchResult {
            distance: euclidean_distance(&template.features, probe)?,
            subject: template.subject.clone(),
        });
    }

    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(threshold) = acceptance_threshold {
        ranked.retain(|candidate| candidate.distance < threshold);
    }
    ranked.truncate(max_rank);
    Ok(ranked)
}

/// Smallest distance from `probe` to any of `templates`, `None` when empty.
pub fn min_distance(probe: &[f64], templates: &[Template]) -> AppResult<Option<f64>> {
    let mut best: Option<f64> = None;
    for template in templates {
        let distance = euclidean_distance(&template.features, probe)?;
        best = Some(best.map_or(distance, |current| current.min(distance)));
    }
    Ok(best)
}

pub fn verify_detailed(
    probe: &[f64],
    claimed: &SubjectId,
    templates: &[Template],
    acceptance_threshold: f64,
) -> AppResult<VerificationDecision> {
    let own: Vec<Template> = templates
        .iter()
        .filter(|template| &template.subject == claimed)
        .cloned()
        .collect();
    let best = min_distance(probe, &own)?;

    Ok(VerificationDecision {
        claimed: claimed.clone(),
        accepted: best.is_some_and(|distance| distance < acceptance_threshold),
        min_distance: best,
        templates_compared: own.len(),
        threshold: acceptance_threshold,
    })
}

/// Accepts when the nearest template of `claimed` is strictly closer than
/// the threshold. An identity without templates is rejected, never an error.
pub fn verify(
    probe: &[f64],
    claimed: &SubjectId,
    templates: &[Template],
    acceptance_threshold: f64,
) -> AppResult<bool> {
    Ok(verify_detailed(probe, claimed, templates, acceptance_threshold)?.accepted)
}
