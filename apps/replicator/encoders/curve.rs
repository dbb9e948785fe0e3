use crate::{
    classifier::VoteTotals,
    intent::{fixed_point_amount, GovernanceTrack, Protocol, VoteIntent, VoteTally},
    proposals::Proposal,
    spaces::SpaceConfig,
};
use alloy::primitives::U256;
use lazy_static::lazy_static;
use regex::Regex;
use utils::errors::OperationError;

/// Fixed-point base of the Aragon voting apps (PCT_BASE).
pub const PCT_BASE: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

lazy_static! {
    static ref LINK_RE: Regex = Regex::new(r#"https?://[^\s<>"')]+"#).unwrap();
}

/// Curve proposals carry no machine-readable vote id; the convention is that
/// the first link in the body points at the vote page and its last path
/// segment is the Aragon vote id.
pub fn encode(
    proposal: &Proposal,
    totals: &VoteTotals,
    config: &SpaceConfig,
) -> Result<crate::intent::EncodedVote, OperationError> {
    let link = first_link(&proposal.body)
        .ok_or_else(|| OperationError::new("curve_encode", "no http link in proposal body"))?;

    let vote_id = vote_id_from_link(&link).ok_or_else(|| {
        OperationError::new("curve_encode", format!("no vote id at the end of {link}"))
    })?;

    let track = track_from_link(&link).ok_or_else(|| {
        OperationError::new(
            "curve_encode",
            format!("{link} maps to neither the ownership nor the parameter track"),
        )
    })?;

    let yes = fixed_point_amount(totals.yes)
        .map_err(|e| OperationError::new("curve_encode", e.to_string()))?;
    let no = fixed_point_amount(totals.no)
        .map_err(|e| OperationError::new("curve_encode", e.to_string()))?;

    // Abstain is not representable on this track; it never enters the
    // denominator.
    let denominator = yes + no;
    if denominator.is_zero() {
        return Err(OperationError::new(
            "curve_encode",
            "no Yes/No votes to derive a split from",
        ));
    }

    let yea_pct = yes * PCT_BASE / denominator;
    let nay_pct = PCT_BASE - yea_pct;

    Ok(crate::intent::EncodedVote::Curve {
        intent: VoteIntent {
            protocol: Protocol::Curve,
            space: config.space,
            target_id: vote_id.to_string(),
            tally: VoteTally {
                yes: yea_pct,
                no: nay_pct,
                abstain: U256::ZERO,
            },
            voting_power_base: PCT_BASE,
            proposal_title: proposal.title.clone(),
            deadline: config.deadline_for(proposal.end),
            breakdown: totals.breakdown.clone(),
        },
        track,
    })
}

fn first_link(body: &str) -> Option<String> {
    LINK_RE
        .find(body)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string())
}

fn vote_id_from_link(link: &str) -> Option<u64> {
    link.split('/')
        .filter(|segment| !segment.is_empty())
        .next_back()?
        .parse()
        .ok()
}

fn track_from_link(link: &str) -> Option<GovernanceTrack> {
    let lowered = link.to_lowercase();
    if lowered.contains("ownership") {
        Some(GovernanceTrack::Ownership)
    } else if lowered.contains("parameter") {
        Some(GovernanceTrack::Parameter)
    } else {
        None
    }
}
