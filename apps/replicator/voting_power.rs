use alloy::{
    primitives::{address, Address, U256},
    providers::{DynProvider, Provider},
    sol,
};
use anyhow::{Context, Result};
use tracing::debug;

pub const ANGLE_GOVERNOR: Address = address!("748bA9Cd5a5DDba5ABA70a4aC861b2413dCa4436");
pub const ANGLE_LOCKER: Address = address!("D13F8C25CceD32cdfA79EB5eD654Ce3e484dCAF5");

pub const YIELDBASIS_VOTER: Address = address!("2be6670DE1cCEC715bDBBa2e3A6C1A05E496ec78");
pub const YB_LOCKER: Address = address!("0070D9adC687a28FBAcC0a0Aab24B90c037AD24e");

sol! {
    #[sol(rpc)]
    contract AngleGovernor {
        function getVotes(address account, uint256 timepoint) external view returns (uint256);
        function hasVoted(uint256 proposalId, address account) external view returns (bool);
        function castVoteWithReasonAndParams(
            uint256 proposalId,
            uint8 support,
            string calldata reason,
            bytes calldata params
        ) external returns (uint256);
    }

    #[sol(rpc)]
    contract YieldBasisVoter {
        struct ProposalParams {
            uint8 votingMode;
            uint32 supportThreshold;
            uint64 startDate;
            uint64 endDate;
            uint64 snapshotTimepoint;
            uint256 minVotingPower;
        }
        struct Tally {
            uint256 abstain;
            uint256 yes;
            uint256 no;
        }
        function getProposal(uint256 proposalId)
            external
            view
            returns (bool open, bool executed, ProposalParams memory parameters, Tally memory tally);
        function getDecayMidpointBasisPoints() external view returns (uint32);
        function getVotingToken() external view returns (address);
    }

    #[sol(rpc)]
    contract VotingToken {
        function getPastVotes(address account, uint256 timepoint) external view returns (uint256);
    }
}

/// Locker voting power on the Angle governor at the origin snapshot
/// timestamp.
pub async fn angle_voting_power(provider: &DynProvider, snapshot_timestamp: u64) -> Result<U256> {
    let governor = AngleGovernor::new(ANGLE_GOVERNOR, provider.clone());
    let power = governor
        .getVotes(ANGLE_LOCKER, U256::from(snapshot_timestamp))
        .call()
        .await
        .context("angle getVotes")?;

    Ok(power)
}

/// YieldBasis voting power decays over the proposal's lifetime: full power
/// until the midpoint, zero at the end, linear in between.
pub fn decayed_voting_power(
    snapshot_power: U256,
    current_time: u64,
    start_date: u64,
    end_date: u64,
    decay_midpoint_bps: u64,
) -> U256 {
    if current_time >= end_date {
        return U256::ZERO;
    }

    let duration = end_date - start_date;
    let midpoint = start_date + duration * decay_midpoint_bps / 10_000;

    if current_time <= midpoint {
        return snapshot_power;
    }

    let time_remaining = end_date - current_time;
    let decay_duration = end_date - midpoint;

    snapshot_power * U256::from(time_remaining) / U256::from(decay_duration)
}

/// Current decayed voting power of the locker on a YieldBasis proposal.
pub async fn yieldbasis_voting_power(
    provider: &DynProvider,
    proposal_index: U256,
) -> Result<U256> {
    let voter = YieldBasisVoter::new(YIELDBASIS_VOTER, provider.clone());

    let (proposal, decay_midpoint, token_address) = futures::try_join!(
        async { voter.getProposal(proposal_index).call().await.context("yb getProposal") },
        async {
            voter
                .getDecayMidpointBasisPoints()
                .call()
                .await
                .context("yb getDecayMidpointBasisPoints")
        },
        async { voter.getVotingToken().call().await.context("yb getVotingToken") },
    )?;

    let token = VotingToken::new(token_address, provider.clone());
    let snapshot_power = token
        .getPastVotes(
            YB_LOCKER,
            U256::from(proposal.parameters.snapshotTimepoint),
        )
        .call()
        .await
        .context("yb getPastVotes")?;

    let block = provider
        .get_block(alloy::eips::BlockId::latest())
        .await
        .context("get latest block")?
        .context("latest block missing")?;
    let current_time = block.header.timestamp;

    debug!(
        %snapshot_power,
        current_time,
        start = proposal.parameters.startDate,
        end = proposal.parameters.endDate,
        "Computing decayed voting power"
    );

    Ok(decayed_voting_power(
        snapshot_power,
        current_time,
        proposal.parameters.startDate,
        proposal.parameters.endDate,
        decay_midpoint as u64,
    ))
}

#[cfg(test)]
mod decay_tests {
    use super::*;

    const POWER: u64 = 1_000_000;

    #[test]
    fn full_power_before_the_midpoint() {
        // duration 1000s, midpoint at 50% => t=1500
        assert_eq!(
            decayed_voting_power(U256::from(POWER), 1_200, 1_000, 2_000, 5_000),
            U256::from(POWER)
        );
        assert_eq!(
            decayed_voting_power(U256::from(POWER), 1_500, 1_000, 2_000, 5_000),
            U256::from(POWER)
        );
    }

    #[test]
    fn zero_power_at_and_after_the_end() {
        assert_eq!(
            decayed_voting_power(U256::from(POWER), 2_000, 1_000, 2_000, 5_000),
            U256::ZERO
        );
        assert_eq!(
            decayed_voting_power(U256::from(POWER), 9_999, 1_000, 2_000, 5_000),
            U256::ZERO
        );
    }

    #[test]
    fn linear_decay_after_the_midpoint() {
        // midpoint 1500, end 2000: at 1750 half the power remains.
        assert_eq!(
            decayed_voting_power(U256::from(POWER), 1_750, 1_000, 2_000, 5_000),
            U256::from(POWER / 2)
        );
        // division floors like the on-chain implementation
        assert_eq!(
            decayed_voting_power(U256::from(3), 1_750, 1_000, 2_000, 5_000),
            U256::from(1)
        );
    }

    #[test]
    fn decay_is_monotonically_decreasing() {
        let mut previous = U256::from(POWER);
        for t in (1_500..2_000).step_by(50) {
            let power = decayed_voting_power(U256::from(POWER), t, 1_000, 2_000, 5_000);
            assert!(power <= previous, "power increased at t={t}");
            previous = power;
        }
    }
}
