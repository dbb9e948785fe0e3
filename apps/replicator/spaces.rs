use crate::intent::Protocol;

const ONE_HOUR: i64 = 3600;
const DELAY_ONE_DAY: i64 = 24 * ONE_HOUR;
const DELAY_TWO_DAYS: i64 = 2 * 24 * ONE_HOUR;
const DELAY_THREE_DAYS: i64 = 3 * 24 * ONE_HOUR;

const DEFAULT_SIGNERS: &[&str] = &["REPLICATION_PK"];
// Two delegations vote on frax.eth: one for the mainnet locker, one for the
// fraxtal one. Both must be attempted on every replica.
const FRAX_SIGNERS: &[&str] = &["FRAX_DELEGATION_MAINNET", "FRAX_DELEGATION_FRAXTAL"];

/// One mirror space whose closed proposals feed the replication pipeline.
#[derive(Debug, Clone)]
pub struct SpaceConfig {
    pub space: &'static str,
    pub token: &'static str,
    /// Origin venue on the proposal index; None when the origin lives fully
    /// on-chain.
    pub origin_space: Option<&'static str>,
    pub protocol: Protocol,
    /// Seconds granted to the operations team after the mirror vote closes.
    pub deadline_delay: i64,
    pub signer_envs: &'static [&'static str],
}

pub const SPACES: &[SpaceConfig] = &[
    SpaceConfig {
        space: "sdangle.eth",
        token: "ANGLE",
        origin_space: Some("anglegovernance.eth"),
        protocol: Protocol::Angle,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdfxs.eth",
        token: "FXS",
        origin_space: Some("frax.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: FRAX_SIGNERS,
    },
    SpaceConfig {
        space: "sdcrv.eth",
        token: "CRV",
        origin_space: Some("curve.eth"),
        protocol: Protocol::Curve,
        deadline_delay: DELAY_THREE_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdcrv-gov.eth",
        token: "CRV",
        origin_space: Some("curve.eth"),
        protocol: Protocol::Curve,
        deadline_delay: DELAY_THREE_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdbal.eth",
        token: "BAL",
        origin_space: Some("balancer.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdapw.eth",
        token: "Spectra",
        origin_space: Some("spectradao.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_ONE_DAY,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdyfi.eth",
        token: "YFI",
        origin_space: Some("veyfi.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdpendle.eth",
        token: "Pendle",
        origin_space: Some("sdpendle.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdmav.eth",
        token: "MAV",
        origin_space: Some("mavxyz.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdfxn.eth",
        token: "FXN",
        origin_space: Some("fxn.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdcake.eth",
        token: "CAKE",
        origin_space: Some("cakevote.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_ONE_DAY,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdbpt.eth",
        token: "BPT",
        origin_space: Some("blackpoolhq.eth"),
        protocol: Protocol::GenericSnapshot,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
    SpaceConfig {
        space: "sdyb.eth",
        token: "YB",
        origin_space: None,
        protocol: Protocol::YieldBasis,
        deadline_delay: DELAY_TWO_DAYS,
        signer_envs: DEFAULT_SIGNERS,
    },
];

pub fn space_config(space: &str) -> Option<&'static SpaceConfig> {
    SPACES.iter().find(|config| config.space == space)
}

impl SpaceConfig {
    /// Weekly gauge votes are collected in the mirror space but never
    /// replicated; the YFI space is the exception because its gauge votes
    /// live fully on snapshot.
    pub fn skips_gauge_votes(&self) -> bool {
        self.space != "sdyfi.eth"
    }

    /// Title used to look up the origin proposal. The YFI mirror prefixes
    /// its gauge votes; the origin space does not.
    pub fn origin_title(&self, title: &str) -> String {
        if self.space == "sdyfi.eth" {
            title.replace("Gauge vote YFI - ", "")
        } else {
            title.to_string()
        }
    }

    pub fn deadline_for(&self, proposal_end: i64) -> i64 {
        proposal_end + self.deadline_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_offchain_space_names_an_origin() {
        for config in SPACES {
            if config.protocol != Protocol::YieldBasis {
                assert!(config.origin_space.is_some(), "{} lacks origin", config.space);
            }
        }
    }

    #[test]
    fn curve_gets_the_long_deadline() {
        let config = space_config("sdcrv.eth").unwrap();
        assert_eq!(config.deadline_for(1_000), 1_000 + 3 * 24 * 3600);
        let cake = space_config("sdcake.eth").unwrap();
        assert_eq!(cake.deadline_for(1_000), 1_000 + 24 * 3600);
    }

    #[test]
    fn yfi_keeps_its_gauge_votes_and_strips_the_prefix() {
        let yfi = space_config("sdyfi.eth").unwrap();
        assert!(!yfi.skips_gauge_votes());
        assert_eq!(
            yfi.origin_title("Gauge vote YFI - yETH Week 42"),
            "yETH Week 42"
        );

        let bal = space_config("sdbal.eth").unwrap();
        assert!(bal.skips_gauge_votes());
        assert_eq!(bal.origin_title("BIP-123"), "BIP-123");
    }
}
