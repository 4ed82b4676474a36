use serde::Serialize;

pub const VERIFIED_REFERRAL_EARNING: i64 = 2_000;
pub const UNVERIFIED_REFERRAL_EARNING: i64 = 100;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ReferralRow {
    pub id: String,
    pub username: String,
    pub verified: bool,
    pub referred_by: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubReferral {
    pub username: String,
    pub verified: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Referral {
    pub username: String,
    pub verified: bool,
    pub earnings: i64,
    pub referrals: Vec<SubReferral>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub total_referrals: usize,
    pub total_earnings: i64,
    pub referrals: Vec<Referral>,
}

fn base_earning(verified: bool) -> i64 {
    if verified {
        VERIFIED_REFERRAL_EARNING
    } else {
        UNVERIFIED_REFERRAL_EARNING
    }
}

/// Earnings from one direct referral: its base value plus a tenth of each
/// of its own referrals' base value.
pub fn referral_earnings(verified: bool, sub_referrals: &[SubReferral]) -> i64 {
    base_earning(verified)
        + sub_referrals
            .iter()
            .map(|s| base_earning(s.verified) / 10)
            .sum::<i64>()
}

/// Builds the two-level tree from the direct referrals and their referrals.
pub fn summarize(
    referral_code: String,
    direct: Vec<ReferralRow>,
    second_level: Vec<ReferralRow>,
) -> ReferralSummary {
    let referrals: Vec<Referral> = direct
        .into_iter()
        .map(|row| {
            let subs: Vec<SubReferral> = second_level
                .iter()
                .filter(|s| s.referred_by.as_deref() == Some(row.id.as_str()))
                .map(|s| SubReferral {
                    username: s.username.clone(),
                    verified: s.verified,
                })
                .collect();

            Referral {
                earnings: referral_earnings(row.verified, &subs),
                username: row.username,
                verified: row.verified,
                referrals: subs,
            }
        })
        .collect();

    ReferralSummary {
        referral_code,
        total_referrals: referrals.len(),
        total_earnings: referrals.iter().map(|r| r.earnings).sum(),
        referrals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, verified: bool, referred_by: Option<&str>) -> ReferralRow {
        ReferralRow {
            id: id.to_string(),
            username: format!("user_{}", id),
            verified,
            referred_by: referred_by.map(str::to_string),
        }
    }

    #[test]
    fn test_referral_earnings() {
        let subs = vec![
            SubReferral {
                username: "a".to_string(),
                verified: true,
            },
            SubReferral {
                username: "b".to_string(),
                verified: false,
            },
        ];
        assert_eq!(referral_earnings(true, &[]), 2000);
        assert_eq!(referral_earnings(false, &subs), 100 + 200 + 10);
    }

    #[test]
    fn test_summarize_groups_second_level() {
        let summary = summarize(
            "ABCD1234".to_string(),
            vec![row("1", true, Some("root")), row("2", false, Some("root"))],
            vec![row("3", true, Some("1")), row("4", true, Some("1"))],
        );

        assert_eq!(summary.total_referrals, 2);
        assert_eq!(summary.referrals[0].referrals.len(), 2);
        assert_eq!(summary.referrals[0].earnings, 2400);
        assert_eq!(summary.referrals[1].earnings, 100);
        assert_eq!(summary.total_earnings, 2500);
    }
}
