use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Semantic label of a bet or raise.
///
/// Serialized as its display form (`"open"`, `"3bet"`, `"checkraise"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub enum ActionLabel {
    Open,
    LimpRaise,
    /// The `n`-th bet of a betting round: `2bet`, `3bet`, `4bet`, ...
    NBet(u32),
    CheckRaise,
    Cont,
    DelayedCont,
    Donk,
    Lead,
    Probe,
    FloatBet,
    Bet,
    Raise,
    /// A bet or raise no rule matched. Always a configuration defect.
    Unclassified,
}

impl Display for ActionLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionLabel::NBet(n) => write!(f, "{n}bet"),
            ActionLabel::Open => f.write_str("open"),
            ActionLabel::LimpRaise => f.write_str("limp_raise"),
            ActionLabel::CheckRaise => f.write_str("checkraise"),
            ActionLabel::Cont => f.write_str("cont"),
            ActionLabel::DelayedCont => f.write_str("delayed_cont"),
            ActionLabel::Donk => f.write_str("donk"),
            ActionLabel::Lead => f.write_str("lead"),
            ActionLabel::Probe => f.write_str("probe"),
            ActionLabel::FloatBet => f.write_str("float_bet"),
            ActionLabel::Bet => f.write_str("bet"),
            ActionLabel::Raise => f.write_str("raise"),
            ActionLabel::Unclassified => f.write_str("unclassified"),
        }
    }
}

impl FromStr for ActionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = match s {
            "open" => ActionLabel::Open,
            "limp_raise" => ActionLabel::LimpRaise,
            "checkraise" => ActionLabel::CheckRaise,
            "cont" => ActionLabel::Cont,
            "delayed_cont" => ActionLabel::DelayedCont,
            "donk" => ActionLabel::Donk,
            "lead" => ActionLabel::Lead,
            "probe" => ActionLabel::Probe,
            "float_bet" => ActionLabel::FloatBet,
            "bet" => ActionLabel::Bet,
            "raise" => ActionLabel::Raise,
            "unclassified" => ActionLabel::Unclassified,
            other => {
                let n = other
                    .strip_suffix("bet")
                    .and_then(|n| n.parse::<u32>().ok())
                    .filter(|n| *n >= 2)
                    .ok_or_else(|| format!("unknown action label '{other}'"))?;
                ActionLabel::NBet(n)
            }
        };
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for label in [
            ActionLabel::Open,
            ActionLabel::NBet(2),
            ActionLabel::NBet(7),
            ActionLabel::DelayedCont,
            ActionLabel::FloatBet,
        ] {
            assert_eq!(label.to_string().parse::<ActionLabel>(), Ok(label));
        }
        assert!("1bet".parse::<ActionLabel>().is_err());
        assert!("betbet".parse::<ActionLabel>().is_err());
    }
}
